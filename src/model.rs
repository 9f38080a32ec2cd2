//! Risk-model and allele-frequency reference table loading

use crate::{ModelVariant, PrsQcError, PrsQcResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;

/// One row of the allele-frequency reference table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlleleFrequency {
    pub id: String,
    pub ref_allele: String,
    pub alt_allele: String,
    pub alt_freq: f64,
}

/// The loaded allele-frequency reference, in file row order.
#[derive(Debug, Clone, Default)]
pub struct AfTable {
    rows: Vec<AlleleFrequency>,
}

impl AfTable {
    pub fn rows(&self) -> &[AlleleFrequency] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Mean alternate allele frequency over reference rows whose identifier
    /// is contained in `ids`. Computed per row, so an identifier listed twice
    /// in the reference weighs twice. None when no row matches.
    pub fn mean_freq_for(&self, ids: &HashSet<&str>) -> Option<f64> {
        let freqs: Vec<f64> = self
            .rows
            .iter()
            .filter(|row| ids.contains(row.id.as_str()))
            .map(|row| row.alt_freq)
            .collect();

        if freqs.is_empty() {
            None
        } else {
            Some(freqs.iter().sum::<f64>() / freqs.len() as f64)
        }
    }
}

fn open_table<P: AsRef<Path>>(path: P) -> PrsQcResult<csv::Reader<File>> {
    let file = File::open(&path)
        .map_err(|_| PrsQcError::FileNotFound(path.as_ref().to_string_lossy().to_string()))?;

    Ok(csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_reader(file))
}

fn column_index(headers: &csv::StringRecord, name: &str, path: &Path) -> PrsQcResult<usize> {
    headers
        .iter()
        .position(|col| col == name)
        .ok_or_else(|| {
            PrsQcError::InvalidRecord(format!(
                "{} column not found in {}",
                name,
                path.display()
            ))
        })
}

/// Read the allele-frequency reference table (columns ID, REF, ALT,
/// ALT_FREQS; any further columns are ignored).
pub fn read_af_table<P: AsRef<Path>>(path: P) -> PrsQcResult<AfTable> {
    let path = path.as_ref();
    let mut reader = open_table(path)?;

    let headers = reader.headers()?.clone();
    let id = column_index(&headers, "ID", path)?;
    let ref_allele = column_index(&headers, "REF", path)?;
    let alt_allele = column_index(&headers, "ALT", path)?;
    let alt_freq = column_index(&headers, "ALT_FREQS", path)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let freq = record[alt_freq].parse::<f64>().map_err(|_| {
            PrsQcError::InvalidRecord(format!(
                "Invalid allele frequency '{}' for {}",
                &record[alt_freq], &record[id]
            ))
        })?;

        rows.push(AlleleFrequency {
            id: record[id].to_string(),
            ref_allele: record[ref_allele].to_string(),
            alt_allele: record[alt_allele].to_string(),
            alt_freq: freq,
        });
    }

    Ok(AfTable { rows })
}

/// Read a risk-model table (columns variant, REF, ALT plus arbitrary weight
/// columns) and reconcile it with the allele-frequency reference.
///
/// Reconciliation is an inner join on (identifier, REF, ALT): model rows with
/// no allele-consistent reference entry are excluded, so every downstream
/// coverage figure is measured against the joinable subset of the model, not
/// the model file's full variant list. Duplicate model rows are kept; when
/// the reference itself holds duplicate keys, the first row wins.
pub fn read_model<P: AsRef<Path>>(
    model_path: P,
    af: &AfTable,
) -> PrsQcResult<Vec<ModelVariant>> {
    let path = model_path.as_ref();
    let mut reader = open_table(path)?;

    let headers = reader.headers()?.clone();
    let id = column_index(&headers, "variant", path)?;
    let ref_allele = column_index(&headers, "REF", path)?;
    let alt_allele = column_index(&headers, "ALT", path)?;

    let weight_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != id && *i != ref_allele && *i != alt_allele)
        .map(|(i, name)| (i, name.to_string()))
        .collect();

    let mut freq_by_key: HashMap<(&str, &str, &str), f64> = HashMap::new();
    for row in af.rows() {
        freq_by_key
            .entry((&row.id, &row.ref_allele, &row.alt_allele))
            .or_insert(row.alt_freq);
    }

    let mut model = Vec::new();
    let mut dropped = 0usize;

    for result in reader.records() {
        let record = result?;
        let key = (&record[id], &record[ref_allele], &record[alt_allele]);

        let Some(&alt_freq) = freq_by_key.get(&key) else {
            dropped += 1;
            continue;
        };

        let weights = weight_columns
            .iter()
            .filter_map(|(i, name)| record.get(*i).map(|v| (name.clone(), v.to_string())))
            .collect();

        model.push(ModelVariant {
            id: record[id].to_string(),
            ref_allele: record[ref_allele].to_string(),
            alt_allele: record[alt_allele].to_string(),
            alt_freq,
            weights,
        });
    }

    if dropped > 0 {
        log::info!(
            "{}: {} model variants had no allele-consistent frequency entry and were dropped",
            path.display(),
            dropped
        );
    }

    Ok(model)
}
