//! VCF file processing functionality

use crate::{Genotype, PrsQcError, PrsQcResult, VariantRecord};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Column indices for VCF parsing
#[derive(Debug, Clone)]
pub struct VcfColumnIndices {
    pub chrom: usize,
    pub pos: usize,
    pub id: usize,
    pub ref_allele: usize,
    pub alt: usize,
    pub qual: usize,
    pub filter: usize,
    pub info: usize,
    pub format: Option<usize>,
    pub samples_start: usize,
}

impl VcfColumnIndices {
    pub fn from_header(header_line: &str) -> PrsQcResult<Self> {
        let fields: Vec<&str> = header_line.trim().split('\t').collect();

        let position = |name: &str| {
            fields.iter().position(|&col| col == name).ok_or_else(|| {
                PrsQcError::InvalidRecord(format!("{} column not found in VCF header", name))
            })
        };

        let chrom = fields
            .iter()
            .position(|&col| col == "CHROM" || col == "#CHROM")
            .ok_or_else(|| {
                PrsQcError::InvalidRecord("CHROM column not found in VCF header".to_string())
            })?;
        let pos = position("POS")?;
        let id = position("ID")?;
        let ref_allele = position("REF")?;
        let alt = position("ALT")?;
        let qual = position("QUAL")?;
        let filter = position("FILTER")?;
        let info = position("INFO")?;
        let format = fields.iter().position(|&col| col == "FORMAT");
        let samples_start = format.map(|f| f + 1).unwrap_or(fields.len());

        Ok(VcfColumnIndices {
            chrom,
            pos,
            id,
            ref_allele,
            alt,
            qual,
            filter,
            info,
            format,
            samples_start,
        })
    }

    /// Standard VCF column order, used when no #CHROM header line is present.
    pub fn standard() -> Self {
        VcfColumnIndices {
            chrom: 0,
            pos: 1,
            id: 2,
            ref_allele: 3,
            alt: 4,
            qual: 5,
            filter: 6,
            info: 7,
            format: Some(8),
            samples_start: 9,
        }
    }

    fn sample_count(&self, fields: &[&str]) -> usize {
        fields.len().saturating_sub(self.samples_start)
    }
}

/// Look up a key=value entry in a VCF INFO field.
fn info_field<'a>(info: &'a str, key: &str) -> Option<&'a str> {
    info.split(';').find_map(|entry| {
        let mut parts = entry.splitn(2, '=');
        if parts.next() == Some(key) {
            parts.next()
        } else {
            None
        }
    })
}

/// Normalize a FILTER field into comma-joined labels; empty denotes pass.
fn parse_filter(raw: &str) -> String {
    if raw == "." {
        String::new()
    } else {
        raw.split(';').collect::<Vec<_>>().join(",")
    }
}

/// Parse a GT string ("0/1", "1|1", "./.") into a genotype pair.
///
/// Unparseable or absent allele tokens become the missing marker.
pub fn parse_genotype(gt: &str) -> Genotype {
    let mut alleles = gt.split(['/', '|']).map(|tok| tok.parse::<u8>().ok());
    let a = alleles.next().flatten();
    let b = alleles.next().flatten();
    Genotype::new(a, b)
}

fn parse_allele_depths(ad: &str) -> (Option<u32>, Option<u32>) {
    let mut depths = ad.split(',').map(|tok| tok.parse::<u32>().ok());
    (depths.next().flatten(), depths.next().flatten())
}

impl VariantRecord {
    pub fn from_line_with_indices(
        line: &str,
        indices: &VcfColumnIndices,
    ) -> PrsQcResult<Self> {
        let fields: Vec<&str> = line.split('\t').collect();

        if fields.len() <= indices.info {
            return Err(PrsQcError::InvalidRecord(format!(
                "Invalid VCF line format - not enough columns: {}",
                line
            )));
        }

        let chrom = fields[indices.chrom].to_string();
        let pos = fields[indices.pos].parse::<u64>().map_err(|_| {
            PrsQcError::InvalidRecord(format!("Invalid position: {}", fields[indices.pos]))
        })?;
        let id = fields[indices.id].to_string();
        let ref_allele = fields[indices.ref_allele].to_string();

        // First alternate allele only; sites with additional ALTs are only
        // partially represented.
        let raw_alt = fields[indices.alt];
        let alt_allele = match raw_alt.split_once(',') {
            Some((first, _)) => {
                log::warn!(
                    "Multi-allelic site {}:{} truncated to first alternate allele {}",
                    chrom,
                    pos,
                    first
                );
                first.to_string()
            }
            None => raw_alt.to_string(),
        };

        let qual = match fields[indices.qual] {
            "." => None,
            q => q.parse::<f64>().ok(),
        };
        let filter = parse_filter(fields[indices.filter]);

        let info = fields[indices.info];
        let allele_count = info_field(info, "AC")
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.parse::<u32>().ok());
        let mapping_quality = info_field(info, "MQ").and_then(|v| v.parse::<f64>().ok());

        // Single-sample assumption: read GT/AD/DP from the first sample
        // column, tolerating absent keys as missing values.
        let mut genotype = Genotype::missing();
        let mut ref_depth = None;
        let mut alt_depth = None;
        let mut depth = None;

        let format = indices.format.and_then(|f| fields.get(f));
        let sample = fields.get(indices.samples_start);
        if let (Some(format), Some(sample)) = (format, sample) {
            let keys: Vec<&str> = format.split(':').collect();
            let values: Vec<&str> = sample.split(':').collect();
            let field_of = |key: &str| {
                keys.iter()
                    .position(|&k| k == key)
                    .and_then(|i| values.get(i))
                    .copied()
            };

            if let Some(gt) = field_of("GT") {
                genotype = parse_genotype(gt);
            }
            if let Some(ad) = field_of("AD") {
                let (rd, ad) = parse_allele_depths(ad);
                ref_depth = rd;
                alt_depth = ad;
            }
            if let Some(dp) = field_of("DP") {
                depth = dp.parse::<u32>().ok();
            }
        }

        Ok(VariantRecord {
            chrom,
            pos,
            id,
            ref_allele,
            alt_allele,
            qual,
            filter,
            allele_count,
            mapping_quality,
            genotype,
            ref_depth,
            alt_depth,
            depth,
        })
    }
}

/// Check if a file is gzipped
pub fn is_gzipped<P: AsRef<Path>>(path: P) -> PrsQcResult<bool> {
    let mut file = File::open(path)?;
    let mut buffer = [0; 2];

    match file.read_exact(&mut buffer) {
        Ok(()) => Ok(buffer == [0x1f, 0x8b]),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(PrsQcError::Io(e)),
    }
}

fn open_vcf<P: AsRef<Path>>(path: P) -> PrsQcResult<Box<dyn BufRead>> {
    let file = File::open(&path)
        .map_err(|_| PrsQcError::FileNotFound(path.as_ref().to_string_lossy().to_string()))?;

    let reader: Box<dyn BufRead> = if is_gzipped(&path)? {
        let gz_decoder = MultiGzDecoder::new(file);
        Box::new(BufReader::new(gz_decoder))
    } else {
        Box::new(BufReader::new(file))
    };

    Ok(reader)
}

/// Read all variant records from a single-sample VCF file.
///
/// Records are returned in file iteration order, one per variant entry, with
/// no deduplication. Malformed data lines are skipped with a warning.
pub fn read_vcf_records<P: AsRef<Path>>(path: P) -> PrsQcResult<Vec<VariantRecord>> {
    let reader = open_vcf(&path)?;

    let mut records = Vec::new();
    let mut column_indices: Option<VcfColumnIndices> = None;
    let mut extra_samples_reported = false;

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();

        if line.starts_with("##") {
            continue; // Skip metadata lines
        }

        if line.starts_with('#') {
            column_indices = Some(VcfColumnIndices::from_header(line)?);
            continue;
        }

        if line.is_empty() {
            continue;
        }

        let indices = column_indices.get_or_insert_with(VcfColumnIndices::standard);

        if !extra_samples_reported {
            let sample_count = indices.sample_count(&line.split('\t').collect::<Vec<_>>());
            if sample_count > 1 {
                log::warn!(
                    "VCF {} has {} sample columns; only the first is used",
                    path.as_ref().display(),
                    sample_count
                );
                extra_samples_reported = true;
            }
        }

        match VariantRecord::from_line_with_indices(line, indices) {
            Ok(record) => records.push(record),
            Err(e) => {
                log::warn!("Skipping invalid VCF record: {}", e);
                continue;
            }
        }
    }

    Ok(records)
}
