//! Quality metric calculators over the sample and model variant tables

use crate::model::AfTable;
use crate::{
    EafCoverage, ModelVariant, PrsQcError, PrsQcResult, QualityThresholds, VariantRecord,
};
use std::collections::HashSet;

/// Filter label counted by the low-quality rate. Other failing filters are
/// not counted.
pub const LOW_QUAL_FILTER: &str = "LowQual";

/// Proportion of model rows whose identifier appears among the sample's
/// variant identifiers.
///
/// Membership is by identifier only (allele-blind), and duplicated model
/// rows are counted per row. The denominator is the reconciled model table,
/// so an incomplete frequency reference narrows what "full coverage" means.
pub fn calculate_coverage(
    sample: &[VariantRecord],
    model: &[ModelVariant],
) -> PrsQcResult<f64> {
    if model.is_empty() {
        return Err(PrsQcError::InsufficientData(
            "model has no variants after reconciliation".to_string(),
        ));
    }

    let sample_ids: HashSet<&str> = sample.iter().map(|r| r.id.as_str()).collect();
    let present = model
        .iter()
        .filter(|m| sample_ids.contains(m.id.as_str()))
        .count();

    Ok(present as f64 / model.len() as f64)
}

fn passes_call_quality(record: &VariantRecord, thresholds: &QualityThresholds) -> bool {
    // Undefined depth, mapping quality or allele fraction fails the
    // predicate; missing values are not wildcards.
    let Some(depth) = record.depth else {
        return false;
    };
    let Some(mapping_quality) = record.mapping_quality else {
        return false;
    };
    let Some(alt_vaf) = record.alt_vaf() else {
        return false;
    };

    if depth < thresholds.min_depth || mapping_quality < thresholds.min_mapping_quality {
        return false;
    }

    if record.genotype.is_het() {
        alt_vaf >= thresholds.min_alt_vaf_het && alt_vaf <= 1.0 - thresholds.min_alt_vaf_het
    } else if record.genotype.is_hom_alt() {
        alt_vaf >= thresholds.min_alt_vaf_hom
    } else {
        false
    }
}

/// Proportion of sample variants with adequate depth, mapping quality and a
/// genotype-consistent alternate allele fraction.
///
/// The denominator is the full sample table, not just model-overlapping
/// variants.
pub fn calculate_call_quality(
    sample: &[VariantRecord],
    thresholds: &QualityThresholds,
) -> PrsQcResult<f64> {
    if sample.is_empty() {
        return Err(PrsQcError::InsufficientData(
            "sample has no variants".to_string(),
        ));
    }

    let good = sample
        .iter()
        .filter(|r| passes_call_quality(r, thresholds))
        .count();

    Ok(good as f64 / sample.len() as f64)
}

/// EAF-weighted coverage: set-based coverage proportion plus mean reference
/// allele frequencies over the whole model and over its covered subset.
///
/// Covered membership is by identifier, not allele-aware. Means are looked
/// up per reference-table row. When nothing is covered, the covered mean and
/// the ratio are undefined, not zero.
pub fn calculate_eaf_coverage(
    sample: &[VariantRecord],
    model: &[ModelVariant],
    af: &AfTable,
) -> PrsQcResult<EafCoverage> {
    let model_ids: HashSet<&str> = model.iter().map(|m| m.id.as_str()).collect();
    if model_ids.is_empty() {
        return Err(PrsQcError::InsufficientData(
            "model has no variants after reconciliation".to_string(),
        ));
    }

    let sample_ids: HashSet<&str> = sample.iter().map(|r| r.id.as_str()).collect();
    let covered: HashSet<&str> = model_ids.intersection(&sample_ids).copied().collect();

    let coverage_prop = covered.len() as f64 / model_ids.len() as f64;

    let model_mean_eaf = af.mean_freq_for(&model_ids).ok_or_else(|| {
        PrsQcError::InsufficientData(
            "no model variant has an allele-frequency entry".to_string(),
        )
    })?;
    let covered_mean_eaf = af.mean_freq_for(&covered);
    let eaf_ratio = covered_mean_eaf.map(|covered_mean| covered_mean / model_mean_eaf);

    Ok(EafCoverage {
        coverage_prop,
        model_mean_eaf,
        covered_mean_eaf,
        eaf_ratio,
        covered_count: covered.len(),
        model_count: model_ids.len(),
    })
}

/// Proportion of sample variants whose genotype call carries a missing
/// allele marker.
pub fn missing_genotype_rate(sample: &[VariantRecord]) -> PrsQcResult<f64> {
    if sample.is_empty() {
        return Err(PrsQcError::InsufficientData(
            "sample has no variants".to_string(),
        ));
    }

    let missing = sample.iter().filter(|r| r.genotype.is_missing()).count();
    Ok(missing as f64 / sample.len() as f64)
}

/// Proportion of sample variants whose filter status is exactly the
/// low-quality label.
pub fn low_qual_proportion(sample: &[VariantRecord]) -> PrsQcResult<f64> {
    if sample.is_empty() {
        return Err(PrsQcError::InsufficientData(
            "sample has no variants".to_string(),
        ));
    }

    let low_qual = sample.iter().filter(|r| r.filter == LOW_QUAL_FILTER).count();
    Ok(low_qual as f64 / sample.len() as f64)
}
