//! # prs-qc-rs - PRS Confidence Scoring Toolkit
//!
//! A Rust implementation of the PRS-QC toolkit for estimating how trustworthy
//! it is to apply a precomputed polygenic risk score (PRS/GRS) model to a
//! single sample's genotype calls (VCF).

pub mod confidence;
pub mod metrics;
pub mod model;
pub mod report;
pub mod utils;
pub mod vcf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A diploid genotype call as a pair of allele indices.
///
/// `None` is the missing-allele marker ("." in a GT field). A genotype with
/// either allele missing never satisfies a quality predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genotype {
    pub alleles: (Option<u8>, Option<u8>),
}

impl Genotype {
    pub fn new(a: Option<u8>, b: Option<u8>) -> Self {
        Self { alleles: (a, b) }
    }

    pub fn missing() -> Self {
        Self::new(None, None)
    }

    /// True if either allele carries the missing marker.
    pub fn is_missing(&self) -> bool {
        self.alleles.0.is_none() || self.alleles.1.is_none()
    }

    /// Heterozygous: two defined, distinct allele indices (phase-agnostic).
    pub fn is_het(&self) -> bool {
        match self.alleles {
            (Some(a), Some(b)) => a != b,
            _ => false,
        }
    }

    /// Homozygous for a non-reference allele.
    pub fn is_hom_alt(&self) -> bool {
        match self.alleles {
            (Some(a), Some(b)) => a == b && a != 0,
            _ => false,
        }
    }
}

/// One variant entry of the sequenced sample, as loaded from the VCF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantRecord {
    pub chrom: String,
    pub pos: u64,
    /// Variant identifier (e.g. an rsID); "." when the VCF carries none.
    pub id: String,
    pub ref_allele: String,
    /// First alternate allele only; remaining ALTs are not represented.
    pub alt_allele: String,
    /// Phred-scaled call quality; None when the QUAL field is ".".
    pub qual: Option<f64>,
    /// Comma-joined filter labels; empty string denotes pass.
    pub filter: String,
    /// INFO AC, first value.
    pub allele_count: Option<u32>,
    /// INFO MQ.
    pub mapping_quality: Option<f64>,
    pub genotype: Genotype,
    /// Reads supporting the reference allele (FORMAT AD, first value).
    pub ref_depth: Option<u32>,
    /// Reads supporting the first alternate allele (FORMAT AD, second value).
    pub alt_depth: Option<u32>,
    /// Total read depth (FORMAT DP).
    pub depth: Option<u32>,
}

impl VariantRecord {
    /// Reference variant allele fraction; None when depth is zero or missing.
    pub fn ref_vaf(&self) -> Option<f64> {
        vaf(self.ref_depth, self.depth)
    }

    /// Alternate variant allele fraction; None when depth is zero or missing.
    pub fn alt_vaf(&self) -> Option<f64> {
        vaf(self.alt_depth, self.depth)
    }
}

fn vaf(allele_depth: Option<u32>, total_depth: Option<u32>) -> Option<f64> {
    match (allele_depth, total_depth) {
        (Some(ad), Some(dp)) if dp > 0 => Some(ad as f64 / dp as f64),
        _ => None,
    }
}

/// One risk-model variant after reconciliation with the frequency reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVariant {
    pub id: String,
    pub ref_allele: String,
    pub alt_allele: String,
    /// Reference-population alternate allele frequency.
    pub alt_freq: f64,
    /// The model file's remaining columns (effect weights etc.), passed
    /// through as (column, value) pairs without interpretation.
    pub weights: Vec<(String, String)>,
}

/// EAF-weighted coverage metrics for one sample x model evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EafCoverage {
    /// Set-based coverage: |covered ids| / |model ids|.
    pub coverage_prop: f64,
    /// Mean reference allele frequency over all model variants.
    pub model_mean_eaf: f64,
    /// Mean reference allele frequency over covered variants; None when
    /// nothing is covered.
    pub covered_mean_eaf: Option<f64>,
    /// covered_mean_eaf / model_mean_eaf; None when nothing is covered.
    pub eaf_ratio: Option<f64>,
    pub covered_count: usize,
    pub model_count: usize,
}

/// Quality metrics feeding the confidence score. Computed and consumed
/// within a single evaluation; not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QcMetrics {
    /// Row-based model coverage: model rows whose id appears in the sample,
    /// over total model rows (duplicates counted twice).
    pub coverage: f64,
    pub eaf: EafCoverage,
    /// Proportion of sample variants passing the depth/MQ/VAF predicate.
    pub call_quality: f64,
    /// Proportion of sample variants with a missing genotype allele.
    pub missing_rate: f64,
    /// Proportion of sample variants filtered as exactly "LowQual".
    pub low_qual_prop: f64,
}

/// Result of one confidence evaluation: the bounded score plus the
/// intermediate metrics it was combined from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceEvaluation {
    pub score: f64,
    pub metrics: QcMetrics,
}

/// Thresholds for the call-quality predicate.
#[derive(Debug, Clone)]
pub struct QualityThresholds {
    pub min_depth: u32,
    pub min_alt_vaf_het: f64,
    pub min_alt_vaf_hom: f64,
    pub min_mapping_quality: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_depth: 10,
            min_alt_vaf_het: 0.25,
            min_alt_vaf_hom: 0.75,
            min_mapping_quality: 20.0,
        }
    }
}

/// Error types for the prs-qc library
#[derive(Debug, thiserror::Error)]
pub enum PrsQcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),
}

pub type PrsQcResult<T> = Result<T, PrsQcError>;

/// Validate call-quality thresholds before running an evaluation.
pub fn validate_thresholds(thresholds: &QualityThresholds) -> PrsQcResult<()> {
    if thresholds.min_depth == 0 {
        return Err(PrsQcError::InvalidConfig(
            "min_depth must be at least 1".to_string(),
        ));
    }

    if thresholds.min_alt_vaf_het <= 0.0 || thresholds.min_alt_vaf_het > 0.5 {
        return Err(PrsQcError::InvalidConfig(
            "min_alt_vaf_het must be in (0, 0.5]".to_string(),
        ));
    }

    if thresholds.min_alt_vaf_hom <= 0.0 || thresholds.min_alt_vaf_hom > 1.0 {
        return Err(PrsQcError::InvalidConfig(
            "min_alt_vaf_hom must be in (0, 1]".to_string(),
        ));
    }

    if thresholds.min_alt_vaf_het > thresholds.min_alt_vaf_hom {
        return Err(PrsQcError::InvalidConfig(
            "min_alt_vaf_het must not exceed min_alt_vaf_hom".to_string(),
        ));
    }

    if thresholds.min_mapping_quality < 0.0 {
        return Err(PrsQcError::InvalidConfig(
            "min_mapping_quality must be non-negative".to_string(),
        ));
    }

    Ok(())
}
