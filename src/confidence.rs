//! Confidence aggregation: combines the quality metrics into one bounded score

use crate::metrics::{
    calculate_call_quality, calculate_coverage, calculate_eaf_coverage, low_qual_proportion,
    missing_genotype_rate,
};
use crate::model::{read_af_table, read_model, AfTable};
use crate::vcf::read_vcf_records;
use crate::{
    ConfidenceEvaluation, ModelVariant, PrsQcError, PrsQcResult, QcMetrics, QualityThresholds,
    VariantRecord,
};
use std::path::Path;

const COVERAGE_WEIGHT: f64 = 0.25;
const EAF_RATIO_WEIGHT: f64 = 0.25;
const CALL_QUALITY_WEIGHT: f64 = 0.20;
const MISSING_WEIGHT: f64 = 0.15;
const LOW_QUAL_WEIGHT: f64 = 0.15;

const MISSING_DECAY: f64 = 15.0;
const LOW_QUAL_DECAY: f64 = 10.0;

/// Transform the EAF ratio into a score in [0, 1].
///
/// Peaks at 1 when the ratio is exactly 1 (covered variants carry the same
/// average frequency as the full model set) and decays symmetrically for
/// ratios above or below 1. An undefined ratio, which arises when nothing is
/// covered, maps to 0 as the ratio-to-zero limit.
pub fn eaf_ratio_score(eaf_ratio: Option<f64>) -> f64 {
    match eaf_ratio {
        Some(ratio) if ratio > 0.0 => 1.0 / (1.0 + ratio.ln().abs()),
        _ => 0.0,
    }
}

/// Weighted combination of the quality metrics. Weights sum to 1; coverage
/// is squared and clamped so partial coverage is penalized super-linearly,
/// and the two rate terms decay exponentially so small rates cost little but
/// the penalty steepens quickly.
pub fn confidence_score(metrics: &QcMetrics) -> f64 {
    COVERAGE_WEIGHT * (metrics.coverage * metrics.coverage).min(1.0)
        + EAF_RATIO_WEIGHT * eaf_ratio_score(metrics.eaf.eaf_ratio)
        + CALL_QUALITY_WEIGHT * metrics.call_quality
        + MISSING_WEIGHT * (-MISSING_DECAY * metrics.missing_rate).exp()
        + LOW_QUAL_WEIGHT * (-LOW_QUAL_DECAY * metrics.low_qual_prop).exp()
}

/// Compute the full metrics record for one sample x model pair.
///
/// Degenerate inputs (empty sample, empty reconciled model, zero model mean
/// frequency) are rejected with `InsufficientData` before any score is
/// formed; no partial results are produced.
pub fn compute_metrics(
    sample: &[VariantRecord],
    model: &[ModelVariant],
    af: &AfTable,
    thresholds: &QualityThresholds,
) -> PrsQcResult<QcMetrics> {
    let coverage = calculate_coverage(sample, model)?;
    let eaf = calculate_eaf_coverage(sample, model, af)?;

    if eaf.model_mean_eaf == 0.0 {
        return Err(PrsQcError::InsufficientData(
            "model mean allele frequency is zero".to_string(),
        ));
    }

    let call_quality = calculate_call_quality(sample, thresholds)?;
    let missing_rate = missing_genotype_rate(sample)?;
    let low_qual_prop = low_qual_proportion(sample)?;

    Ok(QcMetrics {
        coverage,
        eaf,
        call_quality,
        missing_rate,
        low_qual_prop,
    })
}

/// Evaluate the confidence of applying a risk model to a sample's VCF.
///
/// Loads the three inputs, computes the metrics record and returns it with
/// the combined score. The score is nominally in [0, 1] but not formally
/// clamped. A metrics summary is logged as an observational report.
pub fn evaluate_confidence<P: AsRef<Path>>(
    vcf_path: P,
    model_path: P,
    af_path: P,
    thresholds: &QualityThresholds,
) -> PrsQcResult<ConfidenceEvaluation> {
    let sample = read_vcf_records(&vcf_path)?;
    let af = read_af_table(&af_path)?;
    let model = read_model(&model_path, &af)?;

    log::info!(
        "Loaded {} sample variants, {} reconciled model variants ({} frequency rows)",
        sample.len(),
        model.len(),
        af.len()
    );

    let metrics = compute_metrics(&sample, &model, &af, thresholds)?;
    let score = confidence_score(&metrics);

    log::info!(
        "Metrics for {} x {}: coverage={:.4}, eaf_coverage={:.4}, eaf_ratio={}, call_quality={:.4}, missing_rate={:.4}, low_qual_prop={:.4}, confidence={:.4}",
        vcf_path.as_ref().display(),
        model_path.as_ref().display(),
        metrics.coverage,
        metrics.eaf.coverage_prop,
        metrics
            .eaf
            .eaf_ratio
            .map(|r| format!("{:.4}", r))
            .unwrap_or_else(|| "NA".to_string()),
        metrics.call_quality,
        metrics.missing_rate,
        metrics.low_qual_prop,
        score
    );

    Ok(ConfidenceEvaluation { score, metrics })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::read_af_table;
    use crate::Genotype;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn good_record(id: &str) -> VariantRecord {
        VariantRecord {
            chrom: "chr1".to_string(),
            pos: 100,
            id: id.to_string(),
            ref_allele: "A".to_string(),
            alt_allele: "T".to_string(),
            qual: Some(50.0),
            filter: String::new(),
            allele_count: Some(1),
            mapping_quality: Some(60.0),
            genotype: Genotype::new(Some(0), Some(1)),
            ref_depth: Some(10),
            alt_depth: Some(10),
            depth: Some(20),
        }
    }

    fn model_variant(id: &str, alt_freq: f64) -> ModelVariant {
        ModelVariant {
            id: id.to_string(),
            ref_allele: "A".to_string(),
            alt_allele: "T".to_string(),
            alt_freq,
            weights: Vec::new(),
        }
    }

    fn af_table<S: AsRef<str>>(rows: &[(S, f64)]) -> AfTable {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "ID\tREF\tALT\tALT_FREQS").unwrap();
        for (id, freq) in rows {
            writeln!(file, "{}\tA\tT\t{}", id.as_ref(), freq).unwrap();
        }
        read_af_table(file.path()).unwrap()
    }

    #[test]
    fn test_eaf_ratio_score_peaks_at_one() {
        assert_eq!(eaf_ratio_score(Some(1.0)), 1.0);

        // Symmetric decay for reciprocal ratios
        let above = eaf_ratio_score(Some(2.0));
        let below = eaf_ratio_score(Some(0.5));
        assert!((above - below).abs() < 1e-12);
        assert!(above < 1.0);

        // Extremes drive the score to zero
        assert_eq!(eaf_ratio_score(Some(f64::INFINITY)), 0.0);
        assert_eq!(eaf_ratio_score(Some(0.0)), 0.0);
        assert_eq!(eaf_ratio_score(Some(-1.0)), 0.0);
        assert_eq!(eaf_ratio_score(None), 0.0);
    }

    #[test]
    fn test_perfect_inputs_score_one() {
        // 100 sample variants, 10 model variants all present and passing,
        // no missing genotypes, no LowQual filters, EAF ratio of 1.
        let sample: Vec<VariantRecord> =
            (0..100).map(|i| good_record(&format!("rs{}", i))).collect();
        let model: Vec<ModelVariant> =
            (0..10).map(|i| model_variant(&format!("rs{}", i), 0.25)).collect();
        let af_rows: Vec<(String, f64)> =
            (0..10).map(|i| (format!("rs{}", i), 0.25)).collect();
        let af = af_table(&af_rows);

        let metrics =
            compute_metrics(&sample, &model, &af, &QualityThresholds::default()).unwrap();
        assert_eq!(metrics.coverage, 1.0);
        assert_eq!(metrics.eaf.eaf_ratio, Some(1.0));
        assert_eq!(metrics.call_quality, 1.0);
        assert_eq!(metrics.missing_rate, 0.0);
        assert_eq!(metrics.low_qual_prop, 0.0);

        let score = confidence_score(&metrics);
        assert!((score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_coverage_scores_below_three_quarters() {
        let sample: Vec<VariantRecord> =
            (0..20).map(|i| good_record(&format!("rs{}", i))).collect();
        // None of the model ids appear in the sample.
        let model: Vec<ModelVariant> =
            (0..10).map(|i| model_variant(&format!("miss{}", i), 0.25)).collect();
        let af_rows: Vec<(String, f64)> =
            (0..10).map(|i| (format!("miss{}", i), 0.25)).collect();
        let af = af_table(&af_rows);

        let metrics =
            compute_metrics(&sample, &model, &af, &QualityThresholds::default()).unwrap();
        assert_eq!(metrics.coverage, 0.0);
        assert_eq!(metrics.eaf.eaf_ratio, None);

        let score = confidence_score(&metrics);
        assert!(score < 0.75);
    }

    #[test]
    fn test_missing_rate_penalty_decays_exponentially() {
        let mut sample: Vec<VariantRecord> =
            (0..10).map(|i| good_record(&format!("rs{}", i))).collect();
        sample[0].genotype = Genotype::missing();

        let model = vec![model_variant("rs1", 0.25)];
        let af = af_table(&[("rs1", 0.25)]);

        let metrics =
            compute_metrics(&sample, &model, &af, &QualityThresholds::default()).unwrap();
        assert!((metrics.missing_rate - 0.1).abs() < 1e-12);

        let missing_term = (-15.0f64 * 0.1).exp();
        assert!((missing_term - 0.22313016).abs() < 1e-6);

        // The full score carries 0.15 * exp(-1.5) from the missing term.
        let zero_missing = QcMetrics {
            missing_rate: 0.0,
            ..metrics.clone()
        };
        let delta = confidence_score(&zero_missing) - confidence_score(&metrics);
        assert!((delta - 0.15 * (1.0 - missing_term)).abs() < 1e-12);
    }

    #[test]
    fn test_score_invariant_under_row_permutation() {
        let mut sample: Vec<VariantRecord> =
            (0..30).map(|i| good_record(&format!("rs{}", i))).collect();
        sample[3].genotype = Genotype::missing();
        sample[7].filter = "LowQual".to_string();
        sample[11].depth = Some(4);

        let mut model: Vec<ModelVariant> = (0..15)
            .map(|i| model_variant(&format!("rs{}", 2 * i), 0.1 + 0.01 * i as f64))
            .collect();
        let af_rows: Vec<(String, f64)> = (0..15)
            .map(|i| (format!("rs{}", 2 * i), 0.1 + 0.01 * i as f64))
            .collect();
        let af = af_table(&af_rows);

        let thresholds = QualityThresholds::default();
        let forward = compute_metrics(&sample, &model, &af, &thresholds).unwrap();

        sample.reverse();
        model.reverse();
        let reversed = compute_metrics(&sample, &model, &af, &thresholds).unwrap();

        assert_eq!(
            confidence_score(&forward),
            confidence_score(&reversed)
        );
    }

    #[test]
    fn test_zero_model_mean_frequency_is_insufficient_data() {
        let sample = vec![good_record("rs1")];
        let model = vec![model_variant("rs1", 0.0)];
        let af = af_table(&[("rs1", 0.0)]);

        let err =
            compute_metrics(&sample, &model, &af, &QualityThresholds::default()).unwrap_err();
        assert!(matches!(err, PrsQcError::InsufficientData(_)));
    }

    #[test]
    fn test_evaluate_confidence_end_to_end() {
        let mut vcf = NamedTempFile::new().unwrap();
        writeln!(vcf, "##fileformat=VCFv4.2").unwrap();
        writeln!(vcf, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1").unwrap();
        for i in 0..10 {
            writeln!(
                vcf,
                "chr1\t{}\trs{}\tA\tT\t50.0\tPASS\tAC=1;MQ=60.0\tGT:AD:DP\t0/1:10,10:20",
                100 + i,
                i
            )
            .unwrap();
        }

        let mut af = NamedTempFile::new().unwrap();
        writeln!(af, "ID\tREF\tALT\tALT_FREQS").unwrap();
        for i in 0..10 {
            writeln!(af, "rs{}\tA\tT\t0.3", i).unwrap();
        }

        let mut model = NamedTempFile::new().unwrap();
        writeln!(model, "variant\tREF\tALT\teffect_weight").unwrap();
        for i in 0..10 {
            writeln!(model, "rs{}\tA\tT\t0.5", i).unwrap();
        }

        let evaluation = evaluate_confidence(
            vcf.path(),
            model.path(),
            af.path(),
            &QualityThresholds::default(),
        )
        .unwrap();

        assert!((evaluation.score - 1.0).abs() < 1e-12);
        assert_eq!(evaluation.metrics.eaf.covered_count, 10);
        assert_eq!(evaluation.metrics.eaf.model_count, 10);
    }

    #[test]
    fn test_evaluate_confidence_missing_input() {
        let err = evaluate_confidence(
            "/nonexistent/sample.vcf",
            "/nonexistent/model.tsv",
            "/nonexistent/freqs.afreq",
            &QualityThresholds::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PrsQcError::FileNotFound(_)));
    }
}
