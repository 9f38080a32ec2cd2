//! Human-readable metrics tables and tabular results output

use crate::{PrsQcResult, QcMetrics};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Outcome of one sample x model evaluation in a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairResult {
    pub sample: String,
    pub model: String,
    pub confidence: f64,
}

fn format_optional(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.4}", v))
        .unwrap_or_else(|| "NA".to_string())
}

/// Render the per-pair metrics table emitted alongside each evaluation.
pub fn format_metrics_table(
    sample_name: &str,
    model_name: &str,
    metrics: &QcMetrics,
) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\nMetrics for {} and {}:\n",
        sample_name, model_name
    ));
    out.push_str(&format!(
        "{:<15} {:<15} {:<15} {:<15} {:<15} {:<15} {:<15}\n",
        "Coverage",
        "EAF Ratio",
        "Model EAF",
        "Covered EAF",
        "Missing Rate",
        "LowQual Prop",
        "Call Quality"
    ));
    out.push_str(&format!(
        "{:<15.4} {:<15} {:<15.4} {:<15} {:<15.4} {:<15.4} {:<15.4}\n",
        metrics.eaf.coverage_prop,
        format_optional(metrics.eaf.eaf_ratio),
        metrics.eaf.model_mean_eaf,
        format_optional(metrics.eaf.covered_mean_eaf),
        metrics.missing_rate,
        metrics.low_qual_prop,
        metrics.call_quality
    ));
    out
}

/// Render the batch results table, sorted by descending confidence.
pub fn format_results_table(results: &[PairResult]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<20} {:<20} {:<12}\n",
        "Sample", "Model", "Confidence"
    ));
    for result in results {
        out.push_str(&format!(
            "{:<20} {:<20} {:<12.4}\n",
            result.sample, result.model, result.confidence
        ));
    }
    out
}

/// Write batch results to a TSV file, gzip-compressed when the path ends in
/// ".gz".
pub fn write_confidence_results(
    results: &[PairResult],
    mask_threshold: f64,
    output_path: &Path,
) -> PrsQcResult<()> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs::File;
    use std::io::Write;

    let file = File::create(output_path)?;
    let mut writer: Box<dyn Write> =
        if output_path.extension().and_then(|s| s.to_str()) == Some("gz") {
            Box::new(GzEncoder::new(file, Compression::default()))
        } else {
            Box::new(file)
        };

    writeln!(writer, "Sample\tModel\tConfidence\tMasked")?;

    for result in results {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}",
            result.sample,
            result.model,
            result.confidence,
            if result.confidence < mask_threshold {
                "yes"
            } else {
                "no"
            }
        )?;
    }

    Ok(())
}
