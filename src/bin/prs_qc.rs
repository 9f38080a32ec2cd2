//! Batch CLI for PRS confidence evaluation - scores sample x model pairs

use clap::Parser;
use env_logger::Env;
use prs_qc_rs::{
    confidence::evaluate_confidence,
    report::{format_metrics_table, format_results_table, write_confidence_results, PairResult},
    utils::{get_num_cpus, validate_file_readable, Timer},
    validate_thresholds, PrsQcError, PrsQcResult, QualityThresholds,
};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "prs_qc")]
#[command(about = "Confidence scoring for applying PRS/GRS models to single-sample VCFs")]
#[command(long_about = "
prs_qc estimates how trustworthy it is to apply a precomputed polygenic risk
score (PRS/GRS) model to a sample's genotype calls. For every sample x model
pair it loads the sample VCF, reconciles the model's variant list with an
allele-frequency reference, computes coverage, call-quality, allele-frequency
and missingness metrics, and combines them into a single confidence score
in [0, 1].

Pairs scoring below the masking threshold are reported separately: their
computed risk scores should not be trusted.

Input formats:
- VCF: single-sample, plain or gzipped; GT/AD/DP are read from the first
  sample column and may be absent.
- Model: tab-separated with columns 'variant', 'REF', 'ALT' plus arbitrary
  effect-weight columns.
- Frequency reference: tab-separated with columns 'ID', 'REF', 'ALT',
  'ALT_FREQS'.

Individual pair failures (missing files, insufficient data) are reported and
skipped; the rest of the batch continues.
")]
struct Args {
    /// Path to a single-sample VCF file (repeat for multiple samples)
    #[arg(long = "vcf", value_name = "FILE", required = true)]
    vcfs: Vec<PathBuf>,

    /// Path to a risk-model TSV file (repeat for multiple models)
    #[arg(long = "model", value_name = "FILE", required = true)]
    models: Vec<PathBuf>,

    /// Path to the allele-frequency reference table
    #[arg(long = "af", value_name = "FILE")]
    af: PathBuf,

    /// Optional results TSV (gzip-compressed when the path ends in .gz)
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Confidence threshold below which a pair's risk score is masked
    #[arg(long, default_value = "0.95")]
    mask_threshold: f64,

    /// Minimum read depth for a confident call
    #[arg(long, default_value = "10")]
    min_depth: u32,

    /// Minimum alternate allele fraction for heterozygous calls
    #[arg(long, default_value = "0.25")]
    min_het_vaf: f64,

    /// Minimum alternate allele fraction for homozygous-alternate calls
    #[arg(long, default_value = "0.75")]
    min_hom_vaf: f64,

    /// Minimum mapping quality for a confident call
    #[arg(long, default_value = "20.0")]
    min_mq: f64,

    /// Number of threads for parallel pair evaluation
    #[arg(long, default_value_t = get_num_cpus())]
    num_processes: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// Sort results by descending confidence.
fn sort_results(results: &mut [PairResult]) {
    results.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });
}

fn run() -> PrsQcResult<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    log::info!("Starting PRS confidence evaluation");
    log::info!("Samples: {}", args.vcfs.len());
    log::info!("Models: {}", args.models.len());
    log::info!("Frequency reference: {:?}", args.af);
    log::info!("Number of processes: {}", args.num_processes);

    let thresholds = QualityThresholds {
        min_depth: args.min_depth,
        min_alt_vaf_het: args.min_het_vaf,
        min_alt_vaf_hom: args.min_hom_vaf,
        min_mapping_quality: args.min_mq,
    };
    validate_thresholds(&thresholds)?;

    if !(0.0..=1.0).contains(&args.mask_threshold) {
        return Err(PrsQcError::InvalidConfig(
            "mask_threshold must be in [0, 1]".to_string(),
        ));
    }

    // The frequency reference backs every pair; a missing one is fatal.
    validate_file_readable(&args.af)?;

    // Pre-validate each pair's inputs; a broken pair is skipped, not fatal.
    let mut pairs = Vec::new();
    for vcf in &args.vcfs {
        for model in &args.models {
            match validate_file_readable(vcf).and_then(|_| validate_file_readable(model)) {
                Ok(()) => pairs.push((vcf.clone(), model.clone())),
                Err(e) => {
                    eprintln!(
                        "Skipping {} x {}: {}",
                        display_name(vcf),
                        display_name(model),
                        e
                    );
                }
            }
        }
    }

    if pairs.is_empty() {
        return Err(PrsQcError::InsufficientData(
            "no sample x model pair has readable inputs".to_string(),
        ));
    }

    rayon::ThreadPoolBuilder::new()
        .num_threads(args.num_processes)
        .build_global()
        .map_err(|e| PrsQcError::InvalidConfig(format!("thread pool: {}", e)))?;

    // Evaluate pairs in parallel; each evaluation is independent and
    // stateless.
    let _timer = Timer::new("Evaluating sample x model pairs");
    let outcomes: Vec<_> = pairs
        .par_iter()
        .map(|(vcf, model)| {
            let evaluation = evaluate_confidence(vcf, model, &args.af, &thresholds);
            (vcf, model, evaluation)
        })
        .collect();

    let mut results = Vec::new();
    for (vcf, model, outcome) in outcomes {
        let sample_name = display_name(vcf);
        let model_name = display_name(model);
        match outcome {
            Ok(evaluation) => {
                print!(
                    "{}",
                    format_metrics_table(&sample_name, &model_name, &evaluation.metrics)
                );
                results.push(PairResult {
                    sample: sample_name,
                    model: model_name,
                    confidence: evaluation.score,
                });
            }
            Err(e) => {
                eprintln!("Error evaluating {} x {}: {}", sample_name, model_name, e);
            }
        }
    }

    if results.is_empty() {
        return Err(PrsQcError::InsufficientData(
            "no sample x model pair could be evaluated".to_string(),
        ));
    }

    sort_results(&mut results);

    println!();
    print!("{}", format_results_table(&results));

    let masked: Vec<PairResult> = results
        .iter()
        .filter(|r| r.confidence < args.mask_threshold)
        .cloned()
        .collect();

    if !masked.is_empty() {
        println!("\nScores that should be masked (below confidence threshold):");
        print!("{}", format_results_table(&masked));
    }

    if let Some(output) = &args.output {
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_confidence_results(&results, args.mask_threshold, output)?;
        log::info!("Results written to: {:?}", output);
    }

    log::info!(
        "Evaluated {} of {} pairs ({} masked)",
        results.len(),
        pairs.len(),
        masked.len()
    );

    Ok(())
}

/// Handle application errors and provide user-friendly messages
fn handle_error(error: PrsQcError) -> ! {
    match error {
        PrsQcError::FileNotFound(path) => {
            eprintln!("Error: File not found: {}", path);
            eprintln!("Please check that the file exists and is readable.");
        }
        PrsQcError::InvalidRecord(msg) => {
            eprintln!("Error: Invalid record: {}", msg);
            eprintln!("Please check that your VCF and model files are properly formatted.");
        }
        PrsQcError::InvalidConfig(msg) => {
            eprintln!("Error: Invalid configuration: {}", msg);
            eprintln!("Please check your threshold parameters.");
        }
        PrsQcError::InsufficientData(msg) => {
            eprintln!("Error: Insufficient data: {}", msg);
            eprintln!("Please check that your inputs contain variants and overlap the model.");
        }
        PrsQcError::Io(ref e) => {
            eprintln!("Error: I/O error: {}", e);
            eprintln!("Please check file permissions and disk space.");
        }
        PrsQcError::Csv(ref e) => {
            eprintln!("Error: Table processing error: {}", e);
            eprintln!("Please check the model and frequency reference files.");
        }
    }
    std::process::exit(1);
}

fn main() {
    if let Err(e) = run() {
        handle_error(e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_sort_results_descending() {
        let mut results = vec![
            PairResult {
                sample: "vcf_1".to_string(),
                model: "prs1".to_string(),
                confidence: 0.62,
            },
            PairResult {
                sample: "vcf_2".to_string(),
                model: "prs1".to_string(),
                confidence: 0.98,
            },
            PairResult {
                sample: "vcf_1".to_string(),
                model: "prs2".to_string(),
                confidence: 0.80,
            },
        ];

        sort_results(&mut results);

        assert_eq!(results[0].confidence, 0.98);
        assert_eq!(results[1].confidence, 0.80);
        assert_eq!(results[2].confidence, 0.62);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(
            display_name(Path::new("dat/geno/vcf_1.biallelic.recode.vcf")),
            "vcf_1.biallelic.recode.vcf"
        );
    }

    #[test]
    fn test_pair_evaluation_integration() {
        let mut vcf = NamedTempFile::new().unwrap();
        writeln!(vcf, "##fileformat=VCFv4.2").unwrap();
        writeln!(vcf, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1").unwrap();
        writeln!(
            vcf,
            "chr1\t100\trs1\tA\tT\t50.0\tPASS\tAC=1;MQ=60.0\tGT:AD:DP\t0/1:10,10:20"
        )
        .unwrap();

        let mut af = NamedTempFile::new().unwrap();
        writeln!(af, "ID\tREF\tALT\tALT_FREQS").unwrap();
        writeln!(af, "rs1\tA\tT\t0.3").unwrap();

        let mut model = NamedTempFile::new().unwrap();
        writeln!(model, "variant\tREF\tALT\teffect_weight").unwrap();
        writeln!(model, "rs1\tA\tT\t0.5").unwrap();

        let evaluation = evaluate_confidence(
            vcf.path(),
            model.path(),
            af.path(),
            &QualityThresholds::default(),
        )
        .unwrap();

        assert!((evaluation.score - 1.0).abs() < 1e-12);
    }
}
