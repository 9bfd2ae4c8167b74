use anyhow::{Context, Result};
use clap::Parser;
use omalign_core::benchmark::{TruthSet, DEFAULT_TOLERANCE};
use omalign_core::io::{CmapReader, XmapWriter};
use omalign_core::{
    MoleculeId, MultiPassCoordinator, OutputKind, OutputMode, OutputSet, Position, ProgressObserver, RecordStats,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod config;
mod diagnostics;
mod error;
mod progress;

use config::Config;
use diagnostics::DiagnosticsWriter;
use error::{format_error_with_suggestions, CliError};
use progress::ProgressBarObserver;

#[derive(Parser, Debug)]
#[command(name = "omalign")]
#[command(about = "omalign - cross-correlation optical map aligner")]
#[command(version)]
#[command(long_about = "
omalign aligns optical maps (CMAP) against reference maps. Seeds come from
an FFT cross-correlation of binarised label vectors, are refined at a finer
resolution, and the label pairs around each seed are scored, split into
segments and chained. Unaligned query ends get a second pass.

Examples:
  omalign -r reference.cmap -q molecules.cmap -o alignments.xmap
  omalign -r reference.cmap -q molecules.cmap -o run.xmap -m all -c 16
  omalign -r reference.cmap -q simulated.cmap -o run.xmap --benchmark simulated.sdata
  omalign --print-config > omalign.toml
")]
pub struct Cli {
    /// Reference maps (CMAP, optionally gzipped)
    #[arg(short = 'r', long, required_unless_present = "print_config")]
    pub reference: Option<PathBuf>,

    /// Query maps (CMAP, optionally gzipped)
    #[arg(short = 'q', long, required_unless_present = "print_config")]
    pub query: Option<PathBuf>,

    /// Output XMAP; multi-file modes derive their file names from it
    #[arg(short = 'o', long, required_unless_present = "print_config")]
    pub output: Option<PathBuf>,

    /// Output mode: best, separate, joined or all
    #[arg(short = 'm', long)]
    pub output_mode: Option<OutputMode>,

    /// Seeding resolution in bp per vector element [default: 1400]
    #[arg(short = 'R', long)]
    pub primary_resolution: Option<u32>,

    /// Seeding blur radius in elements [default: 2]
    #[arg(short = 'B', long)]
    pub primary_blur: Option<u32>,

    /// Seeds kept per orientation [default: 5]
    #[arg(short = 'p', long)]
    pub peaks_count: Option<usize>,

    /// Minimum distance between seeds in bp [default: 20000]
    #[arg(short = 'd', long)]
    pub min_peak_distance: Option<Position>,

    /// Refinement resolution in bp per vector element [default: 200]
    #[arg(short = 's', long)]
    pub secondary_resolution: Option<u32>,

    /// Refinement blur radius in elements [default: 2]
    #[arg(short = 'b', long)]
    pub secondary_blur: Option<u32>,

    /// Reference margin around each seed in bp [default: 16000]
    #[arg(short = 'M', long)]
    pub secondary_margin: Option<Position>,

    /// Minimum correlation of a refined peak [default: 15]
    #[arg(short = 't', long)]
    pub peak_height_threshold: Option<f64>,

    /// Maximum distance between paired labels in bp [default: 1000]
    #[arg(short = 'D', long)]
    pub max_pair_distance: Option<Position>,

    /// Score of a pair at distance zero [default: 800]
    #[arg(short = 'P', long)]
    pub perfect_match_score: Option<f64>,

    /// Score lost per bp of pair distance [default: 1.0]
    #[arg(short = 'x', long)]
    pub distance_penalty_multiplier: Option<f64>,

    /// Score of an unpaired label [default: -100]
    #[arg(short = 'u', long, allow_negative_numbers = true)]
    pub unmatched_penalty: Option<f64>,

    /// Minimum segment score [default: 1000]
    #[arg(short = 'S', long)]
    pub min_score: Option<f64>,

    /// Drop below the best running score that ends a segment [default: 1200]
    #[arg(short = 'k', long)]
    pub break_segment_threshold: Option<f64>,

    /// Largest reference gap bridged when joining passes, in bp [default: 100000]
    #[arg(short = 'X', long)]
    pub max_difference: Option<Position>,

    /// Only use these reference ids (comma separated)
    #[arg(short = 'e', long, value_delimiter = ',')]
    pub reference_ids: Vec<MoleculeId>,

    /// Only align these query ids (comma separated)
    #[arg(short = 'f', long, value_delimiter = ',')]
    pub query_ids: Vec<MoleculeId>,

    /// Number of worker threads [default: all cores]
    #[arg(short = 'c', long)]
    pub cpus: Option<usize>,

    /// Do not draw a progress bar
    #[arg(short = 'n', long)]
    pub disable_progress_bar: bool,

    /// Write pipeline events as JSON lines to this file
    #[arg(short = 'g', long)]
    pub diagnostics: Option<PathBuf>,

    /// Compare the alignments with a truth file (XMAP or SDATA)
    #[arg(short = 'T', long)]
    pub benchmark: Option<PathBuf>,

    /// Configuration file path [default: ./omalign.toml when present]
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,

    /// Verbose output
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(long)]
    pub quiet: bool,
}

impl Cli {
    /// Command-line values take precedence over the configuration file.
    fn apply_overrides(&self, config: &mut Config) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        set(&mut config.output.mode, &self.output_mode);
        set(&mut config.seeding.primary_resolution, &self.primary_resolution);
        set(&mut config.seeding.primary_blur, &self.primary_blur);
        set(&mut config.seeding.peaks_count, &self.peaks_count);
        set(&mut config.seeding.min_peak_distance, &self.min_peak_distance);
        set(&mut config.refinement.secondary_resolution, &self.secondary_resolution);
        set(&mut config.refinement.secondary_blur, &self.secondary_blur);
        set(&mut config.refinement.secondary_margin, &self.secondary_margin);
        set(&mut config.refinement.peak_height_threshold, &self.peak_height_threshold);
        set(&mut config.pairing.max_pair_distance, &self.max_pair_distance);
        set(&mut config.scoring.perfect_match_score, &self.perfect_match_score);
        set(&mut config.scoring.distance_penalty_multiplier, &self.distance_penalty_multiplier);
        set(&mut config.scoring.unmatched_penalty, &self.unmatched_penalty);
        set(&mut config.scoring.min_score, &self.min_score);
        set(&mut config.scoring.break_segment_threshold, &self.break_segment_threshold);
        set(&mut config.output.max_difference, &self.max_difference);
        set(&mut config.general.cpus, &self.cpus);
        if self.disable_progress_bar {
            config.general.disable_progress_bar = true;
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn id_filter(ids: &[MoleculeId]) -> Option<HashSet<MoleculeId>> {
    (!ids.is_empty()).then(|| ids.iter().copied().collect())
}

/// File for one output table: the output path itself for single-table
/// modes, `<stem><suffix>.xmap` next to it otherwise.
fn output_path(output: &Path, kind: OutputKind, multi_file: bool) -> PathBuf {
    if !multi_file {
        return output.to_path_buf();
    }
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "omalign".to_string());
    output.with_file_name(format!("{}{}.xmap", stem, kind.file_suffix()))
}

fn write_outputs(outputs: &OutputSet, output: &Path, reference: &Path, query: &Path) -> Result<()> {
    let multi_file = outputs.is_multi_file();
    let reference_source = reference.display().to_string();
    let query_source = query.display().to_string();

    for (kind, records) in &outputs.outputs {
        let path = output_path(output, *kind, multi_file);
        let mut writer = XmapWriter::create(&path, &reference_source, &query_source)
            .map_err(|e| CliError::writing(&path, e))?;
        writer.write_all(records).map_err(|e| CliError::writing(&path, e))?;
        writer.finish().map_err(|e| CliError::writing(&path, e))?;

        let stats = RecordStats::compute(records);
        log::info!(
            "Wrote {} records to {} ({} forward, {} reverse, {} residual, mean confidence {:.1})",
            stats.total_records,
            path.display(),
            stats.forward_count,
            stats.reverse_count,
            stats.residual_count,
            stats.mean_confidence
        );
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).map_err(|e| CliError::config(format!("{:#}", e)))?;
    cli.apply_overrides(&mut config);

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let (Some(reference_path), Some(query_path), Some(output)) = (&cli.reference, &cli.query, &cli.output) else {
        return Err(CliError::invalid_parameter("--reference, --query and --output are required").into());
    };

    let params = config.alignment_params();
    params
        .validate()
        .map_err(|e| CliError::invalid_parameter(e.to_string()))?;
    if config.general.cpus == 0 {
        return Err(CliError::invalid_parameter("--cpus must be at least 1").into());
    }

    rayon::ThreadPoolBuilder::new()
        .num_threads(config.general.cpus)
        .build_global()
        .context("Failed to set thread count")?;

    let references = CmapReader::read_path(reference_path, id_filter(&cli.reference_ids).as_ref())
        .map_err(|e| CliError::reading(reference_path, e))?;
    let queries = CmapReader::read_path(query_path, id_filter(&cli.query_ids).as_ref())
        .map_err(|e| CliError::reading(query_path, e))?;
    if references.is_empty() || queries.is_empty() {
        log::warn!(
            "Nothing to align: {} references, {} queries",
            references.len(),
            queries.len()
        );
    }

    let mode = config.output.mode;
    let mut coordinator = MultiPassCoordinator::new(&params, mode).map_err(|e| CliError::invalid_parameter(e.to_string()))?;

    let diagnostics = match &cli.diagnostics {
        Some(path) => {
            let writer = Arc::new(DiagnosticsWriter::create(path)?);
            coordinator.add_observer(writer.clone());
            Some(writer)
        }
        None => None,
    };

    log::info!(
        "Aligning {} queries against {} references ({} mode, {} threads)",
        queries.len(),
        references.len(),
        mode,
        config.general.cpus
    );
    let progress = ProgressBarObserver::new(!config.general.disable_progress_bar && !cli.quiet);
    let outputs = coordinator.run(&references, &queries, Some(&progress as &dyn ProgressObserver));

    write_outputs(&outputs, output, reference_path, query_path)?;

    if let Some(writer) = diagnostics {
        writer.finish()?;
    }

    if let Some(truth_path) = &cli.benchmark {
        let truth = TruthSet::read_path(truth_path).map_err(|e| CliError::reading(truth_path, e))?;
        let Some((kind, records)) = outputs.outputs.first() else {
            return Ok(());
        };
        let summary = truth.evaluate(records, DEFAULT_TOLERANCE);
        log::info!(
            "Benchmark ({:?} table): {}/{} correct, precision {:.3}, recall {:.3}",
            kind,
            summary.correct,
            summary.total,
            summary.precision,
            summary.recall
        );
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    if let Err(err) = run(cli) {
        match err.downcast_ref::<CliError>() {
            Some(cli_err) => eprintln!("Error: {}", format_error_with_suggestions(cli_err)),
            None => eprintln!("Error: {:#}", err),
        }
        std::process::exit(error::exit_code(&err));
    }
}
