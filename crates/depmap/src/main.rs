use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use depmap::{
    analyze_project, AnalysisOptions, AnalysisStage, ProgressUpdate, QualityGrade, Severity,
};

#[derive(Parser, Debug)]
#[command(name = "depmap", version, about = "Five-level dependency analysis for Python source trees")]
struct Cli {
    /// Project root to analyse.
    path: PathBuf,

    /// Write the JSON result here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Additional gitignore-style exclude patterns (repeatable).
    #[arg(short, long = "exclude")]
    exclude: Vec<String>,

    /// Worker pool size; 1 forces sequential extraction.
    #[arg(long)]
    max_workers: Option<usize>,

    /// Disable the incremental-analysis cache.
    #[arg(long)]
    no_cache: bool,

    /// Disable complexity/coupling aggregation.
    #[arg(long)]
    no_quality_metrics: bool,

    /// Disable the large-tree streaming path.
    #[arg(long)]
    no_streaming: bool,

    /// Memory ceiling for streamed analysis, in megabytes.
    #[arg(long, default_value_t = 1024)]
    max_memory_mb: usize,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut options = AnalysisOptions::default();
    options.exclude_patterns.extend(cli.exclude.iter().cloned());
    if let Some(workers) = cli.max_workers {
        options.max_workers = workers.max(1);
    }
    options.enable_caching = !cli.no_cache;
    options.enable_quality_metrics = !cli.no_quality_metrics;
    options.enable_performance_optimization = !cli.no_streaming;
    options.max_memory_mb = cli.max_memory_mb;

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {percent:>3}% {msg}")
            .context("invalid progress template")?,
    );
    let progress = bar.clone();
    let sink = move |update: &ProgressUpdate| {
        progress.set_position((update.progress * 100.0) as u64);
        match update.stage {
            AnalysisStage::Extracting => {
                if let (Some(done), Some(total)) = (update.files_processed, update.total_files) {
                    progress.set_message(format!("extracting {done}/{total}"));
                } else {
                    progress.set_message("extracting");
                }
            }
            stage => progress.set_message(stage.to_string()),
        }
    };

    let result = analyze_project(&cli.path, options, &sink);
    bar.finish_and_clear();
    let result = result.with_context(|| format!("analysis of {} failed", cli.path.display()))?;

    let counts = result.entity_counts();
    eprintln!(
        "{} {} in {:.2}s",
        "analyzed".green().bold(),
        result.project_info.name.bold(),
        result.project_info.analysis_duration_seconds
    );
    eprintln!(
        "  {} packages, {} modules, {} classes, {} methods, {} fields",
        counts.packages, counts.modules, counts.classes, counts.methods, counts.fields
    );
    eprintln!("  {} relationships", counts.relationships);

    if let Some(worst) = result.quality_metrics.iter().map(|q| q.quality_grade).max() {
        let graded = result.quality_metrics.len();
        let line = format!("{graded} entities graded, worst grade {worst:?}");
        if worst >= QualityGrade::D {
            eprintln!("  {}", line.yellow());
        } else {
            eprintln!("  {line}");
        }
    }

    if result.cycles.is_empty() {
        eprintln!("  {}", "no cyclic dependencies".green());
    } else {
        let high = result
            .cycles
            .iter()
            .filter(|c| c.severity == Severity::High)
            .count();
        let line = format!("{} cyclic dependencies ({high} high severity)", result.cycles.len());
        if high > 0 {
            eprintln!("  {}", line.red().bold());
        } else {
            eprintln!("  {}", line.yellow());
        }
        for cycle in &result.cycles {
            eprintln!("    {} {}", severity_tag(cycle.severity), cycle.description);
        }
    }
    for warning in &result.warnings {
        eprintln!("  {} {warning}", "warning:".yellow());
    }

    let json = if cli.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    match &cli.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("cannot write {}", path.display()))?;
            eprintln!("  result written to {}", path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}

fn severity_tag(severity: Severity) -> colored::ColoredString {
    match severity {
        Severity::High => "high".red().bold(),
        Severity::Medium => "medium".yellow(),
        Severity::Low => "low".normal(),
    }
}
