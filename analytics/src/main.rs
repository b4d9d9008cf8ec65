use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

use analytics::helper_functions::dataframe_to_csv;
use analytics::render::render_figure;
use analytics::{load_tables, AnalysisKind, DashboardConfig, VisualizationResult};
use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "yt-dashboard")]
#[command(about = "Charts, metrics and insights for the top YouTube channels")]
struct Cli {
    /// Analysis to run, by menu name or slug (repeatable)
    #[arg(short, long = "analysis")]
    analyses: Vec<AnalysisKind>,

    /// Run every analysis
    #[arg(long)]
    all: bool,

    /// Also run the regression for analyses that support it
    #[arg(long)]
    predict: bool,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// List the available analyses and exit
    #[arg(long)]
    list: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if cli.list {
        for kind in AnalysisKind::ALL {
            let prediction = if kind.supports_prediction() { " (prediction)" } else { "" };
            println!("{:<24} {}{}", kind.slug(), kind.label(), prediction);
        }
        return Ok(());
    }

    let kinds: Vec<AnalysisKind> = if cli.all {
        AnalysisKind::ALL.to_vec()
    } else {
        cli.analyses.clone()
    };
    if kinds.is_empty() {
        bail!("nothing to do: pass --analysis <name>, --all or --list");
    }

    let config = DashboardConfig::load(cli.config.as_deref())?;
    create_dir_all(&config.output_dir)
        .with_context(|| format!("creating {}", config.output_dir.display()))?;
    let tables = load_tables(&config);

    for kind in kinds {
        let result = kind.run(&tables, &config.style, &config.clustering);
        println!("\n=== {} ===", kind.title());
        report(&config.output_dir, &kind.slug(), &result)?;

        if cli.predict {
            match kind.run_prediction(&tables, &config.style, &config.clustering) {
                Some(prediction) => {
                    println!("\n--- {}: prediction ---", kind.label());
                    report(&config.output_dir, &format!("{}_prediction", kind.slug()), &prediction)?;
                }
                None => info!("{} has no prediction mode", kind.label()),
            }
        }
    }
    Ok(())
}

/// Print metrics and insights, then write chart, figure JSON and any extra table.
fn report(output_dir: &Path, stem: &str, result: &VisualizationResult) -> Result<()> {
    if result.is_empty() {
        warn!("{}: no data available for this analysis", stem);
        println!("No data available.");
        return Ok(());
    }

    for (label, value) in result.metrics.iter() {
        println!("{:<40} {}", label, value);
    }
    for insight in &result.insights {
        println!("- {}", insight);
    }

    if let Some(figure) = &result.figure {
        let json_path = output_dir.join(format!("{}.json", stem));
        let json = serde_json::to_string_pretty(figure)?;
        std::fs::write(&json_path, json)
            .with_context(|| format!("writing {}", json_path.display()))?;

        let png_path = output_dir.join(format!("{}.png", stem));
        if let Err(e) = render_figure(figure, &png_path) {
            error!("Could not render {}: {:#}", png_path.display(), e);
        }
    }

    if let Some(extra) = &result.extra_data {
        let csv_path = output_dir.join(format!("{}.csv", stem));
        let mut extra = extra.clone();
        dataframe_to_csv(&mut extra, &csv_path)
            .with_context(|| format!("writing {}", csv_path.display()))?;
        info!("Wrote {}", csv_path.display());
    }
    Ok(())
}
