use anyhow::Context;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use workflow::config::ScenarioConfig;
use workflow::runner::Runner;

mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Offline driver for the spike localization core")]
struct Args {
    /// Load a scenario config from YAML; CLI flags below are ignored then
    #[arg(long)]
    scenario: Option<PathBuf>,
    /// Localization method: peak_channel, center_of_mass, monopolar_triangulation
    #[arg(long, default_value = "monopolar_triangulation")]
    method: String,
    #[arg(long, default_value_t = 50)]
    spikes: usize,
    #[arg(long, default_value_t = 1)]
    workers: usize,
    #[arg(long, default_value_t = 10_000)]
    chunk_size: usize,
    /// Write the run summary as JSON
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = if let Some(path) = args.scenario {
        ScenarioConfig::load(path)?
    } else {
        ScenarioConfig::from_args(&args.method, args.spikes, args.workers, args.chunk_size)
    };

    let runner = Runner::new(config);
    let summary = runner.execute()?;

    println!(
        "Offline run -> method {}, peaks {}, fallbacks {}, mean planar error {:.2} um",
        summary.method, summary.num_peaks, summary.fallback_count, summary.mean_planar_error_um
    );

    if let Some(path) = args.report {
        let json = serde_json::to_string_pretty(&summary)?;
        fs::write(&path, json).with_context(|| format!("writing report {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    Ok(())
}
