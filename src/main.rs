use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use param_autofill::config::FillConfiguration;
use param_autofill::error::FillError;
use param_autofill::export::{export_csv, export_json, export_report};
use param_autofill::fill::FillOrchestrator;
use param_autofill::host::{load_snapshot, save_snapshot, MemoryModel};

#[derive(Parser, Debug)]
#[command(name = "param-autofill")]
#[command(about = "Parameter Auto-Fill - fill level, room and group parameters of a model")]
#[command(version)]
struct Args {
    /// Path to the model snapshot (JSON)
    #[arg(required = true)]
    model: PathBuf,

    /// Fill configuration (TOML)
    #[arg(long, short, value_name = "FILE")]
    config: PathBuf,

    /// Only estimate what would be filled
    #[arg(long)]
    preview: bool,

    /// Write the text report; a timestamp is added to the file name
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Export skipped elements to CSV
    #[arg(long, value_name = "FILE")]
    csv: Option<PathBuf>,

    /// Export the processing summary to JSON
    #[arg(long, value_name = "FILE")]
    json: Option<PathBuf>,

    /// Save the updated model snapshot
    #[arg(long, short, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "param_autofill=info",
        1 => "param_autofill=debug",
        _ => "param_autofill=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn save_output(model: &MemoryModel, args: &Args) -> Result<()> {
    if let Some(output) = &args.output {
        save_snapshot(model, output)?;
        println!("Saved model: {}", output.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut model = load_snapshot(&args.model)?;
    let config = FillConfiguration::load(&args.config)?;
    info!(model = %args.model.display(), config = %args.config.display(), "loaded");

    if args.preview {
        let preview = FillOrchestrator::new(&mut model).preview_fill(&config);
        print!("{preview}");
        return Ok(());
    }

    let outcome = FillOrchestrator::new(&mut model)
        .execute_fill(&config, |processed, message| info!(processed, "{message}"));

    let summary = match outcome {
        Ok(summary) => summary,
        Err(err @ FillError::ModeAborted { .. }) => {
            if args.output.is_some() {
                warn!("saving modes committed before the failure");
            }
            save_output(&model, &args)?;
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };
    print!("{summary}");

    if let Some(report_path) = &args.report {
        let written = export_report(&summary, report_path)?;
        println!("Report: {}", written.display());
    }

    if let Some(csv_path) = &args.csv {
        export_csv(&summary, csv_path)?;
        println!("Exported to CSV: {}", csv_path.display());
    }

    if let Some(json_path) = &args.json {
        export_json(&summary, json_path)?;
        println!("Exported to JSON: {}", json_path.display());
    }

    save_output(&model, &args)
}
