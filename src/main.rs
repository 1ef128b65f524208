use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use trash_survey::{
    AxisScale, Dimension, MissingEntryPolicy, Panel, SurveyConfig, SurveyDataset, ViewSelectors,
};

#[derive(Parser, Debug)]
#[command(
    name = "trash-survey",
    about = "Build one pollution-survey dashboard panel and print it as JSON"
)]
struct Args {
    /// Directory holding the survey CSV files
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Panel to build (trash_amount, toxicity, biodiversity, trash_type_histogram,
    /// location_histogram, biodiversity_impact, observations)
    #[arg(long, default_value = "trash_amount")]
    panel: String,

    /// Grouping dimension: location or ecosystem_impacted
    #[arg(long, default_value = "location")]
    dimension: String,

    /// Value axis scale: linear or log
    #[arg(long, default_value = "linear")]
    scale: String,

    /// Swap the category and value axes
    #[arg(long)]
    transpose: bool,

    /// Field delimiter of the input files
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Fail instead of dropping entry-selection rows with missing fields
    #[arg(long)]
    reject_missing_entries: bool,

    /// Print the panels available for the data directory and exit
    #[arg(long)]
    list_panels: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let delimiter =
        u8::try_from(args.delimiter).context("delimiter must be a single-byte character")?;
    let policy = if args.reject_missing_entries {
        MissingEntryPolicy::Reject
    } else {
        MissingEntryPolicy::Drop
    };
    let config = SurveyConfig::discover(&args.data_dir)
        .with_delimiter(delimiter)
        .with_missing_entries(policy);

    let dataset = SurveyDataset::load(&config)
        .with_context(|| format!("loading survey data from {}", args.data_dir.display()))?;

    if args.list_panels {
        for panel in dataset.available_panels() {
            println!("{panel}");
        }
        return Ok(());
    }

    let panel: Panel = args.panel.parse()?;
    let selectors = ViewSelectors::new(
        args.dimension.parse::<Dimension>()?,
        args.transpose,
        args.scale.parse::<AxisScale>()?,
    );
    info!(%panel, ?selectors, "building panel");

    let payload = dataset.render(panel, &selectors)?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}
