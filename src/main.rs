//! tiffany CLI - labeled satellite imagery datasets

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use tiffany::batch::{read_coordinates, BatchOutcome, BatchProgress, BatchRunner};
use tiffany::config::{
    Credentials, PipelineOptions, DEFAULT_ENV_FILE, DEFAULT_OUTPUT_ROOT, DEFAULT_ZOOM,
};
use tiffany::geometry::{Coordinate, ImageSize, Srs};
use tiffany::pipeline::{ItemPipeline, PipelineOutcome};
use tiffany::provider::StaticMapsClient;
use tiffany::raster::{GeoTiffCompression, LocalRasterStore};
use tiffany::vector::LocalVectorStore;
use tiffany::Error;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "tiffany")]
#[command(
    author,
    version,
    about = "Fetch, georeference and label satellite imagery",
    long_about = None
)]
#[command(subcommand_negates_reqs = true, allow_negative_numbers = true)]
struct Cli {
    /// Latitude of the image center, in degrees
    #[arg(required = true)]
    latitude: Option<String>,

    /// Longitude of the image center, in degrees
    #[arg(required = true)]
    longitude: Option<String>,

    #[command(flatten)]
    options: GlobalOptions,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Args)]
struct GlobalOptions {
    /// Tile zoom level
    #[arg(short, long, global = true, default_value_t = DEFAULT_ZOOM)]
    zoom: u8,

    /// Image size as LENGTH,WIDTH in pixels
    #[arg(short, long, global = true, default_value = "400,400")]
    size: ImageSize,

    /// Output root directory
    #[arg(long, global = true, default_value = DEFAULT_OUTPUT_ROOT)]
    path: PathBuf,

    /// Label source to clip to each image (ESRI Shapefile or GeoJSON)
    #[arg(long, global = true, value_name = "PATH")]
    with_labels: Option<PathBuf>,

    /// Keep the plain image only (no georeferencing, reprojection or labels)
    #[arg(long, global = true)]
    without_reference: bool,

    /// Re-fetch even if the image already exists
    #[arg(long, global = true)]
    force: bool,

    /// Reference system of the georeferenced output
    #[arg(long, global = true, default_value = "epsg:4326")]
    target_srs: Srs,

    /// GeoTIFF compression
    #[arg(long, global = true, value_enum, default_value_t = CompressionArg::None)]
    compression: CompressionArg,

    /// Environment file holding API_KEY
    #[arg(short, long, global = true, default_value = DEFAULT_ENV_FILE)]
    env: PathBuf,

    /// Continue a batch past failed items and report them at the end
    #[arg(long, global = true)]
    keep_going: bool,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CompressionArg {
    /// No compression
    None,
    /// LZW
    Lzw,
    /// Deflate (zlib)
    Deflate,
}

impl From<CompressionArg> for GeoTiffCompression {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::None => Self::None,
            CompressionArg::Lzw => Self::Lzw,
            CompressionArg::Deflate => Self::Deflate,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Process every coordinate of a CSV file
    Batch {
        /// CSV of latitude,longitude rows
        input: PathBuf,

        /// Discard the first row of the file
        #[arg(long)]
        skip_header_row: bool,
    },
}

impl GlobalOptions {
    fn pipeline_options(&self) -> PipelineOptions {
        let mut options = PipelineOptions::default()
            .with_zoom(self.zoom)
            .with_size(self.size)
            .with_output_root(&self.path)
            .with_georeference(!self.without_reference)
            .with_force(self.force)
            .with_target_srs(self.target_srs)
            .with_compression(self.compression.into());
        if let Some(labels) = &self.with_labels {
            options = options.with_labels(labels);
        }
        options
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")
}

type Pipeline = ItemPipeline<StaticMapsClient, LocalRasterStore, LocalVectorStore>;

fn build_pipeline(options: PipelineOptions, env: &Path) -> Result<Pipeline> {
    // Reject conflicting options before the credential is even looked up.
    options.validate()?;
    let credentials = Credentials::load(env)?;
    let provider =
        StaticMapsClient::new(credentials.api_key()).context("Failed to build HTTP client")?;
    let rasters = LocalRasterStore::new().with_compression(options.compression);
    Ok(ItemPipeline::new(options, provider, rasters, LocalVectorStore::new())?)
}

/// Progress bar over batch items.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Result<Self> {
        let bar = ProgressBar::hidden();
        let template = "{bar:40.green/white} {pos}/{len} [{elapsed_precise}] {msg}";
        bar.set_style(ProgressStyle::with_template(template).context("Invalid progress template")?);
        Ok(Self { bar })
    }
}

impl BatchProgress for BarProgress {
    fn start(&mut self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    }

    fn item(
        &mut self,
        _index: usize,
        coordinate: &Coordinate,
        result: std::result::Result<&PipelineOutcome, &Error>,
    ) {
        let status = match result {
            Ok(outcome) if outcome.skipped => "skipped",
            Ok(_) => "done",
            Err(_) => "failed",
        };
        self.bar.set_message(format!(
            "{},{} {status}",
            coordinate.latitude(),
            coordinate.longitude()
        ));
        self.bar.inc(1);
    }

    fn finish(&mut self, _outcome: &BatchOutcome) {
        self.bar.finish_and_clear();
    }
}

impl Drop for BarProgress {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.abandon();
        }
    }
}

// ─── Main ───────────────────────────────────────────────────────────────

fn run(cli: Cli) -> Result<()> {
    setup_logging(cli.options.verbose)?;
    let options = cli.options.pipeline_options();

    match cli.command {
        Some(Commands::Batch {
            input,
            skip_header_row,
        }) => {
            let runner = BatchRunner::new(build_pipeline(options, &cli.options.env)?)
                .with_keep_going(cli.options.keep_going);
            let coordinates = read_coordinates(&input, skip_header_row)?;

            let mut progress = BarProgress::new()?;
            let outcome = runner.run(&coordinates, &mut progress)?;
            info!(
                "{} coordinates: {} skipped, {} failed",
                outcome.total, outcome.skipped_count, outcome.failed_count
            );
        }
        None => {
            let (Some(latitude), Some(longitude)) = (cli.latitude, cli.longitude) else {
                anyhow::bail!("requires LATITUDE and LONGITUDE");
            };
            let pipeline = build_pipeline(options, &cli.options.env)?;
            let coordinate = Coordinate::parse(&latitude, &longitude)?;
            let outcome = pipeline.run(&coordinate)?;
            if outcome.skipped {
                info!(path = %outcome.artifacts.image.display(), "already fetched");
            } else {
                info!(stem = %outcome.artifacts.stem, "done");
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
