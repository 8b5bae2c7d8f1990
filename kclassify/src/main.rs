use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use kclassify::batching::{self, report, Batcher, BatcherConfig, InputOutcome, RunSummary};
use kclassify::classification::LabelTable;
use kclassify::codec::TensorLayout;
use kclassify::config::AppConfig;
use kclassify::preprocessing::{ChannelOrder, ResizeFilter};
use kclassify::request::InputMode;
use kclassify::transport::{HttpTransport, Transport};
use kclassify::{observability, ClassifyError, Pipeline};
use tracing::{info, warn};

/// Classify images with a model served behind a KServe v2 endpoint
#[derive(Parser, Debug)]
#[command(name = "kclassify", version)]
struct Args {
    /// YAML configuration file; flags override its values
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Inference service address, e.g. http://localhost:8000
    #[arg(short, long)]
    address: Option<String>,

    #[arg(short = 'm', long)]
    model_name: Option<String>,

    /// Model version; 0 selects the latest
    #[arg(long)]
    model_version: Option<u64>,

    #[arg(long)]
    input_name: Option<String>,

    #[arg(long)]
    output_name: Option<String>,

    /// Send the encoded file or a locally preprocessed tensor
    #[arg(long, value_enum)]
    input_mode: Option<InputMode>,

    /// Image to classify
    #[arg(
        short,
        long,
        value_name = "FILE",
        required_unless_present = "images_list",
        conflicts_with = "images_list"
    )]
    image: Option<PathBuf>,

    /// Expected label index for --image
    #[arg(long, requires = "image")]
    expected: Option<usize>,

    /// File with one "<path> [expected label index]" per line
    #[arg(long, value_name = "FILE")]
    images_list: Option<PathBuf>,

    /// Label file, one label per line
    #[arg(short, long, value_name = "FILE")]
    labels: PathBuf,

    /// Per-request deadline in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Maximum requests in flight for --images-list
    #[arg(long)]
    concurrency: Option<usize>,

    /// Number of predictions to print per image
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    #[arg(long)]
    size: Option<u32>,

    #[arg(long, value_enum)]
    layout: Option<TensorLayout>,

    #[arg(long, value_enum)]
    channel_order: Option<ChannelOrder>,

    #[arg(long, value_enum)]
    filter: Option<ResizeFilter>,

    /// Print one JSON object per image instead of text
    #[arg(long)]
    json: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(address) = &self.address {
            config.service.address = address.clone();
        }
        if let Some(timeout) = self.timeout_ms {
            config.service.timeout_ms = timeout;
        }
        if let Some(concurrency) = self.concurrency {
            config.service.concurrency = concurrency;
        }
        if let Some(name) = &self.model_name {
            config.model.name = name.clone();
        }
        if let Some(version) = self.model_version {
            config.model.version = Some(version);
        }
        if let Some(name) = &self.input_name {
            config.model.input_name = name.clone();
        }
        if let Some(name) = &self.output_name {
            config.model.output_name = name.clone();
        }
        if let Some(mode) = self.input_mode {
            config.model.input_mode = mode;
        }
        if let Some(k) = self.top_k {
            config.model.top_k = k;
        }
        if let Some(size) = self.size {
            config.preprocessing.size = size;
        }
        if let Some(layout) = self.layout {
            config.preprocessing.layout = layout;
        }
        if let Some(order) = self.channel_order {
            config.preprocessing.channel_order = order;
        }
        if let Some(filter) = self.filter {
            config.preprocessing.filter = filter;
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // 1. Init
    observability::init_tracing(args.verbose);

    // 2. Load Config
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    let labels = LabelTable::load(&args.labels).map_err(|e| {
        ClassifyError::Config(format!(
            "cannot load labels from {}: {}",
            args.labels.display(),
            e
        ))
    })?;
    info!(
        "Loaded {} labels from {}",
        labels.len(),
        args.labels.display()
    );

    // 3. Connect
    let transport = HttpTransport::new(&config.service.address, config.request_timeout())?;
    if !transport.is_live().await {
        warn!("{} did not report live, trying anyway", transport.url());
    }
    let transport: Arc<dyn Transport> = Arc::new(transport);
    let pipeline = Arc::new(Pipeline::new(&config, Arc::new(labels), transport)?);

    // 4. Classify
    if let Some(image) = &args.image {
        let start = Instant::now();
        let result = pipeline.classify_file(image, args.expected).await;
        let outcome = InputOutcome {
            index: 0,
            path: image.clone(),
            expected: args.expected,
            latency: start.elapsed(),
            result,
        };
        let outcomes = [outcome];
        print_outcomes(&pipeline, &outcomes, args.json)?;
        return Ok(exit_code(&outcomes));
    }

    let list = args
        .images_list
        .as_deref()
        .context("either --image or --images-list is required")?;
    let entries = batching::load_image_list(list)?;
    info!(
        "Classifying {} images with up to {} in flight",
        entries.len(),
        config.service.concurrency
    );

    let batcher = Batcher::new(
        Arc::clone(&pipeline),
        BatcherConfig {
            max_in_flight: config.service.concurrency,
        },
    );
    let start = Instant::now();
    let outcomes = batcher.run(entries).await;
    let summary = RunSummary::from_outcomes(&outcomes, start.elapsed());

    print_outcomes(&pipeline, &outcomes, args.json)?;
    if args.json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!("{summary}");
    }

    Ok(exit_code(&outcomes))
}

fn print_outcomes(pipeline: &Pipeline, outcomes: &[InputOutcome], json: bool) -> Result<()> {
    for outcome in outcomes {
        if json {
            println!("{}", report::render_json(outcome)?);
        } else {
            println!("{}", report::render_text(outcome, pipeline.labels()));
        }
    }
    Ok(())
}

// Failures were already printed with the results
fn exit_code(outcomes: &[InputOutcome]) -> ExitCode {
    if report::all_succeeded(outcomes) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
