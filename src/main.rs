//! AdScope - weekly competitor video-ad analysis
//!
//! Analyzes the week's top-ranked competitor video creatives with a
//! multimodal model, synthesizes a strategic summary, tracks rank movement
//! week over week and archives each run as a dated snapshot.
//!
//! Exit codes:
//!   0 - Success (degraded items allowed unless --fail-on-degraded is set)
//!   1 - Runtime error (archive conflict, inference outage, config, I/O, etc.)
//!   2 - Degraded items present and --fail-on-degraded set

mod analysis;
mod archive;
mod cli;
mod config;
mod inference;
mod models;
mod pipeline;
mod report;
mod retry;
mod source;
mod trend;

use analysis::aggregator::generate_summary_text;
use analysis::{AggregationSynthesizer, AnalysisCache, TaskDispatcher, VideoAnalyzer};
use anyhow::{bail, Context, Result};
use archive::ArchiveStore;
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use inference::{GeminiClient, InferenceClient, MockInferenceClient};
use pipeline::Pipeline;
use report::{DigestMetadata, RunDigest};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("AdScope v{}", env!("CARGO_PKG_VERSION"));
    debug!(
        input = ?args.input,
        date = ?args.date,
        mock = args.mock,
        "arguments parsed"
    );

    match run_weekly(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .adscope.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {CONFIG_FILE} already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {CONFIG_FILE}"))?;

    println!("✅ Created {CONFIG_FILE} with default settings.");
    println!("   Set GEMINI_API_KEY in the environment or a .env file; keys never go in the config.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run one weekly analysis. Returns the exit code (0 or 2).
async fn run_weekly(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    let Some(input) = args.input.as_deref() else {
        bail!("No input file given");
    };
    let run_date = args.run_date();

    // Step 1: Load this week's items
    println!("📥 Loading videos: {}", input.display());
    let items = source::load_items(input, config.general.max_items)?;

    // Step 2: Set up inference
    let (client, inference_label) = build_client(&args, &config)?;
    println!("🤖 Inference: {}", inference_label);
    println!("   Concurrency: {}", config.general.concurrency);
    println!("   Task timeout: {}s", config.general.task_timeout_seconds);

    let store = ArchiveStore::open(&config.archive.dir)?;
    let mut cache = AnalysisCache::load(&config.archive.cache_path());
    println!("🗄️  Archive: {}", store.dir().display());
    if !cache.is_empty() {
        println!("   Cached analyses: {}", cache.len());
    }

    let retry = config.retry_policy();
    let analyzer = Arc::new(VideoAnalyzer::new(client.clone(), retry));
    let dispatcher = TaskDispatcher::new(analyzer, config.general.concurrency, config.task_timeout())
        .with_progress(!args.quiet);
    let synthesizer = AggregationSynthesizer::new(client, retry);
    let pipeline = Pipeline::new(dispatcher, synthesizer, store);

    // Step 3: Analyze, synthesize, track and archive
    println!(
        "\n🔬 Analyzing {} videos for run {}...\n",
        items.len(),
        run_date
    );
    let outcome = pipeline
        .run(run_date, &items, &mut cache)
        .await
        .with_context(|| format!("Weekly run for {run_date} failed"))?;

    if let Err(e) = cache.save() {
        warn!("Failed to save analysis cache: {:#}", e);
    }

    // Step 4: Write the digest
    println!("\n📝 Generating digest...");
    let digest = RunDigest::new(
        DigestMetadata {
            run_date,
            generated_at: Utc::now(),
            inference: inference_label,
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        outcome,
    );

    let output = match args.format {
        OutputFormat::Json => report::generate_json_digest(&digest)?,
        OutputFormat::Markdown => report::generate_markdown_digest(&digest),
    };
    let output_path = Path::new(&config.general.output);
    report::write_digest(&output, output_path)?;

    // Print summary
    let stats = &digest.stats;
    info!("{}", generate_summary_text(stats));
    println!("\n📊 Run Summary:");
    println!("   Videos: {}", stats.total);
    println!("   Analyzed: {} | Degraded: {}", stats.analyzed, stats.degraded);
    for result in digest.outcome.snapshot.degraded() {
        let reason = result
            .degradation_reason
            .map_or_else(|| "unknown".to_string(), |r| r.to_string());
        println!("     ⚠️  {} ({}) - {}", result.key, result.label, reason);
    }
    if digest.outcome.summary.summary().is_none() {
        println!("   Strategic summary: unavailable");
    }
    if digest.outcome.trend.is_cold_start() {
        println!("   Trends: first archived run, no comparison");
    } else {
        println!("   Dropped out: {}", digest.outcome.trend.dropped.len());
    }
    println!("   Duration: {:.1}s", digest.metadata.duration_seconds);
    println!(
        "\n✅ Run complete! Digest saved to: {}",
        output_path.display()
    );

    if args.fail_on_degraded && stats.degraded > 0 {
        eprintln!(
            "\n⛔ {} videos could not be analyzed. Failing (exit code 2).",
            stats.degraded
        );
        return Ok(2);
    }

    Ok(0)
}

/// Pick the inference client: canned responses with --mock, Gemini otherwise.
fn build_client(args: &Args, config: &Config) -> Result<(Arc<dyn InferenceClient>, String)> {
    if args.mock {
        info!("Mock mode: no inference calls will be made");
        return Ok((Arc::new(MockInferenceClient::default()), "mock".to_string()));
    }

    let Some(api_key) = args.api_key.clone().filter(|k| !k.trim().is_empty()) else {
        bail!("GEMINI_API_KEY is not set; pass --api-key, set it in .env, or use --mock");
    };

    let gemini = config.gemini_config(api_key);
    let label = format!(
        "{} ({})",
        gemini.extraction_models.join(" → "),
        gemini.endpoint
    );
    let client = GeminiClient::new(gemini)?;
    Ok((Arc::new(client), label))
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
