//! shear - split multi-institution report PDFs by agency code.

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shear_core::{HeaderClassifier, SplitConfig, Splitter, ARCHIVE_NAME};
use shear_pdf::PdfiumDecoder;
use shear_vision::GeminiClassifier;

#[derive(Parser, Debug)]
#[command(name = "shear", version, about = "Split multi-institution report PDFs by agency code")]
struct Args {
    /// Input PDF to split.
    input: PathBuf,

    /// Output directory for the split PDFs and the archive.
    #[arg(short, long, default_value = "out")]
    out: PathBuf,

    /// Gemini API key for the AI fallback; defaults to the GEMINI_API_KEY
    /// environment variable. Without a key the rule extractor runs alone.
    #[arg(long)]
    api_key: Option<String>,

    /// TOML or JSON file overriding the tuning constants.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable the AI fallback even when a key is available.
    #[arg(long)]
    no_ai: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive(Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SplitConfig::from_file(path)?,
        None => SplitConfig::default(),
    };

    let api_key = if args.no_ai {
        None
    } else {
        args.api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
    };
    if api_key.is_none() && !args.no_ai {
        warn!("no API key configured, running with the rule extractor only");
    }

    let classifier = api_key.map(|key| {
        GeminiClassifier::with_config(key, config.model.clone(), config.retry)
    });

    let decoder = PdfiumDecoder::open_path(&args.input)?;
    let splitter = Splitter::new(config);
    let output = splitter
        .split(
            &decoder,
            classifier.as_ref().map(|c| c as &dyn HeaderClassifier),
        )
        .await?;

    std::fs::create_dir_all(&args.out)?;
    for file in &output.files {
        std::fs::write(args.out.join(&file.filename), &file.content)?;
        println!(
            "{}  [{}]  pages {}-{} ({} total)",
            file.filename,
            file.code,
            file.page_range.0 + 1,
            file.page_range.1 + 1,
            file.page_count
        );
    }
    std::fs::write(args.out.join(ARCHIVE_NAME), &output.archive)?;

    info!(
        files = output.files.len(),
        rule_hits = output.stats.rule_hits,
        ai_hits = output.stats.ai_hits,
        inherited = output.stats.inherited,
        unclassified = output.stats.unclassified,
        "wrote {} files and {ARCHIVE_NAME} to {}",
        output.files.len(),
        args.out.display()
    );

    Ok(())
}
