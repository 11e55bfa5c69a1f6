use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use rukn::{
    Analyzer, AnalyzerConfig, Axis, CalibrationParameters, CrisisLexicon, EmotionParameters,
    FeedbackSubmission, InMemoryRecordStore, LabelSet, ModelStore, RuntimeConfig,
};
use serde_json::json;
use tokio::sync::Semaphore;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Classifier backend producing the probabilities
    #[arg(short, long, value_enum, default_value_t = Backend::Keyword)]
    backend: Backend,

    /// Models root holding urgency_model/ and emotion_model/ (defaults to $RUKN_MODELS or the cache dir)
    #[arg(short, long)]
    models_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    /// Deterministic keyword rules, no model files needed
    Keyword,
    /// Fine-tuned ONNX models from the models root
    Onnx,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze one text and print the result as JSON
    Analyze {
        text: String,
        /// Store the analysed feedback (in memory) and print the record
        #[arg(long)]
        consent: bool,
        #[arg(long)]
        region: Option<String>,
    },
    /// Analyze every non-empty line of a file, printing JSON lines in input order
    Batch {
        input: PathBuf,
        #[arg(short, long, default_value_t = 8)]
        concurrency: usize,
    },
    /// Print labels and backend information
    Info,
}

/// Labels used by the keyword backend when no metadata files are available.
fn builtin_config() -> Result<AnalyzerConfig> {
    let urgency_labels = LabelSet::new(["low", "medium", "high"])?;
    let emotion_labels = LabelSet::new([
        "neutral", "sadness", "anger", "fear", "joy",
    ])?;
    Ok(AnalyzerConfig::new(
        urgency_labels,
        CalibrationParameters::new(1.0, 0.5, "high")?,
        emotion_labels,
        EmotionParameters::new(1.0)?,
        CrisisLexicon::default(),
    )?)
}

fn build_analyzer(args: &Args) -> Result<Analyzer> {
    let store = match &args.models_dir {
        Some(dir) => ModelStore::new(dir),
        None => ModelStore::new_default(),
    };
    info!("Models root: {:?}", store.models_dir());

    let analyzer = match args.backend {
        Backend::Onnx => Analyzer::from_store(&store, &RuntimeConfig::default())
            .with_context(|| format!("loading models from {:?}", store.models_dir()))?,
        Backend::Keyword => {
            let config = if store.has_meta(Axis::Urgency) && store.has_meta(Axis::Emotion) {
                AnalyzerConfig::load(&store)?
            } else {
                info!("No metadata found; using built-in labels");
                builtin_config()?
            };
            Analyzer::keyword(config)?
        }
    };
    Ok(analyzer)
}

async fn run_batch(analyzer: Arc<Analyzer>, input: PathBuf, concurrency: usize) -> Result<()> {
    let content = tokio::fs::read_to_string(&input)
        .await
        .with_context(|| format!("reading {:?}", input))?;
    let lines: Vec<String> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect();

    info!("=== Running Analyses ({} inputs) ===", lines.len());
    let start = Instant::now();
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));

    let mut handles = Vec::with_capacity(lines.len());
    for line in lines {
        let analyzer = Arc::clone(&analyzer);
        let permit = Arc::clone(&permits).acquire_owned().await?;
        handles.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            analyzer.analyze(&line)
        }));
    }

    let total = handles.len();
    for handle in handles {
        let line = match handle.await? {
            Ok(result) => serde_json::to_string(&result)?,
            Err(e) => json!({ "error": e.to_string(), "status": e.status_code() }).to_string(),
        };
        println!("{}", line);
    }

    let elapsed = start.elapsed();
    info!("Analyzed {} inputs in {:.2?}", total, elapsed);
    if total > 0 {
        info!("Average time per analysis: {:.2?}", elapsed / total as u32);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let start_time = Instant::now();
    let analyzer = Arc::new(build_analyzer(&args)?);
    info!("Analyzer ready (took {:.2?})", start_time.elapsed());

    match args.command {
        Command::Analyze { text, consent, region } => {
            let mut submission = FeedbackSubmission::new(text).with_consent(consent);
            if let Some(region) = region {
                submission = submission.with_region(region);
            }
            let store = InMemoryRecordStore::new();
            let (result, record_id) = analyzer.analyze_submission(&submission, &store)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if record_id.is_some() {
                println!("{}", serde_json::to_string_pretty(&store.records())?);
            }
        }
        Command::Batch { input, concurrency } => {
            run_batch(analyzer, input, concurrency).await?;
        }
        Command::Info => {
            println!("{}", serde_json::to_string_pretty(&analyzer.info())?);
        }
    }

    Ok(())
}
