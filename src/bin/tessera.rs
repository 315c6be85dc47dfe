//! tessera: orchestration core CLI
//!
//! Inspect the safety gate, run features without a model runtime (the
//! fallback path), and maintain the on-disk response cache.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tessera::cache::store::default_dir;
use tessera::{
    CancellationToken, Config, Feature, FileStore, GenerateParams, InferenceBackend, ModelHandle,
    ProgressFn, ReflectionInput, ResponseCache, Tessera, TesseraError,
};

/// Tessera CLI
#[derive(Parser)]
#[command(name = "tessera")]
#[command(version)]
#[command(about = "On-device inference orchestration core")]
struct Args {
    /// Config file
    #[arg(short, long, env = "TESSERA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the crisis safety gate over text
    Scan {
        /// Text to scan (or omit to read from stdin)
        text: Option<String>,
    },

    /// Run a feature with no model runtime linked (always falls back)
    Run {
        /// Feature name, e.g. analyze_reflection or mantra
        feature: String,
        /// Reflection text (or omit to read from stdin)
        text: Option<String>,
        /// Emotional state, e.g. drained
        #[arg(long)]
        state: Option<String>,
        /// Sub-emotion, e.g. exhausted
        #[arg(long)]
        sub: Option<String>,
        /// Value category, e.g. Career
        #[arg(long)]
        category: Option<String>,
    },

    /// Remove expired cache entries from the on-disk store
    Sweep {
        /// Cache directory (default: platform data dir)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

/// Backend used when no on-device runtime is linked into the binary.
struct OfflineBackend;

#[async_trait]
impl InferenceBackend for OfflineBackend {
    fn name(&self) -> &str {
        "offline"
    }

    async fn load(&self, candidate: &str, _on_progress: ProgressFn) -> tessera::Result<ModelHandle> {
        Err(TesseraError::LoadFailed {
            candidate: candidate.to_string(),
            message: "no on-device runtime linked".to_string(),
        })
    }

    async fn generate(
        &self,
        _handle: &ModelHandle,
        _prompt: &str,
        _params: &GenerateParams,
        _cancel: CancellationToken,
    ) -> tessera::Result<String> {
        Err(TesseraError::ModelUnavailable(
            "no on-device runtime linked".to_string(),
        ))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    config.validate()?;

    match args.command {
        Command::Scan { text } => {
            let text = resolve_text(text, "scan")?;
            let gate = config.safety_gate()?;
            match gate.scan(&text) {
                Some(crisis) => println!("{}", serde_json::to_string_pretty(&crisis)?),
                None => println!("{{\"is_crisis\": false}}"),
            }
        }

        Command::Run {
            feature,
            text,
            state,
            sub,
            category,
        } => {
            let feature: Feature = feature.parse()?;
            let mut input = ReflectionInput::new(resolve_text(text, "run")?);
            input.emotional_state = state;
            input.sub_emotion = sub;
            input.value_category = category;

            let orchestrator = Tessera::builder()
                .config(&config)
                .backend(Arc::new(OfflineBackend))
                .build()?;
            let outcome = orchestrator
                .run_feature(feature, &input, Default::default())
                .await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }

        Command::Sweep { dir } => {
            let dir = dir
                .or_else(|| config.cache.dir.clone())
                .unwrap_or_else(default_dir);
            let cache = ResponseCache::new(
                Arc::new(FileStore::new(dir.clone())),
                config.cache_config(),
            );
            let removed = cache.clear_expired().await?;
            let remaining = cache.len().await?;
            println!("removed {removed} stale entries from {}", dir.display());
            println!("{remaining} entries remain");
        }
    }

    Ok(())
}

/// Resolve text from the argument, stdin, or both.
fn resolve_text(arg: Option<String>, command: &str) -> Result<String, Box<dyn std::error::Error>> {
    let stdin_is_pipe = !io::stdin().is_terminal();
    let stdin_text = if stdin_is_pipe {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    } else {
        None
    };

    match (arg, stdin_text) {
        (Some(a), Some(s)) => Ok(format!("{a}\n\n{s}")),
        (Some(a), None) => Ok(a),
        (None, Some(s)) => Ok(s),
        (None, None) => {
            Err(format!("{command}: no input provided (pass text as argument or via stdin)").into())
        }
    }
}
