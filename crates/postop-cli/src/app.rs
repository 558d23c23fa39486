//! The `postop` application: command dispatch, index startup, and output.

use crate::cli::{CliArgs, Command};
use crate::config::PostopConfig;
use crate::config_handlers;
use crate::providers::{self, Credentials};
use postop_content::{DocumentLoader, content_hash};
use postop_core::traits::ConfigProvider;
use postop_core::{Error, Result};
use postop_rag::{Answer, AnswerPipeline, AnswerSettings, BothAnswers};
use postop_vector::{
    BootstrapOptions, BootstrapOutcome, BuildOptions, FsIndexStore, IndexBootstrap, StartupPath,
    VectorIndex, is_index_fresh,
};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing_subscriber::EnvFilter;

/// Initialise tracing-based logging.
///
/// Uses `RUST_LOG` if set, otherwise defaults based on verbosity flags.
/// Library crates log through `log`; the subscriber picks those records up.
pub fn init_logging(verbose: bool, quiet: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if quiet {
        EnvFilter::new("warn")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // A subscriber may already be installed (tests).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Parse-independent entry point: logging, then dispatch.
///
/// Config subcommands run before any config is loaded so they keep
/// working when the config file itself is broken.
pub async fn run(args: CliArgs) -> Result<()> {
    init_logging(args.verbose, args.quiet);

    match args.command {
        Some(Command::Config(config_cmd)) => config_handlers::handle_config_command(
            args.config.as_deref(),
            config_cmd.command,
            &mut std::io::stdout().lock(),
        ),
        command => {
            let cli = PostopCli::from_args(args.config.as_deref())?;
            cli.dispatch(command).await
        }
    }
}

/// A configured `postop` application.
pub struct PostopCli {
    config: PostopConfig,
    credentials: Credentials,
    version: String,
}

impl PostopCli {
    /// Load config from file/env and credentials from the environment.
    pub fn from_args(config_path: Option<&str>) -> Result<Self> {
        let config = PostopConfig::load(config_path)?;
        Ok(Self::new(config, Credentials::from_env()))
    }

    /// Create from explicit config and credentials.
    pub fn new(config: PostopConfig, credentials: Credentials) -> Self {
        Self {
            config,
            credentials,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// The loaded configuration.
    pub fn config(&self) -> &PostopConfig {
        &self.config
    }

    async fn dispatch(&self, command: Option<Command>) -> Result<()> {
        match command {
            Some(Command::Ask { question }) => self.cmd_ask(&question.join(" ")).await,
            Some(Command::Chat) => self.cmd_chat().await,
            Some(Command::Index { force, check }) => {
                if check {
                    self.cmd_index_check()
                } else {
                    self.cmd_index(force).await
                }
            }
            Some(Command::Version) => {
                println!("postop {}", self.version);
                Ok(())
            }
            Some(Command::Config(_)) => Err(Error::config("config commands are handled earlier")),
            None => {
                println!("postop {}: use --help for usage", self.version);
                Ok(())
            }
        }
    }

    fn loader(&self) -> DocumentLoader {
        DocumentLoader::pdf()
            .with_pattern(&self.config.corpus.pattern)
            .with_fail_fast(self.config.corpus.fail_fast)
    }

    /// Whether the persisted index was built from the current corpus.
    pub fn index_is_fresh(&self) -> Result<bool> {
        let corpus = self.config.corpus_path()?;
        let hash = content_hash(&self.loader().discover(&corpus)?);
        Ok(is_index_fresh(&self.config.index_path()?, &hash))
    }

    /// Bring the vector index to `Ready`, loading or building as needed.
    pub async fn bootstrap(&self, force_rebuild: bool) -> Result<BootstrapOutcome> {
        let corpus = self.config.corpus_path()?;
        let index_path = self.config.index_path()?;
        let embedder = providers::embedding_provider(&self.config.embedding, &self.credentials)?;

        let options = BootstrapOptions {
            force_rebuild,
            rebuild_on_corrupt: self.config.index.rebuild_on_corrupt,
            build: BuildOptions::default()
                .with_batch_size(self.config.index.batch_size)
                .with_concurrency(self.config.index.concurrency),
        };

        IndexBootstrap::new(
            Arc::new(FsIndexStore::new(index_path)),
            self.loader(),
            corpus,
            embedder,
        )
        .with_options(options)
        .run()
        .await
    }

    /// Build the answer pipeline over a ready index.
    pub fn pipeline(&self, index: Arc<VectorIndex>) -> Result<AnswerPipeline> {
        let llm = providers::llm_provider(&self.config.generation, &self.credentials)?;
        let settings = AnswerSettings {
            top_k: self.config.retrieval.top_k,
            temperature: Some(self.config.generation.temperature),
            max_tokens: self.config.generation.max_tokens,
        };
        Ok(AnswerPipeline::new(index, llm, settings))
    }

    /// Bootstrap the index and wire the pipeline, warning on a stale index.
    async fn ready_pipeline(&self) -> Result<AnswerPipeline> {
        if self.config.index_path()?.exists() && !self.index_is_fresh().unwrap_or(false) {
            tracing::warn!(
                "The guides changed since the index was built; run `postop index` to refresh it"
            );
        }
        let outcome = self.bootstrap(false).await?;
        tracing::debug!(
            path = ?outcome.path,
            units = outcome.stats.units_indexed,
            "Vector index ready"
        );
        self.pipeline(outcome.index)
    }

    async fn cmd_ask(&self, question: &str) -> Result<()> {
        let pipeline = self.ready_pipeline().await?;
        let both = pipeline.answer_both(question).await;
        render_both(&both, &mut std::io::stdout().lock())?;

        // Only a total failure fails the command.
        match (both.plain, both.with_context) {
            (Err(_), Err(e)) => Err(e),
            _ => Ok(()),
        }
    }

    async fn cmd_chat(&self) -> Result<()> {
        let pipeline = self.ready_pipeline().await?;
        eprintln!("Ask a question about your recovery (Ctrl-D to quit).");
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let answered = chat_loop(&pipeline, stdin, &mut std::io::stdout()).await?;
        tracing::info!(answered, "Chat session ended");
        Ok(())
    }

    async fn cmd_index(&self, force: bool) -> Result<()> {
        let stale = !self.index_is_fresh()?;
        let outcome = self.bootstrap(force || stale).await?;

        let stats = &outcome.stats;
        match outcome.path {
            StartupPath::Loaded => println!(
                "Index is up to date: {} page(s), dimension {}",
                stats.units_indexed, stats.embedding_dimension
            ),
            StartupPath::Built | StartupPath::Rebuilt => {
                println!(
                    "Indexed {} page(s) from {} document(s) in {}ms",
                    stats.units_indexed, stats.files_processed, stats.duration_ms
                );
                for failure in &stats.failures {
                    println!("  skipped {}: {}", failure.path.display(), failure.message);
                }
            }
        }
        Ok(())
    }

    fn cmd_index_check(&self) -> Result<()> {
        let location = self.config.index_path()?;
        if self.index_is_fresh()? {
            println!("Index at {} is up to date", location.display());
        } else if has_index(&location) {
            println!(
                "Index at {} is stale; run `postop index` to rebuild it",
                location.display()
            );
        } else {
            println!(
                "No index at {}; run `postop index` to build it",
                location.display()
            );
        }
        Ok(())
    }
}

fn has_index(location: &Path) -> bool {
    postop_vector::load_metadata(location).is_ok()
}

// ============================================================================
// Chat loop and rendering
// ============================================================================

/// Answer each non-empty input line until EOF.
///
/// A failed question is reported inline and the loop keeps reading.
/// Returns the number of questions answered.
pub async fn chat_loop<R, W>(pipeline: &AnswerPipeline, input: R, out: &mut W) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut answered = 0;

    write!(out, "> ")?;
    out.flush()?;
    while let Some(line) = lines.next_line().await? {
        let question = line.trim();
        if !question.is_empty() {
            let both = pipeline.answer_both(question).await;
            render_both(&both, out)?;
            answered += 1;
        }
        write!(out, "> ")?;
        out.flush()?;
    }
    writeln!(out)?;
    Ok(answered)
}

/// Print both answers under their labels, then the sources.
pub fn render_both(both: &BothAnswers, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "Answer (without context):")?;
    render_one(&both.plain, out)?;
    writeln!(out)?;
    writeln!(out, "Answer (with context):")?;
    render_one(&both.with_context, out)?;

    if let Ok(answer) = &both.with_context {
        writeln!(out)?;
        if answer.sources.is_empty() {
            writeln!(out, "Sources: none (no pages retrieved)")?;
        } else {
            writeln!(out, "Sources:")?;
            for (rank, hit) in answer.sources.iter().enumerate() {
                writeln!(
                    out,
                    "  [{}] {} ({:.3})",
                    rank + 1,
                    hit.unit.source_label(),
                    hit.score
                )?;
            }
        }
    }
    writeln!(out)
}

fn render_one(answer: &Result<Answer>, out: &mut dyn Write) -> std::io::Result<()> {
    match answer {
        Ok(answer) => writeln!(out, "{}", answer.text.trim()),
        Err(e) => writeln!(out, "{}", describe_error(e)),
    }
}

/// One-line message that names the failure kind.
pub fn describe_error(err: &Error) -> String {
    let hint = match err {
        Error::IndexCorrupt { .. } => {
            " (set index.rebuild_on_corrupt = true or run `postop index --force`)"
        }
        Error::Generation { retryable: true, .. } | Error::Embedding { retryable: true, .. } => {
            " (transient; try again shortly)"
        }
        _ => "",
    };
    format!("error[{}]: {err}{hint}", err.kind())
}

// ============================================================================
// Tests
// ============================================================================
