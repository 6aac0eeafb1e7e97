//! Command-line interface and pipeline orchestration

use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser, ValueEnum};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Instrument};

use crate::classifier::{classify, important_unstarred, ClassifyOptions};
use crate::client::GmailClient;
use crate::config::Config;
use crate::error::{GmailError, Result};
use crate::models::{MessageId, MessageMetadata, SenderCount, SkipReason};
use crate::mutator::BatchMutator;
use crate::scanner::{self, ProgressCallback};
use crate::senders::count_senders;

#[derive(Parser, Debug)]
#[command(name = "gmail-trash")]
#[command(version)]
#[command(about = "Move Gmail messages matching a search query to the trash in bulk", long_about = None)]
pub struct Cli {
    /// Gmail search query (same syntax as the Gmail search box)
    #[arg(short, long)]
    pub query: Option<String>,

    /// Show what would be trashed without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// List unique senders of matching messages with their counts
    #[arg(long, alias = "list-from")]
    pub list_senders: bool,

    /// Process at most this many messages
    #[arg(long)]
    pub limit: Option<usize>,

    /// Include starred messages (skipped by default)
    #[arg(long = "no-skip-starred", action = ArgAction::SetFalse)]
    pub skip_starred: bool,

    /// Include messages that look like passwords or one-time codes (skipped by default)
    #[arg(long = "no-skip-sensitive", action = ArgAction::SetFalse)]
    pub skip_sensitive: bool,

    /// Do not star important messages before trashing (starred and skipped by default)
    #[arg(long = "no-mark-important-star", action = ArgAction::SetFalse)]
    pub mark_important_star: bool,

    /// Log verbosity (RUST_LOG takes precedence when set)
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Path to configuration file
    #[arg(short, long, default_value = "gmail-trash.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 credentials file [env: CREDENTIALS_PATH]
    #[arg(long)]
    pub credentials_path: Option<PathBuf>,

    /// Path to token cache file [env: TOKEN_PATH]
    #[arg(long)]
    pub token_path: Option<PathBuf>,

    /// Write a default configuration file to this path and exit
    #[arg(long, value_name = "PATH")]
    pub init_config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Default `EnvFilter` directive for this level
    pub fn filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "gmail_trash=error,error",
            LogLevel::Warn => "gmail_trash=warn,warn",
            LogLevel::Info => "gmail_trash=info,warn",
            LogLevel::Debug => "gmail_trash=debug,info",
            LogLevel::Trace => "gmail_trash=trace,info",
        }
    }
}

impl Cli {
    /// The trimmed search query, rejecting missing or blank input
    pub fn validated_query(&self) -> Result<String> {
        let query = self.query.as_deref().unwrap_or("").trim();
        if query.is_empty() {
            return Err(GmailError::InvalidInput("--query cannot be empty".to_string()));
        }
        Ok(query.to_string())
    }

    /// Sender listing wins over dry run, which wins over trashing
    pub fn mode(&self) -> RunMode {
        if self.list_senders {
            RunMode::ListSenders
        } else if self.dry_run {
            RunMode::DryRun
        } else {
            RunMode::Trash
        }
    }

    /// Fold the safety toggles into the loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if !self.skip_starred {
            config.filters.skip_starred = false;
        }
        if !self.skip_sensitive {
            config.filters.skip_sensitive = false;
        }
        if !self.mark_important_star {
            config.filters.mark_important_star = false;
        }
    }
}

/// What a run does with the matching messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Report sender frequencies, change nothing
    ListSenders,
    /// Preview a few snippets, change nothing
    DryRun,
    /// Classify and move eligible messages to the trash
    Trash,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunMode::ListSenders => "list-senders",
            RunMode::DryRun => "dry-run",
            RunMode::Trash => "trash",
        })
    }
}

/// Everything a pipeline run needs besides the Gmail client
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub query: String,
    pub mode: RunMode,
    pub limit: Option<usize>,
    pub page_size: u32,
    pub metadata_headers: Vec<String>,
    pub sample_count: usize,
    pub mark_important_star: bool,
    pub classify: ClassifyOptions,
    pub mutator: BatchMutator,
}

impl PipelineOptions {
    pub fn from_config(query: String, mode: RunMode, limit: Option<usize>, config: &Config) -> Self {
        Self {
            query,
            mode,
            limit,
            page_size: config.search.page_size,
            metadata_headers: config.fetch.metadata_headers.clone(),
            sample_count: config.fetch.sample_count,
            mark_important_star: config.filters.mark_important_star,
            classify: config.classify_options(),
            mutator: config.batch_mutator(),
        }
    }
}

/// Progress reporter using indicatif
pub struct ProgressReporter {
    multi: MultiProgress,
    spinner_style: ProgressStyle,
    bar_style: ProgressStyle,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::with_multi_progress(MultiProgress::new())
    }

    /// Reporter that draws nothing (tests, non-interactive use)
    pub fn hidden() -> Self {
        Self::with_multi_progress(MultiProgress::with_draw_target(ProgressDrawTarget::hidden()))
    }

    pub fn with_multi_progress(multi: MultiProgress) -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed:>6}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        let bar_style = ProgressStyle::default_bar()
            .template("[{elapsed:>6}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");

        Self {
            multi,
            spinner_style,
            bar_style,
        }
    }

    pub fn multi_progress(&self) -> &MultiProgress {
        &self.multi
    }

    pub fn add_spinner(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(self.spinner_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    pub fn add_progress_bar(&self, len: u64, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new(len));
        pb.set_style(self.bar_style.clone());
        pb.set_message(msg.to_string());
        pb
    }

    /// Finish a spinner and leave a one-line summary in its place
    pub fn finish_spinner(&self, pb: &ProgressBar, msg: &str) {
        pb.finish_and_clear();
        let _ = self.multi.println(format!("  ✓ {}", msg));
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one run
#[derive(Debug, Clone)]
pub struct Report {
    pub run_id: String,
    pub mode: RunMode,
    pub query: String,
    /// Number of ids returned by the search (after the limit)
    pub matched: usize,
    /// The limit, when it cut the search short
    pub limit_applied: Option<usize>,
    pub moved: usize,
    pub starred: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
    pub samples: Vec<String>,
    pub senders: Vec<SenderCount>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl Report {
    fn new(run_id: String, mode: RunMode, query: String, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            mode,
            query,
            matched: 0,
            limit_applied: None,
            moved: 0,
            starred: 0,
            skipped: BTreeMap::new(),
            samples: Vec::new(),
            senders: Vec::new(),
            started_at,
            completed_at: started_at,
        }
    }

    pub fn skipped_count(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    pub fn duration_ms(&self) -> i64 {
        (self.completed_at - self.started_at).num_milliseconds()
    }

    /// Human-readable summary printed at the end of a run
    pub fn to_text(&self) -> String {
        let mut lines = Vec::new();

        match self.mode {
            RunMode::ListSenders => {
                lines.push(format!("Senders ({} unique):", self.senders.len()));
                for sender in &self.senders {
                    lines.push(format!("- {}: {}", sender.address, sender.count));
                }
            }
            RunMode::DryRun => {
                lines.push(format!("Dry run: matched {} messages. Examples:", self.matched));
                for sample in &self.samples {
                    lines.push(format!("- {}", sample));
                }
            }
            RunMode::Trash => {
                let mut summary = format!(
                    "Matched {} messages; moved {} to trash",
                    self.matched, self.moved
                );
                if let Some(limit) = self.limit_applied {
                    summary.push_str(&format!(" (limit {})", limit));
                }
                summary.push('.');
                lines.push(summary);

                let skipped: Vec<String> = SkipReason::ALL
                    .iter()
                    .map(|r| format!("{} {}", r, self.skipped_count(*r)))
                    .collect();
                lines.push(format!("Skipped: {}.", skipped.join(", ")));

                if self.starred > 0 {
                    lines.push(format!("Starred {} important messages.", self.starred));
                }
            }
        }

        lines.join("\n")
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Fetch metadata behind a progress bar
async fn fetch_with_progress<C>(
    client: &C,
    ids: &[MessageId],
    headers: &[String],
    reporter: &ProgressReporter,
) -> Result<Vec<MessageMetadata>>
where
    C: GmailClient + ?Sized,
{
    let bar = reporter.add_progress_bar(ids.len() as u64, "Fetching message metadata...");
    let bar_clone = bar.clone();
    let on_progress: ProgressCallback = Arc::new(move || bar_clone.inc(1));

    let result = scanner::fetch_metadata_with_progress(client, ids, headers, on_progress).await;
    match &result {
        Ok(metas) => bar.finish_with_message(format!("Fetched {} messages", metas.len())),
        Err(_) => bar.abandon_with_message("Fetch failed"),
    }
    result
}

/// Main orchestration function for one invocation
///
/// Steps, strictly in order:
/// 1. Search for matching ids (honoring the limit)
/// 2. Fetch what the mode needs (senders, snippets, or full metadata)
/// 3. Trash mode only: star important messages, classify, trash the rest
///
/// Errors from any step abort the run. Chunks already trashed stay trashed.
pub async fn run_pipeline<C>(
    client: &C,
    options: &PipelineOptions,
    reporter: &ProgressReporter,
) -> Result<Report>
where
    C: GmailClient + ?Sized,
{
    let query = options.query.trim();
    if query.is_empty() {
        return Err(GmailError::InvalidInput("--query cannot be empty".to_string()));
    }

    let run_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("run", run_id = %run_id, mode = %options.mode);

    async move {
        let mut report = Report::new(run_id.clone(), options.mode, query.to_string(), Utc::now());
        info!("Starting {} run for query: {}", options.mode, query);

        let search_spinner = reporter.add_spinner("Searching messages...");
        let searched = scanner::search(client, query, options.limit, options.page_size).await;
        let searched = match searched {
            Ok(searched) => searched,
            Err(e) => {
                search_spinner.abandon_with_message("Search failed");
                return Err(e);
            }
        };
        let ids = searched.ids;
        reporter.finish_spinner(&search_spinner, &format!("Found {} messages", ids.len()));

        report.matched = ids.len();
        report.limit_applied = options.limit.filter(|_| searched.truncated);

        match options.mode {
            RunMode::ListSenders => {
                let headers = vec!["From".to_string()];
                let metas = fetch_with_progress(client, &ids, &headers, reporter).await?;
                report.senders = count_senders(&scanner::extract_from_headers(&metas));
            }
            RunMode::DryRun => {
                report.samples = scanner::fetch_snippets(client, &ids, options.sample_count).await?;
            }
            RunMode::Trash => {
                let metas =
                    fetch_with_progress(client, &ids, &options.metadata_headers, reporter).await?;

                let mut classify_options = options.classify.clone();
                if options.mark_important_star {
                    let to_star = important_unstarred(&metas);
                    if !to_star.is_empty() {
                        report.starred = options.mutator.add_star(client, &to_star).await?;
                        info!("Starred {} important messages", report.starred);
                    }
                    // Promoted messages must stay out of the trash
                    classify_options.skip_important = true;
                }

                let classification = classify(&metas, &classify_options)?;
                report.skipped = classification.skipped.clone();
                info!(
                    "{} eligible, {} skipped",
                    classification.eligible.len(),
                    classification.total_skipped()
                );

                let trash_spinner = reporter.add_spinner("Moving messages to trash...");
                let moved = options
                    .mutator
                    .move_to_trash(client, &classification.eligible)
                    .await;
                match moved {
                    Ok(moved) => {
                        report.moved = moved;
                        reporter.finish_spinner(&trash_spinner, &format!("Moved {} messages", moved));
                    }
                    Err(e) => {
                        trash_spinner.abandon_with_message("Trash failed");
                        return Err(e);
                    }
                }
            }
        }

        report.completed_at = Utc::now();
        info!("Run finished in {} ms", report.duration_ms());
        Ok(report)
    }
    .instrument(span)
    .await
}
