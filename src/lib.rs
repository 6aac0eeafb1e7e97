//! Gmail bulk trash tool
//!
//! Finds every message matching a Gmail search query and moves the ones that
//! are safe to delete into the trash, in large batches.
//!
//! # Overview
//!
//! - **Authentication**: OAuth2 installed-app flow with a cached token
//! - **Scanning**: Paginated search and per-message metadata fetching
//! - **Classification**: Starred, important and sensitive messages are kept
//! - **Mutation**: Chunked `batchModify` calls with retry on transient errors
//! - **Reporting**: Sender listing, dry-run previews and trash summaries
//!
//! # Example Usage
//!
//! ```no_run
//! use gmail_trash::cli::{run_pipeline, PipelineOptions, ProgressReporter, RunMode};
//! use gmail_trash::{auth, client::ProductionGmailClient, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("gmail-trash.toml".as_ref()).await?;
//!
//!     let hub = auth::initialize_gmail_hub(
//!         "credentials/credentials.json".as_ref(),
//!         "data/token.json".as_ref(),
//!     )
//!     .await?;
//!     let client = ProductionGmailClient::new(hub);
//!
//!     let options = PipelineOptions::from_config(
//!         "older_than:2y category:promotions".to_string(),
//!         RunMode::DryRun,
//!         None,
//!         &config,
//!     );
//!     let report = run_pipeline(&client, &options, &ProgressReporter::new()).await?;
//!     println!("{}", report);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`] - OAuth2 authentication and Gmail API initialization
//! - [`client`] - Gmail API client trait and production implementation
//! - [`classifier`] - Skip rules for starred, important and sensitive mail
//! - [`cli`] - Command-line interface and pipeline orchestration
//! - [`config`] - Configuration management
//! - [`error`] - Error types, result alias and exit codes
//! - [`models`] - Core data structures
//! - [`mutator`] - Chunked label changes and retry policy
//! - [`scanner`] - Search pagination and metadata fetching
//! - [`senders`] - Sender address normalization and counting

pub mod auth;
pub mod classifier;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod mutator;
pub mod scanner;
pub mod senders;

// Re-export commonly used types for convenience
pub use error::{GmailError, Result};

// Core data models
pub use models::{
    ClassificationResult, Header, MessageId, MessageMetadata, MessagePage, SenderCount, SkipReason,
};

// Classifier types
pub use classifier::{ClassifyOptions, KeywordMatcher};

// Config types
pub use config::{BatchConfig, Config, FetchConfig, FilterConfig, SearchConfig};

// Client traits
pub use client::{GmailClient, ProductionGmailClient};

// Mutation
pub use mutator::{BatchMutator, RetryOutcome, RetryPolicy};

// CLI types (for binary usage)
pub use cli::{Cli, PipelineOptions, ProgressReporter, Report, RunMode};
