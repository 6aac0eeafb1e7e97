use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use gmail_trash::auth;
use gmail_trash::cli::{self, Cli, PipelineOptions, ProgressReporter};
use gmail_trash::client::ProductionGmailClient;
use gmail_trash::config::Config;
use gmail_trash::error::{GmailError, EXIT_INPUT_ERROR, EXIT_SUCCESS, EXIT_UNKNOWN_ERROR};
use indicatif::MultiProgress;
use std::io::Write;
use std::process;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// A writer that prints through MultiProgress to avoid progress bar conflicts
#[derive(Clone)]
struct MultiProgressWriter {
    multi: Arc<MultiProgress>,
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MultiProgressWriter {
    fn new(multi: Arc<MultiProgress>) -> Self {
        Self {
            multi,
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Write for MultiProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut buffer = self.buffer.lock().unwrap_or_else(|p| p.into_inner());
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut buffer = self.buffer.lock().unwrap_or_else(|p| p.into_inner());
        if !buffer.is_empty() {
            let msg = String::from_utf8_lossy(&buffer);
            let msg = msg.trim_end_matches('\n');
            if !msg.is_empty() {
                // A hidden MultiProgress (stderr not a terminal) swallows println
                if self.multi.is_hidden() {
                    eprintln!("{}", msg);
                } else {
                    let _ = self.multi.println(msg);
                }
            }
            buffer.clear();
        }
        Ok(())
    }
}

impl Drop for MultiProgressWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// MakeWriter implementation for tracing
#[derive(Clone)]
struct MultiProgressMakeWriter {
    multi: Arc<MultiProgress>,
}

impl<'a> MakeWriter<'a> for MultiProgressMakeWriter {
    type Writer = MultiProgressWriter;

    fn make_writer(&'a self) -> Self::Writer {
        MultiProgressWriter::new(Arc::clone(&self.multi))
    }
}

#[tokio::main]
async fn main() {
    // Missing .env is fine; real environment variables still apply
    let _ = dotenvy::dotenv();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EXIT_SUCCESS,
                _ => EXIT_INPUT_ERROR,
            };
            process::exit(code);
        }
    };

    let code = match run(cli).await {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code_for(&e)
        }
    };
    process::exit(code);
}

fn exit_code_for(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<GmailError>()
        .map(GmailError::exit_code)
        .unwrap_or(EXIT_UNKNOWN_ERROR)
}

async fn run(cli: Cli) -> Result<()> {
    // Install default crypto provider for rustls
    // On non-Windows platforms, use aws-lc-rs; on Windows, use ring
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.filter_directive()));

    // Logs go to stderr above the progress bars; stdout carries only the report
    let multi_progress = Arc::new(MultiProgress::new());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(MultiProgressMakeWriter {
            multi: Arc::clone(&multi_progress),
        })
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    if let Some(path) = &cli.init_config {
        Config::create_example(path).await?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let query = cli.validated_query()?;

    let mut config = Config::load(&cli.config).await?;
    cli.apply_overrides(&mut config);

    let (credentials_path, token_path) =
        auth::resolve_paths(cli.credentials_path.as_deref(), cli.token_path.as_deref());
    tracing::debug!(
        "Using credentials {} and token cache {}",
        credentials_path.display(),
        token_path.display()
    );

    let hub = auth::initialize_gmail_hub(&credentials_path, &token_path)
        .await
        .context("Authentication failed")?;
    let client = ProductionGmailClient::new(hub);

    let options = PipelineOptions::from_config(query, cli.mode(), cli.limit, &config);
    let reporter = ProgressReporter::with_multi_progress((*multi_progress).clone());

    let report = cli::run_pipeline(&client, &options, &reporter).await?;
    println!("{}", report);

    Ok(())
}
