use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use inboxd::classifier::LlmClassifier;
use inboxd::config::Config;
use inboxd::imap::ImapMailClient;
use inboxd::notify::{Notifier, SlackNotifier, WebhookNotifier};
use inboxd::orchestrator::SyncEngine;
use inboxd::store::ElasticIndexStore;

#[derive(Parser)]
#[command(name = "inboxd", about = "Multi-account mailbox sync and indexing engine")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "inboxd.toml", global = true)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the sync engine and run until interrupted
    Run,
    /// Print aggregate message counts per account, folder, and folder type
    Stats,
    /// Load and validate the configuration, then print a summary
    CheckConfig,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("inboxd=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("inboxd=info,warn,error"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = Config::load(&cli.config).await?;

    match cli.command {
        Commands::Run => {
            let engine = build_engine(&config);
            let handles = engine.start(config.accounts()).await?;
            tracing::info!(accounts = handles.len(), "Sync engine running");

            tokio::signal::ctrl_c().await?;
            tracing::info!("Shutting down");
            for handle in handles {
                handle.task.abort();
            }
        }
        Commands::Stats => {
            let engine = build_engine(&config);
            let report = engine.stats().await?;

            println!("Total messages: {}", report.total);
            println!("\nBy account:");
            for bucket in &report.by_account {
                println!("  {:<30} {}", bucket.key, bucket.count);
            }
            println!("\nBy folder:");
            for bucket in &report.by_folder {
                println!("  {:<30} {}", bucket.key, bucket.count);
            }
            println!("\nBy folder type:");
            for bucket in &report.by_folder_type {
                println!("  {:<30} {}", bucket.key, bucket.count);
            }
        }
        Commands::CheckConfig => {
            config.validate()?;
            println!("Configuration OK");
            println!("  accounts:        {}", config.accounts.len());
            for account in &config.accounts {
                println!(
                    "    {} ({}@{}:{}, tls={})",
                    account.id, account.username, account.host, account.port, account.use_tls
                );
            }
            println!("  backfill window: {} days", config.sync.backfill_days);
            println!("  keep-alive:      {}s", config.sync.keepalive_secs);
            println!("  reconnect delay: {}s", config.sync.reconnect_secs);
            println!("  index:           {}/{}", config.index.url, config.index.index);
        }
    }

    Ok(())
}

fn build_engine(config: &Config) -> SyncEngine {
    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
    if let Some(url) = &config.notify.chat_webhook_url {
        notifiers.push(Arc::new(SlackNotifier::new(url)));
    }
    if let Some(url) = &config.notify.webhook_url {
        notifiers.push(Arc::new(WebhookNotifier::new(url)));
    }

    SyncEngine::new(
        Arc::new(ImapMailClient::new()),
        Arc::new(ElasticIndexStore::new(
            &config.index.url,
            &config.index.index,
        )),
        Arc::new(LlmClassifier::new(
            &config.classifier.endpoint,
            &config.classifier.model,
            config.classifier.api_key.clone(),
        )),
        notifiers,
        config.sync.clone(),
    )
}
