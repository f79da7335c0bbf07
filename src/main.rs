use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use offline_voice_sync::classify::HttpClassifier;
use offline_voice_sync::config::EngineConfig;
use offline_voice_sync::recording::{ClassificationType, RecordingMetadata, RecordingStatus};
use offline_voice_sync::store::RecordingStore;
use offline_voice_sync::sync::SyncDriver;
use offline_voice_sync::{lifecycle, maintenance};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Offline voice-capture queue: enqueue recordings and sync them through the classification service"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Enqueue a captured audio file for classification
    Enqueue {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,

        /// Owning user id
        #[arg(short, long)]
        user: String,

        /// Path to the captured audio file
        #[arg(short, long)]
        audio: PathBuf,

        /// Language hint (overrides the config default)
        #[arg(short, long)]
        language: Option<String>,

        /// Classification type (default: transaction)
        #[arg(short, long)]
        kind: Option<ClassificationType>,
    },
    /// Process all pending recordings for a user
    Sync {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,

        /// Owning user id
        #[arg(short, long)]
        user: String,
    },
    /// Return failed recordings to pending and process them again
    Retry {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,

        /// Owning user id
        #[arg(short, long)]
        user: String,
    },
    /// List queued recordings
    List {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,

        /// Only this user's recordings
        #[arg(short, long)]
        user: Option<String>,

        /// Only recordings with this status
        #[arg(short, long)]
        status: Option<RecordingStatus>,
    },
    /// Show per-status queue counts
    Stats {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,

        /// Only this user's recordings
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Delete processed recordings past their retention period
    Cleanup {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,

        /// Retention in days (overrides the config value)
        #[arg(short, long)]
        days: Option<i64>,
    },
    /// Delete one recording, any status
    Delete {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,

        /// Recording id
        id: i64,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Enqueue {
            config,
            user,
            audio,
            language,
            kind,
        } => {
            let config = EngineConfig::load(&config)?;
            let store = RecordingStore::open(&config.store_dir, &config.name).await?;

            let audio_bytes = std::fs::read(&audio)
                .map_err(|e| format!("Failed to read audio file '{}': {}", audio.display(), e))?;
            let payload = BASE64.encode(&audio_bytes);
            let metadata = RecordingMetadata {
                language: language.unwrap_or_else(|| config.default_language.clone()),
                classification_type: kind.unwrap_or_default(),
                extra: serde_json::Map::new(),
            };

            let recording = lifecycle::enqueue(&store, &user, &payload, metadata).await?;
            println!(
                "✓ Enqueued recording {} for user {} ({} bytes of audio)",
                recording.id,
                recording.user_id,
                audio_bytes.len()
            );
            store.close().await;
        }
        Command::Sync { config, user } => {
            let config = EngineConfig::load(&config)?;
            let store = RecordingStore::open(&config.store_dir, &config.name).await?;
            // We hold the store lock, so anything still in processing was
            // orphaned by a crash and is safe to requeue
            lifecycle::recover_interrupted(&store).await?;
            let classifier = HttpClassifier::new(&config.service_url, config.service_timeout())?;
            let driver = SyncDriver::new(&store, &classifier).with_policy(config.sync_policy());

            let summary = driver.process_all(&user).await?;
            println!(
                "✓ Sync complete: {} processed, {} failed, {} total",
                summary.processed, summary.failed, summary.total
            );
            store.close().await;
        }
        Command::Retry { config, user } => {
            let config = EngineConfig::load(&config)?;
            let store = RecordingStore::open(&config.store_dir, &config.name).await?;
            lifecycle::recover_interrupted(&store).await?;
            let classifier = HttpClassifier::new(&config.service_url, config.service_timeout())?;
            let driver = SyncDriver::new(&store, &classifier).with_policy(config.sync_policy());

            let summary = driver.retry_failed(&user).await?;
            println!(
                "✓ Retry complete: {} retried, {} processed, {} failed, {} total",
                summary.retried, summary.processed, summary.failed, summary.total
            );
            store.close().await;
        }
        Command::List {
            config,
            user,
            status,
        } => {
            let config = EngineConfig::load(&config)?;
            let store = RecordingStore::open(&config.store_dir, &config.name).await?;

            let recordings = match (user.as_deref(), status) {
                (Some(user), Some(status)) => store.query_user_by_status(user, status).await?,
                (Some(user), None) => store.get_all_for_user(user).await?,
                (None, Some(status)) => store.query_by_status(status).await?,
                (None, None) => store.get_all().await?,
            };

            if recordings.is_empty() {
                println!("No recordings found");
            }
            for rec in &recordings {
                let mut line = format!(
                    "{}  user={} status={} kind={} retries={} created={}",
                    rec.id,
                    rec.user_id,
                    rec.status,
                    rec.metadata.classification_type.as_str(),
                    rec.retry_count,
                    rec.created_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
                if let Some(confidence) = rec.confidence {
                    line.push_str(&format!(" confidence={:.2}", confidence));
                }
                if let Some(error) = &rec.last_error {
                    line.push_str(&format!(" last_error={}", error));
                }
                println!("{}", line);
            }
            store.close().await;
        }
        Command::Stats { config, user } => {
            let config = EngineConfig::load(&config)?;
            let store = RecordingStore::open(&config.store_dir, &config.name).await?;

            let stats = maintenance::stats(&store, user.as_deref()).await?;
            match &user {
                Some(user) => println!("Queue stats for user {}:", user),
                None => println!("Queue stats:"),
            }
            println!("  total:      {}", stats.total);
            println!("  pending:    {}", stats.pending);
            println!("  processing: {}", stats.processing);
            println!("  processed:  {}", stats.processed);
            println!("  failed:     {}", stats.failed);
            store.close().await;
        }
        Command::Cleanup { config, days } => {
            let config = EngineConfig::load(&config)?;
            let store = RecordingStore::open(&config.store_dir, &config.name).await?;

            let days = days.unwrap_or_else(|| config.retention_days());
            let deleted = maintenance::cleanup_with_retention(&store, days).await?;
            println!(
                "✓ Deleted {} processed recording(s) older than {} day(s)",
                deleted, days
            );
            store.close().await;
        }
        Command::Delete { config, id } => {
            let config = EngineConfig::load(&config)?;
            let store = RecordingStore::open(&config.store_dir, &config.name).await?;

            maintenance::delete_one(&store, id).await?;
            println!("✓ Deleted recording {}", id);
            store.close().await;
        }
    }

    Ok(())
}
