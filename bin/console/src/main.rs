mod config;
mod dialogs;

use colloquy_bot::{Bot, TurnAdapter};
use colloquy_core::{Activity, ChannelAccount, ConversationRef};
use colloquy_state::{BotState, FileStorage, MemoryStorage, Storage};
use crate::config::{ConsoleConfig, StorageBackend};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CHANNEL: &str = "console";
const BOT_ID: &str = "colloquy";

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ConsoleConfig::from_env().expect("failed to load configuration");
    tracing::info!(backend = ?config.storage.backend, "Loaded configuration");

    let storage: Arc<dyn Storage> = match config.storage.backend {
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        StorageBackend::File => {
            tracing::info!(directory = %config.storage.directory.display(), "Opening file storage");
            Arc::new(
                FileStorage::open(&config.storage.directory)
                    .await
                    .expect("failed to open state directory"),
            )
        }
    };

    let conversation_state = BotState::conversation(storage);
    let adapter = TurnAdapter::new(config.adapter.clone()).use_state(conversation_state.clone());
    let bot = dialogs::booking_bot(conversation_state, config.dialogs.clone())
        .expect("failed to build booking dialogs");

    let conversation = ConversationRef::new(CHANNEL, &config.session.conversation_id);
    let user = ChannelAccount::new(&config.session.user_id);
    let me = ChannelAccount::new(BOT_ID);

    let joined = Activity::conversation_update(
        conversation.clone(),
        user.clone(),
        me.clone(),
        vec![user.clone()],
    );
    deliver(&adapter, &bot, joined).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => {
                    let activity =
                        Activity::message(conversation.clone(), user.clone(), me.clone(), line);
                    deliver(&adapter, &bot, activity).await;
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read from stdin");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    tracing::info!("Console closed");
}

async fn deliver(adapter: &TurnAdapter, bot: &dyn Bot, activity: Activity) {
    match adapter.process_activity(activity, bot).await {
        Ok(replies) => {
            for reply in replies {
                println!("{BOT_ID}> {}", reply.text());
            }
        }
        Err(report) => {
            tracing::warn!(error = %report, "Turn failed");
            println!("{BOT_ID}> Sorry, something went wrong. Let's start over.");
        }
    }
}
