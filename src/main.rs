use std::sync::Arc;

use teloxide::prelude::*;
use tracing_subscriber::EnvFilter;

mod audit;
mod auth;
mod bot;
mod broadcast;
mod catalog;
mod config;
mod db;
mod error;
mod flow;
mod i18n;
mod review;

use config::AppConfig;
use db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("🤖 Starting finance operations bot...");

    // Load config
    let config = AppConfig::from_env()?;
    tracing::info!(
        super_admins = config.super_admin_ids.len(),
        "Config loaded."
    );

    // Initialize database
    let db = Database::connect(&config.database_url).await?;
    db.run_migrations().await?;
    auth::ensure_default_roles(&db).await?;
    tracing::info!("Database connected and migrations applied.");

    // Create the Telegram bot
    let bot = Bot::new(&config.telegram_bot_token);

    // Broadcast worker shares the same bot handle
    let outbound = Arc::new(bot::TelegramOutbound { bot: bot.clone() });
    let broadcast = broadcast::BroadcastQueue::spawn(outbound, (&config).into());

    // Build shared application state
    let state = Arc::new(bot::AppState {
        config,
        db,
        flows: flow::FlowStore::new(),
        broadcast,
    });

    // Build the dispatcher
    let handler = bot::build_handler();

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
