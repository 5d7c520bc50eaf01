pub mod callbacks;
pub mod commands;
pub mod handlers;
pub mod keyboards;

use async_trait::async_trait;
use teloxide::dispatching::UpdateFilterExt;
use teloxide::dptree;
use teloxide::prelude::*;

use crate::broadcast::{BroadcastQueue, Outbound};
use crate::config::AppConfig;
use crate::db::models::User;
use crate::db::Database;
use crate::error::BotError;
use crate::flow::FlowStore;

/// Shared application state, accessible from all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub db: Database,
    pub flows: FlowStore,
    pub broadcast: BroadcastQueue,
}

impl AppState {
    /// Resolves the sender to a user row, creating a guest record with a
    /// fresh customer code on first contact.
    pub async fn current_user(
        &self,
        telegram_id: i64,
        full_name: Option<&str>,
    ) -> Result<User, BotError> {
        self.db
            .get_or_create_user(
                telegram_id,
                full_name,
                &self.config.customer_code_prefix,
                self.config.default_language.code(),
                &self.config.default_currency,
            )
            .await
    }
}

/// Telegram-backed delivery for the broadcast worker.
pub struct TelegramOutbound {
    pub bot: Bot,
}

#[async_trait]
impl Outbound for TelegramOutbound {
    async fn deliver(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
        self.bot.send_message(ChatId(chat_id), text).await?;
        Ok(())
    }
}

/// Advisory admin notification: failures are logged and never affect the
/// business transaction that triggered them.
pub async fn notify_super_admins(bot: &Bot, config: &AppConfig, text: &str) {
    for &admin_id in &config.super_admin_ids {
        if let Err(e) = bot.send_message(ChatId(admin_id), text).await {
            tracing::warn!(admin_id, "failed to notify admin: {e}");
        }
    }
}

/// Build the teloxide update handler tree.
pub fn build_handler(
) -> teloxide::dispatching::UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    let command_handler = Update::filter_message()
        .filter_command::<commands::BotCommand>()
        .endpoint(commands::handle_command);

    let callback_handler = Update::filter_callback_query()
        .endpoint(callbacks::handle_callback);

    let message_handler = Update::filter_message()
        .endpoint(handlers::handle_message);

    dptree::entry()
        .branch(command_handler)
        .branch(callback_handler)
        .branch(message_handler)
}
