//! Telegram channel adapter.
//!
//! Wraps a teloxide `Bot` + `Dispatcher` and drives the long-polling event
//! loop until the process exits. No public URL required.

use std::sync::Arc;

use teloxide::prelude::*;
use tracing::info;

use ollagram_core::types::BotIdentity;

use crate::context::BotAppContext;
use crate::error::TelegramError;
use crate::handler::handle_message;

/// Resolve the bot's own platform identity via `getMe`.
///
/// Called once at startup; the identity feeds the self-filter, the mention
/// gate, and outbound history attribution.
pub async fn resolve_identity(bot: &Bot) -> Result<BotIdentity, TelegramError> {
    let me = bot.get_me().await?;
    let username = me
        .user
        .username
        .clone()
        .ok_or(TelegramError::NoUsername)?;
    Ok(BotIdentity {
        user_id: me.user.id.0 as i64,
        username,
        full_name: me.user.full_name(),
    })
}

/// Telegram channel adapter.
pub struct TelegramAdapter<C: BotAppContext + 'static> {
    bot: Bot,
    ctx: Arc<C>,
}

impl<C: BotAppContext + 'static> TelegramAdapter<C> {
    pub fn new(bot: Bot, ctx: Arc<C>) -> Self {
        Self { bot, ctx }
    }

    /// Connect to Telegram and drive the long-polling loop.
    ///
    /// Never returns; runs for the lifetime of the process.
    pub async fn run(self) {
        info!("Telegram: starting long-polling dispatcher");

        let handler = Update::filter_message().endpoint(handle_message::<C>);

        Dispatcher::builder(self.bot, handler)
            .dependencies(dptree::deps![self.ctx])
            .default_handler(|_upd| async {})
            .build()
            .dispatch()
            .await;
    }
}
