//! Telegram message handler registered in the teloxide Dispatcher.

use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{debug, error, warn};

use ollagram_agent::pipeline::{self, InboundTurn, TurnOutcome};
use ollagram_core::types::ChatKind;

use crate::context::BotAppContext;
use crate::send;

/// Runs for every incoming `Message`.
///
/// Owns the transport-facing steps of the pipeline: validation of the raw
/// event, the self-filter, and dispatch on the turn outcome. Everything in
/// between happens in `ollagram_agent::pipeline::run_turn`. A reply's
/// history entry is written only after Telegram accepted the send.
pub async fn handle_message<C: BotAppContext + 'static>(
    bot: Bot,
    msg: Message,
    ctx: Arc<C>,
) -> ResponseResult<()> {
    // Malformed events (no text, no sender) are dropped silently.
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(from) = msg.from.as_ref() else {
        debug!("message without a sender, dropped");
        return Ok(());
    };
    if text.is_empty() {
        return Ok(());
    }

    let sender_id = from.id.0 as i64;

    // Never reprocess our own relayed replies.
    if ctx.identity().is_self(sender_id) {
        return Ok(());
    }

    let kind = if msg.chat.is_private() {
        ChatKind::Private
    } else {
        ChatKind::Group
    };
    let sender_name = from.full_name();
    let chat_name = match kind {
        ChatKind::Private => format!("Private Chat with {sender_name}"),
        ChatKind::Group => msg.chat.title().unwrap_or("Unknown Chat").to_string(),
    };

    let turn = InboundTurn {
        chat_id: msg.chat.id.0,
        kind,
        chat_name,
        sender_id,
        sender_name,
        text: text.to_string(),
    };

    debug!(
        chat_id = turn.chat_id,
        user_id = sender_id,
        text = %turn.text,
        "received message"
    );

    let typing = send::TypingHandle::start(bot.clone(), msg.chat.id);
    let outcome = pipeline::run_turn(ctx.as_ref(), &turn).await;
    typing.stop();

    match outcome {
        Ok(TurnOutcome::Reply(reply)) => match send::reply_text(&bot, &msg, &reply).await {
            Ok(()) => {
                if let Err(e) = pipeline::record_reply(ctx.as_ref(), &turn, &reply) {
                    error!(error = %e, chat_id = turn.chat_id, "failed to record outbound turn");
                }
            }
            Err(e) => {
                warn!(error = %e, chat_id = turn.chat_id, "failed to send reply");
            }
        },
        Ok(TurnOutcome::Denied(denial)) => {
            // Unauthorized private chat: reply, persist nothing.
            if let Err(e) = send::reply_text(&bot, &msg, &denial).await {
                warn!(error = %e, chat_id = turn.chat_id, "failed to send denial reply");
            }
        }
        Ok(TurnOutcome::Silent(reason)) => {
            debug!(chat_id = turn.chat_id, ?reason, "turn ended silently");
        }
        Err(e) => {
            // One failing turn must not crash intake; reply best-effort.
            error!(error = %e, chat_id = turn.chat_id, "pipeline failed");
            let reply = pipeline::internal_error_reply(ctx.as_ref());
            if let Err(e) = send::reply_text(&bot, &msg, &reply).await {
                warn!(error = %e, chat_id = turn.chat_id, "failed to send error reply");
            }
        }
    }

    Ok(())
}
