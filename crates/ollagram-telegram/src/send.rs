//! Reply sending for the Telegram adapter.
//!
//! Telegram caps messages at 4096 characters; long model output is split
//! on line boundaries, keeping fenced code blocks balanced across chunks.
//! Markdown is attempted first and retried as plain text when Telegram
//! rejects the formatting.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::{ChatAction, Message, ParseMode, ReplyParameters};
use tracing::warn;

/// Maximum characters per message (Telegram's limit is 4096; 4090 leaves
/// headroom for reopened fences).
const CHUNK_MAX: usize = 4090;

/// Send `text` as a reply to `msg`, chunked if necessary.
///
/// The first chunk replies to the triggering message; follow-up chunks are
/// plain sends into the same chat. Each chunk is sent as Markdown and
/// retried without a parse mode if Telegram rejects it. Returns `Err` only
/// when a chunk could not be delivered at all.
pub async fn reply_text(
    bot: &Bot,
    msg: &Message,
    text: &str,
) -> Result<(), teloxide::RequestError> {
    let chunks = split_chunks(text);
    for (i, chunk) in chunks.iter().enumerate() {
        let as_reply = i == 0;
        let markdown = send_chunk(bot, msg, chunk, as_reply, Some(ParseMode::Markdown)).await;
        if let Err(e) = markdown {
            warn!(error = %e, "Markdown send rejected, retrying as plain text");
            send_chunk(bot, msg, chunk, as_reply, None).await?;
        }
        if i + 1 < chunks.len() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
    Ok(())
}

async fn send_chunk(
    bot: &Bot,
    msg: &Message,
    chunk: &str,
    as_reply: bool,
    parse_mode: Option<ParseMode>,
) -> Result<(), teloxide::RequestError> {
    let mut req = bot.send_message(msg.chat.id, chunk);
    if let Some(mode) = parse_mode {
        req = req.parse_mode(mode);
    }
    if as_reply {
        req = req.reply_parameters(ReplyParameters::new(msg.id));
    }
    req.await?;
    Ok(())
}

/// Split `text` into chunks of at most `CHUNK_MAX` characters.
///
/// Splits on line boundaries. When the split point falls inside a fenced
/// code block, the fence is closed at the chunk end and reopened (with its
/// language tag) at the start of the next chunk. Single lines longer than
/// the limit are hard-split as a last resort.
pub fn split_chunks(text: &str) -> Vec<String> {
    if text.len() <= CHUNK_MAX {
        return vec![text.to_string()];
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    // None = outside a fence; Some(lang) = inside a ```lang block.
    let mut fence: Option<String> = None;

    for line in text.split('\n') {
        let needed = if current.is_empty() {
            line.len()
        } else {
            current.len() + 1 + line.len()
        };

        if needed > CHUNK_MAX && !current.is_empty() {
            if fence.is_some() {
                current.push_str("\n```");
            }
            chunks.push(std::mem::take(&mut current));
            if let Some(lang) = &fence {
                current.push_str("```");
                current.push_str(lang);
                current.push('\n');
            }
        }

        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);

        if let Some(rest) = line.trim_start().strip_prefix("```") {
            fence = match fence {
                Some(_) => None,
                None => Some(rest.trim().to_string()),
            };
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    // Last resort for single oversized lines.
    chunks
        .into_iter()
        .flat_map(|chunk| {
            if chunk.len() <= CHUNK_MAX {
                return vec![chunk];
            }
            let mut parts = Vec::new();
            let mut rest = chunk.as_str();
            while rest.len() > CHUNK_MAX {
                let at = rest[..CHUNK_MAX]
                    .rfind(char::is_whitespace)
                    .unwrap_or(CHUNK_MAX);
                parts.push(rest[..at].to_string());
                rest = rest[at..].trim_start();
            }
            if !rest.is_empty() {
                parts.push(rest.to_string());
            }
            parts
        })
        .collect()
}

/// Handle to a background typing-indicator task.
///
/// Telegram's typing status expires after ~5 seconds, so the loop refreshes
/// it every 4. Dropped silently if the chat action can't be sent.
pub struct TypingHandle(tokio::task::JoinHandle<()>);

impl TypingHandle {
    pub fn start(bot: Bot, chat_id: ChatId) -> Self {
        TypingHandle(tokio::spawn(async move {
            loop {
                let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;
                tokio::time::sleep(Duration::from_secs(4)).await;
            }
        }))
    }

    /// Abort the refresh loop once the turn is finished.
    pub fn stop(self) {
        self.0.abort();
    }
}
