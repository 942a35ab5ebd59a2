//! Context assembly: turns persisted history into role-tagged messages.

use ollagram_store::{Store, StoreError};

use crate::provider::{ChatMessage, Role};

/// Rebuild the context window for a chat: up to `limit` most recent turns,
/// oldest first. Entries authored by the bot (`self_id`) become assistant
/// messages with their text verbatim; everything else becomes a user
/// message prefixed with the sender's display name, so the model can tell
/// speakers apart in a multi-party room.
pub fn assemble_context(
    store: &Store,
    chat_id: i64,
    limit: usize,
    self_id: i64,
) -> Result<Vec<ChatMessage>, StoreError> {
    let history = store.get_history(chat_id, limit)?;
    Ok(history
        .into_iter()
        .map(|entry| {
            if entry.user_id == self_id {
                ChatMessage {
                    role: Role::Assistant,
                    content: entry.message,
                }
            } else {
                ChatMessage {
                    role: Role::User,
                    content: format!("{}: {}", entry.full_name, entry.message),
                }
            }
        })
        .collect())
}
