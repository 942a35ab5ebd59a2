//! Authorization gate: pure existence check against the allowlists.
//!
//! Private chats gate on the sender's user ID and get a denial reply;
//! group chats gate on the chat ID and are dropped silently. The
//! asymmetry is intentional (no denial noise in rooms).

use tracing::warn;

use ollagram_store::{Store, StoreError};

use super::{InboundTurn, DEFAULT_PRIVATE_DENIED, SETTING_PRIVATE_DENIED};

/// Outcome of the authorization check for one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Allowed,
    /// `reply` carries the user-facing denial text for private chats;
    /// `None` means drop silently (groups).
    Denied { reply: Option<String> },
}

/// Runs once per message, before any history read or write.
pub fn authorize(store: &Store, turn: &InboundTurn) -> Result<Verdict, StoreError> {
    if turn.kind.is_private() {
        if store.is_user_allowed(turn.sender_id)? {
            return Ok(Verdict::Allowed);
        }
        warn!(user_id = turn.sender_id, "unauthorized private chat sender");
        let reply = store
            .get_setting(SETTING_PRIVATE_DENIED)?
            .unwrap_or_else(|| DEFAULT_PRIVATE_DENIED.to_string());
        return Ok(Verdict::Denied { reply: Some(reply) });
    }

    if store.is_group_allowed(turn.chat_id)? {
        Ok(Verdict::Allowed)
    } else {
        warn!(chat_id = turn.chat_id, "unauthorized group chat");
        Ok(Verdict::Denied { reply: None })
    }
}
