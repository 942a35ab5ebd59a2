use serde::{Deserialize, Serialize};

/// The bot's own platform identity, resolved once at startup via `getMe`.
///
/// Used for the is-self predicate (never reprocess our own relayed
/// replies), for mention matching, and for attributing outbound history
/// entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotIdentity {
    /// Numeric Telegram user ID of the bot account.
    pub user_id: i64,
    /// Bot handle without the leading `@`.
    pub username: String,
    /// Display name (first + last name joined with a space).
    pub full_name: String,
}

impl BotIdentity {
    /// `true` when `user_id` is the bot's own account.
    pub fn is_self(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }
}

/// Whether a chat is a 1:1 conversation or a multi-party room.
///
/// Authorization and the mention gate branch on this: private chats check
/// the user allowlist and skip the mention gate; everything else checks
/// the group allowlist and requires an explicit mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Private,
    Group,
}

impl ChatKind {
    pub fn is_private(&self) -> bool {
        matches!(self, ChatKind::Private)
    }
}
