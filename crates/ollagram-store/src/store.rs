use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension};
use tracing::warn;

use crate::error::StoreError;
use crate::types::HistoryEntry;

/// Built-in fallback instructions, used when the operator has not
/// provisioned a default row (chat_id = NULL) in chat_instructions.
pub const DEFAULT_INSTRUCTIONS: &str = "\
<instructions>
- Your name is Ollagram.
- You are an AI chatbot for Telegram group chats.
- You should not engage in any harmful, illegal, or unethical conversations.
- You should be polite, respectful, and helpful to all users.
- You should obey laws, morals, and ethics.
- Contents between `<instructions></instructions>` are instructions for you to follow.
- Contents after `<instructions></instructions>` are messages from users in the chat.
- User messages are in the format of `<nickname>: <message>`.
- Your responses should be text-only, without any tags or identifiers.
</instructions>";

/// Durable settings, allowlists, instructions, and conversation history.
///
/// Thread-safe: wraps the SQLite connection in a Mutex. Every call is a
/// single self-contained statement; there are no long-lived transactions
/// and no caching layer.
pub struct Store {
    db: Mutex<Connection>,
}

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self { db: Mutex::new(conn) }
    }

    /// Look up a setting by name. `Ok(None)` when unset.
    pub fn get_setting(&self, name: &str) -> Result<Option<String>, StoreError> {
        let db = self.db.lock().unwrap();
        let value = db
            .query_row(
                "SELECT value FROM settings WHERE name = ?1",
                rusqlite::params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Upsert a setting. Last write wins.
    pub fn set_setting(&self, name: &str, value: &str) -> Result<(), StoreError> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO settings (name, value) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
            rusqlite::params![name, value],
        )?;
        Ok(())
    }

    /// `true` when an allowed_groups row exists for this chat.
    pub fn is_group_allowed(&self, chat_id: i64) -> Result<bool, StoreError> {
        let db = self.db.lock().unwrap();
        let row: Option<i64> = db
            .query_row(
                "SELECT chat_id FROM allowed_groups WHERE chat_id = ?1",
                rusqlite::params![chat_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(row.is_some())
    }

    /// `true` when an allowed_users row exists for this sender.
    pub fn is_user_allowed(&self, user_id: i64) -> Result<bool, StoreError> {
        let db = self.db.lock().unwrap();
        let row: Option<i64> = db
            .query_row(
                "SELECT user_id FROM allowed_users WHERE user_id = ?1",
                rusqlite::params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(row.is_some())
    }

    /// Append one turn to the history, stamped with the current UTC time.
    pub fn append_history(
        &self,
        chat_id: i64,
        chat_name: &str,
        user_id: i64,
        full_name: &str,
        message: &str,
    ) -> Result<(), StoreError> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO conversation_history
             (timestamp, chat_id, chat_name, user_id, full_name, message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![now, chat_id, chat_name, user_id, full_name, message],
        )?;
        Ok(())
    }

    /// Fetch the most recent `limit` turns for a chat, oldest first.
    ///
    /// Rows beyond the window are silently excluded (sliding window).
    pub fn get_history(&self, chat_id: i64, limit: usize) -> Result<Vec<HistoryEntry>, StoreError> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, timestamp, chat_id, chat_name, user_id, full_name, message
             FROM conversation_history
             WHERE chat_id = ?1
             ORDER BY id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![chat_id, limit], |row| {
            Ok(HistoryEntry {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                chat_id: row.get(2)?,
                chat_name: row.get(3)?,
                user_id: row.get(4)?,
                full_name: row.get(5)?,
                message: row.get(6)?,
            })
        })?;
        // Rows come back newest-first; reverse into chronological order.
        let mut entries: Vec<_> = rows.filter_map(|r| r.ok()).collect();
        entries.reverse();
        Ok(entries)
    }

    /// Resolve the effective instruction text for a chat.
    ///
    /// Three tiers: chat-specific row, then the global default row
    /// (chat_id IS NULL), then the built-in constant. Absence never fails.
    pub fn instructions(&self, chat_id: i64) -> Result<String, StoreError> {
        let db = self.db.lock().unwrap();
        let specific: Option<String> = db
            .query_row(
                "SELECT instructions FROM chat_instructions WHERE chat_id = ?1",
                rusqlite::params![chat_id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(text) = specific {
            return Ok(text);
        }

        let default: Option<String> = db
            .query_row(
                "SELECT instructions FROM chat_instructions WHERE chat_id IS NULL",
                [],
                |row| row.get(0),
            )
            .optional()?;
        match default {
            Some(text) => Ok(text),
            None => {
                warn!(
                    chat_id,
                    "no default instructions row (chat_id IS NULL), using built-in fallback"
                );
                Ok(DEFAULT_INSTRUCTIONS.to_string())
            }
        }
    }
}
