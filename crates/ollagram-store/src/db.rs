use rusqlite::{Connection, Result};

/// Initialise all tables. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    create_settings_table(conn)?;
    create_history_table(conn)?;
    create_allowed_groups_table(conn)?;
    create_allowed_users_table(conn)?;
    create_chat_instructions_table(conn)?;
    Ok(())
}

/// Operator-tunable texts (denial messages, error messages). One row per
/// setting name; last write wins.
fn create_settings_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS settings (
            id      INTEGER PRIMARY KEY AUTOINCREMENT,
            name    TEXT NOT NULL UNIQUE,
            value   TEXT NOT NULL
        );",
    )
}

/// Append-only conversation history. One row per inbound and per outbound
/// message; `id` defines chronological order.
fn create_history_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS conversation_history (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp   TEXT NOT NULL,
            chat_id     INTEGER NOT NULL,
            chat_name   TEXT NOT NULL,
            user_id     INTEGER NOT NULL,
            full_name   TEXT NOT NULL,
            message     TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_history_chat
            ON conversation_history(chat_id, id);",
    )
}

/// Row presence authorizes a group chat. Rows are provisioned by the
/// operator; the pipeline only reads.
fn create_allowed_groups_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS allowed_groups (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            chat_id    INTEGER NOT NULL,
            chat_name  TEXT
        );",
    )
}

/// Row presence authorizes a private-chat sender.
fn create_allowed_users_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS allowed_users (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id    INTEGER NOT NULL,
            user_name  TEXT
        );",
    )
}

/// Per-chat instruction overrides. A row with chat_id = NULL holds the
/// global default text.
fn create_chat_instructions_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS chat_instructions (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            chat_id       INTEGER,
            instructions  TEXT NOT NULL
        );",
    )
}
