use std::sync::Arc;

use teloxide::Bot;
use tracing::info;

use ollagram_agent::pipeline::TurnContext;
use ollagram_agent::{LlmProvider, OllamaProvider};
use ollagram_core::config::{Config, GenerationOptions};
use ollagram_core::types::BotIdentity;
use ollagram_store::Store;
use ollagram_telegram::adapter::{resolve_identity, TelegramAdapter};

/// Shared host state; implements the pipeline's `TurnContext`.
struct AppState {
    store: Store,
    provider: OllamaProvider,
    identity: BotIdentity,
    model: String,
    options: GenerationOptions,
    history_limit: usize,
}

impl TurnContext for AppState {
    fn store(&self) -> &Store {
        &self.store
    }
    fn provider(&self) -> &dyn LlmProvider {
        &self.provider
    }
    fn identity(&self) -> &BotIdentity {
        &self.identity
    }
    fn model(&self) -> &str {
        &self.model
    }
    fn options(&self) -> &GenerationOptions {
        &self.options
    }
    fn history_limit(&self) -> usize {
        self.history_limit
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ollagram=info".into()),
        )
        .init();

    let config = Config::load(std::env::args().nth(1).as_deref())?;

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL;")?;
    ollagram_store::db::init_db(&db)?;
    let store = Store::new(db);

    let provider = OllamaProvider::new(config.ollama.base_url.clone());
    info!(
        base_url = %config.ollama.base_url,
        model = %config.ollama.model,
        "inference backend: Ollama"
    );

    let bot = Bot::new(&config.telegram.bot_token);
    let identity = resolve_identity(&bot).await?;
    info!(
        user_id = identity.user_id,
        username = %identity.username,
        "resolved bot identity"
    );

    let state = Arc::new(AppState {
        store,
        provider,
        identity,
        model: config.ollama.model,
        options: config.ollama.options,
        history_limit: config.history_limit,
    });

    TelegramAdapter::new(bot, state).run().await;
    Ok(())
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
