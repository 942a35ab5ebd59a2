//! Channel-agnostic message pipeline: one pass per inbound message.
//!
//! `run_turn` executes authorize → assemble context → persist inbound →
//! mention gate → compose prompt → infer → post-process, and returns an
//! explicit `TurnOutcome` for the channel adapter to act on. The adapter
//! relays the reply and then calls `record_reply`, so the outbound history
//! entry is only written after a successful send.

pub mod assemble;
pub mod gate;
pub mod postprocess;

use tracing::{debug, info};

use ollagram_core::config::GenerationOptions;
use ollagram_core::types::{BotIdentity, ChatKind};
use ollagram_store::{Store, StoreError};

use crate::provider::{ChatMessage, ChatRequest, LlmProvider, ProviderError, Role};
use self::postprocess::Postprocessed;

/// Setting key for the reply sent to unauthorized private-chat senders.
pub const SETTING_PRIVATE_DENIED: &str = "private_chat_disallowed_message";
/// Setting key for the reply sent when a turn fails internally.
pub const SETTING_INTERNAL_ERROR: &str = "internal_error_message";

pub const DEFAULT_PRIVATE_DENIED: &str = "Sorry, you do not have permission to chat with me.";
pub const DEFAULT_INTERNAL_ERROR: &str =
    "An internal error occurred while processing your message.";

/// Host context required by the pipeline. Implemented by the binary's
/// `AppState`; kept as a trait so tests can wire an in-memory store and a
/// scripted provider.
pub trait TurnContext: Send + Sync {
    fn store(&self) -> &Store;
    fn provider(&self) -> &dyn LlmProvider;
    fn identity(&self) -> &BotIdentity;
    fn model(&self) -> &str;
    fn options(&self) -> &GenerationOptions;
    fn history_limit(&self) -> usize;
}

/// One validated inbound message, as handed over by the channel adapter.
#[derive(Debug, Clone)]
pub struct InboundTurn {
    pub chat_id: i64,
    pub kind: ChatKind,
    pub chat_name: String,
    pub sender_id: i64,
    pub sender_name: String,
    pub text: String,
}

/// What the adapter should do once a turn completes.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Relay this text as a reply, then call `record_reply`.
    Reply(String),
    /// Unauthorized private chat: relay this denial text, persist nothing.
    Denied(String),
    /// The turn ended with nothing to send.
    Silent(SilentReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilentReason {
    /// Unauthorized group chat, dropped without a reply (intentional
    /// asymmetry with private chats, to avoid noise in rooms).
    Unauthorized,
    /// Group message that does not open with the bot's handle.
    NotAddressed,
    /// The model returned the skip sentinel.
    Skipped,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("inference error: {0}")]
    Provider(#[from] ProviderError),
}

/// Run one full pipeline pass for a validated inbound message.
///
/// The inbound message is persisted before inference is attempted, so a
/// later failure still leaves it in the permanent record. Unauthorized
/// turns persist nothing.
pub async fn run_turn<C>(ctx: &C, turn: &InboundTurn) -> Result<TurnOutcome, PipelineError>
where
    C: TurnContext + ?Sized,
{
    match gate::authorize(ctx.store(), turn)? {
        gate::Verdict::Allowed => {}
        gate::Verdict::Denied { reply: Some(text) } => return Ok(TurnOutcome::Denied(text)),
        gate::Verdict::Denied { reply: None } => {
            return Ok(TurnOutcome::Silent(SilentReason::Unauthorized))
        }
    }

    // Prior turns only; the in-flight message is appended below as the
    // composed final turn, not read back from the store.
    let mut messages = assemble::assemble_context(
        ctx.store(),
        turn.chat_id,
        ctx.history_limit(),
        ctx.identity().user_id,
    )?;

    ctx.store().append_history(
        turn.chat_id,
        &turn.chat_name,
        turn.sender_id,
        &turn.sender_name,
        &turn.text,
    )?;

    if !turn.kind.is_private() && !addresses_bot(&turn.text, &ctx.identity().username) {
        debug!(chat_id = turn.chat_id, "group message does not address the bot");
        return Ok(TurnOutcome::Silent(SilentReason::NotAddressed));
    }

    let instructions = ctx.store().instructions(turn.chat_id)?;
    messages.push(ChatMessage {
        role: Role::User,
        content: format!("{instructions}\n\n{}: {}", turn.sender_name, turn.text),
    });

    info!(
        chat_id = turn.chat_id,
        context_len = messages.len(),
        "generating response"
    );

    let request = ChatRequest {
        model: ctx.model().to_string(),
        options: ctx.options().clone(),
        messages,
    };
    let response = ctx.provider().send(&request).await?;

    match postprocess::postprocess(&response.content) {
        Postprocessed::Skip => Ok(TurnOutcome::Silent(SilentReason::Skipped)),
        Postprocessed::Text(text) => Ok(TurnOutcome::Reply(text)),
    }
}

/// Persist a relayed reply as an outbound history entry attributed to the
/// bot. Call only after the channel send succeeded.
pub fn record_reply<C>(ctx: &C, turn: &InboundTurn, text: &str) -> Result<(), StoreError>
where
    C: TurnContext + ?Sized,
{
    let me = ctx.identity();
    ctx.store()
        .append_history(turn.chat_id, &turn.chat_name, me.user_id, &me.full_name, text)
}

/// Resolve the user-facing internal-error reply. Falls back to the
/// built-in text when the setting is unset or the store itself fails.
pub fn internal_error_reply<C>(ctx: &C) -> String
where
    C: TurnContext + ?Sized,
{
    ctx.store()
        .get_setting(SETTING_INTERNAL_ERROR)
        .ok()
        .flatten()
        .unwrap_or_else(|| DEFAULT_INTERNAL_ERROR.to_string())
}

/// Mention gate: `true` when the text opens with `@{username}`.
///
/// Case-insensitive strict prefix: text following the handle (including
/// punctuation) does not affect the match.
pub fn addresses_bot(text: &str, username: &str) -> bool {
    if username.is_empty() {
        return false;
    }
    let mention = format!("@{}", username.to_lowercase());
    text.to_lowercase().starts_with(&mention)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rusqlite::Connection;

    use crate::provider::ChatResponse;

    struct ScriptedProvider {
        reply: Option<String>,
        calls: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedProvider {
        fn replying(text: &str) -> Self {
            Self {
                reply: Some(text.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn last_request(&self) -> ChatRequest {
            self.calls.lock().unwrap().last().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            self.calls.lock().unwrap().push(req.clone());
            match &self.reply {
                Some(text) => Ok(ChatResponse {
                    content: text.clone(),
                }),
                None => Err(ProviderError::Unavailable("connection refused".into())),
            }
        }
    }

    struct TestCtx {
        store: Store,
        provider: ScriptedProvider,
        identity: BotIdentity,
        options: GenerationOptions,
    }

    impl TurnContext for TestCtx {
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
            "llama3.2"
        }
        fn options(&self) -> &GenerationOptions {
            &self.options
        }
        fn history_limit(&self) -> usize {
            1000
        }
    }

    const BOT_ID: i64 = 999;

    /// Allowlists have no mutation API in the core (operator-provisioned),
    /// so tests seed rows on the raw connection before wrapping it.
    fn test_ctx(
        provider: ScriptedProvider,
        allowed_groups: &[i64],
        allowed_users: &[i64],
    ) -> TestCtx {
        let conn = Connection::open_in_memory().unwrap();
        ollagram_store::db::init_db(&conn).unwrap();
        for chat_id in allowed_groups {
            conn.execute(
                "INSERT INTO allowed_groups (chat_id, chat_name) VALUES (?1, 'room')",
                rusqlite::params![chat_id],
            )
            .unwrap();
        }
        for user_id in allowed_users {
            conn.execute(
                "INSERT INTO allowed_users (user_id, user_name) VALUES (?1, 'alice')",
                rusqlite::params![user_id],
            )
            .unwrap();
        }
        TestCtx {
            store: Store::new(conn),
            provider,
            identity: BotIdentity {
                user_id: BOT_ID,
                username: "botname".to_string(),
                full_name: "Olla Gram".to_string(),
            },
            options: GenerationOptions::default(),
        }
    }

    fn group_turn(chat_id: i64, text: &str) -> InboundTurn {
        InboundTurn {
            chat_id,
            kind: ChatKind::Group,
            chat_name: "room".to_string(),
            sender_id: 7,
            sender_name: "Alice Smith".to_string(),
            text: text.to_string(),
        }
    }

    fn private_turn(sender_id: i64, text: &str) -> InboundTurn {
        InboundTurn {
            chat_id: sender_id,
            kind: ChatKind::Private,
            chat_name: "Private Chat with Alice Smith".to_string(),
            sender_id,
            sender_name: "Alice Smith".to_string(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn unauthorized_private_chat_gets_denial_and_no_side_effects() {
        let ctx = test_ctx(ScriptedProvider::replying("unused"), &[], &[]);
        let turn = private_turn(7, "hello");

        let outcome = run_turn(&ctx, &turn).await.unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Denied(DEFAULT_PRIVATE_DENIED.to_string())
        );
        assert_eq!(ctx.provider.call_count(), 0);
        assert!(ctx.store.get_history(turn.chat_id, 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn denial_text_comes_from_setting_when_configured() {
        let ctx = test_ctx(ScriptedProvider::replying("unused"), &[], &[]);
        ctx.store
            .set_setting(SETTING_PRIVATE_DENIED, "Ask the admin for access.")
            .unwrap();

        let outcome = run_turn(&ctx, &private_turn(7, "hello")).await.unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Denied("Ask the admin for access.".to_string())
        );
    }

    #[tokio::test]
    async fn unauthorized_group_chat_is_silently_dropped() {
        let ctx = test_ctx(ScriptedProvider::replying("unused"), &[], &[]);
        let turn = group_turn(-100, "@botname hi");

        let outcome = run_turn(&ctx, &turn).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Silent(SilentReason::Unauthorized));
        assert_eq!(ctx.provider.call_count(), 0);
        assert!(ctx.store.get_history(-100, 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn group_message_without_mention_is_persisted_but_not_answered() {
        let ctx = test_ctx(ScriptedProvider::replying("unused"), &[-100], &[]);
        let turn = group_turn(-100, "just chatting");

        let outcome = run_turn(&ctx, &turn).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Silent(SilentReason::NotAddressed));
        assert_eq!(ctx.provider.call_count(), 0);

        let history = ctx.store.get_history(-100, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].message, "just chatting");
        assert_eq!(history[0].user_id, 7);
    }

    #[tokio::test]
    async fn group_mention_runs_inference_with_window_plus_composed_turn() {
        let ctx = test_ctx(
            ScriptedProvider::replying("<think>x</think> Hello!"),
            &[-100],
            &[],
        );

        // Seed prior turns: one from another user, one from the bot.
        ctx.store
            .append_history(-100, "room", 5, "Bob Jones", "earlier message")
            .unwrap();
        ctx.store
            .append_history(-100, "room", BOT_ID, "Olla Gram", "earlier reply")
            .unwrap();

        let turn = group_turn(-100, "@botname hi");
        let outcome = run_turn(&ctx, &turn).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Reply("Hello!".to_string()));

        let req = ctx.provider.last_request();
        assert_eq!(req.model, "llama3.2");
        assert_eq!(req.messages.len(), 3);
        assert_eq!(req.messages[0].role, Role::User);
        assert_eq!(req.messages[0].content, "Bob Jones: earlier message");
        assert_eq!(req.messages[1].role, Role::Assistant);
        assert_eq!(req.messages[1].content, "earlier reply");
        assert_eq!(req.messages[2].role, Role::User);
        let expected_prompt = format!(
            "{}\n\nAlice Smith: @botname hi",
            ollagram_store::store::DEFAULT_INSTRUCTIONS
        );
        assert_eq!(req.messages[2].content, expected_prompt);

        // Outbound entry only lands once the adapter reports the send.
        assert_eq!(ctx.store.get_history(-100, 10).unwrap().len(), 3);
        record_reply(&ctx, &turn, "Hello!").unwrap();
        let history = ctx.store.get_history(-100, 10).unwrap();
        assert_eq!(history.len(), 4);
        let last = history.last().unwrap();
        assert_eq!(last.user_id, BOT_ID);
        assert_eq!(last.full_name, "Olla Gram");
        assert_eq!(last.message, "Hello!");
    }

    #[tokio::test]
    async fn skip_sentinel_suppresses_reply() {
        let ctx = test_ctx(ScriptedProvider::replying("<skip>"), &[-100], &[]);

        let outcome = run_turn(&ctx, &group_turn(-100, "@botname hi")).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Silent(SilentReason::Skipped));
        // Inbound is persisted; no outbound entry.
        assert_eq!(ctx.store.get_history(-100, 10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn provider_failure_leaves_inbound_persisted() {
        let ctx = test_ctx(ScriptedProvider::failing(), &[-100], &[]);

        let result = run_turn(&ctx, &group_turn(-100, "@botname hi")).await;
        assert!(matches!(result, Err(PipelineError::Provider(_))));

        let history = ctx.store.get_history(-100, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].message, "@botname hi");
    }

    #[tokio::test]
    async fn private_chat_skips_mention_gate() {
        let ctx = test_ctx(ScriptedProvider::replying("Sure."), &[], &[7]);

        let outcome = run_turn(&ctx, &private_turn(7, "no mention here"))
            .await
            .unwrap();
        assert_eq!(outcome, TurnOutcome::Reply("Sure.".to_string()));
        assert_eq!(ctx.provider.call_count(), 1);
    }

    #[test]
    fn internal_error_reply_prefers_setting() {
        let ctx = test_ctx(ScriptedProvider::replying("unused"), &[], &[]);
        assert_eq!(internal_error_reply(&ctx), DEFAULT_INTERNAL_ERROR);
        ctx.store
            .set_setting(SETTING_INTERNAL_ERROR, "Something broke, sorry.")
            .unwrap();
        assert_eq!(internal_error_reply(&ctx), "Something broke, sorry.");
    }

    #[test]
    fn mention_is_case_insensitive_strict_prefix() {
        assert!(addresses_bot("@botname hi", "botname"));
        assert!(addresses_bot("@BotName hi", "botname"));
        assert!(addresses_bot("@botname, hi", "botname"));
        assert!(addresses_bot("@botname", "botname"));
        assert!(!addresses_bot("hi @botname", "botname"));
        assert!(!addresses_bot("botname hi", "botname"));
        assert!(!addresses_bot("@botnam hi", "botname"));
        assert!(!addresses_bot("@other hi", "botname"));
        assert!(!addresses_bot("@botname hi", ""));
    }
}
