//! Telegram context interface, re-exported from the shared pipeline.
//!
//! `BotAppContext` is an alias for `ollagram_agent::pipeline::TurnContext`;
//! the adapter stays a thin shell over the channel-agnostic pipeline.

pub use ollagram_agent::pipeline::TurnContext as BotAppContext;
