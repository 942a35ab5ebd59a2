//! Response post-processing: normalizes raw model output before relay.

/// Reserved output token: the model judged that no reply is warranted.
pub const SKIP_SENTINEL: &str = "<skip>";

/// Closing tag of an exposed reasoning block.
const REASONING_CLOSE: &str = "</think>";

/// Normalized model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Postprocessed {
    Text(String),
    /// Suppress the reply entirely; nothing is sent or persisted.
    Skip,
}

/// Trim, strip everything up to and including the last reasoning-close
/// tag, re-trim, then check for the skip sentinel.
pub fn postprocess(raw: &str) -> Postprocessed {
    let mut text = raw.trim();
    if let Some(idx) = text.rfind(REASONING_CLOSE) {
        text = text[idx + REASONING_CLOSE.len()..].trim();
    }
    if text == SKIP_SENTINEL {
        Postprocessed::Skip
    } else {
        Postprocessed::Text(text.to_string())
    }
}
