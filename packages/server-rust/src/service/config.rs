/// Characters stripped from both ends of an inbound action string.
pub const DEFAULT_ACTION_TRIM_CHARS: &str = "\n\t' \"";

/// Dispatcher-level configuration.
///
/// Controls how inbound action strings are normalised and whether messages
/// without one may be routed by their payload root element.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Characters trimmed (repeatedly) from both ends of the action string.
    pub action_trim_chars: String,
    /// Route messages without an action by the local name of their payload root.
    pub payload_root_fallback: bool,
}

impl DispatchConfig {
    /// Normalise a raw action string. Returns `None` when nothing is left.
    #[must_use]
    pub fn normalize_action<'a>(&self, raw: &'a str) -> Option<&'a str> {
        trim_action(raw, &self.action_trim_chars)
    }
}

/// Strips `trim_chars` from both ends of `raw`. `None` when nothing is left.
pub(crate) fn trim_action<'a>(raw: &'a str, trim_chars: &str) -> Option<&'a str> {
    let trimmed = raw.trim_matches(|c: char| trim_chars.contains(c));
    (!trimmed.is_empty()).then_some(trimmed)
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            action_trim_chars: DEFAULT_ACTION_TRIM_CHARS.to_string(),
            payload_root_fallback: true,
        }
    }
}
