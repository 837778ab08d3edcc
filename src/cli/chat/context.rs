use std::collections::HashMap;

pub const LOCATION: &str = "location";
pub const PROMOTION: &str = "promotion";

/// Keys that are captured from user messages by keyword match.
const TRACKED_KEYS: [&str; 2] = [LOCATION, PROMOTION];

/// Sticky facts taken from what the user has said in this session.
///
/// A user message that mentions a tracked key anywhere (ignoring case) is
/// stored verbatim under that key. Later mentions overwrite earlier ones.
#[derive(Debug, Default, Clone)]
pub struct SessionContext {
    values: HashMap<String, String>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Record `text` under every tracked key it mentions.
    pub fn observe_user_text(&mut self, text: &str) {
        let lowered = text.to_lowercase();
        for key in TRACKED_KEYS {
            if lowered.contains(key) {
                tracing::debug!("Updating session context key '{}'", key);
                self.values.insert(key.to_string(), text.to_string());
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn location(&self) -> Option<&str> {
        self.get(LOCATION)
    }

    pub fn promotion(&self) -> Option<&str> {
        self.get(PROMOTION)
    }
}
