//! Events the daemon reports
//!
//! Written to stdout as one JSON object per line.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeyEvent {
    /// A key consumed by the event tap
    Symbol { symbol: String },

    /// A bound global hotkey was pressed
    Hotkey { action: String, hotkey: String },

    /// The event tap started consuming keys
    TapEnabled,

    /// The event tap stopped consuming keys
    TapDisabled,
}

impl KeyEvent {
    pub fn symbol(symbol: &str) -> Self {
        Self::Symbol {
            symbol: symbol.to_owned(),
        }
    }

    /// Serialize as a single JSON line, without the trailing newline
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl std::fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyEvent::Symbol { symbol } => write!(f, "SYMBOL {:?}", symbol),
            KeyEvent::Hotkey { action, hotkey } => write!(f, "HOTKEY {} ({})", action, hotkey),
            KeyEvent::TapEnabled => write!(f, "TAP_ENABLED"),
            KeyEvent::TapDisabled => write!(f, "TAP_DISABLED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = KeyEvent::Hotkey {
            action: "activate".to_owned(),
            hotkey: "Cmd+Shift+Space".to_owned(),
        };
        let json = event.to_json_line().unwrap();
        assert!(json.contains(r#""type":"hotkey""#));
        assert!(json.contains("Cmd+Shift+Space"));
        assert!(!json.contains('\n'));
    }

    #[test]
    fn test_control_characters_stay_on_one_line() {
        let json = KeyEvent::symbol("\r").to_json_line().unwrap();
        assert_eq!(json, r#"{"type":"symbol","symbol":"\r"}"#);
    }

    #[test]
    fn test_event_deserialization() {
        let event: KeyEvent = serde_json::from_str(r#"{"type":"tap_enabled"}"#).unwrap();
        assert_eq!(event, KeyEvent::TapEnabled);
    }

    #[test]
    fn test_display() {
        assert_eq!(KeyEvent::symbol("a").to_string(), r#"SYMBOL "a""#);
        assert_eq!(KeyEvent::TapDisabled.to_string(), "TAP_DISABLED");
    }
}
