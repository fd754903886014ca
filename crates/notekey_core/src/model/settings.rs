//! User preference mapping.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_FONT: &str = "Lexend";
pub const DEFAULT_PANEL_WIDTH: u32 = 400;

/// Flat preference mapping. Updates merge key by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(Map<String, Value>);

impl Default for Settings {
    fn default() -> Self {
        let mut values = Map::new();
        values.insert("defaultFont".to_string(), Value::from(DEFAULT_FONT));
        values.insert("panelWidth".to_string(), Value::from(DEFAULT_PANEL_WIDTH));
        Self(values)
    }
}

impl Settings {
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self(values)
    }

    /// Merges `update` into these settings; keys absent from `update` keep
    /// their current value.
    pub fn merge(&mut self, update: &Settings) {
        for (key, value) in &update.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn default_font(&self) -> &str {
        self.0
            .get("defaultFont")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_FONT)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::{Settings, DEFAULT_FONT};
    use serde_json::json;

    #[test]
    fn merge_keeps_untouched_keys() {
        let mut settings = Settings::default();
        let update: Settings = serde_json::from_value(json!({ "defaultFont": "Inter" })).unwrap();
        settings.merge(&update);
        assert_eq!(settings.default_font(), "Inter");
        assert_eq!(settings.get("panelWidth"), Some(&json!(400)));
    }

    #[test]
    fn defaults_expose_font() {
        assert_eq!(Settings::default().default_font(), DEFAULT_FONT);
    }
}
