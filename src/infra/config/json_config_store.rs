// JSON file implementation of the core ConfigProvider.
//
// The whole document is kept in memory behind a lock and only re-read from
// disk on `reload`, so rules can read their settings on every message without
// touching the file system.

use crate::core::moderation::{ConfigError, ConfigProvider};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Section holding engine-wide settings.
pub const GENERAL_SECTION: &str = "general";
/// Section mapping bypass permissions to role ids.
pub const BYPASS_ROLES_SECTION: &str = "bypass_roles";

pub struct JsonConfigStore {
    path: PathBuf,
    document: RwLock<Value>,
}

/// The configuration written on first start.
pub fn default_document() -> Value {
    json!({
        "general": {
            "prefix": "[SafeChat]",
            "first_match_wins": false,
            "delete_violating_messages": true
        },
        "bypass_roles": {
            "safechat.bypass.address": [],
            "safechat.bypass.words": []
        },
        "address": {
            "enabled": true,
            "warning_enabled": true,
            "warning_messages": [
                "{prefix} {player}, advertising other servers or websites is not allowed."
            ],
            "punish_after": 3,
            "punish_command": "timeout {player_id} 600 Advertising",
            "allowed_domains": ["discord.com", "discord.gg/rust", "github.com"],
            "allowed_addresses": ["127.0.0.1"]
        },
        "words": {
            "enabled": true,
            "warning_enabled": true,
            "warning_messages": ["{prefix} {player}, watch your language."],
            "punish_after": 5,
            "punish_command": "timeout {player_id} 300 Language",
            "blocked_words": []
        }
    })
}

impl JsonConfigStore {
    /// Load the document at `path`, writing the default one first if the file
    /// doesn't exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::File::create(&path)?;
            serde_json::to_writer_pretty(file, &default_document())?;
            tracing::info!(path = %path.display(), "Wrote default moderation config");
        }

        let document = Self::read(&path)?;
        Ok(Self {
            path,
            document: RwLock::new(document),
        })
    }

    /// Build a store from an in-memory document. Nothing is read from disk
    /// until `reload`.
    #[cfg(test)]
    pub fn from_value(path: impl Into<PathBuf>, document: Value) -> Self {
        Self {
            path: path.into(),
            document: RwLock::new(document),
        }
    }

    fn read(path: &Path) -> Result<Value, ConfigError> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    /// Re-read the file. On error the previous document stays in place.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let fresh = Self::read(&self.path)?;
        *self.document.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        tracing::info!(path = %self.path.display(), "Reloaded moderation config");
        Ok(())
    }

    fn value(&self, section: &str, key: &str) -> Result<Value, ConfigError> {
        let document = self.document.read().unwrap_or_else(PoisonError::into_inner);
        document
            .get(section)
            .and_then(|s| s.get(key))
            .cloned()
            .ok_or_else(|| ConfigError::Missing {
                section: section.to_string(),
                key: key.to_string(),
            })
    }

    /// Bypass permission -> role ids allowed to bypass it.
    pub fn bypass_roles(&self) -> Result<HashMap<String, Vec<u64>>, ConfigError> {
        let document = self.document.read().unwrap_or_else(PoisonError::into_inner);
        let Some(section) = document.get(BYPASS_ROLES_SECTION).and_then(Value::as_object) else {
            return Ok(HashMap::new());
        };

        section
            .iter()
            .map(|(permission, roles)| -> Result<(String, Vec<u64>), ConfigError> {
                let ids = roles
                    .as_array()
                    .and_then(|items| items.iter().map(role_id).collect::<Option<Vec<u64>>>())
                    .ok_or_else(|| {
                        wrong_type(BYPASS_ROLES_SECTION, permission, "role id array")
                    })?;
                Ok((permission.clone(), ids))
            })
            .collect()
    }
}

/// Role ids may be written as numbers or, since Discord ids overflow
/// JavaScript numbers, as strings.
fn role_id(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn wrong_type(section: &str, key: &str, expected: &'static str) -> ConfigError {
    ConfigError::WrongType {
        section: section.to_string(),
        key: key.to_string(),
        expected,
    }
}

impl ConfigProvider for JsonConfigStore {
    fn get_bool(&self, section: &str, key: &str) -> Result<bool, ConfigError> {
        self.value(section, key)?
            .as_bool()
            .ok_or_else(|| wrong_type(section, key, "boolean"))
    }

    fn get_int(&self, section: &str, key: &str) -> Result<i64, ConfigError> {
        self.value(section, key)?
            .as_i64()
            .ok_or_else(|| wrong_type(section, key, "integer"))
    }

    fn get_string(&self, section: &str, key: &str) -> Result<String, ConfigError> {
        match self.value(section, key)? {
            Value::String(s) => Ok(s),
            _ => Err(wrong_type(section, key, "string")),
        }
    }

    fn get_strings(&self, section: &str, key: &str) -> Result<Vec<String>, ConfigError> {
        let value = self.value(section, key)?;
        value
            .as_array()
            .and_then(|items| {
                items
                    .iter()
                    .map(|v| v.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
            })
            .ok_or_else(|| wrong_type(section, key, "string array"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_default_document_on_first_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("safechat.json");

        let store = JsonConfigStore::open(&path).unwrap();

        assert!(path.exists());
        assert_eq!(store.get_string(GENERAL_SECTION, "prefix").unwrap(), "[SafeChat]");
        assert_eq!(store.get_int("address", "punish_after").unwrap(), 3);
        assert!(store.get_bool("address", "enabled").unwrap());
    }

    #[test]
    fn missing_and_mistyped_values_are_errors() {
        let store = JsonConfigStore::from_value(
            "unused.json",
            json!({ "address": { "enabled": "yes" } }),
        );

        assert!(matches!(
            store.get_bool("address", "enabled"),
            Err(ConfigError::WrongType { .. })
        ));
        assert!(matches!(
            store.get_int("address", "punish_after"),
            Err(ConfigError::Missing { .. })
        ));
        assert!(matches!(
            store.get_strings("nope", "allowed_domains"),
            Err(ConfigError::Missing { .. })
        ));
    }

    #[test]
    fn reload_picks_up_file_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("safechat.json");
        let store = JsonConfigStore::open(&path).unwrap();

        let mut document = default_document();
        document["address"]["punish_after"] = json!(7);
        std::fs::write(&path, serde_json::to_string(&document).unwrap()).unwrap();

        assert_eq!(store.get_int("address", "punish_after").unwrap(), 3);
        store.reload().unwrap();
        assert_eq!(store.get_int("address", "punish_after").unwrap(), 7);
    }

    #[test]
    fn broken_file_keeps_previous_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("safechat.json");
        let store = JsonConfigStore::open(&path).unwrap();

        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(store.reload(), Err(ConfigError::Parse(_))));
        assert!(store.get_bool("words", "enabled").unwrap());
    }

    #[test]
    fn bypass_roles_accept_numbers_and_strings() {
        let store = JsonConfigStore::from_value(
            "unused.json",
            json!({ "bypass_roles": { "safechat.bypass.address": [1, "1432001978447167611"] } }),
        );

        let roles = store.bypass_roles().unwrap();
        assert_eq!(
            roles["safechat.bypass.address"],
            vec![1, 1432001978447167611]
        );
    }

    #[test]
    fn bad_bypass_role_is_an_error() {
        let store = JsonConfigStore::from_value(
            "unused.json",
            json!({ "bypass_roles": { "safechat.bypass.words": ["moderators"] } }),
        );
        assert!(store.bypass_roles().is_err());
    }
}
