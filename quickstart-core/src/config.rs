//! The in-memory configuration store and its open/close lifecycle.
//!
//! A [`ConfigStore`] is parsed from a YAML document of nested sections and
//! addressed with dotted keys (`Video.Vulkan.Use_Custom_Driver`). Closing the
//! store serializes the whole tree back to YAML and leaves the store unusable:
//! any further entry access, including a second `close`, fails with
//! [`ConfigError::Closed`].
use serde_yaml::{Mapping, Value};
use thiserror::Error;

/// The template the onboarding flow starts from.
pub const DEFAULT_TEMPLATE: &str = include_str!("../assets/config.yml");

const KEY_SEPARATOR: char = '.';

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("configuration entry `{0}` not found")]
    KeyNotFound(String),
    #[error("configuration store is already closed")]
    Closed,
    #[error("failed to serialize configuration: {0}")]
    Serialize(String),
}

/// A string-keyed view over a YAML configuration tree.
#[derive(Debug)]
pub struct ConfigStore {
    root: Option<Mapping>,
}

impl ConfigStore {
    /// Parses a template or a previously serialized store.
    pub fn open_from_string(text: &str) -> Result<Self, ConfigError> {
        let value: Value =
            serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;

        match value {
            Value::Mapping(root) => Ok(Self { root: Some(root) }),
            Value::Null => Err(ConfigError::Parse("document is empty".to_string())),
            _ => Err(ConfigError::Parse(
                "document root must be a mapping of sections".to_string(),
            )),
        }
    }

    pub fn is_open(&self) -> bool {
        self.root.is_some()
    }

    /// Reads the scalar stored under `key` as a string.
    pub fn load_entry(&self, key: &str) -> Result<String, ConfigError> {
        let root = self.root.as_ref().ok_or(ConfigError::Closed)?;

        let mut node: Option<&Value> = None;
        let mut section = root;
        let mut segments = key.split(KEY_SEPARATOR).peekable();
        while let Some(segment) = segments.next() {
            let value = section
                .get(segment)
                .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;
            if segments.peek().is_none() {
                node = Some(value);
                break;
            }
            section = value
                .as_mapping()
                .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;
        }

        match node {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Bool(b)) => Ok(b.to_string()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(Value::Null) => Ok(String::new()),
            _ => Err(ConfigError::KeyNotFound(key.to_string())),
        }
    }

    /// Inserts or replaces the entry under `key`, creating missing sections.
    pub fn save_entry(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let root = self.root.as_mut().ok_or(ConfigError::Closed)?;

        let segments: Vec<&str> = key.split(KEY_SEPARATOR).collect();
        let Some((leaf, parents)) = segments.split_last() else {
            return Err(ConfigError::KeyNotFound(key.to_string()));
        };

        let mut section = root;
        for segment in parents {
            let child = section
                .entry(Value::String((*segment).to_string()))
                .or_insert_with(|| Value::Mapping(Mapping::new()));
            if !child.is_mapping() {
                *child = Value::Mapping(Mapping::new());
            }
            section = child
                .as_mapping_mut()
                .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;
        }

        section.insert(Value::String((*leaf).to_string()), scalar(value));
        Ok(())
    }

    /// Serializes the store and invalidates it for further access. A store
    /// that fails to serialize stays open.
    pub fn close(&mut self) -> Result<String, ConfigError> {
        let root = self.root.as_ref().ok_or(ConfigError::Closed)?;
        let text = serde_yaml::to_string(root).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        self.root = None;
        Ok(text)
    }
}

/// Keeps booleans and integers typed in the emitted YAML as long as their
/// textual form reads back unchanged.
fn scalar(value: &str) -> Value {
    match value {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = value.parse::<i64>() {
        if n.to_string() == value {
            return Value::Number(n.into());
        }
    }
    Value::String(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Core:
  Use_LLVM_CPU: ''
  Threads: 4
Video:
  Use_BGRA_Format: true
  Vulkan:
    Use_Custom_Driver: false
";

    #[test]
    fn loads_nested_scalars_as_strings() {
        let store = ConfigStore::open_from_string(SAMPLE).unwrap();
        assert_eq!(store.load_entry("Video.Use_BGRA_Format").unwrap(), "true");
        assert_eq!(store.load_entry("Core.Threads").unwrap(), "4");
        assert_eq!(store.load_entry("Core.Use_LLVM_CPU").unwrap(), "");
        assert_eq!(
            store.load_entry("Video.Vulkan.Use_Custom_Driver").unwrap(),
            "false"
        );
    }

    #[test]
    fn missing_and_non_scalar_keys_are_not_found() {
        let store = ConfigStore::open_from_string(SAMPLE).unwrap();
        assert!(matches!(
            store.load_entry("Video.Missing"),
            Err(ConfigError::KeyNotFound(_))
        ));
        assert!(matches!(
            store.load_entry("Video.Vulkan"),
            Err(ConfigError::KeyNotFound(_))
        ));
        assert!(matches!(
            store.load_entry("Core.Threads.Nested"),
            Err(ConfigError::KeyNotFound(_))
        ));
    }

    #[test]
    fn save_is_an_upsert_and_last_write_wins() {
        let mut store = ConfigStore::open_from_string(SAMPLE).unwrap();
        store.save_entry("Core.Use_LLVM_CPU", "cortex-a78").unwrap();
        store.save_entry("Core.Use_LLVM_CPU", "cortex-x1").unwrap();
        store.save_entry("Miscellaneous.Custom_Font_File_Path", "/fonts/a.ttf").unwrap();

        assert_eq!(store.load_entry("Core.Use_LLVM_CPU").unwrap(), "cortex-x1");
        assert_eq!(
            store.load_entry("Miscellaneous.Custom_Font_File_Path").unwrap(),
            "/fonts/a.ttf"
        );
    }

    #[test]
    fn serialized_form_reopens_with_the_same_entries() {
        let mut store = ConfigStore::open_from_string(SAMPLE).unwrap();
        store.save_entry("Video.Use_BGRA_Format", "false").unwrap();
        store.save_entry("Video.Texture_Upload_Mode", "CPU").unwrap();
        let text = store.close().unwrap();

        assert!(text.contains("Use_BGRA_Format: false"));
        let reopened = ConfigStore::open_from_string(&text).unwrap();
        assert_eq!(reopened.load_entry("Video.Use_BGRA_Format").unwrap(), "false");
        assert_eq!(reopened.load_entry("Video.Texture_Upload_Mode").unwrap(), "CPU");
        assert_eq!(reopened.load_entry("Core.Threads").unwrap(), "4");
    }

    #[test]
    fn closed_store_rejects_every_access() {
        let mut store = ConfigStore::open_from_string(SAMPLE).unwrap();
        let text = store.close().unwrap();
        assert!(!text.is_empty());
        assert!(!store.is_open());

        assert!(matches!(store.load_entry("Core.Threads"), Err(ConfigError::Closed)));
        assert!(matches!(
            store.save_entry("Core.Threads", "8"),
            Err(ConfigError::Closed)
        ));
        assert!(matches!(store.close(), Err(ConfigError::Closed)));
    }

    #[test]
    fn rejects_malformed_and_non_mapping_documents() {
        assert!(matches!(
            ConfigStore::open_from_string("Core: [unterminated"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ConfigStore::open_from_string("- a\n- b\n"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ConfigStore::open_from_string(""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn bundled_template_parses() {
        let store = ConfigStore::open_from_string(DEFAULT_TEMPLATE).unwrap();
        assert_eq!(
            store.load_entry("Video.Vulkan.Use_Custom_Driver").unwrap(),
            "false"
        );
    }

    #[test]
    fn keeps_leading_zero_numbers_as_text() {
        let mut store = ConfigStore::open_from_string(SAMPLE).unwrap();
        store.save_entry("Core.Mask", "007").unwrap();
        assert_eq!(store.load_entry("Core.Mask").unwrap(), "007");
    }
}
