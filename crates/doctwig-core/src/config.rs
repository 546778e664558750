//! Repair and parse configuration
//!
//! The repair engine is driven entirely by [`RepairConfig`]: which wrapper
//! tags may be stripped, which tags are dropped once empty, how tag-wrapping
//! keywords map to their target element, and the optional XML healing pass.
//! Configurations load from TOML; missing keys fall back to the defaults.
//!
//! ```
//! use doctwig_core::RepairConfig;
//!
//! let config = RepairConfig::from_toml_str(r#"
//!     strip_wrappers = ["text:span", "text:p"]
//!     wrap_trials = 6
//!
//!     [wrap_targets]
//!     for = "table:table-row"
//! "#).unwrap();
//!
//! assert!(config.strip_wrappers.contains("text:p"));
//! assert_eq!(config.wrap_target("for"), Some("table:table-row"));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Settings of the structural repair engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    /// Element names that are stripped when they only wrap a code node
    pub strip_wrappers: BTreeSet<String>,
    /// Element names removed after repair when they have no children left
    pub remove_empty: BTreeSet<String>,
    /// Keywords whose members must share the identical parent element,
    /// not just a parent with the same name
    pub exact_parent: BTreeSet<String>,
    /// Keyword to element name; a two-member relation with such a keyword
    /// is moved around the nearest element of that name
    pub wrap_targets: BTreeMap<String, String>,
    /// Maximum number of measurement steps when looking for a wrap target
    pub wrap_trials: usize,
    /// Move members of a crossing relation out to their common depth
    pub relocate: bool,
    /// Insert `{% import _self as macros %}` after the first macro definition
    pub import_macros: bool,
    /// Optional well-formedness healing after the repair passes
    pub heal_xml: XmlHealing,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            strip_wrappers: BTreeSet::new(),
            remove_empty: BTreeSet::new(),
            exact_parent: names(&["block", "macro"]),
            wrap_targets: BTreeMap::new(),
            wrap_trials: 4,
            relocate: true,
            import_macros: true,
            heal_xml: XmlHealing::default(),
        }
    }
}

impl RepairConfig {
    /// Parse a configuration from a TOML string
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Preset for OpenDocument text (`content.xml` / `styles.xml`)
    pub fn odt() -> Self {
        Self {
            strip_wrappers: names(&["text:span", "text:p"]),
            remove_empty: names(&["text:span"]),
            wrap_targets: BTreeMap::from([("for".to_string(), "table:table-row".to_string())]),
            ..Self::default()
        }
    }

    /// Preset for WordprocessingML (`word/document.xml` and friends)
    pub fn docx() -> Self {
        Self {
            strip_wrappers: names(&["w:t", "w:r", "w:p"]),
            remove_empty: names(&["w:r"]),
            wrap_targets: BTreeMap::from([("for".to_string(), "w:tr".to_string())]),
            ..Self::default()
        }
    }

    /// Reject settings the engine cannot act on
    pub fn validate(&self) -> Result<()> {
        if !self.wrap_targets.is_empty() && self.wrap_trials == 0 {
            return Err(Error::InvalidConfig(
                "wrap_trials must be at least 1 when wrap_targets are configured".to_string(),
            ));
        }
        let blank = self.wrap_targets.iter().find(|(_, t)| t.trim().is_empty());
        if let Some((keyword, _)) = blank {
            let message = format!("wrap target for '{}' is empty", keyword);
            return Err(Error::InvalidConfig(message));
        }
        Ok(())
    }

    /// Element name a relation opened by `keyword` should be wrapped around
    pub fn wrap_target(&self, keyword: &str) -> Option<&str> {
        self.wrap_targets.get(keyword).map(String::as_str)
    }

    /// Whether relations opened by `keyword` need the identical parent
    pub fn requires_exact_parent(&self, keyword: &str) -> bool {
        self.exact_parent.contains(keyword)
    }
}

fn names(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|name| name.to_string()).collect()
}

/// Post-repair well-formedness healing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XmlHealing {
    /// Run the healing pass at all
    pub enabled: bool,
    /// Drop start tags that were never closed instead of closing them
    pub drop_unclosed_start: bool,
    /// Drop end tags that never had a start instead of opening them
    pub drop_orphan_end: bool,
}

/// Options for reading a template part
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Charset used when the input carries no usable declaration
    pub default_encoding: &'static Encoding,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            default_encoding: encoding_rs::UTF_8,
        }
    }
}

impl ParseOptions {
    /// Options with the default charset given by a WHATWG label
    pub fn with_default_charset(label: &str) -> Result<Self> {
        let encoding = Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| Error::UnknownCharset(label.to_string()))?;
        Ok(Self {
            default_encoding: encoding,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RepairConfig::default();
        assert!(config.relocate);
        assert!(config.import_macros);
        assert_eq!(config.wrap_trials, 4);
        assert!(config.requires_exact_parent("block"));
        assert!(config.requires_exact_parent("macro"));
        assert!(!config.requires_exact_parent("if"));
        assert!(!config.heal_xml.enabled);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = RepairConfig::from_toml_str("").unwrap();
        assert_eq!(config, RepairConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = RepairConfig::from_toml_str(
            r#"
            relocate = false
            remove_empty = ["w:r"]

            [heal_xml]
            enabled = true
            drop_orphan_end = true
            "#,
        )
        .unwrap();

        assert!(!config.relocate);
        assert!(config.remove_empty.contains("w:r"));
        assert!(config.heal_xml.enabled);
        assert!(config.heal_xml.drop_orphan_end);
        assert!(!config.heal_xml.drop_unclosed_start);
        // Untouched keys keep their defaults
        assert_eq!(config.wrap_trials, 4);
    }

    #[test]
    fn test_zero_trials_rejected() {
        let err = RepairConfig::from_toml_str(
            r#"
            wrap_trials = 0
            [wrap_targets]
            for = "w:tr"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let err = RepairConfig::from_toml_str("wrap_trials = \"many\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_odt_preset() {
        let config = RepairConfig::odt();
        assert!(config.strip_wrappers.contains("text:span"));
        assert!(config.strip_wrappers.contains("text:p"));
        assert_eq!(config.wrap_target("for"), Some("table:table-row"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrips_through_toml() {
        let config = RepairConfig::docx();
        let text = toml::to_string(&config).unwrap();
        let parsed = RepairConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_parse_options_label() {
        let options = ParseOptions::with_default_charset("latin1").unwrap();
        assert_eq!(options.default_encoding, encoding_rs::WINDOWS_1252);

        assert!(ParseOptions::with_default_charset("no-such-charset").is_err());
        assert_eq!(ParseOptions::default().default_encoding, encoding_rs::UTF_8);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repair.toml");
        std::fs::write(&path, "relocate = false\nremove_empty = [\"w:r\"]\n").unwrap();

        let config = RepairConfig::load(&path).unwrap();
        assert!(!config.relocate);
        assert!(config.remove_empty.contains("w:r"));

        let missing = RepairConfig::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, Error::Io(_)));
    }
}
