// Clutchify Settings Module
// Resolves the device pattern and the two tap keys from CLI, file and defaults

use std::fmt;
use std::path::{Path, PathBuf};

use crate::key::key_from_name;

/// Device pattern used when none is configured
pub const DEFAULT_DEVICE_PATTERN: &str = "FootSwitch";

/// Keys used by the older `--down`/`--up` flags when one is omitted
pub const DEFAULT_DOWN_KEY: &str = "F11";
pub const DEFAULT_UP_KEY: &str = "F12";

/// Errors that can occur when loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("Invalid keys: {0}")]
    InvalidKeys(String),
}

/// The keys tapped on press (`down`) and on release (`up`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapKeys {
    pub down: String,
    pub up: String,
}

impl TapKeys {
    pub fn new(down: impl Into<String>, up: impl Into<String>) -> Self {
        Self {
            down: down.into(),
            up: up.into(),
        }
    }

    /// Expand `--keys` style tokens.
    ///
    /// * one preset name expands to its pair
    /// * one other token is used for both down and up
    /// * two tokens are (down, up)
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Self, SettingsError> {
        match tokens {
            [single] => {
                let single = single.as_ref().trim();
                if single.is_empty() {
                    return Err(SettingsError::InvalidKeys("empty key name".to_string()));
                }
                Ok(match KeyPreset::from_name(single) {
                    Some(preset) => preset.keys(),
                    None => Self::new(single, single),
                })
            }
            [down, up] => {
                let (down, up) = (down.as_ref().trim(), up.as_ref().trim());
                if down.is_empty() || up.is_empty() {
                    return Err(SettingsError::InvalidKeys("empty key name".to_string()));
                }
                Ok(Self::new(down, up))
            }
            _ => Err(SettingsError::InvalidKeys(format!(
                "expected one or two keys, got {}",
                tokens.len()
            ))),
        }
    }

    /// Names that the key table does not know
    pub fn unknown(&self) -> Vec<&str> {
        [self.down.as_str(), self.up.as_str()]
            .into_iter()
            .filter(|name| key_from_name(name).is_none())
            .collect()
    }
}

impl Default for TapKeys {
    fn default() -> Self {
        KeyPreset::default().keys()
    }
}

impl fmt::Display for TapKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "down={} up={}", self.down, self.up)
    }
}

/// Named key pairs accepted by `--keys`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyPreset {
    /// vim insert on press, escape on release
    Legacy,
    #[default]
    FLow,
    FHigh,
    /// push-to-talk: mic mute toggled on both edges
    Ptt,
}

impl KeyPreset {
    pub const ALL: [KeyPreset; 4] = [
        KeyPreset::Legacy,
        KeyPreset::FLow,
        KeyPreset::FHigh,
        KeyPreset::Ptt,
    ];

    pub fn name(self) -> &'static str {
        match self {
            KeyPreset::Legacy => "legacy",
            KeyPreset::FLow => "f-low",
            KeyPreset::FHigh => "f-high",
            KeyPreset::Ptt => "ptt",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|preset| preset.name() == name)
    }

    pub fn keys(self) -> TapKeys {
        match self {
            KeyPreset::Legacy => TapKeys::new("i", "esc"),
            KeyPreset::FLow => TapKeys::new("F11", "F12"),
            KeyPreset::FHigh => TapKeys::new("F23", "F24"),
            KeyPreset::Ptt => TapKeys::new("micmute", "micmute"),
        }
    }
}

/// `keys` in the config file: a single token or a list
#[derive(Debug, Clone, serde::Deserialize, PartialEq)]
#[serde(untagged)]
enum KeysValue {
    One(String),
    Many(Vec<String>),
}

/// TOML representation of the optional config file
#[derive(Debug, Clone, serde::Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    device: Option<String>,

    #[serde(default)]
    keys: Option<KeysValue>,

    /// Path the file was read from
    #[serde(skip)]
    source_path: Option<PathBuf>,
}

impl ConfigFile {
    /// Load settings from TOML string
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        toml::from_str(content).map_err(|e| SettingsError::TomlParse(e.to_string()))
    }

    /// Load settings from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(&path)?;
        let mut file = Self::from_toml(&content)?;
        file.source_path = Some(path.as_ref().to_path_buf());
        Ok(file)
    }

    /// Get the default config path (~/.config/clutchify/config.toml)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("clutchify").join("config.toml"))
    }

    /// Load from the default location, or an empty file if there is none
    pub fn load_default() -> Result<Self, SettingsError> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::from_file(path);
            }
        }
        Ok(Self::default())
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    fn tap_keys(&self) -> Result<Option<TapKeys>, SettingsError> {
        match &self.keys {
            None => Ok(None),
            Some(KeysValue::One(token)) => {
                let tokens: Vec<&str> = token.split(',').collect();
                TapKeys::from_tokens(&tokens).map(Some)
            }
            Some(KeysValue::Many(tokens)) => TapKeys::from_tokens(tokens).map(Some),
        }
    }
}

/// Values given on the command line; `None`/empty means "not given"
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub device: Option<String>,
    pub keys: Vec<String>,
    pub down: Option<String>,
    pub up: Option<String>,
}

/// Fully resolved configuration, read-only once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub device_pattern: String,
    pub keys: TapKeys,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_pattern: DEFAULT_DEVICE_PATTERN.to_string(),
            keys: TapKeys::default(),
        }
    }
}

impl Config {
    /// Merge CLI overrides over the config file over built-in defaults.
    ///
    /// Key precedence: `--keys`, then `--down`/`--up` (each falling back to
    /// F11/F12), then the file's `keys`, then the `f-low` preset.
    pub fn resolve(overrides: ConfigOverrides, file: &ConfigFile) -> Result<Self, SettingsError> {
        let device_pattern = overrides
            .device
            .or_else(|| file.device.clone())
            .unwrap_or_else(|| DEFAULT_DEVICE_PATTERN.to_string());

        let keys = if !overrides.keys.is_empty() {
            TapKeys::from_tokens(&overrides.keys)?
        } else if overrides.down.is_some() || overrides.up.is_some() {
            TapKeys::new(
                overrides.down.unwrap_or_else(|| DEFAULT_DOWN_KEY.to_string()),
                overrides.up.unwrap_or_else(|| DEFAULT_UP_KEY.to_string()),
            )
        } else {
            file.tap_keys()?.unwrap_or_default()
        };

        for name in keys.unknown() {
            log::warn!("Key \"{}\" is not a known key name; tapping it will fail", name);
        }

        Ok(Self {
            device_pattern,
            keys,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_presets_expand() {
        assert_eq!(TapKeys::from_tokens(&["legacy"]).unwrap(), TapKeys::new("i", "esc"));
        assert_eq!(TapKeys::from_tokens(&["f-low"]).unwrap(), TapKeys::new("F11", "F12"));
        assert_eq!(TapKeys::from_tokens(&["f-high"]).unwrap(), TapKeys::new("F23", "F24"));
        assert_eq!(
            TapKeys::from_tokens(&["ptt"]).unwrap(),
            TapKeys::new("micmute", "micmute")
        );
    }

    #[test]
    fn test_single_token_is_duplicated() {
        assert_eq!(
            TapKeys::from_tokens(&["micmute"]).unwrap(),
            TapKeys::new("micmute", "micmute")
        );
    }

    #[test]
    fn test_two_tokens_are_down_up() {
        assert_eq!(TapKeys::from_tokens(&["F23", "F24"]).unwrap(), TapKeys::new("F23", "F24"));
        // Preset names are only expanded when given alone
        assert_eq!(
            TapKeys::from_tokens(&["legacy", "ptt"]).unwrap(),
            TapKeys::new("legacy", "ptt")
        );
    }

    #[test]
    fn test_bad_token_counts() {
        assert!(TapKeys::from_tokens::<&str>(&[]).is_err());
        assert!(TapKeys::from_tokens(&["a", "b", "c"]).is_err());
        assert!(TapKeys::from_tokens(&[" "]).is_err());
    }

    #[test]
    fn test_default_keys_are_f_low() {
        assert_eq!(TapKeys::default(), TapKeys::new("F11", "F12"));
        assert_eq!(KeyPreset::default(), KeyPreset::FLow);
    }

    #[test]
    fn test_unknown_keys() {
        assert!(TapKeys::new("F11", "esc").unknown().is_empty());
        assert_eq!(TapKeys::new("F11", "bogus").unknown(), vec!["bogus"]);
    }

    #[test]
    fn test_preset_names_round_trip() {
        for preset in KeyPreset::ALL {
            assert_eq!(KeyPreset::from_name(preset.name()), Some(preset));
        }
        assert_eq!(KeyPreset::from_name("F-LOW"), None);
    }

    #[test]
    fn test_resolve_defaults() {
        let config = Config::resolve(ConfigOverrides::default(), &ConfigFile::default()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.device_pattern, "FootSwitch");
        assert_eq!(config.keys, TapKeys::new("F11", "F12"));
    }

    #[test]
    fn test_resolve_down_up_flags() {
        let overrides = ConfigOverrides {
            device: Some("1a86:e026".to_string()),
            down: Some("micmute".to_string()),
            up: Some("micmute".to_string()),
            ..Default::default()
        };
        let config = Config::resolve(overrides, &ConfigFile::default()).unwrap();
        assert_eq!(config.device_pattern, "1a86:e026");
        assert_eq!(config.keys, TapKeys::new("micmute", "micmute"));
    }

    #[test]
    fn test_resolve_partial_down_up_uses_legacy_defaults() {
        let overrides = ConfigOverrides {
            up: Some("esc".to_string()),
            ..Default::default()
        };
        let config = Config::resolve(overrides, &ConfigFile::default()).unwrap();
        assert_eq!(config.keys, TapKeys::new("F11", "esc"));
    }

    #[test]
    fn test_resolve_keys_beat_file() {
        let file = ConfigFile::from_toml("device = \"Pedal\"\nkeys = \"ptt\"\n").unwrap();
        let overrides = ConfigOverrides {
            keys: tokens(&["legacy"]),
            ..Default::default()
        };
        let config = Config::resolve(overrides, &file).unwrap();
        assert_eq!(config.device_pattern, "Pedal");
        assert_eq!(config.keys, TapKeys::new("i", "esc"));
    }

    #[test]
    fn test_resolve_from_file() {
        let file = ConfigFile::from_toml("keys = [\"F23\", \"F24\"]\n").unwrap();
        let config = Config::resolve(ConfigOverrides::default(), &file).unwrap();
        assert_eq!(config.keys, TapKeys::new("F23", "F24"));
        assert_eq!(config.device_pattern, DEFAULT_DEVICE_PATTERN);
    }

    #[test]
    fn test_file_keys_string_accepts_comma_list() {
        let file = ConfigFile::from_toml("keys = \"i,esc\"\n").unwrap();
        let config = Config::resolve(ConfigOverrides::default(), &file).unwrap();
        assert_eq!(config.keys, TapKeys::new("i", "esc"));
    }

    #[test]
    fn test_file_rejects_unknown_fields() {
        let err = ConfigFile::from_toml("devices = \"x\"\n").unwrap_err();
        assert!(matches!(err, SettingsError::TomlParse(_)));
    }

    #[test]
    fn test_file_from_disk() {
        let path = std::env::temp_dir().join(format!(
            "clutchify-settings-test-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "device = \"^HID\"\n").unwrap();
        let file = ConfigFile::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(file.device(), Some("^HID"));
        assert_eq!(file.source_path(), Some(path.as_path()));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ConfigFile::from_file("/nonexistent/clutchify/config.toml").unwrap_err();
        assert!(matches!(err, SettingsError::Io(_)));
    }
}
