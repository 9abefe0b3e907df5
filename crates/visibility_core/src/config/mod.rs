//! Configuration persistence
//!
//! Settings such as the cascade layout are owned by the caller's settings
//! layer; this trait gives any serializable settings struct TOML and RON
//! file support. The format follows the file extension.

use std::path::Path;

pub use serde::{Serialize, Deserialize};

/// On-disk settings formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.toml`
    Toml,
    /// `.ron`
    Ron,
}

impl ConfigFormat {
    /// Pick the format from a path's extension, ignoring case
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(Self::Toml),
            Some("ron") => Ok(Self::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Deserialize settings text
    pub fn parse<T: for<'de> Deserialize<'de>>(self, contents: &str) -> Result<T, ConfigError> {
        match self {
            Self::Toml => toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string())),
            Self::Ron => ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string())),
        }
    }

    /// Serialize settings as human-editable text
    pub fn render<T: Serialize>(self, value: &T) -> Result<String, ConfigError> {
        match self {
            Self::Toml => toml::to_string_pretty(value).map_err(|e| ConfigError::Serialize(e.to_string())),
            Self::Ron => ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string())),
        }
    }
}

/// Settings that can be read from and written to TOML or RON files
///
/// Missing fields fall back to `Default` when the implementor uses
/// `#[serde(default)]`.
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Read settings from `path`
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let contents = std::fs::read_to_string(path)?;
        format.parse(&contents)
    }

    /// Parse settings text in the format `path`'s extension names
    fn from_str_with_format(contents: &str, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        ConfigFormat::from_path(path)?.parse(contents)
    }

    /// Serialize settings in the format `path`'s extension names
    fn to_string_with_format(&self, path: impl AsRef<Path>) -> Result<String, ConfigError> {
        ConfigFormat::from_path(path)?.render(self)
    }

    /// Write settings to `path`
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let contents = self.to_string_with_format(path.as_ref())?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Reading or writing the settings file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Text did not match the settings layout
    #[error("Parse error: {0}")]
    Parse(String),

    /// Settings could not be written out
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Extension is neither `.toml` nor `.ron`
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Values parsed but failed validation
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_follows_extension() {
        assert_eq!(ConfigFormat::from_path("settings/culling.toml").unwrap(), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path("culling.RON").unwrap(), ConfigFormat::Ron);
        assert!(matches!(
            ConfigFormat::from_path("culling.json"),
            Err(ConfigError::UnsupportedFormat(_))
        ));
        assert!(ConfigFormat::from_path("culling").is_err());
    }

    #[test]
    fn test_parse_errors_are_reported() {
        let result: Result<u32, _> = ConfigFormat::Toml.parse("not = [valid");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
