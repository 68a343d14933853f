//! Application configuration, loaded once at startup from a JSON file.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    pair: Option<String>,
    profit_size: Option<Decimal>,
    demo: Option<bool>,
}

/// Validated application configuration. Immutable for the lifetime of the
/// process once loaded.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub pair: String,
    pub profit_size: Decimal,
    pub demo: bool,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text, path)
    }

    fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            serde_json::from_str(text).map_err(|source| ConfigError::Malformed {
                path: path.display().to_string(),
                source,
            })?;

        Ok(AppConfig {
            pair: raw.pair.ok_or(ConfigError::MissingKey("pair"))?,
            profit_size: raw.profit_size.ok_or(ConfigError::MissingKey("profit_size"))?,
            demo: raw.demo.ok_or(ConfigError::MissingKey("demo"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_a_valid_config() {
        let file = write_temp(r#"{"pair":"BTC/USDT","profit_size":0.5,"demo":true}"#);
        let cfg = AppConfig::load(file.path()).unwrap();
        assert_eq!(cfg.pair, "BTC/USDT");
        assert_eq!(cfg.profit_size, dec!(0.5));
        assert!(cfg.demo);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = AppConfig::load(Path::new("/nonexistent/xarb/config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn malformed_json_is_a_malformed_error() {
        let file = write_temp("{not json");
        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
    }

    #[test]
    fn missing_key_is_reported() {
        let file = write_temp(r#"{"pair":"BTC/USDT","demo":true}"#);
        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey("profit_size")));
    }
}
