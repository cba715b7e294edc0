//! Lead scoring configuration
//!
//! Targeting knobs for the composite score. The defaults describe the
//! first campaign (real estate agents and brokers, SIC 6531).

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Case-insensitive keywords matched against company, title and SIC
    /// description; first match wins
    #[serde(default = "default_target_industries")]
    pub target_industries: Vec<String>,

    /// SIC code prefixes that count as an industry match
    #[serde(default = "default_target_sic_prefixes")]
    pub target_sic_prefixes: Vec<String>,

    /// Consumer mail providers; any other domain counts as a business email
    #[serde(default = "default_free_mail_domains")]
    pub free_mail_domains: Vec<String>,
}

fn default_target_industries() -> Vec<String> {
    [
        "real estate",
        "realtor",
        "broker",
        "realty",
        "property",
        "commercial real estate",
        "residential real estate",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_target_sic_prefixes() -> Vec<String> {
    vec!["6531".to_string()]
}

fn default_free_mail_domains() -> Vec<String> {
    ["gmail", "yahoo", "hotmail"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            target_industries: default_target_industries(),
            target_sic_prefixes: default_target_sic_prefixes(),
            free_mail_domains: default_free_mail_domains(),
        }
    }
}

impl ScoringConfig {
    /// Load a scoring profile from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::FileNotFound(format!("{}: {}", path.as_ref().display(), e))
        })?;

        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_target_industries<I, S>(mut self, industries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_industries = industries.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .target_industries
            .iter()
            .any(|k| k.trim().is_empty())
        {
            return Err(ConfigError::invalid(
                "scoring.target_industries",
                "Keywords must not be blank",
            ));
        }
        if self
            .target_sic_prefixes
            .iter()
            .any(|p| p.trim().is_empty() || !p.chars().all(|c| c.is_ascii_digit()))
        {
            return Err(ConfigError::invalid(
                "scoring.target_sic_prefixes",
                "Prefixes must be non-empty digit strings",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_target_real_estate() {
        let config = ScoringConfig::default();
        assert!(config.target_industries.contains(&"realtor".to_string()));
        assert_eq!(config.target_sic_prefixes, vec!["6531"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_yaml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "target_industries:\n  - plumbing\n  - hvac").unwrap();

        let config = ScoringConfig::load(file.path()).unwrap();
        assert_eq!(config.target_industries, vec!["plumbing", "hvac"]);
        assert_eq!(config.target_sic_prefixes, vec!["6531"]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ScoringConfig::load("/nonexistent/scoring.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_rejects_non_numeric_sic_prefix() {
        let config = ScoringConfig {
            target_sic_prefixes: vec!["65A1".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
