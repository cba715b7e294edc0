//! Typed view over the free-form lead metadata bag
//!
//! Ingestion writes arbitrary keys into a lead's metadata. The scoring
//! function only reads a handful of them (seniority, size and revenue
//! hints, SIC classification); those are lifted into typed optional fields
//! and everything else is kept verbatim in `extra`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Precomputed seniority level attached by enrichment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeniorityLevel {
    Owner,
    Founder,
    CSuite,
    President,
    Partner,
    Vp,
    Director,
    SalesManager,
    Manager,
    Other,
    #[serde(other)]
    Unknown,
}

impl SeniorityLevel {
    /// Probability weight (0-25)
    pub fn weight(&self) -> u32 {
        match self {
            Self::Owner => 25,
            Self::Founder => 24,
            Self::CSuite => 23,
            Self::President => 22,
            Self::Partner => 21,
            Self::Vp => 20,
            Self::Director => 18,
            Self::SalesManager => 16,
            Self::Manager => 12,
            Self::Other => 5,
            Self::Unknown => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Founder => "founder",
            Self::CSuite => "c_suite",
            Self::President => "president",
            Self::Partner => "partner",
            Self::Vp => "vp",
            Self::Director => "director",
            Self::SalesManager => "sales_manager",
            Self::Manager => "manager",
            Self::Other => "other",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for SeniorityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Seniority hint as written by enrichment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SeniorityHint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<SeniorityLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
    #[serde(default)]
    pub is_decision_maker: bool,
}

/// Lead metadata with the scoring-relevant keys lifted out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LeadMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seniority: Option<SeniorityHint>,

    /// Employee-count bucket, free text (e.g. "100-249")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employees: Option<String>,

    /// Revenue bucket, free text (e.g. "$1 - 5 million")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sic_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sic_description: Option<String>,

    /// Every other key, untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl LeadMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seniority(mut self, level: SeniorityLevel, is_decision_maker: bool) -> Self {
        self.seniority = Some(SeniorityHint {
            level: Some(level),
            weight: Some(level.weight()),
            is_decision_maker,
        });
        self
    }

    pub fn with_employees(mut self, employees: impl Into<String>) -> Self {
        self.employees = Some(employees.into());
        self
    }

    pub fn with_revenue(mut self, revenue: impl Into<String>) -> Self {
        self.revenue = Some(revenue.into());
        self
    }

    pub fn with_sic(mut self, code: impl Into<String>, description: impl Into<String>) -> Self {
        self.sic_code = Some(code.into());
        self.sic_description = Some(description.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Number of keys holding a value that is neither null nor an empty string
    pub fn non_empty_key_count(&self) -> usize {
        let typed = [
            self.seniority.is_some(),
            non_blank(&self.employees),
            non_blank(&self.revenue),
            non_blank(&self.sic_code),
            non_blank(&self.sic_description),
        ]
        .into_iter()
        .filter(|present| *present)
        .count();

        let extra = self
            .extra
            .values()
            .filter(|v| match v {
                serde_json::Value::Null => false,
                serde_json::Value::String(s) => !s.is_empty(),
                _ => true,
            })
            .count();

        typed + extra
    }
}

fn non_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(false, |s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_enrichment_shape() {
        let raw = json!({
            "seniority": { "level": "c_suite", "weight": 23, "isDecisionMaker": true },
            "employees": "100-249",
            "sicCode": "653101",
            "linkedin": "https://example.com/in/x",
        });
        let meta: LeadMetadata = serde_json::from_value(raw).unwrap();
        let seniority = meta.seniority.as_ref().unwrap();
        assert_eq!(seniority.level, Some(SeniorityLevel::CSuite));
        assert!(seniority.is_decision_maker);
        assert_eq!(meta.sic_code.as_deref(), Some("653101"));
        assert!(meta.extra.contains_key("linkedin"));
    }

    #[test]
    fn test_unknown_seniority_level_degrades() {
        let meta: LeadMetadata =
            serde_json::from_value(json!({ "seniority": { "level": "intern" } })).unwrap();
        let level = meta.seniority.unwrap().level.unwrap();
        assert_eq!(level, SeniorityLevel::Unknown);
        assert_eq!(level.weight(), 0);
    }

    #[test]
    fn test_non_empty_key_count_skips_null_and_blank() {
        let meta = LeadMetadata::new()
            .with_employees("10-49")
            .with_revenue("")
            .with_extra("a", json!(null))
            .with_extra("b", json!(""))
            .with_extra("c", json!(0))
            .with_extra("d", json!("x"));
        assert_eq!(meta.non_empty_key_count(), 3);
    }
}
