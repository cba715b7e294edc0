//! Composite lead scoring
//!
//! Five independently capped dimensions add up to a 0-100 total:
//!
//! | Dimension      | Max | Driven by                                  |
//! |----------------|-----|--------------------------------------------|
//! | contactability | 25  | usable phone, valid email, full address    |
//! | probability    | 25  | seniority (enrichment, else job title)     |
//! | profitability  | 20  | employee/revenue buckets, company name     |
//! | situational    | 15  | target industry keyword or SIC prefix      |
//! | predictability | 15  | name, email domain, phone, metadata depth  |
//!
//! Scoring is pure and infallible: missing or malformed fields simply
//! contribute nothing.

pub mod rules;

use leadflow_config::ScoringConfig;
use leadflow_core::{LeadRecord, SeniorityLevel};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use rules::{match_bucket, match_title, EMPLOYEE_RULES, REVENUE_RULES};

pub const MAX_CONTACTABILITY: u32 = 25;
pub const MAX_PROBABILITY: u32 = 25;
pub const MAX_PROFITABILITY: u32 = 20;
pub const MAX_SITUATIONAL: u32 = 15;
pub const MAX_PREDICTABILITY: u32 = 15;

/// Digits needed for a phone to count as usable
const MIN_PHONE_DIGITS: usize = 10;
/// Non-empty metadata keys needed for the rich-metadata signal
const RICH_METADATA_KEYS: usize = 5;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// Coarse bucket derived from the total score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    A,
    B,
    C,
    D,
}

impl Tier {
    /// A >= 80, B >= 60, C >= 40, D below
    pub fn from_total(total: u32) -> Self {
        match total {
            80.. => Tier::A,
            60..=79 => Tier::B,
            40..=59 => Tier::C,
            _ => Tier::D,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::A => "A",
            Tier::B => "B",
            Tier::C => "C",
            Tier::D => "D",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactabilityScore {
    pub score: u32,
    pub has_phone: bool,
    pub has_email: bool,
    pub has_address: bool,
    pub signals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbabilityScore {
    pub score: u32,
    pub seniority_level: SeniorityLevel,
    pub is_decision_maker: bool,
    pub signals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitabilityScore {
    pub score: u32,
    /// Employee bucket, "unknown" when no marker matched
    pub company_size: String,
    pub signals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SituationalScore {
    pub score: u32,
    pub industry_match: bool,
    pub signals: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictabilityScore {
    pub score: u32,
    /// Derived from the unclamped sum, display only
    pub data_quality: DataQuality,
    pub signals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub contactability: ContactabilityScore,
    pub probability: ProbabilityScore,
    pub profitability: ProfitabilityScore,
    pub situational: SituationalScore,
    pub predictability: PredictabilityScore,
}

/// Scoring result, recomputed on demand and never persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeScore {
    /// Exactly the sum of the five dimension scores
    pub total: u32,
    pub dimensions: Dimensions,
    pub all_signals: Vec<String>,
    pub tier: Tier,
}

/// Stateless scorer configured with a targeting profile
#[derive(Debug, Clone, Default)]
pub struct LeadScorer {
    config: ScoringConfig,
}

impl LeadScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(&self, lead: &LeadRecord) -> CompositeScore {
        let contactability = self.contactability(lead);
        let probability = self.probability(lead);
        let profitability = self.profitability(lead);
        let situational = self.situational(lead);
        let predictability = self.predictability(lead);

        let total = contactability.score
            + probability.score
            + profitability.score
            + situational.score
            + predictability.score;

        let all_signals = contactability
            .signals
            .iter()
            .chain(&probability.signals)
            .chain(&profitability.signals)
            .chain(&situational.signals)
            .chain(&predictability.signals)
            .cloned()
            .collect();

        CompositeScore {
            total,
            dimensions: Dimensions {
                contactability,
                probability,
                profitability,
                situational,
                predictability,
            },
            all_signals,
            tier: Tier::from_total(total),
        }
    }

    fn contactability(&self, lead: &LeadRecord) -> ContactabilityScore {
        let mut score = 0;
        let mut signals = Vec::new();

        let has_phone = has_usable_phone(lead);
        if has_phone {
            score += 10;
            signals.push("has_phone".to_string());
        }

        let has_email = valid_email(lead).is_some();
        if has_email {
            score += 8;
            signals.push("has_email".to_string());
        }

        let has_address = lead.has_full_address();
        if has_address {
            score += 7;
            signals.push("has_address".to_string());
        }

        ContactabilityScore {
            score: score.min(MAX_CONTACTABILITY),
            has_phone,
            has_email,
            has_address,
            signals,
        }
    }

    fn probability(&self, lead: &LeadRecord) -> ProbabilityScore {
        let hint = lead
            .metadata
            .as_ref()
            .and_then(|m| m.seniority.as_ref())
            .and_then(|s| s.level.map(|level| (level, s.is_decision_maker)));

        // Enrichment wins over title parsing; its weight comes from the table
        // rather than the stored weight so both paths agree on scale.
        if let Some((level, is_decision_maker)) = hint {
            let mut signals = Vec::new();
            if is_decision_maker {
                signals.push("decision_maker".to_string());
            }
            signals.push(format!("seniority:{}", level));
            return ProbabilityScore {
                score: level.weight().min(MAX_PROBABILITY),
                seniority_level: level,
                is_decision_maker,
                signals,
            };
        }

        match lead.title().and_then(match_title) {
            Some(rule) => ProbabilityScore {
                score: rule.points().min(MAX_PROBABILITY),
                seniority_level: rule.level,
                is_decision_maker: rule.decision_maker,
                signals: vec![format!("seniority:{}", rule.level)],
            },
            None => ProbabilityScore {
                score: 0,
                seniority_level: SeniorityLevel::Unknown,
                is_decision_maker: false,
                signals: Vec::new(),
            },
        }
    }

    fn profitability(&self, lead: &LeadRecord) -> ProfitabilityScore {
        let mut score = 0;
        let mut signals = Vec::new();
        let mut company_size = "unknown".to_string();

        let metadata = lead.metadata.as_ref();

        if let Some(rule) = metadata
            .and_then(|m| m.employees.as_deref())
            .and_then(|e| match_bucket(EMPLOYEE_RULES, e))
        {
            score += rule.points;
            company_size = rule.bucket.to_string();
            signals.push(format!("size:{}", rule.bucket));
        }

        if let Some(rule) = metadata
            .and_then(|m| m.revenue.as_deref())
            .and_then(|r| match_bucket(REVENUE_RULES, r))
        {
            score += rule.points;
            signals.push(format!("revenue:{}", rule.bucket));
        }

        if lead.company().is_some() {
            score += 2;
            signals.push("has_company".to_string());
        }

        ProfitabilityScore {
            score: score.min(MAX_PROFITABILITY),
            company_size,
            signals,
        }
    }

    fn situational(&self, lead: &LeadRecord) -> SituationalScore {
        let mut signals = Vec::new();
        let mut industry_match = false;

        let company = lead.company().unwrap_or_default().to_lowercase();
        let title = lead.title().unwrap_or_default().to_lowercase();
        let metadata = lead.metadata.as_ref();
        let sic_description = metadata
            .and_then(|m| m.sic_description.as_deref())
            .unwrap_or_default()
            .to_lowercase();
        let sic_code = metadata
            .and_then(|m| m.sic_code.as_deref())
            .unwrap_or_default()
            .trim();

        for keyword in &self.config.target_industries {
            let keyword = keyword.to_lowercase();
            if company.contains(&keyword)
                || title.contains(&keyword)
                || sic_description.contains(&keyword)
            {
                industry_match = true;
                signals.push(format!("industry:{}", keyword));
                break;
            }
        }

        // The SIC signal is reported even after a keyword match; points never stack.
        if let Some(prefix) = self
            .config
            .target_sic_prefixes
            .iter()
            .find(|p| !sic_code.is_empty() && sic_code.starts_with(p.as_str()))
        {
            industry_match = true;
            signals.push(format!("sic:{}", prefix));
        }

        SituationalScore {
            score: if industry_match { MAX_SITUATIONAL } else { 0 },
            industry_match,
            signals,
        }
    }

    fn predictability(&self, lead: &LeadRecord) -> PredictabilityScore {
        let mut score = 0;
        let mut signals = Vec::new();

        if lead.first_name().is_some() && lead.last_name().is_some() {
            score += 5;
            signals.push("full_name".to_string());
        }

        if let Some(email) = valid_email(lead) {
            let domain = email
                .rsplit_once('@')
                .map(|(_, d)| d.to_lowercase())
                .unwrap_or_default();
            let free_mail = self
                .config
                .free_mail_domains
                .iter()
                .any(|provider| domain.contains(&provider.to_lowercase()));
            if free_mail {
                score += 2;
                signals.push("personal_email".to_string());
            } else {
                score += 4;
                signals.push("business_email".to_string());
            }
        }

        if has_usable_phone(lead) {
            score += 3;
            signals.push("valid_phone".to_string());
        }

        if lead
            .metadata
            .as_ref()
            .map(|m| m.non_empty_key_count() >= RICH_METADATA_KEYS)
            .unwrap_or(false)
        {
            score += 3;
            signals.push("rich_metadata".to_string());
        }

        let data_quality = match score {
            12.. => DataQuality::High,
            6..=11 => DataQuality::Medium,
            _ => DataQuality::Low,
        };

        PredictabilityScore {
            score: score.min(MAX_PREDICTABILITY),
            data_quality,
            signals,
        }
    }
}

/// Digits in a phone string, ignoring formatting
pub fn phone_digits(phone: &str) -> usize {
    phone.chars().filter(|c| c.is_ascii_digit()).count()
}

fn has_usable_phone(lead: &LeadRecord) -> bool {
    lead.phone_sequence()
        .iter()
        .any(|p| phone_digits(&p.phone) >= MIN_PHONE_DIGITS)
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email.trim())
}

/// First syntactically valid email on the lead
fn valid_email(lead: &LeadRecord) -> Option<String> {
    lead.email_sequence().into_iter().find(|e| is_valid_email(e))
}
