//! Ordered classification rules
//!
//! Every rule list is evaluated top to bottom and the first rule whose
//! marker occurs in the (lowercased) input wins. Order is part of the
//! contract: "vice president" matches the president rule before the vp
//! rule, and "$100k" hits the high revenue bucket through "$1".

use leadflow_core::SeniorityLevel;

/// Title substring -> seniority
#[derive(Debug, Clone, Copy)]
pub struct TitleRule {
    pub markers: &'static [&'static str],
    pub level: SeniorityLevel,
    pub decision_maker: bool,
}

impl TitleRule {
    /// Points awarded, taken from the seniority weight table
    pub fn points(&self) -> u32 {
        self.level.weight()
    }
}

/// Title fallback used when enrichment did not attach a seniority level.
///
/// `sales_manager` and `founder` only exist in the weight table and are
/// never produced here.
pub const TITLE_RULES: &[TitleRule] = &[
    TitleRule {
        markers: &["owner", "proprietor"],
        level: SeniorityLevel::Owner,
        decision_maker: true,
    },
    TitleRule {
        markers: &["ceo", "chief"],
        level: SeniorityLevel::CSuite,
        decision_maker: true,
    },
    TitleRule {
        markers: &["president"],
        level: SeniorityLevel::President,
        decision_maker: true,
    },
    TitleRule {
        markers: &["partner"],
        level: SeniorityLevel::Partner,
        decision_maker: true,
    },
    TitleRule {
        markers: &["vp", "vice president"],
        level: SeniorityLevel::Vp,
        decision_maker: true,
    },
    TitleRule {
        markers: &["director"],
        level: SeniorityLevel::Director,
        decision_maker: false,
    },
    TitleRule {
        markers: &["manager"],
        level: SeniorityLevel::Manager,
        decision_maker: false,
    },
];

/// Free-text bucket marker -> points
#[derive(Debug, Clone, Copy)]
pub struct BucketRule {
    pub markers: &'static [&'static str],
    pub points: u32,
    /// Signal suffix, e.g. `size:small`
    pub bucket: &'static str,
}

pub const EMPLOYEE_RULES: &[BucketRule] = &[
    BucketRule {
        markers: &["100", "250", "500"],
        points: 10,
        bucket: "medium+",
    },
    BucketRule {
        markers: &["20", "50", "10-"],
        points: 8,
        bucket: "small",
    },
    BucketRule {
        markers: &["1-", "5-", "micro"],
        points: 5,
        bucket: "micro",
    },
];

pub const REVENUE_RULES: &[BucketRule] = &[
    BucketRule {
        markers: &["million", "$1", "$5"],
        points: 10,
        bucket: "high",
    },
    BucketRule {
        markers: &["$500", "$250"],
        points: 7,
        bucket: "medium",
    },
    BucketRule {
        markers: &["$100", "$50"],
        points: 4,
        bucket: "low",
    },
];

/// First rule with a marker contained in `text`
pub fn first_match<'a, R>(
    rules: &'a [R],
    text: &str,
    markers: impl Fn(&R) -> &'static [&'static str],
) -> Option<&'a R> {
    let text = text.to_lowercase();
    rules
        .iter()
        .find(|rule| markers(rule).iter().any(|m| text.contains(m)))
}

pub fn match_title(title: &str) -> Option<&'static TitleRule> {
    first_match(TITLE_RULES, title, |r| r.markers)
}

pub fn match_bucket(rules: &'static [BucketRule], text: &str) -> Option<&'static BucketRule> {
    first_match(rules, text, |r| r.markers)
}
