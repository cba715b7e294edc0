//! Message template personalization

use leadflow_core::LeadRecord;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\{(firstname|lastname|company|name)\}").unwrap());

/// Substitute `{firstName}`, `{lastName}`, `{company}` and `{name}`
/// (case-insensitive). Missing values fall back to "there", "" and
/// "your business"; the result is trimmed.
pub fn personalize_message(template: &str, lead: &LeadRecord) -> String {
    let first_name = lead.first_name().unwrap_or("there");
    let last_name = lead.last_name().unwrap_or("");
    let company = lead.company().unwrap_or("your business");

    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            match caps[1].to_ascii_lowercase().as_str() {
                "firstname" | "name" => first_name,
                "lastname" => last_name,
                _ => company,
            }
            .to_string()
        })
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitutes_all_placeholders() {
        let lead = LeadRecord::new("l1", "t")
            .with_name("Jane", "Doe")
            .with_company("Doe Realty");
        let msg = personalize_message("Hi {firstName} {lastName} of {company}, {name}!", &lead);
        assert_eq!(msg, "Hi Jane Doe of Doe Realty, Jane!");
    }

    #[test]
    fn test_fallbacks_and_trim() {
        let lead = LeadRecord::new("l1", "t");
        let msg = personalize_message("  Hi {FIRSTNAME}, how is {company}? {lastName}", &lead);
        assert_eq!(msg, "Hi there, how is your business?");
    }

    #[test]
    fn test_unknown_placeholders_untouched() {
        let lead = LeadRecord::new("l1", "t").with_first_name("Sam");
        assert_eq!(
            personalize_message("{firstName}: {unknown}", &lead),
            "Sam: {unknown}"
        );
    }
}
