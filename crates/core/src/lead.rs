//! Lead record, processing status and outreach state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::contact::ThreadLedger;
use crate::metadata::LeadMetadata;
use crate::{Error, Result};

/// Alternate mobile slots (mobile1..mobile5)
pub const MAX_MOBILES: usize = 5;
/// Landline slots (landline1..landline3)
pub const MAX_LANDLINES: usize = 3;
/// Email slots (email1..email3)
pub const MAX_EMAILS: usize = 3;

/// Processing status of a lead
///
/// ```text
/// new -> queued -> contacted -> responded -> converted
///   \________\__________\___________\______-> unsubscribed | invalid
/// ```
/// `converted`, `unsubscribed` and `invalid` are terminal. Re-applying the
/// current status is always accepted as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    /// Imported, never selected. Records with no status are read as `new`.
    #[default]
    New,
    Queued,
    Contacted,
    Responded,
    Converted,
    Unsubscribed,
    Invalid,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Queued => "queued",
            Self::Contacted => "contacted",
            Self::Responded => "responded",
            Self::Converted => "converted",
            Self::Unsubscribed => "unsubscribed",
            Self::Invalid => "invalid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "" | "new" => Some(Self::New),
            "queued" => Some(Self::Queued),
            "contacted" => Some(Self::Contacted),
            "responded" => Some(Self::Responded),
            "converted" => Some(Self::Converted),
            "unsubscribed" => Some(Self::Unsubscribed),
            "invalid" => Some(Self::Invalid),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Converted | Self::Unsubscribed | Self::Invalid)
    }

    pub fn can_transition_to(&self, to: LeadStatus) -> bool {
        use LeadStatus::*;

        if *self == to {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        if matches!(to, Unsubscribed | Invalid) {
            return true;
        }

        matches!(
            (*self, to),
            (New, Queued)
                | (New, Contacted)
                | (New, Responded)
                | (Queued, Contacted)
                | (Queued, Responded)
                | (Contacted, Responded)
                | (Contacted, Converted)
                | (Responded, Converted)
        )
    }

    pub fn transition_to(self, to: LeadStatus) -> Result<LeadStatus> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(Error::InvalidTransition {
                kind: "status",
                from: self.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outreach state driven by the contact sequence engine
///
/// `responded` is absorbing; `in_call_queue` can only move on to `responded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LeadState {
    #[default]
    Idle,
    InCallQueue,
    Responded,
}

impl LeadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::InCallQueue => "in_call_queue",
            Self::Responded => "responded",
        }
    }

    pub fn can_transition_to(&self, to: LeadState) -> bool {
        *self == to
            || matches!(
                (*self, to),
                (Self::Idle, Self::InCallQueue)
                    | (Self::Idle, Self::Responded)
                    | (Self::InCallQueue, Self::Responded)
            )
    }

    pub fn transition_to(self, to: LeadState) -> Result<LeadState> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(Error::InvalidTransition {
                kind: "lead state",
                from: self.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }
}

impl std::fmt::Display for LeadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhoneKind {
    /// SMS-capable
    Mobile,
    /// Call queue only
    Landline,
}

/// One phone endpoint in contact priority order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneEndpoint {
    pub phone: String,
    /// "primary", "mobile1".."mobile5", "landline1".."landline3"
    pub label: String,
    pub kind: PhoneKind,
}

/// A contact/property record pursued for outreach
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadRecord {
    pub id: String,
    /// Tenant/team the lead belongs to
    pub scope: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Primary phone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub mobiles: Vec<String>,
    #[serde(default)]
    pub landlines: Vec<String>,
    #[serde(default)]
    pub emails: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<LeadMetadata>,

    #[serde(default)]
    pub status: LeadStatus,
    #[serde(default)]
    pub lead_state: LeadState,
    #[serde(default)]
    pub tags: Vec<String>,

    /// Attempt history and call queue bookkeeping
    #[serde(default)]
    pub ledger: ThreadLedger,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LeadRecord {
    pub fn new(id: impl Into<String>, scope: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            scope: scope.into(),
            first_name: None,
            last_name: None,
            company: None,
            title: None,
            phone: None,
            mobiles: Vec::new(),
            landlines: Vec::new(),
            emails: Vec::new(),
            address: None,
            city: None,
            state: None,
            zip_code: None,
            metadata: None,
            status: LeadStatus::New,
            lead_state: LeadState::Idle,
            tags: Vec::new(),
            ledger: ThreadLedger::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = Some(first.into());
        self.last_name = Some(last.into());
        self
    }

    pub fn with_first_name(mut self, first: impl Into<String>) -> Self {
        self.first_name = Some(first.into());
        self
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_mobile(mut self, phone: impl Into<String>) -> Self {
        self.mobiles.push(phone.into());
        self
    }

    pub fn with_landline(mut self, phone: impl Into<String>) -> Self {
        self.landlines.push(phone.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.emails.push(email.into());
        self
    }

    pub fn with_address(
        mut self,
        address: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        self.address = Some(address.into());
        self.city = Some(city.into());
        self.state = Some(state.into());
        self
    }

    pub fn with_metadata(mut self, metadata: LeadMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_status(mut self, status: LeadStatus) -> Self {
        self.status = status;
        self
    }

    /// Check identity and slot limits
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::validation("lead id must not be empty"));
        }
        if self.scope.trim().is_empty() {
            return Err(Error::validation(format!(
                "lead {} has an empty scope",
                self.id
            )));
        }
        if self.mobiles.len() > MAX_MOBILES {
            return Err(Error::validation(format!(
                "lead {} has {} mobiles (max {})",
                self.id,
                self.mobiles.len(),
                MAX_MOBILES
            )));
        }
        if self.landlines.len() > MAX_LANDLINES {
            return Err(Error::validation(format!(
                "lead {} has {} landlines (max {})",
                self.id,
                self.landlines.len(),
                MAX_LANDLINES
            )));
        }
        if self.emails.len() > MAX_EMAILS {
            return Err(Error::validation(format!(
                "lead {} has {} emails (max {})",
                self.id,
                self.emails.len(),
                MAX_EMAILS
            )));
        }
        Ok(())
    }

    /// All phones in contact priority order: primary, mobiles, then landlines.
    /// Blank slots are skipped but keep their positional label.
    pub fn phone_sequence(&self) -> Vec<PhoneEndpoint> {
        let mut phones = Vec::new();

        if let Some(primary) = non_blank(&self.phone) {
            phones.push(PhoneEndpoint {
                phone: primary.to_string(),
                label: "primary".to_string(),
                kind: PhoneKind::Mobile,
            });
        }

        for (i, mobile) in self.mobiles.iter().take(MAX_MOBILES).enumerate() {
            if !mobile.trim().is_empty() {
                phones.push(PhoneEndpoint {
                    phone: mobile.trim().to_string(),
                    label: format!("mobile{}", i + 1),
                    kind: PhoneKind::Mobile,
                });
            }
        }

        for (i, landline) in self.landlines.iter().take(MAX_LANDLINES).enumerate() {
            if !landline.trim().is_empty() {
                phones.push(PhoneEndpoint {
                    phone: landline.trim().to_string(),
                    label: format!("landline{}", i + 1),
                    kind: PhoneKind::Landline,
                });
            }
        }

        phones
    }

    /// SMS targets only (landlines excluded)
    pub fn sms_sequence(&self) -> Vec<PhoneEndpoint> {
        self.phone_sequence()
            .into_iter()
            .filter(|p| p.kind == PhoneKind::Mobile)
            .collect()
    }

    pub fn email_sequence(&self) -> Vec<String> {
        self.emails
            .iter()
            .take(MAX_EMAILS)
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn primary_email(&self) -> Option<&str> {
        self.emails
            .iter()
            .map(|e| e.trim())
            .find(|e| !e.is_empty())
    }

    pub fn first_name(&self) -> Option<&str> {
        non_blank(&self.first_name)
    }

    pub fn last_name(&self) -> Option<&str> {
        non_blank(&self.last_name)
    }

    pub fn company(&self) -> Option<&str> {
        non_blank(&self.company)
    }

    pub fn title(&self) -> Option<&str> {
        non_blank(&self.title)
    }

    pub fn has_full_address(&self) -> bool {
        non_blank(&self.address).is_some()
            && non_blank(&self.city).is_some()
            && non_blank(&self.state).is_some()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
