//! Collaborator traits consumed by the pipeline
//!
//! ```text
//! LeadStore         - versioned lead records, status queries, CAS writes
//! MessageTransport  - SMS delivery
//! Clock             - timestamps
//! ```

mod clock;
mod store;
mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{update_with_retry, LeadStore, Versioned};
pub use transport::{MessageTransport, SmsReceipt};
