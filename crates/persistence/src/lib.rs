//! Storage and delivery backends for the outreach pipeline
//!
//! - [`InMemoryLeadStore`]: process-local store, insertion ordered
//! - [`ScyllaLeadStore`]: ScyllaDB store using lightweight transactions
//!   for compare-and-swap
//! - [`SimulatedSmsTransport`]: records messages instead of sending them

pub mod client;
pub mod error;
pub mod leads;
pub mod memory;
pub mod schema;
pub mod sms;

pub use client::{ScyllaClient, ScyllaConfig};
pub use error::PersistenceError;
pub use leads::ScyllaLeadStore;
pub use memory::InMemoryLeadStore;
pub use sms::{SimulatedSmsTransport, SmsMessage, SmsStatus};

/// Connect to ScyllaDB, ensure the schema and return a lead store
pub async fn connect_lead_store(config: ScyllaConfig) -> Result<ScyllaLeadStore, PersistenceError> {
    let client = ScyllaClient::connect(config).await?;
    client.ensure_schema().await?;
    Ok(ScyllaLeadStore::new(client))
}
