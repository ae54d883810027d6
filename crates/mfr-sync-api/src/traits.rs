//! API traits
//!
//! The engine is written against these seams; the reqwest client in
//! [`crate::client`] is one implementation, test doubles are another.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ApiResult;
use crate::query::{ResourceMutation, ResourceQuery};
use crate::types::{LogEntry, Message};

/// Read/write access to the target platform's resource model.
#[async_trait]
pub trait DhisApi: Send + Sync {
    /// Run one read and return the raw response body.
    async fn query(&self, query: &ResourceQuery) -> ApiResult<Value>;

    /// Run one write and return the raw response body.
    async fn mutate(&self, mutation: &ResourceMutation) -> ApiResult<Value>;

    /// Send a notification message. Fire-and-forget from the caller's view,
    /// but failures are still reported so credential distribution failures
    /// can be surfaced distinctly.
    async fn send_message(&self, message: &Message) -> ApiResult<()>;
}

/// Best-effort audit sink.
///
/// Implementations must never let a log-write failure escape to the caller;
/// failures are swallowed and reported through a secondary channel.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record one entry. Infallible by contract.
    async fn record(&self, entry: LogEntry);
}

/// Sink that drops every entry. Useful in tests and dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditSink;

#[async_trait]
impl AuditSink for NullAuditSink {
    async fn record(&self, _entry: LogEntry) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogType;

    #[tokio::test]
    async fn test_null_sink_accepts_entries() {
        let sink = NullAuditSink;
        sink.record(LogEntry::new(LogType::Log, "noop", "tester")).await;
    }
}
