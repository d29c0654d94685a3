//! Outbound adapters implementing domain ports.
//!
//! - **memory**: process-local idempotency store, catalogue repository and
//!   transaction manager. Writes are staged in the domain transaction and
//!   applied on commit.
//! - **queue**: in-process job queue for subscriber notifications.
//! - **telemetry**: `tracing`-backed tracer, metrics recorder and a logging
//!   decorator for event publishers.
//!
//! Adapters translate between domain types and their backing representation.
//! They contain no business logic.

pub mod memory;
pub mod queue;
pub mod telemetry;
