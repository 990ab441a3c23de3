//! Transaction management for the simulated cluster.
//!
//! The `TransactionManager` is the engine's entry point: the driver feeds
//! it one timestamped event at a time, and it coordinates the sites, the
//! waiting queue, and the wait-for graph.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    TransactionManager                       │
//! │ (owns sites + transactions, schedules, retries, deadlocks)  │
//! └─────────────────────────────────────────────────────────────┘
//!            │                  │                   │
//!            ▼                  ▼                   ▼
//!     ┌─────────────┐    ┌─────────────┐     ┌─────────────┐
//!     │ Transaction │    │  Operation  │     │ WaitsFor    │
//!     │  (record)   │    │  (queued)   │     │  Graph      │
//!     └─────────────┘    └─────────────┘     └─────────────┘
//! ```

mod context;
mod manager;
mod operation;
mod outcome;
mod waits_for;

pub use context::{AbortReason, Transaction, TransactionKind};
pub use manager::TransactionManager;
pub use operation::{Operation, OperationKind};
pub use outcome::{DumpEntry, DumpReport, Outcome, SiteDump};
pub use waits_for::WaitsForGraph;
