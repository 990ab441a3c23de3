//! ReplikV - A Replicated Transactional Key-Value Store Simulator
//!
//! This crate simulates a ten-site replicated key-value store with twenty
//! integer variables. Read-only transactions take multiversion snapshot
//! reads; read-write transactions go through strict two-phase locking with
//! wait-for-graph deadlock detection; replication follows the available
//! copies model with explicit site failure and recovery. One logical clock
//! drives the whole cluster, one event at a time.
//!
//! # Example
//!
//! ```
//! use replikv::db::Database;
//!
//! let db = Database::new();
//! db.execute("begin(T1)").unwrap();
//! db.execute("W(T1,x2,42)").unwrap();
//! db.execute("end(T1)").unwrap();
//! ```

pub mod command;
pub mod db;
pub mod site;
pub mod storage;
pub mod transaction;
