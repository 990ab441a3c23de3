//! Outcome records handed back to the driver.
//!
//! The engine never prints; every event handler returns the ordered list of
//! outcomes it produced (including cascaded ones from retried operations),
//! and the driver renders them. `Display` gives the human-readable trace
//! line; the serde derives feed the JSON trace mode.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::storage::{SiteId, TransactionId, Value, VariableId};
use crate::transaction::context::AbortReason;

/// One observable effect of processing a driver event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// A transaction was created.
    Began { tid: TransactionId, read_only: bool },
    /// A read completed with this value.
    Read { tid: TransactionId, vid: VariableId, value: Value },
    /// A write was staged at every live site holding the variable.
    Wrote { tid: TransactionId, vid: VariableId, value: Value },
    /// The operation could not run and was queued.
    Blocked { tid: TransactionId },
    /// The transaction committed.
    Committed { tid: TransactionId },
    /// The transaction aborted.
    Aborted { tid: TransactionId, reason: AbortReason },
    /// A site went down.
    SiteFailed { sid: SiteId },
    /// A site came back up.
    SiteRecovered { sid: SiteId },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Began { tid, read_only: false } => write!(f, "{tid} begins"),
            Outcome::Began { tid, read_only: true } => {
                write!(f, "{tid} begins and is read-only")
            }
            Outcome::Read { vid, value, .. } => write!(f, "{vid}: {value}"),
            Outcome::Wrote { tid, vid, value } => {
                write!(f, "{tid} writes {value} to {vid}")
            }
            Outcome::Blocked { tid } => write!(f, "{tid} blocked"),
            Outcome::Committed { tid } => write!(f, "{tid} commits"),
            Outcome::Aborted { tid, reason: AbortReason::Deadlock } => {
                write!(f, "{tid} aborted due to deadlock")
            }
            Outcome::Aborted { tid, reason: AbortReason::SiteFailure } => {
                write!(f, "{tid} aborts")
            }
            Outcome::SiteFailed { sid } => write!(f, "site {sid} fails"),
            Outcome::SiteRecovered { sid } => write!(f, "site {sid} recovers"),
        }
    }
}

/// Committed value of one variable copy in a dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpEntry {
    pub vid: VariableId,
    pub value: Value,
}

/// One site's row in a dump: every owned variable ascending by id,
/// reported whether the site is up or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDump {
    pub sid: SiteId,
    pub active: bool,
    pub entries: Vec<DumpEntry>,
}

impl fmt::Display for SiteDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self
            .entries
            .iter()
            .map(|e| format!("{}: {}", e.vid, e.value))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "site {} - {}", self.sid, entries)
    }
}

/// Committed state of the whole cluster, sites ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpReport {
    pub sites: Vec<SiteDump>,
}

impl fmt::Display for DumpReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, site) in self.sites.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{site}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(n: u32) -> TransactionId {
        TransactionId::new(n)
    }

    fn x(k: u32) -> VariableId {
        VariableId::new(k).unwrap()
    }

    #[test]
    fn test_trace_lines() {
        assert_eq!(
            Outcome::Began { tid: t(1), read_only: false }.to_string(),
            "T1 begins"
        );
        assert_eq!(
            Outcome::Began { tid: t(2), read_only: true }.to_string(),
            "T2 begins and is read-only"
        );
        assert_eq!(
            Outcome::Read { tid: t(1), vid: x(2), value: 20 }.to_string(),
            "x2: 20"
        );
        assert_eq!(
            Outcome::Wrote { tid: t(1), vid: x(4), value: 101 }.to_string(),
            "T1 writes 101 to x4"
        );
        assert_eq!(Outcome::Blocked { tid: t(3) }.to_string(), "T3 blocked");
        assert_eq!(Outcome::Committed { tid: t(1) }.to_string(), "T1 commits");
        assert_eq!(
            Outcome::Aborted { tid: t(3), reason: AbortReason::Deadlock }.to_string(),
            "T3 aborted due to deadlock"
        );
        assert_eq!(
            Outcome::Aborted { tid: t(1), reason: AbortReason::SiteFailure }.to_string(),
            "T1 aborts"
        );
        assert_eq!(
            Outcome::SiteFailed { sid: SiteId::new(2).unwrap() }.to_string(),
            "site 2 fails"
        );
        assert_eq!(
            Outcome::SiteRecovered { sid: SiteId::new(2).unwrap() }.to_string(),
            "site 2 recovers"
        );
    }

    #[test]
    fn test_dump_rendering() {
        let report = DumpReport {
            sites: vec![
                SiteDump {
                    sid: SiteId::new(1).unwrap(),
                    active: true,
                    entries: vec![
                        DumpEntry { vid: x(2), value: 20 },
                        DumpEntry { vid: x(4), value: 44 },
                    ],
                },
                SiteDump {
                    sid: SiteId::new(2).unwrap(),
                    active: false,
                    entries: vec![DumpEntry { vid: x(1), value: 10 }],
                },
            ],
        };
        assert_eq!(
            report.to_string(),
            "site 1 - x2: 20, x4: 44\nsite 2 - x1: 10"
        );
    }

    #[test]
    fn test_outcome_serializes() {
        let json = serde_json::to_string(&Outcome::Read {
            tid: t(1),
            vid: x(2),
            value: 20,
        })
        .unwrap();
        assert!(json.contains("Read"));
        assert!(json.contains("20"));
    }
}
