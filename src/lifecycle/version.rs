//! Row version comparison
//!
//! The row version of an audited record is its modification timestamp at
//! whole-second precision. Two writes within the same second carry the same
//! version.

use chrono::{DateTime, SubsecRound, Utc};

/// Timestamp truncated to the precision versions are compared at
pub fn version_of(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp.trunc_subsecs(0)
}

/// Whether two timestamps agree from the year down to the second
pub fn same_version(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    version_of(a) == version_of(b)
}
