//! Optimistic concurrency expectations.

/// Optimistic concurrency expectation for a stored record.
///
/// Versions count applied changes, so a stored record is always at version 1
/// or later.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Require that no record exists yet.
    NoRecord,
    /// Require the record to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    /// Expectation for a record observed at `version` (`None` when absent).
    pub fn observed(version: Option<u64>) -> Self {
        match version {
            Some(v) => ExpectedVersion::Exact(v),
            None => ExpectedVersion::NoRecord,
        }
    }

    /// Version as stored, where `0` stands for "no record".
    pub fn as_stored(self) -> u64 {
        match self {
            ExpectedVersion::NoRecord => 0,
            ExpectedVersion::Exact(v) => v,
        }
    }

    /// Version the next committed change must carry.
    pub fn successor(self) -> u64 {
        self.as_stored() + 1
    }

    pub fn matches(self, actual: u64) -> bool {
        self.as_stored() == actual
    }
}
