//! Typed errors raised while turning raw Bear records into mapped notes.

use thiserror::Error;

/// A Core Data timestamp that cannot be converted to a calendar date.
///
/// Bear always stores both dates on a live note, so a zero or NULL value
/// means the row itself is damaged.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("invalid Core Data timestamp: {0:?}")]
pub struct InvalidTimestamp(pub Option<f64>);

/// Per-note mapping failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MapError {
    /// A required timestamp is missing or malformed.
    #[error("note {id}: {field} date is invalid ({source})")]
    InvalidTimestamp {
        id: i64,
        field: &'static str,
        #[source]
        source: InvalidTimestamp,
    },
}

impl MapError {
    /// Identifier of the note that failed to map.
    pub fn note_id(&self) -> i64 {
        match self {
            MapError::InvalidTimestamp { id, .. } => *id,
        }
    }
}
