//! Ring filesystem errors.
//!
//! These errors represent violations of the on-flash format or of the
//! operation protocol, not infrastructure failures; those come through
//! the [`Io`](RingError::Io) variant from the flash access contract.

use crate::cursor::Location;
use core::fmt;

/// Errors that can occur while operating on a ring filesystem.
#[derive(Debug)]
#[non_exhaustive]
pub enum RingError<E> {
    /// The underlying erase/program/read call failed.
    ///
    /// I/O failures are always surfaced and never retried internally;
    /// retry policy belongs to the caller.
    Io(E),

    /// No recognizable sector header was found during [`scan`], or the
    /// headers that were found do not form a consistent ring.
    ///
    /// The usual remedy is to call [`format`].
    ///
    /// [`scan`]: crate::Ring::scan
    /// [`format`]: crate::Ring::format
    FormatInvalid,

    /// The on-flash metadata was written by an incompatible ring.
    ///
    /// Rings with different database identifiers or record sizes must
    /// never share a medium.
    VersionMismatch {
        /// Database identifier this ring was constructed with.
        expected_id: u32,
        /// Database identifier stored on flash.
        found_id: u32,
        /// Record size this ring was constructed with.
        expected_record_size: u32,
        /// Record size stored on flash.
        found_record_size: u32,
    },

    /// The slot at `location` failed its checksum during a fetch.
    ///
    /// The read cursor is not advanced, so repeated fetches fail
    /// deterministically until the caller intervenes.
    Corruption {
        /// Position of the offending slot.
        location: Location,
    },

    /// There are no unread records between the read and write cursors.
    Empty,

    /// The filesystem has not been brought up with a successful
    /// [`format`](crate::Ring::format) or [`scan`](crate::Ring::scan).
    NotInitialized,
}

impl<E: fmt::Display> fmt::Display for RingError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "flash I/O error: {}", e),
            Self::FormatInvalid => write!(f, "no valid ring filesystem found on flash"),
            Self::VersionMismatch {
                expected_id,
                found_id,
                expected_record_size,
                found_record_size,
            } => write!(
                f,
                "incompatible filesystem: database {:#010x}/{} B records on flash, \
                 expected {:#010x}/{} B",
                found_id, found_record_size, expected_id, expected_record_size
            ),
            Self::Corruption { location } => {
                write!(f, "checksum mismatch at {}", location)
            }
            Self::Empty => write!(f, "no unread records in the ring"),
            Self::NotInitialized => {
                write!(f, "filesystem not initialized (format or scan it first)")
            }
        }
    }
}

impl<E: core::error::Error + 'static> core::error::Error for RingError<E> {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}
