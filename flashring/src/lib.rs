//! Ring-buffer flash filesystem for fixed-size records.
//!
//! `flashring` stores an append-only stream of fixed-size records across a
//! set of erase-block-aligned flash sectors and behaves as a circular
//! buffer: once the medium is full, the oldest records are evicted to make
//! room for new ones. The design targets NOR flash, where bits can only be
//! programmed from 1 to 0 between erasures, and survives power loss at any
//! point in an append, discard or sector rotation.
//!
//! # On-flash layout
//!
//! ```text
//! ┌──────────────┬──────┬──────┬──────┬─────┐
//! │ sector header│ slot │ slot │ slot │ ... │   one erase unit
//! └──────────────┴──────┴──────┴──────┴─────┘
//!   magic          ┌──────────┬───────────────┐
//!   epoch          │ checksum │ payload bytes │   one slot
//!   database id    └──────────┴───────────────┘
//!   record size
//!   crc
//! ```
//!
//! Each sector carries a monotonically increasing epoch so the ring order
//! can be reconstructed after restart; each slot uses its checksum as the
//! "written" marker, so a torn write is detected without a separate flag.
//!
//! # Quick start
//!
//! ```
//! use flashring::{mem::MemFlash, Ring};
//!
//! let flash = MemFlash::new(4096, 8);
//! let mut ring = Ring::new(flash, 0x4C4F_4753, 16)?;
//!
//! ring.format()?;
//! ring.append(&[7u8; 16])?;
//!
//! let mut record = [0u8; 16];
//! ring.fetch(&mut record)?;
//! assert_eq!(record, [7u8; 16]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! After a restart, call [`Ring::scan`] instead of [`Ring::format`] to
//! rebuild the cursors from the on-flash state.
//!
//! # Concurrency
//!
//! A [`Ring`] assumes a single logical owner: every operation is
//! synchronous and the caller serializes all access. Wrap the ring in a
//! mutex if it must be shared between threads of control.
//!
//! # Features
//!
//! - `std`: Use the standard library (implies `alloc`)
//! - `alloc`: Enable the [`mem::MemFlash`] RAM simulator
//! - `log`: Enable logging through the `log` crate
//! - `defmt`: Enable defmt logging for embedded targets

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

#[cfg(feature = "alloc")]
extern crate alloc;

// This mod MUST go first so the macros are visible in the other modules.
mod fmt;

pub mod cursor;
pub mod error;
pub mod flash;
pub mod geometry;
pub mod ring;
pub mod sector;
pub mod slot;

#[cfg(feature = "alloc")]
pub mod mem;

pub use cursor::Location;
#[cfg(feature = "alloc")]
pub use mem::MemFlash;
pub use error::RingError;
pub use flash::FlashAccess;
pub use geometry::{Geometry, GeometryError};
pub use ring::Ring;
pub use sector::Epoch;

/// CRC-32 (ISO-HDLC) used for both sector headers and slot checksums.
pub(crate) static CRC32: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);
