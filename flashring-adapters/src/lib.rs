//! Flash access adapters for `flashring`.
//!
//! The ring filesystem talks to hardware through the
//! [`FlashAccess`](flashring::FlashAccess) contract. This crate bridges
//! that contract to the `embedded-storage` NOR flash traits, so any
//! driver in that ecosystem (internal MCU flash, external SPI NOR, ...)
//! can back a ring without custom glue.
//!
//! # Quick Start
//!
//! ```ignore
//! use flashring::Ring;
//! use flashring_adapters::{NorFlashPartition, PartitionConfig};
//!
//! // Last 16 erase units of the device hold the log.
//! let config = PartitionConfig::new(0x3F_0000, 16);
//! let partition = NorFlashPartition::new(spi_nor, config);
//!
//! let mut ring = Ring::new(partition, 0x4C4F_4753, 32)?;
//! ring.scan().or_else(|_| ring.format())?;
//! ```
//!
//! # Features
//!
//! - `std`: Enable standard library features (forwarded to `flashring`)
//! - `log`: Enable logging support
//! - `defmt`: Enable defmt logging for embedded

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod nor_flash;

pub use nor_flash::{NorFlashPartition, PartitionConfig, PartitionError};

// Re-export the contract this crate implements, so users can depend on
// flashring-adapters alone.
pub use flashring::FlashAccess;
