//! Ring storage over `embedded-storage` NOR flash traits.
//!
//! [`NorFlashPartition`] carves a contiguous run of erase units out of a
//! NOR flash device and exposes it through the
//! [`FlashAccess`](flashring::FlashAccess) contract, translating the
//! ring's region-relative addresses into absolute device offsets.
//!
//! # Example
//!
//! ```ignore
//! use flashring::Ring;
//! use flashring_adapters::{NorFlashPartition, PartitionConfig};
//!
//! // 16 erase units starting 64 KiB below the top of a 4 MiB part.
//! let config = PartitionConfig::new(0x3F_0000, 16);
//! let partition = NorFlashPartition::new(flash, config);
//! let mut ring = Ring::new(partition, 0x4C4F_4753, 32)?;
//! ```

use embedded_storage::nor_flash::{NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash};
use flashring::FlashAccess;

/// Placement of a ring partition within a larger flash device.
#[derive(Debug, Clone, Copy)]
pub struct PartitionConfig {
    /// Byte offset of the partition start (must be erase-unit aligned).
    pub start_offset: u32,
    /// Number of erase units in the partition.
    pub sector_count: u32,
}

impl PartitionConfig {
    /// Create a partition configuration.
    ///
    /// # Panics
    ///
    /// Panics if `sector_count` is below 2; the ring always keeps one
    /// sector free as its rotation target, so anything smaller cannot
    /// hold data. Alignment of `start_offset` is checked against the
    /// device's erase size when the partition is constructed.
    pub fn new(start_offset: u32, sector_count: u32) -> Self {
        assert!(
            sector_count >= 2,
            "a ring partition needs at least 2 erase units"
        );
        Self {
            start_offset,
            sector_count,
        }
    }
}

/// Error from the underlying NOR flash, reduced to its portable kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionError(pub NorFlashErrorKind);

impl core::fmt::Display for PartitionError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "NOR flash error: {:?}", self.0)
    }
}

impl core::error::Error for PartitionError {}

/// A run of erase units on a NOR flash device, usable as ring storage.
///
/// Implements [`FlashAccess`] for any driver providing the
/// `embedded-storage` `NorFlash` and `ReadNorFlash` traits. The ring's
/// sector size is the driver's erase size, and addresses are offset into
/// the configured partition. Calls outside the partition fail with
/// [`NorFlashErrorKind::OutOfBounds`] instead of touching neighboring
/// flash content.
pub struct NorFlashPartition<F> {
    flash: F,
    config: PartitionConfig,
}

impl<F: NorFlash + ReadNorFlash> NorFlashPartition<F> {
    /// Wrap `flash`, exposing the region described by `config`.
    ///
    /// # Panics
    ///
    /// Panics if `config.start_offset` is not aligned to the driver's
    /// erase size, or if the partition runs past the device capacity.
    pub fn new(flash: F, config: PartitionConfig) -> Self {
        let erase_size = F::ERASE_SIZE as u32;
        assert!(
            config.start_offset % erase_size == 0,
            "start_offset must be erase-unit aligned"
        );
        let end = config.start_offset as usize + config.sector_count as usize * F::ERASE_SIZE;
        assert!(
            end <= flash.capacity(),
            "partition runs past the device capacity"
        );
        Self { flash, config }
    }

    /// Wrap `flash`, spanning the whole device.
    pub fn spanning(flash: F) -> Self {
        let sector_count = (flash.capacity() / F::ERASE_SIZE) as u32;
        Self::new(flash, PartitionConfig::new(0, sector_count))
    }

    /// The partition placement.
    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    /// Consume the partition and return the underlying flash.
    pub fn into_inner(self) -> F {
        self.flash
    }

    /// Translate a region-relative address of `len` bytes to a device
    /// offset, rejecting anything outside the partition.
    fn device_offset(&self, address: u32, len: usize) -> Result<u32, PartitionError> {
        let size = self.config.sector_count as u64 * F::ERASE_SIZE as u64;
        if address as u64 + len as u64 > size {
            return Err(PartitionError(NorFlashErrorKind::OutOfBounds));
        }
        Ok(self.config.start_offset + address)
    }
}

impl<F: NorFlash + ReadNorFlash> FlashAccess for NorFlashPartition<F> {
    type Error = PartitionError;

    fn sector_size(&self) -> u32 {
        F::ERASE_SIZE as u32
    }

    fn sector_count(&self) -> u32 {
        self.config.sector_count
    }

    fn erase(&mut self, address: u32) -> Result<(), Self::Error> {
        let erase_size = F::ERASE_SIZE as u32;
        let unit = (address / erase_size) * erase_size;
        let from = self.device_offset(unit, F::ERASE_SIZE)?;
        self.flash
            .erase(from, from + erase_size)
            .map_err(|e| PartitionError(e.kind()))
    }

    fn program(&mut self, address: u32, data: &[u8]) -> Result<usize, Self::Error> {
        let offset = self.device_offset(address, data.len())?;
        self.flash
            .write(offset, data)
            .map_err(|e| PartitionError(e.kind()))?;
        Ok(data.len())
    }

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let offset = self.device_offset(address, buf.len())?;
        self.flash
            .read(offset, buf)
            .map_err(|e| PartitionError(e.kind()))?;
        Ok(buf.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashring::{Ring, RingError};

    const ERASE: usize = 256;
    const UNITS: usize = 16;

    /// Mock NOR flash for testing
    struct MockFlash {
        data: [[u8; ERASE]; UNITS],
    }

    impl MockFlash {
        fn new() -> Self {
            Self {
                data: [[0xFF; ERASE]; UNITS],
            }
        }
    }

    #[derive(Debug)]
    struct MockFlashError(NorFlashErrorKind);

    impl NorFlashError for MockFlashError {
        fn kind(&self) -> NorFlashErrorKind {
            self.0
        }
    }

    impl embedded_storage::nor_flash::ErrorType for MockFlash {
        type Error = MockFlashError;
    }

    impl ReadNorFlash for MockFlash {
        const READ_SIZE: usize = 1;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            let offset = offset as usize;
            if offset + bytes.len() > self.capacity() {
                return Err(MockFlashError(NorFlashErrorKind::OutOfBounds));
            }
            for (i, byte) in bytes.iter_mut().enumerate() {
                *byte = self.data[(offset + i) / ERASE][(offset + i) % ERASE];
            }
            Ok(())
        }

        fn capacity(&self) -> usize {
            UNITS * ERASE
        }
    }

    impl NorFlash for MockFlash {
        const WRITE_SIZE: usize = 1;
        const ERASE_SIZE: usize = ERASE;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            if from % ERASE as u32 != 0 || to as usize > self.capacity() {
                return Err(MockFlashError(NorFlashErrorKind::NotAligned));
            }
            for unit in (from as usize / ERASE)..(to as usize / ERASE) {
                self.data[unit] = [0xFF; ERASE];
            }
            Ok(())
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            let offset = offset as usize;
            if offset + bytes.len() > self.capacity() {
                return Err(MockFlashError(NorFlashErrorKind::OutOfBounds));
            }
            for (i, byte) in bytes.iter().enumerate() {
                // NOR programming only clears bits.
                self.data[(offset + i) / ERASE][(offset + i) % ERASE] &= byte;
            }
            Ok(())
        }
    }

    #[test]
    fn test_partition_exposes_geometry() {
        let partition = NorFlashPartition::new(MockFlash::new(), PartitionConfig::new(0, 4));
        assert_eq!(partition.sector_size(), ERASE as u32);
        assert_eq!(partition.sector_count(), 4);
    }

    #[test]
    fn test_spanning_covers_whole_device() {
        let partition = NorFlashPartition::spanning(MockFlash::new());
        assert_eq!(partition.sector_count(), UNITS as u32);
    }

    #[test]
    fn test_addresses_are_partition_relative() {
        let offset = 2 * ERASE as u32;
        let mut partition =
            NorFlashPartition::new(MockFlash::new(), PartitionConfig::new(offset, 4));

        partition.program(0, &[0xAB; 4]).unwrap();
        let flash = partition.into_inner();
        assert_eq!(flash.data[2][0..4], [0xAB; 4]);
        assert_eq!(flash.data[0], [0xFF; ERASE]);
    }

    #[test]
    fn test_erase_covers_enclosing_unit() {
        let mut partition = NorFlashPartition::new(MockFlash::new(), PartitionConfig::new(0, 4));
        partition.program(ERASE as u32 + 7, &[0x00; 8]).unwrap();

        // Any address inside the unit erases the whole unit.
        partition.erase(ERASE as u32 + 100).unwrap();
        let flash = partition.into_inner();
        assert_eq!(flash.data[1], [0xFF; ERASE]);
    }

    #[test]
    fn test_out_of_bounds_is_reported_not_spilled() {
        let mut partition = NorFlashPartition::new(MockFlash::new(), PartitionConfig::new(0, 2));
        let end = 2 * ERASE as u32;
        assert_eq!(
            partition.program(end - 2, &[0u8; 4]),
            Err(PartitionError(NorFlashErrorKind::OutOfBounds))
        );
        // The unit beyond the partition is untouched.
        assert_eq!(partition.into_inner().data[2], [0xFF; ERASE]);
    }

    #[test]
    #[should_panic(expected = "erase-unit aligned")]
    fn test_unaligned_start_offset() {
        let _ = NorFlashPartition::new(MockFlash::new(), PartitionConfig::new(100, 4));
    }

    #[test]
    #[should_panic(expected = "at least 2 erase units")]
    fn test_single_sector_partition_rejected() {
        let _ = PartitionConfig::new(0, 1);
    }

    #[test]
    fn test_ring_over_partition_roundtrip() {
        let offset = 8 * ERASE as u32;
        let partition =
            NorFlashPartition::new(MockFlash::new(), PartitionConfig::new(offset, 8));
        let mut ring = Ring::new(partition, 0x52_49_4E_47, 16).unwrap();
        ring.format().unwrap();

        for i in 0..10u8 {
            ring.append(&[i; 16]).unwrap();
        }

        // Restart: rebuild from flash through a fresh partition.
        let flash = ring.into_inner().into_inner();
        let partition = NorFlashPartition::new(flash, PartitionConfig::new(offset, 8));
        let mut ring = Ring::new(partition, 0x52_49_4E_47, 16).unwrap();
        ring.scan().unwrap();

        assert_eq!(ring.exact_number_of_files().unwrap(), 10);
        let mut record = [0u8; 16];
        for i in 0..10u8 {
            ring.fetch(&mut record).unwrap();
            assert_eq!(record, [i; 16]);
        }
        assert!(matches!(ring.fetch(&mut record), Err(RingError::Empty)));

        // The first half of the device never belonged to the ring.
        let flash = ring.into_inner().into_inner();
        for unit in 0..8 {
            assert_eq!(flash.data[unit], [0xFF; ERASE]);
        }
    }
}
