//! Flash geometry value object.
//!
//! [`Geometry`] is fixed at construction from the flash region's erase-unit
//! size and sector count plus the caller's record size, and derives every
//! address and capacity computation the ring needs. All slot arithmetic is
//! pure; no I/O happens here.

use crate::cursor::Location;
use crate::sector::SECTOR_HEADER_LEN;
use crate::slot::SLOT_HEADER_LEN;
use core::fmt;

/// Validated layout parameters of a ring filesystem.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    sector_size: u32,
    sector_count: u32,
    record_size: u32,
}

/// Errors from [`Geometry::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum GeometryError {
    /// Records cannot be zero-sized.
    ZeroRecordSize,
    /// A ring needs at least two sectors: one of retained data plus the
    /// rotation headroom.
    TooFewSectors {
        /// Number of sectors in the flash region.
        sector_count: u32,
    },
    /// A sector must hold its header and at least one slot.
    SectorTooSmall {
        /// Erase-unit size of the flash region.
        sector_size: u32,
        /// Bytes needed for one encoded slot.
        slot_len: u32,
    },
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroRecordSize => write!(f, "record size must be non-zero"),
            Self::TooFewSectors { sector_count } => {
                write!(f, "ring needs at least 2 sectors, flash has {}", sector_count)
            }
            Self::SectorTooSmall {
                sector_size,
                slot_len,
            } => write!(
                f,
                "sector of {} B cannot hold a {} B header plus a {} B slot",
                sector_size, SECTOR_HEADER_LEN, slot_len
            ),
        }
    }
}

impl core::error::Error for GeometryError {}

impl Geometry {
    /// Validate and derive the layout for the given flash region and
    /// record size.
    pub fn new(
        sector_size: u32,
        sector_count: u32,
        record_size: u32,
    ) -> Result<Self, GeometryError> {
        if record_size == 0 {
            return Err(GeometryError::ZeroRecordSize);
        }
        if sector_count < 2 {
            return Err(GeometryError::TooFewSectors { sector_count });
        }
        let slot_len = SLOT_HEADER_LEN as u32 + record_size;
        if sector_size < SECTOR_HEADER_LEN as u32 + slot_len {
            return Err(GeometryError::SectorTooSmall {
                sector_size,
                slot_len,
            });
        }
        Ok(Self {
            sector_size,
            sector_count,
            record_size,
        })
    }

    /// Erase-unit size in bytes.
    #[inline]
    pub const fn sector_size(&self) -> u32 {
        self.sector_size
    }

    /// Number of sectors in the ring.
    #[inline]
    pub const fn sector_count(&self) -> u32 {
        self.sector_count
    }

    /// Payload bytes per record.
    #[inline]
    pub const fn record_size(&self) -> u32 {
        self.record_size
    }

    /// Bytes occupied by one encoded slot (checksum plus payload).
    #[inline]
    pub const fn slot_len(&self) -> u32 {
        SLOT_HEADER_LEN as u32 + self.record_size
    }

    /// Record slots per sector.
    #[inline]
    pub const fn slots_per_sector(&self) -> u32 {
        (self.sector_size - SECTOR_HEADER_LEN as u32) / self.slot_len()
    }

    /// Maximum number of retained records.
    ///
    /// One sector is reserved as the rotation target, so the value is
    /// `(sector_count - 1) * slots_per_sector()`.
    #[inline]
    pub const fn capacity(&self) -> u32 {
        (self.sector_count - 1) * self.slots_per_sector()
    }

    /// Byte address of the start of `sector`.
    #[inline]
    pub const fn sector_address(&self, sector: u32) -> u32 {
        sector * self.sector_size
    }

    /// Byte address of the slot at `location`.
    #[inline]
    pub const fn slot_address(&self, location: Location) -> u32 {
        self.sector_address(location.sector)
            + SECTOR_HEADER_LEN as u32
            + location.slot * self.slot_len()
    }

    /// The sector following `sector` in ring order.
    #[inline]
    pub const fn next_sector(&self, sector: u32) -> u32 {
        (sector + 1) % self.sector_count
    }

    /// Normalize a location that may sit past the end of its sector.
    pub const fn canonical(&self, location: Location) -> Location {
        if location.slot >= self.slots_per_sector() {
            Location::new(self.next_sector(location.sector), 0)
        } else {
            location
        }
    }

    /// The slot after `location` in ring order, in canonical form.
    pub const fn step(&self, location: Location) -> Location {
        let c = self.canonical(location);
        self.canonical(Location::new(c.sector, c.slot + 1))
    }

    /// Whether two locations name the same slot, after normalization.
    pub fn same_slot(&self, a: Location, b: Location) -> bool {
        self.canonical(a) == self.canonical(b)
    }

    const fn linear(&self, location: Location) -> u32 {
        let c = self.canonical(location);
        c.sector * self.slots_per_sector() + c.slot
    }

    /// Ring distance from `from` to `to`, in slots.
    pub const fn slots_between(&self, from: Location, to: Location) -> u32 {
        let total = self.sector_count * self.slots_per_sector();
        (self.linear(to) + total - self.linear(from)) % total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_layout() {
        // (144 - 20) / (4 + 8) = 10 slots
        let geo = Geometry::new(144, 4, 8).unwrap();
        assert_eq!(geo.slots_per_sector(), 10);
        assert_eq!(geo.capacity(), 30);
        assert_eq!(geo.slot_len(), 12);
    }

    #[test]
    fn test_slot_addresses() {
        let geo = Geometry::new(144, 4, 8).unwrap();
        assert_eq!(geo.slot_address(Location::new(0, 0)), 20);
        assert_eq!(geo.slot_address(Location::new(0, 1)), 32);
        assert_eq!(geo.slot_address(Location::new(2, 0)), 2 * 144 + 20);
    }

    #[test]
    fn test_canonical_rolls_into_next_sector() {
        let geo = Geometry::new(144, 4, 8).unwrap();
        assert_eq!(geo.canonical(Location::new(1, 10)), Location::new(2, 0));
        assert_eq!(geo.canonical(Location::new(3, 10)), Location::new(0, 0));
        assert_eq!(geo.canonical(Location::new(1, 9)), Location::new(1, 9));
    }

    #[test]
    fn test_slots_between_wraps() {
        let geo = Geometry::new(144, 4, 8).unwrap();
        let a = Location::new(3, 8);
        let b = Location::new(0, 2);
        assert_eq!(geo.slots_between(a, b), 4);
        assert_eq!(geo.slots_between(a, a), 0);
        assert_eq!(geo.slots_between(Location::new(0, 0), Location::new(3, 0)), 30);
    }

    #[test]
    fn test_rejects_degenerate_layouts() {
        assert!(matches!(
            Geometry::new(144, 4, 0),
            Err(GeometryError::ZeroRecordSize)
        ));
        assert!(matches!(
            Geometry::new(144, 1, 8),
            Err(GeometryError::TooFewSectors { sector_count: 1 })
        ));
        assert!(matches!(
            Geometry::new(24, 4, 8),
            Err(GeometryError::SectorTooSmall { .. })
        ));
    }
}
