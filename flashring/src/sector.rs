//! Sector headers, epochs, and sector-level bookkeeping.
//!
//! Every initialized sector starts with a small header naming the
//! filesystem (magic and database identifier), the record size, and the
//! sector's epoch. Epochs order the sectors after a restart: rotation
//! stamps each claimed sector with `newest + 1`, so the headered sectors
//! always carry a contiguous, strictly increasing run of epochs in ring
//! order. Sectors without a recognizable header are rotation headroom:
//! a freshly formatted ring, or a rotation that lost power between the
//! erase and the header program.

use crate::CRC32;
use crate::error::RingError;
use crate::flash::FlashAccess;
use crate::geometry::Geometry;
use core::fmt;

/// Encoded size of a sector header in bytes.
pub const SECTOR_HEADER_LEN: usize = 20;

/// Marker identifying a flashring sector header ("RING").
pub const SECTOR_MAGIC: u32 = 0x5249_4E47;

/// Per-sector monotonic counter ordering the ring.
///
/// The counter is fixed-width and wraps, so ordering uses signed-difference
/// comparison instead of naive `>`; the ring stays ordered correctly even
/// after the counter rolls over.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch(u32);

impl Epoch {
    /// Create an epoch from its raw counter value.
    #[inline]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Raw counter value.
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// The epoch one rotation later.
    #[inline]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// The epoch one rotation earlier.
    #[inline]
    pub const fn prev(self) -> Self {
        Self(self.0.wrapping_sub(1))
    }

    /// Wraparound-aware ordering.
    #[inline]
    pub const fn is_newer_than(self, other: Epoch) -> bool {
        (self.0.wrapping_sub(other.0) as i32) > 0
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decoded sector header.
///
/// Layout on flash, all little-endian:
/// `magic | epoch | database_id | record_size | crc`, where `crc` is the
/// CRC-32 of the first 16 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorHeader {
    /// Sector epoch.
    pub epoch: Epoch,
    /// Identifier of the database stored in this ring.
    pub database_id: u32,
    /// Payload bytes per record.
    pub record_size: u32,
}

impl SectorHeader {
    /// Encode the header for programming at the start of a sector.
    pub fn encode(&self) -> [u8; SECTOR_HEADER_LEN] {
        let mut bytes = [0u8; SECTOR_HEADER_LEN];
        bytes[0..4].copy_from_slice(&SECTOR_MAGIC.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.epoch.value().to_le_bytes());
        bytes[8..12].copy_from_slice(&self.database_id.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.record_size.to_le_bytes());
        let crc = CRC32.checksum(&bytes[0..16]);
        bytes[16..20].copy_from_slice(&crc.to_le_bytes());
        bytes
    }

    /// Decode a header, returning `None` if the magic or CRC do not check
    /// out (an erased or torn header, or foreign data).
    pub fn decode(bytes: &[u8; SECTOR_HEADER_LEN]) -> Option<Self> {
        let word = |i: usize| u32::from_le_bytes(bytes[i..i + 4].try_into().unwrap());
        if word(0) != SECTOR_MAGIC {
            return None;
        }
        if word(16) != CRC32.checksum(&bytes[0..16]) {
            return None;
        }
        Some(Self {
            epoch: Epoch::new(word(4)),
            database_id: word(8),
            record_size: word(12),
        })
    }
}

/// Sector-granularity bookkeeping: which sector is newest, and rotation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SectorManager {
    newest: u32,
    newest_epoch: Epoch,
}

impl SectorManager {
    /// Placeholder state before format/scan.
    pub fn empty() -> Self {
        Self {
            newest: 0,
            newest_epoch: Epoch::new(0),
        }
    }

    /// Index of the newest sector, the one the write cursor lives in.
    pub fn newest(&self) -> u32 {
        self.newest
    }

    /// Epoch of the newest sector.
    pub fn newest_epoch(&self) -> Epoch {
        self.newest_epoch
    }

    fn read_header<F: FlashAccess>(
        flash: &mut F,
        geo: &Geometry,
        sector: u32,
    ) -> Result<Option<SectorHeader>, RingError<F::Error>> {
        let mut bytes = [0u8; SECTOR_HEADER_LEN];
        flash
            .read(geo.sector_address(sector), &mut bytes)
            .map_err(RingError::Io)?;
        Ok(SectorHeader::decode(&bytes))
    }

    fn check_compatible<E>(
        header: &SectorHeader,
        geo: &Geometry,
        database_id: u32,
    ) -> Result<(), RingError<E>> {
        if header.database_id != database_id || header.record_size != geo.record_size() {
            return Err(RingError::VersionMismatch {
                expected_id: database_id,
                found_id: header.database_id,
                expected_record_size: geo.record_size(),
                found_record_size: header.record_size,
            });
        }
        Ok(())
    }

    /// Format-time bootstrap: erase every sector and stamp sector 0 with
    /// the initial epoch. The other sectors stay headerless until rotation
    /// claims them.
    pub fn initialize<F: FlashAccess>(
        flash: &mut F,
        geo: &Geometry,
        database_id: u32,
    ) -> Result<Self, RingError<F::Error>> {
        for sector in 0..geo.sector_count() {
            flash
                .erase(geo.sector_address(sector))
                .map_err(RingError::Io)?;
        }
        let header = SectorHeader {
            epoch: Epoch::new(0),
            database_id,
            record_size: geo.record_size(),
        };
        flash
            .program(geo.sector_address(0), &header.encode())
            .map_err(RingError::Io)?;
        Ok(Self {
            newest: 0,
            newest_epoch: header.epoch,
        })
    }

    /// Erase `target` and stamp it with the next epoch, making it the
    /// newest sector. Any data it held is gone.
    pub fn rotate_into<F: FlashAccess>(
        &mut self,
        flash: &mut F,
        geo: &Geometry,
        database_id: u32,
        target: u32,
    ) -> Result<(), RingError<F::Error>> {
        let epoch = self.newest_epoch.next();
        flash
            .erase(geo.sector_address(target))
            .map_err(RingError::Io)?;
        let header = SectorHeader {
            epoch,
            database_id,
            record_size: geo.record_size(),
        };
        flash
            .program(geo.sector_address(target), &header.encode())
            .map_err(RingError::Io)?;
        self.newest = target;
        self.newest_epoch = epoch;
        trace!("rotated into sector {}, epoch {}", target, epoch.value());
        Ok(())
    }

    /// Rebuild sector state from on-flash headers.
    ///
    /// Returns the manager plus the index of the oldest headered sector.
    /// The headered sectors must form one contiguous ring run with epochs
    /// increasing by exactly one, ending at the newest; anything else is
    /// reported as [`RingError::FormatInvalid`].
    pub fn scan<F: FlashAccess>(
        flash: &mut F,
        geo: &Geometry,
        database_id: u32,
    ) -> Result<(Self, u32), RingError<F::Error>> {
        // First pass: find the newest valid header.
        let mut newest: Option<(u32, Epoch)> = None;
        for sector in 0..geo.sector_count() {
            let Some(header) = Self::read_header(flash, geo, sector)? else {
                continue;
            };
            Self::check_compatible(&header, geo, database_id)?;
            match newest {
                None => newest = Some((sector, header.epoch)),
                Some((_, epoch)) if header.epoch.is_newer_than(epoch) => {
                    newest = Some((sector, header.epoch));
                }
                Some((_, epoch)) if header.epoch == epoch => {
                    // Two sectors may never share an epoch.
                    return Err(RingError::FormatInvalid);
                }
                Some(_) => {}
            }
        }
        let Some((newest, newest_epoch)) = newest else {
            return Err(RingError::FormatInvalid);
        };

        // Second pass: walk backwards from the newest sector. Headered
        // sectors must count down by one; once a headerless sector shows
        // up, every remaining sector must be headerless too.
        let count = geo.sector_count();
        let mut oldest = newest;
        let mut expected = newest_epoch;
        let mut in_run = true;
        for back in 1..count {
            let sector = (newest + count - back) % count;
            let header = Self::read_header(flash, geo, sector)?;
            match (header, in_run) {
                (Some(h), true) => {
                    expected = expected.prev();
                    if h.epoch != expected {
                        warn!(
                            "sector {} epoch {} breaks the ring order",
                            sector,
                            h.epoch.value()
                        );
                        return Err(RingError::FormatInvalid);
                    }
                    oldest = sector;
                }
                (Some(_), false) => return Err(RingError::FormatInvalid),
                (None, true) => in_run = false,
                (None, false) => {}
            }
        }

        debug!(
            "scan: newest sector {} epoch {}, oldest sector {}",
            newest,
            newest_epoch.value(),
            oldest
        );
        Ok((
            Self {
                newest,
                newest_epoch,
            },
            oldest,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = SectorHeader {
            epoch: Epoch::new(42),
            database_id: 0xDEAD_BEEF,
            record_size: 64,
        };
        let decoded = SectorHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let header = SectorHeader {
            epoch: Epoch::new(1),
            database_id: 1,
            record_size: 8,
        };
        let mut bytes = header.encode();
        bytes[0] ^= 0xFF;
        assert!(SectorHeader::decode(&bytes).is_none());
    }

    #[test]
    fn test_decode_rejects_bad_crc() {
        let header = SectorHeader {
            epoch: Epoch::new(1),
            database_id: 1,
            record_size: 8,
        };
        let mut bytes = header.encode();
        bytes[5] ^= 0x01; // flip a bit in the epoch
        assert!(SectorHeader::decode(&bytes).is_none());
    }

    #[test]
    fn test_decode_rejects_erased_flash() {
        assert!(SectorHeader::decode(&[0xFF; SECTOR_HEADER_LEN]).is_none());
    }

    #[test]
    fn test_epoch_ordering_survives_wraparound() {
        let old = Epoch::new(u32::MAX);
        let new = old.next();
        assert_eq!(new.value(), 0);
        assert!(new.is_newer_than(old));
        assert!(!old.is_newer_than(new));
        assert_eq!(new.prev(), old);
    }

    #[cfg(feature = "alloc")]
    mod on_flash {
        use super::*;
        use crate::geometry::Geometry;
        use crate::mem::MemFlash;

        const DB: u32 = 0x10;

        fn setup() -> (MemFlash, Geometry) {
            (MemFlash::new(144, 4), Geometry::new(144, 4, 8).unwrap())
        }

        #[test]
        fn test_initialize_stamps_only_sector_zero() {
            let (mut flash, geo) = setup();
            let mgr = SectorManager::initialize(&mut flash, &geo, DB).unwrap();
            assert_eq!(mgr.newest(), 0);

            let (scanned, oldest) = SectorManager::scan(&mut flash, &geo, DB).unwrap();
            assert_eq!(scanned.newest(), 0);
            assert_eq!(scanned.newest_epoch(), Epoch::new(0));
            assert_eq!(oldest, 0);
        }

        #[test]
        fn test_rotation_advances_epoch_and_run() {
            let (mut flash, geo) = setup();
            let mut mgr = SectorManager::initialize(&mut flash, &geo, DB).unwrap();
            mgr.rotate_into(&mut flash, &geo, DB, 1).unwrap();
            mgr.rotate_into(&mut flash, &geo, DB, 2).unwrap();

            let (scanned, oldest) = SectorManager::scan(&mut flash, &geo, DB).unwrap();
            assert_eq!(scanned.newest(), 2);
            assert_eq!(scanned.newest_epoch(), Epoch::new(2));
            assert_eq!(oldest, 0);
        }

        #[test]
        fn test_scan_blank_flash_is_format_invalid() {
            let (mut flash, geo) = setup();
            assert!(matches!(
                SectorManager::scan(&mut flash, &geo, DB),
                Err(RingError::FormatInvalid)
            ));
        }

        #[test]
        fn test_scan_rejects_foreign_database() {
            let (mut flash, geo) = setup();
            SectorManager::initialize(&mut flash, &geo, DB).unwrap();
            assert!(matches!(
                SectorManager::scan(&mut flash, &geo, 0x99),
                Err(RingError::VersionMismatch { .. })
            ));
        }

        #[test]
        fn test_scan_tolerates_interrupted_rotation() {
            let (mut flash, geo) = setup();
            let mut mgr = SectorManager::initialize(&mut flash, &geo, DB).unwrap();
            mgr.rotate_into(&mut flash, &geo, DB, 1).unwrap();
            // Power loss between erase and header program of sector 2.
            flash.erase(geo.sector_address(2)).unwrap();

            let (scanned, oldest) = SectorManager::scan(&mut flash, &geo, DB).unwrap();
            assert_eq!(scanned.newest(), 1);
            assert_eq!(oldest, 0);
        }
    }
}
