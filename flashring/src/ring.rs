//! Ring controller: the top-level filesystem object.
//!
//! [`Ring`] owns the in-memory state (cursors and sector bookkeeping) and
//! composes the codecs against the injected [`FlashAccess`] contract. All
//! operations are synchronous and return only once every flash call has
//! completed or one of them failed.

use crate::cursor::{Cursors, Location};
use crate::error::RingError;
use crate::flash::FlashAccess;
use crate::geometry::{Geometry, GeometryError};
use crate::sector::SectorManager;
use crate::slot::{self, SlotState};
use core::fmt;

/// A ring filesystem over a flash region.
///
/// Records are appended at the write cursor and fetched oldest-first at
/// the read cursor; once the ring holds
/// [`maximum_capacity`](Self::maximum_capacity) records, each append
/// evicts the oldest retained record. A `Ring` must be brought up with
/// [`format`](Self::format) (new medium) or [`scan`](Self::scan)
/// (existing filesystem, e.g. after a restart) before use.
///
/// Rings storing different record layouts are incompatible; the
/// `database_id` chosen at construction tells them apart on flash.
pub struct Ring<F: FlashAccess> {
    flash: F,
    geometry: Geometry,
    database_id: u32,
    sectors: SectorManager,
    cursors: Cursors,
    ready: bool,
}

impl<F: FlashAccess> Ring<F> {
    /// Create a ring over `flash` for records of `record_size` bytes.
    ///
    /// Validates the flash geometry but performs no I/O; follow up with
    /// [`format`](Self::format) or [`scan`](Self::scan).
    pub fn new(flash: F, database_id: u32, record_size: u32) -> Result<Self, GeometryError> {
        let geometry = Geometry::new(flash.sector_size(), flash.sector_count(), record_size)?;
        Ok(Self {
            flash,
            geometry,
            database_id,
            sectors: SectorManager::empty(),
            cursors: Cursors::start_of(0),
            ready: false,
        })
    }

    /// The derived layout of this ring.
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// The database identifier this ring was constructed with.
    pub fn database_id(&self) -> u32 {
        self.database_id
    }

    /// Access the underlying flash directly.
    ///
    /// Writing through this reference can invalidate the in-memory
    /// cursors; re-[`scan`](Self::scan) afterwards.
    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    /// Consume the ring and return the underlying flash.
    pub fn into_inner(self) -> F {
        self.flash
    }

    fn ensure_ready(&self) -> Result<(), RingError<F::Error>> {
        if self.ready {
            Ok(())
        } else {
            Err(RingError::NotInitialized)
        }
    }

    /// Erase the medium and write a fresh, empty filesystem.
    ///
    /// This removes all data currently stored in the region. If an erase
    /// or program call fails partway the medium is left in an
    /// indeterminate state and the ring unusable; retry `format` to
    /// completion.
    pub fn format(&mut self) -> Result<(), RingError<F::Error>> {
        self.ready = false;
        self.sectors = SectorManager::initialize(&mut self.flash, &self.geometry, self.database_id)?;
        self.cursors = Cursors::start_of(0);
        self.ready = true;
        debug!(
            "formatted: {} sectors of {} B, capacity {} records",
            self.geometry.sector_count(),
            self.geometry.sector_size(),
            self.geometry.capacity()
        );
        Ok(())
    }

    /// Rebuild all in-memory state from the on-flash content.
    ///
    /// Validates the sector headers (epoch ordering, magic, checksum),
    /// locates the write cursor at the first free slot of the newest
    /// sector, and the read cursor and discard boundary at the oldest
    /// retained record. A torn slot found at the write boundary is retired
    /// (marked discarded) because it can never be re-programmed reliably.
    ///
    /// # Errors
    ///
    /// [`FormatInvalid`](RingError::FormatInvalid) if no sector carries a
    /// recognizable header or the headers are inconsistent; call
    /// [`format`](Self::format); [`VersionMismatch`](RingError::VersionMismatch)
    /// if the medium belongs to an incompatible ring;
    /// [`Io`](RingError::Io) on flash failures.
    pub fn scan(&mut self) -> Result<(), RingError<F::Error>> {
        self.ready = false;
        let geo = self.geometry;
        let (sectors, oldest) =
            SectorManager::scan(&mut self.flash, &geo, self.database_id)?;

        // Write cursor: first slot of the newest sector that is not data.
        // A torn slot is retired and skipped; it counts as the boundary's
        // past, not as free space.
        let mut write = Location::new(sectors.newest(), 0);
        while write.slot < geo.slots_per_sector() {
            match slot::read_state(&mut self.flash, &geo, write)? {
                SlotState::Empty => break,
                SlotState::Valid | SlotState::Discarded => write.slot += 1,
                SlotState::Torn => {
                    warn!("retiring torn slot at {} {}", write.sector, write.slot);
                    slot::mark_discarded(&mut self.flash, &geo, write)?;
                    write.slot += 1;
                }
            }
        }

        // Read cursor and discard boundary: oldest slot still carrying a
        // valid record, skipping everything already discarded. The walk is
        // counted rather than position-terminated: with the newest sector
        // full, the normalized write position aliases the oldest sector's
        // first slot and must not be mistaken for an empty ring.
        let headered = (sectors.newest() + geo.sector_count() - oldest) % geo.sector_count();
        let span = headered * geo.slots_per_sector() + write.slot;
        let mut cursor = Location::new(oldest, 0);
        let mut found = None;
        for _ in 0..span {
            match slot::read_state(&mut self.flash, &geo, cursor)? {
                SlotState::Valid => {
                    found = Some(cursor);
                    break;
                }
                SlotState::Discarded | SlotState::Torn => cursor = geo.step(cursor),
                SlotState::Empty => break,
            }
        }
        let boundary = found.unwrap_or(geo.canonical(write));

        self.sectors = sectors;
        self.cursors = Cursors {
            write,
            read: boundary,
            boundary,
        };
        self.ready = true;
        debug!(
            "scan complete: ~{} records retained",
            geo.slots_between(boundary, write)
        );
        Ok(())
    }

    /// Maximum number of records the ring retains.
    ///
    /// One sector is always reserved as the rotation target, so this is
    /// `(sector_count - 1) * slots_per_sector`. Pure computation, no I/O.
    pub fn maximum_capacity(&self) -> Result<u32, RingError<F::Error>> {
        self.ensure_ready()?;
        Ok(self.geometry.capacity())
    }

    /// O(1) estimate of the retained record count, derived from the
    /// cursor positions. May over-count near a torn write.
    pub fn estimate_number_of_files(&self) -> Result<u32, RingError<F::Error>> {
        self.ensure_ready()?;
        Ok(self
            .geometry
            .slots_between(self.cursors.boundary, self.cursors.write))
    }

    /// O(n) exact count of intact retained records.
    ///
    /// Walks every slot between the discard boundary and the write cursor
    /// validating checksums. A checksum failure mid-walk marks the
    /// effective end of valid data: the walk stops and does not count
    /// further, rather than reporting an error.
    pub fn exact_number_of_files(&mut self) -> Result<u32, RingError<F::Error>> {
        self.ensure_ready()?;
        let geo = self.geometry;
        let end = geo.canonical(self.cursors.write);
        let mut cursor = geo.canonical(self.cursors.boundary);
        let mut count = 0;
        while cursor != end {
            match slot::read_state(&mut self.flash, &geo, cursor)? {
                SlotState::Valid => {
                    count += 1;
                    cursor = geo.step(cursor);
                }
                // Retired slots inside the retained range (a torn write
                // cleaned up by scan) hold no record but end nothing.
                SlotState::Discarded => cursor = geo.step(cursor),
                _ => break,
            }
        }
        Ok(count)
    }

    /// Append a record at the end of the ring, evicting the oldest record
    /// if the ring is at capacity.
    ///
    /// Eviction is the defined behavior, not an error: once
    /// [`maximum_capacity`](Self::maximum_capacity) records are retained,
    /// every append discards the record at the boundary first. Crossing a
    /// sector end additionally rotates the ring: the next sector is
    /// erased and re-stamped, and any cursors still inside it are pushed
    /// past it.
    ///
    /// # Panics
    ///
    /// Panics if `record.len()` differs from the configured record size.
    pub fn append(&mut self, record: &[u8]) -> Result<(), RingError<F::Error>> {
        self.ensure_ready()?;
        let geo = self.geometry;
        assert_eq!(
            record.len(),
            geo.record_size() as usize,
            "record length must match the configured record size"
        );

        // FIFO eviction: retire the oldest retained slot on flash so the
        // boundary survives a restart.
        if geo.slots_between(self.cursors.boundary, self.cursors.write) >= geo.capacity() {
            let evicted = geo.canonical(self.cursors.boundary);
            slot::mark_discarded(&mut self.flash, &geo, evicted)?;
            self.cursors.evict_one(&geo);
            trace!("evicted record at {} {}", evicted.sector, evicted.slot);
        }

        // Rotate once the write head has run off the end of its sector.
        if self.cursors.write.slot >= geo.slots_per_sector() {
            let target = geo.next_sector(self.cursors.write.sector);
            self.sectors
                .rotate_into(&mut self.flash, &geo, self.database_id, target)?;
            self.cursors.force_past_sector(&geo, target);
            self.cursors.write = Location::new(target, 0);
        }

        slot::write_slot(&mut self.flash, &geo, self.cursors.write, record)?;
        self.cursors.write.slot += 1; // normalized lazily on the next append
        Ok(())
    }

    /// Fetch the next unread record, oldest-first, into `record`.
    ///
    /// Advances the read cursor only; the record stays on flash until
    /// [`discard`](Self::discard).
    ///
    /// # Errors
    ///
    /// [`Empty`](RingError::Empty) when all records have been fetched;
    /// [`Corruption`](RingError::Corruption) if the slot fails its
    /// checksum; the cursor does not advance, so the failure repeats
    /// deterministically until the caller intervenes.
    ///
    /// # Panics
    ///
    /// Panics if `record.len()` differs from the configured record size.
    pub fn fetch(&mut self, record: &mut [u8]) -> Result<(), RingError<F::Error>> {
        self.ensure_ready()?;
        let geo = self.geometry;
        assert_eq!(
            record.len(),
            geo.record_size() as usize,
            "record length must match the configured record size"
        );

        let mut read = geo.canonical(self.cursors.read);
        loop {
            if read == geo.canonical(self.cursors.write) {
                return Err(RingError::Empty);
            }

            let base = geo.slot_address(read);
            let stored = slot::read_checksum(&mut self.flash, base)?;
            self.flash
                .read(base + slot::SLOT_HEADER_LEN as u32, record)
                .map_err(RingError::Io)?;

            match slot::classify(stored, record) {
                SlotState::Valid => {
                    self.cursors.read = geo.step(read);
                    return Ok(());
                }
                // A retired slot holds no record; step over it.
                SlotState::Discarded => {
                    read = geo.step(read);
                    self.cursors.read = read;
                }
                _ => return Err(RingError::Corruption { location: read }),
            }
        }
    }

    /// Release every record fetched so far for future overwrite.
    ///
    /// Marks each slot between the discard boundary and the read cursor
    /// as discarded on flash and moves the boundary up to the read
    /// cursor. Idempotent.
    pub fn discard(&mut self) -> Result<(), RingError<F::Error>> {
        self.ensure_ready()?;
        let geo = self.geometry;
        let end = geo.canonical(self.cursors.read);
        let mut cursor = geo.canonical(self.cursors.boundary);
        while cursor != end {
            slot::mark_discarded(&mut self.flash, &geo, cursor)?;
            cursor = geo.step(cursor);
        }
        self.cursors.boundary = end;
        Ok(())
    }

    /// Move the read cursor back to the oldest retained record.
    ///
    /// Records fetched but not yet discarded become fetchable again, in
    /// the same order; discarded records remain gone.
    pub fn rewind(&mut self) -> Result<(), RingError<F::Error>> {
        self.ensure_ready()?;
        self.cursors.rewind();
        Ok(())
    }

    /// Write a human-readable dump of the filesystem state for debugging.
    pub fn dump<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        let geo = &self.geometry;
        writeln!(
            out,
            "flashring: db {:#010x}, {}",
            self.database_id,
            if self.ready { "ready" } else { "not initialized" }
        )?;
        writeln!(
            out,
            "  geometry: {} sectors x {} B, {} slots/sector, {} B records, capacity {}",
            geo.sector_count(),
            geo.sector_size(),
            geo.slots_per_sector(),
            geo.record_size(),
            geo.capacity()
        )?;
        writeln!(
            out,
            "  newest sector {} at epoch {}",
            self.sectors.newest(),
            self.sectors.newest_epoch()
        )?;
        writeln!(
            out,
            "  write {} | read {} | boundary {}",
            self.cursors.write, self.cursors.read, self.cursors.boundary
        )?;
        writeln!(
            out,
            "  ~{} records retained",
            geo.slots_between(self.cursors.boundary, self.cursors.write)
        )
    }
}
