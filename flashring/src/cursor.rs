//! Cursor positions and the read/write cursor protocol.
//!
//! The ring keeps three in-memory cursors: the write cursor (next free
//! slot), the read cursor (next unfetched slot) and the discard boundary
//! (oldest slot not yet eligible for overwrite). They always satisfy
//! `boundary <= read <= write` in ring order. None of them is persisted
//! directly; durability comes from the sector headers and slot checksums,
//! and [`Ring::scan`](crate::Ring::scan) rebuilds all three.

use crate::geometry::Geometry;
use core::fmt;

/// A slot position within the ring.
///
/// `sector` is the position within the ring (not a physical identity) and
/// `slot` the record index inside that sector. The write cursor may carry
/// `slot == slots_per_sector` transiently, meaning "past the end of this
/// sector, rotation pending".
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Sector index, `0..sector_count`.
    pub sector: u32,
    /// Slot index within the sector.
    pub slot: u32,
}

impl Location {
    /// Create a new location.
    #[inline]
    pub const fn new(sector: u32, slot: u32) -> Self {
        Self { sector, slot }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sector {} slot {}", self.sector, self.slot)
    }
}

/// The three cursors of a ring instance.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cursors {
    /// Next slot to write. May be lazily un-normalized past a sector end.
    pub write: Location,
    /// Next slot to fetch.
    pub read: Location,
    /// Oldest slot still retained.
    pub boundary: Location,
}

impl Cursors {
    /// All cursors at the first slot of `sector`.
    pub fn start_of(sector: u32) -> Self {
        let at = Location::new(sector, 0);
        Self {
            write: at,
            read: at,
            boundary: at,
        }
    }

    /// Reset the read cursor back to the oldest retained record.
    pub fn rewind(&mut self) {
        self.read = self.boundary;
    }

    /// Advance the discard boundary by one slot, dragging the read cursor
    /// along if it pointed at the evicted slot.
    pub fn evict_one(&mut self, geo: &Geometry) {
        let next = geo.step(self.boundary);
        if geo.same_slot(self.read, self.boundary) {
            self.read = next;
        }
        self.boundary = next;
    }

    /// Push the boundary and read cursor out of `sector` after it has been
    /// consumed by rotation. Records they pointed at are gone.
    pub fn force_past_sector(&mut self, geo: &Geometry, sector: u32) {
        let after = Location::new(geo.next_sector(sector), 0);
        if geo.canonical(self.boundary).sector == sector {
            self.boundary = after;
        }
        if geo.canonical(self.read).sector == sector {
            self.read = after;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 4 sectors, 10 slots of 8-byte records each.
    fn geo() -> Geometry {
        Geometry::new(144, 4, 8).unwrap()
    }

    #[test]
    fn test_rewind_restores_boundary() {
        let mut cursors = Cursors::start_of(0);
        cursors.read = Location::new(1, 3);
        cursors.boundary = Location::new(0, 5);

        cursors.rewind();
        assert_eq!(cursors.read, Location::new(0, 5));
    }

    #[test]
    fn test_evict_drags_read_cursor() {
        let geo = geo();
        let mut cursors = Cursors::start_of(0);

        cursors.evict_one(&geo);
        assert_eq!(cursors.boundary, Location::new(0, 1));
        assert_eq!(cursors.read, Location::new(0, 1));
    }

    #[test]
    fn test_evict_leaves_read_cursor_ahead() {
        let geo = geo();
        let mut cursors = Cursors::start_of(0);
        cursors.read = Location::new(0, 4);

        cursors.evict_one(&geo);
        assert_eq!(cursors.boundary, Location::new(0, 1));
        assert_eq!(cursors.read, Location::new(0, 4));
    }

    #[test]
    fn test_evict_crosses_sector_end() {
        let geo = geo();
        let mut cursors = Cursors::start_of(0);
        cursors.boundary = Location::new(0, 9);
        cursors.read = Location::new(1, 2);

        cursors.evict_one(&geo);
        assert_eq!(cursors.boundary, Location::new(1, 0));
    }

    #[test]
    fn test_force_past_erased_sector() {
        let geo = geo();
        let mut cursors = Cursors::start_of(0);
        cursors.boundary = Location::new(2, 4);
        cursors.read = Location::new(2, 8);
        cursors.write = Location::new(1, 10);

        cursors.force_past_sector(&geo, 2);
        assert_eq!(cursors.boundary, Location::new(3, 0));
        assert_eq!(cursors.read, Location::new(3, 0));
    }

    #[test]
    fn test_force_past_only_moves_affected_cursors() {
        let geo = geo();
        let mut cursors = Cursors::start_of(0);
        cursors.boundary = Location::new(2, 4);
        cursors.read = Location::new(3, 1);

        cursors.force_past_sector(&geo, 2);
        assert_eq!(cursors.boundary, Location::new(3, 0));
        assert_eq!(cursors.read, Location::new(3, 1));
    }
}
