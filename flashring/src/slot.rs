//! Slot encoding: checksum-as-validity over fixed-size payloads.
//!
//! A slot is a 4-byte checksum field followed by the record payload. Flash
//! bits only move from 1 to 0 between erasures, so instead of a separate
//! "written" flag the checksum field itself carries the slot lifecycle:
//!
//! - all-ones checksum over an all-ones payload: erased, free to program;
//! - a value matching the payload CRC: fully written, valid;
//! - all-zeros: discarded (programmed over any previous value);
//! - anything else: a torn write, treated as the write boundary.
//!
//! Appends program the payload before the checksum, so a crash at any
//! point leaves the slot classifiable as erased or torn, never valid.
//! The CRC is remapped off the two sentinel values so the states cannot
//! collide.

use crate::CRC32;
use crate::cursor::Location;
use crate::error::RingError;
use crate::flash::FlashAccess;
use crate::geometry::Geometry;

/// Bytes of slot metadata preceding the payload.
pub const SLOT_HEADER_LEN: usize = 4;

/// Checksum field value of an erased slot.
pub const CHECKSUM_ERASED: u32 = 0xFFFF_FFFF;

/// Checksum field value of a discarded slot.
pub const CHECKSUM_DISCARDED: u32 = 0x0000_0000;

/// Lifecycle state of a slot, as read back from flash.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Erased and free to program.
    Empty,
    /// Fully written with a valid checksum.
    Valid,
    /// Fetched and released for future overwrite.
    Discarded,
    /// Partially programmed; never reusable until the sector is erased.
    Torn,
}

#[inline]
fn remap(crc: u32) -> u32 {
    // Keep computed checksums off the erased/discarded sentinels.
    match crc {
        CHECKSUM_DISCARDED => 0x0000_0001,
        CHECKSUM_ERASED => 0xFFFF_FFFE,
        c => c,
    }
}

/// Checksum stored alongside a payload.
pub fn payload_checksum(payload: &[u8]) -> u32 {
    remap(CRC32.checksum(payload))
}

fn classify_parts(stored: u32, payload_crc: u32, payload_all_ff: bool) -> SlotState {
    if stored == CHECKSUM_ERASED && payload_all_ff {
        SlotState::Empty
    } else if stored == CHECKSUM_DISCARDED {
        SlotState::Discarded
    } else if stored == payload_crc {
        SlotState::Valid
    } else {
        SlotState::Torn
    }
}

/// Classify a slot from its stored checksum field and payload bytes.
pub fn classify(stored: u32, payload: &[u8]) -> SlotState {
    classify_parts(
        stored,
        payload_checksum(payload),
        payload.iter().all(|&b| b == 0xFF),
    )
}

/// Read and classify the slot at `location` without buffering the payload.
///
/// The payload is streamed through a small stack window, so this works for
/// any record size without allocation.
pub(crate) fn read_state<F: FlashAccess>(
    flash: &mut F,
    geo: &Geometry,
    location: Location,
) -> Result<SlotState, RingError<F::Error>> {
    let base = geo.slot_address(location);
    let stored = read_checksum(flash, base)?;

    let mut digest = CRC32.digest();
    let mut all_ff = true;
    let mut chunk = [0u8; 32];
    let mut offset = base + SLOT_HEADER_LEN as u32;
    let mut remaining = geo.record_size();
    while remaining > 0 {
        let n = remaining.min(chunk.len() as u32) as usize;
        flash.read(offset, &mut chunk[..n]).map_err(RingError::Io)?;
        digest.update(&chunk[..n]);
        all_ff &= chunk[..n].iter().all(|&b| b == 0xFF);
        offset += n as u32;
        remaining -= n as u32;
    }

    Ok(classify_parts(stored, remap(digest.finalize()), all_ff))
}

/// Read the checksum field of the slot starting at `base`.
pub(crate) fn read_checksum<F: FlashAccess>(
    flash: &mut F,
    base: u32,
) -> Result<u32, RingError<F::Error>> {
    let mut bytes = [0u8; SLOT_HEADER_LEN];
    flash.read(base, &mut bytes).map_err(RingError::Io)?;
    Ok(u32::from_le_bytes(bytes))
}

/// Program a record into the slot at `location`: payload first, checksum
/// last, so the slot only becomes valid once the payload is complete.
pub(crate) fn write_slot<F: FlashAccess>(
    flash: &mut F,
    geo: &Geometry,
    location: Location,
    payload: &[u8],
) -> Result<(), RingError<F::Error>> {
    let base = geo.slot_address(location);
    flash
        .program(base + SLOT_HEADER_LEN as u32, payload)
        .map_err(RingError::Io)?;
    flash
        .program(base, &payload_checksum(payload).to_le_bytes())
        .map_err(RingError::Io)?;
    Ok(())
}

/// Program the discarded sentinel over the checksum of the slot at
/// `location`. A 1-to-0-only transition, legal in every slot state.
pub(crate) fn mark_discarded<F: FlashAccess>(
    flash: &mut F,
    geo: &Geometry,
    location: Location,
) -> Result<(), RingError<F::Error>> {
    flash
        .program(
            geo.slot_address(location),
            &CHECKSUM_DISCARDED.to_le_bytes(),
        )
        .map_err(RingError::Io)?;
    Ok(())
}
