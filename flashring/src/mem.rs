//! RAM-backed flash simulator for host-side testing.
//!
//! [`MemFlash`] models NOR flash faithfully enough to exercise the ring's
//! power-loss recovery paths: erase fills a sector with `0xFF`, and
//! programming can only clear bits (the new byte is AND-combined with the
//! old one). It also offers failure injection and raw byte access so tests
//! can fabricate torn writes and corruption.

use crate::flash::FlashAccess;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

/// Error produced by [`MemFlash`] on injected failures or out-of-bounds
/// access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemFlashError;

impl fmt::Display for MemFlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "simulated flash failure")
    }
}

impl core::error::Error for MemFlashError {}

/// In-memory flash region with NOR programming semantics.
#[derive(Debug, Clone)]
pub struct MemFlash {
    sector_size: u32,
    data: Vec<u8>,
    fail: bool,
}

impl MemFlash {
    /// Create a fully erased region of `sector_count` sectors.
    pub fn new(sector_size: u32, sector_count: u32) -> Self {
        Self {
            sector_size,
            data: vec![0xFF; (sector_size * sector_count) as usize],
            fail: false,
        }
    }

    /// Make every subsequent operation fail until switched off again.
    pub fn inject_failures(&mut self, fail: bool) {
        self.fail = fail;
    }

    /// Raw view of the medium.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Raw mutable view of the medium, for fabricating corruption in
    /// tests. This bypasses the NOR programming rules.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn check(&self, address: u32, len: usize) -> Result<usize, MemFlashError> {
        let start = address as usize;
        if self.fail || start + len > self.data.len() {
            return Err(MemFlashError);
        }
        Ok(start)
    }
}

impl FlashAccess for MemFlash {
    type Error = MemFlashError;

    fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn sector_count(&self) -> u32 {
        self.data.len() as u32 / self.sector_size
    }

    fn erase(&mut self, address: u32) -> Result<(), Self::Error> {
        let start = self.check(address, 0)?;
        let sector_start = start - start % self.sector_size as usize;
        self.data[sector_start..sector_start + self.sector_size as usize].fill(0xFF);
        Ok(())
    }

    fn program(&mut self, address: u32, data: &[u8]) -> Result<usize, Self::Error> {
        let start = self.check(address, data.len())?;
        for (byte, &new) in self.data[start..start + data.len()].iter_mut().zip(data) {
            // NOR flash: programming only clears bits.
            *byte &= new;
        }
        Ok(data.len())
    }

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let start = self.check(address, buf.len())?;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(buf.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_erased() {
        let mut flash = MemFlash::new(256, 2);
        let mut buf = [0u8; 4];
        flash.read(0, &mut buf).unwrap();
        assert_eq!(buf, [0xFF; 4]);
    }

    #[test]
    fn test_program_only_clears_bits() {
        let mut flash = MemFlash::new(256, 2);
        flash.program(10, &[0b1010_1010]).unwrap();
        // Re-programming cannot raise bits back to 1.
        flash.program(10, &[0b1100_1100]).unwrap();

        let mut buf = [0u8; 1];
        flash.read(10, &mut buf).unwrap();
        assert_eq!(buf[0], 0b1000_1000);
    }

    #[test]
    fn test_erase_restores_whole_sector() {
        let mut flash = MemFlash::new(256, 2);
        flash.program(300, &[0x00, 0x00]).unwrap();
        // Any address inside the sector selects it.
        flash.erase(511).unwrap();

        let mut buf = [0u8; 2];
        flash.read(300, &mut buf).unwrap();
        assert_eq!(buf, [0xFF; 2]);
    }

    #[test]
    fn test_out_of_bounds_fails() {
        let mut flash = MemFlash::new(256, 2);
        let mut buf = [0u8; 4];
        assert_eq!(flash.read(510, &mut buf), Err(MemFlashError));
        assert_eq!(flash.program(512, &[0x00]), Err(MemFlashError));
    }

    #[test]
    fn test_failure_injection() {
        let mut flash = MemFlash::new(256, 2);
        flash.inject_failures(true);
        assert_eq!(flash.erase(0), Err(MemFlashError));

        flash.inject_failures(false);
        assert!(flash.erase(0).is_ok());
    }
}
