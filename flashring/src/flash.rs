//! Flash access contract.
//!
//! The ring performs all physical I/O through [`FlashAccess`], a capability
//! interface injected at construction. The crate never assumes exclusive
//! ownership of the medium across restarts, which is why
//! [`Ring::scan`](crate::Ring::scan) rebuilds all state from flash.

/// Contract between the ring filesystem and a flash region.
///
/// Addresses are byte offsets into a logical region of
/// `sector_size() * sector_count()` bytes, where `sector_size()` equals the
/// device's erase-unit size. Implementations typically map the region onto
/// a partition of a larger device; see the `flashring-adapters` crate for
/// an adapter over the `embedded-storage` NOR flash traits.
///
/// # Contract
///
/// - `erase` erases the whole erase unit enclosing the given address,
///   leaving every byte at `0xFF`.
/// - `program` either writes every byte or fails. NOR semantics apply:
///   programming can only move bits from 1 to 0, and re-programming
///   already-zero bits is harmless.
/// - `read` either fills the whole buffer or fails.
///
/// Calls are blocking; an operation runs to completion or reports failure
/// definitively. The ring never retries internally.
pub trait FlashAccess {
    /// The error type for flash operations.
    type Error: core::error::Error;

    /// Erase-unit size in bytes.
    fn sector_size(&self) -> u32;

    /// Number of erase units in the region.
    fn sector_count(&self) -> u32;

    /// Erase the erase unit enclosing `address`.
    fn erase(&mut self, address: u32) -> Result<(), Self::Error>;

    /// Program `data` starting at `address`, returning the bytes written.
    fn program(&mut self, address: u32, data: &[u8]) -> Result<usize, Self::Error>;

    /// Read `buf.len()` bytes starting at `address`.
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<usize, Self::Error>;
}
