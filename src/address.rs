/// A position in the infinite append-only log.
///
/// Addresses are plain byte offsets from the start of the log; page number
/// and in-page offset are derived from a configured page size rather than
/// baked into the bit layout, since the page size is a per-store knob (see
/// [`RecoveryConfig`](crate::config::RecoveryConfig)).
pub type LogicalAddress = u64;

/// Index of a page's frame within the fixed-size ring buffer PageIo keeps
/// resident in memory.
pub type PageIndex = usize;

#[inline]
pub fn page_of(addr: LogicalAddress, page_size: u32) -> u64 {
    addr / page_size as u64
}

#[inline]
pub fn offset_in_page(addr: LogicalAddress, page_size: u32) -> u32 {
    (addr % page_size as u64) as u32
}

#[inline]
pub fn page_start(page: u64, page_size: u32) -> LogicalAddress {
    page * page_size as u64
}

#[inline]
pub fn page_end(page: u64, page_size: u32) -> LogicalAddress {
    page_start(page + 1, page_size)
}

/// Rounds `addr` up to the start of the next page if it isn't already page-aligned.
#[inline]
pub fn page_ceil(addr: LogicalAddress, page_size: u32) -> u64 {
    let page = page_of(addr, page_size);
    if offset_in_page(addr, page_size) == 0 {
        page
    } else {
        page + 1
    }
}
