//! Byte allocator backing the `alloc`/`free` boundary.
//!
//! Addresses are `u32` offsets into a virtual linear space made of fixed
//! segments. A segment is allocated once and never moves, so a host that
//! holds a real pointer into it stays valid until the allocation is freed.
//! Offset `0` is never handed out and doubles as the null pointer.

use std::collections::BTreeMap;

use tracing::{trace, warn};

use crate::error::MemoryError;

/// Allocation granularity and alignment.
pub const ALIGN: u32 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FreeRange {
    start: u32,
    len: u32,
}

struct Segment {
    base: u32,
    bytes: Box<[u8]>,
    /// Sorted by `start`, never adjacent (coalesced on release).
    free: Vec<FreeRange>,
}

impl Segment {
    fn end(&self) -> u32 {
        self.base + self.bytes.len() as u32
    }

    fn take_first_fit(&mut self, size: u32) -> Option<u32> {
        let idx = self.free.iter().position(|range| range.len >= size)?;
        let range = self.free[idx];
        if range.len == size {
            self.free.remove(idx);
        } else {
            self.free[idx] = FreeRange {
                start: range.start + size,
                len: range.len - size,
            };
        }
        Some(range.start)
    }

    fn release(&mut self, start: u32, len: u32) {
        let idx = self.free.partition_point(|range| range.start < start);
        self.free.insert(idx, FreeRange { start, len });
        if idx + 1 < self.free.len() {
            let next = self.free[idx + 1];
            if start + len == next.start {
                self.free[idx].len += next.len;
                self.free.remove(idx + 1);
            }
        }
        if idx > 0 {
            let prev = self.free[idx - 1];
            if prev.start + prev.len == start {
                self.free[idx - 1].len += self.free[idx].len;
                self.free.remove(idx);
            }
        }
    }

    fn free_bytes(&self) -> u32 {
        self.free.iter().map(|range| range.len).sum()
    }
}

pub struct LinearMemory {
    segments: Vec<Segment>,
    /// Live allocations: start -> rounded size.
    live: BTreeMap<u32, u32>,
    limit: u32,
    segment_size: u32,
    reserved: u32,
    next_base: u32,
}

impl LinearMemory {
    pub fn new(limit: u32, segment_size: u32) -> Self {
        Self {
            segments: Vec::new(),
            live: BTreeMap::new(),
            limit,
            segment_size: round_up(segment_size.max(ALIGN)).unwrap_or(ALIGN),
            reserved: 0,
            next_base: ALIGN,
        }
    }

    /// Returns the offset of a fresh region of at least `size` bytes.
    /// Zero-sized requests still get a distinct region.
    pub fn alloc(&mut self, size: u32) -> Result<u32, MemoryError> {
        let exhausted = MemoryError::Exhausted {
            requested: size,
            limit: self.limit,
        };
        let rounded = round_up(size.max(1)).ok_or(exhausted)?;

        let mut found = None;
        for segment in &mut self.segments {
            if let Some(start) = segment.take_first_fit(rounded) {
                found = Some(start);
                break;
            }
        }
        let ptr = match found {
            Some(ptr) => ptr,
            None => {
                let idx = self.grow(rounded).ok_or(exhausted)?;
                self.segments[idx]
                    .take_first_fit(rounded)
                    .ok_or(exhausted)?
            }
        };
        self.live.insert(ptr, rounded);
        trace!(ptr, size, rounded, "alloc");
        Ok(ptr)
    }

    /// Releases an allocation made by [`alloc`](Self::alloc). `len` is the
    /// caller's view of the size and may not exceed the allocated size.
    pub fn free(&mut self, ptr: u32, len: u32) -> Result<(), MemoryError> {
        let size = match self.live.get(&ptr) {
            Some(size) => *size,
            None => return Err(MemoryError::UnknownAllocation { ptr }),
        };
        if len > size {
            return Err(MemoryError::OutOfBounds { ptr, len });
        }
        self.live.remove(&ptr);
        let idx = self.segment_index(ptr).ok_or(MemoryError::UnknownAllocation { ptr })?;
        self.segments[idx].release(ptr, size);
        trace!(ptr, size, "free");
        Ok(())
    }

    /// Borrows `len` bytes at `ptr`; the range must sit inside one live
    /// allocation. An empty range is always valid.
    pub fn slice(&self, ptr: u32, len: u32) -> Result<&[u8], MemoryError> {
        if len == 0 {
            return Ok(&[]);
        }
        let (idx, offset) = self.locate(ptr, len)?;
        Ok(&self.segments[idx].bytes[offset..offset + len as usize])
    }

    pub fn slice_mut(&mut self, ptr: u32, len: u32) -> Result<&mut [u8], MemoryError> {
        if len == 0 {
            return Ok(&mut []);
        }
        let (idx, offset) = self.locate(ptr, len)?;
        Ok(&mut self.segments[idx].bytes[offset..offset + len as usize])
    }

    /// Real address of `ptr`, for hosts that share the process address space.
    pub fn host_address(&self, ptr: u32) -> Option<usize> {
        let idx = self.segment_index(ptr)?;
        let segment = &self.segments[idx];
        let offset = (ptr - segment.base) as usize;
        Some(segment.bytes.as_ptr() as usize + offset)
    }

    /// Inverse of [`host_address`](Self::host_address).
    pub fn from_host_address(&self, address: usize) -> Option<u32> {
        self.segments.iter().find_map(|segment| {
            let start = segment.bytes.as_ptr() as usize;
            let end = start + segment.bytes.len();
            if (start..end).contains(&address) {
                Some(segment.base + (address - start) as u32)
            } else {
                None
            }
        })
    }

    /// Bytes currently held by live allocations.
    pub fn live_bytes(&self) -> u32 {
        self.live.values().sum()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Bytes reserved from the system across all segments.
    pub fn reserved_bytes(&self) -> u32 {
        self.reserved
    }

    pub fn free_bytes(&self) -> u32 {
        self.segments.iter().map(Segment::free_bytes).sum()
    }

    fn locate(&self, ptr: u32, len: u32) -> Result<(usize, usize), MemoryError> {
        let out_of_bounds = MemoryError::OutOfBounds { ptr, len };
        let (start, size) = self
            .live
            .range(..=ptr)
            .next_back()
            .map(|(start, size)| (*start, *size))
            .ok_or(out_of_bounds)?;
        let end = ptr.checked_add(len).ok_or(out_of_bounds)?;
        if end > start + size {
            return Err(out_of_bounds);
        }
        let idx = self.segment_index(ptr).ok_or(out_of_bounds)?;
        Ok((idx, (ptr - self.segments[idx].base) as usize))
    }

    fn segment_index(&self, ptr: u32) -> Option<usize> {
        let idx = self
            .segments
            .partition_point(|segment| segment.base <= ptr)
            .checked_sub(1)?;
        if ptr < self.segments[idx].end() {
            Some(idx)
        } else {
            None
        }
    }

    fn grow(&mut self, min: u32) -> Option<usize> {
        let len = min.max(self.segment_size);
        let reserved = self.reserved.checked_add(len)?;
        if reserved > self.limit {
            warn!(requested = min, limit = self.limit, "memory limit reached");
            return None;
        }
        let base = self.next_base;
        let next_base = base.checked_add(len)?.checked_add(ALIGN)?;
        self.segments.push(Segment {
            base,
            bytes: vec![0u8; len as usize].into_boxed_slice(),
            free: vec![FreeRange { start: base, len }],
        });
        self.reserved = reserved;
        // A gap between segments keeps one-past-the-end offsets unambiguous.
        self.next_base = next_base;
        trace!(base, len, "segment reserved");
        Some(self.segments.len() - 1)
    }
}

fn round_up(size: u32) -> Option<u32> {
    size.checked_add(ALIGN - 1).map(|value| value & !(ALIGN - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> LinearMemory {
        LinearMemory::new(4096, 1024)
    }

    #[test]
    fn allocations_do_not_alias() {
        let mut mem = memory();
        let a = mem.alloc(10).unwrap();
        let b = mem.alloc(10).unwrap();
        assert_ne!(a, 0);
        assert!(a + 16 <= b || b + 16 <= a);
        mem.slice_mut(a, 10).unwrap().fill(1);
        mem.slice_mut(b, 10).unwrap().fill(2);
        assert!(mem.slice(a, 10).unwrap().iter().all(|b| *b == 1));
    }

    #[test]
    fn zero_sized_allocations_are_distinct() {
        let mut mem = memory();
        let a = mem.alloc(0).unwrap();
        let b = mem.alloc(0).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn freed_space_is_reused_and_coalesced() {
        let mut mem = LinearMemory::new(1024, 1024);
        let a = mem.alloc(512).unwrap();
        let b = mem.alloc(512).unwrap();
        assert!(mem.alloc(8).is_err());
        mem.free(a, 512).unwrap();
        mem.free(b, 512).unwrap();
        assert_eq!(mem.free_bytes(), 1024);
        let whole = mem.alloc(1024).unwrap();
        assert_eq!(whole, a);
    }

    #[test]
    fn exhaustion_reports_limit() {
        let mut mem = LinearMemory::new(64, 64);
        assert_eq!(
            mem.alloc(128),
            Err(MemoryError::Exhausted {
                requested: 128,
                limit: 64
            })
        );
    }

    #[test]
    fn large_requests_get_their_own_segment() {
        let mut mem = LinearMemory::new(8192, 1024);
        let ptr = mem.alloc(3000).unwrap();
        assert!(mem.slice(ptr, 3000).is_ok());
        assert_eq!(mem.reserved_bytes(), 3000_u32.div_ceil(8) * 8);
    }

    #[test]
    fn unknown_free_is_rejected() {
        let mut mem = memory();
        let ptr = mem.alloc(16).unwrap();
        assert_eq!(
            mem.free(ptr + 8, 8),
            Err(MemoryError::UnknownAllocation { ptr: ptr + 8 })
        );
        mem.free(ptr, 16).unwrap();
        assert!(mem.free(ptr, 16).is_err());
    }

    #[test]
    fn slices_must_stay_inside_an_allocation() {
        let mut mem = memory();
        let ptr = mem.alloc(16).unwrap();
        assert!(mem.slice(ptr + 4, 12).is_ok());
        assert!(mem.slice(ptr, 17).is_err());
        assert!(mem.slice(ptr + 1024, 1).is_err());
        assert!(mem.slice(0, 0).unwrap().is_empty());
    }

    #[test]
    fn host_addresses_round_trip() {
        let mut mem = memory();
        let ptr = mem.alloc(32).unwrap();
        let address = mem.host_address(ptr + 4).unwrap();
        assert_eq!(mem.from_host_address(address), Some(ptr + 4));
    }
}
