// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Page-alignment arithmetic for mapping arbitrary file ranges.
//!
//! OS mapping primitives only accept offsets that are a multiple of the
//! platform granularity. A model appended to an executable almost never
//! starts on such a boundary, so the mapping is widened downwards:
//!
//! ```text
//!  aligned_offset        offset
//!        │◄── skew ──►│◄────────── length ──────────►│
//!        ▼            ▼                              ▼
//!  ──────┬────────────┬──────────────────────────────┬──────
//!        │◄──────────────── map_length ─────────────►│
//! ```
//!
//! The caller-visible view starts `skew` bytes into the mapping. This is
//! the only place the arithmetic lives; every platform backend uses it.

use crate::MemoryError;

/// Windows maps views on allocation-granularity boundaries, not pages.
#[cfg(windows)]
const WINDOWS_ALLOCATION_GRANULARITY: usize = 64 * 1024;

/// Fallback granularity when the OS cannot be queried.
#[cfg(not(windows))]
const DEFAULT_PAGE_SIZE: usize = 4096;

/// Returns the offset granularity required by the platform's mapping call.
#[cfg(unix)]
pub fn page_size() -> usize {
    // SAFETY: sysconf has no memory-safety preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        DEFAULT_PAGE_SIZE
    }
}

/// Returns the offset granularity required by the platform's mapping call.
#[cfg(windows)]
pub fn page_size() -> usize {
    WINDOWS_ALLOCATION_GRANULARITY
}

/// Returns the offset granularity required by the platform's mapping call.
#[cfg(not(any(unix, windows)))]
pub fn page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// A file range widened to start on a page boundary.
///
/// # Example
/// ```
/// use memory_manager::PageSpan;
///
/// let span = PageSpan::new(10_000, 500, 4096).unwrap();
/// assert_eq!(span.aligned_offset(), 8192);
/// assert_eq!(span.skew(), 1808);
/// assert_eq!(span.map_length(), 2308);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpan {
    offset: u64,
    length: usize,
    aligned_offset: u64,
    skew: usize,
}

impl PageSpan {
    /// Computes the aligned span covering `length` bytes at `offset`.
    ///
    /// # Panics
    /// Panics if `page_size` is zero.
    pub fn new(offset: u64, length: usize, page_size: usize) -> Result<Self, MemoryError> {
        assert!(page_size > 0, "page size must be non-zero");

        let page = page_size as u64;
        let aligned_offset = (offset / page) * page;
        let skew = (offset - aligned_offset) as usize;

        if length.checked_add(skew).is_none() || offset.checked_add(length as u64).is_none() {
            return Err(MemoryError::RangeOverflow { offset, length });
        }

        Ok(Self {
            offset,
            length,
            aligned_offset,
            skew,
        })
    }

    /// The caller-requested offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The caller-requested length.
    pub fn length(&self) -> usize {
        self.length
    }

    /// The page-aligned offset actually passed to the OS.
    pub fn aligned_offset(&self) -> u64 {
        self.aligned_offset
    }

    /// Distance from `aligned_offset` to the caller's first byte.
    pub fn skew(&self) -> usize {
        self.skew
    }

    /// Number of bytes to map (and later unmap): `length + skew`.
    pub fn map_length(&self) -> usize {
        self.length + self.skew
    }

    /// Narrows a mapping of this span to the caller-visible bytes.
    ///
    /// # Panics
    /// Panics if `mapped` is shorter than [`PageSpan::map_length`].
    pub fn view<'a>(&self, mapped: &'a [u8]) -> &'a [u8] {
        &mapped[self.skew..self.skew + self.length]
    }
}
