// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Read-only, copy-on-write mappings of file ranges.
//!
//! [`RegionMapper`] is the seam between loaders and the operating system.
//! [`PlatformMapper`] is the production implementation: it widens the
//! request with [`PageSpan`] and maps it through `memmap2`, which selects
//! `mmap(PROT_READ, MAP_PRIVATE)` on Unix and
//! `CreateFileMapping`/`MapViewOfFile` on Windows. Unmapping happens on
//! drop and always covers the full widened span.

use crate::{page, MemoryError, PageSpan};
use std::fs::File;

/// Maps a byte range of an open file into the address space.
///
/// Loaders take a `&dyn RegionMapper` so that the fallback path (mapping
/// refused, read the range instead) can be exercised without an OS fault.
pub trait RegionMapper: Send + Sync {
    /// Maps `length` bytes of `file` starting at `offset`.
    fn map(&self, file: &File, offset: u64, length: usize) -> Result<MappedRegion, MemoryError>;
}

/// The platform mapping backend.
#[derive(Debug, Clone, Copy)]
pub struct PlatformMapper {
    page_size: usize,
}

impl PlatformMapper {
    /// Creates a mapper using the platform's offset granularity.
    pub fn new() -> Self {
        Self {
            page_size: page::page_size(),
        }
    }

    /// Creates a mapper with an explicit granularity.
    ///
    /// The granularity must be a multiple of the real one, otherwise the
    /// OS rejects the aligned offset.
    pub fn with_page_size(page_size: usize) -> Self {
        Self { page_size }
    }

    /// Returns the granularity used for offset alignment.
    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

impl Default for PlatformMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionMapper for PlatformMapper {
    fn map(&self, file: &File, offset: u64, length: usize) -> Result<MappedRegion, MemoryError> {
        if length == 0 {
            return Err(MemoryError::ZeroLengthMapping);
        }

        let span = PageSpan::new(offset, length, self.page_size)?;
        let failed = |source| MemoryError::MappingFailed {
            offset,
            length,
            source,
        };

        // Touching pages past EOF would fault, so refuse up front.
        let file_len = file.metadata().map_err(failed)?.len();
        if offset + length as u64 > file_len {
            return Err(failed(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("range ends past end of file ({file_len} bytes)"),
            )));
        }

        // SAFETY: the mapping is private and read-only. Concurrent
        // truncation of the file by another process is outside our control,
        // as with any file-backed mapping.
        let mmap = unsafe {
            memmap2::MmapOptions::new()
                .offset(span.aligned_offset())
                .len(span.map_length())
                .map_copy_read_only(file)
        }
        .map_err(failed)?;

        tracing::debug!(
            "mapped {} bytes at offset {} (aligned {}, skew {}) to {:p}",
            length,
            offset,
            span.aligned_offset(),
            span.skew(),
            mmap.as_ptr(),
        );

        Ok(MappedRegion { mmap, span })
    }
}

/// A live mapping whose visible bytes start `skew` bytes into the view.
///
/// The base address returned by [`MappedRegion::as_ptr`] stays valid until
/// the region is dropped.
pub struct MappedRegion {
    mmap: memmap2::Mmap,
    span: PageSpan,
}

impl MappedRegion {
    /// Returns the base address of the requested range.
    pub fn as_ptr(&self) -> *const u8 {
        self.as_slice().as_ptr()
    }

    /// Returns the length of the requested range.
    pub fn len(&self) -> usize {
        self.span.length()
    }

    /// Always `false`: zero-length mappings are rejected.
    pub fn is_empty(&self) -> bool {
        self.span.length() == 0
    }

    /// Returns the requested range as a byte slice.
    pub fn as_slice(&self) -> &[u8] {
        self.span.view(&self.mmap)
    }

    /// Returns the alignment arithmetic behind this mapping.
    pub fn span(&self) -> &PageSpan {
        &self.span
    }
}

impl std::fmt::Debug for MappedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedRegion")
            .field("ptr", &self.as_ptr())
            .field("len", &self.len())
            .field("span", &self.span)
            .finish()
    }
}
