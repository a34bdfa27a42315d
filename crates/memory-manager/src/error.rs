// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for pinning and mapping model memory.

/// Errors that can occur while preparing memory for native code.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// Attempted to pin a zero-length buffer.
    #[error("cannot pin an empty buffer")]
    EmptyBuffer,

    /// Attempted to map a zero-length file range.
    #[error("cannot map a zero-length region")]
    ZeroLengthMapping,

    /// The requested range does not fit in the address space.
    #[error("mapping range overflows: offset {offset} + length {length}")]
    RangeOverflow { offset: u64, length: usize },

    /// The platform mapping primitive failed.
    #[error("failed to map {length} bytes at offset {offset}: {source}")]
    MappingFailed {
        offset: u64,
        length: usize,
        #[source]
        source: std::io::Error,
    },
}
