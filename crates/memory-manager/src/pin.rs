// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Pinned model buffers handed to native code by raw pointer.
//!
//! [`PinnedBuffer`] takes ownership of a byte buffer and freezes its heap
//! storage: no `&mut` access is ever handed out, so the allocation can
//! neither be reallocated nor freed while the guard is alive. Native code
//! may hold [`PinnedBuffer::as_ptr`] for as long as the guard lives.
//!
//! Unlike a lexically scoped guard, the pin's lifetime is tied to the
//! native engine: the owner stores the guard next to the engine handle and
//! releases it only after the engine has freed that handle.

use crate::MemoryError;
use std::pin::Pin;

/// An owned byte buffer whose storage is fixed in place until released.
///
/// # Example
/// ```
/// use memory_manager::PinnedBuffer;
///
/// let pinned = PinnedBuffer::pin(vec![1u8, 2, 3]).unwrap();
/// let ptr = pinned.as_ptr();
/// assert_eq!(pinned.len(), 3);
///
/// // ... native code reads through `ptr` ...
///
/// let bytes = pinned.release();
/// assert_eq!(bytes.as_ptr(), ptr);
/// ```
pub struct PinnedBuffer {
    data: Pin<Box<[u8]>>,
}

impl PinnedBuffer {
    /// Pins `buffer`, taking ownership of its storage.
    ///
    /// Returns `Err(EmptyBuffer)` for a zero-length buffer: there is no
    /// valid base pointer to hand across the boundary.
    pub fn pin(buffer: impl Into<Box<[u8]>>) -> Result<Self, MemoryError> {
        let data: Box<[u8]> = buffer.into();
        if data.is_empty() {
            return Err(MemoryError::EmptyBuffer);
        }
        tracing::trace!(
            "pinned {} bytes at {:p}",
            data.len(),
            data.as_ptr(),
        );
        Ok(Self {
            data: Box::into_pin(data),
        })
    }

    /// Returns the stable base address of the pinned bytes.
    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    /// Returns the number of pinned bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always `false`: empty buffers are rejected by [`PinnedBuffer::pin`].
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns a read-only view of the pinned bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Releases the pin and hands the storage back to the caller.
    ///
    /// Consumes the guard, so the pin is released exactly once. Callers
    /// must only do this after native code has stopped reading.
    pub fn release(self) -> Box<[u8]> {
        tracing::trace!(
            "released pin on {} bytes at {:p}",
            self.data.len(),
            self.data.as_ptr(),
        );
        Pin::into_inner(self.data)
    }
}

impl std::fmt::Debug for PinnedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinnedBuffer")
            .field("ptr", &self.as_ptr())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer_rejected() {
        let result = PinnedBuffer::pin(Vec::new());
        assert!(matches!(result, Err(MemoryError::EmptyBuffer)));
    }

    #[test]
    fn test_pin_keeps_address() {
        let v = vec![7u8; 4096];
        let original = v.as_ptr();
        // Vec -> Box<[u8]> with len == capacity does not reallocate.
        let pinned = PinnedBuffer::pin(v).unwrap();
        assert_eq!(pinned.as_ptr(), original);
        assert_eq!(pinned.len(), 4096);
        assert!(!pinned.is_empty());
        assert!(pinned.as_slice().iter().all(|&b| b == 7));
    }

    #[test]
    fn test_release_returns_same_storage() {
        let pinned = PinnedBuffer::pin(vec![1u8, 2, 3, 4]).unwrap();
        let ptr = pinned.as_ptr();
        let back = pinned.release();
        assert_eq!(back.as_ptr(), ptr);
        assert_eq!(&*back, &[1, 2, 3, 4]);
    }

    #[test]
    fn test_move_does_not_relocate() {
        let pinned = PinnedBuffer::pin(vec![0xABu8; 128]).unwrap();
        let ptr = pinned.as_ptr();
        let moved = Box::new(pinned);
        assert_eq!(moved.as_ptr(), ptr);
    }

    #[test]
    fn test_debug_format() {
        let pinned = PinnedBuffer::pin(vec![0u8; 8]).unwrap();
        let debug = format!("{pinned:?}");
        assert!(debug.contains("PinnedBuffer"));
        assert!(debug.contains("len: 8"));
    }
}
