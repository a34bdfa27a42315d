// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # memory-manager
//!
//! Memory handed to a native inference engine by raw pointer.
//!
//! A model is hundreds of megabytes to tens of gigabytes. The engine
//! reads it in place, so whatever backs that pointer must stay put for as
//! long as the engine holds it. This crate provides the two ways of
//! guaranteeing that.
//!
//! # Key Components
//!
//! - [`PinnedBuffer`]: an owned heap buffer frozen in place. The owner
//!   keeps the guard alive until the engine has released the model.
//! - [`PageSpan`]: page-alignment arithmetic for mapping a range that
//!   does not start on a page boundary.
//! - [`RegionMapper`] / [`PlatformMapper`]: maps a file range read-only
//!   and copy-on-write, returning a [`MappedRegion`].
//!
//! # Ownership Model
//!
//! ```text
//!   Vec<u8> ──PinnedBuffer::pin──► PinnedBuffer ──as_ptr()──► engine
//!                                       │
//!               engine frees model ─────┘ release() / drop
//!
//!   File ──RegionMapper::map──► MappedRegion ──as_ptr()──► engine
//!                                     │
//!             owner drops region ─────┘ munmap(map_length)
//! ```
//!
//! # Example
//! ```
//! use memory_manager::PageSpan;
//!
//! let span = PageSpan::new(1016, 1024, 4096).unwrap();
//! assert_eq!(span.aligned_offset(), 0);
//! assert_eq!(span.skew(), 1016);
//! assert_eq!(span.map_length(), 2040);
//! ```

mod error;
mod mapping;
pub mod page;
mod pin;

pub use error::MemoryError;
pub use mapping::{MappedRegion, PlatformMapper, RegionMapper};
pub use page::{page_size, PageSpan};
pub use pin::PinnedBuffer;
