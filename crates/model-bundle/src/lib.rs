// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # model-bundle
//!
//! The self-contained binary format: a model payload appended to a host
//! executable, followed by an 8-byte little-endian size trailer.
//!
//! ```text
//! [ ... executable bytes ... ][ model payload (N) ][ N: u64 LE ]
//! ```
//!
//! A bundle is valid when it is at least 8 bytes long and
//! `0 < N <= file_size - 8`. The payload then starts at
//! `file_size - N - 8`.
//!
//! # Key Components
//!
//! - [`encode_trailer`] / [`decode_trailer`]: pure trailer codec.
//! - [`PayloadLocation`]: offset and size of the payload.
//! - [`locate_payload`] / [`read_payload`]: the same over any
//!   `Read + Seek`, used by the self-contained loader.
//! - [`BundleWriter`]: produces bundles from a host and a model file.
//!
//! # Example
//! ```
//! use model_bundle::{BundleWriter, PayloadLocation};
//!
//! let mut image = Vec::new();
//! BundleWriter::new()
//!     .append(&mut &b"ELF..."[..], &mut &b"GGUF..."[..], &mut image)
//!     .unwrap();
//!
//! let loc = PayloadLocation::from_image(&image).unwrap();
//! assert_eq!(loc.slice(&image), b"GGUF...");
//! ```

mod error;
mod reader;
pub mod trailer;
mod writer;

pub use error::BundleError;
pub use reader::{locate_payload, read_payload, read_trailer};
pub use trailer::{decode_trailer, encode_trailer, PayloadLocation, TRAILER_LEN};
pub use writer::BundleWriter;
