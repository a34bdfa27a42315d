// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The size trailer at the end of a self-contained binary.
//!
//! ```text
//! [ ... executable bytes ... ][ model payload (N) ][ N as u64 LE (8) ]
//! ```
//!
//! Everything here is plain integer arithmetic over the file size and the
//! eight trailer bytes, so it can be tested without touching a file.

use crate::BundleError;

/// Size of the trailer in bytes.
pub const TRAILER_LEN: u64 = 8;

/// Encodes a payload size as trailer bytes.
pub fn encode_trailer(model_size: u64) -> [u8; TRAILER_LEN as usize] {
    model_size.to_le_bytes()
}

/// Decodes and validates the trailer of a file of `file_size` bytes.
///
/// `tail` must be the file's final eight bytes. The size is valid when
/// `0 < size <= file_size - 8`.
pub fn decode_trailer(tail: [u8; TRAILER_LEN as usize], file_size: u64) -> Result<u64, BundleError> {
    if file_size < TRAILER_LEN {
        return Err(BundleError::TruncatedFile { file_size });
    }

    let model_size = u64::from_le_bytes(tail);
    if model_size == 0 || model_size > file_size - TRAILER_LEN {
        return Err(BundleError::InvalidTrailer {
            model_size,
            file_size,
        });
    }
    Ok(model_size)
}

/// Where the payload sits inside a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadLocation {
    /// Byte offset of the first payload byte.
    pub offset: u64,
    /// Payload length in bytes.
    pub size: u64,
}

impl PayloadLocation {
    /// Computes the payload location from a validated trailer size.
    pub fn from_trailer(file_size: u64, model_size: u64) -> Self {
        Self {
            offset: file_size - model_size - TRAILER_LEN,
            size: model_size,
        }
    }

    /// Locates the payload inside a complete in-memory bundle image.
    pub fn from_image(image: &[u8]) -> Result<Self, BundleError> {
        let file_size = image.len() as u64;
        if file_size < TRAILER_LEN {
            return Err(BundleError::TruncatedFile { file_size });
        }
        let mut tail = [0u8; TRAILER_LEN as usize];
        tail.copy_from_slice(&image[image.len() - TRAILER_LEN as usize..]);

        let model_size = decode_trailer(tail, file_size)?;
        Ok(Self::from_trailer(file_size, model_size))
    }

    /// Returns the payload bytes from a complete in-memory bundle image.
    pub fn slice<'a>(&self, image: &'a [u8]) -> &'a [u8] {
        let start = self.offset as usize;
        &image[start..start + self.size as usize]
    }

    /// One past the last payload byte (where the trailer starts).
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

impl std::fmt::Display for PayloadLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} bytes at offset {} ({:.2} MB)",
            self.size,
            self.offset,
            self.size as f64 / (1024.0 * 1024.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(prefix_len: usize, payload: &[u8]) -> Vec<u8> {
        let mut v = vec![0xEEu8; prefix_len];
        v.extend_from_slice(payload);
        v.extend_from_slice(&encode_trailer(payload.len() as u64));
        v
    }

    #[test]
    fn test_encode_is_little_endian() {
        assert_eq!(encode_trailer(1024), [0x00, 0x04, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_decode_every_valid_size() {
        let file_size = 64u64;
        for size in 1..=file_size - TRAILER_LEN {
            assert_eq!(decode_trailer(encode_trailer(size), file_size).unwrap(), size);
        }
    }

    #[test]
    fn test_zero_size_is_invalid() {
        let result = decode_trailer(encode_trailer(0), 64);
        assert!(matches!(
            result,
            Err(BundleError::InvalidTrailer { model_size: 0, .. })
        ));
    }

    #[test]
    fn test_oversized_payload_is_invalid() {
        let result = decode_trailer(encode_trailer(57), 64);
        assert!(matches!(
            result,
            Err(BundleError::InvalidTrailer { model_size: 57, file_size: 64 })
        ));
        assert!(decode_trailer(encode_trailer(u64::MAX), 64).is_err());
    }

    #[test]
    fn test_trailer_only_file_is_invalid() {
        // Exactly 8 bytes: no room for any payload.
        let result = decode_trailer(encode_trailer(1), 8);
        assert!(matches!(result, Err(BundleError::InvalidTrailer { .. })));
    }

    #[test]
    fn test_seven_byte_file_is_truncated() {
        let result = PayloadLocation::from_image(&[1, 2, 3, 4, 5, 6, 7]);
        assert!(matches!(
            result,
            Err(BundleError::TruncatedFile { file_size: 7 })
        ));
    }

    #[test]
    fn test_locate_in_2048_byte_bundle() {
        let payload: Vec<u8> = (0..1024u32).map(|i| (i % 200) as u8).collect();
        let img = image(2048 - 1024 - 8, &payload);
        assert_eq!(img.len(), 2048);

        let loc = PayloadLocation::from_image(&img).unwrap();
        assert_eq!(loc.offset, 1016);
        assert_eq!(loc.size, 1024);
        assert_eq!(loc.end(), 2040);
        assert_eq!(loc.slice(&img), &payload[..]);
    }

    #[test]
    fn test_payload_with_empty_host() {
        let img = image(0, b"model");
        let loc = PayloadLocation::from_image(&img).unwrap();
        assert_eq!(loc.offset, 0);
        assert_eq!(loc.slice(&img), b"model");
    }

    #[test]
    fn test_display() {
        let loc = PayloadLocation::from_trailer(2048, 1024);
        assert_eq!(loc.to_string(), "1024 bytes at offset 1016 (0.00 MB)");
    }
}
