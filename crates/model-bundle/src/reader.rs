// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Locating and copying the payload out of a bundle on disk.

use crate::trailer::{decode_trailer, PayloadLocation, TRAILER_LEN};
use crate::BundleError;
use std::io::{Read, Seek, SeekFrom};

/// Reads and validates the trailer, returning the payload size.
pub fn read_trailer<R: Read + Seek>(reader: &mut R) -> Result<u64, BundleError> {
    let (_, model_size) = read_sizes(reader)?;
    Ok(model_size)
}

/// Locates the payload: `offset = file_size - size - 8`.
///
/// # Example
/// ```
/// use model_bundle::{encode_trailer, locate_payload};
/// use std::io::Cursor;
///
/// let mut bundle = vec![0u8; 100];
/// bundle.extend_from_slice(b"weights");
/// bundle.extend_from_slice(&encode_trailer(7));
///
/// let loc = locate_payload(&mut Cursor::new(bundle)).unwrap();
/// assert_eq!((loc.offset, loc.size), (100, 7));
/// ```
pub fn locate_payload<R: Read + Seek>(reader: &mut R) -> Result<PayloadLocation, BundleError> {
    let (file_size, model_size) = read_sizes(reader)?;
    let location = PayloadLocation::from_trailer(file_size, model_size);
    tracing::debug!("located bundled model: {location}");
    Ok(location)
}

/// Copies exactly `location.size` bytes starting at `location.offset`.
pub fn read_payload<R: Read + Seek>(
    reader: &mut R,
    location: &PayloadLocation,
) -> Result<Vec<u8>, BundleError> {
    let size = usize::try_from(location.size).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::OutOfMemory,
            format!("payload of {} bytes does not fit in memory", location.size),
        )
    })?;

    reader.seek(SeekFrom::Start(location.offset))?;
    let mut payload = vec![0u8; size];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}

fn read_sizes<R: Read + Seek>(reader: &mut R) -> Result<(u64, u64), BundleError> {
    let file_size = reader.seek(SeekFrom::End(0))?;
    if file_size < TRAILER_LEN {
        return Err(BundleError::TruncatedFile { file_size });
    }

    reader.seek(SeekFrom::End(-(TRAILER_LEN as i64)))?;
    let mut tail = [0u8; TRAILER_LEN as usize];
    reader.read_exact(&mut tail)?;

    let model_size = decode_trailer(tail, file_size)?;
    Ok((file_size, model_size))
}
