// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Producing self-contained binaries.
//!
//! [`BundleWriter`] copies a host executable, streams the model payload
//! after it and finishes with the size trailer. The payload is never held
//! in memory as a whole.

use crate::trailer::{encode_trailer, PayloadLocation, TRAILER_LEN};
use crate::BundleError;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Appends model payloads to host executables.
#[derive(Debug, Default, Clone, Copy)]
pub struct BundleWriter;

impl BundleWriter {
    /// Creates a bundle writer.
    pub fn new() -> Self {
        Self
    }

    /// Writes `host`, then `model`, then the trailer to `out`.
    ///
    /// Returns where the payload landed in the output.
    pub fn append<H: Read, M: Read, W: Write>(
        &self,
        host: &mut H,
        model: &mut M,
        out: &mut W,
    ) -> Result<PayloadLocation, BundleError> {
        let host_len = std::io::copy(host, out)?;
        let model_len = std::io::copy(model, out)?;
        if model_len == 0 {
            return Err(BundleError::EmptyPayload);
        }
        out.write_all(&encode_trailer(model_len))?;
        out.flush()?;

        let location = PayloadLocation::from_trailer(host_len + model_len + TRAILER_LEN, model_len);
        debug_assert_eq!(location.offset, host_len);
        Ok(location)
    }

    /// Bundles the files at `host_path` and `model_path` into `out_path`.
    ///
    /// The output inherits the host's permissions so a bundled executable
    /// stays executable.
    pub fn bundle_files(
        &self,
        host_path: &Path,
        model_path: &Path,
        out_path: &Path,
    ) -> Result<PayloadLocation, BundleError> {
        let host = File::open(host_path)?;
        let permissions = host.metadata()?.permissions();
        let model = File::open(model_path)?;
        let out = File::create(out_path)?;

        let mut writer = BufWriter::new(out);
        let location = self.append(
            &mut BufReader::new(host),
            &mut BufReader::new(model),
            &mut writer,
        )?;
        let out = writer.into_inner().map_err(|e| e.into_error())?;
        out.sync_all()?;
        std::fs::set_permissions(out_path, permissions)?;

        tracing::info!(
            "bundled '{}' into '{}': {location}",
            model_path.display(),
            out_path.display(),
        );
        Ok(location)
    }
}
