// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for self-contained bundles.

/// Errors that can occur when reading or writing a bundle.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// The file is too small to hold a trailer.
    #[error("file of {file_size} bytes is too small to contain a model trailer")]
    TruncatedFile { file_size: u64 },

    /// The trailer claims an impossible payload size.
    #[error("invalid model size {model_size} in trailer (file size: {file_size})")]
    InvalidTrailer { model_size: u64, file_size: u64 },

    /// Attempted to bundle an empty model.
    #[error("cannot bundle an empty model payload")]
    EmptyPayload,

    /// Reading or writing the underlying file failed.
    #[error("bundle I/O error: {0}")]
    Io(#[from] std::io::Error),
}
