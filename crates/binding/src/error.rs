// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the engine binding.

use std::path::PathBuf;

/// Errors surfaced by model loading and inference calls.
///
/// Every failure reported by the engine (null handle, non-zero status,
/// negative count) is converted into one of these at the call site.
#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    /// The engine rejected the model (bad file, corrupt format, bad config).
    #[error("failed loading model from {source_desc} - model may not exist or is invalid")]
    LoadFailed { source_desc: String },

    /// Input rejected before crossing into the engine.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Locating the model inside a self-contained binary failed.
    #[error("self-contained model error: {0}")]
    Bundle(#[from] model_bundle::BundleError),

    /// Pinning or mapping model memory failed.
    #[error("memory error: {0}")]
    Memory(#[from] memory_manager::MemoryError),

    /// The operation needs a model loaded with embeddings enabled.
    #[error("model loaded without embeddings")]
    EmbeddingsDisabled,

    /// The engine reported a non-zero status.
    #[error("{op} failed with engine status {status}")]
    InferenceFailed { op: &'static str, status: i32 },

    /// An embeddings call reported a non-zero status. `values` holds
    /// whatever the engine wrote, zero-filled elsewhere.
    #[error("{op} failed with engine status {status}")]
    EmbeddingsFailed {
        op: &'static str,
        status: i32,
        values: Vec<f32>,
    },

    /// The tokenizer returned a negative count. The value is kept as-is.
    #[error("tokenizer returned negative count {count}")]
    NegativeTokenCount { count: i32 },

    /// The model has already been freed.
    #[error("model used after free")]
    UseAfterFree,

    /// Saving or loading engine state failed.
    #[error("{op} '{}' failed with engine status {status}", path.display())]
    StateFailed {
        op: &'static str,
        path: PathBuf,
        status: i32,
    },

    /// Host file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl BindingError {
    /// Returns the raw tokenizer count for [`BindingError::NegativeTokenCount`].
    pub fn token_count(&self) -> Option<i32> {
        match self {
            Self::NegativeTokenCount { count } => Some(*count),
            _ => None,
        }
    }

    /// Returns the partial output carried by [`BindingError::EmbeddingsFailed`].
    pub fn partial_embeddings(&self) -> Option<&[f32]> {
        match self {
            Self::EmbeddingsFailed { values, .. } => Some(values),
            _ => None,
        }
    }
}
