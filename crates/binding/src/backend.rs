// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The engine boundary.
//!
//! [`Backend`] is the complete set of primitives the binding needs from a
//! native inference engine. Every method mirrors one C entry point: handles
//! come back nullable, statuses come back as raw integers, and output goes
//! into caller-allocated buffers. Interpreting those results (null ⇒
//! `LoadFailed`, non-zero ⇒ `InferenceFailed` or `EmbeddingsFailed`, negative
//! count ⇒ `NegativeTokenCount`) is the job of [`crate::Model`], not of the
//! backend.
//!
//! Callers never invoke two methods on the same handle concurrently;
//! [`crate::Model`] serializes them.

use crate::{CallbackRegistry, ModelOptions, PredictOptions};
use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::Arc;

// ── Handles ────────────────────────────────────────────────────

/// Opaque, non-null engine state for one loaded model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineHandle(NonNull<c_void>);

// SAFETY: the handle is an opaque token. The engine state behind it is only
// touched through `Backend` calls, which `Model` serializes per handle.
unsafe impl Send for EngineHandle {}
unsafe impl Sync for EngineHandle {}

impl EngineHandle {
    /// Wraps a raw engine pointer, returning `None` for null.
    pub fn from_raw(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    /// The raw engine pointer.
    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }

    /// The handle's address as an integer, used as the callback key.
    pub fn identity(self) -> usize {
        self.0.as_ptr() as usize
    }
}

// ── Per-call parameters ────────────────────────────────────────

/// Input to one predict-family engine call.
///
/// The native backend turns this into the engine's parameter block for the
/// duration of a single call.
#[derive(Debug, Clone, Copy)]
pub struct PredictParams<'a> {
    /// Prompt text. Empty for `token_embeddings`.
    pub prompt: &'a str,
    /// Sampling and runtime options.
    pub options: &'a PredictOptions,
}

impl<'a> PredictParams<'a> {
    pub fn new(prompt: &'a str, options: &'a PredictOptions) -> Self {
        Self { prompt, options }
    }

    /// Whether the engine should print its own diagnostics.
    pub fn debug(&self) -> bool {
        self.options.debug_mode
    }
}

// ── Backend ────────────────────────────────────────────────────

/// Primitives exposed by a native inference engine.
pub trait Backend: Send + Sync {
    /// Loads a model from a file path.
    fn load(&self, path: &str, options: &ModelOptions) -> Option<EngineHandle>;

    /// Loads a model from `len` bytes at `data`.
    ///
    /// # Safety
    /// `data..data + len` must stay readable and unmoved until the returned
    /// handle is passed to [`Backend::free`].
    unsafe fn load_from_memory(
        &self,
        data: *const u8,
        len: usize,
        options: &ModelOptions,
    ) -> Option<EngineHandle>;

    /// Loads a model from a region mapped by the caller. `options.mmap` is
    /// already forced on.
    ///
    /// # Safety
    /// Same contract as [`Backend::load_from_memory`].
    unsafe fn load_from_mapped_region(
        &self,
        data: *const u8,
        len: usize,
        options: &ModelOptions,
    ) -> Option<EngineHandle>;

    /// Releases engine state. Called exactly once per handle.
    fn free(&self, handle: EngineHandle);

    /// Writes the engine's session state to `path`. Returns 0 on success.
    fn save_state(&self, handle: EngineHandle, path: &str) -> i32;

    /// Restores session state from `path`. Returns 0 on success.
    fn load_state(&self, handle: EngineHandle, path: &str) -> i32;

    /// Generates text into `out` as a NUL-terminated byte string.
    fn predict(&self, handle: EngineHandle, params: &PredictParams<'_>, out: &mut [u8]) -> i32;

    /// Evaluates the prompt without sampling.
    fn evaluate(&self, handle: EngineHandle, params: &PredictParams<'_>) -> i32;

    /// Computes prompt embeddings into `out`.
    fn embeddings(&self, handle: EngineHandle, params: &PredictParams<'_>, out: &mut [f32])
        -> i32;

    /// Computes embeddings of an already tokenized input into `out`.
    fn token_embeddings(
        &self,
        handle: EngineHandle,
        params: &PredictParams<'_>,
        tokens: &[i32],
        out: &mut [f32],
    ) -> i32;

    /// Tokenizes the prompt into `out`, returning the token count or a
    /// negative error value.
    fn tokenize(&self, handle: EngineHandle, params: &PredictParams<'_>, out: &mut [i32]) -> i32;

    /// Generates text with `target`, drafting with `draft`.
    fn speculative_sample(
        &self,
        target: EngineHandle,
        draft: EngineHandle,
        params: &PredictParams<'_>,
        out: &mut [u8],
    ) -> i32;

    /// Registry the engine dispatches per-token callbacks through.
    fn callbacks(&self) -> &Arc<CallbackRegistry>;
}
