// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! A loaded model and the serialized calls into it.
//!
//! ```text
//!  load / from_memory / from_mapped_region
//!          │
//!          ▼
//!  Model { Mutex<Option<Loaded>> } ── predict, eval, embeddings, ──► Backend
//!          │                          tokenize, speculative_sample,
//!          │                          save_state, load_state
//!          ▼
//!  free (or Drop): engine free → clear callbacks → release pin
//! ```
//!
//! Every engine call runs with the model's lock held, so calls on one model
//! never overlap inside the engine. Distinct models run in parallel.

use crate::backend::{Backend, EngineHandle, PredictParams};
use crate::output::{clean_output, read_c_buffer};
use crate::{BindingError, ModelOptions, PredictOptions, TokenCallback};
use memory_manager::PinnedBuffer;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// ── Backing storage ────────────────────────────────────────────

enum Backing {
    /// The engine read the model from a path itself.
    None,
    /// A buffer the engine reads in place; released after the engine.
    Owned(PinnedBuffer),
    /// A region someone else keeps mapped.
    ExternallyMapped { len: usize },
}

/// Where the model bytes the engine reads from live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackingKind {
    /// Loaded from a file path by the engine.
    None,
    /// An owned buffer pinned for the model's lifetime.
    OwnedBuffer,
    /// A mapped region kept alive by the caller.
    ExternallyMapped,
}

impl Backing {
    fn kind(&self) -> BackingKind {
        match self {
            Backing::None => BackingKind::None,
            Backing::Owned(_) => BackingKind::OwnedBuffer,
            Backing::ExternallyMapped { .. } => BackingKind::ExternallyMapped,
        }
    }

    fn len(&self) -> usize {
        match self {
            Backing::None => 0,
            Backing::Owned(buf) => buf.len(),
            Backing::ExternallyMapped { len } => *len,
        }
    }
}

struct Loaded {
    handle: EngineHandle,
    // Must outlive `handle`; see `Model::teardown`.
    backing: Backing,
}

/// Result of [`Model::tokenize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokenized {
    /// Count reported by the engine.
    pub count: i32,
    /// The first `min(capacity, count)` token ids.
    pub tokens: Vec<i32>,
}

// ── Model ──────────────────────────────────────────────────────

/// A model loaded into a native engine.
///
/// `Model` is `Send + Sync`; share it across threads behind an `Arc`.
/// Calls on one model are serialized, so concurrent generation needs
/// separate models.
///
/// # Example
/// ```no_run
/// use llama_binding::{Backend, Model, ModelOptions, PredictOptions};
/// use std::sync::Arc;
///
/// # fn example(backend: Arc<dyn Backend>) -> Result<(), llama_binding::BindingError> {
/// let model = Model::load("models/7B.gguf", &ModelOptions::default(), backend)?;
/// let text = model.predict(
///     "The capital of France is",
///     &PredictOptions::default().with_tokens(64),
/// )?;
/// println!("{text}");
/// model.free()?;
/// # Ok(())
/// # }
/// ```
pub struct Model {
    backend: Arc<dyn Backend>,
    state: Mutex<Option<Loaded>>,
    freed: AtomicBool,
    identity: usize,
    embeddings: bool,
    context_size: i32,
    backing: BackingKind,
}

impl Model {
    // ── Loading ────────────────────────────────────────────────

    /// Loads a model file through the engine.
    pub fn load(
        path: impl AsRef<Path>,
        options: &ModelOptions,
        backend: Arc<dyn Backend>,
    ) -> Result<Self, BindingError> {
        let path = path.as_ref();
        let path_str = engine_path(path)?;

        tracing::info!("loading model from '{}'", path.display());
        let handle = backend
            .load(path_str, options)
            .ok_or_else(|| BindingError::LoadFailed {
                source_desc: format!("'{}'", path.display()),
            })?;

        Ok(Self::from_handle(backend, handle, Backing::None, options))
    }

    /// Loads a model from an in-memory image.
    ///
    /// The buffer is pinned and handed to the engine without copying. It is
    /// released after the engine has freed the model, or right away if the
    /// engine rejects it.
    pub fn from_memory(
        data: impl Into<Box<[u8]>>,
        options: &ModelOptions,
        backend: Arc<dyn Backend>,
    ) -> Result<Self, BindingError> {
        let pinned = PinnedBuffer::pin(data)
            .map_err(|_| BindingError::InvalidInput("model buffer is empty".into()))?;

        tracing::debug!(
            "loading model from memory: {} bytes at {:p}",
            pinned.len(),
            pinned.as_ptr()
        );

        // SAFETY: `pinned` is moved into the returned model, which frees the
        // engine state before dropping it. Moving the guard does not move
        // the heap allocation behind it.
        let handle = unsafe { backend.load_from_memory(pinned.as_ptr(), pinned.len(), options) }
            .ok_or_else(|| BindingError::LoadFailed {
                source_desc: format!("memory buffer ({} bytes)", pinned.len()),
            })?;

        Ok(Self::from_handle(backend, handle, Backing::Owned(pinned), options))
    }

    /// Loads a model from a region mapped by the caller, with mmap forced on.
    ///
    /// # Safety
    /// `data..data + len` must stay mapped, readable and unmodified until
    /// this model is freed or dropped.
    pub unsafe fn from_mapped_region(
        data: *const u8,
        len: usize,
        options: &ModelOptions,
        backend: Arc<dyn Backend>,
    ) -> Result<Self, BindingError> {
        if data.is_null() || len == 0 {
            return Err(BindingError::InvalidInput(
                "mapped region must be non-null and non-empty".into(),
            ));
        }
        let options = ModelOptions {
            mmap: true,
            ..options.clone()
        };

        tracing::debug!("loading model from mapped region: {len} bytes at {data:p}");

        // SAFETY: forwarded from this function's contract.
        let handle = unsafe { backend.load_from_mapped_region(data, len, &options) }
            .ok_or_else(|| BindingError::LoadFailed {
                source_desc: format!("mapped region ({len} bytes at {data:p})"),
            })?;

        Ok(Self::from_handle(
            backend,
            handle,
            Backing::ExternallyMapped { len },
            &options,
        ))
    }

    fn from_handle(
        backend: Arc<dyn Backend>,
        handle: EngineHandle,
        backing: Backing,
        options: &ModelOptions,
    ) -> Self {
        tracing::info!(
            "model loaded: handle {:#x}, context {}, embeddings {}, backing {:?} ({} bytes)",
            handle.identity(),
            options.context_size,
            options.embeddings,
            backing.kind(),
            backing.len(),
        );
        Self {
            identity: handle.identity(),
            embeddings: options.embeddings,
            context_size: options.context_size,
            backing: backing.kind(),
            freed: AtomicBool::new(false),
            state: Mutex::new(Some(Loaded { handle, backing })),
            backend,
        }
    }

    // ── Accessors ──────────────────────────────────────────────

    /// Whether the model was loaded with embeddings enabled.
    pub fn embeddings_enabled(&self) -> bool {
        self.embeddings
    }

    /// Context size the model was loaded with.
    pub fn context_size(&self) -> i32 {
        self.context_size
    }

    /// Where the model bytes live.
    pub fn backing(&self) -> BackingKind {
        self.backing
    }

    /// The engine handle's address, used as its callback key.
    pub fn identity(&self) -> usize {
        self.identity
    }

    /// Whether [`Model::free`] has run.
    pub fn is_freed(&self) -> bool {
        self.freed.load(Ordering::Acquire)
    }

    // ── Inference ──────────────────────────────────────────────

    /// Generates a completion for `text`.
    ///
    /// The output is cleaned up before it is returned: one leading space,
    /// an echo of the prompt and one leading newline are stripped, then
    /// trailing characters of each stop prompt are trimmed.
    pub fn predict(&self, text: &str, options: &PredictOptions) -> Result<String, BindingError> {
        check_text(text)?;
        let guard = self.lock();
        let handle = live(&guard)?;

        let registry = self.backend.callbacks();
        let _scope = registry.scoped(handle.identity(), options.token_callback.clone());

        let mut out = vec![0u8; options.output_capacity()];
        tracing::debug!(
            "predict: {} prompt bytes, capacity {}",
            text.len(),
            out.len()
        );
        let status = self
            .backend
            .predict(handle, &PredictParams::new(text, options), &mut out);
        if status != 0 {
            return Err(BindingError::InferenceFailed { op: "predict", status });
        }

        Ok(clean_output(&read_c_buffer(&out), text, &options.stop_prompts))
    }

    /// Evaluates `text` without generating.
    pub fn eval(&self, text: &str, options: &PredictOptions) -> Result<(), BindingError> {
        check_text(text)?;
        let guard = self.lock();
        let handle = live(&guard)?;

        let status = self
            .backend
            .evaluate(handle, &PredictParams::new(text, options));
        if status != 0 {
            return Err(BindingError::InferenceFailed { op: "eval", status });
        }
        Ok(())
    }

    /// Computes embeddings of `text`.
    ///
    /// The result has [`PredictOptions::output_capacity`] elements.
    pub fn embeddings(&self, text: &str, options: &PredictOptions) -> Result<Vec<f32>, BindingError> {
        if self.is_freed() {
            return Err(BindingError::UseAfterFree);
        }
        if !self.embeddings {
            return Err(BindingError::EmbeddingsDisabled);
        }
        check_text(text)?;
        let guard = self.lock();
        let handle = live(&guard)?;

        let mut out = vec![0f32; options.output_capacity()];
        let status = self
            .backend
            .embeddings(handle, &PredictParams::new(text, options), &mut out);
        if status != 0 {
            return Err(BindingError::EmbeddingsFailed {
                op: "embeddings",
                status,
                values: out,
            });
        }
        Ok(out)
    }

    /// Computes embeddings of an already tokenized input.
    pub fn token_embeddings<T>(
        &self,
        tokens: &[T],
        options: &PredictOptions,
    ) -> Result<Vec<f32>, BindingError>
    where
        T: Copy + TryInto<i32>,
    {
        if self.is_freed() {
            return Err(BindingError::UseAfterFree);
        }
        if !self.embeddings {
            return Err(BindingError::EmbeddingsDisabled);
        }
        let tokens = tokens
            .iter()
            .map(|&t| {
                t.try_into()
                    .map_err(|_| BindingError::InvalidInput("token id out of range".into()))
            })
            .collect::<Result<Vec<i32>, _>>()?;

        let guard = self.lock();
        let handle = live(&guard)?;

        let mut out = vec![0f32; options.output_capacity()];
        let status = self.backend.token_embeddings(
            handle,
            &PredictParams::new("", options),
            &tokens,
            &mut out,
        );
        if status != 0 {
            return Err(BindingError::EmbeddingsFailed {
                op: "token embeddings",
                status,
                values: out,
            });
        }
        Ok(out)
    }

    /// Tokenizes `text`.
    ///
    /// A negative engine count is returned as
    /// [`BindingError::NegativeTokenCount`] carrying the exact value.
    pub fn tokenize(&self, text: &str, options: &PredictOptions) -> Result<Tokenized, BindingError> {
        check_text(text)?;
        let guard = self.lock();
        let handle = live(&guard)?;

        let mut out = vec![0i32; options.tokenize_capacity()];
        let count = self
            .backend
            .tokenize(handle, &PredictParams::new(text, options), &mut out);
        if count < 0 {
            return Err(BindingError::NegativeTokenCount { count });
        }

        out.truncate((count as usize).min(out.len()));
        Ok(Tokenized { count, tokens: out })
    }

    /// Generates a completion for `text` with this model as the target and
    /// `draft` proposing tokens.
    ///
    /// Both models are locked for the whole call, in address order, so two
    /// threads sampling `a` with `b` and `b` with `a` cannot deadlock. A
    /// model may draft for itself.
    pub fn speculative_sample(
        &self,
        draft: &Model,
        text: &str,
        options: &PredictOptions,
    ) -> Result<String, BindingError> {
        check_text(text)?;
        if Arc::as_ptr(&self.backend).cast::<()>() != Arc::as_ptr(&draft.backend).cast::<()>() {
            return Err(BindingError::InvalidInput(
                "draft model belongs to a different engine".into(),
            ));
        }

        let (target_guard, draft_guard) = if std::ptr::eq(self, draft) {
            (self.lock(), None)
        } else if self.locks_before(draft) {
            let t = self.lock();
            let d = draft.lock();
            (t, Some(d))
        } else {
            let d = draft.lock();
            let t = self.lock();
            (t, Some(d))
        };

        let target = live(&target_guard)?;
        let draft_handle = match &draft_guard {
            Some(guard) => live(guard)?,
            None => target,
        };

        let registry = self.backend.callbacks();
        let _scope = registry.scoped(target.identity(), options.token_callback.clone());

        let mut out = vec![0u8; options.output_capacity()];
        tracing::debug!(
            "speculative sample: target {:#x}, draft {:#x}, n_draft {}",
            target.identity(),
            draft_handle.identity(),
            options.n_draft
        );
        let status = self.backend.speculative_sample(
            target,
            draft_handle,
            &PredictParams::new(text, options),
            &mut out,
        );
        if status != 0 {
            return Err(BindingError::InferenceFailed {
                op: "speculative sampling",
                status,
            });
        }

        Ok(clean_output(&read_c_buffer(&out), text, &options.stop_prompts))
    }

    // ── Session state ──────────────────────────────────────────

    /// Saves the engine's session state to `path`.
    pub fn save_state(&self, path: impl AsRef<Path>) -> Result<(), BindingError> {
        let path = path.as_ref();
        let path_str = engine_path(path)?;
        let guard = self.lock();
        let handle = live(&guard)?;

        let status = self.backend.save_state(handle, path_str);
        if status != 0 {
            return Err(BindingError::StateFailed {
                op: "save state",
                path: path.to_path_buf(),
                status,
            });
        }
        // The engine does not always report a failed write.
        std::fs::metadata(path)?;
        tracing::debug!("saved state to '{}'", path.display());
        Ok(())
    }

    /// Restores the engine's session state from `path`.
    pub fn load_state(&self, path: impl AsRef<Path>) -> Result<(), BindingError> {
        let path = path.as_ref();
        let path_str = engine_path(path)?;
        let guard = self.lock();
        let handle = live(&guard)?;

        let status = self.backend.load_state(handle, path_str);
        if status != 0 {
            return Err(BindingError::StateFailed {
                op: "load state",
                path: path.to_path_buf(),
                status,
            });
        }
        Ok(())
    }

    // ── Callbacks ──────────────────────────────────────────────

    /// Installs a callback that stays in effect across calls, or removes it
    /// with `None`.
    ///
    /// A callback passed in [`PredictOptions`] takes precedence for the
    /// duration of that call and is not displaced by this one. Does not
    /// wait for a running call, so it can stop a call in progress that
    /// has no callback of its own.
    pub fn set_token_callback(&self, callback: Option<TokenCallback>) -> Result<(), BindingError> {
        if self.is_freed() {
            return Err(BindingError::UseAfterFree);
        }
        let registry = self.backend.callbacks();
        match callback {
            Some(cb) => {
                registry.register(self.identity, cb);
                // Lost a race with `free`: undo so no stale entry survives.
                if self.is_freed() {
                    registry.unregister(self.identity);
                    return Err(BindingError::UseAfterFree);
                }
            }
            None => {
                registry.unregister(self.identity);
            }
        }
        Ok(())
    }

    // ── Teardown ───────────────────────────────────────────────

    /// Frees the engine state and releases the backing buffer.
    ///
    /// Waits for a running call to finish. Every later call, including a
    /// second `free`, fails with [`BindingError::UseAfterFree`].
    pub fn free(&self) -> Result<(), BindingError> {
        let loaded = self.lock().take().ok_or(BindingError::UseAfterFree)?;
        self.teardown(loaded);
        Ok(())
    }

    fn teardown(&self, loaded: Loaded) {
        self.freed.store(true, Ordering::Release);
        let Loaded { handle, backing } = loaded;

        self.backend.free(handle);
        self.backend.callbacks().clear(handle.identity());
        let kind = backing.kind();
        drop(backing);

        tracing::info!("model freed: handle {:#x}, backing {kind:?}", handle.identity());
    }

    /// Lock order for two-model calls. Engine identities can repeat once a
    /// handle is freed and its address reused; model addresses cannot
    /// while both borrows are alive.
    fn locks_before(&self, other: &Model) -> bool {
        (self as *const Model as usize) < (other as *const Model as usize)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Loaded>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Model {
    fn drop(&mut self) {
        let loaded = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(loaded) = loaded {
            self.teardown(loaded);
        }
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("identity", &format_args!("{:#x}", self.identity))
            .field("embeddings", &self.embeddings)
            .field("context_size", &self.context_size)
            .field("backing", &self.backing)
            .field("freed", &self.is_freed())
            .finish()
    }
}

fn live(guard: &MutexGuard<'_, Option<Loaded>>) -> Result<EngineHandle, BindingError> {
    guard
        .as_ref()
        .map(|loaded| loaded.handle)
        .ok_or(BindingError::UseAfterFree)
}

fn check_text(text: &str) -> Result<(), BindingError> {
    if text.contains('\0') {
        return Err(BindingError::InvalidInput(
            "text contains an interior NUL byte".into(),
        ));
    }
    Ok(())
}

fn engine_path(path: &Path) -> Result<&str, BindingError> {
    let s = path.to_str().ok_or_else(|| {
        BindingError::InvalidInput(format!("path '{}' is not valid UTF-8", path.display()))
    })?;
    check_text(s)?;
    Ok(s)
}
