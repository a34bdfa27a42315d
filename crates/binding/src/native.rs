// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! [`Backend`] over the native `binding` library.
//!
//! Strings cross the boundary as owned `CString`s that live until the call
//! returns. Per-call parameter blocks are allocated by the engine and freed
//! by [`ParamBlock`]'s `Drop`. Interior NUL bytes cannot be represented;
//! such calls report failure without reaching the engine.

use crate::backend::{Backend, EngineHandle, PredictParams};
use crate::{ffi, CallbackRegistry, ModelOptions, PredictOptions};
use libc::{c_char, c_int, c_void};
use std::ffi::{CStr, CString};
use std::sync::Arc;

/// Status reported for calls rejected before reaching the engine.
const REJECTED: i32 = -1;

/// Per-token entry point called by the engine during generation.
///
/// `state` is the handle being generated for. Panics in a callback are
/// caught here and stop the generation.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn tokenCallback(state: *mut c_void, token: *const c_char) -> bool {
    if token.is_null() {
        return true;
    }
    // SAFETY: the engine passes a NUL-terminated string valid for this call.
    let bytes = unsafe { CStr::from_ptr(token) }.to_bytes();
    let id = state as usize;

    std::panic::catch_unwind(|| CallbackRegistry::global().dispatch(id, bytes)).unwrap_or_else(|_| {
        tracing::error!("token callback for handle {id:#x} panicked; stopping generation");
        false
    })
}

// ── Strings ────────────────────────────────────────────────────

fn c_string(s: &str, what: &str) -> Option<CString> {
    match CString::new(s) {
        Ok(c) => Some(c),
        Err(_) => {
            tracing::warn!("{what} contains a NUL byte; call not sent to the engine");
            None
        }
    }
}

fn c_len(len: usize) -> c_int {
    c_int::try_from(len).unwrap_or(c_int::MAX)
}

struct LoadStrings {
    main_gpu: CString,
    tensor_split: CString,
    lora_adapter: CString,
    lora_base: CString,
}

impl LoadStrings {
    fn new(options: &ModelOptions) -> Option<Self> {
        Some(Self {
            main_gpu: c_string(&options.main_gpu, "main_gpu")?,
            tensor_split: c_string(&options.tensor_split, "tensor_split")?,
            lora_adapter: c_string(&options.lora_adapter, "lora_adapter")?,
            lora_base: c_string(&options.lora_base, "lora_base")?,
        })
    }
}

// ── Parameter blocks ───────────────────────────────────────────

/// An engine-allocated parameter block, freed on drop.
struct ParamBlock {
    ptr: *mut c_void,
    // Kept alive for the block's lifetime.
    _strings: Vec<CString>,
    _stops: Vec<*const c_char>,
}

impl ParamBlock {
    fn new(prompt: &str, options: &PredictOptions, tokens: c_int) -> Option<Self> {
        let prompt = c_string(prompt, "prompt")?;
        let stop_strings = options
            .stop_prompts
            .iter()
            .map(|s| c_string(s, "stop prompt"))
            .collect::<Option<Vec<_>>>()?;
        let mut stops: Vec<*const c_char> = stop_strings.iter().map(|s| s.as_ptr()).collect();
        let stops_ptr = if stops.is_empty() {
            std::ptr::null_mut()
        } else {
            stops.as_mut_ptr()
        };

        let logit_bias = c_string(&options.logit_bias, "logit_bias")?;
        let prompt_cache = c_string(&options.path_prompt_cache, "path_prompt_cache")?;
        let main_gpu = c_string(&options.main_gpu, "main_gpu")?;
        let tensor_split = c_string(&options.tensor_split, "tensor_split")?;
        let grammar = c_string(&options.grammar, "grammar")?;
        let negative_prompt = c_string(&options.negative_prompt, "negative_prompt")?;

        // SAFETY: every pointer refers to a CString or Vec owned by the
        // returned block, so they outlive the engine's use of them.
        let ptr = unsafe {
            ffi::llama_allocate_params(
                prompt.as_ptr(),
                options.seed,
                options.threads,
                tokens,
                options.top_k,
                options.top_p,
                options.temperature,
                options.penalty,
                options.repeat,
                options.ignore_eos,
                options.f16_kv,
                options.batch,
                options.n_keep,
                stops_ptr,
                c_len(stops.len()),
                options.tail_free_sampling_z,
                options.typical_p,
                options.frequency_penalty,
                options.presence_penalty,
                options.mirostat,
                options.mirostat_eta,
                options.mirostat_tau,
                options.penalize_nl,
                logit_bias.as_ptr(),
                prompt_cache.as_ptr(),
                options.prompt_cache_all,
                options.mlock,
                options.mmap,
                main_gpu.as_ptr(),
                tensor_split.as_ptr(),
                options.prompt_cache_ro,
                grammar.as_ptr(),
                options.rope_freq_base,
                options.rope_freq_scale,
                options.negative_prompt_scale,
                negative_prompt.as_ptr(),
                options.n_draft,
            )
        };
        if ptr.is_null() {
            tracing::warn!("engine failed to allocate a parameter block");
            return None;
        }

        let mut strings = vec![
            prompt,
            logit_bias,
            prompt_cache,
            main_gpu,
            tensor_split,
            grammar,
            negative_prompt,
        ];
        strings.extend(stop_strings);
        Some(Self {
            ptr,
            _strings: strings,
            _stops: stops,
        })
    }
}

impl Drop for ParamBlock {
    fn drop(&mut self) {
        // SAFETY: `ptr` came from `llama_allocate_params` and is freed once.
        unsafe { ffi::llama_free_params(self.ptr) }
    }
}

// ── Backend ────────────────────────────────────────────────────

/// The native engine linked from the `binding` library.
#[derive(Debug, Clone)]
pub struct NativeBackend {
    callbacks: Arc<CallbackRegistry>,
}

impl NativeBackend {
    /// Creates a backend dispatching callbacks through
    /// [`CallbackRegistry::global`], the registry `tokenCallback` reads.
    pub fn new() -> Self {
        Self {
            callbacks: Arc::clone(CallbackRegistry::global()),
        }
    }

    /// Shared body of the two in-memory loaders.
    unsafe fn load_with(
        &self,
        data: *const u8,
        len: usize,
        options: &ModelOptions,
        entry: unsafe extern "C" fn(
            *const c_void,
            libc::size_t,
            c_int,
            c_int,
            bool,
            bool,
            bool,
            bool,
            bool,
            c_int,
            c_int,
            *const c_char,
            *const c_char,
            bool,
            f32,
            f32,
            bool,
            *const c_char,
            *const c_char,
            bool,
        ) -> *mut c_void,
    ) -> Option<EngineHandle> {
        let s = LoadStrings::new(options)?;
        // SAFETY: the caller upholds the buffer contract; strings live in `s`.
        let ptr = unsafe {
            entry(
                data.cast(),
                len,
                options.context_size,
                options.seed,
                options.f16_memory,
                options.mlock,
                options.embeddings,
                options.mmap,
                options.low_vram,
                options.gpu_layers,
                options.batch,
                s.main_gpu.as_ptr(),
                s.tensor_split.as_ptr(),
                options.numa,
                options.rope_freq_base,
                options.rope_freq_scale,
                options.mul_mat_q(),
                s.lora_adapter.as_ptr(),
                s.lora_base.as_ptr(),
                options.perplexity,
            )
        };
        EngineHandle::from_raw(ptr)
    }
}

impl Default for NativeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for NativeBackend {
    fn load(&self, path: &str, options: &ModelOptions) -> Option<EngineHandle> {
        let fname = c_string(path, "model path")?;
        let s = LoadStrings::new(options)?;
        // SAFETY: all strings outlive the call.
        let ptr = unsafe {
            ffi::load_model(
                fname.as_ptr(),
                options.context_size,
                options.seed,
                options.f16_memory,
                options.mlock,
                options.embeddings,
                options.mmap,
                options.low_vram,
                options.gpu_layers,
                options.batch,
                s.main_gpu.as_ptr(),
                s.tensor_split.as_ptr(),
                options.numa,
                options.rope_freq_base,
                options.rope_freq_scale,
                options.mul_mat_q(),
                s.lora_adapter.as_ptr(),
                s.lora_base.as_ptr(),
                options.perplexity,
            )
        };
        EngineHandle::from_raw(ptr)
    }

    unsafe fn load_from_memory(
        &self,
        data: *const u8,
        len: usize,
        options: &ModelOptions,
    ) -> Option<EngineHandle> {
        // SAFETY: forwarded from the trait contract.
        unsafe { self.load_with(data, len, options, ffi::load_model_from_memory) }
    }

    unsafe fn load_from_mapped_region(
        &self,
        data: *const u8,
        len: usize,
        options: &ModelOptions,
    ) -> Option<EngineHandle> {
        // SAFETY: forwarded from the trait contract.
        unsafe { self.load_with(data, len, options, ffi::load_model_from_mmap) }
    }

    fn free(&self, handle: EngineHandle) {
        // SAFETY: `Model` frees each handle exactly once.
        unsafe { ffi::llama_binding_free_model(handle.as_ptr()) }
    }

    fn save_state(&self, handle: EngineHandle, path: &str) -> i32 {
        let (Some(dst), Some(mode)) = (c_string(path, "state path"), c_string("wb", "mode")) else {
            return REJECTED;
        };
        // SAFETY: the engine only reads the two strings. It reports no status
        // for saves; the caller checks the file.
        unsafe { ffi::save_state(handle.as_ptr(), dst.as_ptr().cast_mut(), mode.as_ptr().cast_mut()) };
        0
    }

    fn load_state(&self, handle: EngineHandle, path: &str) -> i32 {
        let (Some(src), Some(mode)) = (c_string(path, "state path"), c_string("rb", "mode")) else {
            return REJECTED;
        };
        // SAFETY: the engine only reads the two strings.
        unsafe { ffi::load_state(handle.as_ptr(), src.as_ptr().cast_mut(), mode.as_ptr().cast_mut()) }
    }

    fn predict(&self, handle: EngineHandle, params: &PredictParams<'_>, out: &mut [u8]) -> i32 {
        let Some(block) = ParamBlock::new(params.prompt, params.options, c_len(out.len())) else {
            return REJECTED;
        };
        // SAFETY: `out` is writable for `out.len()` bytes.
        unsafe {
            ffi::llama_predict(
                block.ptr,
                handle.as_ptr(),
                out.as_mut_ptr().cast(),
                out.len(),
                params.debug(),
            )
        }
    }

    fn evaluate(&self, handle: EngineHandle, params: &PredictParams<'_>) -> i32 {
        let tokens = c_len(params.options.output_capacity());
        let (Some(block), Some(text)) = (
            ParamBlock::new(params.prompt, params.options, tokens),
            c_string(params.prompt, "prompt"),
        ) else {
            return REJECTED;
        };
        // SAFETY: the engine only reads `text`.
        unsafe { ffi::eval(block.ptr, handle.as_ptr(), text.as_ptr().cast_mut()) }
    }

    fn embeddings(
        &self,
        handle: EngineHandle,
        params: &PredictParams<'_>,
        out: &mut [f32],
    ) -> i32 {
        let Some(block) = ParamBlock::new(params.prompt, params.options, c_len(out.len())) else {
            return REJECTED;
        };
        // SAFETY: the engine writes at most the `tokens` count set in `block`.
        unsafe { ffi::get_embeddings(block.ptr, handle.as_ptr(), out.as_mut_ptr()) }
    }

    fn token_embeddings(
        &self,
        handle: EngineHandle,
        params: &PredictParams<'_>,
        tokens: &[i32],
        out: &mut [f32],
    ) -> i32 {
        let Some(block) = ParamBlock::new(params.prompt, params.options, c_len(out.len())) else {
            return REJECTED;
        };
        let mut tokens = tokens.to_vec();
        // SAFETY: `tokens` holds `tokens.len()` ids and `out` is writable.
        unsafe {
            ffi::get_token_embeddings(
                block.ptr,
                handle.as_ptr(),
                tokens.as_mut_ptr(),
                c_len(tokens.len()),
                out.as_mut_ptr(),
            )
        }
    }

    fn tokenize(&self, handle: EngineHandle, params: &PredictParams<'_>, out: &mut [i32]) -> i32 {
        let Some(block) = ParamBlock::new(params.prompt, params.options, c_len(out.len())) else {
            return REJECTED;
        };
        // SAFETY: the engine writes at most the `tokens` count set in `block`.
        unsafe { ffi::llama_tokenize_string(block.ptr, handle.as_ptr(), out.as_mut_ptr()) }
    }

    fn speculative_sample(
        &self,
        target: EngineHandle,
        draft: EngineHandle,
        params: &PredictParams<'_>,
        out: &mut [u8],
    ) -> i32 {
        let Some(block) = ParamBlock::new(params.prompt, params.options, c_len(out.len())) else {
            return REJECTED;
        };
        // SAFETY: `out` is writable for `out.len()` bytes.
        unsafe {
            ffi::speculative_sampling(
                block.ptr,
                target.as_ptr(),
                draft.as_ptr(),
                out.as_mut_ptr().cast(),
                out.len(),
                params.debug(),
            )
        }
    }

    fn callbacks(&self) -> &Arc<CallbackRegistry> {
        &self.callbacks
    }
}
