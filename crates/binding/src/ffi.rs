// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Raw declarations of the native `binding` library's C API.
//!
//! Linked by `build.rs` when the `native` feature is on.

use libc::{c_char, c_float, c_int, c_void, size_t};

extern "C" {
    // ── Model lifecycle ────────────────────────────────────────

    pub fn load_model(
        fname: *const c_char,
        n_ctx: c_int,
        n_seed: c_int,
        memory_f16: bool,
        mlock: bool,
        embeddings: bool,
        mmap: bool,
        low_vram: bool,
        n_gpu: c_int,
        n_batch: c_int,
        maingpu: *const c_char,
        tensorsplit: *const c_char,
        numa: bool,
        rope_freq_base: c_float,
        rope_freq_scale: c_float,
        mul_mat_q: bool,
        lora: *const c_char,
        lora_base: *const c_char,
        perplexity: bool,
    ) -> *mut c_void;

    pub fn load_model_from_memory(
        data: *const c_void,
        size: size_t,
        n_ctx: c_int,
        n_seed: c_int,
        memory_f16: bool,
        mlock: bool,
        embeddings: bool,
        mmap: bool,
        low_vram: bool,
        n_gpu: c_int,
        n_batch: c_int,
        maingpu: *const c_char,
        tensorsplit: *const c_char,
        numa: bool,
        rope_freq_base: c_float,
        rope_freq_scale: c_float,
        mul_mat_q: bool,
        lora: *const c_char,
        lora_base: *const c_char,
        perplexity: bool,
    ) -> *mut c_void;

    pub fn load_model_from_mmap(
        data: *const c_void,
        size: size_t,
        n_ctx: c_int,
        n_seed: c_int,
        memory_f16: bool,
        mlock: bool,
        embeddings: bool,
        mmap: bool,
        low_vram: bool,
        n_gpu: c_int,
        n_batch: c_int,
        maingpu: *const c_char,
        tensorsplit: *const c_char,
        numa: bool,
        rope_freq_base: c_float,
        rope_freq_scale: c_float,
        mul_mat_q: bool,
        lora: *const c_char,
        lora_base: *const c_char,
        perplexity: bool,
    ) -> *mut c_void;

    pub fn llama_binding_free_model(state: *mut c_void);

    // ── Session state ──────────────────────────────────────────

    pub fn load_state(ctx: *mut c_void, statefile: *mut c_char, modes: *mut c_char) -> c_int;

    pub fn save_state(ctx: *mut c_void, dst: *mut c_char, modes: *mut c_char);

    // ── Parameter blocks ───────────────────────────────────────

    pub fn llama_allocate_params(
        prompt: *const c_char,
        seed: c_int,
        threads: c_int,
        tokens: c_int,
        top_k: c_int,
        top_p: c_float,
        temp: c_float,
        repeat_penalty: c_float,
        repeat_last_n: c_int,
        ignore_eos: bool,
        memory_f16: bool,
        n_batch: c_int,
        n_keep: c_int,
        antiprompt: *mut *const c_char,
        antiprompt_count: c_int,
        tfs_z: c_float,
        typical_p: c_float,
        frequency_penalty: c_float,
        presence_penalty: c_float,
        mirostat: c_int,
        mirostat_eta: c_float,
        mirostat_tau: c_float,
        penalize_nl: bool,
        logit_bias: *const c_char,
        session_file: *const c_char,
        prompt_cache_all: bool,
        mlock: bool,
        mmap: bool,
        maingpu: *const c_char,
        tensorsplit: *const c_char,
        prompt_cache_ro: bool,
        grammar: *const c_char,
        rope_freq_base: c_float,
        rope_freq_scale: c_float,
        negative_prompt_scale: c_float,
        negative_prompt: *const c_char,
        n_draft: c_int,
    ) -> *mut c_void;

    pub fn llama_free_params(params_ptr: *mut c_void);

    // ── Inference ──────────────────────────────────────────────

    pub fn llama_predict(
        params_ptr: *mut c_void,
        state_pr: *mut c_void,
        result: *mut c_char,
        result_len: size_t,
        debug: bool,
    ) -> c_int;

    pub fn eval(params_ptr: *mut c_void, ctx: *mut c_void, text: *mut c_char) -> c_int;

    pub fn get_embeddings(
        params_ptr: *mut c_void,
        state_pr: *mut c_void,
        res_embeddings: *mut c_float,
    ) -> c_int;

    pub fn get_token_embeddings(
        params_ptr: *mut c_void,
        state_pr: *mut c_void,
        tokens: *mut c_int,
        token_size: c_int,
        res_embeddings: *mut c_float,
    ) -> c_int;

    pub fn llama_tokenize_string(
        params_ptr: *mut c_void,
        state_pr: *mut c_void,
        result: *mut c_int,
    ) -> c_int;

    pub fn speculative_sampling(
        params_ptr: *mut c_void,
        target_model: *mut c_void,
        draft_model: *mut c_void,
        result: *mut c_char,
        result_len: size_t,
        debug: bool,
    ) -> c_int;
}
