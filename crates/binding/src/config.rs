// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Load-time and per-call options, loadable from TOML.
//!
//! # TOML Format
//! ```toml
//! model_path = "./models/7B/model.gguf"
//!
//! [model]
//! context_size = 2048
//! gpu_layers = 20
//! embeddings = true
//!
//! [predict]
//! tokens = 256
//! temperature = 0.7
//! stop_prompts = ["User:"]
//! ```
//!
//! Every field has a default, so any subset may be given.

use crate::{BindingError, TokenCallback};
use std::path::{Path, PathBuf};

/// Output capacity used when [`PredictOptions::tokens`] is zero.
pub const UNBOUNDED_TOKENS: usize = 99_999_999;

/// Token capacity used by `tokenize` when [`PredictOptions::tokens`] is zero.
pub const DEFAULT_TOKENIZE_CAPACITY: usize = 4096;

/// Options fixed when a model is loaded.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ModelOptions {
    /// Context window in tokens.
    pub context_size: i32,
    /// RNG seed used at load time.
    pub seed: i32,
    /// Store the KV cache in half precision.
    pub f16_memory: bool,
    /// Lock model pages in RAM.
    pub mlock: bool,
    /// Enable the embedding operations.
    pub embeddings: bool,
    /// Let the engine memory-map the model file.
    pub mmap: bool,
    /// Reduce VRAM usage at some speed cost.
    pub low_vram: bool,
    /// Number of layers offloaded to the GPU.
    pub gpu_layers: i32,
    /// Prompt batch size.
    pub batch: i32,
    /// GPU used for scratch and small tensors.
    pub main_gpu: String,
    /// Comma-separated split of tensors across GPUs.
    pub tensor_split: String,
    /// NUMA-aware allocation.
    pub numa: bool,
    /// RoPE base frequency.
    pub rope_freq_base: f32,
    /// RoPE frequency scaling factor.
    pub rope_freq_scale: f32,
    /// Quantized matmul kernels; the engine default (on) when unset.
    pub mul_mat_q: Option<bool>,
    /// Path of a LoRA adapter to apply.
    pub lora_adapter: String,
    /// Base model for the LoRA adapter.
    pub lora_base: String,
    /// Keep all logits (needed by speculative sampling).
    pub perplexity: bool,
}

impl ModelOptions {
    /// Resolves `mul_mat_q`, which is on unless explicitly disabled.
    pub fn mul_mat_q(&self) -> bool {
        self.mul_mat_q.unwrap_or(true)
    }
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            context_size: 512,
            seed: 0,
            f16_memory: false,
            mlock: false,
            embeddings: false,
            mmap: true,
            low_vram: false,
            gpu_layers: 0,
            batch: 512,
            main_gpu: String::new(),
            tensor_split: String::new(),
            numa: false,
            rope_freq_base: 10_000.0,
            rope_freq_scale: 1.0,
            mul_mat_q: None,
            lora_adapter: String::new(),
            lora_base: String::new(),
            perplexity: false,
        }
    }
}

/// Options for a single predict-family call.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PredictOptions {
    /// Sampling seed; -1 picks a random one.
    pub seed: i32,
    /// Worker threads.
    pub threads: i32,
    /// Output capacity. Zero means effectively unbounded.
    pub tokens: i32,
    pub top_k: i32,
    pub top_p: f32,
    pub temperature: f32,
    /// Repeat penalty.
    pub penalty: f32,
    /// Window the repeat penalty looks back over.
    pub repeat: i32,
    pub ignore_eos: bool,
    pub f16_kv: bool,
    pub batch: i32,
    /// Prompt tokens kept when the context overflows.
    pub n_keep: i32,
    /// Strings that end generation; trailing characters from them are trimmed.
    pub stop_prompts: Vec<String>,
    pub tail_free_sampling_z: f32,
    pub typical_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    /// Mirostat mode (0 = off, 1, 2).
    pub mirostat: i32,
    pub mirostat_eta: f32,
    pub mirostat_tau: f32,
    pub penalize_nl: bool,
    pub logit_bias: String,
    /// Session file for prompt caching.
    pub path_prompt_cache: String,
    pub prompt_cache_all: bool,
    pub prompt_cache_ro: bool,
    pub mlock: bool,
    pub mmap: bool,
    pub main_gpu: String,
    pub tensor_split: String,
    /// GBNF grammar constraining the output.
    pub grammar: String,
    pub rope_freq_base: f32,
    pub rope_freq_scale: f32,
    pub negative_prompt_scale: f32,
    pub negative_prompt: String,
    /// Tokens drafted per speculative step.
    pub n_draft: i32,
    /// Ask the engine to print diagnostics.
    pub debug_mode: bool,
    /// Called once per generated token fragment; `false` stops generation.
    #[serde(skip)]
    pub token_callback: Option<TokenCallback>,
}

impl PredictOptions {
    /// Sets the output capacity.
    pub fn with_tokens(mut self, tokens: i32) -> Self {
        self.tokens = tokens;
        self
    }

    /// Sets the stop strings.
    pub fn with_stop_prompts<I, S>(mut self, stops: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop_prompts = stops.into_iter().map(Into::into).collect();
        self
    }

    /// Installs a per-token callback for this call.
    pub fn with_token_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&[u8]) -> bool + Send + Sync + 'static,
    {
        self.token_callback = Some(TokenCallback::new(callback));
        self
    }

    /// Output buffer size in bytes (or floats, for embeddings).
    pub fn output_capacity(&self) -> usize {
        match self.tokens {
            n if n > 0 => n as usize,
            _ => UNBOUNDED_TOKENS,
        }
    }

    /// Token buffer size for `tokenize`.
    pub fn tokenize_capacity(&self) -> usize {
        match self.tokens {
            n if n > 0 => n as usize,
            _ => DEFAULT_TOKENIZE_CAPACITY,
        }
    }
}

impl Default for PredictOptions {
    fn default() -> Self {
        Self {
            seed: -1,
            threads: 4,
            tokens: 0,
            top_k: 40,
            top_p: 0.95,
            temperature: 0.8,
            penalty: 1.1,
            repeat: 64,
            ignore_eos: false,
            f16_kv: false,
            batch: 512,
            n_keep: 64,
            stop_prompts: Vec::new(),
            tail_free_sampling_z: 1.0,
            typical_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            mirostat: 0,
            mirostat_eta: 0.1,
            mirostat_tau: 5.0,
            penalize_nl: false,
            logit_bias: String::new(),
            path_prompt_cache: String::new(),
            prompt_cache_all: false,
            prompt_cache_ro: false,
            mlock: false,
            mmap: true,
            main_gpu: String::new(),
            tensor_split: String::new(),
            grammar: String::new(),
            rope_freq_base: 10_000.0,
            rope_freq_scale: 1.0,
            negative_prompt_scale: 1.0,
            negative_prompt: String::new(),
            n_draft: 16,
            debug_mode: false,
            token_callback: None,
        }
    }
}

/// A complete configuration file: model path plus both option sets.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    /// Model file to load; command-line arguments take precedence.
    pub model_path: Option<PathBuf>,
    /// Load-time options.
    pub model: ModelOptions,
    /// Defaults for predict-family calls.
    pub predict: PredictOptions,
}

impl BindingConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, BindingError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BindingError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, BindingError> {
        toml::from_str(toml_str)
            .map_err(|e| BindingError::Config(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, BindingError> {
        toml::to_string_pretty(self)
            .map_err(|e| BindingError::Config(format!("TOML serialise error: {e}")))
    }
}
