// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # llama-binding
//!
//! Safe access to a native llama inference engine.
//!
//! The binding loads a model by one of four routes, hands the engine a
//! pointer to the model bytes, and serializes every call into the engine
//! while relaying per-token callbacks back out of it.
//!
//! # Loading
//! ```text
//!   Model::load(path)              engine reads the file itself
//!   Model::from_memory(bytes)      owned buffer, pinned until free
//!   Model::from_mapped_region(..)  caller-owned mapping (unsafe)
//!   SelfContainedModel::load()     model appended to the executable:
//!                                  mapped in place, or copied if mapping fails
//! ```
//!
//! # Key Components
//! - [`Backend`]: the engine's primitives. [`NativeBackend`] (feature
//!   `native`) links the real engine; tests supply their own.
//! - [`Model`]: one loaded model with its lock, backing memory and
//!   teardown order.
//! - [`CallbackRegistry`]: routes per-token callbacks from the engine to
//!   the closure installed for that model.
//! - [`BindingConfig`]: [`ModelOptions`] and [`PredictOptions`] from TOML.
//!
//! # Concurrency
//! `Model` is `Send + Sync`. Calls on one model run one at a time; calls
//! on different models run in parallel. Speculative sampling holds both
//! models' locks.

mod backend;
mod callbacks;
mod config;
mod error;
mod loader;
mod model;
mod output;

#[cfg(feature = "native")]
mod ffi;
#[cfg(feature = "native")]
mod native;

pub use backend::{Backend, EngineHandle, PredictParams};
pub use callbacks::{CallbackRegistry, CallbackScope, TokenCallback};
pub use config::{
    BindingConfig, ModelOptions, PredictOptions, DEFAULT_TOKENIZE_CAPACITY, UNBOUNDED_TOKENS,
};
pub use error::BindingError;
pub use loader::SelfContainedModel;
pub use model::{BackingKind, Model, Tokenized};
pub use output::{clean_output, read_c_buffer};

#[cfg(feature = "native")]
pub use native::NativeBackend;
