// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

pub mod bundle;
pub mod embed;
pub mod inspect;
pub mod predict;
pub mod run_embedded;
pub mod tokenize;

use llama_binding::{Backend, BindingConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` overrides the `-v` level.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Reads the `--config` file, or returns defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<BindingConfig> {
    match path {
        Some(p) => Ok(BindingConfig::from_file(p)?),
        None => Ok(BindingConfig::default()),
    }
}

/// Resolves the model path: the CLI argument wins over the config.
pub fn model_path(arg: Option<PathBuf>, config: &BindingConfig) -> anyhow::Result<PathBuf> {
    arg.or_else(|| config.model_path.clone())
        .ok_or_else(|| anyhow::anyhow!("no model given: pass --model or set model_path in the config"))
}

/// The inference engine this binary was built with.
pub fn backend() -> anyhow::Result<Arc<dyn Backend>> {
    #[cfg(feature = "native")]
    {
        Ok(Arc::new(llama_binding::NativeBackend::new()))
    }
    #[cfg(not(feature = "native"))]
    {
        anyhow::bail!("this build has no inference engine; rebuild with `--features native`")
    }
}

/// Formats a byte count as MB.
pub fn mb(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}
