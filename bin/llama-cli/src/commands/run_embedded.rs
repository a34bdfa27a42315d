// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `llama run-embedded` command: generate text with the model appended
//! to this executable (or to `--file`).

use llama_binding::{BindingConfig, SelfContainedModel};
use memory_manager::PlatformMapper;
use std::path::PathBuf;

pub async fn execute(
    prompt: String,
    tokens: Option<i32>,
    file: Option<PathBuf>,
    config: BindingConfig,
) -> anyhow::Result<()> {
    let backend = super::backend()?;

    let mut options = config.predict;
    if let Some(tokens) = tokens {
        options.tokens = tokens;
    }
    let model_options = config.model;

    let text = tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
        let model = match file {
            Some(path) => SelfContainedModel::load_from_path(
                &path,
                &model_options,
                backend,
                &PlatformMapper::new(),
            )?,
            None => SelfContainedModel::load(&model_options, backend)?,
        };
        tracing::info!(
            "bundled model: {} (mapped: {})",
            model.location(),
            model.is_mapped()
        );
        Ok(model.predict(&prompt, &options)?)
    })
    .await??;

    println!("{text}");
    Ok(())
}
