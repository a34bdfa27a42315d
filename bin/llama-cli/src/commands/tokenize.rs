// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `llama tokenize` command.

use llama_binding::{BindingConfig, Model};
use std::path::PathBuf;

pub async fn execute(
    model: Option<PathBuf>,
    prompt: String,
    config: BindingConfig,
) -> anyhow::Result<()> {
    let path = super::model_path(model, &config)?;
    let backend = super::backend()?;

    let tokenized = tokio::task::spawn_blocking(move || {
        let model = Model::load(&path, &config.model, backend)?;
        model.tokenize(&prompt, &config.predict)
    })
    .await??;

    println!("  Tokens: {}", tokenized.count);
    let ids: Vec<String> = tokenized.tokens.iter().map(i32::to_string).collect();
    println!("  Ids:    [{}]", ids.join(", "));
    Ok(())
}
