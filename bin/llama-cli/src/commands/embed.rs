// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `llama embed` command: print the embedding vector of a prompt.

use llama_binding::{BindingConfig, Model};
use std::path::PathBuf;

pub async fn execute(
    model: Option<PathBuf>,
    prompt: String,
    dimensions: i32,
    config: BindingConfig,
) -> anyhow::Result<()> {
    let path = super::model_path(model, &config)?;
    let backend = super::backend()?;

    let mut model_options = config.model;
    model_options.embeddings = true;
    let options = config.predict.with_tokens(dimensions);

    let values = tokio::task::spawn_blocking(move || {
        let model = Model::load(&path, &model_options, backend)?;
        model.embeddings(&prompt, &options)
    })
    .await??;

    let rendered: Vec<String> = values.iter().map(|v| format!("{v:.6}")).collect();
    println!("[{}]", rendered.join(", "));
    Ok(())
}
