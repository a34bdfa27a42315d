// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `llama predict` command: generate text from a prompt.

use llama_binding::{BindingConfig, Model};
use std::io::Write;
use std::path::PathBuf;

/// Arguments of `llama predict`.
pub struct PredictArgs {
    pub model: Option<PathBuf>,
    pub prompt: String,
    pub tokens: Option<i32>,
    pub stop: Vec<String>,
    pub stream: bool,
    pub draft: Option<PathBuf>,
}

pub async fn execute(args: PredictArgs, config: BindingConfig) -> anyhow::Result<()> {
    let path = super::model_path(args.model, &config)?;
    let backend = super::backend()?;

    let mut options = config.predict.clone();
    if let Some(tokens) = args.tokens {
        options.tokens = tokens;
    }
    if !args.stop.is_empty() {
        options.stop_prompts = args.stop;
    }
    if args.stream {
        options = options.with_token_callback(|token| {
            let mut out = std::io::stdout().lock();
            out.write_all(token).and_then(|_| out.flush()).is_ok()
        });
    }

    tracing::info!(
        "predict: model='{}', tokens={}, draft={:?}",
        path.display(),
        options.tokens,
        args.draft,
    );

    let prompt = args.prompt;
    let draft_path = args.draft;
    let model_options = config.model;
    let text = tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
        let model = Model::load(&path, &model_options, backend.clone())
            .map_err(|e| anyhow::anyhow!("failed to load '{}': {e}", path.display()))?;
        let text = match draft_path {
            Some(draft_path) => {
                let draft = Model::load(&draft_path, &model_options, backend).map_err(|e| {
                    anyhow::anyhow!("failed to load draft '{}': {e}", draft_path.display())
                })?;
                model.speculative_sample(&draft, &prompt, &options)?
            }
            None => model.predict(&prompt, &options)?,
        };
        Ok(text)
    })
    .await??;

    if args.stream {
        println!();
    } else {
        println!("{text}");
    }
    Ok(())
}
