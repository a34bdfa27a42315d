// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `llama bundle` command: append a model to a copy of an executable.

use model_bundle::BundleWriter;
use std::path::PathBuf;

pub async fn execute(host: PathBuf, model: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║                llama · Model Bundler                 ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();
    println!("  Host:   {}", host.display());
    println!("  Model:  {}", model.display());
    println!("  Output: {}", output.display());
    println!();

    let location = tokio::task::spawn_blocking(move || {
        BundleWriter::new().bundle_files(&host, &model, &output)
    })
    .await?
    .map_err(|e| anyhow::anyhow!("bundling failed: {e}"))?;

    println!("  Payload: {} bytes at offset {}", location.size, location.offset);
    println!("  Size:    {}", super::mb(location.size));
    Ok(())
}
