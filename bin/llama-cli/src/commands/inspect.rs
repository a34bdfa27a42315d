// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `llama inspect` command: show where a bundled model sits in a file
//! and how it would be mapped.

use memory_manager::{page_size, PageSpan};
use model_bundle::{locate_payload, TRAILER_LEN};
use std::fs::File;
use std::path::PathBuf;

pub async fn execute(file: PathBuf) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║                llama · Bundle Inspector              ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let mut f = File::open(&file)
        .map_err(|e| anyhow::anyhow!("cannot open '{}': {e}", file.display()))?;
    let file_size = f.metadata()?.len();
    let location = locate_payload(&mut f)
        .map_err(|e| anyhow::anyhow!("'{}' has no bundled model: {e}", file.display()))?;

    // ── Layout ─────────────────────────────────────────────────
    println!("  File:       {}", file.display());
    println!("  File size:  {} bytes", file_size);
    println!("  Host bytes: {}", location.offset);
    println!(
        "  Payload:    {} bytes at offset {} ({})",
        location.size,
        location.offset,
        super::mb(location.size),
    );
    println!("  Trailer:    {} bytes at offset {}", TRAILER_LEN, location.end());
    println!();

    // ── Mapping ────────────────────────────────────────────────
    let page = page_size();
    let len = usize::try_from(location.size)?;
    let span = PageSpan::new(location.offset, len, page)?;
    println!("  Mapping:");
    println!("   Page size:       {} bytes", page);
    println!("   Aligned offset:  {}", span.aligned_offset());
    println!("   Skew:            {} bytes", span.skew());
    println!("   Mapped length:   {} bytes", span.map_length());
    println!();
    Ok(())
}
