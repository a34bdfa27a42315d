// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # llama
//!
//! Command-line interface for llama-binding.
//!
//! ## Usage
//! ```bash
//! # Append a model to an executable
//! llama bundle --host ./target/release/llama --model ./models/7B.gguf --output ./llama-7b
//!
//! # Show where a bundled model sits
//! llama inspect --file ./llama-7b
//!
//! # Generate text (requires the `native` feature)
//! llama predict --model ./models/7B.gguf --prompt "Once upon a time" --tokens 128 --stream
//!
//! # Run the model bundled into this very binary
//! ./llama-7b run-embedded --prompt "Hello"
//! ```

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "llama",
    about = "Load, bundle and run llama models through the native binding",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file (CLI arguments take precedence).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append a model and its size trailer to a copy of an executable.
    Bundle {
        /// Executable to copy.
        #[arg(long)]
        host: PathBuf,

        /// Model file to append.
        #[arg(short, long)]
        model: PathBuf,

        /// Where to write the self-contained binary.
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show the bundled model location and mapping layout of a file.
    Inspect {
        /// Self-contained binary to inspect.
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Generate text from a prompt.
    Predict {
        /// Model file (falls back to `model_path` in the config).
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Input prompt.
        #[arg(short, long)]
        prompt: String,

        /// Output capacity; 0 means unbounded.
        #[arg(long)]
        tokens: Option<i32>,

        /// Stop prompt (repeatable).
        #[arg(long = "stop")]
        stop: Vec<String>,

        /// Print tokens as they are generated.
        #[arg(long)]
        stream: bool,

        /// Draft model for speculative sampling.
        #[arg(long)]
        draft: Option<PathBuf>,
    },

    /// Tokenize a prompt and print the token ids.
    Tokenize {
        /// Model file (falls back to `model_path` in the config).
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Text to tokenize.
        #[arg(short, long)]
        prompt: String,
    },

    /// Compute embeddings for a prompt.
    Embed {
        /// Model file (falls back to `model_path` in the config).
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Text to embed.
        #[arg(short, long)]
        prompt: String,

        /// Number of values to compute.
        #[arg(long, default_value_t = 4096)]
        dimensions: i32,
    },

    /// Generate text with the model appended to this executable.
    RunEmbedded {
        /// Input prompt.
        #[arg(short, long)]
        prompt: String,

        /// Output capacity; 0 means unbounded.
        #[arg(long)]
        tokens: Option<i32>,

        /// Read the bundle from this file instead of the running executable.
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Bundle {
            host,
            model,
            output,
        } => commands::bundle::execute(host, model, output).await,
        Commands::Inspect { file } => commands::inspect::execute(file).await,
        Commands::Predict {
            model,
            prompt,
            tokens,
            stop,
            stream,
            draft,
        } => {
            let args = commands::predict::PredictArgs {
                model,
                prompt,
                tokens,
                stop,
                stream,
                draft,
            };
            commands::predict::execute(args, config).await
        }
        Commands::Tokenize { model, prompt } => {
            commands::tokenize::execute(model, prompt, config).await
        }
        Commands::Embed {
            model,
            prompt,
            dimensions,
        } => commands::embed::execute(model, prompt, dimensions, config).await,
        Commands::RunEmbedded {
            prompt,
            tokens,
            file,
        } => commands::run_embedded::execute(prompt, tokens, file, config).await,
    }
}
