// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Links the prebuilt native `binding` library when the `native` feature
//! is enabled. Without it the crate builds with no native dependencies.

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=LLAMA_BINDING_LIB_DIR");

    if std::env::var_os("CARGO_FEATURE_NATIVE").is_some() {
        link_native_library();
    }
}

fn link_native_library() {
    // Default: the crate directory, where the prebuilt libbinding.a is
    // usually dropped.
    let lib_dir = std::env::var("LLAMA_BINDING_LIB_DIR")
        .unwrap_or_else(|_| std::env::var("CARGO_MANIFEST_DIR").unwrap_or_default());
    if !std::path::Path::new(&lib_dir).join("libbinding.a").exists()
        && !std::path::Path::new(&lib_dir).join("binding.lib").exists()
    {
        println!("cargo:warning=libbinding not found in '{lib_dir}'; set LLAMA_BINDING_LIB_DIR");
    }

    println!("cargo:rustc-link-search=native={lib_dir}");
    println!("cargo:rustc-link-lib=static=binding");

    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    match target_os.as_str() {
        "macos" | "ios" => {
            println!("cargo:rustc-link-lib=dylib=c++");
            for framework in ["Accelerate", "Foundation", "Metal", "MetalKit"] {
                println!("cargo:rustc-link-lib=framework={framework}");
            }
        }
        "windows" => {
            println!("cargo:rustc-link-lib=dylib=stdc++");
            println!("cargo:rustc-link-lib=dylib=pthread");
        }
        _ => {
            println!("cargo:rustc-link-lib=dylib=stdc++");
            println!("cargo:rustc-link-lib=dylib=m");
        }
    }
}
