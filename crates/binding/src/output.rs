// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Cleaning up raw engine output.

/// Reads a NUL-terminated engine buffer as text.
///
/// Invalid UTF-8 is replaced rather than rejected; a buffer with no NUL is
/// read to its end.
pub fn read_c_buffer(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

/// Post-processes generated text.
///
/// In order: strip one leading space, strip a leading echo of `prompt`,
/// strip one leading newline, then for each stop string trim trailing
/// characters that occur in it. The stop trim works on characters, not on
/// the whole string: with stop `"User:"` a trailing `"resU"` is removed too.
pub fn clean_output(raw: &str, prompt: &str, stop_prompts: &[String]) -> String {
    let mut text = raw.strip_prefix(' ').unwrap_or(raw);
    text = text.strip_prefix(prompt).unwrap_or(text);
    text = text.strip_prefix('\n').unwrap_or(text);
    for stop in stop_prompts {
        text = text.trim_end_matches(|c| stop.contains(c));
    }
    text.to_string()
}
