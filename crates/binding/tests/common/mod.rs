// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! An instrumented in-process engine for integration tests.
//!
//! Handles are fake addresses from a counter. Generation replays a script
//! of tokens through the callback registry, and every call is recorded so
//! tests can check what reached the engine and in what order.

#![allow(dead_code)]

use llama_binding::{Backend, CallbackRegistry, EngineHandle, ModelOptions, PredictParams};
use std::collections::HashMap;
use std::ffi::c_void;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One call seen by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Load { id: usize, source: Source },
    Free { id: usize, backing_intact: Option<bool> },
    Predict { id: usize, prompt: String },
    Eval { id: usize, prompt: String },
    Embeddings { id: usize },
    TokenEmbeddings { id: usize, tokens: Vec<i32> },
    Tokenize { id: usize },
    Speculative { target: usize, draft: usize },
    SaveState { id: usize, path: String },
    LoadState { id: usize, path: String },
}

/// How a model reached the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Path(String),
    Memory { len: usize, mmap: bool },
    Mapped { len: usize, mmap: bool },
}

struct Resident {
    ptr: usize,
    len: usize,
    checksum: u64,
}

pub struct StubBackend {
    callbacks: Arc<CallbackRegistry>,
    next_handle: AtomicUsize,
    events: Mutex<Vec<Event>>,
    script: Mutex<Vec<String>>,
    resident: Mutex<HashMap<usize, Resident>>,
    in_flight: Mutex<HashMap<usize, usize>>,
    overlap: AtomicBool,
    call_delay: Mutex<Duration>,
    fail_status: Mutex<Option<i32>>,
    tokenize_override: Mutex<Option<i32>>,
    reject_loads: AtomicBool,
    save_writes_file: AtomicBool,
    delivered: Mutex<Vec<Vec<u8>>>,
    recycle_handles: AtomicBool,
    freed_handles: Mutex<Vec<usize>>,
}

impl StubBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            callbacks: Arc::new(CallbackRegistry::new()),
            next_handle: AtomicUsize::new(0x1000),
            events: Mutex::new(Vec::new()),
            script: Mutex::new(vec!["Hello".into(), ",".into(), " world".into()]),
            resident: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            overlap: AtomicBool::new(false),
            call_delay: Mutex::new(Duration::ZERO),
            fail_status: Mutex::new(None),
            tokenize_override: Mutex::new(None),
            reject_loads: AtomicBool::new(false),
            save_writes_file: AtomicBool::new(true),
            delivered: Mutex::new(Vec::new()),
            recycle_handles: AtomicBool::new(false),
            freed_handles: Mutex::new(Vec::new()),
        })
    }

    // ── Knobs ──────────────────────────────────────────────────

    pub fn set_script(&self, tokens: &[&str]) {
        *self.script.lock().unwrap() = tokens.iter().map(|t| t.to_string()).collect();
    }

    pub fn set_call_delay(&self, delay: Duration) {
        *self.call_delay.lock().unwrap() = delay;
    }

    pub fn fail_with(&self, status: Option<i32>) {
        *self.fail_status.lock().unwrap() = status;
    }

    pub fn tokenize_returns(&self, count: Option<i32>) {
        *self.tokenize_override.lock().unwrap() = count;
    }

    pub fn reject_loads(&self, reject: bool) {
        self.reject_loads.store(reject, Ordering::SeqCst);
    }

    pub fn save_writes_file(&self, writes: bool) {
        self.save_writes_file.store(writes, Ordering::SeqCst);
    }

    /// Hands out freed addresses again, like an allocator would.
    pub fn recycle_handles(&self, recycle: bool) {
        self.recycle_handles.store(recycle, Ordering::SeqCst);
    }

    // ── Observations ───────────────────────────────────────────

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Number of recorded events other than loads and frees.
    pub fn engine_calls(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| !matches!(e, Event::Load { .. } | Event::Free { .. }))
            .count()
    }

    /// Whether two calls on one handle ever ran at the same time.
    pub fn saw_overlap(&self) -> bool {
        self.overlap.load(Ordering::SeqCst)
    }

    /// Tokens delivered to callbacks, in order, with the verdicts applied.
    pub fn delivered(&self) -> Vec<Vec<u8>> {
        self.delivered.lock().unwrap().clone()
    }

    /// Copies the bytes the engine is reading for a memory-loaded handle.
    pub fn resident_bytes(&self, id: usize) -> Option<Vec<u8>> {
        let resident = self.resident.lock().unwrap();
        resident.get(&id).map(|r| {
            // SAFETY: the model keeps this memory alive while loaded.
            unsafe { std::slice::from_raw_parts(r.ptr as *const u8, r.len) }.to_vec()
        })
    }

    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.callbacks
    }

    // ── Internals ──────────────────────────────────────────────

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    fn new_handle(&self) -> EngineHandle {
        let reused = if self.recycle_handles.load(Ordering::SeqCst) {
            self.freed_handles.lock().unwrap().pop()
        } else {
            None
        };
        let addr = reused.unwrap_or_else(|| self.next_handle.fetch_add(0x10, Ordering::SeqCst));
        EngineHandle::from_raw(addr as *mut c_void).unwrap()
    }

    fn enter(&self, handles: &[EngineHandle]) {
        let mut in_flight = self.in_flight.lock().unwrap();
        for h in handles {
            let n = in_flight.entry(h.identity()).or_insert(0);
            if *n > 0 {
                self.overlap.store(true, Ordering::SeqCst);
            }
            *n += 1;
        }
        drop(in_flight);
        let delay = *self.call_delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }

    fn leave(&self, handles: &[EngineHandle]) {
        let mut in_flight = self.in_flight.lock().unwrap();
        for h in handles {
            if let Some(n) = in_flight.get_mut(&h.identity()) {
                *n -= 1;
            }
        }
    }

    fn status(&self) -> i32 {
        self.fail_status.lock().unwrap().unwrap_or(0)
    }

    /// Replays the script through the callback for `id`, stopping when it
    /// returns false, and writes `" {prompt}\n{tokens}"` NUL-terminated.
    fn generate(&self, id: usize, prompt: &str, out: &mut [u8]) {
        let script = self.script.lock().unwrap().clone();
        let mut text = format!(" {prompt}\n");
        for token in &script {
            self.delivered.lock().unwrap().push(token.as_bytes().to_vec());
            text.push_str(token);
            if !self.callbacks.dispatch(id, token.as_bytes()) {
                break;
            }
        }
        let n = text.len().min(out.len().saturating_sub(1));
        out[..n].copy_from_slice(&text.as_bytes()[..n]);
        if n < out.len() {
            out[n] = 0;
        }
    }

    fn load_resident(&self, data: *const u8, len: usize, source: Source) -> Option<EngineHandle> {
        if self.reject_loads.load(Ordering::SeqCst) {
            return None;
        }
        let handle = self.new_handle();
        // SAFETY: the caller guarantees `data..data+len` is readable.
        let bytes = unsafe { std::slice::from_raw_parts(data, len) };
        self.resident.lock().unwrap().insert(
            handle.identity(),
            Resident {
                ptr: data as usize,
                len,
                checksum: checksum(bytes),
            },
        );
        self.record(Event::Load {
            id: handle.identity(),
            source,
        });
        Some(handle)
    }
}

fn checksum(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0xcbf2_9ce4_8422_2325u64, |h, &b| (h ^ b as u64).wrapping_mul(0x100_0000_01b3))
}

impl Backend for StubBackend {
    fn load(&self, path: &str, _options: &ModelOptions) -> Option<EngineHandle> {
        if self.reject_loads.load(Ordering::SeqCst) {
            return None;
        }
        let handle = self.new_handle();
        self.record(Event::Load {
            id: handle.identity(),
            source: Source::Path(path.to_string()),
        });
        Some(handle)
    }

    unsafe fn load_from_memory(
        &self,
        data: *const u8,
        len: usize,
        options: &ModelOptions,
    ) -> Option<EngineHandle> {
        self.load_resident(data, len, Source::Memory { len, mmap: options.mmap })
    }

    unsafe fn load_from_mapped_region(
        &self,
        data: *const u8,
        len: usize,
        options: &ModelOptions,
    ) -> Option<EngineHandle> {
        self.load_resident(data, len, Source::Mapped { len, mmap: options.mmap })
    }

    fn free(&self, handle: EngineHandle) {
        let intact = self
            .resident
            .lock()
            .unwrap()
            .remove(&handle.identity())
            .map(|r| {
                // SAFETY: the binding keeps backing memory alive until after
                // this call returns; that is what is being checked.
                let bytes = unsafe { std::slice::from_raw_parts(r.ptr as *const u8, r.len) };
                checksum(bytes) == r.checksum
            });
        self.freed_handles.lock().unwrap().push(handle.identity());
        self.record(Event::Free {
            id: handle.identity(),
            backing_intact: intact,
        });
    }

    fn save_state(&self, handle: EngineHandle, path: &str) -> i32 {
        self.record(Event::SaveState {
            id: handle.identity(),
            path: path.to_string(),
        });
        if self.save_writes_file.load(Ordering::SeqCst) {
            if std::fs::write(PathBuf::from(path), b"stub-state").is_err() {
                return 1;
            }
        }
        self.status()
    }

    fn load_state(&self, handle: EngineHandle, path: &str) -> i32 {
        self.record(Event::LoadState {
            id: handle.identity(),
            path: path.to_string(),
        });
        if std::path::Path::new(path).exists() {
            self.status()
        } else {
            1
        }
    }

    fn predict(&self, handle: EngineHandle, params: &PredictParams<'_>, out: &mut [u8]) -> i32 {
        self.enter(&[handle]);
        self.record(Event::Predict {
            id: handle.identity(),
            prompt: params.prompt.to_string(),
        });
        let status = self.status();
        if status == 0 {
            self.generate(handle.identity(), params.prompt, out);
        }
        self.leave(&[handle]);
        status
    }

    fn evaluate(&self, handle: EngineHandle, params: &PredictParams<'_>) -> i32 {
        self.enter(&[handle]);
        self.record(Event::Eval {
            id: handle.identity(),
            prompt: params.prompt.to_string(),
        });
        self.leave(&[handle]);
        self.status()
    }

    fn embeddings(&self, handle: EngineHandle, _params: &PredictParams<'_>, out: &mut [f32]) -> i32 {
        self.enter(&[handle]);
        self.record(Event::Embeddings {
            id: handle.identity(),
        });
        for (i, v) in out.iter_mut().take(4).enumerate() {
            *v = (i + 1) as f32 * 0.25;
        }
        self.leave(&[handle]);
        self.status()
    }

    fn token_embeddings(
        &self,
        handle: EngineHandle,
        _params: &PredictParams<'_>,
        tokens: &[i32],
        out: &mut [f32],
    ) -> i32 {
        self.enter(&[handle]);
        self.record(Event::TokenEmbeddings {
            id: handle.identity(),
            tokens: tokens.to_vec(),
        });
        for (v, &t) in out.iter_mut().zip(tokens) {
            *v = t as f32;
        }
        self.leave(&[handle]);
        self.status()
    }

    fn tokenize(&self, handle: EngineHandle, params: &PredictParams<'_>, out: &mut [i32]) -> i32 {
        self.enter(&[handle]);
        self.record(Event::Tokenize {
            id: handle.identity(),
        });
        let result = match *self.tokenize_override.lock().unwrap() {
            Some(count) => count,
            None => {
                // One token per word, id = word length.
                let words: Vec<i32> = params
                    .prompt
                    .split_whitespace()
                    .map(|w| w.len() as i32)
                    .collect();
                for (slot, &id) in out.iter_mut().zip(&words) {
                    *slot = id;
                }
                words.len() as i32
            }
        };
        self.leave(&[handle]);
        result
    }

    fn speculative_sample(
        &self,
        target: EngineHandle,
        draft: EngineHandle,
        params: &PredictParams<'_>,
        out: &mut [u8],
    ) -> i32 {
        let handles: &[EngineHandle] = if target == draft { &[target] } else { &[target, draft] };
        self.enter(handles);
        self.record(Event::Speculative {
            target: target.identity(),
            draft: draft.identity(),
        });
        let status = self.status();
        if status == 0 {
            self.generate(target.identity(), params.prompt, out);
        }
        self.leave(handles);
        status
    }

    fn callbacks(&self) -> &Arc<CallbackRegistry> {
        &self.callbacks
    }
}

/// A unique path under the system temp directory.
pub fn temp_path(name: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    std::env::temp_dir().join(format!(
        "llama_binding_{name}_{}_{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::SeqCst)
    ))
}

/// Casts the stub to the trait object models take.
pub fn backend(stub: &Arc<StubBackend>) -> Arc<dyn Backend> {
    Arc::clone(stub) as Arc<dyn Backend>
}
