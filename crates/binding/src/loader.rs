// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Loading a model appended to an executable.
//!
//! The payload is located through the trailer, then mapped in place. If the
//! mapping is refused the payload is read into an owned buffer instead.
//! Trailer errors are final: there is nothing to fall back to.

use crate::{Backend, BindingError, Model, ModelOptions};
use memory_manager::{MappedRegion, PlatformMapper, RegionMapper};
use model_bundle::{locate_payload, read_payload, PayloadLocation};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// A model loaded from a self-contained binary.
///
/// Owns the mapping the engine reads from, if any, and keeps it alive until
/// after the model is dropped. Dereferences to [`Model`].
pub struct SelfContainedModel {
    // Declared before `region`: fields drop in order.
    model: Model,
    region: Option<MappedRegion>,
    location: PayloadLocation,
}

impl SelfContainedModel {
    /// Loads the model appended to the running executable.
    pub fn load(options: &ModelOptions, backend: Arc<dyn Backend>) -> Result<Self, BindingError> {
        let exe = std::env::current_exe()?;
        Self::load_from_path(exe, options, backend, &PlatformMapper::new())
    }

    /// Loads the model appended to the file at `path`, mapping it with
    /// `mapper`.
    pub fn load_from_path(
        path: impl AsRef<Path>,
        options: &ModelOptions,
        backend: Arc<dyn Backend>,
        mapper: &dyn RegionMapper,
    ) -> Result<Self, BindingError> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let location = locate_payload(&mut file)?;
        tracing::info!("self-contained model in '{}': {location}", path.display());

        let len = usize::try_from(location.size).map_err(|_| {
            BindingError::InvalidInput(format!(
                "bundled model of {} bytes exceeds the address space",
                location.size
            ))
        })?;

        match mapper.map(&file, location.offset, len) {
            Ok(region) => {
                // SAFETY: `region` is stored next to the model and outlives
                // it, and a private read-only mapping is never written.
                let model = unsafe {
                    Model::from_mapped_region(region.as_ptr(), region.len(), options, backend)?
                };
                Ok(Self {
                    model,
                    region: Some(region),
                    location,
                })
            }
            Err(e) => {
                tracing::warn!("mapping bundled model failed ({e}), reading it into memory");
                let payload = read_payload(&mut file, &location)?;
                let model = Model::from_memory(payload, options, backend)?;
                Ok(Self {
                    model,
                    region: None,
                    location,
                })
            }
        }
    }

    /// Where the payload sits in the bundle.
    pub fn location(&self) -> PayloadLocation {
        self.location
    }

    /// Whether the engine reads the payload through a mapping.
    pub fn is_mapped(&self) -> bool {
        self.region.is_some()
    }

    /// The underlying model.
    pub fn model(&self) -> &Model {
        &self.model
    }
}

impl std::ops::Deref for SelfContainedModel {
    type Target = Model;

    fn deref(&self) -> &Model {
        &self.model
    }
}

impl std::fmt::Debug for SelfContainedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelfContainedModel")
            .field("model", &self.model)
            .field("location", &self.location)
            .field("mapped", &self.is_mapped())
            .finish()
    }
}
