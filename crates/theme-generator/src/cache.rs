//! Single-slot result cache.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! A run is identified by a fingerprint over its configuration and the content
//! of every input file. When the fingerprint matches the previous successful
//! run, the stored theme is returned without compiling anything.

use std::path::PathBuf;

use sha2::{Digest, Sha256};

use crate::config::ThemeConfig;

/// Compute the fingerprint of a run.
///
/// The hash covers the JSON-serialized configuration and every
/// `(path, content)` input, in the given order.
pub fn fingerprint(config: &ThemeConfig, inputs: &[(PathBuf, String)]) -> String {
    let mut hasher = Sha256::new();

    // ThemeConfig only holds strings, paths, maps and JSON values
    let config_json = serde_json::to_string(config).unwrap_or_default();
    hasher.update(config_json.as_bytes());

    for (path, content) in inputs {
        hasher.update([0u8]);
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update((content.len() as u64).to_le_bytes());
        hasher.update(content.as_bytes());
    }

    hex::encode(hasher.finalize())
}

/// The output of the last successful run, keyed by its fingerprint.
#[derive(Debug, Clone, Default)]
pub struct ThemeCache {
    slot: Option<(String, String)>,
}

impl ThemeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored output, if it was produced for `fingerprint`.
    pub fn lookup(&self, fingerprint: &str) -> Option<&str> {
        match &self.slot {
            Some((key, output)) if key == fingerprint => Some(output),
            _ => None,
        }
    }

    /// Replace the slot with a new result.
    pub fn store(&mut self, fingerprint: String, output: String) {
        self.slot = Some((fingerprint, output));
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }
}
