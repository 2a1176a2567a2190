use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::codec::Codec;

static GLOBAL: Lazy<SharedCodecs> = Lazy::new(SharedCodecs::new);

/// The JSON and binary codec pair shared across a process.
///
/// Cloning is cheap and yields handles to the same codecs.
#[derive(Debug, Clone)]
pub struct SharedCodecs {
    json: Arc<Codec>,
    binary: Arc<Codec>,
}

impl SharedCodecs {
    /// A fresh, private pair. Mostly useful in tests.
    pub fn new() -> Self {
        Self {
            json: Arc::new(Codec::json()),
            binary: Arc::new(Codec::binary()),
        }
    }

    /// Pairs codecs obtained elsewhere, such as from an injector.
    pub fn from_parts(json: Arc<Codec>, binary: Arc<Codec>) -> Self {
        Self { json, binary }
    }

    /// The process-wide pair.
    pub fn global() -> Self {
        GLOBAL.clone()
    }

    pub fn json(&self) -> &Arc<Codec> {
        &self.json
    }

    pub fn binary(&self) -> &Arc<Codec> {
        &self.binary
    }
}

impl Default for SharedCodecs {
    fn default() -> Self {
        Self::new()
    }
}
