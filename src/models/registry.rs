use std::collections::BTreeMap;
use thiserror::Error;

use super::{DataModel, ResultKind, decode_json};

/// Turns a response body into a [`DataModel`].
pub type Decoder = fn(&[u8]) -> crate::Result<DataModel>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no decoder registered for {0:?}")]
    NotFound(ResultKind),
}

/// Registry mapping each result kind to its decoder
#[derive(Clone)]
pub struct DecoderRegistry {
    decoders: BTreeMap<ResultKind, Decoder>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self {
            decoders: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, kind: ResultKind, decoder: Decoder) {
        self.decoders.insert(kind, decoder);
    }

    pub fn get(&self, kind: ResultKind) -> Result<Decoder, RegistryError> {
        self.decoders
            .get(&kind)
            .copied()
            .ok_or(RegistryError::NotFound(kind))
    }

    pub fn has_decoder(&self, kind: ResultKind) -> bool {
        self.decoders.contains_key(&kind)
    }

    /// Decodes `body` with the decoder registered for `kind`.
    pub fn decode(&self, kind: ResultKind, body: &[u8]) -> crate::Result<DataModel> {
        let decoder = self
            .get(kind)
            .map_err(|e| crate::Error::InvalidArgument(e.to_string()))?;
        decoder(body)
    }

    /// Registry with decoders for every built-in kind
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ResultKind::Item, |body| decode_json(body).map(DataModel::Item));
        registry.register(ResultKind::UploadSession, |body| {
            decode_json(body).map(DataModel::UploadSession)
        });
        registry.register(ResultKind::AsyncJobStatus, |body| {
            decode_json(body).map(DataModel::AsyncJobStatus)
        });
        registry.register(ResultKind::Error, |body| decode_json(body).map(DataModel::Error));
        registry.register(ResultKind::None, |_| Ok(DataModel::None));
        registry
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
