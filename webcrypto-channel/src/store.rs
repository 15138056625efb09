//! Key handle table.
//!
//! Hosts only ever see UUID handles; the keys stay here until released.

use crate::error::{ChannelError, ChannelResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use webcrypto::CryptoKey;

#[derive(Debug, Default)]
pub struct KeyStore {
    keys: RwLock<HashMap<Uuid, Arc<CryptoKey>>>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `key` and hand back its new handle.
    pub fn insert(&self, key: CryptoKey) -> Uuid {
        let handle = Uuid::new_v4();
        self.keys.write().insert(handle, Arc::new(key));
        handle
    }

    pub fn get(&self, handle: &Uuid) -> ChannelResult<Arc<CryptoKey>> {
        self.keys
            .read()
            .get(handle)
            .cloned()
            .ok_or(ChannelError::UnknownKey(*handle))
    }

    /// Drop a handle. Operations already holding the key finish normally.
    pub fn release(&self, handle: &Uuid) -> bool {
        self.keys.write().remove(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}
