// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{BlockMap, Error};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A thread-safe in-memory block map backed by a `BTreeMap`.
///
/// Keys are allocated from a counter that survives `remove` and `clear`, so
/// a key observed once is never handed out again.
#[derive(Debug, Default, Clone)]
pub struct MemoryDB {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    blocks: BTreeMap<u64, Vec<u8>>,
    next_key: u64,
}

impl MemoryDB {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the keys currently holding a block, in ascending order.
    pub fn keys(&self) -> Vec<u64> {
        self.inner.read().blocks.keys().copied().collect()
    }
}

impl BlockMap for MemoryDB {
    fn append(&self, bytes: &[u8]) -> Result<u64, Error> {
        let mut inner = self.inner.write();
        let key = inner.next_key;
        inner.next_key += 1;
        inner.blocks.insert(key, bytes.to_vec());
        Ok(key)
    }

    fn get(&self, key: u64) -> Result<Vec<u8>, Error> {
        self.inner
            .read()
            .blocks
            .get(&key)
            .cloned()
            .ok_or(Error::BlockNotFound(key))
    }

    fn remove(&self, key: u64) -> Result<(), Error> {
        self.inner.write().blocks.remove(&key);
        Ok(())
    }

    fn last_key(&self) -> Result<Option<u64>, Error> {
        Ok(self.inner.read().next_key.checked_sub(1))
    }

    fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.inner.read().blocks.is_empty())
    }

    fn clear(&self) -> Result<(), Error> {
        self.inner.write().blocks.clear();
        Ok(())
    }

    fn save(&self) -> Result<(), Error> {
        Ok(())
    }

    fn gc(&self) -> Result<(), Error> {
        Ok(())
    }

    fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}
