// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::id::{IdBuilder, IdCursor, Record};
use crate::reader::StreamReader;
use crate::{Error, DEFAULT_MAX_BLOCK_SIZE, DEFAULT_MIN_BLOCK_SIZE};
use db::BlockMap;
use log::warn;
use parking_lot::Mutex;
use std::io::{self, Read};

/// Chunked stream store over an ordered block map.
///
/// `put` consumes an input stream and returns a compact, self-describing id.
/// Chunks smaller than `min_block_size` are embedded in the id itself;
/// larger chunks are appended to the map as blocks of at most
/// `max_block_size` bytes. When the id under construction outgrows
/// `max_block_size / 2` it is itself stored as a block and replaced by a
/// single indirect record, recursively, so the returned id stays small for
/// any payload size.
///
/// Ids are immutable once returned and may be shared freely; concatenating
/// two ids yields an id whose payload is the concatenation of theirs.
///
/// Usage:
/// ```
/// use std::io::Read;
/// use streamstore::StreamStore;
///
/// let db = db::MemoryDB::default();
/// let store = StreamStore::new(&db);
///
/// let id = store.put(&mut &b"hello world"[..]).unwrap();
/// assert_eq!(store.length(&id).unwrap(), 11);
///
/// let mut out = Vec::new();
/// store.reader(&id).unwrap().read_to_end(&mut out).unwrap();
/// assert_eq!(out, b"hello world");
///
/// store.remove(&id).unwrap();
/// ```
pub struct StreamStore<M> {
    map: M,
    min_block_size: usize,
    max_block_size: usize,
    /// Single-slot cache for one full-size read buffer, reused across `put`
    /// calls. Accessed only through `try_lock`: losing a race falls back to
    /// a fresh allocation.
    next_buffer: Mutex<Option<Vec<u8>>>,
}

impl<M: BlockMap> StreamStore<M> {
    /// Create a store with the default block sizes (256 B inline threshold,
    /// 256 KiB block bound).
    pub fn new(map: M) -> Self {
        Self::with_block_sizes(map, DEFAULT_MIN_BLOCK_SIZE, DEFAULT_MAX_BLOCK_SIZE)
    }

    pub fn with_block_sizes(map: M, min_block_size: usize, max_block_size: usize) -> Self {
        Self {
            map,
            min_block_size,
            max_block_size,
            next_buffer: Mutex::new(None),
        }
    }

    /// Chunks strictly smaller than this are embedded in the id.
    pub fn min_block_size(&self) -> usize {
        self.min_block_size
    }

    pub fn set_min_block_size(&mut self, min_block_size: usize) {
        self.min_block_size = min_block_size;
    }

    /// Upper bound on a single block, and the read chunk size.
    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    pub fn set_max_block_size(&mut self, max_block_size: usize) {
        self.max_block_size = max_block_size;
        // A cached buffer of the old size is useless now.
        *self.next_buffer.get_mut() = None;
    }

    /// Store the contents of `input` and return the new stream id.
    ///
    /// The input is consumed to its end but not closed. On failure, every
    /// block appended for this id is removed again (best effort) before the
    /// error is returned.
    pub fn put<R: Read>(&self, input: &mut R) -> Result<Vec<u8>, Error> {
        let mut appended = Vec::new();
        match self.put_inner(input, &mut appended) {
            Ok(id) => Ok(id),
            Err(err) => {
                for key in appended {
                    if let Err(remove_err) = self.map.remove(key) {
                        warn!(
                            "failed to remove block {} while aborting a put: {}",
                            key, remove_err
                        );
                    }
                }
                Err(err)
            }
        }
    }

    fn put_inner<R: Read>(&self, input: &mut R, appended: &mut Vec<u64>) -> Result<Vec<u8>, Error> {
        let mut id = IdBuilder::new();
        let mut level = 0u32;
        loop {
            let eof = self.put_level(&mut id, input, level, appended)?;
            if eof {
                break;
            }
            if id.len() > self.max_block_size / 2 {
                id = self.collapse(id, appended)?;
                level += 1;
            }
        }
        if id.len() > 2 * self.min_block_size {
            id = self.collapse(id, appended)?;
        }
        Ok(id.into_bytes())
    }

    /// One step of the write pipeline. Level 0 emits a record for the next
    /// chunk of input; higher levels build a nested id out of level - 1
    /// steps and collapse it into an indirect record once it outgrows
    /// `max_block_size / 2`. Returns `true` at end of input.
    fn put_level<R: Read>(
        &self,
        id: &mut IdBuilder,
        input: &mut R,
        level: u32,
        appended: &mut Vec<u64>,
    ) -> Result<bool, Error> {
        if level == 0 {
            return self.put_chunk(id, input, appended);
        }
        let mut nested = IdBuilder::new();
        loop {
            let eof = self.put_level(&mut nested, input, level - 1, appended)?;
            if nested.len() > self.max_block_size / 2 {
                let nested = self.collapse(nested, appended)?;
                id.append_id(nested.as_bytes());
                return Ok(eof);
            }
            if eof {
                id.append_id(nested.as_bytes());
                return Ok(true);
            }
        }
    }

    /// Read one chunk of up to `max_block_size` bytes and emit it as an
    /// inline or block-ref record. Returns `true` at end of input.
    fn put_chunk<R: Read>(
        &self,
        id: &mut IdBuilder,
        input: &mut R,
        appended: &mut Vec<u64>,
    ) -> Result<bool, Error> {
        let mut buf = self.take_buffer();
        let len = read_fully(input, &mut buf)?;
        let chunk = if len < buf.len() {
            // Short read: the buffer is not handed off, keep it for reuse.
            let chunk = buf[..len].to_vec();
            self.offer_buffer(buf);
            chunk
        } else {
            buf
        };
        if chunk.is_empty() {
            return Ok(true);
        }
        let eof = chunk.len() < self.max_block_size;
        if chunk.len() < self.min_block_size {
            id.append_inline(&chunk);
        } else {
            let key = self.append_block(&chunk, appended)?;
            id.append_block_ref(chunk.len() as u32, key);
        }
        Ok(eof)
    }

    /// Store the id built so far as a block and replace it with a single
    /// indirect record declaring the same payload length.
    fn collapse(&self, id: IdBuilder, appended: &mut Vec<u64>) -> Result<IdBuilder, Error> {
        let total_len = crate::id::length(id.as_bytes())?;
        let key = self.append_block(id.as_bytes(), appended)?;
        let mut indirect = IdBuilder::new();
        indirect.append_indirect(total_len, key);
        Ok(indirect)
    }

    fn append_block(&self, bytes: &[u8], appended: &mut Vec<u64>) -> Result<u64, Error> {
        let key = self.map.append(bytes)?;
        appended.push(key);
        Ok(key)
    }

    fn take_buffer(&self) -> Vec<u8> {
        let cached = self
            .next_buffer
            .try_lock()
            .and_then(|mut slot| slot.take());
        match cached {
            Some(buf) if buf.len() == self.max_block_size => buf,
            _ => vec![0; self.max_block_size],
        }
    }

    fn offer_buffer(&self, buf: Vec<u8>) {
        if buf.len() != self.max_block_size {
            return;
        }
        if let Some(mut slot) = self.next_buffer.try_lock() {
            if slot.is_none() {
                *slot = Some(buf);
            }
        }
    }

    /// Open a sequential reader over the payload of `id`.
    pub fn reader(&self, id: &[u8]) -> Result<StreamReader<'_, M>, Error> {
        StreamReader::new(&self.map, id)
    }

    /// Total payload length declared by `id`. Performs no block-map reads.
    pub fn length(&self, id: &[u8]) -> Result<u64, Error> {
        crate::id::length(id)
    }

    /// Largest block key referenced by `id`, including keys inside nested
    /// ids; `-1` when the id references no block.
    pub fn max_block_key(&self, id: &[u8]) -> Result<i64, Error> {
        let mut max = -1i64;
        let mut cursor = IdCursor::new(id);
        while let Some(record) = cursor.next_record()? {
            match record {
                Record::Inline(_) => {}
                Record::BlockRef { key, .. } => max = max.max(key as i64),
                Record::Indirect { key, .. } => {
                    max = max.max(key as i64);
                    let nested = self.map.get(key)?;
                    max = max.max(self.max_block_key(&nested)?);
                }
            }
        }
        Ok(max)
    }

    /// Remove every block referenced by `id`, including the blocks holding
    /// nested ids. Removing an empty id is a no-op.
    pub fn remove(&self, id: &[u8]) -> Result<(), Error> {
        let mut cursor = IdCursor::new(id);
        while let Some(record) = cursor.next_record()? {
            match record {
                Record::Inline(_) => {}
                Record::BlockRef { key, .. } => self.map.remove(key)?,
                Record::Indirect { key, .. } => {
                    let nested = self.map.get(key)?;
                    self.remove(&nested)?;
                    self.map.remove(key)?;
                }
            }
        }
        Ok(())
    }

    /// Render `id` for diagnostics. The format is not stable.
    pub fn describe(&self, id: &[u8]) -> String {
        crate::id::describe(id)
    }

    /// Remove the single block stored under `key`.
    pub fn remove_block(&self, key: u64) -> Result<(), Error> {
        Ok(self.map.remove(key)?)
    }

    /// Largest key the map has allocated, or `None`.
    pub fn last_key(&self) -> Result<Option<u64>, Error> {
        Ok(self.map.last_key()?)
    }

    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.map.is_empty()?)
    }

    pub fn save(&self) -> Result<(), Error> {
        Ok(self.map.save()?)
    }

    pub fn gc(&self) -> Result<(), Error> {
        Ok(self.map.gc()?)
    }

    pub fn clear(&self) -> Result<(), Error> {
        Ok(self.map.clear()?)
    }

    /// Release the underlying map.
    pub fn close(&self) -> Result<(), Error> {
        Ok(self.map.close()?)
    }
}

/// Fill `buf` from `input`, reading repeatedly until it is full or the
/// stream ends. Returns the number of bytes read.
fn read_fully<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<usize, Error> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
