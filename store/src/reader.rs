// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::id::{TAG_BLOCK_REF, TAG_INDIRECT, TAG_INLINE};
use crate::varint::{read_varint, read_varlong};
use crate::Error;
use db::BlockMap;
use std::io::{self, Cursor, Read};

/// Sequential reader over the payload of a stream id.
///
/// Records are resolved lazily: blocks are fetched from the map one at a
/// time as reading progresses, and records that a pending [`skip`] covers
/// entirely are dropped without fetching anything. The full payload is
/// never materialized. End of payload is the usual [`Read`] convention,
/// `Ok(0)`.
///
/// Obtained from [`crate::StreamStore::reader`].
///
/// [`skip`]: StreamReader::skip
pub struct StreamReader<'a, M> {
    map: &'a M,
    /// Id bytes still to walk. Expanding an indirect record splices the
    /// nested id in front of the unconsumed tail.
    id: Vec<u8>,
    id_pos: usize,
    buffer: Option<SubBuffer>,
    /// Payload bytes the caller skipped past the current sub-buffer,
    /// consumed by the next record advance.
    skip: u64,
    pos: u64,
    length: u64,
}

/// The payload segment currently being read.
enum SubBuffer {
    /// An inline record: a window into the id bytes.
    Inline { start: usize, end: usize },
    /// A block fetched from the map.
    Block { data: Vec<u8>, pos: usize },
}

impl SubBuffer {
    fn remaining<'b>(&'b self, id: &'b [u8]) -> &'b [u8] {
        match self {
            SubBuffer::Inline { start, end } => &id[*start..*end],
            SubBuffer::Block { data, pos } => &data[*pos..],
        }
    }

    fn consume(&mut self, n: usize) {
        match self {
            SubBuffer::Inline { start, .. } => *start += n,
            SubBuffer::Block { pos, .. } => *pos += n,
        }
    }
}

impl<'a, M: BlockMap> StreamReader<'a, M> {
    pub(crate) fn new(map: &'a M, id: &[u8]) -> Result<Self, Error> {
        // Walks the id once up front: rejects malformed ids and pins the
        // total length, which indirect records declare locally.
        let length = crate::id::length(id)?;
        Ok(Self {
            map,
            id: id.to_vec(),
            id_pos: 0,
            buffer: None,
            skip: 0,
            pos: 0,
            length,
        })
    }

    /// Total payload length of the id.
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Payload bytes read or skipped so far.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Skip up to `n` payload bytes and return the number actually skipped,
    /// clamped to the remaining payload.
    ///
    /// The current sub-buffer is consumed where possible; any remainder is
    /// only accounted for and applied when the walk next advances, so
    /// skipping whole blocks never fetches them.
    pub fn skip(&mut self, n: u64) -> u64 {
        let n = n.min(self.length.saturating_sub(self.pos));
        if n == 0 {
            return 0;
        }
        let mut rest = n;
        if let Some(buffer) = self.buffer.as_mut() {
            let available = buffer.remaining(&self.id).len() as u64;
            let take = available.min(rest);
            buffer.consume(take as usize);
            if take == available {
                self.buffer = None;
            }
            rest -= take;
        }
        self.skip += rest;
        self.pos += n;
        n
    }

    /// Drop buffered state and move the reader to the end of the payload.
    /// Subsequent reads return `Ok(0)`.
    pub fn close(&mut self) {
        self.buffer = None;
        self.id_pos = self.id.len();
        self.skip = 0;
        self.pos = self.length;
    }

    /// Advance to the next non-empty payload segment, honoring the pending
    /// skip. Returns `false` at the end of the id.
    fn advance(&mut self) -> Result<bool, Error> {
        loop {
            if self.id_pos >= self.id.len() {
                return Ok(false);
            }
            let tag = self.id[self.id_pos];
            let mut cursor = Cursor::new(&self.id[self.id_pos + 1..]);
            match tag {
                TAG_INLINE => {
                    let len = u64::from(read_varint(&mut cursor)?);
                    let start = self.id_pos + 1 + cursor.position() as usize;
                    let end = start
                        .checked_add(len as usize)
                        .filter(|end| *end <= self.id.len())
                        .ok_or_else(|| Error::malformed("inline record overruns id"))?;
                    self.id_pos = end;
                    if self.skip >= len {
                        self.skip -= len;
                        continue;
                    }
                    let start = start + self.skip as usize;
                    self.skip = 0;
                    self.buffer = Some(SubBuffer::Inline { start, end });
                    return Ok(true);
                }
                TAG_BLOCK_REF => {
                    let len = u64::from(read_varint(&mut cursor)?);
                    let key = read_varlong(&mut cursor)?;
                    self.id_pos += 1 + cursor.position() as usize;
                    if self.skip >= len {
                        self.skip -= len;
                        continue;
                    }
                    let data = self.map.get(key)?;
                    let pos = self.skip as usize;
                    self.skip = 0;
                    self.buffer = Some(SubBuffer::Block { data, pos });
                    return Ok(true);
                }
                TAG_INDIRECT => {
                    let total_len = read_varlong(&mut cursor)?;
                    let key = read_varlong(&mut cursor)?;
                    self.id_pos += 1 + cursor.position() as usize;
                    if self.skip >= total_len {
                        self.skip -= total_len;
                        continue;
                    }
                    // Splice the nested id ahead of the unconsumed tail and
                    // keep walking; nesting can be arbitrarily deep.
                    let mut spliced = self.map.get(key)?;
                    spliced.extend_from_slice(&self.id[self.id_pos..]);
                    self.id = spliced;
                    self.id_pos = 0;
                }
                tag => {
                    return Err(Error::malformed(format!("unknown tag {} in id", tag)));
                }
            }
        }
    }
}

impl<M: BlockMap> Read for StreamReader<'_, M> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match self.buffer.as_mut() {
                Some(sub) => {
                    let src = sub.remaining(&self.id);
                    let n = src.len().min(buf.len());
                    buf[..n].copy_from_slice(&src[..n]);
                    sub.consume(n);
                    if n == 0 {
                        self.buffer = None;
                        continue;
                    }
                    self.pos += n as u64;
                    return Ok(n);
                }
                None => {
                    if !self.advance()? {
                        return Ok(0);
                    }
                }
            }
        }
    }
}
