// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Chunked large-object (LOB) stream storage.
//!
//! [`StreamStore`] persists arbitrarily large byte streams inside an ordered
//! key-value map of bounded blocks (the [`db::BlockMap`] contract) and hands
//! back a compact, self-describing binary id. Small payloads are embedded in
//! the id itself; large payloads are chunked into blocks; oversize ids are
//! recursively collapsed into indirection blocks, so the id stays small no
//! matter how large the payload grows.
//!
//! An id is a sequence of tagged records (inline payload, block reference,
//! or indirect reference to a stored nested id) with all integers encoded
//! as unsigned LEB128 varints. The format is wire-stable: ids are meant to
//! be persisted verbatim inside other storage.
//!
//! Payload bytes are opaque; character streams (CLOBs) enter the store as
//! their UTF-8 encoding.

mod errors;
mod id;
mod reader;
mod store;
mod varint;

pub use self::errors::Error;
pub use self::id::{describe, length, IdBuilder, IdCursor, Record};
pub use self::reader::StreamReader;
pub use self::store::StreamStore;

/// Default threshold below which a chunk is embedded in the id.
pub const DEFAULT_MIN_BLOCK_SIZE: usize = 256;
/// Default upper bound on a single block.
pub const DEFAULT_MAX_BLOCK_SIZE: usize = 256 * 1024;
