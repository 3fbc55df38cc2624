// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::io;
use thiserror::Error;

/// Stream store error
#[derive(Debug, Error)]
pub enum Error {
    /// An id contains an unknown tag or a truncated field.
    #[error("malformed stream id: {0}")]
    MalformedId(String),
    /// The block map failed, or a referenced block is missing.
    #[error(transparent)]
    Db(#[from] db::Error),
    /// Reading from the caller's input stream failed.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedId(msg.into())
    }
}

/// Stream reads surface store failures as `io::Error`: a missing block maps
/// to `NotFound`, a malformed id to `InvalidData`.
impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        match err {
            Error::Io(e) => e,
            Error::Db(e @ db::Error::BlockNotFound(_)) => {
                io::Error::new(io::ErrorKind::NotFound, e.to_string())
            }
            Error::Db(e) => io::Error::new(io::ErrorKind::Other, e.to_string()),
            Error::MalformedId(msg) => io::Error::new(io::ErrorKind::InvalidData, msg),
        }
    }
}
