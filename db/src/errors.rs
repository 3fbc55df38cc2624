// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use thiserror::Error;

/// Block map error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("block {0} not found")]
    BlockNotFound(u64),
    #[error("{0}")]
    Other(String),
}

impl From<Error> for String {
    fn from(e: Error) -> Self {
        e.to_string()
    }
}
