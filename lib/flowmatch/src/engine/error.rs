// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Errors produced while building, completing, or converting a match.

use super::field::MatchField;
use alloc::string::String;
use core::fmt;
use core::fmt::Display;
use thiserror::Error;

/// Every way a match can be rejected.
///
/// Errors are returned at the point of construction, `with_*`
/// completion, verification, or conversion. None of them are
/// transient: a caller should reject the whole flow.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum MatchError {
    /// A field's value is outside its legal range or format.
    #[error("invalid match: {0}")]
    Validation(String),

    /// Two inputs imply different values for the same derived field.
    #[error(
        "{field} conflict: {current:#06x} already set, {requested:#06x} implied"
    )]
    Conflict { field: MatchField, current: u32, requested: u32 },

    /// The engine does not handle the requested feature.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A persisted record could not be encoded or decoded.
    #[error("record codec: {0}")]
    Codec(String),
}

/// The coarse classification of a [`MatchError`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    Unsupported,
    Codec,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::Conflict => "conflict",
            Self::Unsupported => "unsupported",
            Self::Codec => "codec",
        };
        write!(f, "{s}")
    }
}

impl MatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::Codec(_) => ErrorKind::Codec,
        }
    }

    pub(crate) fn invalid(field: MatchField, msg: impl Display) -> Self {
        Self::Validation(format!("{field}: {msg}"))
    }
}

impl From<postcard::Error> for MatchError {
    fn from(err: postcard::Error) -> Self {
        Self::Codec(format!("{err}"))
    }
}

pub type MatchResult<T> = core::result::Result<T, MatchError>;
