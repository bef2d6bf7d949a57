/*
Copyright (c) 2022 VMware, Inc.
SPDX-License-Identifier: MIT
Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:
The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.
THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/

//! Error taxonomy shared by the INT compiler and the UPF translator.

use std::fmt::{self, Display};

use thiserror::Error;

/// What went wrong, without the details.  Callers branch on this rather
/// than on the error's text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConfigurationMissing,
    UnsupportedCriteria,
    TranslationMismatch,
    InvalidArgument,
    Schema,
}

/// The kind of schema element a decoded entry disagreed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SchemaElement {
    Table,
    Action,
    MatchField,
    Param,
    Meter,
}

impl Display for SchemaElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use SchemaElement::*;
        let s = match self {
            Table => "table",
            Action => "action",
            MatchField => "match field",
            Param => "action parameter",
            Meter => "meter",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// An app id, segment-routing config, collector host or host location
    /// could not be resolved.
    #[error("missing configuration: {0}")]
    ConfigurationMissing(String),

    /// An INT objective selects on something the watchlist cannot match.
    #[error("unsupported criterion {0}")]
    UnsupportedCriteria(String),

    /// A device entry is not shaped like the entity it is decoded into.
    #[error("{element} mismatch: expected {expected}, found {found}")]
    TranslationMismatch {
        element: SchemaElement,
        expected: String,
        found: String,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The pipeline schema disagrees with what the compiler builds.
    #[error(transparent)]
    Schema(#[from] p4ext::P4Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ConfigurationMissing(_) => ErrorKind::ConfigurationMissing,
            Error::UnsupportedCriteria(_) => ErrorKind::UnsupportedCriteria,
            Error::TranslationMismatch { .. } => ErrorKind::TranslationMismatch,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Schema(_) => ErrorKind::Schema,
        }
    }

    pub(crate) fn mismatch<E: Display, F: Display>(
        element: SchemaElement,
        expected: E,
        found: F,
    ) -> Self {
        Error::TranslationMismatch {
            element,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
