/*
Copyright (c) 2021 VMware, Inc.
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

//! Schema and entry model for P4Runtime-style pipelines.
//!
//! A [`Switch`] describes the tables, actions and meters of one compiled
//! pipeline.  It is loaded from a P4Info document (see [`Switch::from_json`])
//! and then used to build [`TableEntry`] and [`MeterEntry`] values that are
//! checked against the schema and encoded the way P4Runtime expects.

use byteorder::{BigEndian, ByteOrder};
use itertools::Itertools;

use std::fmt::{self, Display};

use thiserror::Error;

mod entry;
mod p4info;

pub use entry::{
    ActionCall,
    CloneSessionEntry,
    FieldMatch,
    Match,
    MatchValue,
    MeterConfig,
    MeterEntry,
    Replica,
    TableEntry,
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Preamble {
    pub id: u32,
    pub name: String,
    pub alias: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchType {
    Unspecified,
    Exact,
    Lpm,
    Ternary,
    Range,
    Optional,
    Other(String),
}

impl Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use MatchType::*;
        let s = match self {
            Unspecified => "unspecified",
            Exact => "exact",
            Lpm => "LPM",
            Ternary => "ternary",
            Range => "range",
            Optional => "optional",
            Other(s) => s,
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug)]
pub struct MatchField {
    // Match fields carry no alias in P4Info; the name is reused as one.
    pub preamble: Preamble,
    pub bit_width: i32,
    pub match_type: MatchType,
}

impl Display for MatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field {}: bit<{}> {}-match", self.preamble.name, self.bit_width, self.match_type)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Param {
    pub preamble: Preamble,
    pub bit_width: i32,
}

impl Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: bit<{}>", self.preamble.name, self.bit_width)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Action {
    pub preamble: Preamble,
    pub params: Vec<Param>,
}

impl Action {
    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.preamble.name == name)
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action {}({})", self.preamble.name, self.params.iter().join(", "))
    }
}

#[derive(Clone, Debug, Default)]
pub struct ActionRef {
    pub action: Action,
    pub may_be_default: bool, // Allowed as the default action?
    pub may_be_entry: bool,   // Allowed as an entry's action?
}

impl Display for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.may_be_entry {
            write!(f, "default-only ")?;
        } else if !self.may_be_default {
            write!(f, "not-default ")?;
        }
        write!(f, "{}", self.action)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Table {
    pub preamble: Preamble,
    pub match_fields: Vec<MatchField>,
    pub actions: Vec<ActionRef>,
    pub max_entries: Option<u64>,
    pub is_const_table: bool,
}

impl Table {
    pub fn match_field(&self, name: &str) -> Option<&MatchField> {
        self.match_fields.iter().find(|mf| mf.preamble.name == name)
    }

    pub fn action_ref(&self, name: &str) -> Option<&ActionRef> {
        self.actions.iter().find(|ar| ar.action.preamble.name == name)
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.match_fields.iter().map(|mf| mf.to_string());
        let actions = self.actions.iter().map(|ar| ar.to_string());
        write!(f, "table {}: {}", self.preamble.name, fields.chain(actions).join("; "))?;
        match (self.max_entries, self.is_const_table) {
            (Some(size), true) => write!(f, " [const, {} entries]", size),
            (Some(size), false) => write!(f, " [{} entries]", size),
            (None, true) => write!(f, " [const]"),
            (None, false) => Ok(()),
        }
    }
}

/// An indirect meter: an array of `size` cells addressed by index.
#[derive(Clone, Debug, Default)]
pub struct Meter {
    pub preamble: Preamble,
    pub size: u64,
}

impl Display for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "meter {}[{}]", self.preamble.name, self.size)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Switch {
    pub tables: Vec<Table>,
    pub actions: Vec<Action>,
    pub meters: Vec<Meter>,
}

impl Switch {
    /// Returns the one table named `name`.
    pub fn table(&self, name: &str) -> Result<&Table, P4Error> {
        let tables: Vec<&Table> = self.tables.iter().filter(|t| t.preamble.name == name).collect();
        match tables[..] {
            [table] => Ok(table),
            _ => Err(P4Error::TableNotFound { name: name.into(), count: tables.len() }),
        }
    }

    /// Returns the one action named `name`, whether or not any table refers to it.
    pub fn action(&self, name: &str) -> Result<&Action, P4Error> {
        let actions: Vec<&Action> =
            self.actions.iter().filter(|a| a.preamble.name == name).collect();
        match actions[..] {
            [action] => Ok(action),
            _ => Err(P4Error::ActionNotFound {
                table: None,
                name: name.into(),
                count: actions.len(),
            }),
        }
    }

    pub fn meter(&self, name: &str) -> Result<&Meter, P4Error> {
        let meters: Vec<&Meter> = self.meters.iter().filter(|m| m.preamble.name == name).collect();
        match meters[..] {
            [meter] => Ok(meter),
            _ => Err(P4Error::MeterNotFound { name: name.into(), count: meters.len() }),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum P4Error {
    #[error("found {count} matching tables for {name}, expected 1")]
    TableNotFound { name: String, count: usize },

    #[error("found {count} matching actions for {name}{}, expected 1", in_table(.table))]
    ActionNotFound { table: Option<String>, name: String, count: usize },

    #[error("action {action} is default-only in table {table}")]
    DefaultOnlyAction { table: String, action: String },

    #[error("no field matching name {field} in table {table}")]
    MissingField { table: String, field: String },

    #[error("table {table} has no match field {field}")]
    UnknownField { table: String, field: String },

    #[error("field {field} takes a {expected} match, not {found}")]
    MatchKindMismatch { field: String, expected: MatchType, found: MatchType },

    #[error("action {action} requires parameter {param}")]
    MissingParam { action: String, param: String },

    #[error("action {action} has no parameter {param}")]
    UnknownParam { action: String, param: String },

    #[error("value {value:#x} for {name} does not fit in {bit_width} bits")]
    ValueTooWide { name: String, value: u64, bit_width: i32 },

    #[error("prefix length {prefix_len} for {name} is outside 0..={bit_width}")]
    BadPrefixLength { name: String, prefix_len: i32, bit_width: i32 },

    #[error("range {low:#x}..={high:#x} for {name} is empty")]
    EmptyRange { name: String, low: u64, high: u64 },

    #[error("found {count} matching meters for {name}, expected 1")]
    MeterNotFound { name: String, count: usize },

    #[error("index {index} is out of range for meter {name} with {size} cells")]
    MeterIndexOutOfRange { name: String, index: u32, size: u64 },

    #[error("bad P4Info ({0})")]
    BadP4Info(String),
}

fn in_table(table: &Option<String>) -> String {
    match table {
        Some(table) => format!(" in table {}", table),
        None => String::new(),
    }
}

/// Encodes `value` the way P4Runtime expects: a big-endian byte string of
/// exactly `(bit_width + 7) / 8` bytes.  Does not check that `value` fits;
/// see [`fits_width`].
pub fn encode_value(value: u64, bit_width: i32) -> Vec<u8> {
    let mut buf = [0u8; 8];
    BigEndian::write_u64(&mut buf, value);

    let num_bytes = ((bit_width.max(1) + 7) / 8) as usize;
    if num_bytes <= buf.len() {
        buf[buf.len() - num_bytes..].to_vec()
    } else {
        let mut enc_val = vec![0; num_bytes - buf.len()];
        enc_val.extend_from_slice(&buf);
        enc_val
    }
}

/// Decodes a big-endian byte string produced by [`encode_value`].  Returns
/// `None` if the value has more than 64 significant bits.
pub fn decode_value(bytes: &[u8]) -> Option<u64> {
    let significant = match bytes.iter().position(|&b| b != 0) {
        Some(start) => &bytes[start..],
        None => return Some(0),
    };
    if significant.len() > 8 {
        return None;
    }
    Some(BigEndian::read_uint(significant, significant.len()))
}

/// Returns true if `value` can be represented in `bit_width` bits.
pub fn fits_width(value: u64, bit_width: i32) -> bool {
    bit_width >= 64 || (bit_width >= 0 && value >> bit_width == 0)
}

/// Returns a mask with the `bit_width` low-order bits set.
pub fn width_mask(bit_width: i32) -> u64 {
    if bit_width >= 64 {
        u64::MAX
    } else if bit_width <= 0 {
        0
    } else {
        (1u64 << bit_width) - 1
    }
}
