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

//! Table, clone-session and meter entries, and the schema-checked builders
//! that produce them.

use itertools::Itertools;

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use crate::{
    decode_value,
    encode_value,
    fits_width,
    width_mask,
    Action,
    MatchField,
    MatchType,
    P4Error,
    Param,
    Switch,
};

/// A match requested for one field, before it is checked against the
/// field's schema and encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Match {
    Exact(u64),
    /// Value and prefix length.
    Lpm(u64, i32),
    /// Value and mask.
    Ternary(u64, u64),
    /// Inclusive low and high bounds.
    Range(u64, u64),
    Optional(u64),
}

impl Match {
    pub fn match_type(&self) -> MatchType {
        match self {
            Match::Exact(_) => MatchType::Exact,
            Match::Lpm(..) => MatchType::Lpm,
            Match::Ternary(..) => MatchType::Ternary,
            Match::Range(..) => MatchType::Range,
            Match::Optional(_) => MatchType::Optional,
        }
    }
}

/// An encoded match value, as carried in a P4Runtime `FieldMatch`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MatchValue {
    Exact(Vec<u8>),
    Lpm { value: Vec<u8>, prefix_len: i32 },
    Ternary { value: Vec<u8>, mask: Vec<u8> },
    Range { low: Vec<u8>, high: Vec<u8> },
    Optional(Vec<u8>),
}

impl MatchValue {
    pub fn exact(&self) -> Option<u64> {
        match self {
            MatchValue::Exact(value) => decode_value(value),
            _ => None,
        }
    }

    pub fn lpm(&self) -> Option<(u64, i32)> {
        match self {
            MatchValue::Lpm { value, prefix_len } => Some((decode_value(value)?, *prefix_len)),
            _ => None,
        }
    }

    pub fn ternary(&self) -> Option<(u64, u64)> {
        match self {
            MatchValue::Ternary { value, mask } => {
                Some((decode_value(value)?, decode_value(mask)?))
            }
            _ => None,
        }
    }

    pub fn range(&self) -> Option<(u64, u64)> {
        match self {
            MatchValue::Range { low, high } => Some((decode_value(low)?, decode_value(high)?)),
            _ => None,
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    format!("0x{}", bytes.iter().map(|b| format!("{:02x}", b)).join(""))
}

impl Display for MatchValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchValue::Exact(value) => write!(f, "{}", hex(value)),
            MatchValue::Lpm { value, prefix_len } => write!(f, "{}/{}", hex(value), prefix_len),
            MatchValue::Ternary { value, mask } => write!(f, "{}&&&{}", hex(value), hex(mask)),
            MatchValue::Range { low, high } => write!(f, "{}..{}", hex(low), hex(high)),
            MatchValue::Optional(value) => write!(f, "{}?", hex(value)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldMatch {
    pub field: String,
    pub value: MatchValue,
}

impl Display for FieldMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.field, self.value)
    }
}

/// An action with its encoded parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionCall {
    pub name: String,
    pub params: BTreeMap<String, Vec<u8>>,
}

impl ActionCall {
    /// Returns parameter `name` decoded as an integer.
    pub fn param(&self, name: &str) -> Option<u64> {
        self.params.get(name).and_then(|value| decode_value(value))
    }
}

impl Display for ActionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        write!(f, "{}", self.params.iter().map(|(k, v)| format!("{}={}", k, hex(v))).join(", "))?;
        write!(f, ")")
    }
}

/// A table entry.  `matches` follows the order of the table's match fields
/// in the schema, so two entries built from the same inputs compare equal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableEntry {
    pub table: String,
    pub matches: Vec<FieldMatch>,
    pub action: ActionCall,
    pub priority: i32,
}

impl TableEntry {
    pub fn field(&self, name: &str) -> Option<&MatchValue> {
        self.matches.iter().find(|m| m.field == name).map(|m| &m.value)
    }
}

impl Display for TableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: [{}] -> {}", self.table, self.matches.iter().join(", "), self.action)?;
        if self.priority != 0 {
            write!(f, " priority {}", self.priority)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Replica {
    pub egress_port: u32,
    pub instance: u32,
}

/// A packet-replication-engine clone session: packets mirrored to
/// `session_id` are copied to every replica.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CloneSessionEntry {
    pub session_id: u32,
    pub replicas: Vec<Replica>,
}

impl CloneSessionEntry {
    /// Builds a clone session with one replica per port in `egress_ports`.
    pub fn new(session_id: u32, egress_ports: &[u32]) -> Self {
        let replicas = egress_ports
            .iter()
            .map(|&egress_port| Replica { egress_port, instance: 0 })
            .collect();
        CloneSessionEntry { session_id, replicas }
    }
}

impl Display for CloneSessionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clone session {:#x} -> ports [{}]",
               self.session_id,
               self.replicas.iter().map(|r| format!("{:#x}", r.egress_port)).join(", "))
    }
}

/// Two-rate three-color meter configuration.  Rates are in bytes or
/// packets per second depending on the meter's unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeterConfig {
    pub cir: u64,
    pub cburst: u64,
    pub pir: u64,
    pub pburst: u64,
}

/// One cell of an indirect meter.  A `None` config resets the cell to its
/// default, which lets all traffic through.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeterEntry {
    pub meter: String,
    pub index: u32,
    pub config: Option<MeterConfig>,
}

impl Display for MeterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.meter, self.index)?;
        match &self.config {
            Some(c) => write!(
                f,
                " cir={} cburst={} pir={} pburst={}",
                c.cir, c.cburst, c.pir, c.pburst
            ),
            None => write!(f, " reset"),
        }
    }
}

impl MatchField {
    fn check_width(&self, value: u64) -> Result<(), P4Error> {
        if fits_width(value, self.bit_width) {
            Ok(())
        } else {
            Err(P4Error::ValueTooWide {
                name: self.preamble.name.clone(),
                value,
                bit_width: self.bit_width,
            })
        }
    }

    /// Checks `m` against this field's match kind and width and encodes it.
    pub fn encode(&self, m: Match) -> Result<MatchValue, P4Error> {
        if m.match_type() != self.match_type {
            return Err(P4Error::MatchKindMismatch {
                field: self.preamble.name.clone(),
                expected: self.match_type.clone(),
                found: m.match_type(),
            });
        }
        let encode = |v| encode_value(v, self.bit_width);
        match m {
            Match::Exact(value) => {
                self.check_width(value)?;
                Ok(MatchValue::Exact(encode(value)))
            }
            Match::Lpm(value, prefix_len) => {
                self.check_width(value)?;
                if prefix_len < 0 || prefix_len > self.bit_width {
                    return Err(P4Error::BadPrefixLength {
                        name: self.preamble.name.clone(),
                        prefix_len,
                        bit_width: self.bit_width,
                    });
                }
                let mask = width_mask(self.bit_width) & !width_mask(self.bit_width - prefix_len);
                Ok(MatchValue::Lpm { value: encode(value & mask), prefix_len })
            }
            Match::Ternary(value, mask) => {
                self.check_width(value)?;
                self.check_width(mask)?;
                // P4Runtime rejects ternary values with bits outside the mask.
                Ok(MatchValue::Ternary { value: encode(value & mask), mask: encode(mask) })
            }
            Match::Range(low, high) => {
                self.check_width(low)?;
                self.check_width(high)?;
                if low > high {
                    return Err(P4Error::EmptyRange { name: self.preamble.name.clone(), low, high });
                }
                Ok(MatchValue::Range { low: encode(low), high: encode(high) })
            }
            Match::Optional(value) => {
                self.check_width(value)?;
                Ok(MatchValue::Optional(encode(value)))
            }
        }
    }
}

impl Param {
    pub fn encode(&self, value: u64) -> Result<Vec<u8>, P4Error> {
        if !fits_width(value, self.bit_width) {
            return Err(P4Error::ValueTooWide {
                name: self.preamble.name.clone(),
                value,
                bit_width: self.bit_width,
            });
        }
        Ok(encode_value(value, self.bit_width))
    }
}

impl Action {
    /// Encodes `params_values`, which must name every parameter of this
    /// action exactly once.
    pub fn build_call(&self, params_values: &[(&str, u64)]) -> Result<ActionCall, P4Error> {
        if let Some((name, _)) = params_values.iter().find(|(name, _)| self.param(name).is_none()) {
            return Err(P4Error::UnknownParam {
                action: self.preamble.name.clone(),
                param: (*name).into(),
            });
        }

        let mut params = BTreeMap::new();
        for p in &self.params {
            let name = &p.preamble.name;
            match params_values.iter().find(|(n, _)| n == name) {
                Some((_, value)) => {
                    params.insert(name.clone(), p.encode(*value)?);
                }
                None => {
                    return Err(P4Error::MissingParam {
                        action: self.preamble.name.clone(),
                        param: name.clone(),
                    })
                }
            }
        }
        Ok(ActionCall { name: self.preamble.name.clone(), params })
    }
}

impl Switch {
    /// Builds an entry for `table_name` that invokes `action_name`.
    ///
    /// Every exact-match field of the table must appear in `match_fields`;
    /// other fields may be omitted, which makes them wildcards.  The entry is
    /// either built completely or not at all.
    pub fn build_table_entry(
        &self,
        table_name: &str,
        action_name: &str,
        params_values: &[(&str, u64)],
        match_fields: &[(&str, Match)],
        priority: i32,
    ) -> Result<TableEntry, P4Error> {
        let table = self.table(table_name)?;

        let actions: Vec<_> = table
            .actions
            .iter()
            .filter(|a| a.action.preamble.name == action_name)
            .collect();
        let action_ref = match actions[..] {
            [action_ref] => action_ref,
            _ => {
                return Err(P4Error::ActionNotFound {
                    table: Some(table_name.into()),
                    name: action_name.into(),
                    count: actions.len(),
                })
            }
        };
        if !action_ref.may_be_entry {
            return Err(P4Error::DefaultOnlyAction {
                table: table_name.into(),
                action: action_name.into(),
            });
        }
        let action = action_ref.action.build_call(params_values)?;

        let unknown = match_fields.iter().find(|(name, _)| table.match_field(name).is_none());
        if let Some((name, _)) = unknown {
            return Err(P4Error::UnknownField { table: table_name.into(), field: (*name).into() });
        }

        let mut matches = Vec::new();
        for field in &table.match_fields {
            let name: &str = &field.preamble.name;
            match match_fields.iter().find(|(n, _)| *n == name) {
                Some((_, m)) => {
                    matches.push(FieldMatch { field: name.into(), value: field.encode(*m)? })
                }
                None => {
                    if field.match_type == MatchType::Exact {
                        return Err(P4Error::MissingField {
                            table: table_name.into(),
                            field: name.into(),
                        });
                    }
                }
            }
        }

        Ok(TableEntry { table: table_name.into(), matches, action, priority })
    }

    /// Builds an entry for cell `index` of meter `meter_name`.
    pub fn build_meter_entry(
        &self,
        meter_name: &str,
        index: u32,
        config: Option<MeterConfig>,
    ) -> Result<MeterEntry, P4Error> {
        let meter = self.meter(meter_name)?;
        if meter.size > 0 && u64::from(index) >= meter.size {
            return Err(P4Error::MeterIndexOutOfRange {
                name: meter_name.into(),
                index,
                size: meter.size,
            });
        }
        Ok(MeterEntry { meter: meter_name.into(), index, config })
    }
}
