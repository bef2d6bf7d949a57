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

//! Reads P4Info in the protobuf JSON mapping, as written by
//! `p4c --p4runtime-files foo.p4info.json`.

use serde::{Deserialize, Deserializer};

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::{
    Action, ActionRef, MatchField, MatchType, Meter, P4Error, Param, Preamble, Switch, Table,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct P4InfoDoc {
    #[serde(default)]
    tables: Vec<TableDoc>,
    #[serde(default)]
    actions: Vec<ActionDoc>,
    #[serde(default)]
    meters: Vec<MeterDoc>,
}

#[derive(Deserialize)]
struct PreambleDoc {
    id: u32,
    name: String,
    #[serde(default)]
    alias: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableDoc {
    preamble: PreambleDoc,
    #[serde(default)]
    match_fields: Vec<MatchFieldDoc>,
    #[serde(default)]
    action_refs: Vec<ActionRefDoc>,
    #[serde(default, deserialize_with = "int64")]
    size: u64,
    #[serde(default)]
    is_const_table: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatchFieldDoc {
    id: u32,
    name: String,
    bitwidth: i32,
    #[serde(default)]
    match_type: Option<String>,
    #[serde(default)]
    other_match_type: Option<String>,
}

#[derive(Deserialize)]
struct ActionRefDoc {
    id: u32,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Deserialize)]
struct ActionDoc {
    preamble: PreambleDoc,
    #[serde(default)]
    params: Vec<ParamDoc>,
}

#[derive(Deserialize)]
struct ParamDoc {
    id: u32,
    name: String,
    bitwidth: i32,
}

#[derive(Deserialize)]
struct MeterDoc {
    preamble: PreambleDoc,
    #[serde(default, deserialize_with = "int64")]
    size: u64,
}

/// The JSON mapping writes 64-bit integers as strings, but hand-written
/// files often use plain numbers.  Accept both.
fn int64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64 {
        Number(u64),
        String(String),
    }
    match Int64::deserialize(deserializer)? {
        Int64::Number(n) => Ok(n),
        Int64::String(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

impl From<PreambleDoc> for Preamble {
    fn from(p: PreambleDoc) -> Self {
        Preamble { id: p.id, name: p.name, alias: p.alias }
    }
}

impl From<MatchFieldDoc> for MatchField {
    fn from(mf: MatchFieldDoc) -> Self {
        let match_type = match mf.match_type.as_deref() {
            Some("EXACT") => MatchType::Exact,
            Some("LPM") => MatchType::Lpm,
            Some("TERNARY") => MatchType::Ternary,
            Some("RANGE") => MatchType::Range,
            Some("OPTIONAL") => MatchType::Optional,
            _ => match mf.other_match_type {
                Some(other) => MatchType::Other(other),
                None => MatchType::Unspecified,
            },
        };
        MatchField {
            preamble: Preamble { id: mf.id, alias: mf.name.clone(), name: mf.name },
            bit_width: mf.bitwidth,
            match_type,
        }
    }
}

impl From<ActionDoc> for Action {
    fn from(a: ActionDoc) -> Self {
        Action {
            preamble: a.preamble.into(),
            params: a
                .params
                .into_iter()
                .map(|p| Param {
                    preamble: Preamble { id: p.id, alias: p.name.clone(), name: p.name },
                    bit_width: p.bitwidth,
                })
                .collect(),
        }
    }
}

impl ActionRef {
    fn from_doc(ar: &ActionRefDoc, actions: &HashMap<u32, Action>) -> Result<Self, P4Error> {
        let action = actions.get(&ar.id).ok_or_else(|| {
            P4Error::BadP4Info(format!("reference to unknown action id {}", ar.id))
        })?;
        let scope = ar.scope.as_deref();
        Ok(ActionRef {
            action: action.clone(),
            may_be_default: scope != Some("TABLE_ONLY"),
            may_be_entry: scope != Some("DEFAULT_ONLY"),
        })
    }
}

impl Table {
    fn from_doc(t: TableDoc, actions: &HashMap<u32, Action>) -> Result<Self, P4Error> {
        let action_refs = t
            .action_refs
            .iter()
            .map(|ar| ActionRef::from_doc(ar, actions))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Table {
            preamble: t.preamble.into(),
            match_fields: t.match_fields.into_iter().map(|mf| mf.into()).collect(),
            actions: action_refs,
            max_entries: if t.size > 0 { Some(t.size) } else { None },
            is_const_table: t.is_const_table,
        })
    }
}

impl Switch {
    /// Parses P4Info from its JSON form.
    pub fn from_json(s: &str) -> Result<Switch, P4Error> {
        let doc: P4InfoDoc =
            serde_json::from_str(s).map_err(|e| P4Error::BadP4Info(e.to_string()))?;

        let actions: Vec<Action> = doc.actions.into_iter().map(|a| a.into()).collect();
        let by_id: HashMap<u32, Action> =
            actions.iter().map(|a| (a.preamble.id, a.clone())).collect();
        let tables = doc
            .tables
            .into_iter()
            .map(|t| Table::from_doc(t, &by_id))
            .collect::<Result<Vec<_>, _>>()?;
        let meters = doc
            .meters
            .into_iter()
            .map(|m| Meter { preamble: m.preamble.into(), size: m.size })
            .collect();
        Ok(Switch { tables, actions, meters })
    }

    /// Reads and parses a P4Info JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Switch, P4Error> {
        let path = path.as_ref();
        let s = fs::read_to_string(path).map_err(|e| {
            P4Error::BadP4Info(format!("{}: could not read P4Info ({})", path.display(), e))
        })?;
        Switch::from_json(&s)
    }
}
