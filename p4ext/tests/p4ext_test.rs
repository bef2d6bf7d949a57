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

extern crate p4ext;

use p4ext::{Match, MatchValue, MeterConfig, P4Error, Switch};

const VLAN_P4INFO: &str = r#"{
  "pkgInfo": { "arch": "v1model" },
  "tables": [
    {
      "preamble": {
        "id": 33554433, "name": "MyIngress.vlan_incoming_exact", "alias": "vlan_incoming_exact"
      },
      "matchFields": [
        { "id": 1, "name": "standard_metadata.ingress_port", "bitwidth": 9, "matchType": "EXACT" },
        { "id": 2, "name": "hdr.vlan.vid", "bitwidth": 12, "matchType": "EXACT" }
      ],
      "actionRefs": [ { "id": 16777217 }, { "id": 16777218, "scope": "DEFAULT_ONLY" } ],
      "size": "1024"
    },
    {
      "preamble": { "id": 33554434, "name": "MyIngress.acl", "alias": "acl" },
      "matchFields": [
        { "id": 1, "name": "hdr.ipv4.dst", "bitwidth": 32, "matchType": "LPM" },
        { "id": 2, "name": "hdr.ipv4.src", "bitwidth": 32, "matchType": "TERNARY" },
        { "id": 3, "name": "hdr.tcp.dport", "bitwidth": 16, "matchType": "RANGE" }
      ],
      "actionRefs": [ { "id": 16777217 } ],
      "size": 128
    }
  ],
  "actions": [
    {
      "preamble": {
        "id": 16777217, "name": "MyIngress.vlan_incoming_forward", "alias": "vlan_incoming_forward"
      },
      "params": [ { "id": 1, "name": "port", "bitwidth": 9 } ]
    },
    {
      "preamble": { "id": 16777218, "name": "MyIngress.drop", "alias": "drop" }
    }
  ],
  "meters": [
    {
      "preamble": { "id": 352321537, "name": "MyIngress.port_meter", "alias": "port_meter" },
      "size": "16"
    }
  ]
}"#;

struct Setup {
    switch: Switch,
    table_name: String,
    action_name: String,
}

impl Setup {
    fn new() -> Self {
        Self {
            switch: Switch::from_json(VLAN_P4INFO).unwrap(),
            table_name: "MyIngress.vlan_incoming_exact".to_string(),
            action_name: "MyIngress.vlan_incoming_forward".to_string(),
        }
    }
}

#[test]
fn parse_p4info() {
    let setup = Setup::new();
    assert_eq!(setup.switch.tables.len(), 2);
    assert_eq!(setup.switch.actions.len(), 2);

    let table = setup.switch.table(&setup.table_name).unwrap();
    assert_eq!(table.max_entries, Some(1024));
    assert_eq!(table.match_fields.len(), 2);
    assert!(table.action_ref("MyIngress.drop").map(|ar| !ar.may_be_entry).unwrap());

    assert_eq!(setup.switch.meter("MyIngress.port_meter").unwrap().size, 16);
    assert!(Switch::from_json("{").is_err());
}

#[test]
fn build_table_entry() {
    let setup = Setup::new();
    let matches = [
        ("standard_metadata.ingress_port", Match::Exact(11)),
        ("hdr.vlan.vid", Match::Exact(1)),
    ];

    // Valid arguments.
    let entry = setup.switch.build_table_entry(
        &setup.table_name, &setup.action_name, &[("port", 11)], &matches, 0);
    assert!(entry.is_ok());
    let entry = entry.unwrap();
    assert_eq!(entry.field("hdr.vlan.vid"), Some(&MatchValue::Exact(vec![0x00, 0x01])));
    assert_eq!(entry.field("standard_metadata.ingress_port").and_then(|m| m.exact()), Some(11));
    assert_eq!(entry.action.params["port"], vec![0x00, 0x0b]);
    assert_eq!(entry.action.param("port"), Some(11));

    // Invalid table name.
    let entry = setup.switch.build_table_entry(
        "MyIngress.nonexistent", &setup.action_name, &[("port", 11)], &matches, 0);
    let not_found = P4Error::TableNotFound { name: "MyIngress.nonexistent".into(), count: 0 };
    assert_eq!(entry, Err(not_found));

    // Invalid action name.
    let entry = setup.switch.build_table_entry(
        &setup.table_name, "MyIngress.nonexistent", &[("port", 11)], &matches, 0);
    assert!(entry.is_err());

    // Default-only action.
    let entry = setup.switch.build_table_entry(
        &setup.table_name, "MyIngress.drop", &[], &matches, 0);
    assert!(matches!(entry, Err(P4Error::DefaultOnlyAction { .. })));

    // Missing exact-match field.
    let entry = setup.switch.build_table_entry(
        &setup.table_name, &setup.action_name, &[("port", 11)], &matches[..1], 0);
    assert!(matches!(entry, Err(P4Error::MissingField { .. })));

    // Missing and unknown parameters.
    let entry = setup.switch.build_table_entry(
        &setup.table_name, &setup.action_name, &[], &matches, 0);
    assert!(matches!(entry, Err(P4Error::MissingParam { .. })));
    let entry = setup.switch.build_table_entry(
        &setup.table_name, &setup.action_name, &[("port", 11), ("vid", 1)], &matches, 0);
    assert!(matches!(entry, Err(P4Error::UnknownParam { .. })));

    // Values wider than the field.
    let entry = setup.switch.build_table_entry(
        &setup.table_name, &setup.action_name, &[("port", 512)], &matches, 0);
    assert!(matches!(entry, Err(P4Error::ValueTooWide { bit_width: 9, .. })));
}

#[test]
fn build_wildcard_entry() {
    let setup = Setup::new();
    let entry = setup.switch.build_table_entry(
        "MyIngress.acl",
        &setup.action_name,
        &[("port", 2)],
        &[
            ("hdr.tcp.dport", Match::Range(80, 80)),
            ("hdr.ipv4.dst", Match::Lpm(0x0a0000ff, 24)),
            ("hdr.ipv4.src", Match::Ternary(0x0a000001, 0xffffff00)),
        ],
        10,
    ).unwrap();

    // Matches follow schema order, with values normalized to their masks.
    let fields: Vec<&str> = entry.matches.iter().map(|m| m.field.as_str()).collect();
    assert_eq!(fields, ["hdr.ipv4.dst", "hdr.ipv4.src", "hdr.tcp.dport"]);
    assert_eq!(entry.field("hdr.ipv4.dst").and_then(|m| m.lpm()), Some((0x0a000000, 24)));
    let src = entry.field("hdr.ipv4.src").and_then(|m| m.ternary());
    assert_eq!(src, Some((0x0a000000, 0xffffff00)));
    assert_eq!(entry.field("hdr.tcp.dport").and_then(|m| m.range()), Some((80, 80)));

    // Wrong match kind, unknown field, and empty range.
    let wrong_kind = setup.switch.build_table_entry(
        "MyIngress.acl", &setup.action_name, &[("port", 2)],
        &[("hdr.ipv4.dst", Match::Exact(1))], 10);
    assert!(matches!(wrong_kind, Err(P4Error::MatchKindMismatch { .. })));
    let unknown = setup.switch.build_table_entry(
        "MyIngress.acl", &setup.action_name, &[("port", 2)],
        &[("hdr.vlan.vid", Match::Exact(1))], 10);
    assert!(matches!(unknown, Err(P4Error::UnknownField { .. })));
    let empty = setup.switch.build_table_entry(
        "MyIngress.acl", &setup.action_name, &[("port", 2)],
        &[("hdr.tcp.dport", Match::Range(9, 8))], 10);
    assert!(matches!(empty, Err(P4Error::EmptyRange { .. })));
}

#[test]
fn build_meter_entry() {
    let setup = Setup::new();
    let config = MeterConfig { cir: 1, cburst: 2, pir: 3, pburst: 4 };
    let entry = setup.switch.build_meter_entry("MyIngress.port_meter", 15, Some(config)).unwrap();
    assert_eq!(entry.config, Some(config));
    assert!(setup.switch.build_meter_entry("MyIngress.port_meter", 16, None).is_err());
    assert!(setup.switch.build_meter_entry("MyIngress.other_meter", 0, None).is_err());
}

#[test]
fn encode_decode_values() {
    assert_eq!(p4ext::encode_value(0x44, 9), vec![0x00, 0x44]);
    assert_eq!(p4ext::encode_value(0xffffc0000000, 48), vec![0xff, 0xff, 0xc0, 0x00, 0x00, 0x00]);
    assert_eq!(p4ext::encode_value(1, 1), vec![0x01]);
    assert_eq!(p4ext::encode_value(1, 72).len(), 9);
    assert_eq!(p4ext::decode_value(&[0x00, 0x00, 0x01, 0x44]), Some(0x144));
    assert_eq!(p4ext::decode_value(&[0x00; 12]), Some(0));
    assert_eq!(p4ext::decode_value(&[0x01; 9]), None);
    assert!(p4ext::fits_width(511, 9));
    assert!(!p4ext::fits_width(512, 9));
}
