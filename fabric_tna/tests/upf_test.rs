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

use fabric_tna::context::{AppId, DeviceId, APP_NAME};
use fabric_tna::error::SchemaElement;
use fabric_tna::net::Ipv4Net;
use fabric_tna::schema::{self, *};
use fabric_tna::upf::*;
use fabric_tna::{Error, ErrorKind};

use p4ext::{Match, MatchValue, MeterConfig, Switch, TableEntry};

use std::net::Ipv4Addr;
use std::sync::Arc;

const PRIORITY: i32 = 10;

struct Setup {
    translator: UpfTranslator,
    schema: Arc<Switch>,
    device_id: DeviceId,
    app_id: AppId,
}

impl Setup {
    fn new() -> Self {
        let schema = Arc::new(schema::builtin().unwrap());
        Self {
            translator: UpfTranslator::new(schema.clone()).unwrap(),
            schema,
            device_id: "device:leaf1".into(),
            app_id: AppId { id: 7, name: APP_NAME.into() },
        }
    }
}

fn ip(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

fn net(s: &str) -> Ipv4Net {
    s.parse().unwrap()
}

fn mismatch_on(result: Result<impl std::fmt::Debug, Error>) -> SchemaElement {
    match result {
        Err(Error::TranslationMismatch { element, .. }) => element,
        other => panic!("expected a translation mismatch, got {:?}", other),
    }
}

#[test]
fn interfaces() {
    let setup = Setup::new();
    let t = &setup.translator;
    let (dev, owner) = (&setup.device_id, &setup.app_id);
    let interfaces = [
        UpfInterface { prefix: net("10.0.0.0/24"), kind: InterfaceKind::Access, slice_id: 1 },
        UpfInterface { prefix: net("0.0.0.0/0"), kind: InterfaceKind::Core, slice_id: 15 },
        UpfInterface {
            prefix: Ipv4Net::from(ip("140.0.99.254")),
            kind: InterfaceKind::Dbuf,
            slice_id: 0,
        },
    ];
    for (iface, gtpu_is_valid) in interfaces.iter().zip([1, 0, 1]) {
        let entry = t.interface_to_entry(iface, dev, owner, PRIORITY).unwrap();
        assert_eq!(entry.entry.table, UPF_INTERFACES);
        let gtpu = entry.entry.field(HDR_GTPU_IS_VALID).and_then(|m| m.exact());
        assert_eq!(gtpu, Some(gtpu_is_valid));
        assert_eq!(entry.device_id, setup.device_id);
        assert_eq!(entry.app_id, setup.app_id);
        assert!(entry.permanent);
        assert_eq!(&t.entry_to_interface(&entry.entry).unwrap(), iface);
    }
    assert!(interfaces[0].is_access() && interfaces[1].is_core() && interfaces[2].is_dbuf());

    let too_wide = UpfInterface { slice_id: 16, ..interfaces[0] };
    let err = t.interface_to_entry(&too_wide, dev, owner, PRIORITY).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
}

#[test]
fn gtp_tunnel_peer() {
    let setup = Setup::new();
    let t = &setup.translator;
    let (dev, owner) = (&setup.device_id, &setup.app_id);
    let peer = UpfGtpTunnelPeer {
        tun_peer_id: 2,
        src_addr: ip("10.0.0.1"),
        dst_addr: ip("10.0.0.2"),
        src_port: 2152,
    };
    let (ingress, egress) = t.gtp_tunnel_peer_to_entries(&peer, dev, owner, PRIORITY).unwrap();

    let expected_ingress = setup
        .schema
        .build_table_entry(
            IG_TUNNEL_PEERS,
            SET_ROUTING_IPV4_DST,
            &[(TUN_DST_ADDR, 0x0a00_0002)],
            &[(HDR_TUN_PEER_ID, Match::Exact(2))],
            PRIORITY,
        )
        .unwrap();
    let expected_egress = setup
        .schema
        .build_table_entry(
            EG_TUNNEL_PEERS,
            LOAD_TUNNEL_PARAMS,
            &[
                (TUNNEL_SRC_PORT, 2152),
                (TUNNEL_SRC_ADDR, 0x0a00_0001),
                (TUNNEL_DST_ADDR, 0x0a00_0002),
            ],
            &[(HDR_TUN_PEER_ID, Match::Exact(2))],
            PRIORITY,
        )
        .unwrap();
    assert_eq!(ingress.entry, expected_ingress);
    assert_eq!(egress.entry, expected_egress);
    assert_eq!(ingress.device_id, setup.device_id);
    assert_eq!(egress.device_id, setup.device_id);

    assert_eq!(t.entry_to_gtp_tunnel_peer(&egress.entry).unwrap(), peer);
    assert_eq!(mismatch_on(t.entry_to_gtp_tunnel_peer(&ingress.entry)), SchemaElement::Table);
}

#[test]
fn sessions() {
    let setup = Setup::new();
    let t = &setup.translator;
    let (dev, owner) = (&setup.device_id, &setup.app_id);

    let uplink =
        UpfSessionUplink { tun_dst_addr: ip("10.0.0.1"), teid: 0x1234_5678, session_meter_idx: 3 };
    let entry = t.session_uplink_to_entry(&uplink, dev, owner, PRIORITY).unwrap();
    assert_eq!(entry.entry.action.name, SET_UPLINK_SESSION);
    assert_eq!(t.entry_to_session_uplink(&entry.entry).unwrap(), uplink);

    for buffering in [false, true] {
        let downlink = UpfSessionDownlink {
            ue_address: ip("17.0.0.1"),
            tun_peer_id: 2,
            session_meter_idx: 4,
            buffering,
        };
        let entry = t.session_downlink_to_entry(&downlink, dev, owner, PRIORITY).unwrap();
        let action = if buffering { SET_DOWNLINK_SESSION_BUF } else { SET_DOWNLINK_SESSION };
        assert_eq!(entry.entry.action.name, action);
        let decoded = t.entry_to_session_downlink(&entry.entry).unwrap();
        assert_eq!(decoded, downlink);
        assert_eq!(decoded.needs_buffering(), buffering);
    }
}

#[test]
fn terminations() {
    let setup = Setup::new();
    let t = &setup.translator;
    let (dev, owner) = (&setup.device_id, &setup.app_id);
    let session = ip("17.0.0.1");

    let uplinks = [
        (UplinkTreatment::Forward { traffic_class: Some(3), app_meter_idx: 8 }, APP_FWD),
        (UplinkTreatment::Forward { traffic_class: None, app_meter_idx: 8 }, APP_FWD_NO_TC),
        (UplinkTreatment::Drop, APP_DROP),
    ];
    for (treatment, action) in uplinks {
        let term = UpfTerminationUplink {
            ue_session_id: session,
            application_id: 4,
            ctr_id: 10,
            treatment,
        };
        let entry = t.termination_uplink_to_entry(&term, dev, owner, PRIORITY).unwrap();
        assert_eq!(entry.entry.action.name, action);
        assert_eq!(entry.entry.action.param(CTR_ID), Some(10));
        assert_eq!(t.entry_to_termination_uplink(&entry.entry).unwrap(), term);
    }

    let forward = |traffic_class| DownlinkTreatment::Forward {
        traffic_class,
        app_meter_idx: 9,
        teid: 0xff,
        qfi: 9,
    };
    let downlinks = [
        (forward(Some(1)), DOWNLINK_FWD_ENCAP),
        (forward(None), DOWNLINK_FWD_ENCAP_NO_TC),
        (DownlinkTreatment::Drop, APP_DROP),
    ];
    for (treatment, action) in downlinks {
        let term = UpfTerminationDownlink {
            ue_session_id: session,
            application_id: 4,
            ctr_id: 11,
            treatment,
        };
        let entry = t.termination_downlink_to_entry(&term, dev, owner, PRIORITY).unwrap();
        assert_eq!(entry.entry.action.name, action);
        let decoded = t.entry_to_termination_downlink(&entry.entry).unwrap();
        assert_eq!(decoded, term);
        assert_eq!(decoded.needs_dropping(), action == APP_DROP);
        let traffic_class = if action == DOWNLINK_FWD_ENCAP { Some(1) } else { None };
        assert_eq!(decoded.traffic_class(), traffic_class);
    }

    // An uplink termination is not a downlink one, even with the same action.
    let drop = UpfTerminationUplink {
        ue_session_id: session,
        application_id: 4,
        ctr_id: 10,
        treatment: UplinkTreatment::Drop,
    };
    let entry = t.termination_uplink_to_entry(&drop, dev, owner, PRIORITY).unwrap();
    assert_eq!(mismatch_on(t.entry_to_termination_downlink(&entry.entry)), SchemaElement::Table);
}

#[test]
fn applications() {
    let setup = Setup::new();
    let t = &setup.translator;
    let (dev, owner) = (&setup.device_id, &setup.app_id);

    let filtered = UpfApplication {
        app_id: 5,
        slice_id: 2,
        ip_prefix: Some(net("10.0.10.0/24")),
        l4_port_range: Some(80..=8080),
        ip_proto: Some(6),
        priority: 20,
    };
    let entry = t.application_to_entry(&filtered, dev, owner).unwrap();
    assert_eq!(entry.entry.priority, 20);
    let addr = entry.entry.field(HDR_APP_IPV4_ADDR).and_then(|m| m.ternary());
    assert_eq!(addr, Some((0x0a00_0a00, 0xffff_ff00)));
    assert_eq!(entry.entry.field(HDR_APP_L4_PORT).and_then(|m| m.range()), Some((80, 8080)));
    assert_eq!(t.entry_to_application(&entry.entry).unwrap(), filtered);

    let any = UpfApplication {
        app_id: 1,
        slice_id: 2,
        ip_prefix: None,
        l4_port_range: None,
        ip_proto: None,
        priority: 1,
    };
    let entry = t.application_to_entry(&any, dev, owner).unwrap();
    assert_eq!(entry.entry.matches.len(), 1);
    assert_eq!(t.entry_to_application(&entry.entry).unwrap(), any);

    // A ternary address that is not a prefix has no application form.
    let scattered = setup
        .schema
        .build_table_entry(
            APPLICATIONS,
            SET_APP_ID,
            &[(APP_ID, 1)],
            &[
                (HDR_SLICE_ID, Match::Exact(2)),
                (HDR_APP_IPV4_ADDR, Match::Ternary(0x0a00_0001, 0xff00_ff00)),
            ],
            1,
        )
        .unwrap();
    assert_eq!(mismatch_on(t.entry_to_application(&scattered)), SchemaElement::MatchField);

    // A protocol value wider than a byte is reported, not truncated.
    let mut wide_proto = t.application_to_entry(&filtered, dev, owner).unwrap().entry;
    for m in wide_proto.matches.iter_mut().filter(|m| m.field == HDR_APP_IP_PROTO) {
        m.value = MatchValue::Ternary { value: vec![0x01, 0x06], mask: vec![0x00, 0xff] };
    }
    assert_eq!(mismatch_on(t.entry_to_application(&wide_proto)), SchemaElement::MatchField);
}

#[test]
fn decode_mismatches() {
    let setup = Setup::new();
    let t = &setup.translator;
    let (dev, owner) = (&setup.device_id, &setup.app_id);
    let uplink = UpfSessionUplink { tun_dst_addr: ip("10.0.0.1"), teid: 1, session_meter_idx: 3 };
    let entry: TableEntry =
        t.session_uplink_to_entry(&uplink, dev, owner, PRIORITY).unwrap().entry;

    assert_eq!(mismatch_on(t.entry_to_interface(&entry)), SchemaElement::Table);
    assert_eq!(mismatch_on(t.entry_to_session_downlink(&entry)), SchemaElement::Table);

    let mut wrong_action = entry.clone();
    wrong_action.action.name = "FabricIngress.upf.uplink_drop".into();
    wrong_action.action.params.clear();
    let err = t.entry_to_session_uplink(&wrong_action).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TranslationMismatch);
    match err {
        Error::TranslationMismatch { element, expected, found } => {
            assert_eq!(element, SchemaElement::Action);
            assert_eq!(expected, SET_UPLINK_SESSION);
            assert_eq!(found, "FabricIngress.upf.uplink_drop");
        }
        _ => unreachable!(),
    }

    let mut missing_param = entry.clone();
    missing_param.action.params.remove(SESSION_METER_IDX);
    assert_eq!(mismatch_on(t.entry_to_session_uplink(&missing_param)), SchemaElement::Param);

    let mut missing_field = entry;
    missing_field.matches.retain(|m| m.field != HDR_TEID);
    assert_eq!(mismatch_on(t.entry_to_session_uplink(&missing_field)), SchemaElement::MatchField);
}

#[test]
fn meters() {
    let setup = Setup::new();
    let t = &setup.translator;
    let (dev, owner) = (&setup.device_id, &setup.app_id);

    let session = UpfMeter::session(1, MeterBand::new(1_000_000, 10_000).unwrap());
    let program = t.meter_to_program(&session, dev, owner).unwrap();
    assert_eq!(program.entry.meter, SESSION_METER);
    assert_eq!(program.entry.index, 1);
    let peak_only = MeterConfig { cir: 0, cburst: 0, pir: 1_000_000, pburst: 10_000 };
    assert_eq!(program.entry.config, Some(peak_only));
    assert_eq!(t.meter_entry_to_meter(MeterKind::Session, &program.entry).unwrap(), session);

    let (committed, peak) = (MeterBand::new(500, 50).unwrap(), MeterBand::new(1000, 100).unwrap());
    let app = UpfMeter::application(2, committed, peak);
    let program = t.meter_to_program(&app, dev, owner).unwrap();
    assert_eq!(program.entry.meter, APP_METER);
    assert_eq!(t.meter_entry_to_meter(MeterKind::Application, &program.entry).unwrap(), app);
    let as_session = t.meter_entry_to_meter(MeterKind::Session, &program.entry);
    assert_eq!(mismatch_on(as_session), SchemaElement::Meter);

    // A reset programs no config at all, not zero bands.
    for kind in [MeterKind::Session, MeterKind::Application] {
        let reset = UpfMeter::reset(kind, 3);
        let program = t.meter_to_program(&reset, dev, owner).unwrap();
        assert_eq!(program.entry.config, None);
        let decoded = t.meter_entry_to_meter(kind, &program.entry).unwrap();
        assert!(decoded.is_reset());
        assert_eq!(decoded, reset);
    }

    assert_eq!(MeterBand::new(0, 0).unwrap_err().kind(), ErrorKind::InvalidArgument);
    let committed = UpfMeter { committed: Some(MeterBand { rate: 1, burst: 1 }), ..session };
    let err = t.meter_to_program(&committed, dev, owner).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let out_of_range = UpfMeter::reset(MeterKind::Application, 1024);
    let err = t.meter_to_program(&out_of_range, dev, owner).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
}

#[test]
fn translator_needs_upf_schema() {
    let mut switch = schema::builtin().unwrap();
    switch.meters.clear();
    assert!(UpfTranslator::new(Arc::new(switch)).is_err());
}
