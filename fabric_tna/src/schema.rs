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

//! Names of the fabric pipeline's tables, actions, match fields, action
//! parameters and meters, and the check that a loaded pipeline has them all.

use p4ext::{P4Error, Switch};

use crate::error::Result;

/// P4Info of the fabric pipeline this crate compiles for.
pub const BUILTIN_P4INFO: &str = include_str!("../p4info/fabric-tna.p4info.json");

// Filtering and forwarding.
pub const INGRESS_PORT_VLAN: &str = "FabricIngress.filtering.ingress_port_vlan";
pub const PERMIT_WITH_INTERNAL_VLAN: &str = "FabricIngress.filtering.permit_with_internal_vlan";
pub const FWD_CLASSIFIER: &str = "FabricIngress.filtering.fwd_classifier";
pub const SET_FORWARDING_TYPE: &str = "FabricIngress.filtering.set_forwarding_type";
pub const EGRESS_VLAN: &str = "FabricEgress.egress_next.egress_vlan";
pub const KEEP_VLAN: &str = "FabricEgress.egress_next.keep_vlan";

// INT.
pub const WATCHLIST: &str = "FabricIngress.int_ingress.watchlist";
pub const MARK_TO_REPORT: &str = "FabricIngress.int_ingress.mark_to_report";
pub const DROP_REPORT: &str = "FabricIngress.int_ingress.drop_report";
pub const INGRESS_REPORT_DROP: &str = "FabricIngress.int_ingress.report_drop";
pub const INT_CONFIG: &str = "FabricEgress.int_egress.config";
pub const SET_CONFIG: &str = "FabricEgress.int_egress.set_config";
pub const REPORT: &str = "FabricEgress.int_egress.report";
pub const DO_LOCAL_REPORT_ENCAP: &str = "FabricEgress.int_egress.do_local_report_encap";
pub const DO_LOCAL_REPORT_ENCAP_MPLS: &str = "FabricEgress.int_egress.do_local_report_encap_mpls";
pub const DO_DROP_REPORT_ENCAP: &str = "FabricEgress.int_egress.do_drop_report_encap";
pub const DO_DROP_REPORT_ENCAP_MPLS: &str = "FabricEgress.int_egress.do_drop_report_encap_mpls";
pub const INT_METADATA: &str = "FabricEgress.int_egress.int_metadata";
pub const REPORT_LOCAL: &str = "FabricEgress.int_egress.report_local";
pub const EGRESS_REPORT_DROP: &str = "FabricEgress.int_egress.report_drop";

// UPF.
pub const UPF_INTERFACES: &str = "FabricIngress.upf.interfaces";
pub const IFACE_ACCESS: &str = "FabricIngress.upf.iface_access";
pub const IFACE_CORE: &str = "FabricIngress.upf.iface_core";
pub const IFACE_DBUF: &str = "FabricIngress.upf.iface_dbuf";
pub const UPLINK_SESSIONS: &str = "FabricIngress.upf.uplink_sessions";
pub const SET_UPLINK_SESSION: &str = "FabricIngress.upf.set_uplink_session";
pub const DOWNLINK_SESSIONS: &str = "FabricIngress.upf.downlink_sessions";
pub const SET_DOWNLINK_SESSION: &str = "FabricIngress.upf.set_downlink_session";
pub const SET_DOWNLINK_SESSION_BUF: &str = "FabricIngress.upf.set_downlink_session_buf";
pub const UPLINK_TERMINATIONS: &str = "FabricIngress.upf.uplink_terminations";
pub const APP_FWD: &str = "FabricIngress.upf.app_fwd";
pub const APP_FWD_NO_TC: &str = "FabricIngress.upf.app_fwd_no_tc";
pub const APP_DROP: &str = "FabricIngress.upf.app_drop";
pub const DOWNLINK_TERMINATIONS: &str = "FabricIngress.upf.downlink_terminations";
pub const DOWNLINK_FWD_ENCAP: &str = "FabricIngress.upf.downlink_fwd_encap";
pub const DOWNLINK_FWD_ENCAP_NO_TC: &str = "FabricIngress.upf.downlink_fwd_encap_no_tc";
pub const IG_TUNNEL_PEERS: &str = "FabricIngress.upf.ig_tunnel_peers";
pub const SET_ROUTING_IPV4_DST: &str = "FabricIngress.upf.set_routing_ipv4_dst";
pub const EG_TUNNEL_PEERS: &str = "FabricEgress.upf.eg_tunnel_peers";
pub const LOAD_TUNNEL_PARAMS: &str = "FabricEgress.upf.load_tunnel_params";
pub const APPLICATIONS: &str = "FabricIngress.upf.applications";
pub const SET_APP_ID: &str = "FabricIngress.upf.set_app_id";
pub const SESSION_METER: &str = "FabricIngress.upf.session_meter";
pub const APP_METER: &str = "FabricIngress.upf.app_meter";

// Match fields.
pub const HDR_IG_PORT: &str = "ig_port";
pub const HDR_EG_PORT: &str = "eg_port";
pub const HDR_VLAN_IS_VALID: &str = "vlan_is_valid";
pub const HDR_VLAN_ID: &str = "vlan_id";
pub const HDR_ETH_DST: &str = "eth_dst";
pub const HDR_ETH_TYPE: &str = "eth_type";
pub const HDR_IP_ETH_TYPE: &str = "ip_eth_type";
pub const HDR_IPV4_SRC: &str = "ipv4_src";
pub const HDR_IPV4_DST: &str = "ipv4_dst";
pub const HDR_IP_PROTO: &str = "ip_proto";
pub const HDR_L4_SPORT: &str = "l4_sport";
pub const HDR_L4_DPORT: &str = "l4_dport";
pub const HDR_BMD_TYPE: &str = "bmd_type";
pub const HDR_MIRROR_TYPE: &str = "mirror_type";
pub const HDR_INT_REPORT_TYPE: &str = "int_report_type";
pub const HDR_DROP_CTL: &str = "drop_ctl";
pub const HDR_COPY_TO_CPU: &str = "copy_to_cpu";
pub const HDR_EGRESS_PORT_SET: &str = "egress_port_set";
pub const HDR_MCAST_GROUP_ID: &str = "mcast_group_id";
pub const HDR_IPV4_DST_ADDR: &str = "ipv4_dst_addr";
pub const HDR_GTPU_IS_VALID: &str = "gtpu_is_valid";
pub const HDR_TUNNEL_IPV4_DST: &str = "tunnel_ipv4_dst";
pub const HDR_TEID: &str = "teid";
pub const HDR_UE_ADDR: &str = "ue_addr";
pub const HDR_UE_SESSION_ID: &str = "ue_session_id";
pub const HDR_APP_ID: &str = "app_id";
pub const HDR_TUN_PEER_ID: &str = "tun_peer_id";
pub const HDR_SLICE_ID: &str = "slice_id";
pub const HDR_APP_IPV4_ADDR: &str = "app_ipv4_addr";
pub const HDR_APP_L4_PORT: &str = "app_l4_port";
pub const HDR_APP_IP_PROTO: &str = "app_ip_proto";

// Action parameters.
pub const VLAN_ID: &str = "vlan_id";
pub const FWD_TYPE: &str = "fwd_type";
pub const SWITCH_ID: &str = "switch_id";
pub const HOP_LATENCY_MASK: &str = "hop_latency_mask";
pub const TIMESTAMP_MASK: &str = "timestamp_mask";
pub const SRC_MAC: &str = "src_mac";
pub const MON_MAC: &str = "mon_mac";
pub const SRC_IP: &str = "src_ip";
pub const MON_IP: &str = "mon_ip";
pub const MON_PORT: &str = "mon_port";
pub const MON_LABEL: &str = "mon_label";
pub const SLICE_ID: &str = "slice_id";
pub const SESSION_METER_IDX: &str = "session_meter_idx";
pub const TUN_PEER_ID: &str = "tun_peer_id";
pub const CTR_ID: &str = "ctr_id";
pub const APP_METER_IDX: &str = "app_meter_idx";
pub const TC: &str = "tc";
pub const TEID: &str = "teid";
pub const QFI: &str = "qfi";
pub const TUN_DST_ADDR: &str = "tun_dst_addr";
pub const TUNNEL_SRC_PORT: &str = "tunnel_src_port";
pub const TUNNEL_SRC_ADDR: &str = "tunnel_src_addr";
pub const TUNNEL_DST_ADDR: &str = "tunnel_dst_addr";
pub const APP_ID: &str = "app_id";

type TableShape = (&'static str, &'static [&'static str], &'static [&'static str]);
type ActionShape = (&'static str, &'static [&'static str]);

const INT_TABLES: &[TableShape] = &[
    (INGRESS_PORT_VLAN, &[HDR_IG_PORT, HDR_VLAN_IS_VALID], &[PERMIT_WITH_INTERNAL_VLAN]),
    (
        FWD_CLASSIFIER,
        &[HDR_IG_PORT, HDR_ETH_DST, HDR_ETH_TYPE, HDR_IP_ETH_TYPE],
        &[SET_FORWARDING_TYPE],
    ),
    (EGRESS_VLAN, &[HDR_VLAN_ID, HDR_EG_PORT], &[KEEP_VLAN]),
    (
        WATCHLIST,
        &[HDR_IPV4_SRC, HDR_IPV4_DST, HDR_IP_PROTO, HDR_L4_SPORT, HDR_L4_DPORT],
        &[MARK_TO_REPORT],
    ),
    (
        DROP_REPORT,
        &[
            HDR_INT_REPORT_TYPE,
            HDR_DROP_CTL,
            HDR_COPY_TO_CPU,
            HDR_EGRESS_PORT_SET,
            HDR_MCAST_GROUP_ID,
        ],
        &[INGRESS_REPORT_DROP],
    ),
    (INT_CONFIG, &[], &[SET_CONFIG]),
    (
        REPORT,
        &[HDR_BMD_TYPE, HDR_MIRROR_TYPE, HDR_INT_REPORT_TYPE],
        &[
            DO_LOCAL_REPORT_ENCAP,
            DO_LOCAL_REPORT_ENCAP_MPLS,
            DO_DROP_REPORT_ENCAP,
            DO_DROP_REPORT_ENCAP_MPLS,
        ],
    ),
    (INT_METADATA, &[HDR_INT_REPORT_TYPE, HDR_DROP_CTL], &[REPORT_LOCAL, EGRESS_REPORT_DROP]),
];

const INT_ACTIONS: &[ActionShape] = &[
    (PERMIT_WITH_INTERNAL_VLAN, &[VLAN_ID]),
    (SET_FORWARDING_TYPE, &[FWD_TYPE]),
    (KEEP_VLAN, &[]),
    (MARK_TO_REPORT, &[]),
    (INGRESS_REPORT_DROP, &[SWITCH_ID]),
    (SET_CONFIG, &[HOP_LATENCY_MASK, TIMESTAMP_MASK]),
    (DO_LOCAL_REPORT_ENCAP, &[SRC_MAC, MON_MAC, SRC_IP, MON_IP, MON_PORT]),
    (DO_LOCAL_REPORT_ENCAP_MPLS, &[SRC_MAC, MON_MAC, SRC_IP, MON_IP, MON_PORT, MON_LABEL]),
    (DO_DROP_REPORT_ENCAP, &[SRC_MAC, MON_MAC, SRC_IP, MON_IP, MON_PORT]),
    (DO_DROP_REPORT_ENCAP_MPLS, &[SRC_MAC, MON_MAC, SRC_IP, MON_IP, MON_PORT, MON_LABEL]),
    (REPORT_LOCAL, &[SWITCH_ID]),
    (EGRESS_REPORT_DROP, &[SWITCH_ID]),
];

const UPF_TABLES: &[TableShape] = &[
    (
        UPF_INTERFACES,
        &[HDR_IPV4_DST_ADDR, HDR_GTPU_IS_VALID],
        &[IFACE_ACCESS, IFACE_CORE, IFACE_DBUF],
    ),
    (UPLINK_SESSIONS, &[HDR_TUNNEL_IPV4_DST, HDR_TEID], &[SET_UPLINK_SESSION]),
    (DOWNLINK_SESSIONS, &[HDR_UE_ADDR], &[SET_DOWNLINK_SESSION, SET_DOWNLINK_SESSION_BUF]),
    (UPLINK_TERMINATIONS, &[HDR_UE_SESSION_ID, HDR_APP_ID], &[APP_FWD, APP_FWD_NO_TC, APP_DROP]),
    (DOWNLINK_TERMINATIONS,
     &[HDR_UE_SESSION_ID, HDR_APP_ID],
     &[DOWNLINK_FWD_ENCAP, DOWNLINK_FWD_ENCAP_NO_TC, APP_DROP]),
    (IG_TUNNEL_PEERS, &[HDR_TUN_PEER_ID], &[SET_ROUTING_IPV4_DST]),
    (EG_TUNNEL_PEERS, &[HDR_TUN_PEER_ID], &[LOAD_TUNNEL_PARAMS]),
    (
        APPLICATIONS,
        &[HDR_SLICE_ID, HDR_APP_IPV4_ADDR, HDR_APP_L4_PORT, HDR_APP_IP_PROTO],
        &[SET_APP_ID],
    ),
];

const UPF_ACTIONS: &[ActionShape] = &[
    (IFACE_ACCESS, &[SLICE_ID]),
    (IFACE_CORE, &[SLICE_ID]),
    (IFACE_DBUF, &[SLICE_ID]),
    (SET_UPLINK_SESSION, &[SESSION_METER_IDX]),
    (SET_DOWNLINK_SESSION, &[TUN_PEER_ID, SESSION_METER_IDX]),
    (SET_DOWNLINK_SESSION_BUF, &[TUN_PEER_ID, SESSION_METER_IDX]),
    (APP_FWD, &[CTR_ID, APP_METER_IDX, TC]),
    (APP_FWD_NO_TC, &[CTR_ID, APP_METER_IDX]),
    (APP_DROP, &[CTR_ID]),
    (DOWNLINK_FWD_ENCAP, &[CTR_ID, APP_METER_IDX, TC, TEID, QFI]),
    (DOWNLINK_FWD_ENCAP_NO_TC, &[CTR_ID, APP_METER_IDX, TEID, QFI]),
    (SET_ROUTING_IPV4_DST, &[TUN_DST_ADDR]),
    (LOAD_TUNNEL_PARAMS, &[TUNNEL_SRC_PORT, TUNNEL_SRC_ADDR, TUNNEL_DST_ADDR]),
    (SET_APP_ID, &[APP_ID]),
];

const UPF_METERS: &[&str] = &[SESSION_METER, APP_METER];

/// Loads the built-in P4Info.
pub fn builtin() -> Result<Switch> {
    Ok(Switch::from_json(BUILTIN_P4INFO)?)
}

fn check_shapes(switch: &Switch, tables: &[TableShape], actions: &[ActionShape]) -> Result<()> {
    for (table_name, fields, action_names) in tables {
        let table = switch.table(table_name)?;
        if let Some(field) = fields.iter().find(|f| table.match_field(f).is_none()) {
            return Err(P4Error::UnknownField {
                table: table.preamble.name.clone(),
                field: (*field).into(),
            }
            .into());
        }
        if let Some(action) = action_names.iter().find(|a| table.action_ref(a).is_none()) {
            return Err(P4Error::ActionNotFound {
                table: Some(table.preamble.name.clone()),
                name: (*action).into(),
                count: 0,
            }
            .into());
        }
    }
    for (action_name, params) in actions {
        let action = switch.action(action_name)?;
        if let Some(param) = params.iter().find(|p| action.param(p).is_none()) {
            return Err(P4Error::MissingParam {
                action: action.preamble.name.clone(),
                param: (*param).into(),
            }
            .into());
        }
    }
    Ok(())
}

/// Fails unless `switch` has every table, action and field the INT
/// compiler and topology installer write.
pub fn check_int(switch: &Switch) -> Result<()> {
    check_shapes(switch, INT_TABLES, INT_ACTIONS)
}

/// Fails unless `switch` has every table, action, field and meter the UPF
/// translator reads and writes.
pub fn check_upf(switch: &Switch) -> Result<()> {
    check_shapes(switch, UPF_TABLES, UPF_ACTIONS)?;
    for meter in UPF_METERS {
        switch.meter(meter)?;
    }
    Ok(())
}

pub fn check(switch: &Switch) -> Result<()> {
    check_int(switch)?;
    check_upf(switch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_schema_is_complete() {
        let switch = builtin().unwrap();
        check(&switch).unwrap();
    }

    #[test]
    fn missing_table_fails() {
        let mut switch = builtin().unwrap();
        switch.tables.retain(|t| t.preamble.name != REPORT);
        assert!(check_int(&switch).is_err());
        assert!(check_upf(&switch).is_ok());
    }
}
