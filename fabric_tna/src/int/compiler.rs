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

//! Compiles INT objectives and the device's INT configuration into
//! watchlist, report, metadata, drop-report and quantization entries.

use p4ext::{Match, Switch, TableEntry};

use serde::Deserialize;

use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::context::{AppId, DeviceContext, DeviceRole, ResolvedSrConfig};
use crate::entry::{DeviceEntry, Write};
use crate::error::{Error, Result};
use crate::int::topology::TopologyInstaller;
use crate::int::{
    hop_latency_mask,
    BMD_TYPE_EGRESS_MIRROR,
    BMD_TYPE_INGRESS_MIRROR,
    DEFAULT_PRIORITY,
    DEFAULT_TIMESTAMP_MASK,
    INT_REPORT_TYPE_DROP,
    INT_REPORT_TYPE_LOCAL,
    IP_PROTO_TCP,
    IP_PROTO_UDP,
    MIRROR_TYPE_INT_REPORT,
};
use crate::net::{self, Ipv4Net, MacAddress};
use crate::schema::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntFunctionality {
    Source,
    Transit,
    Sink,
    Postcard,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntMetadataType {
    SwitchId,
    L1PortId,
    HopLatency,
    QueueOccupancy,
    IngressTimestamp,
    EgressTimestamp,
    L2PortId,
    EgressTxUtil,
}

/// One match criterion of an INT objective's selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Criterion {
    Ipv4Src(Ipv4Net),
    Ipv4Dst(Ipv4Net),
    TcpSrc(u16),
    TcpDst(u16),
    UdpSrc(u16),
    UdpDst(u16),
    IpProto(u8),
    EthType(u16),
    VlanId(u16),
    InPort(u32),
}

/// A flow to report on.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct IntObjective {
    pub selector: Vec<Criterion>,
    pub metadata_types: BTreeSet<IntMetadataType>,
}

/// Per-device INT configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct IntDeviceConfig {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub collector_ip: Ipv4Addr,
    pub collector_port: u16,
    #[serde(default)]
    pub sink_ip: Option<Ipv4Addr>,
    #[serde(default)]
    pub sink_mac: Option<MacAddress>,
    #[serde(default)]
    pub collector_next_hop_mac: Option<MacAddress>,
    #[serde(default)]
    pub min_flow_hop_latency_change_ns: i64,
}

fn enabled_by_default() -> bool {
    true
}

/// The INT table families, each with the actions this module writes.
/// `cleanup` removes exactly the entries that match one of these.
const INT_ENTRY_FAMILIES: &[(&str, &[&str])] = &[
    (WATCHLIST, &[MARK_TO_REPORT]),
    (
        REPORT,
        &[
            DO_LOCAL_REPORT_ENCAP,
            DO_LOCAL_REPORT_ENCAP_MPLS,
            DO_DROP_REPORT_ENCAP,
            DO_DROP_REPORT_ENCAP_MPLS,
        ],
    ),
    (INT_METADATA, &[REPORT_LOCAL, EGRESS_REPORT_DROP]),
    (DROP_REPORT, &[INGRESS_REPORT_DROP]),
    (INT_CONFIG, &[SET_CONFIG]),
];

fn is_int_entry(entry: &TableEntry) -> bool {
    INT_ENTRY_FAMILIES.iter().any(|(table, actions)| {
        entry.table == *table && actions.contains(&entry.action.name.as_str())
    })
}

/// Report entries are keyed by these (bridged metadata type, report type)
/// pairs, in this order.
const REPORT_KEYS: [(u64, u64); 4] = [
    (BMD_TYPE_EGRESS_MIRROR, INT_REPORT_TYPE_LOCAL),
    (BMD_TYPE_EGRESS_MIRROR, INT_REPORT_TYPE_DROP),
    (BMD_TYPE_INGRESS_MIRROR, INT_REPORT_TYPE_LOCAL),
    (BMD_TYPE_INGRESS_MIRROR, INT_REPORT_TYPE_DROP),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum L4Protocol {
    Tcp,
    Udp,
}

impl L4Protocol {
    fn ip_proto(self) -> u8 {
        match self {
            L4Protocol::Tcp => IP_PROTO_TCP,
            L4Protocol::Udp => IP_PROTO_UDP,
        }
    }
}

/// INT for one device.  Only postcard mode is implemented: matching
/// packets are mirrored and reported, never modified.
pub struct IntProgrammable {
    ctx: DeviceContext,
    schema: Arc<Switch>,
    installer: TopologyInstaller,
}

impl IntProgrammable {
    /// Fails if `schema` lacks anything this module writes or if the
    /// device's pipe count has no topology.
    pub fn new(ctx: DeviceContext, schema: Arc<Switch>) -> Result<Self> {
        let installer = TopologyInstaller::new(ctx.clone(), schema.clone())?;
        Ok(IntProgrammable { ctx, schema, installer })
    }

    /// Installs the mirror topology.  See [`TopologyInstaller::install`],
    /// including its caveat about calling this more than once.
    pub fn init(&self) -> bool {
        self.installer.install()
    }

    /// Starts reporting on packets that match `objective`.
    pub fn add_int_objective(&self, objective: &IntObjective) -> bool {
        self.log_failure("add INT objective", self.try_add_int_objective(objective))
    }

    /// Stops reporting on `objective`.  The watchlist entry to remove is
    /// rebuilt from the objective the same way `add_int_objective` builds it.
    pub fn remove_int_objective(&self, objective: &IntObjective) -> bool {
        self.log_failure("remove INT objective", self.try_remove_int_objective(objective))
    }

    /// Installs the report, metadata, drop-report and quantization entries
    /// for `config`.  Everything is resolved and built before the first
    /// write, so on failure the device is left as it was.
    pub fn setup_int_config(&self, config: &IntDeviceConfig) -> bool {
        self.log_failure("set up INT config", self.try_setup_int_config(config))
    }

    /// Removes every INT entry from the device, leaving entries of other
    /// tables alone.
    pub fn cleanup(&self) {
        self.log_failure("clean up INT entries", self.try_cleanup());
    }

    /// Postcard mode has no INT source ports, so there is nothing to do.
    pub fn set_source_port(&self, _port: u32) -> bool {
        true
    }

    /// Postcard mode has no INT sink ports, so there is nothing to do.
    pub fn set_sink_port(&self, _port: u32) -> bool {
        true
    }

    pub fn supports_functionality(&self, functionality: IntFunctionality) -> bool {
        functionality == IntFunctionality::Postcard
    }

    fn log_failure(&self, what: &str, result: Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("{}: failed to {} ({})", self.ctx.device_id, what, e);
                false
            }
        }
    }

    /// Everything but cleanup needs both the owning app and the device's
    /// segment-routing config.
    fn setup_behaviour(&self) -> Result<(AppId, ResolvedSrConfig)> {
        let app_id = self.ctx.app_id()?;
        let sr_config = self.ctx.sr_config(&self.ctx.device_id)?;
        Ok((app_id, sr_config))
    }

    fn entry(&self, app_id: &AppId, entry: TableEntry) -> Write {
        Write::Entry(DeviceEntry::new(&self.ctx.device_id, app_id, entry))
    }

    fn try_add_int_objective(&self, objective: &IntObjective) -> Result<()> {
        let (app_id, _) = self.setup_behaviour()?;
        let watchlist = self.watchlist_entry(objective)?;
        self.ctx.backend.apply(vec![self.entry(&app_id, watchlist)]);
        Ok(())
    }

    fn try_remove_int_objective(&self, objective: &IntObjective) -> Result<()> {
        let (app_id, _) = self.setup_behaviour()?;
        let watchlist = self.watchlist_entry(objective)?;
        self.ctx.backend.remove(vec![self.entry(&app_id, watchlist)]);
        Ok(())
    }

    /// Builds the watchlist entry for `objective`.  L4 ports must agree
    /// with the IP protocol, when the selector states one.
    fn watchlist_entry(&self, objective: &IntObjective) -> Result<TableEntry> {
        if objective.metadata_types.is_empty() {
            return Err(Error::InvalidArgument("INT objective requests no metadata".into()));
        }

        let mut matches: Vec<(&str, Match)> = Vec::new();
        let mut ports_of = None;
        let mut ip_proto = None;
        for criterion in &objective.selector {
            use Criterion::*;
            let (field, m, l4) = match *criterion {
                Ipv4Src(prefix) => (HDR_IPV4_SRC, prefix_match(prefix), None),
                Ipv4Dst(prefix) => (HDR_IPV4_DST, prefix_match(prefix), None),
                IpProto(proto) => {
                    ip_proto = Some(proto);
                    (HDR_IP_PROTO, Match::Ternary(proto.into(), 0xff), None)
                }
                TcpSrc(port) => (HDR_L4_SPORT, port_match(port), Some(L4Protocol::Tcp)),
                TcpDst(port) => (HDR_L4_DPORT, port_match(port), Some(L4Protocol::Tcp)),
                UdpSrc(port) => (HDR_L4_SPORT, port_match(port), Some(L4Protocol::Udp)),
                UdpDst(port) => (HDR_L4_DPORT, port_match(port), Some(L4Protocol::Udp)),
                other => return Err(Error::UnsupportedCriteria(format!("{:?}", other))),
            };
            if let Some(l4) = l4 {
                if ports_of.replace(l4).map_or(false, |p| p != l4) {
                    return Err(Error::UnsupportedCriteria("both TCP and UDP ports".into()));
                }
            }
            if matches.iter().any(|(f, _)| *f == field) {
                return Err(Error::UnsupportedCriteria(format!("{} matched twice", field)));
            }
            matches.push((field, m));
        }
        if let (Some(l4), Some(proto)) = (ports_of, ip_proto) {
            if l4.ip_proto() != proto {
                return Err(Error::UnsupportedCriteria(format!(
                    "{:?} ports with IP protocol {}",
                    l4, proto
                )));
            }
        }

        Ok(self
            .schema
            .build_table_entry(WATCHLIST, MARK_TO_REPORT, &[], &matches, DEFAULT_PRIORITY)?)
    }

    fn try_setup_int_config(&self, config: &IntDeviceConfig) -> Result<()> {
        let device_id = &self.ctx.device_id;
        let (app_id, sr_config) = self.setup_behaviour()?;
        if !config.enabled {
            debug!("{}: INT config is disabled, installing it anyway", device_id);
        }

        // A spine reaches the collector through the leaf it is attached to,
        // so its reports carry that leaf's node SID as MPLS label.
        let mon_label = match sr_config.role {
            DeviceRole::Leaf => None,
            DeviceRole::Spine => Some(self.collector_leaf_sid(config.collector_ip)?),
        };

        let mut writes = vec![self.entry(&app_id, self.config_entry(config)?)];
        for (bmd_type, report_type) in REPORT_KEYS {
            let report = self.report_entry(config, &sr_config, mon_label, bmd_type, report_type)?;
            writes.push(self.entry(&app_id, report));
        }
        for entry in self.int_metadata_entries(sr_config.node_sid)? {
            writes.push(self.entry(&app_id, entry));
        }
        for entry in self.drop_report_entries(sr_config.node_sid)? {
            writes.push(self.entry(&app_id, entry));
        }
        writes.extend(self.installer.fwd_classifier_writes(&app_id, sr_config.router_mac)?);

        debug!("{}: installing {} INT config writes", device_id, writes.len());
        self.ctx.backend.apply(writes);
        info!(
            "{}: INT config installed, reporting to {}:{}",
            device_id, config.collector_ip, config.collector_port
        );
        Ok(())
    }

    /// Returns the node SID of the leaf the collector is attached to.
    fn collector_leaf_sid(&self, collector_ip: Ipv4Addr) -> Result<u32> {
        let hosts = self.ctx.hosts.hosts_with_ip(collector_ip);
        let host = hosts.first().ok_or_else(|| {
            Error::ConfigurationMissing(format!("no host with collector IP {}", collector_ip))
        })?;
        let location = host.location.as_ref().ok_or_else(|| {
            Error::ConfigurationMissing(format!("collector {} has no known location", collector_ip))
        })?;
        Ok(self.ctx.sr_config(&location.device_id)?.node_sid)
    }

    fn config_entry(&self, config: &IntDeviceConfig) -> Result<TableEntry> {
        let hop_latency_mask = hop_latency_mask(config.min_flow_hop_latency_change_ns)?;
        Ok(self.schema.build_table_entry(
            INT_CONFIG,
            SET_CONFIG,
            &[
                (HOP_LATENCY_MASK, hop_latency_mask.into()),
                (TIMESTAMP_MASK, DEFAULT_TIMESTAMP_MASK),
            ],
            &[],
            DEFAULT_PRIORITY,
        )?)
    }

    fn report_entry(
        &self,
        config: &IntDeviceConfig,
        sr_config: &ResolvedSrConfig,
        mon_label: Option<u32>,
        bmd_type: u64,
        report_type: u64,
    ) -> Result<TableEntry> {
        let action = match (report_type == INT_REPORT_TYPE_LOCAL, mon_label.is_some()) {
            (true, false) => DO_LOCAL_REPORT_ENCAP,
            (true, true) => DO_LOCAL_REPORT_ENCAP_MPLS,
            (false, false) => DO_DROP_REPORT_ENCAP,
            (false, true) => DO_DROP_REPORT_ENCAP_MPLS,
        };
        let mut params = vec![
            (SRC_MAC, net::mac_to_u64(MacAddress::new([0; 6]))),
            (MON_MAC, net::mac_to_u64(sr_config.router_mac)),
            (SRC_IP, u32::from(sr_config.router_ip).into()),
            (MON_IP, u32::from(config.collector_ip).into()),
            (MON_PORT, config.collector_port.into()),
        ];
        if let Some(mon_label) = mon_label {
            params.push((MON_LABEL, mon_label.into()));
        }
        Ok(self.schema.build_table_entry(
            REPORT,
            action,
            &params,
            &[
                (HDR_BMD_TYPE, Match::Exact(bmd_type)),
                (HDR_MIRROR_TYPE, Match::Exact(MIRROR_TYPE_INT_REPORT)),
                (HDR_INT_REPORT_TYPE, Match::Exact(report_type)),
            ],
            DEFAULT_PRIORITY,
        )?)
    }

    /// Mirror-select entries: packets that were dropped get a drop report,
    /// all others a local report.
    fn int_metadata_entries(&self, switch_id: u32) -> Result<[TableEntry; 2]> {
        let switch_id = [(SWITCH_ID, u64::from(switch_id))];
        let metadata = |action, drop_ctl| {
            self.schema.build_table_entry(
                INT_METADATA,
                action,
                &switch_id,
                &[
                    (HDR_INT_REPORT_TYPE, Match::Exact(INT_REPORT_TYPE_LOCAL)),
                    (HDR_DROP_CTL, Match::Exact(drop_ctl)),
                ],
                DEFAULT_PRIORITY,
            )
        };
        Ok([metadata(REPORT_LOCAL, 0)?, metadata(EGRESS_REPORT_DROP, 1)?])
    }

    /// Ingress drop reports: one for packets dropped outright, one for
    /// packets that ended up with neither an egress port nor a multicast
    /// group.  Packets sent to the CPU are not reported.
    fn drop_report_entries(&self, switch_id: u32) -> Result<[TableEntry; 2]> {
        let switch_id = [(SWITCH_ID, u64::from(switch_id))];
        let dropped = self.schema.build_table_entry(
            DROP_REPORT,
            INGRESS_REPORT_DROP,
            &switch_id,
            &[
                (HDR_INT_REPORT_TYPE, Match::Exact(INT_REPORT_TYPE_LOCAL)),
                (HDR_DROP_CTL, Match::Exact(1)),
                (HDR_COPY_TO_CPU, Match::Exact(0)),
            ],
            DEFAULT_PRIORITY,
        )?;
        let unforwarded = self.schema.build_table_entry(
            DROP_REPORT,
            INGRESS_REPORT_DROP,
            &switch_id,
            &[
                (HDR_INT_REPORT_TYPE, Match::Exact(INT_REPORT_TYPE_LOCAL)),
                (HDR_DROP_CTL, Match::Exact(0)),
                (HDR_COPY_TO_CPU, Match::Exact(0)),
                (HDR_EGRESS_PORT_SET, Match::Ternary(0, 1)),
                (HDR_MCAST_GROUP_ID, Match::Ternary(0, 1)),
            ],
            DEFAULT_PRIORITY,
        )?;
        Ok([dropped, unforwarded])
    }

    fn try_cleanup(&self) -> Result<()> {
        self.ctx.app_id()?;
        let int_entries: Vec<Write> = self
            .ctx
            .backend
            .current_entries(&self.ctx.device_id)
            .into_iter()
            .filter(|e| is_int_entry(&e.entry))
            .map(Write::Entry)
            .collect();
        debug!("{}: removing {} INT entries", self.ctx.device_id, int_entries.len());
        if !int_entries.is_empty() {
            self.ctx.backend.remove(int_entries);
        }
        Ok(())
    }
}

fn prefix_match(prefix: Ipv4Net) -> Match {
    let (value, mask) = net::prefix_to_ternary(prefix);
    Match::Ternary(value, mask)
}

fn port_match(port: u16) -> Match {
    Match::Range(port.into(), port.into())
}
