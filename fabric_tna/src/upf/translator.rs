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

//! Bidirectional mapping between UPF entities and fabric table entries.
//!
//! Encoding checks every value against the pipeline schema.  Decoding checks
//! that an entry has the table, action, match fields and parameters of the
//! entity it is decoded into, and fails with
//! [`Error::TranslationMismatch`] naming the first thing that differs.
//! For every entity `e` that encodes successfully, decoding the result
//! yields `e` again.

use itertools::Itertools;

use p4ext::{Match, MeterConfig, MeterEntry, Switch, TableEntry};

use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::context::{AppId, DeviceId};
use crate::entry::{DeviceEntry, MeterProgram};
use crate::error::{Error, Result, SchemaElement};
use crate::net::{self, Ipv4Net};
use crate::schema::*;
use crate::upf::{
    DownlinkTreatment,
    InterfaceKind,
    MeterBand,
    MeterKind,
    UpfApplication,
    UpfGtpTunnelPeer,
    UpfInterface,
    UpfMeter,
    UpfSessionDownlink,
    UpfSessionUplink,
    UpfTerminationDownlink,
    UpfTerminationUplink,
    UplinkTreatment,
};

fn expect_table(entry: &TableEntry, table: &str) -> Result<()> {
    if entry.table != table {
        return Err(Error::mismatch(SchemaElement::Table, table, &entry.table));
    }
    Ok(())
}

/// Returns whichever of `actions` the entry invokes.
fn expect_action(entry: &TableEntry, actions: &[&'static str]) -> Result<&'static str> {
    actions
        .iter()
        .copied()
        .find(|a| entry.action.name == *a)
        .ok_or_else(|| {
            Error::mismatch(SchemaElement::Action, actions.iter().join(" or "), &entry.action.name)
        })
}

fn param<T: TryFrom<u64>>(entry: &TableEntry, name: &str) -> Result<T> {
    let value = entry
        .action
        .param(name)
        .ok_or_else(|| Error::mismatch(SchemaElement::Param, name, "nothing"))?;
    T::try_from(value)
        .map_err(|_| Error::mismatch(SchemaElement::Param, format!("{} in range", name), value))
}

fn exact<T: TryFrom<u64>>(entry: &TableEntry, field: &str) -> Result<T> {
    let value = entry.field(field).and_then(|m| m.exact()).ok_or_else(|| {
        Error::mismatch(SchemaElement::MatchField, format!("exact match on {}", field), "none")
    })?;
    T::try_from(value).map_err(|_| {
        Error::mismatch(SchemaElement::MatchField, format!("{} in range", field), value)
    })
}

fn exact_ipv4(entry: &TableEntry, field: &str) -> Result<Ipv4Addr> {
    ipv4(exact(entry, field)?, SchemaElement::MatchField, field)
}

fn ipv4(value: u64, element: SchemaElement, name: &str) -> Result<Ipv4Addr> {
    u32::try_from(value)
        .map(Ipv4Addr::from)
        .map_err(|_| Error::mismatch(element, format!("IPv4 address in {}", name), value))
}

fn band(rate: u64, burst: u64) -> Option<MeterBand> {
    if rate == 0 && burst == 0 {
        None
    } else {
        Some(MeterBand { rate, burst })
    }
}

fn band_values(band: Option<MeterBand>) -> Result<(u64, u64)> {
    match band {
        None => Ok((0, 0)),
        Some(MeterBand { rate: 0, burst: 0 }) => {
            Err(Error::InvalidArgument("meter band with zero rate and burst".into()))
        }
        Some(MeterBand { rate, burst }) => Ok((rate, burst)),
    }
}

/// Translates UPF entities to and from fabric table entries and meter
/// programs.  Holds nothing but the pipeline schema.
pub struct UpfTranslator {
    schema: Arc<Switch>,
}

impl UpfTranslator {
    /// Fails if `schema` lacks any UPF table, action, field or meter.
    pub fn new(schema: Arc<Switch>) -> Result<Self> {
        check_upf(&schema)?;
        Ok(UpfTranslator { schema })
    }

    #[allow(clippy::too_many_arguments)]
    fn device_entry(
        &self,
        device_id: &DeviceId,
        app_id: &AppId,
        table: &str,
        action: &str,
        params: &[(&str, u64)],
        matches: &[(&str, Match)],
        priority: i32,
    ) -> Result<DeviceEntry> {
        let entry = self.schema.build_table_entry(table, action, params, matches, priority)?;
        Ok(DeviceEntry::new(device_id, app_id, entry))
    }

    pub fn entry_to_interface(&self, entry: &TableEntry) -> Result<UpfInterface> {
        expect_table(entry, UPF_INTERFACES)?;
        let kind = match expect_action(entry, &[IFACE_ACCESS, IFACE_CORE, IFACE_DBUF])? {
            IFACE_ACCESS => InterfaceKind::Access,
            IFACE_CORE => InterfaceKind::Core,
            _ => InterfaceKind::Dbuf,
        };
        let lpm = entry.field(HDR_IPV4_DST_ADDR).and_then(|m| m.lpm());
        let (addr, prefix_len) = lpm.ok_or_else(|| {
            let expected = format!("LPM match on {}", HDR_IPV4_DST_ADDR);
            Error::mismatch(SchemaElement::MatchField, expected, "none")
        })?;
        let addr = ipv4(addr, SchemaElement::MatchField, HDR_IPV4_DST_ADDR)?;
        let prefix = u8::try_from(prefix_len)
            .ok()
            .and_then(|len| Ipv4Net::new(addr, len).ok())
            .map(|prefix| prefix.trunc())
            .ok_or_else(|| {
                Error::mismatch(SchemaElement::MatchField, "prefix length", prefix_len)
            })?;
        Ok(UpfInterface { prefix, kind, slice_id: param(entry, SLICE_ID)? })
    }

    pub fn interface_to_entry(
        &self,
        iface: &UpfInterface,
        device_id: &DeviceId,
        app_id: &AppId,
        priority: i32,
    ) -> Result<DeviceEntry> {
        let (action, gtpu_is_valid) = match iface.kind {
            InterfaceKind::Access => (IFACE_ACCESS, 1),
            InterfaceKind::Core => (IFACE_CORE, 0),
            InterfaceKind::Dbuf => (IFACE_DBUF, 1),
        };
        let network = u32::from(iface.prefix.network()).into();
        self.device_entry(
            device_id,
            app_id,
            UPF_INTERFACES,
            action,
            &[(SLICE_ID, iface.slice_id.into())],
            &[
                (HDR_IPV4_DST_ADDR, Match::Lpm(network, iface.prefix.prefix_len().into())),
                (HDR_GTPU_IS_VALID, Match::Exact(gtpu_is_valid)),
            ],
            priority,
        )
    }

    /// Decodes a tunnel peer from its egress entry, the one that carries
    /// every tunnel parameter.
    pub fn entry_to_gtp_tunnel_peer(&self, entry: &TableEntry) -> Result<UpfGtpTunnelPeer> {
        expect_table(entry, EG_TUNNEL_PEERS)?;
        expect_action(entry, &[LOAD_TUNNEL_PARAMS])?;
        Ok(UpfGtpTunnelPeer {
            tun_peer_id: exact(entry, HDR_TUN_PEER_ID)?,
            src_addr: ipv4(param(entry, TUNNEL_SRC_ADDR)?, SchemaElement::Param, TUNNEL_SRC_ADDR)?,
            dst_addr: ipv4(param(entry, TUNNEL_DST_ADDR)?, SchemaElement::Param, TUNNEL_DST_ADDR)?,
            src_port: param(entry, TUNNEL_SRC_PORT)?,
        })
    }

    /// Encodes a tunnel peer as its (ingress, egress) entry pair: ingress
    /// routes toward the peer, egress fills in the GTP-U outer headers.
    pub fn gtp_tunnel_peer_to_entries(
        &self,
        peer: &UpfGtpTunnelPeer,
        device_id: &DeviceId,
        app_id: &AppId,
        priority: i32,
    ) -> Result<(DeviceEntry, DeviceEntry)> {
        let key = [(HDR_TUN_PEER_ID, Match::Exact(peer.tun_peer_id.into()))];
        let ingress = self.device_entry(
            device_id,
            app_id,
            IG_TUNNEL_PEERS,
            SET_ROUTING_IPV4_DST,
            &[(TUN_DST_ADDR, u32::from(peer.dst_addr).into())],
            &key,
            priority,
        )?;
        let egress = self.device_entry(
            device_id,
            app_id,
            EG_TUNNEL_PEERS,
            LOAD_TUNNEL_PARAMS,
            &[
                (TUNNEL_SRC_PORT, peer.src_port.into()),
                (TUNNEL_SRC_ADDR, u32::from(peer.src_addr).into()),
                (TUNNEL_DST_ADDR, u32::from(peer.dst_addr).into()),
            ],
            &key,
            priority,
        )?;
        Ok((ingress, egress))
    }

    pub fn entry_to_session_uplink(&self, entry: &TableEntry) -> Result<UpfSessionUplink> {
        expect_table(entry, UPLINK_SESSIONS)?;
        expect_action(entry, &[SET_UPLINK_SESSION])?;
        Ok(UpfSessionUplink {
            tun_dst_addr: exact_ipv4(entry, HDR_TUNNEL_IPV4_DST)?,
            teid: exact(entry, HDR_TEID)?,
            session_meter_idx: param(entry, SESSION_METER_IDX)?,
        })
    }

    pub fn session_uplink_to_entry(
        &self,
        session: &UpfSessionUplink,
        device_id: &DeviceId,
        app_id: &AppId,
        priority: i32,
    ) -> Result<DeviceEntry> {
        self.device_entry(
            device_id,
            app_id,
            UPLINK_SESSIONS,
            SET_UPLINK_SESSION,
            &[(SESSION_METER_IDX, session.session_meter_idx.into())],
            &[
                (HDR_TUNNEL_IPV4_DST, Match::Exact(u32::from(session.tun_dst_addr).into())),
                (HDR_TEID, Match::Exact(session.teid.into())),
            ],
            priority,
        )
    }

    pub fn entry_to_session_downlink(&self, entry: &TableEntry) -> Result<UpfSessionDownlink> {
        expect_table(entry, DOWNLINK_SESSIONS)?;
        let action = expect_action(entry, &[SET_DOWNLINK_SESSION, SET_DOWNLINK_SESSION_BUF])?;
        Ok(UpfSessionDownlink {
            ue_address: ipv4(exact(entry, HDR_UE_ADDR)?, SchemaElement::MatchField, HDR_UE_ADDR)?,
            tun_peer_id: param(entry, TUN_PEER_ID)?,
            session_meter_idx: param(entry, SESSION_METER_IDX)?,
            buffering: action == SET_DOWNLINK_SESSION_BUF,
        })
    }

    pub fn session_downlink_to_entry(
        &self,
        session: &UpfSessionDownlink,
        device_id: &DeviceId,
        app_id: &AppId,
        priority: i32,
    ) -> Result<DeviceEntry> {
        let action =
            if session.buffering { SET_DOWNLINK_SESSION_BUF } else { SET_DOWNLINK_SESSION };
        self.device_entry(
            device_id,
            app_id,
            DOWNLINK_SESSIONS,
            action,
            &[
                (TUN_PEER_ID, session.tun_peer_id.into()),
                (SESSION_METER_IDX, session.session_meter_idx.into()),
            ],
            &[(HDR_UE_ADDR, Match::Exact(u32::from(session.ue_address).into()))],
            priority,
        )
    }

    pub fn entry_to_termination_uplink(&self, entry: &TableEntry) -> Result<UpfTerminationUplink> {
        expect_table(entry, UPLINK_TERMINATIONS)?;
        let treatment = match expect_action(entry, &[APP_FWD, APP_FWD_NO_TC, APP_DROP])? {
            APP_DROP => UplinkTreatment::Drop,
            action => UplinkTreatment::Forward {
                traffic_class: if action == APP_FWD { Some(param(entry, TC)?) } else { None },
                app_meter_idx: param(entry, APP_METER_IDX)?,
            },
        };
        Ok(UpfTerminationUplink {
            ue_session_id: exact_ipv4(entry, HDR_UE_SESSION_ID)?,
            application_id: exact(entry, HDR_APP_ID)?,
            ctr_id: param(entry, CTR_ID)?,
            treatment,
        })
    }

    pub fn termination_uplink_to_entry(
        &self,
        termination: &UpfTerminationUplink,
        device_id: &DeviceId,
        app_id: &AppId,
        priority: i32,
    ) -> Result<DeviceEntry> {
        let ctr_id = (CTR_ID, u64::from(termination.ctr_id));
        let (action, params) = match termination.treatment {
            UplinkTreatment::Drop => (APP_DROP, vec![ctr_id]),
            UplinkTreatment::Forward { traffic_class: Some(tc), app_meter_idx } => {
                (APP_FWD, vec![ctr_id, (APP_METER_IDX, app_meter_idx.into()), (TC, tc.into())])
            }
            UplinkTreatment::Forward { traffic_class: None, app_meter_idx } => {
                (APP_FWD_NO_TC, vec![ctr_id, (APP_METER_IDX, app_meter_idx.into())])
            }
        };
        self.device_entry(
            device_id,
            app_id,
            UPLINK_TERMINATIONS,
            action,
            &params,
            &[
                (HDR_UE_SESSION_ID, Match::Exact(u32::from(termination.ue_session_id).into())),
                (HDR_APP_ID, Match::Exact(termination.application_id.into())),
            ],
            priority,
        )
    }

    pub fn entry_to_termination_downlink(
        &self,
        entry: &TableEntry,
    ) -> Result<UpfTerminationDownlink> {
        expect_table(entry, DOWNLINK_TERMINATIONS)?;
        let actions = [DOWNLINK_FWD_ENCAP, DOWNLINK_FWD_ENCAP_NO_TC, APP_DROP];
        let treatment = match expect_action(entry, &actions)? {
            APP_DROP => DownlinkTreatment::Drop,
            action => DownlinkTreatment::Forward {
                traffic_class: if action == DOWNLINK_FWD_ENCAP {
                    Some(param(entry, TC)?)
                } else {
                    None
                },
                app_meter_idx: param(entry, APP_METER_IDX)?,
                teid: param(entry, TEID)?,
                qfi: param(entry, QFI)?,
            },
        };
        Ok(UpfTerminationDownlink {
            ue_session_id: exact_ipv4(entry, HDR_UE_SESSION_ID)?,
            application_id: exact(entry, HDR_APP_ID)?,
            ctr_id: param(entry, CTR_ID)?,
            treatment,
        })
    }

    pub fn termination_downlink_to_entry(
        &self,
        termination: &UpfTerminationDownlink,
        device_id: &DeviceId,
        app_id: &AppId,
        priority: i32,
    ) -> Result<DeviceEntry> {
        let ctr_id = (CTR_ID, u64::from(termination.ctr_id));
        let (action, params) = match termination.treatment {
            DownlinkTreatment::Drop => (APP_DROP, vec![ctr_id]),
            DownlinkTreatment::Forward { traffic_class, app_meter_idx, teid, qfi } => {
                let mut params = vec![
                    ctr_id,
                    (APP_METER_IDX, app_meter_idx.into()),
                    (TEID, teid.into()),
                    (QFI, qfi.into()),
                ];
                match traffic_class {
                    Some(tc) => {
                        params.push((TC, tc.into()));
                        (DOWNLINK_FWD_ENCAP, params)
                    }
                    None => (DOWNLINK_FWD_ENCAP_NO_TC, params),
                }
            }
        };
        self.device_entry(
            device_id,
            app_id,
            DOWNLINK_TERMINATIONS,
            action,
            &params,
            &[
                (HDR_UE_SESSION_ID, Match::Exact(u32::from(termination.ue_session_id).into())),
                (HDR_APP_ID, Match::Exact(termination.application_id.into())),
            ],
            priority,
        )
    }

    /// Decodes an application filter.  Its priority is the entry's.
    pub fn entry_to_application(&self, entry: &TableEntry) -> Result<UpfApplication> {
        expect_table(entry, APPLICATIONS)?;
        expect_action(entry, &[SET_APP_ID])?;

        let ip_prefix = match entry.field(HDR_APP_IPV4_ADDR) {
            None => None,
            Some(m) => {
                let prefix = m.ternary().and_then(|(value, mask)| {
                    net::prefix_from_mask(value.try_into().ok()?, mask.try_into().ok()?)
                });
                Some(prefix.ok_or_else(|| {
                    let expected = format!("IPv4 prefix on {}", HDR_APP_IPV4_ADDR);
                    Error::mismatch(SchemaElement::MatchField, expected, m)
                })?)
            }
        };
        let l4_port_range = match entry.field(HDR_APP_L4_PORT) {
            None => None,
            Some(m) => {
                let range = m.range().and_then(|(low, high)| {
                    Some(u16::try_from(low).ok()?..=u16::try_from(high).ok()?)
                });
                Some(range.ok_or_else(|| {
                    let expected = format!("port range on {}", HDR_APP_L4_PORT);
                    Error::mismatch(SchemaElement::MatchField, expected, m)
                })?)
            }
        };
        let ip_proto = match entry.field(HDR_APP_IP_PROTO) {
            None => None,
            Some(m) => {
                let proto = match m.ternary() {
                    Some((proto, 0xff)) => u8::try_from(proto).ok(),
                    _ => None,
                };
                Some(proto.ok_or_else(|| {
                    let expected = format!("exact protocol on {}", HDR_APP_IP_PROTO);
                    Error::mismatch(SchemaElement::MatchField, expected, m)
                })?)
            }
        };

        Ok(UpfApplication {
            app_id: param(entry, APP_ID)?,
            slice_id: exact(entry, HDR_SLICE_ID)?,
            ip_prefix,
            l4_port_range,
            ip_proto,
            priority: entry.priority,
        })
    }

    pub fn application_to_entry(
        &self,
        application: &UpfApplication,
        device_id: &DeviceId,
        app_id: &AppId,
    ) -> Result<DeviceEntry> {
        let mut matches = vec![(HDR_SLICE_ID, Match::Exact(application.slice_id.into()))];
        if let Some(prefix) = application.ip_prefix {
            let (value, mask) = net::prefix_to_ternary(prefix);
            matches.push((HDR_APP_IPV4_ADDR, Match::Ternary(value, mask)));
        }
        if let Some(range) = &application.l4_port_range {
            let (low, high) = ((*range.start()).into(), (*range.end()).into());
            matches.push((HDR_APP_L4_PORT, Match::Range(low, high)));
        }
        if let Some(proto) = application.ip_proto {
            matches.push((HDR_APP_IP_PROTO, Match::Ternary(proto.into(), 0xff)));
        }
        self.device_entry(
            device_id,
            app_id,
            APPLICATIONS,
            SET_APP_ID,
            &[(APP_ID, application.app_id.into())],
            &matches,
            application.priority,
        )
    }

    fn meter_name(kind: MeterKind) -> &'static str {
        match kind {
            MeterKind::Session => SESSION_METER,
            MeterKind::Application => APP_METER,
        }
    }

    /// Decodes a meter cell of the `kind` meter.  A cell with no config is
    /// a reset meter.
    pub fn meter_entry_to_meter(&self, kind: MeterKind, entry: &MeterEntry) -> Result<UpfMeter> {
        let name = Self::meter_name(kind);
        if entry.meter != name {
            return Err(Error::mismatch(SchemaElement::Meter, name, &entry.meter));
        }
        let meter = match entry.config {
            None => UpfMeter::reset(kind, entry.index),
            Some(MeterConfig { cir, cburst, pir, pburst }) => UpfMeter {
                kind,
                cell_id: entry.index,
                committed: band(cir, cburst),
                peak: band(pir, pburst),
            },
        };
        if kind == MeterKind::Session && meter.committed.is_some() {
            let expected = "session meter without committed band";
            return Err(Error::mismatch(SchemaElement::Meter, expected, &entry));
        }
        Ok(meter)
    }

    /// Encodes `meter` as a program for its meter cell.  A reset meter
    /// programs no config, which is not the same as programming zero
    /// bands.
    pub fn meter_to_program(
        &self,
        meter: &UpfMeter,
        device_id: &DeviceId,
        app_id: &AppId,
    ) -> Result<MeterProgram> {
        if meter.kind == MeterKind::Session && meter.committed.is_some() {
            return Err(Error::InvalidArgument("session meters have no committed band".into()));
        }
        let config = if meter.is_reset() {
            None
        } else {
            let (cir, cburst) = band_values(meter.committed)?;
            let (pir, pburst) = band_values(meter.peak)?;
            Some(MeterConfig { cir, cburst, pir, pburst })
        };
        let entry =
            self.schema.build_meter_entry(Self::meter_name(meter.kind), meter.cell_id, config)?;
        Ok(MeterProgram { device_id: device_id.clone(), app_id: app_id.clone(), entry })
    }
}
