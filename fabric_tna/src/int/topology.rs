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

//! Mirror sessions and the entries that let recirculated report packets
//! re-enter the pipeline.

use p4ext::{Match, Switch};

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::context::{AppId, DeviceContext, FabricCapabilities};
use crate::entry::{DeviceEntry, GroupDescription, Write};
use crate::error::{Error, Result};
use crate::int::{
    DEFAULT_PRIORITY,
    DEFAULT_VLAN,
    ETH_TYPE_IPV4,
    ETH_TYPE_MPLS_UNICAST,
    FWD_TYPE_IPV4_ROUTING,
    FWD_TYPE_MPLS,
    MPLS_CLASSIFIER_PRIORITY_OFFSET,
};
use crate::net::{self, MacAddress};
use crate::schema::*;

/// A mirror session and the recirculation port of the pipe it serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MirrorSession {
    pub session_id: u32,
    pub recirc_port: u32,
}

/// INT report mirror sessions, one per pipe, in pipe order.
const INT_MIRROR_SESSIONS: [MirrorSession; 4] = [
    MirrorSession { session_id: 0x12c, recirc_port: 0x44 },
    MirrorSession { session_id: 0x12d, recirc_port: 0xc4 },
    MirrorSession { session_id: 0x12e, recirc_port: 0x144 },
    MirrorSession { session_id: 0x12f, recirc_port: 0x1c4 },
];

/// The mirror sessions in use on a device with a given number of pipes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipeTopology {
    sessions: Vec<MirrorSession>,
}

impl PipeTopology {
    pub fn new(capabilities: &FabricCapabilities) -> Result<Self> {
        let pipes = capabilities.hw_pipe_count;
        if pipes == 0 || pipes > INT_MIRROR_SESSIONS.len() {
            return Err(Error::InvalidArgument(format!(
                "hardware pipe count {} is outside 1..={}",
                pipes,
                INT_MIRROR_SESSIONS.len()
            )));
        }
        Ok(PipeTopology { sessions: INT_MIRROR_SESSIONS[..pipes].to_vec() })
    }

    pub fn sessions(&self) -> &[MirrorSession] {
        &self.sessions
    }

    pub fn recirc_ports(&self) -> impl Iterator<Item = u32> + '_ {
        self.sessions.iter().map(|s| s.recirc_port)
    }
}

/// Installs the per-pipe mirror sessions and the filtering entries that go
/// with them.
pub struct TopologyInstaller {
    ctx: DeviceContext,
    schema: Arc<Switch>,
    topology: PipeTopology,
}

impl TopologyInstaller {
    pub fn new(ctx: DeviceContext, schema: Arc<Switch>) -> Result<Self> {
        check_int(&schema)?;
        let topology = PipeTopology::new(&ctx.capabilities)?;
        Ok(TopologyInstaller { ctx, schema, topology })
    }

    pub fn topology(&self) -> &PipeTopology {
        &self.topology
    }

    /// Installs, for every pipe, a clone group to its recirculation port,
    /// the VLAN entries that admit recirculated packets untagged, and the
    /// forwarding-classifier entries for them.  Returns false, without
    /// writing anything, if the app id cannot be resolved.
    ///
    /// This is not idempotent: each call writes the whole set again, so it
    /// must run at most once per device activation.
    ///
    /// The forwarding classifier matches the switch MAC, so its entries are
    /// left for [`IntProgrammable::setup_int_config`] when the device has no
    /// segment-routing config yet.
    ///
    /// [`IntProgrammable::setup_int_config`]: crate::int::IntProgrammable::setup_int_config
    pub fn install(&self) -> bool {
        match self.try_install() {
            Ok(()) => true,
            Err(e) => {
                warn!("{}: INT topology install failed ({})", self.ctx.device_id, e);
                false
            }
        }
    }

    fn try_install(&self) -> Result<()> {
        let device_id = &self.ctx.device_id;
        let app_id = self.ctx.app_id()?;

        let mut writes = Vec::new();
        for session in self.topology.sessions() {
            writes.push(Write::Group(GroupDescription::clone_to_port(
                device_id,
                &app_id,
                session.session_id,
                session.recirc_port,
            )));
            writes.push(Write::Entry(self.ingress_port_vlan_entry(&app_id, session.recirc_port)?));
            writes.push(Write::Entry(self.egress_vlan_entry(&app_id, session.recirc_port)?));
        }
        match self.ctx.sr_config(device_id) {
            Ok(sr_config) => {
                writes.extend(self.fwd_classifier_writes(&app_id, sr_config.router_mac)?)
            }
            Err(e) => {
                warn!("{}: not installing forwarding classifier entries yet ({})", device_id, e)
            }
        }

        debug!("{}: installing {} topology writes", device_id, writes.len());
        self.ctx.backend.apply(writes);
        info!("{}: INT topology installed on {} pipes", device_id, self.topology.sessions().len());
        Ok(())
    }

    fn ingress_port_vlan_entry(&self, app_id: &AppId, port: u32) -> Result<DeviceEntry> {
        let entry = self.schema.build_table_entry(
            INGRESS_PORT_VLAN,
            PERMIT_WITH_INTERNAL_VLAN,
            &[(VLAN_ID, DEFAULT_VLAN)],
            &[(HDR_IG_PORT, Match::Exact(port.into())), (HDR_VLAN_IS_VALID, Match::Exact(0))],
            DEFAULT_PRIORITY,
        )?;
        Ok(DeviceEntry::new(&self.ctx.device_id, app_id, entry))
    }

    fn egress_vlan_entry(&self, app_id: &AppId, port: u32) -> Result<DeviceEntry> {
        let entry = self.schema.build_table_entry(
            EGRESS_VLAN,
            KEEP_VLAN,
            &[],
            &[(HDR_VLAN_ID, Match::Exact(DEFAULT_VLAN)), (HDR_EG_PORT, Match::Exact(port.into()))],
            DEFAULT_PRIORITY,
        )?;
        Ok(DeviceEntry::new(&self.ctx.device_id, app_id, entry))
    }

    /// Builds the two forwarding-classifier entries of every recirculation
    /// port: IPv4 packets to the switch MAC are routed, and MPLS packets to
    /// the switch MAC carrying IPv4 are label-switched.
    pub(crate) fn fwd_classifier_writes(
        &self,
        app_id: &AppId,
        switch_mac: MacAddress,
    ) -> Result<Vec<Write>> {
        let eth_dst = Match::Ternary(net::mac_to_u64(switch_mac), p4ext::width_mask(48));
        let mut writes = Vec::new();
        for port in self.topology.recirc_ports() {
            let ipv4 = self.schema.build_table_entry(
                FWD_CLASSIFIER,
                SET_FORWARDING_TYPE,
                &[(FWD_TYPE, FWD_TYPE_IPV4_ROUTING)],
                &[
                    (HDR_IG_PORT, Match::Exact(port.into())),
                    (HDR_ETH_DST, eth_dst),
                    (HDR_IP_ETH_TYPE, Match::Exact(ETH_TYPE_IPV4)),
                ],
                DEFAULT_PRIORITY,
            )?;
            let mpls = self.schema.build_table_entry(
                FWD_CLASSIFIER,
                SET_FORWARDING_TYPE,
                &[(FWD_TYPE, FWD_TYPE_MPLS)],
                &[
                    (HDR_IG_PORT, Match::Exact(port.into())),
                    (HDR_ETH_DST, eth_dst),
                    (HDR_ETH_TYPE, Match::Ternary(ETH_TYPE_MPLS_UNICAST, 0xffff)),
                    (HDR_IP_ETH_TYPE, Match::Exact(ETH_TYPE_IPV4)),
                ],
                DEFAULT_PRIORITY + MPLS_CLASSIFIER_PRIORITY_OFFSET,
            )?;
            writes.push(Write::Entry(DeviceEntry::new(&self.ctx.device_id, app_id, ipv4)));
            writes.push(Write::Entry(DeviceEntry::new(&self.ctx.device_id, app_id, mpls)));
        }
        Ok(writes)
    }
}
