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

//! User-plane function entities.  These describe mobile-core dataplane
//! state independently of the tables that implement it; [`UpfTranslator`]
//! maps between the two.

use std::net::Ipv4Addr;
use std::ops::RangeInclusive;

use crate::error::{Error, Result};
use crate::net::Ipv4Net;

pub mod translator;

pub use translator::UpfTranslator;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InterfaceKind {
    /// Faces the radio access network; traffic arrives GTP-U encapsulated.
    Access,
    /// Faces the core network; traffic arrives plain.
    Core,
    /// Faces the downlink buffering function, which sends back buffered
    /// traffic GTP-U encapsulated.
    Dbuf,
}

/// An address range the UPF owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UpfInterface {
    pub prefix: Ipv4Net,
    pub kind: InterfaceKind,
    pub slice_id: u8,
}

impl UpfInterface {
    pub fn is_access(&self) -> bool {
        self.kind == InterfaceKind::Access
    }

    pub fn is_core(&self) -> bool {
        self.kind == InterfaceKind::Core
    }

    pub fn is_dbuf(&self) -> bool {
        self.kind == InterfaceKind::Dbuf
    }
}

/// A GTP tunnel endpoint pair, referred to by downlink sessions through
/// `tun_peer_id`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UpfGtpTunnelPeer {
    pub tun_peer_id: u8,
    pub src_addr: Ipv4Addr,
    pub dst_addr: Ipv4Addr,
    pub src_port: u16,
}

/// Uplink traffic of one UE session, identified by its tunnel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UpfSessionUplink {
    pub tun_dst_addr: Ipv4Addr,
    pub teid: u32,
    pub session_meter_idx: u32,
}

/// Downlink traffic of one UE session, identified by the UE address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UpfSessionDownlink {
    pub ue_address: Ipv4Addr,
    pub tun_peer_id: u8,
    pub session_meter_idx: u32,
    /// The UE is idle: send its traffic to the buffering function.
    pub buffering: bool,
}

impl UpfSessionDownlink {
    pub fn needs_buffering(&self) -> bool {
        self.buffering
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UplinkTreatment {
    Forward { traffic_class: Option<u8>, app_meter_idx: u32 },
    Drop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DownlinkTreatment {
    Forward { traffic_class: Option<u8>, app_meter_idx: u32, teid: u32, qfi: u8 },
    Drop,
}

/// What happens to uplink traffic of one application within a UE session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UpfTerminationUplink {
    pub ue_session_id: Ipv4Addr,
    pub application_id: u8,
    pub ctr_id: u32,
    pub treatment: UplinkTreatment,
}

impl UpfTerminationUplink {
    pub fn needs_dropping(&self) -> bool {
        self.treatment == UplinkTreatment::Drop
    }

    pub fn traffic_class(&self) -> Option<u8> {
        match self.treatment {
            UplinkTreatment::Forward { traffic_class, .. } => traffic_class,
            UplinkTreatment::Drop => None,
        }
    }
}

/// What happens to downlink traffic of one application within a UE session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UpfTerminationDownlink {
    pub ue_session_id: Ipv4Addr,
    pub application_id: u8,
    pub ctr_id: u32,
    pub treatment: DownlinkTreatment,
}

impl UpfTerminationDownlink {
    pub fn needs_dropping(&self) -> bool {
        self.treatment == DownlinkTreatment::Drop
    }

    pub fn traffic_class(&self) -> Option<u8> {
        match self.treatment {
            DownlinkTreatment::Forward { traffic_class, .. } => traffic_class,
            DownlinkTreatment::Drop => None,
        }
    }
}

/// Classifies traffic into an application.  Filters left as `None` match
/// anything.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UpfApplication {
    pub app_id: u8,
    pub slice_id: u8,
    pub ip_prefix: Option<Ipv4Net>,
    pub l4_port_range: Option<RangeInclusive<u16>>,
    pub ip_proto: Option<u8>,
    pub priority: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MeterKind {
    Session,
    Application,
}

/// A token-bucket band.  Zero rate and zero burst together mean "no band"
/// on the device, so such a band cannot be expressed here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeterBand {
    pub rate: u64,
    pub burst: u64,
}

impl MeterBand {
    pub fn new(rate: u64, burst: u64) -> Result<Self> {
        if rate == 0 && burst == 0 {
            return Err(Error::InvalidArgument("meter band with zero rate and burst".into()));
        }
        Ok(MeterBand { rate, burst })
    }
}

/// A session or application meter cell.  A meter with no bands is a
/// reset request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UpfMeter {
    pub kind: MeterKind,
    pub cell_id: u32,
    pub committed: Option<MeterBand>,
    pub peak: Option<MeterBand>,
}

impl UpfMeter {
    /// Session meters only police the peak rate.
    pub fn session(cell_id: u32, peak: MeterBand) -> Self {
        UpfMeter { kind: MeterKind::Session, cell_id, committed: None, peak: Some(peak) }
    }

    pub fn application(cell_id: u32, committed: MeterBand, peak: MeterBand) -> Self {
        UpfMeter {
            kind: MeterKind::Application,
            cell_id,
            committed: Some(committed),
            peak: Some(peak),
        }
    }

    pub fn reset(kind: MeterKind, cell_id: u32) -> Self {
        UpfMeter { kind, cell_id, committed: None, peak: None }
    }

    pub fn is_reset(&self) -> bool {
        self.committed.is_none() && self.peak.is_none()
    }
}
