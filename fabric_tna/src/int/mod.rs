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

//! In-band network telemetry in postcard mode: packets that match a
//! watchlist entry are mirrored to a per-pipe recirculation port, turned
//! into a report and sent to a collector.

pub mod compiler;
pub mod quantize;
pub mod topology;

pub use compiler::{
    Criterion,
    IntDeviceConfig,
    IntFunctionality,
    IntMetadataType,
    IntObjective,
    IntProgrammable,
};
pub use quantize::hop_latency_mask;
pub use topology::{MirrorSession, PipeTopology, TopologyInstaller};

/// Priority of every entry these modules write, except the MPLS variant
/// of the forwarding classifier.
pub const DEFAULT_PRIORITY: i32 = 10000;

/// Added to [`DEFAULT_PRIORITY`] for the MPLS forwarding-classifier entry,
/// which must win over the IPv4 one.
pub const MPLS_CLASSIFIER_PRIORITY_OFFSET: i32 = 10;

/// VLAN given to untagged packets arriving on a recirculation port.
pub const DEFAULT_VLAN: u64 = 4094;

pub(crate) const ETH_TYPE_IPV4: u64 = 0x0800;
pub(crate) const ETH_TYPE_MPLS_UNICAST: u64 = 0x8847;
pub(crate) const IP_PROTO_TCP: u8 = 6;
pub(crate) const IP_PROTO_UDP: u8 = 17;
pub(crate) const FWD_TYPE_MPLS: u64 = 1;
pub(crate) const FWD_TYPE_IPV4_ROUTING: u64 = 2;

// Bridged metadata types of mirrored packets.
pub(crate) const BMD_TYPE_EGRESS_MIRROR: u64 = 2;
pub(crate) const BMD_TYPE_INGRESS_MIRROR: u64 = 3;

pub(crate) const MIRROR_TYPE_INT_REPORT: u64 = 1;

pub(crate) const INT_REPORT_TYPE_LOCAL: u64 = 1;
pub(crate) const INT_REPORT_TYPE_DROP: u64 = 2;

/// Keeps the top 18 bits of the 48-bit ingress timestamp.
pub(crate) const DEFAULT_TIMESTAMP_MASK: u64 = 0xffff_c000_0000;
