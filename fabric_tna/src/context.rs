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

//! The per-device context handed to the compilers: who the device is, what
//! its pipeline can do, and the collaborators it reads from and writes to.

use serde::Deserialize;

use std::fmt::{self, Display};
use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::entry::{DeviceEntry, Write};
use crate::error::{Error, Result};
use crate::net::MacAddress;

/// Name under which the pipeline application registers with the app registry.
pub const APP_NAME: &str = "org.stratumproject.fabric-tna";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub String);

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        DeviceId(s.into())
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An application id, as handed out by the app registry.  Every entry a
/// compiler produces is owned by exactly one.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppId {
    pub id: u16,
    pub name: String,
}

/// What the loaded pipeline supports.  Fixed for the life of the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct FabricCapabilities {
    pub has_hashed_table: bool,
    pub supports_double_vlan_term: bool,
    pub hw_pipe_count: usize,
}

/// A device's segment-routing configuration as stored.  Every field is
/// optional so that incomplete configurations can be represented; use
/// [`SrDeviceConfig::resolve`] to get a usable one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SrDeviceConfig {
    pub node_sid_ipv4: Option<u32>,
    pub router_ipv4: Option<Ipv4Addr>,
    pub router_mac: Option<MacAddress>,
    pub is_edge_router: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceRole {
    Leaf,
    Spine,
}

/// A complete segment-routing configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedSrConfig {
    pub node_sid: u32,
    pub router_ip: Ipv4Addr,
    pub router_mac: MacAddress,
    pub role: DeviceRole,
}

impl SrDeviceConfig {
    /// Checks that every field `device_id` needs is present.
    pub fn resolve(&self, device_id: &DeviceId) -> Result<ResolvedSrConfig> {
        let missing = |what| {
            let message = format!("{}: segment-routing config has no {}", device_id, what);
            Error::ConfigurationMissing(message)
        };
        let is_edge_router = self.is_edge_router.ok_or_else(|| missing("edge router flag"))?;
        Ok(ResolvedSrConfig {
            node_sid: self.node_sid_ipv4.ok_or_else(|| missing("IPv4 node SID"))?,
            router_ip: self.router_ipv4.ok_or_else(|| missing("router IPv4 address"))?,
            router_mac: self.router_mac.ok_or_else(|| missing("router MAC"))?,
            role: if is_edge_router { DeviceRole::Leaf } else { DeviceRole::Spine },
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct HostLocation {
    pub device_id: DeviceId,
    pub port: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Host {
    pub ip: Ipv4Addr,
    #[serde(default)]
    pub location: Option<HostLocation>,
}

pub trait AppRegistry: Send + Sync {
    fn resolve_app_id(&self, name: &str) -> Option<AppId>;
}

pub trait SrConfigProvider: Send + Sync {
    fn config_for(&self, device_id: &DeviceId) -> Option<SrDeviceConfig>;
}

pub trait HostResolver: Send + Sync {
    fn hosts_with_ip(&self, ip: Ipv4Addr) -> Vec<Host>;
}

/// Installs and removes entries on devices.  Writes are fire-and-forget:
/// the backend reports no per-write outcome.
pub trait EntryBackend: Send + Sync {
    fn apply(&self, writes: Vec<Write>);
    fn remove(&self, writes: Vec<Write>);
    fn current_entries(&self, device_id: &DeviceId) -> Vec<DeviceEntry>;
}

#[derive(Clone)]
pub struct DeviceContext {
    pub device_id: DeviceId,
    pub capabilities: FabricCapabilities,
    pub apps: Arc<dyn AppRegistry>,
    pub sr_configs: Arc<dyn SrConfigProvider>,
    pub hosts: Arc<dyn HostResolver>,
    pub backend: Arc<dyn EntryBackend>,
}

impl DeviceContext {
    pub fn new(
        device_id: DeviceId,
        capabilities: FabricCapabilities,
        apps: Arc<dyn AppRegistry>,
        sr_configs: Arc<dyn SrConfigProvider>,
        hosts: Arc<dyn HostResolver>,
        backend: Arc<dyn EntryBackend>,
    ) -> Self {
        DeviceContext { device_id, capabilities, apps, sr_configs, hosts, backend }
    }

    /// Resolves the id that owns every entry this pipeline writes.
    pub fn app_id(&self) -> Result<AppId> {
        self.apps.resolve_app_id(APP_NAME).ok_or_else(|| {
            Error::ConfigurationMissing(format!("no app id registered for {}", APP_NAME))
        })
    }

    /// Resolves the segment-routing config of `device_id`, which need not be
    /// this context's device.
    pub fn sr_config(&self, device_id: &DeviceId) -> Result<ResolvedSrConfig> {
        self.sr_configs
            .config_for(device_id)
            .ok_or_else(|| {
                Error::ConfigurationMissing(format!("{}: no segment-routing config", device_id))
            })?
            .resolve(device_id)
    }
}
