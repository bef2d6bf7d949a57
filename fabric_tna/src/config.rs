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

//! Scenario files for `fabric-tna-compile`.
//!
//! A scenario describes one device and everything the compilers need to
//! know about its surroundings.  For example:
//!
//! ```json
//! {
//!   "device_id": "device:leaf1",
//!   "capabilities": {
//!     "has_hashed_table": true, "supports_double_vlan_term": false, "hw_pipe_count": 4
//!   },
//!   "apps": ["org.stratumproject.fabric-tna"],
//!   "segment_routing": {
//!     "device:leaf1": { "node_sid_ipv4": 101, "router_ipv4": "10.0.1.254",
//!                       "router_mac": "00:00:00:00:01:01", "is_edge_router": true }
//!   },
//!   "hosts": [ { "ip": "10.0.3.2", "location": { "device_id": "device:leaf1", "port": 3 } } ],
//!   "int_config": { "collector_ip": "10.0.3.2", "collector_port": 32766,
//!                   "min_flow_hop_latency_change_ns": 300 },
//!   "int_objectives": [
//!     { "selector": [ { "type": "ipv4_src", "value": "10.0.0.0/24" } ],
//!       "metadata_types": ["switch_id", "hop_latency"] }
//!   ]
//! }
//! ```

use serde::Deserialize;

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use crate::context::{
    AppId,
    AppRegistry,
    DeviceId,
    FabricCapabilities,
    Host,
    HostResolver,
    SrConfigProvider,
    SrDeviceConfig,
};
use crate::error::{Error, Result};
use crate::int::{IntDeviceConfig, IntObjective};

#[derive(Clone, Debug, Deserialize)]
pub struct Scenario {
    pub device_id: DeviceId,
    pub capabilities: FabricCapabilities,
    #[serde(default)]
    pub apps: Vec<String>,
    #[serde(default)]
    pub segment_routing: BTreeMap<DeviceId, SrDeviceConfig>,
    #[serde(default)]
    pub hosts: Vec<Host>,
    #[serde(default)]
    pub int_config: Option<IntDeviceConfig>,
    #[serde(default)]
    pub int_objectives: Vec<IntObjective>,
}

impl Scenario {
    pub fn from_json(s: &str) -> Result<Scenario> {
        serde_json::from_str(s).map_err(|e| Error::InvalidArgument(format!("bad scenario ({})", e)))
    }

    /// Splits off the collaborators the scenario describes.
    pub fn static_config(&self) -> StaticConfig {
        StaticConfig {
            apps: self.apps.clone(),
            segment_routing: self.segment_routing.clone(),
            hosts: self.hosts.clone(),
        }
    }
}

/// Answers app, segment-routing and host queries from fixed data.
#[derive(Clone, Debug, Default)]
pub struct StaticConfig {
    /// Registered application names.  An application's id is its position
    /// in this list plus one.
    pub apps: Vec<String>,
    pub segment_routing: BTreeMap<DeviceId, SrDeviceConfig>,
    pub hosts: Vec<Host>,
}

impl AppRegistry for StaticConfig {
    fn resolve_app_id(&self, name: &str) -> Option<AppId> {
        let index = self.apps.iter().position(|a| a == name)?;
        let id = u16::try_from(index + 1).ok()?;
        Some(AppId { id, name: name.into() })
    }
}

impl SrConfigProvider for StaticConfig {
    fn config_for(&self, device_id: &DeviceId) -> Option<SrDeviceConfig> {
        self.segment_routing.get(device_id).cloned()
    }
}

impl HostResolver for StaticConfig {
    fn hosts_with_ip(&self, ip: Ipv4Addr) -> Vec<Host> {
        self.hosts.iter().filter(|h| h.ip == ip).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::APP_NAME;
    use crate::int::Criterion;
    use crate::net::MacAddress;

    const SCENARIO: &str = r#"{
        "device_id": "device:spine1",
        "capabilities": {
            "has_hashed_table": true, "supports_double_vlan_term": false, "hw_pipe_count": 2
        },
        "apps": ["org.onosproject.core", "org.stratumproject.fabric-tna"],
        "segment_routing": {
            "device:spine1": { "node_sid_ipv4": 201, "router_ipv4": "10.0.2.254",
                               "router_mac": "00:00:00:00:02:01", "is_edge_router": false },
            "device:leaf1": { "node_sid_ipv4": 101 }
        },
        "hosts": [ { "ip": "10.0.3.2", "location": { "device_id": "device:leaf1", "port": 3 } } ],
        "int_config": { "collector_ip": "10.0.3.2", "collector_port": 32766 },
        "int_objectives": [
            { "selector": [ { "type": "ipv4_dst", "value": "10.0.3.0/24" },
                            { "type": "udp_dst", "value": 53 } ],
              "metadata_types": ["switch_id"] }
        ]
    }"#;

    #[test]
    fn parse_scenario() {
        let scenario = Scenario::from_json(SCENARIO).unwrap();
        assert_eq!(scenario.capabilities.hw_pipe_count, 2);
        assert_eq!(scenario.int_objectives[0].selector[1], Criterion::UdpDst(53));

        let config = scenario.int_config.as_ref().unwrap();
        assert!(config.enabled);
        assert_eq!(config.min_flow_hop_latency_change_ns, 0);

        let statics = scenario.static_config();
        assert_eq!(statics.resolve_app_id(APP_NAME).map(|a| a.id), Some(2));
        assert_eq!(statics.resolve_app_id("org.example.other"), None);

        let spine = statics.config_for(&"device:spine1".into()).unwrap();
        assert_eq!(spine.router_mac, Some(MacAddress::new([0, 0, 0, 0, 2, 1])));
        let leaf = statics.config_for(&"device:leaf1".into()).unwrap();
        assert!(leaf.resolve(&"device:leaf1".into()).is_err());

        assert_eq!(statics.hosts_with_ip("10.0.3.2".parse().unwrap()).len(), 1);
        assert!(statics.hosts_with_ip("10.0.3.3".parse().unwrap()).is_empty());
    }

    #[test]
    fn bad_scenario() {
        assert!(Scenario::from_json("{}").is_err());
    }
}
