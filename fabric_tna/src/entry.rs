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

//! What the compilers hand to an [`EntryBackend`](crate::context::EntryBackend).

use p4ext::{CloneSessionEntry, MeterEntry, TableEntry};

use std::fmt::{self, Display};

use crate::context::{AppId, DeviceId};

/// A table entry bound to a device and its owning application.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceEntry {
    pub device_id: DeviceId,
    pub app_id: AppId,
    pub permanent: bool,
    pub entry: TableEntry,
}

impl DeviceEntry {
    /// Builds a permanent entry, which is all the compilers ever produce.
    pub fn new(device_id: &DeviceId, app_id: &AppId, entry: TableEntry) -> Self {
        DeviceEntry { device_id: device_id.clone(), app_id: app_id.clone(), permanent: true, entry }
    }
}

impl Display for DeviceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.device_id, self.entry)
    }
}

/// A clone group: the device-level form of a mirror session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupDescription {
    pub device_id: DeviceId,
    pub app_id: AppId,
    pub clone_session: CloneSessionEntry,
}

impl GroupDescription {
    /// A clone group whose id is `session_id` and whose single bucket outputs to `port`.
    pub fn clone_to_port(device_id: &DeviceId, app_id: &AppId, session_id: u32, port: u32) -> Self {
        GroupDescription {
            device_id: device_id.clone(),
            app_id: app_id.clone(),
            clone_session: CloneSessionEntry::new(session_id, &[port]),
        }
    }
}

impl Display for GroupDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.device_id, self.clone_session)
    }
}

/// A meter cell to program (or reset) on a device.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MeterProgram {
    pub device_id: DeviceId,
    pub app_id: AppId,
    pub entry: MeterEntry,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Write {
    Entry(DeviceEntry),
    Group(GroupDescription),
}

impl Write {
    pub fn as_entry(&self) -> Option<&DeviceEntry> {
        match self {
            Write::Entry(entry) => Some(entry),
            Write::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&GroupDescription> {
        match self {
            Write::Group(group) => Some(group),
            Write::Entry(_) => None,
        }
    }
}

impl Display for Write {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Write::Entry(entry) => write!(f, "entry {}", entry),
            Write::Group(group) => write!(f, "group {}", group),
        }
    }
}
