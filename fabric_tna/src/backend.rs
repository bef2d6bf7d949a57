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

//! An [`EntryBackend`] that keeps everything in memory.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::context::{DeviceId, EntryBackend};
use crate::entry::{DeviceEntry, GroupDescription, Write};

#[derive(Default)]
struct State {
    entries: BTreeMap<DeviceId, BTreeSet<DeviceEntry>>,
    groups: BTreeMap<DeviceId, BTreeSet<GroupDescription>>,

    // Every batch handed to `apply` and `remove`, in order.
    applied: Vec<Vec<Write>>,
    removed: Vec<Vec<Write>>,
}

/// Installed entries and groups per device, plus a log of the batches
/// that installed and removed them.  Writing the same entry twice stores
/// it once but logs it twice.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock cannot leave `State` inconsistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs `entries` without logging a batch, as if some other
    /// application had written them.
    pub fn seed<I: IntoIterator<Item = DeviceEntry>>(&self, entries: I) {
        let mut state = self.state();
        for entry in entries {
            state.entries.entry(entry.device_id.clone()).or_default().insert(entry);
        }
    }

    /// The entries installed on `device_id`, in sorted order.
    pub fn entries(&self, device_id: &DeviceId) -> Vec<DeviceEntry> {
        self.state().entries.get(device_id).map(|e| e.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn groups(&self, device_id: &DeviceId) -> Vec<GroupDescription> {
        self.state().groups.get(device_id).map(|g| g.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn applied_batches(&self) -> Vec<Vec<Write>> {
        self.state().applied.clone()
    }

    pub fn removed_batches(&self) -> Vec<Vec<Write>> {
        self.state().removed.clone()
    }

    /// Total number of writes applied, over all batches.
    pub fn applied_count(&self) -> usize {
        self.state().applied.iter().map(Vec::len).sum()
    }

    pub fn removed_count(&self) -> usize {
        self.state().removed.iter().map(Vec::len).sum()
    }
}

impl EntryBackend for MemoryBackend {
    fn apply(&self, writes: Vec<Write>) {
        let mut state = self.state();
        for write in &writes {
            match write {
                Write::Entry(e) => {
                    state.entries.entry(e.device_id.clone()).or_default().insert(e.clone());
                }
                Write::Group(g) => {
                    state.groups.entry(g.device_id.clone()).or_default().insert(g.clone());
                }
            }
        }
        state.applied.push(writes);
    }

    fn remove(&self, writes: Vec<Write>) {
        let mut state = self.state();
        for write in &writes {
            match write {
                Write::Entry(e) => {
                    if let Some(entries) = state.entries.get_mut(&e.device_id) {
                        entries.remove(e);
                    }
                }
                Write::Group(g) => {
                    if let Some(groups) = state.groups.get_mut(&g.device_id) {
                        groups.remove(g);
                    }
                }
            }
        }
        state.removed.push(writes);
    }

    fn current_entries(&self, device_id: &DeviceId) -> Vec<DeviceEntry> {
        self.entries(device_id)
    }
}
