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


//! Address types that appear in intents, and their conversions to the
//! integer values that match fields and action parameters carry.

use byteorder::{BigEndian, ByteOrder};

use std::net::Ipv4Addr;

pub use ipnet::Ipv4Net;
pub use mac_address::MacAddress;

/// `mac` as a 48-bit integer.
pub fn mac_to_u64(mac: MacAddress) -> u64 {
    BigEndian::read_uint(&mac.bytes(), 6)
}

/// Network address and netmask of `prefix`, ready for a ternary match.
/// Host bits of the stored address are dropped.
pub fn prefix_to_ternary(prefix: Ipv4Net) -> (u64, u64) {
    (u32::from(prefix.network()).into(), u32::from(prefix.netmask()).into())
}

/// Converts a ternary value and mask back into a prefix.  Returns `None`
/// unless the mask's set bits are contiguous from the top.
pub fn prefix_from_mask(addr: u32, mask: u32) -> Option<Ipv4Net> {
    let prefix = Ipv4Net::new(Ipv4Addr::from(addr), mask.leading_ones() as u8).ok()?.trunc();
    if u32::from(prefix.netmask()) == mask {
        Some(prefix)
    } else {
        None
    }
}
