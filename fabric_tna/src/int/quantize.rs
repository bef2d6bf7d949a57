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

use crate::error::{Error, Result};

/// Computes the hop-latency quantization mask for a latency-change
/// threshold in nanoseconds.
///
/// The mask clears every bit below the most significant set bit of
/// `latency_change_ns`, so latencies that differ by less than roughly the
/// threshold quantize to the same value.  A threshold of 0 or 1 leaves the
/// latency unquantized.
pub fn hop_latency_mask(latency_change_ns: i64) -> Result<u32> {
    if latency_change_ns < 0 {
        return Err(Error::InvalidArgument(
            "flow latency change value must equal or greater than zero".into(),
        ));
    }
    let msb = match latency_change_ns {
        0 => 0,
        t => 63 - t.leading_zeros(),
    };
    // msb is at most 62, so the shift cannot overflow.
    Ok((0xffff_ffffu64 << msb) as u32)
}

#[cfg(test)]
mod tests {
    use super::hop_latency_mask;
    use crate::error::ErrorKind;

    #[test]
    fn known_thresholds() {
        let cases: &[(i64, u32)] = &[
            (0, 0xffff_ffff),
            (1, 0xffff_ffff),
            (2, 0xffff_fffe),
            (256, 0xffff_ff00),
            (300, 0xffff_ff00),
            (65536, 0xffff_0000),
            (100_000, 0xffff_0000),
            (1 << 28, 0xf000_0000),
            ((1 << 28) + 10, 0xf000_0000),
            (1 << 30, 0xc000_0000),
            (0x4000_0000, 0xc000_0000),
            (0x7fff_ffff, 0xc000_0000),
            (1 << 32, 0),
        ];
        for &(threshold, mask) in cases {
            assert_eq!(hop_latency_mask(threshold).unwrap(), mask, "threshold {}", threshold);
        }
    }

    #[test]
    fn negative_threshold() {
        let err = hop_latency_mask(-1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
