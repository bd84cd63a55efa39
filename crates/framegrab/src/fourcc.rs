// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Framegrab Developers
//
// Based on https://docs.rs/crate/four-cc/latest, fixed to the V4L2 byte order.
#![forbid(unsafe_code)]

use core::{fmt, result::Result};

/// Four-character pixel format code.
///
/// V4L2 defines the numeric value as `a | b << 8 | c << 16 | d << 24`
/// independent of host endianness, so conversions always use little-endian
/// byte order.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(C, packed)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const YUYV: FourCC = FourCC(*b"YUYV");
    pub const YVYU: FourCC = FourCC(*b"YVYU");
    pub const UYVY: FourCC = FourCC(*b"UYVY");
    pub const NV12: FourCC = FourCC(*b"NV12");
    pub const YU12: FourCC = FourCC(*b"YU12");
    pub const YV12: FourCC = FourCC(*b"YV12");

    /// Numeric V4L2 value of this code.
    pub const fn as_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// Build a code from its numeric V4L2 value.
    pub const fn from_u32(val: u32) -> FourCC {
        FourCC(val.to_le_bytes())
    }
}

impl From<&[u8; 4]> for FourCC {
    fn from(buf: &[u8; 4]) -> FourCC {
        FourCC(*buf)
    }
}

impl From<u32> for FourCC {
    fn from(val: u32) -> FourCC {
        FourCC::from_u32(val)
    }
}

impl From<FourCC> for u32 {
    fn from(val: FourCC) -> Self {
        val.as_u32()
    }
}

impl TryFrom<&str> for FourCC {
    type Error = String;

    fn try_from(s: &str) -> Result<FourCC, String> {
        let bytes = s.as_bytes();
        match <[u8; 4]>::try_from(bytes) {
            Ok(buf) => Ok(FourCC(buf)),
            Err(_) => Err(format!("FOURCC must be exactly 4 characters: {}", s)),
        }
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let b = self.0;
        match core::str::from_utf8(&b) {
            Ok(s) => f.write_str(s),
            Err(_) => {
                // If we return fmt::Error, then for example format!() will panic, so we choose
                // an alternative representation instead
                f.write_fmt(format_args!(
                    "{}{}{}{}",
                    core::ascii::escape_default(b[0]),
                    core::ascii::escape_default(b[1]),
                    core::ascii::escape_default(b[2]),
                    core::ascii::escape_default(b[3])
                ))
            }
        }
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let b = self.0;
        f.debug_tuple("FourCC")
            .field(&format_args!(
                "{}{}{}{}",
                core::ascii::escape_default(b[0]),
                core::ascii::escape_default(b[1]),
                core::ascii::escape_default(b[2]),
                core::ascii::escape_default(b[3])
            ))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_kernel_codes() {
        assert_eq!(FourCC::YUYV.as_u32(), framegrab_sys::V4L2_PIX_FMT_YUYV);
        assert_eq!(FourCC::NV12.as_u32(), framegrab_sys::V4L2_PIX_FMT_NV12);
        assert_eq!(FourCC::YU12.as_u32(), framegrab_sys::V4L2_PIX_FMT_YUV420);
        assert_eq!(FourCC::YV12.as_u32(), framegrab_sys::V4L2_PIX_FMT_YVU420);
    }

    #[test]
    fn test_from_u32() {
        assert_eq!(FourCC::from(0x5659_5559), FourCC::YUYV);
        assert_eq!(format!("{}", FourCC::from(0x3231_564e)), "NV12");
    }

    #[test]
    fn test_try_from_str() {
        assert_eq!(FourCC::try_from("UYVY"), Ok(FourCC::UYVY));
        assert!(FourCC::try_from("UYV").is_err());
        assert!(FourCC::try_from("UYVYY").is_err());
    }

    #[test]
    fn test_display_non_ascii() {
        let code = FourCC([0xff, b'A', b'B', b'C']);
        assert_eq!(format!("{}", code), "\\xffABC");
    }
}
