// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Framegrab Developers

//! Two small integers in one settings scalar.
//!
//! The settings store only holds scalars, so compound values such as a
//! resolution (width, height) or a frame interval (numerator, denominator)
//! travel as a single packed integer. `a` occupies the high 16 bits and `b`
//! the low 16 bits.
//!
//! Both values must fit in 16 bits. Larger values are truncated silently;
//! checking the range is the caller's responsibility.
//!
//! ```
//! use framegrab::tuple::{pack, unpack};
//!
//! let packed = pack(1920, 1080);
//! assert_eq!(unpack(packed), (1920, 1080));
//! ```

/// Pack `a` into the high half and `b` into the low half.
pub const fn pack(a: u32, b: u32) -> u32 {
    (a << 16) | (b & 0xffff)
}

/// Split a packed value back into `(a, b)`.
pub const fn unpack(packed: u32) -> (u32, u32) {
    (packed >> 16, packed & 0xffff)
}
