// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Framegrab Developers

//! Subset of `<linux/videodev2.h>` used by the capture engine.
//!
//! Layouts follow the kernel UAPI for 64-bit and 32-bit targets. Requests
//! are declared with nix's ioctl macros, which size them from the argument
//! type.

use std::mem::size_of;
use std::os::raw::{c_int, c_ulong, c_void};

pub const V4L2_CAP_VIDEO_CAPTURE: u32 = 0x0000_0001;
pub const V4L2_CAP_VIDEO_CAPTURE_MPLANE: u32 = 0x0000_1000;
pub const V4L2_CAP_STREAMING: u32 = 0x0400_0000;
pub const V4L2_CAP_DEVICE_CAPS: u32 = 0x8000_0000;

pub const V4L2_BUF_TYPE_VIDEO_CAPTURE: u32 = 1;
pub const V4L2_MEMORY_MMAP: u32 = 1;

pub const V4L2_FIELD_ANY: u32 = 0;

pub const V4L2_FMT_FLAG_COMPRESSED: u32 = 0x0001;
pub const V4L2_FMT_FLAG_EMULATED: u32 = 0x0002;

pub const V4L2_FRMSIZE_TYPE_DISCRETE: u32 = 1;
pub const V4L2_FRMSIZE_TYPE_CONTINUOUS: u32 = 2;
pub const V4L2_FRMSIZE_TYPE_STEPWISE: u32 = 3;

pub const V4L2_FRMIVAL_TYPE_DISCRETE: u32 = 1;
pub const V4L2_FRMIVAL_TYPE_CONTINUOUS: u32 = 2;
pub const V4L2_FRMIVAL_TYPE_STEPWISE: u32 = 3;

/// Build a little-endian fourcc code, same as `v4l2_fourcc()` in C.
pub const fn v4l2_fourcc(a: u8, b: u8, c: u8, d: u8) -> u32 {
    (a as u32) | ((b as u32) << 8) | ((c as u32) << 16) | ((d as u32) << 24)
}

pub const V4L2_PIX_FMT_YVYU: u32 = v4l2_fourcc(b'Y', b'V', b'Y', b'U');
pub const V4L2_PIX_FMT_YUYV: u32 = v4l2_fourcc(b'Y', b'U', b'Y', b'V');
pub const V4L2_PIX_FMT_UYVY: u32 = v4l2_fourcc(b'U', b'Y', b'V', b'Y');
pub const V4L2_PIX_FMT_NV12: u32 = v4l2_fourcc(b'N', b'V', b'1', b'2');
pub const V4L2_PIX_FMT_YUV420: u32 = v4l2_fourcc(b'Y', b'U', b'1', b'2');
pub const V4L2_PIX_FMT_YVU420: u32 = v4l2_fourcc(b'Y', b'V', b'1', b'2');
pub const V4L2_PIX_FMT_MJPEG: u32 = v4l2_fourcc(b'M', b'J', b'P', b'G');

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct v4l2_capability {
    pub driver: [u8; 16],
    pub card: [u8; 32],
    pub bus_info: [u8; 32],
    pub version: u32,
    pub capabilities: u32,
    pub device_caps: u32,
    pub reserved: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct v4l2_fmtdesc {
    pub index: u32,
    pub type_: u32,
    pub flags: u32,
    pub description: [u8; 32],
    pub pixelformat: u32,
    pub mbus_code: u32,
    pub reserved: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct v4l2_frmsize_discrete {
    pub width: u32,
    pub height: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct v4l2_frmsize_stepwise {
    pub min_width: u32,
    pub max_width: u32,
    pub step_width: u32,
    pub min_height: u32,
    pub max_height: u32,
    pub step_height: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union v4l2_frmsize_union {
    pub discrete: v4l2_frmsize_discrete,
    pub stepwise: v4l2_frmsize_stepwise,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_frmsizeenum {
    pub index: u32,
    pub pixel_format: u32,
    pub type_: u32,
    pub u: v4l2_frmsize_union,
    pub reserved: [u32; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct v4l2_fract {
    pub numerator: u32,
    pub denominator: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct v4l2_frmival_stepwise {
    pub min: v4l2_fract,
    pub max: v4l2_fract,
    pub step: v4l2_fract,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union v4l2_frmival_union {
    pub discrete: v4l2_fract,
    pub stepwise: v4l2_frmival_stepwise,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_frmivalenum {
    pub index: u32,
    pub pixel_format: u32,
    pub width: u32,
    pub height: u32,
    pub type_: u32,
    pub u: v4l2_frmival_union,
    pub reserved: [u32; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct v4l2_pix_format {
    pub width: u32,
    pub height: u32,
    pub pixelformat: u32,
    pub field: u32,
    pub bytesperline: u32,
    pub sizeimage: u32,
    pub colorspace: u32,
    pub priv_: u32,
    pub flags: u32,
    pub ycbcr_enc: u32,
    pub quantization: u32,
    pub xfer_func: u32,
}

/// The kernel union embeds `struct v4l2_window`, which holds pointers, so the
/// union is pointer-aligned. `_align` reproduces that without the window type.
#[repr(C)]
#[derive(Clone, Copy)]
pub union v4l2_format_union {
    pub pix: v4l2_pix_format,
    pub raw_data: [u8; 200],
    _align: [*mut c_void; 0],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_format {
    pub type_: u32,
    pub fmt: v4l2_format_union,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct v4l2_captureparm {
    pub capability: u32,
    pub capturemode: u32,
    pub timeperframe: v4l2_fract,
    pub extendedmode: u32,
    pub readbuffers: u32,
    pub reserved: [u32; 4],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union v4l2_streamparm_union {
    pub capture: v4l2_captureparm,
    pub raw_data: [u8; 200],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_streamparm {
    pub type_: u32,
    pub parm: v4l2_streamparm_union,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct v4l2_requestbuffers {
    pub count: u32,
    pub type_: u32,
    pub memory: u32,
    pub capabilities: u32,
    pub flags: u8,
    pub reserved: [u8; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct v4l2_timecode {
    pub type_: u32,
    pub flags: u32,
    pub frames: u8,
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub userbits: [u8; 4],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union v4l2_buffer_m {
    pub offset: u32,
    pub userptr: c_ulong,
    pub planes: *mut c_void,
    pub fd: i32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_buffer {
    pub index: u32,
    pub type_: u32,
    pub bytesused: u32,
    pub flags: u32,
    pub field: u32,
    pub timestamp: libc::timeval,
    pub timecode: v4l2_timecode,
    pub sequence: u32,
    pub memory: u32,
    pub m: v4l2_buffer_m,
    pub length: u32,
    pub reserved2: u32,
    pub request_fd: i32,
}

macro_rules! zeroed_default {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Default for $ty {
                fn default() -> Self {
                    // SAFETY: plain-old-data kernel structure, all-zero is a valid value
                    unsafe { std::mem::zeroed() }
                }
            }
        )*
    };
}

zeroed_default!(
    v4l2_capability,
    v4l2_fmtdesc,
    v4l2_frmsizeenum,
    v4l2_frmivalenum,
    v4l2_pix_format,
    v4l2_format,
    v4l2_captureparm,
    v4l2_streamparm,
    v4l2_requestbuffers,
    v4l2_buffer,
);

const VIDIOC_TYPE: u8 = b'V';

/// One V4L2 ioctl request.
///
/// Carries the request code handed to libv4l2 and the nix-generated kernel
/// entry point, both tied to the argument type `T`.
pub struct Request<T> {
    code: c_ulong,
    kernel: unsafe fn(c_int, *mut T) -> nix::Result<c_int>,
}

impl<T> Request<T> {
    /// Request code as passed to `ioctl(2)`.
    pub const fn code(&self) -> c_ulong {
        self.code
    }

    /// Issue the request straight to the kernel.
    ///
    /// # Safety
    ///
    /// `arg` must point to a valid `T` for the duration of the call.
    pub unsafe fn kernel(&self, fd: c_int, arg: *mut T) -> nix::Result<c_int> {
        unsafe { (self.kernel)(fd, arg) }
    }
}

macro_rules! v4l2_request {
    (read $name:ident, $kernel:ident, $nr:expr, $ty:ty) => {
        nix::ioctl_read!($kernel, VIDIOC_TYPE, $nr, $ty);
        pub const $name: Request<$ty> = Request {
            code: nix::request_code_read!(VIDIOC_TYPE, $nr, size_of::<$ty>()) as c_ulong,
            kernel: $kernel,
        };
    };
    (readwrite $name:ident, $kernel:ident, $nr:expr, $ty:ty) => {
        nix::ioctl_readwrite!($kernel, VIDIOC_TYPE, $nr, $ty);
        pub const $name: Request<$ty> = Request {
            code: nix::request_code_readwrite!(VIDIOC_TYPE, $nr, size_of::<$ty>()) as c_ulong,
            kernel: $kernel,
        };
    };
    (write $name:ident, $kernel:ident, $nr:expr, $ty:ty) => {
        nix::ioctl_write_ptr!($kernel, VIDIOC_TYPE, $nr, $ty);
        pub const $name: Request<$ty> = Request {
            code: nix::request_code_write!(VIDIOC_TYPE, $nr, size_of::<$ty>()) as c_ulong,
            kernel: {
                unsafe fn write(fd: c_int, arg: *mut $ty) -> nix::Result<c_int> {
                    unsafe { $kernel(fd, arg) }
                }
                write
            },
        };
    };
}

v4l2_request!(read VIDIOC_QUERYCAP, vidioc_querycap, 0, v4l2_capability);
v4l2_request!(readwrite VIDIOC_ENUM_FMT, vidioc_enum_fmt, 2, v4l2_fmtdesc);
v4l2_request!(readwrite VIDIOC_S_FMT, vidioc_s_fmt, 5, v4l2_format);
v4l2_request!(readwrite VIDIOC_REQBUFS, vidioc_reqbufs, 8, v4l2_requestbuffers);
v4l2_request!(readwrite VIDIOC_QUERYBUF, vidioc_querybuf, 9, v4l2_buffer);
v4l2_request!(readwrite VIDIOC_QBUF, vidioc_qbuf, 15, v4l2_buffer);
v4l2_request!(readwrite VIDIOC_DQBUF, vidioc_dqbuf, 17, v4l2_buffer);
v4l2_request!(write VIDIOC_STREAMON, vidioc_streamon, 18, c_int);
v4l2_request!(write VIDIOC_STREAMOFF, vidioc_streamoff, 19, c_int);
v4l2_request!(readwrite VIDIOC_S_PARM, vidioc_s_parm, 22, v4l2_streamparm);
v4l2_request!(readwrite VIDIOC_ENUM_FRAMESIZES, vidioc_enum_framesizes, 74, v4l2_frmsizeenum);
v4l2_request!(readwrite VIDIOC_ENUM_FRAMEINTERVALS, vidioc_enum_frameintervals, 75, v4l2_frmivalenum);
