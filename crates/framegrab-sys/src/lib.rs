// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Framegrab Developers

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(clippy::missing_safety_doc)]

mod videodev2;

pub use videodev2::*;

// Re-export libloading for error handling
pub use libloading;

use std::ffi::CStr;
use std::io;
use std::os::fd::RawFd;
use std::os::raw::{c_char, c_int, c_ulong, c_void};
use std::ptr::{self, NonNull};
use std::sync::OnceLock;

type OpenFn = unsafe extern "C" fn(*const c_char, c_int, ...) -> c_int;
type CloseFn = unsafe extern "C" fn(c_int) -> c_int;
type IoctlFn = unsafe extern "C" fn(c_int, c_ulong, ...) -> c_int;
type MmapFn = unsafe extern "C" fn(*mut c_void, libc::size_t, c_int, c_int, c_int, i64) -> *mut c_void;
type MunmapFn = unsafe extern "C" fn(*mut c_void, libc::size_t) -> c_int;

/// Default soname of the V4L2 userspace conversion library.
pub const LIBV4L2_DEFAULT: &str = "libv4l2.so.0";

/// Environment variable overriding the libv4l2 path. The value `none`
/// disables the library and forces direct syscalls.
pub const LIBV4L2_ENV: &str = "FRAMEGRAB_LIBV4L2";

/// Entry points of libv4l2, resolved at runtime.
///
/// libv4l2 wraps the raw device calls and adds software format conversion,
/// which is where `V4L2_FMT_FLAG_EMULATED` formats come from.
pub struct LibV4l2 {
    _library: libloading::Library,
    v4l2_open: OpenFn,
    v4l2_close: CloseFn,
    v4l2_ioctl: IoctlFn,
    v4l2_mmap: MmapFn,
    v4l2_munmap: MunmapFn,
}

impl LibV4l2 {
    /// Load libv4l2 from `path` and resolve the five entry points.
    ///
    /// # Safety
    ///
    /// Loading a shared library runs its initialisers; the library at `path`
    /// must be a genuine libv4l2 build.
    pub unsafe fn new(path: &str) -> Result<Self, libloading::Error> {
        let library = unsafe { libloading::Library::new(path)? };
        let v4l2_open = unsafe { *library.get::<OpenFn>(b"v4l2_open\0")? };
        let v4l2_close = unsafe { *library.get::<CloseFn>(b"v4l2_close\0")? };
        let v4l2_ioctl = unsafe { *library.get::<IoctlFn>(b"v4l2_ioctl\0")? };
        let v4l2_mmap = unsafe { *library.get::<MmapFn>(b"v4l2_mmap\0")? };
        let v4l2_munmap = unsafe { *library.get::<MunmapFn>(b"v4l2_munmap\0")? };

        Ok(LibV4l2 {
            _library: library,
            v4l2_open,
            v4l2_close,
            v4l2_ioctl,
            v4l2_mmap,
            v4l2_munmap,
        })
    }
}

/// Which path device calls take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Calls go through libv4l2
    LibV4l2,
    /// Calls go straight to the kernel
    Kernel,
}

static LIBRARY: OnceLock<Option<LibV4l2>> = OnceLock::new();

/// Initialize the device-call backend.
///
/// The first call tries to load libv4l2 (see [`LIBV4L2_ENV`]); when that fails
/// the kernel syscalls are used for the rest of the process lifetime. The
/// choice never changes afterwards, so descriptors and mappings are always
/// released through the same library that created them.
pub fn init() -> Backend {
    match library() {
        Some(_) => Backend::LibV4l2,
        None => Backend::Kernel,
    }
}

fn library() -> Option<&'static LibV4l2> {
    LIBRARY
        .get_or_init(|| {
            let path = std::env::var(LIBV4L2_ENV).unwrap_or_else(|_| LIBV4L2_DEFAULT.to_string());
            if path.eq_ignore_ascii_case("none") {
                log::debug!("libv4l2 disabled by {}", LIBV4L2_ENV);
                return None;
            }
            match unsafe { LibV4l2::new(&path) } {
                Ok(lib) => {
                    log::debug!("Loaded {}", path);
                    Some(lib)
                }
                Err(err) => {
                    log::debug!("{} not available, using kernel syscalls: {}", path, err);
                    None
                }
            }
        })
        .as_ref()
}

fn check(ret: c_int) -> io::Result<c_int> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

/// Open a device node, returning the raw descriptor.
pub fn open(path: &CStr, flags: c_int) -> io::Result<RawFd> {
    let fd = match library() {
        Some(lib) => unsafe { (lib.v4l2_open)(path.as_ptr(), flags) },
        None => unsafe { libc::open(path.as_ptr(), flags) },
    };
    check(fd)
}

/// Close a descriptor returned by [`open`].
pub fn close(fd: RawFd) -> io::Result<()> {
    let ret = match library() {
        Some(lib) => unsafe { (lib.v4l2_close)(fd) },
        None => unsafe { libc::close(fd) },
    };
    check(ret).map(|_| ())
}

/// Issue an ioctl, retrying while it is interrupted by a signal.
///
/// Goes through `v4l2_ioctl` when libv4l2 is loaded and through the
/// nix-generated kernel call otherwise.
///
/// # Safety
///
/// `arg` must point to a live `T`.
pub unsafe fn ioctl<T>(fd: RawFd, request: &Request<T>, arg: *mut T) -> io::Result<()> {
    loop {
        let result = match library() {
            Some(lib) => check(unsafe { (lib.v4l2_ioctl)(fd, request.code(), arg) }),
            None => unsafe { request.kernel(fd, arg) }.map_err(io::Error::from),
        };
        match result {
            Ok(_) => return Ok(()),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}

/// Map `length` bytes of device memory at `offset` read/write and shared.
///
/// # Safety
///
/// `fd` must be an open device descriptor from [`open`] and `offset` a
/// buffer offset reported by `VIDIOC_QUERYBUF`.
pub unsafe fn mmap(length: usize, fd: RawFd, offset: u32) -> io::Result<NonNull<c_void>> {
    let prot = libc::PROT_READ | libc::PROT_WRITE;
    let flags = libc::MAP_SHARED;
    let ptr = match library() {
        Some(lib) => unsafe {
            (lib.v4l2_mmap)(ptr::null_mut(), length, prot, flags, fd, i64::from(offset))
        },
        None => unsafe {
            libc::mmap(
                ptr::null_mut(),
                length,
                prot,
                flags,
                fd,
                offset as libc::off_t,
            )
        },
    };
    if ptr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    NonNull::new(ptr).ok_or_else(|| io::Error::new(io::ErrorKind::Other, "mmap returned null"))
}

/// Release a mapping created by [`mmap`].
///
/// # Safety
///
/// `ptr`/`length` must describe exactly one live mapping from [`mmap`], and no
/// reference into it may be used afterwards.
pub unsafe fn munmap(ptr: NonNull<c_void>, length: usize) -> io::Result<()> {
    let ret = match library() {
        Some(lib) => unsafe { (lib.v4l2_munmap)(ptr.as_ptr(), length) },
        None => unsafe { libc::munmap(ptr.as_ptr(), length) },
    };
    check(ret).map(|_| ())
}

/// Wait up to `timeout_ms` for `fd` to become readable.
///
/// Returns `Ok(true)` when readable and `Ok(false)` on timeout. An interrupted
/// wait is reported as [`io::ErrorKind::Interrupted`] so callers decide
/// whether to retry.
pub fn poll_readable(fd: RawFd, timeout_ms: c_int) -> io::Result<bool> {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let ret = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
    match check(ret)? {
        0 => Ok(false),
        _ if pfd.revents & (libc::POLLERR | libc::POLLNVAL) != 0 => Err(io::Error::new(
            io::ErrorKind::Other,
            "device reported an error condition",
        )),
        _ => Ok(true),
    }
}
