// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Framegrab Developers

//! Kernel-backed [`VideoDevice`] and [`DeviceOpener`].

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::os::raw::c_int;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::time::Duration;

use framegrab_sys as ffi;

use super::device::{
    BufferInfo, BufferTimestamp, Capability, DequeuedBuffer, FormatDescription, Fraction,
    FrameInterval, FrameSize, NegotiatedFormat, Resolution, StepwiseInterval, StepwiseSize,
};
use super::{DeviceOpener, VideoDevice};

/// Where video4linux registers device nodes.
pub const SYSFS_CLASS_DIR: &str = "/sys/class/video4linux";

/// An open V4L2 device node.
///
/// The descriptor is closed when the value is dropped.
#[derive(Debug)]
pub struct V4l2Device {
    // not an OwnedFd: a descriptor opened by v4l2_open must be closed by v4l2_close
    fd: RawFd,
    path: String,
}

impl V4l2Device {
    /// Open `path` read/write and non-blocking.
    pub fn open(path: &str) -> io::Result<Self> {
        let c_path = CString::new(path)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL"))?;
        let fd = ffi::open(&c_path, libc::O_RDWR | libc::O_NONBLOCK)?;
        log::trace!("opened {} as fd {}", path, fd);
        Ok(V4l2Device {
            fd,
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn ioctl<T>(&self, request: &ffi::Request<T>, arg: &mut T) -> io::Result<()> {
        // SAFETY: `arg` is a live exclusive borrow of the request's argument type
        unsafe { ffi::ioctl(self.fd, request, arg as *mut T) }
    }

    /// Run an enumeration ioctl; `EINVAL` marks the end of the list.
    fn enumerate<T>(&self, request: &ffi::Request<T>, arg: &mut T) -> io::Result<bool> {
        match self.ioctl(request, arg) {
            Ok(()) => Ok(true),
            Err(err) if err.raw_os_error() == Some(libc::EINVAL) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn buffer(&self, index: u32) -> ffi::v4l2_buffer {
        ffi::v4l2_buffer {
            index,
            type_: ffi::V4L2_BUF_TYPE_VIDEO_CAPTURE,
            memory: ffi::V4L2_MEMORY_MMAP,
            ..Default::default()
        }
    }
}

impl AsRawFd for V4l2Device {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for V4l2Device {
    fn drop(&mut self) {
        if let Err(err) = ffi::close(self.fd) {
            log::warn!("closing {} failed: {}", self.path, err);
        }
    }
}

fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

impl VideoDevice for V4l2Device {
    fn capability(&self) -> io::Result<Capability> {
        let mut cap = ffi::v4l2_capability::default();
        self.ioctl(&ffi::VIDIOC_QUERYCAP, &mut cap)?;
        Ok(Capability {
            driver: c_string(&cap.driver),
            card: c_string(&cap.card),
            bus_info: c_string(&cap.bus_info),
            capabilities: cap.capabilities,
            device_caps: cap.device_caps,
        })
    }

    fn enum_format(&self, index: u32) -> io::Result<Option<FormatDescription>> {
        let mut desc = ffi::v4l2_fmtdesc {
            index,
            type_: ffi::V4L2_BUF_TYPE_VIDEO_CAPTURE,
            ..Default::default()
        };
        if !self.enumerate(&ffi::VIDIOC_ENUM_FMT, &mut desc)? {
            return Ok(None);
        }
        Ok(Some(FormatDescription {
            index,
            pixelformat: desc.pixelformat,
            description: c_string(&desc.description),
            flags: desc.flags,
        }))
    }

    fn enum_frame_size(&self, pixelformat: u32, index: u32) -> io::Result<Option<FrameSize>> {
        let mut size = ffi::v4l2_frmsizeenum {
            index,
            pixel_format: pixelformat,
            ..Default::default()
        };
        if !self.enumerate(&ffi::VIDIOC_ENUM_FRAMESIZES, &mut size)? {
            return Ok(None);
        }
        // SAFETY: the driver fills the union member selected by type_
        let entry = unsafe {
            match size.type_ {
                ffi::V4L2_FRMSIZE_TYPE_DISCRETE => FrameSize::Discrete(Resolution::new(
                    size.u.discrete.width,
                    size.u.discrete.height,
                )),
                kind => {
                    let s = size.u.stepwise;
                    let range = StepwiseSize {
                        min: Resolution::new(s.min_width, s.min_height),
                        max: Resolution::new(s.max_width, s.max_height),
                        step: Resolution::new(s.step_width, s.step_height),
                    };
                    if kind == ffi::V4L2_FRMSIZE_TYPE_CONTINUOUS {
                        FrameSize::Continuous(range)
                    } else {
                        FrameSize::Stepwise(range)
                    }
                }
            }
        };
        Ok(Some(entry))
    }

    fn enum_frame_interval(
        &self,
        pixelformat: u32,
        width: u32,
        height: u32,
        index: u32,
    ) -> io::Result<Option<FrameInterval>> {
        let mut ival = ffi::v4l2_frmivalenum {
            index,
            pixel_format: pixelformat,
            width,
            height,
            ..Default::default()
        };
        if !self.enumerate(&ffi::VIDIOC_ENUM_FRAMEINTERVALS, &mut ival)? {
            return Ok(None);
        }
        // SAFETY: the driver fills the union member selected by type_
        let entry = unsafe {
            match ival.type_ {
                ffi::V4L2_FRMIVAL_TYPE_DISCRETE => FrameInterval::Discrete(ival.u.discrete.into()),
                kind => {
                    let s = ival.u.stepwise;
                    let range = StepwiseInterval {
                        min: s.min.into(),
                        max: s.max.into(),
                        step: s.step.into(),
                    };
                    if kind == ffi::V4L2_FRMIVAL_TYPE_CONTINUOUS {
                        FrameInterval::Continuous(range)
                    } else {
                        FrameInterval::Stepwise(range)
                    }
                }
            }
        };
        Ok(Some(entry))
    }

    fn set_format(
        &self,
        width: u32,
        height: u32,
        pixelformat: u32,
    ) -> io::Result<NegotiatedFormat> {
        let mut fmt = ffi::v4l2_format {
            type_: ffi::V4L2_BUF_TYPE_VIDEO_CAPTURE,
            ..Default::default()
        };
        fmt.fmt.pix = ffi::v4l2_pix_format {
            width,
            height,
            pixelformat,
            field: ffi::V4L2_FIELD_ANY,
            ..Default::default()
        };
        self.ioctl(&ffi::VIDIOC_S_FMT, &mut fmt)?;

        // SAFETY: a capture-type format carries the pix member
        let pix = unsafe { fmt.fmt.pix };
        Ok(NegotiatedFormat {
            width: pix.width,
            height: pix.height,
            pixelformat: pix.pixelformat,
            stride: pix.bytesperline,
            size_image: pix.sizeimage,
        })
    }

    fn set_frame_interval(&self, interval: Fraction) -> io::Result<Fraction> {
        let mut parm = ffi::v4l2_streamparm {
            type_: ffi::V4L2_BUF_TYPE_VIDEO_CAPTURE,
            ..Default::default()
        };
        parm.parm.capture = ffi::v4l2_captureparm {
            timeperframe: interval.into(),
            ..Default::default()
        };
        self.ioctl(&ffi::VIDIOC_S_PARM, &mut parm)?;

        // SAFETY: a capture-type streamparm carries the capture member
        let chosen = unsafe { parm.parm.capture.timeperframe };
        Ok(chosen.into())
    }

    fn request_buffers(&self, count: u32) -> io::Result<u32> {
        let mut req = ffi::v4l2_requestbuffers {
            count,
            type_: ffi::V4L2_BUF_TYPE_VIDEO_CAPTURE,
            memory: ffi::V4L2_MEMORY_MMAP,
            ..Default::default()
        };
        self.ioctl(&ffi::VIDIOC_REQBUFS, &mut req)?;
        Ok(req.count)
    }

    fn query_buffer(&self, index: u32) -> io::Result<BufferInfo> {
        let mut buf = self.buffer(index);
        self.ioctl(&ffi::VIDIOC_QUERYBUF, &mut buf)?;
        Ok(BufferInfo {
            index,
            length: buf.length,
            // SAFETY: MMAP buffers report their offset in m.offset
            offset: unsafe { buf.m.offset },
        })
    }

    fn map_buffer(&self, info: &BufferInfo) -> io::Result<NonNull<u8>> {
        // SAFETY: the descriptor is open and the offset came from QUERYBUF
        let ptr = unsafe { ffi::mmap(info.length as usize, self.fd, info.offset)? };
        Ok(ptr.cast())
    }

    unsafe fn unmap_buffer(&self, ptr: NonNull<u8>, length: usize) -> io::Result<()> {
        // SAFETY: forwarded from the caller's contract
        unsafe { ffi::munmap(ptr.cast(), length) }
    }

    fn queue_buffer(&self, index: u32) -> io::Result<()> {
        let mut buf = self.buffer(index);
        self.ioctl(&ffi::VIDIOC_QBUF, &mut buf)
    }

    fn dequeue_buffer(&self) -> io::Result<DequeuedBuffer> {
        let mut buf = self.buffer(0);
        self.ioctl(&ffi::VIDIOC_DQBUF, &mut buf)?;
        Ok(DequeuedBuffer {
            index: buf.index,
            bytes_used: buf.bytesused,
            sequence: buf.sequence,
            timestamp: BufferTimestamp {
                sec: buf.timestamp.tv_sec as i64,
                usec: buf.timestamp.tv_usec as i64,
            },
        })
    }

    fn stream_on(&self) -> io::Result<()> {
        let mut kind = ffi::V4L2_BUF_TYPE_VIDEO_CAPTURE as c_int;
        self.ioctl(&ffi::VIDIOC_STREAMON, &mut kind)
    }

    fn stream_off(&self) -> io::Result<()> {
        let mut kind = ffi::V4L2_BUF_TYPE_VIDEO_CAPTURE as c_int;
        self.ioctl(&ffi::VIDIOC_STREAMOFF, &mut kind)
    }

    fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        let timeout_ms = timeout.as_millis().min(c_int::MAX as u128) as c_int;
        ffi::poll_readable(self.fd, timeout_ms)
    }
}

/// Opens real device nodes and scans sysfs for candidates.
#[derive(Debug, Clone)]
pub struct SystemOpener {
    class_dir: PathBuf,
    dev_dir: PathBuf,
}

impl SystemOpener {
    /// Scan `class_dir` instead of sysfs and resolve names under `dev_dir`.
    pub fn with_dirs(class_dir: impl Into<PathBuf>, dev_dir: impl Into<PathBuf>) -> Self {
        SystemOpener {
            class_dir: class_dir.into(),
            dev_dir: dev_dir.into(),
        }
    }
}

impl Default for SystemOpener {
    fn default() -> Self {
        SystemOpener::with_dirs(SYSFS_CLASS_DIR, "/dev")
    }
}

/// Sort key placing `video2` before `video10`.
fn natural_key(name: &str) -> (String, u64) {
    let digits = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    let (prefix, number) = name.split_at(name.len() - digits);
    (prefix.to_string(), number.parse().unwrap_or(0))
}

fn scan_class_dir(class_dir: &Path, dev_dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(class_dir)? {
        let entry = entry?;
        // sysfs lists devices as symlinks; real directories are not devices
        if entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort_by_key(|name| natural_key(name));

    Ok(names
        .into_iter()
        .map(|name| dev_dir.join(name).to_string_lossy().into_owned())
        .collect())
}

impl DeviceOpener for SystemOpener {
    type Device = V4l2Device;

    fn open(&self, path: &str) -> io::Result<V4l2Device> {
        V4l2Device::open(path)
    }

    fn candidates(&self) -> io::Result<Vec<String>> {
        scan_class_dir(&self.class_dir, &self.dev_dir)
    }
}
