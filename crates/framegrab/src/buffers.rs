// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Framegrab Developers

//! Memory-mapped device buffer pool.
//!
//! [`BufferPool`] is the only owner of mapped device memory. Slices handed
//! out by [`BufferPool::get`] borrow the pool, so the borrow checker rules out
//! reading a buffer after [`BufferPool::unmap`].

use std::ptr::NonNull;
use std::sync::Arc;

use crate::v4l2::VideoDevice;
use crate::Error;

/// Buffers requested from the driver.
pub const PREFERRED_BUFFER_COUNT: u32 = 4;

/// Fewest buffers that still allow one to fill while another is delivered.
pub const MIN_BUFFER_COUNT: u32 = 2;

/// One pool slot. `ptr` is `None` once unmapped.
#[derive(Debug)]
struct MappedBuffer {
    ptr: Option<NonNull<u8>>,
    length: usize,
}

/// The mapped buffers of one capture session.
pub struct BufferPool<D: VideoDevice> {
    device: Arc<D>,
    buffers: Vec<MappedBuffer>,
}

// SAFETY: the mappings are plain shared memory owned by the pool; the pointers
// are only dereferenced through `&self` borrows and released through `&mut self`.
unsafe impl<D: VideoDevice> Send for BufferPool<D> {}
unsafe impl<D: VideoDevice> Sync for BufferPool<D> {}

impl<D: VideoDevice> BufferPool<D> {
    /// Request [`PREFERRED_BUFFER_COUNT`] buffers from `device` and map all
    /// the buffers it grants.
    ///
    /// Fails with [`Error::TooFewBuffers`] when fewer than
    /// [`MIN_BUFFER_COUNT`] are granted. If any mapping fails, the buffers
    /// mapped so far are unmapped before the error is returned.
    pub fn map(device: Arc<D>) -> Result<Self, Error> {
        let granted = device
            .request_buffers(PREFERRED_BUFFER_COUNT)
            .map_err(Error::RequestBuffers)?;
        if granted < MIN_BUFFER_COUNT {
            log::error!("Device returned less than {} buffers", MIN_BUFFER_COUNT);
            return Err(Error::TooFewBuffers { granted });
        }

        let mut pool = BufferPool {
            device,
            buffers: Vec::with_capacity(granted as usize),
        };
        for index in 0..granted {
            match pool.map_one(index) {
                Ok(buffer) => pool.buffers.push(buffer),
                Err(err) => {
                    log::error!("{}", err);
                    pool.unmap();
                    return Err(err);
                }
            }
        }

        log::debug!("mapped {} buffers", pool.buffers.len());
        Ok(pool)
    }

    fn map_one(&self, index: u32) -> Result<MappedBuffer, Error> {
        let mapping = |source| Error::Mapping { index, source };
        let info = self.device.query_buffer(index).map_err(mapping)?;
        let ptr = self.device.map_buffer(&info).map_err(mapping)?;
        Ok(MappedBuffer {
            ptr: Some(ptr),
            length: info.length as usize,
        })
    }

    /// Unmap every buffer that is still mapped.
    ///
    /// Never fails; an unmap error is logged and the slot is still marked
    /// invalid. Calling this again is a no-op.
    pub fn unmap(&mut self) {
        for (index, buffer) in self.buffers.iter_mut().enumerate() {
            let Some(ptr) = buffer.ptr.take() else {
                continue;
            };
            // SAFETY: ptr/length came from map_buffer and `&mut self` proves no
            // slice from `get` is alive
            if let Err(err) = unsafe { self.device.unmap_buffer(ptr, buffer.length) } {
                log::warn!("unmapping buffer {} failed: {}", index, err);
            }
        }
    }

    /// Slots in the pool, mapped or not.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Slots whose mapping is still valid.
    pub fn mapped(&self) -> usize {
        self.buffers.iter().filter(|b| b.ptr.is_some()).count()
    }

    /// Contents of buffer `index`, or `None` if it is out of range or unmapped.
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        let buffer = self.buffers.get(index)?;
        let ptr = buffer.ptr?;
        // SAFETY: the mapping stays valid while `self` is borrowed
        Some(unsafe { std::slice::from_raw_parts(ptr.as_ptr(), buffer.length) })
    }
}

impl<D: VideoDevice> Drop for BufferPool<D> {
    fn drop(&mut self) {
        self.unmap();
    }
}
