// A set of helper structs shared by every piece of squall
//
// squall contributors - 2024
pub mod fdwatch;
#[macro_use]
pub mod logging;
pub mod log;
pub mod region;
pub mod timing;

use std::ops::Deref;
use std::slice;

extern crate anyhow;
pub use anyhow::{anyhow, Context, Error, Result};

/// Represents a raw pointer to a region of memory containing an image
/// buffer.
///
/// *Does Not* free the memory when it is dropped - this is used to
/// represent shm buffers borrowed from a client, not buffers we own.
#[derive(Debug)]
pub struct MemImage {
    ptr: *const u8,
    /// size of the pixel elements, in bytes
    pub element_size: usize,
    pub width: usize,
    pub height: usize,
    /// The number of pixels between the start of one row and the next.
    /// Zero means tightly packed.
    pub stride: u32,
}

#[allow(dead_code)]
impl MemImage {
    pub fn new(ptr: *const u8, element_size: usize, width: usize, height: usize) -> MemImage {
        MemImage {
            ptr,
            element_size,
            width,
            height,
            stride: 0,
        }
    }

    pub fn set_stride(&mut self, stride: u32) {
        self.stride = stride;
    }

    pub fn as_slice(&self) -> &[u8] {
        if !self.ptr.is_null() {
            unsafe { slice::from_raw_parts(self.ptr, self.width * self.height * self.element_size) }
        } else {
            panic!("Trying to dereference null pointer");
        }
    }
}

// Needed so a MemImage can be handed across the render path. The
// consumer must use it before the backing wl_buffer is released.
unsafe impl Send for MemImage {}

impl Deref for MemImage {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// Helper to perform max on PartialOrd types
///
/// We use PartialOrd so that floating point scale/offset values are
/// also accepted
pub fn partial_max<T: PartialOrd>(a: T, b: T) -> T {
    if a >= b {
        a
    } else {
        b
    }
}

/// Helper to perform min on PartialOrd types
pub fn partial_min<T: PartialOrd>(a: T, b: T) -> T {
    if a <= b {
        a
    } else {
        b
    }
}
