// wl_shm, wl_shm_pool, and shm-backed wl_buffer
//
// Grounded on ways::shm::ShmRegion/ShmBuffer in the teacher: mmap the
// pool fd once, carve shm buffers out of it by offset. Adapted from
// Arc<Mutex<_>>/`unsafe impl Send` (the teacher runs this off the main
// thread) to plain Rc<RefCell<_>> since the wire layer here never
// leaves the single event-loop thread (spec §5).

use nix::sys::mman;
use squall_utils::{log, MemImage};
use std::cell::RefCell;
use std::ffi::c_void;
use std::os::unix::io::{IntoRawFd, RawFd};
use std::rc::Rc;

use wayland_server::protocol::{wl_buffer, wl_shm, wl_shm_pool};
use wayland_server::{DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource};

use crate::buffer::ShmFormat;
use crate::ways::Climate;

impl GlobalDispatch<wl_shm::WlShm, ()> for Climate {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &wayland_server::Client,
        resource: New<wl_shm::WlShm>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        let shm = data_init.init(resource, ());
        shm.format(wl_shm::Format::Argb8888);
        shm.format(wl_shm::Format::Xrgb8888);
    }
}

impl Dispatch<wl_shm::WlShm, ()> for Climate {
    fn request(
        _state: &mut Self,
        _client: &wayland_server::Client,
        resource: &wl_shm::WlShm,
        request: wl_shm::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_shm::Request::CreatePool { id, fd, size } = request {
            if size <= 0 {
                resource.post_error(wl_shm::Error::InvalidFd, "invalid pool size".to_string());
                return;
            }
            match ShmPool::new(fd.into_raw_fd(), size as usize) {
                Some(pool) => data_init.init(id, Rc::new(RefCell::new(pool))),
                None => resource.post_error(wl_shm::Error::InvalidFd, "mmap failed".to_string()),
            }
        }
    }
}

impl Dispatch<wl_shm_pool::WlShmPool, Rc<RefCell<ShmPool>>> for Climate {
    fn request(
        _state: &mut Self,
        _client: &wayland_server::Client,
        resource: &wl_shm_pool::WlShmPool,
        request: wl_shm_pool::Request,
        data: &Rc<RefCell<ShmPool>>,
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_shm_pool::Request::CreateBuffer {
                id,
                offset,
                width,
                height,
                stride,
                format,
            } => {
                let format = match format.into_result() {
                    Ok(wl_shm::Format::Argb8888) => ShmFormat::Argb8888,
                    Ok(wl_shm::Format::Xrgb8888) => ShmFormat::Xrgb8888,
                    _ => {
                        resource.post_error(wl_shm::Error::InvalidFormat, "unsupported shm format".to_string());
                        return;
                    }
                };
                log::debug!("wl_shm_pool.create_buffer: {}x{}", width, height);
                let buf = ShmBufferData {
                    pool: data.clone(),
                    offset,
                    width,
                    height,
                    stride,
                    format,
                };
                data_init.init(id, Rc::new(buf));
            }
            wl_shm_pool::Request::Resize { size } => {
                data.borrow_mut().resize(size as usize);
            }
            wl_shm_pool::Request::Destroy => (),
            _ => (),
        }
    }
}

impl Dispatch<wl_buffer::WlBuffer, Rc<ShmBufferData>> for Climate {
    fn request(
        _state: &mut Self,
        _client: &wayland_server::Client,
        _resource: &wl_buffer::WlBuffer,
        request: wl_buffer::Request,
        _data: &Rc<ShmBufferData>,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_buffer::Request::Destroy = request {}
    }
}

/// A single mmap()ed region backing one or more shm buffers.
pub struct ShmPool {
    fd: RawFd,
    ptr: *mut c_void,
    size: usize,
}

impl ShmPool {
    fn new(fd: RawFd, size: usize) -> Option<ShmPool> {
        // `fd` arrives already owned (the caller converted the
        // request's OwnedFd via into_raw_fd()) - on the failure path
        // below we must close it ourselves or it leaks.
        let ptr = unsafe {
            mman::mmap(
                std::ptr::null_mut(),
                size,
                mman::ProtFlags::PROT_READ,
                mman::MapFlags::MAP_SHARED,
                fd,
                0,
            )
        };
        let ptr = match ptr {
            Ok(p) => p,
            Err(_) => {
                let _ = nix::unistd::close(fd);
                return None;
            }
        };
        Some(ShmPool { fd, ptr, size })
    }

    fn resize(&mut self, size: usize) {
        if size <= self.size {
            return;
        }
        let old_ptr = self.ptr;
        let old_size = self.size;
        self.size = size;
        self.ptr = unsafe {
            mman::mmap(
                std::ptr::null_mut(),
                self.size,
                mman::ProtFlags::PROT_READ,
                mman::MapFlags::MAP_SHARED,
                self.fd,
                0,
            )
            .expect("could not resize shm pool mapping")
        };
        unsafe {
            let _ = mman::munmap(old_ptr, old_size);
        }
    }
}

impl Drop for ShmPool {
    fn drop(&mut self) {
        unsafe {
            let _ = mman::munmap(self.ptr, self.size);
            let _ = nix::unistd::close(self.fd);
        }
    }
}

/// A client's wl_buffer carved out of a ShmPool at a fixed offset.
/// Never owns memory of its own - the mapping lives as long as the
/// pool it was carved from (Rc keeps the pool alive for that long).
pub struct ShmBufferData {
    pool: Rc<RefCell<ShmPool>>,
    offset: i32,
    pub width: i32,
    pub height: i32,
    pub stride: i32,
    pub format: ShmFormat,
}

impl ShmBufferData {
    pub fn mem_image(&self) -> MemImage {
        let pool = self.pool.borrow();
        let mut img = MemImage::new(
            unsafe { pool.ptr.offset(self.offset as isize) } as *const u8,
            4,
            self.width as usize,
            self.height as usize,
        );
        img.set_stride((self.stride / 4) as u32);
        img
    }
}
