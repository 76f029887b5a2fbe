// zwp_linux_dmabuf_v1
//
// Grounded on ways::linux_dmabuf in the teacher: advertise a small
// fixed format/modifier list, accumulate per-plane fd/stride/offset
// on a params object, then bake it into a wl_buffer on create/
// create_immed. Adapted from Arc<Mutex<_>> to Rc<RefCell<_>>.

use std::cell::RefCell;
use std::os::unix::io::{IntoRawFd, RawFd};
use std::rc::Rc;

use squall_utils::log;
use wayland_protocols::wp::linux_dmabuf::zv1::server::{
    zwp_linux_buffer_params_v1 as params_v1, zwp_linux_dmabuf_v1 as dmabuf_v1,
};
use wayland_server::protocol::wl_buffer;
use wayland_server::{DataInit, Dispatch, DisplayHandle, GlobalDispatch, New};

use crate::buffer::DmaPlane;
use crate::ways::Climate;

const WL_DRM_FORMAT_XRGB8888: u32 = 0x34325258;
const WL_DRM_FORMAT_ARGB8888: u32 = 0x34325241;

impl GlobalDispatch<dmabuf_v1::ZwpLinuxDmabufV1, ()> for Climate {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &wayland_server::Client,
        resource: New<dmabuf_v1::ZwpLinuxDmabufV1>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        let dma = data_init.init(resource, ());
        dma.format(WL_DRM_FORMAT_XRGB8888);
        dma.format(WL_DRM_FORMAT_ARGB8888);
        // modifier 0 == linear, the only layout this core assumes a
        // renderer-less scanout path can consume directly.
        dma.modifier(WL_DRM_FORMAT_XRGB8888, 0, 0);
        dma.modifier(WL_DRM_FORMAT_ARGB8888, 0, 0);
    }
}

impl Dispatch<dmabuf_v1::ZwpLinuxDmabufV1, ()> for Climate {
    fn request(
        _state: &mut Self,
        _client: &wayland_server::Client,
        _resource: &dmabuf_v1::ZwpLinuxDmabufV1,
        request: dmabuf_v1::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        if let dmabuf_v1::Request::CreateParams { params_id } = request {
            let params = Rc::new(RefCell::new(Params {
                planes: Vec::new(),
                modifier: (0, 0),
            }));
            data_init.init(params_id, params);
        }
    }
}

impl Dispatch<params_v1::ZwpLinuxBufferParamsV1, Rc<RefCell<Params>>> for Climate {
    fn request(
        _state: &mut Self,
        _client: &wayland_server::Client,
        resource: &params_v1::ZwpLinuxBufferParamsV1,
        request: params_v1::Request,
        data: &Rc<RefCell<Params>>,
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            params_v1::Request::Add {
                fd,
                plane_idx: _,
                offset,
                stride,
                modifier_hi,
                modifier_lo,
            } => data.borrow_mut().add(fd.into_raw_fd(), offset, stride, modifier_hi, modifier_lo),
            params_v1::Request::CreateImmed {
                buffer_id,
                width,
                height,
                format,
                flags: _,
            } => {
                // dmabuf_v1::bind only ever advertises modifier 0 (linear) for
                // either supported format - a client asking for any other
                // modifier is asking for a layout this core can't scan out,
                // so fail the params object instead of silently baking a
                // buffer tagged with a modifier nobody agreed to.
                let modifier = data.borrow().modifier;
                if modifier != (0, 0) {
                    resource.post_error(
                        params_v1::Error::InvalidFormat,
                        format!("unsupported dmabuf modifier {:#x}:{:#x}", modifier.0, modifier.1),
                    );
                    return;
                }
                log::debug!("linux_dmabuf_params: creating wl_buffer {}x{}", width, height);
                let buf = data.borrow_mut().bake(width, height, format as u32);
                data_init.init(buffer_id, Rc::new(buf));
            }
            params_v1::Request::Destroy => (),
            // The non-immediate Create path (ask the server to mint
            // the id and emit params.created() asynchronously) is not
            // supported - matches the teacher, which only ever built
            // the create_immed path against its own renderer.
            _ => (),
        }
    }
}

impl Dispatch<wl_buffer::WlBuffer, Rc<DmaBufferData>> for Climate {
    fn request(
        _state: &mut Self,
        _client: &wayland_server::Client,
        _resource: &wl_buffer::WlBuffer,
        request: wl_buffer::Request,
        _data: &Rc<DmaBufferData>,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_buffer::Request::Destroy = request {}
    }

    fn destroyed(
        _state: &mut Self,
        _client: wayland_server::backend::ClientId,
        _resource: wayland_server::backend::ObjectId,
        data: &Rc<DmaBufferData>,
    ) {
        for plane in data.planes.iter() {
            let _ = nix::unistd::close(plane.fd);
        }
    }
}

/// Accumulates the dmabuf planes a client attaches through
/// zwp_linux_buffer_params_v1 before they are baked into a buffer.
pub struct Params {
    planes: Vec<DmaPlane>,
    modifier: (u32, u32),
}

/// Closes any plane fds a client added but never baked into a buffer
/// (destroyed params, or a client disconnect mid-setup) - `bake()`
/// clones the plane list into the DmaBufferData that owns them from
/// then on, so this only ever fires for fds that would otherwise leak.
impl Drop for Params {
    fn drop(&mut self) {
        for plane in self.planes.iter() {
            let _ = nix::unistd::close(plane.fd);
        }
    }
}

impl Params {
    fn add(&mut self, fd: RawFd, offset: u32, stride: u32, modifier_hi: u32, modifier_lo: u32) {
        self.planes.push(DmaPlane { fd, stride, offset });
        // modifier is per-buffer in this core's model (spec defers
        // per-plane modifiers to whatever the last plane specifies) -
        // checked against what was actually advertised in create_immed.
        self.modifier = (modifier_hi, modifier_lo);
    }

    /// Moves the accumulated planes into the new buffer - takes (not
    /// clones) so Params::drop doesn't then double-close fds the
    /// returned DmaBufferData now owns.
    fn bake(&mut self, width: i32, height: i32, format: u32) -> DmaBufferData {
        DmaBufferData {
            width,
            height,
            format,
            modifier: self.modifier,
            planes: std::mem::take(&mut self.planes),
        }
    }
}

pub struct DmaBufferData {
    pub width: i32,
    pub height: i32,
    pub format: u32,
    pub modifier: (u32, u32),
    pub planes: Vec<DmaPlane>,
}
