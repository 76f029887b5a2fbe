// wl_compositor, wl_surface, wl_region
//
// wl_compositor only ever does two things: mint a wl_surface or mint
// a wl_region (spec §4.4 create_region, §6). wl_surface forwards each
// request straight into the matching Surface operation (spec §4.1);
// commit additionally triggers the recursive child-commit walk that
// Surface::commit_local deliberately leaves to its caller. Grounded
// on ways::compositor::Compositor::create_surface and
// ways::wl_region::register_new in the teacher, adapted from
// Arc<Mutex<_>> userdata to Rc<RefCell<_>>, matching since this wire
// layer runs on the same single thread as the rest of the core.

use squall_utils::log;
use squall_utils::region::{Rect, Region};
use std::cell::RefCell;
use std::rc::Rc;

use wayland_server::protocol::{wl_compositor, wl_region, wl_surface};
use wayland_server::{DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource};

use crate::compositor::Compositor;
use crate::surface::Surface;
use crate::ways::Climate;

impl GlobalDispatch<wl_compositor::WlCompositor, ()> for Climate {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &wayland_server::Client,
        resource: New<wl_compositor::WlCompositor>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }
}

impl Dispatch<wl_compositor::WlCompositor, ()> for Climate {
    fn request(
        state: &mut Self,
        _client: &wayland_server::Client,
        _resource: &wl_compositor::WlCompositor,
        request: wl_compositor::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_compositor::Request::CreateSurface { id } => {
                let surf = state.compositor.create_surface();
                data_init.init(id, surf);
            }
            wl_compositor::Request::CreateRegion { id } => {
                let region = Rc::new(RefCell::new(state.compositor.create_region()));
                data_init.init(id, region);
            }
            _ => (),
        }
    }
}

impl Dispatch<wl_region::WlRegion, Rc<RefCell<Region>>> for Climate {
    fn request(
        _state: &mut Self,
        _client: &wayland_server::Client,
        _resource: &wl_region::WlRegion,
        request: wl_region::Request,
        data: &Rc<RefCell<Region>>,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        let mut region = data.borrow_mut();
        match request {
            wl_region::Request::Add {
                x,
                y,
                width,
                height,
            } => region.add(Rect::new(x, y, width, height)),
            wl_region::Request::Subtract {
                x,
                y,
                width,
                height,
            } => region.subtract(Rect::new(x, y, width, height)),
            wl_region::Request::Destroy => (),
            _ => (),
        }
    }
}

impl Dispatch<wl_surface::WlSurface, Rc<RefCell<Surface>>> for Climate {
    fn request(
        state: &mut Self,
        _client: &wayland_server::Client,
        resource: &wl_surface::WlSurface,
        request: wl_surface::Request,
        data: &Rc<RefCell<Surface>>,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_surface::Request::Attach { buffer, x, y } => {
                let handle = buffer.map(|b| {
                    // wl_buffer's userdata is the concrete ShmBufferData
                    // or DmaBufferData set up in shm.rs/dmabuf.rs - try
                    // both, since this core doesn't know which kind of
                    // buffer the client actually bound.
                    if let Some(shm) = b.data::<Rc<crate::ways::shm::ShmBufferData>>() {
                        crate::buffer::ClientBuffer::new(Rc::new(shm.clone()))
                    } else if let Some(dma) = b.data::<Rc<crate::ways::dmabuf::DmaBufferData>>() {
                        crate::buffer::ClientBuffer::new(Rc::new(dma.clone()))
                    } else {
                        panic!("wl_buffer with unrecognized backing store");
                    }
                });
                data.borrow_mut().attach(handle, x, y);
            }
            wl_surface::Request::Damage {
                x,
                y,
                width,
                height,
            } => {
                data.borrow_mut().damage_surface(Rect::new(x, y, width, height));
            }
            wl_surface::Request::DamageBuffer {
                x,
                y,
                width,
                height,
            } => {
                data.borrow_mut().damage_buffer(Rect::new(x, y, width, height));
            }
            wl_surface::Request::SetBufferScale { scale } => {
                if let Err(e) = data.borrow_mut().set_scale(scale) {
                    resource.post_error(wl_surface::Error::InvalidScale, e.to_string());
                }
            }
            wl_surface::Request::SetBufferTransform { transform } => {
                data.borrow_mut().set_transform(transform as u32);
            }
            wl_surface::Request::SetOpaqueRegion { region } => {
                let r = region.and_then(|r| r.data::<Rc<RefCell<Region>>>().map(|r| r.borrow().clone()));
                data.borrow_mut().set_opaque_region(r);
            }
            wl_surface::Request::SetInputRegion { region } => {
                let r = region.and_then(|r| r.data::<Rc<RefCell<Region>>>().map(|r| r.borrow().clone()));
                data.borrow_mut().set_input_region(r);
            }
            wl_surface::Request::Frame { callback } => {
                let cb = callback;
                data.borrow_mut().frame(crate::surface::FrameCallback::new(move |time| {
                    cb.done(time);
                }));
            }
            wl_surface::Request::Commit => {
                if let Err(e) = commit_surface(&mut state.compositor, data.clone()) {
                    resource.post_error(surface_error_code(&e), e.to_string());
                }
            }
            wl_surface::Request::Destroy => {
                let id = data.borrow().id;
                state.compositor.destroy_surface(id, "wl_surface.destroy");
            }
            _ => (),
        }
    }
}

/// commit_surface: the Compositor-level half of commit (spec §4.1
/// step 6) - runs the local commit, then recurses into every child
/// surface so a parent commit also commits its synchronized
/// subsurfaces (spec §9 Open Question: synchronized-only, unconditional).
/// A MissingConfigure error aborts the recursion at the surface that
/// raised it; children already committed before the error stay
/// committed (the spec's "core state remains consistent" only
/// promises the offending surface's own pending state is untouched).
pub fn commit_surface(compositor: &mut Compositor, surf: Rc<RefCell<Surface>>) -> Result<(), crate::error::ProtocolError> {
    use crate::surface::CommitOutcome;

    let children: Vec<_> = {
        let mut s = surf.borrow_mut();
        let outcome = s.commit_local(&crate::ways::WireBufferProvider)?;
        if outcome == CommitOutcome::ScheduleFrame {
            compositor.schedule_frame();
        }
        s.children().to_vec()
    };

    for child_id in children {
        if let Some(child) = compositor.find_surface(child_id) {
            commit_surface(compositor, child)?;
        } else {
            log::debug!("commit_surface: child {:?} no longer exists", child_id);
        }
    }
    Ok(())
}

/// Maps a ProtocolError surfaced by commit_surface onto the wl_surface
/// error code that best describes it, rather than reporting every
/// failure as InvalidScale. wl_surface's own error enum has no entry
/// for "committed without an acked configure" (the real protocol
/// reports that as xdg_surface::Error::UnconfiguredBuffer, on a
/// different object this handler has no handle to) or for "no role
/// assigned" - both fall back to DefunctRoleObject as the closest
/// available role-related code on this object.
fn surface_error_code(e: &crate::error::ProtocolError) -> wl_surface::Error {
    use crate::error::ProtocolError;
    match e {
        ProtocolError::InvalidBufferScale(_) => wl_surface::Error::InvalidScale,
        ProtocolError::RoleConflict { .. } => wl_surface::Error::DefunctRoleObject,
        ProtocolError::MissingConfigure => wl_surface::Error::DefunctRoleObject,
        ProtocolError::UnknownRole => wl_surface::Error::DefunctRoleObject,
    }
}
