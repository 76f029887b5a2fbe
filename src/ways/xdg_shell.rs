// xdg_wm_base, xdg_surface, xdg_toplevel, xdg_popup
//
// Grounded on ways::xdg_shell::ShellSurface in the teacher, trimmed
// to the handshake the core's invariants actually need: get_toplevel/
// get_popup assign a Role (I1, monotonic), mark the surface as
// needing a configure ack, and send an initial configure; ack_configure
// clears that flag on the Surface itself, which is what rejects a
// commit before any ack with ProtocolError::MissingConfigure (spec
// §7, Surface::commit_local). Window geometry, resize edges, and the
// full xdg_toplevel state bitset the teacher tracks
// (maximized/fullscreen/resizing/...) are wire-layer bookkeeping
// outside this core's scope (the core only cares about role +
// committed buffer).

use std::cell::RefCell;
use std::rc::Rc;

use squall_utils::log;
use wayland_protocols::xdg::shell::server::{xdg_popup, xdg_positioner, xdg_surface, xdg_toplevel, xdg_wm_base};
use wayland_server::{DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource};

use crate::error::ProtocolError;
use crate::role::Role;
use crate::surface::Surface;
use crate::ways::Climate;

impl GlobalDispatch<xdg_wm_base::XdgWmBase, ()> for Climate {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &wayland_server::Client,
        resource: New<xdg_wm_base::XdgWmBase>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }
}

impl Dispatch<xdg_wm_base::XdgWmBase, ()> for Climate {
    fn request(
        state: &mut Self,
        _client: &wayland_server::Client,
        _resource: &xdg_wm_base::XdgWmBase,
        request: xdg_wm_base::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            xdg_wm_base::Request::GetXdgSurface { id, surface } => {
                let surf = surface.data::<Rc<RefCell<Surface>>>().unwrap().clone();
                let shell_surface = Rc::new(RefCell::new(ShellSurface { surface: surf }));
                data_init.init(id, shell_surface);
            }
            xdg_wm_base::Request::CreatePositioner { id } => {
                data_init.init(id, ());
            }
            xdg_wm_base::Request::Destroy => (),
            _ => (),
        }
        let _ = state;
    }
}

impl Dispatch<xdg_positioner::XdgPositioner, ()> for Climate {
    fn request(
        _state: &mut Self,
        _client: &wayland_server::Client,
        _resource: &xdg_positioner::XdgPositioner,
        _request: xdg_positioner::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        // Anchor/gravity/constraint bookkeeping for popup placement
        // lives entirely in the wire layer; this core positions
        // nothing on the client's behalf.
    }
}

impl Dispatch<xdg_surface::XdgSurface, Rc<RefCell<ShellSurface>>> for Climate {
    fn request(
        state: &mut Self,
        _client: &wayland_server::Client,
        resource: &xdg_surface::XdgSurface,
        request: xdg_surface::Request,
        data: &Rc<RefCell<ShellSurface>>,
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            xdg_surface::Request::GetToplevel { id } => {
                if let Err(e) = assign_role(&data.borrow().surface, Role::Toplevel) {
                    resource.post_error(xdg_surface::Error::NotConstructed, e.to_string());
                    return;
                }
                data.borrow().surface.borrow_mut().mark_configure_required();
                let toplevel = data_init.init(id, data.clone());
                toplevel.configure(0, 0, Vec::new());
                send_configure(&mut state.compositor, resource, data);
            }
            xdg_surface::Request::GetPopup { id, .. } => {
                if let Err(e) = assign_role(&data.borrow().surface, Role::Popup) {
                    resource.post_error(xdg_surface::Error::NotConstructed, e.to_string());
                    return;
                }
                data.borrow().surface.borrow_mut().mark_configure_required();
                let popup = data_init.init(id, data.clone());
                popup.configure(0, 0, 0, 0);
                send_configure(&mut state.compositor, resource, data);
            }
            xdg_surface::Request::SetWindowGeometry { .. } => (),
            xdg_surface::Request::AckConfigure { serial: _ } => {
                data.borrow().surface.borrow_mut().ack_configure();
            }
            xdg_surface::Request::Destroy => (),
            _ => (),
        }
    }
}

impl Dispatch<xdg_toplevel::XdgToplevel, Rc<RefCell<ShellSurface>>> for Climate {
    fn request(
        _state: &mut Self,
        _client: &wayland_server::Client,
        _resource: &xdg_toplevel::XdgToplevel,
        request: xdg_toplevel::Request,
        _data: &Rc<RefCell<ShellSurface>>,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            xdg_toplevel::Request::SetTitle { title } => log::debug!("xdg_toplevel.set_title: {}", title),
            xdg_toplevel::Request::SetAppId { app_id } => log::debug!("xdg_toplevel.set_app_id: {}", app_id),
            xdg_toplevel::Request::Destroy => (),
            // Maximize/fullscreen/move/resize are compositor-policy
            // requests with no effect on the state this core tracks.
            _ => (),
        }
    }
}

impl Dispatch<xdg_popup::XdgPopup, Rc<RefCell<ShellSurface>>> for Climate {
    fn request(
        _state: &mut Self,
        _client: &wayland_server::Client,
        _resource: &xdg_popup::XdgPopup,
        request: xdg_popup::Request,
        _data: &Rc<RefCell<ShellSurface>>,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        if let xdg_popup::Request::Destroy = request {}
    }
}

fn assign_role(surface: &Rc<RefCell<Surface>>, role: Role) -> Result<(), ProtocolError> {
    surface.borrow_mut().set_role(role)
}

/// Mint a new serial and send the matching xdg_surface.configure,
/// the event that starts the ack_configure handshake (spec §7
/// MissingConfigure).
fn send_configure(compositor: &mut crate::compositor::Compositor, xdg_surface: &xdg_surface::XdgSurface, _shell: &Rc<RefCell<ShellSurface>>) {
    let serial = compositor.next_serial();
    xdg_surface.configure(serial.0);
}

/// Per-xdg_surface handshake state. Owned as userdata on the
/// xdg_surface resource and shared (same Rc) with its xdg_toplevel/
/// xdg_popup child resource once one is requested.
pub struct ShellSurface {
    pub surface: Rc<RefCell<Surface>>,
}
