// wl_subcompositor, wl_subsurface
//
// Assigns the Subsurface role and establishes the parent/child link
// in Surface's tree (spec §4.1 add_child/remove_child). Grounded on
// ways::wl_subcompositor::wl_subcompositor_handle_request /
// SubSurface in the teacher: set_position/place_above/place_below are
// recorded but never applied (sibling stacking order and positioning
// are window-management policy, a Non-goal per spec §1) - this
// mirrors the teacher's own SubSurface fields, minus the atmosphere
// calls that apply them.
//
// set_sync/set_desync are likewise recorded on a `sync_mode` field
// that nothing currently reads: the base design commits every child
// unconditionally and synchronously (spec §4.1 step 6, §9 Open
// Question), so a desynchronized subsurface is committed exactly the
// same way a synchronized one is. The field exists so a future
// desynchronized-commit refinement is a non-breaking addition, not a
// functioning mode switch today.

use std::cell::RefCell;
use std::rc::Rc;

use wayland_server::protocol::{wl_subcompositor, wl_subsurface};
use wayland_server::{DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource};

use crate::role::Role;
use crate::surface::Surface;
use crate::ways::Climate;

impl GlobalDispatch<wl_subcompositor::WlSubcompositor, ()> for Climate {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &wayland_server::Client,
        resource: New<wl_subcompositor::WlSubcompositor>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }
}

impl Dispatch<wl_subcompositor::WlSubcompositor, ()> for Climate {
    fn request(
        _state: &mut Self,
        _client: &wayland_server::Client,
        resource: &wl_subcompositor::WlSubcompositor,
        request: wl_subcompositor::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_subcompositor::Request::GetSubsurface { id, surface, parent } => {
                let child = surface.data::<Rc<RefCell<Surface>>>().unwrap().clone();
                let parent_surf = parent.data::<Rc<RefCell<Surface>>>().unwrap().clone();

                if let Err(e) = child.borrow_mut().set_role(Role::Subsurface) {
                    resource.post_error(wl_subcompositor::Error::BadSurface, e.to_string());
                    return;
                }

                let child_id = child.borrow().id;
                let parent_id = parent_surf.borrow().id;
                child.borrow_mut().set_parent(Some(parent_id));
                parent_surf.borrow_mut().add_child(child_id);

                data_init.init(
                    id,
                    Rc::new(RefCell::new(SubSurface {
                        surface: child,
                        parent: parent_surf,
                        sync_mode: true,
                    })),
                );
            }
            wl_subcompositor::Request::Destroy => (),
            _ => (),
        }
    }
}

impl Dispatch<wl_subsurface::WlSubsurface, Rc<RefCell<SubSurface>>> for Climate {
    fn request(
        _state: &mut Self,
        _client: &wayland_server::Client,
        _resource: &wl_subsurface::WlSubsurface,
        request: wl_subsurface::Request,
        data: &Rc<RefCell<SubSurface>>,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            // Position/stacking-order requests are wire-layer
            // bookkeeping a window-management layer would consume;
            // this core has none, so they are intentionally no-ops
            // beyond being accepted.
            wl_subsurface::Request::SetPosition { .. } => (),
            wl_subsurface::Request::PlaceAbove { .. } => (),
            wl_subsurface::Request::PlaceBelow { .. } => (),
            wl_subsurface::Request::SetSync => data.borrow_mut().sync_mode = true,
            wl_subsurface::Request::SetDesync => data.borrow_mut().sync_mode = false,
            wl_subsurface::Request::Destroy => {
                let sub = data.borrow();
                let child_id = sub.surface.borrow().id;
                sub.surface.borrow_mut().set_parent(None);
                sub.parent.borrow_mut().remove_child(child_id);
            }
            _ => (),
        }
    }
}

/// Per-wl_subsurface state. Owned as userdata on the wl_subsurface
/// resource; outlives neither the child nor the parent wl_surface.
pub struct SubSurface {
    surface: Rc<RefCell<Surface>>,
    parent: Rc<RefCell<Surface>>,
    /// Recorded but not load-bearing, see module doc comment.
    sync_mode: bool,
}
