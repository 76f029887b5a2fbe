// wl_output
//
// Advertises {name, make, model, physical_size, modes, scale,
// transform} for one backend-advertised display (spec §6). Unlike
// compositor_global.rs/shm.rs this global is not installed once at
// startup - Compositor::attach_backend may mint Outputs after the
// display is already running (backend output hotplug), so main.rs
// creates one wl_output global per Output, keyed by its OutputId, the
// moment the Output is created. Grounded on
// ways::wl_output::WlOutput::bind in the teacher, generalized from a
// single hardcoded `get_resolution()` call to reading the matching
// Output's stored metadata and from one static global to N
// per-output globals.

use wayland_server::protocol::wl_output;
use wayland_server::protocol::wl_output::{Mode, Subpixel, Transform};
use wayland_server::{DataInit, DisplayHandle, GlobalDispatch, New, Resource};

use crate::ids::OutputId;
use crate::ways::Climate;

impl GlobalDispatch<wl_output::WlOutput, OutputId> for Climate {
    fn bind(
        state: &mut Self,
        _handle: &DisplayHandle,
        _client: &wayland_server::Client,
        resource: New<wl_output::WlOutput>,
        global_data: &OutputId,
        data_init: &mut DataInit<'_, Self>,
    ) {
        let out = data_init.init(resource, *global_data);

        let output = match state.compositor.find_output_mut(*global_data) {
            Some(o) => o,
            // The backend removed this output between global
            // advertisement and the client's bind racing in; send
            // nothing further, wayland-server will tear the object
            // down when the global itself is destroyed.
            None => return,
        };

        out.geometry(
            0,
            0,
            output.physical_size_mm.0,
            output.physical_size_mm.1,
            Subpixel::Unknown,
            output.make.clone(),
            output.model.clone(),
            transform_from_wire(output.transform),
        );

        if output.modes.is_empty() {
            // No modes advertised by the backend: still report
            // *something* current, matching the teacher's always-one-mode
            // fallback rather than sending a mode-less output.
            out.mode(Mode::Current, 0, 0, 0);
        } else {
            for (i, mode) in output.modes.iter().enumerate() {
                let mut flags = Mode::empty();
                if i == 0 {
                    flags |= Mode::Current;
                }
                out.mode(flags, mode.width, mode.height, mode.refresh_mhz);
            }
        }

        if out.version() >= wl_output::EVT_SCALE_SINCE {
            out.scale(output.scale);
        }
        if out.version() >= wl_output::EVT_NAME_SINCE {
            out.name(output.name.clone());
        }

        out.done();
    }
}

impl wayland_server::Dispatch<wl_output::WlOutput, OutputId> for Climate {
    fn request(
        _state: &mut Self,
        _client: &wayland_server::Client,
        _resource: &wl_output::WlOutput,
        request: wl_output::Request,
        _data: &OutputId,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_output::Request::Release = request {}
    }
}

fn transform_from_wire(transform: u32) -> Transform {
    match transform {
        1 => Transform::_90,
        2 => Transform::_180,
        3 => Transform::_270,
        4 => Transform::Flipped,
        5 => Transform::Flipped90,
        6 => Transform::Flipped180,
        7 => Transform::Flipped270,
        _ => Transform::Normal,
    }
}
