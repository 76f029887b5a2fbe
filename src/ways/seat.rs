// wl_seat, wl_pointer, wl_keyboard, wl_touch
//
// Advertises the pointer/keyboard/touch capability bitmask aggregated
// across every backend implementation's `inputs` list (spec §6 Seat
// global). Input *routing* - delivering motion/key/touch events to
// the focused surface - is out of scope (spec §1 Non-goals: "input
// routing beyond delivery to the focused surface"), so the objects
// created here only ever answer their destructor request; no event is
// ever sent on them by this core. Grounded on ways::seat::Seat in the
// teacher, trimmed from its keyboard-enter/pointer-enter focus
// tracking (owned by a window-management layer this core doesn't
// have) down to capability advertisement alone.

use wayland_server::protocol::{wl_keyboard, wl_pointer, wl_seat, wl_touch};
use wayland_server::{DataInit, Dispatch, DisplayHandle, GlobalDispatch, New};

use crate::backend::SeatCapabilities;
use crate::ways::Climate;

impl GlobalDispatch<wl_seat::WlSeat, ()> for Climate {
    fn bind(
        state: &mut Self,
        _handle: &DisplayHandle,
        _client: &wayland_server::Client,
        resource: New<wl_seat::WlSeat>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        let seat = data_init.init(resource, ());
        seat.capabilities(to_wire(aggregate_capabilities(state)));
    }
}

impl Dispatch<wl_seat::WlSeat, ()> for Climate {
    fn request(
        _state: &mut Self,
        _client: &wayland_server::Client,
        _resource: &wl_seat::WlSeat,
        request: wl_seat::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_seat::Request::GetPointer { id } => {
                data_init.init(id, ());
            }
            wl_seat::Request::GetKeyboard { id } => {
                data_init.init(id, ());
            }
            wl_seat::Request::GetTouch { id } => {
                data_init.init(id, ());
            }
            wl_seat::Request::Release => (),
            _ => (),
        }
    }
}

impl Dispatch<wl_pointer::WlPointer, ()> for Climate {
    fn request(
        _state: &mut Self,
        _client: &wayland_server::Client,
        _resource: &wl_pointer::WlPointer,
        request: wl_pointer::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_pointer::Request::Release = request {}
    }
}

impl Dispatch<wl_keyboard::WlKeyboard, ()> for Climate {
    fn request(
        _state: &mut Self,
        _client: &wayland_server::Client,
        _resource: &wl_keyboard::WlKeyboard,
        request: wl_keyboard::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_keyboard::Request::Release = request {}
    }
}

impl Dispatch<wl_touch::WlTouch, ()> for Climate {
    fn request(
        _state: &mut Self,
        _client: &wayland_server::Client,
        _resource: &wl_touch::WlTouch,
        request: wl_touch::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_touch::Request::Release = request {}
    }
}

/// Aggregate capability bits across every implementation's `inputs`
/// list (spec §3 Backend Implementation interface: "Plus mutable
/// state visible as outputs (ordered) and inputs").
fn aggregate_capabilities(state: &Climate) -> SeatCapabilities {
    let mut caps = SeatCapabilities::empty();
    if let Some(coord) = state.compositor.coordinator() {
        for imp in coord.borrow().implementations() {
            for device in imp.inputs() {
                caps |= device.capabilities;
            }
        }
    }
    caps
}

fn to_wire(caps: SeatCapabilities) -> wl_seat::Capability {
    let mut wire = wl_seat::Capability::empty();
    if caps.contains(SeatCapabilities::POINTER) {
        wire |= wl_seat::Capability::Pointer;
    }
    if caps.contains(SeatCapabilities::KEYBOARD) {
        wire |= wl_seat::Capability::Keyboard;
    }
    if caps.contains(SeatCapabilities::TOUCH) {
        wire |= wl_seat::Capability::Touch;
    }
    wire
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::coordinator::{Coordinator, CoordinatorOptions};
    use crate::backend::{Backend, BackendOutputHandle, BackendType, InputDevice, PollFd};
    use std::cell::RefCell;
    use std::os::unix::io::RawFd;
    use std::rc::Rc;

    #[test]
    fn empty_coordinator_advertises_no_capabilities() {
        let state = Climate::new();
        assert_eq!(aggregate_capabilities(&state), SeatCapabilities::empty());
        assert_eq!(to_wire(SeatCapabilities::empty()), wl_seat::Capability::empty());
    }

    struct FakeInputBackend {
        inputs: Vec<InputDevice>,
    }

    impl Backend for FakeInputBackend {
        fn backend_type(&self) -> BackendType {
            BackendType::Headless
        }
        fn start(&mut self) -> bool {
            true
        }
        fn poll_fds(&self) -> &[PollFd] {
            &[]
        }
        fn primary_render_node(&self) -> Option<RawFd> {
            None
        }
        fn supported_formats(&self) -> &[u32] {
            &[]
        }
        fn on_ready(&mut self) {}
        fn deinit(&mut self) {}
        fn outputs(&self) -> &[BackendOutputHandle] {
            &[]
        }
        fn outputs_mut(&mut self) -> &mut Vec<BackendOutputHandle> {
            unimplemented!()
        }
        fn inputs(&self) -> &[InputDevice] {
            &self.inputs
        }
    }

    /// Exercises the real `Compositor::attach_backend` path (not a
    /// hand-fed `Coordinator`) so this test actually catches the
    /// `Climate`/`Compositor` coordinator split the dead-field bug
    /// hid behind: wl_seat must advertise the capabilities of an
    /// implementation attached through the code main.rs itself runs.
    #[test]
    fn attached_backend_with_input_devices_advertises_capabilities() {
        let mut state = Climate::new();
        let backend: Box<dyn Backend> = Box::new(FakeInputBackend {
            inputs: vec![InputDevice {
                name: "test-kbd".to_string(),
                capabilities: SeatCapabilities::KEYBOARD | SeatCapabilities::POINTER,
            }],
        });
        let coordinator = Rc::new(RefCell::new(Coordinator::create(vec![backend], CoordinatorOptions::default())));
        coordinator.borrow_mut().start();
        state.compositor.attach_backend(coordinator);

        let caps = aggregate_capabilities(&state);
        assert_eq!(caps, SeatCapabilities::KEYBOARD | SeatCapabilities::POINTER);
        assert_eq!(
            to_wire(caps),
            wl_seat::Capability::Keyboard | wl_seat::Capability::Pointer
        );
    }
}
