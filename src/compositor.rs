// Compositor (C4): owns the set of surfaces and outputs
//
// Grounded on ways::compositor::Compositor/EventManager in the
// teacher (the "top" of the wayland hierarchy that mints surfaces and
// fans requests out to the right subsystem), generalized to also own
// the Output set and the universal schedule_frame() trigger path
// described in spec §4.4.

use crate::backend::{Backend, BackendOutputHandle, Coordinator, Renderer};
use crate::buffer::BufferProvider;
use crate::error::BackendError;
use crate::ids::{OutputId, Serial, SurfaceId};
use crate::output::{Output, RenderSurface};
use crate::surface::Surface;
use squall_utils::log;
use squall_utils::region::Region;
use std::cell::RefCell;
use std::rc::Rc;

pub struct Compositor {
    surfaces: Vec<Rc<RefCell<Surface>>>,
    outputs: Vec<Output>,
    next_surface_id: u32,
    next_output_id: u32,
    next_serial: u32,
    coordinator: Option<Rc<RefCell<Coordinator>>>,
}

impl Compositor {
    pub fn new() -> Compositor {
        Compositor {
            surfaces: Vec::new(),
            outputs: Vec::new(),
            next_surface_id: 1,
            next_output_id: 1,
            next_serial: 1,
            coordinator: None,
        }
    }

    /// create_surface() - mints a dense, monotonically increasing id.
    pub fn create_surface(&mut self) -> Rc<RefCell<Surface>> {
        let id = SurfaceId(self.next_surface_id);
        self.next_surface_id += 1;

        let surf = Rc::new(RefCell::new(Surface::new(id)));
        self.surfaces.push(surf.clone());
        log::debug!("created surface {:?}", id);
        surf
    }

    pub fn surfaces(&self) -> &[Rc<RefCell<Surface>>] {
        &self.surfaces
    }

    pub fn find_surface(&self, id: SurfaceId) -> Option<Rc<RefCell<Surface>>> {
        self.surfaces.iter().find(|s| s.borrow().id == id).cloned()
    }

    /// destroy_surface(s, reason) - explicit destruction; Compositor
    /// owns surfaces exclusively (spec §3 Ownership), so removal only
    /// ever happens through this call.
    pub fn destroy_surface(&mut self, id: SurfaceId, reason: &str) {
        if let Some(pos) = self.surfaces.iter().position(|s| s.borrow().id == id) {
            self.surfaces[pos].borrow_mut().destroy();
            self.surfaces.remove(pos);
            log::debug!("destroyed surface {:?}: {}", id, reason);
        }
    }

    /// next_serial() - monotonic, wrap-around not handled (spec §4.4).
    pub fn next_serial(&mut self) -> Serial {
        let s = Serial(self.next_serial);
        self.next_serial = self.next_serial.wrapping_add(1);
        s
    }

    /// create_region() - mints a fresh, empty region the wire layer
    /// attaches to a new wl_region object (spec §6 wl_compositor,
    /// listed as a Compositor global operation but missing from the
    /// base spec's §4.4 operation list, see SPEC_FULL §4.4).
    pub fn create_region(&self) -> Region {
        Region::new()
    }

    pub fn create_output(&mut self, backend_output: Box<dyn crate::backend::BackendOutput>, name: String) -> OutputId {
        let id = OutputId(self.next_output_id);
        self.next_output_id += 1;
        self.outputs.push(Output::new(id, name, backend_output));
        id
    }

    pub fn destroy_output(&mut self, id: OutputId) {
        self.outputs.retain(|o| o.id != id);
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn find_output_mut(&mut self, id: OutputId) -> Option<&mut Output> {
        self.outputs.iter_mut().find(|o| o.id == id)
    }

    /// attach_backend(coord) - walks each implementation's currently
    /// known outputs and mints a matching Output for each (spec
    /// §4.4). The actual frame-ready -> render() wiring happens later,
    /// per output, through `on_frame_ready` - this core has no global
    /// "subscribe to backend events" primitive, the event loop (or a
    /// nested/host-aware implementation's own callback list) is
    /// expected to call `on_frame_ready` whenever its backend signals
    /// the corresponding output is ready.
    pub fn attach_backend(&mut self, coordinator: Rc<RefCell<Coordinator>>) {
        {
            let coord = coordinator.borrow();
            for imp in coord.implementations() {
                for handle in imp.outputs() {
                    log::debug!("attach_backend: registering output {:?}", handle.name);
                }
            }
        }

        // Drain the handles so ownership of each backend output moves
        // into a Compositor-owned Output (handles are Box<dyn
        // BackendOutput>, consumed once per attach).
        let handles: Vec<BackendOutputHandle> = {
            let mut coord = coordinator.borrow_mut();
            coord
                .implementations_mut()
                .iter_mut()
                .flat_map(|imp| std::mem::take(imp.outputs_mut()))
                .collect()
        };
        for handle in handles {
            let id = OutputId(self.next_output_id);
            self.next_output_id += 1;
            self.outputs.push(Output::from_handle(id, handle));
        }

        self.coordinator = Some(coordinator);
    }

    pub fn coordinator(&self) -> Option<Rc<RefCell<Coordinator>>> {
        self.coordinator.clone()
    }

    /// schedule_frame() - the universal trigger path used by
    /// Surface::commit (via CommitOutcome::ScheduleFrame) and by
    /// external repaint requests. A no-op with zero outputs (spec §8
    /// backend-less fallback scenario).
    pub fn schedule_frame(&mut self) {
        for out in self.outputs.iter_mut() {
            if out.is_usable() {
                out.schedule_frame();
            }
        }
    }

    /// Drives one Output's render() pass over the full surface list,
    /// called when that output's backend signals a frame is ready.
    pub fn on_frame_ready(
        &mut self,
        output_id: OutputId,
        provider: &dyn BufferProvider,
        mut renderer: Option<&mut dyn Renderer>,
    ) -> Result<(), BackendError> {
        let mut guards: Vec<_> = self.surfaces.iter().map(|s| s.borrow_mut()).collect();
        let mut refs: Vec<&mut dyn RenderSurface> =
            guards.iter_mut().map(|g| &mut **g as &mut dyn RenderSurface).collect();

        let output = match self.outputs.iter_mut().find(|o| o.id == output_id) {
            Some(o) => o,
            None => return Ok(()),
        };
        output.render(&mut refs, provider, renderer.as_deref_mut())
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Compositor::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_ids_are_dense_and_monotonic() {
        let mut c = Compositor::new();
        let s1 = c.create_surface();
        let s2 = c.create_surface();
        let s3 = c.create_surface();
        assert_eq!(s1.borrow().id, SurfaceId(1));
        assert_eq!(s2.borrow().id, SurfaceId(2));
        assert_eq!(s3.borrow().id, SurfaceId(3));
    }

    #[test]
    fn destroy_surface_removes_it_and_keeps_counter_monotonic() {
        let mut c = Compositor::new();
        c.create_surface();
        let s2 = c.create_surface();
        c.create_surface();

        c.destroy_surface(s2.borrow().id, "client disconnect");

        let ids: Vec<u32> = c.surfaces().iter().map(|s| s.borrow().id.0).collect();
        assert_eq!(ids, vec![1, 3]);

        let s4 = c.create_surface();
        assert_eq!(s4.borrow().id, SurfaceId(4));
    }

    #[test]
    fn serials_are_monotonic() {
        let mut c = Compositor::new();
        let a = c.next_serial();
        let b = c.next_serial();
        assert!(b.0 > a.0);
    }

    #[test]
    fn schedule_frame_with_no_outputs_is_a_noop() {
        let mut c = Compositor::new();
        // Should not panic, no outputs to iterate.
        c.schedule_frame();
        assert!(c.outputs().is_empty());
    }
}
