// Output (C3): one per physical/virtual display
//
// Schedules frames, composites mapped surfaces, dispatches frame
// callbacks. Grounded on the teacher's render loop shape (vkcomp::wm
// drives a schedule -> vsync -> commit -> callback cycle) but
// generalized to the spec's explicit (frame_pending, needs_frame)
// state machine and backend-agnostic BackendOutput trait.

use crate::backend::{BackendOutput, BackendOutputHandle, OutputMode, Renderer};
use crate::buffer::{self, Buffer, BufferProvider, ClientBuffer};
use crate::error::BackendError;
use crate::ids::OutputId;
use squall_utils::log;
use squall_utils::timing::get_current_millis;

/// How many consecutive backend commit failures mark an Output
/// unusable (spec §7: "implementation-defined threshold").
const MAX_CONSECUTIVE_FAILURES: u32 = 8;

/// A surface as seen by the render path: enough to import its buffer
/// and fire its callbacks, without Output needing to know about
/// Surface's internals or its container.
pub trait RenderSurface {
    fn committed_buffer(&self) -> Option<ClientBuffer>;
    fn fire_frame_callbacks(&mut self, time_ms: u32);
    fn is_mapped(&self) -> bool;
}

pub struct Output {
    pub id: OutputId,
    pub name: String,
    /// Metadata read from the backend output handle at creation time,
    /// not invented state (SPEC_FULL §4.2) - kept around so the
    /// wl_output global can answer geometry()/mode() on bind.
    pub make: String,
    pub model: String,
    pub physical_size_mm: (i32, i32),
    pub modes: Vec<OutputMode>,
    pub scale: i32,
    pub transform: u32,
    backend_output: Box<dyn BackendOutput>,
    frame_pending: bool,
    needs_frame: bool,
    consecutive_failures: u32,
    usable: bool,
}

impl Output {
    pub fn new(id: OutputId, name: String, backend_output: Box<dyn BackendOutput>) -> Output {
        Output {
            id,
            name,
            make: String::new(),
            model: String::new(),
            physical_size_mm: (0, 0),
            modes: Vec::new(),
            scale: 1,
            transform: 0,
            backend_output,
            frame_pending: false,
            needs_frame: false,
            consecutive_failures: 0,
            usable: true,
        }
    }

    /// Construct from a full backend-advertised handle (spec §4.4
    /// attach_backend), carrying the make/model/physical-size/modes
    /// metadata through instead of discarding it.
    pub fn from_handle(id: OutputId, handle: BackendOutputHandle) -> Output {
        Output {
            id,
            name: handle.name,
            make: handle.make,
            model: handle.model,
            physical_size_mm: handle.physical_size_mm,
            modes: handle.modes,
            scale: 1,
            transform: 0,
            backend_output: handle.output,
            frame_pending: false,
            needs_frame: false,
            consecutive_failures: 0,
            usable: true,
        }
    }

    pub fn frame_pending(&self) -> bool {
        self.frame_pending
    }

    pub fn needs_frame(&self) -> bool {
        self.needs_frame
    }

    pub fn is_usable(&self) -> bool {
        self.usable
    }

    /// schedule_frame(): spec §4.2 state machine.
    pub fn schedule_frame(&mut self) {
        if self.frame_pending {
            self.needs_frame = true;
            return;
        }
        self.backend_output.schedule_frame();
        self.frame_pending = true;
        self.needs_frame = false;
    }

    /// render(): called from the backend's frame-ready callback.
    /// Clears frame_pending first (I7), then composites every mapped
    /// surface in compositor order, then fires callbacks. If
    /// needs_frame is still set on exit, schedules another frame.
    pub fn render(
        &mut self,
        surfaces: &mut [&mut dyn RenderSurface],
        provider: &dyn BufferProvider,
        renderer: Option<&mut dyn Renderer>,
    ) -> Result<(), BackendError> {
        self.frame_pending = false;

        let mapped_count = surfaces.iter().filter(|s| s.is_mapped()).count();
        if mapped_count == 0 {
            self.send_frame_callbacks(surfaces);
            if self.needs_frame {
                self.schedule_frame();
            }
            return Ok(());
        }

        let mut renderer = renderer;
        for surf in surfaces.iter() {
            let buf = match surf.committed_buffer() {
                Some(b) => b,
                None => continue,
            };
            let imported = match buffer::import(&buf, provider) {
                Ok(b) => b,
                Err(e) => {
                    log::error!("output {:?}: buffer import failed: {}", self.id, e);
                    continue;
                }
            };
            if !imported.good() {
                continue;
            }
            match renderer.as_deref_mut() {
                // Multi-GPU / format-conversion path: blit into a
                // swapchain buffer the backend output owns.
                Some(r) => r.blit(&imported, &mut *self.backend_output),
                // Zero-copy passthrough: hand the imported buffer
                // straight to the backend as its next frame buffer.
                None => self.backend_output.attach_as_next_frame(&imported),
            }
        }

        match self.backend_output.commit() {
            Ok(()) => {
                self.consecutive_failures = 0;
            }
            Err(reason) => {
                self.consecutive_failures += 1;
                log::error!(
                    "output {:?}: commit failed ({}), consecutive failures={}",
                    self.id,
                    reason,
                    self.consecutive_failures
                );
                if self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                    self.usable = false;
                    log::error!("output {:?}: marked unusable after repeated failures", self.id);
                }
                self.send_frame_callbacks(surfaces);
                if self.needs_frame {
                    self.schedule_frame();
                }
                return Err(BackendError::new(reason));
            }
        }

        self.send_frame_callbacks(surfaces);

        if self.needs_frame {
            self.schedule_frame();
        }
        Ok(())
    }

    /// send_frame_callbacks: fires every mapped surface's current
    /// frame callbacks with the truncated-to-32-bit current time.
    pub fn send_frame_callbacks(&self, surfaces: &mut [&mut dyn RenderSurface]) {
        let now = get_current_millis();
        for surf in surfaces.iter_mut() {
            if surf.is_mapped() {
                surf.fire_frame_callbacks(now);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ShmFormat;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct FakeBackendOutput {
        scheduled: Rc<RefCell<u32>>,
        commit_result: Result<(), String>,
    }

    impl BackendOutput for FakeBackendOutput {
        fn schedule_frame(&mut self) {
            *self.scheduled.borrow_mut() += 1;
        }
        fn commit(&mut self) -> Result<(), String> {
            self.commit_result.clone()
        }
        fn attach_as_next_frame(&mut self, _buf: &Buffer) {}
    }

    struct NoProvider;
    impl BufferProvider for NoProvider {
        fn is_shm(&self, _b: &ClientBuffer) -> bool {
            false
        }
        fn is_dmabuf(&self, _b: &ClientBuffer) -> bool {
            false
        }
        fn shm_dimensions(&self, _b: &ClientBuffer) -> (i32, i32, i32, ShmFormat) {
            unreachable!()
        }
        fn shm_access(&self, _b: &ClientBuffer) -> squall_utils::MemImage {
            unreachable!()
        }
        fn dma_dimensions(&self, _b: &ClientBuffer) -> (i32, i32, u32) {
            unreachable!()
        }
        fn dma_modifier(&self, _b: &ClientBuffer) -> (u32, u32) {
            unreachable!()
        }
        fn dma_planes(&self, _b: &ClientBuffer) -> Vec<crate::buffer::DmaPlane> {
            unreachable!()
        }
    }

    struct FakeSurface {
        mapped: bool,
        fired_at: Option<u32>,
    }
    impl RenderSurface for FakeSurface {
        fn committed_buffer(&self) -> Option<ClientBuffer> {
            None
        }
        fn fire_frame_callbacks(&mut self, time_ms: u32) {
            self.fired_at = Some(time_ms);
        }
        fn is_mapped(&self) -> bool {
            self.mapped
        }
    }

    fn output(scheduled: Rc<RefCell<u32>>, commit_result: Result<(), String>) -> Output {
        Output::new(
            OutputId(1),
            "test-0".to_string(),
            Box::new(FakeBackendOutput {
                scheduled,
                commit_result,
            }),
        )
    }

    #[test]
    fn schedule_frame_state_machine() {
        let scheduled = Rc::new(RefCell::new(0));
        let mut out = output(scheduled.clone(), Ok(()));

        out.schedule_frame();
        assert!(out.frame_pending());
        assert!(!out.needs_frame());
        assert_eq!(*scheduled.borrow(), 1);

        // A second schedule_frame while one is pending just sets
        // needs_frame, no second backend call.
        out.schedule_frame();
        assert!(out.needs_frame());
        assert_eq!(*scheduled.borrow(), 1);
    }

    #[test]
    fn render_clears_frame_pending_and_reschedules_if_needed() {
        let scheduled = Rc::new(RefCell::new(0));
        let mut out = output(scheduled.clone(), Ok(()));
        out.schedule_frame();
        out.schedule_frame(); // sets needs_frame

        let mut s = FakeSurface {
            mapped: false,
            fired_at: None,
        };
        let mut surfaces: Vec<&mut dyn RenderSurface> = vec![&mut s];
        out.render(&mut surfaces, &NoProvider, None).unwrap();

        assert!(!out.frame_pending());
        // needs_frame was true at entry, so render() re-scheduled.
        assert_eq!(*scheduled.borrow(), 2);
    }

    #[test]
    fn unmapped_surface_is_never_touched_for_import_but_gets_no_callback() {
        let scheduled = Rc::new(RefCell::new(0));
        let mut out = output(scheduled, Ok(()));
        let mut s = FakeSurface {
            mapped: false,
            fired_at: None,
        };
        let mut surfaces: Vec<&mut dyn RenderSurface> = vec![&mut s];
        out.render(&mut surfaces, &NoProvider, None).unwrap();
        assert!(s.fired_at.is_none());
    }

    #[test]
    fn mapped_surface_gets_frame_callback_on_zero_mapped_shortcut() {
        // mapped() true but committed_buffer() returns None models a
        // mapped surface with nothing new to import - still gets its
        // callback fired since send_frame_callbacks only checks mapped.
        let scheduled = Rc::new(RefCell::new(0));
        let mut out = output(scheduled, Ok(()));
        let mut s = FakeSurface {
            mapped: true,
            fired_at: None,
        };
        let mut surfaces: Vec<&mut dyn RenderSurface> = vec![&mut s];
        out.render(&mut surfaces, &NoProvider, None).unwrap();
        assert!(s.fired_at.is_some());
    }

    #[test]
    fn repeated_backend_failures_mark_output_unusable() {
        let scheduled = Rc::new(RefCell::new(0));
        let mut out = output(scheduled, Err("gpu hung".to_string()));
        let mut s = FakeSurface {
            mapped: true,
            fired_at: None,
        };

        for _ in 0..MAX_CONSECUTIVE_FAILURES {
            let mut surfaces: Vec<&mut dyn RenderSurface> = vec![&mut s];
            assert!(out.render(&mut surfaces, &NoProvider, None).is_err());
        }
        assert!(!out.is_usable());
    }
}
