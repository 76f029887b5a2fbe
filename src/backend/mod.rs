// Backend Implementation contract (C5)
//
// Every backend (DRM/KMS, nested-inside-host, headless) implements
// this trait. The core never branches on which one it's talking to -
// it only ever sees the capability set listed in spec §4.5, the same
// "one function-pointer table per implementation" shape the teacher
// gets from udev+input+a render node, generalized here into a trait
// object instead of a single hardcoded backend.

pub mod coordinator;

use crate::buffer::Buffer;
use std::cell::RefCell;
use std::os::unix::io::RawFd;
use std::rc::Rc;

pub use coordinator::Coordinator;

/// A single descriptor the event loop should poll, with an optional
/// callback to invoke when it becomes readable. `None` means the
/// fd's readiness is handled by the implementation itself inside
/// `on_ready()` (e.g. libinput, which wants to dispatch everything
/// buffered on the fd in one pass).
///
/// The callback is `Rc`-shared rather than uniquely owned so that the
/// Coordinator's cached poll set (spec §4.6) can hold its own Vec of
/// cheaply-cloned entries, distinct from whatever Vec the owning
/// implementation keeps internally, without needing FnMut to be
/// cloneable itself.
#[derive(Clone)]
pub struct PollFd {
    pub fd: RawFd,
    pub callback: Option<Rc<RefCell<dyn FnMut()>>>,
}

impl PollFd {
    pub fn new(fd: RawFd) -> PollFd {
        PollFd { fd, callback: None }
    }

    pub fn with_callback(fd: RawFd, callback: impl FnMut() + 'static) -> PollFd {
        PollFd {
            fd,
            callback: Some(Rc::new(RefCell::new(callback))),
        }
    }
}

/// A backend output: the thing Output::render() composites into.
/// Backends implement this over their actual swapchain/plane/shared
/// memory surface.
pub trait BackendOutput {
    /// Ask the backend to notify us (via the implementation's
    /// frame-ready event) the next time this output can accept a new
    /// frame. Does not block.
    fn schedule_frame(&mut self);

    /// Present whatever was attached/blitted this render(). On
    /// failure the Output stays alive and retries on the next
    /// schedule (spec §4.2 step 4).
    fn commit(&mut self) -> Result<(), String>;

    /// Zero-copy passthrough: attach an imported client buffer
    /// directly as this output's next frame buffer.
    fn attach_as_next_frame(&mut self, buf: &Buffer);
}

/// The primary renderer, used when a backend can't directly scan out
/// a client's buffer (format mismatch, different GPU than the one the
/// client allocated on). Blits into a swapchain buffer the backend
/// output owns.
pub trait Renderer {
    fn blit(&mut self, src: &Buffer, dst: &mut dyn BackendOutput);
}

/// A physical output as advertised by a backend implementation,
/// before the Compositor wraps it in an Output (spec §4.4
/// attach_backend).
pub struct BackendOutputHandle {
    pub name: String,
    pub make: String,
    pub model: String,
    pub physical_size_mm: (i32, i32),
    pub modes: Vec<OutputMode>,
    pub output: Box<dyn BackendOutput>,
}

#[derive(Debug, Clone, Copy)]
pub struct OutputMode {
    pub width: i32,
    pub height: i32,
    pub refresh_mhz: i32,
}

/// Pointer/keyboard/touch capability bits advertised on wl_seat
/// (spec §6). Aggregated across every implementation's `inputs` list.
bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SeatCapabilities: u32 {
        const POINTER  = 0b001;
        const KEYBOARD = 0b010;
        const TOUCH    = 0b100;
    }
}

pub struct InputDevice {
    pub name: String,
    pub capabilities: SeatCapabilities,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Drm,
    Nested,
    Headless,
}

/// The capability set every backend implementation must satisfy
/// (spec §4.5). Implemented as a trait object rather than an
/// inheritance hierarchy, per the Design Notes in spec §9.
pub trait Backend {
    fn backend_type(&self) -> BackendType;

    /// Attempt to start this implementation (open the DRM device,
    /// connect to the host compositor, ...). Returning false lets the
    /// Coordinator drop this implementation and try the next one.
    fn start(&mut self) -> bool;

    /// Stable until this implementation itself calls
    /// Coordinator::invalidate_poll_fds() ahead of the next tick
    /// (spec §4.5).
    fn poll_fds(&self) -> &[PollFd];

    /// The render node fd to use as the primary renderer, if this
    /// implementation can supply GPU-accelerated rendering.
    fn primary_render_node(&self) -> Option<RawFd>;

    fn supported_formats(&self) -> &[u32];

    /// Called once per event-loop tick after polling, so the
    /// implementation can process whatever it buffered (process
    /// libinput events, pump a DRM event fd, ...).
    fn on_ready(&mut self);

    fn deinit(&mut self);

    fn outputs(&self) -> &[BackendOutputHandle];
    fn outputs_mut(&mut self) -> &mut Vec<BackendOutputHandle>;

    fn inputs(&self) -> &[InputDevice];
}
