//! Wire protocol layer
//!
//! Every file here implements one or two related wayland-server
//! globals as thin `Dispatch`/`GlobalDispatch` shims over `Climate`.
//! None of these files hold business logic of their own - each
//! request is demultiplexed and handed straight to the matching
//! Compositor/Surface/Output operation in the parent module. The
//! wayland wire format itself (request parsing, object lifetimes) is
//! handled entirely by `wayland-server`/`wayland-protocols`; nothing
//! here is generated code, since those two crates already ship the
//! bindings for every protocol used.

mod compositor_global;
mod dmabuf;
mod output_global;
mod provider;
mod seat;
mod shm;
mod state;
mod subcompositor;
mod xdg_shell;

pub use provider::WireBufferProvider;
pub use state::Climate;
