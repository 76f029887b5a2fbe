// squall - the core of a Wayland display-server compositor
//
// Maintains per-client surface state under Wayland's double-buffering
// discipline (`surface`), drives a backend-fed render/commit loop
// (`output`), and coordinates a set of pluggable backend
// implementations behind one façade (`backend`). `ways` is the wire
// protocol layer that invokes these operations from wayland-server
// request callbacks; `buffer` sits on the boundary, translating a
// client buffer handle into something the render path can composite.

pub mod backend;
pub mod buffer;
pub mod cli;
pub mod compositor;
pub mod error;
pub mod ids;
pub mod output;
pub mod role;
pub mod signal;
pub mod surface;
pub mod ways;
