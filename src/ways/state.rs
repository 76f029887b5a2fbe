// The wayland singleton
//
// Climate is the "top" of the wayland hierarchy: the struct every
// Dispatch/GlobalDispatch impl in this directory runs against. It
// owns the core Compositor plus whatever additional bookkeeping the
// wire layer itself needs (the surface-id lookup table keyed by the
// resource's wl_surface, since wayland-server userdata already gives
// us that association per-resource). Grounded on the teacher's
// Compositor/EventManager split in ways/compositor.rs, collapsed into
// one struct since this core runs single-threaded (spec §5) and has
// no need for EventManager's separate thread-owned fields.

use crate::compositor::Compositor;

pub struct Climate {
    pub compositor: Compositor,
}

impl Climate {
    pub fn new() -> Climate {
        Climate {
            compositor: Compositor::new(),
        }
    }
}

impl Default for Climate {
    fn default() -> Self {
        Climate::new()
    }
}
