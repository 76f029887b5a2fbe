// Surface (C2): double-buffered per-surface state
//
// Grounded on ways::surface::Surface in the teacher, generalized from
// its atmosphere-property-table bookkeeping down to the spec's plain
// pending/current struct pair (spec §9: "model as two plain struct
// instances inside the Surface; commit moves fields by value").

use crate::buffer::{BufferProvider, ClientBuffer};
use crate::error::ProtocolError;
use crate::ids::SurfaceId;
use crate::role::Role;
use squall_utils::log;
use squall_utils::region::{Damage, Rect, Region};

/// A single-shot client notification, fired once this surface's
/// contents have been presented. Owned by whichever list currently
/// holds it (pending or current) - the move at commit is a transfer,
/// never a copy, and firing consumes it exactly once (spec §9).
pub struct FrameCallback {
    fire: Box<dyn FnOnce(u32)>,
}

impl FrameCallback {
    pub fn new(fire: impl FnOnce(u32) + 'static) -> FrameCallback {
        FrameCallback { fire: Box::new(fire) }
    }

    fn fire(self, time_ms: u32) {
        (self.fire)(time_ms);
    }
}

/// One half of a Surface's double-buffered state (spec §3).
///
/// Used verbatim for both `pending` and `current` - fields that only
/// make sense on one side (width/height are only meaningful once
/// committed) are simply left at their default on the other.
#[derive(Default)]
pub struct SurfaceState {
    pub buffer: Option<ClientBuffer>,
    pub dx: i32,
    pub dy: i32,
    pub scale: i32,
    pub transform: u32,
    pub width: i32,
    pub height: i32,
    pub surface_damage: Damage,
    pub buffer_damage: Damage,
    pub opaque_region: Option<Region>,
    pub input_region: Option<Region>,
    pub frame_callbacks: Vec<FrameCallback>,
}

impl SurfaceState {
    fn new() -> SurfaceState {
        SurfaceState {
            scale: 1,
            ..Default::default()
        }
    }
}

/// Result of a commit that requests a new frame to be scheduled.
/// Returned instead of Surface calling back into the Compositor
/// directly, so the caller (ways layer / Compositor) controls when
/// and on what the schedule happens - keeps Surface from needing an
/// owning reference to its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// current.buffer is set and current.frame_callbacks is non-empty:
    /// caller must call Compositor::schedule_frame() (spec §4.1 step 5).
    ScheduleFrame,
    NoFrame,
}

pub struct Surface {
    pub id: SurfaceId,
    role: Option<Role>,
    pub pending: SurfaceState,
    pub current: SurfaceState,
    mapped: bool,
    parent: Option<SurfaceId>,
    children: Vec<SurfaceId>,
    destroyed: bool,
    /// Set by the wire layer when a role that carries a configure
    /// handshake (xdg_toplevel/xdg_popup) is assigned; cleared by the
    /// matching ack_configure. A commit that attaches a buffer while
    /// this is set is a protocol error (spec §7, surface lifecycle
    /// "Created -> [Role assigned] -> [Configured] -> Mapped").
    needs_configure: bool,
}

impl Surface {
    pub fn new(id: SurfaceId) -> Surface {
        Surface {
            id,
            role: None,
            pending: SurfaceState::new(),
            current: SurfaceState::new(),
            mapped: false,
            parent: None,
            children: Vec::new(),
            destroyed: false,
            needs_configure: false,
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    pub fn parent(&self) -> Option<SurfaceId> {
        self.parent
    }

    pub fn children(&self) -> &[SurfaceId] {
        &self.children
    }

    /// attach(buffer?, dx, dy) - writes only into pending.
    pub fn attach(&mut self, buffer: Option<ClientBuffer>, dx: i32, dy: i32) {
        self.pending.buffer = buffer;
        self.pending.dx = dx;
        self.pending.dy = dy;
    }

    pub fn damage_surface(&mut self, rect: Rect<i32>) {
        self.pending.surface_damage.add(&rect);
    }

    pub fn damage_buffer(&mut self, rect: Rect<i32>) {
        self.pending.buffer_damage.add(&rect);
    }

    /// set_scale - I5: scale must be >= 1.
    pub fn set_scale(&mut self, scale: i32) -> Result<(), ProtocolError> {
        if scale < 1 {
            return Err(ProtocolError::InvalidBufferScale(scale));
        }
        self.pending.scale = scale;
        Ok(())
    }

    pub fn set_transform(&mut self, transform: u32) {
        self.pending.transform = transform;
    }

    pub fn set_opaque_region(&mut self, region: Option<Region>) {
        self.pending.opaque_region = region;
    }

    pub fn set_input_region(&mut self, region: Option<Region>) {
        self.pending.input_region = region;
    }

    /// frame(callback) - I4: lives in pending until commit moves it
    /// to current, or it is dropped undestroyed by a destroy() first.
    pub fn frame(&mut self, callback: FrameCallback) {
        self.pending.frame_callbacks.push(callback);
    }

    /// set_role(r, _data) - I1: role is monotonic. Re-assigning the
    /// same non-None role is treated as an idempotent success (spec
    /// §9 Open Question).
    pub fn set_role(&mut self, role: Role) -> Result<(), ProtocolError> {
        match self.role {
            None => {
                self.role = Some(role);
                Ok(())
            }
            Some(existing) if existing == role => Ok(()),
            Some(existing) => Err(ProtocolError::RoleConflict {
                existing: existing.name(),
                requested: role.name(),
            }),
        }
    }

    /// Called by the wire layer once a configure-bearing role (xdg
    /// toplevel/popup) is assigned, before the initial configure is
    /// sent.
    pub fn mark_configure_required(&mut self) {
        self.needs_configure = true;
    }

    /// Called by the wire layer on ack_configure.
    pub fn ack_configure(&mut self) {
        self.needs_configure = false;
    }

    pub fn add_child(&mut self, child: SurfaceId) {
        self.children.push(child);
    }

    /// remove_child - clears the parent back-link and swap-removes
    /// from the children list (order among the remaining children is
    /// not significant to this core; ways/ tracks sibling stacking
    /// order separately if needed).
    pub fn remove_child(&mut self, child: SurfaceId) {
        if let Some(pos) = self.children.iter().position(|c| *c == child) {
            self.children.swap_remove(pos);
        }
    }

    pub fn set_parent(&mut self, parent: Option<SurfaceId>) {
        self.parent = parent;
    }

    /// The local (non-recursive) half of commit: spec §4.1 steps 1-5.
    /// Step 6 (recursing into children) is orchestrated by the
    /// Compositor, which alone has access to sibling Surfaces.
    pub fn commit_local(&mut self, provider: &dyn BufferProvider) -> Result<CommitOutcome, ProtocolError> {
        // Step 1: move buffer/dx/dy/scale/transform into current.
        let had_new_buffer = self.pending.buffer.is_some();
        if had_new_buffer && self.needs_configure {
            return Err(ProtocolError::MissingConfigure);
        }
        if had_new_buffer {
            self.current.buffer = self.pending.buffer.take();
            let buf = self.current.buffer.as_ref().unwrap();
            let (w, h) = provider.shm_or_dma_size(buf);
            self.current.width = w;
            self.current.height = h;
        }
        self.current.dx = self.pending.dx;
        self.current.dy = self.pending.dy;
        self.current.scale = self.pending.scale;
        self.current.transform = self.pending.transform;
        self.pending.dx = 0;
        self.pending.dy = 0;

        // Sticky state: opaque/input regions are not part of the
        // damage-list reset below, they persist forward into current.
        if self.pending.opaque_region.is_some() {
            self.current.opaque_region = self.pending.opaque_region.take();
        }
        if self.pending.input_region.is_some() {
            self.current.input_region = self.pending.input_region.take();
        }

        // Step 2: replace current damage with pending damage.
        self.current.surface_damage = self.pending.surface_damage.take();
        self.current.buffer_damage = self.pending.buffer_damage.take();

        // Step 3: release+replace current frame callbacks. Anything
        // still in current but unfired is destroyed without firing -
        // simply dropping the Vec does exactly that.
        let new_callbacks = std::mem::take(&mut self.pending.frame_callbacks);
        let old_callbacks = std::mem::replace(&mut self.current.frame_callbacks, new_callbacks);
        if !old_callbacks.is_empty() {
            log::debug!(
                "surface {:?}: destroying {} unfired callback(s) replaced at commit",
                self.id,
                old_callbacks.len()
            );
        }
        drop(old_callbacks);

        // Step 4: recompute mapped.
        self.mapped = self.current.buffer.is_some();

        // Step 5: schedule a frame iff mapped with pending callbacks.
        Ok(if self.mapped && !self.current.frame_callbacks.is_empty() {
            CommitOutcome::ScheduleFrame
        } else {
            CommitOutcome::NoFrame
        })
    }

    /// frame() immediately followed by destroy(): every callback
    /// still held (pending or current) is simply dropped, destroying
    /// it without firing (I4).
    pub fn destroy(&mut self) {
        self.destroyed = true;
        self.pending.frame_callbacks.clear();
        self.current.frame_callbacks.clear();
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Fire every callback currently held by `current` with the given
    /// timestamp, then clear the list. Each callback is destroyed
    /// exactly once (spec §4.2 send_frame_callbacks).
    pub fn fire_frame_callbacks(&mut self, time_ms: u32) {
        let callbacks = std::mem::take(&mut self.current.frame_callbacks);
        for cb in callbacks {
            cb.fire(time_ms);
        }
    }
}

impl crate::output::RenderSurface for Surface {
    fn committed_buffer(&self) -> Option<ClientBuffer> {
        if self.mapped {
            self.current.buffer.clone()
        } else {
            None
        }
    }

    fn fire_frame_callbacks(&mut self, time_ms: u32) {
        Surface::fire_frame_callbacks(self, time_ms);
    }

    fn is_mapped(&self) -> bool {
        self.mapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ShmFormat;
    use squall_utils::MemImage;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct FakeProvider;
    impl BufferProvider for FakeProvider {
        fn is_shm(&self, _b: &ClientBuffer) -> bool {
            true
        }
        fn is_dmabuf(&self, _b: &ClientBuffer) -> bool {
            false
        }
        fn shm_dimensions(&self, _b: &ClientBuffer) -> (i32, i32, i32, ShmFormat) {
            (100, 50, 400, ShmFormat::Argb8888)
        }
        fn shm_access(&self, _b: &ClientBuffer) -> MemImage {
            MemImage::new(std::ptr::null(), 4, 100, 50)
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

    fn buf() -> ClientBuffer {
        ClientBuffer::new(Rc::new(()))
    }

    #[test]
    fn attach_then_commit_maps_surface() {
        let mut s = Surface::new(SurfaceId(1));
        assert!(!s.is_mapped());
        s.attach(Some(buf()), 0, 0);
        assert!(!s.is_mapped());
        s.commit_local(&FakeProvider).unwrap();
        assert!(s.is_mapped());
        assert!(s.pending.buffer.is_none());
        assert!(s.current.buffer.is_some());
    }

    #[test]
    fn commit_clears_pending_damage_and_callbacks() {
        let mut s = Surface::new(SurfaceId(1));
        s.attach(Some(buf()), 0, 0);
        s.damage_surface(Rect::new(0, 0, 10, 10));
        s.frame(FrameCallback::new(|_| {}));
        s.commit_local(&FakeProvider).unwrap();

        assert!(s.pending.buffer.is_none());
        assert!(s.pending.surface_damage.is_empty());
        assert!(s.pending.frame_callbacks.is_empty());
    }

    #[test]
    fn frame_callback_fires_exactly_once_with_timestamp() {
        let fired = Rc::new(RefCell::new(None));
        let fired2 = fired.clone();
        let mut s = Surface::new(SurfaceId(1));
        s.attach(Some(buf()), 0, 0);
        s.frame(FrameCallback::new(move |t| *fired2.borrow_mut() = Some(t)));
        s.commit_local(&FakeProvider).unwrap();

        s.fire_frame_callbacks(12345);
        assert_eq!(*fired.borrow(), Some(12345));
        assert!(s.current.frame_callbacks.is_empty());
    }

    #[test]
    fn frame_then_destroy_never_fires() {
        let fired = Rc::new(RefCell::new(false));
        let fired2 = fired.clone();
        let mut s = Surface::new(SurfaceId(1));
        s.frame(FrameCallback::new(move |_| *fired2.borrow_mut() = true));
        s.destroy();
        assert!(!*fired.borrow());
    }

    #[test]
    fn unfired_current_callback_is_replaced_not_appended() {
        let fired_old = Rc::new(RefCell::new(false));
        let fired_old2 = fired_old.clone();
        let mut s = Surface::new(SurfaceId(1));
        s.attach(Some(buf()), 0, 0);
        s.frame(FrameCallback::new(move |_| *fired_old2.borrow_mut() = true));
        s.commit_local(&FakeProvider).unwrap();
        assert_eq!(s.current.frame_callbacks.len(), 1);

        // Second commit with no new frame() request: current's
        // leftover callback is dropped without firing, not appended.
        s.commit_local(&FakeProvider).unwrap();
        assert!(s.current.frame_callbacks.is_empty());
        assert!(!*fired_old.borrow());
    }

    #[test]
    fn attach_before_ack_configure_is_rejected() {
        let mut s = Surface::new(SurfaceId(1));
        s.mark_configure_required();
        s.attach(Some(buf()), 0, 0);
        assert_eq!(s.commit_local(&FakeProvider), Err(ProtocolError::MissingConfigure));
        // Rejected commit leaves pending state untouched.
        assert!(s.pending.buffer.is_some());
        assert!(!s.is_mapped());

        s.ack_configure();
        assert!(s.commit_local(&FakeProvider).is_ok());
        assert!(s.is_mapped());
    }

    #[test]
    fn commit_with_no_buffer_is_allowed_before_ack_configure() {
        // The initial null commit a client sends right after creating
        // an xdg_toplevel, before attaching anything, is not a
        // protocol error.
        let mut s = Surface::new(SurfaceId(1));
        s.mark_configure_required();
        assert!(s.commit_local(&FakeProvider).is_ok());
        assert!(!s.is_mapped());
    }

    #[test]
    fn role_is_monotonic() {
        let mut s = Surface::new(SurfaceId(1));
        assert_eq!(s.set_role(Role::Toplevel), Ok(()));
        assert_eq!(
            s.set_role(Role::Popup),
            Err(ProtocolError::RoleConflict {
                existing: "toplevel",
                requested: "popup"
            })
        );
        assert_eq!(s.set_role(Role::Toplevel), Ok(()));
    }

    #[test]
    fn scale_must_be_positive() {
        let mut s = Surface::new(SurfaceId(1));
        assert!(s.set_scale(0).is_err());
        assert!(s.set_scale(-1).is_err());
        assert!(s.set_scale(2).is_ok());
    }

    #[test]
    fn two_commits_with_no_pending_mutation_are_idempotent() {
        let mut s = Surface::new(SurfaceId(1));
        s.attach(Some(buf()), 0, 0);
        s.commit_local(&FakeProvider).unwrap();
        let w1 = s.current.width;
        let h1 = s.current.height;
        s.commit_local(&FakeProvider).unwrap();
        assert_eq!(s.current.width, w1);
        assert_eq!(s.current.height, h1);
        assert!(s.current.buffer.is_some());
    }

    #[test]
    fn set_scale_then_commit_twice_matches_single_commit() {
        let mut a = Surface::new(SurfaceId(1));
        a.set_scale(3).unwrap();
        a.commit_local(&FakeProvider).unwrap();
        a.set_scale(3).unwrap();
        a.commit_local(&FakeProvider).unwrap();

        let mut b = Surface::new(SurfaceId(2));
        b.set_scale(3).unwrap();
        b.commit_local(&FakeProvider).unwrap();

        assert_eq!(a.current.scale, b.current.scale);
    }

    #[test]
    fn remove_child_clears_and_swap_removes() {
        let mut s = Surface::new(SurfaceId(1));
        s.add_child(SurfaceId(2));
        s.add_child(SurfaceId(3));
        s.remove_child(SurfaceId(2));
        assert_eq!(s.children(), &[SurfaceId(3)]);
    }
}
