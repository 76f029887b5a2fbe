// Backend Coordinator (C6)
//
// Aggregates N backend implementations into one event source with a
// cached poll set, explicit invalidation, and a single "primary
// renderer" handed out to the render path. Grounded on the teacher's
// EventManager::worker_thread fd-watch loop (utils::fdwatch), but
// generalized from "exactly one hardcoded backend" to an ordered list
// of pluggable implementations.

use super::{Backend, BackendType, PollFd};
use squall_utils::log;
use std::os::unix::io::RawFd;

pub struct CoordinatorOptions {
    pub idle_fd: RawFd,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        CoordinatorOptions { idle_fd: -1 }
    }
}

pub struct Coordinator {
    implementations: Vec<Box<dyn Backend>>,
    primary_renderer: Option<RawFd>,
    /// Always-ready descriptor used to signal pending work across
    /// the event loop (e.g. a self-pipe or eventfd). -1 means none.
    idle_fd: RawFd,
    /// Invariant I8: while Some(_), every get_poll_fds() call returns
    /// the same memory reference. I9: any mutation of `implementations`
    /// or an implementation's own fd set must invalidate this.
    poll_cache: Option<Vec<PollFd>>,
}

impl Coordinator {
    pub fn create(implementations: Vec<Box<dyn Backend>>, opts: CoordinatorOptions) -> Coordinator {
        Coordinator {
            implementations,
            primary_renderer: None,
            idle_fd: opts.idle_fd,
            poll_cache: None,
        }
    }

    /// start(): spec §4.6 failure semantics. Returns false iff no
    /// implementation started; on partial success returns true and
    /// drops the failed implementations (invalidating the cache).
    pub fn start(&mut self) -> bool {
        let mut any_started = false;
        let mut failed_indices = Vec::new();

        for (i, imp) in self.implementations.iter_mut().enumerate() {
            if imp.start() {
                any_started = true;
            } else {
                log::error!("backend implementation {} failed to start", i);
                failed_indices.push(i);
            }
        }

        for &i in failed_indices.iter().rev() {
            self.implementations.remove(i);
        }
        if !failed_indices.is_empty() {
            self.invalidate_poll_fds();
        }

        if any_started {
            self.primary_renderer = self
                .implementations
                .iter()
                .find_map(|imp| imp.primary_render_node());
        }

        any_started
    }

    /// get_poll_fds(): returns the cached slice if present, otherwise
    /// rebuilds by concatenating every implementation's poll_fds() in
    /// coordinator order, appending {idle_fd, None} if idle_fd >= 0,
    /// caching the result. This is the hot-path call made once per
    /// event-loop tick and must not allocate when the cache is warm.
    pub fn get_poll_fds(&mut self) -> &[PollFd] {
        if self.poll_cache.is_none() {
            let mut fds = Vec::new();
            for imp in self.implementations.iter() {
                fds.extend(imp.poll_fds().iter().cloned());
            }
            if self.idle_fd >= 0 {
                fds.push(PollFd::new(self.idle_fd));
            }
            self.poll_cache = Some(fds);
        }
        self.poll_cache.as_ref().unwrap()
    }

    /// invalidate_poll_fds(): I9. Implementations MUST call this (via
    /// the Coordinator they were registered with) before yielding to
    /// the event loop whenever their own fd set changes topology.
    pub fn invalidate_poll_fds(&mut self) {
        self.poll_cache = None;
    }

    pub fn primary_renderer(&self) -> Option<RawFd> {
        self.primary_renderer
    }

    pub fn implementations(&self) -> &[Box<dyn Backend>] {
        &self.implementations
    }

    pub fn implementations_mut(&mut self) -> &mut [Box<dyn Backend>] {
        &mut self.implementations
    }

    /// If multiple implementations claim the same output identifier,
    /// the first wins (spec §4.6). Used by Compositor::attach_backend
    /// when it walks backend outputs to mint Output objects.
    pub fn first_implementation_of(&self, backend_type: BackendType) -> Option<&Box<dyn Backend>> {
        self.implementations.iter().find(|i| i.backend_type() == backend_type)
    }

    pub fn deinit(&mut self) {
        for imp in self.implementations.iter_mut() {
            imp.deinit();
        }
        self.implementations.clear();
        self.poll_cache = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendOutputHandle, InputDevice};

    struct FakeBackend {
        ty: BackendType,
        fds: Vec<PollFd>,
        started: bool,
        should_start: bool,
        render_node: Option<RawFd>,
    }

    impl Backend for FakeBackend {
        fn backend_type(&self) -> BackendType {
            self.ty
        }
        fn start(&mut self) -> bool {
            self.started = self.should_start;
            self.should_start
        }
        fn poll_fds(&self) -> &[PollFd] {
            &self.fds
        }
        fn primary_render_node(&self) -> Option<RawFd> {
            self.render_node
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
            &[]
        }
    }

    fn backend(fds: &[RawFd], should_start: bool) -> Box<dyn Backend> {
        Box::new(FakeBackend {
            ty: BackendType::Headless,
            fds: fds.iter().map(|f| PollFd::new(*f)).collect(),
            started: false,
            should_start,
            render_node: None,
        })
    }

    #[test]
    fn poll_cache_is_pointer_stable_until_invalidated() {
        let mut coord = Coordinator::create(
            vec![backend(&[100, 101], true)],
            CoordinatorOptions { idle_fd: 200 },
        );
        coord.start();

        let ptr1 = coord.get_poll_fds().as_ptr();
        let len1 = coord.get_poll_fds().len();
        assert_eq!(len1, 3);

        let ptr2 = coord.get_poll_fds().as_ptr();
        assert_eq!(ptr1, ptr2, "cache must return the same memory reference");

        coord.invalidate_poll_fds();
        let fds_after = coord.get_poll_fds();
        assert_eq!(fds_after.len(), 3);
        assert_eq!(fds_after[0].fd, 100);
        assert_eq!(fds_after[1].fd, 101);
        assert_eq!(fds_after[2].fd, 200);
    }

    #[test]
    fn start_with_no_working_implementation_returns_false() {
        let mut coord = Coordinator::create(vec![backend(&[1], false)], CoordinatorOptions::default());
        assert!(!coord.start());
    }

    #[test]
    fn partial_success_drops_failed_implementations() {
        let mut coord = Coordinator::create(
            vec![backend(&[1], false), backend(&[2], true)],
            CoordinatorOptions::default(),
        );
        assert!(coord.start());
        assert_eq!(coord.implementations().len(), 1);
    }

    #[test]
    fn primary_renderer_is_first_that_has_one() {
        // first implementation has no render node (None by default)
        let without_render_node = backend(&[1], true);
        let with_render_node: Box<dyn Backend> = Box::new(FakeBackend {
            ty: BackendType::Drm,
            fds: vec![],
            started: false,
            should_start: true,
            render_node: Some(42),
        });
        let mut coord = Coordinator::create(
            vec![without_render_node, with_render_node],
            CoordinatorOptions::default(),
        );
        coord.start();
        assert_eq!(coord.primary_renderer(), Some(42));
    }
}
