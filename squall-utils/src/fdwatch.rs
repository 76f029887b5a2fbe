// Helper for waiting on a set of file descriptors
//
// OS-compatibility layer between the Backend Coordinator's poll set
// and the platform's readiness primitive.
extern crate nix;

#[cfg(not(target_os = "freebsd"))]
use nix::sys::select::*;

#[cfg(target_os = "freebsd")]
use nix::sys::event::*;
#[cfg(target_os = "freebsd")]
use nix::unistd::close;
use std::os::unix::io::RawFd;

// =============================================
// kqueue version
// =============================================

#[cfg(target_os = "freebsd")]
pub struct FdWatch {
    fdw_kq: RawFd,
    fdw_events: Vec<KEvent>,
}

#[cfg(target_os = "freebsd")]
impl FdWatch {
    fn read_fd_kevent(fd: RawFd) -> KEvent {
        KEvent::new(
            fd as usize,
            EventFilter::EVFILT_READ,
            EventFlag::EV_ADD,
            FilterFlag::all(),
            0,
            0,
        )
    }

    pub fn new() -> FdWatch {
        FdWatch {
            fdw_kq: kqueue().expect("Could not create kqueue"),
            fdw_events: Vec::new(),
        }
    }

    pub fn add_fd(&mut self, fd: RawFd) {
        let kev = FdWatch::read_fd_kevent(fd);
        self.fdw_events.push(kev);
    }

    pub fn register_events(&mut self) {
        kevent(self.fdw_kq, self.fdw_events.as_slice(), &mut [], 0)
            .expect("Could not register watch event with kqueue");
    }

    pub fn wait_for_events(&mut self, timeout: Option<usize>) -> bool {
        match timeout {
            Some(ms) => kevent(self.fdw_kq, &[], self.fdw_events.as_mut_slice(), ms).is_ok(),
            None => kevent_ts(self.fdw_kq, &[], self.fdw_events.as_mut_slice(), None).is_ok(),
        }
    }
}

#[cfg(target_os = "freebsd")]
impl Drop for FdWatch {
    fn drop(&mut self) {
        close(self.fdw_kq).expect("Could not close FdWatch kqueue fd");
    }
}

// =============================================
// Generic select
// =============================================

#[cfg(not(target_os = "freebsd"))]
pub struct FdWatch {
    fdw_fds: Vec<RawFd>,
}

#[cfg(not(target_os = "freebsd"))]
impl FdWatch {
    pub fn new() -> FdWatch {
        FdWatch { fdw_fds: Vec::new() }
    }

    pub fn add_fd(&mut self, fd: RawFd) {
        self.fdw_fds.push(fd);
    }

    pub fn register_events(&mut self) {
        // select doesn't need up-front registration
    }

    /// timeout in ms. Returns true if something is ready to be read.
    pub fn wait_for_events(&mut self, timeout: Option<usize>) -> bool {
        use crate::fdwatch::nix::sys::time::TimeValLike;

        let mut fdset = FdSet::new();
        for fd in self.fdw_fds.iter() {
            fdset.insert(*fd);
        }

        let mut out = timeout.map(|ms| nix::sys::time::TimeVal::milliseconds(ms as i64));
        select(None, Some(&mut fdset), None, None, out.as_mut()).is_ok()
    }
}

// Note: this watcher doesn't own the fds it tracks (they belong to
// the Backend Coordinator's poll set), so it must not close them on
// drop - only an owned fd set (like the coordinator's idle_fd) closes
// its own descriptors.
#[cfg(not(target_os = "freebsd"))]
impl Drop for FdWatch {
    fn drop(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::pipe;
    use std::os::unix::io::AsRawFd;

    #[test]
    fn wait_returns_immediately_when_readable() {
        // pipe() hands back owned fds; FdWatch only ever borrows the
        // raw number (it tracks fds it doesn't own), so r/w stay alive
        // for the whole test and close themselves on drop.
        let (r, w) = pipe().unwrap();
        let mut fdw = FdWatch::new();
        fdw.add_fd(r.as_raw_fd());
        fdw.register_events();

        nix::unistd::write(&w, b"x").unwrap();
        assert!(fdw.wait_for_events(Some(1000)));
    }
}
