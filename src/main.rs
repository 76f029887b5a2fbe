// squall - binary entry point
//
// Grounded on Category5::spin()/run_forever() in the teacher
// (src/main.rs + category5/mod.rs) for the startup -> loop -> shutdown
// shape, and on EventManager::worker_thread (ways/compositor.rs) for
// the fd-watch loop itself - updated to the modern wayland-server 0.31
// Display API (`dispatch_clients`/`flush_clients` replace the
// teacher's `Display::dispatch`/`flush_clients(&mut ())`) and to a
// plain listening-socket accept loop instead of the teacher's
// wayland-rs-0.26 auto-accept, since 0.31 leaves accept() to us.

use std::os::unix::io::AsRawFd;
use std::process::ExitCode;

use wayland_server::backend::{ClientData, ClientId, DisconnectReason};
use wayland_server::{Display, ListeningSocket};

use squall::backend::coordinator::{Coordinator, CoordinatorOptions};
use squall::cli;
use squall::signal;
use squall::ways::Climate;
use squall_utils::fdwatch::FdWatch;
use squall_utils::log;
use squall_utils::timing::TimingManager;

/// Exit codes, spec §6: 0 clean shutdown, 1 startup failure, 2
/// unrecoverable loop error.
const EXIT_CLEAN: u8 = 0;
const EXIT_STARTUP_FAILURE: u8 = 1;
const EXIT_LOOP_FAILURE: u8 = 2;

struct ClientState;

impl ClientData for ClientState {
    fn initialized(&self, client_id: ClientId) {
        log::debug!("client {:?} connected", client_id);
    }

    fn disconnected(&self, client_id: ClientId, reason: DisconnectReason) {
        log::debug!("client {:?} disconnected: {:?}", client_id, reason);
    }
}

fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = match cli::parse(argv) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("squall: {}", e);
            eprint!("{}", cli::USAGE);
            return ExitCode::from(EXIT_STARTUP_FAILURE);
        }
    };

    if args.help {
        print!("{}", cli::USAGE);
        return ExitCode::from(EXIT_CLEAN);
    }

    if args.verbose {
        // SAFETY: called once, before any other thread exists or any
        // SQUALL_LOG read happens (the log macros read it lazily on
        // first use).
        unsafe {
            std::env::set_var("SQUALL_LOG", "verbose");
        }
    }

    match run(&args) {
        Ok(()) => ExitCode::from(EXIT_CLEAN),
        Err(Fault::Startup(e)) => {
            log::error!("startup failed: {}", e);
            ExitCode::from(EXIT_STARTUP_FAILURE)
        }
        Err(Fault::Loop(e)) => {
            log::error!("event loop failed: {}", e);
            ExitCode::from(EXIT_LOOP_FAILURE)
        }
    }
}

enum Fault {
    Startup(squall_utils::Error),
    Loop(squall_utils::Error),
}

fn run(args: &cli::Args) -> Result<(), Fault> {
    signal::install().map_err(Fault::Startup)?;

    // spec §6 Environment: no XDG_RUNTIME_DIR, no socket, refuse to
    // start rather than guess a fallback directory.
    std::env::var("XDG_RUNTIME_DIR")
        .map_err(|_| Fault::Startup(squall_utils::anyhow!("XDG_RUNTIME_DIR is not set")))?;

    let mut display: Display<Climate> = Display::new().map_err(|e| Fault::Startup(e.into()))?;
    let dh = display.handle();

    let socket = ListeningSocket::bind_auto("wayland", 0..33).map_err(|e| Fault::Startup(e.into()))?;
    let socket_name = socket
        .socket_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    // SAFETY: single-threaded at this point in startup, before the
    // event loop or any client thread exists.
    unsafe {
        std::env::set_var("WAYLAND_DISPLAY", &socket_name);
    }
    log::debug!("listening on wayland socket {}", socket_name);

    let mut state = Climate::new();

    // No backend drivers ship with this core (spec §2: Backend
    // Implementation is an external collaborator) - the coordinator is
    // created empty and attached anyway, so schedule_frame()'s
    // zero-output no-op path (spec §8 scenario 6) is what actually
    // drives the compositor when run stand-alone. A real deployment
    // supplies its own `Vec<Box<dyn Backend>>` before calling
    // attach_backend, e.g. from a separate crate wiring up DRM/KMS.
    let coordinator = std::rc::Rc::new(std::cell::RefCell::new(Coordinator::create(
        Vec::new(),
        CoordinatorOptions::default(),
    )));
    coordinator.borrow_mut().start();
    state.compositor.attach_backend(coordinator.clone());

    register_globals(&dh, &state);

    if let Err(e) = event_loop(display, socket, state, coordinator.clone()) {
        coordinator.borrow_mut().deinit();
        return Err(Fault::Loop(e));
    }

    coordinator.borrow_mut().deinit();
    Ok(())
}

fn register_globals(dh: &wayland_server::DisplayHandle, state: &Climate) {
    use wayland_protocols::xdg::shell::server::xdg_wm_base::XdgWmBase;
    use wayland_protocols::wp::linux_dmabuf::zv1::server::zwp_linux_dmabuf_v1::ZwpLinuxDmabufV1;
    use wayland_server::protocol::{wl_compositor::WlCompositor, wl_output, wl_seat::WlSeat, wl_shm::WlShm, wl_subcompositor::WlSubcompositor};

    dh.create_global::<Climate, WlCompositor, _>(6, ());
    dh.create_global::<Climate, WlSubcompositor, _>(1, ());
    dh.create_global::<Climate, WlShm, _>(1, ());
    dh.create_global::<Climate, ZwpLinuxDmabufV1, _>(4, ());
    dh.create_global::<Climate, XdgWmBase, _>(5, ());
    dh.create_global::<Climate, WlSeat, _>(8, ());

    for out in state.compositor.outputs() {
        dh.create_global::<Climate, wl_output::WlOutput, _>(4, out.id);
    }
}

/// The fd-watch loop: block until the display's fd or any backend fd
/// is readable (or a pacing timer expires), drain pending client
/// connections, dispatch requests, flush replies, poll
/// `signal::shutdown_requested()` once per tick (spec §5 Cancellation:
/// "the current tick completes, and on loop entry the core proceeds
/// to shutdown").
fn event_loop(
    mut display: Display<Climate>,
    socket: ListeningSocket,
    mut state: Climate,
    coordinator: std::rc::Rc<std::cell::RefCell<Coordinator>>,
) -> squall_utils::Result<()> {
    let mut tm = TimingManager::new(15);
    tm.reset();

    loop {
        if signal::shutdown_requested() {
            log::debug!("shutdown requested, leaving event loop");
            return Ok(());
        }

        let mut fdw = FdWatch::new();
        fdw.add_fd(display.backend().poll_fd().as_raw_fd());
        fdw.add_fd(socket.as_raw_fd());
        for pfd in coordinator.borrow_mut().get_poll_fds() {
            fdw.add_fd(pfd.fd);
        }
        fdw.register_events();

        if !fdw.wait_for_events(Some(tm.time_remaining())) {
            return Err(squall_utils::anyhow!("fd watch primitive failed"));
        }

        while let Ok(Some(stream)) = socket.accept() {
            if let Err(e) = display.handle().insert_client(stream, std::sync::Arc::new(ClientState)) {
                log::error!("failed to accept client: {}", e);
            }
        }

        // Frame-ready callbacks are delivered by each Backend
        // implementation calling Compositor::on_frame_ready directly
        // (spec §4.4); on_ready() just gives an implementation a
        // chance to pump whatever it buffered (libinput events, a DRM
        // event fd, ...) before the next dispatch.
        for imp in coordinator.borrow_mut().implementations_mut() {
            imp.on_ready();
        }

        display.dispatch_clients(&mut state)?;
        display.flush_clients()?;

        if tm.is_overdue() {
            tm.reset();
        }
    }
}
