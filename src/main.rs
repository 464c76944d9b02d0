use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

use wsd::config::ServerConfig;
use wsd::core::{timestamp_ms, ServerContext, WindowEvent};
use wsd::core::window::WindowId;
use wsd::util::logging::{self, SERVER};

/// Reactor wake-up interval; bounds key-repeat jitter and reaping latency.
const POLL_INTERVAL_MS: i32 = 10;
/// Dead-client reaping runs every this many wake-ups.
const REAP_EVERY: u32 = 100;

static RUNNING: AtomicBool = AtomicBool::new(true);

extern "C" fn request_stop(_: libc::c_int) {
    RUNNING.store(false, Ordering::SeqCst);
}

/// Until a protocol front-end is attached, window events only go to the log.
struct LogDispatch;

impl wsd::core::WindowEventDispatch for LogDispatch {
    fn deliver(&mut self, event: WindowEvent, window: WindowId) -> bool {
        tracing::debug!(target: SERVER, "-> window {}: {:?}", window, event);
        true
    }
}

fn install_signal_handlers() -> Result<()> {
    let action = SigAction::new(SigHandler::Handler(request_stop), SaFlags::empty(), SigSet::empty());
    for signal in [Signal::SIGINT, Signal::SIGTERM] {
        // SAFETY: the handler only stores to an atomic.
        unsafe { sigaction(signal, &action) }.with_context(|| format!("installing {:?} handler", signal))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    logging::init();

    let config = ServerConfig::resolve(std::env::args_os().nth(1).map(Into::into))
        .context("loading server configuration")?;
    let mut server = ServerContext::open(config).context("starting window server")?;
    install_signal_handlers()?;

    let mut dispatch = LogDispatch;
    let mut fds = [libc::pollfd {
        fd: server.input_fd(),
        events: libc::POLLIN,
        revents: 0,
    }];

    tracing::info!(target: SERVER, "wsd {} running", env!("CARGO_PKG_VERSION"));
    let mut wakeups: u32 = 0;
    while RUNNING.load(Ordering::SeqCst) {
        // SAFETY: `fds` is a valid array for the duration of the call.
        let ready = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, POLL_INTERVAL_MS) };
        if ready < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err).context("polling input descriptor");
        }

        if ready > 0 && fds[0].revents & libc::POLLIN != 0 {
            if let Err(e) = server.tick(&mut dispatch) {
                tracing::warn!(target: SERVER, "Input drain failed: {}", e);
            }
        }
        server.dispatch_repeats(timestamp_ms(), &mut dispatch);

        wakeups = wakeups.wrapping_add(1);
        if wakeups % REAP_EVERY == 0 {
            server.reap_dead_clients(&mut dispatch);
        }
    }

    server.shutdown();
    Ok(())
}
