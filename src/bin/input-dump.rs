//! Prints every translated input event. Useful for checking device
//! permissions and the keymap on a new machine.

use anyhow::{Context, Result};

use wsd::config::ServerConfig;
use wsd::core::input::{InputTranslator, TranslatedEvent};
use wsd::core::{timestamp_ms, EventTarget};
use wsd::util::logging::{self, INPUT};

struct Printer;

impl EventTarget for Printer {
    fn deliver(&mut self, event: TranslatedEvent) -> bool {
        match &event {
            TranslatedEvent::Key(key) => tracing::info!(
                target: INPUT,
                "key {} {:?} sym={:#06x} unmodified={:#06x} text={:?} mods={:?}{}",
                key.keycode,
                key.state,
                key.keysym.0,
                key.unmodified_keysym.0,
                key.text,
                key.modifiers,
                if key.is_repeat { " (repeat)" } else { "" }
            ),
            TranslatedEvent::PointerButton(button) => tracing::info!(
                target: INPUT,
                "button {:?} {:?} clicks={} at ({:.1}, {:.1})",
                button.button,
                button.state,
                button.click_count,
                button.position.x,
                button.position.y
            ),
            other => tracing::info!(target: INPUT, "{:?}", other),
        }
        true
    }
}

fn main() -> Result<()> {
    logging::init();

    let config = ServerConfig::resolve(std::env::args_os().nth(1).map(Into::into))
        .context("loading server configuration")?;
    let keymap = InputTranslator::load_keymap(&config).context("compiling keymap")?;
    let mut translator = InputTranslator::open(&config, keymap).context("opening input devices")?;
    let mut printer = Printer;

    let mut fds = [libc::pollfd {
        fd: translator.file_descriptor(),
        events: libc::POLLIN,
        revents: 0,
    }];
    tracing::info!(target: INPUT, "Listening on seat {}, Ctrl+C to quit", config.seat.name);

    loop {
        // SAFETY: `fds` is a valid array for the duration of the call.
        let ready = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, 10) };
        if ready < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err).context("polling input descriptor");
        }
        if ready > 0 {
            translator.process_pending(&mut printer)?;
        }
        translator.dispatch_repeats(timestamp_ms(), &mut printer);
    }
}
