use model::ShutdownFlag;
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM, SIGUSR1, SIGUSR2};
use signal_hook::iterator::Signals;
use std::thread;
use tracing::info;

/// Installs the real OS signal handlers (§5): `SIGINT`/`SIGTERM`/`SIGUSR1`
/// set the shutdown flag (first one logs "shutting down", later ones log
/// that shutdown is already in progress); `SIGHUP`/`SIGUSR2` are caught and
/// explicitly ignored, overriding their default terminating action.
///
/// The in-process equivalent of a worker's self-`SIGUSR1` (§9) never goes
/// through this listener: a worker that finds itself the last live worker
/// calls `shutdown.set()` directly instead of raising a real signal.
pub fn install(shutdown: ShutdownFlag) -> Result<(), std::io::Error> {
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGUSR1, SIGHUP, SIGUSR2])?;

    thread::Builder::new()
        .name("signal-handler".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                match signal {
                    SIGINT | SIGTERM | SIGUSR1 => {
                        if shutdown.is_set() {
                            info!(signal, "shutdown already in progress");
                        } else {
                            info!(signal, "shutting down");
                            shutdown.set();
                        }
                    }
                    SIGHUP | SIGUSR2 => {
                        info!(signal, "ignoring signal");
                    }
                    _ => {}
                }
            }
        })
        .map(|_| ())
}
