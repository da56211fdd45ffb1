// src/session.rs
//
// One monitoring session over an opened source: startup report, polling
// thread, signal wait, teardown. The source is released on every path out
// of `run_session`, before the function returns.

use std::io::Write;
use std::thread;

use nix::sys::signal::{kill, SigSet, Signal};
use nix::unistd::Pid;

use crate::config::Settings;
use crate::error::{MonitorError, Result};
use crate::modules::GpuMonitor;
use crate::sensor::TemperatureSource;
use crate::shutdown::{wait_for_signal, Shutdown};

/// Prints the device count, then polls `source` until one of the signals in
/// `signals` arrives, or for a single round when `once` is set.
///
/// `signals` must already be blocked on the calling thread (see
/// `shutdown::block_termination_signals`) so the polling thread inherits the
/// mask. Returns the number of completed rounds.
pub fn run_session<S, W>(
    source: S,
    mut out: W,
    settings: &Settings,
    once: bool,
    signals: &SigSet,
) -> Result<u64>
where
    S: TemperatureSource + Send + 'static,
    W: Write + Send + 'static,
{
    writeln!(out, "Found {} GPU(s)", source.device_count())?;
    let mut monitor = GpuMonitor::new(source, out, settings)?;

    if once {
        monitor.poll_round()?;
        return Ok(1);
    }

    let shutdown = Shutdown::new();
    let poller = {
        let shutdown = shutdown.clone();
        thread::Builder::new()
            .name("gpu-poller".into())
            .spawn(move || {
                let result = monitor.run(&shutdown);
                if let Err(e) = &result {
                    tracing::error!("polling stopped: {}", e);
                    // Wake the listener out of sigwait.
                    let _ = kill(Pid::this(), Signal::SIGTERM);
                }
                (monitor, result)
            })
            .map_err(MonitorError::Spawn)?
    };

    let waited = wait_for_signal(signals);
    shutdown.trigger();

    let (monitor, result) = poller.join().map_err(|_| MonitorError::PollerPanicked)?;
    let (source, mut out) = monitor.into_parts();
    drop(source);

    let signal = waited?;
    let rounds = result?;
    tracing::debug!("stopped on {} after {} round(s)", signal, rounds);

    // Only after the join, so it never lands inside a GPU block.
    writeln!(out, "\nShutting down...")?;
    out.flush()?;
    Ok(rounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::{block_termination_signals, termination_signals};
    use crate::sensor::Temperatures;
    use nix::sys::pthread::{pthread_kill, pthread_self};
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct CountingSource {
        count: u32,
        drops: Arc<AtomicUsize>,
    }

    impl TemperatureSource for CountingSource {
        fn device_count(&self) -> u32 {
            self.count
        }

        fn temperatures(&mut self, device: u32) -> Result<Temperatures> {
            Ok(Temperatures {
                core: 40 + device,
                junction: 50 + device,
                vram: 60 + device,
            })
        }
    }

    impl Drop for CountingSource {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn source(count: u32) -> (CountingSource, Arc<AtomicUsize>) {
        let drops = Arc::new(AtomicUsize::new(0));
        (
            CountingSource {
                count,
                drops: Arc::clone(&drops),
            },
            drops,
        )
    }

    #[test]
    fn test_no_devices_fails_and_releases_source() {
        let (source, drops) = source(0);
        let out = SharedBuf::default();

        let result = run_session(
            source,
            out.clone(),
            &Settings::default(),
            false,
            &termination_signals(),
        );

        assert!(matches!(result, Err(MonitorError::NoDevices)));
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert_eq!(out.text(), "Found 0 GPU(s)\n");
    }

    #[test]
    fn test_once_polls_one_round_and_releases_source() {
        let (source, drops) = source(2);
        let out = SharedBuf::default();

        let rounds = run_session(
            source,
            out.clone(),
            &Settings::default(),
            true,
            &termination_signals(),
        )
        .unwrap();

        assert_eq!(rounds, 1);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        let text = out.text();
        assert!(text.starts_with("Found 2 GPU(s)\n"));
        assert_eq!(text.matches("Core Temperature").count(), 2);
        assert!(!text.contains("Shutting down"));
    }

    #[test]
    fn test_signal_ends_session_after_last_block() {
        // The signal is aimed at this thread only, which has it blocked.
        let mask = block_termination_signals().unwrap();
        let me = pthread_self();
        let sender = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            pthread_kill(me, Signal::SIGINT).unwrap();
        });

        let (source, drops) = source(1);
        let out = SharedBuf::default();
        let settings = Settings {
            interval: Duration::from_millis(20),
            ..Settings::default()
        };

        let rounds = run_session(source, out.clone(), &settings, false, &mask).unwrap();
        sender.join().unwrap();

        assert!(rounds >= 1);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        let text = out.text();
        assert!(text.ends_with("VRAM Temperature:     60°C\n\nShutting down...\n"));
        assert_eq!(text.matches("Shutting down").count(), 1);
    }
}
