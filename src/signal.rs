//! Activity light.
//!
//! Flash sequences run on short-lived threads so callers never wait on
//! them. A shared lock is held for a whole sequence, so two overlapping
//! requests play one after the other instead of interleaving.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use nrpe_agent::signal::LedFlasher;
//!
//! let flasher = LedFlasher::disabled();
//! let sequence = flasher.flash(2, Duration::ZERO, Duration::ZERO);
//! sequence.join().unwrap();
//! ```

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::warn;

/// Default on and off pulse length.
pub const DEFAULT_FLASH: Duration = Duration::from_millis(200);

/// A light that can be switched on and off.
pub trait Led: Send + Sync + 'static {
    fn set(&self, on: bool) -> io::Result<()>;
}

/// LED driven through `/sys/class/leds/<name>/brightness`.
#[derive(Debug, Clone)]
pub struct SysfsLed {
    brightness_path: PathBuf,
}

impl SysfsLed {
    pub fn new(brightness_path: impl Into<PathBuf>) -> Self {
        Self {
            brightness_path: brightness_path.into(),
        }
    }
}

impl Led for SysfsLed {
    fn set(&self, on: bool) -> io::Result<()> {
        fs::write(&self.brightness_path, if on { "1" } else { "0" })
    }
}

/// No light attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLed;

impl Led for NoLed {
    fn set(&self, _on: bool) -> io::Result<()> {
        Ok(())
    }
}

/// Fire-and-forget flasher for a single LED.
///
/// Cheap to clone; clones share the LED and its sequence lock.
#[derive(Clone)]
pub struct LedFlasher {
    led: Arc<dyn Led>,
    sequence_lock: Arc<Mutex<()>>,
}

impl LedFlasher {
    pub fn new(led: impl Led) -> Self {
        Self {
            led: Arc::new(led),
            sequence_lock: Arc::new(Mutex::new(())),
        }
    }

    /// A flasher with no light behind it.
    pub fn disabled() -> Self {
        Self::new(NoLed)
    }

    /// Flash `pulses` times. Returns immediately; join the handle to wait
    /// for the sequence to finish.
    pub fn flash(&self, pulses: u32, on: Duration, off: Duration) -> JoinHandle<()> {
        let led = self.led.clone();
        let lock = self.sequence_lock.clone();

        thread::spawn(move || {
            let _sequence = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            for _ in 0..pulses {
                if let Err(e) = led.set(true) {
                    warn!("LED write failed: {}", e);
                    return;
                }
                thread::sleep(on);
                if let Err(e) = led.set(false) {
                    warn!("LED write failed: {}", e);
                    return;
                }
                thread::sleep(off);
            }
        })
    }

    /// Flash with the default pulse lengths.
    pub fn pulse(&self, pulses: u32) -> JoinHandle<()> {
        self.flash(pulses, DEFAULT_FLASH, DEFAULT_FLASH)
    }
}

impl std::fmt::Debug for LedFlasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedFlasher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every state change.
    #[derive(Default)]
    struct Recorder {
        log: Mutex<Vec<bool>>,
    }

    struct Recording(Arc<Recorder>);

    impl Led for Recording {
        fn set(&self, on: bool) -> io::Result<()> {
            self.0.log.lock().unwrap().push(on);
            Ok(())
        }
    }

    #[test]
    fn test_pulse_count() {
        let recorder = Arc::new(Recorder::default());
        let flasher = LedFlasher::new(Recording(recorder.clone()));
        flasher.flash(3, Duration::ZERO, Duration::ZERO).join().unwrap();

        let log = recorder.log.lock().unwrap();
        assert_eq!(log.len(), 6);
        assert!(log.chunks(2).all(|pair| pair[0] && !pair[1]));
    }

    #[test]
    fn test_overlapping_sequences_do_not_interleave() {
        let recorder = Arc::new(Recorder::default());
        let flasher = LedFlasher::new(Recording(recorder.clone()));

        let a = flasher.flash(4, Duration::from_millis(2), Duration::from_millis(2));
        let b = flasher.flash(4, Duration::from_millis(2), Duration::from_millis(2));
        a.join().unwrap();
        b.join().unwrap();

        let log = recorder.log.lock().unwrap();
        assert_eq!(log.len(), 16);
        // Strict on/off alternation means no sequence cut into another.
        for (i, on) in log.iter().enumerate() {
            assert_eq!(*on, i % 2 == 0);
        }
    }

    #[test]
    fn test_sysfs_led_writes_brightness() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brightness");
        let led = SysfsLed::new(&path);

        led.set(true).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "1");
        led.set(false).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "0");
    }

    #[test]
    fn test_failing_led_ends_sequence() {
        struct Broken;
        impl Led for Broken {
            fn set(&self, _on: bool) -> io::Result<()> {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
            }
        }

        let flasher = LedFlasher::new(Broken);
        flasher.flash(5, Duration::ZERO, Duration::ZERO).join().unwrap();
    }
}
