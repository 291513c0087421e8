// Clutchify Device Session
// Grab one physical device, drive one virtual device, always restore both

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::action::Action;
use crate::input::{resolve, EventKind, PhysicalDevice, RawEvent};
use crate::key::{key_from_name, Key};
use crate::output::VirtualOutput;

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur while resolving, grabbing or driving devices
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No device found to match \"{0}\"")]
    DeviceNotFound(String),

    #[error("Invalid device pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Unknown key: {0}")]
    UnknownKey(String),

    #[error("Failed to create virtual device: {0}")]
    OutputCreation(#[source] io::Error),

    #[error("Failed to activate virtual device: {0}")]
    Activation(#[source] io::Error),

    #[error("Failed to grab device \"{device}\": {source}")]
    Grab {
        device: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to restore device \"{device}\": {source}")]
    Restore {
        device: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read events: {0}")]
    Read(#[source] io::Error),

    #[error("Failed to write to virtual device: {0}")]
    Output(#[source] io::Error),

    #[error("Session is already active")]
    AlreadyActive,

    #[error("Session is not active")]
    NotActive,
}

impl SessionError {
    /// Whether this error comes from device configuration (bad or unmatched
    /// pattern) rather than from the devices themselves.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SessionError::DeviceNotFound(_) | SessionError::InvalidPattern(_)
        )
    }
}

/// Lifecycle state of a [`DeviceSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed; nothing grabbed, virtual device not live
    Created,
    /// Physical device grabbed, virtual device live
    Active,
    /// Exited; both devices back in their default state
    Released,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Created => write!(f, "created"),
            SessionState::Active => write!(f, "active"),
            SessionState::Released => write!(f, "released"),
        }
    }
}

/// Owns one grabbed physical device and one virtual output device.
///
/// While `Active`, the physical device is excluded from normal dispatch and
/// the virtual device is live. [`DeviceSession::scoped`] guarantees the exit
/// path runs after the body; `Drop` covers panics and early returns. Leaving
/// a keyboard-class device grabbed makes it unusable until it is replugged.
pub struct DeviceSession<D: PhysicalDevice, V: VirtualOutput> {
    device: D,
    output: V,
    state: SessionState,
    running: Option<Arc<AtomicBool>>,
}

impl<D: PhysicalDevice, V: VirtualOutput> DeviceSession<D, V> {
    /// Wrap an already resolved device and a created (inactive) output.
    pub fn new(device: D, output: V) -> Self {
        Self {
            device,
            output,
            state: SessionState::Created,
            running: None,
        }
    }

    /// End the event stream once `running` is lowered.
    ///
    /// The flag is checked between reads, so a signal handler that only
    /// lowers it still lets the session leave through its exit path.
    pub fn stop_when_cleared(&mut self, running: Arc<AtomicBool>) {
        self.running = Some(running);
    }

    /// Resolve `pattern` against `candidates`, then create the output.
    ///
    /// The output is only created once a device has been found, so a
    /// configuration error never touches uinput.
    pub fn from_candidates<I, F>(pattern: &str, candidates: I, create_output: F) -> SessionResult<Self>
    where
        I: IntoIterator<Item = D>,
        F: FnOnce() -> io::Result<V>,
    {
        let device = resolve(pattern, candidates)?;
        let output = create_output().map_err(SessionError::OutputCreation)?;
        match device.path() {
            Some(path) => log::info!("Using device \"{}\" ({})", device.name(), path.display()),
            None => log::info!("Using device \"{}\"", device.name()),
        }
        Ok(Self::new(device, output))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn device_name(&self) -> &str {
        self.device.name()
    }

    /// Grab the physical device, then activate the virtual device.
    pub fn enter(&mut self) -> SessionResult<()> {
        if self.state == SessionState::Active {
            return Err(SessionError::AlreadyActive);
        }

        if let Err(source) = self.device.grab() {
            if let Err(err) = self.output.deactivate() {
                log::warn!("Virtual device cleanup after failed grab failed: {}", err);
            }
            return Err(SessionError::Grab {
                device: self.device.name().to_string(),
                source,
            });
        }

        if let Err(source) = self.output.activate() {
            if let Err(err) = self.device.ungrab() {
                log::error!(
                    "Failed to release \"{}\" after activation failure: {}",
                    self.device.name(),
                    err
                );
            }
            return Err(SessionError::Activation(source));
        }

        self.state = SessionState::Active;
        log::info!("Grabbed \"{}\"", self.device.name());
        Ok(())
    }

    /// Deactivate the virtual device, then release the physical device.
    ///
    /// Both steps are attempted even if the first fails. A restore failure
    /// wins over a deactivation failure since it leaves the device unusable.
    pub fn exit(&mut self) -> SessionResult<()> {
        if self.state != SessionState::Active {
            return Err(SessionError::NotActive);
        }
        self.state = SessionState::Released;

        let deactivated = self.output.deactivate();
        let restored = self.device.ungrab();

        match (deactivated, restored) {
            (Ok(()), Ok(())) => {
                log::info!("Released \"{}\"", self.device.name());
                Ok(())
            }
            (deactivated, Err(source)) => {
                if let Err(err) = deactivated {
                    log::error!("Failed to deactivate virtual device: {}", err);
                }
                Err(SessionError::Restore {
                    device: self.device.name().to_string(),
                    source,
                })
            }
            (Err(err), Ok(())) => Err(SessionError::Output(err)),
        }
    }

    /// Run `body` with the session active and exit afterwards, whatever the
    /// body returned.
    ///
    /// A body error is returned after exit succeeds. An exit error is never
    /// swallowed: if both fail, the body error is logged and the exit error
    /// is returned.
    pub fn scoped<T, F>(&mut self, body: F) -> SessionResult<T>
    where
        F: FnOnce(&mut Self) -> SessionResult<T>,
    {
        self.enter()?;
        let outcome = body(self);
        let exited = self.exit();

        match (outcome, exited) {
            (outcome, Ok(())) => outcome,
            (Ok(_), Err(err)) => Err(err),
            (Err(body_err), Err(exit_err)) => {
                log::error!("Session ended with error: {}", body_err);
                Err(exit_err)
            }
        }
    }

    /// Lazy stream of events from the physical device.
    ///
    /// Creating the stream does not read; each `next()` may block.
    pub fn events(&mut self) -> EventStream<'_, D> {
        EventStream::new(&mut self.device, self.running.as_deref())
    }

    /// Tap `key` on the virtual device.
    pub fn tap(&mut self, key: &str) -> SessionResult<Key> {
        tap_key(&mut self.output, key)
    }

    /// Borrow the event stream and the tapper at the same time.
    pub fn split(&mut self) -> (EventStream<'_, D>, KeyTapper<'_, V>) {
        (
            EventStream::new(&mut self.device, self.running.as_deref()),
            KeyTapper {
                output: &mut self.output,
            },
        )
    }
}

#[cfg(feature = "evdev-backend")]
impl DeviceSession<crate::input::EvdevDevice, crate::output::UinputOutput> {
    /// Resolve `pattern` among the system's input devices and prepare a
    /// uinput keyboard. Reads end once `running` is lowered.
    pub fn open(pattern: &str, running: Arc<AtomicBool>) -> SessionResult<Self> {
        let mut session = Self::from_candidates(
            pattern,
            crate::input::EvdevDevice::enumerate(),
            crate::output::UinputOutput::new,
        )?;
        session.stop_when_cleared(running);
        Ok(session)
    }
}

/// Drop implementation for DeviceSession
///
/// If the session is still active (panic unwinding, early return), exit
/// here so the physical device is never left grabbed.
impl<D: PhysicalDevice, V: VirtualOutput> Drop for DeviceSession<D, V> {
    fn drop(&mut self) {
        if self.state == SessionState::Active {
            if let Err(err) = self.exit() {
                log::error!("Cleanup on drop failed: {}", err);
            }
        }
    }
}

/// Write press, release and one sync for `name`.
fn tap_key<V: VirtualOutput + ?Sized>(output: &mut V, name: &str) -> SessionResult<Key> {
    let key = key_from_name(name).ok_or_else(|| SessionError::UnknownKey(name.to_string()))?;

    output
        .write(EventKind::Key, key.code(), Action::Press.to_i32())
        .map_err(SessionError::Output)?;
    output
        .write(EventKind::Key, key.code(), Action::Release.to_i32())
        .map_err(SessionError::Output)?;
    output.sync().map_err(SessionError::Output)?;

    log::debug!("Tapped {}", key);
    Ok(key)
}

/// Emits taps on the session's virtual device.
pub struct KeyTapper<'a, V: VirtualOutput> {
    output: &'a mut V,
}

impl<V: VirtualOutput> KeyTapper<'_, V> {
    pub fn tap(&mut self, key: &str) -> SessionResult<Key> {
        tap_key(self.output, key)
    }
}

/// Blocking, non-restartable iterator over a device's raw events.
///
/// Ends when the device reports it is closed or the session's running flag
/// is lowered. A read error is yielded once, after which the stream is
/// finished.
pub struct EventStream<'a, D: PhysicalDevice> {
    device: &'a mut D,
    running: Option<&'a AtomicBool>,
    pending: VecDeque<RawEvent>,
    finished: bool,
}

impl<'a, D: PhysicalDevice> EventStream<'a, D> {
    fn new(device: &'a mut D, running: Option<&'a AtomicBool>) -> Self {
        Self {
            device,
            running,
            pending: VecDeque::new(),
            finished: false,
        }
    }

    fn stop_requested(&self) -> bool {
        self.running
            .is_some_and(|running| !running.load(Ordering::SeqCst))
    }
}

impl<D: PhysicalDevice> Iterator for EventStream<'_, D> {
    type Item = SessionResult<RawEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            if self.finished {
                return None;
            }
            if self.stop_requested() {
                log::info!("Shutdown requested, ending event stream");
                self.finished = true;
                return None;
            }

            match self.device.read_batch() {
                Some(Ok(batch)) => self.pending.extend(batch),
                Some(Err(err)) => {
                    self.finished = true;
                    return Some(Err(SessionError::Read(err)));
                }
                None => {
                    self.finished = true;
                    return None;
                }
            }
        }
    }
}

impl<D: PhysicalDevice> std::iter::FusedIterator for EventStream<'_, D> {}
