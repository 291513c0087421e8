// Clutchify Core Loop
// Turn raw key transitions into down/up taps on the virtual device

use std::fmt;

use crate::action::Action;
use crate::input::{PhysicalDevice, RawEvent};
use crate::output::VirtualOutput;
use crate::session::{DeviceSession, SessionResult};
use crate::settings::TapKeys;

/// A key transition the loop reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Pressed,
    Released,
}

/// Classify a raw event.
///
/// Only key events with a press (1) or release (0) value count; repeats
/// and every other event type are ignored.
pub fn classify(event: &RawEvent) -> Option<Transition> {
    if !event.is_key() {
        return None;
    }
    match Action::from_i32(event.value)? {
        Action::Press => Some(Transition::Pressed),
        Action::Release => Some(Transition::Released),
        Action::Repeat => None,
    }
}

/// Counters reported when the loop ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub presses: u64,
    pub releases: u64,
    pub ignored: u64,
}

impl LoopStats {
    pub fn taps(&self) -> u64 {
        self.presses + self.releases
    }
}

impl fmt::Display for LoopStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} presses, {} releases, {} ignored events",
            self.presses, self.releases, self.ignored
        )
    }
}

/// Run `session` until its event stream ends, tapping `keys.down` on every
/// press and `keys.up` on every release.
///
/// Presses and releases are not paired: a release without a preceding press
/// (a switch released before it was scanned as pressed) still taps `up`.
/// The session is exited before any error is returned.
pub fn run_session<D, V>(session: &mut DeviceSession<D, V>, keys: &TapKeys) -> SessionResult<LoopStats>
where
    D: PhysicalDevice,
    V: VirtualOutput,
{
    session.scoped(|active| {
        let mut stats = LoopStats::default();
        let (events, mut tapper) = active.split();

        for event in events {
            let event = event?;
            match classify(&event) {
                Some(Transition::Pressed) => {
                    tapper.tap(&keys.down)?;
                    stats.presses += 1;
                }
                Some(Transition::Released) => {
                    tapper.tap(&keys.up)?;
                    stats.releases += 1;
                }
                None => {
                    log::trace!("Ignoring event {}", event);
                    stats.ignored += 1;
                }
            }
        }

        Ok(stats)
    })
}

/// Open the configured device and run the loop until `running` is lowered
/// or the device goes away.
#[cfg(feature = "evdev-backend")]
pub fn run(
    config: &crate::settings::Config,
    running: std::sync::Arc<std::sync::atomic::AtomicBool>,
) -> SessionResult<LoopStats> {
    use crate::input::EvdevDevice;
    use crate::output::UinputOutput;

    let mut session =
        DeviceSession::<EvdevDevice, UinputOutput>::open(&config.device_pattern, running)?;
    log::info!(
        "Tapping {} on press and {} on release",
        config.keys.down,
        config.keys.up
    );
    let stats = run_session(&mut session, &config.keys)?;
    log::info!("Stopped: {}", stats);
    Ok(stats)
}
