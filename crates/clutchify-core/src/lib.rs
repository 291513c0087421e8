// Clutchify Core Library
// Turn a two-state switch into separate press and release taps

pub mod action;
pub mod event;
pub mod input;
pub mod key;
pub mod output;
pub mod session;
pub mod settings;

// Recording doubles shared by the unit tests
#[cfg(test)]
mod mock;

pub use action::Action;
pub use event::{classify, run_session, LoopStats, Transition};
pub use input::{resolve, DeviceInfo, EventKind, PhysicalDevice, RawEvent};
pub use key::{key_from_name, Key};
pub use output::VirtualOutput;
pub use session::{DeviceSession, EventStream, KeyTapper, SessionError, SessionResult, SessionState};
pub use settings::{Config, ConfigFile, ConfigOverrides, KeyPreset, SettingsError, TapKeys};

#[cfg(feature = "evdev-backend")]
pub use event::run;
#[cfg(feature = "evdev-backend")]
pub use input::EvdevDevice;
#[cfg(feature = "evdev-backend")]
pub use output::UinputOutput;
