// Clutchify Input Layer
// Raw events, physical device access and device resolution

mod device;
mod event;
mod resolver;

pub use device::{DeviceInfo, PhysicalDevice};
#[cfg(feature = "evdev-backend")]
pub use device::EvdevDevice;
pub use event::{is_key_event, EventKind, RawEvent, EV_ABS, EV_KEY, EV_REL, EV_SYN};
pub use resolver::resolve;
