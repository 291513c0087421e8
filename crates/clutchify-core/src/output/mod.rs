// Clutchify Output Layer
// Virtual keyboard used to inject synthesized taps

pub mod uinput;

pub use uinput::{VirtualOutput, VIRTUAL_DEVICE_NAME};
#[cfg(feature = "evdev-backend")]
pub use uinput::UinputOutput;
