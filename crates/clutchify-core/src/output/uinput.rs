// Clutchify uinput Output Layer
// Virtual device creation and key event emission

use std::io;

use crate::input::EventKind;

/// A virtual input device that synthesized events are written to.
///
/// Events passed to `write` are queued until `sync`, which delivers them to
/// the kernel as one input frame.
pub trait VirtualOutput {
    /// Bring the device up so the system sees it
    fn activate(&mut self) -> io::Result<()>;

    /// Queue one event
    fn write(&mut self, kind: EventKind, code: u16, value: i32) -> io::Result<()>;

    /// Flush queued events as a single frame terminated by SYN_REPORT
    fn sync(&mut self) -> io::Result<()>;

    /// Tear the device down
    fn deactivate(&mut self) -> io::Result<()>;
}

/// Name the virtual keyboard is registered under
pub const VIRTUAL_DEVICE_NAME: &str = "Clutchify (virtual) Keyboard";

#[cfg(feature = "evdev-backend")]
pub use self::evdev_backend::UinputOutput;

#[cfg(feature = "evdev-backend")]
mod evdev_backend {
    use std::io;

    use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
    use evdev::{AttributeSet, EventType, InputEvent};

    use super::{VirtualOutput, VIRTUAL_DEVICE_NAME};
    use crate::input::EventKind;
    use crate::key::all_keys;

    enum UinputState {
        /// uinput node opened and configured, kernel device not built yet
        Pending(VirtualDeviceBuilder<'static>),
        Live(VirtualDevice),
        Closed,
    }

    /// Virtual uinput keyboard.
    ///
    /// `new` opens and configures `/dev/uinput`; the kernel device only
    /// appears on `activate` and is destroyed on `deactivate`. A deactivated
    /// output cannot be activated again.
    pub struct UinputOutput {
        state: UinputState,
        pending: Vec<InputEvent>,
    }

    impl UinputOutput {
        /// Create a new virtual uinput device (not yet active)
        pub fn new() -> io::Result<Self> {
            // Build the virtual device with keyboard support
            let mut keys = AttributeSet::new();
            for key in all_keys() {
                keys.insert(evdev::Key::new(key.code()));
            }

            let builder = VirtualDeviceBuilder::new()?
                .name(VIRTUAL_DEVICE_NAME)
                .with_keys(&keys)?;

            Ok(Self {
                state: UinputState::Pending(builder),
                pending: Vec::new(),
            })
        }

        fn live(&mut self) -> io::Result<&mut VirtualDevice> {
            match &mut self.state {
                UinputState::Live(device) => Ok(device),
                _ => Err(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "virtual device is not active",
                )),
            }
        }
    }

    impl VirtualOutput for UinputOutput {
        fn activate(&mut self) -> io::Result<()> {
            match std::mem::replace(&mut self.state, UinputState::Closed) {
                UinputState::Pending(builder) => {
                    self.state = UinputState::Live(builder.build()?);
                    log::debug!("Virtual device \"{}\" created", VIRTUAL_DEVICE_NAME);
                    Ok(())
                }
                live @ UinputState::Live(_) => {
                    self.state = live;
                    Ok(())
                }
                UinputState::Closed => Err(io::Error::other("virtual device was already closed")),
            }
        }

        fn write(&mut self, kind: EventKind, code: u16, value: i32) -> io::Result<()> {
            self.live()?;
            self.pending
                .push(InputEvent::new(EventType(kind.to_raw()), code, value));
            Ok(())
        }

        fn sync(&mut self) -> io::Result<()> {
            let events = std::mem::take(&mut self.pending);
            // emit() terminates the batch with SYN_REPORT
            self.live()?.emit(&events)
        }

        fn deactivate(&mut self) -> io::Result<()> {
            self.pending.clear();
            // Dropping the handle closes the uinput fd, which destroys the device
            self.state = UinputState::Closed;
            Ok(())
        }
    }
}
