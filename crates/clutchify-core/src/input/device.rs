// Clutchify Input Layer - Physical Device
// Device access trait and the evdev-backed implementation

use std::io;
use std::path::Path;

use super::event::RawEvent;

/// A physical input device the session can grab and read from.
///
/// `read_batch` waits a bounded time for events. An empty batch means the
/// wait timed out, so the caller gets a chance to check for shutdown. It
/// returns `None` once the device is closed and no more events will ever
/// arrive.
pub trait PhysicalDevice {
    /// Human-readable device name (empty if the device reports none)
    fn name(&self) -> &str;

    /// Device node path, if known
    fn path(&self) -> Option<&Path> {
        None
    }

    /// Exclude the device from normal OS dispatch
    fn grab(&mut self) -> io::Result<()>;

    /// Restore normal OS dispatch for the device
    fn ungrab(&mut self) -> io::Result<()>;

    /// Wait for the next batch of events (empty on timeout)
    fn read_batch(&mut self) -> Option<io::Result<Vec<RawEvent>>>;
}

/// Device information for listing devices
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Device index in enumeration order
    pub index: usize,
    /// Device name
    pub name: String,
    /// Device path (if available)
    pub path: Option<String>,
}

#[cfg(feature = "evdev-backend")]
pub use self::evdev_backend::EvdevDevice;

#[cfg(feature = "evdev-backend")]
mod evdev_backend {
    use std::io;
    use std::os::unix::io::AsRawFd;
    use std::path::{Path, PathBuf};

    use evdev::Device;

    use super::{DeviceInfo, PhysicalDevice};
    use crate::input::event::RawEvent;

    /// How long a single read waits before returning an empty batch
    const POLL_INTERVAL_MS: i32 = 100;

    /// An evdev input device (`/dev/input/event*`).
    pub struct EvdevDevice {
        device: Device,
        path: PathBuf,
        name: String,
    }

    impl EvdevDevice {
        fn from_parts(path: PathBuf, device: Device) -> Self {
            let name = device.name().unwrap_or_default().to_string();
            Self {
                device,
                path,
                name,
            }
        }

        /// All input devices this process can open, in enumeration order
        pub fn enumerate() -> impl Iterator<Item = EvdevDevice> {
            evdev::enumerate().map(|(path, device)| Self::from_parts(path, device))
        }

        /// List all input devices (for the --list-devices CLI flag)
        pub fn list() -> Vec<DeviceInfo> {
            Self::enumerate()
                .enumerate()
                .map(|(index, device)| DeviceInfo {
                    index,
                    name: device.name.clone(),
                    path: device.path.to_str().map(|s| s.to_string()),
                })
                .collect()
        }

        /// Wait until the device is readable. `Ok(false)` means the wait
        /// timed out or was interrupted by a signal.
        fn wait_readable(&mut self) -> io::Result<bool> {
            let mut poll_fd = libc::pollfd {
                fd: self.device.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            };
            let poll_result = unsafe { libc::poll(&mut poll_fd, 1, POLL_INTERVAL_MS) };

            if poll_result < 0 {
                let err = io::Error::last_os_error();
                // EINTR just means a signal was delivered; let the caller re-check.
                if err.kind() == io::ErrorKind::Interrupted {
                    return Ok(false);
                }
                return Err(err);
            }

            if poll_result == 0 {
                return Ok(false);
            }

            if poll_fd.revents & libc::POLLIN != 0 {
                return Ok(true);
            }

            if poll_fd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    format!("device \"{}\" was disconnected", self.name),
                ));
            }

            Ok(false)
        }
    }

    impl PhysicalDevice for EvdevDevice {
        fn name(&self) -> &str {
            &self.name
        }

        fn path(&self) -> Option<&Path> {
            Some(&self.path)
        }

        fn grab(&mut self) -> io::Result<()> {
            self.device.grab()
        }

        fn ungrab(&mut self) -> io::Result<()> {
            self.device.ungrab()
        }

        fn read_batch(&mut self) -> Option<io::Result<Vec<RawEvent>>> {
            match self.wait_readable() {
                Ok(true) => Some(
                    self.device
                        .fetch_events()
                        .map(|events| events.map(RawEvent::from).collect()),
                ),
                Ok(false) => Some(Ok(Vec::new())),
                Err(err) => Some(Err(err)),
            }
        }
    }
}
