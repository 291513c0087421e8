// Clutchify Input Layer - Device Resolution
// Select the physical device whose name matches a pattern

use regex::Regex;

use super::device::PhysicalDevice;
use crate::session::{SessionError, SessionResult};

/// Pick the first candidate whose name contains a match for `pattern`.
///
/// The pattern is a regular expression applied as a search anywhere in the
/// device name, so `Foot` matches `FootSwitch` and `^HID` only matches names
/// starting with `HID`. Candidates are tested in the order they are yielded
/// and iteration stops at the first match. An empty pattern matches the first
/// candidate.
///
/// # Errors
/// * `SessionError::InvalidPattern` if `pattern` is not a valid regex
/// * `SessionError::DeviceNotFound` if no candidate matches
pub fn resolve<D, I>(pattern: &str, candidates: I) -> SessionResult<D>
where
    D: PhysicalDevice,
    I: IntoIterator<Item = D>,
{
    let matcher = Regex::new(pattern)?;

    for candidate in candidates {
        if matcher.is_match(candidate.name()) {
            log::debug!("Device \"{}\" matches \"{}\"", candidate.name(), pattern);
            return Ok(candidate);
        }
        log::trace!("Skipping device \"{}\"", candidate.name());
    }

    Err(SessionError::DeviceNotFound(pattern.to_string()))
}
