// Clutchify Input Layer - Raw Events
// Backend-neutral view of one evdev input event

use std::fmt;
use std::time::SystemTime;

use crate::action::Action;

/// EV_SYN event type code from input-event-codes.h
pub const EV_SYN: u16 = 0x00;
/// EV_KEY event type code from input-event-codes.h
pub const EV_KEY: u16 = 0x01;
/// EV_REL event type code from input-event-codes.h
pub const EV_REL: u16 = 0x02;
/// EV_ABS event type code from input-event-codes.h
pub const EV_ABS: u16 = 0x03;

/// Check if an event is a key event.
///
/// Key events have event.type == EV_KEY (0x01)
pub fn is_key_event(event_type: u16) -> bool {
    event_type == EV_KEY
}

/// Type tag of a raw input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Synchronization,
    Key,
    Relative,
    Absolute,
    Other(u16),
}

impl EventKind {
    pub fn from_raw(event_type: u16) -> Self {
        match event_type {
            EV_SYN => EventKind::Synchronization,
            EV_KEY => EventKind::Key,
            EV_REL => EventKind::Relative,
            EV_ABS => EventKind::Absolute,
            other => EventKind::Other(other),
        }
    }

    pub fn to_raw(self) -> u16 {
        match self {
            EventKind::Synchronization => EV_SYN,
            EventKind::Key => EV_KEY,
            EventKind::Relative => EV_REL,
            EventKind::Absolute => EV_ABS,
            EventKind::Other(other) => other,
        }
    }
}

/// One event as delivered by the physical device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: EventKind,
    pub code: u16,
    pub value: i32,
    pub time: SystemTime,
}

impl RawEvent {
    /// Create an event stamped with the current time
    pub fn new(kind: EventKind, code: u16, value: i32) -> Self {
        Self {
            kind,
            code,
            value,
            time: SystemTime::now(),
        }
    }

    /// Create a key event for the given code and action
    pub fn key(code: u16, action: Action) -> Self {
        Self::new(EventKind::Key, code, action.to_i32())
    }

    pub fn is_key(&self) -> bool {
        is_key_event(self.kind.to_raw())
    }
}

impl fmt::Display for RawEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type={:#04x} code={} value={}",
            self.kind.to_raw(),
            self.code,
            self.value
        )
    }
}

#[cfg(feature = "evdev-backend")]
impl From<evdev::InputEvent> for RawEvent {
    fn from(event: evdev::InputEvent) -> Self {
        Self {
            kind: EventKind::from_raw(event.event_type().0),
            code: event.code(),
            value: event.value(),
            time: event.timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_key_event_with_ev_key() {
        assert!(is_key_event(EV_KEY));
    }

    #[test]
    fn test_is_key_event_with_other_event() {
        assert!(!is_key_event(EV_REL));
        assert!(!is_key_event(EV_SYN));
        assert!(!is_key_event(EV_ABS));
        assert!(!is_key_event(0x14)); // EV_REP
    }

    #[test]
    fn test_event_kind_round_trips_known_and_unknown_types() {
        assert_eq!(EventKind::from_raw(0x01), EventKind::Key);
        assert_eq!(EventKind::from_raw(0x03), EventKind::Absolute);
        assert_eq!(EventKind::from_raw(0x14), EventKind::Other(0x14));
        assert_eq!(EventKind::Other(0x14).to_raw(), 0x14);
        assert_eq!(EventKind::Relative.to_raw(), EV_REL);
    }

    #[test]
    fn test_key_constructor() {
        let event = RawEvent::key(87, Action::Press);
        assert!(event.is_key());
        assert_eq!(event.code, 87);
        assert_eq!(event.value, 1);
    }

    #[test]
    fn test_display() {
        let event = RawEvent::new(EventKind::Relative, 8, -1);
        assert_eq!(event.to_string(), "type=0x02 code=8 value=-1");
    }

    #[cfg(feature = "evdev-backend")]
    #[test]
    fn test_from_evdev_event() {
        let event = evdev::InputEvent::new(evdev::EventType::KEY, 88, 0);
        let raw = RawEvent::from(event);
        assert_eq!(raw.kind, EventKind::Key);
        assert_eq!(raw.code, 88);
        assert_eq!(raw.value, 0);
    }
}
