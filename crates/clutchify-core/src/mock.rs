// Recording device and output doubles for unit tests

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::input::{EventKind, PhysicalDevice, RawEvent};
use crate::output::VirtualOutput;

/// One call made on a mock device or output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Grab,
    Ungrab,
    Read,
    Activate,
    Write(EventKind, u16, i32),
    Sync,
    Deactivate,
}

/// Call log shared between a device and an output so ordering across both
/// can be asserted.
#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<Call>>>);

impl Journal {
    fn record(&self, call: Call) {
        self.0.borrow_mut().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.0.borrow().iter().filter(|c| *c == call).count()
    }

    /// Key codes tapped so far, taken from the press half of each tap
    pub fn tapped_codes(&self) -> Vec<u16> {
        self.0
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::Write(EventKind::Key, code, 1) => Some(*code),
                _ => None,
            })
            .collect()
    }
}

fn failure(what: &str) -> io::Error {
    io::Error::other(format!("mock {what} failure"))
}

pub struct MockDevice {
    name: String,
    journal: Journal,
    batches: VecDeque<Vec<RawEvent>>,
    fail_grab: bool,
    fail_ungrab: bool,
    fail_read: bool,
    lower_after: Option<(usize, Arc<AtomicBool>)>,
    delivered: usize,
}

impl MockDevice {
    pub fn new(name: &str, journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            journal: journal.clone(),
            batches: VecDeque::new(),
            fail_grab: false,
            fail_ungrab: false,
            fail_read: false,
            lower_after: None,
            delivered: 0,
        }
    }

    pub fn with_batches(mut self, batches: Vec<Vec<RawEvent>>) -> Self {
        self.batches = batches.into();
        self
    }

    pub fn with_events(self, events: Vec<RawEvent>) -> Self {
        self.with_batches(vec![events])
    }

    pub fn failing_grab(mut self) -> Self {
        self.fail_grab = true;
        self
    }

    pub fn failing_ungrab(mut self) -> Self {
        self.fail_ungrab = true;
        self
    }

    pub fn failing_read_after_batches(mut self) -> Self {
        self.fail_read = true;
        self
    }

    /// Lower `running` once `batches` batches have been handed out, the way
    /// a signal arriving mid-stream would.
    pub fn lowering_after_batches(mut self, batches: usize, running: &Arc<AtomicBool>) -> Self {
        self.lower_after = Some((batches, Arc::clone(running)));
        self
    }
}

impl PhysicalDevice for MockDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn grab(&mut self) -> io::Result<()> {
        self.journal.record(Call::Grab);
        if self.fail_grab {
            return Err(failure("grab"));
        }
        Ok(())
    }

    fn ungrab(&mut self) -> io::Result<()> {
        self.journal.record(Call::Ungrab);
        if self.fail_ungrab {
            return Err(failure("ungrab"));
        }
        Ok(())
    }

    fn read_batch(&mut self) -> Option<io::Result<Vec<RawEvent>>> {
        self.journal.record(Call::Read);
        match self.batches.pop_front() {
            Some(batch) => {
                self.delivered += 1;
                if let Some((after, running)) = &self.lower_after {
                    if self.delivered >= *after {
                        running.store(false, Ordering::SeqCst);
                    }
                }
                Some(Ok(batch))
            }
            None if self.fail_read => Some(Err(failure("read"))),
            None => None,
        }
    }
}

pub struct MockOutput {
    journal: Journal,
    fail_activate: bool,
    fail_write: bool,
    fail_deactivate: bool,
}

impl MockOutput {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            fail_activate: false,
            fail_write: false,
            fail_deactivate: false,
        }
    }

    pub fn failing_activate(mut self) -> Self {
        self.fail_activate = true;
        self
    }

    pub fn failing_write(mut self) -> Self {
        self.fail_write = true;
        self
    }

    pub fn failing_deactivate(mut self) -> Self {
        self.fail_deactivate = true;
        self
    }
}

impl VirtualOutput for MockOutput {
    fn activate(&mut self) -> io::Result<()> {
        self.journal.record(Call::Activate);
        if self.fail_activate {
            return Err(failure("activate"));
        }
        Ok(())
    }

    fn write(&mut self, kind: EventKind, code: u16, value: i32) -> io::Result<()> {
        if self.fail_write {
            return Err(failure("write"));
        }
        self.journal.record(Call::Write(kind, code, value));
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.journal.record(Call::Sync);
        Ok(())
    }

    fn deactivate(&mut self) -> io::Result<()> {
        self.journal.record(Call::Deactivate);
        if self.fail_deactivate {
            return Err(failure("deactivate"));
        }
        Ok(())
    }
}
