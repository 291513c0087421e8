// Clutchify Event Handling
// Event classification and the tap loop

pub mod r#loop;

#[cfg(feature = "evdev-backend")]
pub use r#loop::run;
pub use r#loop::{classify, run_session, LoopStats, Transition};
