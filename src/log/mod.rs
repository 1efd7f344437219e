//! Run logging carried through the pipeline result.

pub mod worklog;

pub use worklog::{WorkLog, WorkLogEntry};
