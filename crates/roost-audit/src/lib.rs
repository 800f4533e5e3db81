//! Security audit trail.
//!
//! Every blocked command attempt across the fleet is appended to one NDJSON
//! file as a [`SecurityRecord`]. Writes flush per record so a reader mapping
//! the file never misses a committed entry; reads are mmap snapshots that
//! never block the write path.

mod log;
mod record;

pub use log::{SecurityLog, SecurityLogReader};
pub use record::SecurityRecord;
