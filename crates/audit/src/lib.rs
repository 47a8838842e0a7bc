//! `bugtrackd-audit` — immutable edit records.

pub mod record;

pub use record::{Actor, EditOp, EditRecord, EditTarget, USER_COLLECTION, BUGS_COLLECTION};
