//! `bugtrackd-bugs` — bug entity and lifecycle.

pub mod bug;

pub use bug::{
    Bug, BugPatch, Comment, TestCase, TestPatch, TestStatus, validate_comment, validate_report,
    validate_test, validate_test_patch,
};
