//! `bugtrackd-users` — user account entity and validation.

pub mod user;

pub use user::{
    ASSIGNABLE_ROLES, NewUser, User, UserPatch, UserProfile, validate_new_user, validate_patch,
};
