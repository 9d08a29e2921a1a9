//! Service facade over the access-control core.

pub mod polls;

pub use polls::{Created, PollService, PollSummary, PollView, RoleChange};
