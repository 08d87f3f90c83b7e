pub mod add;
pub mod clear;
pub mod common;
pub mod completions;
pub mod delete;
pub mod edit;
pub mod list;
pub mod show;
pub mod status;
pub mod sync;
pub mod watch;
