//! Small, dependency-light building blocks shared by every crate in the
//! workspace: debug logging, the latest-wins frame slot, and worker threads
//! that stop and join themselves.

pub mod channels;
pub mod debug_log;
pub mod drop_join_thread;
