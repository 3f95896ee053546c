//! This module contains the submodule [latest_slot], a single producer single
//! consumer hand-off where every new value replaces the previous one instead
//! of queueing behind it.

pub mod latest_slot;

use std::sync::Arc;

use thiserror::Error;

/// An alias for a [Result] that has [ChannelError] as the error type.
pub type ChannelResult<T> = Result<T, ChannelError>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChannelError {
    #[error("One side of the connection was dropped.")]
    ConnectionDropped,
}

const THREAD_PANIC_MSG: &str = "Another thread panicked while holding a resource this one needs.";

fn connection_not_dropped<T>(channel: &Arc<T>) -> bool {
    Arc::strong_count(channel) == 2
}

fn ensure_connection_not_dropped<T>(channel: &Arc<T>) -> Result<(), ChannelError> {
    if connection_not_dropped(channel) {
        Ok(())
    } else {
        Err(ChannelError::ConnectionDropped)
    }
}
