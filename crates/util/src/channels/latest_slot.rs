//! This module defines the [Inbox] and [Outbox] types for a latest-wins
//! hand-off between one producing thread and one consuming thread.
//!
//! Internally this is a triple buffer. The outbox owns a back buffer it fills
//! without holding any lock, the inbox owns a front buffer it reads without
//! holding any lock, and the shared middle slot is only locked long enough to
//! swap one of those with it. A value is therefore either fully published or
//! not published at all, and the consumer can never see one that is half
//! written.
//!
//! Values are recycled instead of reallocated: the buffer handed to
//! [Outbox::publish_with] is whatever the inbox was reading two swaps ago, so
//! a `Vec` inside it keeps its capacity.
//!
//! ```
//! use util::channels::latest_slot;
//!
//! let (mut inbox, mut outbox) = latest_slot::new::<Vec<u8>>();
//!
//! outbox.publish(vec![1, 2, 3]).unwrap();
//! outbox.publish(vec![4, 5, 6]).unwrap();
//!
//! // Only the newest value is ever received.
//! assert_eq!(inbox.check().unwrap().map(Vec::as_slice), Some(&[4, 5, 6][..]));
//! assert_eq!(inbox.check().unwrap(), None);
//! assert_eq!(outbox.dropped_values(), 1);
//! ```

use std::mem;
use std::sync::{Arc, Mutex};

use super::{ChannelResult, THREAD_PANIC_MSG};

/// The receiving half of a latest-wins slot. Also see [Outbox].
///
/// See [new] and [from_buffers] to construct.
#[derive(Debug)]
pub struct Inbox<T> {
    front: T,
    received_any: bool,
    slot: Arc<Mutex<Middle<T>>>,
}

impl<T> Inbox<T> {
    /// Take the newest published value if one arrived since the last call,
    /// returning [None] otherwise. The lock is only held for a swap, so this
    /// never waits on the outbox filling its buffer.
    ///
    /// A [ChannelError::ConnectionDropped](super::ChannelError::ConnectionDropped)
    /// error is returned if the outbox was dropped and there is no unseen value
    /// left. [Self::latest] still returns the last value after that.
    pub fn check(&mut self) -> ChannelResult<Option<&T>> {
        {
            let mut middle = self.slot.lock().expect(THREAD_PANIC_MSG);

            if middle.fresh {
                mem::swap(&mut self.front, &mut middle.value);
                middle.fresh = false;
                self.received_any = true;
            } else {
                // Checked under the lock so a final publish can't slip in
                // between this and the outbox dropping.
                super::ensure_connection_not_dropped(&self.slot)?;
                return Ok(None);
            }
        }

        Ok(Some(&self.front))
    }

    /// The most recently received value, if any value was ever received.
    pub fn latest(&self) -> Option<&T> {
        self.received_any.then_some(&self.front)
    }

    /// Whether the outbox still exists, the inverse of
    /// [Self::connection_closed].
    pub fn connection_open(&self) -> bool {
        super::connection_not_dropped(&self.slot)
    }

    /// Whether the outbox was dropped, the inverse of [Self::connection_open].
    pub fn connection_closed(&self) -> bool {
        !self.connection_open()
    }
}

/// The publishing half of a latest-wins slot. Also see [Inbox].
///
/// See [new] and [from_buffers] to construct.
#[derive(Debug)]
pub struct Outbox<T> {
    back: T,
    dropped_values: u64,
    slot: Arc<Mutex<Middle<T>>>,
}

impl<T> Outbox<T> {
    /// Fill the back buffer with `fill` and then publish it. `fill` runs
    /// before any lock is taken and receives a recycled buffer, so it has to
    /// overwrite everything it cares about.
    ///
    /// If the previous value was never received it is replaced and counted in
    /// [Self::dropped_values].
    ///
    /// A [ChannelError::ConnectionDropped](super::ChannelError::ConnectionDropped)
    /// error is returned (and `fill` is never called) if the inbox was
    /// dropped.
    pub fn publish_with<F>(&mut self, fill: F) -> ChannelResult<()>
    where
        F: FnOnce(&mut T),
    {
        super::ensure_connection_not_dropped(&self.slot)?;

        fill(&mut self.back);

        let mut middle = self.slot.lock().expect(THREAD_PANIC_MSG);
        mem::swap(&mut self.back, &mut middle.value);
        if middle.fresh {
            self.dropped_values += 1;
        }
        middle.fresh = true;

        Ok(())
    }

    /// Publish `value`, replacing any value the inbox hasn't received yet.
    ///
    /// Also see [Self::publish_with].
    pub fn publish(&mut self, value: T) -> ChannelResult<()> {
        self.publish_with(|back| *back = value)
    }

    /// How many published values were replaced before the inbox received
    /// them.
    pub fn dropped_values(&self) -> u64 {
        self.dropped_values
    }

    /// Whether the inbox still exists, the inverse of
    /// [Self::connection_closed].
    pub fn connection_open(&self) -> bool {
        super::connection_not_dropped(&self.slot)
    }

    /// Whether the inbox was dropped, the inverse of [Self::connection_open].
    pub fn connection_closed(&self) -> bool {
        !self.connection_open()
    }
}

#[derive(Debug)]
struct Middle<T> {
    value: T,
    /// Set when `value` was published and not yet received.
    fresh: bool,
}

/// Create a latest-wins slot's [Inbox] and [Outbox], with every buffer
/// starting out as `T::default()`.
pub fn new<T: Default>() -> (Inbox<T>, Outbox<T>) {
    from_buffers([T::default(), T::default(), T::default()])
}

/// Create a latest-wins slot's [Inbox] and [Outbox] from three starting
/// buffers. Nothing counts as published yet, the buffers are only storage.
pub fn from_buffers<T>(buffers: [T; 3]) -> (Inbox<T>, Outbox<T>) {
    let [front, middle, back] = buffers;

    let slot = Arc::new(Mutex::new(Middle {
        value: middle,
        fresh: false,
    }));

    let inbox = Inbox {
        front,
        received_any: false,
        slot: slot.clone(),
    };
    let outbox = Outbox {
        back,
        dropped_values: 0,
        slot,
    };

    (inbox, outbox)
}
