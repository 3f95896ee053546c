//! This module contains the [DropJoinHandle] type, a thin wrapper type around
//! [JoinHandle] that joins the thread when the handle is dropped (RAII style),
//! and [StoppableThread], which also asks the thread to stop first.
//!
//! Worker loops that run "forever" (like a camera producer) should use
//! [spawn_stoppable] so tearing the pipeline down is just dropping the handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

/// A thin wrapper around [JoinHandle] that joins the thread when the handle is
/// dropped (RAII style).
///
/// Any error in joining the thread will be ignored. [StoppableThread::stop]
/// reports whether the thread panicked.
#[derive(Debug)]
pub struct DropJoinHandle<T>(Option<JoinHandle<T>>);

impl<T> DropJoinHandle<T> {
    /// Whether the thread has finished running.
    pub fn is_finished(&self) -> bool {
        self.0.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl<T> From<JoinHandle<T>> for DropJoinHandle<T> {
    fn from(handle: JoinHandle<T>) -> Self {
        DropJoinHandle(Some(handle))
    }
}

impl<T> Drop for DropJoinHandle<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            _ = handle.join();
        }
    }
}

/// The same as [thread::spawn], but a [DropJoinHandle] is returned instead.
pub fn spawn<F, T>(f: F) -> DropJoinHandle<T>
where
    F: FnOnce() -> T,
    F: Send + 'static,
    T: Send + 'static,
{
    DropJoinHandle::from(thread::spawn(f))
}

/// A cloneable flag a worker polls to find out it should wind down.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    /// A flag that hasn't been raised yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the worker to stop. This never blocks.
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether [Self::raise] has been called.
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A worker thread that is told to stop (via its [StopFlag]) and then joined
/// when dropped.
///
/// The thread is expected to poll the flag between units of work. Work that
/// is in flight when the flag is raised is allowed to finish.
#[derive(Debug)]
pub struct StoppableThread<T> {
    stop: StopFlag,
    handle: DropJoinHandle<T>,
}

impl<T> StoppableThread<T> {
    /// Whether the thread has finished running.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Raise the stop flag and wait for the thread, returning its result.
    pub fn stop(mut self) -> thread::Result<T> {
        self.stop.raise();
        // The emptied handle has nothing left to join when `self` drops.
        self.handle.0.take().expect(EXPECT_MSG).join()
    }
}

impl<T> Drop for StoppableThread<T> {
    fn drop(&mut self) {
        // The handle joins itself right after this.
        self.stop.raise();
    }
}

/// Spawn a thread that receives a [StopFlag] and is stopped and joined when the
/// returned [StoppableThread] is dropped.
pub fn spawn_stoppable<F, T>(f: F) -> StoppableThread<T>
where
    F: FnOnce(StopFlag) -> T,
    F: Send + 'static,
    T: Send + 'static,
{
    let stop = StopFlag::new();
    let worker_stop = stop.clone();
    StoppableThread {
        stop,
        handle: spawn(move || f(worker_stop)),
    }
}

const EXPECT_MSG: &str = "The handle should be present.";

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;

    #[test]
    fn dropping_joins_the_thread() {
        let counter = Arc::new(AtomicUsize::new(0));

        {
            let counter = counter.clone();
            let _handle = spawn(move || {
                thread::sleep(Duration::from_millis(50));
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_a_stoppable_thread_stops_it() {
        let iterations = Arc::new(AtomicUsize::new(0));

        {
            let iterations = iterations.clone();
            let _worker = spawn_stoppable(move |stop| {
                while !stop.is_raised() {
                    iterations.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(1));
                }
            });
            thread::sleep(Duration::from_millis(20));
        }

        let after_drop = iterations.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(iterations.load(Ordering::SeqCst), after_drop);
    }

    #[test]
    fn stop_returns_the_thread_result() {
        let worker = spawn_stoppable(|stop| {
            let mut n = 0u32;
            while !stop.is_raised() {
                n = n.saturating_add(1);
                thread::yield_now();
            }
            n
        });

        thread::sleep(Duration::from_millis(10));
        assert!(worker.stop().is_ok());
    }
}
