//! Shared frame loop for visualizers.
//!
//! Every active visualizer registers a draw callback with one
//! [`FrameScheduler`]. A tick calls each callback once; the loop is running
//! exactly while at least one callback is registered. [`FrameDriver`] ticks
//! the scheduler from a background thread and parks while it is empty.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{JoinHandle, Thread};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::clock::Clock;

/// Information passed to every draw callback in one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTick {
    pub now_ms: u64,
    pub frame: u64,
}

type DrawFn = Box<dyn FnMut(&FrameTick) + Send>;

struct Subscriber {
    id: u64,
    draw: DrawFn,
}

#[derive(Default)]
struct SchedulerInner {
    subscribers: Vec<Subscriber>,
    removed_during_tick: Vec<u64>,
    next_id: u64,
    frame: u64,
    ticking: bool,
    driver: Option<Thread>,
}

impl SchedulerInner {
    fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Registry of draw callbacks sharing a single frame loop.
#[derive(Clone, Default)]
pub struct FrameScheduler {
    inner: Arc<Mutex<SchedulerInner>>,
}

/// Registration handle. Dropping it unregisters the callback.
pub struct FrameSubscription {
    id: u64,
    inner: Weak<Mutex<SchedulerInner>>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a draw callback. The first registration starts the loop.
    pub fn register(&self, draw: impl FnMut(&FrameTick) + Send + 'static) -> FrameSubscription {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = inner.next_id;
        let was_idle = inner.subscriber_count() == 0 && !inner.ticking;
        inner.subscribers.push(Subscriber {
            id,
            draw: Box::new(draw),
        });
        if was_idle {
            debug!("frame loop starting");
            if let Some(driver) = &inner.driver {
                driver.unpark();
            }
        }
        FrameSubscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// `true` while at least one callback is registered.
    pub fn is_running(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.ticking || inner.subscriber_count() > 0
    }

    pub fn subscriber_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        if inner.ticking {
            // Callbacks are checked out while a tick runs.
            return inner.subscriber_count() + 1;
        }
        inner.subscriber_count()
    }

    /// Frames ticked so far.
    pub fn frame(&self) -> u64 {
        self.inner.lock().unwrap().frame
    }

    /// Call every registered callback once.
    ///
    /// Callbacks run without the registry lock held, so they may register
    /// or drop subscriptions. Returns whether the loop is still running.
    pub fn tick(&self, now_ms: u64) -> bool {
        let (mut running, frame) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.ticking {
                return true;
            }
            if inner.subscribers.is_empty() {
                return false;
            }
            inner.frame += 1;
            inner.ticking = true;
            (std::mem::take(&mut inner.subscribers), inner.frame)
        };

        let tick = FrameTick { now_ms, frame };
        for subscriber in running.iter_mut() {
            (subscriber.draw)(&tick);
        }

        let dropped: Vec<Subscriber>;
        let still_running = {
            let mut inner = self.inner.lock().unwrap();
            inner.ticking = false;
            let removed = std::mem::take(&mut inner.removed_during_tick);
            let (kept, gone): (Vec<Subscriber>, Vec<Subscriber>) = running
                .drain(..)
                .partition(|subscriber| !removed.contains(&subscriber.id));
            dropped = gone;
            let added = std::mem::replace(&mut inner.subscribers, kept);
            inner.subscribers.extend(added);
            !inner.subscribers.is_empty()
        };
        // Callbacks may own subscriptions whose drop needs the lock.
        drop(dropped);
        if !still_running {
            debug!("frame loop stopped after frame {}", frame);
        }
        still_running
    }

    fn set_driver(&self, driver: Option<Thread>) {
        self.inner.lock().unwrap().driver = driver;
    }
}

impl FrameSubscription {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for FrameSubscription {
    fn drop(&mut self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let removed: Vec<Subscriber>;
        {
            let mut inner = inner.lock().unwrap();
            let id = self.id;
            if inner.ticking {
                inner.removed_during_tick.push(id);
            }
            let (kept, gone): (Vec<Subscriber>, Vec<Subscriber>) =
                std::mem::take(&mut inner.subscribers)
                    .into_iter()
                    .partition(|subscriber| subscriber.id != id);
            inner.subscribers = kept;
            removed = gone;
        }
        drop(removed);
    }
}

struct DriverThreadGuard {
    alive: Arc<AtomicBool>,
}

impl DriverThreadGuard {
    fn new(alive: Arc<AtomicBool>) -> Self {
        alive.store(true, Ordering::Relaxed);
        Self { alive }
    }
}

impl Drop for DriverThreadGuard {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Relaxed);
    }
}

/// Background thread ticking a [`FrameScheduler`] at a target rate.
pub struct FrameDriver {
    scheduler: FrameScheduler,
    finish: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl FrameDriver {
    /// Spawn the driver thread.
    ///
    /// # Arguments
    ///
    /// * `scheduler` - Registry to tick.
    /// * `clock` - Time source passed to callbacks.
    /// * `fps` - Target frame rate; clamped to at least 1.
    pub fn spawn(scheduler: FrameScheduler, clock: Arc<dyn Clock>, fps: u32) -> Self {
        let finish = Arc::new(AtomicBool::new(false));
        let alive = Arc::new(AtomicBool::new(true));
        let frame_budget = Duration::from_secs_f64(1.0 / fps.max(1) as f64);

        let thread_scheduler = scheduler.clone();
        let thread_finish = finish.clone();
        let thread_alive = alive.clone();
        let handle = std::thread::spawn(move || {
            let _guard = DriverThreadGuard::new(thread_alive);
            loop {
                if thread_finish.load(Ordering::Relaxed) {
                    break;
                }
                if !thread_scheduler.is_running() {
                    std::thread::park();
                    continue;
                }
                let started = Instant::now();
                thread_scheduler.tick(clock.now_ms());
                let elapsed = started.elapsed();
                if elapsed < frame_budget {
                    std::thread::sleep(frame_budget - elapsed);
                }
            }
        });
        scheduler.set_driver(Some(handle.thread().clone()));

        Self {
            scheduler,
            finish,
            alive,
            thread_handle: Some(handle),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// Stop the thread and wait for it to exit.
    pub fn stop(&mut self) {
        self.finish.store(true, Ordering::Relaxed);
        self.scheduler.set_driver(None);
        if let Some(handle) = self.thread_handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                warn!("frame driver thread panicked during join");
            }
        }
    }
}

impl Drop for FrameDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
