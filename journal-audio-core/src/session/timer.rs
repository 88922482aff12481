use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle, Thread};
use std::time::{Duration, Instant};

/// How often an event pump re-checks its stop flag while idle.
const PUMP_POLL: Duration = Duration::from_millis(20);

/// Remote cancellation for a [`PeriodicTimer`], usable from any thread.
#[derive(Clone)]
pub struct TimerHandle {
    running: Arc<AtomicBool>,
    thread: Thread,
}

impl TimerHandle {
    /// Stop future ticks. A tick already running finishes.
    pub fn cancel(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.thread.unpark();
    }
}

/// Calls `tick` every `interval` on a dedicated thread until cancelled.
///
/// Cancelling joins the thread, except from inside `tick` itself. Dropping the
/// timer cancels it.
pub struct PeriodicTimer {
    handle: TimerHandle,
    join: Option<JoinHandle<()>>,
}

impl PeriodicTimer {
    pub fn start<F>(name: &str, interval: Duration, mut tick: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let join = thread::Builder::new().name(name.into()).spawn(move || {
            let mut next = Instant::now() + interval;
            while flag.load(Ordering::SeqCst) {
                let now = Instant::now();
                if now < next {
                    thread::park_timeout(next - now);
                    continue;
                }
                tick();
                next += interval;
            }
        })?;

        Ok(Self {
            handle: TimerHandle {
                running,
                thread: join.thread().clone(),
            },
            join: Some(join),
        })
    }

    pub fn handle(&self) -> TimerHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.running.load(Ordering::SeqCst)
    }

    pub fn cancel(&mut self) {
        self.handle.cancel();
        join_unless_current(self.join.take());
    }
}

impl Drop for PeriodicTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Thread draining a device event channel into a handler.
///
/// Runs until the handler returns `false`, the sender side is dropped or
/// [`stop`](Self::stop) is called.
pub(crate) struct EventPump {
    running: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl EventPump {
    pub(crate) fn spawn<E, F>(name: &str, events: Receiver<E>, mut handler: F) -> io::Result<Self>
    where
        E: Send + 'static,
        F: FnMut(E) -> bool + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let join = thread::Builder::new().name(name.into()).spawn(move || {
            while flag.load(Ordering::SeqCst) {
                match events.recv_timeout(PUMP_POLL) {
                    Ok(event) => {
                        if !handler(event) {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        })?;
        Ok(Self {
            running,
            join: Some(join),
        })
    }

    pub(crate) fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        join_unless_current(self.join.take());
    }
}

impl Drop for EventPump {
    fn drop(&mut self) {
        self.stop();
    }
}

fn join_unless_current(join: Option<JoinHandle<()>>) {
    let Some(join) = join else {
        return;
    };
    if join.thread().id() == thread::current().id() {
        return;
    }
    if join.join().is_err() {
        log::error!("session worker thread panicked");
    }
}
