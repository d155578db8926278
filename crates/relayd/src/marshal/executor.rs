//! Channel-backed executor and its submit handles.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::{debug, error};

use super::{MARSHAL_TARGET, MarshalError};

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

/// Cloneable handle used by any thread to queue work for the executor.
pub struct Marshaler<S> {
    sender: Sender<Job<S>>,
    stopped: Arc<AtomicBool>,
}

impl<S> Clone for Marshaler<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            stopped: Arc::clone(&self.stopped),
        }
    }
}

/// Receiving half of the job queue, handed to [`Executor::new`].
pub struct Inbox<S> {
    receiver: Receiver<Job<S>>,
    stopped: Arc<AtomicBool>,
}

/// Creates a connected marshaler and inbox pair.
#[must_use]
pub fn channel<S>() -> (Marshaler<S>, Inbox<S>) {
    let (sender, receiver) = crossbeam_channel::unbounded();
    let stopped = Arc::new(AtomicBool::new(false));
    (
        Marshaler {
            sender,
            stopped: Arc::clone(&stopped),
        },
        Inbox { receiver, stopped },
    )
}

impl<S> Marshaler<S> {
    /// Runs `work` on the execution thread and blocks until it returns.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::Stopped`] when the executor has shut down, and
    /// [`MarshalError::Abandoned`] when the job panicked.
    pub fn submit<R, F>(&self, work: F) -> Result<R, MarshalError>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(MarshalError::Stopped);
        }
        let (reply, outcome) = crossbeam_channel::bounded(1);
        let job: Job<S> = Box::new(move |state| {
            let result = work(state);
            // The submitter may have gone away; nothing to report then.
            let _ = reply.send(result);
        });
        self.sender.send(job).map_err(|_| MarshalError::Stopped)?;
        outcome.recv().map_err(|_| {
            if self.stopped.load(Ordering::SeqCst) {
                MarshalError::Stopped
            } else {
                MarshalError::Abandoned
            }
        })
    }

    /// Queues `work` without waiting for it to run.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::Stopped`] when the executor has shut down.
    pub fn post<F>(&self, work: F) -> Result<(), MarshalError>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(MarshalError::Stopped);
        }
        self.sender
            .send(Box::new(work))
            .map_err(|_| MarshalError::Stopped)
    }

    /// True once the executor has shut down.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Owner of the execution-thread state and consumer of queued jobs.
pub struct Executor<S> {
    // Declared first so the flag is raised before the queue is dropped.
    stopped: StopOnDrop,
    state: S,
    receiver: Receiver<Job<S>>,
}

struct StopOnDrop(Arc<AtomicBool>);

impl StopOnDrop {
    fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.raise();
    }
}

impl<S> Executor<S> {
    /// Wraps `state`, consuming jobs from `inbox`.
    #[must_use]
    pub fn new(state: S, inbox: Inbox<S>) -> Self {
        Self {
            stopped: StopOnDrop(inbox.stopped),
            state,
            receiver: inbox.receiver,
        }
    }

    /// Shared access to the state outside of a job.
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Exclusive access to the state outside of a job.
    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    /// Runs every job queued at the time of the call and returns how many ran.
    ///
    /// Jobs queued while draining wait for the next call, so a steady stream of
    /// submissions cannot starve the host's own frame work.
    pub fn drain(&mut self) -> usize {
        let pending = self.receiver.len();
        let mut ran = 0;
        while ran < pending {
            match self.receiver.try_recv() {
                Ok(job) => {
                    self.run_job(job);
                    ran += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        ran
    }

    /// Waits up to `budget` for the first job, then drains the queue.
    pub fn tick(&mut self, budget: Duration) -> usize {
        match self.receiver.recv_timeout(budget) {
            Ok(job) => {
                self.run_job(job);
                1 + self.drain()
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => 0,
        }
    }

    /// Processes jobs until `stop` is raised, checking it every `poll`.
    pub fn run_until(&mut self, stop: &AtomicBool, poll: Duration) {
        while !stop.load(Ordering::SeqCst) {
            self.tick(poll);
        }
    }

    /// Stops accepting work and discards anything still queued.
    ///
    /// Dropping a queued job drops its reply channel, so blocked submitters
    /// observe [`MarshalError::Stopped`] straight away. Returns the state.
    pub fn shutdown(self) -> S {
        self.stopped.raise();
        let mut discarded = 0_usize;
        while let Ok(job) = self.receiver.try_recv() {
            drop(job);
            discarded += 1;
        }
        debug!(
            target: MARSHAL_TARGET,
            discarded,
            "executor stopped"
        );
        self.state
    }

    fn run_job(&mut self, job: Job<S>) {
        let state = &mut self.state;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || job(state))) {
            error!(
                target: MARSHAL_TARGET,
                panic = panic_message(payload.as_ref()),
                "job panicked on the execution thread"
            );
        }
    }
}

/// Handle to an execution thread started with [`spawn`].
pub struct ExecutorHandle {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ExecutorHandle {
    /// Asks the execution thread to stop after its current job.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Stops the thread and waits for it to exit.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::Abandoned`] when the thread panicked.
    pub fn join(mut self) -> Result<(), MarshalError> {
        self.stop();
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| MarshalError::Abandoned),
            None => Ok(()),
        }
    }
}

impl Drop for ExecutorHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

const SPAWNED_POLL: Duration = Duration::from_millis(20);

/// Starts a dedicated execution thread whose state is built by `factory`.
///
/// The state is constructed on the new thread, so it need not be `Send`.
///
/// # Errors
///
/// Returns the OS error when the thread cannot be spawned.
pub fn spawn<S, F>(name: &str, factory: F) -> io::Result<(Marshaler<S>, ExecutorHandle)>
where
    S: 'static,
    F: FnOnce() -> S + Send + 'static,
{
    let (marshaler, inbox) = channel();
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    let handle = thread::Builder::new()
        .name(name.to_owned())
        .spawn(move || {
            let mut executor = Executor::new(factory(), inbox);
            executor.run_until(&stop_flag, SPAWNED_POLL);
            drop(executor.shutdown());
        })?;
    Ok((
        marshaler,
        ExecutorHandle {
            stop,
            handle: Some(handle),
        },
    ))
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("unknown panic")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    #[test]
    fn submit_runs_on_the_executor_thread() {
        let (marshaler, handle) =
            spawn("relay-exec-test", || Vec::<u32>::new()).expect("spawn executor");
        let exec_thread = marshaler
            .submit(|_| thread::current().name().map(str::to_owned))
            .expect("submit");
        assert_eq!(exec_thread.as_deref(), Some("relay-exec-test"));
        handle.join().expect("join");
    }

    #[test]
    fn drain_interleaves_posted_and_submitted_work_in_queue_order() {
        let (marshaler, inbox) = channel::<Vec<&'static str>>();
        let mut executor = Executor::new(Vec::new(), inbox);
        marshaler.post(|log| log.push("frame")).expect("post");
        let submitter = {
            let marshaler = marshaler.clone();
            thread::spawn(move || marshaler.submit(|log| log.push("command")))
        };
        while executor.receiver.len() < 2 {
            thread::yield_now();
        }
        assert_eq!(executor.drain(), 2);
        submitter.join().expect("join").expect("submit");
        assert_eq!(executor.state(), &vec!["frame", "command"]);
    }

    #[test]
    fn shutdown_fails_pending_and_later_submits() {
        let (marshaler, inbox) = channel::<u32>();
        let executor = Executor::new(0, inbox);
        let blocked = {
            let marshaler = marshaler.clone();
            thread::spawn(move || marshaler.submit(|state| *state + 1))
        };
        while executor.receiver.is_empty() {
            thread::yield_now();
        }
        let state = executor.shutdown();
        assert_eq!(state, 0, "queued job must not run");
        assert_eq!(
            blocked.join().expect("join"),
            Err(MarshalError::Stopped)
        );
        assert_eq!(marshaler.submit(|state| *state), Err(MarshalError::Stopped));
        assert!(marshaler.is_stopped());
    }

    #[test]
    fn panicking_job_leaves_executor_running() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (marshaler, handle) = {
            let seen = Arc::clone(&seen);
            spawn("relay-exec-panic", move || seen).expect("spawn executor")
        };
        let outcome: Result<(), MarshalError> = marshaler.submit(|_| panic!("boom"));
        assert_eq!(outcome, Err(MarshalError::Abandoned));
        marshaler
            .submit(|seen| seen.lock().expect("lock").push(1))
            .expect("executor should survive a panicking job");
        handle.join().expect("join");
        assert_eq!(*seen.lock().expect("lock"), vec![1]);
    }
}
