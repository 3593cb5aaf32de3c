//! Lifecycle owner and its started-only update queue.
//!
//! [`LifecycleOwner`] models the component that hosts the summary display.
//! It moves through `Initialized -> Started <-> Stopped -> Destroyed`,
//! notifies explicitly registered [`LifecycleObserver`]s, and owns a
//! [`StartedScope`]: a queue of deferred jobs drained by a single tokio task.
//!
//! Jobs only run while the owner is started. Launching while stopped is a
//! no-op, and stopping clears whatever is still queued. `stop()` also waits
//! for a job that is already running, so nothing publishes after it returns.
//! A job may itself stop or destroy the owner (or drop the last handle to
//! it); that stop does not wait for the job it is called from.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};

use tokio::runtime::Handle;
use tokio::sync::Notify;

use crate::error::MonitorError;

/// A unit of deferred work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Initialized,
    Started,
    Stopped,
    Destroyed,
}

/// Receives start/stop transitions. Errors are contract violations and are
/// returned to whoever drove the transition.
pub trait LifecycleObserver: Send + Sync {
    fn on_start(&self) -> Result<(), MonitorError> {
        Ok(())
    }

    fn on_stop(&self) -> Result<(), MonitorError> {
        Ok(())
    }
}

#[derive(Default)]
struct Queue {
    active: bool,
    jobs: VecDeque<Job>,
}

struct ScopeShared {
    queue: Mutex<Queue>,
    // Held while a job runs.
    gate: Mutex<()>,
    // Thread currently draining the queue, if any.
    draining_on: Mutex<Option<ThreadId>>,
    wake: Notify,
    closed: AtomicBool,
}

/// Handle for deferring work onto the owner's update task.
#[derive(Clone)]
pub struct StartedScope {
    shared: Arc<ScopeShared>,
}

impl StartedScope {
    /// Create the scope and spawn its update task on `runtime`.
    fn spawn(runtime: &Handle) -> Self {
        let shared = Arc::new(ScopeShared {
            queue: Mutex::new(Queue::default()),
            gate: Mutex::new(()),
            draining_on: Mutex::new(None),
            wake: Notify::new(),
            closed: AtomicBool::new(false),
        });

        let task_shared = Arc::clone(&shared);
        runtime.spawn(async move {
            loop {
                task_shared.wake.notified().await;
                if task_shared.closed.load(Ordering::Acquire) {
                    break;
                }
                task_shared.drain();
            }
            tracing::debug!("Update task exited");
        });

        Self { shared }
    }

    /// Queue a job. Returns `false` (and drops the job) when not started.
    pub fn launch(&self, job: Job) -> bool {
        let mut queue = self.shared.queue.lock().unwrap_or_else(PoisonError::into_inner);
        if !queue.active {
            drop(queue);
            drop(job);
            return false;
        }
        queue.jobs.push_back(job);
        drop(queue);
        self.shared.wake.notify_one();
        true
    }

    pub fn is_active(&self) -> bool {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .active
    }

    pub fn pending(&self) -> usize {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .jobs
            .len()
    }

    fn activate(&self) {
        let mut queue = self.shared.queue.lock().unwrap_or_else(PoisonError::into_inner);
        queue.active = true;
        let has_jobs = !queue.jobs.is_empty();
        drop(queue);
        if has_jobs {
            self.shared.wake.notify_one();
        }
    }

    /// Stop accepting and running jobs, and drop the ones still queued.
    fn deactivate(&self) -> usize {
        let dropped = {
            let mut queue = self.shared.queue.lock().unwrap_or_else(PoisonError::into_inner);
            queue.active = false;
            std::mem::take(&mut queue.jobs)
        };
        // Job destructors run without the queue lock held.
        let count = dropped.len();
        drop(dropped);
        count
    }

    /// Block until the job currently running (if any) has returned.
    /// Returns at once when called from inside a job.
    fn wait_idle(&self) {
        if self.shared.is_draining_here() {
            return;
        }
        drop(self.shared.gate.lock().unwrap_or_else(PoisonError::into_inner));
    }

    fn close(&self) {
        self.deactivate();
        self.shared.closed.store(true, Ordering::Release);
        self.shared.wake.notify_one();
    }
}

/// Marks the current thread as the draining one until dropped.
struct DrainingGuard<'a> {
    slot: &'a Mutex<Option<ThreadId>>,
}

impl<'a> DrainingGuard<'a> {
    fn enter(slot: &'a Mutex<Option<ThreadId>>) -> Self {
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(thread::current().id());
        Self { slot }
    }
}

impl Drop for DrainingGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl ScopeShared {
    fn drain(&self) {
        let _draining = DrainingGuard::enter(&self.draining_on);
        loop {
            let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
            let job = {
                let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
                if !queue.active {
                    return;
                }
                queue.jobs.pop_front()
            };
            match job {
                Some(job) => job(),
                None => return,
            }
        }
    }

    fn is_draining_here(&self) -> bool {
        *self.draining_on.lock().unwrap_or_else(PoisonError::into_inner)
            == Some(thread::current().id())
    }
}

struct OwnerInner {
    state: LifecycleState,
    observers: Vec<Arc<dyn LifecycleObserver>>,
}

/// The component whose start/stop transitions drive observation.
pub struct LifecycleOwner {
    inner: Mutex<OwnerInner>,
    scope: StartedScope,
}

impl LifecycleOwner {
    /// Create an owner whose update task runs on the current tokio runtime.
    ///
    /// Fails with [`MonitorError::Runtime`] when called outside a runtime.
    pub fn new() -> Result<Arc<Self>, MonitorError> {
        let runtime = Handle::try_current()?;
        Ok(Self::with_runtime(&runtime))
    }

    /// Create an owner whose update task runs on `runtime`.
    pub fn with_runtime(runtime: &Handle) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(OwnerInner {
                state: LifecycleState::Initialized,
                observers: Vec::new(),
            }),
            scope: StartedScope::spawn(runtime),
        })
    }

    pub fn state(&self) -> LifecycleState {
        self.lock_inner().state
    }

    pub fn scope(&self) -> StartedScope {
        self.scope.clone()
    }

    /// Register an observer. One added while started receives `on_start` now.
    pub fn add_observer(&self, observer: Arc<dyn LifecycleObserver>) -> Result<(), MonitorError> {
        let mut inner = self.lock_inner();
        if inner.state == LifecycleState::Destroyed {
            return Err(MonitorError::Destroyed);
        }
        inner.observers.push(Arc::clone(&observer));
        if inner.state == LifecycleState::Started {
            observer.on_start()?;
        }
        Ok(())
    }

    /// Activate the update queue, then notify observers in registration order.
    /// Starting an already started owner does nothing.
    pub fn start(&self) -> Result<(), MonitorError> {
        let mut inner = self.lock_inner();
        match inner.state {
            LifecycleState::Started => return Ok(()),
            LifecycleState::Destroyed => return Err(MonitorError::Destroyed),
            LifecycleState::Initialized | LifecycleState::Stopped => {}
        }
        inner.state = LifecycleState::Started;
        self.scope.activate();
        tracing::info!("Lifecycle started ({} observers)", inner.observers.len());
        for observer in &inner.observers {
            observer.on_start()?;
        }
        Ok(())
    }

    /// Deactivate the update queue (dropping pending jobs), notify observers
    /// in reverse registration order, then wait for a job still running.
    pub fn stop(&self) -> Result<(), MonitorError> {
        let result = {
            let mut inner = self.lock_inner();
            if inner.state != LifecycleState::Started {
                return Ok(());
            }
            inner.state = LifecycleState::Stopped;
            let dropped = self.scope.deactivate();
            tracing::info!("Lifecycle stopped, {dropped} pending update(s) dropped");
            inner
                .observers
                .iter()
                .rev()
                .try_for_each(|observer| observer.on_stop())
        };
        // The owner lock is released first: the running job may use the owner.
        self.scope.wait_idle();
        result
    }

    /// Stop if needed, release observers and shut the update task down.
    pub fn destroy(&self) -> Result<(), MonitorError> {
        let result = self.stop();
        let mut inner = self.lock_inner();
        if inner.state != LifecycleState::Destroyed {
            inner.state = LifecycleState::Destroyed;
            inner.observers.clear();
            self.scope.close();
            tracing::info!("Lifecycle destroyed");
        }
        result
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, OwnerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for LifecycleOwner {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            tracing::warn!("Lifecycle teardown reported an error: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Let the update task run.
    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    fn counting_job(counter: &Arc<AtomicUsize>) -> Job {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<&'static str>>,
    }

    impl LifecycleObserver for RecordingObserver {
        fn on_start(&self) -> Result<(), MonitorError> {
            self.events.lock().unwrap().push("start");
            Ok(())
        }

        fn on_stop(&self) -> Result<(), MonitorError> {
            self.events.lock().unwrap().push("stop");
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_launch_before_start_is_dropped() {
        let owner = LifecycleOwner::new().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        assert!(!owner.scope().launch(counting_job(&counter)));
        owner.start().unwrap();
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_jobs_run_while_started() {
        let owner = LifecycleOwner::new().unwrap();
        assert!(!owner.scope().is_active());
        owner.start().unwrap();
        assert!(owner.scope().is_active());
        let counter = Arc::new(AtomicUsize::new(0));
        assert!(owner.scope().launch(counting_job(&counter)));
        assert!(owner.scope().launch(counting_job(&counter)));
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(owner.scope().pending(), 0);
    }

    #[tokio::test]
    async fn test_stop_clears_queued_jobs() {
        let owner = LifecycleOwner::new().unwrap();
        owner.start().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        // The current-thread runtime has not polled the update task yet.
        assert!(owner.scope().launch(counting_job(&counter)));
        assert_eq!(owner.scope().pending(), 1);
        owner.stop().unwrap();
        assert_eq!(owner.scope().pending(), 0);
        assert!(!owner.scope().is_active());

        owner.start().unwrap();
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_observers_follow_transitions() {
        let owner = LifecycleOwner::new().unwrap();
        let observer = Arc::new(RecordingObserver::default());
        owner.add_observer(observer.clone()).unwrap();

        owner.start().unwrap();
        owner.start().unwrap();
        owner.stop().unwrap();
        owner.stop().unwrap();
        owner.start().unwrap();
        owner.destroy().unwrap();

        assert_eq!(
            *observer.events.lock().unwrap(),
            vec!["start", "stop", "start", "stop"]
        );
        assert_eq!(owner.state(), LifecycleState::Destroyed);
    }

    #[tokio::test]
    async fn test_observer_added_while_started_gets_start() {
        let owner = LifecycleOwner::new().unwrap();
        owner.start().unwrap();
        let observer = Arc::new(RecordingObserver::default());
        owner.add_observer(observer.clone()).unwrap();
        assert_eq!(*observer.events.lock().unwrap(), vec!["start"]);
    }

    #[tokio::test]
    async fn test_destroyed_owner_rejects_use() {
        let owner = LifecycleOwner::new().unwrap();
        owner.destroy().unwrap();
        assert!(matches!(owner.start(), Err(MonitorError::Destroyed)));
        assert!(matches!(
            owner.add_observer(Arc::new(RecordingObserver::default())),
            Err(MonitorError::Destroyed)
        ));
        let counter = Arc::new(AtomicUsize::new(0));
        assert!(!owner.scope().launch(counting_job(&counter)));
    }

    #[tokio::test]
    async fn test_observer_error_propagates_from_start() {
        struct Failing;
        impl LifecycleObserver for Failing {
            fn on_start(&self) -> Result<(), MonitorError> {
                Err(MonitorError::AlreadyRegistered("primary".into()))
            }
        }

        let owner = LifecycleOwner::new().unwrap();
        owner.add_observer(Arc::new(Failing)).unwrap();
        let err = owner.start().unwrap_err();
        assert_eq!(err.kind(), "AlreadyRegistered");
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        assert!(matches!(LifecycleOwner::new(), Err(MonitorError::Runtime(_))));
    }

    #[test]
    fn test_with_runtime_runs_jobs_on_that_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let owner = LifecycleOwner::with_runtime(runtime.handle());
        owner.start().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        assert!(owner.scope().launch(counting_job(&counter)));
        runtime.block_on(settle());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_waits_for_running_job() {
        let owner = LifecycleOwner::new().unwrap();
        owner.start().unwrap();
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let finished = Arc::new(AtomicBool::new(false));
        let job_finished = Arc::clone(&finished);
        assert!(owner.scope().launch(Box::new(move || {
            let _ = started_tx.send(());
            std::thread::sleep(Duration::from_millis(200));
            job_finished.store(true, Ordering::SeqCst);
        })));

        tokio::time::timeout(Duration::from_secs(2), started_rx)
            .await
            .expect("job never started")
            .unwrap();
        owner.stop().unwrap();
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_job_can_stop_its_owner() {
        let owner = LifecycleOwner::new().unwrap();
        let observer = Arc::new(RecordingObserver::default());
        owner.add_observer(observer.clone()).unwrap();
        owner.start().unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel();
        let job_owner = Arc::clone(&owner);
        assert!(owner.scope().launch(Box::new(move || {
            let _ = tx.send(job_owner.stop());
        })));

        let result = tokio::time::timeout(Duration::from_secs(2), rx)
            .await
            .expect("stop from inside a job did not return")
            .unwrap();
        assert!(result.is_ok());
        assert_eq!(owner.state(), LifecycleState::Stopped);
        assert!(!owner.scope().is_active());
        assert_eq!(*observer.events.lock().unwrap(), vec!["start", "stop"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_job_can_drop_last_owner_handle() {
        let owner = LifecycleOwner::new().unwrap();
        owner.start().unwrap();
        let scope = owner.scope();

        let (tx, rx) = tokio::sync::oneshot::channel();
        assert!(scope.launch(Box::new(move || {
            drop(owner);
            let _ = tx.send(());
        })));

        tokio::time::timeout(Duration::from_secs(2), rx)
            .await
            .expect("teardown from inside a job did not return")
            .unwrap();
        assert!(!scope.is_active());
        assert!(!scope.launch(Box::new(|| {})));
    }
}
