//! Cache pruning: deciding when dead scopes are swept.
//!
//! A [`CachePruner`] holds its caches weakly and sweeps them either on a
//! background timer ([`CachePruner::start`]), from a tokio task
//! ([`CachePruner::spawn_async`], `async` feature), or whenever the host calls
//! [`CachePruner::prune_all`], e.g. at the end of a unit of work.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::cache::{ActivationCache, CacheInner};
use crate::config::CacheSettings;
use crate::error::{pass_result, CacheError, CacheResult, DeactivationError};
use crate::scope::ScopeRef;

/// Outcome of one [`CachePruner::prune_all`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Caches that were swept
    pub caches_pruned: usize,
    /// Registered caches skipped because they were disposed
    pub caches_skipped: usize,
    /// Instances removed across all caches
    pub entries_removed: usize,
    /// Deactivation failures across all caches
    pub failures: Vec<DeactivationError>,
}

/// Drives `prune()` on a set of registered caches.
///
/// Cloning a `CachePruner` yields another handle to the same pruner. The timer
/// thread stops when [`stop`](Self::stop) is called or the last handle is
/// dropped.
///
/// # Examples
///
/// ```
/// use activation_cache::{ActivationCache, Binding, CachePruner, Context, DisposingPipeline};
/// use activation_cache::{callbacks, InstanceReference};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let pruner = CachePruner::new(Duration::from_secs(30));
/// let cache = ActivationCache::builder(Arc::new(DisposingPipeline))
///     .pruner(&pruner)
///     .build();
///
/// let request = Arc::new(());
/// let binding = Binding::with_scope("Session", callbacks::of(&request));
/// cache.remember(&Context::new(binding), InstanceReference::new(Arc::new(1u8))).unwrap();
///
/// // End of request: sweep every registered cache
/// drop(request);
/// let report = pruner.prune_all();
/// assert_eq!(report.entries_removed, 1);
/// assert_eq!(cache.count(), 0);
/// ```
#[derive(Clone)]
pub struct CachePruner {
    inner: Arc<PrunerInner>,
}

pub(crate) struct PrunerInner {
    interval: Duration,
    caches: Mutex<Vec<Weak<CacheInner>>>,
    worker: Mutex<Option<Worker>>,
    /// Stop token of the running async task
    #[cfg(feature = "async")]
    async_task: Mutex<Option<Arc<AsyncStop>>>,
}

struct Worker {
    signal: Arc<StopSignal>,
    handle: JoinHandle<()>,
    thread: ThreadId,
}

#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

#[cfg(feature = "async")]
#[derive(Default)]
struct AsyncStop {
    stopped: std::sync::atomic::AtomicBool,
    notify: tokio::sync::Notify,
}

impl CachePruner {
    /// Creates a pruner that sweeps every `interval` once started.
    pub fn new(interval: Duration) -> Self {
        Self {
            inner: Arc::new(PrunerInner {
                interval,
                caches: Mutex::new(Vec::new()),
                worker: Mutex::new(None),
                #[cfg(feature = "async")]
                async_task: Mutex::new(None),
            }),
        }
    }

    /// Creates a pruner using `settings.pruning_interval`.
    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(settings.pruning_interval)
    }

    /// Interval between timer-driven passes.
    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// Starts sweeping `cache`. The pruner holds the cache weakly.
    ///
    /// A cache is registered with at most one pruner; registering it again
    /// elsewhere moves it.
    pub fn register(&self, cache: &ActivationCache) {
        let cache_inner = cache.inner();
        {
            let mut caches = self.inner.caches.lock();
            let target = Arc::as_ptr(cache_inner);
            caches.retain(|weak| weak.strong_count() > 0);
            if !caches.iter().any(|weak| Weak::as_ptr(weak) == target) {
                caches.push(Arc::downgrade(cache_inner));
            }
        }

        let me = Arc::downgrade(&self.inner);
        if let Some(previous) = cache_inner.attach_pruner(me.clone()) {
            if !previous.ptr_eq(&me) {
                if let Some(previous) = previous.upgrade() {
                    previous.forget(cache_inner);
                }
            }
        }
    }

    /// Stops sweeping `cache`. Returns whether it was registered.
    pub fn unregister(&self, cache: &ActivationCache) -> bool {
        let removed = self.inner.forget(cache.inner());
        cache.inner().detach_pruner(&Arc::downgrade(&self.inner));
        removed
    }

    /// Number of registered caches still alive.
    pub fn registered(&self) -> usize {
        self.inner
            .caches
            .lock()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Sweeps every registered cache now.
    ///
    /// Disposed or dropped caches are skipped; failures in one cache do not
    /// stop the others.
    pub fn prune_all(&self) -> PruneReport {
        self.inner.prune_all()
    }

    /// Clears `scope` in every registered cache, e.g. when a request ends.
    /// Returns the number of instances removed.
    pub fn clear_scope_all(&self, scope: &ScopeRef) -> CacheResult<usize> {
        let mut removed = 0;
        let mut failures = Vec::new();
        for cache in self.inner.live_caches() {
            let cache = ActivationCache::from_inner(cache);
            match cache.clear_scope(scope) {
                Ok(count) => removed += count,
                Err(CacheError::Deactivation(errors)) => failures.extend(errors),
                Err(err) => return Err(err),
            }
        }
        pass_result(removed, failures)
    }

    /// Starts the background timer thread. Does nothing if already running.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidArgument`] for a zero interval and
    /// [`CacheError::Spawn`] if the thread cannot be created.
    pub fn start(&self) -> CacheResult<()> {
        if self.inner.interval.is_zero() {
            return Err(CacheError::InvalidArgument("pruning interval must be non-zero"));
        }

        let mut worker = self.inner.worker.lock();
        if worker.is_some() {
            return Ok(());
        }

        let signal = Arc::new(StopSignal::default());
        let pruner = Arc::downgrade(&self.inner);
        let interval = self.inner.interval;
        let thread_signal = signal.clone();
        let handle = thread::Builder::new()
            .name("activation-cache-pruner".to_string())
            .spawn(move || run_timer(pruner, thread_signal, interval))
            .map_err(|err| CacheError::Spawn(err.to_string()))?;

        *worker = Some(Worker {
            signal,
            thread: handle.thread().id(),
            handle,
        });
        Ok(())
    }

    /// Stops the background timer thread and waits for an in-flight pass to
    /// finish. Does nothing if not running.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Whether the background timer thread is running.
    pub fn is_running(&self) -> bool {
        self.inner.worker.lock().is_some()
    }

    /// Sweeps from a tokio task every interval until [`stop`](Self::stop) is
    /// called or the pruner is dropped. Must be called within a tokio runtime.
    ///
    /// Passes run on the blocking pool, since deactivation may block.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidArgument`] for a zero interval, or while a
    /// task started here is still running.
    #[cfg(feature = "async")]
    pub fn spawn_async(&self) -> CacheResult<tokio::task::JoinHandle<()>> {
        use std::sync::atomic::Ordering;

        if self.inner.interval.is_zero() {
            return Err(CacheError::InvalidArgument("pruning interval must be non-zero"));
        }

        let mut task = self.inner.async_task.lock();
        if task.as_ref().map_or(false, |running| !running.stopped.load(Ordering::SeqCst)) {
            return Err(CacheError::InvalidArgument("async pruner is already running"));
        }
        let stop = Arc::new(AsyncStop::default());
        *task = Some(stop.clone());
        drop(task);

        let pruner = Arc::downgrade(&self.inner);
        let interval = self.inner.interval;

        Ok(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop.notify.notified() => {}
                }
                if stop.stopped.load(Ordering::SeqCst) {
                    break;
                }
                let Some(pruner) = pruner.upgrade() else { break };
                let pass = tokio::task::spawn_blocking(move || pruner.guarded_pass());
                if let Err(err) = pass.await {
                    log::error!("[activation-cache] async prune pass did not finish: {}", err);
                }
            }
            stop.stopped.store(true, Ordering::SeqCst);
            log::debug!("[activation-cache] async pruner stopped");
        }))
    }
}

impl PrunerInner {
    fn live_caches(&self) -> Vec<Arc<CacheInner>> {
        let mut caches = self.caches.lock();
        caches.retain(|weak| weak.strong_count() > 0);
        caches.iter().filter_map(Weak::upgrade).collect()
    }

    /// Drops `cache` from the registered set.
    pub(crate) fn forget(&self, cache: &CacheInner) -> bool {
        let target = cache as *const CacheInner;
        let mut caches = self.caches.lock();
        let registered = caches.iter().any(|weak| Weak::as_ptr(weak) == target);
        caches.retain(|weak| Weak::as_ptr(weak) != target && weak.strong_count() > 0);
        registered
    }

    fn prune_all(&self) -> PruneReport {
        let mut report = PruneReport::default();
        for cache in self.live_caches() {
            if cache.is_disposed() {
                report.caches_skipped += 1;
                continue;
            }
            let (removed, failures) = cache.prune_pass();
            report.caches_pruned += 1;
            report.entries_removed += removed;
            report.failures.extend(failures);
        }
        report
    }

    /// One timer-driven pass. Never panics: a failing pass is logged and the
    /// next one runs as scheduled.
    fn guarded_pass(&self) {
        match panic::catch_unwind(AssertUnwindSafe(|| self.prune_all())) {
            Ok(report) => {
                if !report.failures.is_empty() {
                    log::warn!(
                        "[activation-cache] prune pass removed {} instance(s), \
                         {} failed to deactivate",
                        report.entries_removed,
                        report.failures.len()
                    );
                }
            }
            Err(_) => {
                log::error!("[activation-cache] prune pass panicked; will retry next interval")
            }
        }
    }

    fn stop(&self) {
        #[cfg(feature = "async")]
        {
            if let Some(task) = self.async_task.lock().take() {
                task.stopped.store(true, std::sync::atomic::Ordering::SeqCst);
                // Leaves a permit if the task is between waits
                task.notify.notify_one();
            }
        }

        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        *worker.signal.stopped.lock() = true;
        worker.signal.condvar.notify_all();

        // The timer thread may drop the last handle itself; it exits on its own then
        if worker.thread != thread::current().id() && worker.handle.join().is_err() {
            log::error!("[activation-cache] pruner thread panicked");
        }
    }
}

impl Drop for PrunerInner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_timer(pruner: Weak<PrunerInner>, signal: Arc<StopSignal>, interval: Duration) {
    log::debug!("[activation-cache] pruner started, interval {:?}", interval);
    loop {
        let deadline = Instant::now() + interval;
        {
            let mut stopped = signal.stopped.lock();
            while !*stopped {
                if signal.condvar.wait_until(&mut stopped, deadline).timed_out() {
                    break;
                }
            }
            if *stopped {
                break;
            }
        }

        let Some(pruner) = pruner.upgrade() else { break };
        pruner.guarded_pass();
    }
    log::debug!("[activation-cache] pruner stopped");
}
