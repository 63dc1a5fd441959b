//! Multi-worker execution of process chains with ordered output.
//!
//! Each worker owns an independently built [`ProcessChain`]. Events are
//! dispatched round robin into bounded per-worker queues together with their
//! global sequence number; workers return `(seq, Option<Event>)` results in
//! small batches and the calling thread merges them through a
//! [`ReorderBuffer`], so the sink sees events in input order no matter which
//! worker finished first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use hitflow_core::{Event, ReadoutGeometry};
use hitflow_processes::{ProcessChain, ProcessContext};

use crate::reorder::{ReorderBuffer, Slot};
use crate::{Error, EventSink, Result};

type Batch = Vec<(u64, Option<Event>)>;

/// Runner configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Capacity of each worker's input queue.
    pub queue_capacity: usize,
    /// Results a worker buffers before handing them to the collector.
    pub flush_size: usize,
    /// Global seed; each worker derives its own stream from it.
    pub seed: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
            queue_capacity: 64,
            flush_size: 16,
            seed: 0,
        }
    }
}

impl RunnerConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of workers.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the per-worker queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the flush size.
    #[must_use]
    pub fn with_flush_size(mut self, flush_size: usize) -> Self {
        self.flush_size = flush_size;
        self
    }

    /// Sets the global seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Checks that every size is at least one.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("workers", self.workers),
            ("queueCapacity", self.queue_capacity),
            ("flushSize", self.flush_size),
        ] {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{field} must be at least 1")));
            }
        }
        Ok(())
    }
}

/// Cooperative cancellation flag shared with a running pipeline.
///
/// Aborting stops dispatch; workers skip what is still queued, end their
/// chains, and the collector emits whatever already arrived. A runner stays
/// aborted once its handle fired. Failures inside a run stop only that run.
#[derive(Clone, Debug, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    /// Requests cancellation.
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once cancellation was requested.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Stop signal of a single run: the user's handle plus a per-run flag
/// raised by internal failures, so a failed run never poisons the next.
struct RunControl<'a> {
    user: &'a AbortHandle,
    internal: AbortHandle,
}

impl<'a> RunControl<'a> {
    fn new(user: &'a AbortHandle) -> Self {
        Self {
            user,
            internal: AbortHandle::default(),
        }
    }

    fn stop(&self) {
        self.internal.abort();
    }

    fn is_stopped(&self) -> bool {
        self.user.is_aborted() || self.internal.is_aborted()
    }
}

/// Lifecycle of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    /// No chain yet.
    #[default]
    Idle,
    /// Chain built and initialised.
    Assigned,
    /// Consuming its queue.
    Running,
    /// Queue closed; flushing results and ending the chain.
    Draining,
    /// Chain ended.
    Finished,
}

/// Per-worker counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    /// Worker index.
    pub worker: usize,
    /// Last state reached.
    pub state: WorkerState,
    /// Events taken from the queue.
    pub received: usize,
    /// Events the chain kept.
    pub emitted: usize,
    /// Events the chain dropped.
    pub dropped: usize,
    /// Events discarded unprocessed after an abort.
    pub skipped: usize,
    /// Result batches handed to the collector.
    pub flushes: usize,
}

impl WorkerReport {
    fn new(worker: usize) -> Self {
        Self {
            worker,
            ..Self::default()
        }
    }

    fn transition(&mut self, state: WorkerState) {
        log::debug!("worker {}: {:?} -> {:?}", self.worker, self.state, state);
        self.state = state;
    }
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Events dispatched to workers.
    pub events_in: u64,
    /// Events written to the sink.
    pub events_out: u64,
    /// Events dropped by a chain.
    pub dropped: u64,
    /// Events discarded unprocessed after an abort.
    pub skipped: u64,
    /// Per-worker reports, by worker index.
    pub workers: Vec<WorkerReport>,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
    /// True if the run was cancelled.
    pub aborted: bool,
}

impl RunSummary {
    /// Dispatched events per second.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.events_in as f64 / secs
        } else {
            0.0
        }
    }
}

/// Runs process chains on a pool of scoped worker threads.
#[derive(Debug, Default)]
pub struct PipelineRunner {
    config: RunnerConfig,
    geometry: Option<Arc<ReadoutGeometry>>,
    abort: AbortHandle,
}

impl PipelineRunner {
    /// Creates a runner.
    #[must_use]
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            geometry: None,
            abort: AbortHandle::default(),
        }
    }

    /// Shares a readout geometry with every worker's chain.
    #[must_use]
    pub fn with_geometry(mut self, geometry: Arc<ReadoutGeometry>) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// The runner configuration.
    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// A handle that cancels runs of this runner.
    #[must_use]
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Runs `events` through one chain per worker and writes the surviving
    /// events to `sink` in input order.
    ///
    /// `factory` is called once per worker index on the calling thread; every
    /// chain is initialised before the first event is dispatched.
    ///
    /// # Errors
    /// Returns chain construction or initialisation errors before any event
    /// is processed, [`Error::WorkerPanicked`] if a worker panicked, or the
    /// first sink error.
    pub fn run<F, I, S>(&self, factory: F, events: I, sink: &mut S) -> Result<RunSummary>
    where
        F: Fn(usize) -> hitflow_processes::Result<ProcessChain>,
        I: IntoIterator<Item = Event>,
        I::IntoIter: Send,
        S: EventSink + ?Sized,
    {
        self.try_run(factory, events.into_iter().map(Ok), sink)
    }

    /// Like [`PipelineRunner::run`] for fallible sources such as
    /// [`crate::EventReader`]. The first source error stops dispatch and is
    /// returned once the workers have finished.
    ///
    /// # Errors
    /// See [`PipelineRunner::run`]; additionally returns the source error.
    pub fn try_run<F, I, S>(&self, factory: F, events: I, sink: &mut S) -> Result<RunSummary>
    where
        F: Fn(usize) -> hitflow_processes::Result<ProcessChain>,
        I: IntoIterator<Item = Result<Event>>,
        I::IntoIter: Send,
        S: EventSink + ?Sized,
    {
        self.config.validate()?;
        let start = Instant::now();
        let (chains, mut reports) = self.build_chains(&factory)?;
        log::info!(
            "running {} workers (queue {}, flush {}, seed {})",
            self.config.workers,
            self.config.queue_capacity,
            self.config.flush_size,
            self.config.seed
        );

        let control = RunControl::new(&self.abort);
        let control = &control;
        let flush_size = self.config.flush_size;
        let (out_tx, out_rx) = channel::bounded::<Batch>(self.config.workers * 2);
        let (queues, lanes): (Vec<_>, Vec<_>) = (0..self.config.workers)
            .map(|_| channel::bounded::<(u64, Event)>(self.config.queue_capacity))
            .unzip();
        let events = events.into_iter();
        let mut collector = Collector::new(sink, control);

        let (dispatched, outcomes) = std::thread::scope(|scope| {
            let handles: Vec<_> = chains
                .into_iter()
                .zip(lanes)
                .zip(reports.iter().cloned())
                .map(|((chain, lane), report)| {
                    let out_tx = out_tx.clone();
                    scope.spawn(move || run_worker(report, chain, &lane, &out_tx, flush_size, control))
                })
                .collect();
            drop(out_tx);

            let dispatcher = scope.spawn(move || dispatch(events, queues, control));

            let mut reorder = ReorderBuffer::new();
            for batch in &out_rx {
                for (seq, item) in batch {
                    reorder.push(seq, item);
                }
                while let Some(slot) = reorder.pop_ready() {
                    collector.accept(slot);
                }
            }
            if !reorder.is_empty() {
                if !control.is_stopped() {
                    log::warn!(
                        "{} results left behind a missing sequence {}",
                        reorder.len(),
                        reorder.next_expected()
                    );
                }
                for (_, slot) in reorder.drain_all() {
                    collector.accept(slot);
                }
            }

            let dispatched = match dispatcher.join() {
                Ok(dispatched) => dispatched,
                Err(payload) => std::panic::resume_unwind(payload),
            };
            let outcomes: Vec<_> = handles.into_iter().map(|h| h.join()).collect();
            (dispatched, outcomes)
        });

        let (events_in, source_error) = dispatched;
        let Collector {
            emitted,
            dropped,
            error: sink_error,
            ..
        } = collector;

        let mut worker_error = None;
        for (report, outcome) in reports.iter_mut().zip(outcomes) {
            match outcome {
                Ok(Ok(finished)) => *report = finished,
                Ok(Err(err)) => {
                    worker_error.get_or_insert(err);
                }
                Err(_) => {
                    log::error!("worker {} panicked; its lane was abandoned", report.worker);
                    return Err(Error::WorkerPanicked {
                        worker: report.worker,
                    });
                }
            }
        }
        if let Some(err) = worker_error.or(source_error).or(sink_error) {
            return Err(err);
        }

        let summary = RunSummary {
            events_in,
            events_out: emitted,
            dropped,
            skipped: reports.iter().map(|r| r.skipped as u64).sum(),
            workers: reports,
            elapsed: start.elapsed(),
            aborted: self.abort.is_aborted(),
        };
        log::info!(
            "processed {} events: {} written, {} dropped, {} skipped in {:.3} s{}",
            summary.events_in,
            summary.events_out,
            summary.dropped,
            summary.skipped,
            summary.elapsed.as_secs_f64(),
            if summary.aborted { " (aborted)" } else { "" }
        );
        Ok(summary)
    }

    fn build_chains<F>(&self, factory: &F) -> Result<(Vec<ProcessChain>, Vec<WorkerReport>)>
    where
        F: Fn(usize) -> hitflow_processes::Result<ProcessChain>,
    {
        let mut chains: Vec<ProcessChain> = Vec::with_capacity(self.config.workers);
        let mut reports = Vec::with_capacity(self.config.workers);
        for worker in 0..self.config.workers {
            let mut ctx = ProcessContext::for_worker(self.config.seed, worker);
            if let Some(geometry) = &self.geometry {
                ctx = ctx.with_geometry(Arc::clone(geometry));
            }

            let built = factory(worker).and_then(|mut chain| match chain.init(&ctx) {
                Ok(()) => Ok(chain),
                Err(err) => {
                    chain.end();
                    Err(err)
                }
            });
            match built {
                Ok(chain) => {
                    let mut report = WorkerReport::new(worker);
                    report.transition(WorkerState::Assigned);
                    chains.push(chain);
                    reports.push(report);
                }
                Err(err) => {
                    for chain in &mut chains {
                        chain.end();
                    }
                    return Err(err.into());
                }
            }
        }
        Ok((chains, reports))
    }
}

/// Feeds events round robin into the worker queues. Returns the number
/// dispatched and the first source error.
fn dispatch<I>(
    events: I,
    queues: Vec<Sender<(u64, Event)>>,
    control: &RunControl<'_>,
) -> (u64, Option<Error>)
where
    I: Iterator<Item = Result<Event>>,
{
    let mut seq = 0u64;
    let mut worker = 0usize;
    for item in events {
        if control.is_stopped() {
            log::info!("dispatch stopped after {seq} events");
            break;
        }
        let event = match item {
            Ok(event) => event,
            Err(err) => {
                control.stop();
                return (seq, Some(err));
            }
        };
        if queues[worker].send((seq, event)).is_err() {
            log::warn!("worker {worker} stopped accepting events");
            control.stop();
            break;
        }
        seq += 1;
        worker = (worker + 1) % queues.len();
    }
    (seq, None)
}

fn run_worker(
    mut report: WorkerReport,
    mut chain: ProcessChain,
    queue: &Receiver<(u64, Event)>,
    output: &Sender<Batch>,
    flush_size: usize,
    control: &RunControl<'_>,
) -> Result<WorkerReport> {
    report.transition(WorkerState::Running);
    let mut buffer: Batch = Vec::with_capacity(flush_size);
    let mut failure = None;

    loop {
        let (seq, event) = match queue.try_recv() {
            Ok(item) => item,
            Err(TryRecvError::Empty) => {
                flush(&mut buffer, output, flush_size, &mut report);
                match queue.recv() {
                    Ok(item) => item,
                    Err(_) => break,
                }
            }
            Err(TryRecvError::Disconnected) => break,
        };
        report.received += 1;

        if failure.is_some() || control.is_stopped() {
            report.skipped += 1;
            continue;
        }
        match chain.run(event) {
            Ok(Some(event)) => {
                report.emitted += 1;
                buffer.push((seq, Some(event)));
            }
            Ok(None) => {
                report.dropped += 1;
                buffer.push((seq, None));
            }
            Err(err) => {
                log::error!("worker {}: {err}", report.worker);
                control.stop();
                report.skipped += 1;
                failure = Some(err);
            }
        }
        if buffer.len() >= flush_size {
            flush(&mut buffer, output, flush_size, &mut report);
        }
    }

    report.transition(WorkerState::Draining);
    flush(&mut buffer, output, flush_size, &mut report);
    chain.end();
    report.transition(WorkerState::Finished);

    match failure {
        Some(err) => Err(err.into()),
        None => Ok(report),
    }
}

fn flush(buffer: &mut Batch, output: &Sender<Batch>, flush_size: usize, report: &mut WorkerReport) {
    if buffer.is_empty() {
        return;
    }
    let batch = std::mem::replace(buffer, Vec::with_capacity(flush_size));
    if output.send(batch).is_ok() {
        report.flushes += 1;
    }
}

struct Collector<'a, S: ?Sized> {
    sink: &'a mut S,
    control: &'a RunControl<'a>,
    emitted: u64,
    dropped: u64,
    error: Option<Error>,
}

impl<'a, S: EventSink + ?Sized> Collector<'a, S> {
    fn new(sink: &'a mut S, control: &'a RunControl<'a>) -> Self {
        Self {
            sink,
            control,
            emitted: 0,
            dropped: 0,
            error: None,
        }
    }

    fn accept(&mut self, slot: Slot<Event>) {
        match slot {
            Slot::Dropped => self.dropped += 1,
            Slot::Emit(event) => {
                if self.error.is_some() {
                    return;
                }
                match self.sink.write_event(event) {
                    Ok(()) => self.emitted += 1,
                    Err(err) => {
                        log::error!("sink failed: {err}");
                        self.control.stop();
                        self.error = Some(err);
                    }
                }
            }
        }
    }
}
