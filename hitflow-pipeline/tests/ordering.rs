#![allow(clippy::uninlined_format_args)]
//! Ordering, drop, cancellation and failure behaviour of the runner.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hitflow_core::{Event, Hit, HitCloud};
use hitflow_pipeline::{Error, PipelineRunner, Result, RunnerConfig, WorkerState};
use hitflow_processes::{Parameters, Process, ProcessChain, ProcessConfig, ProcessRegistry};

/// Sleeps a pseudo-random amount per event so workers finish out of order,
/// drops every seventh event and panics on request.
struct Jitter {
    ends: Arc<AtomicUsize>,
    panic_on: Option<u64>,
}

impl Process for Jitter {
    fn type_name(&self) -> &'static str {
        "jitter"
    }

    fn name(&self) -> &str {
        "jitter"
    }

    fn set_name(&mut self, _name: &str) {}

    fn configure(&mut self, _params: &Parameters<'_>) -> hitflow_processes::Result<()> {
        Ok(())
    }

    fn process_event(&mut self, event: Event) -> Option<Event> {
        assert_ne!(Some(event.id), self.panic_on, "jitter asked to fail");
        std::thread::sleep(Duration::from_micros((event.id * 7919) % 200));
        if event.id % 7 == 0 {
            None
        } else {
            Some(event)
        }
    }

    fn end_process(&mut self) {
        self.ends.fetch_add(1, Ordering::SeqCst);
    }
}

fn events(n: u64) -> Vec<Event> {
    (0..n)
        .map(|id| {
            #[allow(clippy::cast_precision_loss)]
            let x = id as f64;
            Event::hits(id, std::iter::once(Hit::new(x, 0.0, 0.0, 1.0)).collect())
        })
        .collect()
}

fn jitter_factory(
    ends: &Arc<AtomicUsize>,
    panic_on: Option<u64>,
) -> impl Fn(usize) -> hitflow_processes::Result<ProcessChain> + '_ {
    move |_| {
        Ok(ProcessChain::new().with_process(Box::new(Jitter {
            ends: Arc::clone(ends),
            panic_on,
        })))
    }
}

fn config() -> RunnerConfig {
    RunnerConfig::new()
        .with_workers(4)
        .with_queue_capacity(8)
        .with_flush_size(5)
}

#[test]
fn test_four_workers_thousand_events_in_order() {
    let ends = Arc::new(AtomicUsize::new(0));
    let runner = PipelineRunner::new(config());
    let mut out = Vec::new();

    let summary = runner
        .run(jitter_factory(&ends, None), events(1000), &mut |e: Event| -> Result<()> {
            out.push(e.id);
            Ok(())
        })
        .unwrap();

    let expected: Vec<u64> = (0..1000).filter(|id| id % 7 != 0).collect();
    assert_eq!(out, expected);
    assert_eq!(summary.events_in, 1000);
    assert_eq!(summary.events_out, expected.len() as u64);
    assert_eq!(summary.dropped, 143);
    assert_eq!(summary.skipped, 0);
    assert!(!summary.aborted);

    assert_eq!(ends.load(Ordering::SeqCst), 4);
    assert_eq!(summary.workers.len(), 4);
    for (i, report) in summary.workers.iter().enumerate() {
        assert_eq!(report.worker, i);
        assert_eq!(report.state, WorkerState::Finished);
        assert_eq!(report.received, 250);
        assert_eq!(report.emitted + report.dropped, 250);
        assert!(report.flushes > 0);
    }
}

#[test]
fn test_abort_stops_dispatch_and_keeps_order() {
    let ends = Arc::new(AtomicUsize::new(0));
    let runner = PipelineRunner::new(config());
    let handle = runner.abort_handle();
    let mut out = Vec::new();

    let summary = runner
        .run(jitter_factory(&ends, None), events(1000), &mut |e: Event| -> Result<()> {
            out.push(e.id);
            if out.len() == 50 {
                handle.abort();
            }
            Ok(())
        })
        .unwrap();

    assert!(summary.aborted);
    assert!(out.len() >= 50);
    assert!(out.len() < 1000);
    assert!(out.windows(2).all(|w| w[0] < w[1]), "output not ascending");
    assert!(summary.events_in < 1000 || summary.skipped > 0);
    assert_eq!(ends.load(Ordering::SeqCst), 4);
    assert!(summary
        .workers
        .iter()
        .all(|r| r.state == WorkerState::Finished));
}

#[test]
fn test_panicking_worker_is_reported() {
    let ends = Arc::new(AtomicUsize::new(0));
    let runner = PipelineRunner::new(config());

    let result = runner.run(jitter_factory(&ends, Some(501)), events(1000), &mut |_: Event| -> Result<()> {
        Ok(())
    });

    match result {
        Err(Error::WorkerPanicked { worker }) => assert_eq!(worker, 1),
        other => panic!("expected a worker panic, got {:?}", other.map(|s| s.events_out)),
    }
    assert_eq!(ends.load(Ordering::SeqCst), 3);
}

#[test]
fn test_factory_error_is_fatal_before_processing() {
    let runner = PipelineRunner::new(config());
    let registry = ProcessRegistry::default();
    let mut written = 0;

    let result = runner.run(
        |worker| {
            let config = if worker == 2 {
                ProcessConfig::new("hitsReduction").with_parameter("distanceStepFactor", 0.5)
            } else {
                ProcessConfig::new("hitsReduction")
            };
            registry.build_chain(&[config])
        },
        events(10),
        &mut |_: Event| -> Result<()> {
            written += 1;
            Ok(())
        },
    );

    assert!(matches!(
        result,
        Err(Error::Process(hitflow_processes::Error::Configuration { .. }))
    ));
    assert_eq!(written, 0);
}

#[test]
fn test_init_failure_ends_already_initialised_chains() {
    let ends = Arc::new(AtomicUsize::new(0));
    let runner = PipelineRunner::new(config());
    let registry = ProcessRegistry::default();

    let result = runner.run(
        |worker| {
            let mut chain = ProcessChain::new().with_process(Box::new(Jitter {
                ends: Arc::clone(&ends),
                panic_on: None,
            }));
            if worker == 3 {
                chain.push(registry.build(&ProcessConfig::new("fiducialization"))?);
            }
            Ok(chain)
        },
        events(10),
        &mut |_: Event| -> Result<()> { Ok(()) },
    );

    assert!(matches!(
        result,
        Err(Error::Process(hitflow_processes::Error::GeometryNotReady { .. }))
    ));
    assert_eq!(ends.load(Ordering::SeqCst), 4);
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let registry = ProcessRegistry::default();
    let input: Vec<Event> = (0..40)
        .map(|id| {
            let cloud: HitCloud = (0..12)
                .map(|i| Hit::new(f64::from(i), 0.0, 0.0, 1.0))
                .collect();
            Event::hits(id, cloud)
        })
        .collect();

    let run_once = || {
        let runner = PipelineRunner::new(config().with_workers(3).with_seed(42));
        let mut out = Vec::new();
        runner
            .run(
                |_| registry.build_chain(&[ProcessConfig::new("hitsShuffle")]),
                input.clone(),
                &mut |e: Event| -> Result<()> {
                    out.push(e);
                    Ok(())
                },
            )
            .unwrap();
        out
    };

    let first = run_once();
    let second = run_once();
    assert_eq!(first.len(), 40);
    assert_eq!(first, second);
    assert!(first.iter().any(|e| e.hit_cloud() != input[0].hit_cloud()));
}

#[test]
fn test_runner_reusable_after_failed_run() {
    let runner = PipelineRunner::new(config());
    let source: Vec<Result<Event>> = vec![
        Ok(events(1).remove(0)),
        Err(Error::InvalidConfig("bad line".to_string())),
    ];
    let failed = runner.try_run(|_| Ok(ProcessChain::new()), source, &mut |_: Event| -> Result<()> {
        Ok(())
    });
    assert!(matches!(failed, Err(Error::InvalidConfig(_))));

    let failed = runner.run(|_| Ok(ProcessChain::new()), events(10), &mut |_: Event| -> Result<()> {
        Err(Error::InvalidConfig("sink full".to_string()))
    });
    assert!(matches!(failed, Err(Error::InvalidConfig(_))));

    let mut out = Vec::new();
    let summary = runner
        .run(|_| Ok(ProcessChain::new()), events(10), &mut |e: Event| -> Result<()> {
            out.push(e.id);
            Ok(())
        })
        .unwrap();
    assert_eq!(summary.events_in, 10);
    assert_eq!(summary.events_out, 10);
    assert!(!summary.aborted);
    assert_eq!(out, (0..10).collect::<Vec<_>>());
    assert!(!runner.abort_handle().is_aborted());
}
