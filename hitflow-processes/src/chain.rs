//! Ordered sequence of processes with a validated kind flow.

use hitflow_core::{Event, EventKind};

use crate::{Error, Process, ProcessContext, ProcessState, Result};

struct Stage {
    process: Box<dyn Process>,
    state: ProcessState,
}

/// An ordered chain of processes.
///
/// Built and initialised once per worker; events are fed through
/// [`ProcessChain::run`] and the first stage returning `None` drops the
/// event.
#[derive(Default)]
pub struct ProcessChain {
    stages: Vec<Stage>,
}

impl std::fmt::Debug for ProcessChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessChain")
            .field("stages", &self.names())
            .finish()
    }
}

impl ProcessChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an already configured process.
    pub fn push(&mut self, process: Box<dyn Process>) {
        self.stages.push(Stage {
            process,
            state: ProcessState::Configured,
        });
    }

    /// Builder form of [`ProcessChain::push`].
    #[must_use]
    pub fn with_process(mut self, process: Box<dyn Process>) -> Self {
        self.push(process);
        self
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// True for a chain without stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Instance names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.process.name()).collect()
    }

    /// Lifecycle state of stage `index`.
    #[must_use]
    pub fn state(&self, index: usize) -> Option<ProcessState> {
        self.stages.get(index).map(|s| s.state)
    }

    /// Kind accepted by the first stage.
    #[must_use]
    pub fn input_kind(&self) -> Option<EventKind> {
        self.stages.first().map(|s| s.process.input_kind())
    }

    /// Kind produced by the last stage.
    #[must_use]
    pub fn output_kind(&self) -> Option<EventKind> {
        self.stages.last().map(|s| s.process.output_kind())
    }

    /// Resolved configuration of every stage.
    #[must_use]
    pub fn metadata(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.stages
            .iter()
            .map(|s| (s.process.name().to_string(), s.process.metadata()))
            .collect()
    }

    /// Checks that each stage accepts what the previous one produces.
    ///
    /// # Errors
    /// Returns [`Error::TypeMismatch`] for the first incompatible pair.
    pub fn validate(&self) -> Result<()> {
        for (position, pair) in self.stages.windows(2).enumerate() {
            let (producer, consumer) = (&pair[0].process, &pair[1].process);
            if producer.output_kind() != consumer.input_kind() {
                return Err(Error::TypeMismatch {
                    position: position + 1,
                    producer: producer.name().to_string(),
                    produces: producer.output_kind(),
                    consumer: consumer.name().to_string(),
                    accepts: consumer.input_kind(),
                });
            }
        }
        Ok(())
    }

    /// Validates the chain and initialises every stage in order.
    ///
    /// # Errors
    /// Returns a validation error, a lifecycle error if the chain was
    /// already initialised, or the first stage initialisation error.
    pub fn init(&mut self, ctx: &ProcessContext) -> Result<()> {
        self.validate()?;
        for stage in &mut self.stages {
            if stage.state != ProcessState::Configured {
                return Err(Error::Lifecycle(format!(
                    "{} cannot be initialised in state {:?}",
                    stage.process.name(),
                    stage.state
                )));
            }
            stage.process.init_process(ctx)?;
            stage.state = ProcessState::Running;

            let metadata = stage.process.metadata();
            if metadata.is_empty() {
                log::info!("worker {}: {}", ctx.worker(), stage.process.name());
            } else {
                let rendered: Vec<String> =
                    metadata.iter().map(|(k, v)| format!("{k}={v}")).collect();
                log::info!(
                    "worker {}: {} [{}]",
                    ctx.worker(),
                    stage.process.name(),
                    rendered.join(", ")
                );
            }
        }
        Ok(())
    }

    /// Feeds `event` through every stage.
    ///
    /// Returns `Ok(None)` when a stage drops the event. An event whose kind
    /// does not match the first stage is dropped with a warning.
    ///
    /// # Errors
    /// Returns [`Error::Lifecycle`] if the chain is not running.
    pub fn run(&mut self, event: Event) -> Result<Option<Event>> {
        if let Some(stage) = self.stages.iter().find(|s| s.state != ProcessState::Running) {
            return Err(Error::Lifecycle(format!(
                "{} is not running (state {:?})",
                stage.process.name(),
                stage.state
            )));
        }
        if let Some(kind) = self.input_kind() {
            if event.kind() != kind {
                log::warn!(
                    "event {}: {} payload given to a chain accepting {kind}, dropped",
                    event.id,
                    event.kind()
                );
                return Ok(None);
            }
        }

        let mut current = event;
        for stage in &mut self.stages {
            let id = current.id;
            match stage.process.process_event(current) {
                Some(next) => current = next,
                None => {
                    log::debug!("event {id} dropped by {}", stage.process.name());
                    return Ok(None);
                }
            }
        }
        Ok(Some(current))
    }

    /// Ends every running stage. Calling it again has no effect.
    pub fn end(&mut self) {
        for stage in &mut self.stages {
            if stage.state == ProcessState::Running {
                stage.process.end_process();
                stage.state = ProcessState::Finished;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processes::{HitsToSignal, HitsTranslation, SignalToHits};
    use hitflow_core::{Hit, HitCloud, Vec3};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        ends: Arc<AtomicUsize>,
        drop_odd: bool,
    }

    impl Process for Counting {
        fn type_name(&self) -> &'static str {
            "counting"
        }

        fn name(&self) -> &str {
            "counting"
        }

        fn set_name(&mut self, _name: &str) {}

        fn configure(&mut self, _params: &crate::Parameters<'_>) -> Result<()> {
            Ok(())
        }

        fn process_event(&mut self, event: Event) -> Option<Event> {
            if self.drop_odd && event.id % 2 == 1 {
                None
            } else {
                Some(event)
            }
        }

        fn end_process(&mut self) {
            self.ends.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn one_hit_event(id: u64) -> Event {
        Event::hits(id, std::iter::once(Hit::new(1.0, 2.0, 3.0, 4.0)).collect())
    }

    #[test]
    fn test_type_mismatch_position() {
        let chain = ProcessChain::new()
            .with_process(Box::new(HitsTranslation::default()))
            .with_process(Box::new(SignalToHits::default()));
        match chain.validate() {
            Err(Error::TypeMismatch {
                position,
                produces,
                accepts,
                ..
            }) => {
                assert_eq!(position, 1);
                assert_eq!(produces, EventKind::Hits);
                assert_eq!(accepts, EventKind::Signal);
            }
            other => panic!("expected type mismatch, got {other:?}"),
        }

        let ok = ProcessChain::new()
            .with_process(Box::new(HitsToSignal::default()))
            .with_process(Box::new(SignalToHits::default()));
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_run_before_init_is_lifecycle_error() {
        let mut chain = ProcessChain::new().with_process(Box::new(HitsTranslation::default()));
        assert!(matches!(chain.run(one_hit_event(0)), Err(Error::Lifecycle(_))));
    }

    #[test]
    fn test_null_output_stops_chain() {
        let ends = Arc::new(AtomicUsize::new(0));
        let mut chain = ProcessChain::new()
            .with_process(Box::new(Counting {
                ends: Arc::clone(&ends),
                drop_odd: true,
            }))
            .with_process(Box::new(
                HitsTranslation::default().with_translation(Vec3::new(1.0, 0.0, 0.0)),
            ));
        chain.init(&ProcessContext::new()).unwrap();

        let kept = chain.run(one_hit_event(2)).unwrap().unwrap();
        assert_eq!(kept.hit_cloud().unwrap().position(0), Vec3::new(2.0, 2.0, 3.0));
        assert!(chain.run(one_hit_event(3)).unwrap().is_none());

        chain.end();
        chain.end();
        assert_eq!(ends.load(Ordering::SeqCst), 1);
        assert_eq!(chain.state(0), Some(ProcessState::Finished));
        assert!(chain.init(&ProcessContext::new()).is_err());
    }

    #[test]
    fn test_wrong_input_kind_is_dropped() {
        let mut chain = ProcessChain::new().with_process(Box::new(HitsTranslation::default()));
        chain.init(&ProcessContext::new()).unwrap();
        let event = Event::signal(1, hitflow_core::SignalEvent::default());
        assert!(chain.run(event).unwrap().is_none());
    }

    #[test]
    fn test_empty_chain_passes_events() {
        let mut chain = ProcessChain::new();
        chain.init(&ProcessContext::new()).unwrap();
        let event = Event::hits(5, HitCloud::new());
        assert_eq!(chain.run(event.clone()).unwrap(), Some(event));
    }
}
