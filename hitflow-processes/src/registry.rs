//! Process construction by type name.

use std::collections::BTreeMap;

use crate::processes::{
    Fiducialization, Hits3DReconstruction, HitsAnalysis, HitsNormalization,
    HitsRotateAndTranslate, HitsRotation, HitsShuffle, HitsSmearing, HitsSpecular, HitsToSignal,
    HitsTranslation, HitmapTransformation, HitsReduction, SignalToHits,
};
use crate::{Error, Process, ProcessChain, ProcessConfig, Result};

/// Constructor of a process with default parameters.
pub type ProcessFactory = fn() -> Box<dyn Process>;

fn boxed<P: Process + Default + 'static>() -> Box<dyn Process> {
    Box::new(P::default())
}

/// Maps type names to process constructors.
#[derive(Debug, Clone)]
pub struct ProcessRegistry {
    factories: BTreeMap<&'static str, ProcessFactory>,
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl ProcessRegistry {
    /// A registry without any process.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// A registry holding every built-in process.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(HitsReduction::TYPE, boxed::<HitsReduction>);
        registry.register(HitsShuffle::TYPE, boxed::<HitsShuffle>);
        registry.register(HitsRotation::TYPE, boxed::<HitsRotation>);
        registry.register(HitsTranslation::TYPE, boxed::<HitsTranslation>);
        registry.register(HitsSpecular::TYPE, boxed::<HitsSpecular>);
        registry.register(HitsRotateAndTranslate::TYPE, boxed::<HitsRotateAndTranslate>);
        registry.register(HitmapTransformation::TYPE, boxed::<HitmapTransformation>);
        registry.register(Fiducialization::TYPE, boxed::<Fiducialization>);
        registry.register(Hits3DReconstruction::TYPE, boxed::<Hits3DReconstruction>);
        registry.register(HitsNormalization::TYPE, boxed::<HitsNormalization>);
        registry.register(HitsSmearing::TYPE, boxed::<HitsSmearing>);
        registry.register(HitsAnalysis::TYPE, boxed::<HitsAnalysis>);
        registry.register(HitsToSignal::TYPE, boxed::<HitsToSignal>);
        registry.register(SignalToHits::TYPE, boxed::<SignalToHits>);
        registry
    }

    /// Registers (or replaces) a factory.
    pub fn register(&mut self, type_name: &'static str, factory: ProcessFactory) {
        self.factories.insert(type_name, factory);
    }

    /// Registered type names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    /// True if `type_name` is registered.
    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Constructs and configures one process.
    ///
    /// # Errors
    /// Returns [`Error::UnknownProcess`] or the configuration error.
    pub fn build(&self, config: &ProcessConfig) -> Result<Box<dyn Process>> {
        let factory = self
            .factories
            .get(config.type_name.as_str())
            .ok_or_else(|| Error::UnknownProcess(config.type_name.clone()))?;
        let mut process = factory();
        process.set_name(config.instance_name());
        process.configure(&config.parameters())?;
        Ok(process)
    }

    /// Builds every process and validates the resulting chain.
    ///
    /// # Errors
    /// Returns the first construction, configuration or kind error.
    pub fn build_chain(&self, configs: &[ProcessConfig]) -> Result<ProcessChain> {
        let mut chain = ProcessChain::new();
        for config in configs {
            chain.push(self.build(config)?);
        }
        chain.validate()?;
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_names() {
        let registry = ProcessRegistry::default();
        assert_eq!(registry.names().count(), 14);
        for name in ["hitsReduction", "fiducialization", "hits3DReconstruction", "signalToHits"] {
            assert!(registry.contains(name), "{name} missing");
        }
    }

    #[test]
    fn test_build_sets_name_and_parameters() {
        let registry = ProcessRegistry::default();
        let config = ProcessConfig::new("hitsReduction")
            .with_name("coarse")
            .with_parameter("maxNodes", 3);
        let process = registry.build(&config).unwrap();
        assert_eq!(process.name(), "coarse");
        assert_eq!(process.type_name(), "hitsReduction");
        assert!(process
            .metadata()
            .contains(&("maxNodes".to_string(), "3".to_string())));
    }

    #[test]
    fn test_unknown_process() {
        let registry = ProcessRegistry::default();
        let err = registry.build(&ProcessConfig::new("nope")).err().expect("expected error");
        assert!(matches!(err, Error::UnknownProcess(name) if name == "nope"));
    }

    #[test]
    fn test_build_chain_reports_mismatch() {
        let registry = ProcessRegistry::default();
        let configs: Vec<ProcessConfig> = serde_json::from_value(json!([
            { "type": "hitsToSignal" },
            { "type": "hitsAnalysis" }
        ]))
        .unwrap();
        assert!(matches!(
            registry.build_chain(&configs),
            Err(Error::TypeMismatch { position: 1, .. })
        ));
    }
}
