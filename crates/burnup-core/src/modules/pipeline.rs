use crate::domain::{BurnupError, MaterialComposition, PipelineResult};
use crate::modules::aggregator::aggregate;
use crate::modules::extractor::{ExtractionError, OutputExtractor};
use crate::modules::identity::{ElementCache, ElementLookup, ElementResolver, PeriodicTable};
use crate::modules::material::{GenerationSettings, MaterialGenerator};
use crate::modules::registry::IsotopeAvailability;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Shared interrupt flag. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn check(&self, stage: &str) -> PipelineResult<()> {
        if self.is_cancelled() {
            return Err(interrupted_error(stage));
        }
        Ok(())
    }
}

pub fn interrupted_error(stage: &str) -> BurnupError {
    BurnupError::computation(
        "RUN.INTERRUPTED",
        format!("interrupted before {}", stage),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub composition: MaterialComposition,
    /// Element lookups not present in the cache snapshot.
    pub discovered_elements: BTreeMap<String, u32>,
}

/// Extract, aggregate and generate for one output file against read-only
/// library and element-cache snapshots.
pub struct FilePipeline {
    extractor: OutputExtractor,
    availability: IsotopeAvailability,
    settings: GenerationSettings,
    target_case: Option<String>,
    element_cache: ElementCache,
    lookup: Box<dyn ElementLookup>,
}

impl FilePipeline {
    pub fn new(availability: IsotopeAvailability, element_cache: ElementCache) -> Self {
        Self {
            extractor: OutputExtractor::default(),
            availability,
            settings: GenerationSettings::default(),
            target_case: None,
            element_cache,
            lookup: Box::new(PeriodicTable),
        }
    }

    pub fn with_extractor(mut self, extractor: OutputExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_target_case(mut self, target_case: Option<String>) -> Self {
        self.target_case = target_case;
        self
    }

    pub fn with_lookup(mut self, lookup: Box<dyn ElementLookup>) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn extractor(&self) -> OutputExtractor {
        self.extractor
    }

    pub fn availability(&self) -> &IsotopeAvailability {
        &self.availability
    }

    pub fn settings(&self) -> GenerationSettings {
        self.settings
    }

    pub fn target_case(&self) -> Option<&str> {
        self.target_case.as_deref()
    }

    pub fn element_cache(&self) -> &ElementCache {
        &self.element_cache
    }

    pub fn run_file(
        &self,
        path: &Path,
        material_id: u32,
        cancel: &CancellationToken,
    ) -> PipelineResult<PipelineOutput> {
        cancel.check("reading output")?;
        let text = fs::read_to_string(path).map_err(|source| {
            BurnupError::from(ExtractionError::Read {
                path: path.to_path_buf(),
                source,
            })
        })?;
        debug!(path = %path.display(), bytes = text.len(), "read output file");
        self.run_text(&text, material_id, cancel)
    }

    pub fn run_text(
        &self,
        text: &str,
        material_id: u32,
        cancel: &CancellationToken,
    ) -> PipelineResult<PipelineOutput> {
        cancel.check("extraction")?;
        let report = self.extractor.extract(text, self.target_case.as_deref())?;

        cancel.check("aggregation")?;
        let table = aggregate(&report);

        cancel.check("material generation")?;
        let mut resolver = ElementResolver::new(&self.element_cache, &*self.lookup);
        let composition = MaterialGenerator::new(&self.availability, self.settings).generate(
            &table,
            material_id,
            &mut resolver,
        )?;

        Ok(PipelineOutput {
            composition,
            discovered_elements: resolver.into_discovered(),
        })
    }
}
