use crate::common::elements::atomic_number_for_element;
use crate::domain::{BurnupError, Zaid};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const METASTABLE_OFFSET: u32 = 400;
const AMERICIUM: u32 = 95;
const AM242_MASS_NUMBER: u32 = 242;
const AM242_METASTABLE_ZAID: u32 = 95242;
const AM242_GROUND_ZAID: u32 = 95642;
/// Three digits are all the `ZZZAAA` layout has room for.
const MAX_MASS_NUMBER: u32 = 999;

/// Element name or symbol to atomic number, the slow path behind [`ElementCache`].
pub trait ElementLookup: Send + Sync {
    fn atomic_number(&self, element: &str) -> Option<u32>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PeriodicTable;

impl ElementLookup for PeriodicTable {
    fn atomic_number(&self, element: &str) -> Option<u32> {
        atomic_number_for_element(element).and_then(|z| u32::try_from(z).ok())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ElementCacheError {
    #[error("failed to read element cache '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse element cache '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write element cache '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<ElementCacheError> for BurnupError {
    fn from(error: ElementCacheError) -> Self {
        let message = error.to_string();
        match error {
            ElementCacheError::Read { .. } | ElementCacheError::Write { .. } => {
                BurnupError::io_system("IO.ELEMENT_CACHE", message)
            }
            ElementCacheError::Parse { .. } => {
                BurnupError::input_validation("INPUT.ELEMENT_CACHE", message)
            }
        }
    }
}

/// Persisted `element name -> atomic number` map. Loaded once before a run and
/// rewritten wholesale by an explicit [`ElementCache::save`] afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementCache {
    entries: BTreeMap<String, u32>,
}

impl ElementCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A missing file is an empty cache; an unreadable or malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ElementCacheError> {
        if !path.exists() {
            info!(path = %path.display(), "no element cache found; starting empty");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ElementCacheError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cache: Self =
            serde_json::from_str(&content).map_err(|source| ElementCacheError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        info!(
            path = %path.display(),
            elements = cache.len(),
            "loaded element cache"
        );
        Ok(cache)
    }

    pub fn save(&self, path: &Path) -> Result<(), ElementCacheError> {
        crate::modules::serialization::write_json_artifact(path, self).map_err(|source| {
            ElementCacheError::Write {
                path: path.to_path_buf(),
                source,
            }
        })?;
        info!(
            path = %path.display(),
            elements = self.len(),
            "saved element cache"
        );
        Ok(())
    }

    pub fn get(&self, element: &str) -> Option<u32> {
        self.entries.get(element).copied()
    }

    pub fn insert(&mut self, element: impl Into<String>, atomic_number: u32) {
        self.entries.insert(element.into(), atomic_number);
    }

    /// Adds entries not already cached and returns how many were new.
    pub fn merge(&mut self, entries: impl IntoIterator<Item = (String, u32)>) -> usize {
        let mut added = 0;
        for (element, atomic_number) in entries {
            if !self.entries.contains_key(&element) {
                self.entries.insert(element, atomic_number);
                added += 1;
            }
        }
        added
    }

    pub fn entries(&self) -> &BTreeMap<String, u32> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown element '{element}'")]
pub struct UnknownElement {
    pub element: String,
}

/// Resolves element names against a read-only cache snapshot first, then the
/// lookup. Lookup results are kept in `discovered` for the caller to merge.
pub struct ElementResolver<'a> {
    snapshot: &'a ElementCache,
    lookup: &'a dyn ElementLookup,
    discovered: BTreeMap<String, u32>,
}

impl<'a> ElementResolver<'a> {
    pub fn new(snapshot: &'a ElementCache, lookup: &'a dyn ElementLookup) -> Self {
        Self {
            snapshot,
            lookup,
            discovered: BTreeMap::new(),
        }
    }

    pub fn resolve(&mut self, element: &str) -> Result<u32, UnknownElement> {
        if let Some(atomic_number) = self
            .snapshot
            .get(element)
            .or_else(|| self.discovered.get(element).copied())
        {
            return Ok(atomic_number);
        }

        let atomic_number = self.lookup.atomic_number(element).ok_or_else(|| UnknownElement {
            element: element.to_string(),
        })?;
        debug!(element, atomic_number, "cached atomic number");
        self.discovered.insert(element.to_string(), atomic_number);
        Ok(atomic_number)
    }

    pub fn discovered(&self) -> &BTreeMap<String, u32> {
        &self.discovered
    }

    pub fn into_discovered(self) -> BTreeMap<String, u32> {
        self.discovered
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ZaidError {
    #[error("nuclide '{nuclide}' is not of the form <element>-<mass>")]
    MalformedName { nuclide: String },
    #[error("nuclide '{nuclide}' has no mass number")]
    MissingMassNumber { nuclide: String },
    #[error("nuclide '{nuclide}' has a mass number above {}", MAX_MASS_NUMBER)]
    MassNumberOutOfRange { nuclide: String },
    #[error("nuclide '{nuclide}' (Z = {atomic_number}) does not fit a ZAID")]
    ZaidOverflow { nuclide: String, atomic_number: u32 },
    #[error(transparent)]
    UnknownElement(#[from] UnknownElement),
}

/// Derives the ZAID for names such as `U-235`, `xe_135m` or `Am-242m`.
pub fn derive_zaid(nuclide: &str, resolver: &mut ElementResolver<'_>) -> Result<Zaid, ZaidError> {
    let malformed = || ZaidError::MalformedName {
        nuclide: nuclide.to_string(),
    };
    let mut parts = nuclide.split(['-', '_']);
    let (Some(element_part), Some(mass_part), None) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed());
    };

    let element = capitalize(element_part.trim());
    if element.is_empty() {
        return Err(malformed());
    }
    let z = resolver.resolve(&element)?;

    let mass_part = mass_part.trim();
    let digits: String = mass_part.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(ZaidError::MissingMassNumber {
            nuclide: nuclide.to_string(),
        });
    }
    let out_of_range = || ZaidError::MassNumberOutOfRange {
        nuclide: nuclide.to_string(),
    };
    let a = digits
        .parse::<u32>()
        .ok()
        .filter(|a| *a <= MAX_MASS_NUMBER)
        .ok_or_else(out_of_range)?;
    let metastable = mass_part
        .chars()
        .last()
        .is_some_and(|last| last.eq_ignore_ascii_case(&'m'));

    let value = match (z, a, metastable) {
        (AMERICIUM, AM242_MASS_NUMBER, true) => Some(AM242_METASTABLE_ZAID),
        (AMERICIUM, AM242_MASS_NUMBER, false) => Some(AM242_GROUND_ZAID),
        _ => compose_zaid(z, a, metastable),
    };
    value.map(Zaid::new).ok_or_else(|| ZaidError::ZaidOverflow {
        nuclide: nuclide.to_string(),
        atomic_number: z,
    })
}

fn compose_zaid(z: u32, a: u32, metastable: bool) -> Option<u32> {
    let ground = z.checked_mul(1000)?.checked_add(a)?;
    if metastable {
        ground.checked_add(METASTABLE_OFFSET)
    } else {
        Some(ground)
    }
}

/// [`derive_zaid`] with failures logged and collapsed to `None`; callers route
/// the nuclide's mass to the surrogate.
pub fn nuclide_to_zaid(nuclide: &str, resolver: &mut ElementResolver<'_>) -> Option<Zaid> {
    match derive_zaid(nuclide, resolver) {
        Ok(zaid) => Some(zaid),
        Err(error) => {
            warn!(nuclide, %error, "could not convert nuclide to ZAID");
            None
        }
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
