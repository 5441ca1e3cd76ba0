use crate::domain::{BurnupError, BurnupResult, NuclearLibrary, Zaid};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read isotope file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse isotope file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl From<RegistryError> for BurnupError {
    fn from(error: RegistryError) -> Self {
        let message = error.to_string();
        match error {
            RegistryError::Read { .. } => BurnupError::io_system("IO.ISOTOPE_LIBRARY", message),
            RegistryError::Parse { .. } => {
                BurnupError::input_validation("INPUT.ISOTOPE_LIBRARY", message)
            }
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct IsotopeFile {
    isotopes: Vec<u32>,
}

/// ZAIDs usable with one nuclear-data library. An empty set is permissive:
/// every isotope counts as available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsotopeAvailability {
    library: NuclearLibrary,
    zaids: HashSet<Zaid>,
}

impl IsotopeAvailability {
    pub fn permissive(library: NuclearLibrary) -> Self {
        Self {
            library,
            zaids: HashSet::new(),
        }
    }

    pub fn from_zaids(library: NuclearLibrary, zaids: impl IntoIterator<Item = Zaid>) -> Self {
        Self {
            library,
            zaids: zaids.into_iter().collect(),
        }
    }

    pub fn from_file(library: NuclearLibrary, path: &Path) -> Result<Self, RegistryError> {
        let content = fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed: IsotopeFile =
            serde_json::from_str(&content).map_err(|source| RegistryError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_zaids(
            library,
            parsed.isotopes.into_iter().map(Zaid::new),
        ))
    }

    pub fn library(&self) -> NuclearLibrary {
        self.library
    }

    pub fn is_permissive(&self) -> bool {
        self.zaids.is_empty()
    }

    pub fn is_available(&self, zaid: Zaid) -> bool {
        self.zaids.is_empty() || self.zaids.contains(&zaid)
    }

    pub fn sorted_zaids(&self) -> Vec<Zaid> {
        let mut zaids: Vec<Zaid> = self.zaids.iter().copied().collect();
        zaids.sort_unstable();
        zaids
    }

    pub fn len(&self) -> usize {
        self.zaids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zaids.is_empty()
    }
}

/// Availability sets for every supported library, with one of them active.
#[derive(Debug, Clone)]
pub struct LibraryRegistry {
    active: IsotopeAvailability,
    others: BTreeMap<&'static str, IsotopeAvailability>,
}

impl LibraryRegistry {
    /// Loads `<dir>/<library file>` for every supported library. Missing files
    /// yield permissive sets; an unreadable or malformed file is fatal only for
    /// the active library. `active_override` replaces the active library's file
    /// and must exist.
    pub fn load(
        directory: &Path,
        active: NuclearLibrary,
        active_override: Option<&Path>,
    ) -> BurnupResult<Self> {
        let mut sets = BTreeMap::new();
        for library in NuclearLibrary::ALL {
            let explicit = active_override.filter(|_| library == active);
            let path = explicit
                .map(Path::to_path_buf)
                .unwrap_or_else(|| directory.join(library.isotope_file_name()));

            if explicit.is_none() && !path.is_file() {
                if library == active {
                    warn!(
                        library = library.description(),
                        path = %path.display(),
                        "isotope file not found; assuming all isotopes are available"
                    );
                }
                sets.insert(library.suffix(), IsotopeAvailability::permissive(library));
                continue;
            }

            match IsotopeAvailability::from_file(library, &path) {
                Ok(set) => {
                    info!(
                        library = library.description(),
                        isotopes = set.len(),
                        path = %path.display(),
                        "loaded isotope availability"
                    );
                    sets.insert(library.suffix(), set);
                }
                Err(error) if library == active => return Err(error.into()),
                Err(error) => {
                    warn!(library = library.description(), %error, "ignoring isotope file");
                    sets.insert(library.suffix(), IsotopeAvailability::permissive(library));
                }
            }
        }

        let active_set = sets
            .remove(active.suffix())
            .unwrap_or_else(|| IsotopeAvailability::permissive(active));
        Ok(Self {
            active: active_set,
            others: sets,
        })
    }

    pub fn from_active(set: IsotopeAvailability) -> Self {
        let others = NuclearLibrary::ALL
            .into_iter()
            .filter(|library| *library != set.library())
            .map(|library| (library.suffix(), IsotopeAvailability::permissive(library)))
            .collect();
        Self {
            active: set,
            others,
        }
    }

    pub fn active_library(&self) -> NuclearLibrary {
        self.active.library()
    }

    pub fn active(&self) -> &IsotopeAvailability {
        &self.active
    }

    pub fn get(&self, library: NuclearLibrary) -> Option<&IsotopeAvailability> {
        if library == self.active.library() {
            Some(&self.active)
        } else {
            self.others.get(library.suffix())
        }
    }
}
