pub mod errors;

pub use errors::{BurnupError, BurnupErrorCategory, BurnupResult, PipelineResult};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

/// MCNP isotope identifier, `Z * 1000 + A` with `+400` for metastable states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Zaid(u32);

impl Zaid {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    pub const fn atomic_number(self) -> u32 {
        self.0 / 1000
    }
}

impl Display for Zaid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NuclearLibrary {
    #[default]
    #[serde(rename = ".00c")]
    EndfB8,
    #[serde(rename = ".70c")]
    EndfB7,
    #[serde(rename = ".31c")]
    Jendl31,
}

impl NuclearLibrary {
    pub const ALL: [NuclearLibrary; 3] = [Self::EndfB8, Self::EndfB7, Self::Jendl31];

    pub const fn suffix(self) -> &'static str {
        match self {
            Self::EndfB8 => ".00c",
            Self::EndfB7 => ".70c",
            Self::Jendl31 => ".31c",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::EndfB8 => "ENDF/B-VIII.0",
            Self::EndfB7 => "ENDF/B-VII.0",
            Self::Jendl31 => "JENDL-3.1",
        }
    }

    pub const fn isotope_file_name(self) -> &'static str {
        match self {
            Self::EndfB8 => "endf8_isotopes.json",
            Self::EndfB7 => "endf7_isotopes.json",
            Self::Jendl31 => "jendl31_isotopes.json",
        }
    }

    /// `nlib=` value for material cards, the suffix without its leading dot.
    pub fn nlib(self) -> &'static str {
        &self.suffix()[1..]
    }
}

impl Display for NuclearLibrary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for NuclearLibrary {
    type Err = BurnupError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let normalized = normalized.strip_prefix('.').unwrap_or(normalized);
        Self::ALL
            .into_iter()
            .find(|library| library.nlib().eq_ignore_ascii_case(normalized))
            .ok_or_else(|| {
                let supported = Self::ALL
                    .iter()
                    .map(|library| library.suffix())
                    .collect::<Vec<_>>()
                    .join(", ");
                BurnupError::input_validation(
                    "INPUT.LIBRARY_SUFFIX",
                    format!(
                        "unsupported library suffix '{}'; supported libraries: {}",
                        value, supported
                    ),
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NuclideRecord {
    pub name: String,
    pub mass_grams: f64,
    pub time_label: String,
}

impl NuclideRecord {
    pub fn new(name: impl Into<String>, mass_grams: f64, time_label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mass_grams,
            time_label: time_label.into(),
        }
    }
}

/// Per-case nuclide masses, unique by nuclide name. The first record seen for a
/// name is kept and later duplicates are dropped.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NuclideMassTable {
    case_label: String,
    records: Vec<NuclideRecord>,
}

impl NuclideMassTable {
    pub fn new(case_label: impl Into<String>) -> Self {
        Self {
            case_label: case_label.into(),
            records: Vec::new(),
        }
    }

    pub fn from_records(
        case_label: impl Into<String>,
        records: impl IntoIterator<Item = NuclideRecord>,
    ) -> Self {
        let mut table = Self::new(case_label);
        let mut seen = HashSet::new();
        for record in records {
            if seen.insert(record.name.clone()) {
                table.records.push(record);
            }
        }
        table
    }

    pub fn case_label(&self) -> &str {
        &self.case_label
    }

    pub fn records(&self) -> &[NuclideRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<NuclideRecord> {
        self.records
    }

    pub fn get(&self, name: &str) -> Option<&NuclideRecord> {
        self.records.iter().find(|record| record.name == name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_mass(&self) -> f64 {
        self.records.iter().map(|record| record.mass_grams).sum()
    }

    /// Time label of the first record; every record of one case shares it in practice.
    pub fn time_label(&self) -> Option<&str> {
        self.records.first().map(|record| record.time_label.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Included,
    BelowThreshold,
    Unresolved,
    Unavailable,
}

impl Disposition {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Included => "included",
            Self::BelowThreshold => "below_threshold",
            Self::Unresolved => "unresolved",
            Self::Unavailable => "unavailable",
        }
    }

    pub const fn routes_to_surrogate(self) -> bool {
        matches!(self, Self::Unresolved | Self::Unavailable)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constituent {
    pub nuclide: String,
    pub zaid: Option<Zaid>,
    pub mass_g: f64,
    pub weight_fraction: f64,
    pub disposition: Disposition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialComposition {
    pub material_id: u32,
    pub case_label: String,
    pub time_label: String,
    pub library: NuclearLibrary,
    pub total_mass_g: f64,
    pub density_g_cm3: f64,
    pub surrogate_mass_g: f64,
    pub fractions: BTreeMap<Zaid, f64>,
    pub constituents: Vec<Constituent>,
}

impl MaterialComposition {
    pub fn fraction_sum(&self) -> f64 {
        self.fractions.values().sum()
    }

    pub fn isotope_count(&self) -> usize {
        self.fractions.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    NotStarted,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchJob {
    pub index: usize,
    pub name: String,
    pub source_path: PathBuf,
    pub material_id: u32,
    pub status: JobStatus,
    pub result: Option<MaterialComposition>,
    pub error: Option<String>,
    pub runtime_seconds: Option<f64>,
}

impl BatchJob {
    pub fn new(index: usize, source_path: impl Into<PathBuf>, material_id: u32) -> Self {
        let source_path = source_path.into();
        let name = source_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("job_{index}"));
        Self {
            index,
            name,
            source_path,
            material_id,
            status: JobStatus::NotStarted,
            result: None,
            error: None,
            runtime_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    #[default]
    Thread,
    Process,
}

impl ExecutorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Thread => "thread",
            Self::Process => "process",
        }
    }
}

impl Display for ExecutorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutorKind {
    type Err = BurnupError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "thread" => Ok(Self::Thread),
            "process" => Ok(Self::Process),
            other => Err(BurnupError::input_validation(
                "INPUT.EXECUTOR_KIND",
                format!("unknown executor '{}'; expected 'thread' or 'process'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        BatchJob, ExecutorKind, JobStatus, NuclearLibrary, NuclideMassTable, NuclideRecord, Zaid,
    };
    use std::collections::BTreeMap;

    #[test]
    fn mass_table_keeps_first_record_for_duplicate_names() {
        let table = NuclideMassTable::from_records(
            "fuelBurn",
            [
                NuclideRecord::new("u235", 10.0, "1.00E+02min"),
                NuclideRecord::new("pu239", 5.0, "1.00E+02min"),
                NuclideRecord::new("u235", 99.0, "1.00E+02min"),
            ],
        );

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("u235").map(|record| record.mass_grams), Some(10.0));
        assert!((table.total_mass() - 15.0).abs() < 1.0e-12);
        assert_eq!(table.time_label(), Some("1.00E+02min"));
    }

    #[test]
    fn library_suffix_parsing_accepts_dotted_and_bare_forms() {
        assert_eq!(".00c".parse::<NuclearLibrary>().unwrap(), NuclearLibrary::EndfB8);
        assert_eq!("70c".parse::<NuclearLibrary>().unwrap(), NuclearLibrary::EndfB7);
        assert_eq!(NuclearLibrary::Jendl31.nlib(), "31c");

        let error = ".80c".parse::<NuclearLibrary>().expect_err("unknown suffix");
        assert_eq!(error.placeholder(), "INPUT.LIBRARY_SUFFIX");
    }

    #[test]
    fn zaid_map_serializes_with_string_keys() {
        let mut fractions = BTreeMap::new();
        fractions.insert(Zaid::new(92235), 0.5);
        fractions.insert(Zaid::new(2004), 0.5);

        let json = serde_json::to_string(&fractions).expect("fractions should serialize");
        assert_eq!(json, r#"{"2004":0.5,"92235":0.5}"#);

        let parsed: BTreeMap<Zaid, f64> =
            serde_json::from_str(&json).expect("fractions should deserialize");
        assert_eq!(parsed, fractions);
    }

    #[test]
    fn batch_job_starts_not_started_and_is_named_by_file_stem() {
        let job = BatchJob::new(3, "runs/element_004.out", 203);
        assert_eq!(job.name, "element_004");
        assert_eq!(job.status, JobStatus::NotStarted);
        assert!(!job.status.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn executor_kind_parses_case_insensitively() {
        assert_eq!("Process".parse::<ExecutorKind>().unwrap(), ExecutorKind::Process);
        assert!("fiber".parse::<ExecutorKind>().is_err());
    }
}
