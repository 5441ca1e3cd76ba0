mod parser;

use crate::domain::{BurnupError, NuclideRecord};
use parser::{TABLE_MARKER, case_markers, case_scope, find_header, locate_subsection};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

pub use parser::{RowOutcome, classify_row, matches_time_header};

/// Values at or below this mass are treated as background noise.
pub const NOISE_FLOOR_GRAMS: f64 = 1.0e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubsectionKind {
    FullTable,
    LightElements,
    Actinides,
    FissionProducts,
}

impl SubsectionKind {
    /// Scan order; earlier subsections win when a nuclide is listed twice.
    pub const ALL: [SubsectionKind; 4] = [
        Self::FullTable,
        Self::LightElements,
        Self::Actinides,
        Self::FissionProducts,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FullTable => "full table",
            Self::LightElements => "light elements",
            Self::Actinides => "actinides",
            Self::FissionProducts => "fission products",
        }
    }

    /// Start marker inside a case scope. The full table starts at the case marker itself.
    pub const fn marker(self) -> Option<&'static str> {
        match self {
            Self::FullTable => None,
            Self::LightElements => Some("Nuclide concentrations in grams, light elements"),
            Self::Actinides => Some("Nuclide concentrations in grams, actinides"),
            Self::FissionProducts => Some("Nuclide concentrations in grams, fission products"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderPattern {
    #[default]
    Strict,
    Permissive,
}

impl HeaderPattern {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Permissive => "permissive",
        }
    }
}

impl FromStr for HeaderPattern {
    type Err = BurnupError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "permissive" => Ok(Self::Permissive),
            other => Err(BurnupError::input_validation(
                "INPUT.HEADER_PATTERN",
                format!(
                    "unknown header pattern '{}'; expected 'strict' or 'permissive'",
                    other
                ),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounts {
    pub blank: usize,
    pub separator: usize,
    pub totals: usize,
    pub too_short: usize,
    pub unparsable_value: usize,
    pub below_noise_floor: usize,
}

impl SkipCounts {
    fn record(&mut self, outcome: &RowOutcome) {
        match outcome {
            RowOutcome::Accepted { .. } => {}
            RowOutcome::Blank => self.blank += 1,
            RowOutcome::Separator => self.separator += 1,
            RowOutcome::Totals => self.totals += 1,
            RowOutcome::TooShort => self.too_short += 1,
            RowOutcome::UnparsableValue => self.unparsable_value += 1,
            RowOutcome::BelowNoiseFloor => self.below_noise_floor += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.blank
            + self.separator
            + self.totals
            + self.too_short
            + self.unparsable_value
            + self.below_noise_floor
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsectionExtraction {
    pub kind: SubsectionKind,
    pub found: bool,
    pub time_label: Option<String>,
    pub column_count: usize,
    pub records: Vec<NuclideRecord>,
    pub skipped: SkipCounts,
}

impl SubsectionExtraction {
    fn missing(kind: SubsectionKind) -> Self {
        Self {
            kind,
            found: false,
            time_label: None,
            column_count: 0,
            records: Vec::new(),
            skipped: SkipCounts::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionReport {
    pub case_label: String,
    pub available_cases: Vec<String>,
    pub subsections: Vec<SubsectionExtraction>,
}

impl ExtractionReport {
    pub fn record_count(&self) -> usize {
        self.subsections
            .iter()
            .map(|subsection| subsection.records.len())
            .sum()
    }

    /// Records of every subsection, in scan order.
    pub fn records(&self) -> impl Iterator<Item = &NuclideRecord> {
        self.subsections
            .iter()
            .flat_map(|subsection| subsection.records.iter())
    }

    pub fn subsection(&self, kind: SubsectionKind) -> Option<&SubsectionExtraction> {
        self.subsections
            .iter()
            .find(|subsection| subsection.kind == kind)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("failed to read output '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no case sections found; expected a '{} grams for case' marker", TABLE_MARKER)]
    NoCasesFound,
    #[error("case '{case_label}' produced no nuclide records in any subsection")]
    EmptyCase { case_label: String },
}

impl From<ExtractionError> for BurnupError {
    fn from(error: ExtractionError) -> Self {
        let message = error.to_string();
        match error {
            ExtractionError::Read { .. } => BurnupError::io_system("IO.OUTPUT_READ", message),
            ExtractionError::NoCasesFound => {
                BurnupError::input_validation("INPUT.OUTPUT_NO_CASES", message)
            }
            ExtractionError::EmptyCase { .. } => {
                BurnupError::input_validation("INPUT.OUTPUT_EMPTY_CASE", message)
            }
        }
    }
}

/// Distinct case labels in order of first appearance.
pub fn discover_cases(text: &str) -> Vec<String> {
    let mut cases: Vec<String> = Vec::new();
    for marker in case_markers(text) {
        if !cases.contains(&marker.label) {
            cases.push(marker.label);
        }
    }
    cases
}

/// The requested case when present, otherwise the last case discovered in the text.
pub fn select_case<'c>(cases: &'c [String], target: Option<&str>) -> Option<&'c str> {
    if let Some(target) = target {
        if let Some(found) = cases.iter().find(|case| case.as_str() == target) {
            return Some(found.as_str());
        }
        warn!(
            requested = target,
            available = %cases.join(", "),
            "requested case not found; using the last case"
        );
    }
    cases.last().map(String::as_str)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OutputExtractor {
    header_pattern: HeaderPattern,
}

impl OutputExtractor {
    pub fn new(header_pattern: HeaderPattern) -> Self {
        Self { header_pattern }
    }

    pub fn header_pattern(&self) -> HeaderPattern {
        self.header_pattern
    }

    pub fn extract_file(
        &self,
        path: &Path,
        target_case: Option<&str>,
    ) -> Result<ExtractionReport, ExtractionError> {
        let text = fs::read_to_string(path).map_err(|source| ExtractionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.extract(&text, target_case)
    }

    pub fn extract(
        &self,
        text: &str,
        target_case: Option<&str>,
    ) -> Result<ExtractionReport, ExtractionError> {
        let markers = case_markers(text);
        let available_cases = discover_cases(text);
        let case_label = select_case(&available_cases, target_case)
            .ok_or(ExtractionError::NoCasesFound)?
            .to_string();
        let scope = case_scope(text, &markers, &case_label).ok_or(ExtractionError::NoCasesFound)?;
        info!(
            case = %case_label,
            cases = available_cases.len(),
            "selected case"
        );

        let subsections: Vec<SubsectionExtraction> = SubsectionKind::ALL
            .into_iter()
            .map(|kind| match locate_subsection(text, scope.clone(), kind) {
                Some(section) => self.extract_subsection(kind, section),
                None => {
                    warn!(case = %case_label, subsection = kind.as_str(), "subsection not found");
                    SubsectionExtraction::missing(kind)
                }
            })
            .collect();

        let report = ExtractionReport {
            case_label,
            available_cases,
            subsections,
        };
        if report.record_count() == 0 {
            return Err(ExtractionError::EmptyCase {
                case_label: report.case_label,
            });
        }
        Ok(report)
    }

    fn extract_subsection(&self, kind: SubsectionKind, section: &str) -> SubsectionExtraction {
        let lines: Vec<&str> = section.lines().collect();
        let Some(header) = find_header(&lines, self.header_pattern) else {
            warn!(
                subsection = kind.as_str(),
                pattern = self.header_pattern.as_str(),
                "no time-column header found"
            );
            return SubsectionExtraction {
                found: true,
                ..SubsectionExtraction::missing(kind)
            };
        };

        let mut records = Vec::new();
        let mut skipped = SkipCounts::default();
        for line in &lines[header.line_index + 1..] {
            match classify_row(line, header.column_count) {
                RowOutcome::Accepted {
                    nuclide,
                    mass_grams,
                } => records.push(NuclideRecord::new(
                    nuclide,
                    mass_grams,
                    header.last_time_label.as_str(),
                )),
                outcome => skipped.record(&outcome),
            }
        }

        info!(
            subsection = kind.as_str(),
            columns = header.column_count,
            time = %header.last_time_label,
            records = records.len(),
            skipped = skipped.total(),
            "extracted subsection"
        );
        SubsectionExtraction {
            kind,
            found: true,
            time_label: Some(header.last_time_label),
            column_count: header.column_count,
            records,
            skipped,
        }
    }
}
