use crate::domain::{NuclideMassTable, NuclideRecord};
use crate::modules::extractor::ExtractionReport;
use tracing::{debug, info};

/// Concatenates per-subsection record lists in order and keeps the first record
/// for every nuclide name. Duplicate masses are dropped, never summed.
pub fn aggregate_records<I, R>(case_label: &str, record_lists: I) -> NuclideMassTable
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = NuclideRecord>,
{
    let combined: Vec<NuclideRecord> = record_lists.into_iter().flatten().collect();
    let combined_len = combined.len();
    let table = NuclideMassTable::from_records(case_label, combined);

    let dropped = combined_len - table.len();
    if dropped > 0 {
        debug!(case = case_label, dropped, "dropped duplicate nuclide listings");
    }
    info!(
        case = case_label,
        nuclides = table.len(),
        "combined nuclide mass table"
    );
    table
}

pub fn aggregate(report: &ExtractionReport) -> NuclideMassTable {
    aggregate_records(
        &report.case_label,
        report
            .subsections
            .iter()
            .map(|subsection| subsection.records.iter().cloned()),
    )
}

/// Re-applies first-wins deduplication; a no-op on an aggregated table.
pub fn deduplicate(table: NuclideMassTable) -> NuclideMassTable {
    let case_label = table.case_label().to_string();
    NuclideMassTable::from_records(case_label, table.into_records())
}
