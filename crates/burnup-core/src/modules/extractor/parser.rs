use super::{HeaderPattern, NOISE_FLOOR_GRAMS, SubsectionKind};
use std::ops::Range;

pub(super) const CASE_MARKER_PREFIX: &str = "Nuclide concentrations in grams for case '";
pub(super) const TABLE_MARKER: &str = "Nuclide concentrations in";

#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Accepted { nuclide: String, mass_grams: f64 },
    Blank,
    Separator,
    Totals,
    TooShort,
    UnparsableValue,
    BelowNoiseFloor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct CaseMarker {
    pub(super) label: String,
    pub(super) offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct TableHeader {
    pub(super) line_index: usize,
    pub(super) column_count: usize,
    pub(super) last_time_label: String,
}

pub(super) fn case_markers(text: &str) -> Vec<CaseMarker> {
    let mut markers = Vec::new();
    let mut cursor = 0;
    while let Some(found) = text[cursor..].find(CASE_MARKER_PREFIX) {
        let offset = cursor + found;
        let label_start = offset + CASE_MARKER_PREFIX.len();
        cursor = label_start;

        let rest = &text[label_start..];
        let Some(label_len) = rest.find(['\'', '\n']) else {
            break;
        };
        if !rest[label_len..].starts_with('\'') {
            continue;
        }
        markers.push(CaseMarker {
            label: rest[..label_len].to_string(),
            offset,
        });
    }
    markers
}

/// Byte range owned by `label`: its first marker up to the first later marker
/// of another case.
pub(super) fn case_scope(text: &str, markers: &[CaseMarker], label: &str) -> Option<Range<usize>> {
    let first = markers.iter().position(|marker| marker.label == label)?;
    let start = markers[first].offset;
    let end = markers[first + 1..]
        .iter()
        .find(|marker| marker.label != label)
        .map_or(text.len(), |marker| marker.offset);
    Some(start..end)
}

/// Subsection text inside `scope`, ending at the next table marker of any kind.
pub(super) fn locate_subsection<'t>(
    text: &'t str,
    scope: Range<usize>,
    kind: SubsectionKind,
) -> Option<&'t str> {
    let scoped = &text[scope];
    let start = match kind.marker() {
        Some(marker) => scoped.find(marker)?,
        None => 0,
    };
    let body_start = start + TABLE_MARKER.len();
    let end = scoped[body_start..]
        .find(TABLE_MARKER)
        .map_or(scoped.len(), |offset| body_start + offset);
    Some(&scoped[start..end])
}

pub(super) fn find_header<'l>(lines: &[&'l str], pattern: HeaderPattern) -> Option<TableHeader> {
    lines.iter().enumerate().find_map(|(line_index, line)| {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let first = tokens.first()?;
        if !matches_time_header(first, pattern) {
            return None;
        }
        Some(TableHeader {
            line_index,
            column_count: tokens.len(),
            last_time_label: tokens.last().map_or_else(String::new, |last| last.to_string()),
        })
    })
}

/// Matches the leading time-column token of a table header, `1.00E+02min` for
/// the strict form. The permissive form makes the exponent marker and sign optional.
pub fn matches_time_header(token: &str, pattern: HeaderPattern) -> bool {
    let bytes = token.as_bytes();
    let mut pos = 0;

    let integer = digit_run(bytes, pos);
    if integer == 0 || bytes.get(pos + integer) != Some(&b'.') {
        return false;
    }
    pos += integer + 1;

    let fraction = digit_run(bytes, pos);
    if fraction == 0 {
        return false;
    }
    pos += fraction;

    let has_exponent_marker = bytes.get(pos) == Some(&b'E');
    if has_exponent_marker {
        pos += 1;
    }
    let has_sign = matches!(bytes.get(pos), Some(b'+' | b'-'));
    if has_sign {
        pos += 1;
    }
    if pattern == HeaderPattern::Strict && !(has_exponent_marker && has_sign) {
        return false;
    }

    let exponent = digit_run(bytes, pos);
    if exponent == 0 {
        // `1.25min`: with neither marker present the fraction digits split into the exponent
        let split = !has_exponent_marker && !has_sign && fraction >= 2;
        if !split {
            return false;
        }
    }
    bytes[pos + exponent..].starts_with(b"min")
}

/// Classifies one data line; `value_column` is the token index of the last
/// time column (the header's token count, since token 0 is the nuclide name).
pub fn classify_row(line: &str, value_column: usize) -> RowOutcome {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return RowOutcome::Blank;
    }
    if trimmed.starts_with('=') || trimmed.starts_with('-') {
        return RowOutcome::Separator;
    }
    if trimmed.to_ascii_lowercase().contains("totals") {
        return RowOutcome::Totals;
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    if tokens.len() < value_column + 1 {
        return RowOutcome::TooShort;
    }
    let Ok(mass_grams) = tokens[value_column].parse::<f64>() else {
        return RowOutcome::UnparsableValue;
    };
    if !mass_grams.is_finite() {
        return RowOutcome::UnparsableValue;
    }
    if mass_grams <= NOISE_FLOOR_GRAMS {
        return RowOutcome::BelowNoiseFloor;
    }
    RowOutcome::Accepted {
        nuclide: tokens[0].to_string(),
        mass_grams,
    }
}

fn digit_run(bytes: &[u8], start: usize) -> usize {
    bytes
        .get(start..)
        .map_or(0, |rest| rest.iter().take_while(|byte| byte.is_ascii_digit()).count())
}
