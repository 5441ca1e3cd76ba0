use crate::domain::MaterialComposition;
use crate::modules::serialization::format_scientific;

const CARD_PRECISION: usize = 6;

pub fn render_material_card(material: &MaterialComposition) -> String {
    material_card_lines(material).join("\n")
}

fn material_card_lines(material: &MaterialComposition) -> Vec<String> {
    let mut lines = Vec::with_capacity(material.fractions.len() + 6);
    lines.push("! MCNP Material Card from ORIGEN Output".to_string());
    lines.push(format!("! Case: {}", material.case_label));
    lines.push(format!("! Time column: {}", material.time_label));
    lines.push(format!(
        "! Total mass: {} g, Density: {} g/cm3",
        format_scientific(material.total_mass_g, CARD_PRECISION),
        format_scientific(material.density_g_cm3, CARD_PRECISION)
    ));
    lines.push(format!(
        "! Isotopes converted to surrogate: {} g",
        format_scientific(material.surrogate_mass_g, CARD_PRECISION)
    ));
    lines.push(format!(
        "M{} nlib={}",
        material.material_id,
        material.library.nlib()
    ));
    for (zaid, fraction) in &material.fractions {
        lines.push(format!(
            "     {} -{}",
            zaid,
            format_scientific(*fraction, CARD_PRECISION)
        ));
    }
    lines
}

#[derive(Debug, Clone, Copy)]
pub struct CombinedCardEntry<'a> {
    pub element_name: &'a str,
    pub material: &'a MaterialComposition,
}

/// Concatenates cards in the order given, each under a `c Element:` comment.
pub fn render_combined_cards(entries: &[CombinedCardEntry<'_>], generated_at_unix_seconds: u64) -> String {
    let mut lines = vec![
        "c MCNP Material Cards from Parallel ORIGEN Processing".to_string(),
        format!("c Generated from: {} element files", entries.len()),
        format!("c Processing time: {} (unix seconds)", generated_at_unix_seconds),
        "c".to_string(),
    ];
    for (index, entry) in entries.iter().enumerate() {
        if index > 0 {
            lines.push("c".to_string());
        }
        lines.push(format!("c Element: {}", entry.element_name));
        lines.extend(material_card_lines(entry.material));
    }
    lines.join("\n")
}
