mod card;

use crate::domain::{
    BurnupError, Constituent, Disposition, MaterialComposition, NuclideMassTable, Zaid,
};
use crate::modules::identity::{ElementResolver, nuclide_to_zaid};
use crate::modules::registry::IsotopeAvailability;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub use card::{CombinedCardEntry, render_combined_cards, render_material_card};

/// Helium-4, the inert placeholder absorbing mass the active library cannot represent.
pub const SURROGATE_ZAID: Zaid = Zaid::new(2004);
pub const DEFAULT_MIN_WEIGHT_FRACTION: f64 = 1.0e-6;
pub const DEFAULT_GEOMETRY_VOLUME_CM3: f64 = 9.743_976_864_343_5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub geometry_volume_cm3: f64,
    pub min_weight_fraction: f64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            geometry_volume_cm3: DEFAULT_GEOMETRY_VOLUME_CM3,
            min_weight_fraction: DEFAULT_MIN_WEIGHT_FRACTION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("case '{case_label}' has no usable mass (total {total_mass} g); cannot form weight fractions")]
    EmptyComposition { case_label: String, total_mass: f64 },
    #[error("geometry volume must be a positive finite number of cm3, got {volume}")]
    InvalidVolume { volume: f64 },
}

impl From<GenerationError> for BurnupError {
    fn from(error: GenerationError) -> Self {
        let message = error.to_string();
        match error {
            GenerationError::EmptyComposition { .. } => {
                BurnupError::computation("RUN.EMPTY_COMPOSITION", message)
            }
            GenerationError::InvalidVolume { .. } => {
                BurnupError::input_validation("INPUT.GEOMETRY_VOLUME", message)
            }
        }
    }
}

/// Turns an aggregated mass table into a weight-fraction material against one
/// library's availability set.
pub struct MaterialGenerator<'a> {
    availability: &'a IsotopeAvailability,
    settings: GenerationSettings,
}

impl<'a> MaterialGenerator<'a> {
    pub fn new(availability: &'a IsotopeAvailability, settings: GenerationSettings) -> Self {
        Self {
            availability,
            settings,
        }
    }

    pub fn settings(&self) -> GenerationSettings {
        self.settings
    }

    pub fn generate(
        &self,
        table: &NuclideMassTable,
        material_id: u32,
        resolver: &mut ElementResolver<'_>,
    ) -> Result<MaterialComposition, GenerationError> {
        let volume = self.settings.geometry_volume_cm3;
        if !(volume.is_finite() && volume > 0.0) {
            return Err(GenerationError::InvalidVolume { volume });
        }

        let total_mass = table.total_mass();
        if !(total_mass.is_finite() && total_mass > 0.0) {
            return Err(GenerationError::EmptyComposition {
                case_label: table.case_label().to_string(),
                total_mass,
            });
        }
        let density = total_mass / volume;

        let mut fractions: BTreeMap<Zaid, f64> = BTreeMap::new();
        let mut constituents = Vec::with_capacity(table.len());
        let mut surrogate_mass = 0.0;

        for record in table.records() {
            let weight_fraction = record.mass_grams / total_mass;
            let zaid = nuclide_to_zaid(&record.name, resolver);
            let disposition = match zaid {
                None => Disposition::Unresolved,
                Some(zaid) if !self.availability.is_available(zaid) => {
                    warn!(
                        nuclide = %record.name,
                        %zaid,
                        library = self.availability.library().description(),
                        "isotope unavailable; routing mass to surrogate"
                    );
                    Disposition::Unavailable
                }
                Some(_) if weight_fraction < self.settings.min_weight_fraction => {
                    Disposition::BelowThreshold
                }
                Some(zaid) => {
                    let entry = fractions.entry(zaid).or_insert(0.0);
                    if *entry > 0.0 {
                        debug!(%zaid, nuclide = %record.name, "combining repeated ZAID");
                    }
                    *entry += weight_fraction;
                    Disposition::Included
                }
            };
            if disposition.routes_to_surrogate() {
                surrogate_mass += record.mass_grams;
            }
            constituents.push(Constituent {
                nuclide: record.name.clone(),
                zaid,
                mass_g: record.mass_grams,
                weight_fraction,
                disposition,
            });
        }

        if surrogate_mass > 0.0 {
            let surrogate_fraction = surrogate_mass / total_mass;
            *fractions.entry(SURROGATE_ZAID).or_insert(0.0) += surrogate_fraction;
            info!(
                surrogate_fraction,
                surrogate_mass, "added surrogate weight fraction"
            );
        }

        info!(
            material_id,
            isotopes = fractions.len(),
            total_mass,
            density,
            "generated material composition"
        );
        Ok(MaterialComposition {
            material_id,
            case_label: table.case_label().to_string(),
            time_label: table.time_label().unwrap_or_default().to_string(),
            library: self.availability.library(),
            total_mass_g: total_mass,
            density_g_cm3: density,
            surrogate_mass_g: surrogate_mass,
            fractions,
            constituents,
        })
    }
}
