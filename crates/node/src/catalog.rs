//! Habitat lookup backed by the `[[habitats]]` catalog in the config file.

use plantmon_engine::{HabitatError, HabitatProfile, HabitatSource, IdealRange};

use crate::config::HabitatEntry;

struct CatalogEntry {
    plant_name: String,
    plant_variety: String,
    profile: HabitatProfile,
}

pub struct HabitatCatalog {
    entries: Vec<CatalogEntry>,
}

impl HabitatCatalog {
    pub fn from_config(habitats: &[HabitatEntry]) -> Self {
        let entries = habitats
            .iter()
            .map(|h| CatalogEntry {
                plant_name: h.plant_name.clone(),
                plant_variety: h.plant_variety.clone(),
                profile: HabitatProfile {
                    plant_id: format!("{}-{}", h.plant_name, h.plant_variety),
                    temperature: IdealRange::new(h.temperature[0], h.temperature[1]),
                    humidity: IdealRange::new(h.humidity[0], h.humidity[1]),
                    soil_moisture: IdealRange::new(h.soil_moisture[0], h.soil_moisture[1]),
                    light_level: IdealRange::new(h.light_level[0], h.light_level[1]),
                    native_region: h.native_region.clone(),
                    growing_season: h.growing_season.clone(),
                    valid: true,
                    // Stamped by the caller on every successful fetch.
                    fetched_at: 0,
                },
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl HabitatSource for HabitatCatalog {
    fn fetch(
        &mut self,
        plant_name: &str,
        plant_variety: &str,
    ) -> Result<HabitatProfile, HabitatError> {
        self.entries
            .iter()
            .find(|e| e.plant_name == plant_name && e.plant_variety == plant_variety)
            .map(|e| e.profile.clone())
            .ok_or_else(|| HabitatError::NotFound(format!("{plant_name} {plant_variety}")))
    }
}

// ===========================================================================
// Tests
// ===========================================================================
