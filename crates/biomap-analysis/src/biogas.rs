//! Biogas potential section built from the attribute reduction.

use std::collections::BTreeMap;

use biomap_core::round_to;
use serde::{Deserialize, Serialize};

use crate::aggregate::{AggregateResult, AggregateSpec, FieldGroup};

/// Average household consumption, kWh per month
const HOUSEHOLD_KWH_PER_MONTH: f64 = 150.0;

/// Attribute names and display labels of the biogas figures.
#[derive(Debug, Clone, PartialEq)]
pub struct BiogasSchema {
    pub total_field: String,
    pub energy_field: String,
    pub co2_field: String,
    pub population_field: String,
    /// (label, field)
    pub categories: Vec<(String, String)>,
    /// (label, field)
    pub residues: Vec<(String, String)>,
}

fn pairs(entries: &[(&str, &str)]) -> Vec<(String, String)> {
    entries
        .iter()
        .map(|(label, field)| (label.to_string(), field.to_string()))
        .collect()
}

impl Default for BiogasSchema {
    fn default() -> Self {
        Self {
            total_field: "total_biogas_m3_year".to_string(),
            energy_field: "energy_potential_mwh_year".to_string(),
            co2_field: "co2_reduction_tons_year".to_string(),
            population_field: "population".to_string(),
            categories: pairs(&[
                ("Urbano", "urban_biogas_m3_year"),
                ("Agrícola", "agricultural_biogas_m3_year"),
                ("Pecuário", "livestock_biogas_m3_year"),
            ]),
            residues: pairs(&[
                ("RSU (Resíduos Sólidos Urbanos)", "rsu_biogas_m3_year"),
                ("RPO (Resíduos Orgânicos)", "rpo_biogas_m3_year"),
                ("Cana-de-açúcar", "sugarcane_biogas_m3_year"),
                ("Soja", "soybean_biogas_m3_year"),
                ("Milho", "corn_biogas_m3_year"),
                ("Café", "coffee_biogas_m3_year"),
                ("Citros", "citrus_biogas_m3_year"),
                ("Bovinos", "cattle_biogas_m3_year"),
                ("Suínos", "swine_biogas_m3_year"),
                ("Aves", "poultry_biogas_m3_year"),
                ("Aquicultura", "aquaculture_biogas_m3_year"),
            ]),
        }
    }
}

impl BiogasSchema {
    /// Reduction covering every field of the schema. Each category is a group.
    pub fn aggregate_spec(&self) -> AggregateSpec {
        let mut fields = vec![
            self.total_field.clone(),
            self.energy_field.clone(),
            self.co2_field.clone(),
            self.population_field.clone(),
        ];
        fields.extend(self.residues.iter().map(|(_, field)| field.clone()));

        let groups = self
            .categories
            .iter()
            .map(|(label, field)| FieldGroup {
                name: label.clone(),
                fields: vec![field.clone()],
            })
            .collect();

        AggregateSpec {
            fields,
            groups,
            total_field: Some(self.total_field.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BiogasPotential {
    pub total_m3_year: f64,
    pub by_category: BTreeMap<String, f64>,
    pub by_residue: BTreeMap<String, f64>,
    pub energy_potential_mwh_year: f64,
    pub co2_reduction_tons_year: f64,
    pub homes_powered_equivalent: u64,
    pub category_percent: BTreeMap<String, f64>,
}

impl BiogasPotential {
    pub fn from_aggregate(result: &AggregateResult, schema: &BiogasSchema) -> Self {
        let energy = result.sum(&schema.energy_field);

        let by_category = schema
            .categories
            .iter()
            .map(|(label, _)| (label.clone(), result.group_total(label)))
            .collect();
        let by_residue = schema
            .residues
            .iter()
            .map(|(label, field)| (label.clone(), result.sum(field)))
            .collect();
        let category_percent = result
            .group_percent
            .iter()
            .map(|(label, percent)| (label.clone(), round_to(*percent, 2)))
            .collect();

        Self {
            total_m3_year: result.grand_total,
            by_category,
            by_residue,
            energy_potential_mwh_year: energy,
            co2_reduction_tons_year: result.sum(&schema.co2_field),
            homes_powered_equivalent: homes_powered(energy),
            category_percent,
        }
    }
}

/// Households a yearly energy figure could supply.
pub fn homes_powered(energy_mwh_year: f64) -> u64 {
    if energy_mwh_year > 0.0 {
        (energy_mwh_year * 1000.0 / (HOUSEHOLD_KWH_PER_MONTH * 12.0)).floor() as u64
    } else {
        0
    }
}
