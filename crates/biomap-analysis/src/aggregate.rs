//! Attribute reduction over matched polygons.

use std::collections::{BTreeMap, BTreeSet};

use biomap_core::models::MatchedPolygon;
use serde::Serialize;

/// Named set of fields summed into one subtotal.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldGroup {
    pub name: String,
    pub fields: Vec<String>,
}

impl FieldGroup {
    pub fn new(name: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            name: name.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateSpec {
    /// Fields summed individually
    pub fields: Vec<String>,
    pub groups: Vec<FieldGroup>,
    /// Field holding the grand total. Without one the group subtotals are added up.
    pub total_field: Option<String>,
}

impl AggregateSpec {
    pub fn new(fields: &[&str]) -> Self {
        Self {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_group(mut self, group: FieldGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_total_field(mut self, field: impl Into<String>) -> Self {
        self.total_field = Some(field.into());
        self
    }

    /// Every field the reduction reads.
    fn all_fields(&self) -> BTreeSet<&str> {
        self.fields
            .iter()
            .chain(self.groups.iter().flat_map(|g| g.fields.iter()))
            .chain(self.total_field.iter())
            .map(String::as_str)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateResult {
    pub polygon_count: usize,
    pub sums: BTreeMap<String, f64>,
    pub group_totals: BTreeMap<String, f64>,
    /// Group subtotal over the grand total, 0 when the total is 0
    pub group_percent: BTreeMap<String, f64>,
    pub grand_total: f64,
    /// Fields that no matched polygon carried
    pub missing_fields: Vec<String>,
}

impl AggregateResult {
    /// Sum of a field, 0 for fields that were not requested.
    pub fn sum(&self, field: &str) -> f64 {
        self.sums.get(field).copied().unwrap_or(0.0)
    }

    pub fn group_total(&self, group: &str) -> f64 {
        self.group_totals.get(group).copied().unwrap_or(0.0)
    }
}

/// Sum the requested fields across `matched`. Missing values count as 0.
///
/// The grand total is the designated total field when at least one polygon
/// carries it, else the sum of the group subtotals.
pub fn aggregate(matched: &[MatchedPolygon], spec: &AggregateSpec) -> AggregateResult {
    let fields = spec.all_fields();
    let mut sums: BTreeMap<String, f64> = fields.iter().map(|f| (f.to_string(), 0.0)).collect();
    let mut seen: BTreeSet<&str> = BTreeSet::new();

    for polygon in matched {
        for field in &fields {
            if let Some(value) = polygon.attribute(field).filter(|v| v.is_finite()) {
                seen.insert(*field);
                if let Some(sum) = sums.get_mut(*field) {
                    *sum += value;
                }
            }
        }
    }

    let group_totals: BTreeMap<String, f64> = spec
        .groups
        .iter()
        .map(|group| {
            let total: f64 = group.fields.iter().map(|f| sums.get(f).copied().unwrap_or(0.0)).sum();
            (group.name.clone(), total)
        })
        .collect();

    let grand_total: f64 = match &spec.total_field {
        Some(field) if seen.contains(field.as_str()) => sums.get(field).copied().unwrap_or(0.0),
        _ => group_totals.values().sum(),
    };

    let group_percent = group_totals
        .iter()
        .map(|(name, total)| {
            let percent = if grand_total > 0.0 {
                total / grand_total * 100.0
            } else {
                0.0
            };
            (name.clone(), percent)
        })
        .collect();

    let missing_fields = fields
        .iter()
        .filter(|f| !seen.contains(*f))
        .map(|f| f.to_string())
        .collect();

    AggregateResult {
        polygon_count: matched.len(),
        sums,
        group_totals,
        group_percent,
        grand_total,
        missing_fields,
    }
}
