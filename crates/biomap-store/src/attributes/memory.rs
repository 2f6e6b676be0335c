use std::collections::HashMap;

use biomap_core::error::Result;
use biomap_core::models::AttributeRecord;
use biomap_core::ports::AttributeStore;

use super::normalize_name;

/// Attribute rows indexed by external code and normalized name.
#[derive(Debug, Clone, Default)]
pub struct MemoryAttributeStore {
    records: Vec<AttributeRecord>,
    by_code: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl MemoryAttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = AttributeRecord>) -> Self {
        let mut store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    /// Add a row. A later row with the same code or name shadows the earlier one.
    pub fn insert(&mut self, record: AttributeRecord) {
        let index = self.records.len();
        if let Some(code) = &record.external_code {
            self.by_code.insert(code.trim().to_string(), index);
        }
        self.by_name.insert(normalize_name(&record.name), index);
        self.records.push(record);
    }

    pub fn records(&self) -> &[AttributeRecord] {
        &self.records
    }
}

impl AttributeStore for MemoryAttributeStore {
    fn lookup(&self, name: &str, external_code: Option<&str>) -> Result<Option<AttributeRecord>> {
        let by_code = external_code.and_then(|code| self.by_code.get(code.trim()));
        let index = by_code.or_else(|| self.by_name.get(&normalize_name(name)));
        Ok(index.map(|&i| self.records[i].clone()))
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
