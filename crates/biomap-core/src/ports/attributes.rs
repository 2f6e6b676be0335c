use crate::error::Result;
use crate::models::AttributeRecord;

/// Tabular store joined to polygon features.
pub trait AttributeStore: Send + Sync {
    /// Look a row up by external code first, then by name
    fn lookup(&self, name: &str, external_code: Option<&str>) -> Result<Option<AttributeRecord>>;

    /// Number of rows in the store
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
