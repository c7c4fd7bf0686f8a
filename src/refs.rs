//! Tracks the insertion-ordered, de-duplicated set of schema tables a
//! single top-level statement check touches.

use indexmap::IndexSet;

use crate::name::Name;
use crate::schema::SchemaTable;

#[derive(Debug, Clone, Default)]
pub struct ReferencedTables {
    touched: IndexSet<(Option<Name>, Name)>,
}

impl ReferencedTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, table: &SchemaTable) {
        self.touched.insert((table.schema_name.clone(), table.table_name.clone()));
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Option<Name>, Name)> {
        self.touched.iter()
    }

    pub fn len(&self) -> usize {
        self.touched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.touched.is_empty()
    }
}
