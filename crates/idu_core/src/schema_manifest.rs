use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemaManifest {
    pub manifest_version: String,
    pub migrations: Vec<String>,
    pub tables: Vec<TableManifest>,
    #[serde(default)]
    pub upgrade_path: Vec<UpgradeStep>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableManifest {
    pub name: String,
    pub namespace: String,
    pub columns: Vec<ColumnManifest>,
    pub indexes: Vec<IndexManifest>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnManifest {
    pub name: String,
    pub logical_type: String,
    pub nullable: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// One documented step from an older schema shape to the current one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpgradeStep {
    pub migration: String,
    pub summary: String,
}

impl SchemaManifest {
    pub fn table(&self, name: &str) -> Option<&TableManifest> {
        self.tables.iter().find(|table| table.name == name)
    }
}
