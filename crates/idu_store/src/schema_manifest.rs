use idu_urban_core::{IduError, IduResult, SchemaManifest};

pub fn schema_manifest_json() -> &'static str {
    include_str!(concat!(env!("OUT_DIR"), "/schema_manifest.json"))
}

pub fn load_schema_manifest() -> IduResult<SchemaManifest> {
    serde_json::from_str(schema_manifest_json())
        .map_err(|err| IduError::storage(format!("schema manifest parse: {err}")))
}
