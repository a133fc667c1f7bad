//! Versioned identity keys and the deduplicate-then-constrain policy.
//!
//! Each identity-bearing table has a history of key shapes. A key version is
//! an explicit value ([`IdentityKeySpec`]) so that tightening a key can first
//! collapse rows that collide under the new shape, then add the unique index.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{IndicatorValueType, Namespace};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKeyName {
    TerritoryIndicatorValue,
    ServiceTypeNormative,
    UrbanFunctionNormative,
    ScenarioIndicatorValue,
    Buffer,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityKeySpec {
    pub name: IdentityKeyName,
    pub version: u32,
    pub namespace: Namespace,
    pub table: &'static str,
    pub columns: &'static [&'static str],
    /// Surrogate id used to pick survivors; keys without one cannot be deduplicated.
    pub row_id_column: Option<&'static str>,
    pub updated_at_column: Option<&'static str>,
    pub value_type_column: Option<&'static str>,
    /// Only rows with this column set belong to the key.
    pub scope_column: Option<&'static str>,
    pub index_name: &'static str,
}

const TERRITORY_INDICATOR_V1: IdentityKeySpec = IdentityKeySpec {
    name: IdentityKeyName::TerritoryIndicatorValue,
    version: 1,
    namespace: Namespace::Public,
    table: "territory_indicators_data",
    columns: &["indicator_id", "territory_id", "date_type", "date_value"],
    row_id_column: None,
    updated_at_column: Some("updated_at"),
    value_type_column: Some("value_type"),
    scope_column: None,
    index_name: "territory_indicators_data_pk",
};

const TERRITORY_INDICATOR_V2: IdentityKeySpec = IdentityKeySpec {
    version: 2,
    columns: &[
        "indicator_id",
        "territory_id",
        "date_type",
        "date_value",
        "value_type",
        "information_source",
    ],
    ..TERRITORY_INDICATOR_V1
};

const SERVICE_TYPE_NORMATIVE_V1: IdentityKeySpec = IdentityKeySpec {
    name: IdentityKeyName::ServiceTypeNormative,
    version: 1,
    namespace: Namespace::Public,
    table: "service_types_normatives_data",
    columns: &["service_type_id", "territory_id"],
    row_id_column: Some("normative_id"),
    updated_at_column: Some("updated_at"),
    value_type_column: None,
    scope_column: Some("service_type_id"),
    index_name: "service_types_normatives_data_service_type_unique",
};

const SERVICE_TYPE_NORMATIVE_V2: IdentityKeySpec = IdentityKeySpec {
    version: 2,
    columns: &["service_type_id", "territory_id", "year"],
    ..SERVICE_TYPE_NORMATIVE_V1
};

const URBAN_FUNCTION_NORMATIVE_V1: IdentityKeySpec = IdentityKeySpec {
    name: IdentityKeyName::UrbanFunctionNormative,
    version: 1,
    namespace: Namespace::Public,
    table: "service_types_normatives_data",
    columns: &["urban_function_id", "territory_id"],
    row_id_column: Some("normative_id"),
    updated_at_column: Some("updated_at"),
    value_type_column: None,
    scope_column: Some("urban_function_id"),
    index_name: "service_types_normatives_data_urban_function_unique",
};

const URBAN_FUNCTION_NORMATIVE_V2: IdentityKeySpec = IdentityKeySpec {
    version: 2,
    columns: &["urban_function_id", "territory_id", "year"],
    ..URBAN_FUNCTION_NORMATIVE_V1
};

const SCENARIO_INDICATOR_V1: IdentityKeySpec = IdentityKeySpec {
    name: IdentityKeyName::ScenarioIndicatorValue,
    version: 1,
    namespace: Namespace::UserProjects,
    table: "indicators_data",
    columns: &["indicator_id", "scenario_id", "territory_id", "hexagon_id"],
    row_id_column: Some("indicator_value_id"),
    updated_at_column: Some("updated_at"),
    value_type_column: None,
    scope_column: None,
    index_name: "indicators_data_unique",
};

const BUFFER_V1: IdentityKeySpec = IdentityKeySpec {
    name: IdentityKeyName::Buffer,
    version: 1,
    namespace: Namespace::Public,
    table: "buffers_data",
    columns: &["buffer_type_id", "urban_object_id"],
    row_id_column: None,
    updated_at_column: None,
    value_type_column: None,
    scope_column: None,
    index_name: "buffers_data_pk",
};

static KEY_HISTORY: &[IdentityKeySpec] = &[
    TERRITORY_INDICATOR_V1,
    TERRITORY_INDICATOR_V2,
    SERVICE_TYPE_NORMATIVE_V1,
    SERVICE_TYPE_NORMATIVE_V2,
    URBAN_FUNCTION_NORMATIVE_V1,
    URBAN_FUNCTION_NORMATIVE_V2,
    SCENARIO_INDICATOR_V1,
    BUFFER_V1,
];

pub fn identity_key(name: IdentityKeyName, version: u32) -> Option<&'static IdentityKeySpec> {
    KEY_HISTORY
        .iter()
        .find(|spec| spec.name == name && spec.version == version)
}

/// Key shape currently enforced for `name`.
pub fn current_identity_key(name: IdentityKeyName) -> &'static IdentityKeySpec {
    match name {
        IdentityKeyName::TerritoryIndicatorValue => &TERRITORY_INDICATOR_V2,
        IdentityKeyName::ServiceTypeNormative => &SERVICE_TYPE_NORMATIVE_V2,
        IdentityKeyName::UrbanFunctionNormative => &URBAN_FUNCTION_NORMATIVE_V2,
        IdentityKeyName::ScenarioIndicatorValue => &SCENARIO_INDICATOR_V1,
        IdentityKeyName::Buffer => &BUFFER_V1,
    }
}

pub fn identity_key_history(name: IdentityKeyName) -> Vec<&'static IdentityKeySpec> {
    KEY_HISTORY.iter().filter(|spec| spec.name == name).collect()
}

/// One dimension value. `Null` compares equal to `Null`.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum KeyValue {
    Null,
    Int(i64),
    Text(String),
}

impl From<Option<i32>> for KeyValue {
    fn from(value: Option<i32>) -> Self {
        value.map_or(KeyValue::Null, |v| KeyValue::Int(i64::from(v)))
    }
}

impl From<i32> for KeyValue {
    fn from(value: i32) -> Self {
        KeyValue::Int(i64::from(value))
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        KeyValue::Text(value.to_string())
    }
}

pub type IdentityTuple = Vec<KeyValue>;

#[derive(Clone, Debug, PartialEq)]
pub struct IdentityRow {
    pub row_id: i64,
    pub key: IdentityTuple,
    pub updated_at: Option<DateTime<Utc>>,
    pub value_type: Option<IndicatorValueType>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DedupePlan {
    pub keep: Vec<i64>,
    pub remove: Vec<i64>,
    pub duplicate_groups: usize,
}

/// Survivor ordering: latest `updated_at`, then value type priority
/// (real, target, forecast, other), then the highest row id.
pub fn compare_survivors(a: &IdentityRow, b: &IdentityRow) -> Ordering {
    a.updated_at
        .cmp(&b.updated_at)
        .then_with(|| {
            IndicatorValueType::priority(b.value_type).cmp(&IndicatorValueType::priority(a.value_type))
        })
        .then_with(|| a.row_id.cmp(&b.row_id))
}

pub fn plan_deduplication(rows: &[IdentityRow]) -> DedupePlan {
    let mut groups: HashMap<&IdentityTuple, Vec<&IdentityRow>> = HashMap::new();
    for row in rows {
        groups.entry(&row.key).or_default().push(row);
    }
    let mut plan = DedupePlan::default();
    for members in groups.into_values() {
        if members.len() > 1 {
            plan.duplicate_groups += 1;
        }
        let Some(winner) = members.iter().copied().max_by(|a, b| compare_survivors(a, b)) else {
            continue;
        };
        plan.keep.push(winner.row_id);
        plan.remove.extend(
            members
                .iter()
                .filter(|row| row.row_id != winner.row_id)
                .map(|row| row.row_id),
        );
    }
    plan.keep.sort_unstable();
    plan.remove.sort_unstable();
    plan
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityReport {
    pub key: IdentityKeyName,
    pub version: u32,
    pub scanned: usize,
    pub duplicate_groups: usize,
    pub removed: usize,
    pub index_name: String,
}
