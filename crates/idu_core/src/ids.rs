use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! int_id {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(pub i32);

            impl $name {
                pub fn get(self) -> i32 {
                    self.0
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl From<i32> for $name {
                fn from(value: i32) -> Self {
                    Self(value)
                }
            }
        )*
    };
}

int_id!(
    TerritoryId,
    TerritoryTypeId,
    UrbanFunctionId,
    PhysicalObjectFunctionId,
    PhysicalObjectTypeId,
    ServiceTypeId,
    ServiceId,
    NormativeId,
    ObjectGeometryId,
    FunctionalZoneId,
    IndicatorId,
    ScenarioId,
    HexagonId,
    IndicatorValueId,
    BufferTypeId,
    UrbanObjectId,
);

#[cfg(test)]
mod tests {
    use super::TerritoryId;

    #[test]
    fn ids_serialize_as_plain_integers() {
        let encoded = serde_json::to_string(&TerritoryId(42)).expect("encode");
        assert_eq!(encoded, "42");
        let decoded: TerritoryId = serde_json::from_str("7").expect("decode");
        assert_eq!(decoded, TerritoryId(7));
        assert_eq!(decoded.to_string(), "7");
    }
}
