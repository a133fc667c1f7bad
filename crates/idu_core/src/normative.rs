//! Exclusive-field rules for service type normatives.

use serde::{Deserialize, Serialize};

use crate::{IduError, IduResult, ServiceTypeId, UrbanFunctionId};

/// Raw nullable columns as a caller supplies them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NormativeFields {
    pub service_type_id: Option<ServiceTypeId>,
    pub urban_function_id: Option<UrbanFunctionId>,
    pub radius_availability_meters: Option<i32>,
    pub time_availability_minutes: Option<i32>,
    pub services_per_1000_normative: Option<f64>,
    pub services_capacity_per_1000_normative: Option<f64>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum NormativeSubject {
    ServiceType(ServiceTypeId),
    UrbanFunction(UrbanFunctionId),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Availability {
    RadiusMeters(i32),
    TimeMinutes(i32),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PerThousand {
    Services(f64),
    Capacity(f64),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CheckedNormative {
    pub subject: NormativeSubject,
    pub availability: Availability,
    pub per_thousand: PerThousand,
}

impl NormativeFields {
    /// Exactly one field of each pair must be set.
    pub fn check(&self) -> IduResult<CheckedNormative> {
        let subject = match (self.service_type_id, self.urban_function_id) {
            (Some(id), None) => NormativeSubject::ServiceType(id),
            (None, Some(id)) => NormativeSubject::UrbanFunction(id),
            (Some(_), Some(_)) => {
                return Err(IduError::invalid_normative(
                    "service_type_id and urban_function_id cannot both be set",
                ));
            }
            (None, None) => {
                return Err(IduError::invalid_normative(
                    "one of service_type_id or urban_function_id is required",
                ));
            }
        };
        let availability = match (self.radius_availability_meters, self.time_availability_minutes) {
            (Some(radius), None) if radius >= 0 => Availability::RadiusMeters(radius),
            (None, Some(minutes)) if minutes >= 0 => Availability::TimeMinutes(minutes),
            (Some(_), None) | (None, Some(_)) => {
                return Err(IduError::invalid_normative("availability must not be negative"));
            }
            _ => {
                return Err(IduError::invalid_normative(
                    "exactly one of radius_availability_meters or time_availability_minutes is required",
                ));
            }
        };
        let per_thousand = match (
            self.services_per_1000_normative,
            self.services_capacity_per_1000_normative,
        ) {
            (Some(value), None) if value.is_finite() && value >= 0.0 => PerThousand::Services(value),
            (None, Some(value)) if value.is_finite() && value >= 0.0 => PerThousand::Capacity(value),
            (Some(_), None) | (None, Some(_)) => {
                return Err(IduError::invalid_normative(
                    "per-thousand normative must be a non-negative number",
                ));
            }
            _ => {
                return Err(IduError::invalid_normative(
                    "exactly one of services_per_1000_normative or services_capacity_per_1000_normative is required",
                ));
            }
        };
        Ok(CheckedNormative {
            subject,
            availability,
            per_thousand,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Availability, NormativeFields, NormativeSubject, PerThousand};
    use crate::{IduError, ServiceTypeId, UrbanFunctionId};

    fn valid() -> NormativeFields {
        NormativeFields {
            service_type_id: Some(ServiceTypeId(1)),
            radius_availability_meters: Some(500),
            services_per_1000_normative: Some(0.5),
            ..NormativeFields::default()
        }
    }

    #[test]
    fn accepts_one_of_each_pair() {
        let checked = valid().check().expect("valid");
        assert_eq!(checked.subject, NormativeSubject::ServiceType(ServiceTypeId(1)));
        assert_eq!(checked.availability, Availability::RadiusMeters(500));
        assert_eq!(checked.per_thousand, PerThousand::Services(0.5));
    }

    #[test]
    fn rejects_both_or_neither_subject() {
        let mut both = valid();
        both.urban_function_id = Some(UrbanFunctionId(3));
        assert!(matches!(both.check(), Err(IduError::InvalidNormativeFields { .. })));
        let mut neither = valid();
        neither.service_type_id = None;
        assert!(matches!(neither.check(), Err(IduError::InvalidNormativeFields { .. })));
    }

    #[test]
    fn rejects_both_availability_and_both_rates() {
        let mut both = valid();
        both.time_availability_minutes = Some(15);
        assert!(both.check().is_err());
        let mut rates = valid();
        rates.services_capacity_per_1000_normative = Some(3.0);
        assert!(rates.check().is_err());
        let mut none = valid();
        none.services_per_1000_normative = None;
        assert!(none.check().is_err());
    }
}
