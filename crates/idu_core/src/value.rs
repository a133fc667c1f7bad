use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{IduError, IduResult};

macro_rules! string_tag {
    ($name:ident { $($variant:ident => $text:literal),* $(,)? }) => {
        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)*
                }
            }

            pub fn parse(value: &str) -> IduResult<Self> {
                match value {
                    $($text => Ok(Self::$variant),)*
                    other => Err(IduError::validation(format!(
                        "unknown {} '{other}'",
                        stringify!($name)
                    ))),
                }
            }
        }
    };
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFieldType {
    Year,
    HalfYear,
    Quarter,
    Month,
    Day,
}

string_tag!(DateFieldType {
    Year => "year",
    HalfYear => "half_year",
    Quarter => "quarter",
    Month => "month",
    Day => "day",
});

impl DateFieldType {
    /// A period value must point at the first day of its period.
    pub fn check_date(self, date: NaiveDate) -> IduResult<()> {
        let ok = match self {
            Self::Year => date.month() == 1 && date.day() == 1,
            Self::HalfYear => matches!(date.month(), 1 | 7) && date.day() == 1,
            Self::Quarter => matches!(date.month(), 1 | 4 | 7 | 10) && date.day() == 1,
            Self::Month => date.day() == 1,
            Self::Day => true,
        };
        if ok {
            Ok(())
        } else {
            Err(IduError::validation(format!(
                "invalid {} date_value {date}",
                self.as_str()
            )))
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorValueType {
    Real,
    Target,
    Forecast,
}

string_tag!(IndicatorValueType {
    Real => "real",
    Target => "target",
    Forecast => "forecast",
});

impl IndicatorValueType {
    /// Tie-break rank used by deduplication; lower wins. Unknown tags rank last.
    pub fn priority(value: Option<Self>) -> u8 {
        match value {
            Some(Self::Real) => 0,
            Some(Self::Target) => 1,
            Some(Self::Forecast) => 2,
            None => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InfrastructureType {
    #[default]
    Basic,
    Additional,
    Comfort,
}

string_tag!(InfrastructureType {
    Basic => "basic",
    Additional => "additional",
    Comfort => "comfort",
});

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioPhase {
    Investment,
    PreDesign,
    Design,
    Construction,
    Operation,
    Decommission,
}

string_tag!(ScenarioPhase {
    Investment => "investment",
    PreDesign => "pre_design",
    Design => "design",
    Construction => "construction",
    Operation => "operation",
    Decommission => "decommission",
});

/// Logical schema a table lives in.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Public,
    UserProjects,
}

string_tag!(Namespace {
    Public => "public",
    UserProjects => "user_projects",
});
