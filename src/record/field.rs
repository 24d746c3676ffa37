//! Statistic field definitions
//!
//! Every statistic the harvester knows about is a variant of [`Field`]. The
//! order of [`Field::ALL`] is the column order of the `stats` table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a raw value is cleaned and which type it normalizes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Plain count with thousands separators, e.g. `45,678`
    Count,

    /// Whole-dollar amount, e.g. `$1,234`
    Currency,

    /// Percentage, possibly signed, e.g. `+4.5%`
    Percent,

    /// Decimal index or rate, e.g. `102.5` or `$11.45`
    Decimal,
}

impl ValueKind {
    /// Returns true if values of this kind are stored as integers
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Count | Self::Currency)
    }

    /// Returns true if `c` is a unit marker this kind strips before parsing
    pub fn strips(&self, c: char) -> bool {
        match self {
            Self::Count => c == ',',
            Self::Currency => c == '$' || c == ',',
            Self::Percent => c == '%' || c == ',',
            Self::Decimal => c == '$' || c == ',',
        }
    }

    /// SQLite column type for this kind
    pub fn sql_type(&self) -> &'static str {
        if self.is_integer() {
            "integer"
        } else {
            "float"
        }
    }
}

/// A single statistic extracted for a zip code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Population,
    PopulationGrowth,
    CostOfLiving,
    MedianHomeCost,
    MedianHomeAge,
    UtilitiesCostOfLiving,
    AverageRent,
    RentStudio,
    #[serde(rename = "rent_1br")]
    Rent1Br,
    #[serde(rename = "rent_2br")]
    Rent2Br,
    #[serde(rename = "rent_3br")]
    Rent3Br,
    #[serde(rename = "rent_4br")]
    Rent4Br,
    Unemployment,
    JobGrowth,
    ViolentCrime,
    PropertyCrime,
    RentalMarketPercent,
    Vacancy,
    PropertyTax,
    #[serde(rename = "appreciation_12mo")]
    Appreciation12Mo,
    #[serde(rename = "appreciation_5yr")]
    Appreciation5Yr,
    #[serde(rename = "appreciation_10yr")]
    Appreciation10Yr,
}

impl Field {
    /// All fields, in `stats` column order
    pub const ALL: [Field; 22] = [
        Field::Population,
        Field::PopulationGrowth,
        Field::CostOfLiving,
        Field::MedianHomeCost,
        Field::MedianHomeAge,
        Field::UtilitiesCostOfLiving,
        Field::AverageRent,
        Field::RentStudio,
        Field::Rent1Br,
        Field::Rent2Br,
        Field::Rent3Br,
        Field::Rent4Br,
        Field::Unemployment,
        Field::JobGrowth,
        Field::ViolentCrime,
        Field::PropertyCrime,
        Field::RentalMarketPercent,
        Field::Vacancy,
        Field::PropertyTax,
        Field::Appreciation12Mo,
        Field::Appreciation5Yr,
        Field::Appreciation10Yr,
    ];

    /// Column name of this field in the `stats` table
    pub fn name(&self) -> &'static str {
        match self {
            Self::Population => "population",
            Self::PopulationGrowth => "population_growth",
            Self::CostOfLiving => "cost_of_living",
            Self::MedianHomeCost => "median_home_cost",
            Self::MedianHomeAge => "median_home_age",
            Self::UtilitiesCostOfLiving => "utilities_cost_of_living",
            Self::AverageRent => "average_rent",
            Self::RentStudio => "rent_studio",
            Self::Rent1Br => "rent_1br",
            Self::Rent2Br => "rent_2br",
            Self::Rent3Br => "rent_3br",
            Self::Rent4Br => "rent_4br",
            Self::Unemployment => "unemployment",
            Self::JobGrowth => "job_growth",
            Self::ViolentCrime => "violent_crime",
            Self::PropertyCrime => "property_crime",
            Self::RentalMarketPercent => "rental_market_percent",
            Self::Vacancy => "vacancy",
            Self::PropertyTax => "property_tax",
            Self::Appreciation12Mo => "appreciation_12mo",
            Self::Appreciation5Yr => "appreciation_5yr",
            Self::Appreciation10Yr => "appreciation_10yr",
        }
    }

    /// The value kind this field normalizes with
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Population => ValueKind::Count,
            Self::MedianHomeCost
            | Self::AverageRent
            | Self::RentStudio
            | Self::Rent1Br
            | Self::Rent2Br
            | Self::Rent3Br
            | Self::Rent4Br => ValueKind::Currency,
            Self::PopulationGrowth
            | Self::Unemployment
            | Self::JobGrowth
            | Self::RentalMarketPercent
            | Self::Vacancy
            | Self::Appreciation12Mo
            | Self::Appreciation5Yr
            | Self::Appreciation10Yr => ValueKind::Percent,
            Self::CostOfLiving
            | Self::MedianHomeAge
            | Self::UtilitiesCostOfLiving
            | Self::ViolentCrime
            | Self::PropertyCrime
            | Self::PropertyTax => ValueKind::Decimal,
        }
    }

    /// Looks a field up by its column name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_field_names_are_unique() {
        let names: HashSet<_> = Field::ALL.iter().map(|f| f.name()).collect();
        assert_eq!(names.len(), Field::ALL.len());
    }

    #[test]
    fn test_from_name_roundtrip() {
        for field in Field::ALL {
            assert_eq!(Field::from_name(field.name()), Some(field));
        }
        assert_eq!(Field::from_name("zip_code"), None);
    }

    #[test]
    fn test_integer_columns_match_schema() {
        let integers: Vec<_> = Field::ALL
            .iter()
            .filter(|f| f.kind().is_integer())
            .map(|f| f.name())
            .collect();
        assert_eq!(
            integers,
            vec![
                "population",
                "median_home_cost",
                "average_rent",
                "rent_studio",
                "rent_1br",
                "rent_2br",
                "rent_3br",
                "rent_4br",
            ]
        );
    }

    #[test]
    fn test_strip_markers() {
        assert!(ValueKind::Currency.strips('$'));
        assert!(ValueKind::Currency.strips(','));
        assert!(!ValueKind::Currency.strips('%'));
        assert!(ValueKind::Percent.strips('%'));
        assert!(!ValueKind::Count.strips('$'));
    }
}
