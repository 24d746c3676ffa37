//! Typed statistic records
//!
//! This module holds the normalized output of the harvester:
//! - `Field` / `ValueKind`: the fixed set of statistics and how each is parsed
//! - `StatRecord`: one typed row per zip code
//! - `normalize`: conversion from raw extracted strings to a `StatRecord`

mod field;
mod normalize;

pub use field::{Field, ValueKind};
pub use normalize::{normalize, normalize_value};

/// A single normalized statistic value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatValue {
    Integer(i64),
    Float(f64),
}

impl StatValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Integer(v) => *v as f64,
            Self::Float(v) => *v,
        }
    }
}

impl std::fmt::Display for StatValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Normalized statistics for one zip code
///
/// Every statistic may be null. `zip_code`, `city` and `state` come from the
/// crawl target, never from page content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatRecord {
    pub population: Option<i64>,
    pub population_growth: Option<f64>,
    pub cost_of_living: Option<f64>,
    pub median_home_cost: Option<i64>,
    pub median_home_age: Option<f64>,
    pub utilities_cost_of_living: Option<f64>,
    pub average_rent: Option<i64>,
    pub rent_studio: Option<i64>,
    pub rent_1br: Option<i64>,
    pub rent_2br: Option<i64>,
    pub rent_3br: Option<i64>,
    pub rent_4br: Option<i64>,
    pub unemployment: Option<f64>,
    pub job_growth: Option<f64>,
    pub violent_crime: Option<f64>,
    pub property_crime: Option<f64>,
    pub rental_market_percent: Option<f64>,
    pub vacancy: Option<f64>,
    pub property_tax: Option<f64>,
    pub appreciation_12mo: Option<f64>,
    pub appreciation_5yr: Option<f64>,
    pub appreciation_10yr: Option<f64>,
    pub zip_code: i64,
    pub city: String,
    pub state: String,
}

impl StatRecord {
    /// Creates an all-null record for the given zip code
    pub fn new(zip_code: i64, city: &str, state: &str) -> Self {
        Self {
            zip_code,
            city: city.to_string(),
            state: state.to_string(),
            ..Self::default()
        }
    }

    /// Returns the value of a statistic, if present
    pub fn get(&self, field: Field) -> Option<StatValue> {
        use StatValue::{Float, Integer};
        match field {
            Field::Population => self.population.map(Integer),
            Field::PopulationGrowth => self.population_growth.map(Float),
            Field::CostOfLiving => self.cost_of_living.map(Float),
            Field::MedianHomeCost => self.median_home_cost.map(Integer),
            Field::MedianHomeAge => self.median_home_age.map(Float),
            Field::UtilitiesCostOfLiving => self.utilities_cost_of_living.map(Float),
            Field::AverageRent => self.average_rent.map(Integer),
            Field::RentStudio => self.rent_studio.map(Integer),
            Field::Rent1Br => self.rent_1br.map(Integer),
            Field::Rent2Br => self.rent_2br.map(Integer),
            Field::Rent3Br => self.rent_3br.map(Integer),
            Field::Rent4Br => self.rent_4br.map(Integer),
            Field::Unemployment => self.unemployment.map(Float),
            Field::JobGrowth => self.job_growth.map(Float),
            Field::ViolentCrime => self.violent_crime.map(Float),
            Field::PropertyCrime => self.property_crime.map(Float),
            Field::RentalMarketPercent => self.rental_market_percent.map(Float),
            Field::Vacancy => self.vacancy.map(Float),
            Field::PropertyTax => self.property_tax.map(Float),
            Field::Appreciation12Mo => self.appreciation_12mo.map(Float),
            Field::Appreciation5Yr => self.appreciation_5yr.map(Float),
            Field::Appreciation10Yr => self.appreciation_10yr.map(Float),
        }
    }

    /// Sets a statistic
    ///
    /// A value whose type does not match the field's kind is coerced:
    /// floats become integers only when they have no fractional part,
    /// otherwise the field is cleared.
    pub fn set(&mut self, field: Field, value: Option<StatValue>) {
        let int = value.and_then(|v| match v {
            StatValue::Integer(i) => Some(i),
            StatValue::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(f as i64),
            StatValue::Float(_) => None,
        });
        let float = value.map(|v| v.as_f64());

        match field {
            Field::Population => self.population = int,
            Field::PopulationGrowth => self.population_growth = float,
            Field::CostOfLiving => self.cost_of_living = float,
            Field::MedianHomeCost => self.median_home_cost = int,
            Field::MedianHomeAge => self.median_home_age = float,
            Field::UtilitiesCostOfLiving => self.utilities_cost_of_living = float,
            Field::AverageRent => self.average_rent = int,
            Field::RentStudio => self.rent_studio = int,
            Field::Rent1Br => self.rent_1br = int,
            Field::Rent2Br => self.rent_2br = int,
            Field::Rent3Br => self.rent_3br = int,
            Field::Rent4Br => self.rent_4br = int,
            Field::Unemployment => self.unemployment = float,
            Field::JobGrowth => self.job_growth = float,
            Field::ViolentCrime => self.violent_crime = float,
            Field::PropertyCrime => self.property_crime = float,
            Field::RentalMarketPercent => self.rental_market_percent = float,
            Field::Vacancy => self.vacancy = float,
            Field::PropertyTax => self.property_tax = float,
            Field::Appreciation12Mo => self.appreciation_12mo = float,
            Field::Appreciation5Yr => self.appreciation_5yr = float,
            Field::Appreciation10Yr => self.appreciation_10yr = float,
        }
    }

    /// Number of statistics that are null
    pub fn null_count(&self) -> usize {
        Field::ALL.iter().filter(|f| self.get(**f).is_none()).count()
    }
}
