//! The locator table for the statistics site
//!
//! Layout coupling lives here and nowhere else. Most values sit in a table
//! row: `<td><b><u>Label</u></b></td><td>value</td>`, so the common path is
//! parent, parent, next sibling.

use crate::extract::{FieldLocator, NavStep, PageKind};
use crate::record::Field;
use crate::HarvestError;

const HOUSING_TABLE: &str = "table#mainContent_dgHousing";

/// Labels of the rows in the housing table
const HOUSING_ROWS: [(Field, &str); 13] = [
    (Field::MedianHomeAge, "Median Home Age"),
    (Field::MedianHomeCost, "Median Home Cost"),
    (Field::Appreciation12Mo, "Home Appr. Last 12 months"),
    (Field::Appreciation5Yr, "Home Appr. Last 5 yrs."),
    (Field::Appreciation10Yr, "Home Appr. Last 10 yrs."),
    (Field::PropertyTax, "Property Tax Rate"),
    (Field::AverageRent, "Average Rent"),
    (Field::RentStudio, "Studio Apartment"),
    (Field::Rent1Br, "1 Bedroom Home or Apartment"),
    (Field::Rent2Br, "2 Bedroom Home or Apartment"),
    (Field::Rent3Br, "3 Bedroom Home or Apartment"),
    (Field::Rent4Br, "4 Bedroom Home or Apartment"),
    (Field::Vacancy, "Vacant For Rent"),
];

fn table_row() -> [NavStep; 3] {
    [NavStep::Parent, NavStep::Parent, NavStep::NextSibling]
}

/// Builds the locator table, one entry per `Field`
pub fn default_locators() -> Result<Vec<FieldLocator>, HarvestError> {
    let mut locators = vec![
        FieldLocator::text(Field::Population, PageKind::Detail, "u", "Population").path(table_row()),
        FieldLocator::pattern(
            Field::PopulationGrowth,
            PageKind::Detail,
            Some("p"),
            r"[+-]?\d{1,2}\.\d%",
        )?
        .capture(r"[+-]?\d{1,2}\.\d%")?,
    ];

    for (field, label) in HOUSING_ROWS {
        locators.push(
            FieldLocator::text(field, PageKind::Housing, "u", label)
                .within(HOUSING_TABLE)?
                .path(table_row()),
        );
    }

    locators.extend([
        FieldLocator::pattern(
            Field::RentalMarketPercent,
            PageKind::Housing,
            None,
            "Renters make up .* of the .* population",
        )?
        .capture(r"\d{1,3}(?:\.\d+)?%")?,
        FieldLocator::text(Field::CostOfLiving, PageKind::CostOfLiving, "u", "Overall")
            .path([NavStep::Parent, NavStep::NextSibling]),
        FieldLocator::text(
            Field::UtilitiesCostOfLiving,
            PageKind::CostOfLiving,
            "u",
            "Utilities",
        )
        .path([NavStep::Parent, NavStep::NextSibling]),
        FieldLocator::pattern(Field::ViolentCrime, PageKind::Crime, None, "violent crime is ")?
            .capture(r"\s(\d{0,2}\.\d)")?,
        FieldLocator::pattern(Field::PropertyCrime, PageKind::Crime, None, "property crime is ")?
            .capture(r"\s(\d{0,2}\.\d)")?,
        FieldLocator::text(Field::JobGrowth, PageKind::JobMarket, "u", "Recent Job Growth")
            .path(table_row()),
        FieldLocator::text(Field::Unemployment, PageKind::JobMarket, "u", "Unemployment Rate")
            .path(table_row()),
    ]);

    Ok(locators)
}

/// Locators that apply to one page kind
pub fn locators_for(locators: &[FieldLocator], page: PageKind) -> Vec<FieldLocator> {
    locators.iter().filter(|l| l.page == page).cloned().collect()
}
