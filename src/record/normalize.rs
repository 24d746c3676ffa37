//! Raw string to typed value conversion

use crate::crawler::CrawlTarget;
use crate::extract::PartialRecord;
use crate::record::{Field, StatRecord, StatValue, ValueKind};
use crate::HarvestError;

/// Converts a partial record into a typed `StatRecord`
///
/// Absent fields stay null. A raw value that does not parse for its field's
/// kind is logged and stored as null; it never drops the whole record.
///
/// # Errors
///
/// Fails only if the target's zip code is not a 5-digit code, since the zip
/// code is the record's key.
pub fn normalize(partial: &PartialRecord, target: &CrawlTarget) -> Result<StatRecord, HarvestError> {
    let zip_code = target
        .zip_key()
        .ok_or_else(|| HarvestError::InvalidTarget(target.zip_code.clone()))?;

    let mut record = StatRecord::new(zip_code, &target.city, &target.state);

    for field in Field::ALL {
        let Some(raw) = partial.get(field) else {
            continue;
        };

        let value = normalize_value(raw, field.kind());
        if value.is_none() {
            tracing::debug!(
                "{}: could not parse '{}' for zip {}, storing null",
                field,
                raw,
                target.zip_code
            );
        }
        record.set(field, value);
    }

    Ok(record)
}

/// Parses one raw value according to its kind
///
/// # Example
///
/// ```
/// use zip_harvest::record::{normalize_value, StatValue, ValueKind};
///
/// assert_eq!(normalize_value("$1,234", ValueKind::Currency), Some(StatValue::Integer(1234)));
/// assert_eq!(normalize_value("+4.5%", ValueKind::Percent), Some(StatValue::Float(4.5)));
/// assert_eq!(normalize_value("n/a", ValueKind::Percent), None);
/// ```
pub fn normalize_value(raw: &str, kind: ValueKind) -> Option<StatValue> {
    let cleaned: String = raw.trim().chars().filter(|c| !kind.strips(*c)).collect();
    let cleaned = cleaned.trim();

    if kind.is_integer() {
        cleaned.parse::<i64>().ok().map(StatValue::Integer)
    } else {
        let cleaned = cleaned.strip_prefix('+').unwrap_or(cleaned);
        cleaned
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(StatValue::Float)
    }
}
