use crate::config::{FIELD_COLUMN, FIELD_ROW, FIELD_VALUE, ShapeRule};
use crate::harvest::error::{HarvestResult, ShapeViolation};
use crate::models::{TableMapping, TooltipContent};
use crate::tooltip::field;

/// Merge a (row, column, value) tooltip into the mapping.
/// A blank row or column key files the cell under the noise key, so a partial
/// read never counts toward the shape. Returns true for a new pair.
pub fn merge_cell(
    mapping: &mut TableMapping,
    content: &TooltipContent,
    noise_key: &str,
) -> HarvestResult<bool> {
    let row = field(content, FIELD_ROW)?;
    let column = field(content, FIELD_COLUMN)?;
    let value = field(content, FIELD_VALUE)?;
    let row = if row.is_empty() || column.is_empty() { noise_key } else { row };
    Ok(mapping.merge(row, column, value))
}

/// Check a converged table against the rule. The noise row is ignored.
pub fn validate_shape(mapping: &TableMapping, rule: &ShapeRule) -> Result<(), ShapeViolation> {
    let rows: Vec<_> = mapping.rows().filter(|(k, _)| *k != rule.noise_key).collect();

    if rows.len() < rule.min_rows {
        return Err(ShapeViolation::TooFewRows { expected: rule.min_rows, found: rows.len() });
    }

    for (key, columns) in rows {
        if columns.len() < rule.min_columns {
            return Err(ShapeViolation::TooFewColumns {
                row: key.to_string(),
                expected: rule.min_columns,
                found: columns.len(),
            });
        }
    }
    Ok(())
}
