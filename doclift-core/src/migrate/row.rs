//! Document-to-row coercion.
//!
//! Shapes one BSON document into the flat row the writer binds, coercing each
//! field into its planned column type. Coercion never narrows silently: a
//! value that does not fit its column is an error under `Strict`, or becomes
//! a counted NULL under `Lenient`.

use crate::Result;
use crate::models::{CoercionPolicy, UnifiedDataType};
use crate::plan::TargetPlan;
use crate::target::SqlValue;
use mongodb::bson::{Bson, Document};

/// Result of shaping one document.
#[derive(Debug)]
pub struct ShapedRow {
    /// Values in plan column order
    pub values: Vec<SqlValue>,
    /// How many values lenient coercion nulled
    pub nulled: u64,
}

/// Shapes a document into a row following the plan.
///
/// # Errors
/// Returns error if a value cannot be coerced and the policy is `Strict`,
/// or if a NOT NULL column has no usable value
pub fn document_to_row(
    doc: &Document,
    plan: &TargetPlan,
    policy: CoercionPolicy,
) -> Result<ShapedRow> {
    let mut values = Vec::with_capacity(plan.columns.len());
    let mut nulled = 0u64;

    for column in &plan.columns {
        let raw = lookup_path(doc, &column.field_path);

        match raw {
            None | Some(Bson::Null) => {
                if column.nullable {
                    values.push(SqlValue::Null);
                } else {
                    return Err(crate::error::DocLiftError::coercion(
                        column.field_path.clone(),
                        "Field is missing or null but the column is NOT NULL",
                    ));
                }
            }
            Some(value) => match coerce_value(value, &column.data_type) {
                Ok(v) => values.push(v),
                Err(e) => match policy {
                    CoercionPolicy::Strict => return Err(e),
                    CoercionPolicy::Lenient => {
                        if column.nullable {
                            tracing::debug!(
                                "Nulling uncoercible value in field '{}': {}",
                                column.field_path,
                                e
                            );
                            values.push(SqlValue::Null);
                            nulled = nulled.saturating_add(1);
                        } else {
                            // NULL cannot stand in for a NOT NULL column
                            return Err(e);
                        }
                    }
                },
            },
        }
    }

    Ok(ShapedRow { values, nulled })
}

/// Resolves a dotted field path against a document.
fn lookup_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut current = doc;
    let mut parts = path.split('.').peekable();

    while let Some(part) = parts.next() {
        let value = current.get(part)?;
        if parts.peek().is_none() {
            return Some(value);
        }
        match value {
            Bson::Document(nested) => current = nested,
            _ => return None,
        }
    }
    None
}

/// Coerces a single BSON value into the planned column type.
///
/// # Errors
/// Returns a coercion error naming the observed BSON type when the value
/// does not fit
pub fn coerce_value(value: &Bson, target: &UnifiedDataType) -> Result<SqlValue> {
    match target {
        UnifiedDataType::String { .. } => match value {
            Bson::String(s) => Ok(SqlValue::Text(s.clone())),
            Bson::Symbol(s) => Ok(SqlValue::Text(s.clone())),
            Bson::ObjectId(oid) => Ok(SqlValue::Text(oid.to_hex())),
            other => Err(mismatch(other, "string")),
        },

        UnifiedDataType::Integer { bits, .. } if *bits <= 32 => match value {
            Bson::Int32(v) => Ok(SqlValue::Int(*v)),
            Bson::Int64(v) => i32::try_from(*v)
                .map(SqlValue::Int)
                .map_err(|_| out_of_range(*v, "integer")),
            Bson::Double(v) => integral_double(*v).and_then(|n| {
                i32::try_from(n)
                    .map(SqlValue::Int)
                    .map_err(|_| out_of_range(n, "integer"))
            }),
            Bson::String(s) => s
                .trim()
                .parse::<i32>()
                .map(SqlValue::Int)
                .map_err(|_| mismatch(value, "integer")),
            other => Err(mismatch(other, "integer")),
        },
        UnifiedDataType::Integer { .. } => match value {
            Bson::Int32(v) => Ok(SqlValue::BigInt(i64::from(*v))),
            Bson::Int64(v) => Ok(SqlValue::BigInt(*v)),
            Bson::Double(v) => integral_double(*v).map(SqlValue::BigInt),
            Bson::String(s) => s
                .trim()
                .parse::<i64>()
                .map(SqlValue::BigInt)
                .map_err(|_| mismatch(value, "bigint")),
            other => Err(mismatch(other, "bigint")),
        },

        UnifiedDataType::Float { .. } => match value {
            Bson::Double(v) => Ok(SqlValue::Double(*v)),
            Bson::Int32(v) => Ok(SqlValue::Double(f64::from(*v))),
            // Large i64 values lose precision in f64; the numeric column
            // still receives the closest double
            Bson::Int64(v) => Ok(SqlValue::Double(*v as f64)),
            Bson::Decimal128(d) => d
                .to_string()
                .parse::<f64>()
                .map(SqlValue::Double)
                .map_err(|_| {
                    crate::error::DocLiftError::coercion(
                        "decimal",
                        format!("Decimal128 value '{}' is not a finite number", d),
                    )
                }),
            Bson::String(s) => match s.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(SqlValue::Double(v)),
                _ => Err(mismatch(value, "double precision")),
            },
            other => Err(mismatch(other, "double precision")),
        },

        UnifiedDataType::Boolean => match value {
            Bson::Boolean(v) => Ok(SqlValue::Bool(*v)),
            other => Err(mismatch(other, "boolean")),
        },

        UnifiedDataType::DateTime { .. } => match value {
            Bson::DateTime(dt) => chrono::DateTime::from_timestamp_millis(dt.timestamp_millis())
                .map(SqlValue::Timestamp)
                .ok_or_else(|| {
                    crate::error::DocLiftError::coercion(
                        "datetime",
                        "BSON datetime is outside the representable range",
                    )
                }),
            Bson::Timestamp(ts) => chrono::DateTime::from_timestamp(i64::from(ts.time), 0)
                .map(SqlValue::Timestamp)
                .ok_or_else(|| {
                    crate::error::DocLiftError::coercion(
                        "timestamp",
                        "BSON timestamp is outside the representable range",
                    )
                }),
            other => Err(mismatch(other, "timestamptz")),
        },

        UnifiedDataType::Binary { .. } => match value {
            Bson::Binary(b) => Ok(SqlValue::Bytes(b.bytes.clone())),
            other => Err(mismatch(other, "bytea")),
        },

        UnifiedDataType::Uuid => match value {
            Bson::Binary(b) => uuid::Uuid::from_slice(&b.bytes)
                .map(SqlValue::Uuid)
                .map_err(|_| {
                    crate::error::DocLiftError::coercion(
                        "uuid",
                        format!("Binary value of {} bytes is not a UUID", b.bytes.len()),
                    )
                }),
            Bson::String(s) => s.parse::<uuid::Uuid>().map(SqlValue::Uuid).map_err(|_| {
                crate::error::DocLiftError::coercion("uuid", format!("'{}' is not a UUID", s))
            }),
            other => Err(mismatch(other, "uuid")),
        },

        // Documents, arrays, and everything engine-specific become jsonb
        UnifiedDataType::Json | UnifiedDataType::Array { .. } | UnifiedDataType::Custom { .. } => {
            Ok(SqlValue::Json(value.clone().into_relaxed_extjson()))
        }

        UnifiedDataType::Date | UnifiedDataType::Time { .. } => Err(
            crate::error::DocLiftError::coercion(
                crate::source::bson_type_name(value),
                "Date and time-of-day columns have no document-side counterpart",
            ),
        ),
    }
}

fn integral_double(v: f64) -> Result<i64> {
    // The upper bound is exclusive: i64::MAX rounds up to 2^63 in f64, and
    // 2^63 itself does not fit in i64
    if v.fract() == 0.0 && v >= i64::MIN as f64 && v < 9_223_372_036_854_775_808.0 {
        Ok(v as i64)
    } else {
        Err(crate::error::DocLiftError::coercion(
            "double",
            format!("Value {} is not an integer", v),
        ))
    }
}

fn mismatch(value: &Bson, target: &str) -> crate::error::DocLiftError {
    crate::error::DocLiftError::coercion(
        crate::source::bson_type_name(value),
        format!(
            "BSON {} cannot be coerced to {}",
            crate::source::bson_type_name(value),
            target
        ),
    )
}

fn out_of_range<T: std::fmt::Display>(v: T, target: &str) -> crate::error::DocLiftError {
    crate::error::DocLiftError::coercion(
        "integer",
        format!("Value {} does not fit in {}", v, target),
    )
}
