//! PostgreSQL type mapping in both directions.
//!
//! `pg_type_for` chooses the DDL type for an inferred unified type when a new
//! table is created; `map_pg_type_to_unified` reads `information_schema`
//! vocabulary back into unified types when an existing table is inspected.

use crate::models::UnifiedDataType;

/// Chooses the PostgreSQL DDL type for a unified data type.
///
/// Arrays and engine-specific types land in `jsonb`; a relational column
/// cannot express them without losing information, but `jsonb` keeps the
/// value queryable.
pub fn pg_type_for(data_type: &UnifiedDataType) -> String {
    match data_type {
        UnifiedDataType::String {
            max_length: Some(len),
        } => format!("varchar({})", len),
        UnifiedDataType::String { max_length: None } => "text".to_string(),

        UnifiedDataType::Integer { bits, .. } => match bits {
            0..=16 => "smallint".to_string(),
            17..=32 => "integer".to_string(),
            _ => "bigint".to_string(),
        },

        UnifiedDataType::Float { precision } => match precision {
            Some(p) if *p <= 24 => "real".to_string(),
            Some(p) if *p <= 53 => "double precision".to_string(),
            // Decimal128 and friends need arbitrary precision
            Some(_) => "numeric".to_string(),
            None => "double precision".to_string(),
        },

        UnifiedDataType::Boolean => "boolean".to_string(),

        UnifiedDataType::DateTime {
            with_timezone: true,
        } => "timestamptz".to_string(),
        UnifiedDataType::DateTime {
            with_timezone: false,
        } => "timestamp".to_string(),
        UnifiedDataType::Date => "date".to_string(),
        UnifiedDataType::Time {
            with_timezone: true,
        } => "timetz".to_string(),
        UnifiedDataType::Time {
            with_timezone: false,
        } => "time".to_string(),

        UnifiedDataType::Binary { .. } => "bytea".to_string(),

        UnifiedDataType::Json => "jsonb".to_string(),

        UnifiedDataType::Uuid => "uuid".to_string(),

        UnifiedDataType::Array { .. } => "jsonb".to_string(),

        UnifiedDataType::Custom { .. } => "jsonb".to_string(),
    }
}

/// Maps PostgreSQL `information_schema` type descriptions to unified types.
///
/// # Arguments
/// * `data_type` - `data_type` from `information_schema.columns`
/// * `udt_name` - `udt_name` from `information_schema.columns`
/// * `character_maximum_length` - Maximum character length for string types
/// * `numeric_precision` - Numeric precision for decimal types
/// * `numeric_scale` - Numeric scale for decimal types
pub fn map_pg_type_to_unified(
    data_type: &str,
    udt_name: &str,
    character_maximum_length: Option<i32>,
    numeric_precision: Option<i32>,
    numeric_scale: Option<i32>,
) -> UnifiedDataType {
    match data_type.to_lowercase().as_str() {
        "character varying" | "varchar" | "character" | "char" => UnifiedDataType::String {
            max_length: character_maximum_length.and_then(|l| u32::try_from(l).ok()),
        },
        "text" => UnifiedDataType::String { max_length: None },

        "smallint" | "int2" => UnifiedDataType::Integer {
            bits: 16,
            signed: true,
        },
        "integer" | "int" | "int4" => UnifiedDataType::Integer {
            bits: 32,
            signed: true,
        },
        "bigint" | "int8" => UnifiedDataType::Integer {
            bits: 64,
            signed: true,
        },

        "real" | "float4" => UnifiedDataType::Float {
            precision: Some(24),
        },
        "double precision" | "float8" => UnifiedDataType::Float {
            precision: Some(53),
        },
        "numeric" | "decimal" => {
            if numeric_scale == Some(0) {
                let bits = match numeric_precision {
                    Some(p) if p <= 4 => 16,
                    Some(p) if p <= 9 => 32,
                    _ => 64,
                };
                UnifiedDataType::Integer { bits, signed: true }
            } else {
                UnifiedDataType::Float {
                    precision: numeric_precision.and_then(|p| u8::try_from(p).ok()),
                }
            }
        }

        "boolean" | "bool" => UnifiedDataType::Boolean,

        "timestamp without time zone" | "timestamp" => UnifiedDataType::DateTime {
            with_timezone: false,
        },
        "timestamp with time zone" | "timestamptz" => UnifiedDataType::DateTime {
            with_timezone: true,
        },
        "date" => UnifiedDataType::Date,
        "time without time zone" | "time" => UnifiedDataType::Time {
            with_timezone: false,
        },
        "time with time zone" | "timetz" => UnifiedDataType::Time {
            with_timezone: true,
        },

        "bytea" => UnifiedDataType::Binary { max_length: None },

        "json" | "jsonb" => UnifiedDataType::Json,

        "uuid" => UnifiedDataType::Uuid,

        "array" => UnifiedDataType::Array {
            element_type: Box::new(UnifiedDataType::Custom {
                type_name: udt_name.trim_start_matches('_').to_string(),
            }),
        },

        _ => UnifiedDataType::Custom {
            type_name: udt_name.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pg_type_for_strings() {
        assert_eq!(
            pg_type_for(&UnifiedDataType::String {
                max_length: Some(24)
            }),
            "varchar(24)"
        );
        assert_eq!(
            pg_type_for(&UnifiedDataType::String { max_length: None }),
            "text"
        );
    }

    #[test]
    fn test_pg_type_for_integers() {
        assert_eq!(
            pg_type_for(&UnifiedDataType::Integer {
                bits: 16,
                signed: true
            }),
            "smallint"
        );
        assert_eq!(
            pg_type_for(&UnifiedDataType::Integer {
                bits: 32,
                signed: true
            }),
            "integer"
        );
        assert_eq!(
            pg_type_for(&UnifiedDataType::Integer {
                bits: 64,
                signed: true
            }),
            "bigint"
        );
    }

    #[test]
    fn test_pg_type_for_floats() {
        assert_eq!(
            pg_type_for(&UnifiedDataType::Float {
                precision: Some(53)
            }),
            "double precision"
        );
        assert_eq!(
            pg_type_for(&UnifiedDataType::Float {
                precision: Some(24)
            }),
            "real"
        );
        // Decimal128 exceeds binary float precision
        assert_eq!(
            pg_type_for(&UnifiedDataType::Float {
                precision: Some(128)
            }),
            "numeric"
        );
    }

    #[test]
    fn test_pg_type_for_datetime() {
        assert_eq!(
            pg_type_for(&UnifiedDataType::DateTime {
                with_timezone: true
            }),
            "timestamptz"
        );
        assert_eq!(
            pg_type_for(&UnifiedDataType::DateTime {
                with_timezone: false
            }),
            "timestamp"
        );
    }

    #[test]
    fn test_pg_type_for_json_like() {
        assert_eq!(pg_type_for(&UnifiedDataType::Json), "jsonb");
        assert_eq!(
            pg_type_for(&UnifiedDataType::Array {
                element_type: Box::new(UnifiedDataType::Boolean)
            }),
            "jsonb"
        );
        assert_eq!(
            pg_type_for(&UnifiedDataType::Custom {
                type_name: "regex".to_string()
            }),
            "jsonb"
        );
    }

    #[test]
    fn test_map_pg_varchar() {
        let unified = map_pg_type_to_unified("character varying", "varchar", Some(24), None, None);
        assert!(matches!(
            unified,
            UnifiedDataType::String {
                max_length: Some(24)
            }
        ));
    }

    #[test]
    fn test_map_pg_integers() {
        assert!(matches!(
            map_pg_type_to_unified("bigint", "int8", None, None, None),
            UnifiedDataType::Integer {
                bits: 64,
                signed: true
            }
        ));
        assert!(matches!(
            map_pg_type_to_unified("integer", "int4", None, None, None),
            UnifiedDataType::Integer {
                bits: 32,
                signed: true
            }
        ));
    }

    #[test]
    fn test_map_pg_numeric_scale_zero_is_integer() {
        let unified = map_pg_type_to_unified("numeric", "numeric", None, Some(9), Some(0));
        assert!(matches!(
            unified,
            UnifiedDataType::Integer {
                bits: 32,
                signed: true
            }
        ));
    }

    #[test]
    fn test_map_pg_numeric_with_scale_is_float() {
        let unified = map_pg_type_to_unified("numeric", "numeric", None, Some(10), Some(2));
        assert!(matches!(unified, UnifiedDataType::Float { .. }));
    }

    #[test]
    fn test_map_pg_timestamptz() {
        let unified =
            map_pg_type_to_unified("timestamp with time zone", "timestamptz", None, None, None);
        assert!(matches!(
            unified,
            UnifiedDataType::DateTime {
                with_timezone: true
            }
        ));
    }

    #[test]
    fn test_map_pg_jsonb() {
        assert!(matches!(
            map_pg_type_to_unified("jsonb", "jsonb", None, None, None),
            UnifiedDataType::Json
        ));
    }

    #[test]
    fn test_mapping_roundtrip_for_created_tables() {
        // Types written by pg_type_for must read back as something the
        // compatibility checker accepts.
        let unified = map_pg_type_to_unified("text", "text", None, None, None);
        assert!(matches!(
            unified,
            UnifiedDataType::String { max_length: None }
        ));

        let unified = map_pg_type_to_unified("boolean", "bool", None, None, None);
        assert!(matches!(unified, UnifiedDataType::Boolean));
    }
}
