//! BSON type to `UnifiedDataType` mapping.
//!
//! MongoDB stores documents in BSON, which has its own type system. This
//! module maps BSON values into the unified types the planner and the
//! compatibility checker work with.

use crate::models::UnifiedDataType;
use mongodb::bson::Bson;

/// Maps a BSON value to a `UnifiedDataType`.
pub fn map_bson_to_unified(value: &Bson) -> UnifiedDataType {
    match value {
        Bson::String(_) => UnifiedDataType::String { max_length: None },

        Bson::Int32(_) => UnifiedDataType::Integer {
            bits: 32,
            signed: true,
        },
        Bson::Int64(_) => UnifiedDataType::Integer {
            bits: 64,
            signed: true,
        },

        Bson::Double(_) => UnifiedDataType::Float {
            precision: Some(53), // IEEE 754 double precision
        },

        Bson::Boolean(_) => UnifiedDataType::Boolean,

        // MongoDB DateTime is always UTC
        Bson::DateTime(_) => UnifiedDataType::DateTime {
            with_timezone: true,
        },
        Bson::Timestamp(_) => UnifiedDataType::DateTime {
            with_timezone: true,
        },

        Bson::Binary(_) => UnifiedDataType::Binary { max_length: None },

        // ObjectId - treated as a 24-character hex string identifier
        Bson::ObjectId(_) => UnifiedDataType::String {
            max_length: Some(24),
        },

        // Embedded documents land in a JSON column
        Bson::Document(_) => UnifiedDataType::Json,

        // Arrays - infer element type from the first non-null element
        Bson::Array(arr) => {
            let element_type = arr
                .iter()
                .find(|v| !matches!(v, Bson::Null))
                .map(map_bson_to_unified)
                .unwrap_or(UnifiedDataType::Custom {
                    type_name: "unknown".to_string(),
                });
            UnifiedDataType::Array {
                element_type: Box::new(element_type),
            }
        }

        // Null is not a type of its own; nullability is tracked separately
        Bson::Null => UnifiedDataType::Custom {
            type_name: "null".to_string(),
        },

        Bson::RegularExpression(_) => UnifiedDataType::Custom {
            type_name: "regex".to_string(),
        },

        Bson::JavaScriptCode(_) | Bson::JavaScriptCodeWithScope(_) => UnifiedDataType::Custom {
            type_name: "javascript".to_string(),
        },

        // Symbols are deprecated; treat as strings
        Bson::Symbol(_) => UnifiedDataType::String { max_length: None },

        // Decimal128 needs arbitrary precision on the relational side
        Bson::Decimal128(_) => UnifiedDataType::Float {
            precision: Some(128),
        },

        Bson::MinKey | Bson::MaxKey => UnifiedDataType::Custom {
            type_name: "key".to_string(),
        },

        Bson::Undefined => UnifiedDataType::Custom {
            type_name: "undefined".to_string(),
        },

        Bson::DbPointer(_) => UnifiedDataType::Custom {
            type_name: "dbpointer".to_string(),
        },
    }
}

/// Gets a human-readable type name for a BSON value.
pub fn bson_type_name(value: &Bson) -> &'static str {
    match value {
        Bson::String(_) => "string",
        Bson::Int32(_) => "int32",
        Bson::Int64(_) => "int64",
        Bson::Double(_) => "double",
        Bson::Boolean(_) => "bool",
        Bson::DateTime(_) => "date",
        Bson::Timestamp(_) => "timestamp",
        Bson::Binary(_) => "binData",
        Bson::ObjectId(_) => "objectId",
        Bson::Document(_) => "object",
        Bson::Array(_) => "array",
        Bson::Null => "null",
        Bson::RegularExpression(_) => "regex",
        Bson::JavaScriptCode(_) | Bson::JavaScriptCodeWithScope(_) => "javascript",
        Bson::Symbol(_) => "symbol",
        Bson::Decimal128(_) => "decimal",
        Bson::MinKey => "minKey",
        Bson::MaxKey => "maxKey",
        Bson::Undefined => "undefined",
        Bson::DbPointer(_) => "dbPointer",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use mongodb::bson::{Binary, DateTime, Decimal128, oid::ObjectId, spec::BinarySubtype};

    #[test]
    fn test_map_string() {
        let unified = map_bson_to_unified(&Bson::String("hello".to_string()));
        assert!(matches!(
            unified,
            UnifiedDataType::String { max_length: None }
        ));
    }

    #[test]
    fn test_map_integers() {
        assert!(matches!(
            map_bson_to_unified(&Bson::Int32(42)),
            UnifiedDataType::Integer {
                bits: 32,
                signed: true
            }
        ));
        assert!(matches!(
            map_bson_to_unified(&Bson::Int64(9_999_999_999)),
            UnifiedDataType::Integer {
                bits: 64,
                signed: true
            }
        ));
    }

    #[test]
    fn test_map_double() {
        let unified = map_bson_to_unified(&Bson::Double(1.234));
        assert!(matches!(
            unified,
            UnifiedDataType::Float {
                precision: Some(53)
            }
        ));
    }

    #[test]
    fn test_map_boolean() {
        assert!(matches!(
            map_bson_to_unified(&Bson::Boolean(true)),
            UnifiedDataType::Boolean
        ));
    }

    #[test]
    fn test_map_datetime() {
        let unified = map_bson_to_unified(&Bson::DateTime(DateTime::now()));
        assert!(matches!(
            unified,
            UnifiedDataType::DateTime {
                with_timezone: true
            }
        ));
    }

    #[test]
    fn test_map_binary() {
        let bson = Bson::Binary(Binary {
            subtype: BinarySubtype::Generic,
            bytes: vec![1, 2, 3],
        });
        assert!(matches!(
            map_bson_to_unified(&bson),
            UnifiedDataType::Binary { max_length: None }
        ));
    }

    #[test]
    fn test_map_object_id() {
        let unified = map_bson_to_unified(&Bson::ObjectId(ObjectId::new()));
        assert!(matches!(
            unified,
            UnifiedDataType::String {
                max_length: Some(24)
            }
        ));
    }

    #[test]
    fn test_map_document() {
        let bson = Bson::Document(mongodb::bson::doc! { "key": "value" });
        assert!(matches!(map_bson_to_unified(&bson), UnifiedDataType::Json));
    }

    #[test]
    fn test_map_array_with_elements() {
        let bson = Bson::Array(vec![Bson::Int32(1), Bson::Int32(2), Bson::Int32(3)]);
        if let UnifiedDataType::Array { element_type } = map_bson_to_unified(&bson) {
            assert!(matches!(
                *element_type,
                UnifiedDataType::Integer {
                    bits: 32,
                    signed: true
                }
            ));
        } else {
            panic!("Expected Array type");
        }
    }

    #[test]
    fn test_map_empty_array() {
        let unified = map_bson_to_unified(&Bson::Array(vec![]));
        assert!(matches!(unified, UnifiedDataType::Array { .. }));
    }

    #[test]
    fn test_map_null() {
        let unified = map_bson_to_unified(&Bson::Null);
        assert!(matches!(
            unified,
            UnifiedDataType::Custom { type_name } if type_name == "null"
        ));
    }

    #[test]
    fn test_map_decimal128() {
        let unified = map_bson_to_unified(&Bson::Decimal128(Decimal128::from_bytes([0; 16])));
        assert!(matches!(
            unified,
            UnifiedDataType::Float {
                precision: Some(128)
            }
        ));
    }

    #[test]
    fn test_bson_type_names() {
        assert_eq!(bson_type_name(&Bson::String(String::new())), "string");
        assert_eq!(bson_type_name(&Bson::Int32(0)), "int32");
        assert_eq!(bson_type_name(&Bson::Int64(0)), "int64");
        assert_eq!(bson_type_name(&Bson::Double(0.0)), "double");
        assert_eq!(bson_type_name(&Bson::Boolean(true)), "bool");
        assert_eq!(bson_type_name(&Bson::Null), "null");
        assert_eq!(bson_type_name(&Bson::ObjectId(ObjectId::new())), "objectId");
    }
}
