//! Schema inference from sampled documents.
//!
//! A collection has no declared schema, so one is inferred by analyzing a
//! sample of its documents:
//! - discover field names, including dotted paths for nested documents
//! - track the set of BSON types each field was observed with
//! - derive nullability from field frequency across the sample

use super::MongoSource;
use super::type_mapping::{bson_type_name, map_bson_to_unified};
use crate::Result;
use crate::models::{Column, UnifiedDataType};
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::FindOptions;
use serde::Serialize;
use std::collections::HashMap;

/// Information about a discovered field in a collection.
#[derive(Debug, Clone, Serialize)]
pub struct InferredField {
    /// Field name (dot notation for nested fields)
    pub name: String,
    /// All type names observed for this field
    pub observed_types: Vec<String>,
    /// Primary unified data type (most common non-null type observed)
    pub unified_type: UnifiedDataType,
    /// Number of documents where this field was present
    pub occurrence_count: u32,
    /// Whether the field is absent or null in some documents
    pub is_nullable: bool,
    /// Order of first discovery
    pub ordinal_position: u32,
}

/// Schema inference result for a collection.
#[derive(Debug, Clone, Serialize)]
pub struct InferredSchema {
    /// Collection name
    pub collection_name: String,
    /// Number of documents sampled
    pub documents_sampled: u32,
    /// Discovered fields, in discovery order
    pub fields: Vec<InferredField>,
}

impl InferredSchema {
    /// Converts the inferred schema to column descriptions.
    pub fn to_columns(&self) -> Vec<Column> {
        self.fields
            .iter()
            .map(|field| Column {
                name: field.name.clone(),
                data_type: field.unified_type.clone(),
                is_nullable: field.is_nullable,
                is_primary_key: field.name == "_id",
                default_value: None,
                comment: if field.observed_types.len() > 1 {
                    Some(format!("Mixed types: {}", field.observed_types.join(", ")))
                } else {
                    None
                },
                ordinal_position: field.ordinal_position,
            })
            .collect()
    }
}

/// Analyzes documents one at a time and accumulates field statistics.
#[derive(Debug, Default)]
pub struct SchemaInferrer {
    field_info: HashMap<String, FieldStats>,
    next_position: u32,
    document_count: u32,
}

#[derive(Debug, Clone)]
struct FieldStats {
    /// Count of each BSON type name observed
    type_counts: HashMap<String, u32>,
    first_seen_position: u32,
    total_occurrences: u32,
    /// First value observed for each type name, for type refinement
    type_samples: HashMap<String, Bson>,
}

impl SchemaInferrer {
    /// Creates a new schema inferrer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyzes a document, recording every field it contains.
    pub fn analyze_document(&mut self, doc: &Document) {
        self.document_count = self.document_count.saturating_add(1);
        self.analyze_document_fields(doc, "");
    }

    fn analyze_document_fields(&mut self, doc: &Document, prefix: &str) {
        for (key, value) in doc {
            let field_name = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };

            self.record_field(&field_name, value);

            // Recurse into nested documents (but not arrays of documents)
            if let Bson::Document(nested_doc) = value {
                self.analyze_document_fields(nested_doc, &field_name);
            }
        }
    }

    fn record_field(&mut self, field_name: &str, value: &Bson) {
        let type_name = bson_type_name(value);

        let next_position = &mut self.next_position;
        let stats = self
            .field_info
            .entry(field_name.to_string())
            .or_insert_with(|| {
                let pos = *next_position;
                *next_position = pos.saturating_add(1);
                FieldStats {
                    type_counts: HashMap::new(),
                    first_seen_position: pos,
                    total_occurrences: 0,
                    type_samples: HashMap::new(),
                }
            });

        let count = stats.type_counts.entry(type_name.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        stats.total_occurrences = stats.total_occurrences.saturating_add(1);

        stats
            .type_samples
            .entry(type_name.to_string())
            .or_insert_with(|| value.clone());
    }

    /// Finalizes the inference and returns the schema.
    pub fn finalize(self, collection_name: String) -> InferredSchema {
        let mut fields: Vec<InferredField> = self
            .field_info
            .into_iter()
            .map(|(name, stats)| {
                let mut observed_types: Vec<String> = stats.type_counts.keys().cloned().collect();
                observed_types.sort();

                // Most common non-null type drives the unified mapping
                let primary_type = stats
                    .type_counts
                    .iter()
                    .filter(|(k, _)| *k != "null")
                    .max_by_key(|(_, count)| *count)
                    .map(|(k, _)| k.as_str())
                    .unwrap_or("null");

                // The winning type's own sample refines the mapping (array
                // element types, string lengths) without letting a minority
                // type override the winner
                let unified_type = stats
                    .type_samples
                    .get(primary_type)
                    .filter(|v| !matches!(v, Bson::Null))
                    .map(map_bson_to_unified)
                    .unwrap_or_else(|| type_name_to_unified(primary_type));

                InferredField {
                    name,
                    observed_types,
                    unified_type,
                    occurrence_count: stats.total_occurrences,
                    is_nullable: stats.total_occurrences < self.document_count
                        || stats.type_counts.contains_key("null"),
                    ordinal_position: stats.first_seen_position,
                }
            })
            .collect();

        fields.sort_by_key(|f| f.ordinal_position);

        InferredSchema {
            collection_name,
            documents_sampled: self.document_count,
            fields,
        }
    }
}

/// Converts a BSON type name string to a unified data type.
fn type_name_to_unified(type_name: &str) -> UnifiedDataType {
    match type_name {
        "string" => UnifiedDataType::String { max_length: None },
        "int32" => UnifiedDataType::Integer {
            bits: 32,
            signed: true,
        },
        "int64" => UnifiedDataType::Integer {
            bits: 64,
            signed: true,
        },
        "double" => UnifiedDataType::Float {
            precision: Some(53),
        },
        "bool" => UnifiedDataType::Boolean,
        "date" | "timestamp" => UnifiedDataType::DateTime {
            with_timezone: true,
        },
        "binData" => UnifiedDataType::Binary { max_length: None },
        "objectId" => UnifiedDataType::String {
            max_length: Some(24),
        },
        "object" => UnifiedDataType::Json,
        "array" => UnifiedDataType::Array {
            element_type: Box::new(UnifiedDataType::Custom {
                type_name: "unknown".to_string(),
            }),
        },
        "decimal" => UnifiedDataType::Float {
            precision: Some(128),
        },
        _ => UnifiedDataType::Custom {
            type_name: type_name.to_string(),
        },
    }
}

impl MongoSource {
    /// Infers the schema of a collection by sampling documents.
    ///
    /// # Arguments
    /// * `collection_name` - Collection to sample
    /// * `sample_size` - Maximum number of documents to analyze
    ///
    /// # Errors
    /// Returns error if the sample query or cursor iteration fails
    pub async fn infer_schema(
        &self,
        collection_name: &str,
        sample_size: usize,
    ) -> Result<InferredSchema> {
        let collection = self.collection(collection_name)?;

        let mut inferrer = SchemaInferrer::new();

        let limit = i64::try_from(sample_size).unwrap_or(i64::MAX);
        let options = FindOptions::builder().limit(limit).build();

        let mut cursor = collection
            .find(doc! {})
            .with_options(options)
            .await
            .map_err(|e| {
                crate::error::DocLiftError::schema_failed(
                    format!("Failed to sample documents from '{}'", collection_name),
                    e,
                )
            })?;

        while cursor.advance().await.map_err(|e| {
            crate::error::DocLiftError::schema_failed(
                format!("Failed to iterate cursor for '{}'", collection_name),
                e,
            )
        })? {
            let doc = cursor.deserialize_current().map_err(|e| {
                crate::error::DocLiftError::schema_failed(
                    format!("Failed to deserialize document from '{}'", collection_name),
                    e,
                )
            })?;
            inferrer.analyze_document(&doc);
        }

        let schema = inferrer.finalize(collection_name.to_string());

        tracing::debug!(
            "Inferred {} fields from {} sampled documents in '{}'",
            schema.fields.len(),
            schema.documents_sampled,
            collection_name
        );

        Ok(schema)
    }
}
