//! Explicit per-model schema: index name, field mappings and index settings.
//!
//! A schema is built once, typically in a `LazyLock`, and turned into the
//! `{settings, mappings}` body used when creating the model's index.
//!
//! ```rust
//! use elastic_odm::model::{FieldType, ModelSchema};
//!
//! let schema = ModelSchema::builder("posts")
//!     .field("title", FieldType::Text)
//!     .field("status", FieldType::Keyword)
//!     .dense_vector("embedding", 384)
//!     .timestamps(true)
//!     .build();
//!
//! assert_eq!(schema.index(), "posts");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::config::IndexDefaults;

use super::relation::Relation;

/// Field holding the soft-delete timestamp.
pub const DELETED_AT: &str = "_deleted_at";
/// Field holding the creation timestamp.
pub const CREATED_AT: &str = "created_at";
/// Field holding the last-update timestamp.
pub const UPDATED_AT: &str = "updated_at";

/// Elasticsearch field data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Keyword,
    ConstantKeyword,
    Wildcard,
    MatchOnlyText,
    Long,
    Integer,
    Short,
    Byte,
    Double,
    Float,
    HalfFloat,
    ScaledFloat,
    UnsignedLong,
    Date,
    DateNanos,
    Boolean,
    Binary,
    Object,
    Nested,
    Flattened,
    GeoPoint,
    GeoShape,
    Shape,
    Point,
    Ip,
    Completion,
    SearchAsYouType,
    TokenCount,
    DenseVector,
    SparseVector,
    RankFeature,
    RankFeatures,
    SemanticText,
    Alias,
    Join,
    Percolator,
    Version,
    Histogram,
    AggregateMetricDouble,
    IntegerRange,
    LongRange,
    FloatRange,
    DoubleRange,
    DateRange,
    IpRange,
}

impl FieldType {
    /// Returns the mapping type name.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Keyword => "keyword",
            FieldType::ConstantKeyword => "constant_keyword",
            FieldType::Wildcard => "wildcard",
            FieldType::MatchOnlyText => "match_only_text",
            FieldType::Long => "long",
            FieldType::Integer => "integer",
            FieldType::Short => "short",
            FieldType::Byte => "byte",
            FieldType::Double => "double",
            FieldType::Float => "float",
            FieldType::HalfFloat => "half_float",
            FieldType::ScaledFloat => "scaled_float",
            FieldType::UnsignedLong => "unsigned_long",
            FieldType::Date => "date",
            FieldType::DateNanos => "date_nanos",
            FieldType::Boolean => "boolean",
            FieldType::Binary => "binary",
            FieldType::Object => "object",
            FieldType::Nested => "nested",
            FieldType::Flattened => "flattened",
            FieldType::GeoPoint => "geo_point",
            FieldType::GeoShape => "geo_shape",
            FieldType::Shape => "shape",
            FieldType::Point => "point",
            FieldType::Ip => "ip",
            FieldType::Completion => "completion",
            FieldType::SearchAsYouType => "search_as_you_type",
            FieldType::TokenCount => "token_count",
            FieldType::DenseVector => "dense_vector",
            FieldType::SparseVector => "sparse_vector",
            FieldType::RankFeature => "rank_feature",
            FieldType::RankFeatures => "rank_features",
            FieldType::SemanticText => "semantic_text",
            FieldType::Alias => "alias",
            FieldType::Join => "join",
            FieldType::Percolator => "percolator",
            FieldType::Version => "version",
            FieldType::Histogram => "histogram",
            FieldType::AggregateMetricDouble => "aggregate_metric_double",
            FieldType::IntegerRange => "integer_range",
            FieldType::LongRange => "long_range",
            FieldType::FloatRange => "float_range",
            FieldType::DoubleRange => "double_range",
            FieldType::DateRange => "date_range",
            FieldType::IpRange => "ip_range",
        }
    }

    /// Returns true for types that accept the `index` mapping parameter.
    fn supports_index_flag(self) -> bool {
        !matches!(
            self,
            FieldType::Object
                | FieldType::Nested
                | FieldType::Alias
                | FieldType::Join
                | FieldType::Percolator
                | FieldType::SparseVector
                | FieldType::RankFeature
                | FieldType::RankFeatures
                | FieldType::SemanticText
                | FieldType::Histogram
                | FieldType::AggregateMetricDouble
                | FieldType::Completion
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field of a model: name, type, indexed flag and extra mapping options.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    name: String,
    field_type: FieldType,
    indexed: bool,
    options: Map<String, Value>,
}

impl FieldDescriptor {
    /// Creates an indexed field with no options.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            indexed: true,
            options: Map::new(),
        }
    }

    /// Marks the field as stored but not searchable.
    pub fn not_indexed(mut self) -> Self {
        self.indexed = false;
        self
    }

    /// Adds a mapping option (`analyzer`, `format`, `dims`, `properties`, ...).
    pub fn option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Returns the field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the field type.
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Returns true if the field is searchable.
    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    /// Returns the mapping for this field: `{type, index?, ...options}`.
    pub fn to_mapping(&self) -> Value {
        let mut mapping = Map::new();
        mapping.insert("type".to_string(), json!(self.field_type.as_str()));
        if !self.indexed && self.field_type.supports_index_flag() {
            mapping.insert("index".to_string(), json!(false));
        }
        for (key, value) in &self.options {
            mapping.insert(key.clone(), value.clone());
        }
        Value::Object(mapping)
    }
}

/// The `{settings, mappings}` body used to create an index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    /// Index settings.
    pub settings: Map<String, Value>,
    /// The mappings document (`{"properties": {...}}`).
    pub mappings: Value,
}

impl IndexDefinition {
    /// Returns the index-creation request body.
    pub fn to_body(&self) -> Value {
        json!({
            "settings": self.settings,
            "mappings": self.mappings
        })
    }
}

/// The static description of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSchema {
    index: String,
    fields: Vec<FieldDescriptor>,
    settings: Map<String, Value>,
    timestamps: bool,
    soft_deletes: bool,
    dynamic: Option<Value>,
    relations: Vec<(String, Relation)>,
}

impl ModelSchema {
    /// Starts building a schema for the given (unprefixed) index name.
    pub fn builder(index: impl Into<String>) -> ModelSchemaBuilder {
        ModelSchemaBuilder {
            schema: ModelSchema {
                index: index.into(),
                fields: Vec::new(),
                settings: Map::new(),
                timestamps: false,
                soft_deletes: true,
                dynamic: None,
                relations: Vec::new(),
            },
        }
    }

    /// Returns the unprefixed index name.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Returns the declared fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns true if `created_at`/`updated_at` are maintained on save.
    pub fn timestamps(&self) -> bool {
        self.timestamps
    }

    /// Returns true if the model participates in soft deletes.
    pub fn soft_deletes(&self) -> bool {
        self.soft_deletes
    }

    /// Looks up a relation by name.
    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, relation)| relation)
    }

    /// Returns the `mappings` document.
    ///
    /// Timestamp and soft-delete fields are added as `date` fields unless
    /// declared explicitly.
    pub fn mappings(&self, soft_deletes_enabled: bool) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            properties.insert(field.name.clone(), field.to_mapping());
        }

        let mut implicit = Vec::new();
        if self.timestamps {
            implicit.extend([CREATED_AT, UPDATED_AT]);
        }
        if self.soft_deletes && soft_deletes_enabled {
            implicit.push(DELETED_AT);
        }
        for name in implicit {
            if !properties.contains_key(name) {
                properties.insert(name.to_string(), json!({ "type": "date" }));
            }
        }

        let mut mappings = Map::new();
        if let Some(ref dynamic) = self.dynamic {
            mappings.insert("dynamic".to_string(), dynamic.clone());
        }
        mappings.insert("properties".to_string(), Value::Object(properties));
        Value::Object(mappings)
    }

    /// Returns the full index definition, merging schema settings over the defaults.
    pub fn index_definition(
        &self,
        defaults: &IndexDefaults,
        soft_deletes_enabled: bool,
    ) -> IndexDefinition {
        let mut settings = Map::new();
        settings.insert(
            "number_of_shards".to_string(),
            json!(defaults.number_of_shards),
        );
        settings.insert(
            "number_of_replicas".to_string(),
            json!(defaults.number_of_replicas),
        );
        for (key, value) in &self.settings {
            settings.insert(key.clone(), value.clone());
        }

        IndexDefinition {
            settings,
            mappings: self.mappings(soft_deletes_enabled),
        }
    }
}

/// Builder for [`ModelSchema`].
#[derive(Debug, Clone)]
pub struct ModelSchemaBuilder {
    schema: ModelSchema,
}

impl ModelSchemaBuilder {
    /// Adds an indexed field of the given type.
    pub fn field(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.descriptor(FieldDescriptor::new(name, field_type))
    }

    /// Adds a fully configured field.
    pub fn descriptor(mut self, descriptor: FieldDescriptor) -> Self {
        self.schema.fields.retain(|f| f.name != descriptor.name);
        self.schema.fields.push(descriptor);
        self
    }

    /// Adds a `dense_vector` field with the given dimensions.
    pub fn dense_vector(self, name: impl Into<String>, dims: u32) -> Self {
        self.descriptor(
            FieldDescriptor::new(name, FieldType::DenseVector)
                .option("dims", json!(dims))
                .option("index", json!(true))
                .option("similarity", json!("cosine")),
        )
    }

    /// Adds a `text` field with a `keyword` sub-field for sorting and aggregations.
    pub fn text_with_keyword(self, name: impl Into<String>) -> Self {
        self.descriptor(FieldDescriptor::new(name, FieldType::Text).option(
            "fields",
            json!({ "keyword": { "type": "keyword", "ignore_above": 256 } }),
        ))
    }

    /// Adds an index setting (`analysis`, `refresh_interval`, ...).
    pub fn setting(mut self, key: impl Into<String>, value: Value) -> Self {
        self.schema.settings.insert(key.into(), value);
        self
    }

    /// Enables `created_at`/`updated_at` maintenance.
    pub fn timestamps(mut self, enabled: bool) -> Self {
        self.schema.timestamps = enabled;
        self
    }

    /// Opts the model in or out of soft deletes (default: in).
    pub fn soft_deletes(mut self, enabled: bool) -> Self {
        self.schema.soft_deletes = enabled;
        self
    }

    /// Sets the mapping's `dynamic` parameter (`true`, `false`, `"strict"`).
    pub fn dynamic(mut self, dynamic: Value) -> Self {
        self.schema.dynamic = Some(dynamic);
        self
    }

    /// Declares a named relation.
    pub fn relation(mut self, name: impl Into<String>, relation: Relation) -> Self {
        self.schema.relations.push((name.into(), relation));
        self
    }

    /// Finishes the schema.
    pub fn build(self) -> ModelSchema {
        self.schema
    }
}
