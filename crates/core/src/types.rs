use crate::error::CatalogError;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields owned by the store. Handlers pass these through untouched.
pub const RESERVED_FIELDS: [&str; 5] = ["_rid", "_self", "_etag", "_attachments", "_ts"];

/// Partition-key field used when none is configured
pub const DEFAULT_PARTITION_FIELD: &str = "category";

pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";

/// Advisory product schema. Not enforced on write, used to validate generated queries.
pub const KNOWN_FIELDS: &[&str] = &[
    "id",
    "name",
    "category",
    "subcategory",
    "brand",
    "description",
    "price",
    "currency",
    "sku",
    "inStock",
    "stockQuantity",
    "tags",
    "specifications",
    "images",
    "rating",
    "reviewCount",
    "createdAt",
    "updatedAt",
    "_rid",
    "_self",
    "_etag",
    "_attachments",
    "_ts",
];

/// Fields that may be addressed with nested paths (`c.specifications.memory`)
pub const NESTED_FIELDS: &[&str] = &["specifications"];

const MAX_ID_LEN: usize = 255;

/// Name of the attribute that partitions the container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionKey(pub String);

impl PartitionKey {
    pub fn new(field: impl Into<String>) -> Self {
        Self(field.into())
    }

    pub fn field(&self) -> &str {
        &self.0
    }

    /// Fields a record must carry to be created.
    pub fn required_fields(&self) -> [&str; 4] {
        ["id", "name", self.field(), "price"]
    }
}

impl Default for PartitionKey {
    fn default() -> Self {
        Self(DEFAULT_PARTITION_FIELD.to_string())
    }
}

impl std::fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address of exactly one record: id plus partition-key value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductKey {
    pub id: String,
    pub partition: String,
}

impl ProductKey {
    /// Build a key, rejecting malformed ids.
    pub fn new(id: impl Into<String>, partition: impl Into<String>) -> Result<Self, CatalogError> {
        let id = id.into();
        validate_id(&id)?;
        Ok(Self {
            id,
            partition: partition.into(),
        })
    }

    pub fn not_found(&self) -> CatalogError {
        CatalogError::NotFound {
            id: self.id.clone(),
            partition: self.partition.clone(),
        }
    }

    pub fn conflict(&self) -> CatalogError {
        CatalogError::Conflict {
            id: self.id.clone(),
            partition: self.partition.clone(),
        }
    }

    pub fn precondition_failed(&self) -> CatalogError {
        CatalogError::PreconditionFailed {
            id: self.id.clone(),
            partition: self.partition.clone(),
        }
    }
}

impl std::fmt::Display for ProductKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.id, self.partition)
    }
}

/// Check an id against the characters the store refuses in document ids.
pub fn validate_id(id: &str) -> Result<(), CatalogError> {
    if id.trim().is_empty() {
        return Err(CatalogError::validation("id", "must not be empty"));
    }
    if id.chars().count() > MAX_ID_LEN {
        return Err(CatalogError::validation(
            "id",
            format!("must be at most {} characters", MAX_ID_LEN),
        ));
    }
    if let Some(c) = id
        .chars()
        .find(|c| matches!(c, '/' | '\\' | '?' | '#') || c.is_control())
    {
        return Err(CatalogError::validation(
            "id",
            format!("contains forbidden character {:?}", c),
        ));
    }
    Ok(())
}

/// Opaque concurrency token assigned by the store on every write
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ETag(pub String);

impl std::fmt::Display for ETag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A product document.
///
/// The schema is advisory, so the record is kept as an ordered JSON object and
/// every attribute the caller supplied round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Product(Map<String, Value>);

impl Product {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Interpret an arbitrary JSON value as a product document.
    pub fn from_value(value: Value) -> Result<Self, CatalogError> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(CatalogError::validation(
                "product",
                format!("expected a JSON object, got {}", json_type_name(&other)),
            )),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    pub fn price(&self) -> Option<f64> {
        self.0.get("price").and_then(Value::as_f64)
    }

    pub fn partition_value(&self, partition_key: &PartitionKey) -> Option<&str> {
        self.0.get(partition_key.field()).and_then(Value::as_str)
    }

    pub fn etag(&self) -> Option<ETag> {
        self.0
            .get("_etag")
            .and_then(Value::as_str)
            .map(|s| ETag(s.to_string()))
    }

    /// Derive the point-operation address of this record.
    pub fn key(&self, partition_key: &PartitionKey) -> Result<ProductKey, CatalogError> {
        let id = match self.0.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(other) => {
                return Err(CatalogError::validation(
                    "id",
                    format!("must be a string, got {}", json_type_name(other)),
                ))
            }
            None => return Err(CatalogError::MissingFields(vec!["id".to_string()])),
        };
        let partition = match self.0.get(partition_key.field()) {
            Some(Value::String(p)) => p.clone(),
            Some(other) => {
                return Err(CatalogError::validation(
                    partition_key.field(),
                    format!("must be a string, got {}", json_type_name(other)),
                ))
            }
            None => {
                return Err(CatalogError::MissingFields(vec![
                    partition_key.field().to_string()
                ]))
            }
        };
        ProductKey::new(id, partition)
    }

    /// Required fields that are absent or null, in declaration order.
    pub fn missing_fields(&self, partition_key: &PartitionKey) -> Vec<String> {
        partition_key
            .required_fields()
            .iter()
            .filter(|field| matches!(self.0.get(**field), None | Some(Value::Null)))
            .map(|field| field.to_string())
            .collect()
    }

    /// Check the create-time contract: required fields present, typed, id well formed.
    pub fn validate_new(&self, partition_key: &PartitionKey) -> Result<ProductKey, CatalogError> {
        let missing = self.missing_fields(partition_key);
        if !missing.is_empty() {
            return Err(CatalogError::MissingFields(missing));
        }
        if !self.0.get("price").is_some_and(Value::is_number) {
            return Err(CatalogError::validation("price", "must be a number"));
        }
        if !self.0.get("name").is_some_and(Value::is_string) {
            return Err(CatalogError::validation("name", "must be a string"));
        }
        self.key(partition_key)
    }

    /// Stamp `createdAt`/`updatedAt` when the caller did not supply them.
    pub fn stamp_created(&mut self, now: DateTime<Utc>) {
        let stamp = Value::String(format_timestamp(now));
        if !self.0.get(CREATED_AT).is_some_and(Value::is_string) {
            self.0.insert(CREATED_AT.to_string(), stamp.clone());
        }
        if !self.0.get(UPDATED_AT).is_some_and(Value::is_string) {
            let created = self.0.get(CREATED_AT).cloned().unwrap_or(stamp);
            self.0.insert(UPDATED_AT.to_string(), created);
        }
        // A supplied `updatedAt` may not precede `createdAt`
        if let (Some(created), Some(updated)) =
            (self.timestamp(CREATED_AT), self.timestamp(UPDATED_AT))
        {
            if updated < created {
                let created = self.0.get(CREATED_AT).cloned().unwrap_or_default();
                self.0.insert(UPDATED_AT.to_string(), created);
            }
        }
    }

    /// Apply a partial update: each key overwrites the stored value, everything else is kept.
    ///
    /// Store-reserved keys are dropped. Key fields may be repeated with their current
    /// value but never changed.
    pub fn merge(
        &mut self,
        patch: Map<String, Value>,
        partition_key: &PartitionKey,
    ) -> Result<(), CatalogError> {
        for field in ["id", partition_key.field()] {
            if let Some(value) = patch.get(field) {
                if self.0.get(field) != Some(value) {
                    return Err(CatalogError::validation(
                        field,
                        "cannot be changed by an update",
                    ));
                }
            }
        }

        for (field, value) in patch {
            if RESERVED_FIELDS.contains(&field.as_str()) {
                tracing::debug!(field = %field, "Ignoring store-reserved field in update");
                continue;
            }
            self.0.insert(field, value);
        }
        Ok(())
    }

    /// Refresh `updatedAt`, strictly after its previous value and never before `createdAt`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        let mut stamp = now;
        if let Some(previous) = self.timestamp(UPDATED_AT) {
            if stamp <= previous {
                stamp = previous + Duration::microseconds(1);
            }
        }
        if let Some(created) = self.timestamp(CREATED_AT) {
            if stamp < created {
                stamp = created;
            }
        }
        self.0.insert(
            UPDATED_AT.to_string(),
            Value::String(format_timestamp(stamp)),
        );
    }

    pub fn timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        self.0
            .get(field)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Copy of the record without the store-reserved fields.
    pub fn without_reserved(&self) -> Product {
        let fields = self
            .0
            .iter()
            .filter(|(k, _)| !RESERVED_FIELDS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Product(fields)
    }

    /// One-line listing used by the list and search tools.
    pub fn summary_line(&self) -> String {
        let price = match self.0.get("price") {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) => s.clone(),
            _ => "N/A".to_string(),
        };
        format!(
            "- {} (ID: {}, Price: ${})",
            self.name().unwrap_or("Unnamed product"),
            self.id().unwrap_or("?"),
            price
        )
    }
}

impl From<Product> for Value {
    fn from(product: Product) -> Self {
        product.into_value()
    }
}

/// RFC 3339 UTC timestamp with microsecond precision, as stored in `createdAt`/`updatedAt`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
