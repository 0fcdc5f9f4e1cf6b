// Filter expressions and their evaluation against product documents

use crate::types::Product;
use serde_json::Value;
use std::cmp::Ordering;

/// Dotted attribute path below the document root, e.g. `specifications.memory`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(pub Vec<String>);

impl FieldPath {
    pub fn field(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    pub fn root(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or_default()
    }

    /// Resolve against a document. `None` means undefined.
    pub fn resolve<'a>(&self, product: &'a Product) -> Option<&'a Value> {
        let mut segments = self.0.iter();
        let first = segments.next()?;
        let mut current = product.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFunc {
    Contains,
    StartsWith,
    EndsWith,
}

/// Left-hand side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Field(FieldPath),
    Lower(FieldPath),
    Upper(FieldPath),
}

impl Operand {
    pub fn path(&self) -> &FieldPath {
        match self {
            Operand::Field(p) | Operand::Lower(p) | Operand::Upper(p) => p,
        }
    }

    fn evaluate(&self, product: &Product) -> Option<Value> {
        let value = self.path().resolve(product)?;
        match (self, value) {
            (Operand::Field(_), v) => Some(v.clone()),
            (Operand::Lower(_), Value::String(s)) => Some(Value::String(s.to_lowercase())),
            (Operand::Upper(_), Value::String(s)) => Some(Value::String(s.to_uppercase())),
            // LOWER/UPPER of a non-string is undefined
            _ => None,
        }
    }
}

/// Boolean filter over product documents
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Not(Box<Filter>),
    Compare {
        lhs: Operand,
        op: CmpOp,
        rhs: Value,
    },
    StringMatch {
        func: StringFunc,
        path: FieldPath,
        needle: String,
        ignore_case: bool,
    },
    ArrayContains {
        path: FieldPath,
        value: Value,
    },
    IsDefined(FieldPath),
}

impl Filter {
    /// Case-insensitive substring match on name or description.
    pub fn text_search(query: &str) -> Self {
        let contains = |field: &str| Filter::StringMatch {
            func: StringFunc::Contains,
            path: FieldPath::field(field),
            needle: query.to_string(),
            ignore_case: true,
        };
        Filter::Or(Box::new(contains("name")), Box::new(contains("description")))
    }

    pub fn matches(&self, product: &Product) -> bool {
        match self {
            Filter::And(a, b) => a.matches(product) && b.matches(product),
            Filter::Or(a, b) => a.matches(product) || b.matches(product),
            Filter::Not(inner) => !inner.matches(product),
            Filter::Compare { lhs, op, rhs } => match lhs.evaluate(product) {
                Some(value) => compare(&value, *op, rhs),
                None => false,
            },
            Filter::StringMatch {
                func,
                path,
                needle,
                ignore_case,
            } => match path.resolve(product) {
                Some(Value::String(haystack)) => {
                    if *ignore_case {
                        string_match(*func, &haystack.to_lowercase(), &needle.to_lowercase())
                    } else {
                        string_match(*func, haystack, needle)
                    }
                }
                _ => false,
            },
            Filter::ArrayContains { path, value } => match path.resolve(product) {
                Some(Value::Array(items)) => items.iter().any(|item| values_equal(item, value)),
                _ => false,
            },
            Filter::IsDefined(path) => path.resolve(product).is_some(),
        }
    }

    /// Every path the filter reads
    pub fn paths(&self) -> Vec<&FieldPath> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a FieldPath>) {
        match self {
            Filter::And(a, b) | Filter::Or(a, b) => {
                a.collect_paths(out);
                b.collect_paths(out);
            }
            Filter::Not(inner) => inner.collect_paths(out),
            Filter::Compare { lhs, .. } => out.push(lhs.path()),
            Filter::StringMatch { path, .. }
            | Filter::ArrayContains { path, .. }
            | Filter::IsDefined(path) => out.push(path),
        }
    }
}

fn string_match(func: StringFunc, haystack: &str, needle: &str) -> bool {
    match func {
        StringFunc::Contains => haystack.contains(needle),
        StringFunc::StartsWith => haystack.starts_with(needle),
        StringFunc::EndsWith => haystack.ends_with(needle),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Comparisons across different JSON types are false, never errors.
fn compare(value: &Value, op: CmpOp, rhs: &Value) -> bool {
    let ordering = match (value, rhs) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    };

    match (ordering, op) {
        (Some(ord), CmpOp::Eq) => ord == Ordering::Equal,
        (Some(ord), CmpOp::Ne) => ord != Ordering::Equal,
        (Some(ord), CmpOp::Lt) => ord == Ordering::Less,
        (Some(ord), CmpOp::Le) => ord != Ordering::Greater,
        (Some(ord), CmpOp::Gt) => ord == Ordering::Greater,
        (Some(ord), CmpOp::Ge) => ord != Ordering::Less,
        (None, _) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn laptop() -> Product {
        Product::from_value(json!({
            "id": "prod-001",
            "name": "MacBook Pro 16-inch",
            "category": "Electronics",
            "description": "Powerful laptop with M3 chip",
            "price": 2499,
            "inStock": true,
            "tags": ["laptop", "apple"],
            "specifications": {"memory": "36GB"}
        }))
        .unwrap()
    }

    fn field(name: &str) -> Operand {
        Operand::Field(FieldPath::field(name))
    }

    #[test]
    fn test_text_search_is_case_insensitive() {
        assert!(Filter::text_search("macbook").matches(&laptop()));
        assert!(Filter::text_search("M3 CHIP").matches(&laptop()));
        assert!(!Filter::text_search("desktop").matches(&laptop()));
    }

    #[test]
    fn test_numeric_comparisons() {
        let cheap = Filter::Compare {
            lhs: field("price"),
            op: CmpOp::Lt,
            rhs: json!(1000),
        };
        assert!(!cheap.matches(&laptop()));

        let exact = Filter::Compare {
            lhs: field("price"),
            op: CmpOp::Eq,
            rhs: json!(2499.0),
        };
        assert!(exact.matches(&laptop()));
    }

    #[test]
    fn test_type_mismatch_is_false() {
        let mismatched = Filter::Compare {
            lhs: field("price"),
            op: CmpOp::Ne,
            rhs: json!("2499"),
        };
        assert!(!mismatched.matches(&laptop()));

        let undefined = Filter::Compare {
            lhs: field("rating"),
            op: CmpOp::Ne,
            rhs: json!(5),
        };
        assert!(!undefined.matches(&laptop()));
    }

    #[test]
    fn test_nested_paths_and_arrays() {
        let memory = Filter::Compare {
            lhs: Operand::Lower(FieldPath(vec![
                "specifications".to_string(),
                "memory".to_string(),
            ])),
            op: CmpOp::Eq,
            rhs: json!("36gb"),
        };
        assert!(memory.matches(&laptop()));

        let tagged = Filter::ArrayContains {
            path: FieldPath::field("tags"),
            value: json!("apple"),
        };
        assert!(tagged.matches(&laptop()));
        assert!(Filter::IsDefined(FieldPath::field("inStock")).matches(&laptop()));
        assert!(!Filter::Not(Box::new(tagged)).matches(&laptop()));
    }

    #[test]
    fn test_paths() {
        let filter = Filter::And(
            Box::new(Filter::text_search("x")),
            Box::new(Filter::IsDefined(FieldPath::field("sku"))),
        );
        let paths = filter.paths();
        let roots: Vec<&str> = paths.iter().map(|p| p.root()).collect();
        assert_eq!(roots, vec!["name", "description", "sku"]);
    }
}
