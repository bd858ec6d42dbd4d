//! Filter evaluation for in-memory documents.
//!
//! This module matches BSON documents against MongoDB-style filter documents: implicit
//! equality, dotted paths, the comparison operators `$eq $ne $gt $gte $lt $lte $in $nin
//! $exists`, and the logical operators `$and $or $nor`.

use bson::{Bson, DateTime, Document, oid::ObjectId};
use std::{cmp::Ordering, collections::HashMap};

use docbridge_core::error::{ModelError, ModelResult};

/// Type-erased, comparable representation of BSON values.
///
/// Integers compare exactly with each other and by value with doubles, so `Int32(4)`,
/// `Int64(4)` and `Double(4.0)` compare equal. Types without a variant of their own keep
/// the original value and only equal an identical value.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// 32 or 64-bit integer
    Int(i64),
    /// Floating point value
    Double(f64),
    /// DateTime value
    DateTime(DateTime),
    /// ObjectId value
    ObjectId(ObjectId),
    /// String value
    String(&'a str),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Map/Object of comparable values
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Binary, decimal, timestamp, regex and the other remaining types
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Int(i64::from(*value)),
            Bson::Int64(value) => Comparable::Int(*value),
            Bson::Double(value) => Comparable::Double(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>(),
            ),
            other => Comparable::Other(other),
        }
    }
}

/// Orders an integer against a double without rounding the integer.
fn cmp_int_double(int: i64, double: f64) -> Option<Ordering> {
    if double.is_nan() {
        return None;
    }
    // i64 spans [-2^63, 2^63)
    if double >= 9_223_372_036_854_775_808.0 {
        return Some(Ordering::Less);
    }
    if double < -9_223_372_036_854_775_808.0 {
        return Some(Ordering::Greater);
    }

    let truncated = double.trunc() as i64;
    match int.cmp(&truncated) {
        Ordering::Equal => 0.0_f64.partial_cmp(&double.fract()),
        ordering => Some(ordering),
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Int(a), Comparable::Int(b)) => a == b,
            (Comparable::Double(a), Comparable::Double(b)) => a == b,
            (Comparable::Int(a), Comparable::Double(b))
            | (Comparable::Double(b), Comparable::Int(a)) => {
                cmp_int_double(*a, *b) == Some(Ordering::Equal)
            }
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Int(a), Comparable::Int(b)) => a.partial_cmp(b),
            (Comparable::Double(a), Comparable::Double(b)) => a.partial_cmp(b),
            (Comparable::Int(a), Comparable::Double(b)) => cmp_int_double(*a, *b),
            (Comparable::Double(a), Comparable::Int(b)) => {
                cmp_int_double(*b, *a).map(Ordering::reverse)
            }
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a dotted path (`"address.city"`) against a document.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Orders two optional values for sorting; missing and incomparable values sort equal.
pub(crate) fn compare(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    let left = left.map(Comparable::from).unwrap_or(Comparable::Null);
    let right = right.map(Comparable::from).unwrap_or(Comparable::Null);

    match (&left, &right) {
        (Comparable::Null, Comparable::Null) => Ordering::Equal,
        (Comparable::Null, _) => Ordering::Less,
        (_, Comparable::Null) => Ordering::Greater,
        _ => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
    }
}

/// Returns clones of the documents matching `filter`, preserving order.
pub(crate) fn filter_documents<'a>(
    documents: impl IntoIterator<Item = &'a Document>,
    filter: &Document,
) -> ModelResult<Vec<Document>> {
    let mut matched = Vec::new();

    for document in documents {
        if matches(document, filter)? {
            matched.push(document.clone());
        }
    }

    Ok(matched)
}

/// Returns `true` if `document` satisfies every clause of `filter`.
pub(crate) fn matches(document: &Document, filter: &Document) -> ModelResult<bool> {
    for (key, condition) in filter {
        let satisfied = match key.as_str() {
            "$and" => clauses(key, condition)?
                .iter()
                .map(|clause| matches(document, clause))
                .collect::<ModelResult<Vec<_>>>()?
                .into_iter()
                .all(|hit| hit),
            "$or" => clauses(key, condition)?
                .iter()
                .map(|clause| matches(document, clause))
                .collect::<ModelResult<Vec<_>>>()?
                .into_iter()
                .any(|hit| hit),
            "$nor" => !clauses(key, condition)?
                .iter()
                .map(|clause| matches(document, clause))
                .collect::<ModelResult<Vec<_>>>()?
                .into_iter()
                .any(|hit| hit),
            op if op.starts_with('$') => {
                return Err(ModelError::Backend(format!(
                    "unsupported top-level query operator {op}"
                )));
            }
            path => matches_condition(lookup(document, path), condition)?,
        };

        if !satisfied {
            return Ok(false);
        }
    }

    Ok(true)
}

fn clauses<'a>(operator: &str, value: &'a Bson) -> ModelResult<Vec<&'a Document>> {
    match value {
        Bson::Array(items) => items
            .iter()
            .map(|item| {
                item.as_document().ok_or_else(|| {
                    ModelError::Backend(format!("{operator} expects an array of documents"))
                })
            })
            .collect(),
        _ => Err(ModelError::Backend(format!("{operator} expects an array"))),
    }
}

fn is_operator_document(condition: &Bson) -> Option<&Document> {
    match condition {
        Bson::Document(doc) if !doc.is_empty() && doc.keys().all(|k| k.starts_with('$')) => {
            Some(doc)
        }
        _ => None,
    }
}

fn matches_condition(value: Option<&Bson>, condition: &Bson) -> ModelResult<bool> {
    let Some(operators) = is_operator_document(condition) else {
        return Ok(equals(value, condition));
    };

    for (op, operand) in operators {
        let satisfied = match op.as_str() {
            "$eq" => equals(value, operand),
            "$ne" => !equals(value, operand),
            "$gt" | "$gte" | "$lt" | "$lte" => match value {
                Some(field_value) => {
                    match Comparable::from(field_value).partial_cmp(&Comparable::from(operand)) {
                        Some(ordering) => match op.as_str() {
                            "$gt" => ordering == Ordering::Greater,
                            "$gte" => ordering != Ordering::Less,
                            "$lt" => ordering == Ordering::Less,
                            _ => ordering != Ordering::Greater,
                        },
                        None => false,
                    }
                }
                None => false,
            },
            "$in" => candidates(op, operand)?
                .iter()
                .any(|candidate| equals(value, candidate)),
            "$nin" => !candidates(op, operand)?
                .iter()
                .any(|candidate| equals(value, candidate)),
            "$exists" => value.is_some() == truthy(operand),
            other => {
                return Err(ModelError::Backend(format!(
                    "unsupported query operator {other}"
                )));
            }
        };

        if !satisfied {
            return Ok(false);
        }
    }

    Ok(true)
}

fn candidates<'a>(operator: &str, operand: &'a Bson) -> ModelResult<&'a Vec<Bson>> {
    operand
        .as_array()
        .ok_or_else(|| ModelError::Backend(format!("{operator} expects an array")))
}

/// Equality with MongoDB's array semantics: a field holding an array matches a scalar
/// contained in it. A missing field equals `null`.
fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
    let expected = Comparable::from(expected);

    match value {
        None => expected == Comparable::Null,
        Some(value) => {
            let actual = Comparable::from(value);
            if actual == expected {
                return true;
            }
            match actual {
                Comparable::Array(items) => items.iter().any(|item| item == &expected),
                _ => false,
            }
        }
    }
}

pub(crate) fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(flag) => *flag,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{Decimal128, Uuid, doc};

    fn profile() -> Document {
        doc! {
            "user_id": "4",
            "follower_count": 11,
            "address": { "city": "Leeds" },
            "tags": ["rust", "mongodb"],
            "bio": Bson::Null,
        }
    }

    #[test]
    fn implicit_equality_and_numeric_normalization() {
        assert!(matches(&profile(), &doc! { "user_id": "4" }).unwrap());
        assert!(matches(&profile(), &doc! { "follower_count": 11_i64 }).unwrap());
        assert!(!matches(&profile(), &doc! { "user_id": "5" }).unwrap());
    }

    #[test]
    fn dotted_paths_and_array_membership() {
        assert!(matches(&profile(), &doc! { "address.city": "Leeds" }).unwrap());
        assert!(matches(&profile(), &doc! { "tags": "rust" }).unwrap());
        assert!(!matches(&profile(), &doc! { "tags": "python" }).unwrap());
    }

    #[test]
    fn comparison_and_set_operators() {
        assert!(matches(&profile(), &doc! { "follower_count": { "$gte": 11, "$lt": 12 } }).unwrap());
        assert!(matches(&profile(), &doc! { "user_id": { "$in": ["3", "4"] } }).unwrap());
        assert!(matches(&profile(), &doc! { "user_id": { "$nin": ["3"] } }).unwrap());
        assert!(!matches(&profile(), &doc! { "follower_count": { "$gt": 11 } }).unwrap());
    }

    #[test]
    fn existence_is_presence_not_truthiness() {
        assert!(matches(&profile(), &doc! { "bio": { "$exists": true } }).unwrap());
        assert!(matches(&profile(), &doc! { "email": { "$exists": false } }).unwrap());
        assert!(matches(&profile(), &doc! { "email": Bson::Null }).unwrap());
    }

    #[test]
    fn logical_operators() {
        assert!(matches(
            &profile(),
            &doc! { "$or": [{ "user_id": "9" }, { "address.city": "Leeds" }] }
        )
        .unwrap());
        assert!(!matches(
            &profile(),
            &doc! { "$and": [{ "user_id": "4" }, { "follower_count": 3 }] }
        )
        .unwrap());
        assert!(matches(&profile(), &doc! { "$nor": [{ "user_id": "9" }] }).unwrap());
    }

    #[test]
    fn unknown_operators_are_backend_errors() {
        assert!(matches!(
            matches(&profile(), &doc! { "user_id": { "$regex": "4" } }),
            Err(ModelError::Backend(_))
        ));
        assert!(matches!(
            matches(&profile(), &doc! { "$where": "true" }),
            Err(ModelError::Backend(_))
        ));
    }

    #[test]
    fn large_integers_compare_exactly() {
        let big = 9_007_199_254_740_993_i64;
        let document = doc! { "_id": big };

        assert!(matches(&document, &doc! { "_id": big }).unwrap());
        assert!(!matches(&document, &doc! { "_id": big - 1 }).unwrap());
        assert!(matches(&document, &doc! { "_id": { "$gt": big - 1 } }).unwrap());
        assert!(matches(&doc! { "n": 4 }, &doc! { "n": 4.0 }).unwrap());
        assert!(!matches(&doc! { "n": 4 }, &doc! { "n": 4.5 }).unwrap());
        assert!(matches(&doc! { "n": 4 }, &doc! { "n": { "$lt": 4.5 } }).unwrap());
    }

    #[test]
    fn unmodelled_types_use_exact_equality() {
        let first = Uuid::new();
        let second = Uuid::new();
        let document = doc! { "_id": first, "amount": Bson::Decimal128(Decimal128::from_bytes([1; 16])) };

        assert!(matches(&document, &doc! { "_id": first }).unwrap());
        assert!(!matches(&document, &doc! { "_id": second }).unwrap());
        assert!(!matches(&document, &doc! { "_id": Bson::Null }).unwrap());
        assert!(!matches(
            &document,
            &doc! { "amount": Bson::Decimal128(Decimal128::from_bytes([2; 16])) }
        )
        .unwrap());
    }
}
