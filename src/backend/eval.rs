//! In-process evaluation of filters, updates and sort orders for backends without a
//! native query engine.

use std::cmp::Ordering;

use bson::{Bson, Document};

use crate::{
    backend::types::{Filter, SortDirection, Update},
    errors::DocGraphError,
};

/// Resolves a dotted path inside a document.
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = doc.get(first)?;
    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            _ => return None,
        };
    }
    Some(current)
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

/// Equality with numeric values compared across Int32, Int64 and Double.
pub fn values_equal(left: &Bson, right: &Bson) -> bool {
    match (as_f64(left), as_f64(right)) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

pub fn matches(doc: &Document, filter: &Filter) -> bool {
    match filter {
        Filter::All => true,
        Filter::Eq { field, value } => match lookup(doc, field) {
            Some(Bson::Array(items)) if !matches!(value, Bson::Array(_)) => {
                items.iter().any(|item| values_equal(item, value))
            }
            Some(found) => values_equal(found, value),
            None => matches!(value, Bson::Null),
        },
    }
}

fn element_matches(element: &Bson, matching: &Document) -> bool {
    match element {
        Bson::Document(inner) => matching.iter().all(|(key, expected)| {
            lookup(inner, key).is_some_and(|actual| values_equal(actual, expected))
        }),
        _ => false,
    }
}

/// Walks to the document that owns the last segment of `path`, creating intermediate
/// documents as needed.
fn parent_mut<'a>(
    doc: &'a mut Document,
    path: &str,
) -> Result<(&'a mut Document, String), DocGraphError> {
    let mut segments: Vec<&str> = path.split('.').collect();
    let last = segments
        .pop()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DocGraphError::query(format!("empty field path '{path}'")))?;
    let mut current = doc;
    for segment in segments {
        if !current.contains_key(segment) {
            current.insert(segment, Document::new());
        }
        current = match current.get_mut(segment) {
            Some(Bson::Document(inner)) => inner,
            _ => {
                return Err(DocGraphError::query(format!(
                    "cannot create field '{last}' under non-document '{segment}'"
                )));
            }
        };
    }
    Ok((current, last.to_string()))
}

pub fn apply_update(doc: &mut Document, update: &Update) -> Result<(), DocGraphError> {
    match update {
        Update::Set(fields) => {
            for (key, value) in fields {
                if key == "_id" && doc.get("_id").is_some_and(|id| id != value) {
                    return Err(DocGraphError::query(
                        "update would modify the immutable field '_id'",
                    ));
                }
                let (parent, last) = parent_mut(doc, key)?;
                parent.insert(last, value.clone());
            }
            Ok(())
        }
        Update::Push { field, value } => {
            let (parent, last) = parent_mut(doc, field)?;
            match parent.get_mut(&last) {
                None => {
                    parent.insert(last, Bson::Array(vec![value.clone()]));
                    Ok(())
                }
                Some(Bson::Array(items)) => {
                    items.push(value.clone());
                    Ok(())
                }
                Some(_) => Err(DocGraphError::query(format!(
                    "the field '{field}' must be an array"
                ))),
            }
        }
        Update::Pull { field, matching } => {
            let (parent, last) = parent_mut(doc, field)?;
            match parent.get_mut(&last) {
                None => Ok(()),
                Some(Bson::Array(items)) => {
                    items.retain(|item| !element_matches(item, matching));
                    Ok(())
                }
                Some(_) => Err(DocGraphError::query(format!(
                    "cannot apply pull to non-array field '{field}'"
                ))),
            }
        }
    }
}

fn type_rank(value: Option<&Bson>) -> u8 {
    match value {
        Some(Bson::MinKey) => 0,
        None | Some(Bson::Null) | Some(Bson::Undefined) => 1,
        Some(Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_)) => 2,
        Some(Bson::String(_) | Bson::Symbol(_)) => 3,
        Some(Bson::Document(_)) => 4,
        Some(Bson::Array(_)) => 5,
        Some(Bson::Binary(_)) => 6,
        Some(Bson::ObjectId(_)) => 7,
        Some(Bson::Boolean(_)) => 8,
        Some(Bson::DateTime(_)) => 9,
        Some(Bson::Timestamp(_)) => 10,
        Some(Bson::RegularExpression(_)) => 11,
        Some(Bson::MaxKey) => 13,
        Some(_) => 12,
    }
}

/// Orders two optional values the way a document database sorts mixed-type fields.
pub fn compare_values(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    let rank = type_rank(left).cmp(&type_rank(right));
    if rank != Ordering::Equal {
        return rank;
    }
    match (left, right) {
        (Some(a), Some(b)) => {
            if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
                return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            }
            match (a, b) {
                (Bson::String(x), Bson::String(y)) => x.cmp(y),
                (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
                (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
                (Bson::DateTime(x), Bson::DateTime(y)) => {
                    x.timestamp_millis().cmp(&y.timestamp_millis())
                }
                (Bson::Timestamp(x), Bson::Timestamp(y)) => {
                    (x.time, x.increment).cmp(&(y.time, y.increment))
                }
                _ => Ordering::Equal,
            }
        }
        _ => Ordering::Equal,
    }
}

/// Stable sort on one field.
pub fn sort_documents(docs: &mut [Document], field: &str, direction: SortDirection) {
    docs.sort_by(|a, b| {
        let ordering = compare_values(lookup(a, field), lookup(b, field));
        match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}
