//! Aggregation pipeline execution for in-memory collections.
//!
//! Supported stages: `$match`, `$unwind`, `$replaceRoot` / `$replaceWith`, `$project`,
//! `$sort`, `$skip`, `$limit` and `$count`. Stages run in order over a materialized list.

use bson::{Bson, Document, doc};

use docbridge_core::error::{ModelError, ModelResult};

use crate::{
    evaluator::{compare, lookup, matches, truthy},
    update::{set_path, unset_path},
};

/// Runs `pipeline` over `documents` and returns the output documents in order.
pub(crate) fn run(documents: Vec<Document>, pipeline: &[Document]) -> ModelResult<Vec<Document>> {
    pipeline
        .iter()
        .try_fold(documents, |documents, stage| apply_stage(documents, stage))
}

fn apply_stage(documents: Vec<Document>, stage: &Document) -> ModelResult<Vec<Document>> {
    let mut entries = stage.iter();
    let (name, operand) = match (entries.next(), entries.next()) {
        (Some(entry), None) => entry,
        _ => {
            return Err(ModelError::Backend(
                "a pipeline stage must have exactly one field".to_string(),
            ));
        }
    };

    match name.as_str() {
        "$match" => {
            let filter = expect_document(name, operand)?;
            let mut matched = Vec::with_capacity(documents.len());
            for document in documents {
                if matches(&document, filter)? {
                    matched.push(document);
                }
            }
            Ok(matched)
        }
        "$unwind" => unwind(documents, operand),
        "$replaceRoot" => {
            let new_root = expect_document(name, operand)?
                .get("newRoot")
                .ok_or_else(|| ModelError::Backend("$replaceRoot requires newRoot".to_string()))?;
            documents
                .iter()
                .map(|document| replace_root(document, new_root))
                .collect()
        }
        "$replaceWith" => documents
            .iter()
            .map(|document| replace_root(document, operand))
            .collect(),
        "$project" => project(documents, expect_document(name, operand)?),
        "$sort" => {
            let keys = expect_document(name, operand)?;
            let mut sorted = documents;
            sorted.sort_by(|a, b| {
                keys.iter()
                    .map(|(path, direction)| {
                        let ordering = compare(lookup(a, path), lookup(b, path));
                        if as_number(direction) < 0 {
                            ordering.reverse()
                        } else {
                            ordering
                        }
                    })
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            Ok(sorted)
        }
        "$skip" => Ok(documents.into_iter().skip(count(name, operand)?).collect()),
        "$limit" => Ok(documents.into_iter().take(count(name, operand)?).collect()),
        "$count" => match operand {
            Bson::String(field) => Ok(vec![doc! { field: documents.len() as i64 }]),
            _ => Err(ModelError::Backend("$count expects a field name".to_string())),
        },
        other => Err(ModelError::Backend(format!(
            "unsupported pipeline stage {other}"
        ))),
    }
}

fn unwind(documents: Vec<Document>, operand: &Bson) -> ModelResult<Vec<Document>> {
    let (path, preserve) = match operand {
        Bson::String(path) => (path.as_str(), false),
        Bson::Document(options) => (
            options
                .get_str("path")
                .map_err(|_| ModelError::Backend("$unwind requires a path".to_string()))?,
            options
                .get("preserveNullAndEmptyArrays")
                .map(truthy)
                .unwrap_or(false),
        ),
        _ => return Err(ModelError::Backend("$unwind expects a path".to_string())),
    };
    let field = field_path(path)?;

    let mut unwound = Vec::new();
    for document in documents {
        let items = match lookup(&document, field) {
            Some(Bson::Array(items)) => Some(items.clone()),
            Some(Bson::Null) | None => Some(Vec::new()),
            Some(_) => None,
        };

        match items {
            Some(items) if items.is_empty() => {
                if preserve {
                    unwound.push(document);
                }
            }
            Some(items) => {
                for item in items {
                    let mut copy = document.clone();
                    set_path(&mut copy, field, item)?;
                    unwound.push(copy);
                }
            }
            // a non-array value unwinds to itself
            None => unwound.push(document),
        }
    }

    Ok(unwound)
}

fn replace_root(document: &Document, new_root: &Bson) -> ModelResult<Document> {
    let resolved = match new_root {
        Bson::String(path) => lookup(document, field_path(path)?),
        other => Some(other),
    };

    match resolved {
        Some(Bson::Document(root)) => Ok(root.clone()),
        _ => Err(ModelError::Backend(
            "'newRoot' must evaluate to a document".to_string(),
        )),
    }
}

fn project(documents: Vec<Document>, operand: &Document) -> ModelResult<Vec<Document>> {
    let exclude_id = operand.get("_id").map(|flag| !truthy(flag)).unwrap_or(false);
    let fields = operand
        .iter()
        .filter(|(key, _)| key.as_str() != "_id")
        .collect::<Vec<_>>();
    let inclusion = fields.iter().any(|(_, flag)| truthy(flag));

    if inclusion && fields.iter().any(|(_, flag)| !truthy(flag)) {
        return Err(ModelError::Backend(
            "$project cannot mix inclusion and exclusion".to_string(),
        ));
    }

    documents
        .into_iter()
        .map(|document| -> ModelResult<Document> {
            let mut projected = if inclusion {
                let mut kept = Document::new();
                if !exclude_id {
                    if let Some(id) = document.get("_id") {
                        kept.insert("_id", id.clone());
                    }
                }
                for (path, _) in &fields {
                    if let Some(value) = lookup(&document, path) {
                        set_path(&mut kept, path, value.clone())?;
                    }
                }
                kept
            } else {
                let mut rest = document;
                for (path, _) in &fields {
                    unset_path(&mut rest, path);
                }
                rest
            };
            if exclude_id {
                projected.remove("_id");
            }
            Ok(projected)
        })
        .collect()
}

fn field_path(path: &str) -> ModelResult<&str> {
    path.strip_prefix('$')
        .ok_or_else(|| ModelError::Backend(format!("field path {path:?} must start with '$'")))
}

fn expect_document<'a>(stage: &str, operand: &'a Bson) -> ModelResult<&'a Document> {
    operand.as_document()
        .ok_or_else(|| ModelError::Backend(format!("{stage} expects a document")))
}

fn as_number(value: &Bson) -> i64 {
    match value {
        Bson::Int32(n) => *n as i64,
        Bson::Int64(n) => *n,
        Bson::Double(n) => *n as i64,
        _ => 0,
    }
}

fn count(stage: &str, operand: &Bson) -> ModelResult<usize> {
    usize::try_from(as_number(operand))
        .map_err(|_| ModelError::Backend(format!("{stage} expects a non-negative number")))
}
