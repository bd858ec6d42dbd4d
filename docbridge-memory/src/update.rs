//! Update-operator application for in-memory collections.

use bson::{Bson, Document};

use docbridge_core::{
    backend::UpdateOutcome,
    error::{ModelError, ModelResult},
};

use crate::evaluator::matches;

/// Applies `update` to the first document in `documents` matching `filter`.
pub(crate) fn update_one(
    documents: &mut [Document],
    filter: &Document,
    update: &Document,
) -> ModelResult<UpdateOutcome> {
    if update.is_empty() || update.keys().any(|key| !key.starts_with('$')) {
        return Err(ModelError::Backend(
            "update document requires atomic operators".to_string(),
        ));
    }

    let mut target = None;
    for (index, document) in documents.iter().enumerate() {
        if matches(document, filter)? {
            target = Some(index);
            break;
        }
    }
    let Some(index) = target else {
        return Ok(UpdateOutcome::default());
    };

    let mut updated = documents[index].clone();
    for (operator, fields) in update {
        let fields = fields
            .as_document()
            .ok_or_else(|| ModelError::Backend(format!("{operator} expects a document")))?;

        match operator.as_str() {
            "$set" => {
                for (path, value) in fields {
                    set_path(&mut updated, path, value.clone())?;
                }
            }
            "$unset" => {
                for (path, _) in fields {
                    unset_path(&mut updated, path);
                }
            }
            other => {
                return Err(ModelError::Backend(format!(
                    "unsupported update operator {other}"
                )));
            }
        }
    }

    let modified = updated != documents[index];
    documents[index] = updated;

    Ok(UpdateOutcome {
        matched_count: 1,
        modified_count: modified as u64,
    })
}

pub(crate) fn set_path(document: &mut Document, path: &str, value: Bson) -> ModelResult<()> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            if !document.contains_key(head) {
                document.insert(head, Document::new());
            }
            match document.get_mut(head) {
                Some(Bson::Document(inner)) => set_path(inner, rest, value),
                _ => Err(ModelError::Backend(format!(
                    "cannot set {path:?}: {head:?} is not a document"
                ))),
            }
        }
    }
}

pub(crate) fn unset_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                unset_path(inner, rest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn sets_fields_on_first_match_only() {
        let mut documents = vec![doc! { "k": 1, "v": "a" }, doc! { "k": 1, "v": "b" }];

        let outcome = update_one(
            &mut documents,
            &doc! { "k": 1 },
            &doc! { "$set": { "v": "z", "meta.touched": true } },
        )
        .unwrap();

        assert_eq!(outcome, UpdateOutcome { matched_count: 1, modified_count: 1 });
        assert_eq!(documents[0], doc! { "k": 1, "v": "z", "meta": { "touched": true } });
        assert_eq!(documents[1], doc! { "k": 1, "v": "b" });
    }

    #[test]
    fn reports_unmodified_and_unmatched() {
        let mut documents = vec![doc! { "k": 1, "v": "a" }];

        let same = update_one(&mut documents, &doc! { "k": 1 }, &doc! { "$set": { "v": "a" } })
            .unwrap();
        let missing = update_one(&mut documents, &doc! { "k": 2 }, &doc! { "$set": { "v": "b" } })
            .unwrap();

        assert_eq!(same, UpdateOutcome { matched_count: 1, modified_count: 0 });
        assert_eq!(missing, UpdateOutcome::default());
    }

    #[test]
    fn unset_and_replacement_rejection() {
        let mut documents = vec![doc! { "k": 1, "v": "a" }];

        update_one(&mut documents, &doc! {}, &doc! { "$unset": { "v": "" } }).unwrap();
        assert_eq!(documents[0], doc! { "k": 1 });

        assert!(matches!(
            update_one(&mut documents, &doc! {}, &doc! { "v": "b" }),
            Err(ModelError::Backend(_))
        ));
    }
}
