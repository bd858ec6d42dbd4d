#![allow(dead_code)]

use docbridge::{memory::InMemoryDatabase, prelude::*};
use bson::{Bson, bson, doc};
use std::sync::{Arc, LazyLock};

pub struct Follower;

impl Model for Follower {}

/// A user profile whose followers are partly embedded and partly stored in a
/// `followers` collection keyed by `user_id`.
pub struct Profile;

impl Model for Profile {
    fn schema() -> &'static Schema {
        static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
            Schema::builder()
                .field("id", Field::named("user_id").transform(transform::to_int))
                .field("email", Field::new())
                .fallthrough("name", Fallthrough::new(["name", "full_name"]))
                .sequence(
                    "followers",
                    Sequence::of::<Follower>().superset("followers", |profile| {
                        let user_id = profile.raw().get("user_id").cloned().unwrap_or(Bson::Null);
                        Ok(bson!([
                            { "$match": { "user_id": user_id } },
                            { "$unwind": "$followers" },
                            { "$replaceRoot": { "newRoot": "$followers" } },
                        ]))
                    }),
                )
                .sequence("tags", Sequence::of::<Follower>().field_name("labels"))
                .build()
                .unwrap()
        });
        &SCHEMA
    }
}

pub struct SingleNameProfile;

impl Model for SingleNameProfile {
    fn schema() -> &'static Schema {
        static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
            Schema::builder()
                .fallthrough("name", Fallthrough::new(["full_name"]))
                .build()
                .unwrap()
        });
        &SCHEMA
    }
}

pub struct StrictProfile;

impl Model for StrictProfile {
    const STRICT: bool = true;

    fn schema() -> &'static Schema {
        static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
            Schema::builder()
                .field("name", Field::new())
                .build()
                .unwrap()
        });
        &SCHEMA
    }
}

/// An account whose watchers come from a plain `find` on the `watchers` collection.
pub struct Account;

impl Model for Account {
    fn schema() -> &'static Schema {
        static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
            Schema::builder()
                .sequence(
                    "watchers",
                    Sequence::of::<Follower>()
                        .field_name("watching")
                        .superset("watchers", |account| {
                            Ok(bson!({ "account": account.get("account")? }))
                        }),
                )
                .build()
                .unwrap()
        });
        &SCHEMA
    }

    fn identity_field() -> &'static str {
        "account"
    }
}

pub struct MisconfiguredAccount;

impl Model for MisconfiguredAccount {
    fn schema() -> &'static Schema {
        static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
            Schema::builder()
                .sequence(
                    "watchers",
                    Sequence::of::<Follower>()
                        .field_name("watching")
                        .superset("watchers", |_| Ok(Bson::String("account".into()))),
                )
                .sequence(
                    "broken",
                    Sequence::of::<Follower>()
                        .field_name("watching")
                        .superset("watchers", |_| Ok(bson!([{ "$explode": {} }]))),
                )
                .build()
                .unwrap()
        });
        &SCHEMA
    }
}

pub fn profile_document() -> bson::Document {
    doc! {
        "_id": 1,
        "user_id": "4",
        "full_name": "Mark Smith",
        "extra_field": "extra",
        "followers": [{ "name": "ann" }, { "name": "bob" }],
        "labels": [{ "name": "rust" }],
    }
}

pub async fn seeded() -> (InMemoryDatabase, Arc<dyn Database>) {
    let db = InMemoryDatabase::builder()
        .seed("profiles", vec![profile_document()])
        .seed(
            "followers",
            vec![
                doc! { "user_id": "4", "followers": [{ "name": "cid" }, { "name": "ann" }] },
                doc! { "user_id": "9", "followers": [{ "name": "zed" }] },
                doc! { "user_id": "4", "followers": [{ "name": "dee" }] },
            ],
        )
        .seed(
            "watchers",
            vec![
                doc! { "account": "acme", "name": "eve" },
                doc! { "account": "other", "name": "fay" },
                doc! { "account": "acme", "name": "gus" },
            ],
        )
        .build()
        .await
        .unwrap();
    let handle: Arc<dyn Database> = Arc::new(db.clone());

    (db, handle)
}

pub fn names<M: Model>(wrappers: &[DocumentWrapper<M>]) -> Vec<String> {
    wrappers
        .iter()
        .map(|wrapper| wrapper.raw().get_str("name").unwrap().to_string())
        .collect()
}
