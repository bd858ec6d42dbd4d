mod common;

use bson::doc;
use common::{Account, Follower, MisconfiguredAccount, Profile, names, profile_document, seeded};
use docbridge::prelude::*;
use futures::{StreamExt, executor::block_on};

#[tokio::test]
async fn test_embedded_only_sequence() {
    let profile = DocumentWrapper::<Profile>::new(profile_document(), None);

    let tags = profile.sequence::<Follower>("tags").unwrap();
    assert_eq!(tags.embedded_len(), 1);
    assert_eq!(names(&tags.try_collect_all().await.unwrap()), vec!["rust"]);
}

#[tokio::test]
async fn test_embedded_then_aggregate_superset() {
    let (_, db) = seeded().await;
    let profile = DocumentWrapper::<Profile>::new(profile_document(), Some(db));

    let followers = profile.sequence::<Follower>("followers").unwrap();
    assert_eq!(followers.embedded_len(), 2);

    // embedded first, then the unwound related documents; "ann" appears twice
    let followers = followers.try_collect_all().await.unwrap();
    assert_eq!(names(&followers), vec!["ann", "bob", "cid", "ann", "dee"]);
    assert!(followers.iter().all(|follower| follower.db().is_some()));
}

#[tokio::test]
async fn test_embedded_then_find_superset() {
    let (_, db) = seeded().await;
    let account = DocumentWrapper::<Account>::new(
        doc! { "account": "acme", "watching": [{ "name": "ivy" }] },
        Some(db),
    );

    let watchers = account
        .sequence::<Follower>("watchers")
        .unwrap()
        .try_collect_all()
        .await
        .unwrap();
    assert_eq!(names(&watchers), vec!["ivy", "eve", "gus"]);
}

#[tokio::test]
async fn test_empty_embedded_array_still_queries_superset() {
    let (_, db) = seeded().await;
    let profile = DocumentWrapper::<Profile>::new(doc! { "user_id": "9", "followers": [] }, Some(db));

    let followers = profile.sequence::<Follower>("followers").unwrap();
    assert_eq!(followers.embedded_len(), 0);
    assert_eq!(names(&followers.try_collect_all().await.unwrap()), vec!["zed"]);
}

#[tokio::test]
async fn test_superset_query_is_deferred() {
    let (_, db) = seeded().await;
    let account = DocumentWrapper::<MisconfiguredAccount>::new(
        doc! { "watching": [{ "name": "ivy" }] },
        Some(db),
    );

    // the pipeline is invalid, but nothing is sent until the embedded part is drained
    let mut broken = account.sequence::<Follower>("broken").unwrap();
    let first = broken.next().await.unwrap().unwrap();
    assert_eq!(first.raw().get_str("name").unwrap(), "ivy");
    assert!(matches!(broken.next().await, Some(Err(ModelError::Backend(_)))));
}

#[tokio::test]
async fn test_sequence_errors() {
    let (_, db) = seeded().await;

    let account = DocumentWrapper::<MisconfiguredAccount>::new(doc! { "watching": [] }, Some(db));
    assert!(matches!(
        account.sequence::<Follower>("watchers"),
        Err(ModelError::QueryShape { .. })
    ));

    let detached = DocumentWrapper::<Profile>::new(profile_document(), None);
    assert!(matches!(
        detached.sequence::<Follower>("followers"),
        Err(ModelError::NoDatabase { .. })
    ));
    assert!(matches!(
        detached.sequence::<Profile>("tags"),
        Err(ModelError::ElementType { .. })
    ));
    assert!(matches!(
        detached.sequence::<Follower>("name"),
        Err(ModelError::NotSequence { .. })
    ));

    let bare = DocumentWrapper::<Profile>::new(doc! { "user_id": "4" }, None);
    assert!(matches!(
        bare.sequence::<Follower>("tags"),
        Err(ModelError::Mapping { .. })
    ));

    let scalar = DocumentWrapper::<Profile>::new(doc! { "labels": "rust" }, None);
    assert!(matches!(
        scalar.sequence::<Follower>("tags"),
        Err(ModelError::Serialization(_))
    ));
}

#[test]
fn test_blocking_iteration() {
    let (_, db) = block_on(seeded());
    let profile = DocumentWrapper::<Profile>::new(profile_document(), Some(db));

    let followers = profile
        .sequence::<Follower>("followers")
        .unwrap()
        .blocking()
        .collect::<ModelResult<Vec<_>>>()
        .unwrap();
    assert_eq!(names(&followers), vec!["ann", "bob", "cid", "ann", "dee"]);
}
