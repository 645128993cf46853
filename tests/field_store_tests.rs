//! Integration tests for field-level reads and writes.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use serde_json::json;

use bot_state_cache::cache::field_store::CacheError;
use bot_state_cache::cache::key::EntityKey;
use bot_state_cache::cache::ttl::Ttl;
use bot_state_cache::store::KeyValueStore;

use common::{harness, Report, DEFAULT_TTL};

#[tokio::test]
async fn test_set_field_preserves_unrelated_fields() {
    let h = harness();
    let key = EntityKey::chat(10);
    h.cache.set_field(&key, "a", 1, Ttl::Default).await.unwrap();
    h.cache.set_field(&key, "b", 2, Ttl::Default).await.unwrap();

    h.cache.set_field(&key, "a", 9, Ttl::Default).await.unwrap();

    let dict = h.cache.get_dictionary(&key).await.unwrap().unwrap();
    assert_eq!(dict.into_value(), json!({"a": 9, "b": 2}));
}

#[tokio::test]
async fn test_append_creates_sequence() {
    let h = harness();
    let user = h.cache.user(3);

    user.append_field("list", "x").await.unwrap();
    assert_eq!(user.get().await.unwrap().unwrap().into_value(), json!({"list": ["x"]}));

    user.append_field("list", "y").await.unwrap();
    assert_eq!(
        user.get().await.unwrap().unwrap().into_value(),
        json!({"list": ["x", "y"]})
    );
}

#[tokio::test]
async fn test_delete_missing_field_on_absent_entity() {
    let h = harness();
    let key = EntityKey::user(77);

    h.cache.delete_field(&key, "missing").await.unwrap();

    assert!(h.cache.get_dictionary(&key).await.unwrap().is_none());
    assert!(h.store.writes().is_empty());
    assert!(h.reporter.reports().is_empty());
}

#[tokio::test]
async fn test_delete_field_keeps_the_rest() {
    let h = harness();
    let global = h.cache.global();
    global.set_field("a", 1).await.unwrap();
    global.set_field("b", 2).await.unwrap();

    global.delete_field("a").await.unwrap();
    assert_eq!(global.get().await.unwrap().unwrap().into_value(), json!({"b": 2}));

    // Removing the last field leaves an empty dictionary behind.
    global.delete_field("b").await.unwrap();
    assert!(global.get().await.unwrap().unwrap().is_empty());
}

#[tokio::test]
async fn test_default_ttl_is_substituted() {
    let h = harness();
    h.cache.chat(1).set_field("f", "v").await.unwrap();
    assert_eq!(h.store.last_ttl(), Some(DEFAULT_TTL));

    h.cache.chat(1).append_field("l", 1).await.unwrap();
    assert_eq!(h.store.last_ttl(), Some(DEFAULT_TTL));
}

#[tokio::test]
async fn test_explicit_ttl_overrides_default() {
    let h = harness();
    let chat = h.cache.chat(1);

    chat.set_field_with_ttl("f", "v", Ttl::secs(5)).await.unwrap();
    assert_eq!(h.store.last_ttl(), Some(Duration::from_secs(5)));

    chat.set_field_with_ttl("f", "v", Ttl::Never).await.unwrap();
    assert_eq!(h.store.writes().last().unwrap().1, None);
}

#[tokio::test]
async fn test_huge_ttl_is_accepted() {
    let h = harness();
    let chat = h.cache.chat(1);

    chat.set_field_with_ttl("f", 1, Ttl::After(Duration::from_secs(u64::MAX)))
        .await
        .unwrap();
    assert_eq!(chat.get_field("f").await.unwrap(), Some(json!(1)));

    // Same through the configured default.
    h.settings.set_default_ttl(Some(Duration::from_secs(u64::MAX)));
    chat.append_field("l", 2).await.unwrap();
    assert_eq!(chat.get_field("l").await.unwrap(), Some(json!([2])));
    assert_eq!(h.store.inner.ttl_remaining("CHATDATA1").await, Some(None));
}

#[tokio::test]
async fn test_default_ttl_change_applies_to_next_write() {
    let h = harness();
    h.cache.chat(1).set_field("f", 1).await.unwrap();
    assert_eq!(h.store.last_ttl(), Some(DEFAULT_TTL));

    h.settings.set_default_ttl(Some(Duration::from_secs(30)));
    h.cache.chat(1).set_field("f", 2).await.unwrap();
    assert_eq!(h.store.last_ttl(), Some(Duration::from_secs(30)));
}

#[tokio::test(start_paused = true)]
async fn test_entity_expires_with_default_ttl() {
    let h = harness();
    let chat = h.cache.chat(8);
    chat.set_field("f", 1).await.unwrap();

    tokio::time::advance(DEFAULT_TTL - Duration::from_secs(1)).await;
    assert_eq!(chat.get_field("f").await.unwrap(), Some(json!(1)));

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(chat.get_field("f").await.unwrap(), None);
}

#[tokio::test]
async fn test_write_failure_is_reported_and_returned() {
    let h = harness();
    h.store.fail_set.store(true, Ordering::SeqCst);

    let err = h.cache.chat(4).set_field("f", 1).await.unwrap_err();
    assert!(matches!(err, CacheError::Store(_)));
    assert_eq!(h.reporter.reports(), vec![Report::Write("CHATDATA4".to_string())]);

    let err = h.cache.chat(4).append_field("l", 1).await.unwrap_err();
    assert!(matches!(err, CacheError::Store(_)));
    assert_eq!(h.reporter.reports().len(), 2);
}

#[tokio::test]
async fn test_delete_field_write_failure_is_reported_and_returned() {
    let h = harness();
    let chat = h.cache.chat(4);
    chat.set_field("a", 1).await.unwrap();
    chat.set_field("b", 2).await.unwrap();

    h.store.fail_set.store(true, Ordering::SeqCst);
    let err = chat.delete_field("a").await.unwrap_err();
    assert!(matches!(err, CacheError::Store(_)));
    assert_eq!(h.reporter.reports(), vec![Report::Write("CHATDATA4".to_string())]);

    // Nothing was removed.
    assert_eq!(chat.get_field("a").await.unwrap(), Some(json!(1)));
}

#[tokio::test]
async fn test_read_failure_aborts_mutation() {
    let h = harness();
    h.store.fail_get.store(true, Ordering::SeqCst);

    let err = h.cache.user(2).set_field("f", 1).await.unwrap_err();
    assert!(matches!(err, CacheError::Store(_)));
    assert!(h.store.writes().is_empty());
    assert_eq!(h.reporter.reports(), vec![Report::Read("USERDATA2".to_string())]);
}

#[tokio::test]
async fn test_delete_entities() {
    let h = harness();
    h.cache.chat(1).set_field("f", 1).await.unwrap();
    h.cache.user(1).set_field("f", 1).await.unwrap();
    h.cache.global().set_field("f", 1).await.unwrap();

    h.cache
        .delete_entities(&[EntityKey::chat(1), EntityKey::user(1)])
        .await
        .unwrap();

    assert!(h.cache.chat(1).get().await.unwrap().is_none());
    assert!(h.cache.user(1).get().await.unwrap().is_none());
    assert!(h.cache.global().get().await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_failure_is_reported() {
    let h = harness();
    h.store.fail_delete.store(true, Ordering::SeqCst);

    assert!(h.cache.chat(6).delete().await.is_err());
    assert_eq!(
        h.reporter.reports(),
        vec![Report::Clear(vec!["CHATDATA6".to_string()])]
    );
}

#[tokio::test]
async fn test_wipe_all() {
    let h = harness();
    h.cache.chat(1).set_field("f", 1).await.unwrap();
    h.cache.conversation(1).set_field("f", 1).await.unwrap();

    h.cache.wipe_all().await.unwrap();
    assert!(h.store.inner.is_empty().await);

    h.store.fail_clear.store(true, Ordering::SeqCst);
    assert!(h.cache.wipe_all().await.is_err());
    assert_eq!(h.reporter.reports(), vec![Report::Clear(vec![])]);
}

#[tokio::test]
async fn test_store_pass_through() {
    let h = harness();
    h.cache.store().set("raw", json!("blob"), None).await.unwrap();
    assert!(h.cache.store().has("raw").await.unwrap());
    assert_eq!(h.cache.store().get("raw").await.unwrap(), Some(json!("blob")));

    // Raw values outside the dictionary shape are reported as malformed.
    h.cache.store().set("CHATDATA2", json!([1]), None).await.unwrap();
    assert!(matches!(
        h.cache.chat(2).get().await,
        Err(CacheError::MalformedDictionary { .. })
    ));
}

#[tokio::test]
async fn test_concurrent_writes_to_different_entities() {
    let h = harness();
    let writes = (0..20).map(|i| {
        let cache = h.cache.clone();
        async move { cache.chat(i).append_field("items", i).await }
    });
    for result in futures::future::join_all(writes).await {
        result.unwrap();
    }

    for i in 0..20 {
        assert_eq!(h.cache.chat(i).get_field("items").await.unwrap(), Some(json!([i])));
    }
}
