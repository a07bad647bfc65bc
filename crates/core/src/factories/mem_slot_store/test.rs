use super::*;

fn store() -> MemSlotStore {
    MemSlotStore::new(MemSlotStoreConfig::default())
}

fn day() -> Day {
    Day::from_ymd(2024, 3, 14).unwrap()
}

#[tokio::test]
async fn unknown_record_is_transient() {
    let store = store();

    let slot = store.get_or_create(FeedId::FILE_LISTS, day()).await.unwrap();
    assert!(!slot.is_persisted());
    assert_eq!(Some(0), slot.find_first_upload_slot());
    assert_eq!(DEFAULT_SLOT_CAPACITY, slot.capacity());

    // looking it up does not insert it
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn stored_record_round_trips() {
    let store = store();

    let mut slot =
        store.get_or_create(FeedId::FILE_LISTS, day()).await.unwrap();
    slot.set_upload_slot_used(0);
    slot.set_download_slot_used(3);
    store.store(slot).await.unwrap();

    let slot = store.get_or_create(FeedId::FILE_LISTS, day()).await.unwrap();
    assert!(slot.is_persisted());
    assert!(!slot.is_dirty());
    assert!(slot.is_upload_slot_used(0));
    assert!(slot.is_download_slot_used(3));
    assert_eq!(Some(1), slot.find_first_upload_slot());

    // other feeds and days are unaffected
    let other = store
        .get_or_create(FeedId::FILE_REQUESTS, day())
        .await
        .unwrap();
    assert!(!other.is_persisted());
    let other = store
        .get_or_create(FeedId::FILE_LISTS, day().days_after(1))
        .await
        .unwrap();
    assert!(!other.is_persisted());
}

#[tokio::test]
async fn stale_view_cannot_clear_bits() {
    let store = store();

    let mut a = store.get_or_create(FeedId::FILE_LISTS, day()).await.unwrap();
    let mut b = a.clone();

    a.set_upload_slot_used(0);
    store.store(a).await.unwrap();

    b.set_upload_slot_used(1);
    store.store(b).await.unwrap();

    let slot = store.get_or_create(FeedId::FILE_LISTS, day()).await.unwrap();
    assert!(slot.is_upload_slot_used(0));
    assert!(slot.is_upload_slot_used(1));
    assert_eq!(Some(2), slot.find_first_upload_slot());
    assert_eq!(1, store.len().await);
}

#[tokio::test]
async fn cleanup_removes_only_days_past_the_horizon() {
    let store = store();
    let today = Day::today();

    for back in [40, 31, 30, 10, 1, 0] {
        let mut slot = store
            .get_or_create(FeedId::FILE_LISTS, today.days_before(back))
            .await
            .unwrap();
        slot.set_download_slot_used(0);
        store.store(slot).await.unwrap();
    }

    // horizon is today - 31, only days strictly before it go
    assert_eq!(1, store.cleanup(30).await.unwrap());
    assert_eq!(5, store.len().await);

    for back in [31, 30, 10, 1, 0] {
        let slot = store
            .get_or_create(FeedId::FILE_LISTS, today.days_before(back))
            .await
            .unwrap();
        assert!(slot.is_persisted(), "day -{back} was removed");
    }

    // nothing left to remove
    assert_eq!(0, store.cleanup(30).await.unwrap());
}

#[tokio::test]
async fn cleanup_before_spans_feeds() {
    let store = store();

    for feed in [FeedId::FILE_LISTS, FeedId::FILE_REQUESTS, FeedId(7)] {
        let mut slot = store.get_or_create(feed, day()).await.unwrap();
        slot.set_upload_slot_used(0);
        store.store(slot).await.unwrap();
    }

    assert_eq!(0, store.cleanup_before(day()).await.unwrap());
    assert_eq!(3, store.cleanup_before(day().days_after(1)).await.unwrap());
    assert!(store.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn writer_gets_busy_when_lock_is_held() {
    let store = store();
    let _guard = store.inner.write().await;

    let mut slot = IndexSlot::new(FeedId::FILE_LISTS, day());
    slot.set_upload_slot_used(0);
    let err = store.store(slot).await.unwrap_err();
    assert!(err.is_busy());

    let err = store.cleanup(30).await.unwrap_err();
    assert!(err.is_busy());
}

#[tokio::test(start_paused = true)]
async fn reader_gets_disposable_slot_when_lock_is_held() {
    let store = store();
    {
        let mut slot = IndexSlot::new(FeedId::FILE_LISTS, day());
        slot.set_upload_slot_used(0);
        store.store(slot).await.unwrap();
    }

    let _guard = store.inner.write().await;
    let slot = store.get_or_create(FeedId::FILE_LISTS, day()).await.unwrap();
    assert!(!slot.is_persisted());
    assert!(!slot.is_upload_slot_used(0));
}

#[tokio::test]
async fn capacity_mismatch_is_rejected() {
    let store = store();

    let mut slot = IndexSlot::new(FeedId::FILE_LISTS, day());
    slot.set_upload_slot_used(0);
    store.store(slot).await.unwrap();

    let mut small = IndexSlot::with_capacity(FeedId::FILE_LISTS, day(), 10);
    small.set_upload_slot_used(1);
    assert!(store.store(small).await.is_err());
}

#[test]
fn config_validation() {
    let factory = MemSlotStoreFactory::create();
    let config = Config::default();
    factory.default_config(&config).unwrap();
    factory.validate_config(&config).unwrap();

    config
        .set_module_config(&MemSlotStoreModConfig {
            mem_slot_store: MemSlotStoreConfig {
                lock_timeout_ms: 0,
                ..Default::default()
            },
        })
        .unwrap();
    assert!(factory.validate_config(&config).is_err());
}

#[tokio::test]
async fn factory_applies_configured_capacity() {
    let builder = crate::default_test_builder();
    builder
        .config
        .set_module_config(&MemSlotStoreModConfig {
            mem_slot_store: MemSlotStoreConfig {
                slot_capacity: 4,
                ..Default::default()
            },
        })
        .unwrap();
    let builder = builder.build();

    let store = builder.slot_store.create(builder.clone()).await.unwrap();
    let slot = store.get_or_create(FeedId::FILE_LISTS, day()).await.unwrap();
    assert_eq!(4, slot.capacity());
}
