use super::*;

fn config(dir: &tempfile::TempDir) -> FileSlotStoreConfig {
    FileSlotStoreConfig {
        path: dir.path().join("slots.json").to_string_lossy().into_owned(),
        ..Default::default()
    }
}

fn day() -> Day {
    Day::from_ymd(2024, 3, 14).unwrap()
}

#[tokio::test]
async fn missing_journal_opens_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSlotStore::open(config(&dir)).await.unwrap();
    assert!(store.is_empty().await);

    // reads alone never create the journal
    let _ = store.get_or_create(FeedId::FILE_LISTS, day()).await.unwrap();
    assert!(!dir.path().join("slots.json").exists());
}

#[tokio::test]
async fn records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();

    {
        let store = FileSlotStore::open(config(&dir)).await.unwrap();
        let mut slot =
            store.get_or_create(FeedId::FILE_LISTS, day()).await.unwrap();
        slot.set_upload_slot_used(0);
        slot.set_upload_slot_used(1);
        slot.set_download_slot_used(5);
        slot.mark_content_seen(7);
        store.store(slot).await.unwrap();
    }

    let store = FileSlotStore::open(config(&dir)).await.unwrap();
    let slot = store.get_or_create(FeedId::FILE_LISTS, day()).await.unwrap();
    assert!(slot.is_persisted());
    assert_eq!(Some(2), slot.find_first_upload_slot());
    assert!(slot.is_download_slot_used(5));
    assert_eq!(Some(7), slot.last_content_index());

    // the temporary file was renamed away
    assert!(!dir.path().join("slots.json.tmp").exists());
}

#[tokio::test]
async fn cleanup_is_persisted() {
    let dir = tempfile::tempdir().unwrap();

    {
        let store = FileSlotStore::open(config(&dir)).await.unwrap();
        for d in [day().days_before(10), day()] {
            let mut slot =
                store.get_or_create(FeedId::FILE_LISTS, d).await.unwrap();
            slot.set_download_slot_used(0);
            store.store(slot).await.unwrap();
        }
        assert_eq!(1, store.cleanup_before(day()).await.unwrap());
    }

    let store = FileSlotStore::open(config(&dir)).await.unwrap();
    assert_eq!(1, store.len().await);
    let old = store
        .get_or_create(FeedId::FILE_LISTS, day().days_before(10))
        .await
        .unwrap();
    assert!(!old.is_persisted());
}

#[tokio::test]
async fn corrupt_journal_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("slots.json"), b"not json").unwrap();

    assert!(FileSlotStore::open(config(&dir)).await.is_err());
}

#[tokio::test]
async fn unknown_journal_version_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("slots.json"),
        br#"{"version":99,"slots":[]}"#,
    )
    .unwrap();

    assert!(FileSlotStore::open(config(&dir)).await.is_err());
}

#[tokio::test]
async fn short_bit_words_fail_to_open() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("slots.json"),
        br#"{"version":1,"slots":[{
            "feed":1,
            "day":"2024-03-14",
            "uploadUsed":{"len":1000,"words":[]},
            "downloadTried":{"len":1000,"words":[]},
            "lastContentIndex":null
        }]}"#,
    )
    .unwrap();

    let err = FileSlotStore::open(config(&dir)).await.unwrap_err();
    assert!(err.to_string().contains("corrupt slot journal"));
}

#[test]
fn empty_path_is_rejected() {
    let factory = FileSlotStoreFactory::create();
    let config = Config::default();
    factory.default_config(&config).unwrap();
    factory.validate_config(&config).unwrap();

    config
        .set_module_config(&FileSlotStoreModConfig {
            file_slot_store: FileSlotStoreConfig {
                path: String::new(),
                ..Default::default()
            },
        })
        .unwrap();
    assert!(factory.validate_config(&config).is_err());
}
