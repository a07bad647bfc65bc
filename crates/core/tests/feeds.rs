use slotcast_api::*;
use slotcast_core::{
    default_builder,
    factories::{
        core_scanner::config::{CoreScannerConfig, CoreScannerModConfig},
        core_scheduler::UploadSummary,
        file_slot_store::config::{FileSlotStoreConfig, FileSlotStoreModConfig},
        AutomaticRetry, CoreReconciler, FeedCollaborators, FeedWorker,
        MemContentSource, MemNetwork, MemTransportFactory,
    },
};
use slotcast_test_utils::{
    bulletin::{file_entry, request_entry},
    enable_tracing,
};
use std::sync::Arc;

struct Peer {
    builder: Arc<Builder>,
    store: DynSlotStore,
    source: Arc<MemContentSource>,
    reconciler: Arc<CoreReconciler>,
    collab: FeedCollaborators,
}

async fn make_peer(network: &MemNetwork, dir: &tempfile::TempDir) -> Peer {
    let builder = default_builder(MemTransportFactory::with_network(
        network.clone(),
    ))
    .with_default_config()
    .unwrap();
    builder
        .config
        .set_module_config(&FileSlotStoreModConfig {
            file_slot_store: FileSlotStoreConfig {
                path: dir
                    .path()
                    .join("slots.json")
                    .to_string_lossy()
                    .into_owned(),
                ..Default::default()
            },
        })
        .unwrap();
    builder
        .config
        .set_module_config(&CoreScannerModConfig {
            core_scanner: CoreScannerConfig {
                request_delay_min_ms: 10,
                request_delay_max_ms: 20,
                ..Default::default()
            },
        })
        .unwrap();
    builder.validate_config().unwrap();
    slotcast_core::validate_worker_config(&builder.config).unwrap();
    let builder = builder.build();

    let source = MemContentSource::create();
    let reconciler = CoreReconciler::create();
    let collab = FeedCollaborators::from_builder(
        &builder,
        source.clone(),
        reconciler.clone(),
        AutomaticRetry::create(),
    )
    .await
    .unwrap();

    Peer {
        store: collab.store.clone(),
        builder,
        source,
        reconciler,
        collab,
    }
}

impl Peer {
    fn worker(&self, feed: FeedSpec) -> FeedWorker {
        FeedWorker::from_builder(&self.builder, feed, self.collab.clone())
            .unwrap()
    }
}

fn not_cancelled() -> tokio::sync::watch::Receiver<bool> {
    tokio::sync::watch::channel(false).1
}

#[tokio::test(start_paused = true)]
async fn peers_exchange_file_lists_and_requests() {
    enable_tracing();
    let network = MemNetwork::new();
    let alice_dir = tempfile::tempdir().unwrap();
    let bob_dir = tempfile::tempdir().unwrap();
    let alice = make_peer(&network, &alice_dir).await;
    let bob = make_peer(&network, &bob_dir).await;
    let today = Day::today();

    let lists = FeedSpec::file_lists(Some("alice".into()));
    let requests = FeedSpec::file_requests();

    alice.reconciler.share_file("aa");
    alice.source.enqueue(lists.feed_id, file_entry("aa"));
    bob.source.enqueue(requests.feed_id, request_entry("aa"));

    let report = alice
        .worker(lists.clone())
        .run_iteration(today, &not_cancelled())
        .await
        .unwrap();
    assert_eq!(
        Some(UploadSummary::Published { index: 0, items: 1 }),
        report.upload
    );
    bob.worker(requests.clone())
        .run_iteration(today, &not_cancelled())
        .await
        .unwrap();

    bob.worker(FeedSpec::file_lists(None))
        .run_iteration(today, &not_cancelled())
        .await
        .unwrap();
    let known = bob.reconciler.known_file("aa").unwrap();
    assert!(known.sources.contains("alice"));
    assert!(bob.reconciler.identity_last_seen("alice").is_some());

    alice
        .worker(requests)
        .run_iteration(today, &not_cancelled())
        .await
        .unwrap();
    assert!(alice.reconciler.request_last_received("aa").is_some());
}

#[tokio::test(start_paused = true)]
async fn slot_progress_survives_restart() {
    enable_tracing();
    let network = MemNetwork::new();
    let dir = tempfile::tempdir().unwrap();
    let today = Day::today();
    let feed = FeedSpec::file_requests();

    {
        let peer = make_peer(&network, &dir).await;
        peer.source.enqueue(feed.feed_id, request_entry("aa"));
        let report = peer
            .worker(feed.clone())
            .run_iteration(today, &not_cancelled())
            .await
            .unwrap();
        assert_eq!(
            Some(UploadSummary::Published { index: 0, items: 1 }),
            report.upload
        );
    }

    let peer = make_peer(&network, &dir).await;
    let slot = peer.store.get_or_create(feed.feed_id, today).await.unwrap();
    assert!(slot.is_persisted());
    assert!(slot.is_upload_slot_used(0));

    // the reopened peer never reuses index 0
    peer.source.enqueue(feed.feed_id, request_entry("bb"));
    let report = peer
        .worker(feed.clone())
        .run_iteration(today, &not_cancelled())
        .await
        .unwrap();
    assert_eq!(
        Some(UploadSummary::Published { index: 1, items: 1 }),
        report.upload
    );
    assert!(network.peek(feed.slot_name(today, 1).as_str()).is_some());
}

#[tokio::test]
async fn cleanup_keeps_the_retention_window() {
    let network = MemNetwork::new();
    let dir = tempfile::tempdir().unwrap();
    let today = Day::today();
    let days = [
        today.days_before(40),
        today.days_before(10),
        today.days_before(1),
        today,
    ];

    {
        let peer = make_peer(&network, &dir).await;
        for day in days {
            let mut slot = peer
                .store
                .get_or_create(FeedId::FILE_LISTS, day)
                .await
                .unwrap();
            slot.set_download_slot_used(0);
            peer.store.store(slot).await.unwrap();
        }
        assert_eq!(1, peer.store.cleanup(30).await.unwrap());
    }

    let peer = make_peer(&network, &dir).await;
    let kept: Vec<bool> = {
        let mut out = Vec::new();
        for day in days {
            let slot = peer
                .store
                .get_or_create(FeedId::FILE_LISTS, day)
                .await
                .unwrap();
            out.push(slot.is_download_slot_used(0));
        }
        out
    };
    assert_eq!(vec![false, true, true, true], kept);
}
