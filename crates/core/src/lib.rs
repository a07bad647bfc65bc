#![deny(missing_docs)]
//! Slotcast day-indexed slotted bulletin feeds.
//!
//! This crate drives the slot protocol described in [slotcast_api]:
//!
//! - [factories::MemSlotStore] and [factories::FileSlotStore] keep the
//!   per (feed, day) [IndexSlot] records.
//! - [factories::CoreScanner] walks the slots of one day and hands
//!   retrieved bulletins to a [ContentSink].
//! - [factories::CoreUpload] publishes pending content into the next free
//!   slot of today, verifying each insert by reading it back.
//! - [factories::FeedWorker] is the periodic loop tying both together,
//!   and [factories::FeedSupervisor] owns one worker per feed.

use slotcast_api::*;

/// Construct a production-ready default builder around the host's
/// network transport.
///
/// - `slot_store` - The default slot store is
///   [factories::FileSlotStoreFactory].
/// - `codec` - The default codec is [factories::JsonBulletinCodec].
pub fn default_builder(transport: DynTransportFactory) -> Builder {
    Builder {
        config: Config::default(),
        slot_store: factories::FileSlotStoreFactory::create(),
        transport,
        codec: factories::JsonBulletinCodec::create(),
    }
}

/// Construct a default builder for testing.
///
/// - `slot_store` - The default slot store is [factories::MemSlotStoreFactory].
/// - `transport` - The default transport is [factories::MemTransportFactory].
/// - `codec` - The default codec is [factories::JsonBulletinCodec].
pub fn default_test_builder() -> Builder {
    Builder {
        config: Config::default(),
        slot_store: factories::MemSlotStoreFactory::create(),
        transport: factories::MemTransportFactory::create(),
        codec: factories::JsonBulletinCodec::create(),
    }
}

/// Write the default configuration of the scanner, upload and scheduler
/// modules into `config`, e.g. to produce an example config file.
pub fn set_default_worker_config(config: &Config) -> CastResult<()> {
    config.set_module_config(
        &factories::core_scanner::CoreScannerModConfig::default(),
    )?;
    config.set_module_config(
        &factories::core_upload::CoreUploadModConfig::default(),
    )?;
    config.set_module_config(
        &factories::core_scheduler::CoreSchedulerModConfig::default(),
    )?;
    Ok(())
}

/// Check the scanner, upload and scheduler modules of `config`.
///
/// [Builder::validate_config] only covers the factory modules, hosts
/// call this next to it before starting any worker.
pub fn validate_worker_config(config: &Config) -> CastResult<()> {
    let (scheduler, scanner, upload) =
        factories::core_scheduler::worker_configs(config)?;
    factories::FeedWorker::validate_config(&scheduler, &scanner, &upload)
}

pub mod factories;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_config_names_every_module() {
        let builder = default_test_builder().with_default_config().unwrap();
        set_default_worker_config(&builder.config).unwrap();

        let json = serde_json::to_value(&builder.config).unwrap();
        for key in [
            "memSlotStore",
            "coreScanner",
            "coreUpload",
            "coreScheduler",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        builder.validate_config().unwrap();
        validate_worker_config(&builder.config).unwrap();
    }
}
