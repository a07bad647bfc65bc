//! Factories for generating instances of slotcast modules.

pub mod mem_slot_store;
pub use mem_slot_store::{MemSlotStore, MemSlotStoreFactory};

pub mod file_slot_store;
pub use file_slot_store::{FileSlotStore, FileSlotStoreFactory};

mod mem_transport;
pub use mem_transport::*;

mod json_codec;
pub use json_codec::*;

mod mem_content_source;
pub use mem_content_source::*;

pub mod core_reconciler;
pub use core_reconciler::CoreReconciler;

pub mod core_scanner;
pub use core_scanner::CoreScanner;

pub mod core_upload;
pub use core_upload::{AutomaticRetry, CoreUpload};

pub mod core_scheduler;
pub use core_scheduler::{FeedCollaborators, FeedSupervisor, FeedWorker};
