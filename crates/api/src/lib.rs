#![deny(missing_docs)]
//! Slotcast API contains the collaborator traits and the basic types
//! required to define the day-indexed slotted bulletin protocol.
//!
//! A feed publishes bulletins into a bounded sequence of numbered slots
//! per calendar day. Nothing coordinates publishers, so every participant
//! tracks which slots it has used for upload and which it has tried for
//! download in an [IndexSlot] record kept in a [SlotStore].
//!
//! If you want to run the protocol itself, please see the slotcast_core
//! crate.

/// Boxed future type.
pub type BoxFut<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

mod error;
pub use error::*;

mod timestamp;
pub use timestamp::*;

pub mod builder;
pub use builder::*;

pub mod config;
pub use config::*;

pub mod feed;
pub use feed::*;

pub mod slot;
pub use slot::*;

pub mod slot_store;
pub use slot_store::*;

pub mod outcome;
pub use outcome::*;

pub mod bulletin;
pub use bulletin::*;

pub mod content;
pub use content::*;

pub mod transport;
pub use transport::*;
