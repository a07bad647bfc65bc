//! Builder-related types.

use crate::*;
use std::sync::Arc;

/// The general slotcast builder.
/// This contains both configuration and factory instances,
/// allowing construction of runtime module instances.
#[derive(Debug)]
pub struct Builder {
    /// The module configuration to be used when building modules.
    /// This can be loaded from disk or modified before freezing the builder.
    pub config: Config,

    /// The [SlotStoreFactory] to be used for creating the [SlotStore].
    pub slot_store: DynSlotStoreFactory,

    /// The [TransportFactory] to be used for creating the [Transport].
    pub transport: DynTransportFactory,

    /// The [BulletinCodec] used to encode and decode bulletins.
    pub codec: DynBulletinCodec,
}

impl Builder {
    /// Construct a default config given the configured module factories.
    /// Note, this should be called before freezing the Builder instance
    /// in an Arc<>.
    pub fn with_default_config(self) -> CastResult<Self> {
        {
            let Self {
                config,
                slot_store,
                transport,
                codec: _,
            } = &self;

            slot_store.default_config(config)?;
            transport.default_config(config)?;
        }

        Ok(self)
    }

    /// Validate the current configuration.
    pub fn validate_config(&self) -> CastResult<()> {
        self.slot_store.validate_config(&self.config)?;
        self.transport.validate_config(&self.config)?;

        Ok(())
    }

    /// Freeze this builder so module factories can share it.
    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }
}
