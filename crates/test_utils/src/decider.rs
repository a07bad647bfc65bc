//! A test upload failure decider.

use slotcast_api::*;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// An [UploadFailureDecider] answering from a script.
///
/// Once the script runs out it answers with the fallback decision.
#[derive(Debug)]
pub struct ScriptedDecider {
    script: Mutex<VecDeque<FailureDecision>>,
    fallback: FailureDecision,
    asked: Mutex<Vec<UploadFailure>>,
}

impl ScriptedDecider {
    /// A decider that always answers `decision`.
    pub fn always(decision: FailureDecision) -> Arc<Self> {
        Self::script(Vec::new(), decision)
    }

    /// A decider that answers `script` in order, then `fallback`.
    pub fn script(
        script: Vec<FailureDecision>,
        fallback: FailureDecision,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            asked: Mutex::new(Vec::new()),
        })
    }

    /// The failures this decider was asked about.
    pub fn asked(&self) -> Vec<UploadFailure> {
        self.asked.lock().unwrap().clone()
    }
}

impl UploadFailureDecider for ScriptedDecider {
    fn decide(
        &self,
        _feed: &FeedSpec,
        failure: &UploadFailure,
        _items: &[PendingItem],
    ) -> BoxFut<'_, FailureDecision> {
        self.asked.lock().unwrap().push(failure.clone());
        let decision = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);
        Box::pin(async move { decision })
    }
}
