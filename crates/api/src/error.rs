//! Slotcast error types.
//!
//! Network results are not errors, see [crate::DownloadOutcome] and
//! [crate::UploadOutcome]. What is left is storage, codec and
//! configuration failures, plus lock contention in a [crate::SlotStore].

use std::sync::Arc;

/// The lower level error a [CastError] was raised from, if any.
///
/// Shared behind an [Arc] so [CastError] stays `Clone`.
#[derive(Clone, Default)]
pub struct Cause(Option<Arc<dyn std::error::Error + Send + Sync>>);

impl Cause {
    /// Wrap a lower level error.
    pub fn new<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
        Self(Some(Arc::new(e)))
    }

    /// True if there is no lower level error.
    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }
}

impl std::fmt::Debug for Cause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            None => f.write_str("-"),
            Some(e) => write!(f, "{e:?}"),
        }
    }
}

// Renders as ": <cause>" so a missing cause leaves no trace in messages.
impl std::fmt::Display for Cause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            None => Ok(()),
            Some(e) => write!(f, ": {e}"),
        }
    }
}

impl std::error::Error for Cause {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let e: &(dyn std::error::Error + 'static) = self.0.as_deref()?;
        Some(e)
    }
}

/// The error type of every fallible slotcast api.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CastError {
    /// Anything that is not lock contention: a corrupt journal, a bad
    /// config value, an undecodable bulletin.
    #[error("{ctx}{cause}")]
    Other {
        /// What was being attempted.
        ctx: Arc<str>,

        /// Why it failed.
        #[source]
        cause: Cause,
    },

    /// A store lock could not be acquired in time. Nothing was written,
    /// the next cycle tries again.
    #[error("busy: {ctx}")]
    Busy {
        /// What was being attempted.
        ctx: Arc<str>,
    },
}

impl CastError {
    /// An [CastError::Other] caused by `src`.
    pub fn other_src<C, S>(ctx: C, src: S) -> Self
    where
        C: std::fmt::Display,
        S: std::error::Error + Send + Sync + 'static,
    {
        Self::Other {
            ctx: ctx.to_string().into(),
            cause: Cause::new(src),
        }
    }

    /// An [CastError::Other] without a lower level cause.
    pub fn other<C: std::fmt::Display>(ctx: C) -> Self {
        Self::Other {
            ctx: ctx.to_string().into(),
            cause: Cause::default(),
        }
    }

    /// A [CastError::Busy].
    pub fn busy<C: std::fmt::Display>(ctx: C) -> Self {
        Self::Busy {
            ctx: ctx.to_string().into(),
        }
    }

    /// True for lock contention, which callers retry instead of failing.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }
}

/// Result with a [CastError].
pub type CastResult<T> = Result<T, CastError>;

#[cfg(test)]
mod test {
    use super::*;
    use std::error::Error;

    #[test]
    fn message_omits_a_missing_cause() {
        let err = CastError::other("maxTries must be greater than 0");
        assert_eq!("maxTries must be greater than 0", err.to_string());
        let CastError::Other { cause, .. } = &err else {
            panic!("expected other, got {err:?}");
        };
        assert!(cause.is_none());
        assert!(err.source().and_then(|c| c.source()).is_none());
    }

    #[test]
    fn journal_decode_failure_keeps_its_cause() {
        let decode = serde_json::from_str::<u32>("nope").unwrap_err();
        let expect = format!("corrupt slot journal: {decode}");
        let err = CastError::other_src("corrupt slot journal", decode);
        assert_eq!(expect, err.to_string());

        let cause = err.source().unwrap();
        assert!(cause.source().unwrap().is::<serde_json::Error>());
    }

    #[test]
    fn lock_contention_is_retryable() {
        let err = CastError::busy("store 1/2024.3.14");
        assert_eq!("busy: store 1/2024.3.14", err.to_string());
        assert!(err.is_busy());
        assert!(err.source().is_none());

        let io = std::io::Error::from(std::io::ErrorKind::WouldBlock);
        assert!(!CastError::other_src("write journal", io).is_busy());
    }

    #[test]
    fn errors_cross_task_boundaries() {
        let err = CastError::other("x");
        let handle = std::thread::spawn({
            let err = err.clone();
            move || err.to_string()
        });
        assert_eq!(err.to_string(), handle.join().unwrap());
    }
}
