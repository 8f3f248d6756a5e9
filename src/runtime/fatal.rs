use crate::scanner::error::ScanError;
use anyhow::Error as AnyError;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;

/// First terminal failure of a scanner run, tagged with the stage that
/// produced it. Cheap to clone so every observer sees the same error.
#[derive(Clone)]
pub struct FatalError {
    stage: &'static str,
    source: Arc<AnyError>,
}

impl FatalError {
    pub fn stage(&self) -> &'static str {
        self.stage
    }
}

impl fmt::Debug for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FatalError")
            .field("stage", &self.stage)
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.source.as_ref(), f)
    }
}

impl std::error::Error for FatalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().source()
    }
}

/// Records the first terminal scanner error and cancels the run.
///
/// Both the run token and the root token are cancelled, so a [`Runner`]
/// waiting on the root wakes up as soon as the scanner dies.
///
/// [`Runner`]: crate::runtime::runner::Runner
#[derive(Clone)]
pub struct FatalErrorHandler {
    inner: Arc<FatalState>,
}

struct FatalState {
    first: OnceLock<FatalError>,
    root_shutdown: CancellationToken,
    run_shutdown: CancellationToken,
}

impl FatalErrorHandler {
    pub fn new(root_shutdown: CancellationToken, run_shutdown: CancellationToken) -> Self {
        Self {
            inner: Arc::new(FatalState {
                first: OnceLock::new(),
                root_shutdown,
                run_shutdown,
            }),
        }
    }

    pub fn trigger(&self, error: ScanError) -> AnyError {
        let stage = error.stage();
        self.record(stage, error.into())
    }

    /// Records a failure that did not come out of a scan iteration, such as
    /// the scanner task itself panicking.
    pub fn trigger_external(&self, context: &'static str, error: AnyError) -> AnyError {
        self.record(context, error)
    }

    fn record(&self, stage: &'static str, error: AnyError) -> AnyError {
        let fatal = FatalError {
            stage,
            source: Arc::new(error),
        };

        if self.inner.first.set(fatal.clone()).is_ok() {
            tracing::error!(stage, error = format!("{fatal:#}"), "fatal scanner error; initiating shutdown");
            self.inner.run_shutdown.cancel();
            self.inner.root_shutdown.cancel();
        } else {
            tracing::debug!(stage, error = format!("{fatal:#}"), "further scanner error after shutdown began");
        }

        fatal.into()
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.first.get().is_some()
    }

    /// Stage of the captured error, if any.
    pub fn stage(&self) -> Option<&'static str> {
        self.inner.first.get().map(FatalError::stage)
    }

    pub fn error(&self) -> Option<AnyError> {
        self.inner.first.get().cloned().map(AnyError::from)
    }
}
