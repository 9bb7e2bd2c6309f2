use tokio_util::sync::CancellationToken;

/// The single cooperative stop flag every loop observes.
///
/// Loops only read it; the coordinator (or whoever owns the session) stops it
/// once. Stopping twice is harmless.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    token: CancellationToken,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once [`stop`](Self::stop) has been called.
    pub async fn stopped(&self) {
        self.token.cancelled().await
    }

    /// A flag that stops with this one but can also be stopped on its own.
    pub fn child(&self) -> RunState {
        RunState {
            token: self.token.child_token(),
        }
    }
}
