// Request context handed down from the serving layer

use tokio_util::sync::CancellationToken;

/// Per-call context: who is acting, and when to give up.
#[derive(Debug, Clone)]
pub struct RequestContext {
    username: Option<String>,
    cancel: CancellationToken,
}

impl RequestContext {
    /// Anonymous context with its own cancellation root
    pub fn new() -> Self {
        Self {
            username: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Context for an authenticated user
    pub fn for_user(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            cancel: CancellationToken::new(),
        }
    }

    /// Attach an existing cancellation token, e.g. the process shutdown token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Acting username, empty when the request is unauthenticated
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or("")
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Derive a context that is cancelled with this one, but whose own
    /// cancellation does not reach back to the parent.
    pub fn child(&self) -> Self {
        Self {
            username: self.username.clone(),
            cancel: self.cancel.child_token(),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
