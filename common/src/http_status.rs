//! HTTP status code utilities for worker response dispatch.

/// HTTP status code returned by the worker.
///
/// Stored directly on remote errors rather than parsed back out of error
/// messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpStatusCode(pub u16);

impl HttpStatusCode {
    /// The single success status the worker protocol uses.
    pub fn is_success(&self) -> bool {
        self.0 == 200
    }

    /// 4xx statuses: the worker rejected the request (bad frame, bad auth).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.0)
    }

    /// 5xx statuses: the worker itself failed while handling the request.
    pub fn is_worker_error(&self) -> bool {
        (500..600).contains(&self.0)
    }
}

impl From<u16> for HttpStatusCode {
    fn from(code: u16) -> Self {
        HttpStatusCode(code)
    }
}

impl std::fmt::Display for HttpStatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
