//! Tracing helpers.

/// Standardized span constructors for connection observability.
pub mod spans {
    use tracing::{Span, info_span};

    /// Span covering a connection's reader task.
    pub fn connection(protocol: &str, endpoint: &str, generation: u64) -> Span {
        info_span!("connection", protocol = %protocol, endpoint = %endpoint, generation)
    }

    /// Span covering a heartbeat monitor.
    pub fn heartbeat(protocol: &str) -> Span {
        info_span!("heartbeat", protocol = %protocol)
    }

    /// Span for a client session as seen by the binary.
    pub fn session(kind: &str, target: Option<&str>) -> Span {
        if let Some(target) = target {
            info_span!("session", kind = %kind, target = %target)
        } else {
            info_span!("session", kind = %kind)
        }
    }
}

/// Render a token for logs without leaking it.
pub fn redact(token: &str) -> String {
    let bare = token.strip_prefix("oauth:").unwrap_or(token);
    match bare.chars().count() {
        0 => String::new(),
        n if n <= 4 => "*".repeat(n),
        n => {
            let head: String = bare.chars().take(2).collect();
            format!("{}{}", head, "*".repeat(n - 2))
        }
    }
}
