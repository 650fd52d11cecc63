use crate::Error;

/// How the cluster treats a failed backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Client-side condition (bad request, forbidden, not found). Another
    /// backend would answer the same, so the error goes straight to the caller.
    Fatal,
    /// Backend, network or server trouble. The next backend may do better.
    Transient,
}

/// Classify a backend failure by its status: `200 < status < 500` is fatal,
/// anything else (including no status at all) is transient.
pub fn classify(error: &Error) -> ErrorClass {
    match error.status() {
        Some(status) if status > 200 && status < 500 => ErrorClass::Fatal,
        _ => ErrorClass::Transient,
    }
}
