//! Backend error classification.
//!
//! The backend has no structured code that separates "this directory needs a
//! password" from "this path does not exist": a protected directory listed
//! without credentials often answers with the same generic not-found text as a
//! missing one. These functions sort messages by wording only and never touch
//! the network.

/// Coarse class of a backend error message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Wording explicitly asks for (or rejects) a password
    AuthRequired,
    /// Generic not-found wording: missing path or protected without credentials
    AmbiguousNotFoundOrProtected,
    Other,
}

const PASSWORD_QUALIFIERS: &[&str] = &["incorrect", "permission", "required", "denied", "unauthorized"];
const AMBIGUOUS_MARKERS: &[&str] = &["object not found", "failed get dir"];

/// Classify a raw backend message
pub fn classify(message: &str) -> ErrorClass {
    let lower = message.to_lowercase();
    let mentions_password = lower.contains("password");

    if mentions_password && PASSWORD_QUALIFIERS.iter().any(|q| lower.contains(q)) {
        return ErrorClass::AuthRequired;
    }
    if !mentions_password && AMBIGUOUS_MARKERS.iter().any(|m| lower.contains(m)) {
        return ErrorClass::AmbiguousNotFoundOrProtected;
    }
    ErrorClass::Other
}

/// Classify a message for a path, given whether a password is cached for it.
///
/// A path that once unlocked with a cached password exists, so a generic
/// not-found answer for it means the password stopped working.
pub fn classify_for_path(message: &str, has_cached_password: bool) -> ErrorClass {
    match classify(message) {
        ErrorClass::AmbiguousNotFoundOrProtected if has_cached_password => ErrorClass::AuthRequired,
        class => class,
    }
}
