use tg_domain::error::Error;

/// Map a reqwest transport error into our shared error type.
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    Error::Http(e.to_string())
}

/// Build a provider error for a non-success HTTP status.
pub(crate) fn status_error(provider: &str, status: reqwest::StatusCode, body: String) -> Error {
    Error::Provider {
        provider: provider.to_string(),
        message: format!("HTTP {status}: {body}"),
    }
}
