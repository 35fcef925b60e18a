use crate::config::Config;
use crate::error::ConnectionError;

/// Builds `{ws|wss}://{host}{path}/{session_id}`.
pub fn build_url(config: &Config, session_id: &str) -> Result<String, ConnectionError> {
    if session_id.is_empty()
        || !session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConnectionError::InvalidEndpoint(format!(
            "session id {:?} is not url-safe",
            session_id
        )));
    }
    if config.host().is_empty() {
        return Err(ConnectionError::InvalidEndpoint("empty host".to_string()));
    }
    let scheme = if config.secure() { "wss" } else { "ws" };
    Ok(format!(
        "{}://{}{}/{}",
        scheme,
        config.host(),
        config.path(),
        session_id
    ))
}
