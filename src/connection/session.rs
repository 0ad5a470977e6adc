// src/connection/session.rs

//! Defines the settings that drive one session through login.

/// Substring markers that move the state machine forward during login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthMarkers {
    /// Seen while awaiting the login prompt.
    pub login_prompt: String,
    /// Seen while authenticating, once the credentials are accepted.
    pub auth_success: String,
    /// Seen while authenticating, if the credentials are rejected.
    pub auth_failure: String,
}

impl Default for AuthMarkers {
    fn default() -> Self {
        Self {
            login_prompt: "Connect with".to_string(),
            auth_success: "*** Connected ***".to_string(),
            auth_failure: "Either that player does not exist, or has a different password."
                .to_string(),
        }
    }
}

/// Everything the connection handler needs beyond the link itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSettings {
    pub markers: AuthMarkers,
    /// The fully rendered line written when the login prompt appears.
    pub credential_command: String,
    /// Templates written, in order, when the session becomes active. `{prefix}`,
    /// `{kwarg_delimiter}` and `{list_delimiter}` are substituted first.
    pub setup_commands: Vec<String>,
}

impl SessionSettings {
    /// Renders the credential command from a template with `{username}` and
    /// `{password}` placeholders.
    pub fn render_credentials(template: &str, username: &str, password: &str) -> String {
        template
            .replace("{username}", username)
            .replace("{password}", password)
    }
}
