//! Veryfi credential checks
//!
//! The server authenticates with a client id plus an `apikey <username>:<key>`
//! authorization header. All three values must be present and non-blank
//! before any request is sent.


use std::fmt;

use crate::{Result, VeryfiError};

pub const CLIENT_ID_VAR: &str = "VERYFI_CLIENT_ID";
pub const USERNAME_VAR: &str = "VERYFI_USERNAME";
pub const API_KEY_VAR: &str = "VERYFI_API_KEY";

pub const REQUIRED_VARS: [&str; 3] = [CLIENT_ID_VAR, USERNAME_VAR, API_KEY_VAR];

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: Option<String>,
    pub username: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStatus {
    Set,
    Empty,
    Missing,
}

/// Header values for an authenticated Veryfi request.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthHeaders {
    pub client_id: String,
    pub authorization: String,
}

impl CredentialStatus {
    fn of(value: Option<&str>) -> Self {
        match value {
            None => Self::Missing,
            Some(v) if v.trim().is_empty() => Self::Empty,
            Some(_) => Self::Set,
        }
    }

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Empty => "set but empty",
            Self::Missing => "not found",
        }
    }
}

impl Credentials {
    #[inline]
    pub fn new(
        client_id: impl Into<String>,
        username: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client_id: Some(client_id.into()),
            username: Some(username.into()),
            api_key: Some(api_key.into()),
        }
    }

    #[inline]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            client_id: lookup(CLIENT_ID_VAR),
            username: lookup(USERNAME_VAR),
            api_key: lookup(API_KEY_VAR),
        }
    }

    /// Status of every required variable, in a fixed order.
    #[inline]
    pub fn status(&self) -> [(&'static str, CredentialStatus); 3] {
        [
            (CLIENT_ID_VAR, CredentialStatus::of(self.client_id.as_deref())),
            (USERNAME_VAR, CredentialStatus::of(self.username.as_deref())),
            (API_KEY_VAR, CredentialStatus::of(self.api_key.as_deref())),
        ]
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.status()
            .iter()
            .all(|(_, status)| *status == CredentialStatus::Set)
    }

    /// Returns `None` when every credential is usable, otherwise a Markdown
    /// diagnostic naming the missing and empty variables followed by setup
    /// instructions.
    #[inline]
    pub fn diagnose(&self) -> Option<String> {
        let status = self.status();
        let missing = status
            .iter()
            .filter(|(_, s)| *s == CredentialStatus::Missing)
            .map(|(name, _)| *name);
        let empty = status
            .iter()
            .filter(|(_, s)| *s == CredentialStatus::Empty)
            .map(|(name, _)| *name);

        let mut listed: Vec<String> = missing
            .map(|name| format!("• **{name}** - Not found in environment"))
            .collect();
        listed.extend(empty.map(|name| format!("• **{name}** - Set but empty")));

        if listed.is_empty() {
            return None;
        }

        let mut lines = vec![
            "## Missing Veryfi Credentials".to_string(),
            String::new(),
            "The following environment variables are required but not properly set:".to_string(),
            String::new(),
        ];
        lines.extend(listed);
        lines.push(String::new());
        lines.push(DIAGNOSTIC_HELP.trim().to_string());
        lines.push(String::new());
        lines.push("```".to_string());
        lines.extend(
            REQUIRED_VARS
                .iter()
                .zip(["your-client-id-here", "your-username-here", "your-api-key-here"])
                .map(|(name, placeholder)| format!("{name}=\"{placeholder}\"")),
        );
        lines.push("```".to_string());

        Some(lines.join("\n"))
    }

    /// Header values for an authenticated request, or the diagnostic as a
    /// [`VeryfiError::Credentials`] error.
    #[inline]
    pub fn authorize(&self) -> Result<AuthHeaders> {
        let usable = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        match (
            usable(self.client_id.as_deref()),
            usable(self.username.as_deref()),
            usable(self.api_key.as_deref()),
        ) {
            (Some(client_id), Some(username), Some(api_key)) => Ok(AuthHeaders {
                client_id,
                authorization: format!("apikey {username}:{api_key}"),
            }),
            _ => Err(VeryfiError::Credentials(self.diagnose().unwrap_or_default())),
        }
    }
}

const DIAGNOSTIC_HELP: &str = r"
### Debug your current environment

Run `veryfi-mcp check` from the same shell or agent session to see which of
these variables the server can see.

### How to fix this

These values can be found in the Veryfi Hub. Sign in at https://app.veryfi.com,
then navigate to https://app.veryfi.com/api/settings/keys/

#### How environment variables are resolved

veryfi-mcp reads a `.env` file from its working directory, or from the nearest
ancestor folder containing one. Variables already present in the process
environment take precedence over the `.env` file.

Your AI agent's MCP server settings (for example `~/.claude.json`) are passed to
the server as process environment, so they override both your shell and the
`.env` file. Since you will likely want the same credentials when calling
Veryfi from your own code, prefer a `.env` file or your shell profile over the
agent settings.

If you set the variables in `.zprofile` or `.bashrc`, quit and restart your
editor, or start a new session of your CLI agent, so the server inherits them.

A `.env` file looks like this:
";

// Never print secret values.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.status();
        f.debug_struct("Credentials")
            .field("client_id", &status[0].1)
            .field("username", &status[1].1)
            .field("api_key", &status[2].1)
            .finish()
    }
}

impl fmt::Debug for AuthHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthHeaders")
            .field("client_id", &self.client_id)
            .field("authorization", &"apikey <redacted>")
            .finish()
    }
}
