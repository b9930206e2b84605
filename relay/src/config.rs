use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://docs.google.com/forms/d/e/";
pub const DEFAULT_TOKEN_FIELD: &str = "fbzx";

const VIEW_PATH: &str = "viewform";
const SUBMIT_PATH: &str = "formResponse";

/// Constants every outbound submission carries.
const REQUIRED_CONSTANTS: [&str; 3] = ["fvv", "draftResponse", "pageHistory"];

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Listener and admin listener both bind {0}")]
    ListenerConflict(String),

    #[error("Form id cannot be empty")]
    EmptyFormId,

    #[error("Form id may only contain ASCII letters, digits, '-' and '_': {0}")]
    InvalidFormId(String),

    #[error("Token field cannot be empty")]
    EmptyTokenField,

    #[error("Relay constants cannot override the token field: {0}")]
    ReservedConstant(String),

    #[error("Relay constants must include {0}")]
    MissingConstant(&'static str),

    #[error("Base URL must be an http(s) URL ending in '/': {0}")]
    InvalidBaseUrl(String),
}

/// Relay service configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for form submissions
    pub listener: Listener,
    /// Admin listener for health and readiness checks
    pub admin_listener: Listener,
    /// The upstream form being fronted
    pub form: FormConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if self.listener == self.admin_listener {
            return Err(ValidationError::ListenerConflict(format!(
                "{}:{}",
                self.listener.host, self.listener.port
            )));
        }

        self.form.validate()
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Everything the relay needs to know about the upstream form.
///
/// Only `form_id` is required. The remaining fields default to the values the
/// hosted form backend expects and exist so tests can point the relay at a
/// local upstream.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct FormConfig {
    /// Published form identifier, the path segment after `/forms/d/e/`
    pub form_id: String,
    #[serde(default = "default_base_url")]
    pub base_url: Url,
    /// Name of the hidden input holding the per-submission token
    #[serde(default = "default_token_field")]
    pub token_field: String,
    /// Fields appended to every submission, overriding caller values.
    /// Configured entries are layered over the defaults.
    #[serde(
        default = "default_constants",
        deserialize_with = "deserialize_constants"
    )]
    pub constants: IndexMap<String, String>,
    #[serde(default = "default_follow_redirects")]
    pub follow_redirects: bool,
    /// Per-request timeout for both upstream calls. Unset means the client default.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl FormConfig {
    pub fn new(form_id: impl Into<String>) -> Self {
        Self {
            form_id: form_id.into(),
            base_url: default_base_url(),
            token_field: default_token_field(),
            constants: default_constants(),
            follow_redirects: default_follow_redirects(),
            timeout_secs: None,
        }
    }

    pub fn view_url(&self) -> Result<Url, url::ParseError> {
        self.form_url(VIEW_PATH)
    }

    pub fn submit_url(&self) -> Result<Url, url::ParseError> {
        self.form_url(SUBMIT_PATH)
    }

    fn form_url(&self, suffix: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(&format!("{}/{suffix}", self.form_id))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.form_id.is_empty() {
            return Err(ValidationError::EmptyFormId);
        }

        let valid_char = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_');
        if !self.form_id.chars().all(valid_char) {
            return Err(ValidationError::InvalidFormId(self.form_id.clone()));
        }

        if self.token_field.is_empty() {
            return Err(ValidationError::EmptyTokenField);
        }

        if self.constants.contains_key(&self.token_field) {
            return Err(ValidationError::ReservedConstant(self.token_field.clone()));
        }

        if let Some(missing) = REQUIRED_CONSTANTS
            .into_iter()
            .find(|key| !self.constants.contains_key(*key))
        {
            return Err(ValidationError::MissingConstant(missing));
        }

        let scheme_ok = matches!(self.base_url.scheme(), "http" | "https");
        if !scheme_ok || !self.base_url.path().ends_with('/') {
            return Err(ValidationError::InvalidBaseUrl(self.base_url.to_string()));
        }

        Ok(())
    }
}

fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).expect("default base url is valid")
}

fn default_token_field() -> String {
    DEFAULT_TOKEN_FIELD.to_string()
}

/// Format version, empty saved draft, and page history of a single-page form.
fn default_constants() -> IndexMap<String, String> {
    IndexMap::from([
        ("fvv".to_string(), "1".to_string()),
        ("draftResponse".to_string(), "[]".to_string()),
        ("pageHistory".to_string(), "0".to_string()),
    ])
}

fn deserialize_constants<'de, D>(deserializer: D) -> Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = IndexMap::<String, String>::deserialize(deserializer)?;
    let mut constants = default_constants();
    constants.extend(overrides);
    Ok(constants)
}

fn default_follow_redirects() -> bool {
    true
}
