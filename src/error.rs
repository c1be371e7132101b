/// Console errors.
///
/// Local validation failures never reach the network; transport and
/// backend failures carry what the operator needs to see.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Field '{field}' is required")]
    FieldRequired { field: String },

    #[error("Field '{field}': {message}")]
    FieldInvalid { field: String, message: String },

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Unknown field '{field}' in resource '{resource}'")]
    UnknownField { resource: String, field: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Backend error ({status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    Backend { status: u16, detail: Option<String> },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// The backend-provided `detail` message, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Error::Backend { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// Whether the error was raised before any request was sent.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::FieldRequired { .. }
                | Error::FieldInvalid { .. }
                | Error::UnknownResource(_)
                | Error::UnknownField { .. }
        )
    }

    /// Message shown to the operator.
    ///
    /// Backend details are shown verbatim, local validation messages
    /// without the error-kind prefix, and anything else as `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        if let Some(detail) = self.detail() {
            return detail.to_string();
        }
        match self {
            Error::Validation(message) => message.clone(),
            Error::FieldRequired { field } => format!("El campo '{}' es obligatorio", field),
            Error::FieldInvalid { field, message } => format!("{}: {}", field, message),
            Error::UnknownResource(key) => format!("Recurso desconocido: {}", key),
            Error::UnknownField { resource, field } => {
                format!("Campo desconocido '{}' en {}", field, resource)
            }
            _ => fallback.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
