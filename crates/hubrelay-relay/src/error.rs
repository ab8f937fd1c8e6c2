//! Relay error types.

use axum::http::StatusCode;

/// Failures of the trust bootstrap. All of them abort relay start-up.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Device hub unreachable: {0}")]
    PeerUnreachable(String),

    #[error("Device hub identity malformed: {0}")]
    PeerIdentityMalformed(String),

    #[error("Device hub rejected key registration ({status}): {message}")]
    RegistrationRejected { status: u16, message: String },

    #[error("Secure client construction failed: {0}")]
    ClientConstruction(String),
}

impl BootstrapError {
    /// Only transport failures are worth another attempt.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::PeerUnreachable(_))
    }
}

/// Per-request failures. Each one is rendered as a response to the caller.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("{message}")]
    BodyParse { status: StatusCode, message: String },

    #[error("Relay to device hub failed: {0}")]
    PeerCall(String),
}

impl RelayError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BodyParse { status, .. } => *status,
            Self::PeerCall(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Errors building TLS-enabled HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum TlsSetupError {
    #[error("TLS configuration error")]
    Tls(#[from] rustls::Error),

    #[error("HTTP client error")]
    Http(#[from] reqwest::Error),
}

impl From<TlsSetupError> for BootstrapError {
    fn from(e: TlsSetupError) -> Self {
        Self::ClientConstruction(error_chain(&e))
    }
}

/// Errors that stop the relay from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] hubrelay_core::Error),

    #[error("Credential store error")]
    Credentials(#[from] hubrelay_crypto::CryptoError),

    #[error("Trust bootstrap failed")]
    Bootstrap(#[from] BootstrapError),

    #[error(transparent)]
    Tls(#[from] TlsSetupError),

    #[error("Listener error")]
    Io(#[from] std::io::Error),
}

/// Render an error with its `source()` chain, outermost first.
pub fn error_chain(e: &dyn std::error::Error) -> String {
    let mut rendered = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
