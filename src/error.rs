use std::time::Duration;

use thiserror::Error;

use crate::gateway::GatewayError;

/// Process-level error taxonomy.
///
/// Only [`ControllerError::Config`] and [`ControllerError::Connection`] are
/// allowed to end the run; everything else is absorbed at the job-cycle
/// boundary.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Malformed status document: {0}")]
    ProtocolDecode(String),

    #[error("Job queue error: {0}")]
    Gateway(#[from] GatewayError),
}

/// Failures of the implicit-FTPS upload path.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("could not reach {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS handshake with {addr} failed: {source}")]
    Tls {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("server replied {code}: {text}")]
    UnexpectedReply { code: u16, text: String },

    #[error("malformed server reply: {0}")]
    MalformedReply(String),

    #[error("{0} not implemented")]
    NotImplemented(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
