//! Tipos de erro para o cliente da fila de jobs.
//!
//! Define [`GatewayError`] com variantes para erros da API, falhas de rede,
//! valores rejeitados antes do envio e erros de E/S ao gravar downloads.

use thiserror::Error;

/// Erros que podem ocorrer ao interagir com a fila de jobs.
///
/// - [`Api`](GatewayError::Api): o servidor respondeu com status 4xx/5xx
/// - [`Network`](GatewayError::Network): falha na camada de rede
/// - [`Validation`](GatewayError::Validation): valor rejeitado na fronteira
/// - [`Io`](GatewayError::Io): falha ao gravar o arquivo baixado
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Erro retornado pela API (ex.: 400 job fora do estado esperado, 404).
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Valor fora do intervalo aceito (ex.: progresso acima de 100).
    #[error("invalid value: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display() {
        let err = GatewayError::Api {
            status: 400,
            message: "Job must be in 'printing' status".into(),
        };
        assert_eq!(
            err.to_string(),
            "API error (status 400): Job must be in 'printing' status"
        );
    }

    #[test]
    fn validation_display() {
        let err = GatewayError::Validation("progress 120 outside 0-100".into());
        assert_eq!(err.to_string(), "invalid value: progress 120 outside 0-100");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GatewayError>();
    }
}
