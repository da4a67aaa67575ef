//! Tipos de dados trocados com a API da fila de jobs.
//!
//! Todas as structs derivam `Serialize` e `Deserialize` para conversão JSON
//! conforme o formato das rotas `/printer/jobs/*`.

use serde::{Deserialize, Serialize};

/// Um job aprovado, como devolvido pela fila.
///
/// O controlador mantém apenas uma cópia transitória durante um ciclo; a
/// fila é a dona do registro.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Identificador do job na fila.
    pub id: String,
    /// Nome original do arquivo enviado pelo usuário.
    pub filename: String,
    /// Chave do objeto no armazenamento remoto. Serializado como `tigris_key`.
    #[serde(rename = "tigris_key")]
    pub storage_key: String,
    /// Tamanho do arquivo em bytes.
    pub file_size_bytes: u64,
    /// Status do lado da fila; opaco para o controlador.
    pub status: String,
}

impl Job {
    /// Nome usado para o arquivo no cache da impressora.
    pub fn remote_filename(&self) -> String {
        format!("{}.3mf", self.id)
    }

    /// Nome do arquivo temporário local: `<id>_<filename>`.
    pub fn local_filename(&self) -> String {
        format!("{}_{}", self.id, self.filename)
    }
}

/// Resposta de `GET /printer/jobs/{id}/download`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadResponse {
    /// URL pré-assinada para baixar o arquivo do job.
    pub download_url: String,
}

/// Corpo de `POST /printer/jobs/{id}/progress`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub progress: u8,
}

/// Corpo de `POST /printer/jobs/{id}/fail`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailRequest {
    pub error_message: String,
}

/// Desfecho final reportado para um job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalOutcome {
    Success,
    Failure,
}
