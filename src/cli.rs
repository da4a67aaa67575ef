//! Interface de linha de comando do printbridge baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, status, upload,
//! stop) e flags globais (--config, --verbose, --progress).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// printbridge: leva jobs aprovados da fila até a impressora no modo LAN.
#[derive(Debug, Parser)]
#[command(name = "printbridge", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Arquivo de configuração (padrão: `printbridge.toml`).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Mostra uma barra de progresso alimentada pelo status da impressora.
    #[arg(long, global = true, default_value_t = false)]
    pub progress: bool,
}

impl Cli {
    /// Subcomando escolhido; `run` quando nenhum é informado.
    pub fn selected_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Executa o laço de controle até receber um sinal de encerramento.
    Run,

    /// Conecta, aguarda o primeiro status da impressora e o exibe.
    Status,

    /// Envia um arquivo para o cache da impressora via FTPS implícito.
    Upload {
        /// Arquivo local a enviar.
        path: PathBuf,

        /// Nome do arquivo na impressora (padrão: nome do arquivo local).
        #[arg(long)]
        name: Option<String>,
    },

    /// Publica o comando de parada da impressão atual.
    Stop,
}
