//! Configuração do printbridge carregada a partir de `printbridge.toml`.
//!
//! A struct [`ControllerConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis, e as variáveis
//! de ambiente (`API_URL`, `API_KEY`, `BAMBU_IP`, ...) têm precedência sobre
//! o arquivo. A struct é construída uma única vez em `main` e passada por
//! referência para cada componente.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ControllerError;
use crate::printer::ftps::DataMode;

/// Nome do arquivo de configuração procurado no diretório atual.
pub const DEFAULT_CONFIG_FILE: &str = "printbridge.toml";

/// Configuração de nível superior do controlador.
#[derive(Debug, Clone, Deserialize)]
pub struct ControllerConfig {
    /// URL base da API da fila de jobs.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Chave enviada no cabeçalho `X-API-Key`.
    #[serde(default)]
    pub api_key: String,

    /// Endereço da impressora na rede local.
    #[serde(default)]
    pub bambu_ip: String,

    /// Número de série da impressora (compõe os tópicos MQTT).
    #[serde(default)]
    pub bambu_serial: String,

    /// Código de acesso do modo LAN.
    #[serde(default)]
    pub bambu_access_code: String,

    /// Intervalo entre consultas por novos jobs.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,

    /// Intervalo mínimo entre relatórios de progresso.
    #[serde(default = "default_progress_interval")]
    pub progress_update_interval_seconds: u64,

    /// Período do laço de monitoramento.
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_seconds: u64,

    /// Diretório onde os arquivos dos jobs são baixados.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Tempo máximo para estabelecer conexões com a impressora.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Tempo máximo de espera por cada resposta durante a transferência.
    #[serde(default = "default_transfer_timeout")]
    pub transfer_timeout_seconds: u64,

    #[serde(default = "default_mqtt_port")]
    pub mqtt_port: u16,

    #[serde(default = "default_ftps_port")]
    pub ftps_port: u16,

    /// Modo do canal de dados FTP; apenas `passive` é suportado.
    #[serde(default)]
    pub ftps_data_mode: DataMode,

    /// Falha o job se a impressão não começar dentro deste prazo.
    /// Desativado quando ausente.
    #[serde(default)]
    pub start_watchdog_seconds: Option<u64>,
}

// Valor padrão para a URL da API: servidor local.
fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

// Valor padrão para o intervalo de consulta: 30s.
fn default_poll_interval() -> u64 {
    30
}

// Valor padrão para o intervalo de progresso: 10s.
fn default_progress_interval() -> u64 {
    10
}

fn default_monitor_interval() -> u64 {
    2
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("/tmp/print-jobs")
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_transfer_timeout() -> u64 {
    120
}

fn default_mqtt_port() -> u16 {
    8883
}

fn default_ftps_port() -> u16 {
    990
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: String::new(),
            bambu_ip: String::new(),
            bambu_serial: String::new(),
            bambu_access_code: String::new(),
            poll_interval_seconds: default_poll_interval(),
            progress_update_interval_seconds: default_progress_interval(),
            monitor_interval_seconds: default_monitor_interval(),
            download_dir: default_download_dir(),
            connect_timeout_seconds: default_connect_timeout(),
            transfer_timeout_seconds: default_transfer_timeout(),
            mqtt_port: default_mqtt_port(),
            ftps_port: default_ftps_port(),
            ftps_data_mode: DataMode::default(),
            start_watchdog_seconds: None,
        }
    }
}

impl ControllerConfig {
    /// Carrega a configuração do arquivo indicado (ou de `printbridge.toml`
    /// no diretório atual) e aplica as variáveis de ambiente por cima.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<ControllerConfig>(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Sobrescreve campos com os valores retornados por `lookup`.
    /// Valores vazios são ignorados.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ControllerError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("API_URL") {
            self.api_url = v;
        }
        if let Some(v) = get("API_KEY") {
            self.api_key = v;
        }
        if let Some(v) = get("BAMBU_IP") {
            self.bambu_ip = v;
        }
        if let Some(v) = get("BAMBU_SERIAL") {
            self.bambu_serial = v;
        }
        if let Some(v) = get("BAMBU_ACCESS_CODE") {
            self.bambu_access_code = v;
        }
        if let Some(v) = get("POLL_INTERVAL_SECONDS") {
            self.poll_interval_seconds = parse_seconds("POLL_INTERVAL_SECONDS", &v)?;
        }
        if let Some(v) = get("PROGRESS_UPDATE_INTERVAL_SECONDS") {
            self.progress_update_interval_seconds =
                parse_seconds("PROGRESS_UPDATE_INTERVAL_SECONDS", &v)?;
        }
        if let Some(v) = get("DOWNLOAD_DIR") {
            self.download_dir = PathBuf::from(v);
        }
        Ok(())
    }

    /// Rejeita configurações incompletas. Credenciais ausentes são fatais
    /// na inicialização.
    pub fn validate(&self) -> Result<(), ControllerError> {
        if self.api_url.trim().is_empty() {
            return Err(ControllerError::Config("API_URL not configured".into()));
        }
        if self.api_key.trim().is_empty() {
            return Err(ControllerError::Config("API_KEY not configured".into()));
        }
        self.validate_printer()?;
        let intervals = [
            ("poll_interval_seconds", self.poll_interval_seconds),
            (
                "progress_update_interval_seconds",
                self.progress_update_interval_seconds,
            ),
            ("monitor_interval_seconds", self.monitor_interval_seconds),
            ("connect_timeout_seconds", self.connect_timeout_seconds),
            ("transfer_timeout_seconds", self.transfer_timeout_seconds),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(ControllerError::Config(format!("{name} must be positive")));
            }
        }
        Ok(())
    }

    /// Verifica apenas os dados da impressora; suficiente para os
    /// subcomandos que não falam com a fila (`status`, `upload`, `stop`).
    pub fn validate_printer(&self) -> Result<(), ControllerError> {
        if self.bambu_ip.trim().is_empty()
            || self.bambu_serial.trim().is_empty()
            || self.bambu_access_code.trim().is_empty()
        {
            return Err(ControllerError::Config(
                "printer configuration incomplete (BAMBU_IP, BAMBU_SERIAL, BAMBU_ACCESS_CODE)"
                    .into(),
            ));
        }
        if self.connect_timeout_seconds == 0 || self.transfer_timeout_seconds == 0 {
            return Err(ControllerError::Config(
                "printer timeouts must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn progress_update_interval(&self) -> Duration {
        Duration::from_secs(self.progress_update_interval_seconds)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_seconds)
    }

    pub fn start_watchdog(&self) -> Option<Duration> {
        self.start_watchdog_seconds.map(Duration::from_secs)
    }
}

fn parse_seconds(key: &str, value: &str) -> Result<u64, ControllerError> {
    value
        .trim()
        .parse()
        .map_err(|_| ControllerError::Config(format!("{key} must be a whole number of seconds")))
}
