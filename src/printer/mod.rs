//! Printer side of the bridge: status channel, file transfer and the
//! shared status snapshot.

pub mod commands;
pub mod ftps;
pub mod mqtt;
pub mod snapshot;
pub mod status;
pub mod tls;

use std::path::Path;

pub use ftps::{FtpsClient, FtpsOptions};
pub use mqtt::{SessionState, StatusChannel, StatusChannelConfig};
pub use status::{PrintState, PrinterStatus};

use crate::config::ControllerConfig;
use crate::error::ControllerError;

/// Fixed LAN-mode username for both the broker and the FTPS server.
pub const LAN_USERNAME: &str = "bblp";

/// What the orchestrator needs from a printer.
#[allow(async_fn_in_trait)]
pub trait PrinterLink {
    /// Latest status snapshot, `None` before the first report.
    fn status(&self) -> Option<PrinterStatus>;

    fn session_state(&self) -> SessionState;

    /// Ready for a new job; false before the first report.
    fn is_idle(&self) -> bool {
        self.status().is_some_and(|s| s.is_idle())
    }

    /// Upload a file into the printer's cache directory. Faults are logged
    /// and reported as `false`.
    async fn upload(&self, local_path: &Path, remote_filename: &str) -> bool;

    /// Fire-and-forget start of a cached file.
    async fn start_print(&self, remote_filename: &str) -> Result<(), ControllerError>;
}

/// A Bambu printer reached over LAN mode.
pub struct BambuPrinter {
    channel: StatusChannel,
    files: FtpsClient,
}

impl BambuPrinter {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            channel: StatusChannel::new(StatusChannelConfig::from_config(config)),
            files: FtpsClient::new(FtpsOptions::from_config(config)),
        }
    }

    pub fn channel(&self) -> &StatusChannel {
        &self.channel
    }
}

impl PrinterLink for BambuPrinter {
    fn status(&self) -> Option<PrinterStatus> {
        self.channel.snapshot().latest()
    }

    fn session_state(&self) -> SessionState {
        self.channel.session_state()
    }

    fn is_idle(&self) -> bool {
        self.channel.snapshot().is_idle()
    }

    async fn upload(&self, local_path: &Path, remote_filename: &str) -> bool {
        self.files.upload(local_path, remote_filename).await
    }

    async fn start_print(&self, remote_filename: &str) -> Result<(), ControllerError> {
        self.channel.start_print(remote_filename).await
    }
}
