use std::sync::{Mutex, MutexGuard};

use tokio::sync::watch;

use super::status::PrinterStatus;

/// Most-recent-wins cell for the printer status.
///
/// One writer (the status channel's receive task), any number of readers.
/// Every update replaces the whole value under the lock, so readers never
/// see a half-applied report. Observers get a single-slot
/// [`watch`] mailbox instead of a callback; a slow observer only ever
/// misses intermediate values.
pub struct StatusSnapshot {
    latest: Mutex<Option<PrinterStatus>>,
    notify: watch::Sender<Option<PrinterStatus>>,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusSnapshot {
    pub fn new() -> Self {
        let (notify, _) = watch::channel(None);
        Self {
            latest: Mutex::new(None),
            notify,
        }
    }

    fn cell(&self) -> MutexGuard<'_, Option<PrinterStatus>> {
        // A panic while holding the lock cannot leave a partial value behind.
        self.latest.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the current status and wake observers. Never blocks on them.
    pub fn publish(&self, status: PrinterStatus) {
        *self.cell() = Some(status.clone());
        self.notify.send_replace(Some(status));
    }

    /// Copy of the latest status, `None` before the first report.
    pub fn latest(&self) -> Option<PrinterStatus> {
        self.cell().clone()
    }

    /// Notification mailbox holding the latest published status.
    pub fn subscribe(&self) -> watch::Receiver<Option<PrinterStatus>> {
        self.notify.subscribe()
    }

    pub fn is_idle(&self) -> bool {
        self.cell().as_ref().is_some_and(PrinterStatus::is_idle)
    }

    pub fn is_printing(&self) -> bool {
        self.cell().as_ref().is_some_and(PrinterStatus::is_printing)
    }

    pub fn is_finished(&self) -> bool {
        self.cell().as_ref().is_some_and(PrinterStatus::is_finished)
    }

    pub fn has_error(&self) -> bool {
        self.cell().as_ref().is_some_and(PrinterStatus::has_error)
    }
}
