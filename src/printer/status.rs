//! Printer status types and report decoding.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ControllerError;

/// Normalized printer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PrintState {
    /// Nothing loaded, ready for a job.
    #[default]
    Idle,
    /// Print in progress (including preparation and slicing).
    Running,
    /// Print paused.
    Paused,
    /// Last print finished.
    Finished,
    /// Last print failed.
    Failed,
}

impl PrintState {
    /// Parse the printer's `gcode_state` string.
    ///
    /// Preparation phases count as running; anything unrecognized is
    /// treated as idle.
    pub fn from_gcode_state(state: &str) -> Self {
        match state.trim().to_ascii_uppercase().as_str() {
            "RUNNING" | "PREPARE" | "SLICING" => Self::Running,
            "PAUSE" | "PAUSED" => Self::Paused,
            "FINISH" | "FINISHED" => Self::Finished,
            "FAILED" => Self::Failed,
            _ => Self::Idle,
        }
    }
}

impl std::fmt::Display for PrintState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrintState::Idle => write!(f, "IDLE"),
            PrintState::Running => write!(f, "RUNNING"),
            PrintState::Paused => write!(f, "PAUSE"),
            PrintState::Finished => write!(f, "FINISH"),
            PrintState::Failed => write!(f, "FAILED"),
        }
    }
}

/// One complete status snapshot. Replaced as a whole on every report.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrinterStatus {
    pub state: PrintState,
    /// Print progress (0-100).
    pub progress_percent: u8,
    pub current_layer: u32,
    pub total_layers: u32,
    pub remaining_minutes: u32,
    /// Printer error code, absent when the printer reports none.
    pub error_code: Option<String>,
}

impl PrinterStatus {
    /// Ready to take a new job.
    pub fn is_idle(&self) -> bool {
        matches!(
            self.state,
            PrintState::Idle | PrintState::Finished | PrintState::Failed
        )
    }

    pub fn is_printing(&self) -> bool {
        matches!(self.state, PrintState::Running | PrintState::Paused)
    }

    pub fn is_finished(&self) -> bool {
        self.state == PrintState::Finished
    }

    pub fn has_error(&self) -> bool {
        self.state == PrintState::Failed || self.error_code.is_some()
    }

    /// Decode a raw report payload.
    ///
    /// Returns `Ok(None)` for well-formed documents without a `print`
    /// section; those are other message kinds and are skipped.
    pub fn decode(payload: &[u8]) -> Result<Option<Self>, ControllerError> {
        let value: Value = serde_json::from_slice(payload)
            .map_err(|e| ControllerError::ProtocolDecode(e.to_string()))?;
        Ok(Self::from_report(&value))
    }

    /// Map a report document into a status. Missing fields default to
    /// zero and no error; a missing `gcode_state` reads as idle.
    pub fn from_report(payload: &Value) -> Option<Self> {
        let print = payload.get("print")?.as_object()?;

        let state = print
            .get("gcode_state")
            .and_then(Value::as_str)
            .map(PrintState::from_gcode_state)
            .unwrap_or_default();

        let progress = print.get("mc_percent").and_then(as_uint).unwrap_or(0);

        Some(Self {
            state,
            progress_percent: progress.min(100) as u8,
            current_layer: print.get("layer_num").and_then(as_u32).unwrap_or(0),
            total_layers: print.get("total_layer_num").and_then(as_u32).unwrap_or(0),
            remaining_minutes: print
                .get("mc_remaining_time")
                .and_then(as_u32)
                .unwrap_or(0),
            error_code: print.get("print_error").and_then(error_code),
        })
    }
}

// Firmware sends some numbers as strings depending on model and version.
fn as_uint(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_u32(value: &Value) -> Option<u32> {
    as_uint(value).map(|v| v.min(u32::MAX as u64) as u32)
}

// `print_error` is 0 when clear.
fn error_code(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) if n.as_u64() == Some(0) => None,
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if s.trim().is_empty() || s.trim() == "0" => None,
        Value::String(s) => Some(s.trim().to_string()),
        _ => None,
    }
}
