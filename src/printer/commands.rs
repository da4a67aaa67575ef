//! Commands published on `device/<serial>/request`.

use serde_json::json;

/// Slice inside the uploaded project archive that the printer should run.
const DEFAULT_PLATE: &str = "Metadata/plate_1.gcode";

/// Start options for a `project_file` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFile {
    /// File name under the printer's cache directory.
    pub filename: String,
    /// Plate G-code path inside the 3MF archive.
    pub plate: String,
    pub sequence_id: String,
    pub timelapse: bool,
    pub bed_leveling: bool,
    pub flow_calibration: bool,
    pub vibration_calibration: bool,
    pub layer_inspect: bool,
    pub use_ams: bool,
}

impl ProjectFile {
    /// Defaults: everything off except bed leveling; the sequence id is
    /// the current unix time.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            plate: DEFAULT_PLATE.to_string(),
            sequence_id: chrono::Utc::now().timestamp().to_string(),
            timelapse: false,
            bed_leveling: true,
            flow_calibration: false,
            vibration_calibration: false,
            layer_inspect: false,
            use_ams: false,
        }
    }
}

/// Command to send to the printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrinterCommand {
    /// Request a full status push.
    PushAll,
    /// Clear a stale print error; start requests are ignored while one is set.
    CleanPrintError,
    /// Start printing a file already in the cache directory.
    ProjectFile(ProjectFile),
    /// Stop the current print.
    Stop,
}

impl PrinterCommand {
    /// Convert command to JSON payload.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PrinterCommand::PushAll => json!({
                "pushing": {
                    "sequence_id": "0",
                    "command": "pushall"
                }
            }),

            PrinterCommand::CleanPrintError => json!({
                "print": {
                    "sequence_id": "0",
                    "command": "clean_print_error"
                }
            }),

            PrinterCommand::ProjectFile(start) => json!({
                "print": {
                    "sequence_id": start.sequence_id,
                    "command": "project_file",
                    "param": start.plate,
                    "subtask_name": start.filename,
                    "url": format!("file:///sdcard/cache/{}", start.filename),
                    "timelapse": start.timelapse,
                    "bed_leveling": start.bed_leveling,
                    "flow_cali": start.flow_calibration,
                    "vibration_cali": start.vibration_calibration,
                    "layer_inspect": start.layer_inspect,
                    "use_ams": start.use_ams
                }
            }),

            PrinterCommand::Stop => json!({
                "print": {
                    "sequence_id": "0",
                    "command": "stop"
                }
            }),
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            PrinterCommand::PushAll => "pushall",
            PrinterCommand::CleanPrintError => "clean_print_error",
            PrinterCommand::ProjectFile(_) => "project_file",
            PrinterCommand::Stop => "stop",
        }
    }
}
