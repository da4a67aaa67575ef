//! Interface de terminal do printbridge: barra de progresso e saída colorida.
//!
//! Usa `indicatif` para a barra de progresso da impressão e `console` para
//! estilização com cores. O [`Dashboard`] é alimentado pelo canal de
//! notificação de status e nunca bloqueia o laço de recepção.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::printer::snapshot::StatusSnapshot;
use crate::printer::PrinterStatus;
use crate::state_machine::{CycleOutcome, CycleRecord};

/// Barra de progresso da impressão atual mais o resumo de cada ciclo.
pub struct Dashboard {
    // Barra de 0 a 100 com o estado e as camadas na mensagem.
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Dashboard {
    pub fn new() -> Self {
        let pb = ProgressBar::new(100);
        let style = ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.set_message("waiting for printer status");

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Atualiza a barra com o snapshot mais recente.
    pub fn update(&self, status: &PrinterStatus) {
        self.pb.set_position(u64::from(status.progress_percent));
        self.pb.set_message(status_line(status));
    }

    /// Imprime o registro do ciclo acima da barra, colorido pelo desfecho.
    pub fn print_record(&self, record: &CycleRecord) {
        let (style, label) = match &record.outcome {
            Some(CycleOutcome::Completed) => (&self.green, "✓ job completed".to_string()),
            Some(CycleOutcome::Failed(cause)) => (&self.red, format!("✗ job failed: {cause}")),
            Some(CycleOutcome::Interrupted) | None => {
                (&self.yellow, "↻ job interrupted".to_string())
            }
        };
        self.pb.println(format!("{} {}", style.apply_to(label), record.job_id));
        self.pb.println(serde_json::to_string_pretty(record).unwrap_or_default());
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

/// Texto curto do status: `RUNNING layer 12/200, 37 min left [err 0300400C]`.
pub fn status_line(status: &PrinterStatus) -> String {
    let mut line = format!(
        "{} layer {}/{}, {} min left",
        status.state, status.current_layer, status.total_layers, status.remaining_minutes
    );
    if let Some(code) = &status.error_code {
        line.push_str(&format!(" [err {code}]"));
    }
    line
}

/// Renderiza status e registros até o encerramento.
pub async fn run_dashboard(
    mut status_rx: watch::Receiver<Option<PrinterStatus>>,
    mut records: mpsc::Receiver<CycleRecord>,
    shutdown: CancellationToken,
) {
    let dashboard = Dashboard::new();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(status) = status_rx.borrow_and_update().clone() {
                    dashboard.update(&status);
                }
            }
            Some(record) = records.recv() => dashboard.print_record(&record),
        }
    }
    dashboard.finish();
}

/// Imprime o snapshot atual para o subcomando `status`.
pub fn print_status(snapshot: &StatusSnapshot) {
    let Some(status) = snapshot.latest() else {
        println!("{}", Style::new().dim().apply_to("no status received"));
        return;
    };
    let style = if snapshot.has_error() {
        Style::new().red().bold()
    } else if snapshot.is_printing() {
        Style::new().cyan().bold()
    } else if snapshot.is_finished() {
        Style::new().green().bold()
    } else {
        Style::new().bold()
    };
    println!("{}", style.apply_to(status.state));
    println!("  progress:  {}%", status.progress_percent);
    println!("  layer:     {}/{}", status.current_layer, status.total_layers);
    println!("  remaining: {} min", status.remaining_minutes);
    if let Some(code) = &status.error_code {
        println!("  error:     {code}");
    }
}
