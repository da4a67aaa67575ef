//! Status channel: MQTT over TLS to the printer's local broker.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rumqttc::{
    AsyncClient, ClientError, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS,
    TlsConfiguration, Transport,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use super::commands::{PrinterCommand, ProjectFile};
use super::snapshot::StatusSnapshot;
use super::status::PrinterStatus;
use super::{tls, LAN_USERNAME};
use crate::config::ControllerConfig;
use crate::error::ControllerError;

/// Pause between `clean_print_error` and `project_file`; the printer drops
/// start requests while a stale error flag is still set.
pub const START_GRACE: Duration = Duration::from_secs(1);

const KEEP_ALIVE: Duration = Duration::from_secs(60);
const REQUEST_CAPACITY: usize = 64;
// Full status pushes are far larger than the client's 10 KiB default.
const MAX_INCOMING_PACKET: usize = 1024 * 1024;
const MAX_OUTGOING_PACKET: usize = 64 * 1024;

/// Connection state of the status channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Broker connection configuration.
#[derive(Debug, Clone)]
pub struct StatusChannelConfig {
    pub host: String,
    pub port: u16,
    pub serial: String,
    pub access_code: String,
    /// How long `connect` waits for the broker's acknowledgement.
    pub connect_timeout: Duration,
}

impl StatusChannelConfig {
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            host: config.bambu_ip.clone(),
            port: config.mqtt_port,
            serial: config.bambu_serial.clone(),
            access_code: config.bambu_access_code.clone(),
            connect_timeout: config.connect_timeout(),
        }
    }

    pub fn report_topic(&self) -> String {
        format!("device/{}/report", self.serial)
    }

    pub fn request_topic(&self) -> String {
        format!("device/{}/request", self.serial)
    }
}

/// Outbound half of the MQTT client. Every call only queues the packet for
/// the event loop and never waits for the broker.
pub trait CommandSink: Send + Sync {
    fn subscribe_topic(&self, topic: &str) -> Result<(), ClientError>;

    fn publish_payload(&self, topic: &str, payload: String) -> Result<(), ClientError>;

    fn close(&self) -> Result<(), ClientError>;
}

impl CommandSink for AsyncClient {
    fn subscribe_topic(&self, topic: &str) -> Result<(), ClientError> {
        self.try_subscribe(topic, QoS::AtMostOnce)
    }

    fn publish_payload(&self, topic: &str, payload: String) -> Result<(), ClientError> {
        self.try_publish(topic, QoS::AtMostOnce, false, payload)
    }

    fn close(&self) -> Result<(), ClientError> {
        self.try_disconnect()
    }
}

/// Commands bound to the device's request topic. Shared by the channel and
/// its receive task.
#[derive(Clone)]
struct Requests {
    sink: Arc<dyn CommandSink>,
    topic: String,
}

impl Requests {
    fn new(sink: Arc<dyn CommandSink>, topic: String) -> Self {
        Self { sink, topic }
    }

    fn send(&self, command: &PrinterCommand) -> Result<(), ControllerError> {
        self.sink
            .publish_payload(&self.topic, command.to_json().to_string())
            .map_err(|e| ControllerError::Connection(e.to_string()))?;
        tracing::debug!(command = command.name(), "published printer command");
        Ok(())
    }

    fn request_full_status(&self) -> Result<(), ControllerError> {
        self.send(&PrinterCommand::PushAll)
    }
}

struct LiveSession {
    requests: Requests,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

/// Long-lived session with the printer.
///
/// `connect` spawns a background task that owns the MQTT event loop and
/// publishes every decoded report into the shared [`StatusSnapshot`]. There
/// is no automatic reconnection: once the task ends the session stays
/// [`SessionState::Disconnected`].
pub struct StatusChannel {
    config: StatusChannelConfig,
    snapshot: Arc<StatusSnapshot>,
    session: Arc<watch::Sender<SessionState>>,
    live: Mutex<Option<LiveSession>>,
}

impl StatusChannel {
    pub fn new(config: StatusChannelConfig) -> Self {
        let (session, _) = watch::channel(SessionState::Disconnected);
        Self {
            config,
            snapshot: Arc::new(StatusSnapshot::new()),
            session: Arc::new(session),
            live: Mutex::new(None),
        }
    }

    fn live(&self) -> MutexGuard<'_, Option<LiveSession>> {
        self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> &StatusSnapshot {
        &self.snapshot
    }

    pub fn session_state(&self) -> SessionState {
        *self.session.borrow()
    }

    /// Notification mailbox for observers (terminal progress, telemetry).
    pub fn subscribe(&self) -> watch::Receiver<Option<PrinterStatus>> {
        self.snapshot.subscribe()
    }

    /// Open the session and block until the broker acknowledges it.
    ///
    /// Fails with [`ControllerError::Connection`] after the configured
    /// timeout, when the broker refuses or drops the connection, or when
    /// `shutdown` fires first.
    pub async fn connect(&self, shutdown: &CancellationToken) -> Result<(), ControllerError> {
        if self.session_state() == SessionState::Connected {
            return Ok(());
        }
        self.disconnect();

        tracing::info!(host = %self.config.host, port = self.config.port, "connecting to printer");
        self.session.send_replace(SessionState::Connecting);
        let mut state_rx = self.session.subscribe();

        let client_id = format!("printbridge-{}", uuid::Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, self.config.host.clone(), self.config.port);
        options.set_credentials(LAN_USERNAME, self.config.access_code.clone());
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_session(true);
        options.set_max_packet_size(MAX_INCOMING_PACKET, MAX_OUTGOING_PACKET);
        options.set_transport(Transport::tls_with_config(TlsConfiguration::Rustls(
            tls::insecure_client_config(),
        )));

        let (client, event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let requests = Requests::new(Arc::new(client), self.config.request_topic());
        let stop = CancellationToken::new();
        let task = tokio::spawn(receive_loop(
            event_loop,
            requests.clone(),
            self.config.report_topic(),
            Arc::clone(&self.snapshot),
            Arc::clone(&self.session),
            stop.clone(),
        ));
        *self.live() = Some(LiveSession {
            requests,
            stop,
            task,
        });

        let deadline = Instant::now() + self.config.connect_timeout;
        let outcome = loop {
            match *state_rx.borrow_and_update() {
                SessionState::Connected => break Ok(()),
                SessionState::Disconnected => {
                    break Err("printer closed the session before acknowledging it".to_string());
                }
                SessionState::Connecting => {}
            }
            tokio::select! {
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break Err("session state channel closed".to_string());
                    }
                }
                _ = sleep_until(deadline) => {
                    break Err(format!(
                        "no acknowledgement within {}s",
                        self.config.connect_timeout.as_secs_f32()
                    ));
                }
                _ = shutdown.cancelled() => break Err("shutdown requested".to_string()),
            }
        };

        match outcome {
            Ok(()) => {
                tracing::info!(serial = %self.config.serial, "connected to printer");
                Ok(())
            }
            Err(reason) => {
                self.disconnect();
                Err(ControllerError::Connection(format!(
                    "failed to connect to printer at {}:{}: {reason}",
                    self.config.host, self.config.port
                )))
            }
        }
    }

    /// Best-effort teardown. Stops the receive task, which drops the socket
    /// without a TLS close exchange; never waits on the printer.
    pub fn disconnect(&self) {
        if let Some(live) = self.live().take() {
            let _ = live.requests.sink.close();
            live.stop.cancel();
            live.task.abort();
            tracing::info!("disconnected from printer");
        }
        self.session.send_replace(SessionState::Disconnected);
    }

    /// Fire-and-forget publish on the request topic.
    pub fn publish(&self, command: &PrinterCommand) -> Result<(), ControllerError> {
        if self.session_state() != SessionState::Connected {
            return Err(ControllerError::Connection("not connected to printer".into()));
        }
        let requests = self
            .live()
            .as_ref()
            .map(|live| live.requests.clone())
            .ok_or_else(|| ControllerError::Connection("not connected to printer".into()))?;
        requests.send(command)
    }

    pub fn clear_error(&self) -> Result<(), ControllerError> {
        self.publish(&PrinterCommand::CleanPrintError)
    }

    /// Clear any stale error, wait [`START_GRACE`], then start `filename`
    /// from the cache directory. Success is only visible in later reports.
    pub async fn start_print(&self, filename: &str) -> Result<(), ControllerError> {
        self.clear_error()?;
        tokio::time::sleep(START_GRACE).await;
        self.publish(&PrinterCommand::ProjectFile(ProjectFile::new(filename)))?;
        tracing::info!(filename, "start command sent");
        Ok(())
    }

    pub fn stop_print(&self) -> Result<(), ControllerError> {
        self.publish(&PrinterCommand::Stop)?;
        tracing::info!("stop command sent");
        Ok(())
    }
}

impl Drop for StatusChannel {
    fn drop(&mut self) {
        if let Some(live) = self.live().take() {
            live.stop.cancel();
            live.task.abort();
        }
    }
}

async fn receive_loop(
    mut event_loop: EventLoop,
    requests: Requests,
    report_topic: String,
    snapshot: Arc<StatusSnapshot>,
    session: Arc<watch::Sender<SessionState>>,
    stop: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = stop.cancelled() => break,
            event = event_loop.poll() => event,
        };

        match event {
            Ok(event) => {
                if handle_event(event, &requests, &report_topic, &snapshot, &session).is_break() {
                    break;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "status channel closed");
                break;
            }
        }
    }
    session.send_replace(SessionState::Disconnected);
}

/// Apply one event-loop event. On CONNACK the session goes live, the report
/// topic is subscribed and a full status push is requested.
fn handle_event(
    event: Event,
    requests: &Requests,
    report_topic: &str,
    snapshot: &StatusSnapshot,
    session: &watch::Sender<SessionState>,
) -> ControlFlow<()> {
    match event {
        Event::Incoming(Packet::ConnAck(ack)) => {
            if ack.code != ConnectReturnCode::Success {
                tracing::error!(code = ?ack.code, "printer refused the MQTT session");
                return ControlFlow::Break(());
            }
            session.send_replace(SessionState::Connected);

            if let Err(e) = requests.sink.subscribe_topic(report_topic) {
                tracing::error!(error = %e, "failed to subscribe to status reports");
                return ControlFlow::Break(());
            }
            tracing::info!(topic = report_topic, "subscribed to status reports");

            if let Err(e) = requests.request_full_status() {
                tracing::warn!(error = %e, "failed to request full status");
            }
        }
        Event::Incoming(Packet::Publish(publish)) => handle_report(snapshot, &publish.payload),
        _ => {}
    }
    ControlFlow::Continue(())
}

/// Decode one report and publish it. Malformed documents are logged and
/// dropped; documents without a `print` section are skipped silently.
fn handle_report(snapshot: &StatusSnapshot, payload: &[u8]) {
    match PrinterStatus::decode(payload) {
        Ok(Some(status)) => {
            tracing::debug!(
                state = %status.state,
                progress = status.progress_percent,
                "printer status"
            );
            snapshot.publish(status);
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "ignoring status report"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::status::PrintState;

    fn config(port: u16, timeout: Duration) -> StatusChannelConfig {
        StatusChannelConfig {
            host: "127.0.0.1".into(),
            port,
            serial: "01P00A000000001".into(),
            access_code: "12345678".into(),
            connect_timeout: timeout,
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Subscribe(String),
        Publish {
            topic: String,
            payload: serde_json::Value,
            at: Instant,
        },
        Close,
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<Sent>>,
    }

    impl RecordingSink {
        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl CommandSink for RecordingSink {
        fn subscribe_topic(&self, topic: &str) -> Result<(), ClientError> {
            self.sent.lock().unwrap().push(Sent::Subscribe(topic.to_string()));
            Ok(())
        }

        fn publish_payload(&self, topic: &str, payload: String) -> Result<(), ClientError> {
            self.sent.lock().unwrap().push(Sent::Publish {
                topic: topic.to_string(),
                payload: serde_json::from_str(&payload).unwrap(),
                at: Instant::now(),
            });
            Ok(())
        }

        fn close(&self) -> Result<(), ClientError> {
            self.sent.lock().unwrap().push(Sent::Close);
            Ok(())
        }
    }

    fn print_command(sent: &Sent) -> (&str, &str, Instant) {
        match sent {
            Sent::Publish { topic, payload, at } => (
                topic.as_str(),
                payload["print"]["command"].as_str().unwrap(),
                *at,
            ),
            other => panic!("expected a publish, got {other:?}"),
        }
    }

    /// A channel whose session is live on `sink` instead of a broker.
    fn attached(sink: &Arc<RecordingSink>) -> StatusChannel {
        let channel = StatusChannel::new(config(8883, Duration::from_secs(10)));
        let sink: Arc<dyn CommandSink> = sink.clone();
        *channel.live() = Some(LiveSession {
            requests: Requests::new(sink, channel.config.request_topic()),
            stop: CancellationToken::new(),
            task: tokio::spawn(async {}),
        });
        channel.session.send_replace(SessionState::Connected);
        channel
    }

    fn requests(sink: &Arc<RecordingSink>) -> Requests {
        let sink: Arc<dyn CommandSink> = sink.clone();
        Requests::new(sink, "device/01P00A000000001/request".into())
    }

    #[test]
    fn topics_follow_device_serial() {
        let config = config(8883, Duration::from_secs(10));
        assert_eq!(config.report_topic(), "device/01P00A000000001/report");
        assert_eq!(config.request_topic(), "device/01P00A000000001/request");
    }

    #[test]
    fn from_config_uses_printer_settings() {
        let controller = ControllerConfig {
            bambu_ip: "10.0.0.7".into(),
            bambu_serial: "SER".into(),
            bambu_access_code: "code".into(),
            ..Default::default()
        };
        let config = StatusChannelConfig::from_config(&controller);
        assert_eq!(config.host, "10.0.0.7");
        assert_eq!(config.port, 8883);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn handle_report_publishes_print_section() {
        let snapshot = StatusSnapshot::new();
        handle_report(
            &snapshot,
            br#"{"print":{"gcode_state":"RUNNING","mc_percent":12,"layer_num":3}}"#,
        );
        let status = snapshot.latest().unwrap();
        assert_eq!(status.state, PrintState::Running);
        assert_eq!(status.progress_percent, 12);
        assert_eq!(status.current_layer, 3);
    }

    #[test]
    fn handle_report_ignores_other_and_malformed_documents() {
        let snapshot = StatusSnapshot::new();
        handle_report(&snapshot, br#"{"print":{"gcode_state":"FINISH","mc_percent":100}}"#);
        handle_report(&snapshot, br#"{"info":{"command":"get_version"}}"#);
        handle_report(&snapshot, b"\x00\x01garbage");
        assert_eq!(snapshot.latest().unwrap().state, PrintState::Finished);
    }

    #[test]
    fn new_channel_is_disconnected() {
        let channel = StatusChannel::new(config(8883, Duration::from_secs(10)));
        assert_eq!(channel.session_state(), SessionState::Disconnected);
        assert!(channel.snapshot().latest().is_none());
    }

    #[test]
    fn commands_require_a_session() {
        let channel = StatusChannel::new(config(8883, Duration::from_secs(10)));
        let err = channel.clear_error().unwrap_err();
        assert!(matches!(err, ControllerError::Connection(_)));
        assert!(channel.stop_print().is_err());
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let channel = StatusChannel::new(config(port, Duration::from_secs(5)));
        let err = channel.connect(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ControllerError::Connection(_)));
        assert_eq!(channel.session_state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn connect_times_out_without_acknowledgement() {
        // Accepts TCP but never completes the TLS handshake.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let timeout = Duration::from_millis(300);
        let channel = StatusChannel::new(config(port, timeout));

        let started = std::time::Instant::now();
        let err = channel.connect(&CancellationToken::new()).await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(err.to_string().contains("no acknowledgement"));
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_secs(2));
        assert_eq!(channel.session_state(), SessionState::Disconnected);
        drop(listener);
    }

    #[tokio::test]
    async fn connect_honours_shutdown() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let channel = StatusChannel::new(config(port, Duration::from_secs(30)));
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let err = channel.connect(&shutdown).await.unwrap_err();
        assert!(err.to_string().contains("shutdown requested"));
        drop(listener);
    }

    #[test]
    fn connack_subscribes_and_requests_full_status() {
        let sink = Arc::new(RecordingSink::default());
        let snapshot = StatusSnapshot::new();
        let (session, _) = watch::channel(SessionState::Connecting);

        let flow = handle_event(
            Event::Incoming(Packet::ConnAck(rumqttc::ConnAck::new(
                ConnectReturnCode::Success,
                false,
            ))),
            &requests(&sink),
            "device/01P00A000000001/report",
            &snapshot,
            &session,
        );

        assert!(flow.is_continue());
        assert_eq!(*session.borrow(), SessionState::Connected);
        let sent = sink.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], Sent::Subscribe("device/01P00A000000001/report".into()));
        match &sent[1] {
            Sent::Publish { topic, payload, .. } => {
                assert_eq!(topic, "device/01P00A000000001/request");
                assert_eq!(payload["pushing"]["command"], "pushall");
            }
            other => panic!("expected pushall, got {other:?}"),
        }
    }

    #[test]
    fn refused_connack_ends_the_session() {
        let sink = Arc::new(RecordingSink::default());
        let snapshot = StatusSnapshot::new();
        let (session, _) = watch::channel(SessionState::Connecting);

        let flow = handle_event(
            Event::Incoming(Packet::ConnAck(rumqttc::ConnAck::new(
                ConnectReturnCode::BadUserNamePassword,
                false,
            ))),
            &requests(&sink),
            "device/01P00A000000001/report",
            &snapshot,
            &session,
        );

        assert!(flow.is_break());
        assert_eq!(*session.borrow(), SessionState::Connecting);
        assert!(sink.sent().is_empty());
    }

    #[test]
    fn incoming_report_reaches_snapshot() {
        let sink = Arc::new(RecordingSink::default());
        let snapshot = StatusSnapshot::new();
        let (session, _) = watch::channel(SessionState::Connected);
        let report = rumqttc::Publish::new(
            "device/01P00A000000001/report",
            QoS::AtMostOnce,
            br#"{"print":{"gcode_state":"RUNNING","mc_percent":42}}"#.to_vec(),
        );

        let flow = handle_event(
            Event::Incoming(Packet::Publish(report)),
            &requests(&sink),
            "device/01P00A000000001/report",
            &snapshot,
            &session,
        );

        assert!(flow.is_continue());
        let status = snapshot.latest().unwrap();
        assert_eq!(status.state, PrintState::Running);
        assert_eq!(status.progress_percent, 42);
        assert!(sink.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn start_print_clears_error_then_waits_before_starting() {
        let sink = Arc::new(RecordingSink::default());
        let channel = attached(&sink);

        channel.start_print("job-7.3mf").await.unwrap();

        let sent = sink.sent();
        assert_eq!(sent.len(), 2);
        let (clear_topic, clear, cleared_at) = print_command(&sent[0]);
        let (start_topic, start, started_at) = print_command(&sent[1]);
        assert_eq!(clear_topic, "device/01P00A000000001/request");
        assert_eq!(start_topic, clear_topic);
        assert_eq!(clear, "clean_print_error");
        assert_eq!(start, "project_file");
        assert!(started_at - cleared_at >= START_GRACE);
        match &sent[1] {
            Sent::Publish { payload, .. } => {
                assert_eq!(payload["print"]["subtask_name"], "job-7.3mf");
                assert_eq!(payload["print"]["url"], "file:///sdcard/cache/job-7.3mf");
            }
            other => panic!("expected project_file, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stop_print_publishes_on_live_session() {
        let sink = Arc::new(RecordingSink::default());
        let channel = attached(&sink);

        channel.stop_print().unwrap();
        let sent = sink.sent();
        let (_, command, _) = print_command(&sent[0]);
        assert_eq!(command, "stop");
    }

    #[tokio::test]
    async fn disconnect_closes_the_sink() {
        let sink = Arc::new(RecordingSink::default());
        let channel = attached(&sink);

        channel.disconnect();
        assert_eq!(sink.sent(), vec![Sent::Close]);
        assert_eq!(channel.session_state(), SessionState::Disconnected);
        assert!(channel.clear_error().is_err());
    }
}
