//! Implicit-FTPS upload client.
//!
//! The printer's file server expects TLS from the first byte on both the
//! control and the passive data connection, so the usual explicit
//! `AUTH TLS` flow does not apply. The control dialogue lives in
//! [`ControlChannel`], which is generic over the stream so it can be
//! exercised over in-memory pipes.

use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use rumqttc::tokio_rustls::client::TlsStream;
use rumqttc::tokio_rustls::TlsConnector;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{tls, LAN_USERNAME};
use crate::config::ControllerConfig;
use crate::error::TransferError;

/// Directory on the printer's storage that receives uploads.
pub const CACHE_DIR: &str = "/cache";

const CHUNK_SIZE: usize = 64 * 1024;
const QUIT_GRACE: Duration = Duration::from_secs(2);

/// FTP data connection mode. Only passive is supported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataMode {
    #[default]
    Passive,
    Active,
}

/// Connection settings for the file server.
#[derive(Debug, Clone)]
pub struct FtpsOptions {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Bound on TCP connect plus TLS handshake.
    pub connect_timeout: Duration,
    /// Bound on every individual reply or write.
    pub io_timeout: Duration,
    pub data_mode: DataMode,
}

impl FtpsOptions {
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            host: config.bambu_ip.clone(),
            port: config.ftps_port,
            username: LAN_USERNAME.to_string(),
            password: config.bambu_access_code.clone(),
            connect_timeout: config.connect_timeout(),
            io_timeout: config.transfer_timeout(),
            data_mode: config.ftps_data_mode,
        }
    }
}

/// A parsed server reply. Multi-line replies are joined with `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub text: String,
}

impl Reply {
    /// First digit of the code: 1 preliminary, 2 done, 3 more needed, 4/5 error.
    pub fn class(&self) -> u16 {
        self.code / 100
    }
}

fn split_code(line: &str) -> Option<(u16, char, &str)> {
    let code = line.get(..3)?;
    if !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let sep = line[3..].chars().next().unwrap_or(' ');
    let rest = line.get(4..).unwrap_or("");
    Some((code.parse().ok()?, sep, rest))
}

/// Extract the address and port from a `227 Entering Passive Mode
/// (h1,h2,h3,h4,p1,p2)` reply.
pub fn parse_pasv(text: &str) -> Option<(Ipv4Addr, u16)> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let numbers: Vec<u8> = text[start..]
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .take(6)
        .map(|s| s.parse::<u8>())
        .collect::<Result<_, _>>()
        .ok()?;
    if numbers.len() != 6 {
        return None;
    }
    let addr = Ipv4Addr::new(numbers[0], numbers[1], numbers[2], numbers[3]);
    let port = u16::from(numbers[4]) << 8 | u16::from(numbers[5]);
    Some((addr, port))
}

/// FTP control connection over any byte stream.
pub struct ControlChannel<S> {
    stream: BufReader<S>,
    io_timeout: Duration,
}

impl<S: AsyncRead + AsyncWrite + Unpin> ControlChannel<S> {
    pub fn new(stream: S, io_timeout: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            io_timeout,
        }
    }

    async fn read_line(&mut self) -> Result<String, TransferError> {
        let mut line = String::new();
        let n = timeout(self.io_timeout, self.stream.read_line(&mut line))
            .await
            .map_err(|_| TransferError::Timeout(self.io_timeout))??;
        if n == 0 {
            return Err(TransferError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "control connection closed",
            )));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Read one complete (possibly multi-line) reply.
    pub async fn read_reply(&mut self) -> Result<Reply, TransferError> {
        let first = self.read_line().await?;
        let (code, sep, rest) =
            split_code(&first).ok_or_else(|| TransferError::MalformedReply(first.clone()))?;
        let mut text = rest.to_string();

        if sep == '-' {
            loop {
                let line = self.read_line().await?;
                match split_code(&line) {
                    Some((c, ' ', rest)) if c == code => {
                        text.push('\n');
                        text.push_str(rest);
                        break;
                    }
                    Some((c, '-', rest)) if c == code => {
                        text.push('\n');
                        text.push_str(rest);
                    }
                    _ => {
                        text.push('\n');
                        text.push_str(&line);
                    }
                }
            }
        }
        Ok(Reply { code, text })
    }

    pub async fn send(&mut self, command: &str) -> Result<(), TransferError> {
        let line = format!("{command}\r\n");
        let stream = self.stream.get_mut();
        timeout(self.io_timeout, async {
            stream.write_all(line.as_bytes()).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| TransferError::Timeout(self.io_timeout))??;
        Ok(())
    }

    async fn expect(&mut self, command: &str, class: u16) -> Result<Reply, TransferError> {
        self.send(command).await?;
        let reply = self.read_reply().await?;
        expect_class(reply, class)
    }

    /// The server speaks first once the session is up.
    pub async fn greeting(&mut self) -> Result<Reply, TransferError> {
        let reply = self.read_reply().await?;
        expect_class(reply, 2)
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), TransferError> {
        self.send(&format!("USER {username}")).await?;
        let reply = self.read_reply().await?;
        match reply.class() {
            2 => Ok(()),
            3 => {
                self.expect(&format!("PASS {password}"), 2).await?;
                Ok(())
            }
            _ => Err(unexpected(reply)),
        }
    }

    /// Protect the data channel and switch to binary mode.
    pub async fn prepare_binary_transfer(&mut self) -> Result<(), TransferError> {
        self.expect("PBSZ 0", 2).await?;
        self.expect("PROT P", 2).await?;
        self.expect("TYPE I", 2).await?;
        Ok(())
    }

    /// Enter passive mode and return the data port.
    pub async fn passive(&mut self) -> Result<u16, TransferError> {
        let reply = self.expect("PASV", 2).await?;
        parse_pasv(&reply.text)
            .map(|(_, port)| port)
            .ok_or(TransferError::MalformedReply(reply.text))
    }

    /// Issue `STOR`; the server must answer with a preliminary reply before
    /// data may flow.
    pub async fn begin_store(&mut self, remote_path: &str) -> Result<Reply, TransferError> {
        self.send(&format!("STOR {remote_path}")).await?;
        let mut reply = self.read_reply().await?;
        if reply.class() == 2 {
            reply = self.read_reply().await?;
        }
        expect_class(reply, 1)
    }

    /// Completion reply after the data connection is closed.
    pub async fn finish_store(&mut self) -> Result<Reply, TransferError> {
        let reply = self.read_reply().await?;
        expect_class(reply, 2)
    }

    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }
}

fn expect_class(reply: Reply, class: u16) -> Result<Reply, TransferError> {
    if reply.class() == class {
        Ok(reply)
    } else {
        Err(unexpected(reply))
    }
}

fn unexpected(reply: Reply) -> TransferError {
    TransferError::UnexpectedReply {
        code: reply.code,
        text: reply.text,
    }
}

/// Uploads print files into the printer's cache directory.
pub struct FtpsClient {
    options: FtpsOptions,
    // Shared so the data connection can resume the control session.
    connector: TlsConnector,
}

impl FtpsClient {
    pub fn new(options: FtpsOptions) -> Self {
        Self {
            options,
            connector: tls::connector(),
        }
    }

    /// Upload `local_path` as `/cache/<remote_filename>`.
    ///
    /// Every fault is logged and reported as `false` so the caller can treat
    /// it as a plain job failure.
    pub async fn upload(&self, local_path: &Path, remote_filename: &str) -> bool {
        tracing::info!(
            local = %local_path.display(),
            remote = remote_filename,
            host = %self.options.host,
            "uploading print file"
        );
        match self.try_upload(local_path, remote_filename).await {
            Ok(bytes) => {
                tracing::info!(remote = remote_filename, bytes, "upload complete");
                true
            }
            Err(e) => {
                tracing::error!(remote = remote_filename, error = %e, "upload failed");
                false
            }
        }
    }

    pub async fn try_upload(
        &self,
        local_path: &Path,
        remote_filename: &str,
    ) -> Result<u64, TransferError> {
        if self.options.data_mode == DataMode::Active {
            return Err(TransferError::NotImplemented("active mode"));
        }

        let file = tokio::fs::File::open(local_path).await?;
        let stream = self.open(self.options.port).await?;
        let mut control = ControlChannel::new(stream, self.options.io_timeout);

        let result = self.store(&mut control, file, remote_filename).await;

        let _ = control.send("QUIT").await;
        let _ = timeout(QUIT_GRACE, control.read_reply()).await;
        tls::close_raw(control.into_inner()).await;

        result
    }

    async fn store(
        &self,
        control: &mut ControlChannel<TlsStream<TcpStream>>,
        mut file: tokio::fs::File,
        remote_filename: &str,
    ) -> Result<u64, TransferError> {
        control.greeting().await?;
        control
            .login(&self.options.username, &self.options.password)
            .await?;
        control.prepare_binary_transfer().await?;

        // The advertised PASV address is ignored; data goes to the same host.
        let data_port = control.passive().await?;
        let mut data = self.open(data_port).await?;

        control
            .begin_store(&format!("{CACHE_DIR}/{remote_filename}"))
            .await?;

        let copied = self.copy_to(&mut file, &mut data).await;
        tls::close_raw(data).await;
        let copied = copied?;

        control.finish_store().await?;
        Ok(copied)
    }

    async fn copy_to(
        &self,
        file: &mut tokio::fs::File,
        data: &mut TlsStream<TcpStream>,
    ) -> Result<u64, TransferError> {
        let io_timeout = self.options.io_timeout;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            timeout(io_timeout, data.write_all(&buf[..n]))
                .await
                .map_err(|_| TransferError::Timeout(io_timeout))??;
            total += n as u64;
        }
        Ok(total)
    }

    /// TCP connect and TLS handshake under one deadline.
    async fn open(&self, port: u16) -> Result<TlsStream<TcpStream>, TransferError> {
        let host = self.options.host.as_str();
        let addr = format!("{host}:{port}");
        let connect = async {
            let tcp = TcpStream::connect((host, port))
                .await
                .map_err(|source| TransferError::Connect {
                    addr: addr.clone(),
                    source,
                })?;
            let name = tls::server_name(host)?;
            self.connector
                .connect(name, tcp)
                .await
                .map_err(|source| TransferError::Tls {
                    addr: addr.clone(),
                    source,
                })
        };
        timeout(self.options.connect_timeout, connect)
            .await
            .map_err(|_| TransferError::Timeout(self.options.connect_timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::tokio_rustls::rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
    use rumqttc::tokio_rustls::rustls::ServerConfig;
    use rumqttc::tokio_rustls::TlsAcceptor;
    use std::sync::Arc;
    use std::time::Instant;
    use tokio::io::{duplex, DuplexStream};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Plays the server side of a control dialogue: for each step, read the
    /// expected command (if any), then write the canned reply.
    fn script(server: DuplexStream, steps: Vec<(Option<&'static str>, &'static str)>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut server = BufReader::new(server);
            for (expected, reply) in steps {
                if let Some(expected) = expected {
                    let mut line = String::new();
                    server.read_line(&mut line).await.unwrap();
                    assert_eq!(line, format!("{expected}\r\n"));
                }
                server.get_mut().write_all(reply.as_bytes()).await.unwrap();
            }
        })
    }

    fn channel(client: DuplexStream) -> ControlChannel<DuplexStream> {
        ControlChannel::new(client, Duration::from_secs(5))
    }

    fn options(host: &str, port: u16, connect_timeout: Duration) -> FtpsOptions {
        FtpsOptions {
            host: host.into(),
            port,
            username: LAN_USERNAME.into(),
            password: "12345678".into(),
            connect_timeout,
            io_timeout: Duration::from_secs(5),
            data_mode: DataMode::Passive,
        }
    }

    fn self_signed_acceptor() -> TlsAcceptor {
        let key = rcgen::KeyPair::generate().unwrap();
        let cert = rcgen::CertificateParams::new(vec!["127.0.0.1".to_string()])
            .unwrap()
            .self_signed(&key)
            .unwrap();
        let config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(
                vec![cert.der().clone()],
                PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.serialize_der())),
            )
            .unwrap();
        TlsAcceptor::from(Arc::new(config))
    }

    /// What the file server saw during one session.
    struct Received {
        commands: Vec<String>,
        path: String,
        bytes: Vec<u8>,
    }

    /// Implicit-FTPS server on loopback: TLS from the first byte on the
    /// control port and on the passive data port. The PASV reply advertises
    /// a foreign address so the client has to fall back to the control host.
    async fn implicit_ftps_server() -> (u16, JoinHandle<Received>) {
        let acceptor = self_signed_acceptor();
        let control = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let data = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = control.local_addr().unwrap().port();
        let data_port = data.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (tcp, _) = control.accept().await.unwrap();
            let mut session = BufReader::new(acceptor.accept(tcp).await.unwrap());
            let mut data = Some(data);
            let mut transfer: Option<JoinHandle<Vec<u8>>> = None;
            let mut received = Received {
                commands: Vec::new(),
                path: String::new(),
                bytes: Vec::new(),
            };

            let mut reply = "220 Bambu FTP ready\r\n".to_string();
            loop {
                session.get_mut().write_all(reply.as_bytes()).await.unwrap();
                session.get_mut().flush().await.unwrap();

                let mut line = String::new();
                if session.read_line(&mut line).await.unwrap() == 0 {
                    break;
                }
                let line = line.trim_end().to_string();
                received.commands.push(line.clone());

                reply = match line.split(' ').next().unwrap_or_default() {
                    "USER" => "331 Password required\r\n".into(),
                    "PASS" => "230 Logged in\r\n".into(),
                    "PBSZ" | "PROT" | "TYPE" => "200 OK\r\n".into(),
                    "PASV" => {
                        let listener = data.take().unwrap();
                        let acceptor = acceptor.clone();
                        transfer = Some(tokio::spawn(async move {
                            let (tcp, _) = listener.accept().await.unwrap();
                            let mut stream = acceptor.accept(tcp).await.unwrap();
                            let mut bytes = Vec::new();
                            let mut chunk = vec![0u8; 8192];
                            loop {
                                match stream.read(&mut chunk).await {
                                    Ok(0) => break,
                                    Ok(n) => bytes.extend_from_slice(&chunk[..n]),
                                    // The client drops TCP without close_notify.
                                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                                    Err(e) => panic!("data connection failed: {e}"),
                                }
                            }
                            bytes
                        }));
                        format!(
                            "227 Entering Passive Mode (192,168,1,50,{},{}).\r\n",
                            data_port >> 8,
                            data_port & 0xff
                        )
                    }
                    "STOR" => {
                        received.path = line["STOR ".len()..].to_string();
                        session
                            .get_mut()
                            .write_all(b"150 Ok to send data.\r\n")
                            .await
                            .unwrap();
                        session.get_mut().flush().await.unwrap();
                        received.bytes = transfer.take().unwrap().await.unwrap();
                        "226 Transfer complete.\r\n".into()
                    }
                    "QUIT" => {
                        session.get_mut().write_all(b"221 Goodbye.\r\n").await.unwrap();
                        session.get_mut().flush().await.unwrap();
                        break;
                    }
                    _ => "502 Command not implemented.\r\n".into(),
                };
            }
            received
        });
        (port, handle)
    }

    #[test]
    fn parse_pasv_reply() {
        let (addr, port) = parse_pasv("Entering Passive Mode (192,168,1,50,195,80).").unwrap();
        assert_eq!(addr, Ipv4Addr::new(192, 168, 1, 50));
        assert_eq!(port, 195 * 256 + 80);
        assert_eq!(parse_pasv("Entering Passive Mode 10,0,0,7,4,1").unwrap().1, 1025);
        assert!(parse_pasv("Entering Passive Mode (1,2,3)").is_none());
        assert!(parse_pasv("no numbers here").is_none());
        assert!(parse_pasv("(300,1,1,1,1,1)").is_none());
    }

    #[tokio::test]
    async fn reads_single_and_multiline_replies() {
        let (client, server) = duplex(1024);
        let server = script(
            server,
            vec![
                (None, "220-Welcome\r\n220-to the printer\r\n220 ready\r\n"),
                (None, "230 Login successful.\r\n"),
                (None, "211-Features:\r\n UTF8\r\n211 End\r\n"),
            ],
        );
        let mut control = channel(client);

        let reply = control.read_reply().await.unwrap();
        assert_eq!(reply.code, 220);
        assert_eq!(reply.text, "Welcome\nto the printer\nready");

        let reply = control.read_reply().await.unwrap();
        assert_eq!(reply, Reply { code: 230, text: "Login successful.".into() });

        let reply = control.read_reply().await.unwrap();
        assert_eq!(reply, Reply { code: 211, text: "Features:\n UTF8\nEnd".into() });
        server.await.unwrap();
    }

    #[tokio::test]
    async fn malformed_reply_is_rejected() {
        let (client, server) = duplex(1024);
        let server = script(server, vec![(None, "hello there\r\n")]);
        let err = channel(client).read_reply().await.unwrap_err();
        assert!(matches!(err, TransferError::MalformedReply(_)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn full_store_dialogue() {
        let (client, server) = duplex(4096);
        let server = script(
            server,
            vec![
                (None, "220 Bambu FTP ready\r\n"),
                (Some("USER bblp"), "331 Password required\r\n"),
                (Some("PASS 12345678"), "230 Logged in\r\n"),
                (Some("PBSZ 0"), "200 PBSZ=0\r\n"),
                (Some("PROT P"), "200 Protection set to Private\r\n"),
                (Some("TYPE I"), "200 Switching to Binary mode.\r\n"),
                (Some("PASV"), "227 Entering Passive Mode (192,168,1,50,39,16).\r\n"),
                (Some("STOR /cache/job-1.3mf"), "150 Ok to send data.\r\n"),
                (None, "226 Transfer complete.\r\n"),
            ],
        );
        let mut control = channel(client);

        control.greeting().await.unwrap();
        control.login("bblp", "12345678").await.unwrap();
        control.prepare_binary_transfer().await.unwrap();
        assert_eq!(control.passive().await.unwrap(), 39 * 256 + 16);
        let reply = control.begin_store("/cache/job-1.3mf").await.unwrap();
        assert_eq!(reply.code, 150);
        assert_eq!(control.finish_store().await.unwrap().code, 226);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn wrong_access_code_fails_login() {
        let (client, server) = duplex(1024);
        let server = script(
            server,
            vec![
                (Some("USER bblp"), "331 Password required\r\n"),
                (Some("PASS nope"), "530 Login incorrect.\r\n"),
            ],
        );
        let err = channel(client).login("bblp", "nope").await.unwrap_err();
        assert!(matches!(err, TransferError::UnexpectedReply { code: 530, .. }));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn store_requires_preliminary_reply() {
        let (client, server) = duplex(1024);
        let server = script(
            server,
            vec![(Some("STOR /cache/x.3mf"), "553 Could not create file.\r\n")],
        );
        let err = channel(client).begin_store("/cache/x.3mf").await.unwrap_err();
        assert!(matches!(err, TransferError::UnexpectedReply { code: 553, .. }));
        server.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn silent_server_times_out() {
        let (client, _server) = duplex(1024);
        let mut control = ControlChannel::new(client, Duration::from_secs(3));
        let err = control.read_reply().await.unwrap_err();
        assert!(matches!(err, TransferError::Timeout(d) if d == Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn active_mode_is_not_implemented() {
        let mut opts = options("127.0.0.1", 1, Duration::from_secs(1));
        opts.data_mode = DataMode::Active;
        let client = FtpsClient::new(opts);

        let err = client
            .try_upload(Path::new("/nonexistent"), "x.3mf")
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::NotImplemented("active mode")));
        assert!(!client.upload(Path::new("/nonexistent"), "x.3mf").await);
    }

    #[tokio::test]
    async fn missing_local_file_fails_without_network() {
        let client = FtpsClient::new(options("127.0.0.1", 1, Duration::from_secs(1)));
        let dir = tempfile::tempdir().unwrap();
        let err = client
            .try_upload(&dir.path().join("absent.3mf"), "x.3mf")
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Io(_)));
    }

    #[tokio::test]
    async fn unreachable_device_returns_false() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("job.3mf");
        std::fs::write(&file, b"data").unwrap();

        let timeout = Duration::from_millis(500);
        let client = FtpsClient::new(options("127.0.0.1", port, timeout));
        let started = Instant::now();
        assert!(!client.upload(&file, "job.3mf").await);
        assert!(started.elapsed() < timeout + Duration::from_secs(1));
    }

    #[tokio::test]
    async fn stalled_handshake_is_bounded_by_connect_timeout() {
        // Accepts TCP but never answers the TLS ClientHello.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("job.3mf");
        std::fs::write(&file, b"data").unwrap();

        let timeout = Duration::from_millis(300);
        let client = FtpsClient::new(options("127.0.0.1", port, timeout));
        let started = Instant::now();
        let err = client.try_upload(&file, "job.3mf").await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, TransferError::Timeout(d) if d == timeout));
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_secs(1));
        drop(listener);
    }

    #[tokio::test]
    async fn uploads_file_into_cache_over_implicit_tls() {
        let (port, server) = implicit_ftps_server().await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("job.3mf");
        let payload: Vec<u8> = (0..150_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&file, &payload).unwrap();

        let client = FtpsClient::new(options("127.0.0.1", port, Duration::from_secs(5)));
        assert!(client.upload(&file, "job-1.3mf").await);

        let received = server.await.unwrap();
        assert_eq!(received.path, "/cache/job-1.3mf");
        assert_eq!(received.bytes.len(), payload.len());
        assert!(received.bytes == payload);
        assert_eq!(
            received.commands,
            vec![
                "USER bblp",
                "PASS 12345678",
                "PBSZ 0",
                "PROT P",
                "TYPE I",
                "PASV",
                "STOR /cache/job-1.3mf",
                "QUIT",
            ]
        );
    }
}
