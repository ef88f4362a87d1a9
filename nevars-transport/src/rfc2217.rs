//! RFC2217 transport
//!
//! Serial line tunnelled over telnet (`rfc2217://host:port`). Line settings
//! travel as COM-PORT-OPTION subnegotiations; telnet commands in the
//! incoming stream are stripped before data reaches the inbox.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, trace, warn};

use crate::{
    error::*,
    inbox::{self, Inbound},
    settings::SerialSettings,
    Transport,
};

/// Telnet protocol bytes
pub mod telnet {
    pub const IAC: u8 = 255;
    pub const DONT: u8 = 254;
    pub const DO: u8 = 253;
    pub const WONT: u8 = 252;
    pub const WILL: u8 = 251;
    pub const SB: u8 = 250;
    pub const SE: u8 = 240;

    pub const BINARY: u8 = 0;
    pub const SGA: u8 = 3;
    pub const COM_PORT_OPTION: u8 = 44;

    /// Client-to-server COM-PORT-OPTION commands
    pub const SET_BAUDRATE: u8 = 1;
    pub const SET_DATASIZE: u8 = 2;
    pub const SET_PARITY: u8 = 3;
    pub const SET_STOPSIZE: u8 = 4;
    pub const PURGE_DATA: u8 = 12;

    pub const PARITY_EVEN: u8 = 3;
    pub const STOPSIZE_ONE: u8 = 1;
    pub const PURGE_RECEIVE: u8 = 1;
}

use telnet::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Data,
    Iac,
    Negotiation(u8),
    Sub,
    SubIac,
}

/// Incremental telnet stream decoder
#[derive(Debug)]
pub(crate) struct TelnetDecoder {
    state: DecodeState,
    sub: Vec<u8>,
    replies: Vec<u8>,
    com_port: Option<bool>,
}

impl TelnetDecoder {
    pub(crate) fn new() -> Self {
        Self {
            state: DecodeState::Data,
            sub: Vec::new(),
            replies: Vec::new(),
            com_port: None,
        }
    }

    /// Strip telnet commands from `input`, appending data bytes to `out`
    pub(crate) fn decode(&mut self, input: &[u8], out: &mut BytesMut) {
        for &b in input {
            self.state = match (self.state, b) {
                (DecodeState::Data, IAC) => DecodeState::Iac,
                (DecodeState::Data, _) => {
                    out.put_u8(b);
                    DecodeState::Data
                }
                (DecodeState::Iac, IAC) => {
                    out.put_u8(IAC);
                    DecodeState::Data
                }
                (DecodeState::Iac, DO | DONT | WILL | WONT) => DecodeState::Negotiation(b),
                (DecodeState::Iac, SB) => {
                    self.sub.clear();
                    DecodeState::Sub
                }
                (DecodeState::Iac, _) => DecodeState::Data,
                (DecodeState::Negotiation(command), option) => {
                    self.negotiate(command, option);
                    DecodeState::Data
                }
                (DecodeState::Sub, IAC) => DecodeState::SubIac,
                (DecodeState::Sub, _) => {
                    self.sub.push(b);
                    DecodeState::Sub
                }
                (DecodeState::SubIac, SE) => {
                    trace!("Subnegotiation from server: {:02X?}", self.sub);
                    DecodeState::Data
                }
                (DecodeState::SubIac, IAC) => {
                    self.sub.push(IAC);
                    DecodeState::Sub
                }
                (DecodeState::SubIac, _) => DecodeState::Data,
            };
        }
    }

    fn negotiate(&mut self, command: u8, option: u8) {
        match (command, option) {
            (DO, COM_PORT_OPTION) => self.com_port = Some(true),
            (DONT, COM_PORT_OPTION) => self.com_port = Some(false),
            (DO, BINARY | SGA) | (WILL, BINARY | SGA | COM_PORT_OPTION) => {}
            (DO, _) => self.replies.extend_from_slice(&[IAC, WONT, option]),
            (WILL, _) => self.replies.extend_from_slice(&[IAC, DONT, option]),
            _ => {}
        }
    }

    /// Whether the server accepted COM-PORT-OPTION (`None` until it answers)
    pub(crate) fn com_port(&self) -> Option<bool> {
        self.com_port
    }

    /// Negotiation replies waiting to be sent
    pub(crate) fn take_replies(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.replies)
    }
}

/// Encode a COM-PORT-OPTION subnegotiation
pub(crate) fn com_port_command(command: u8, value: &[u8]) -> Vec<u8> {
    let mut buf = vec![IAC, SB, COM_PORT_OPTION, command];
    buf.extend(escape(value));
    buf.extend_from_slice(&[IAC, SE]);
    buf
}

/// Double every `IAC` in outgoing data
pub(crate) fn escape(data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(data.len());
    for &b in data {
        buf.push(b);
        if b == IAC {
            buf.push(IAC);
        }
    }
    buf
}

/// Split `rfc2217://host:port[?options]` into host and port
pub fn parse_url(url: &str) -> Result<(String, u16)> {
    let rest = url
        .strip_prefix("rfc2217://")
        .ok_or_else(|| Error::InvalidUrl(url.to_string()))?;
    let authority = rest.split(['?', '/']).next().unwrap_or_default();

    let (host, port) = authority
        .rsplit_once(':')
        .ok_or_else(|| Error::InvalidUrl(format!("{}: missing port", url)))?;
    let port = port
        .parse::<u16>()
        .map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))?;

    if host.is_empty() {
        return Err(Error::InvalidUrl(format!("{}: missing host", url)));
    }

    Ok((host.trim_matches(['[', ']']).to_string(), port))
}

/// RFC2217 transport
pub struct Rfc2217Transport {
    host: String,
    port: u16,
    settings: SerialSettings,
    stream: Option<TcpStream>,
    decoder: TelnetDecoder,
    inbox: BytesMut,
}

impl Rfc2217Transport {
    /// Create new RFC2217 transport
    pub fn new(host: impl Into<String>, port: u16, settings: SerialSettings) -> Self {
        Self {
            host: host.into(),
            port,
            settings,
            stream: None,
            decoder: TelnetDecoder::new(),
            inbox: BytesMut::with_capacity(256),
        }
    }

    /// Create from an `rfc2217://host:port` URL
    pub fn from_url(url: &str, settings: SerialSettings) -> Result<Self> {
        let (host, port) = parse_url(url)?;
        Ok(Self::new(host, port, settings))
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.settings.connect_timeout = timeout;
        self
    }

    /// Set read timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.settings.read_timeout = timeout;
        self
    }

    async fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotOpen)?;
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn send_com_port(&mut self, command: u8, value: &[u8]) -> Result<()> {
        trace!(command, value = ?value, "COM-PORT-OPTION");
        self.send_raw(&com_port_command(command, value)).await
    }

    async fn negotiate(&mut self) -> Result<()> {
        self.send_raw(&[
            IAC, WILL, COM_PORT_OPTION,
            IAC, WILL, BINARY,
            IAC, DO, BINARY,
            IAC, WILL, SGA,
            IAC, DO, SGA,
        ])
        .await?;

        let deadline = Instant::now() + self.settings.connect_timeout;
        loop {
            match self.decoder.com_port() {
                Some(true) => break,
                Some(false) => {
                    return Err(Error::Telnet("server refused COM-PORT-OPTION".into()));
                }
                None => {
                    if !self.fill(deadline).await? {
                        return Err(Error::Telnet("no COM-PORT-OPTION answer".into()));
                    }
                }
            }
        }

        let baud_rate = self.settings.initial_baud_rate;
        self.send_com_port(SET_BAUDRATE, &baud_rate.to_be_bytes()).await?;
        self.send_com_port(SET_DATASIZE, &[7]).await?;
        self.send_com_port(SET_PARITY, &[PARITY_EVEN]).await?;
        self.send_com_port(SET_STOPSIZE, &[STOPSIZE_ONE]).await?;

        Ok(())
    }
}

#[async_trait]
impl Inbound for Rfc2217Transport {
    fn inbox(&mut self) -> &mut BytesMut {
        &mut self.inbox
    }

    async fn fill(&mut self, deadline: Instant) -> Result<bool> {
        let stream = self.stream.as_mut().ok_or(Error::NotOpen)?;

        let mut chunk = [0u8; 256];
        let n = match timeout_at(deadline, stream.read(&mut chunk)).await {
            Err(_) => return Ok(false),
            Ok(result) => result?,
        };

        if n == 0 {
            return Err(Error::ConnectionClosed);
        }

        trace!("Received {} raw bytes: {:02X?}", n, &chunk[..n]);
        self.decoder.decode(&chunk[..n], &mut self.inbox);

        let replies = self.decoder.take_replies();
        if !replies.is_empty() {
            self.send_raw(&replies).await?;
        }

        Ok(true)
    }
}

#[async_trait]
impl Transport for Rfc2217Transport {
    async fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Err(Error::AlreadyOpen);
        }

        let addr = format!("{}:{}", self.host, self.port);
        debug!("Connecting to {} (RFC2217)...", addr);

        let stream = timeout(self.settings.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::ConnectionTimeout)?
            .map_err(Error::Io)?;

        stream.set_nodelay(true)?;

        self.stream = Some(stream);
        self.decoder = TelnetDecoder::new();
        self.inbox.clear();

        if let Err(e) = self.negotiate().await {
            self.release();
            return Err(e);
        }

        debug!("Connected to {}", addr);
        Ok(())
    }

    fn release(&mut self) {
        if self.stream.take().is_some() {
            debug!("Released {}", self.name());
        }
        self.inbox.clear();
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        trace!("Sending {} bytes: {:02X?}", data.len(), data);
        self.send_raw(&escape(data)).await
    }

    async fn read(&mut self, n: usize) -> Result<BytesMut> {
        let timeout = self.settings.read_timeout;
        inbox::read_count(self, n, timeout).await
    }

    async fn read_until(&mut self, delimiter: u8) -> Result<BytesMut> {
        let timeout = self.settings.read_timeout;
        inbox::read_until(self, delimiter, timeout).await
    }

    async fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        debug!("Switching {} to {} baud", self.name(), baud_rate);
        self.send_com_port(SET_BAUDRATE, &baud_rate.to_be_bytes()).await
    }

    async fn flush_input(&mut self) -> Result<()> {
        self.inbox.clear();
        self.send_com_port(PURGE_DATA, &[PURGE_RECEIVE]).await
    }

    async fn flush(&mut self) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotOpen)?;
        stream.flush().await?;
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout: Duration) {
        self.settings.read_timeout = timeout;
    }

    fn is_tunnelled(&self) -> bool {
        true
    }

    fn name(&self) -> String {
        format!("rfc2217://{}:{}", self.host, self.port)
    }
}

impl Drop for Rfc2217Transport {
    fn drop(&mut self) {
        if self.is_open() {
            warn!("RFC2217 transport dropped while still connected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_url() {
        assert_eq!(
            parse_url("rfc2217://192.168.1.50:4001").unwrap(),
            ("192.168.1.50".to_string(), 4001)
        );
        assert_eq!(
            parse_url("rfc2217://meter-gw:2217?logging=debug").unwrap(),
            ("meter-gw".to_string(), 2217)
        );
        assert!(matches!(parse_url("/dev/ttyUSB0"), Err(Error::InvalidUrl(_))));
        assert!(parse_url("rfc2217://host").is_err());
        assert!(parse_url("rfc2217://:4001").is_err());
        assert!(parse_url("rfc2217://host:99999").is_err());
    }

    #[test]
    fn test_decoder_strips_commands() {
        let mut decoder = TelnetDecoder::new();
        let mut out = BytesMut::new();

        decoder.decode(
            &[b'/', IAC, DO, COM_PORT_OPTION, b'T', IAC, IAC, IAC, SB, 44, 101, 0, IAC, SE, b'P'],
            &mut out,
        );

        assert_eq!(&out[..], &[b'/', b'T', IAC, b'P']);
        assert_eq!(decoder.com_port(), Some(true));
        assert!(decoder.take_replies().is_empty());
    }

    #[test]
    fn test_decoder_split_across_chunks() {
        let mut decoder = TelnetDecoder::new();
        let mut out = BytesMut::new();

        decoder.decode(&[b'A', IAC], &mut out);
        decoder.decode(&[DO], &mut out);
        decoder.decode(&[COM_PORT_OPTION, b'B'], &mut out);

        assert_eq!(&out[..], b"AB");
        assert_eq!(decoder.com_port(), Some(true));
    }

    #[test]
    fn test_decoder_refuses_unknown_options() {
        let mut decoder = TelnetDecoder::new();
        let mut out = BytesMut::new();

        decoder.decode(&[IAC, DO, 24, IAC, WILL, 1], &mut out);

        assert!(out.is_empty());
        assert_eq!(decoder.take_replies(), vec![IAC, WONT, 24, IAC, DONT, 1]);
        assert!(decoder.take_replies().is_empty());
    }

    #[test]
    fn test_com_port_command() {
        assert_eq!(
            com_port_command(SET_BAUDRATE, &9600u32.to_be_bytes()),
            vec![IAC, SB, COM_PORT_OPTION, SET_BAUDRATE, 0, 0, 0x25, 0x80, IAC, SE]
        );
        assert_eq!(
            com_port_command(SET_BAUDRATE, &[0, 0, 0, IAC]),
            vec![IAC, SB, COM_PORT_OPTION, SET_BAUDRATE, 0, 0, 0, IAC, IAC, IAC, SE]
        );
    }

    #[tokio::test]
    async fn test_rfc2217_open_and_read() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            let mut offer = [0u8; 15];
            socket.read_exact(&mut offer).await.unwrap();
            assert_eq!(&offer[..3], &[IAC, WILL, COM_PORT_OPTION]);

            socket.write_all(&[IAC, DO, COM_PORT_OPTION]).await.unwrap();

            // baud (4 bytes), datasize, parity, stopsize
            let mut settings = [0u8; 10 + 7 + 7 + 7];
            socket.read_exact(&mut settings).await.unwrap();
            assert_eq!(&settings[4..8], &300u32.to_be_bytes());

            socket
                .write_all(b"/TPC5NEVA\xFF\xFB\x03MT324.1106\r\n")
                .await
                .unwrap();

            let mut request = [0u8; 5];
            socket.read_exact(&mut request).await.unwrap();
            request
        });

        let mut transport = Rfc2217Transport::new("127.0.0.1", port, SerialSettings::default())
            .with_read_timeout(Duration::from_secs(2));
        transport.open().await.unwrap();
        assert!(transport.is_open());
        assert!(transport.is_tunnelled());

        let id = transport.read_until(b'\n').await.unwrap();
        assert_eq!(&id[..], b"/TPC5NEVAMT324.1106\r\n");

        transport.write(b"/?!\r\n").await.unwrap();

        let request = server.await.unwrap();
        assert_eq!(&request, b"/?!\r\n");

        transport.release();
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_rfc2217_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut offer = [0u8; 15];
            socket.read_exact(&mut offer).await.unwrap();
            socket.write_all(&[IAC, DONT, COM_PORT_OPTION]).await.unwrap();
            let mut rest = Vec::new();
            let _ = socket.read_to_end(&mut rest).await;
        });

        let mut transport = Rfc2217Transport::new("127.0.0.1", port, SerialSettings::default());
        let result = transport.open().await;

        assert!(matches!(result, Err(Error::Telnet(_))));
        assert!(!transport.is_open());
    }
}
