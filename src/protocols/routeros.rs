//! Minimal RouterOS API client (TCP 8728)
//!
//! Every message is a *sentence*: a sequence of length-prefixed *words*
//! terminated by an empty word. Replies start with `!re` (one row), `!done`
//! (end of reply), `!trap` (command error) or `!fatal` (connection closing).
//! Attribute words have the form `=key=value`.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

pub type RouterOsResult<T> = Result<T, RouterOsError>;

/// Longest word accepted from a device
pub const MAX_WORD_LEN: usize = 64 * 1024;

/// One reply row, attribute name to value
pub type Attributes = HashMap<String, String>;

#[derive(Debug)]
pub enum RouterOsError {
    Io(std::io::Error),

    /// Connect or command did not finish in time
    Timeout,

    /// Credentials were refused
    LoginFailed(String),

    /// Command returned `!trap`
    Trap(String),

    /// Device sent `!fatal` and closed the session
    Fatal(String),

    /// Wire data could not be decoded
    Protocol(String),
}

impl fmt::Display for RouterOsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterOsError::Io(err) => write!(f, "I/O error: {err}"),
            RouterOsError::Timeout => write!(f, "operation timed out"),
            RouterOsError::LoginFailed(msg) => write!(f, "login failed: {msg}"),
            RouterOsError::Trap(msg) => write!(f, "command failed: {msg}"),
            RouterOsError::Fatal(msg) => write!(f, "fatal error from device: {msg}"),
            RouterOsError::Protocol(msg) => write!(f, "protocol error: {msg}"),
        }
    }
}

impl std::error::Error for RouterOsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RouterOsError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RouterOsError {
    fn from(err: std::io::Error) -> Self {
        RouterOsError::Io(err)
    }
}

/// Encode a word length using the RouterOS variable-length scheme
pub fn encode_length(len: usize) -> Vec<u8> {
    let len = len as u32;
    match len {
        0..=0x7F => vec![len as u8],
        0x80..=0x3FFF => {
            let v = len | 0x8000;
            vec![(v >> 8) as u8, v as u8]
        }
        0x4000..=0x1F_FFFF => {
            let v = len | 0xC0_0000;
            vec![(v >> 16) as u8, (v >> 8) as u8, v as u8]
        }
        0x20_0000..=0x0FFF_FFFF => {
            let v = len | 0xE000_0000;
            vec![(v >> 24) as u8, (v >> 16) as u8, (v >> 8) as u8, v as u8]
        }
        _ => vec![
            0xF0,
            (len >> 24) as u8,
            (len >> 16) as u8,
            (len >> 8) as u8,
            len as u8,
        ],
    }
}

async fn read_length<R: AsyncRead + Unpin>(reader: &mut R) -> RouterOsResult<usize> {
    let first = reader.read_u8().await?;

    let (mut value, extra) = match first {
        b if b & 0x80 == 0x00 => (u32::from(b), 0),
        b if b & 0xC0 == 0x80 => (u32::from(b & 0x3F), 1),
        b if b & 0xE0 == 0xC0 => (u32::from(b & 0x1F), 2),
        b if b & 0xF0 == 0xE0 => (u32::from(b & 0x0F), 3),
        0xF0 => (0, 4),
        b => {
            return Err(RouterOsError::Protocol(format!(
                "invalid length prefix 0x{b:02X}"
            )));
        }
    };

    for _ in 0..extra {
        value = (value << 8) | u32::from(reader.read_u8().await?);
    }

    Ok(value as usize)
}

/// Serialize `words` as one sentence (including the terminating empty word)
pub fn encode_sentence<S: AsRef<str>>(words: &[S]) -> Vec<u8> {
    let mut buf = Vec::new();
    for word in words {
        let bytes = word.as_ref().as_bytes();
        buf.extend(encode_length(bytes.len()));
        buf.extend_from_slice(bytes);
    }
    buf.push(0);
    buf
}

pub async fn read_sentence<R: AsyncRead + Unpin>(reader: &mut R) -> RouterOsResult<Vec<String>> {
    let mut words = Vec::new();
    loop {
        let len = read_length(reader).await?;
        if len == 0 {
            return Ok(words);
        }
        if len > MAX_WORD_LEN {
            return Err(RouterOsError::Protocol(format!(
                "word of {len} bytes exceeds the {MAX_WORD_LEN} byte limit"
            )));
        }

        let mut word = vec![0u8; len];
        reader.read_exact(&mut word).await?;
        words.push(String::from_utf8_lossy(&word).into_owned());
    }
}

/// Split `=key=value` words of a reply sentence into attributes
fn parse_attributes(words: &[String]) -> Attributes {
    words
        .iter()
        .filter_map(|word| word.strip_prefix('='))
        .filter_map(|word| word.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// Authenticated API session over any byte stream
pub struct RouterOsClient<S> {
    stream: S,
}

impl RouterOsClient<TcpStream> {
    /// Connect to `addr` and log in, bounded by `timeout`
    pub async fn connect(
        addr: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> RouterOsResult<Self> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| RouterOsError::Timeout)??;

        let mut client = RouterOsClient::new(stream);
        tokio::time::timeout(timeout, client.login(username, password))
            .await
            .map_err(|_| RouterOsError::Timeout)??;

        debug!("logged in to {addr}");
        Ok(client)
    }
}

impl<S> RouterOsClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Post-6.43 plain-text login
    pub async fn login(&mut self, username: &str, password: &str) -> RouterOsResult<()> {
        let name = format!("=name={username}");
        let password = format!("=password={password}");

        match self.run_with(&["/login", &name, &password]).await {
            Ok(_) => Ok(()),
            Err(RouterOsError::Trap(msg)) => Err(RouterOsError::LoginFailed(msg)),
            Err(e) => Err(e),
        }
    }

    /// Run a command without arguments and collect all `!re` rows
    pub async fn run(&mut self, command: &str) -> RouterOsResult<Vec<Attributes>> {
        self.run_with(&[command]).await
    }

    pub async fn run_with(&mut self, words: &[&str]) -> RouterOsResult<Vec<Attributes>> {
        trace!("sending {:?}", words.first());
        self.stream.write_all(&encode_sentence(words)).await?;
        self.stream.flush().await?;

        let mut rows = Vec::new();
        let mut trap: Option<String> = None;

        loop {
            let sentence = read_sentence(&mut self.stream).await?;
            let Some(reply) = sentence.first() else {
                continue;
            };

            match reply.as_str() {
                "!re" => rows.push(parse_attributes(&sentence[1..])),
                "!done" => break,
                "!trap" => {
                    let attributes = parse_attributes(&sentence[1..]);
                    trap = Some(
                        attributes
                            .get("message")
                            .cloned()
                            .unwrap_or_else(|| "unknown error".to_string()),
                    );
                }
                "!fatal" => {
                    let message = sentence.get(1).cloned().unwrap_or_default();
                    return Err(RouterOsError::Fatal(message));
                }
                other => {
                    return Err(RouterOsError::Protocol(format!(
                        "unexpected reply word '{other}'"
                    )));
                }
            }
        }

        match trap {
            Some(message) => Err(RouterOsError::Trap(message)),
            None => Ok(rows),
        }
    }
}
