//! Just enough RESP to dial and probe a Redis endpoint.
//!
//! Only the connection handshake (`AUTH`, `SELECT`) and `PING` are spoken
//! here. Every reply those commands produce is a single line, so the reader
//! never has to deal with bulk or nested replies.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Encode a command as a RESP array of bulk strings
pub fn encode_command(args: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + args.iter().map(|a| a.len() + 16).sum::<usize>());
    out.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// A single-line RESP reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Status(String),
    Error(String),
    Integer(i64),
}

pub fn parse_reply_line(line: &str) -> Result<Reply, RespError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut chars = line.chars();
    match chars.next() {
        Some('+') => Ok(Reply::Status(chars.as_str().to_string())),
        Some('-') => Ok(Reply::Error(chars.as_str().to_string())),
        Some(':') => chars
            .as_str()
            .parse::<i64>()
            .map(Reply::Integer)
            .map_err(|_| RespError::Malformed(line.to_string())),
        Some(_) => Err(RespError::Unsupported(line.to_string())),
        None => Err(RespError::Malformed(line.to_string())),
    }
}

/// Send one command and read its single-line reply
pub async fn round_trip<S>(stream: &mut S, args: &[&[u8]]) -> Result<Reply, RespError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(&encode_command(args)).await?;
    stream.flush().await?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let bytes_read = reader.read_line(&mut line).await?;
    if bytes_read == 0 {
        return Err(RespError::ConnectionClosed);
    }
    // Single-line replies never leave buffered bytes behind for the next call
    parse_reply_line(&line)
}

/// `PING` must come back as `+PONG`
pub async fn ping<S>(stream: &mut S) -> Result<(), RespError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match round_trip(stream, &[b"PING"]).await? {
        Reply::Status(s) if s == "PONG" => Ok(()),
        Reply::Error(e) => Err(RespError::Server(e)),
        other => Err(RespError::UnexpectedReply(format!("{:?}", other))),
    }
}

/// Expect `+OK`, turning `-ERR ...` into [`RespError::Server`]
pub async fn expect_ok<S>(stream: &mut S, args: &[&[u8]]) -> Result<(), RespError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match round_trip(stream, args).await? {
        Reply::Status(s) if s == "OK" => Ok(()),
        Reply::Error(e) => Err(RespError::Server(e)),
        other => Err(RespError::UnexpectedReply(format!("{:?}", other))),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RespError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection closed by server")]
    ConnectionClosed,
    #[error("Server error: {0}")]
    Server(String),
    #[error("Malformed reply: {0}")]
    Malformed(String),
    #[error("Unsupported reply type: {0}")]
    Unsupported(String),
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),
}
