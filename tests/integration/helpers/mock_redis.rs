//! Mock Redis endpoint for integration testing
//!
//! Speaks just enough RESP for the pool:
//! - `PING` answered with `+PONG`
//! - `AUTH` checked against an optional password
//! - `SELECT` accepted for any db
//! - failure and latency modes switchable at runtime

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::sleep;

/// Response mode for the mock endpoint
#[derive(Debug, Clone)]
#[allow(dead_code)] // Some variants are only used by a subset of scenarios
pub enum ResponseMode {
    /// Answer every command
    Normal,
    /// Close the connection as soon as a command arrives
    Failure,
    /// Answer with `-LOADING` so the probe sees a server error
    Loading,
}

/// Statistics tracked by the mock endpoint
#[derive(Debug, Clone, Default)]
pub struct MockStats {
    pub connections: usize,
    pub pings: usize,
    pub auths: usize,
    pub selects: usize,
}

pub struct MockRedis {
    addr: String,
    response_mode: Arc<Mutex<ResponseMode>>,
    latency: Arc<Mutex<Option<Duration>>>,
    stats: Arc<Mutex<MockStats>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl MockRedis {
    pub async fn new() -> std::io::Result<Self> {
        MockRedisBuilder::new().build().await
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn host(&self) -> &str {
        self.addr.rsplit_once(':').map(|(h, _)| h).unwrap_or("127.0.0.1")
    }

    pub fn port(&self) -> u16 {
        self.addr
            .rsplit_once(':')
            .and_then(|(_, p)| p.parse().ok())
            .unwrap_or(0)
    }

    pub fn set_response_mode(&self, mode: ResponseMode) {
        *self.response_mode.lock().unwrap() = mode;
    }

    #[allow(dead_code)]
    pub fn set_latency(&self, duration: Option<Duration>) {
        *self.latency.lock().unwrap() = duration;
    }

    pub fn stats(&self) -> MockStats {
        self.stats.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn shutdown(self) {
        if let Some(tx) = self.shutdown_tx {
            let _ = tx.send(());
        }
    }
}

/// Builder for MockRedis with fluent configuration
pub struct MockRedisBuilder {
    response_mode: ResponseMode,
    password: Option<String>,
    latency: Option<Duration>,
}

impl MockRedisBuilder {
    pub fn new() -> Self {
        Self {
            response_mode: ResponseMode::Normal,
            password: None,
            latency: None,
        }
    }

    #[allow(dead_code)]
    pub fn response_mode(mut self, mode: ResponseMode) -> Self {
        self.response_mode = mode;
        self
    }

    #[allow(dead_code)]
    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    #[allow(dead_code)]
    pub fn latency(mut self, duration: Duration) -> Self {
        self.latency = Some(duration);
        self
    }

    pub async fn build(self) -> std::io::Result<MockRedis> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?.to_string();

        let response_mode = Arc::new(Mutex::new(self.response_mode));
        let latency = Arc::new(Mutex::new(self.latency));
        let stats = Arc::new(Mutex::new(MockStats::default()));
        let password = Arc::new(self.password);

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel();

        let response_mode_clone = Arc::clone(&response_mode);
        let latency_clone = Arc::clone(&latency);
        let stats_clone = Arc::clone(&stats);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok((stream, _)) => {
                                stats_clone.lock().unwrap().connections += 1;
                                let response_mode = Arc::clone(&response_mode_clone);
                                let latency = Arc::clone(&latency_clone);
                                let stats = Arc::clone(&stats_clone);
                                let password = Arc::clone(&password);

                                tokio::spawn(async move {
                                    let _ = handle_connection(
                                        stream,
                                        response_mode,
                                        latency,
                                        stats,
                                        password,
                                    )
                                    .await;
                                });
                            }
                            Err(_) => break,
                        }
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }
        });

        Ok(MockRedis {
            addr,
            response_mode,
            latency,
            stats,
            shutdown_tx: Some(shutdown_tx),
        })
    }
}

impl Default for MockRedisBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull every command out of a buffer of RESP arrays
fn parse_commands(buffer: &str) -> Vec<Vec<String>> {
    let mut commands = Vec::new();
    let mut lines = buffer.split("\r\n").filter(|l| !l.is_empty());

    while let Some(line) = lines.next() {
        let Some(count) = line.strip_prefix('*').and_then(|n| n.parse::<usize>().ok()) else {
            continue;
        };
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            // Skip the `$len` header, keep the payload
            let _ = lines.next();
            if let Some(arg) = lines.next() {
                args.push(arg.to_string());
            }
        }
        commands.push(args);
    }

    commands
}

async fn handle_connection(
    mut stream: TcpStream,
    response_mode: Arc<Mutex<ResponseMode>>,
    latency: Arc<Mutex<Option<Duration>>>,
    stats: Arc<Mutex<MockStats>>,
    password: Arc<Option<String>>,
) -> std::io::Result<()> {
    let mut buffer = vec![0u8; 4096];

    loop {
        let n = match stream.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => break,
        };

        let delay_duration = *latency.lock().unwrap();
        if let Some(delay) = delay_duration {
            sleep(delay).await;
        }

        let mode = response_mode.lock().unwrap().clone();
        if matches!(mode, ResponseMode::Failure) {
            break;
        }

        let request = String::from_utf8_lossy(&buffer[..n]).to_string();
        let mut response = String::new();

        for args in parse_commands(&request) {
            let name = args.first().map(|s| s.to_uppercase()).unwrap_or_default();
            let reply = match name.as_str() {
                "PING" => {
                    stats.lock().unwrap().pings += 1;
                    if matches!(mode, ResponseMode::Loading) {
                        "-LOADING Redis is loading the dataset in memory\r\n".to_string()
                    } else {
                        "+PONG\r\n".to_string()
                    }
                }
                "AUTH" => {
                    stats.lock().unwrap().auths += 1;
                    match (password.as_deref(), args.last().map(String::as_str)) {
                        (Some(expected), Some(given)) if expected == given => "+OK\r\n".to_string(),
                        _ => "-WRONGPASS invalid username-password pair\r\n".to_string(),
                    }
                }
                "SELECT" => {
                    stats.lock().unwrap().selects += 1;
                    "+OK\r\n".to_string()
                }
                other => format!("-ERR unknown command '{}'\r\n", other),
            };
            response.push_str(&reply);
        }

        if stream.write_all(response.as_bytes()).await.is_err() {
            break;
        }
        stream.flush().await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        let buffer = "*1\r\n$4\r\nPING\r\n*2\r\n$6\r\nSELECT\r\n$1\r\n3\r\n";
        let commands = parse_commands(buffer);
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0], vec!["PING"]);
        assert_eq!(commands[1], vec!["SELECT", "3"]);
    }
}
