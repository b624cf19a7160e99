//! TCP connection factory for the detection service.

use std::io;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time;

use crate::config::DetectorConfig;
use crate::net::codec;
use crate::pool::ConnectionFactory;

/// Dials the detection service and probes connections with a heartbeat.
#[derive(Debug, Clone)]
pub struct TcpFactory {
    addr: String,
    timeout: Duration,
}

impl TcpFactory {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(config.address.clone(), config.connect_timeout())
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl ConnectionFactory for TcpFactory {
    type Connection = TcpStream;

    async fn create(&self) -> io::Result<TcpStream> {
        match time::timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect to {} timed out", self.addr),
            )),
        }
    }

    async fn close(&self, mut conn: TcpStream) -> io::Result<()> {
        conn.shutdown().await
    }

    async fn probe(&self, conn: &mut TcpStream) -> io::Result<()> {
        match time::timeout(self.timeout, codec::heartbeat(conn)).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "heartbeat timed out")),
        }
    }
}
