//! Per-tick TCP delivery of the latest metric record.
//!
//! The transport serves exactly one consumer per collection tick: wait a
//! bounded time for a connection, write one CSV line, close. A consumer is
//! expected to connect fresh each cycle.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::protocol::MetricRecord;

/// Listens for metric subscribers and hands each one the current record.
pub struct MetricServer {
    listener: TcpListener,
}

impl MetricServer {
    /// Bind the delivery socket.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "listening for metric subscribers");
        Ok(Self { listener })
    }

    /// The address the server is actually bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Wait up to `budget` for one subscriber and send it the record.
    ///
    /// Returns `Ok(false)` if no subscriber connected within the budget;
    /// the tick's record is simply dropped rather than blocking the driver.
    pub async fn deliver(&self, record: &MetricRecord, budget: Duration) -> io::Result<bool> {
        match timeout(budget, self.listener.accept()).await {
            Ok(Ok((mut stream, peer))) => {
                let mut line = record.to_wire_line();
                line.push('\n');
                stream.write_all(line.as_bytes()).await?;
                stream.shutdown().await?;
                debug!(%peer, "delivered metric record");
                Ok(true)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                debug!("no subscriber within delivery budget, skipping tick");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpStream;

    fn test_record() -> MetricRecord {
        MetricRecord {
            cpu_usage: 42.5,
            memory_usage: 61.0,
            disk_io: 3.25,
            network_usage: 0.75,
            timestamp: "2025-06-01 12:00:00".to_string(),
        }
    }

    #[tokio::test]
    async fn test_deliver_to_connected_subscriber() {
        let server = MetricServer::bind("127.0.0.1:0".parse().unwrap())
            .await
            .expect("bind should succeed");
        let addr = server.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.expect("connect");
            let mut buf = String::new();
            stream.read_to_string(&mut buf).await.expect("read");
            buf
        });

        let delivered = server
            .deliver(&test_record(), Duration::from_secs(5))
            .await
            .expect("deliver should succeed");
        assert!(delivered);

        let line = client.await.unwrap();
        let parsed = MetricRecord::from_wire_line(&line).expect("line should parse");
        assert_eq!(parsed, test_record());
    }

    #[tokio::test]
    async fn test_deliver_skips_tick_without_subscriber() {
        let server = MetricServer::bind("127.0.0.1:0".parse().unwrap())
            .await
            .expect("bind should succeed");

        let delivered = server
            .deliver(&test_record(), Duration::from_millis(50))
            .await
            .expect("deliver should not error on timeout");
        assert!(!delivered);
    }

    #[tokio::test]
    async fn test_one_record_per_connection() {
        let server = MetricServer::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();

        for tick in 0..3u32 {
            let record = MetricRecord {
                cpu_usage: tick as f64,
                ..test_record()
            };

            let client = tokio::spawn(async move {
                let mut stream = TcpStream::connect(addr).await.expect("connect");
                let mut buf = String::new();
                stream.read_to_string(&mut buf).await.expect("read");
                buf
            });

            let delivered = server
                .deliver(&record, Duration::from_secs(5))
                .await
                .unwrap();
            assert!(delivered);

            let line = client.await.unwrap();
            let parsed = MetricRecord::from_wire_line(&line).unwrap();
            assert_eq!(parsed.cpu_usage, tick as f64);
        }
    }
}
