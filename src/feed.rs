use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpStream,
    time::timeout,
};

/// Upper bound on a single wait for the next inbound message. Expiring the
/// wait is not an error; it only keeps the ingestion loop responsive.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed closed by the upstream")]
    Closed,
    #[error("feed transport failure: {0}")]
    Io(#[from] std::io::Error),
}

/// One raw message from the inbound feed. Only `payload` carries application
/// data; the rest is transport metadata, used for logging.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub payload: Bytes,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// Pull interface over the inbound transport. `Ok(None)` means the bounded
/// wait elapsed without a message; any `FeedError` is unrecoverable.
#[async_trait]
pub trait Feed: Send {
    async fn next(&mut self) -> Result<Option<InboundMessage>, FeedError>;
}

/// Feed over a TCP connection delivering one payload per newline-delimited
/// line. Blank lines are skipped.
pub struct TcpFeed {
    reader: BufReader<TcpStream>,
    line: Vec<u8>,
    topic: String,
    offset: i64,
}

impl TcpFeed {
    pub async fn connect(addr: &str, topic: impl Into<String>) -> Result<Self, FeedError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(TcpFeed {
            reader: BufReader::new(stream),
            line: Vec::new(),
            topic: topic.into(),
            offset: 0,
        })
    }
}

#[async_trait]
impl Feed for TcpFeed {
    async fn next(&mut self) -> Result<Option<InboundMessage>, FeedError> {
        // read_until is cancel safe: a timed-out wait leaves any partially
        // read bytes in `self.line` for the next call to finish.
        match timeout(POLL_TIMEOUT, self.reader.read_until(b'\n', &mut self.line)).await {
            Err(_) => Ok(None),
            Ok(Ok(0)) => Err(FeedError::Closed),
            Ok(Ok(_)) => {
                let mut line = std::mem::take(&mut self.line);
                while line.last().is_some_and(|&b| b == b'\n' || b == b'\r') {
                    line.pop();
                }
                if line.is_empty() {
                    return Ok(None);
                }
                let message = InboundMessage {
                    payload: Bytes::from(line),
                    topic: self.topic.clone(),
                    partition: 0,
                    offset: self.offset,
                };
                self.offset += 1;
                Ok(Some(message))
            }
            Ok(Err(err)) => Err(err.into()),
        }
    }
}

/// In-process feed backed by a channel, for exercising the ingestion loop
/// without a socket.
#[cfg(test)]
pub struct ChannelFeed {
    receiver: tokio::sync::mpsc::UnboundedReceiver<Bytes>,
    offset: i64,
}

#[cfg(test)]
impl ChannelFeed {
    pub fn new() -> (tokio::sync::mpsc::UnboundedSender<Bytes>, Self) {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        (
            sender,
            ChannelFeed {
                receiver,
                offset: 0,
            },
        )
    }
}

#[cfg(test)]
#[async_trait]
impl Feed for ChannelFeed {
    async fn next(&mut self) -> Result<Option<InboundMessage>, FeedError> {
        match timeout(POLL_TIMEOUT, self.receiver.recv()).await {
            Err(_) => Ok(None),
            Ok(None) => Err(FeedError::Closed),
            Ok(Some(payload)) => {
                let message = InboundMessage {
                    payload,
                    topic: "test".to_string(),
                    partition: 0,
                    offset: self.offset,
                };
                self.offset += 1;
                Ok(Some(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::{io::AsyncWriteExt, net::TcpListener};

    use super::{Feed, FeedError, TcpFeed};

    #[tokio::test]
    async fn tcp_feed_yields_lines_then_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let producer = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"{\"a\":1}\n\r\n{\"b\":2}\r\n")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });

        let mut feed = TcpFeed::connect(&addr.to_string(), "hazards").await.unwrap();

        let first = feed.next().await.unwrap().unwrap();
        assert_eq!(&first.payload[..], b"{\"a\":1}");
        assert_eq!(first.topic, "hazards");
        assert_eq!(first.offset, 0);

        // The blank line is skipped without producing a message
        assert!(feed.next().await.unwrap().is_none());

        let second = feed.next().await.unwrap().unwrap();
        assert_eq!(&second.payload[..], b"{\"b\":2}");
        assert_eq!(second.offset, 1);

        assert!(matches!(feed.next().await, Err(FeedError::Closed)));
        producer.await.unwrap();
    }
}
