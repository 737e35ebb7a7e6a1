use std::net::ToSocketAddrs;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};

use crate::protocol::{Result, TetherError, WireMessage};
use crate::transport::codec::JsonCodec;
use crate::transport::Transport;

/// Reference socket adapter for tether channels.
///
/// Wraps a TCP stream as a [`Transport`]: a writer task drains the outbound
/// queue onto the socket and a reader task decodes inbound frames, so `send`
/// stays fire-and-forget and inbound messages arrive in socket order. When
/// the socket becomes unusable (EOF, IO error, undecodable frame) the close
/// subscription resolves.
///
/// # Wire Protocol
///
/// Frames are sent with a 4-byte length prefix (big-endian u32) followed by
/// the JSON-encoded message:
///
/// ```text
/// [4-byte length] [JSON data]
/// ```
///
/// # Example
///
/// ```no_run
/// use tether_common::transport::{TcpTransport, Transport};
/// use tether_common::protocol::WireMessage;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = TcpTransport::connect("127.0.0.1:4870").await?;
/// transport.send(WireMessage::Expect { name: "add".into() })?;
/// # Ok(())
/// # }
/// ```
pub struct TcpTransport {
    outbound: mpsc::UnboundedSender<WireMessage>,
    inbound: Option<mpsc::UnboundedReceiver<WireMessage>>,
    close: Option<oneshot::Receiver<()>>,
}

/// Frames larger than this are rejected to prevent allocation of
/// excessively large buffers.
const MAX_FRAME_SIZE: usize = 100 * 1024 * 1024; // 100 MB

impl TcpTransport {
    /// Connects to a remote endpoint.
    ///
    /// Resolves the address (which may resolve to multiple addresses) and
    /// attempts to connect to each until one succeeds. Fails if the
    /// endpoint is unreachable; a channel can only open over a live socket.
    ///
    /// # Arguments
    ///
    /// * `addr` - The address to connect to (e.g., "127.0.0.1:4870")
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be parsed or connection fails
    /// to all resolved addresses.
    pub async fn connect(addr: &str) -> Result<Self> {
        let socket_addrs = addr
            .to_socket_addrs()
            .map_err(|e| TetherError::Connection(format!("Invalid address '{}': {}", addr, e)))?;

        let mut last_err = None;
        for socket_addr in socket_addrs {
            match TcpStream::connect(&socket_addr).await {
                Ok(stream) => return Ok(Self::from_stream(stream)),
                Err(e) => {
                    last_err = Some(e);
                }
            }
        }

        Err(TetherError::Connection(format!(
            "Failed to connect to {}: {}",
            addr,
            last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string())
        )))
    }

    /// Wraps an already-connected stream, typically one returned by
    /// `TcpListener::accept`.
    pub fn from_stream(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = oneshot::channel();

        tokio::spawn(write_loop(write_half, outbound_rx));
        tokio::spawn(read_loop(read_half, inbound_tx, close_tx));

        Self {
            outbound: outbound_tx,
            inbound: Some(inbound_rx),
            close: Some(close_rx),
        }
    }
}

impl Transport for TcpTransport {
    fn send(&self, message: WireMessage) -> Result<()> {
        self.outbound
            .send(message)
            .map_err(|_| TetherError::Transport("socket writer terminated".into()))
    }

    fn subscribe_inbound(&mut self) -> mpsc::UnboundedReceiver<WireMessage> {
        self.inbound.take().expect("inbound already subscribed")
    }

    fn subscribe_close(&mut self) -> oneshot::Receiver<()> {
        self.close.take().expect("close already subscribed")
    }
}

/// Drains the outbound queue onto the socket, one frame per message.
async fn write_loop(
    mut write_half: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<WireMessage>,
) {
    while let Some(message) = outbound.recv().await {
        let data = match JsonCodec::encode(&message) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("failed to encode outbound message: {}", e);
                continue;
            }
        };
        if let Err(e) = write_frame(&mut write_half, &data).await {
            tracing::debug!("socket write ended: {}", e);
            break;
        }
    }
}

/// Decodes inbound frames until the socket ends, then signals close.
///
/// An undecodable frame is permanent: ordered exactly-once delivery cannot
/// be assumed past it, so the transport closes.
async fn read_loop(
    mut read_half: OwnedReadHalf,
    inbound: mpsc::UnboundedSender<WireMessage>,
    close: oneshot::Sender<()>,
) {
    loop {
        let data = match read_frame(&mut read_half).await {
            Ok(data) => data,
            Err(e) => {
                tracing::debug!("socket read ended: {}", e);
                break;
            }
        };
        match JsonCodec::decode(&data) {
            Ok(message) => {
                if inbound.send(message).is_err() {
                    // Receiver gone: the channel over this transport is done.
                    break;
                }
            }
            Err(e) => {
                tracing::error!("undecodable frame from peer: {}", e);
                break;
            }
        }
    }
    let _ = close.send(());
}

/// Sends one frame: `[4-byte length as u32 big-endian] + [data]`.
async fn write_frame(write_half: &mut OwnedWriteHalf, data: &[u8]) -> Result<()> {
    let len = data.len() as u32;

    write_half
        .write_all(&len.to_be_bytes())
        .await
        .map_err(|e| map_io_error(e, "writing length prefix"))?;

    write_half
        .write_all(data)
        .await
        .map_err(|e| map_io_error(e, "writing data"))?;

    write_half
        .flush()
        .await
        .map_err(|e| map_io_error(e, "flushing stream"))?;

    Ok(())
}

/// Receives one frame: `[4-byte length as u32 big-endian] + [data]`.
async fn read_frame(read_half: &mut OwnedReadHalf) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    read_half
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| map_io_error(e, "reading length prefix"))?;

    let len = u32::from_be_bytes(len_buf) as usize;

    if len > MAX_FRAME_SIZE {
        return Err(TetherError::Transport(format!(
            "Frame too large: {} bytes (max {} bytes)",
            len, MAX_FRAME_SIZE
        )));
    }

    let mut buf = vec![0u8; len];
    read_half
        .read_exact(&mut buf)
        .await
        .map_err(|e| map_io_error(e, "reading data"))?;

    Ok(buf)
}

/// Map IO errors to appropriate TetherError variants
///
/// Converts standard IO errors into domain-specific errors:
/// - Connection errors -> `Connection`
/// - Other IO errors -> `Io`
fn map_io_error(err: std::io::Error, context: &str) -> TetherError {
    match err.kind() {
        std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::ConnectionAborted
        | std::io::ErrorKind::NotConnected
        | std::io::ErrorKind::UnexpectedEof => {
            TetherError::Connection(format!("{}: Connection lost", context))
        }
        _ => TetherError::Io(err),
    }
}
