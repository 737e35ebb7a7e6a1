//! In-process transport for worker threads, pipes and tests.

use tokio::sync::{mpsc, oneshot};

use crate::protocol::{Result, TetherError, WireMessage};
use crate::transport::Transport;

/// One end of an in-process transport pair.
///
/// Messages sent on one end arrive on the other in send order, with no
/// serialization step. Dropping an end closes the peer: its inbound stream
/// ends, which the engine treats as a close notification.
///
/// # Example
///
/// ```
/// use tether_common::transport::{memory, Transport};
/// use tether_common::protocol::WireMessage;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (left, mut right) = memory::pair();
/// let mut inbound = right.subscribe_inbound();
///
/// left.send(WireMessage::Expect { name: "add".into() }).unwrap();
/// let received = inbound.recv().await.unwrap();
/// assert_eq!(received, WireMessage::Expect { name: "add".into() });
/// # }
/// ```
pub struct MemoryTransport {
    outbound: mpsc::UnboundedSender<WireMessage>,
    inbound: Option<mpsc::UnboundedReceiver<WireMessage>>,
    close: Option<oneshot::Receiver<()>>,
    // Held so the close subscription stays pending for this end's lifetime;
    // the peer learns about teardown from its inbound stream ending.
    _close_tx: oneshot::Sender<()>,
}

/// Creates two connected in-process transports.
pub fn pair() -> (MemoryTransport, MemoryTransport) {
    let (left_tx, right_rx) = mpsc::unbounded_channel();
    let (right_tx, left_rx) = mpsc::unbounded_channel();
    (
        MemoryTransport::new(left_tx, left_rx),
        MemoryTransport::new(right_tx, right_rx),
    )
}

impl MemoryTransport {
    fn new(
        outbound: mpsc::UnboundedSender<WireMessage>,
        inbound: mpsc::UnboundedReceiver<WireMessage>,
    ) -> Self {
        let (close_tx, close_rx) = oneshot::channel();
        Self {
            outbound,
            inbound: Some(inbound),
            close: Some(close_rx),
            _close_tx: close_tx,
        }
    }
}

impl Transport for MemoryTransport {
    fn send(&self, message: WireMessage) -> Result<()> {
        self.outbound
            .send(message)
            .map_err(|_| TetherError::Transport("peer endpoint dropped".into()))
    }

    fn subscribe_inbound(&mut self) -> mpsc::UnboundedReceiver<WireMessage> {
        self.inbound.take().expect("inbound already subscribed")
    }

    fn subscribe_close(&mut self) -> oneshot::Receiver<()> {
        self.close.take().expect("close already subscribed")
    }
}
