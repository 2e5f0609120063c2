//! Links between the drone and the autopilot.
//!
//! A [MessageTransport] delivers outbound messages and reports whether the autopilot is
//! reachable. Inbound messages flow the other way through an [InboundSender], which the
//! drone hands to its transport when it is built.

use std::sync::{
    Arc, OnceLock,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use log::warn;

use crate::HilError;
use crate::protocol::{Endpoint, InboundEnvelope, InboundMessage, OutboundEnvelope};

#[cfg(feature = "mavlink")]
pub mod mavlink;

/// Non-blocking handle for queueing inbound messages on a drone.
///
/// Cheap to clone; every clone feeds the same queue, which the drone drains in arrival
/// order on its next tick.
#[derive(Clone, Debug)]
pub struct InboundSender {
    queue: Sender<InboundEnvelope>,
}

impl InboundSender {
    pub(crate) fn new(queue: Sender<InboundEnvelope>) -> Self {
        InboundSender { queue }
    }

    /// Queues a message. Returns false when the drone is gone.
    pub fn send(&self, envelope: InboundEnvelope) -> bool {
        self.queue.send(envelope).is_ok()
    }
}

/// Outbound side of the link to the autopilot.
pub trait MessageTransport: Send {
    /// Called once by the drone with the handle inbound messages must be pushed to.
    fn attach(&mut self, inbound: InboundSender) -> Result<(), HilError>;

    fn is_connected(&self) -> bool;

    fn send(&self, envelope: OutboundEnvelope) -> Result<(), HilError>;
}

impl<T: MessageTransport + ?Sized> MessageTransport for Box<T> {
    fn attach(&mut self, inbound: InboundSender) -> Result<(), HilError> {
        (**self).attach(inbound)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn send(&self, envelope: OutboundEnvelope) -> Result<(), HilError> {
        (**self).send(envelope)
    }
}

/// In-process transport over channels.
///
/// Created in pairs with an [AutopilotEndpoint] that plays the autopilot: it sees every
/// outbound message and can inject inbound ones. Dropping the endpoint disconnects the
/// transport.
pub struct ChannelTransport {
    outbound: Sender<OutboundEnvelope>,
    inbound: Arc<OnceLock<InboundSender>>,
    connected: Arc<AtomicBool>,
}

impl ChannelTransport {
    pub fn pair() -> (ChannelTransport, AutopilotEndpoint) {
        let (sender, receiver) = unbounded();
        let inbound = Arc::new(OnceLock::new());
        let connected = Arc::new(AtomicBool::new(true));

        let transport = ChannelTransport {
            outbound: sender,
            inbound: Arc::clone(&inbound),
            connected: Arc::clone(&connected),
        };
        let endpoint = AutopilotEndpoint {
            outbound: receiver,
            inbound,
            connected,
        };
        (transport, endpoint)
    }
}

impl MessageTransport for ChannelTransport {
    fn attach(&mut self, inbound: InboundSender) -> Result<(), HilError> {
        self.inbound
            .set(inbound)
            .map_err(|_| HilError::Connection("transport is already attached".to_string()))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn send(&self, envelope: OutboundEnvelope) -> Result<(), HilError> {
        self.outbound
            .send(envelope)
            .map_err(|_| HilError::Connection("autopilot endpoint dropped".to_string()))
    }
}

/// The autopilot's end of a [ChannelTransport].
pub struct AutopilotEndpoint {
    outbound: Receiver<OutboundEnvelope>,
    inbound: Arc<OnceLock<InboundSender>>,
    connected: Arc<AtomicBool>,
}

impl AutopilotEndpoint {
    /// Sends `message` to the drone as if it came from `sender`.
    pub fn send(&self, sender: Endpoint, message: InboundMessage) -> Result<(), HilError> {
        let inbound = self
            .inbound
            .get()
            .ok_or_else(|| HilError::Connection("no drone attached".to_string()))?;
        if inbound.send(InboundEnvelope { sender, message }) {
            Ok(())
        } else {
            Err(HilError::Connection("drone dropped".to_string()))
        }
    }

    /// Everything published since the last call, in publish order.
    pub fn drain(&self) -> Vec<OutboundEnvelope> {
        self.outbound.try_iter().collect()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<OutboundEnvelope> {
        match self.outbound.recv_timeout(timeout) {
            Ok(envelope) => Some(envelope),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                warn!(target: "hil_bridge::transport", "drone side of the channel closed");
                None
            }
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }
}

impl Drop for AutopilotEndpoint {
    fn drop(&mut self) {
        self.connected.store(false, Ordering::Relaxed);
    }
}
