//! Per-connection protocol state and outbound queueing.

use slipstream_credential::Claims;
use slipstream_protocol::CloseCode;
use tokio::sync::mpsc;

/// A frame queued for delivery to one connection's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    /// Raw wire bytes to send as-is.
    Data(Vec<u8>),

    /// Close the transport with this code and reason, then stop writing.
    Close { code: CloseCode, reason: String },
}

/// Sending half of a connection's outbound queue. Held by the hub.
pub type OutboundSender = mpsc::Sender<OutboundFrame>;

/// Receiving half of a connection's outbound queue. Held by the writer
/// task that owns the socket.
pub type OutboundReceiver = mpsc::Receiver<OutboundFrame>;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The protocol lifecycle of one connection.
///
/// ```text
/// Unauthenticated ──(valid hello)──→ Authenticated
///        │                                │
///        └──────────→ Closed ←────────────┘
/// ```
///
/// `Closed` is terminal and reachable from both other states. The claims
/// binding is set exactly once, by the transition into `Authenticated`;
/// changing identity requires a new connection and a new hello.
#[derive(Debug, Clone)]
pub enum Phase {
    /// Connected, no hello received yet. No room membership.
    Unauthenticated,

    /// Hello verified; the bound claims name the identity, room, and
    /// callsign every later message is attributed to.
    Authenticated(Claims),

    /// Terminal. The connection is gone or going.
    Closed,
}

impl Phase {
    /// `true` once a valid hello has bound claims.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// `true` in the terminal state.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// The bound claims, if authenticated.
    pub fn claims(&self) -> Option<&Claims> {
        match self {
            Self::Authenticated(claims) => Some(claims),
            _ => None,
        }
    }

    /// Attempts the `Unauthenticated → Authenticated` transition.
    ///
    /// Returns `false` (leaving the phase untouched) from any other
    /// state: a second hello and a hello after closure are both
    /// protocol violations the caller must act on.
    pub fn authenticate(&mut self, claims: Claims) -> bool {
        match self {
            Self::Unauthenticated => {
                *self = Self::Authenticated(claims);
                true
            }
            _ => false,
        }
    }

    /// Transitions into `Closed`, from anywhere.
    pub fn close(&mut self) {
        *self = Self::Closed;
    }
}

// =========================================================================
// Tests
// =========================================================================
