//! Message kinds and delivery channels.

use std::fmt;

/// Direction of a transform message.
///
/// Owner clients send to the host; the host forwards to everyone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    /// Owner client to host.
    OwnerToServer = 1,
    /// Host to every non-owning observer.
    ServerToNonOwners = 2,
}

impl MessageKind {
    /// Every kind, in registration order.
    pub const ALL: [Self; 2] = [Self::OwnerToServer, Self::ServerToNonOwners];

    /// Returns the raw kind id.
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Parses a kind from its raw id.
    #[must_use]
    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::OwnerToServer),
            2 => Some(Self::ServerToNonOwners),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OwnerToServer => "owner-to-server",
            Self::ServerToNonOwners => "server-to-non-owners",
        };
        f.write_str(name)
    }
}

/// Delivery channel requested from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Channel {
    /// Unordered, lossy delivery. Stale messages are dropped by timestamp.
    #[default]
    Unreliable,
    /// Reliable delivery, used for messages that must not be lost.
    Reliable,
}
