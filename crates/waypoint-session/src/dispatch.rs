//! Message dispatch primitives and the per-handler [`Outbox`].
//!
//! Handlers never write to sockets. They describe what should be sent in
//! an `Outbox`, return it, and the tier flushes it through the outgoing
//! gateway once the handler is done. This keeps handlers pure enough to
//! compose: one handler can run another and `merge` its outbox.
//!
//! Channel fan-outs are resolved against the registry when they are
//! pushed, not when they are flushed. A handler therefore addresses the
//! audience that exists in the state *it* produced; someone joining the
//! channel between build and flush does not receive the message.

use waypoint_protocol::{ChannelName, ConnectionId, ServerMessage};

use crate::UserSessionRegistry;

/// One outbound message and who should receive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageDispatch<M = ServerMessage> {
    /// Deliver to exactly one connection.
    Single {
        connection_id: ConnectionId,
        message: M,
    },
    /// Deliver the same message to several connections.
    FanOut {
        connection_ids: Vec<ConnectionId>,
        message: M,
    },
}

impl<M> MessageDispatch<M> {
    /// Every connection this dispatch is addressed to.
    pub fn recipients(&self) -> &[ConnectionId] {
        match self {
            Self::Single { connection_id, .. } => std::slice::from_ref(connection_id),
            Self::FanOut { connection_ids, .. } => connection_ids,
        }
    }

    pub fn message(&self) -> &M {
        match self {
            Self::Single { message, .. } | Self::FanOut { message, .. } => message,
        }
    }
}

/// Who to leave out of a channel fan-out.
#[derive(Debug, Clone, Default)]
pub struct FanOutOptions {
    /// Connections that must not receive the message.
    pub excluded_ids: Vec<ConnectionId>,
    /// Connections subscribed to any of these channels are left out too.
    pub excluded_channels: Vec<ChannelName>,
}

impl FanOutOptions {
    /// Excludes a single connection, typically the sender.
    pub fn excluding(connection_id: ConnectionId) -> Self {
        Self {
            excluded_ids: vec![connection_id],
            excluded_channels: Vec::new(),
        }
    }
}

/// Ordered list of dispatches built up while handling one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbox<M = ServerMessage> {
    dispatches: Vec<MessageDispatch<M>>,
}

impl<M> Outbox<M> {
    pub fn new() -> Self {
        Self {
            dispatches: Vec::new(),
        }
    }

    /// Appends a message for one connection.
    pub fn push_to_connection(&mut self, connection_id: ConnectionId, message: M) {
        self.dispatches.push(MessageDispatch::Single {
            connection_id,
            message,
        });
    }

    /// Appends a fan-out to everyone on `channel`, resolved against
    /// `registry` right now.
    ///
    /// A channel with no remaining audience adds nothing.
    pub fn push_to_channel(
        &mut self,
        registry: &UserSessionRegistry,
        channel: &ChannelName,
        message: M,
        options: FanOutOptions,
    ) {
        let mut excluded = options.excluded_ids;
        for excluded_channel in &options.excluded_channels {
            excluded.extend(registry.in_channel(excluded_channel, &[]));
        }

        let connection_ids = registry.in_channel(channel, &excluded);
        if connection_ids.is_empty() {
            return;
        }
        self.dispatches.push(MessageDispatch::FanOut {
            connection_ids,
            message,
        });
    }

    /// Appends every dispatch of `other`, preserving order. No dedup.
    pub fn merge(&mut self, other: Outbox<M>) {
        self.dispatches.extend(other.dispatches);
    }

    /// Strips `ids` from every dispatch, dropping dispatches left with no
    /// recipients.
    ///
    /// Used on disconnect so a leaving connection is not sent its own
    /// departure notices.
    pub fn remove_recipients(&mut self, ids: &[ConnectionId]) {
        self.dispatches.retain_mut(|dispatch| match dispatch {
            MessageDispatch::Single { connection_id, .. } => !ids.contains(connection_id),
            MessageDispatch::FanOut { connection_ids, .. } => {
                connection_ids.retain(|id| !ids.contains(id));
                !connection_ids.is_empty()
            }
        });
    }

    pub fn dispatches(&self) -> &[MessageDispatch<M>] {
        &self.dispatches
    }

    pub fn into_dispatches(self) -> Vec<MessageDispatch<M>> {
        self.dispatches
    }

    pub fn is_empty(&self) -> bool {
        self.dispatches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dispatches.len()
    }
}

impl<M> Default for Outbox<M> {
    fn default() -> Self {
        Self::new()
    }
}
