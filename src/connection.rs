// Improvement potential: Reconnect automatically, with backoff, when the server goes away.

use std::fmt;

use log::{info, warn};

use crate::network::{Endpoint, Transport, choose_transport};


#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(v: u64) -> Self { ConnectionId(v) }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.0) }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ConnectError {
    NoSupportedTransport(Vec<Transport>),
    NotConnected,
    Transport(String),
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectError::NoSupportedTransport(whitelist) => {
                let names: Vec<_> = whitelist.iter().map(|t| t.name()).collect();
                write!(f, "no supported transport among [{}]", names.join(", "))
            }
            ConnectError::NotConnected => write!(f, "not connected"),
            ConnectError::Transport(message) => write!(f, "{message}"),
        }
    }
}

// A live transport. Incoming traffic is delivered asynchronously by the platform, tagged with the
// `ConnectionId` the connection was opened with.
pub trait Connection {
    fn send(&mut self, text: &str) -> Result<(), ConnectError>;
    // Must be safe to call on a connection that the other side has already closed.
    fn close(&mut self);
}

pub trait Connector {
    type Connection: Connection;

    fn open(
        &mut self, id: ConnectionId, endpoint: &Endpoint, transport: Transport,
    ) -> Result<Self::Connection, ConnectError>;
}

enum ConnectionState<C> {
    Closed,
    Connecting { id: ConnectionId, transport: Transport, connection: C },
    Open { id: ConnectionId, transport: Transport, connection: C },
}

// What the UI shows.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected { protocol: String },
    Error(String),
}

impl ConnectionStatus {
    pub fn status_label(&self) -> String {
        match self {
            ConnectionStatus::Disconnected | ConnectionStatus::Connecting => {
                "disconnected".to_owned()
            }
            ConnectionStatus::Connected { protocol } => format!("connected ({protocol})"),
            ConnectionStatus::Error(message) => format!("error: {message}"),
        }
    }

    pub fn button_label(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected | ConnectionStatus::Error(_) => "Connect",
            ConnectionStatus::Connecting | ConnectionStatus::Connected { .. } => "Disconnect",
        }
    }
}

// Owns at most one connection at a time.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    state: ConnectionState<C::Connection>,
    last_error: Option<String>,
    next_id: u64,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C) -> Self {
        ConnectionManager {
            connector,
            state: ConnectionState::Closed,
            last_error: None,
            next_id: 1,
        }
    }

    pub fn connector(&self) -> &C { &self.connector }

    pub fn status(&self) -> ConnectionStatus {
        match &self.state {
            ConnectionState::Closed => match &self.last_error {
                Some(message) => ConnectionStatus::Error(message.clone()),
                None => ConnectionStatus::Disconnected,
            },
            ConnectionState::Connecting { .. } => ConnectionStatus::Connecting,
            ConnectionState::Open { transport, .. } => {
                ConnectionStatus::Connected { protocol: transport.name().to_owned() }
            }
        }
    }

    pub fn live_connection(&self) -> Option<ConnectionId> {
        match &self.state {
            ConnectionState::Closed => None,
            ConnectionState::Connecting { id, .. } | ConnectionState::Open { id, .. } => Some(*id),
        }
    }

    pub fn is_open(&self) -> bool { matches!(self.state, ConnectionState::Open { .. }) }

    // Closes the current connection, if any, then opens a new one.
    pub fn connect(&mut self, endpoint: &Endpoint) -> Result<ConnectionId, ConnectError> {
        self.disconnect();
        let result = self.open(endpoint);
        if let Err(err) = &result {
            warn!("Cannot connect to {}: {}", endpoint.websocket_url(), err);
            self.last_error = Some(err.to_string());
        }
        result
    }

    fn open(&mut self, endpoint: &Endpoint) -> Result<ConnectionId, ConnectError> {
        let transport = choose_transport(&endpoint.transports)
            .ok_or_else(|| ConnectError::NoSupportedTransport(endpoint.transports.clone()))?;
        let id = ConnectionId(self.next_id);
        self.next_id += 1;
        let connection = self.connector.open(id, endpoint, transport)?;
        info!("Connection {} opening via {}", id, transport);
        self.state = ConnectionState::Connecting { id, transport, connection };
        Ok(id)
    }

    // Returns whether there was a connection to close.
    pub fn disconnect(&mut self) -> bool {
        self.last_error = None;
        match std::mem::replace(&mut self.state, ConnectionState::Closed) {
            ConnectionState::Closed => false,
            ConnectionState::Connecting { id, mut connection, .. }
            | ConnectionState::Open { id, mut connection, .. } => {
                info!("Closing connection {}", id);
                connection.close();
                true
            }
        }
    }

    // The following `handle_*` functions return false for events that belong to a connection
    // which is no longer current. Such events must be ignored.

    pub fn handle_open(&mut self, id: ConnectionId) -> bool {
        match std::mem::replace(&mut self.state, ConnectionState::Closed) {
            ConnectionState::Connecting { id: current, transport, connection } if current == id => {
                self.state = ConnectionState::Open { id, transport, connection };
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }

    pub fn handle_message(&self, id: ConnectionId) -> bool {
        matches!(self.state, ConnectionState::Open { id: current, .. } if current == id)
    }

    pub fn handle_close(&mut self, id: ConnectionId) -> bool {
        if self.live_connection() != Some(id) {
            return false;
        }
        self.state = ConnectionState::Closed;
        true
    }

    pub fn handle_error(&mut self, id: ConnectionId, message: &str) -> bool {
        if self.live_connection() != Some(id) {
            return false;
        }
        if let ConnectionState::Connecting { mut connection, .. }
        | ConnectionState::Open { mut connection, .. } =
            std::mem::replace(&mut self.state, ConnectionState::Closed)
        {
            connection.close();
        }
        self.last_error = Some(message.to_owned());
        true
    }

    pub fn send(&mut self, text: &str) -> Result<(), ConnectError> {
        match &mut self.state {
            ConnectionState::Open { connection, .. } => connection.send(text),
            ConnectionState::Closed | ConnectionState::Connecting { .. } => {
                Err(ConnectError::NotConnected)
            }
        }
    }
}
