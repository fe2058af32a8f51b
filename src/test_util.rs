// Test utilities that cannot be moved to the "tests" folder, because unit tests and integration
// tests share them.

use std::cell::RefCell;
use std::rc::Rc;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::connection::{ConnectError, Connection, ConnectionId, Connector};
use crate::network::{Endpoint, Transport};


// Random tests should be reproducible, so let's fix the seed.
pub fn deterministic_rng() -> StdRng { StdRng::from_seed([0; 32]) }

// Everything that happened to the connections produced by a `MockConnector`.
#[derive(Default, Debug)]
pub struct MockNetwork {
    pub opened: Vec<ConnectionId>,
    pub closed: Vec<ConnectionId>,
    pub sent: Vec<(ConnectionId, String)>,
    pub endpoints: Vec<(Endpoint, Transport)>,
    // If set, the next `open` fails with this message.
    pub fail_next_open: Option<String>,
}

impl MockNetwork {
    pub fn live(&self) -> Vec<ConnectionId> {
        self.opened.iter().copied().filter(|id| !self.closed.contains(id)).collect()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.iter().map(|(_, text)| text.clone()).collect()
    }
}

pub struct MockConnector {
    network: Rc<RefCell<MockNetwork>>,
}

pub struct MockConnection {
    id: ConnectionId,
    network: Rc<RefCell<MockNetwork>>,
}

impl MockConnector {
    pub fn new() -> Self {
        MockConnector { network: Rc::new(RefCell::new(MockNetwork::default())) }
    }

    pub fn network(&self) -> Rc<RefCell<MockNetwork>> { Rc::clone(&self.network) }
}

impl Connector for MockConnector {
    type Connection = MockConnection;

    fn open(
        &mut self, id: ConnectionId, endpoint: &Endpoint, transport: Transport,
    ) -> Result<MockConnection, ConnectError> {
        let mut network = self.network.borrow_mut();
        if let Some(message) = network.fail_next_open.take() {
            return Err(ConnectError::Transport(message));
        }
        network.opened.push(id);
        network.endpoints.push((endpoint.clone(), transport));
        Ok(MockConnection { id, network: Rc::clone(&self.network) })
    }
}

impl Connection for MockConnection {
    fn send(&mut self, text: &str) -> Result<(), ConnectError> {
        self.network.borrow_mut().sent.push((self.id, text.to_owned()));
        Ok(())
    }

    fn close(&mut self) {
        let mut network = self.network.borrow_mut();
        if !network.closed.contains(&self.id) {
            network.closed.push(self.id);
        }
    }
}
