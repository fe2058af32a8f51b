// Client side of the game: session identifiers, the connection and the dispatcher glued together.
// Platform code (browser or terminal) owns the page and forwards its events here.

use log::{info, warn};

use crate::connection::{ConnectError, ConnectionId, ConnectionManager, ConnectionStatus, Connector};
use crate::dispatch::{DispatchOutcome, dispatch_frame};
use crate::document::{CONNECT_BUTTON_ID, Document, DocumentError, History, STATUS_ID};
use crate::event::{ClientMessage, JoinRequest};
use crate::network::{Endpoint, Transport};
use crate::session::SessionContext;


pub struct ClientState<C: Connector> {
    session: SessionContext,
    endpoint: Endpoint,
    connection: ConnectionManager<C>,
}

impl<C: Connector> ClientState<C> {
    pub fn new(session: SessionContext, endpoint: Endpoint, connector: C) -> Self {
        ClientState {
            session,
            endpoint,
            connection: ConnectionManager::new(connector),
        }
    }

    pub fn session(&self) -> &SessionContext { &self.session }
    pub fn endpoint(&self) -> &Endpoint { &self.endpoint }
    pub fn connection(&self) -> &ConnectionManager<C> { &self.connection }
    pub fn status(&self) -> ConnectionStatus { self.connection.status() }

    // Transport whitelist, e.g. read from checked checkboxes. Applies to the next `connect`.
    pub fn set_transports(&mut self, transports: Vec<Transport>) {
        self.endpoint.transports = transports;
    }

    pub fn connect<D: Document>(&mut self, doc: &mut D) -> Result<(), DocumentError> {
        self.disconnect(doc)?;
        doc.log("Connecting...")?;
        if let Err(err) = self.connection.connect(&self.endpoint) {
            doc.log(&format!("Connection error: {err}"))?;
        }
        self.refresh_ui(doc)
    }

    pub fn disconnect<D: Document>(&mut self, doc: &mut D) -> Result<(), DocumentError> {
        if self.connection.live_connection().is_some() {
            doc.log("Disconnecting...")?;
        }
        self.connection.disconnect();
        self.refresh_ui(doc)
    }

    // Connect/disconnect button.
    pub fn toggle<D: Document>(&mut self, doc: &mut D) -> Result<(), DocumentError> {
        if self.connection.live_connection().is_none() {
            self.connect(doc)
        } else {
            self.disconnect(doc)
        }
    }

    // Form submission: the text goes to the server as is.
    pub fn submit_text<D: Document>(
        &mut self, doc: &mut D, text: &str,
    ) -> Result<(), DocumentError> {
        doc.log(&format!("Sending: {text}"))?;
        self.send_text(doc, text)
    }

    pub fn send_message<D: Document>(
        &mut self, doc: &mut D, message: &ClientMessage,
    ) -> Result<(), DocumentError> {
        self.send_text(doc, &message.encode())
    }

    fn send_text<D: Document>(&mut self, doc: &mut D, text: &str) -> Result<(), DocumentError> {
        match self.connection.send(text) {
            Ok(()) => Ok(()),
            Err(ConnectError::NotConnected) => doc.log("Cannot send: not connected."),
            Err(err) => {
                warn!("Send failed: {}", err);
                doc.log(&format!("Cannot send: {err}"))
            }
        }
    }

    pub fn on_open<D: Document>(
        &mut self, doc: &mut D, id: ConnectionId,
    ) -> Result<(), DocumentError> {
        if !self.connection.handle_open(id) {
            return Ok(());
        }
        doc.log("Connected.")?;
        self.refresh_ui(doc)?;
        if self.session.game_id.is_some() {
            let join = ClientMessage::join(&JoinRequest::from(&self.session));
            info!("Joining: {}", join.encode());
            self.send_message(doc, &join)?;
        } else {
            info!("No game to join");
        }
        Ok(())
    }

    pub fn on_message<P: Document + History>(
        &mut self, page: &mut P, id: ConnectionId, frame: &str,
    ) -> Result<(), DocumentError> {
        if !self.connection.handle_message(id) {
            return Ok(());
        }
        page.log(&format!("Received: {frame}"))?;
        match dispatch_frame(page, &mut self.session, frame) {
            Ok(DispatchOutcome::Applied) => Ok(()),
            Ok(DispatchOutcome::ServerError(message)) => page.log(&format!("Error: {message}")),
            Ok(DispatchOutcome::Ignored { action }) => {
                page.log(&format!("Unknown action: {action}"))
            }
            Err(err) => {
                warn!("Cannot process frame {:?}: {}", frame, err);
                page.log(&format!("Cannot process message: {err}"))
            }
        }
    }

    pub fn on_close<D: Document>(
        &mut self, doc: &mut D, id: ConnectionId,
    ) -> Result<(), DocumentError> {
        if !self.connection.handle_close(id) {
            return Ok(());
        }
        doc.log("Disconnected.")?;
        self.refresh_ui(doc)
    }

    pub fn on_error<D: Document>(
        &mut self, doc: &mut D, id: ConnectionId, message: &str,
    ) -> Result<(), DocumentError> {
        if !self.connection.handle_error(id, message) {
            return Ok(());
        }
        doc.log(&format!("Connection error: {message}"))?;
        self.refresh_ui(doc)
    }

    pub fn refresh_ui<D: Document>(&self, doc: &mut D) -> Result<(), DocumentError> {
        let status = self.connection.status();
        doc.set_text_by_id(STATUS_ID, &status.status_label())?;
        doc.set_text_by_id(CONNECT_BUTTON_ID, status.button_label())?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::session::ScalarId;
    use crate::test_util::MockConnector;
    use crate::virtual_page::VirtualPage;

    fn client(session: SessionContext) -> ClientState<MockConnector> {
        ClientState::new(
            session,
            Endpoint::new("localhost:8080", false, vec![]),
            MockConnector::new(),
        )
    }

    #[test]
    fn toggle_updates_labels() {
        let mut page = VirtualPage::with_client_skeleton();
        let mut client = client(SessionContext::default());
        client.refresh_ui(&mut page).unwrap();
        assert_eq!(page.text_by_id(STATUS_ID).as_deref(), Some("disconnected"));
        assert_eq!(page.text_by_id(CONNECT_BUTTON_ID).as_deref(), Some("Connect"));

        client.toggle(&mut page).unwrap();
        let id = client.connection().live_connection().unwrap();
        client.on_open(&mut page, id).unwrap();
        assert_eq!(page.text_by_id(STATUS_ID).as_deref(), Some("connected (websocket)"));
        assert_eq!(page.text_by_id(CONNECT_BUTTON_ID).as_deref(), Some("Disconnect"));

        client.toggle(&mut page).unwrap();
        assert_eq!(page.text_by_id(STATUS_ID).as_deref(), Some("disconnected"));
        assert_eq!(page.text_by_id(CONNECT_BUTTON_ID).as_deref(), Some("Connect"));
        assert_eq!(page.log_lines(), vec![
            "Connecting...",
            "Connected.",
            "Disconnecting...",
        ]);
    }

    #[test]
    fn join_is_sent_only_with_game_id() {
        let mut page = VirtualPage::with_client_skeleton();
        let mut client = client(SessionContext::new(Some("blackjack".to_owned()), None, None));
        let network = client.connection().connector().network();
        client.connect(&mut page).unwrap();
        let id = client.connection().live_connection().unwrap();
        client.on_open(&mut page, id).unwrap();
        assert!(network.borrow().sent.is_empty());

        let mut client = self::client(SessionContext::new(
            Some("blackjack".to_owned()),
            Some(ScalarId::new("x7Yz")),
            Some(ScalarId::from(2)),
        ));
        let network = client.connection().connector().network();
        client.connect(&mut page).unwrap();
        let id = client.connection().live_connection().unwrap();
        client.on_open(&mut page, id).unwrap();
        assert_eq!(network.borrow().sent_texts(), vec![
            r#"join,{"game_type":"blackjack","game_id":"x7Yz","player_id":2}"#.to_owned()
        ]);
    }

    #[test]
    fn connect_twice_leaves_one_connection() {
        let mut page = VirtualPage::with_client_skeleton();
        let mut client = client(SessionContext::default());
        let network = client.connection().connector().network();
        client.connect(&mut page).unwrap();
        client.connect(&mut page).unwrap();
        assert_eq!(network.borrow().live().len(), 1);
        assert_eq!(network.borrow().opened.len(), 2);
    }

    #[test]
    fn malformed_frame_keeps_connection() {
        let mut page = VirtualPage::with_client_skeleton();
        let root = page.root();
        page.add_element(root, "div", Some("round"), &[]);
        let mut client = client(SessionContext::default());
        let network = client.connection().connector().network();
        client.connect(&mut page).unwrap();
        let id = client.connection().live_connection().unwrap();
        client.on_open(&mut page, id).unwrap();

        client.on_message(&mut page, id, "[\"setText\", [\"round\"").unwrap();
        client.on_message(&mut page, id, r#"["explode", 1]"#).unwrap();
        assert!(client.connection().is_open());
        assert_eq!(network.borrow().live(), vec![id]);

        client.on_message(&mut page, id, r#"["setText", ["round", 7]]"#).unwrap();
        assert_eq!(page.text_by_id("round").as_deref(), Some("7"));
        let log = page.log_lines();
        assert!(log.iter().any(|line| line.starts_with("Cannot process message: malformed frame")));
        assert!(log.contains(&"Unknown action: explode".to_owned()));
    }

    #[test]
    fn submit_text_when_disconnected() {
        let mut page = VirtualPage::with_client_skeleton();
        let mut client = client(SessionContext::default());
        client.submit_text(&mut page, "hit").unwrap();
        assert_eq!(page.log_lines(), vec!["Sending: hit", "Cannot send: not connected."]);
    }

    #[test]
    fn messages_from_old_connection_are_dropped() {
        let mut page = VirtualPage::with_client_skeleton();
        let root = page.root();
        page.add_element(root, "div", Some("round"), &[]);
        let mut client = client(SessionContext::default());
        client.connect(&mut page).unwrap();
        let old = client.connection().live_connection().unwrap();
        client.connect(&mut page).unwrap();
        let new = client.connection().live_connection().unwrap();
        client.on_open(&mut page, new).unwrap();
        client.on_message(&mut page, old, r#"["setText", ["round", 1]]"#).unwrap();
        client.on_close(&mut page, old).unwrap();
        assert_eq!(page.text_by_id("round").as_deref(), Some(""));
        assert!(client.connection().is_open());
    }

    #[test]
    fn transport_error_shows_error_state() {
        let mut page = VirtualPage::with_client_skeleton();
        let mut client = client(SessionContext::default());
        client.set_transports(vec![Transport::XhrPolling]);
        client.connect(&mut page).unwrap();
        assert_eq!(
            page.text_by_id(STATUS_ID).as_deref(),
            Some("error: no supported transport among [xhr-polling]")
        );
        assert_eq!(page.text_by_id(CONNECT_BUTTON_ID).as_deref(), Some("Connect"));
    }

    #[test]
    fn failed_open_shows_error_state() {
        let mut page = VirtualPage::with_client_skeleton();
        let root = page.root();
        page.add_element(root, "div", Some("round"), &[]);
        let mut client = client(SessionContext::default());
        let network = client.connection().connector().network();
        network.borrow_mut().fail_next_open = Some("connection refused".to_owned());
        client.connect(&mut page).unwrap();
        assert_eq!(page.text_by_id(STATUS_ID).as_deref(), Some("error: connection refused"));
        assert_eq!(page.text_by_id(CONNECT_BUTTON_ID).as_deref(), Some("Connect"));
        assert_eq!(page.log_lines(), vec!["Connecting...", "Connection error: connection refused"]);
        assert_eq!(client.connection().live_connection(), None);

        // The id that failed to open was never handed to the platform.
        let failed = ConnectionId::new(1);
        client.on_message(&mut page, failed, r#"["setText", ["round", 1]]"#).unwrap();
        assert_eq!(page.text_by_id("round").as_deref(), Some(""));

        client.connect(&mut page).unwrap();
        let id = client.connection().live_connection().unwrap();
        client.on_open(&mut page, id).unwrap();
        assert_eq!(page.text_by_id(STATUS_ID).as_deref(), Some("connected (websocket)"));
        let network = network.borrow();
        assert_eq!(network.opened, vec![id]);
        assert_eq!(network.endpoints.len(), 1);
        assert_eq!(network.endpoints[0].1, Transport::Websocket);
    }

    #[test]
    fn transport_error_on_open_connection() {
        let mut page = VirtualPage::with_client_skeleton();
        let root = page.root();
        page.add_element(root, "div", Some("round"), &[]);
        let mut client = client(SessionContext::default());
        let network = client.connection().connector().network();
        client.connect(&mut page).unwrap();
        let id = client.connection().live_connection().unwrap();
        client.on_open(&mut page, id).unwrap();

        client.on_error(&mut page, id, "reset").unwrap();
        assert_eq!(page.text_by_id(STATUS_ID).as_deref(), Some("error: reset"));
        assert_eq!(page.text_by_id(CONNECT_BUTTON_ID).as_deref(), Some("Connect"));
        assert_eq!(page.log_lines().last().map(String::as_str), Some("Connection error: reset"));
        assert_eq!(network.borrow().live(), vec![]);

        client.on_message(&mut page, id, r#"["setText", ["round", 1]]"#).unwrap();
        assert_eq!(page.text_by_id("round").as_deref(), Some(""));
        assert!(!page.log_lines().iter().any(|line| line.starts_with("Received:")));
    }
}
