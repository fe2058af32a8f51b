// Legend for various fix-this comments:
//   * "TODO" - bug or missing crucial feature.
//   * "Improvement potential" - missing nice-to-have feature or an opportunity
//       to make code better or faster.

#![forbid(unsafe_code)]
#![cfg_attr(feature = "strict", deny(warnings))]

pub mod web_document;
pub mod web_element_ext;
pub mod web_error_handling;
pub mod web_iterators;
pub mod web_socket;

use std::cell::RefCell;
use std::rc::Rc;

use tabletop::client::ClientState;
use tabletop::connection::ConnectionId;
use tabletop::document::{CONNECT_BUTTON_ID, DocumentError, PROTOCOLS_ID, TEXT_INPUT_ID};
use tabletop::network::{Endpoint, Transport, parse_transports};
use tabletop::session::{ScalarId, SessionContext};
use wasm_bindgen::prelude::*;

use crate::web_document::{WebDocument, web_document};
use crate::web_element_ext::WebElementExt;
use crate::web_error_handling::{JsResult, from_document_error, set_panic_hook};
use crate::web_socket::{SocketEvent, WebConnector};


// The client is single-threaded, so wrapping all mutable singletons in `thread_local!` seems ok.
thread_local! {
    static CLIENT: RefCell<Option<ClientState<WebConnector>>> = const { RefCell::new(None) };
}

fn with_client(
    f: impl FnOnce(&mut ClientState<WebConnector>, &mut WebDocument) -> Result<(), DocumentError>,
) -> JsResult<()> {
    CLIENT.with(|cell| {
        let mut cell = cell.borrow_mut();
        let client = cell.as_mut().ok_or_else(|| rust_error!("Client is not started"))?;
        f(client, &mut web_document()).map_err(from_document_error)
    })
}

fn on_socket_event(id: ConnectionId, event: SocketEvent) {
    let result = with_client(|client, doc| match event {
        SocketEvent::Open => client.on_open(doc, id),
        SocketEvent::Message(text) => client.on_message(doc, id, &text),
        SocketEvent::Close => client.on_close(doc, id),
        SocketEvent::Error(message) => client.on_error(doc, id, &message),
    });
    if let Err(err) = result {
        web_sys::console::error_1(&err);
    }
}

// Transport whitelist: ids of the checked checkboxes under `#protocols`.
fn checked_transports(doc: &WebDocument) -> JsResult<Vec<Transport>> {
    let ids: Vec<String> = doc
        .query_selector_all(&format!("#{PROTOCOLS_ID} input:checked"))?
        .filter_map(|node| node.dyn_into::<web_sys::Element>().ok())
        .map(|element| element.id())
        .collect();
    parse_transports(ids.iter().map(String::as_str)).map_err(|err| rust_error!("{}", err))
}

fn connect() -> JsResult<()> {
    let transports = checked_transports(&web_document())?;
    with_client(|client, doc| {
        client.set_transports(transports);
        client.connect(doc)
    })
}

// Entry point called by the host page with the session identifiers it was rendered with:
// `start(args.gameType, args.gameId, args.playerId)`, where `args` is the object the server put
// in place of `{{ args }}`.
#[wasm_bindgen]
pub fn start(
    game_type: Option<String>, game_id: Option<String>, player_id: Option<String>,
) -> JsResult<()> {
    set_panic_hook();
    let session = SessionContext::new(
        game_type,
        game_id.map(ScalarId::new),
        player_id.map(ScalarId::new),
    );
    let location = web_sys::window().ok_or_else(|| rust_error!("Cannot find window"))?.location();
    let secure = location.protocol()? == "https:";
    let endpoint = Endpoint::new(location.host()?, secure, Vec::new());
    let connector = WebConnector::new(Rc::new(on_socket_event));
    CLIENT.with(|cell| *cell.borrow_mut() = Some(ClientState::new(session, endpoint, connector)));

    let doc = web_document();
    doc.get_existing_element_by_id(CONNECT_BUTTON_ID)?.add_event_listener_and_forget(
        "click",
        |_: web_sys::Event| {
            let transports = checked_transports(&web_document())?;
            with_client(|client, doc| {
                client.set_transports(transports);
                client.toggle(doc)
            })
        },
    )?;
    doc.query_selector_existing("form")?.add_event_listener_and_forget(
        "submit",
        |event: web_sys::Event| {
            event.prevent_default();
            let input: web_sys::HtmlInputElement =
                web_document().get_existing_element_by_id(TEXT_INPUT_ID)?.dyn_into()?;
            let text = input.value();
            input.set_value("");
            with_client(|client, doc| client.submit_text(doc, &text))
        },
    )?;
    connect()
}
