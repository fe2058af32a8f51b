// Websocket transport for the browser. Socket callbacks are forwarded to `on_event` tagged with
// the connection id, so that events of a replaced socket can be told apart.

use std::rc::Rc;

use tabletop::connection::{ConnectError, Connection, ConnectionId, Connector};
use tabletop::network::{Endpoint, Transport};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;


pub enum SocketEvent {
    Open,
    Message(String),
    Close,
    Error(String),
}

pub type SocketEventHandler = Rc<dyn Fn(ConnectionId, SocketEvent)>;

fn js_message(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

pub struct WebConnection {
    socket: web_sys::WebSocket,
    // Must outlive the socket handlers that refer to them.
    _onopen: Closure<dyn FnMut(web_sys::Event)>,
    _onmessage: Closure<dyn FnMut(web_sys::MessageEvent)>,
    _onclose: Closure<dyn FnMut(web_sys::Event)>,
    _onerror: Closure<dyn FnMut(web_sys::Event)>,
}

impl Connection for WebConnection {
    fn send(&mut self, text: &str) -> Result<(), ConnectError> {
        self.socket
            .send_with_str(text)
            .map_err(|err| ConnectError::Transport(js_message(&err)))
    }

    fn close(&mut self) {
        self.socket.set_onopen(None);
        self.socket.set_onmessage(None);
        self.socket.set_onclose(None);
        self.socket.set_onerror(None);
        // Closing an already closed socket is a no-op.
        let _ = self.socket.close();
    }
}

pub struct WebConnector {
    on_event: SocketEventHandler,
}

impl WebConnector {
    pub fn new(on_event: SocketEventHandler) -> Self { WebConnector { on_event } }

    fn handler<E: 'static>(
        &self, id: ConnectionId, make_event: impl Fn(E) -> SocketEvent + 'static,
    ) -> Closure<dyn FnMut(E)>
    where
        E: wasm_bindgen::convert::FromWasmAbi,
    {
        let on_event = Rc::clone(&self.on_event);
        Closure::new(move |event: E| on_event(id, make_event(event)))
    }
}

impl Connector for WebConnector {
    type Connection = WebConnection;

    fn open(
        &mut self, id: ConnectionId, endpoint: &Endpoint, transport: Transport,
    ) -> Result<WebConnection, ConnectError> {
        if transport != Transport::Websocket {
            return Err(ConnectError::NoSupportedTransport(vec![transport]));
        }
        let socket = web_sys::WebSocket::new(&endpoint.websocket_url())
            .map_err(|err| ConnectError::Transport(js_message(&err)))?;

        let onopen = self.handler(id, |_: web_sys::Event| SocketEvent::Open);
        let onmessage = self.handler(id, |event: web_sys::MessageEvent| {
            match event.data().as_string() {
                Some(text) => SocketEvent::Message(text),
                None => SocketEvent::Error("Expected text, got binary".to_owned()),
            }
        });
        let onclose = self.handler(id, |_: web_sys::Event| SocketEvent::Close);
        let onerror = self.handler(id, |_: web_sys::Event| {
            SocketEvent::Error("websocket error".to_owned())
        });
        socket.set_onopen(Some(onopen.as_ref().unchecked_ref()));
        socket.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
        socket.set_onclose(Some(onclose.as_ref().unchecked_ref()));
        socket.set_onerror(Some(onerror.as_ref().unchecked_ref()));

        Ok(WebConnection {
            socket,
            _onopen: onopen,
            _onmessage: onmessage,
            _onclose: onclose,
            _onerror: onerror,
        })
    }
}
