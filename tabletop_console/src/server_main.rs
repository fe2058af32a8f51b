// Improvement potential. Try to do everything via message-passing, without `Mutex`es,
//   but also without threading and network logic inside `ServerState`.

use std::sync::{Arc, Mutex, mpsc};
use std::thread;

use anyhow::Context;
use async_tungstenite::WebSocketStream;
use futures_io::{AsyncRead, AsyncWrite};
use futures_util::stream::StreamExt;
use log::{error, info, warn};
use serde::Serialize;
use tabletop::network::{GAME_ENDPOINT, RAW_WEBSOCKET_SUFFIX};
use tabletop::server::*;
use tabletop::session::SessionContext;
use tungstenite::protocol;

use crate::network::{self, CommunicationError};
use crate::server_config::ServerConfig;


const ARGS_PLACEHOLDER: &str = "{{ args }}";

// Arguments of the browser client's `start`. Identifiers are always strings there, numeric or not.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexArgs {
    game_type: Option<String>,
    game_id: Option<String>,
    player_id: Option<String>,
}

impl From<&SessionContext> for IndexArgs {
    fn from(session: &SessionContext) -> Self {
        IndexArgs {
            game_type: session.game_type.clone(),
            game_id: session.game_id.as_ref().map(ToString::to_string),
            player_id: session.player_id.as_ref().map(ToString::to_string),
        }
    }
}

// Index page with the session identifiers for the client script.
pub fn render_index(template: &str, session: &SessionContext) -> String {
    // A struct of strings and options always serializes.
    let args = serde_json::to_string(&IndexArgs::from(session)).unwrap_or_else(|_| "{}".to_owned());
    template.replace(ARGS_PLACEHOLDER, &args)
}

async fn handle_connection<S: AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static>(
    peer_addr: String, stream: WebSocketStream<S>, tx: mpsc::SyncSender<IncomingEvent>,
    clients: Arc<Mutex<Clients>>,
) -> tide::Result<()> {
    let (mut stream_tx, mut stream_rx) = stream.split();

    let (client_tx, client_rx) = mpsc::channel();
    let client_id = clients.lock().unwrap().add_client(client_tx);
    info!("Client {:?} connected from {}", client_id, peer_addr);

    let reader_tx = tx.clone();
    async_std::task::spawn(async move {
        loop {
            match network::read_text_async(&mut stream_rx).await {
                Ok(text) => {
                    if reader_tx.send(IncomingEvent::Network(client_id, text)).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    match err {
                        CommunicationError::ConnectionClosed => {
                            info!("Client {:?} closed the connection", client_id)
                        }
                        err => warn!("Client {:?} read error: {:?}", client_id, err),
                    }
                    let _ = reader_tx.send(IncomingEvent::Disconnect(client_id));
                    break;
                }
            }
        }
    });

    // Still spawning an OS thread here because client_rx is a synchronous receiver. Blocking
    // on it inside an async task would starve the executor.
    let (done_tx, done_rx) = async_std::channel::bounded(1);
    thread::spawn(move || {
        // Ends when the server drops the client, which drops the sender.
        while let Ok(action) = client_rx.recv() {
            let text = action.encode();
            if let Err(err) =
                async_std::task::block_on(network::write_text_async(&mut stream_tx, &text))
            {
                warn!("Client {:?} write error: {:?}", client_id, err);
                let _ = tx.send(IncomingEvent::Disconnect(client_id));
                break;
            }
        }
        let _ = async_std::task::block_on(done_tx.send(()));
    });
    let _ = done_rx.recv().await;
    Ok(())
}

pub fn run(config: ServerConfig) -> anyhow::Result<()> {
    let default_game_type = config.default_game_type()?;
    let template = std::fs::read_to_string(&config.index_file)
        .with_context(|| format!("Reading index file '{}'", config.index_file))?;
    let template = Arc::new(template);

    let (tx, rx) = mpsc::sync_channel(1000);
    let clients = Arc::new(Mutex::new(Clients::new()));
    let clients_copy = Arc::clone(&clients);
    thread::spawn(move || {
        let mut server_state = ServerState::new(clients_copy, default_game_type);
        for event in rx {
            server_state.apply_event(event);
        }
        panic!("Unexpected end of events stream");
    });

    let mut app = tide::new();

    let index = move |req: tide::Request<()>| {
        let template = Arc::clone(&template);
        async move {
            let session = SessionContext::from_path(req.url().path());
            let mut resp = tide::Response::new(tide::StatusCode::Ok);
            resp.set_content_type(http_types::mime::HTML);
            resp.set_body(render_index(&template, &session));
            tide::Result::Ok(resp)
        }
    };
    app.at("/").get(index.clone());
    app.at("/g").get(index.clone());
    app.at("/g/*").get(index);

    if let Some(static_path) = &config.static_path {
        app.at("/static")
            .serve_dir(static_path)
            .with_context(|| format!("Serving static directory '{static_path}'"))?;
    }

    app.at(&format!("{GAME_ENDPOINT}{RAW_WEBSOCKET_SUFFIX}")).get(
        move |req: tide::Request<()>| {
            let mytx = tx.clone();
            let myclients = clients.clone();
            async move {
                let peer_addr = req.peer_addr().map_or_else(
                    || Err(tide::Error::new(403, anyhow::Error::msg("Peer address missing"))),
                    |x| Ok(x.to_owned()),
                )?;
                // tide::Request -> http_types::Request -> http::Request<Body> -> http::Request<()>.
                let http_types_req: http_types::Request = req.into();
                let http_req_with_body: http::Request<http_types::Body> = http_types_req.into();
                let http_req = http_req_with_body.map(|_| ());

                let http_resp = tungstenite::handshake::server::create_response(&http_req)
                    .map_err(|e| tide::Error::new(400, e))?;

                // And the reverse chain
                let http_resp_with_body = http_resp.map(|_| http_types::Body::empty());
                let mut http_types_resp: http_types::Response = http_resp_with_body.into();

                let upgrade_receiver = http_types_resp.recv_upgrade().await;

                async_std::task::spawn(async move {
                    if let Some(stream) = upgrade_receiver.await {
                        let stream =
                            WebSocketStream::from_raw_socket(stream, protocol::Role::Server, None)
                                .await;
                        if let Err(err) =
                            handle_connection(peer_addr, stream, mytx, myclients).await
                        {
                            error!("{}", err);
                        }
                    } else {
                        warn!("Never received an upgrade for client {}", peer_addr);
                    }
                });
                Ok(http_types_resp)
            }
        },
    );

    info!("Listening on port {}", config.port);
    async_std::task::block_on(async { app.listen(format!("0.0.0.0:{}", config.port)).await })
        .context("Failed to start the server")
}
