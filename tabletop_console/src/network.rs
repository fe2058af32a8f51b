// Text frames over websockets, both blocking (console client) and async (server).

use std::io;
use std::net::TcpStream;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tungstenite::protocol::Role;
use tungstenite::{Message, WebSocket};


#[derive(Debug)]
pub enum CommunicationError {
    Socket(tungstenite::Error),
    ConnectionClosed,
    Protocol(String),
}

impl From<tungstenite::Error> for CommunicationError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                CommunicationError::ConnectionClosed
            }
            err => CommunicationError::Socket(err),
        }
    }
}

// Returns `Some(text)` for text frames, `None` for control frames that should be skipped.
fn message_text(msg: Message) -> Result<Option<String>, CommunicationError> {
    match msg {
        Message::Text(text) => Ok(Some(text.to_string())),
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Ok(None),
        Message::Close(_) => Err(CommunicationError::ConnectionClosed),
        Message::Binary(_) => {
            Err(CommunicationError::Protocol("Expected text, got binary".to_owned()))
        }
    }
}

pub fn read_text<S>(socket: &mut WebSocket<S>) -> Result<String, CommunicationError>
where
    S: io::Read + io::Write,
{
    loop {
        if let Some(text) = message_text(socket.read()?)? {
            return Ok(text);
        }
    }
}

pub fn write_text<S>(socket: &mut WebSocket<S>, text: &str) -> Result<(), CommunicationError>
where
    S: io::Read + io::Write,
{
    socket.send(Message::text(text))?;
    Ok(())
}

pub async fn read_text_async<S>(stream: &mut S) -> Result<String, CommunicationError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        let msg = stream.next().await.ok_or(CommunicationError::ConnectionClosed)??;
        if let Some(text) = message_text(msg)? {
            return Ok(text);
        }
    }
}

pub async fn write_text_async<S>(stream: &mut S, text: &str) -> Result<(), CommunicationError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    stream.send(Message::text(text)).await?;
    Ok(())
}

// Improvement potential: Instead of cloning the socket, consider calling
//   TcpStream.set_nonblocking on the underlying stream and doing read/writes in the same thread.
pub fn clone_websocket(
    socket: &WebSocket<TcpStream>, role: Role,
) -> io::Result<WebSocket<TcpStream>> {
    let stream = socket.get_ref().try_clone()?;
    let config = *socket.get_config();
    Ok(WebSocket::from_raw_socket(stream, role, Some(config)))
}
