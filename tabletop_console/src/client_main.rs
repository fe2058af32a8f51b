// Improvement potential: Render game state as a table instead of the raw page outline.

use std::fmt;
use std::io;
use std::net::{Shutdown, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use crossterm::event::{self as term_event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::{self, Stylize};
use crossterm::{cursor, execute, terminal};
use log::{info, warn};
use scopeguard::defer;
use tabletop::client::ClientState;
use tabletop::connection::{ConnectError, Connection, ConnectionId, Connector};
use tabletop::network::{Endpoint, PORT, Transport, parse_transports};
use tabletop::session::{ScalarId, SessionContext};
use tabletop::virtual_page::VirtualPage;
use tungstenite::protocol;
use url::Url;

use crate::network::{self, CommunicationError};


pub struct ClientConfig {
    pub server_address: String,
    pub game_type: Option<String>,
    pub game_id: Option<String>,
    pub player_id: Option<String>,
    pub transports: String,
}

enum NetworkEvent {
    Open,
    Message(String),
    Close,
    Error(String),
}

enum IncomingEvent {
    Network(ConnectionId, NetworkEvent),
    Terminal(term_event::Event),
    Tick,
}

#[derive(Clone, PartialEq, Eq, Debug)]
enum InputCommand {
    Send(String),
    Connect,
    Disconnect,
    Quit,
    Unknown(String),
}

fn parse_input(input: &str) -> Option<InputCommand> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    Some(match input.strip_prefix('/') {
        Some("connect") => InputCommand::Connect,
        Some("disconnect") => InputCommand::Disconnect,
        Some("quit") => InputCommand::Quit,
        Some(cmd) => InputCommand::Unknown(cmd.to_owned()),
        None => InputCommand::Send(input.to_owned()),
    })
}

fn server_host(address: &str) -> String {
    if address.contains(':') { address.to_owned() } else { format!("{address}:{PORT}") }
}

struct NativeConnection {
    text_tx: mpsc::Sender<String>,
    stream: TcpStream,
}

impl Connection for NativeConnection {
    fn send(&mut self, text: &str) -> Result<(), ConnectError> {
        self.text_tx
            .send(text.to_owned())
            .map_err(|_| ConnectError::Transport("connection writer is gone".to_owned()))
    }

    fn close(&mut self) {
        // Wakes up the reader thread, which then reports a close that the client ignores.
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

// Opens blocking websockets. Traffic is reported via `events_tx`, so that everything is
// processed on the main thread.
struct NativeConnector {
    events_tx: mpsc::Sender<IncomingEvent>,
}

impl Connector for NativeConnector {
    type Connection = NativeConnection;

    fn open(
        &mut self, id: ConnectionId, endpoint: &Endpoint, transport: Transport,
    ) -> Result<NativeConnection, ConnectError> {
        if transport != Transport::Websocket {
            return Err(ConnectError::NoSupportedTransport(vec![transport]));
        }
        let url = Url::parse(&endpoint.websocket_url()).map_err(transport_error)?;
        let stream = TcpStream::connect(&endpoint.host).map_err(transport_error)?;
        // Improvement potential: Test if nodelay helps.
        let (mut socket_in, _) =
            tungstenite::client(url.as_str(), stream).map_err(transport_error)?;
        let mut socket_out = network::clone_websocket(&socket_in, protocol::Role::Client)
            .map_err(transport_error)?;
        let stream = socket_in.get_ref().try_clone().map_err(transport_error)?;

        let tx_net = self.events_tx.clone();
        thread::spawn(move || {
            if tx_net.send(IncomingEvent::Network(id, NetworkEvent::Open)).is_err() {
                return;
            }
            loop {
                let event = match network::read_text(&mut socket_in) {
                    Ok(text) => NetworkEvent::Message(text),
                    Err(CommunicationError::ConnectionClosed) => NetworkEvent::Close,
                    Err(err) => NetworkEvent::Error(format!("{err:?}")),
                };
                let done = !matches!(event, NetworkEvent::Message(_));
                if tx_net.send(IncomingEvent::Network(id, event)).is_err() || done {
                    break;
                }
            }
        });

        let (text_tx, text_rx) = mpsc::channel::<String>();
        let tx_err = self.events_tx.clone();
        thread::spawn(move || {
            for text in text_rx {
                if let Err(err) = network::write_text(&mut socket_out, &text) {
                    warn!("Connection {} write error: {:?}", id, err);
                    let _ = tx_err.send(IncomingEvent::Network(
                        id,
                        NetworkEvent::Error(format!("{err:?}")),
                    ));
                    break;
                }
            }
        });

        Ok(NativeConnection { text_tx, stream })
    }
}

fn transport_error(err: impl fmt::Display) -> ConnectError {
    ConnectError::Transport(err.to_string())
}

fn writeln_raw(stdout: &mut io::Stdout, line: impl fmt::Display) -> io::Result<()> {
    execute!(stdout, style::Print(line), cursor::MoveToNextLine(1), cursor::Hide)
}

fn fit(line: &str, width: usize) -> String { line.chars().take(width).collect() }

fn render(
    stdout: &mut io::Stdout, app_start_time: Instant, page: &VirtualPage, keyboard_input: &str,
    command_error: &Option<String>,
) -> io::Result<()> {
    let (width, height) = terminal::size()?;
    let (width, height) = (usize::from(width), usize::from(height));
    execute!(stdout, cursor::MoveTo(0, 0), terminal::Clear(terminal::ClearType::All))?;

    // Page outline on top, the tail of the log below, input line at the bottom.
    let outline = page.outline();
    let log = page.log_lines();
    let reserved = 4;
    let log_rows = log.len().min(height.saturating_sub(outline.len() + reserved));
    let outline_rows = height.saturating_sub(log_rows + reserved);
    for line in outline.iter().take(outline_rows) {
        writeln_raw(stdout, fit(line, width))?;
    }
    writeln_raw(stdout, "─".repeat(width).with(style::Color::DarkGrey))?;
    for line in log.iter().skip(log.len() - log_rows) {
        writeln_raw(stdout, fit(line, width))?;
    }

    // Simulate cursor: real cursor blinking is broken with Show/Hide.
    let show_cursor = app_start_time.elapsed().as_millis() % 1000 >= 500;
    let cursor = if show_cursor { '▂' } else { ' ' };
    writeln_raw(stdout, format!("> {keyboard_input}{cursor}"))?;
    if let Some(err) = command_error {
        writeln_raw(stdout, err.clone().with(style::Color::Red))?;
    }
    Ok(())
}

pub fn run(config: ClientConfig) -> anyhow::Result<()> {
    let transports =
        parse_transports(config.transports.split(',')).map_err(anyhow::Error::msg)?;
    let endpoint = Endpoint::new(server_host(&config.server_address), false, transports);
    let session = SessionContext::new(
        config.game_type,
        config.game_id.map(ScalarId::new),
        config.player_id.map(ScalarId::new),
    );
    info!("Session: {:?}, endpoint: {}", session, endpoint.websocket_url());

    let (tx, rx) = mpsc::channel();
    let mut client_state =
        ClientState::new(session, endpoint, NativeConnector { events_tx: tx.clone() });
    let mut page = VirtualPage::with_game_skeleton();

    let mut stdout = io::stdout();
    terminal::enable_raw_mode()?;
    execute!(stdout, terminal::EnterAlternateScreen, cursor::Hide)?;
    defer! {
        let _ = terminal::disable_raw_mode();
        let _ = execute!(io::stdout(), terminal::LeaveAlternateScreen, cursor::Show);
    };
    let app_start_time = Instant::now();

    let tx_local = tx.clone();
    let tx_tick = tx;
    thread::spawn(move || {
        while let Ok(ev) = term_event::read() {
            if tx_local.send(IncomingEvent::Terminal(ev)).is_err() {
                break;
            }
        }
    });
    thread::spawn(move || {
        loop {
            thread::sleep(Duration::from_millis(100));
            if tx_tick.send(IncomingEvent::Tick).is_err() {
                break;
            }
        }
    });

    let mut keyboard_input = String::new();
    let mut command_error = None;
    client_state.connect(&mut page)?;
    for event in rx {
        match event {
            IncomingEvent::Network(id, event) => match event {
                NetworkEvent::Open => client_state.on_open(&mut page, id)?,
                NetworkEvent::Message(text) => client_state.on_message(&mut page, id, &text)?,
                NetworkEvent::Close => client_state.on_close(&mut page, id)?,
                NetworkEvent::Error(message) => client_state.on_error(&mut page, id, &message)?,
            },
            IncomingEvent::Terminal(term_event::Event::Key(event))
                if event.kind == KeyEventKind::Press =>
            {
                match event.code {
                    KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => {
                        client_state.disconnect(&mut page)?;
                        return Ok(());
                    }
                    KeyCode::Char(ch) => keyboard_input.push(ch),
                    KeyCode::Backspace => {
                        keyboard_input.pop();
                    }
                    KeyCode::Enter => {
                        command_error = None;
                        match parse_input(&keyboard_input) {
                            None => {}
                            Some(InputCommand::Send(text)) => {
                                client_state.submit_text(&mut page, &text)?
                            }
                            Some(InputCommand::Connect) => client_state.connect(&mut page)?,
                            Some(InputCommand::Disconnect) => client_state.disconnect(&mut page)?,
                            Some(InputCommand::Quit) => {
                                client_state.disconnect(&mut page)?;
                                return Ok(());
                            }
                            Some(InputCommand::Unknown(cmd)) => {
                                command_error = Some(format!("Unknown command: '{cmd}'"));
                            }
                        }
                        keyboard_input.clear();
                    }
                    _ => {}
                }
            }
            IncomingEvent::Terminal(_) => {}
            IncomingEvent::Tick => {
                // Any event triggers repaint, so no additional action is required.
            }
        }
        render(&mut stdout, app_start_time, &page, &keyboard_input, &command_error)?;
    }
    Err(anyhow!("Unexpected end of events stream"))
}
