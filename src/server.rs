// Improvement potential: Drop rooms that have had no clients for a while.

use std::collections::{HashMap, HashSet, hash_map};
use std::ops;
use std::sync::{Arc, Mutex, mpsc};

use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};

use crate::event::{
    ClientMessage, ElementContent, JOIN_METHOD, JoinRequest, ServerAction, VAR_TYPE_GAME,
    VAR_TYPE_PLAYER, VAR_TYPE_PRIVATE, VarUpdate,
};
use crate::game::{
    ActionArgs, Game, GameSnapshot, GameType, PlayerIndex, VarChange, VarScope, diff, new_game,
};
use crate::internal_error;
use crate::session::{GameId, PlayerId, ScalarId, SessionVariable};
use crate::util::random_alphanumeric;


const GAME_ID_LENGTH: usize = 8;
const NAME_PREFIXES: [&str; 6] = ["Sa", "Cho", "Gabba", "Ee", "Su", "Y"];
const NAME_SUFFIXES: [&str; 6] = ["n", "mmy", "die", "goid", "xi", "g"];

pub fn name_gen(rng: &mut impl Rng) -> String {
    let prefix = NAME_PREFIXES[rng.random_range(0..NAME_PREFIXES.len())];
    let suffix = NAME_SUFFIXES[rng.random_range(0..NAME_SUFFIXES.len())];
    format!("{prefix}{suffix}")
}

// Players are numbered from 1 on the wire.
pub fn player_id(player: PlayerIndex) -> PlayerId { ScalarId::from(player as u64 + 1) }

pub fn player_index(id: &PlayerId) -> Option<PlayerIndex> {
    id.as_str().parse::<usize>().ok()?.checked_sub(1)
}

#[derive(Debug)]
pub enum IncomingEvent {
    Network(ClientId, String),
    Disconnect(ClientId),
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ClientId(u64);

// Where a joined client plays.
#[derive(Clone, PartialEq, Eq, Debug)]
struct Seat {
    game_id: GameId,
    player: PlayerIndex,
}

pub struct Client {
    events_tx: mpsc::Sender<ServerAction>,
    name: String,
    seat: Option<Seat>,
}

impl Client {
    pub fn name(&self) -> &str { &self.name }

    fn send(&self, action: ServerAction) {
        // The receiver is gone only if the connection is being torn down; the disconnect event
        // follows.
        if self.events_tx.send(action).is_err() {
            warn!("Dropping message for disconnected client {}", self.name);
        }
    }

    fn send_error(&self, reason: impl std::fmt::Display) {
        self.send(ServerAction::Error(format!(
            "Invalid action {} by player {}",
            reason, self.name
        )));
    }
}

pub struct Clients {
    map: HashMap<ClientId, Client>,
}

impl Clients {
    pub fn new() -> Self { Self { map: HashMap::new() } }

    pub fn add_client(&mut self, events_tx: mpsc::Sender<ServerAction>) -> ClientId {
        let mut rng = rand::rng();
        let client = Client {
            events_tx,
            name: name_gen(&mut rng),
            seat: None,
        };
        loop {
            let id = ClientId(rng.random::<u64>());
            match self.map.entry(id) {
                hash_map::Entry::Occupied(_) => {}
                hash_map::Entry::Vacant(e) => {
                    info!("Client {} connected", client.name);
                    e.insert(client);
                    return id;
                }
            }
        }
    }

    pub fn contains(&self, id: ClientId) -> bool { self.map.contains_key(&id) }
    pub fn get(&self, id: ClientId) -> Option<&Client> { self.map.get(&id) }

    fn remove_client(&mut self, id: ClientId) -> Option<Client> { self.map.remove(&id) }
}

impl Default for Clients {
    fn default() -> Self { Self::new() }
}

impl ops::Index<ClientId> for Clients {
    type Output = Client;
    fn index(&self, id: ClientId) -> &Self::Output { &self.map[&id] }
}

struct RoomPlayer {
    client: Option<ClientId>,
}

struct Room {
    game: Box<dyn Game>,
    // Parallel to the game's players.
    players: Vec<RoomPlayer>,
    clients: HashSet<ClientId>,
}

impl Room {
    fn snapshot(&self) -> GameSnapshot { GameSnapshot::take(self.game.as_ref()) }

    fn to_server_action(&self, change: &VarChange) -> ServerAction {
        let (var_type, player) = match change.scope {
            VarScope::Game => (VAR_TYPE_GAME, None),
            VarScope::Player(player) => (VAR_TYPE_PLAYER, Some(player_id(player))),
            VarScope::Private(_) => (VAR_TYPE_PRIVATE, None),
        };
        ServerAction::Update(VarUpdate {
            var_type: var_type.to_owned(),
            player,
            key: change.key.clone(),
            value: change.value.clone(),
        })
    }

    // Sends each change to the clients entitled to it, limited to those passing `filter`.
    fn deliver(
        &self, clients: &Clients, changes: &[VarChange], filter: impl Fn(ClientId) -> bool,
    ) {
        for change in changes {
            let action = self.to_server_action(change);
            match change.scope {
                VarScope::Game | VarScope::Player(_) => {
                    for &client_id in &self.clients {
                        if filter(client_id) {
                            if let Some(client) = clients.get(client_id) {
                                client.send(action.clone());
                            }
                        }
                    }
                }
                VarScope::Private(player) => {
                    let owner = self.players.get(player).and_then(|p| p.client);
                    if let Some(client_id) = owner.filter(|&id| filter(id)) {
                        if let Some(client) = clients.get(client_id) {
                            client.send(action);
                        }
                    }
                }
            }
        }
    }
}

pub struct ServerState {
    clients: Arc<Mutex<Clients>>,
    rooms: HashMap<GameId, Room>,
    default_game_type: GameType,
    rng: StdRng,
}

impl ServerState {
    pub fn new(clients: Arc<Mutex<Clients>>, default_game_type: GameType) -> Self {
        ServerState {
            clients,
            rooms: HashMap::new(),
            default_game_type,
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn game_ids(&self) -> Vec<GameId> { self.rooms.keys().cloned().collect() }

    pub fn apply_event(&mut self, event: IncomingEvent) {
        let clients = Arc::clone(&self.clients);
        let mut clients = clients.lock().unwrap();
        match event {
            IncomingEvent::Network(client_id, text) => {
                if !clients.contains(client_id) {
                    warn!("Message from unknown client {:?}", client_id);
                    return;
                }
                self.process_message(&mut clients, client_id, &text);
            }
            IncomingEvent::Disconnect(client_id) => {
                self.process_disconnect(&mut clients, client_id);
            }
        }
    }

    fn process_message(&mut self, clients: &mut Clients, client_id: ClientId, text: &str) {
        let message = match ClientMessage::decode(text) {
            Ok(message) => message,
            Err(err) => {
                clients[client_id].send_error(err);
                return;
            }
        };
        if message.method == JOIN_METHOD {
            self.process_join(clients, client_id, message.data);
        } else {
            self.process_game_action(clients, client_id, message);
        }
    }

    fn process_join(&mut self, clients: &mut Clients, client_id: ClientId, data: Option<Value>) {
        let request: JoinRequest = match data {
            None | Some(Value::Null) => JoinRequest::default(),
            Some(data) => match serde_json::from_value(data) {
                Ok(request) => request,
                Err(err) => {
                    clients[client_id].send_error(format!("join: {err}"));
                    return;
                }
            },
        };
        let game_type = match &request.game_type {
            None => self.default_game_type,
            Some(name) => match name.parse::<GameType>() {
                Ok(game_type) => game_type,
                Err(_) => {
                    clients[client_id].send_error(format!("join: unknown game type \"{name}\""));
                    return;
                }
            },
        };

        let existing_game = request.game_id.filter(|id| self.rooms.contains_key(id));
        let game_id = match existing_game {
            Some(game_id) => game_id,
            None => self.create_room(game_type),
        };
        let Some(room) = self.rooms.get_mut(&game_id) else {
            clients[client_id].send_error(internal_error!("game {game_id} disappeared"));
            return;
        };

        let before = room.snapshot();
        let requested_player = request
            .player_id
            .as_ref()
            .and_then(player_index)
            .filter(|&player| player < room.players.len());
        let player = match requested_player {
            Some(player) => match room.players[player].client {
                Some(other) if other != client_id && clients.contains(other) => {
                    clients[client_id].send_error("join: player is already connected");
                    return;
                }
                _ => {
                    info!("Client {} reconnected as player {}", clients[client_id].name, player);
                    player
                }
            },
            None => match room.game.add_player(clients[client_id].name.clone()) {
                Ok(player) => {
                    room.players.push(RoomPlayer { client: None });
                    info!(
                        "Client {} joined game {} as player {}",
                        clients[client_id].name, game_id, player
                    );
                    player
                }
                Err(err) => {
                    clients[client_id].send_error(format!("join: {err}"));
                    return;
                }
            },
        };

        self.unseat(clients, client_id);
        let Some(room) = self.rooms.get_mut(&game_id) else {
            return;
        };
        room.players[player].client = Some(client_id);
        room.clients.insert(client_id);
        let game_type = room.game.game_type();
        let Some(client) = clients.map.get_mut(&client_id) else {
            return;
        };
        client.seat = Some(Seat { game_id: game_id.clone(), player });

        for (variable, value) in [
            (SessionVariable::GameType, json!(game_type.name())),
            (SessionVariable::GameId, json!(game_id)),
            (SessionVariable::PlayerId, json!(player_id(player))),
        ] {
            let variable: &'static str = variable.into();
            client.send(ServerAction::PushState(ElementContent(variable.to_owned(), value)));
        }

        let after = room.snapshot();
        room.deliver(clients, &diff(&GameSnapshot::default(), &after), |id| id == client_id);
        room.deliver(clients, &diff(&before, &after), |id| id != client_id);
    }

    fn create_room(&mut self, game_type: GameType) -> GameId {
        loop {
            let game_id = ScalarId::new(random_alphanumeric(&mut self.rng, GAME_ID_LENGTH));
            if let hash_map::Entry::Vacant(e) = self.rooms.entry(game_id.clone()) {
                info!("Created {} game {}", game_type.name(), game_id);
                e.insert(Room {
                    game: new_game(game_type),
                    players: Vec::new(),
                    clients: HashSet::new(),
                });
                return game_id;
            }
        }
    }

    fn process_game_action(
        &mut self, clients: &mut Clients, client_id: ClientId, message: ClientMessage,
    ) {
        let Some(Seat { game_id, player }) = clients[client_id].seat.clone() else {
            clients[client_id].send_error("join a game first");
            return;
        };
        let Some(room) = self.rooms.get_mut(&game_id) else {
            clients[client_id].send_error(format!("game {game_id} does not exist"));
            return;
        };
        let before = room.snapshot();
        let args = ActionArgs::from_data(message.data);
        match room.game.apply_action(player, &message.method, &args, &mut self.rng) {
            Ok(()) => {
                let after = room.snapshot();
                room.deliver(clients, &diff(&before, &after), |_| true);
            }
            Err(err) => {
                info!("Rejected {} by {}: {}", message.method, clients[client_id].name, err);
                clients[client_id].send_error(err);
            }
        }
    }

    // Detaches the client from its current player, if any. The player stays in the game.
    fn unseat(&mut self, clients: &mut Clients, client_id: ClientId) {
        let Some(client) = clients.map.get_mut(&client_id) else {
            return;
        };
        let Some(Seat { game_id, player }) = client.seat.take() else {
            return;
        };
        if let Some(room) = self.rooms.get_mut(&game_id) {
            room.clients.remove(&client_id);
            if let Some(room_player) = room.players.get_mut(player) {
                if room_player.client == Some(client_id) {
                    room_player.client = None;
                }
            }
        }
    }

    fn process_disconnect(&mut self, clients: &mut Clients, client_id: ClientId) {
        self.unseat(clients, client_id);
        if let Some(client) = clients.remove_client(client_id) {
            info!("Client {} disconnected", client.name);
        }
    }
}
