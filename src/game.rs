// Server-side game model. A game exposes its state as three groups of JSON variables: game-wide,
// per-player public and per-player private. The server snapshots them around every action and
// sends the difference to the clients.

use std::fmt;

use rand::RngCore;
use serde::de::DeserializeOwned;
use serde_json::Value;
use strum::{EnumIter, EnumString, IntoStaticStr};

use crate::blackjack::Blackjack;


pub type VarMap = serde_json::Map<String, Value>;

// Index of a player within a game, in join order.
pub type PlayerIndex = usize;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct InvalidAction(pub String);

impl InvalidAction {
    pub fn new(reason: impl Into<String>) -> Self { InvalidAction(reason.into()) }
}

impl fmt::Display for InvalidAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[macro_export]
macro_rules! invalid_action {
    ($($arg:tt)*) => {
        $crate::game::InvalidAction(format!($($arg)*))
    }
}

pub fn var_map(entries: impl IntoIterator<Item = (&'static str, Value)>) -> VarMap {
    entries.into_iter().map(|(key, value)| (key.to_owned(), value)).collect()
}

// Action arguments as sent by the client: a list binds positionally, an object binds by
// parameter name, any other value is the single argument and null (or no data) means no
// arguments.
#[derive(Clone, PartialEq, Debug)]
pub enum ActionArgs {
    None,
    Positional(Vec<Value>),
    Named(VarMap),
}

impl ActionArgs {
    pub fn from_data(data: Option<Value>) -> Self {
        match data {
            None | Some(Value::Null) => ActionArgs::None,
            Some(Value::Array(values)) => ActionArgs::Positional(values),
            Some(Value::Object(map)) => ActionArgs::Named(map),
            Some(scalar) => ActionArgs::Positional(vec![scalar]),
        }
    }

    // Checks that only arguments from `params` are present.
    pub fn check_params(&self, params: &[&str]) -> Result<(), InvalidAction> {
        match self {
            ActionArgs::None => Ok(()),
            ActionArgs::Positional(values) => {
                if values.len() > params.len() {
                    return Err(invalid_action!(
                        "expected at most {} argument(s), got {}",
                        params.len(),
                        values.len()
                    ));
                }
                Ok(())
            }
            ActionArgs::Named(map) => {
                match map.keys().find(|key| !params.contains(&key.as_str())) {
                    Some(key) => Err(invalid_action!("unexpected argument \"{key}\"")),
                    None => Ok(()),
                }
            }
        }
    }

    pub fn get(&self, index: usize, name: &str) -> Option<&Value> {
        match self {
            ActionArgs::None => None,
            ActionArgs::Positional(values) => values.get(index),
            ActionArgs::Named(map) => map.get(name),
        }
    }

    pub fn required<T: DeserializeOwned>(
        &self, index: usize, name: &str,
    ) -> Result<T, InvalidAction> {
        let value = self
            .get(index, name)
            .ok_or_else(|| invalid_action!("missing argument \"{name}\""))?;
        serde_json::from_value(value.clone())
            .map_err(|err| invalid_action!("bad argument \"{name}\": {err}"))
    }
}

pub trait Game: Send {
    fn game_type(&self) -> GameType;
    fn num_players(&self) -> usize;
    // Returns the index of the new player, which is always `num_players()` before the call.
    fn add_player(&mut self, name: String) -> Result<PlayerIndex, InvalidAction>;
    fn apply_action(
        &mut self, player: PlayerIndex, action: &str, args: &ActionArgs, rng: &mut dyn RngCore,
    ) -> Result<(), InvalidAction>;
    fn game_vars(&self) -> VarMap;
    fn player_public_vars(&self, player: PlayerIndex) -> VarMap;
    fn player_private_vars(&self, player: PlayerIndex) -> VarMap;
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumString, IntoStaticStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum GameType {
    Blackjack,
}

impl GameType {
    pub fn name(self) -> &'static str { self.into() }
}

pub fn new_game(game_type: GameType) -> Box<dyn Game> {
    match game_type {
        GameType::Blackjack => Box::new(Blackjack::new()),
    }
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct PlayerSnapshot {
    pub public: VarMap,
    pub private: VarMap,
}

// Game variables at a point in time. The default value is an empty game, so diffing against it
// yields the full state.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct GameSnapshot {
    pub game: VarMap,
    pub players: Vec<PlayerSnapshot>,
}

impl GameSnapshot {
    pub fn take(game: &dyn Game) -> Self {
        GameSnapshot {
            game: game.game_vars(),
            players: (0..game.num_players())
                .map(|player| PlayerSnapshot {
                    public: game.player_public_vars(player),
                    private: game.player_private_vars(player),
                })
                .collect(),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VarScope {
    Game,
    Player(PlayerIndex),
    Private(PlayerIndex),
}

#[derive(Clone, PartialEq, Debug)]
pub struct VarChange {
    pub scope: VarScope,
    pub key: String,
    // Null if the variable was removed.
    pub value: Value,
}

// Keys whose values differ, in `new` order followed by removed keys.
fn diff_vars(scope: VarScope, old: &VarMap, new: &VarMap, out: &mut Vec<VarChange>) {
    for (key, value) in new {
        if old.get(key) != Some(value) {
            out.push(VarChange { scope, key: key.clone(), value: value.clone() });
        }
    }
    for key in old.keys() {
        if !new.contains_key(key) {
            out.push(VarChange { scope, key: key.clone(), value: Value::Null });
        }
    }
}

pub fn diff(old: &GameSnapshot, new: &GameSnapshot) -> Vec<VarChange> {
    let empty = PlayerSnapshot::default();
    let mut changes = Vec::new();
    diff_vars(VarScope::Game, &old.game, &new.game, &mut changes);
    for player in 0..old.players.len().max(new.players.len()) {
        let before = old.players.get(player).unwrap_or(&empty);
        let after = new.players.get(player).unwrap_or(&empty);
        diff_vars(VarScope::Player(player), &before.public, &after.public, &mut changes);
    }
    for player in 0..old.players.len().max(new.players.len()) {
        let before = old.players.get(player).unwrap_or(&empty);
        let after = new.players.get(player).unwrap_or(&empty);
        diff_vars(VarScope::Private(player), &before.private, &after.private, &mut changes);
    }
    changes
}
