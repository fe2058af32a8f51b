// Turn order shared by turn-based games: players act one at a time in join order, and a round
// ends when the turn comes back to the player who started it.

use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoStaticStr};

use crate::game::{InvalidAction, PlayerIndex};
use crate::invalid_action;


#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GameStatus {
    Lobby,
    Active,
}

// What a turn action does with the turn.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TurnEnd {
    Continue,
    End,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Advance {
    NextPlayer(PlayerIndex),
    // Turn passed back to the starting player.
    NewRound(PlayerIndex),
}

#[derive(Clone, Debug)]
pub struct TurnOrder {
    status: GameStatus,
    current: Option<PlayerIndex>,
    starting: PlayerIndex,
    round: u32,
}

impl TurnOrder {
    pub fn new() -> Self {
        TurnOrder {
            status: GameStatus::Lobby,
            current: None,
            starting: 0,
            round: 0,
        }
    }

    pub fn status(&self) -> GameStatus { self.status }
    pub fn current_player(&self) -> Option<PlayerIndex> { self.current }
    pub fn round(&self) -> u32 { self.round }

    // First player to join moves first; the first round is round 1.
    pub fn start(&mut self, num_players: usize) -> Result<(), InvalidAction> {
        if self.status != GameStatus::Lobby {
            return Err(invalid_action!("game already started"));
        }
        if num_players == 0 {
            return Err(invalid_action!("no players"));
        }
        self.status = GameStatus::Active;
        self.starting = 0;
        self.current = Some(0);
        self.round = 1;
        Ok(())
    }

    pub fn check_active(&self) -> Result<(), InvalidAction> {
        match self.status {
            GameStatus::Active => Ok(()),
            GameStatus::Lobby => Err(invalid_action!("game not started yet")),
        }
    }

    pub fn check_turn(&self, player: PlayerIndex) -> Result<(), InvalidAction> {
        self.check_active()?;
        if self.current != Some(player) {
            return Err(invalid_action!("not your turn"));
        }
        Ok(())
    }

    // `num_players` may grow between calls: players who join mid-game take turns from the next
    // pass on.
    pub fn advance(&mut self, num_players: usize) -> Advance {
        let current = self.current.unwrap_or(self.starting);
        let next = (current + 1) % num_players.max(1);
        self.current = Some(next);
        if next == self.starting {
            self.round += 1;
            Advance::NewRound(next)
        } else {
            Advance::NextPlayer(next)
        }
    }
}

impl Default for TurnOrder {
    fn default() -> Self { Self::new() }
}
