// Blackjack against a house dealer. Players take turns betting and drawing; when the turn returns
// to the first player the dealer plays out and bets are settled.

use itertools::Itertools;
use rand::RngCore;
use rand::seq::SliceRandom;
use serde_json::{Value, json};
use strum::EnumString;

use crate::cards::{Card, Rank, deal, draw, poker_deck};
use crate::game::{ActionArgs, Game, GameType, InvalidAction, PlayerIndex, VarMap, var_map};
use crate::invalid_action;
use crate::turn_based::{Advance, TurnEnd, TurnOrder};


pub const MAX_PLAYERS: usize = 8;
pub const STARTING_COINS: i64 = 50;
pub const DEFAULT_BET: i64 = 5;
pub const DEALER_STANDS_AT: u32 = 16;
const CARDS_PER_DEAL: usize = 2;

#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumString)]
#[strum(serialize_all = "snake_case")]
enum BlackjackAction {
    Start,
    Bet,
    Hit,
    Stay,
}

#[derive(Clone, Debug)]
struct Player {
    name: String,
    hand: Vec<Card>,
    hand_value: u32,
    coins: i64,
    bet: i64,
}

// Aces count 11 unless that would bust the hand.
pub fn hand_value(cards: &[Card]) -> u32 {
    let mut total = 0;
    let mut has_ace = false;
    for card in cards {
        total += match (card.value, card.value.number()) {
            (_, Some(n)) => n,
            (Rank::Ace, None) => {
                has_ace = true;
                1
            }
            (_, None) => 10,
        };
    }
    if has_ace && total + 10 <= 21 { total + 10 } else { total }
}

fn draw_face_up(out_of: &mut Vec<Card>, into: &mut Vec<Card>) -> bool {
    let drawn = draw(out_of, into);
    if let Some(card) = into.last_mut() {
        *card = card.face_up();
    }
    drawn
}

#[derive(Clone, Debug)]
pub struct Blackjack {
    turns: TurnOrder,
    draw_pile: Vec<Card>,
    dealer_hand: Vec<Card>,
    players: Vec<Player>,
}

impl Blackjack {
    pub fn new() -> Self {
        Blackjack {
            turns: TurnOrder::new(),
            draw_pile: Vec::new(),
            dealer_hand: Vec::new(),
            players: Vec::new(),
        }
    }

    fn start(&mut self, rng: &mut dyn RngCore) -> Result<(), InvalidAction> {
        self.turns.start(self.players.len())?;
        self.draw_pile = poker_deck(rng);
        self.deal_round(rng);
        Ok(())
    }

    fn bet(&mut self, player: PlayerIndex, amount: i64) -> Result<TurnEnd, InvalidAction> {
        if amount <= 0 {
            return Err(invalid_action!("bet must be positive"));
        }
        let player = &mut self.players[player];
        if amount > player.coins {
            return Err(invalid_action!("cannot bet {amount} with {} coins", player.coins));
        }
        player.bet = amount;
        Ok(TurnEnd::Continue)
    }

    fn hit(&mut self, player: PlayerIndex) -> Result<TurnEnd, InvalidAction> {
        let player = &mut self.players[player];
        if !draw(&mut self.draw_pile, &mut player.hand) {
            return Err(invalid_action!("no cards left"));
        }
        player.hand_value = hand_value(&player.hand);
        Ok(if player.hand_value < 21 { TurnEnd::Continue } else { TurnEnd::End })
    }

    fn end_turn(&mut self, rng: &mut dyn RngCore) {
        let next = match self.turns.advance(self.players.len()) {
            Advance::NextPlayer(next) => next,
            Advance::NewRound(next) => {
                self.finish_round(rng);
                next
            }
        };
        let player = &mut self.players[next];
        player.hand_value = hand_value(&player.hand);
    }

    // Dealer plays, bets are settled, all cards go back to the pile and a new round is dealt.
    fn finish_round(&mut self, rng: &mut dyn RngCore) {
        while hand_value(&self.dealer_hand) < DEALER_STANDS_AT {
            if !draw_face_up(&mut self.draw_pile, &mut self.dealer_hand) {
                break;
            }
        }
        let dealer = hand_value(&self.dealer_hand);
        for player in self.players.iter_mut() {
            // Players who joined mid-round have not been dealt in.
            if player.hand.is_empty() {
                continue;
            }
            let value = hand_value(&player.hand);
            if value > 21 || (value < dealer && dealer <= 21) {
                player.coins -= player.bet;
            } else {
                player.coins += player.bet;
            }
            self.draw_pile
                .extend(player.hand.drain(..).map(|card| Card::new(card.value, card.suit)));
            player.hand_value = 0;
        }
        self.draw_pile
            .extend(self.dealer_hand.drain(..).map(|card| Card::new(card.value, card.suit)));
        self.deal_round(rng);
    }

    fn deal_round(&mut self, rng: &mut dyn RngCore) {
        self.draw_pile.shuffle(rng);
        let mut hands = self.players.iter_mut().map(|player| &mut player.hand).collect_vec();
        deal(&mut self.draw_pile, &mut hands, CARDS_PER_DEAL);
        for player in self.players.iter_mut() {
            player.hand_value = hand_value(&player.hand);
        }
        draw_face_up(&mut self.draw_pile, &mut self.dealer_hand);
    }
}

impl Default for Blackjack {
    fn default() -> Self { Self::new() }
}

impl Game for Blackjack {
    fn game_type(&self) -> GameType { GameType::Blackjack }
    fn num_players(&self) -> usize { self.players.len() }

    fn add_player(&mut self, name: String) -> Result<PlayerIndex, InvalidAction> {
        if self.players.len() >= MAX_PLAYERS {
            return Err(invalid_action!("game is full"));
        }
        self.players.push(Player {
            name,
            hand: Vec::new(),
            hand_value: 0,
            coins: STARTING_COINS,
            bet: DEFAULT_BET,
        });
        Ok(self.players.len() - 1)
    }

    fn apply_action(
        &mut self, player: PlayerIndex, action: &str, args: &ActionArgs, rng: &mut dyn RngCore,
    ) -> Result<(), InvalidAction> {
        let parsed = action
            .parse::<BlackjackAction>()
            .map_err(|_| invalid_action!("unknown action \"{action}\""))?;
        if player >= self.players.len() {
            return Err(invalid_action!("unknown player {player}"));
        }
        if parsed != BlackjackAction::Start {
            self.turns.check_turn(player)?;
        }
        let turn_end = match parsed {
            BlackjackAction::Start => {
                args.check_params(&[])?;
                return self.start(rng);
            }
            BlackjackAction::Bet => {
                args.check_params(&["amount"])?;
                self.bet(player, args.required(0, "amount")?)?
            }
            BlackjackAction::Hit => {
                args.check_params(&[])?;
                self.hit(player)?
            }
            BlackjackAction::Stay => {
                args.check_params(&[])?;
                TurnEnd::End
            }
        };
        if turn_end == TurnEnd::End {
            self.end_turn(rng);
        }
        Ok(())
    }

    fn game_vars(&self) -> VarMap {
        let current_player = match self.turns.current_player() {
            Some(player) => json!(self.players[player].name),
            None => Value::Null,
        };
        let status: &'static str = self.turns.status().into();
        var_map([
            ("name", json!(GameType::Blackjack.name())),
            ("status", json!(status)),
            ("round", json!(self.turns.round())),
            ("max_players", json!(MAX_PLAYERS)),
            ("current_player", current_player),
            ("dealer_hand", json!(self.dealer_hand)),
        ])
    }

    fn player_public_vars(&self, player: PlayerIndex) -> VarMap {
        let player = &self.players[player];
        var_map([
            ("name", json!(player.name)),
            ("coins", json!(player.coins)),
            ("bet", json!(player.bet)),
        ])
    }

    fn player_private_vars(&self, player: PlayerIndex) -> VarMap {
        let player = &self.players[player];
        var_map([("hand", json!(player.hand)), ("hand_value", json!(player.hand_value))])
    }
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::cards::Suit;
    use crate::test_util::deterministic_rng;

    fn card(value: Rank) -> Card { Card::new(value, Suit::Clubs) }

    fn act(game: &mut Blackjack, player: PlayerIndex, action: &str, data: Option<Value>)
        -> Result<(), InvalidAction>
    {
        game.apply_action(player, action, &ActionArgs::from_data(data), &mut deterministic_rng())
    }

    fn two_player_game() -> Blackjack {
        let mut game = Blackjack::new();
        game.add_player("Sadie".to_owned()).unwrap();
        game.add_player("Chon".to_owned()).unwrap();
        act(&mut game, 0, "start", None).unwrap();
        game
    }

    #[test]
    fn hand_values() {
        assert_eq!(hand_value(&[]), 0);
        assert_eq!(hand_value(&[card(Rank::Ten), card(Rank::King)]), 20);
        assert_eq!(hand_value(&[card(Rank::Ace), card(Rank::King)]), 21);
        assert_eq!(hand_value(&[card(Rank::Ace), card(Rank::Nine), card(Rank::Five)]), 15);
        assert_eq!(hand_value(&[card(Rank::Ace), card(Rank::Ace)]), 12);
        assert_eq!(hand_value(&[card(Rank::Queen), card(Rank::Five), card(Rank::Nine)]), 24);
    }

    #[test]
    fn start_deals_cards() {
        let game = two_player_game();
        assert!(game.players.iter().all(|p| p.hand.len() == 2));
        assert_eq!(game.dealer_hand.len(), 1);
        assert_eq!(game.draw_pile.len(), 52 - 5);
        assert_eq!(game.players[0].hand_value, hand_value(&game.players[0].hand));
        let vars = game.game_vars();
        assert_eq!(vars["status"], json!("active"));
        assert_eq!(vars["round"], json!(1));
        assert_eq!(vars["current_player"], json!("Sadie"));
        assert_eq!(vars["max_players"], json!(8));
    }

    #[test]
    fn actions_before_start_are_rejected() {
        let mut game = Blackjack::new();
        game.add_player("Sadie".to_owned()).unwrap();
        assert_eq!(act(&mut game, 0, "hit", None), Err(InvalidAction::new("game not started yet")));
        assert_eq!(game.game_vars()["current_player"], Value::Null);
        assert!(Blackjack::new().apply_action(
            0, "start", &ActionArgs::None, &mut deterministic_rng()
        ).is_err());
    }

    #[test]
    fn only_current_player_acts() {
        let mut game = two_player_game();
        assert_eq!(act(&mut game, 1, "hit", None), Err(InvalidAction::new("not your turn")));
        assert_eq!(act(&mut game, 0, "stay", None), Ok(()));
        assert_eq!(game.game_vars()["current_player"], json!("Chon"));
        assert_eq!(act(&mut game, 0, "stay", None), Err(InvalidAction::new("not your turn")));
    }

    #[test]
    fn bet_validation() {
        let mut game = two_player_game();
        assert!(act(&mut game, 0, "bet", Some(json!(0))).is_err());
        assert!(act(&mut game, 0, "bet", Some(json!(51))).is_err());
        assert!(act(&mut game, 0, "bet", Some(json!("lots"))).is_err());
        assert!(act(&mut game, 0, "bet", None).is_err());
        act(&mut game, 0, "bet", Some(json!({"amount": 20}))).unwrap();
        assert_eq!(game.player_public_vars(0)["bet"], json!(20));
        // Betting does not end the turn.
        act(&mut game, 0, "bet", Some(json!([10]))).unwrap();
        assert_eq!(game.player_public_vars(0)["bet"], json!(10));
        assert!(act(&mut game, 0, "fold", None).is_err());
        assert!(act(&mut game, 0, "stay", Some(json!([1]))).is_err());
    }

    #[test]
    fn hit_to_21_ends_turn() {
        let mut game = two_player_game();
        game.players[0].hand = vec![card(Rank::King), card(Rank::Five)];
        game.draw_pile.push(card(Rank::Six));
        act(&mut game, 0, "hit", None).unwrap();
        assert_eq!(game.players[0].hand_value, 21);
        assert_eq!(game.turns.current_player(), Some(1));
    }

    #[test]
    fn round_settlement() {
        let mut game = two_player_game();
        game.players[0].hand = vec![card(Rank::King), card(Rank::Nine)];
        game.players[1].hand = vec![card(Rank::King), card(Rank::Six)];
        game.players[1].bet = 10;
        game.dealer_hand = vec![card(Rank::Ten)];
        // Dealer draws the 8 and stands at 18.
        game.draw_pile.push(card(Rank::Eight));
        act(&mut game, 0, "stay", None).unwrap();
        let pile_before_round_end = game.draw_pile.len();
        act(&mut game, 1, "stay", None).unwrap();
        assert_eq!(game.players[0].coins, STARTING_COINS + DEFAULT_BET);
        assert_eq!(game.players[1].coins, STARTING_COINS - 10);
        assert_eq!(game.turns.round(), 2);
        assert_eq!(game.turns.current_player(), Some(0));
        // Fresh deal: all cards went back into the pile first.
        assert!(game.players.iter().all(|p| p.hand.len() == 2));
        assert_eq!(game.dealer_hand.len(), 1);
        assert_eq!(game.draw_pile.len(), pile_before_round_end - 1 + 2 + 2 + 2 - 5);
        assert!(game.players.iter().all(|p| p.hand_value == hand_value(&p.hand)));
    }

    #[test]
    fn bust_loses_even_when_dealer_busts() {
        let mut game = Blackjack::new();
        game.add_player("Sadie".to_owned()).unwrap();
        act(&mut game, 0, "start", None).unwrap();
        game.players[0].hand = vec![card(Rank::King), card(Rank::Queen), card(Rank::Two)];
        game.dealer_hand = vec![card(Rank::King), card(Rank::Six), card(Rank::Nine)];
        act(&mut game, 0, "stay", None).unwrap();
        assert_eq!(game.players[0].coins, STARTING_COINS - DEFAULT_BET);
    }

    #[test]
    fn table_is_limited() {
        let mut game = Blackjack::new();
        for i in 0..MAX_PLAYERS {
            assert_eq!(game.add_player(format!("p{i}")), Ok(i));
        }
        assert_eq!(game.add_player("late".to_owned()), Err(InvalidAction::new("game is full")));
    }

    #[test]
    fn private_vars_hold_hand() {
        let game = two_player_game();
        let vars = game.player_private_vars(1);
        assert_eq!(vars["hand"], json!(game.players[1].hand));
        assert_eq!(vars["hand_value"], json!(hand_value(&game.players[1].hand)));
        assert_eq!(game.player_public_vars(1)["coins"], json!(50));
    }
}
