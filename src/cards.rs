use itertools::iproduct;
use rand::RngCore;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};


#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
}

#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, EnumIter, Serialize, Deserialize,
)]
pub enum Rank {
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "10")]
    Ten,
    #[serde(rename = "J")]
    Jack,
    #[serde(rename = "Q")]
    Queen,
    #[serde(rename = "K")]
    King,
    #[serde(rename = "A")]
    Ace,
}

impl Rank {
    // Face value for number cards, `None` for J, Q, K and A.
    pub fn number(self) -> Option<u32> {
        use Rank::*;
        match self {
            Two => Some(2),
            Three => Some(3),
            Four => Some(4),
            Five => Some(5),
            Six => Some(6),
            Seven => Some(7),
            Eight => Some(8),
            Nine => Some(9),
            Ten => Some(10),
            Jack | Queen | King | Ace => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Up,
    Down,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Card {
    pub facing: Facing,
    pub value: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn new(value: Rank, suit: Suit) -> Self { Card { facing: Facing::Down, value, suit } }
    pub fn face_up(self) -> Self { Card { facing: Facing::Up, ..self } }
}

// All 52 cards, face down, shuffled.
pub fn poker_deck(rng: &mut dyn RngCore) -> Vec<Card> {
    let mut deck = iproduct!(Rank::iter(), Suit::iter())
        .map(|(value, suit)| Card::new(value, suit))
        .collect::<Vec<_>>();
    deck.shuffle(rng);
    deck
}

// Moves the top card. Returns false if `out_of` is empty.
pub fn draw(out_of: &mut Vec<Card>, into: &mut Vec<Card>) -> bool {
    match out_of.pop() {
        Some(card) => {
            into.push(card);
            true
        }
        None => false,
    }
}

// Deals `amount` cards to every hand, one card per hand at a time. Stops early when the pile runs
// out; returns whether all cards were dealt.
pub fn deal(out_of: &mut Vec<Card>, hands: &mut [&mut Vec<Card>], amount: usize) -> bool {
    for _ in 0..amount {
        for hand in hands.iter_mut() {
            if !draw(out_of, hand) {
                return false;
            }
        }
    }
    true
}


#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::test_util::deterministic_rng;

    #[test]
    fn deck_is_complete() {
        let deck = poker_deck(&mut deterministic_rng());
        assert_eq!(deck.len(), 52);
        assert_eq!(deck.iter().collect::<HashSet<_>>().len(), 52);
        assert!(deck.iter().all(|card| card.facing == Facing::Down));
    }

    #[test]
    fn card_json() {
        let card = Card::new(Rank::Ten, Suit::Spades).face_up();
        assert_eq!(
            serde_json::to_value(card).unwrap(),
            json!({"facing": "up", "value": "10", "suit": "spades"})
        );
    }

    #[test]
    fn deal_round_robin() {
        let mut pile = vec![
            Card::new(Rank::Two, Suit::Hearts),
            Card::new(Rank::Three, Suit::Hearts),
            Card::new(Rank::Four, Suit::Hearts),
            Card::new(Rank::Five, Suit::Hearts),
            Card::new(Rank::Six, Suit::Hearts),
        ];
        let mut a = vec![];
        let mut b = vec![];
        assert!(deal(&mut pile, &mut [&mut a, &mut b], 2));
        assert_eq!(a.iter().map(|c| c.value).collect::<Vec<_>>(), vec![Rank::Six, Rank::Four]);
        assert_eq!(b.iter().map(|c| c.value).collect::<Vec<_>>(), vec![Rank::Five, Rank::Three]);
        assert_eq!(pile.len(), 1);
        assert!(!deal(&mut pile, &mut [&mut a, &mut b], 1));
        assert!(pile.is_empty());
        assert_eq!(a.len(), 3);
        assert_eq!(b.len(), 2);
    }
}
