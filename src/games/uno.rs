//! UNO rule engine
//!
//! Draw penalties do not stack: a draw-two or wild-draw-four is resolved
//! against the next player immediately inside the same move.

use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::core::player::PlayerId;
use crate::error::{ParlorError, Result};
use crate::games::{illegal, wrong_game, EngineOutcome, GameEvent, GameMove, Outcome};

pub const STARTING_HAND: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnoColor {
    Red,
    Yellow,
    Green,
    Blue,
}

pub const COLORS: [UnoColor; 4] = [
    UnoColor::Red,
    UnoColor::Yellow,
    UnoColor::Green,
    UnoColor::Blue,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnoValue {
    Number(u8),
    Skip,
    Reverse,
    Draw2,
    Wild,
    Wild4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnoCard {
    /// None for wild cards
    pub color: Option<UnoColor>,
    pub value: UnoValue,
}

impl UnoCard {
    pub fn colored(color: UnoColor, value: UnoValue) -> Self {
        Self {
            color: Some(color),
            value,
        }
    }

    pub fn wild(value: UnoValue) -> Self {
        Self { color: None, value }
    }

    pub fn is_wild(&self) -> bool {
        matches!(self.value, UnoValue::Wild | UnoValue::Wild4)
    }
}

/// The standard 108-card deck
pub fn build_deck() -> Vec<UnoCard> {
    let mut deck = Vec::with_capacity(108);
    for color in COLORS {
        deck.push(UnoCard::colored(color, UnoValue::Number(0)));
        for n in 1..=9 {
            deck.push(UnoCard::colored(color, UnoValue::Number(n)));
            deck.push(UnoCard::colored(color, UnoValue::Number(n)));
        }
        for value in [UnoValue::Skip, UnoValue::Reverse, UnoValue::Draw2] {
            deck.push(UnoCard::colored(color, value));
            deck.push(UnoCard::colored(color, value));
        }
    }
    for _ in 0..4 {
        deck.push(UnoCard::wild(UnoValue::Wild));
        deck.push(UnoCard::wild(UnoValue::Wild4));
    }
    deck
}

#[derive(Debug, Clone)]
pub struct UnoState {
    players: Vec<PlayerId>,
    hands: HashMap<PlayerId, Vec<UnoCard>>,
    draw_pile: Vec<UnoCard>,
    discard: Vec<UnoCard>,
    /// Effective color: the chosen color when the top card is wild,
    /// otherwise the top card's face color
    active_color: UnoColor,
    direction: i8,
    current: usize,
    declared_uno: HashSet<PlayerId>,
    rng: ChaCha8Rng,
}

#[derive(Debug, Serialize)]
pub struct UnoPublicView {
    pub top_card: UnoCard,
    pub active_color: UnoColor,
    pub direction: i8,
    pub turn_owner: PlayerId,
    pub hand_counts: HashMap<PlayerId, usize>,
    pub draw_pile_count: usize,
    pub declared_uno: Vec<PlayerId>,
}

#[derive(Debug, Serialize)]
pub struct UnoPrivateView {
    pub hand: Vec<UnoCard>,
}

impl UnoState {
    pub fn new(players: &[PlayerId], mut rng: ChaCha8Rng) -> Self {
        let mut draw_pile = build_deck();
        draw_pile.shuffle(&mut rng);

        let mut hands: HashMap<PlayerId, Vec<UnoCard>> = HashMap::new();
        for player in players {
            let split = draw_pile.len() - STARTING_HAND;
            hands.insert(player.clone(), draw_pile.split_off(split));
        }

        // Flip the first number card; action and wild cards rotate to the bottom
        while !matches!(
            draw_pile.last().map(|c| c.value),
            Some(UnoValue::Number(_))
        ) {
            if let Some(card) = draw_pile.pop() {
                draw_pile.insert(0, card);
            }
        }
        let top = draw_pile.pop().unwrap_or(UnoCard::colored(
            UnoColor::Red,
            UnoValue::Number(0),
        ));
        let active_color = top.color.unwrap_or(UnoColor::Red);

        Self {
            players: players.to_vec(),
            hands,
            draw_pile,
            discard: vec![top],
            active_color,
            direction: 1,
            current: 0,
            declared_uno: HashSet::new(),
            rng,
        }
    }

    pub fn turn_owner(&self) -> PlayerId {
        self.players[self.current].clone()
    }

    pub fn top_card(&self) -> UnoCard {
        *self.discard.last().unwrap_or(&UnoCard::colored(
            UnoColor::Red,
            UnoValue::Number(0),
        ))
    }

    pub fn active_color(&self) -> UnoColor {
        self.active_color
    }

    pub fn hand(&self, player: &PlayerId) -> Option<&Vec<UnoCard>> {
        self.hands.get(player)
    }

    fn advance(&mut self, steps: usize) {
        let n = self.players.len() as i32;
        let delta = self.direction as i32 * steps as i32;
        self.current = ((self.current as i32 + delta).rem_euclid(n)) as usize;
    }

    fn seat_after_current(&self) -> usize {
        let n = self.players.len() as i32;
        ((self.current as i32 + self.direction as i32).rem_euclid(n)) as usize
    }

    /// Draw one card, reshuffling the discard (minus its top) when needed
    fn draw_one(&mut self) -> Option<UnoCard> {
        if self.draw_pile.is_empty() && self.discard.len() > 1 {
            let top = self.discard.pop();
            self.draw_pile.append(&mut self.discard);
            self.draw_pile.shuffle(&mut self.rng);
            if let Some(top) = top {
                self.discard.push(top);
            }
        }
        self.draw_pile.pop()
    }

    fn give_cards(&mut self, seat: usize, count: usize) -> usize {
        let player = self.players[seat].clone();
        let mut given = 0;
        for _ in 0..count {
            match self.draw_one() {
                Some(card) => {
                    if let Some(hand) = self.hands.get_mut(&player) {
                        hand.push(card);
                        given += 1;
                    }
                }
                None => break,
            }
        }
        self.declared_uno.remove(&player);
        given
    }

    fn value_matches(top: UnoValue, played: UnoValue) -> bool {
        match (top, played) {
            (UnoValue::Number(a), UnoValue::Number(b)) => a == b,
            (UnoValue::Skip, UnoValue::Skip) => true,
            (UnoValue::Reverse, UnoValue::Reverse) => true,
            (UnoValue::Draw2, UnoValue::Draw2) => true,
            _ => false,
        }
    }

    pub fn apply(&mut self, player: &PlayerId, mv: &GameMove) -> Result<EngineOutcome> {
        match mv {
            GameMove::PlayCard { card, chosen_color } => {
                self.apply_play(player, *card, *chosen_color)
            }
            GameMove::Draw => self.apply_draw(player),
            GameMove::CallUno => self.apply_call_uno(player),
            GameMove::CatchUno { target } => self.apply_catch_uno(player, target),
            _ => Err(wrong_game()),
        }
    }

    fn apply_play(
        &mut self,
        player: &PlayerId,
        card: UnoCard,
        chosen_color: Option<UnoColor>,
    ) -> Result<EngineOutcome> {
        if *player != self.turn_owner() {
            return Err(ParlorError::NotYourTurn);
        }
        let hand = self.hands.get(player).ok_or(ParlorError::PlayerNotInRoom)?;
        if !hand.contains(&card) {
            return Err(illegal("card is not in your hand"));
        }

        if card.is_wild() {
            if chosen_color.is_none() {
                return Err(illegal("a wild play must name a color"));
            }
        } else {
            let top = self.top_card();
            let color_ok = card.color == Some(self.active_color);
            let value_ok = Self::value_matches(top.value, card.value);
            if !color_ok && !value_ok {
                return Err(illegal("card matches neither the active color nor the rank"));
            }
        }

        // Legal: commit
        if let Some(hand) = self.hands.get_mut(player) {
            if let Some(pos) = hand.iter().position(|c| *c == card) {
                hand.remove(pos);
            }
        }
        self.discard.push(card);
        self.active_color = match chosen_color {
            Some(color) if card.is_wild() => color,
            _ => card.color.unwrap_or(self.active_color),
        };

        let mut events = Vec::new();
        let hand_len = self.hands.get(player).map(|h| h.len()).unwrap_or(0);
        if hand_len == 0 {
            return Ok(EngineOutcome {
                events,
                terminal: Some(Outcome::Win {
                    winner: player.clone(),
                }),
            });
        }
        if hand_len > 2 {
            self.declared_uno.remove(player);
        }

        match card.value {
            UnoValue::Number(_) | UnoValue::Wild => self.advance(1),
            UnoValue::Skip => self.advance(2),
            UnoValue::Reverse => {
                if self.players.len() == 2 {
                    // Reverse acts as skip head-to-head
                    self.advance(2);
                } else {
                    self.direction = -self.direction;
                    self.advance(1);
                }
            }
            UnoValue::Draw2 | UnoValue::Wild4 => {
                let count = if card.value == UnoValue::Draw2 { 2 } else { 4 };
                let victim = self.seat_after_current();
                let victim_id = self.players[victim].clone();
                let given = self.give_cards(victim, count);
                events.push(GameEvent::PenaltyDraw {
                    player: victim_id,
                    count: given,
                });
                // Penalty recipient also forfeits their turn
                self.advance(2);
            }
        }

        Ok(EngineOutcome::with_events(events))
    }

    fn apply_draw(&mut self, player: &PlayerId) -> Result<EngineOutcome> {
        if *player != self.turn_owner() {
            return Err(ParlorError::NotYourTurn);
        }
        let seat = self.current;
        self.give_cards(seat, 1);
        self.advance(1);
        Ok(EngineOutcome::none())
    }

    fn apply_call_uno(&mut self, player: &PlayerId) -> Result<EngineOutcome> {
        let hand = self.hands.get(player).ok_or(ParlorError::PlayerNotInRoom)?;
        if hand.len() > 2 {
            return Err(illegal("you may only call UNO at two cards or fewer"));
        }
        self.declared_uno.insert(player.clone());
        Ok(EngineOutcome::with_events(vec![GameEvent::UnoCalled {
            player: player.clone(),
        }]))
    }

    fn apply_catch_uno(&mut self, player: &PlayerId, target: &PlayerId) -> Result<EngineOutcome> {
        if player == target {
            return Err(illegal("cannot catch yourself"));
        }
        let seat = self
            .players
            .iter()
            .position(|p| p == target)
            .ok_or_else(|| illegal("no such player"))?;
        let target_hand = self.hands.get(target).map(|h| h.len()).unwrap_or(0);
        let declared = self.declared_uno.contains(target);
        if target_hand != 1 || declared {
            return Err(illegal("that player is not catchable"));
        }

        let given = self.give_cards(seat, 2);
        Ok(EngineOutcome::with_events(vec![GameEvent::PenaltyDraw {
            player: target.clone(),
            count: given,
        }]))
    }

    /// Remove a player who left mid-game; their cards rotate to the bottom
    /// of the draw pile.
    pub fn eliminate(&mut self, player: &PlayerId) -> EngineOutcome {
        let seat = match self.players.iter().position(|p| p == player) {
            Some(s) => s,
            None => return EngineOutcome::none(),
        };
        if let Some(mut hand) = self.hands.remove(player) {
            hand.reverse();
            for card in hand {
                self.draw_pile.insert(0, card);
            }
        }
        self.declared_uno.remove(player);
        self.players.remove(seat);
        if !self.players.is_empty() {
            if seat < self.current {
                self.current -= 1;
            }
            if self.current >= self.players.len() {
                self.current = 0;
            }
        } else {
            self.current = 0;
        }
        EngineOutcome::with_events(vec![GameEvent::PlayerOut {
            player: player.clone(),
        }])
    }

    pub fn public_view(&self) -> UnoPublicView {
        UnoPublicView {
            top_card: self.top_card(),
            active_color: self.active_color,
            direction: self.direction,
            turn_owner: self.turn_owner(),
            hand_counts: self
                .hands
                .iter()
                .map(|(p, h)| (p.clone(), h.len()))
                .collect(),
            draw_pile_count: self.draw_pile.len(),
            declared_uno: self.declared_uno.iter().cloned().collect(),
        }
    }

    pub fn private_view(&self, player: &PlayerId) -> Option<UnoPrivateView> {
        self.hands
            .get(player)
            .map(|hand| UnoPrivateView { hand: hand.clone() })
    }
}
