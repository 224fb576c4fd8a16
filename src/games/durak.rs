//! Durak (podkidnoy, single-attacker variant) rule engine
//!
//! One attacker and one defender per round. Attacks after the opening must
//! match a rank already on the table; a defense must beat the oldest
//! undefended attack. The loser is the last player still holding cards once
//! the stock is gone; everyone else simply finishes.

use std::collections::{HashMap, HashSet};

use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::core::player::PlayerId;
use crate::error::{ParlorError, Result};
use crate::games::deck::{shuffled_deck36, Card, Suit};
use crate::games::{illegal, wrong_game, EngineOutcome, GameEvent, GameMove, Outcome};

pub const HAND_SIZE: usize = 6;
pub const MAX_TABLE_PAIRS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Attack,
    Defense,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablePair {
    pub attack: Card,
    pub defense: Option<Card>,
}

/// True iff `defense` beats `attack`: same suit and higher rank, or trump
/// against a non-trump attack
pub fn can_beat(attack: Card, defense: Card, trump: Suit) -> bool {
    (defense.suit == attack.suit && defense.rank > attack.rank)
        || (defense.suit == trump && attack.suit != trump)
}

#[derive(Debug, Clone, PartialEq)]
pub struct DurakState {
    players: Vec<PlayerId>,
    hands: HashMap<PlayerId, Vec<Card>>,
    /// Draw pile; index 0 is the face-up trump card at the bottom
    stock: Vec<Card>,
    trump: Suit,
    trump_card: Card,
    discard: Vec<Card>,
    table: Vec<TablePair>,
    attacker: usize,
    defender: usize,
    /// Players who emptied their hand after the stock ran out, or left
    out: HashSet<PlayerId>,
    phase: Phase,
    /// Attack slots available this round: min(6, defender hand at round start)
    round_cap: usize,
}

#[derive(Debug, Serialize)]
pub struct DurakPublicView {
    pub phase: Phase,
    pub trump: Suit,
    pub trump_card: Card,
    pub stock_count: usize,
    pub discard_count: usize,
    pub table: Vec<TablePair>,
    pub attacker: PlayerId,
    pub defender: PlayerId,
    pub hand_counts: HashMap<PlayerId, usize>,
    pub finished: Vec<PlayerId>,
}

#[derive(Debug, Serialize)]
pub struct DurakPrivateView {
    pub hand: Vec<Card>,
}

impl DurakState {
    pub fn new(players: &[PlayerId], mut rng: ChaCha8Rng) -> Self {
        let mut stock = shuffled_deck36(&mut rng);
        let trump_card = stock[0];

        let mut hands: HashMap<PlayerId, Vec<Card>> = HashMap::new();
        for player in players {
            let mut hand = Vec::with_capacity(HAND_SIZE);
            for _ in 0..HAND_SIZE {
                if let Some(card) = stock.pop() {
                    hand.push(card);
                }
            }
            hands.insert(player.clone(), hand);
        }

        Self {
            players: players.to_vec(),
            hands,
            stock,
            trump: trump_card.suit,
            trump_card,
            discard: Vec::new(),
            table: Vec::new(),
            attacker: 0,
            defender: 1,
            out: HashSet::new(),
            phase: Phase::Attack,
            round_cap: MAX_TABLE_PAIRS,
        }
    }

    pub fn trump(&self) -> Suit {
        self.trump
    }

    pub fn attacker_id(&self) -> &PlayerId {
        &self.players[self.attacker]
    }

    pub fn defender_id(&self) -> &PlayerId {
        &self.players[self.defender]
    }

    pub fn hand(&self, player: &PlayerId) -> Option<&Vec<Card>> {
        self.hands.get(player)
    }

    pub fn table(&self) -> &[TablePair] {
        &self.table
    }

    pub fn turn_owner(&self) -> Option<PlayerId> {
        match self.phase {
            Phase::Attack => Some(self.attacker_id().clone()),
            Phase::Defense => Some(self.defender_id().clone()),
        }
    }

    fn active_count(&self) -> usize {
        self.players.iter().filter(|p| !self.out.contains(*p)).count()
    }

    fn next_active_after(&self, idx: usize) -> usize {
        let n = self.players.len();
        let mut i = (idx + 1) % n;
        while self.out.contains(&self.players[i]) {
            i = (i + 1) % n;
        }
        i
    }

    fn table_has_rank(&self, card: Card) -> bool {
        self.table.iter().any(|pair| {
            pair.attack.rank == card.rank
                || pair.defense.map(|d| d.rank == card.rank).unwrap_or(false)
        })
    }

    fn oldest_undefended(&self) -> Option<usize> {
        self.table.iter().position(|pair| pair.defense.is_none())
    }

    fn undefended_count(&self) -> usize {
        self.table.iter().filter(|p| p.defense.is_none()).count()
    }

    fn take_from_hand(&mut self, player: &PlayerId, card: Card) -> Result<()> {
        let hand = self
            .hands
            .get_mut(player)
            .ok_or(ParlorError::PlayerNotInRoom)?;
        match hand.iter().position(|c| *c == card) {
            Some(pos) => {
                hand.remove(pos);
                Ok(())
            }
            None => Err(illegal("card is not in your hand")),
        }
    }

    pub fn apply(&mut self, player: &PlayerId, mv: &GameMove) -> Result<EngineOutcome> {
        if self.out.contains(player) {
            return Err(illegal("you have already finished"));
        }
        match mv {
            GameMove::Attack { card } => self.apply_attack(player, *card),
            GameMove::Defend { card, pair_index } => self.apply_defend(player, *card, *pair_index),
            GameMove::Take => self.apply_take(player),
            GameMove::Pass => self.apply_pass(player),
            _ => Err(wrong_game()),
        }
    }

    fn apply_attack(&mut self, player: &PlayerId, card: Card) -> Result<EngineOutcome> {
        if player != self.attacker_id() {
            return Err(ParlorError::NotYourTurn);
        }
        if self.phase != Phase::Attack {
            return Err(illegal("the defender has not answered yet"));
        }
        if self.table.len() >= self.round_cap {
            return Err(illegal("attack limit for this round reached"));
        }
        let defender_hand = self
            .hands
            .get(self.defender_id())
            .map(|h| h.len())
            .unwrap_or(0);
        if self.undefended_count() + 1 > defender_hand {
            return Err(illegal("defender does not have enough cards left"));
        }
        if !self.table.is_empty() && !self.table_has_rank(card) {
            return Err(illegal("rank is not on the table"));
        }
        let hand = self.hands.get(player).ok_or(ParlorError::PlayerNotInRoom)?;
        if !hand.contains(&card) {
            return Err(illegal("card is not in your hand"));
        }

        self.take_from_hand(player, card)?;
        self.table.push(TablePair {
            attack: card,
            defense: None,
        });
        self.phase = Phase::Defense;
        Ok(EngineOutcome::none())
    }

    fn apply_defend(&mut self, player: &PlayerId, card: Card, pair_index: usize) -> Result<EngineOutcome> {
        if player != self.defender_id() {
            return Err(ParlorError::NotYourTurn);
        }
        if self.phase != Phase::Defense {
            return Err(illegal("there is nothing to defend against"));
        }
        let oldest = self
            .oldest_undefended()
            .ok_or_else(|| illegal("all attacks are already defended"))?;
        if pair_index != oldest {
            return Err(illegal("must answer the oldest undefended attack"));
        }
        let attack = self.table[oldest].attack;
        if !can_beat(attack, card, self.trump) {
            return Err(illegal("card does not beat the attack"));
        }
        let hand = self.hands.get(player).ok_or(ParlorError::PlayerNotInRoom)?;
        if !hand.contains(&card) {
            return Err(illegal("card is not in your hand"));
        }

        self.take_from_hand(player, card)?;
        self.table[oldest].defense = Some(card);
        if self.oldest_undefended().is_none() {
            // Attacker may add more attacks or pass to end the round
            self.phase = Phase::Attack;
        }
        Ok(EngineOutcome::none())
    }

    fn apply_take(&mut self, player: &PlayerId) -> Result<EngineOutcome> {
        if player != self.defender_id() {
            return Err(ParlorError::NotYourTurn);
        }
        if self.table.is_empty() {
            return Err(illegal("there is nothing to take"));
        }

        let mut taken = Vec::new();
        for pair in self.table.drain(..) {
            taken.push(pair.attack);
            if let Some(d) = pair.defense {
                taken.push(d);
            }
        }
        let count = taken.len();
        if let Some(hand) = self.hands.get_mut(player) {
            hand.extend(taken);
        }

        let mut events = vec![GameEvent::CardsTaken {
            player: player.clone(),
            count,
        }];
        let terminal = self.end_round(false, &mut events);
        Ok(EngineOutcome { events, terminal })
    }

    fn apply_pass(&mut self, player: &PlayerId) -> Result<EngineOutcome> {
        if player != self.attacker_id() {
            return Err(ParlorError::NotYourTurn);
        }
        if self.table.is_empty() {
            return Err(illegal("no attack to end"));
        }
        if self.oldest_undefended().is_some() {
            return Err(illegal("table still has undefended attacks"));
        }

        for pair in self.table.drain(..) {
            self.discard.push(pair.attack);
            if let Some(d) = pair.defense {
                self.discard.push(d);
            }
        }

        let mut events = vec![GameEvent::TableCleared];
        let terminal = self.end_round(true, &mut events);
        Ok(EngineOutcome { events, terminal })
    }

    /// Close the round: replenish hands (attacker first, defender last),
    /// retire empty-handed players once the stock is gone, and rotate roles.
    fn end_round(&mut self, defense_succeeded: bool, events: &mut Vec<GameEvent>) -> Option<Outcome> {
        let draw_order = self.replenish_order();
        for idx in draw_order {
            let player = self.players[idx].clone();
            if let Some(hand) = self.hands.get_mut(&player) {
                while hand.len() < HAND_SIZE {
                    match self.stock.pop() {
                        Some(card) => hand.push(card),
                        None => break,
                    }
                }
            }
        }

        if self.stock.is_empty() {
            let emptied: Vec<PlayerId> = self
                .players
                .iter()
                .filter(|p| !self.out.contains(*p))
                .filter(|p| self.hands.get(*p).map(|h| h.is_empty()).unwrap_or(true))
                .cloned()
                .collect();
            for player in emptied {
                self.out.insert(player.clone());
                events.push(GameEvent::PlayerOut { player });
            }
        }

        match self.active_count() {
            0 => return Some(Outcome::Draw),
            1 => {
                let loser = self
                    .players
                    .iter()
                    .find(|p| !self.out.contains(*p))
                    .cloned();
                if let Some(loser) = loser {
                    return Some(Outcome::Durak { loser });
                }
            }
            _ => {}
        }

        // Successful defense: the defender leads the next round.
        // Take: the defender forfeits the lead and the seat past them
        // attacks next (standard podkidnoy rotation; head-to-head this
        // leaves the attacker unchanged).
        let defender = self.defender;
        self.attacker = if defense_succeeded {
            if self.out.contains(&self.players[defender]) {
                self.next_active_after(defender)
            } else {
                defender
            }
        } else {
            self.next_active_after(defender)
        };
        self.defender = self.next_active_after(self.attacker);
        self.phase = Phase::Attack;
        self.round_cap = self
            .hands
            .get(self.defender_id())
            .map(|h| h.len().min(MAX_TABLE_PAIRS))
            .unwrap_or(MAX_TABLE_PAIRS);
        None
    }

    /// Attacker draws first, then the other players in seat order, defender last
    fn replenish_order(&self) -> Vec<usize> {
        let n = self.players.len();
        let mut order = vec![self.attacker];
        let mut i = (self.attacker + 1) % n;
        while i != self.attacker {
            if i != self.defender && !self.out.contains(&self.players[i]) {
                order.push(i);
            }
            i = (i + 1) % n;
        }
        if !self.out.contains(&self.players[self.defender]) {
            order.push(self.defender);
        }
        order
    }

    /// Remove a player who left mid-game; their cards go to the discard and
    /// any round they were part of is abandoned.
    pub fn eliminate(&mut self, player: &PlayerId) -> EngineOutcome {
        if self.out.contains(player) || !self.players.contains(player) {
            return EngineOutcome::none();
        }
        self.out.insert(player.clone());
        if let Some(hand) = self.hands.get_mut(player) {
            self.discard.append(hand);
        }

        let was_in_round =
            *player == self.players[self.attacker] || *player == self.players[self.defender];
        if was_in_round {
            for pair in self.table.drain(..) {
                self.discard.push(pair.attack);
                if let Some(d) = pair.defense {
                    self.discard.push(d);
                }
            }
            let leaver_idx = self
                .players
                .iter()
                .position(|p| p == player)
                .unwrap_or(self.attacker);
            self.attacker = self.next_active_after(leaver_idx);
            self.defender = self.next_active_after(self.attacker);
            self.phase = Phase::Attack;
            self.round_cap = self
                .hands
                .get(self.defender_id())
                .map(|h| h.len().min(MAX_TABLE_PAIRS))
                .unwrap_or(MAX_TABLE_PAIRS);
        }

        EngineOutcome::with_events(vec![GameEvent::PlayerOut {
            player: player.clone(),
        }])
    }

    pub fn public_view(&self) -> DurakPublicView {
        DurakPublicView {
            phase: self.phase,
            trump: self.trump,
            trump_card: self.trump_card,
            stock_count: self.stock.len(),
            discard_count: self.discard.len(),
            table: self.table.clone(),
            attacker: self.attacker_id().clone(),
            defender: self.defender_id().clone(),
            hand_counts: self
                .hands
                .iter()
                .map(|(p, h)| (p.clone(), h.len()))
                .collect(),
            finished: self.out.iter().cloned().collect(),
        }
    }

    pub fn private_view(&self, player: &PlayerId) -> Option<DurakPrivateView> {
        self.hands.get(player).map(|hand| {
            let mut sorted = hand.clone();
            sorted.sort_by_key(|c| (c.suit as u8, c.rank));
            DurakPrivateView { hand: sorted }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::deck::Rank;
    use rand::SeedableRng;

    fn players() -> Vec<PlayerId> {
        vec!["anna".to_string(), "boris".to_string()]
    }

    fn new_game(seed: u64) -> DurakState {
        DurakState::new(&players(), ChaCha8Rng::seed_from_u64(seed))
    }

    #[test]
    fn test_can_beat_truth_table() {
        let trump = Suit::Spades;
        let seven_h = Card::new(Suit::Hearts, Rank::Seven);
        let ten_h = Card::new(Suit::Hearts, Rank::Ten);
        let six_s = Card::new(Suit::Spades, Rank::Six);
        let seven_s = Card::new(Suit::Spades, Rank::Seven);
        let seven_c = Card::new(Suit::Clubs, Rank::Seven);

        // Same suit, higher rank
        assert!(can_beat(seven_h, ten_h, trump));
        assert!(!can_beat(ten_h, seven_h, trump));
        // Trump beats non-trump regardless of rank
        assert!(can_beat(ten_h, six_s, trump));
        // Non-trump cannot beat trump
        assert!(!can_beat(six_s, ten_h, trump));
        // Higher trump beats lower trump
        assert!(can_beat(six_s, seven_s, trump));
        // Same rank, different non-trump suit never beats
        assert!(!can_beat(seven_h, seven_c, trump));
    }

    #[test]
    fn test_deal_shapes() {
        let state = new_game(3);
        assert_eq!(state.hand(&"anna".to_string()).unwrap().len(), HAND_SIZE);
        assert_eq!(state.hand(&"boris".to_string()).unwrap().len(), HAND_SIZE);
        assert_eq!(state.public_view().stock_count, 36 - 2 * HAND_SIZE);
        assert_eq!(state.attacker_id(), "anna");
        assert_eq!(state.defender_id(), "boris");
    }

    #[test]
    fn test_opening_attack_then_same_rank_defense_rejected() {
        let mut state = new_game(5);
        let attacker = state.attacker_id().clone();
        let defender = state.defender_id().clone();

        // Play any non-trump card from the attacker's hand if possible
        let attack_card = state.hand(&attacker).unwrap()[0];
        state
            .apply(&attacker, &GameMove::Attack { card: attack_card })
            .unwrap();

        // Forge a same-rank, different-suit, non-trump defense attempt.
        // Inject it into the defender's hand so only the beat check can fail.
        let bad_suit = crate::games::deck::SUITS
            .iter()
            .copied()
            .find(|s| *s != attack_card.suit && *s != state.trump())
            .unwrap();
        let bad_card = Card::new(bad_suit, attack_card.rank);
        state
            .hands
            .get_mut(&defender)
            .unwrap()
            .push(bad_card);

        let before = state.clone();
        let result = state.apply(
            &defender,
            &GameMove::Defend {
                card: bad_card,
                pair_index: 0,
            },
        );
        assert!(matches!(result, Err(ParlorError::IllegalMove(_))));
        assert_eq!(state, before);
    }

    #[test]
    fn test_attack_rank_must_be_on_table() {
        let mut state = new_game(11);
        let attacker = state.attacker_id().clone();
        let hand = state.hand(&attacker).unwrap().clone();
        let first = hand[0];
        state
            .apply(&attacker, &GameMove::Attack { card: first })
            .unwrap();

        // Find a second card with a rank not on the table
        if let Some(second) = hand[1..].iter().find(|c| c.rank != first.rank) {
            let result = state.apply(&attacker, &GameMove::Attack { card: *second });
            // Defender has not answered yet; adding is only legal in Attack phase
            assert!(result.is_err());
        }
    }

    #[test]
    fn test_take_gives_defender_the_table_and_keeps_attacker() {
        let mut state = new_game(9);
        let attacker = state.attacker_id().clone();
        let defender = state.defender_id().clone();

        let attack_card = state.hand(&attacker).unwrap()[0];
        state
            .apply(&attacker, &GameMove::Attack { card: attack_card })
            .unwrap();

        let defender_before = state.hand(&defender).unwrap().len();
        let out = state.apply(&defender, &GameMove::Take).unwrap();
        assert!(matches!(out.events[0], GameEvent::CardsTaken { count: 1, .. }));

        // Defender gained the table card (then both replenished to 6+)
        let defender_after = state.hand(&defender).unwrap().len();
        assert!(defender_after >= defender_before + 1 || defender_after >= HAND_SIZE);
        // Two players: the skipped defender leaves the same attacker in place
        assert_eq!(state.attacker_id(), &attacker);
        assert!(state.table().is_empty());
    }

    #[test]
    fn test_successful_defense_rotates_attacker_and_replenishes() {
        // Search seeds for a deal where the defender can beat the opening attack
        for seed in 0..200 {
            let mut state = new_game(seed);
            let attacker = state.attacker_id().clone();
            let defender = state.defender_id().clone();
            let trump = state.trump();

            let attacker_hand = state.hand(&attacker).unwrap().clone();
            let defender_hand = state.hand(&defender).unwrap().clone();

            let playable = attacker_hand.iter().find_map(|a| {
                defender_hand
                    .iter()
                    .find(|d| can_beat(*a, **d, trump))
                    .map(|d| (*a, *d))
            });
            let (attack, defense) = match playable {
                Some(pair) => pair,
                None => continue,
            };

            state
                .apply(&attacker, &GameMove::Attack { card: attack })
                .unwrap();
            state
                .apply(
                    &defender,
                    &GameMove::Defend {
                        card: defense,
                        pair_index: 0,
                    },
                )
                .unwrap();
            let out = state.apply(&attacker, &GameMove::Pass).unwrap();
            assert!(matches!(out.events[0], GameEvent::TableCleared));

            // Defender leads the next round; both drew back up to six
            assert_eq!(state.attacker_id(), &defender);
            assert_eq!(state.hand(&attacker).unwrap().len(), HAND_SIZE);
            assert_eq!(state.hand(&defender).unwrap().len(), HAND_SIZE);
            return;
        }
        panic!("no seed produced a beatable opening attack");
    }

    #[test]
    fn test_pass_with_undefended_table_rejected() {
        let mut state = new_game(13);
        let attacker = state.attacker_id().clone();
        let card = state.hand(&attacker).unwrap()[0];
        state.apply(&attacker, &GameMove::Attack { card }).unwrap();
        let result = state.apply(&attacker, &GameMove::Pass);
        assert!(result.is_err());
    }

    #[test]
    fn test_defender_cannot_attack() {
        let mut state = new_game(17);
        let defender = state.defender_id().clone();
        let card = state.hand(&defender).unwrap()[0];
        let result = state.apply(&defender, &GameMove::Attack { card });
        assert_eq!(result, Err(ParlorError::NotYourTurn));
    }
}
