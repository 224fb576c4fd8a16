//! Magnate rule engine: a Monopoly-style economy game
//!
//! Fixed 40-square board, dice movement, property trading through direct
//! purchase or auction, even-build housing, jail and bankruptcy. All state
//! is public; there are no hidden hands.

use std::collections::HashMap;

use rand::Rng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::core::player::PlayerId;
use crate::error::{ParlorError, Result};
use crate::games::{illegal, wrong_game, EngineOutcome, GameEvent, GameMove, Outcome};

pub const BOARD_SIZE: u8 = 40;
pub const STARTING_CASH: i64 = 1500;
pub const GO_SALARY: i64 = 200;
pub const JAIL_FINE: i64 = 50;
pub const JAIL_SQUARE: u8 = 10;
pub const MAX_HOUSES: u8 = 5;

/// Rent multiplier by building count (index 0 = unimproved)
const RENT_MULT: [i64; 6] = [1, 5, 15, 45, 80, 125];

/// House cost per color group
const HOUSE_COST: [i64; 8] = [50, 50, 100, 100, 150, 150, 200, 200];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SquareKind {
    Go,
    Property { group: u8, price: i64, base_rent: i64 },
    Railroad { price: i64 },
    Utility { price: i64 },
    Tax { amount: i64 },
    Chance,
    Chest,
    JailVisit,
    FreeParking,
    GoToJail,
}

#[derive(Debug, Clone, Copy)]
pub struct SquareDef {
    pub name: &'static str,
    pub kind: SquareKind,
}

macro_rules! prop {
    ($name:expr, $group:expr, $price:expr, $rent:expr) => {
        SquareDef {
            name: $name,
            kind: SquareKind::Property {
                group: $group,
                price: $price,
                base_rent: $rent,
            },
        }
    };
}

pub const BOARD: [SquareDef; 40] = [
    SquareDef { name: "Go", kind: SquareKind::Go },
    prop!("Mill Lane", 0, 60, 2),
    SquareDef { name: "Community Chest", kind: SquareKind::Chest },
    prop!("Dock Street", 0, 60, 4),
    SquareDef { name: "Income Tax", kind: SquareKind::Tax { amount: 200 } },
    SquareDef { name: "North Station", kind: SquareKind::Railroad { price: 200 } },
    prop!("Birch Avenue", 1, 100, 6),
    SquareDef { name: "Chance", kind: SquareKind::Chance },
    prop!("Cedar Avenue", 1, 100, 6),
    prop!("Maple Avenue", 1, 120, 8),
    SquareDef { name: "Jail", kind: SquareKind::JailVisit },
    prop!("Harbor Road", 2, 140, 10),
    SquareDef { name: "Power Company", kind: SquareKind::Utility { price: 150 } },
    prop!("Quay Road", 2, 140, 10),
    prop!("Beacon Road", 2, 160, 12),
    SquareDef { name: "East Station", kind: SquareKind::Railroad { price: 200 } },
    prop!("Foundry Street", 3, 180, 14),
    SquareDef { name: "Community Chest", kind: SquareKind::Chest },
    prop!("Market Street", 3, 180, 14),
    prop!("Guild Street", 3, 200, 16),
    SquareDef { name: "Free Parking", kind: SquareKind::FreeParking },
    prop!("Garden Terrace", 4, 220, 18),
    SquareDef { name: "Chance", kind: SquareKind::Chance },
    prop!("Orchard Terrace", 4, 220, 18),
    prop!("Fountain Terrace", 4, 240, 20),
    SquareDef { name: "South Station", kind: SquareKind::Railroad { price: 200 } },
    prop!("Castle Hill", 5, 260, 22),
    prop!("Abbey Hill", 5, 260, 22),
    SquareDef { name: "Water Works", kind: SquareKind::Utility { price: 150 } },
    prop!("Cathedral Hill", 5, 280, 24),
    SquareDef { name: "Go To Jail", kind: SquareKind::GoToJail },
    prop!("Regent Row", 6, 300, 26),
    prop!("Crown Row", 6, 300, 26),
    SquareDef { name: "Community Chest", kind: SquareKind::Chest },
    prop!("Sovereign Row", 6, 320, 28),
    SquareDef { name: "West Station", kind: SquareKind::Railroad { price: 200 } },
    SquareDef { name: "Chance", kind: SquareKind::Chance },
    prop!("Palace Court", 7, 350, 35),
    SquareDef { name: "Luxury Tax", kind: SquareKind::Tax { amount: 100 } },
    prop!("Royal Plaza", 7, 400, 50),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardEffect {
    Collect(i64),
    Pay(i64),
    AdvanceTo(u8),
    GoToJail,
    GetOutOfJail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCard {
    pub text: &'static str,
    pub effect: CardEffect,
}

const CHANCE_CARDS: [DrawCard; 8] = [
    DrawCard { text: "Advance to Go", effect: CardEffect::AdvanceTo(0) },
    DrawCard { text: "Bank pays you a dividend of 50", effect: CardEffect::Collect(50) },
    DrawCard { text: "Pay a fine of 15", effect: CardEffect::Pay(15) },
    DrawCard { text: "Go directly to Jail", effect: CardEffect::GoToJail },
    DrawCard { text: "Get out of Jail free", effect: CardEffect::GetOutOfJail },
    DrawCard { text: "Advance to Fountain Terrace", effect: CardEffect::AdvanceTo(24) },
    DrawCard { text: "Advance to Harbor Road", effect: CardEffect::AdvanceTo(11) },
    DrawCard { text: "Your loan matures, collect 150", effect: CardEffect::Collect(150) },
];

const CHEST_CARDS: [DrawCard; 8] = [
    DrawCard { text: "Bank error in your favor, collect 200", effect: CardEffect::Collect(200) },
    DrawCard { text: "Doctor's fee, pay 50", effect: CardEffect::Pay(50) },
    DrawCard { text: "You inherit 100", effect: CardEffect::Collect(100) },
    DrawCard { text: "Get out of Jail free", effect: CardEffect::GetOutOfJail },
    DrawCard { text: "Go directly to Jail", effect: CardEffect::GoToJail },
    DrawCard { text: "Tax refund, collect 25", effect: CardEffect::Collect(25) },
    DrawCard { text: "Hospital fees, pay 100", effect: CardEffect::Pay(100) },
    DrawCard { text: "You win a beauty contest, collect 20", effect: CardEffect::Collect(20) },
];

#[derive(Debug, Clone, PartialEq)]
struct Seat {
    id: PlayerId,
    position: u8,
    cash: i64,
    in_jail: bool,
    jail_rolls: u8,
    jail_cards: u8,
    bankrupt: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ownership {
    pub owner: PlayerId,
    pub houses: u8,
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    AwaitingRoll,
    AwaitingBuyDecision { square: u8 },
    Auction,
    AwaitingEndTurn,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuctionState {
    pub square: u8,
    pub bid: i64,
    pub highest: Option<PlayerId>,
    pub active: Vec<PlayerId>,
}

#[derive(Debug, Clone)]
pub struct MagnateState {
    seats: Vec<Seat>,
    current: usize,
    owned: HashMap<u8, Ownership>,
    phase: Phase,
    auction: Option<AuctionState>,
    doubles_streak: u8,
    last_was_doubles: bool,
    last_roll: Option<(u8, u8)>,
    chance: Vec<DrawCard>,
    chest: Vec<DrawCard>,
    rng: ChaCha8Rng,
}

#[derive(Debug, Serialize)]
pub struct SeatView {
    pub player: PlayerId,
    pub position: u8,
    pub cash: i64,
    pub in_jail: bool,
    pub jail_cards: u8,
    pub bankrupt: bool,
}

#[derive(Debug, Serialize)]
pub struct OwnedView {
    pub square: u8,
    pub name: &'static str,
    pub owner: PlayerId,
    pub houses: u8,
}

#[derive(Debug, Serialize)]
pub struct MagnatePublicView {
    pub phase: &'static str,
    pub turn_owner: PlayerId,
    pub seats: Vec<SeatView>,
    pub owned: Vec<OwnedView>,
    pub auction: Option<AuctionState>,
    pub last_roll: Option<(u8, u8)>,
    pub pending_square: Option<u8>,
}

impl MagnateState {
    pub fn new(players: &[PlayerId], mut rng: ChaCha8Rng) -> Self {
        let mut chance = CHANCE_CARDS.to_vec();
        let mut chest = CHEST_CARDS.to_vec();
        chance.shuffle(&mut rng);
        chest.shuffle(&mut rng);

        Self {
            seats: players
                .iter()
                .map(|p| Seat {
                    id: p.clone(),
                    position: 0,
                    cash: STARTING_CASH,
                    in_jail: false,
                    jail_rolls: 0,
                    jail_cards: 0,
                    bankrupt: false,
                })
                .collect(),
            current: 0,
            owned: HashMap::new(),
            phase: Phase::AwaitingRoll,
            auction: None,
            doubles_streak: 0,
            last_was_doubles: false,
            last_roll: None,
            chance,
            chest,
            rng,
        }
    }

    pub fn turn_owner(&self) -> Option<PlayerId> {
        Some(self.seats[self.current].id.clone())
    }

    pub fn cash(&self, player: &PlayerId) -> Option<i64> {
        self.seats.iter().find(|s| s.id == *player).map(|s| s.cash)
    }

    pub fn position(&self, player: &PlayerId) -> Option<u8> {
        self.seats
            .iter()
            .find(|s| s.id == *player)
            .map(|s| s.position)
    }

    pub fn is_bankrupt(&self, player: &PlayerId) -> bool {
        self.seats
            .iter()
            .find(|s| s.id == *player)
            .map(|s| s.bankrupt)
            .unwrap_or(true)
    }

    pub fn in_jail(&self, player: &PlayerId) -> bool {
        self.seats
            .iter()
            .find(|s| s.id == *player)
            .map(|s| s.in_jail)
            .unwrap_or(false)
    }

    pub fn houses_on(&self, square: u8) -> u8 {
        self.owned.get(&square).map(|o| o.houses).unwrap_or(0)
    }

    pub fn owner_of(&self, square: u8) -> Option<&PlayerId> {
        self.owned.get(&square).map(|o| &o.owner)
    }

    fn seat_index(&self, player: &PlayerId) -> Result<usize> {
        self.seats
            .iter()
            .position(|s| s.id == *player)
            .ok_or(ParlorError::PlayerNotInRoom)
    }

    fn require_current(&self, player: &PlayerId) -> Result<usize> {
        let idx = self.seat_index(player)?;
        if idx != self.current {
            return Err(ParlorError::NotYourTurn);
        }
        if self.seats[idx].bankrupt {
            return Err(illegal("you are bankrupt"));
        }
        Ok(idx)
    }

    fn non_bankrupt_ids(&self) -> Vec<PlayerId> {
        self.seats
            .iter()
            .filter(|s| !s.bankrupt)
            .map(|s| s.id.clone())
            .collect()
    }

    fn check_winner(&self) -> Option<Outcome> {
        let alive = self.non_bankrupt_ids();
        if alive.len() == 1 {
            Some(Outcome::Win {
                winner: alive[0].clone(),
            })
        } else {
            None
        }
    }

    fn advance_turn(&mut self) {
        let n = self.seats.len();
        let mut i = (self.current + 1) % n;
        while self.seats[i].bankrupt {
            i = (i + 1) % n;
        }
        self.current = i;
        self.doubles_streak = 0;
        self.last_was_doubles = false;
        self.phase = Phase::AwaitingRoll;
    }

    /// Obligatory payment. Returns false when the payer went bankrupt; the
    /// bankruptcy (asset forfeiture, removal from rotation) is settled in
    /// the same transaction so cash never stays negative.
    fn pay(
        &mut self,
        payer: usize,
        amount: i64,
        payee: Option<usize>,
        events: &mut Vec<GameEvent>,
    ) -> bool {
        if self.seats[payer].cash >= amount {
            self.seats[payer].cash -= amount;
            if let Some(payee) = payee {
                self.seats[payee].cash += amount;
            }
            return true;
        }

        // Bankrupt: creditor receives whatever cash is left, the bank takes
        // the properties back unmortgaged
        let remaining = self.seats[payer].cash.max(0);
        self.seats[payer].cash = 0;
        if let Some(payee) = payee {
            self.seats[payee].cash += remaining;
        }
        let payer_id = self.seats[payer].id.clone();
        self.owned.retain(|_, o| o.owner != payer_id);
        self.seats[payer].bankrupt = true;
        self.seats[payer].in_jail = false;
        if let Some(auction) = self.auction.as_mut() {
            auction.active.retain(|p| *p != payer_id);
            if auction.highest.as_ref() == Some(&payer_id) {
                auction.highest = None;
                auction.bid = 0;
            }
        }
        events.push(GameEvent::Bankrupt { player: payer_id });
        false
    }

    fn go_to_jail(&mut self, seat: usize, events: &mut Vec<GameEvent>) {
        self.seats[seat].position = JAIL_SQUARE;
        self.seats[seat].in_jail = true;
        self.seats[seat].jail_rolls = 0;
        events.push(GameEvent::WentToJail {
            player: self.seats[seat].id.clone(),
        });
    }

    fn group_squares(group: u8) -> Vec<u8> {
        (0..BOARD_SIZE)
            .filter(|i| {
                matches!(BOARD[*i as usize].kind,
                    SquareKind::Property { group: g, .. } if g == group)
            })
            .collect()
    }

    fn owns_whole_group(&self, player: &PlayerId, group: u8) -> bool {
        Self::group_squares(group)
            .iter()
            .all(|sq| self.owned.get(sq).map(|o| o.owner == *player).unwrap_or(false))
    }

    fn rent_for(&self, square: u8, dice_total: u8) -> i64 {
        let ownership = match self.owned.get(&square) {
            Some(o) => o,
            None => return 0,
        };
        match BOARD[square as usize].kind {
            SquareKind::Property { group, base_rent, .. } => {
                let houses = ownership.houses as usize;
                if houses > 0 {
                    base_rent * RENT_MULT[houses.min(5)]
                } else if self.owns_whole_group(&ownership.owner, group) {
                    base_rent * 2
                } else {
                    base_rent
                }
            }
            SquareKind::Railroad { .. } => {
                let count = self
                    .owned
                    .iter()
                    .filter(|(sq, o)| {
                        o.owner == ownership.owner
                            && matches!(BOARD[**sq as usize].kind, SquareKind::Railroad { .. })
                    })
                    .count();
                25 << (count.saturating_sub(1))
            }
            SquareKind::Utility { .. } => {
                let count = self
                    .owned
                    .iter()
                    .filter(|(sq, o)| {
                        o.owner == ownership.owner
                            && matches!(BOARD[**sq as usize].kind, SquareKind::Utility { .. })
                    })
                    .count();
                let mult = if count >= 2 { 10 } else { 4 };
                mult * dice_total as i64
            }
            _ => 0,
        }
    }

    fn purchase_price(square: u8) -> Option<i64> {
        match BOARD[square as usize].kind {
            SquareKind::Property { price, .. }
            | SquareKind::Railroad { price }
            | SquareKind::Utility { price } => Some(price),
            _ => None,
        }
    }

    pub fn apply(&mut self, player: &PlayerId, mv: &GameMove) -> Result<EngineOutcome> {
        match mv {
            GameMove::Roll => self.apply_roll(player),
            GameMove::Buy => self.apply_buy(player),
            GameMove::DeclineBuy => self.apply_decline(player),
            GameMove::Bid { amount } => self.apply_bid(player, *amount),
            GameMove::PassBid => self.apply_pass_bid(player),
            GameMove::Build { square } => self.apply_build(player, *square),
            GameMove::PayJailFine => self.apply_pay_jail(player),
            GameMove::UseJailCard => self.apply_use_jail_card(player),
            GameMove::EndTurn => self.apply_end_turn(player),
            _ => Err(wrong_game()),
        }
    }

    fn apply_roll(&mut self, player: &PlayerId) -> Result<EngineOutcome> {
        let seat = self.require_current(player)?;
        if self.phase != Phase::AwaitingRoll {
            return Err(illegal("you have already rolled"));
        }

        let d1: u8 = self.rng.gen_range(1..=6);
        let d2: u8 = self.rng.gen_range(1..=6);
        self.last_roll = Some((d1, d2));
        let mut events = vec![GameEvent::DiceRolled {
            player: player.clone(),
            die1: d1,
            die2: d2,
        }];

        if self.seats[seat].in_jail {
            self.last_was_doubles = false;
            if d1 == d2 {
                self.seats[seat].in_jail = false;
                self.seats[seat].jail_rolls = 0;
            } else {
                self.seats[seat].jail_rolls += 1;
                if self.seats[seat].jail_rolls >= 3 {
                    // Forced to pay the fine and move
                    if !self.pay(seat, JAIL_FINE, None, &mut events) {
                        let terminal = self.check_winner();
                        self.advance_turn();
                        return Ok(EngineOutcome { events, terminal });
                    }
                    self.seats[seat].in_jail = false;
                    self.seats[seat].jail_rolls = 0;
                } else {
                    self.phase = Phase::AwaitingEndTurn;
                    return Ok(EngineOutcome::with_events(events));
                }
            }
        } else if d1 == d2 {
            self.doubles_streak += 1;
            self.last_was_doubles = true;
            if self.doubles_streak >= 3 {
                // Third consecutive doubles: straight to jail, no move
                self.go_to_jail(seat, &mut events);
                self.doubles_streak = 0;
                self.last_was_doubles = false;
                self.phase = Phase::AwaitingEndTurn;
                return Ok(EngineOutcome::with_events(events));
            }
        } else {
            self.doubles_streak = 0;
            self.last_was_doubles = false;
        }

        let terminal = self.move_and_resolve(seat, d1 + d2, &mut events);
        if self.seats[seat].bankrupt && terminal.is_none() {
            self.advance_turn();
        }
        Ok(EngineOutcome { events, terminal })
    }

    fn move_and_resolve(
        &mut self,
        seat: usize,
        steps: u8,
        events: &mut Vec<GameEvent>,
    ) -> Option<Outcome> {
        let old = self.seats[seat].position;
        let new = (old + steps) % BOARD_SIZE;
        if old + steps >= BOARD_SIZE {
            self.seats[seat].cash += GO_SALARY;
            events.push(GameEvent::PassedGo {
                player: self.seats[seat].id.clone(),
            });
        }
        self.seats[seat].position = new;
        self.resolve_landing(seat, new, steps, events, 0)
    }

    fn resolve_landing(
        &mut self,
        seat: usize,
        square: u8,
        dice_total: u8,
        events: &mut Vec<GameEvent>,
        depth: u8,
    ) -> Option<Outcome> {
        self.phase = Phase::AwaitingEndTurn;
        match BOARD[square as usize].kind {
            SquareKind::Property { .. } | SquareKind::Railroad { .. } | SquareKind::Utility { .. } => {
                match self.owned.get(&square).cloned() {
                    None => {
                        self.phase = Phase::AwaitingBuyDecision { square };
                    }
                    Some(ownership) if ownership.owner != self.seats[seat].id => {
                        let rent = self.rent_for(square, dice_total);
                        let owner_seat = self.seat_index(&ownership.owner).ok();
                        let solvent = self.pay(seat, rent, owner_seat, events);
                        if solvent {
                            events.push(GameEvent::RentPaid {
                                from: self.seats[seat].id.clone(),
                                to: ownership.owner,
                                amount: rent,
                            });
                        } else {
                            return self.check_winner();
                        }
                    }
                    Some(_) => {}
                }
            }
            SquareKind::Tax { amount } => {
                if self.pay(seat, amount, None, events) {
                    events.push(GameEvent::TaxPaid {
                        player: self.seats[seat].id.clone(),
                        amount,
                    });
                } else {
                    return self.check_winner();
                }
            }
            SquareKind::Chance => return self.draw_card(seat, true, events, depth),
            SquareKind::Chest => return self.draw_card(seat, false, events, depth),
            SquareKind::GoToJail => self.go_to_jail(seat, events),
            SquareKind::Go | SquareKind::JailVisit | SquareKind::FreeParking => {}
        }
        None
    }

    fn draw_card(
        &mut self,
        seat: usize,
        chance: bool,
        events: &mut Vec<GameEvent>,
        depth: u8,
    ) -> Option<Outcome> {
        let deck = if chance { &mut self.chance } else { &mut self.chest };
        let card = match deck.pop() {
            Some(card) => card,
            None => return None,
        };
        deck.insert(0, card);

        events.push(GameEvent::CardDrawn {
            player: self.seats[seat].id.clone(),
            text: card.text.to_string(),
        });

        match card.effect {
            CardEffect::Collect(amount) => {
                self.seats[seat].cash += amount;
            }
            CardEffect::Pay(amount) => {
                if !self.pay(seat, amount, None, events) {
                    return self.check_winner();
                }
            }
            CardEffect::AdvanceTo(target) => {
                if depth == 0 {
                    let pos = self.seats[seat].position;
                    let steps = (target + BOARD_SIZE - pos) % BOARD_SIZE;
                    if pos + steps >= BOARD_SIZE || target == 0 {
                        self.seats[seat].cash += GO_SALARY;
                        events.push(GameEvent::PassedGo {
                            player: self.seats[seat].id.clone(),
                        });
                    }
                    self.seats[seat].position = target;
                    return self.resolve_landing(seat, target, steps.max(1), events, depth + 1);
                }
            }
            CardEffect::GoToJail => self.go_to_jail(seat, events),
            CardEffect::GetOutOfJail => {
                self.seats[seat].jail_cards += 1;
            }
        }
        None
    }

    fn apply_buy(&mut self, player: &PlayerId) -> Result<EngineOutcome> {
        let seat = self.require_current(player)?;
        let square = match self.phase {
            Phase::AwaitingBuyDecision { square } => square,
            _ => return Err(illegal("no purchase is pending")),
        };
        let price = Self::purchase_price(square).ok_or_else(|| illegal("square is not for sale"))?;
        if self.seats[seat].cash < price {
            return Err(illegal("insufficient cash"));
        }

        self.seats[seat].cash -= price;
        self.owned.insert(
            square,
            Ownership {
                owner: player.clone(),
                houses: 0,
            },
        );
        self.phase = Phase::AwaitingEndTurn;
        Ok(EngineOutcome::with_events(vec![GameEvent::PropertyBought {
            player: player.clone(),
            square,
            price,
        }]))
    }

    fn apply_decline(&mut self, player: &PlayerId) -> Result<EngineOutcome> {
        self.require_current(player)?;
        let square = match self.phase {
            Phase::AwaitingBuyDecision { square } => square,
            _ => return Err(illegal("no purchase is pending")),
        };

        self.auction = Some(AuctionState {
            square,
            bid: 0,
            highest: None,
            active: self.non_bankrupt_ids(),
        });
        self.phase = Phase::Auction;
        Ok(EngineOutcome::with_events(vec![GameEvent::AuctionOpened {
            square,
        }]))
    }

    fn apply_bid(&mut self, player: &PlayerId, amount: i64) -> Result<EngineOutcome> {
        if self.phase != Phase::Auction {
            return Err(illegal("no auction is running"));
        }
        let seat = self.seat_index(player)?;
        let auction = self.auction.as_mut().ok_or_else(|| illegal("no auction is running"))?;
        if !auction.active.contains(player) {
            return Err(illegal("you have passed on this auction"));
        }
        if amount <= auction.bid {
            return Err(illegal("bid must exceed the current bid"));
        }
        if amount > self.seats[seat].cash {
            return Err(illegal("bid exceeds your cash"));
        }

        auction.bid = amount;
        auction.highest = Some(player.clone());
        let mut events = vec![GameEvent::BidPlaced {
            player: player.clone(),
            amount,
        }];
        if auction.active.len() == 1 {
            self.settle_auction(&mut events);
        }
        Ok(EngineOutcome::with_events(events))
    }

    fn apply_pass_bid(&mut self, player: &PlayerId) -> Result<EngineOutcome> {
        if self.phase != Phase::Auction {
            return Err(illegal("no auction is running"));
        }
        self.seat_index(player)?;
        let auction = self.auction.as_mut().ok_or_else(|| illegal("no auction is running"))?;
        if !auction.active.contains(player) {
            return Err(illegal("you have already passed"));
        }
        if auction.highest.as_ref() == Some(player) {
            return Err(illegal("the highest bidder cannot pass"));
        }

        auction.active.retain(|p| p != player);
        let mut events = Vec::new();
        let done = auction.active.is_empty()
            || (auction.active.len() == 1 && auction.highest.is_some());
        if done {
            self.settle_auction(&mut events);
        }
        Ok(EngineOutcome::with_events(events))
    }

    fn settle_auction(&mut self, events: &mut Vec<GameEvent>) {
        let auction = match self.auction.take() {
            Some(a) => a,
            None => return,
        };
        let winner = auction.highest.clone();
        if let Some(ref w) = winner {
            if let Ok(seat) = self.seat_index(w) {
                // Bid was validated against cash when placed
                self.pay(seat, auction.bid, None, events);
                self.owned.insert(
                    auction.square,
                    Ownership {
                        owner: w.clone(),
                        houses: 0,
                    },
                );
            }
        }
        events.push(GameEvent::AuctionSettled {
            winner,
            square: auction.square,
            amount: auction.bid,
        });
        self.phase = Phase::AwaitingEndTurn;
    }

    fn apply_build(&mut self, player: &PlayerId, square: u8) -> Result<EngineOutcome> {
        let seat = self.require_current(player)?;
        if !matches!(self.phase, Phase::AwaitingRoll | Phase::AwaitingEndTurn) {
            return Err(illegal("cannot build right now"));
        }
        if square >= BOARD_SIZE {
            return Err(illegal("no such square"));
        }
        let group = match BOARD[square as usize].kind {
            SquareKind::Property { group, .. } => group,
            _ => return Err(illegal("only properties can be built on")),
        };
        let ownership = self
            .owned
            .get(&square)
            .ok_or_else(|| illegal("you do not own this property"))?;
        if ownership.owner != *player {
            return Err(illegal("you do not own this property"));
        }
        if !self.owns_whole_group(player, group) {
            return Err(illegal("you must own the whole color group"));
        }
        let houses = ownership.houses;
        if houses >= MAX_HOUSES {
            return Err(illegal("property is fully built"));
        }
        let group_min = Self::group_squares(group)
            .iter()
            .map(|sq| self.houses_on(*sq))
            .min()
            .unwrap_or(0);
        if houses > group_min {
            return Err(illegal("build evenly across the group"));
        }
        let cost = HOUSE_COST[group as usize];
        if self.seats[seat].cash < cost {
            return Err(illegal("insufficient cash"));
        }

        self.seats[seat].cash -= cost;
        if let Some(o) = self.owned.get_mut(&square) {
            o.houses += 1;
        }
        Ok(EngineOutcome::none())
    }

    fn apply_pay_jail(&mut self, player: &PlayerId) -> Result<EngineOutcome> {
        let seat = self.require_current(player)?;
        if self.phase != Phase::AwaitingRoll {
            return Err(illegal("jail fine can only be paid before rolling"));
        }
        if !self.seats[seat].in_jail {
            return Err(illegal("you are not in jail"));
        }
        if self.seats[seat].cash < JAIL_FINE {
            return Err(illegal("insufficient cash"));
        }
        self.seats[seat].cash -= JAIL_FINE;
        self.seats[seat].in_jail = false;
        self.seats[seat].jail_rolls = 0;
        Ok(EngineOutcome::none())
    }

    fn apply_use_jail_card(&mut self, player: &PlayerId) -> Result<EngineOutcome> {
        let seat = self.require_current(player)?;
        if self.phase != Phase::AwaitingRoll {
            return Err(illegal("jail card can only be used before rolling"));
        }
        if !self.seats[seat].in_jail {
            return Err(illegal("you are not in jail"));
        }
        if self.seats[seat].jail_cards == 0 {
            return Err(illegal("you have no get-out-of-jail card"));
        }
        self.seats[seat].jail_cards -= 1;
        self.seats[seat].in_jail = false;
        self.seats[seat].jail_rolls = 0;
        Ok(EngineOutcome::none())
    }

    fn apply_end_turn(&mut self, player: &PlayerId) -> Result<EngineOutcome> {
        let seat = self.require_current(player)?;
        if self.phase != Phase::AwaitingEndTurn {
            return Err(illegal("the turn is not over"));
        }

        if self.last_was_doubles && !self.seats[seat].in_jail {
            // Doubles grant another roll; the streak carries over
            self.last_was_doubles = false;
            self.phase = Phase::AwaitingRoll;
        } else {
            self.advance_turn();
        }
        Ok(EngineOutcome::none())
    }

    /// Resignation path for a player who left mid-game
    pub fn eliminate(&mut self, player: &PlayerId) -> EngineOutcome {
        let seat = match self.seat_index(player) {
            Ok(s) => s,
            Err(_) => return EngineOutcome::none(),
        };
        if self.seats[seat].bankrupt {
            return EngineOutcome::none();
        }

        let mut events = Vec::new();
        // Forcing an impossible payment reuses the bankruptcy path
        let cash = self.seats[seat].cash;
        self.pay(seat, cash + 1, None, &mut events);
        let terminal = self.check_winner();
        if terminal.is_none() {
            if seat == self.current {
                self.advance_turn();
            } else if self.phase == Phase::Auction {
                let settle = self
                    .auction
                    .as_ref()
                    .map(|a| a.active.len() == 1 && a.highest.is_some())
                    .unwrap_or(false);
                if settle {
                    self.settle_auction(&mut events);
                }
            }
        }
        EngineOutcome { events, terminal }
    }

    fn phase_name(&self) -> &'static str {
        match self.phase {
            Phase::AwaitingRoll => "awaiting_roll",
            Phase::AwaitingBuyDecision { .. } => "awaiting_buy_decision",
            Phase::Auction => "auction_in_progress",
            Phase::AwaitingEndTurn => "awaiting_end_turn",
        }
    }

    pub fn public_view(&self) -> MagnatePublicView {
        MagnatePublicView {
            phase: self.phase_name(),
            turn_owner: self.seats[self.current].id.clone(),
            seats: self
                .seats
                .iter()
                .map(|s| SeatView {
                    player: s.id.clone(),
                    position: s.position,
                    cash: s.cash,
                    in_jail: s.in_jail,
                    jail_cards: s.jail_cards,
                    bankrupt: s.bankrupt,
                })
                .collect(),
            owned: {
                let mut owned: Vec<OwnedView> = self
                    .owned
                    .iter()
                    .map(|(sq, o)| OwnedView {
                        square: *sq,
                        name: BOARD[*sq as usize].name,
                        owner: o.owner.clone(),
                        houses: o.houses,
                    })
                    .collect();
                owned.sort_by_key(|o| o.square);
                owned
            },
            auction: self.auction.clone(),
            last_roll: self.last_roll,
            pending_square: match self.phase {
                Phase::AwaitingBuyDecision { square } => Some(square),
                _ => None,
            },
        }
    }
}
