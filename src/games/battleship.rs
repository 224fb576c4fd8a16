//! Battleship rule engine
//!
//! Two phases: private ship placement (validated per player independently)
//! and turn-based battle. Ship layouts are never exposed to the opponent
//! except through hit/miss/sunk results.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::core::player::PlayerId;
use crate::error::{ParlorError, Result};
use crate::games::{illegal, wrong_game, EngineOutcome, GameEvent, GameMove, Outcome};

pub const BOARD_SIZE: u8 = 10;

/// Fleet composition: one battleship, two cruisers, three destroyers,
/// four submarines
pub const FLEET_SIZES: [usize; 10] = [4, 3, 3, 2, 2, 2, 1, 1, 1, 1];

#[derive(Debug, Clone, PartialEq)]
pub struct Ship {
    pub cells: Vec<(u8, u8)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Placement,
    Battle,
}

#[derive(Debug, Clone, PartialEq)]
struct Side {
    player: PlayerId,
    ships: Vec<Ship>,
    placed: bool,
    /// Shots this side has fired at the opponent, true = hit
    shots: HashMap<(u8, u8), bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BattleshipState {
    sides: Vec<Side>,
    phase: Phase,
    /// Index of the shooting side during battle
    turn: usize,
}

#[derive(Debug, Serialize)]
pub struct ShotView {
    pub x: u8,
    pub y: u8,
    pub hit: bool,
}

#[derive(Debug, Serialize)]
pub struct SideView {
    pub player: PlayerId,
    pub placed: bool,
    pub shots: Vec<ShotView>,
    pub ships_sunk_against: usize,
}

#[derive(Debug, Serialize)]
pub struct BattleshipPublicView {
    pub phase: Phase,
    pub turn_owner: Option<PlayerId>,
    pub sides: Vec<SideView>,
}

#[derive(Debug, Serialize)]
pub struct BattleshipPrivateView {
    pub ships: Vec<Vec<(u8, u8)>>,
    pub placed: bool,
}

/// Validate a full fleet layout: exact sizes, straight contiguous ships,
/// in bounds, and no two ships within Chebyshev distance 2 of each other.
pub fn validate_fleet(ships: &[Vec<(u8, u8)>]) -> Result<Vec<Ship>> {
    if ships.len() != FLEET_SIZES.len() {
        return Err(illegal("fleet must contain exactly 10 ships"));
    }

    let mut sizes: Vec<usize> = ships.iter().map(|s| s.len()).collect();
    sizes.sort_unstable_by(|a, b| b.cmp(a));
    let mut expected = FLEET_SIZES.to_vec();
    expected.sort_unstable_by(|a, b| b.cmp(a));
    if sizes != expected {
        return Err(illegal("ship sizes do not match the required fleet"));
    }

    let mut seen: HashMap<(u8, u8), usize> = HashMap::new();
    for (idx, cells) in ships.iter().enumerate() {
        if !is_straight_contiguous(cells) {
            return Err(illegal("a ship must occupy a straight contiguous line"));
        }
        for &(x, y) in cells {
            if x >= BOARD_SIZE || y >= BOARD_SIZE {
                return Err(illegal("ship cell out of bounds"));
            }
            if seen.insert((x, y), idx).is_some() {
                return Err(illegal("ships overlap"));
            }
        }
    }

    // 8-neighborhood exclusion between distinct ships
    for (&(x, y), &idx) in &seen {
        for dx in -1i16..=1 {
            for dy in -1i16..=1 {
                let nx = x as i16 + dx;
                let ny = y as i16 + dy;
                if nx < 0 || ny < 0 {
                    continue;
                }
                if let Some(&other) = seen.get(&(nx as u8, ny as u8)) {
                    if other != idx {
                        return Err(illegal("ships may not touch, even diagonally"));
                    }
                }
            }
        }
    }

    Ok(ships
        .iter()
        .map(|cells| Ship {
            cells: cells.clone(),
        })
        .collect())
}

fn is_straight_contiguous(cells: &[(u8, u8)]) -> bool {
    if cells.is_empty() {
        return false;
    }
    if cells.len() == 1 {
        return true;
    }
    let mut sorted = cells.to_vec();
    sorted.sort_unstable();
    let same_x = sorted.iter().all(|c| c.0 == sorted[0].0);
    let same_y = sorted.iter().all(|c| c.1 == sorted[0].1);
    if same_x {
        sorted.windows(2).all(|w| w[1].1 == w[0].1 + 1)
    } else if same_y {
        sorted.windows(2).all(|w| w[1].0 == w[0].0 + 1)
    } else {
        false
    }
}

impl BattleshipState {
    pub fn new(players: &[PlayerId]) -> Self {
        Self {
            sides: players
                .iter()
                .map(|p| Side {
                    player: p.clone(),
                    ships: Vec::new(),
                    placed: false,
                    shots: HashMap::new(),
                })
                .collect(),
            phase: Phase::Placement,
            turn: 0,
        }
    }

    fn side_index(&self, player: &PlayerId) -> Result<usize> {
        self.sides
            .iter()
            .position(|s| s.player == *player)
            .ok_or(ParlorError::PlayerNotInRoom)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// No single turn owner during placement
    pub fn turn_owner(&self) -> Option<PlayerId> {
        match self.phase {
            Phase::Placement => None,
            Phase::Battle => Some(self.sides[self.turn].player.clone()),
        }
    }

    pub fn apply(&mut self, player: &PlayerId, mv: &GameMove) -> Result<EngineOutcome> {
        match mv {
            GameMove::PlaceShips { ships } => self.apply_placement(player, ships),
            GameMove::Fire { x, y } => self.apply_fire(player, *x, *y),
            _ => Err(wrong_game()),
        }
    }

    fn apply_placement(&mut self, player: &PlayerId, ships: &[Vec<(u8, u8)>]) -> Result<EngineOutcome> {
        if self.phase != Phase::Placement {
            return Err(illegal("placement phase is over"));
        }
        let idx = self.side_index(player)?;
        if self.sides[idx].placed {
            return Err(illegal("fleet already placed"));
        }

        let fleet = validate_fleet(ships)?;
        self.sides[idx].ships = fleet;
        self.sides[idx].placed = true;

        if self.sides.iter().all(|s| s.placed) {
            self.phase = Phase::Battle;
            self.turn = 0;
            return Ok(EngineOutcome::with_events(vec![GameEvent::PhaseChanged {
                phase: "battle".to_string(),
            }]));
        }
        Ok(EngineOutcome::none())
    }

    fn apply_fire(&mut self, player: &PlayerId, x: u8, y: u8) -> Result<EngineOutcome> {
        if self.phase != Phase::Battle {
            return Err(illegal("battle has not started"));
        }
        let shooter = self.side_index(player)?;
        if shooter != self.turn {
            return Err(ParlorError::NotYourTurn);
        }
        if x >= BOARD_SIZE || y >= BOARD_SIZE {
            return Err(illegal("shot out of bounds"));
        }
        if self.sides[shooter].shots.contains_key(&(x, y)) {
            return Err(illegal("coordinate already fired at"));
        }

        let target = 1 - shooter;
        let struck_cells: Option<Vec<(u8, u8)>> = self.sides[target]
            .ships
            .iter()
            .find(|ship| ship.cells.contains(&(x, y)))
            .map(|ship| ship.cells.clone());
        self.sides[shooter]
            .shots
            .insert((x, y), struck_cells.is_some());

        let struck = match struck_cells {
            Some(cells) => cells,
            None => {
                self.turn = target;
                return Ok(EngineOutcome::with_events(vec![GameEvent::Miss {
                    shooter: player.clone(),
                    x,
                    y,
                }]));
            }
        };

        // Sunk when every cell of the struck ship has been hit
        let hits: HashSet<(u8, u8)> = self.sides[shooter]
            .shots
            .iter()
            .filter(|(_, h)| **h)
            .map(|(c, _)| *c)
            .collect();
        let sunk = struck.iter().all(|c| hits.contains(c));

        let mut outcome = EngineOutcome::with_events(vec![GameEvent::Hit {
            shooter: player.clone(),
            x,
            y,
            sunk,
        }]);

        let all_sunk = self.sides[target]
            .ships
            .iter()
            .all(|ship| ship.cells.iter().all(|c| hits.contains(c)));
        if all_sunk {
            outcome.terminal = Some(Outcome::Win {
                winner: player.clone(),
            });
        }
        // A hit keeps the shooter's turn
        Ok(outcome)
    }

    fn sunk_count_against(&self, shooter: usize) -> usize {
        let hits: HashSet<(u8, u8)> = self.sides[shooter]
            .shots
            .iter()
            .filter(|(_, h)| **h)
            .map(|(c, _)| *c)
            .collect();
        self.sides[1 - shooter]
            .ships
            .iter()
            .filter(|ship| !ship.cells.is_empty() && ship.cells.iter().all(|c| hits.contains(c)))
            .count()
    }

    pub fn public_view(&self) -> BattleshipPublicView {
        BattleshipPublicView {
            phase: self.phase,
            turn_owner: self.turn_owner(),
            sides: self
                .sides
                .iter()
                .enumerate()
                .map(|(i, s)| SideView {
                    player: s.player.clone(),
                    placed: s.placed,
                    shots: s
                        .shots
                        .iter()
                        .map(|(&(x, y), &hit)| ShotView { x, y, hit })
                        .collect(),
                    ships_sunk_against: if self.phase == Phase::Battle {
                        self.sunk_count_against(i)
                    } else {
                        0
                    },
                })
                .collect(),
        }
    }

    pub fn private_view(&self, player: &PlayerId) -> Option<BattleshipPrivateView> {
        let idx = self.side_index(player).ok()?;
        Some(BattleshipPrivateView {
            ships: self.sides[idx]
                .ships
                .iter()
                .map(|s| s.cells.clone())
                .collect(),
            placed: self.sides[idx].placed,
        })
    }
}
