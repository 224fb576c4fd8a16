//! Rock-Paper-Scissors rule engine
//!
//! Simultaneous hidden choices; a round resolves only once every player has
//! submitted. Match-level termination (best-of-N) is the scheduler's job;
//! this engine only scores rounds.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::player::PlayerId;
use crate::error::Result;
use crate::games::{illegal, wrong_game, EngineOutcome, GameEvent, GameMove};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpsChoice {
    Rock,
    Paper,
    Scissors,
}

impl RpsChoice {
    /// Fixed precedence: rock beats scissors, scissors beats paper,
    /// paper beats rock
    pub fn beats(&self, other: RpsChoice) -> bool {
        matches!(
            (self, other),
            (Self::Rock, Self::Scissors)
                | (Self::Scissors, Self::Paper)
                | (Self::Paper, Self::Rock)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RpsState {
    players: Vec<PlayerId>,
    /// Hidden until the round resolves
    choices: HashMap<PlayerId, RpsChoice>,
    scores: HashMap<PlayerId, u32>,
    rounds_played: u32,
}

#[derive(Debug, Serialize)]
pub struct RpsPublicView {
    pub state: &'static str,
    pub scores: HashMap<PlayerId, u32>,
    pub rounds_played: u32,
    /// Who has already submitted this round (choices stay hidden)
    pub submitted: Vec<PlayerId>,
}

#[derive(Debug, Serialize)]
pub struct RpsPrivateView {
    pub your_choice: RpsChoice,
}

impl RpsState {
    pub fn new(players: &[PlayerId]) -> Self {
        Self {
            players: players.to_vec(),
            choices: HashMap::new(),
            scores: players.iter().map(|p| (p.clone(), 0)).collect(),
            rounds_played: 0,
        }
    }

    pub fn apply(&mut self, player: &PlayerId, mv: &GameMove) -> Result<EngineOutcome> {
        let choice = match mv {
            GameMove::Choose { choice } => *choice,
            _ => return Err(wrong_game()),
        };

        if !self.players.contains(player) {
            return Err(illegal("player is not part of this match"));
        }
        if self.choices.contains_key(player) {
            return Err(illegal("choice already submitted for this round"));
        }

        self.choices.insert(player.clone(), choice);

        if self.choices.len() < self.players.len() {
            return Ok(EngineOutcome::none());
        }

        // Everyone has chosen: resolve the round and reset to collecting
        let winner = self.round_winner();
        if let Some(ref w) = winner {
            *self.scores.entry(w.clone()).or_insert(0) += 1;
        }
        self.rounds_played += 1;
        self.choices.clear();

        Ok(EngineOutcome::with_events(vec![GameEvent::RoundResolved {
            winner,
            scores: self.scores.clone(),
        }]))
    }

    fn round_winner(&self) -> Option<PlayerId> {
        let a = &self.players[0];
        let b = &self.players[1];
        let ca = self.choices.get(a)?;
        let cb = self.choices.get(b)?;
        if ca.beats(*cb) {
            Some(a.clone())
        } else if cb.beats(*ca) {
            Some(b.clone())
        } else {
            None
        }
    }

    pub fn rounds_played(&self) -> u32 {
        self.rounds_played
    }

    pub fn scores(&self) -> &HashMap<PlayerId, u32> {
        &self.scores
    }

    /// Player with the strictly highest score, if any
    pub fn match_winner(&self) -> Option<PlayerId> {
        let max = self.scores.values().copied().max()?;
        let mut leaders = self.scores.iter().filter(|(_, s)| **s == max);
        let first = leaders.next()?.0.clone();
        if leaders.next().is_some() {
            None
        } else {
            Some(first)
        }
    }

    pub fn public_view(&self) -> RpsPublicView {
        RpsPublicView {
            state: "collecting",
            scores: self.scores.clone(),
            rounds_played: self.rounds_played,
            submitted: self.choices.keys().cloned().collect(),
        }
    }

    pub fn private_view(&self, player: &PlayerId) -> Option<RpsPrivateView> {
        self.choices
            .get(player)
            .map(|c| RpsPrivateView { your_choice: *c })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_players() -> Vec<PlayerId> {
        vec!["alice".to_string(), "bob".to_string()]
    }

    fn choose(c: RpsChoice) -> GameMove {
        GameMove::Choose { choice: c }
    }

    #[test]
    fn test_round_resolves_when_all_have_chosen() {
        let players = two_players();
        let mut state = RpsState::new(&players);

        let out = state.apply(&players[0], &choose(RpsChoice::Rock)).unwrap();
        assert!(out.events.is_empty());

        let out = state
            .apply(&players[1], &choose(RpsChoice::Scissors))
            .unwrap();
        match &out.events[0] {
            GameEvent::RoundResolved { winner, scores } => {
                assert_eq!(winner.as_deref(), Some("alice"));
                assert_eq!(scores["alice"], 1);
                assert_eq!(scores["bob"], 0);
            }
            other => panic!("unexpected event {:?}", other),
        }

        // Back to collecting
        assert_eq!(state.rounds_played(), 1);
        assert!(state.public_view().submitted.is_empty());
    }

    #[test]
    fn test_equal_choices_draw_the_round() {
        let players = two_players();
        let mut state = RpsState::new(&players);
        state.apply(&players[0], &choose(RpsChoice::Paper)).unwrap();
        let out = state.apply(&players[1], &choose(RpsChoice::Paper)).unwrap();
        match &out.events[0] {
            GameEvent::RoundResolved { winner, scores } => {
                assert!(winner.is_none());
                assert!(scores.values().all(|s| *s == 0));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_double_submission_rejected_without_mutation() {
        let players = two_players();
        let mut state = RpsState::new(&players);
        state.apply(&players[0], &choose(RpsChoice::Rock)).unwrap();

        let before = state.clone();
        let result = state.apply(&players[0], &choose(RpsChoice::Paper));
        assert!(result.is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn test_precedence_table() {
        assert!(RpsChoice::Rock.beats(RpsChoice::Scissors));
        assert!(RpsChoice::Scissors.beats(RpsChoice::Paper));
        assert!(RpsChoice::Paper.beats(RpsChoice::Rock));
        assert!(!RpsChoice::Rock.beats(RpsChoice::Paper));
        assert!(!RpsChoice::Rock.beats(RpsChoice::Rock));
    }

    #[test]
    fn test_match_winner_requires_strict_lead() {
        let players = two_players();
        let mut state = RpsState::new(&players);
        state.apply(&players[0], &choose(RpsChoice::Rock)).unwrap();
        state
            .apply(&players[1], &choose(RpsChoice::Scissors))
            .unwrap();
        assert_eq!(state.match_winner().as_deref(), Some("alice"));

        state
            .apply(&players[0], &choose(RpsChoice::Scissors))
            .unwrap();
        state.apply(&players[1], &choose(RpsChoice::Rock)).unwrap();
        assert_eq!(state.match_winner(), None);
    }
}
