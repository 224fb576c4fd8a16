//! Tic-Tac-Toe rule engine
//!
//! Terminal result is computed fresh from the board on every move and never
//! persisted redundantly.

use serde::{Deserialize, Serialize};

use crate::core::player::PlayerId;
use crate::error::{ParlorError, Result};
use crate::games::{illegal, wrong_game, EngineOutcome, GameMove, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mark {
    X,
    O,
}

/// The eight canonical winning lines
pub const WIN_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

#[derive(Debug, Clone, PartialEq)]
pub struct TicTacToeState {
    players: Vec<PlayerId>,
    board: [Option<Mark>; 9],
    /// Index into `players`; player 0 is X
    turn: usize,
}

#[derive(Debug, Serialize)]
pub struct TicTacToePublicView {
    pub board: [Option<Mark>; 9],
    pub turn_owner: PlayerId,
}

/// Winning mark on the board, if any line is complete
pub fn winner(board: &[Option<Mark>; 9]) -> Option<Mark> {
    for line in WIN_LINES {
        if let Some(mark) = board[line[0]] {
            if board[line[1]] == Some(mark) && board[line[2]] == Some(mark) {
                return Some(mark);
            }
        }
    }
    None
}

impl TicTacToeState {
    pub fn new(players: &[PlayerId]) -> Self {
        Self {
            players: players.to_vec(),
            board: [None; 9],
            turn: 0,
        }
    }

    fn mark_of(&self, seat: usize) -> Mark {
        if seat == 0 {
            Mark::X
        } else {
            Mark::O
        }
    }

    pub fn turn_owner(&self) -> PlayerId {
        self.players[self.turn].clone()
    }

    pub fn apply(&mut self, player: &PlayerId, mv: &GameMove) -> Result<EngineOutcome> {
        let cell = match mv {
            GameMove::Place { cell } => *cell,
            _ => return Err(wrong_game()),
        };

        if *player != self.players[self.turn] {
            return Err(ParlorError::NotYourTurn);
        }
        if cell >= 9 {
            return Err(illegal("cell out of range"));
        }
        if self.board[cell].is_some() {
            return Err(illegal("cell already occupied"));
        }

        self.board[cell] = Some(self.mark_of(self.turn));

        if let Some(mark) = winner(&self.board) {
            let seat = if mark == Mark::X { 0 } else { 1 };
            return Ok(EngineOutcome {
                events: Vec::new(),
                terminal: Some(Outcome::Win {
                    winner: self.players[seat].clone(),
                }),
            });
        }
        if self.board.iter().all(|c| c.is_some()) {
            return Ok(EngineOutcome {
                events: Vec::new(),
                terminal: Some(Outcome::Draw),
            });
        }

        self.turn = 1 - self.turn;
        Ok(EngineOutcome::none())
    }

    pub fn public_view(&self) -> TicTacToePublicView {
        TicTacToePublicView {
            board: self.board,
            turn_owner: self.turn_owner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players() -> Vec<PlayerId> {
        vec!["x".to_string(), "o".to_string()]
    }

    fn place(cell: usize) -> GameMove {
        GameMove::Place { cell }
    }

    #[test]
    fn test_win_on_top_row() {
        let p = players();
        let mut state = TicTacToeState::new(&p);
        state.apply(&p[0], &place(0)).unwrap();
        state.apply(&p[1], &place(3)).unwrap();
        state.apply(&p[0], &place(1)).unwrap();
        state.apply(&p[1], &place(4)).unwrap();
        let out = state.apply(&p[0], &place(2)).unwrap();
        assert_eq!(
            out.terminal,
            Some(Outcome::Win {
                winner: "x".to_string()
            })
        );
    }

    #[test]
    fn test_full_board_without_line_is_draw() {
        let p = players();
        let mut state = TicTacToeState::new(&p);
        // X O X / X X O / O X O
        let seq = [0, 1, 2, 5, 3, 6, 4, 8, 7];
        let mut terminal = None;
        for (i, cell) in seq.iter().enumerate() {
            let mover = &p[i % 2];
            terminal = state.apply(mover, &place(*cell)).unwrap().terminal;
        }
        assert_eq!(terminal, Some(Outcome::Draw));
    }

    #[test]
    fn test_occupied_cell_rejected_without_mutation() {
        let p = players();
        let mut state = TicTacToeState::new(&p);
        state.apply(&p[0], &place(4)).unwrap();

        let before = state.clone();
        let result = state.apply(&p[1], &place(4));
        assert!(matches!(result, Err(ParlorError::IllegalMove(_))));
        assert_eq!(state, before);
    }

    #[test]
    fn test_out_of_turn_rejected() {
        let p = players();
        let mut state = TicTacToeState::new(&p);
        let result = state.apply(&p[1], &place(0));
        assert_eq!(result, Err(ParlorError::NotYourTurn));
    }

    #[test]
    fn test_win_only_on_canonical_lines() {
        // Corners plus center for X without any straight line
        let p = players();
        let mut state = TicTacToeState::new(&p);
        state.apply(&p[0], &place(0)).unwrap();
        state.apply(&p[1], &place(1)).unwrap();
        state.apply(&p[0], &place(5)).unwrap();
        state.apply(&p[1], &place(2)).unwrap();
        let out = state.apply(&p[0], &place(7)).unwrap();
        assert!(out.terminal.is_none());
        assert_eq!(winner(&state.board), None);
    }
}
