// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{fmt, str::FromStr};

use crate::chain::ChainError;

/// The number of states in the chain.
pub const STATE_COUNT: usize = 7;

/// A node of the chain. Each state has its own clip.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum State {
    Beat,
    Shi,
    Ka,
    No,
    Ko,
    Tan,
    N,
}

impl State {
    /// All states in matrix order.
    pub const ALL: [State; STATE_COUNT] = [
        State::Beat,
        State::Shi,
        State::Ka,
        State::No,
        State::Ko,
        State::Tan,
        State::N,
    ];

    /// The state every session starts from and returns to on stop.
    pub const INITIAL: State = State::Beat;

    /// The row/column of this state in the transition matrix.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Looks a state up by its matrix index.
    pub fn from_index(index: usize) -> Result<State, ChainError> {
        State::ALL
            .get(index)
            .copied()
            .ok_or(ChainError::IndexOutOfRange(index))
    }

    /// The label shown on the diagram node.
    pub fn label(self) -> &'static str {
        match self {
            State::Beat => "★",
            State::Shi => "し",
            State::Ka => "か",
            State::No => "の",
            State::Ko => "こ",
            State::Tan => "た",
            State::N => "ん",
        }
    }

    /// A short ASCII key, handy on the command line.
    pub fn key(self) -> &'static str {
        match self {
            State::Beat => "b",
            State::Shi => "shi",
            State::Ka => "ka",
            State::No => "no",
            State::Ko => "ko",
            State::Tan => "tan",
            State::N => "n",
        }
    }

    /// The file stem of the clip for this state.
    pub fn audio_name(self) -> &'static str {
        match self {
            State::Beat => "beat",
            State::Shi => "shi",
            State::Ka => "ka",
            State::No => "no-1",
            State::Ko => "ko-1",
            State::Tan => "tan",
            State::N => "n",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for State {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        State::ALL
            .into_iter()
            .find(|state| {
                trimmed == state.label()
                    || trimmed.eq_ignore_ascii_case(state.key())
                    || trimmed.eq_ignore_ascii_case(state.audio_name())
            })
            .ok_or_else(|| ChainError::UnknownState(trimmed.to_string()))
    }
}
