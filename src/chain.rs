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

//! The Markov chain: a validated transition matrix and a sampler that walks it.

use std::fmt;

use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::debug;

use crate::state::{State, STATE_COUNT};

/// Allowed deviation of a row sum from 1.
const ROW_SUM_TOLERANCE: f64 = 1e-9;

/// The matrix the player ships with. Row = current state, column = next state.
const STANDARD: [[f64; STATE_COUNT]; STATE_COUNT] = [
    [0.5, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 0.5, 0.0, 0.0, 0.5, 0.0],
    [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0],
    [0.0, 0.25, 0.0, 0.5, 0.25, 0.0, 0.0],
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0],
    [0.5, 0.0, 0.0, 0.0, 0.0, 0.5, 0.0],
];

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("unknown state '{0}'")]
    UnknownState(String),

    #[error("state index {0} is out of range")]
    IndexOutOfRange(usize),

    #[error("probability {value} from {from} to {to} is outside [0, 1]")]
    InvalidProbability { from: State, to: State, value: f64 },

    #[error("transitions out of {from} sum to {sum}, expected 1")]
    RowSum { from: State, sum: f64 },
}

/// A row-stochastic 7x7 matrix. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionMatrix {
    rows: [[f64; STATE_COUNT]; STATE_COUNT],
}

impl TransitionMatrix {
    /// Validates and wraps the given rows.
    pub fn new(rows: [[f64; STATE_COUNT]; STATE_COUNT]) -> Result<TransitionMatrix, ChainError> {
        for from in State::ALL {
            let row = &rows[from.index()];
            for to in State::ALL {
                let value = row[to.index()];
                if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                    return Err(ChainError::InvalidProbability { from, to, value });
                }
            }

            let sum: f64 = row.iter().sum();
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                return Err(ChainError::RowSum { from, sum });
            }
        }

        Ok(TransitionMatrix { rows })
    }

    /// The built-in matrix.
    pub fn standard() -> TransitionMatrix {
        TransitionMatrix::new(STANDARD).expect("built-in transition matrix must be stochastic")
    }

    /// The outgoing distribution of a state.
    pub fn row(&self, from: State) -> &[f64; STATE_COUNT] {
        &self.rows[from.index()]
    }

    /// The probability of moving from one state to another.
    pub fn probability(&self, from: State, to: State) -> f64 {
        self.rows[from.index()][to.index()]
    }
}

impl fmt::Display for TransitionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "    ")?;
        for to in State::ALL {
            write!(f, "{:>6}", to.label())?;
        }
        writeln!(f)?;

        for from in State::ALL {
            write!(f, "{:>3} ", from.label())?;
            for value in self.row(from) {
                write!(f, "{:>6.2}", value)?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

/// A source of uniform draws in [0, 1).
pub trait RandomSource: Send {
    fn draw(&mut self) -> f64;
}

impl<R: Rng + Send> RandomSource for R {
    fn draw(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

/// Picks the next state of the chain.
pub struct MarkovSampler {
    matrix: TransitionMatrix,
    random: Box<dyn RandomSource>,
}

impl MarkovSampler {
    /// Creates a sampler that draws from the given source.
    pub fn new(matrix: TransitionMatrix, random: Box<dyn RandomSource>) -> MarkovSampler {
        MarkovSampler { matrix, random }
    }

    /// A sampler over the standard matrix with a reproducible sequence.
    pub fn seeded(seed: u64) -> MarkovSampler {
        MarkovSampler::new(
            TransitionMatrix::standard(),
            Box::new(StdRng::seed_from_u64(seed)),
        )
    }

    /// A sampler over the standard matrix seeded from the OS.
    pub fn from_entropy() -> MarkovSampler {
        MarkovSampler::new(TransitionMatrix::standard(), Box::new(StdRng::from_entropy()))
    }

    pub fn matrix(&self) -> &TransitionMatrix {
        &self.matrix
    }

    /// Draws a random number and returns the state that follows `current`.
    pub fn next(&mut self, current: State) -> State {
        let r = self.random.draw();
        let next = self.sample(current, r);
        debug!(from = %current, to = %next, draw = r, "Sampled transition.");
        next
    }

    /// Returns the first state whose cumulative probability exceeds `r`.
    ///
    /// If rounding keeps the cumulative sum from ever exceeding `r`, the last
    /// state with a non-zero probability in the row is used so the result is
    /// always a reachable state.
    pub fn sample(&self, current: State, r: f64) -> State {
        let row = self.matrix.row(current);

        let mut cumulative = 0.0;
        for (i, p) in row.iter().enumerate() {
            cumulative += p;
            if r < cumulative {
                return State::ALL[i];
            }
        }

        row.iter()
            .rposition(|p| *p > 0.0)
            .map(|i| State::ALL[i])
            .unwrap_or(current)
    }
}

impl fmt::Debug for MarkovSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkovSampler")
            .field("matrix", &self.matrix)
            .finish()
    }
}
