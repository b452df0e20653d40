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

//! Sequencing of clips.
//!
//! The scheduler plays the clip for the current state, waits for it to finish and asks the
//! sampler for the next state, over and over until stopped. Exactly one clip is sounding while
//! the chain plays.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, span, Level, Span};

use crate::assets::AssetSet;
use crate::audio::{AudioError, Output};
use crate::chain::MarkovSampler;
use crate::playsync::CancelHandle;
use crate::state::State;

/// Where the scheduler is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Nothing has happened yet.
    Idle,
    /// Clips are being loaded.
    Loading,
    /// The clip for the state is sounding.
    Playing(State),
    /// Playback was stopped or the output failed.
    Stopped,
}

/// Receives the scheduler's notifications. Called from the playback task.
pub trait Observer: Send + Sync {
    /// The chain moved to a new state and its clip is about to play.
    fn advanced(&self, state: State);

    /// The output failed and the chain has stopped.
    fn halted(&self, error: &AudioError);
}

/// The part of the scheduler that the playback task and stop() contend over.
struct Cursor {
    sampler: MarkovSampler,
    phase: Phase,
}

struct Run {
    join: JoinHandle<()>,
    cancel: CancelHandle,
}

/// Plays clips one after another, following the chain.
pub struct PlaybackScheduler {
    cursor: Arc<Mutex<Cursor>>,
    observer: Arc<dyn Observer>,
    /// Pause between the end of a clip and the next one.
    clip_gap: Duration,
    run: Option<Run>,
    span: Span,
}

impl PlaybackScheduler {
    pub fn new(
        sampler: MarkovSampler,
        observer: Arc<dyn Observer>,
        clip_gap: Duration,
    ) -> PlaybackScheduler {
        PlaybackScheduler {
            cursor: Arc::new(Mutex::new(Cursor {
                sampler,
                phase: Phase::Idle,
            })),
            observer,
            clip_gap,
            run: None,
            span: span!(Level::INFO, "scheduler"),
        }
    }

    pub fn phase(&self) -> Phase {
        self.cursor.lock().phase
    }

    /// Marks the scheduler as waiting on clips.
    pub fn begin_loading(&mut self) {
        let mut cursor = self.cursor.lock();
        if !matches!(cursor.phase, Phase::Playing(_)) {
            cursor.phase = Phase::Loading;
        }
    }

    /// Backs out of loading after a failed load.
    pub fn abort_loading(&mut self) {
        let mut cursor = self.cursor.lock();
        if cursor.phase == Phase::Loading {
            cursor.phase = Phase::Idle;
        }
    }

    /// Starts playing the chain from `initial`. Does nothing if already playing.
    pub fn start(&mut self, output: Arc<dyn Output>, assets: Arc<AssetSet>, initial: State) {
        let span = self.span.clone();
        let _enter = span.enter();
        {
            let mut cursor = self.cursor.lock();
            if let Phase::Playing(state) = cursor.phase {
                info!(state = %state, "Scheduler is already playing.");
                return;
            }
            cursor.phase = Phase::Playing(initial);
        }

        // A loop that halted on its own has already returned, but its handle is still here.
        self.cancel_run();

        info!(state = %initial, output = %output, "Starting playback.");
        let cancel = CancelHandle::new();
        let join = tokio::spawn(PlaybackScheduler::play_loop(
            self.cursor.clone(),
            self.observer.clone(),
            output,
            assets,
            initial,
            self.clip_gap,
            cancel.clone(),
            self.span.clone(),
        ));
        self.run = Some(Run { join, cancel });
    }

    /// Stops playback. Calling this while nothing plays does nothing.
    pub fn stop(&mut self) {
        let span = self.span.clone();
        let _enter = span.enter();
        let previous = {
            let mut cursor = self.cursor.lock();
            std::mem::replace(&mut cursor.phase, Phase::Stopped)
        };

        match previous {
            Phase::Playing(state) => info!(state = %state, "Stopping playback."),
            _ => info!(phase = ?previous, "Scheduler is not playing, nothing to stop."),
        }
        self.cancel_run();
    }

    fn cancel_run(&mut self) {
        if let Some(run) = self.run.take() {
            run.cancel.cancel();
            run.join.abort();
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn play_loop(
        cursor: Arc<Mutex<Cursor>>,
        observer: Arc<dyn Observer>,
        output: Arc<dyn Output>,
        assets: Arc<AssetSet>,
        initial: State,
        clip_gap: Duration,
        cancel: CancelHandle,
        span: Span,
    ) {
        let mut current = initial;
        loop {
            let asset = assets.get(current);
            let mut playback = match output.play(asset.clip()) {
                Ok(playback) => playback,
                Err(e) => {
                    halt(&cursor, observer.as_ref(), e, &span);
                    return;
                }
            };
            debug!(parent: &span, state = %current, path = asset.path(), "Clip started.");

            tokio::select! {
                _ = cancel.cancelled() => return,
                result = playback.finished() => {
                    if let Err(e) = result {
                        halt(&cursor, observer.as_ref(), e, &span);
                        return;
                    }
                }
            }

            if !clip_gap.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(clip_gap) => {}
                }
            }

            match advance(&cursor, observer.as_ref(), &span) {
                Some(next) => current = next,
                None => return,
            }
        }
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        self.cancel_run();
    }
}

/// Moves the chain one step after a clip finished. A completion that arrives once the
/// scheduler is no longer playing is ignored and returns None.
fn advance(cursor: &Mutex<Cursor>, observer: &dyn Observer, span: &Span) -> Option<State> {
    let mut cursor = cursor.lock();
    let current = match cursor.phase {
        Phase::Playing(state) => state,
        phase => {
            debug!(parent: span, phase = ?phase, "Ignoring stale clip completion.");
            return None;
        }
    };

    let next = cursor.sampler.next(current);
    cursor.phase = Phase::Playing(next);
    info!(parent: span, from = %current, to = %next, "Advanced.");
    observer.advanced(next);
    Some(next)
}

/// Stops the chain after the output failed.
/// Like advance, the observer hears about it under the lock, so a later start always publishes
/// after the halt.
fn halt(cursor: &Mutex<Cursor>, observer: &dyn Observer, error: AudioError, span: &Span) {
    let mut cursor = cursor.lock();
    if !matches!(cursor.phase, Phase::Playing(_)) {
        debug!(parent: span, err = %error, "Ignoring output failure after stop.");
        return;
    }
    cursor.phase = Phase::Stopped;
    error!(parent: span, err = %error, "Playback failed, stopping.");
    observer.halted(&error);
}
