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
use std::{io, sync::Arc, time::Duration};

use tokio::sync::{mpsc, mpsc::Sender, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, span, warn, Level, Span};

use crate::assets::{AssetLoadError, AssetSet, AssetStore};
use crate::audio::{AudioError, Device, Output};
use crate::chain::MarkovSampler;
use crate::scheduler::{Observer, PlaybackScheduler};
use crate::state::State;

pub mod keyboard;

/// What a front end gets to see of the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainState {
    /// The state whose clip is sounding, or will sound first on the next start.
    pub current_state: State,
    pub is_playing: bool,
    pub is_loading: bool,
    /// Number of advances since the controller was created. Survives stop and start.
    pub step_count: u64,
}

impl Default for ChainState {
    fn default() -> Self {
        ChainState {
            current_state: State::INITIAL,
            is_playing: false,
            is_loading: false,
            step_count: 0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Load(#[from] AssetLoadError),

    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// Applies scheduler notifications to the published state.
struct Publisher {
    status: Arc<watch::Sender<ChainState>>,
}

impl Observer for Publisher {
    fn advanced(&self, state: State) {
        self.status.send_modify(|status| {
            status.current_state = state;
            status.step_count += 1;
        });
    }

    fn halted(&self, _: &AudioError) {
        self.status.send_modify(|status| status.is_playing = false);
    }
}

/// Owns one chain session: the output, the clips and the scheduler.
pub struct ChainController {
    device: Arc<dyn Device>,
    store: AssetStore,
    scheduler: PlaybackScheduler,
    /// The output of the running session, if any.
    output: Option<Arc<dyn Output>>,
    status: Arc<watch::Sender<ChainState>>,
    span: Span,
}

impl ChainController {
    pub fn new(
        device: Arc<dyn Device>,
        store: AssetStore,
        sampler: MarkovSampler,
        clip_gap: Duration,
    ) -> ChainController {
        let (status, _) = watch::channel(ChainState::default());
        let status = Arc::new(status);
        let publisher = Arc::new(Publisher {
            status: status.clone(),
        });

        ChainController {
            device,
            store,
            scheduler: PlaybackScheduler::new(sampler, publisher, clip_gap),
            output: None,
            status,
            span: span!(Level::INFO, "controller"),
        }
    }

    /// A snapshot of the current state.
    pub fn state(&self) -> ChainState {
        *self.status.borrow()
    }

    /// Watches state changes.
    pub fn subscribe(&self) -> watch::Receiver<ChainState> {
        self.status.subscribe()
    }

    /// Opens the output, loads every clip and starts the chain from the current state.
    pub async fn start(&mut self) -> Result<(), ControllerError> {
        let state = self.state();
        if state.is_playing {
            info!(parent: &self.span, state = %state.current_state, "Chain is already playing.");
            return Ok(());
        }
        if self.output.is_some() {
            info!(parent: &self.span, "Releasing the output of a halted session.");
            self.release();
        }

        info!(parent: &self.span, device = %self.device, "Loading clips.");
        self.status.send_modify(|status| status.is_loading = true);
        self.scheduler.begin_loading();

        let (output, assets) = match self.open_and_load().await {
            Ok(loaded) => loaded,
            Err(e) => {
                error!(parent: &self.span, err = %e, "Unable to start the chain.");
                self.status.send_modify(|status| status.is_loading = false);
                self.scheduler.abort_loading();
                return Err(e);
            }
        };

        self.output = Some(output.clone());
        self.status.send_modify(|status| {
            status.is_loading = false;
            status.is_playing = true;
        });
        self.scheduler.start(output, assets, state.current_state);
        Ok(())
    }

    /// The output is only kept once the clips loaded, so a failure here drops it.
    async fn open_and_load(&mut self) -> Result<(Arc<dyn Output>, Arc<AssetSet>), ControllerError> {
        let output = self.device.open()?;
        let assets = self.store.load_all(output.as_ref()).await?;
        Ok((output, assets))
    }

    /// Stops the chain and releases the output and clips. The next start begins again at the
    /// initial state.
    pub fn stop(&mut self) {
        let state = self.state();
        if !state.is_playing && self.output.is_none() {
            info!(parent: &self.span, "Chain is not playing, nothing to stop.");
        } else {
            info!(parent: &self.span, state = %state.current_state, "Stopping the chain.");
        }

        self.release();
        // Subscribers only hear about a stop that changed something.
        self.status.send_if_modified(|status| {
            let changed = status.current_state != State::INITIAL || status.is_playing;
            status.current_state = State::INITIAL;
            status.is_playing = false;
            changed
        });
    }

    fn release(&mut self) {
        self.scheduler.stop();
        self.output = None;
        self.store.clear();
    }
}

/// Controller events that will trigger behavior in the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// Starts the chain. Does nothing while it plays.
    Start,

    /// Stops the chain. Does nothing while it is stopped.
    Stop,

    /// Stops the chain and shuts the controller down.
    Quit,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Feeds driver events to a chain.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(chain: ChainController, driver: Arc<dyn Driver>) -> Controller {
        Controller {
            handle: tokio::spawn(Controller::trigger_events(chain, driver)),
        }
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Applies events from the driver until it closes or asks to quit.
    async fn trigger_events(mut chain: ChainController, driver: Arc<dyn Driver>) {
        let span = span!(Level::INFO, "event loop");

        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);

        info!(parent: &span, "Controller started.");

        while let Some(event) = events_rx.recv().await {
            info!(parent: &span, event = ?event, "Received event.");

            match event {
                Event::Start => {
                    if let Err(e) = chain.start().await {
                        warn!(parent: &span, err = %e, "Start failed.");
                    }
                }
                Event::Stop => chain.stop(),
                Event::Quit => break,
            }
        }

        info!(parent: &span, "Controller closing.");
        chain.stop();
        drop(events_rx);
        match join_handle.await {
            Ok(Err(e)) => error!(parent: &span, err = %e, "Event monitor failed."),
            Err(e) => error!(parent: &span, err = %e, "Error waiting for event monitor to stop."),
            Ok(Ok(())) => {}
        }
    }
}
