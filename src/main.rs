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
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{crate_version, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use markovbeat::assets::AssetStore;
use markovbeat::audio::{self, Device as _};
use markovbeat::chain::{MarkovSampler, TransitionMatrix};
use markovbeat::config;
use markovbeat::controller::{keyboard, ChainController, ChainState, Controller};
use markovbeat::state::State;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Plays a Markov chain of syllable clips."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

/// Configuration shared by the commands that load clips. Flags win over the config file.
#[derive(Args)]
struct Overrides {
    /// The path to the player config.
    config: Option<PathBuf>,
    /// The audio device to play through ("default", a cpal device name or "mock").
    #[arg(short, long)]
    device: Option<String>,
    /// The HTTP origin serving /audio/<name>.<format>.
    #[arg(short, long, conflicts_with = "directory")]
    origin: Option<String>,
    /// A local directory containing audio/<name>.<format>.
    #[arg(long)]
    directory: Option<String>,
    /// The clip format.
    #[arg(short, long)]
    format: Option<String>,
    /// Seeds the chain so a walk can be replayed.
    #[arg(short, long)]
    seed: Option<u64>,
}

impl Overrides {
    fn load(&self) -> Result<config::Player, Box<dyn Error>> {
        let mut player = config::Player::load(self.config.as_deref())?;

        if let Some(device) = &self.device {
            player.audio_mut().set_device(device.clone());
        }
        if let Some(origin) = &self.origin {
            player.assets_mut().set_origin(origin.clone());
        }
        if let Some(directory) = &self.directory {
            player.assets_mut().set_directory(directory.clone());
        }
        if let Some(format) = &self.format {
            player.assets_mut().set_format(format.clone());
        }
        if let Some(seed) = self.seed {
            player.chain_mut().set_seed(seed);
        }
        Ok(player)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Plays the chain, controlled from the keyboard.
    Play {
        #[command(flatten)]
        overrides: Overrides,
        /// Starts the chain without waiting for a command.
        #[arg(long)]
        autostart: bool,
    },
    /// Loads and decodes every clip without playing anything.
    Check {
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Prints the transition matrix.
    Matrix {},
    /// Prints a random walk through the chain.
    Walk {
        /// The number of transitions to take.
        steps: usize,
        /// Seeds the walk.
        #[arg(short, long)]
        seed: Option<u64>,
        /// The state to start from.
        #[arg(long, default_value = "b")]
        from: State,
    },
}

fn print_state(state: &ChainState) {
    let activity = if state.is_loading {
        "loading"
    } else if state.is_playing {
        "playing"
    } else {
        "stopped"
    };
    println!(
        "{} [{}] step {}",
        state.current_state, activity, state.step_count
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            overrides,
            autostart,
        } => {
            let player = overrides.load()?;
            let device = audio::get_device(player.audio())?;
            let store = AssetStore::from_config(player.assets())?;
            let mut chain = ChainController::new(
                device,
                store,
                player.chain().sampler(),
                player.chain().clip_gap()?,
            );

            let mut status = chain.subscribe();
            let printer = tokio::spawn(async move {
                while status.changed().await.is_ok() {
                    let state = *status.borrow_and_update();
                    print_state(&state);
                }
            });

            if autostart {
                chain.start().await?;
            }
            Controller::new(chain, Arc::new(keyboard::Driver::new()))
                .join()
                .await?;
            printer.abort();
        }
        Commands::Check { overrides } => {
            let player = overrides.load()?;
            let mut store = AssetStore::from_config(player.assets())?;
            let output = audio::mock::Device::get("mock-check").open()?;
            let assets = store.load_all(output.as_ref()).await?;

            println!("Clips (total: {:?}):", assets.total_duration());
            for asset in assets.iter() {
                println!(
                    "- {} {} ({:?})",
                    asset.state(),
                    asset.path(),
                    asset.clip().duration()
                );
            }
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Matrix {} => {
            print!("{}", TransitionMatrix::standard());
        }
        Commands::Walk { steps, seed, from } => {
            let mut sampler = seed
                .map(MarkovSampler::seeded)
                .unwrap_or_else(MarkovSampler::from_entropy);

            let mut state = from;
            let mut walk = vec![state.to_string()];
            for _ in 0..steps {
                state = sampler.next(state);
                walk.push(state.to_string());
            }
            println!("{}", walk.join(" "));
        }
    }

    Ok(())
}
