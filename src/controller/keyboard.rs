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
use std::io;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;

const START: &str = "start";
const STOP: &str = "stop";
const QUIT: &str = "quit";

/// A driver that controls the chain from stdin.
#[derive(Default)]
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads one command. Returns false once input is exhausted or the user quit.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(writer, "Command ({}, {}, {}): ", START, STOP, QUIT)?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        let event = match input.trim().to_lowercase().as_str() {
            START => Event::Start,
            STOP => Event::Stop,
            QUIT => Event::Quit,
            _ => {
                warn!(input = input.trim(), "Unrecognized input");
                return Ok(true);
            }
        };
        events_tx
            .blocking_send(event)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(event != Event::Quit)
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}
            info!("Keyboard driver finished.");
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader};

    use tokio::sync::mpsc;

    use super::{Driver, Event, QUIT, START, STOP};

    fn get_event(input: &str) -> Result<(bool, Option<Event>), io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(1);

        let reader = BufReader::new(input.as_bytes());
        let mut prompt: Vec<u8> = Vec::new();
        let more = Driver::monitor_io(&sender, reader, &mut prompt)?;
        assert_eq!("Command (start, stop, quit): ", String::from_utf8_lossy(&prompt));

        // Force the sender to close.
        drop(sender);
        Ok((more, receiver.blocking_recv()))
    }

    #[test]
    fn test_keyboard_events() -> Result<(), io::Error> {
        assert_eq!((true, Some(Event::Start)), get_event(START)?);
        assert_eq!(
            (true, Some(Event::Stop)),
            get_event(&format!("  {}\n", STOP.to_uppercase()))?
        );
        assert_eq!((false, Some(Event::Quit)), get_event(QUIT)?);
        assert_eq!((true, None), get_event("unrecognized\n")?);
        assert_eq!((false, None), get_event("")?);
        Ok(())
    }
}
