//! Mixdeck Player - two-deck mixing console on the terminal
//!
//! Opens the audio output, optionally loads a file onto each deck and then
//! reads console commands from stdin while ticking the mixer at display rate.
//!
//! ## Command line
//!
//! ```text
//! mixdeck-player [--list-devices] [--device NAME] [--config PATH] [DECK_A_FILE] [DECK_B_FILE]
//! ```
//!
//! When stdin closes the player keeps running until no deck is playing.

mod commands;
mod loader;

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossbeam::channel::{self, Receiver};
use mixdeck_core::audio::{output_device_names, start_audio_system};
use mixdeck_core::config::{default_config_path, load_config, MixerConfig};
use mixdeck_core::engine::MonotonicClock;
use mixdeck_core::{DeckSlot, MixerEvent, MixerState, TrackId, TransportState, NUM_DECKS};

use commands::{Command, HELP};

/// Mixer housekeeping cadence (~60 Hz)
const TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Bars shown by the `spectrum` command
const SPECTRUM_BARS: usize = 16;

#[derive(Debug, Default)]
struct Args {
    list_devices: bool,
    device: Option<String>,
    config: Option<PathBuf>,
    files: Vec<PathBuf>,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut parsed = Args::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--list-devices" => parsed.list_devices = true,
                "--device" => match args.next() {
                    Some(name) => parsed.device = Some(name),
                    None => bail!("--device needs a device name"),
                },
                "--config" => match args.next() {
                    Some(path) => parsed.config = Some(PathBuf::from(path)),
                    None => bail!("--config needs a path"),
                },
                flag if flag.starts_with("--") => bail!("unknown flag {}", flag),
                _ => parsed.files.push(PathBuf::from(arg)),
            }
        }
        if parsed.files.len() > NUM_DECKS {
            bail!("at most {} files (one per deck)", NUM_DECKS);
        }
        Ok(parsed)
    }
}

/// Console session: the mixer plus the bookkeeping the commands need
struct Console {
    mixer: MixerState,
    next_track_id: TrackId,
}

impl Console {
    fn load(&mut self, slot: DeckSlot, path: &Path) -> Result<()> {
        let id = self.next_track_id;
        self.next_track_id += 1;
        let loaded = loader::load_file(path, id)?;
        let name = loaded.track.display_name();
        self.mixer.load_track(slot, loaded.track, loaded.pcm)?;
        println!("{}: loaded {}", slot, name);
        Ok(())
    }

    /// Run one command; false when the session should end
    fn execute(&mut self, command: Command) -> Result<bool> {
        match command {
            Command::Load(slot, path) => self.load(slot, &path)?,
            Command::Unload(slot) => self.mixer.unload_track(slot),
            Command::Play(slot) => self.mixer.play(slot),
            Command::Pause(slot) => self.mixer.pause(slot),
            Command::Stop(slot) => self.mixer.stop(slot),
            Command::Toggle(slot) => self.mixer.toggle_play(slot),
            Command::Seek(slot, seconds) => {
                let position = self.mixer.seek(slot, seconds)?;
                println!("{}: at {:.2}s", slot, position);
            }
            Command::Volume(slot, volume) => {
                let applied = self.mixer.set_volume(slot, volume)?;
                println!("{}: volume {:.2}", slot, applied);
            }
            Command::Pitch(slot, pitch) => {
                let applied = self.mixer.set_pitch(slot, pitch)?;
                println!("{}: pitch {:+.2}%", slot, applied);
            }
            Command::Eq(slot, band, gain_db) => {
                let applied = self.mixer.set_eq(slot, band, gain_db)?;
                println!("{}: eq {:?} {:+.1} dB", slot, band, applied);
            }
            Command::AddCue(slot, label) => {
                let position = self.mixer.deck(slot).position_seconds;
                let id = self.mixer.add_cue_point(slot, label, position)?;
                println!("{}: cue {} at {:.2}s", slot, id, position);
            }
            Command::RemoveCue(slot, id) => match self.mixer.remove_cue_point(slot, id) {
                Some(cue) => println!("{}: removed cue {} '{}'", slot, cue.id, cue.label),
                None => println!("{}: no cue {}", slot, id),
            },
            Command::JumpToCue(slot, id) => {
                let position = self.mixer.jump_to_cue(slot, id)?;
                println!("{}: jumped to {:.2}s", slot, position);
            }
            Command::Crossfader(value) => {
                let applied = self.mixer.set_crossfader(value)?;
                println!("crossfader {:.2}", applied);
            }
            Command::Master(value) => {
                let applied = self.mixer.set_master_volume(value)?;
                println!("master {:.2}", applied);
            }
            Command::Status => self.print_status(),
            Command::Spectrum(slot) => self.print_spectrum(slot),
            Command::Help => println!("{}", HELP),
            Command::Quit => return Ok(false),
        }
        // Console commands are discrete; deliver any throttled change now
        self.mixer.flush();
        Ok(true)
    }

    fn print_status(&self) {
        let snapshot = self.mixer.snapshot();
        for slot in DeckSlot::ALL {
            let deck = snapshot.deck(slot);
            let eq = snapshot.eq(slot);
            let title = deck
                .track
                .as_ref()
                .map(|t| t.display_name())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{} [{:?}] {} {:.2}/{:.2}s vol {:.2} pitch {:+.2}% eq L{:+.1} M{:+.1} H{:+.1}",
                slot,
                deck.transport_state,
                title,
                deck.position_seconds,
                deck.track.as_ref().map(|t| t.duration_seconds).unwrap_or(0.0),
                deck.volume,
                deck.pitch_percent,
                eq.low,
                eq.mid,
                eq.high,
            );
            if let Some(rendered) = self.mixer.rendered_position_seconds(slot) {
                println!("    audio thread at {:.3}s", rendered);
            }
            for cue in &deck.cue_points {
                println!("    cue {} '{}' at {:.2}s", cue.id, cue.label, cue.position_seconds);
            }
        }
        println!(
            "crossfader {:.2}  master {:.2}",
            snapshot.crossfader, snapshot.master_volume
        );
    }

    fn print_spectrum(&self, slot: DeckSlot) {
        let spectrum = self.mixer.waveform_tap().spectrum(slot);
        let per_bar = (spectrum.len() / SPECTRUM_BARS).max(1);
        let bars: String = spectrum
            .chunks(per_bar)
            .take(SPECTRUM_BARS)
            .map(|bins| {
                let peak = bins.iter().copied().fold(0.0f32, f32::max);
                const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
                LEVELS[((peak * LEVELS.len() as f32) as usize).min(LEVELS.len() - 1)]
            })
            .collect();
        println!("{}: {}", slot, bars);
    }

    fn any_playing(&self) -> bool {
        DeckSlot::ALL
            .iter()
            .any(|slot| self.mixer.deck(*slot).transport_state == TransportState::Playing)
    }
}

/// Forward stdin lines to the main loop; the channel closes at EOF
fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (tx, rx) = channel::unbounded();
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        log::warn!("stdin read failed: {}", e);
                        break;
                    }
                }
            }
        })
        .context("Failed to spawn stdin reader")?;
    Ok(rx)
}

fn report(event: MixerEvent) {
    match event {
        MixerEvent::Changed(snapshot) => {
            for slot in DeckSlot::ALL {
                let deck = snapshot.deck(slot);
                log::debug!(
                    "{}: {:?} at {:.2}s",
                    slot,
                    deck.transport_state,
                    deck.position_seconds
                );
            }
        }
        MixerEvent::DeckFault { slot, error } => {
            log::error!("{}: {}", slot, error);
            println!("{}: cannot play track: {}", slot, error);
        }
    }
}

fn main() -> Result<()> {
    // Set RUST_LOG=debug for per-change logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse(std::env::args().skip(1))?;

    if args.list_devices {
        for name in output_device_names()? {
            println!("{}", name);
        }
        return Ok(());
    }

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let mut config: MixerConfig = load_config(&config_path);
    if let Some(device) = args.device.clone() {
        config.audio = config.audio.with_device(device);
    }

    let system = start_audio_system(&config, Arc::new(MonotonicClock::new()))?;
    println!(
        "Output: {} ({} Hz, {} frames, {:.1} ms)",
        system.handle.device_name(),
        system.handle.sample_rate(),
        system.handle.buffer_size(),
        system.handle.latency_ms()
    );
    // The stream stops when the handle drops
    let _handle = system.handle;
    let mut console = Console {
        mixer: system.mixer,
        next_track_id: 1,
    };
    let events = console.mixer.subscribe();

    for (index, path) in args.files.iter().enumerate() {
        let Some(slot) = DeckSlot::from_index(index) else {
            continue;
        };
        if let Err(e) = console.load(slot, path) {
            log::error!("{}: {:#}", slot, e);
        }
    }
    println!("{}", HELP);

    let mut lines = spawn_stdin_reader()?;
    let ticker = channel::tick(TICK_INTERVAL);
    let mut stdin_open = true;

    loop {
        crossbeam::select! {
            recv(lines) -> line => match line {
                Ok(line) => match Command::parse(&line) {
                    Ok(Some(command)) => match console.execute(command) {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => println!("error: {:#}", e),
                    },
                    Ok(None) => {}
                    Err(e) => println!("error: {:#}", e),
                },
                Err(_) => {
                    log::info!("stdin closed; running until playback ends");
                    stdin_open = false;
                }
            },
            recv(ticker) -> _ => {
                console.mixer.tick();
                if !stdin_open && !console.any_playing() {
                    break;
                }
            }
        }

        if !stdin_open {
            lines = channel::never();
        }

        while let Ok(event) = events.try_recv() {
            report(event);
        }
    }

    log::info!("mixdeck-player shutting down");
    Ok(())
}
