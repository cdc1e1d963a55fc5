//! Console commands read from stdin
//!
//! One command per line, deck given as `a`/`b`:
//!
//! ```text
//! load a <path>     unload a        play a      pause a     stop a     toggle a
//! seek a <secs>     vol a <0..1>    pitch a <%>  eq a low|mid|high <dB>
//! cue a <label>     uncue a <id>    jump a <id>
//! xf <0..1>         master <0..1>   status      spectrum a  help        quit
//! ```

use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use mixdeck_core::{CueId, DeckSlot, EqBand};

pub const HELP: &str = "\
commands:
  load <deck> <path>        unload <deck>
  play|pause|stop|toggle <deck>
  seek <deck> <seconds>     vol <deck> <0..1>       pitch <deck> <percent>
  eq <deck> low|mid|high <dB>
  cue <deck> <label>        uncue <deck> <id>       jump <deck> <id>
  xf <0..1>                 master <0..1>
  status                    spectrum <deck>         help    quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Load(DeckSlot, PathBuf),
    Unload(DeckSlot),
    Play(DeckSlot),
    Pause(DeckSlot),
    Stop(DeckSlot),
    Toggle(DeckSlot),
    Seek(DeckSlot, f64),
    Volume(DeckSlot, f64),
    Pitch(DeckSlot, f64),
    Eq(DeckSlot, EqBand, f64),
    AddCue(DeckSlot, String),
    RemoveCue(DeckSlot, CueId),
    JumpToCue(DeckSlot, CueId),
    Crossfader(f64),
    Master(f64),
    Status,
    Spectrum(DeckSlot),
    Help,
    Quit,
}

fn parse_deck(word: Option<&str>) -> Result<DeckSlot> {
    match word.map(|w| w.to_ascii_lowercase()).as_deref() {
        Some("a") => Ok(DeckSlot::A),
        Some("b") => Ok(DeckSlot::B),
        Some(other) => bail!("unknown deck '{}' (use a or b)", other),
        None => bail!("missing deck"),
    }
}

fn parse_band(word: Option<&str>) -> Result<EqBand> {
    match word.map(|w| w.to_ascii_lowercase()).as_deref() {
        Some("low") => Ok(EqBand::Low),
        Some("mid") => Ok(EqBand::Mid),
        Some("high") => Ok(EqBand::High),
        Some(other) => bail!("unknown band '{}' (use low, mid or high)", other),
        None => bail!("missing band"),
    }
}

fn parse_number<T: std::str::FromStr>(word: Option<&str>, what: &str) -> Result<T> {
    let word = word.ok_or_else(|| anyhow!("missing {}", what))?;
    word.parse()
        .map_err(|_| anyhow!("invalid {} '{}'", what, word))
}

impl Command {
    /// Parse one input line; `Ok(None)` for a blank line
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "load" => {
                let slot = parse_deck(words.next())?;
                // Paths may contain spaces; take the rest of the line verbatim
                let rest = words.collect::<Vec<_>>().join(" ");
                if rest.is_empty() {
                    bail!("missing path");
                }
                Command::Load(slot, PathBuf::from(rest))
            }
            "unload" => Command::Unload(parse_deck(words.next())?),
            "play" => Command::Play(parse_deck(words.next())?),
            "pause" => Command::Pause(parse_deck(words.next())?),
            "stop" => Command::Stop(parse_deck(words.next())?),
            "toggle" => Command::Toggle(parse_deck(words.next())?),
            "seek" => {
                let slot = parse_deck(words.next())?;
                Command::Seek(slot, parse_number(words.next(), "seconds")?)
            }
            "vol" | "volume" => {
                let slot = parse_deck(words.next())?;
                Command::Volume(slot, parse_number(words.next(), "volume")?)
            }
            "pitch" => {
                let slot = parse_deck(words.next())?;
                Command::Pitch(slot, parse_number(words.next(), "pitch")?)
            }
            "eq" => {
                let slot = parse_deck(words.next())?;
                let band = parse_band(words.next())?;
                Command::Eq(slot, band, parse_number(words.next(), "gain")?)
            }
            "cue" => {
                let slot = parse_deck(words.next())?;
                let label = words.collect::<Vec<_>>().join(" ");
                Command::AddCue(slot, if label.is_empty() { "Cue".to_string() } else { label })
            }
            "uncue" => {
                let slot = parse_deck(words.next())?;
                Command::RemoveCue(slot, parse_number(words.next(), "cue id")?)
            }
            "jump" => {
                let slot = parse_deck(words.next())?;
                Command::JumpToCue(slot, parse_number(words.next(), "cue id")?)
            }
            "xf" | "crossfader" => Command::Crossfader(parse_number(words.next(), "crossfader")?),
            "master" => Command::Master(parse_number(words.next(), "master volume")?),
            "status" => Command::Status,
            "spectrum" => Command::Spectrum(parse_deck(words.next())?),
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => bail!("unknown command '{}' (try help)", other),
        };
        Ok(Some(command))
    }
}
