//! Program configuration: JSON file parsing, validation, and deadline
//! resolution in an explicit reference timezone.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde::Deserialize;

/// Reference timezone when the config names none.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Athens;

#[derive(Debug, Clone)]
pub struct ProgramConfig {
    pub origin: String,
    pub destination: String,
    pub arrival_deadline: DateTime<Tz>,
    pub prep: Duration,
    pub buffer: Duration,
    pub sound_path: Option<PathBuf>,
    pub coarse_poll_seconds: u32,
    pub fine_poll_seconds: u32,
    pub fine_window_minutes: u32,
    pub timezone: Tz,
}

pub fn load_program_config(path: &Path) -> Result<ProgramConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read program file {}", path.display()))?;
    parse_program_config_text(&content)
}

pub fn parse_program_config_text(content: &str) -> Result<ProgramConfig> {
    let raw = serde_json::from_str::<ProgramConfigFile>(content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        anyhow!("invalid JSON at line {line}, column {column}: {err}")
    })?;

    if raw.origin.trim().is_empty() {
        bail!("origin must not be empty");
    }
    if raw.destination.trim().is_empty() {
        bail!("destination must not be empty");
    }
    if raw.coarse_poll_seconds == 0 {
        bail!("coarse_poll_seconds must be greater than zero");
    }
    if raw.fine_poll_seconds == 0 {
        bail!("fine_poll_seconds must be greater than zero");
    }
    if raw.fine_window_minutes == 0 {
        bail!("fine_window_minutes must be greater than zero");
    }

    let timezone = match &raw.timezone {
        Some(name) => {
            Tz::from_str(name).map_err(|_| anyhow!("unknown timezone '{name}'"))?
        }
        None => DEFAULT_TIMEZONE,
    };
    let arrival_deadline = parse_deadline(&raw.arrival_deadline, timezone)?;

    Ok(ProgramConfig {
        origin: raw.origin,
        destination: raw.destination,
        arrival_deadline,
        prep: Duration::minutes(i64::from(raw.prep_minutes)),
        buffer: Duration::minutes(i64::from(raw.buffer_minutes)),
        sound_path: raw.sound_path.map(PathBuf::from),
        coarse_poll_seconds: raw.coarse_poll_seconds,
        fine_poll_seconds: raw.fine_poll_seconds,
        fine_window_minutes: raw.fine_window_minutes,
        timezone,
    })
}

/// A zoned deadline is converted into the reference timezone; a zone-less
/// one is interpreted in it.
pub fn parse_deadline(input: &str, timezone: Tz) -> Result<DateTime<Tz>> {
    if let Ok(zoned) = DateTime::parse_from_rfc3339(input) {
        return Ok(zoned.with_timezone(&timezone));
    }
    let naive = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S"))
        .with_context(|| {
            format!("invalid arrival deadline '{input}', expected an ISO datetime")
        })?;
    resolve_local_datetime(&timezone, naive)
        .ok_or_else(|| anyhow!("arrival deadline '{input}' does not exist in {timezone}"))
}

fn resolve_local_datetime<Tz2>(timezone: &Tz2, naive: NaiveDateTime) -> Option<DateTime<Tz2>>
where
    Tz2: TimeZone,
    Tz2::Offset: Copy,
{
    match timezone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(first, _second) => Some(first),
        LocalResult::None => None,
    }
}

#[derive(Debug, Deserialize)]
struct ProgramConfigFile {
    origin: String,
    destination: String,
    arrival_deadline: String,
    #[serde(default)]
    prep_minutes: u32,
    #[serde(default)]
    buffer_minutes: u32,
    #[serde(default)]
    sound_path: Option<String>,
    #[serde(default = "default_coarse_poll_seconds")]
    coarse_poll_seconds: u32,
    #[serde(default = "default_fine_poll_seconds")]
    fine_poll_seconds: u32,
    #[serde(default = "default_fine_window_minutes")]
    fine_window_minutes: u32,
    #[serde(default)]
    timezone: Option<String>,
}

fn default_coarse_poll_seconds() -> u32 {
    180
}

fn default_fine_poll_seconds() -> u32 {
    60
}

fn default_fine_window_minutes() -> u32 {
    30
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;

    use super::*;

    #[test]
    fn parses_valid_program_config() {
        let json = r#"
{
  "origin": "Syntagma Square, Athens",
  "destination": "Athens International Airport",
  "arrival_deadline": "2025-08-09T15:30:00+03:00",
  "prep_minutes": 15,
  "buffer_minutes": 60,
  "sound_path": "/sounds/alarm.mp3",
  "coarse_poll_seconds": 240,
  "fine_poll_seconds": 45,
  "fine_window_minutes": 20
}
"#;
        let config = parse_program_config_text(json).expect("valid config");
        assert_eq!(config.origin, "Syntagma Square, Athens");
        assert_eq!(config.prep, Duration::minutes(15));
        assert_eq!(config.buffer, Duration::minutes(60));
        assert_eq!(config.sound_path, Some(PathBuf::from("/sounds/alarm.mp3")));
        assert_eq!(config.coarse_poll_seconds, 240);
        assert_eq!(config.fine_poll_seconds, 45);
        assert_eq!(config.fine_window_minutes, 20);
        assert_eq!(config.timezone, DEFAULT_TIMEZONE);
        assert_eq!(config.arrival_deadline.hour(), 15);
    }

    #[test]
    fn poll_settings_default_when_omitted() {
        let json = r#"
{
  "origin": "home",
  "destination": "office",
  "arrival_deadline": "2025-08-09T09:00:00"
}
"#;
        let config = parse_program_config_text(json).expect("valid config");
        assert_eq!(config.coarse_poll_seconds, 180);
        assert_eq!(config.fine_poll_seconds, 60);
        assert_eq!(config.fine_window_minutes, 30);
        assert_eq!(config.sound_path, None);
        assert_eq!(config.prep, Duration::zero());
    }

    #[test]
    fn zoneless_deadline_is_interpreted_in_reference_timezone() {
        let json = r#"
{
  "origin": "home",
  "destination": "office",
  "arrival_deadline": "2025-08-09T15:30:00",
  "timezone": "Europe/Athens"
}
"#;
        let config = parse_program_config_text(json).expect("valid config");
        // Athens is UTC+3 in August.
        assert_eq!(config.arrival_deadline.to_rfc3339(), "2025-08-09T15:30:00+03:00");
    }

    #[test]
    fn zoned_deadline_is_converted_into_reference_timezone() {
        let json = r#"
{
  "origin": "home",
  "destination": "office",
  "arrival_deadline": "2025-08-09T12:30:00Z",
  "timezone": "Europe/Athens"
}
"#;
        let config = parse_program_config_text(json).expect("valid config");
        assert_eq!(config.arrival_deadline.hour(), 15);
        assert_eq!(config.arrival_deadline.minute(), 30);
    }

    #[test]
    fn rejects_unparseable_deadline() {
        let json = r#"
{
  "origin": "home",
  "destination": "office",
  "arrival_deadline": "not-a-time"
}
"#;
        let err = parse_program_config_text(json).expect_err("bad deadline should fail");
        assert!(err.to_string().contains("invalid arrival deadline"));
    }

    #[test]
    fn rejects_empty_origin() {
        let json = r#"
{
  "origin": "  ",
  "destination": "office",
  "arrival_deadline": "2025-08-09T09:00:00"
}
"#;
        let err = parse_program_config_text(json).expect_err("empty origin should fail");
        assert!(err.to_string().contains("origin must not be empty"));
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let json = r#"
{
  "origin": "home",
  "destination": "office",
  "arrival_deadline": "2025-08-09T09:00:00",
  "coarse_poll_seconds": 0
}
"#;
        let err = parse_program_config_text(json).expect_err("zero poll should fail");
        assert!(err.to_string().contains("coarse_poll_seconds"));
    }

    #[test]
    fn rejects_unknown_timezone() {
        let json = r#"
{
  "origin": "home",
  "destination": "office",
  "arrival_deadline": "2025-08-09T09:00:00",
  "timezone": "Mars/Olympus_Mons"
}
"#;
        let err = parse_program_config_text(json).expect_err("unknown timezone should fail");
        assert!(err.to_string().contains("unknown timezone"));
    }
}
