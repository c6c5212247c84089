use log::{debug, info};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::error::{CapabilityError, SignalError};
use super::types::{PositionEvent, PositionOptions, PositionSample};
use super::{EventSender, PositionSource, Subscription};

const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("interval: {0}")]
    Interval(String),
    #[error("entry {0}: {1}")]
    Entry(usize, String),
    #[error("track has no entries")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct RawTrack {
    interval: Option<String>,
    #[serde(default)]
    repeat: bool,
    entries: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Fix {
        latitude: f64,
        longitude: f64,
        speed: Option<f64>,
        delay: Option<String>,
    },
    Fault {
        error: SignalError,
        delay: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    Fix {
        latitude: f64,
        longitude: f64,
        speed_mps: Option<f64>,
    },
    Fault(SignalError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Wait before this step is delivered.
    pub delay: Duration,
    pub kind: StepKind,
}

/// A recorded or hand-written drive.
///
/// Entries without a `delay` wait `interval`, except the very first one
/// which fires as soon as the subscription starts. On a repeating track
/// every later lap opens after `lap_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub steps: Vec<Step>,
    pub repeat: bool,
    pub lap_delay: Duration,
}

impl Track {
    pub fn from_file(path: &Path) -> Result<Self, TrackError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn from_str(yaml: &str) -> Result<Self, TrackError> {
        let raw: RawTrack = serde_yaml::from_str(yaml)?;
        if raw.entries.is_empty() {
            return Err(TrackError::Empty);
        }

        let interval = raw
            .interval
            .as_deref()
            .map(|s| parse_duration(s).map_err(TrackError::Interval))
            .transpose()?
            .unwrap_or(DEFAULT_INTERVAL);

        let steps = raw
            .entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                let (delay, kind) = match entry {
                    RawEntry::Fix {
                        latitude,
                        longitude,
                        speed,
                        delay,
                    } => {
                        if !(-90.0..=90.0).contains(&latitude)
                            || !(-180.0..=180.0).contains(&longitude)
                        {
                            return Err(TrackError::Entry(i, "coordinates out of range".into()));
                        }
                        let kind = StepKind::Fix {
                            latitude,
                            longitude,
                            speed_mps: speed,
                        };
                        (delay, kind)
                    }
                    RawEntry::Fault { error, delay } => (delay, StepKind::Fault(error)),
                };
                let default_delay = if i == 0 { Duration::ZERO } else { interval };
                let delay = delay
                    .as_deref()
                    .map(parse_duration)
                    .transpose()
                    .map_err(|e| TrackError::Entry(i, e))?
                    .unwrap_or(default_delay);
                Ok(Step { delay, kind })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let lap_delay = match steps.first() {
            Some(step) if !step.delay.is_zero() => step.delay,
            _ => interval,
        };
        if raw.repeat && lap_delay.is_zero() {
            return Err(TrackError::Interval(
                "a repeating track needs a non-zero interval".into(),
            ));
        }

        Ok(Track {
            steps,
            repeat: raw.repeat,
            lap_delay,
        })
    }
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime::parse_duration(s.trim()).map_err(|e| e.to_string())
}

/// Plays a [`Track`] back as if it came from a GPS receiver.
///
/// A gap longer than the subscription timeout produces a
/// [`SignalError::Timeout`] for every elapsed timeout period. The stream ends
/// after the last entry unless the track repeats.
pub struct ReplaySource {
    track: Arc<Track>,
}

impl ReplaySource {
    pub fn new(track: Track) -> Self {
        Self {
            track: Arc::new(track),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, TrackError> {
        let track = Track::from_file(path)?;
        info!(
            "Loaded replay track {} ({} entries)",
            path.display(),
            track.steps.len()
        );
        Ok(Self::new(track))
    }
}

impl PositionSource for ReplaySource {
    fn subscribe(&self, options: PositionOptions) -> Result<Subscription, CapabilityError> {
        let (subscription, sender) = Subscription::channel();
        let id = subscription.handle.id();
        debug!(
            "Replay watch {} subscribed (high accuracy: {}, timeout: {:?}, maximum age: {:?})",
            id, options.high_accuracy, options.timeout, options.maximum_age
        );
        tokio::spawn(replay(self.track.clone(), options, sender, id));
        Ok(subscription)
    }
}

async fn replay(track: Arc<Track>, options: PositionOptions, sender: EventSender, id: u64) {
    let mut first_lap = true;
    loop {
        for (i, step) in track.steps.iter().enumerate() {
            let delay = if i == 0 && !first_lap {
                track.lap_delay
            } else {
                step.delay
            };
            if !wait(delay, options.timeout, &sender).await {
                debug!("Replay watch {} cancelled", id);
                return;
            }
            let event = match &step.kind {
                StepKind::Fix {
                    latitude,
                    longitude,
                    speed_mps,
                } => PositionEvent::Sample(PositionSample::new(*latitude, *longitude, *speed_mps)),
                StepKind::Fault(error) => PositionEvent::Error(*error),
            };
            if !sender.send(event).await {
                debug!("Replay watch {} cancelled", id);
                return;
            }
        }
        if !track.repeat {
            info!("Replay watch {} reached the end of the track", id);
            return;
        }
        first_lap = false;
    }
}

async fn wait(delay: Duration, timeout: Duration, sender: &EventSender) -> bool {
    let mut remaining = delay;
    while !timeout.is_zero() && remaining > timeout {
        if !sender.sleep(timeout).await {
            return false;
        }
        remaining -= timeout;
        if !sender.send(PositionEvent::Error(SignalError::Timeout)).await {
            return false;
        }
    }
    sender.sleep(remaining).await
}
