//! Headless event playback.
//!
//! A headless run replaces the window system with a pre-recorded event
//! stream, one event per line:
//!
//! ```text
//! <microseconds> AVAILABLE
//! <microseconds> PLAY <animation-time> <rate>
//! <microseconds> SAVE <image-name>
//! <microseconds> MARK <text>
//! ```
//!
//! AVAILABLE renders a frame; PLAY repositions the animation clock; MARK
//! echoes its text; SAVE names the image a presenting build would write.
//! Replaying the same stream reproduces the same frame times exactly,
//! which is why an unmatched camera name must abort instead of silently
//! falling back.

use thiserror::Error;

use crate::foundation::time::AnimationClock;

/// Headless event file errors
#[derive(Error, Debug)]
pub enum HeadlessError {
    /// A line could not be parsed
    #[error("event file line {line}: {message}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// What went wrong
        message: String,
    },
}

/// One pre-recorded event
#[derive(Debug, Clone, PartialEq)]
pub enum HeadlessEvent {
    /// A swapchain image would be available: render a frame
    Available {
        /// Event timestamp in microseconds
        time_us: i64,
    },
    /// Reposition the animation clock
    Play {
        /// Event timestamp in microseconds
        time_us: i64,
        /// New animation time in seconds
        anim_time: f32,
        /// New playback rate
        rate: f32,
    },
    /// Save the current image under a name
    Save {
        /// Event timestamp in microseconds
        time_us: i64,
        /// Image name
        name: String,
    },
    /// Echo a marker to output
    Mark {
        /// Event timestamp in microseconds
        time_us: i64,
        /// Marker text
        text: String,
    },
}

impl HeadlessEvent {
    fn time_us(&self) -> i64 {
        match self {
            Self::Available { time_us }
            | Self::Play { time_us, .. }
            | Self::Save { time_us, .. }
            | Self::Mark { time_us, .. } => *time_us,
        }
    }
}

/// Parse an event file
pub fn parse_events(text: &str) -> Result<Vec<HeadlessEvent>, HeadlessError> {
    let mut events = Vec::new();

    for (line_index, line) in text.lines().enumerate() {
        let line_number = line_index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let mut parts = line.splitn(3, ' ');
        let time_us = parts
            .next()
            .and_then(|t| t.parse::<i64>().ok())
            .ok_or_else(|| HeadlessError::Parse {
                line: line_number,
                message: "expected a microsecond timestamp".to_string(),
            })?;
        let word = parts.next().ok_or_else(|| HeadlessError::Parse {
            line: line_number,
            message: "expected an event type".to_string(),
        })?;
        let rest = parts.next().unwrap_or("");

        let event = match word {
            "AVAILABLE" => HeadlessEvent::Available { time_us },
            "PLAY" => {
                let mut args = rest.split_whitespace();
                let anim_time = args
                    .next()
                    .and_then(|v| v.parse::<f32>().ok())
                    .ok_or_else(|| HeadlessError::Parse {
                        line: line_number,
                        message: "PLAY expects <time> <rate>".to_string(),
                    })?;
                let rate = args
                    .next()
                    .and_then(|v| v.parse::<f32>().ok())
                    .ok_or_else(|| HeadlessError::Parse {
                        line: line_number,
                        message: "PLAY expects <time> <rate>".to_string(),
                    })?;
                HeadlessEvent::Play {
                    time_us,
                    anim_time,
                    rate,
                }
            }
            "SAVE" => HeadlessEvent::Save {
                time_us,
                name: rest.to_string(),
            },
            "MARK" => HeadlessEvent::Mark {
                time_us,
                text: rest.to_string(),
            },
            other => {
                return Err(HeadlessError::Parse {
                    line: line_number,
                    message: format!("unknown event type \"{other}\""),
                })
            }
        };
        events.push(event);
    }

    Ok(events)
}

/// Steps the animation clock through a recorded event stream.
pub struct HeadlessPlayback {
    events: Vec<HeadlessEvent>,
    index: usize,
    last_time: f32,
}

impl HeadlessPlayback {
    /// Begin playback of an event list
    pub fn new(events: Vec<HeadlessEvent>) -> Self {
        Self {
            events,
            index: 0,
            last_time: 0.0,
        }
    }

    /// Consume the next event, advancing the clock by the recorded elapsed
    /// time. Returns whether a frame should render, or `None` when the
    /// stream is exhausted.
    pub fn step(&mut self, clock: &mut AnimationClock) -> Option<bool> {
        let event = self.events.get(self.index)?.clone();
        self.index += 1;

        let t = event.time_us() as f32 / 1_000_000.0;
        clock.advance(t - self.last_time);
        self.last_time = t;

        let render = match event {
            HeadlessEvent::Available { .. } => true,
            HeadlessEvent::Play {
                anim_time, rate, ..
            } => {
                clock.set_current(anim_time);
                clock.set_rate(rate);
                false
            }
            HeadlessEvent::Save { name, .. } => {
                log::info!("SAVE {name} (no presentation surface in this build)");
                false
            }
            HeadlessEvent::Mark { text, .. } => {
                println!("MARK {text}");
                false
            }
        };
        Some(render)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_stream() {
        let events = parse_events(
            "0 AVAILABLE\n\
             16000 PLAY 1.5 2.0\n\
             32000 MARK halfway there\n\
             48000 SAVE frame.ppm\n\
             64000 AVAILABLE\n",
        )
        .unwrap();

        assert_eq!(events.len(), 5);
        assert_eq!(events[0], HeadlessEvent::Available { time_us: 0 });
        assert_eq!(
            events[1],
            HeadlessEvent::Play {
                time_us: 16000,
                anim_time: 1.5,
                rate: 2.0
            }
        );
        assert_eq!(
            events[2],
            HeadlessEvent::Mark {
                time_us: 32000,
                text: "halfway there".to_string()
            }
        );
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let err = parse_events("0 AVAILABLE\nbogus line\n").unwrap_err();
        assert!(matches!(err, HeadlessError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_playback_advances_clock_and_applies_play() {
        let events = parse_events(
            "0 AVAILABLE\n\
             1000000 AVAILABLE\n\
             2000000 PLAY 10.0 0.5\n\
             4000000 AVAILABLE\n",
        )
        .unwrap();
        let mut playback = HeadlessPlayback::new(events);
        let mut clock = AnimationClock::new();

        assert_eq!(playback.step(&mut clock), Some(true));
        assert_eq!(clock.current(), 0.0);

        assert_eq!(playback.step(&mut clock), Some(true));
        assert!((clock.current() - 1.0).abs() < 1e-6);

        // PLAY jumps to t=10 at half rate without rendering.
        assert_eq!(playback.step(&mut clock), Some(false));
        assert_eq!(clock.current(), 10.0);

        // Two recorded seconds at rate 0.5 advance the clock by one.
        assert_eq!(playback.step(&mut clock), Some(true));
        assert!((clock.current() - 11.0).abs() < 1e-5);

        assert_eq!(playback.step(&mut clock), None);
    }
}
