//! Stdin command language
//!
//! One command per line, words separated by whitespace:
//!
//! ```text
//! play | pause | toggle | stop | next | prev
//! seek <ms> | jump <index>
//! queue <start> <id...> | next-up <id...> | append <id...>
//! shuffle on|off | repeat none|all|one | multi <count>
//! sleep <seconds>          (0 cancels)
//! focus gain|loss|transient|duck
//! click | unplug | plug
//! status | save | quit
//! ```

use crate::error::{DaemonError, Result};
use cadence_core::{TrackId, TrackRepository};
use cadence_playback::{FocusChange, PlaybackCommand, RepeatMode};
use std::str::FromStr;

/// A parsed stdin line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineCommand {
    Play,
    Pause,
    Toggle,
    Stop,
    Next,
    Prev,
    Seek(u64),
    Queue { start: usize, ids: Vec<TrackId> },
    NextUp(Vec<TrackId>),
    Append(Vec<TrackId>),
    Jump(usize),
    Shuffle(bool),
    Repeat(RepeatMode),
    Multi(u32),
    Sleep { seconds: u64 },
    Focus(FocusChange),
    Click,
    Unplug,
    Plug,
    Status,
    Save,
    Quit,
}

/// What the daemon loop does with a command
#[derive(Debug)]
pub enum Action {
    Send(PlaybackCommand),
    PrintStatus,
    Quit,
}

fn number<T: FromStr>(word: Option<&str>, what: &str) -> Result<T> {
    let word = word.ok_or_else(|| DaemonError::invalid_command(format!("missing {what}")))?;
    word.parse()
        .map_err(|_| DaemonError::invalid_command(format!("bad {what}: {word}")))
}

fn ids<'a>(words: impl Iterator<Item = &'a str>) -> Result<Vec<TrackId>> {
    let ids = words
        .map(|word| {
            word.parse::<TrackId>()
                .map_err(|_| DaemonError::invalid_command(format!("bad track id: {word}")))
        })
        .collect::<Result<Vec<_>>>()?;
    if ids.is_empty() {
        return Err(DaemonError::invalid_command("no track ids given"));
    }
    Ok(ids)
}

impl FromStr for LineCommand {
    type Err = DaemonError;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(DaemonError::invalid_command("empty line"));
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "play" => Self::Play,
            "pause" => Self::Pause,
            "toggle" => Self::Toggle,
            "stop" => Self::Stop,
            "next" | "skip" => Self::Next,
            "prev" | "previous" => Self::Prev,
            "seek" => Self::Seek(number(words.next(), "position")?),
            "queue" => {
                let start = number(words.next(), "start index")?;
                Self::Queue {
                    start,
                    ids: ids(words.by_ref())?,
                }
            }
            "next-up" => Self::NextUp(ids(words.by_ref())?),
            "append" => Self::Append(ids(words.by_ref())?),
            "jump" => Self::Jump(number(words.next(), "index")?),
            "shuffle" => match words.next() {
                Some("on") => Self::Shuffle(true),
                Some("off") => Self::Shuffle(false),
                other => {
                    return Err(DaemonError::invalid_command(format!(
                        "shuffle expects on|off, got {other:?}"
                    )))
                }
            },
            "repeat" => match words.next() {
                Some("none") => Self::Repeat(RepeatMode::None),
                Some("all") => Self::Repeat(RepeatMode::All),
                Some("one") => Self::Repeat(RepeatMode::One),
                other => {
                    return Err(DaemonError::invalid_command(format!(
                        "repeat expects none|all|one, got {other:?}"
                    )))
                }
            },
            "multi" => Self::Multi(number(words.next(), "count")?),
            "sleep" => Self::Sleep {
                seconds: number(words.next(), "seconds")?,
            },
            "focus" => match words.next() {
                Some("gain") => Self::Focus(FocusChange::Gain),
                Some("loss") => Self::Focus(FocusChange::Loss),
                Some("transient") => Self::Focus(FocusChange::LossTransient),
                Some("duck") => Self::Focus(FocusChange::LossTransientCanDuck),
                other => {
                    return Err(DaemonError::invalid_command(format!(
                        "focus expects gain|loss|transient|duck, got {other:?}"
                    )))
                }
            },
            "click" => Self::Click,
            "unplug" => Self::Unplug,
            "plug" => Self::Plug,
            "status" => Self::Status,
            "save" => Self::Save,
            "quit" | "exit" => Self::Quit,
            other => return Err(DaemonError::invalid_command(format!("unknown command {other}"))),
        };

        if let Some(extra) = words.next() {
            return Err(DaemonError::invalid_command(format!(
                "unexpected argument {extra}"
            )));
        }
        Ok(command)
    }
}

impl LineCommand {
    /// Turn the command into an action, resolving track ids through
    /// `library`
    ///
    /// `now_ms` is the wall clock in epoch milliseconds, used for sleep
    /// deadlines.
    pub fn into_action(self, library: &dyn TrackRepository, now_ms: i64) -> Result<Action> {
        let command = match self {
            Self::Play => PlaybackCommand::Play,
            Self::Pause => PlaybackCommand::Pause,
            Self::Toggle => PlaybackCommand::TogglePlay,
            Self::Stop => PlaybackCommand::Stop,
            Self::Next => PlaybackCommand::Skip,
            Self::Prev => PlaybackCommand::SkipPrevious,
            Self::Seek(position_ms) => PlaybackCommand::SeekTo(position_ms),
            Self::Queue { start, ids } => PlaybackCommand::SetQueue {
                tracks: library.resolve_tracks_by_ids(&ids)?,
                index: start,
            },
            Self::NextUp(ids) => PlaybackCommand::QueueNext(library.resolve_tracks_by_ids(&ids)?),
            Self::Append(ids) => PlaybackCommand::QueueLast(library.resolve_tracks_by_ids(&ids)?),
            Self::Jump(index) => PlaybackCommand::ChangeSong(index),
            Self::Shuffle(enabled) => PlaybackCommand::SetShuffle(enabled),
            Self::Repeat(mode) => PlaybackCommand::SetRepeatMode(mode),
            Self::Multi(count) => PlaybackCommand::SetMultiRepeat(count),
            Self::Sleep { seconds } => {
                let delay_ms = i64::try_from(seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
                // Zero seconds gives a deadline of now, which cancels
                PlaybackCommand::SetSleepTimer(now_ms.saturating_add(delay_ms))
            }
            Self::Focus(change) => PlaybackCommand::FocusChanged(change),
            Self::Click => PlaybackCommand::MediaButtonClick,
            Self::Unplug => PlaybackCommand::HeadphonesUnplugged,
            Self::Plug => PlaybackCommand::HeadphonesPlugged,
            Self::Save => PlaybackCommand::SaveState,
            Self::Status => return Ok(Action::PrintStatus),
            Self::Quit => return Ok(Action::Quit),
        };
        Ok(Action::Send(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{Library, Track};

    fn library() -> Library {
        Library::from_tracks(
            (1..=3).map(|id| Track::new(TrackId::new(id), format!("Track {id}"), format!("/music/{id}.flac"))),
        )
    }

    #[test]
    fn parses_simple_verbs() {
        assert_eq!("play".parse::<LineCommand>().unwrap(), LineCommand::Play);
        assert_eq!("  NEXT ".parse::<LineCommand>().unwrap(), LineCommand::Next);
        assert_eq!("prev".parse::<LineCommand>().unwrap(), LineCommand::Prev);
        assert_eq!("quit".parse::<LineCommand>().unwrap(), LineCommand::Quit);
    }

    #[test]
    fn parses_arguments() {
        assert_eq!(
            "queue 1 3 1 2".parse::<LineCommand>().unwrap(),
            LineCommand::Queue {
                start: 1,
                ids: vec![TrackId::new(3), TrackId::new(1), TrackId::new(2)],
            }
        );
        assert_eq!("seek 45000".parse::<LineCommand>().unwrap(), LineCommand::Seek(45_000));
        assert_eq!(
            "repeat all".parse::<LineCommand>().unwrap(),
            LineCommand::Repeat(RepeatMode::All)
        );
        assert_eq!(
            "focus duck".parse::<LineCommand>().unwrap(),
            LineCommand::Focus(FocusChange::LossTransientCanDuck)
        );
        assert_eq!(
            "sleep 90".parse::<LineCommand>().unwrap(),
            LineCommand::Sleep { seconds: 90 }
        );
    }

    #[test]
    fn rejects_bad_lines() {
        for line in ["", "dance", "seek", "seek soon", "queue 0", "shuffle maybe", "play now"] {
            assert!(
                matches!(line.parse::<LineCommand>(), Err(DaemonError::InvalidCommand(_))),
                "accepted {line:?}"
            );
        }
    }

    #[test]
    fn queue_resolves_tracks_in_order() {
        let action = "queue 0 2 2 1"
            .parse::<LineCommand>()
            .unwrap()
            .into_action(&library(), 0)
            .unwrap();

        let Action::Send(PlaybackCommand::SetQueue { tracks, index }) = action else {
            panic!("unexpected action {action:?}");
        };
        let ids: Vec<i64> = tracks.iter().map(|t| t.id.get()).collect();
        assert_eq!(ids, vec![2, 2, 1]);
        assert_eq!(index, 0);
    }

    #[test]
    fn unknown_track_is_an_error() {
        let result = "append 42".parse::<LineCommand>().unwrap().into_action(&library(), 0);
        assert!(matches!(result, Err(DaemonError::Core(_))));
    }

    #[test]
    fn sleep_becomes_deadline() {
        let action = LineCommand::Sleep { seconds: 60 }
            .into_action(&library(), 1_000)
            .unwrap();
        assert!(matches!(action, Action::Send(PlaybackCommand::SetSleepTimer(61_000))));
    }
}
