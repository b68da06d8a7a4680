//! Interactive commands for the `narrator read` session.

use crate::core::playback::{PlaybackController, PlaybackResult};

/// One line typed on stdin during narration.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Pause,
    Resume,
    Next,
    Prev,
    Jump(usize),
    Rate(f32),
    Voice(String),
    Restart,
    Status,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ParseCommandError(String);

impl std::str::FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            return Err(ParseCommandError("empty command".to_string()));
        };
        let argument = parts.collect::<Vec<_>>().join(" ");

        let command = match verb.to_lowercase().as_str() {
            "pause" | "p" => Self::Pause,
            "resume" | "r" | "play" => Self::Resume,
            "next" | "n" => Self::Next,
            "prev" | "previous" => Self::Prev,
            "restart" => Self::Restart,
            "status" | "s" => Self::Status,
            "quit" | "q" | "exit" => Self::Quit,
            "jump" | "j" => Self::Jump(argument.parse().map_err(|_| {
                ParseCommandError(format!("'jump' needs a paragraph number, got '{argument}'"))
            })?),
            "rate" => Self::Rate(argument.parse().map_err(|_| {
                ParseCommandError(format!("'rate' needs a number, got '{argument}'"))
            })?),
            "voice" if !argument.is_empty() => Self::Voice(argument),
            "voice" => return Err(ParseCommandError("'voice' needs a voice name".to_string())),
            other => {
                return Err(ParseCommandError(format!(
                    "Unknown command '{other}'. Try: pause, resume, next, prev, jump N, rate R, voice V, restart, status, quit"
                )));
            }
        };
        Ok(command)
    }
}

/// Runs a navigation or settings command against `controller`.
///
/// `Status` and `Quit` are handled by the caller and are no-ops here.
pub async fn apply(controller: &PlaybackController, command: &Command) -> PlaybackResult<()> {
    match command {
        Command::Pause => controller.pause().await,
        Command::Resume => controller.resume().await?,
        Command::Next => controller.next().await?,
        Command::Prev => controller.prev().await?,
        Command::Jump(n) => controller.jump_to(*n).await?,
        Command::Rate(rate) => controller.set_rate(*rate).await?,
        Command::Voice(voice) => controller.set_voice(voice).await?,
        Command::Restart => controller.restart().await?,
        Command::Status | Command::Quit => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!("pause".parse::<Command>().unwrap(), Command::Pause);
        assert_eq!(" NEXT ".parse::<Command>().unwrap(), Command::Next);
        assert_eq!("q".parse::<Command>().unwrap(), Command::Quit);
    }

    #[test]
    fn test_parse_commands_with_arguments() {
        assert_eq!("jump 4".parse::<Command>().unwrap(), Command::Jump(4));
        assert_eq!("rate 1.25".parse::<Command>().unwrap(), Command::Rate(1.25));
        assert_eq!(
            "voice en-GB-SoniaNeural".parse::<Command>().unwrap(),
            Command::Voice("en-GB-SoniaNeural".to_string())
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!("".parse::<Command>().is_err());
        assert!("jump".parse::<Command>().is_err());
        assert!("jump two".parse::<Command>().is_err());
        assert!("voice".parse::<Command>().is_err());
        assert!("dance".parse::<Command>().unwrap_err().to_string().contains("dance"));
    }
}
