//! Parsing of client command lines.

use thiserror::Error;

/// A command sent by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `subscribe <propertyName>`
    Subscribe { property: String },

    /// `unsubscribe <propertyName>`
    Unsubscribe { property: String },

    /// `help`
    Help,

    /// `disconnect`
    Disconnect,

    /// `trigger-input <inputName>`
    TriggerInput { input: String },
}

impl Command {
    pub const SUBSCRIBE: &'static str = "subscribe";
    pub const UNSUBSCRIBE: &'static str = "unsubscribe";
    pub const HELP: &'static str = "help";
    pub const DISCONNECT: &'static str = "disconnect";
    pub const TRIGGER_INPUT: &'static str = "trigger-input";

    /// Parses one input line.
    ///
    /// Tokens are separated by whitespace; empty tokens are discarded.
    /// Command names match case-sensitively. Returns `Ok(None)` for a line
    /// without tokens.
    pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
        let mut tokens = line.split_whitespace();
        let Some(name) = tokens.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = tokens.collect();

        let command = match name {
            Self::SUBSCRIBE => Command::Subscribe {
                property: single_argument(Self::SUBSCRIBE, &args)?,
            },
            Self::UNSUBSCRIBE => Command::Unsubscribe {
                property: single_argument(Self::UNSUBSCRIBE, &args)?,
            },
            Self::TRIGGER_INPUT => Command::TriggerInput {
                input: single_argument(Self::TRIGGER_INPUT, &args)?,
            },
            Self::HELP => {
                no_arguments(Self::HELP, &args)?;
                Command::Help
            }
            Self::DISCONNECT => {
                no_arguments(Self::DISCONNECT, &args)?;
                Command::Disconnect
            }
            other => {
                return Err(CommandError::UnknownCommand {
                    command: other.to_string(),
                })
            }
        };

        Ok(Some(command))
    }

    /// Returns the command name as written on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Subscribe { .. } => Self::SUBSCRIBE,
            Self::Unsubscribe { .. } => Self::UNSUBSCRIBE,
            Self::Help => Self::HELP,
            Self::Disconnect => Self::DISCONNECT,
            Self::TriggerInput { .. } => Self::TRIGGER_INPUT,
        }
    }
}

fn single_argument(command: &'static str, args: &[&str]) -> Result<String, CommandError> {
    match args {
        [arg] => Ok((*arg).to_string()),
        _ => Err(CommandError::WrongArgumentCount {
            command,
            got: args.len(),
        }),
    }
}

fn no_arguments(command: &'static str, args: &[&str]) -> Result<(), CommandError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CommandError::WrongArgumentCount {
            command,
            got: args.len(),
        })
    }
}

/// Malformed command lines. The `Display` text goes to the client after `ERR: `.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Received unknown command")]
    UnknownCommand { command: String },

    #[error("Invalid '{command}' command, wrong number of arguments")]
    WrongArgumentCount { command: &'static str, got: usize },
}
