//! Client-side command line parsing
//!
//! Turns a line typed at the client into the frame to send. Lines starting
//! with `/` are commands; anything else is broadcast.

use crate::error::InputError;
use crate::message::Frame;
use crate::types::Username;

/// Most characters allowed in one typed message
pub const MAX_TEXT_CHARS: usize = 90_000;

/// Parse one typed line; `Ok(None)` means there is nothing to send
pub fn parse_line(line: &str) -> Result<Option<Frame>, InputError> {
    if line.is_empty() {
        return Ok(None);
    }

    if !line.starts_with('/') {
        if line.chars().count() > MAX_TEXT_CHARS {
            return Err(InputError::TooLong(MAX_TEXT_CHARS));
        }
        return Ok(Some(Frame::Broadcast {
            text: line.to_string(),
        }));
    }

    if let Some(rest) = line.strip_prefix("/tell ") {
        let (recipient, text) = rest.split_once(' ').ok_or(InputError::TooFewArguments)?;
        return Ok(Some(Frame::Direct {
            recipient: recipient.to_string(),
            text: text.to_string(),
        }));
    }

    if let Some(name) = line.strip_prefix("/name ") {
        if !Username::is_valid(name) {
            return Err(InputError::InvalidName);
        }
        return Ok(Some(Frame::Rename {
            name: name.to_string(),
        }));
    }

    match line {
        "/users" => Ok(Some(Frame::ListUsers)),
        "/help" => Ok(Some(Frame::Help)),
        _ => Err(InputError::UnknownCommand),
    }
}
