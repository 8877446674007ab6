//! Message protocol definitions
//!
//! `Frame` is everything a client can ask of the server. `Notice` is
//! everything the server says back: welcome text, chat lines, system
//! notices, listings, help and rejections all share one untagged shape
//! on the wire.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Encoder;

use crate::codec::{NoticeCodec, TEXT_HEADER_LEN};
use crate::error::AppError;
use crate::types::{Username, MAX_NAME_LEN, MIN_NAME_LEN};

/// Static command reference sent in reply to a help frame
pub const HELP_TEXT: &str = "

HELP
To use a command, start your message with a slash (/).
To broadcast your message to everyone, do not use one.

Commands:
Send a message to a specific user:
/tell [username] [message]

Change your username:
/name [new username]

Get a list of online users:
/users

Display this help dialogue:
/help

";

/// Client → Server frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Send text to every active connection (tag `b`)
    Broadcast { text: String },
    /// Send text to one named user (tag `d`)
    Direct { recipient: String, text: String },
    /// Set or change the display name (tag `n`); also the handshake
    Rename { name: String },
    /// Ask for the online-user listing (tag `u`)
    ListUsers,
    /// Ask for the command reference (tag `h`)
    Help,
}

impl Frame {
    /// Wire tag for this frame type
    pub fn tag(&self) -> u8 {
        match self {
            Frame::Broadcast { .. } => b'b',
            Frame::Direct { .. } => b'd',
            Frame::Rename { .. } => b'n',
            Frame::ListUsers => b'u',
            Frame::Help => b'h',
        }
    }
}

/// Server → Client display text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice(pub String);

impl Notice {
    pub fn welcome() -> Self {
        Self("Welcome to the server!".to_string())
    }

    pub fn joined(name: &Username) -> Self {
        Self(format!("{} connected to the server", name))
    }

    pub fn left(name: &Username) -> Self {
        Self(format!("{} disconnected from the server.", name))
    }

    pub fn chat(sender: &Username, text: &str) -> Self {
        Self(format!("{}: {}", sender, text))
    }

    pub fn direct(sender: &Username, recipient: &Username, text: &str) -> Self {
        Self(format!("{} > {}: {}", sender, recipient, text))
    }

    pub fn renamed(old: &Username, new: &Username) -> Self {
        Self(format!("{} renamed themselves to {}", old, new))
    }

    /// Listing header followed by one name per line
    pub fn user_list<'a>(names: impl IntoIterator<Item = &'a Username>) -> Self {
        let mut text = String::from("Connected Users:\n");
        for name in names {
            text.push_str(name.as_str());
            text.push('\n');
        }
        Self(text)
    }

    pub fn help() -> Self {
        Self(HELP_TEXT.to_string())
    }

    /// Rejection sent before closing a connection that failed its handshake
    pub fn rejection(err: AppError) -> Self {
        let Notice(text) = err.into();
        Self(format!("{} Reconnect with a different name.", text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Encode into wire bytes once, ready to be cloned to many recipients
    pub fn encode(self) -> Result<Bytes, AppError> {
        let mut buf = BytesMut::with_capacity(TEXT_HEADER_LEN + self.0.len());
        NoticeCodec.encode(self, &mut buf)?;
        Ok(buf.freeze())
    }
}

/// Convert AppError to a Notice for the offending client
impl From<AppError> for Notice {
    fn from(err: AppError) -> Self {
        let text = match &err {
            AppError::NameTaken(_) => "That name has already been taken.".to_string(),
            AppError::NameInvalid(_) => format!(
                "Invalid name. Names must be between {} and {} characters long and contain no spaces.",
                MIN_NAME_LEN, MAX_NAME_LEN
            ),
            AppError::RecipientNotFound(name) => {
                format!("There is no user with the name {}", name)
            }
            AppError::SelfMessage => {
                "You cannot send a private message to yourself.".to_string()
            }
            AppError::HandshakeExpected => {
                "The first message must set your name.".to_string()
            }
            AppError::MessageTooLong => "Your message was too long to send.".to_string(),
            AppError::Protocol(_) => {
                "Your message did not conform to the protocol.".to_string()
            }
            // Fatal errors are not typically converted (connection closes)
            _ => "Internal error".to_string(),
        };
        Notice(text)
    }
}
