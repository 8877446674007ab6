//! Error types for the chat server
//!
//! Defines application-level errors, wire protocol violations,
//! outbound channel errors and client input errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::types::ClientId;

/// Application-level errors
///
/// Covers fatal errors (startup failure, actor breakdown), per-connection
/// errors (the connection is closed) and business errors (a notice is sent
/// to the offending client and nothing else happens).
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (fatal for the connection it occurred on)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire protocol violation
    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// Channel send error (internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Bad command line usage (fatal at startup)
    #[error("Usage error: {0}")]
    Usage(String),

    /// Listening socket could not be set up (fatal at startup)
    #[error("Error binding socket on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Username does not satisfy the length / space rules
    #[error("Invalid name: {0:?}")]
    NameInvalid(String),

    /// Username already registered by another connection
    #[error("Name already taken: {0}")]
    NameTaken(String),

    /// Direct message to a user that is not online
    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),

    /// Direct message addressed to the sender
    #[error("Cannot message yourself")]
    SelfMessage,

    /// First frame after accept was not a rename
    #[error("Handshake must start with a rename frame")]
    HandshakeExpected,

    /// Composed message does not fit in a 5-digit length header
    #[error("Message too long")]
    MessageTooLong,

    /// Connection is not (or no longer) in the registry
    #[error("Unknown client: {0}")]
    UnknownClient(ClientId),

    /// Broken internal invariant (fatal for the whole server)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Wire protocol violations
///
/// `UnknownTag` is recoverable: the decoder skips the byte and the
/// connection stays open. Every other variant loses framing sync.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unrecognized message type {0:?}")]
    UnknownTag(char),

    #[error("non-numeric length header {0:?}")]
    NonNumericHeader(String),

    #[error("payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("connection closed with {0} bytes of an incomplete frame buffered")]
    Truncated(usize),

    #[error("payload of {len} bytes does not fit a {digits}-digit header")]
    PayloadTooLong { len: usize, digits: usize },
}

/// Message send errors
///
/// Occurs when attempting to queue bytes for a connection's writer task.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}

/// Errors in a line typed at the client, shown locally and never sent
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Too few arguments were provided.")]
    TooFewArguments,

    #[error("Invalid name. Names must be between 3 and 16 characters long and contain no spaces.")]
    InvalidName,

    #[error("Unrecognised command. See /help for a list of valid commands.")]
    UnknownCommand,

    #[error("Your message was too long to send. The limit is {0} characters")]
    TooLong(usize),
}
