//! This module defines [`TypesError`] and [`IdentifierError`].

/// Errors raised while validating IBC identifiers.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// The identifier is shorter than the minimum length
    #[error("identifier `{id}` is too short, expected at least {min} characters")]
    TooShort {
        /// The rejected identifier
        id: String,
        /// Minimum length
        min: usize,
    },

    /// The identifier is longer than the maximum length
    #[error("identifier `{id}` is too long, expected at most {max} characters")]
    TooLong {
        /// The rejected identifier
        id: String,
        /// Maximum length
        max: usize,
    },

    /// The identifier contains a character outside of the allowed charset
    #[error("identifier `{id}` contains invalid character `{ch}`")]
    InvalidCharacter {
        /// The rejected identifier
        id: String,
        /// The offending character
        ch: char,
    },

    /// The identifier does not follow the `{prefix}-{sequence}` format
    #[error("identifier `{0}` is not of the form `{{prefix}}-{{sequence}}`")]
    InvalidFormat(String),
}

/// Errors raised by the shared IBC record types.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TypesError {
    /// Invalid identifier
    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    /// A height string could not be parsed
    #[error("invalid height `{0}`, expected `{{revision_number}}-{{revision_height}}`")]
    InvalidHeight(String),

    /// A version failed validation
    #[error("invalid version: {reason}")]
    InvalidVersion {
        /// Reason for error
        reason: String,
    },

    /// No version in the proposed set is compatible with the supported set
    #[error("no compatible version found between supported {supported:?} and proposed {proposed:?}")]
    NoCompatibleVersion {
        /// Locally supported version identifiers
        supported: Vec<String>,
        /// Counterparty proposed version identifiers
        proposed: Vec<String>,
    },

    /// A channel or connection state string could not be parsed
    #[error("unknown state `{0}`")]
    UnknownState(String),

    /// The acknowledgement envelope is malformed
    #[error("invalid acknowledgement: {reason}")]
    InvalidAcknowledgement {
        /// Reason for error
        reason: String,
    },

    /// The packet is structurally invalid
    #[error("invalid packet: {reason}")]
    InvalidPacket {
        /// Reason for error
        reason: String,
    },
}
