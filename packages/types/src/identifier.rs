//! Validated ICS-24 identifiers.
//!
//! Identifiers are ASCII strings bounded in length and restricted to the charset
//! `[a-zA-Z0-9._+-#[]<>]`. Each kind of identifier carries its own length bounds.

use core::{fmt, ops::Deref, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::IdentifierError;

/// Prefix of generated connection identifiers.
pub const CONNECTION_PREFIX: &str = "connection";
/// Prefix of generated channel identifiers.
pub const CHANNEL_PREFIX: &str = "channel";

const fn is_valid_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-' | '#' | '[' | ']' | '<' | '>')
}

/// Validates `id` against the ICS-24 charset and the `[min, max]` length bounds.
///
/// # Errors
/// Returns an error if the identifier is too short, too long or contains a character outside
/// of the allowed charset.
pub fn validate_identifier(id: &str, min: usize, max: usize) -> Result<(), IdentifierError> {
    if id.len() < min {
        return Err(IdentifierError::TooShort {
            id: id.to_string(),
            min,
        });
    }
    if id.len() > max {
        return Err(IdentifierError::TooLong {
            id: id.to_string(),
            max,
        });
    }
    if let Some(ch) = id.chars().find(|c| !is_valid_char(*c)) {
        return Err(IdentifierError::InvalidCharacter {
            id: id.to_string(),
            ch,
        });
    }
    Ok(())
}

/// Splits a generated identifier `{prefix}-{sequence}` into its parts.
///
/// # Errors
/// Returns an error if the identifier has no numeric suffix.
pub fn parse_sequence_suffix(id: &str) -> Result<(&str, u64), IdentifierError> {
    let (prefix, sequence) = id
        .rsplit_once('-')
        .ok_or_else(|| IdentifierError::InvalidFormat(id.to_string()))?;
    let sequence = sequence
        .parse()
        .map_err(|_| IdentifierError::InvalidFormat(id.to_string()))?;
    if prefix.is_empty() {
        return Err(IdentifierError::InvalidFormat(id.to_string()));
    }
    Ok((prefix, sequence))
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $min:expr, $max:expr) => {
        $(#[$meta])*
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Minimum length in bytes (inclusive).
            pub const MIN_LEN: usize = $min;
            /// Maximum length in bytes (inclusive).
            pub const MAX_LEN: usize = $max;

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdentifierError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                validate_identifier(s, Self::MIN_LEN, Self::MAX_LEN)?;
                Ok(Self(s.to_string()))
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdentifierError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                validate_identifier(&s, Self::MIN_LEN, Self::MAX_LEN)?;
                Ok(Self(s))
            }
        }

        impl TryFrom<&str> for $name {
            type Error = IdentifierError;

            fn try_from(s: &str) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Deref for $name {
            type Target = str;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(
    /// Identifier of a light client instance, `{client_type}-{sequence}`.
    ClientId, 9, 64
);
identifier!(
    /// Identifier of a connection end, `connection-{sequence}`.
    ConnectionId, 10, 64
);
identifier!(
    /// Identifier of a channel end, `channel-{sequence}`.
    ChannelId, 8, 64
);
identifier!(
    /// Identifier of a port bound by an application module.
    PortId, 2, 128
);

impl ClientId {
    /// Builds the identifier of the `sequence`-th client of type `client_type`.
    ///
    /// # Errors
    /// Returns an error if the resulting identifier is not valid.
    pub fn new(client_type: &str, sequence: u64) -> Result<Self, IdentifierError> {
        format!("{client_type}-{sequence}").parse()
    }

    /// Returns the client type encoded in the identifier.
    ///
    /// # Errors
    /// Returns an error if the identifier was not generated as `{client_type}-{sequence}`.
    pub fn client_type(&self) -> Result<&str, IdentifierError> {
        parse_sequence_suffix(&self.0).map(|(client_type, _)| client_type)
    }
}

impl ConnectionId {
    /// Builds the identifier of the `sequence`-th connection.
    #[must_use]
    pub fn new(sequence: u64) -> Self {
        Self(format!("{CONNECTION_PREFIX}-{sequence}"))
    }
}

impl ChannelId {
    /// Builds the identifier of the `sequence`-th channel.
    #[must_use]
    pub fn new(sequence: u64) -> Self {
        Self(format!("{CHANNEL_PREFIX}-{sequence}"))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::tendermint("07-tendermint-0")]
    #[case::attested("10-attested-42")]
    #[case::symbols("a.b_c+d#e[f]<g>")]
    fn accepts_valid_client_ids(#[case] id: &str) {
        assert!(id.parse::<ClientId>().is_ok());
    }

    #[rstest]
    #[case::too_short("short")]
    #[case::bad_char("07-tendermint/0")]
    #[case::whitespace("07 tendermint 0")]
    #[case::non_ascii("07-tendermïnt-0")]
    fn rejects_invalid_client_ids(#[case] id: &str) {
        assert!(id.parse::<ClientId>().is_err());
    }

    #[test]
    fn generated_ids_round_trip() {
        let client_id = ClientId::new("07-tendermint", 0).unwrap();
        assert_eq!(client_id.as_str(), "07-tendermint-0");
        assert_eq!(client_id.client_type().unwrap(), "07-tendermint");

        assert_eq!(ConnectionId::new(3).as_str(), "connection-3");
        assert_eq!(ChannelId::new(7).as_str(), "channel-7");
        assert!(ChannelId::new(7).as_str().parse::<ChannelId>().is_ok());
    }

    #[test]
    fn port_length_bounds() {
        assert!(matches!(
            "a".parse::<PortId>(),
            Err(IdentifierError::TooShort { min: 2, .. })
        ));
        assert!(matches!(
            "p".repeat(129).parse::<PortId>(),
            Err(IdentifierError::TooLong { max: 128, .. })
        ));
        assert!("transfer".parse::<PortId>().is_ok());
    }

    #[test]
    fn deserialization_validates() {
        let ok: Result<ChannelId, _> = serde_json::from_str("\"channel-0\"");
        assert!(ok.is_ok());
        let bad: Result<ChannelId, _> = serde_json::from_str("\"ch\"");
        assert!(bad.is_err());
    }
}
