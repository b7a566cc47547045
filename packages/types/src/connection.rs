//! Connection ends and connection version negotiation.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    channel::Order,
    error::TypesError,
    identifier::{ClientId, ConnectionId},
    path::CommitmentPrefix,
};

/// Identifier of the only connection version defined by the protocol.
pub const DEFAULT_VERSION_IDENTIFIER: &str = "1";

/// Handshake state of a connection end.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    /// The handshake was started on this chain
    Init,
    /// The counterparty's init was verified and this end replied
    TryOpen,
    /// The handshake completed
    Open,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "INIT",
            Self::TryOpen => "TRYOPEN",
            Self::Open => "OPEN",
        };
        f.write_str(s)
    }
}

/// The counterparty side of a connection end.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Counterparty {
    /// The client tracking this chain on the counterparty
    pub client_id: ClientId,
    /// The counterparty connection identifier, unknown until the counterparty replies
    pub connection_id: Option<ConnectionId>,
    /// The counterparty's commitment prefix
    pub prefix: CommitmentPrefix,
}

/// A connection version: an identifier plus the set of features it enables.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Version {
    /// The version identifier
    pub identifier: String,
    /// The features supported under this version
    pub features: Vec<String>,
}

impl Version {
    /// Creates a new version.
    #[must_use]
    pub fn new(identifier: impl Into<String>, features: Vec<String>) -> Self {
        Self {
            identifier: identifier.into(),
            features,
        }
    }

    /// Returns the feature string enabling channels of the given ordering.
    #[must_use]
    pub fn ordering_feature(order: Order) -> String {
        format!("ORDER_{order}")
    }

    /// Validates that the version has an identifier and non-blank features.
    ///
    /// # Errors
    /// Returns an error if the identifier is blank, or a feature is blank.
    pub fn validate(&self) -> Result<(), TypesError> {
        if self.identifier.trim().is_empty() {
            return Err(TypesError::InvalidVersion {
                reason: "version identifier cannot be blank".into(),
            });
        }
        if self.features.iter().any(|f| f.trim().is_empty()) {
            return Err(TypesError::InvalidVersion {
                reason: format!("version {} contains a blank feature", self.identifier),
            });
        }
        Ok(())
    }

    /// Returns true if `feature` is enabled by this version.
    #[must_use]
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }

    /// Returns true if channels with `order` may be opened over this version.
    #[must_use]
    pub fn supports_order(&self, order: Order) -> bool {
        self.has_feature(&Self::ordering_feature(order))
    }

    /// Verifies that `proposed` is a valid selection from this supported version: same
    /// identifier and a feature set that is a subset of this one.
    ///
    /// # Errors
    /// Returns an error if the identifiers differ, or `proposed` enables an unsupported
    /// feature.
    pub fn verify_proposed(&self, proposed: &Self) -> Result<(), TypesError> {
        if self.identifier != proposed.identifier {
            return Err(TypesError::InvalidVersion {
                reason: format!(
                    "proposed version identifier {} does not equal supported identifier {}",
                    proposed.identifier, self.identifier
                ),
            });
        }
        if let Some(feature) = proposed.features.iter().find(|f| !self.has_feature(f)) {
            return Err(TypesError::InvalidVersion {
                reason: format!(
                    "proposed feature {feature} is not supported by version {}",
                    self.identifier
                ),
            });
        }
        Ok(())
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::new(
            DEFAULT_VERSION_IDENTIFIER,
            vec![
                Self::ordering_feature(Order::Ordered),
                Self::ordering_feature(Order::Unordered),
            ],
        )
    }
}

/// Returns the versions supported by default, in preference order.
#[must_use]
pub fn compatible_versions() -> Vec<Version> {
    vec![Version::default()]
}

/// Returns true if `version` is a valid selection from one of the `supported` versions.
#[must_use]
pub fn is_supported_version(supported: &[Version], version: &Version) -> bool {
    supported
        .iter()
        .find(|s| s.identifier == version.identifier)
        .is_some_and(|s| s.verify_proposed(version).is_ok())
}

/// Picks a single version from the intersection of `supported` and `proposed`.
///
/// The local `supported` order is the preference order: the first supported version whose
/// identifier is also proposed and whose feature sets overlap wins. The chosen version keeps
/// only the intersecting features, listed in the local order. Both ends of a handshake run
/// the same algorithm so their choices agree.
///
/// # Errors
/// Returns an error if no supported version has a proposed counterpart with overlapping
/// features.
pub fn pick_version(supported: &[Version], proposed: &[Version]) -> Result<Version, TypesError> {
    for local in supported {
        let Some(remote) = proposed.iter().find(|p| p.identifier == local.identifier) else {
            continue;
        };
        let features: Vec<String> = local
            .features
            .iter()
            .filter(|f| remote.has_feature(f))
            .cloned()
            .collect();
        if !features.is_empty() {
            return Ok(Version::new(local.identifier.clone(), features));
        }
    }

    Err(TypesError::NoCompatibleVersion {
        supported: supported.iter().map(|v| v.identifier.clone()).collect(),
        proposed: proposed.iter().map(|v| v.identifier.clone()).collect(),
    })
}

/// A connection end as stored under `connections/{connection_id}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ConnectionEnd {
    /// Handshake state
    pub state: State,
    /// The local client tracking the counterparty
    pub client_id: ClientId,
    /// The counterparty end
    pub counterparty: Counterparty,
    /// Proposed versions while in INIT, the single negotiated version afterwards
    pub versions: Vec<Version>,
    /// Minimum time, in nanoseconds, a consensus state must have been known before proofs
    /// against it are accepted for packet verification
    pub delay_period: u64,
}

impl ConnectionEnd {
    /// Returns true if the connection is OPEN.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == State::Open
    }

    /// Returns the negotiated version once the handshake has fixed one.
    #[must_use]
    pub fn negotiated_version(&self) -> Option<&Version> {
        match self.versions.as_slice() {
            [version] if self.state != State::Init => Some(version),
            _ => None,
        }
    }

    /// Returns the canonical bytes that are stored and proven for this end.
    ///
    /// # Errors
    /// Returns an error if the record cannot be serialized.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
