//! Verification of counterparty state through a client's stored consensus states.

use ibc_classic_light_client::LightClientError;
use ibc_classic_types::{
    connection::ConnectionEnd,
    ensure,
    identifier::ClientId,
    path::{CommitmentPrefix, Path},
    Height,
};

use super::processed_height;
use crate::{
    engine::IbcCore,
    error::IbcError,
    host::HostInfo,
    store::{read_u64, Store},
};

/// Where and against what a counterparty proof is checked.
pub(crate) struct ProofTarget<'a> {
    /// The client tracking the counterparty
    pub client_id: &'a ClientId,
    /// The counterparty's commitment prefix
    pub prefix: &'a CommitmentPrefix,
    /// The counterparty height the proof was produced at
    pub height: Height,
    /// Time delay the consensus state must have been known for, in nanoseconds
    pub delay_period: u64,
}

impl<'a> ProofTarget<'a> {
    /// Target for handshake proofs, which are accepted without delay.
    pub(crate) const fn handshake(connection: &'a ConnectionEnd, height: Height) -> Self {
        Self {
            client_id: &connection.client_id,
            prefix: &connection.counterparty.prefix,
            height,
            delay_period: 0,
        }
    }

    /// Target for packet proofs, subject to the connection delay period.
    pub(crate) const fn packet(connection: &'a ConnectionEnd, height: Height) -> Self {
        Self {
            client_id: &connection.client_id,
            prefix: &connection.counterparty.prefix,
            height,
            delay_period: connection.delay_period,
        }
    }
}

impl IbcCore {
    /// Verifies that the counterparty stores `value` at `path`.
    pub(crate) fn verify_membership(
        &self,
        store: &dyn Store,
        host: &HostInfo,
        target: &ProofTarget<'_>,
        proof: &[u8],
        path: &Path,
        value: &[u8],
    ) -> Result<(), IbcError> {
        let (client_state, consensus_state) = self.proof_states(store, host, target)?;
        let client = self.light_client(store, target.client_id)?;
        client
            .verify_membership(
                &client_state,
                &consensus_state,
                proof,
                &target.prefix.apply(path),
                value,
            )
            .map_err(|source| verification_failed(target.client_id, path, source))?;

        tracing::debug!(%path, height = %target.height, "verified membership");
        Ok(())
    }

    /// Verifies that the counterparty stores nothing at `path`.
    pub(crate) fn verify_non_membership(
        &self,
        store: &dyn Store,
        host: &HostInfo,
        target: &ProofTarget<'_>,
        proof: &[u8],
        path: &Path,
    ) -> Result<(), IbcError> {
        let (client_state, consensus_state) = self.proof_states(store, host, target)?;
        let client = self.light_client(store, target.client_id)?;
        client
            .verify_non_membership(
                &client_state,
                &consensus_state,
                proof,
                &target.prefix.apply(path),
            )
            .map_err(|source| verification_failed(target.client_id, path, source))?;

        tracing::debug!(%path, height = %target.height, "verified non-membership");
        Ok(())
    }

    /// Returns the timestamp of the counterparty consensus state at `height`.
    pub(crate) fn consensus_timestamp(
        &self,
        store: &dyn Store,
        client_id: &ClientId,
        height: Height,
    ) -> Result<u64, IbcError> {
        let consensus_state = self.consensus_state(store, client_id, height)?;
        self.light_client(store, client_id)?
            .consensus_timestamp(&consensus_state)
            .map_err(|source| IbcError::LightClient {
                client_id: client_id.clone(),
                source,
            })
    }

    /// Loads the client and consensus state a proof is checked against, after checking the
    /// client is active and the delay period has passed.
    fn proof_states(
        &self,
        store: &dyn Store,
        host: &HostInfo,
        target: &ProofTarget<'_>,
    ) -> Result<(Vec<u8>, Vec<u8>), IbcError> {
        self.ensure_client_active(store, host, target.client_id)?;
        let client_state = self.client_state(store, target.client_id)?;
        let consensus_state = self.consensus_state(store, target.client_id, target.height)?;
        self.verify_delay_passed(store, host, target)?;
        Ok((client_state, consensus_state))
    }

    fn verify_delay_passed(
        &self,
        store: &dyn Store,
        host: &HostInfo,
        target: &ProofTarget<'_>,
    ) -> Result<(), IbcError> {
        if target.delay_period == 0 {
            return Ok(());
        }

        let time_key = Path::ProcessedTime(target.client_id.clone(), target.height);
        let processed_time = read_u64(store, &time_key.to_key())?
            .ok_or_else(|| IbcError::corrupted(&time_key, "missing processed time"))?;
        let processed_height = processed_height(store, target.client_id, target.height)?
            .ok_or_else(|| {
                IbcError::corrupted(
                    Path::ProcessedHeight(target.client_id.clone(), target.height),
                    "missing processed height",
                )
            })?;

        let valid_after_time = processed_time.saturating_add(target.delay_period);
        ensure!(
            host.timestamp >= valid_after_time,
            IbcError::DelayPeriodNotPassed {
                proof_height: target.height,
                reason: format!(
                    "host timestamp {} is before {valid_after_time}",
                    host.timestamp
                ),
            }
        );

        let valid_after_height =
            processed_height.add_blocks(self.config().block_delay(target.delay_period));
        ensure!(
            host.height >= valid_after_height,
            IbcError::DelayPeriodNotPassed {
                proof_height: target.height,
                reason: format!(
                    "host height {} is before {valid_after_height}",
                    host.height
                ),
            }
        );

        Ok(())
    }
}

fn verification_failed(client_id: &ClientId, path: &Path, source: LightClientError) -> IbcError {
    if source == LightClientError::ClientFrozen {
        tracing::error!(%client_id, %path, "proof rejected by frozen client");
        return IbcError::ClientFrozen {
            client_id: client_id.clone(),
        };
    }
    tracing::debug!(%client_id, %path, error = %source, "proof verification failed");
    IbcError::VerificationFailed {
        path: path.to_string(),
        source,
    }
}
