//! Client keeper scenarios: creation, updates, misbehaviour and expiry.

mod common;

use attested_light_client::{
    consensus_state::ConsensusState,
    test_utils::{misbehaviour_message, signed_header},
};
use common::{height, Chain, Pair};
use ibc_classic_core::{
    client::{MsgCreateClient, MsgUpdateClient, UpdateOutcome},
    IbcError, IbcEvent,
};
use ibc_classic_light_client::{LightClientError, Status};
use ibc_classic_types::path::Path;

#[test]
fn create_client_assigns_sequential_ids() {
    let mut pair = Pair::with_client_type("07-tendermint");
    assert_eq!(pair.client_a.as_str(), "07-tendermint-0");
    assert_eq!(pair.client_b.as_str(), "07-tendermint-0");

    let second = pair.a.create_client(&mut pair.b, "07-tendermint");
    assert_eq!(second.as_str(), "07-tendermint-1");
    let attested = pair.a.create_client(&mut pair.b, "10-attested");
    assert_eq!(attested.as_str(), "10-attested-2");

    let status = pair
        .a
        .core
        .client_status(&pair.a.store, &pair.a.host, &pair.client_a)
        .unwrap();
    assert_eq!(status, Status::Active);
}

#[test]
fn create_client_rejects_unknown_type() {
    let mut chain = Chain::new("chain-a");
    let err = chain
        .core
        .create_client(
            &mut chain.store,
            &chain.host,
            MsgCreateClient {
                client_type: "06-solomachine".into(),
                client_state: vec![],
                consensus_state: vec![],
            },
        )
        .unwrap_err();
    assert_eq!(err, IbcError::UnsupportedClientType("06-solomachine".into()));
}

#[test]
fn create_client_rejects_invalid_state_atomically() {
    let mut chain = Chain::new("chain-a");
    let before = chain.store.len();
    let err = chain
        .core
        .create_client(
            &mut chain.store,
            &chain.host,
            MsgCreateClient {
                client_type: "10-attested".into(),
                client_state: b"not a client state".to_vec(),
                consensus_state: vec![],
            },
        )
        .unwrap_err();
    assert!(matches!(err, IbcError::LightClient { .. }));
    assert_eq!(chain.store.len(), before);
}

#[test]
fn update_client_stores_consensus_state() {
    let mut pair = Pair::new();
    let proof_height = pair.b.commit_block();
    let response = pair
        .a
        .update_client(&pair.client_a, pair.b.header(proof_height))
        .unwrap();

    assert_eq!(response.value, UpdateOutcome::Updated(vec![proof_height]));
    assert_eq!(
        response.events,
        vec![IbcEvent::UpdateClient {
            client_id: pair.client_a.clone(),
            consensus_heights: vec![proof_height],
        }]
    );
    assert_eq!(
        pair.a
            .core
            .client_latest_height(&pair.a.store, &pair.client_a)
            .unwrap(),
        proof_height
    );
    let stored = pair
        .a
        .core
        .consensus_state(&pair.a.store, &pair.client_a, proof_height)
        .unwrap();
    assert_eq!(
        ConsensusState::decode(&stored).unwrap(),
        pair.b.consensus_state_at(proof_height)
    );
    assert!(common::stored(
        &pair.a,
        &Path::ProcessedTime(pair.client_a.clone(), proof_height)
    ));
}

#[test]
fn update_client_replay_is_a_no_op() {
    let mut pair = Pair::new();
    let proof_height = pair.b.commit_block();
    let header = pair.b.header(proof_height);
    pair.a.update_client(&pair.client_a, header.clone()).unwrap();

    let replay = pair.a.update_client(&pair.client_a, header).unwrap();
    assert_eq!(replay.value, UpdateOutcome::Updated(vec![]));
}

#[test]
fn update_client_rejects_missing_quorum() {
    let mut pair = Pair::new();
    let proof_height = pair.b.commit_block();
    let header = signed_header(
        &pair.b.chain_id,
        &pair.b.keys[..1],
        proof_height,
        pair.b.consensus_state_at(proof_height),
    );
    let before = pair.a.store.len();

    let err = pair.a.update_client(&pair.client_a, header).unwrap_err();
    assert!(matches!(err, IbcError::LightClient { .. }));
    assert_eq!(pair.a.store.len(), before);
}

#[test]
fn conflicting_header_freezes_client() {
    let mut pair = Pair::new();
    let proof_height = pair.b.commit_block();
    pair.a
        .update_client(&pair.client_a, pair.b.header(proof_height))
        .unwrap();

    let forged = ConsensusState {
        root: [0xAB; 32],
        ..pair.b.consensus_state_at(proof_height)
    };
    let conflicting = signed_header(&pair.b.chain_id, &pair.b.keys, proof_height, forged);
    let response = pair.a.update_client(&pair.client_a, conflicting).unwrap();

    assert_eq!(response.value, UpdateOutcome::Frozen);
    assert_eq!(
        response.events,
        vec![IbcEvent::ClientMisbehaviour {
            client_id: pair.client_a.clone()
        }]
    );
    let status = pair
        .a
        .core
        .client_status(&pair.a.store, &pair.a.host, &pair.client_a)
        .unwrap();
    assert_eq!(status, Status::Frozen);

    let next = pair.b.commit_block();
    let err = pair
        .a
        .update_client(&pair.client_a, pair.b.header(next))
        .unwrap_err();
    assert!(err.is_client_frozen());
}

#[test]
fn frozen_client_halts_connections() {
    let mut pair = Pair::new();
    let misbehaviour_height = pair.b.commit_block();
    let header_1 = pair.b.header(misbehaviour_height);
    let header_2 = signed_header(
        &pair.b.chain_id,
        &pair.b.keys,
        misbehaviour_height,
        ConsensusState {
            root: [0xCD; 32],
            ..pair.b.consensus_state_at(misbehaviour_height)
        },
    );
    pair.a
        .core
        .submit_misbehaviour(
            &mut pair.a.store,
            &pair.a.host,
            MsgUpdateClient {
                client_id: pair.client_a.clone(),
                client_message: misbehaviour_message(header_1, header_2),
            },
        )
        .unwrap();

    let err = pair
        .a
        .conn_open_init(&pair.client_a, &pair.client_b, 0)
        .unwrap_err();
    assert_eq!(
        err,
        IbcError::ClientFrozen {
            client_id: pair.client_a.clone()
        }
    );
    assert!(err.is_client_frozen());
}

#[test]
fn submit_misbehaviour_rejects_plain_header() {
    let mut pair = Pair::new();
    let proof_height = pair.b.commit_block();
    let err = pair
        .a
        .core
        .submit_misbehaviour(
            &mut pair.a.store,
            &pair.a.host,
            MsgUpdateClient {
                client_id: pair.client_a.clone(),
                client_message: attested_light_client::test_utils::header_message(
                    pair.b.header(proof_height),
                ),
            },
        )
        .unwrap_err();

    assert!(matches!(
        err,
        IbcError::LightClient {
            source: LightClientError::InvalidMisbehaviour { .. },
            ..
        }
    ));
    // the update the header would have caused is rolled back
    assert!(pair
        .a
        .core
        .consensus_state(&pair.a.store, &pair.client_a, proof_height)
        .is_err());
}

#[test]
fn expired_client_rejects_updates() {
    let mut pair = Pair::new();
    pair.a.skip_blocks(86_400 / 5 + 1);

    let status = pair
        .a
        .core
        .client_status(&pair.a.store, &pair.a.host, &pair.client_a)
        .unwrap();
    assert_eq!(status, Status::Expired);

    let proof_height = pair.b.commit_block();
    let err = pair
        .a
        .update_client(&pair.client_a, pair.b.header(proof_height))
        .unwrap_err();
    assert!(matches!(
        err,
        IbcError::ClientNotActive {
            status: Status::Expired,
            ..
        }
    ));
}

#[test]
fn unknown_client_is_structural() {
    let chain = Chain::new("chain-a");
    let client_id = "10-attested-7".parse().unwrap();
    let err = chain
        .core
        .client_status(&chain.store, &chain.host, &client_id)
        .unwrap_err();
    assert_eq!(err, IbcError::ClientNotFound(client_id));
    assert_eq!(err.kind(), ibc_classic_core::ErrorKind::Structural);
}

#[test]
fn latest_height_tracks_updates() {
    let mut pair = Pair::new();
    for _ in 0..3 {
        pair.a.sync(&pair.client_a, &mut pair.b);
    }
    assert_eq!(
        pair.a
            .core
            .client_latest_height(&pair.a.store, &pair.client_a)
            .unwrap(),
        height(4)
    );
}
