//! `set_weights` extrinsic submission (spec §4.B, §6 wire format).

use std::sync::Arc;

use subxt::dynamic::Value;
use subxt_signer::bip39::Mnemonic;
use subxt_signer::sr25519::Keypair;
use tracing::info;

use validator_types::{SubmissionVector, Uid};

use crate::client::SubstrateClient;
use crate::error::{Result, SubstrateError};

const SUBTENSOR_MODULE: &str = "SubtensorModule";

/// A signing key loaded from the mnemonic in `VALIDATOR_HOTKEY_MNEMONIC`.
/// Never implements `Debug`/`Display` so it can't accidentally end up in a
/// log line (spec.md §6: "treated as a secret, never logged").
pub struct Signer(Keypair);

impl Signer {
    pub fn from_mnemonic(mnemonic: &str) -> Result<Self> {
        let mnemonic = Mnemonic::parse(mnemonic)
            .map_err(|e| SubstrateError::InvalidSigner(e.to_string()))?;
        let keypair = Keypair::from_phrase(&mnemonic, None)
            .map_err(|e| SubstrateError::InvalidSigner(e.to_string()))?;
        Ok(Self(keypair))
    }
}

/// Signs and submits `set_weights(netuid, uids, weights, version_key)`,
/// waiting for inclusion and returning the resulting transaction hash.
pub async fn submit_set_weights(
    client: &Arc<SubstrateClient>,
    netuid: u16,
    weights: &SubmissionVector,
    version_key: u64,
    signer: &Signer,
) -> Result<String> {
    let api = client.handle()?;

    let (uids, values): (Vec<Uid>, Vec<u16>) = weights.0.iter().map(|(&uid, &w)| (uid, w)).unzip();

    let uid_values: Vec<Value> = uids.iter().map(|&u| Value::u128(u as u128)).collect();
    let weight_values: Vec<Value> = values.iter().map(|&w| Value::u128(w as u128)).collect();

    let call = subxt::dynamic::tx(
        SUBTENSOR_MODULE,
        "set_weights",
        vec![
            Value::u128(netuid as u128),
            Value::unnamed_composite(uid_values),
            Value::unnamed_composite(weight_values),
            Value::u128(version_key as u128),
        ],
    );

    let progress = api
        .tx()
        .sign_and_submit_then_watch_default(&call, &signer.0)
        .await
        .map_err(|e| SubstrateError::Submission(e.to_string()))?;

    let events = progress
        .wait_for_finalized_success()
        .await
        .map_err(|e| SubstrateError::Submission(e.to_string()))?;

    let tx_hash = format!("0x{}", hex::encode(events.extrinsic_hash()));
    info!(netuid, version_key, tx_hash = %tx_hash, "set_weights finalized");
    Ok(tx_hash)
}
