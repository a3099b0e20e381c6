//! Read-only runtime queries (spec §4.B): hotkey↔uid bijection, alpha
//! prices, and the current block number used as `version_key`. Dynamic
//! storage lookups (`subxt::dynamic`) are used instead of generated
//! metadata bindings so this crate doesn't need a pinned chain metadata
//! file, matching how `bittensor-rs`'s own queries module reaches the
//! `SubtensorModule` pallet.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::StreamExt;
use subxt::dynamic::Value;
use tracing::warn;

use validator_types::{AlphaPrice, Hotkey, SubnetId, Uid};

use crate::client::SubstrateClient;
use crate::error::{Result, SubstrateError};

const SUBTENSOR_MODULE: &str = "SubtensorModule";

/// Fetches the hotkey→uid bijection for `netuid` by iterating the `Keys`
/// storage map (`uid -> hotkey AccountId32`). Per-entry decode failures are
/// reported but non-fatal unless every entry fails (spec §4.B).
pub async fn hotkey_to_uid(
    client: &Arc<SubstrateClient>,
    netuid: u16,
) -> Result<BTreeMap<Hotkey, Uid>> {
    let api = client.handle()?;
    let storage = api.storage().at_latest().await.map_err(|e| SubstrateError::Storage {
        pallet: SUBTENSOR_MODULE.to_string(),
        entry: "Keys".to_string(),
        message: e.to_string(),
    })?;

    let query = subxt::dynamic::storage(SUBTENSOR_MODULE, "Keys", vec![Value::u128(netuid as u128)]);
    let mut iter = storage.iter(query).await.map_err(|e| SubstrateError::Storage {
        pallet: SUBTENSOR_MODULE.to_string(),
        entry: "Keys".to_string(),
        message: e.to_string(),
    })?;

    let mut out = BTreeMap::new();
    let mut total = 0usize;
    let mut failures = 0usize;
    while let Some(item) = iter.next().await {
        total += 1;
        let kv = match item {
            Ok(kv) => kv,
            Err(e) => {
                failures += 1;
                warn!(netuid, error = %e, "failed to read a Keys row, skipping");
                continue;
            }
        };
        match extract_uid_hotkey(&kv) {
            Ok((uid, hotkey)) => {
                out.insert(hotkey, uid);
            }
            Err(e) => {
                failures += 1;
                warn!(netuid, error = %e, "failed to decode a Keys row, skipping");
            }
        }
    }

    if total > 0 && failures == total {
        return Err(SubstrateError::AllHotkeyLookupsFailed { netuid, total });
    }
    Ok(out)
}

fn extract_uid_hotkey(kv: &subxt::storage::dynamic::DecodedValueThunk) -> Result<(Uid, Hotkey)> {
    // `kv.keys` carries the SCALE-encoded storage key (netuid, uid); the last
    // key component decodes to the uid. `kv.value` decodes to an
    // AccountId32, displayed as its SS58 form to match the Hotkey type.
    let uid = kv
        .keys
        .last()
        .and_then(|k| k.as_u128())
        .ok_or_else(|| SubstrateError::Decode {
            pallet: SUBTENSOR_MODULE.to_string(),
            entry: "Keys".to_string(),
            message: "missing uid key component".to_string(),
        })? as Uid;
    let value = kv.value.to_value().map_err(|e| SubstrateError::Decode {
        pallet: SUBTENSOR_MODULE.to_string(),
        entry: "Keys".to_string(),
        message: e.to_string(),
    })?;
    let account_bytes = value.as_bytes().ok_or_else(|| SubstrateError::Decode {
        pallet: SUBTENSOR_MODULE.to_string(),
        entry: "Keys".to_string(),
        message: "hotkey value is not a 32-byte account id".to_string(),
    })?;
    Ok((uid, Hotkey::from(subxt::utils::AccountId32::from(account_bytes).to_string())))
}

/// `(netuid, taoIn, alphaIn) -> taoIn / alphaIn` in a single runtime call,
/// computed with fixed-point scaling (spec §3 AlphaPrice) before any float
/// conversion.
pub async fn subnet_alpha_prices(
    client: &Arc<SubstrateClient>,
    netuids: &[SubnetId],
) -> Result<BTreeMap<SubnetId, AlphaPrice>> {
    let api = client.handle()?;
    let storage = api.storage().at_latest().await.map_err(|e| SubstrateError::Storage {
        pallet: SUBTENSOR_MODULE.to_string(),
        entry: "SubnetTAO/SubnetAlphaIn".to_string(),
        message: e.to_string(),
    })?;

    let mut out = BTreeMap::new();
    for &netuid in netuids {
        let keys = vec![Value::u128(netuid as u128)];
        let tao_in = fetch_u128(&storage, "SubnetTAO", keys.clone()).await;
        let alpha_in = fetch_u128(&storage, "SubnetAlphaIn", keys).await;
        match (tao_in, alpha_in) {
            (Ok(tao_in), Ok(alpha_in)) => {
                out.insert(netuid, alpha_price_fixed_point(tao_in, alpha_in));
            }
            _ => {
                warn!(netuid, "failed to read SubnetTAO/SubnetAlphaIn, treating price as 0");
                out.insert(netuid, AlphaPrice(0));
            }
        }
    }
    Ok(out)
}

/// `taoIn / alphaIn` scaled by `AlphaPrice::SCALE` before any float
/// conversion, so large u128 reserves don't lose precision to a premature
/// u128->f64 cast (spec §9 "large integer arithmetic").
fn alpha_price_fixed_point(tao_in: u128, alpha_in: u128) -> AlphaPrice {
    if alpha_in == 0 {
        return AlphaPrice(0);
    }
    let scaled = tao_in
        .saturating_mul(AlphaPrice::SCALE)
        .checked_div(alpha_in)
        .unwrap_or(0);
    AlphaPrice(scaled)
}

async fn fetch_u128(
    storage: &subxt::storage::Storage<subxt::PolkadotConfig, subxt::OnlineClient<subxt::PolkadotConfig>>,
    entry: &str,
    keys: Vec<Value>,
) -> Result<u128> {
    let query = subxt::dynamic::storage(SUBTENSOR_MODULE, entry, keys);
    let value = storage
        .fetch(&query)
        .await
        .map_err(|e| SubstrateError::Storage {
            pallet: SUBTENSOR_MODULE.to_string(),
            entry: entry.to_string(),
            message: e.to_string(),
        })?
        .ok_or_else(|| SubstrateError::Storage {
            pallet: SUBTENSOR_MODULE.to_string(),
            entry: entry.to_string(),
            message: "entry absent".to_string(),
        })?;
    let decoded = value.to_value().map_err(|e| SubstrateError::Decode {
        pallet: SUBTENSOR_MODULE.to_string(),
        entry: entry.to_string(),
        message: e.to_string(),
    })?;
    decoded.as_u128().ok_or_else(|| SubstrateError::Decode {
        pallet: SUBTENSOR_MODULE.to_string(),
        entry: entry.to_string(),
        message: "value is not u128-shaped".to_string(),
    })
}

pub async fn current_block_number(client: &Arc<SubstrateClient>) -> Result<u64> {
    let api = client.handle()?;
    let block = api
        .blocks()
        .at_latest()
        .await
        .map_err(|e| SubstrateError::Storage {
            pallet: "System".to_string(),
            entry: "Number".to_string(),
            message: e.to_string(),
        })?;
    Ok(block.number() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_price_is_zero_when_alpha_in_is_zero() {
        assert_eq!(alpha_price_fixed_point(1_000, 0).0, 0);
    }

    #[test]
    fn alpha_price_scales_before_dividing() {
        let price = alpha_price_fixed_point(10, 5);
        assert_eq!(price.as_float(), 2.0);
    }
}
