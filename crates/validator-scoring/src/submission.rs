use std::collections::BTreeMap;

use validator_types::{EmaMinerWeights, Hotkey, RawMinerWeights, SubmissionVector, Uid};

use crate::error::{Result, ScoringError};

const TOTAL_UNITS: u32 = u16::MAX as u32;

#[derive(Debug, Clone, Copy)]
pub struct SubmissionPolicyConfig {
    pub burn_uid: Uid,
    pub burn_percentage: f64,
    pub use_ema: bool,
    pub ema_epsilon: f64,
}

/// Applies the weight-submission decision tree and largest-remainder
/// scaling from spec §4.G.
pub fn build_submission_vector(
    miner_raw: &RawMinerWeights,
    hotkey_to_uid: &BTreeMap<Hotkey, Uid>,
    ema: Option<&EmaMinerWeights>,
    config: &SubmissionPolicyConfig,
) -> Result<SubmissionVector> {
    if hotkey_to_uid.is_empty() {
        return Err(ScoringError::EmptyUidMap);
    }
    if !(0.0..=100.0).contains(&config.burn_percentage) {
        return Err(ScoringError::InvalidBurnPercentage(config.burn_percentage));
    }

    let has_positive = miner_raw.0.values().any(|&w| w > 0.0);
    if !has_positive {
        let all_zero = hotkey_to_uid
            .values()
            .chain(std::iter::once(&config.burn_uid))
            .map(|&uid| (uid, 0u16))
            .collect();
        return Ok(SubmissionVector(all_zero));
    }

    let mut submit: BTreeMap<&Hotkey, f64> = hotkey_to_uid.keys().map(|h| (h, 0.0)).collect();
    match (config.use_ema, ema) {
        (true, Some(ema)) => {
            for (hotkey, &weight) in &ema.0 {
                if weight > config.ema_epsilon && hotkey_to_uid.contains_key(hotkey) {
                    submit.insert(hotkey, weight);
                }
            }
        }
        _ => {
            for (hotkey, &weight) in &miner_raw.0 {
                if weight > 0.0 && hotkey_to_uid.contains_key(hotkey) {
                    submit.insert(hotkey, weight);
                }
            }
        }
    }

    let mut uid_weights: BTreeMap<Uid, f64> = BTreeMap::new();
    for (hotkey, &uid) in hotkey_to_uid {
        *uid_weights.entry(uid).or_insert(0.0) += submit.get(hotkey).copied().unwrap_or(0.0);
    }
    uid_weights.entry(config.burn_uid).or_insert(0.0);

    Ok(scale_to_u16(&uid_weights, config.burn_uid, config.burn_percentage))
}

/// Largest-remainder scaling with an exact burn allocation. Pure over an
/// already-resolved `uid -> weight` map; separated out so the scaling law
/// (spec §8 invariant 9) can be property-tested independently of the
/// decision tree above.
pub fn scale_to_u16(
    uid_weights: &BTreeMap<Uid, f64>,
    burn_uid: Uid,
    burn_percentage: f64,
) -> SubmissionVector {
    let desired_burn_int = (burn_percentage / 100.0 * TOTAL_UNITS as f64).round() as u32;
    let miner_total_int = TOTAL_UNITS.saturating_sub(desired_burn_int);

    let sum_non_burn: f64 = uid_weights
        .iter()
        .filter(|(&uid, _)| uid != burn_uid)
        .map(|(_, &w)| w.max(0.0))
        .sum();

    let mut floors: BTreeMap<Uid, u32> = BTreeMap::new();
    let mut remainders: Vec<(Uid, f64)> = Vec::new();
    for (&uid, &w) in uid_weights {
        if uid == burn_uid {
            continue;
        }
        let target = if sum_non_burn > 0.0 {
            (w.max(0.0) / sum_non_burn) * miner_total_int as f64
        } else {
            0.0
        };
        let floor = target.floor();
        floors.insert(uid, floor as u32);
        remainders.push((uid, target - floor));
    }

    let floor_sum: u32 = floors.values().sum();
    let mut to_distribute = miner_total_int.saturating_sub(floor_sum);

    // Descending remainder, ties broken by UID ascending (stable sort keeps
    // the BTreeMap's natural UID order for equal remainders).
    remainders.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    for (uid, _) in remainders {
        if to_distribute == 0 {
            break;
        }
        *floors.get_mut(&uid).unwrap() += 1;
        to_distribute -= 1;
    }

    let mut scaled: BTreeMap<Uid, u16> = floors
        .into_iter()
        .map(|(uid, w)| (uid, w.min(TOTAL_UNITS) as u16))
        .collect();
    scaled.insert(burn_uid, desired_burn_int.min(TOTAL_UNITS) as u16);

    rectify(&mut scaled, burn_uid);
    SubmissionVector(scaled)
}

/// Defensive rounding fix: nudges the vector to sum to exactly `u16::MAX`
/// if floating-point accumulation left it off by a handful of units.
/// Touches the burn UID last.
fn rectify(scaled: &mut BTreeMap<Uid, u16>, burn_uid: Uid) {
    let sum: i64 = scaled.values().map(|&w| w as i64).sum();
    let mut diff = TOTAL_UNITS as i64 - sum;
    if diff == 0 {
        return;
    }

    let mut candidates: Vec<Uid> = scaled.keys().copied().filter(|&u| u != burn_uid).collect();
    if candidates.is_empty() {
        candidates.push(burn_uid);
    }
    candidates.sort_by_key(|&uid| std::cmp::Reverse(scaled[&uid]));

    let mut i = 0;
    while diff != 0 && !candidates.is_empty() {
        let uid = candidates[i % candidates.len()];
        let entry = scaled.get_mut(&uid).unwrap();
        if diff > 0 {
            *entry += 1;
            diff -= 1;
        } else if *entry > 0 {
            *entry -= 1;
            diff += 1;
        }
        i += 1;
        if i > candidates.len() * (TOTAL_UNITS as usize + 1) {
            break;
        }
    }
}

const NORMALIZE_UNITS: u32 = 10_000;
const NORMALIZE_STEP: f64 = 1.0 / NORMALIZE_UNITS as f64;

/// Normalizes an arbitrary non-negative weight map to multiples of `1e-4`
/// summing to exactly `1.0` (spec §8 invariant 12), via the same
/// largest-remainder technique as [`scale_to_u16`] but at `1e-4` rather than
/// `1/65535` granularity. An all-zero or empty input normalizes to an
/// all-zero map of the same keys.
pub fn normalize_weights<K: Ord + Clone>(weights: &BTreeMap<K, f64>) -> BTreeMap<K, f64> {
    let sum: f64 = weights.values().filter(|w| w.is_finite()).map(|w| w.max(0.0)).sum();
    if sum <= 0.0 {
        return weights.keys().cloned().map(|k| (k, 0.0)).collect();
    }

    let mut floors: BTreeMap<K, u32> = BTreeMap::new();
    let mut remainders: Vec<(K, f64)> = Vec::new();
    for (key, &w) in weights {
        let w = if w.is_finite() { w.max(0.0) } else { 0.0 };
        let target = (w / sum) * NORMALIZE_UNITS as f64;
        let floor = target.floor();
        floors.insert(key.clone(), floor as u32);
        remainders.push((key.clone(), target - floor));
    }

    let floor_sum: u32 = floors.values().sum();
    let mut to_distribute = NORMALIZE_UNITS.saturating_sub(floor_sum);

    remainders.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    for (key, _) in remainders {
        if to_distribute == 0 {
            break;
        }
        *floors.get_mut(&key).unwrap() += 1;
        to_distribute -= 1;
    }

    floors
        .into_iter()
        .map(|(k, units)| (k, units as f64 * NORMALIZE_STEP))
        .collect()
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Invariant 9/10 (spec §8): for any weight vector and any
        /// burn_percentage, the scaled vector sums to exactly 65535 and the
        /// burn UID carries exactly `round(burn% / 100 * 65535)`.
        #[test]
        fn scaling_law_sums_to_65535_with_exact_burn(
            weights in prop::collection::vec(0.0f64..1_000.0, 1..8),
            burn_percentage in 0u32..=100,
        ) {
            let mut uid_weights: BTreeMap<Uid, f64> = weights
                .into_iter()
                .enumerate()
                .map(|(i, w)| ((i + 1) as Uid, w))
                .collect();
            uid_weights.entry(0).or_insert(0.0);

            let result = scale_to_u16(&uid_weights, 0, burn_percentage as f64);
            prop_assert_eq!(result.sum(), 65535);
            let expected_burn = (burn_percentage as f64 / 100.0 * 65535.0).round() as u16;
            prop_assert_eq!(result.0[&0], expected_burn);
        }

        /// Invariant 12: the normalizer always produces values that are
        /// multiples of 1e-4 and sum to exactly 1.0 for any non-negative
        /// input vector with at least one positive entry.
        #[test]
        fn normalize_weights_always_sums_to_one(
            weights in prop::collection::vec(0.0f64..1_000.0, 1..8),
        ) {
            prop_assume!(weights.iter().any(|&w| w > 0.0));
            let map: BTreeMap<usize, f64> = weights.into_iter().enumerate().collect();
            let normalized = normalize_weights(&map);
            let sum: f64 = normalized.values().sum();
            prop_assert!((sum - 1.0).abs() < 1e-9);
            for &w in normalized.values() {
                let units = w / NORMALIZE_STEP;
                prop_assert!((units - units.round()).abs() < 1e-6);
            }
        }
    }
}
