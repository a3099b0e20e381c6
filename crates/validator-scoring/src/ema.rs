use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use validator_types::{EmaMinerWeights, Hotkey, RawMinerWeights};

use crate::error::{Result, ScoringError};

/// Process-lifetime EMA smoothing state for component F. Owned exclusively
/// by the orchestrator; never mutated concurrently.
#[derive(Debug, Clone)]
pub struct EmaStore {
    alpha: f64,
    epsilon: f64,
    state: EmaMinerWeights,
}

#[derive(Debug, Serialize, Deserialize)]
struct EmaSnapshot {
    alpha: f64,
    epsilon: f64,
    weights: BTreeMap<String, f64>,
}

impl EmaStore {
    pub fn new(alpha: f64, epsilon: f64) -> Result<Self> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(ScoringError::InvalidEmaAlpha(alpha));
        }
        Ok(Self {
            alpha,
            epsilon,
            state: EmaMinerWeights::default(),
        })
    }

    pub fn current(&self) -> &EmaMinerWeights {
        &self.state
    }

    /// Applies the update rule from spec §4.F. Returns `false` without
    /// mutating state when `raw` has no positive entry — those runs neither
    /// decay nor refresh the store.
    pub fn update(&mut self, raw: &RawMinerWeights) -> bool {
        let eligible: BTreeMap<&Hotkey, f64> = raw
            .0
            .iter()
            .filter(|(_, &w)| w > 0.0 && w.is_finite())
            .map(|(h, &w)| (h, w))
            .collect();
        if eligible.is_empty() {
            return false;
        }

        let mut keys: std::collections::BTreeSet<Hotkey> = self.state.0.keys().cloned().collect();
        keys.extend(eligible.keys().map(|h| (*h).clone()));

        let mut next = BTreeMap::new();
        for key in keys {
            let prev = self.state.get(&key);
            let cur = eligible.get(&key).copied().unwrap_or(0.0);
            let mut value = self.alpha * cur + (1.0 - self.alpha) * prev;
            if !value.is_finite() {
                value = 0.0;
            }
            if value >= self.epsilon {
                next.insert(key, value);
            }
        }
        self.state = EmaMinerWeights(next);
        true
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let snapshot = EmaSnapshot {
            alpha: self.alpha,
            epsilon: self.epsilon,
            weights: self
                .state
                .0
                .iter()
                .map(|(h, &w)| (h.as_str().to_string(), w))
                .collect(),
        };
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| ScoringError::PersistenceFailure(e.to_string()))?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json).map_err(|e| ScoringError::PersistenceFailure(e.to_string()))?;
        fs::rename(&tmp_path, path).map_err(|e| ScoringError::PersistenceFailure(e.to_string()))?;
        Ok(())
    }

    /// Loads a previously saved snapshot, warning and falling back to an
    /// empty store on any read/parse error rather than failing startup.
    pub fn load_from(path: &Path, alpha: f64, epsilon: f64) -> Result<Self> {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "no EMA snapshot found, starting fresh");
                return Self::new(alpha, epsilon);
            }
        };
        match serde_json::from_slice::<EmaSnapshot>(&bytes) {
            Ok(snapshot) => Ok(Self {
                alpha,
                epsilon,
                state: EmaMinerWeights(
                    snapshot
                        .weights
                        .into_iter()
                        .map(|(h, w)| (Hotkey::from(h), w))
                        .collect(),
                ),
            }),
            Err(e) => {
                warn!(error = %e, "EMA snapshot unreadable, starting fresh");
                Self::new(alpha, epsilon)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_alpha() {
        assert!(EmaStore::new(0.0, 1e-6).is_err());
        assert!(EmaStore::new(1.5, 1e-6).is_err());
        assert!(EmaStore::new(1.0, 1e-6).is_ok());
    }

    #[test]
    fn no_op_when_nothing_positive() {
        let mut store = EmaStore::new(0.3, 1e-6).unwrap();
        let raw = RawMinerWeights::default();
        assert!(!store.update(&raw));
        assert!(store.current().0.is_empty());
    }

    #[test]
    fn converges_monotonically_toward_constant_input() {
        let mut store = EmaStore::new(0.3, 1e-6).unwrap();
        let mut raw = RawMinerWeights::default();
        raw.0.insert(Hotkey::from("alice"), 1.0);

        let mut last = 0.0;
        for _ in 0..20 {
            store.update(&raw);
            let cur = store.current().get(&Hotkey::from("alice"));
            assert!(cur >= last);
            last = cur;
        }
        assert!((last - 1.0).abs() < 1e-3);
    }

    #[test]
    fn decays_to_zero_and_is_dropped_below_epsilon() {
        let mut store = EmaStore::new(0.3, 1e-3).unwrap();
        let mut raw = RawMinerWeights::default();
        raw.0.insert(Hotkey::from("alice"), 1.0);
        store.update(&raw);

        // alice stops earning but someone else keeps the run "positive".
        raw.0.clear();
        raw.0.insert(Hotkey::from("bob"), 1.0);
        for _ in 0..30 {
            store.update(&raw);
        }
        assert!(store.current().get(&Hotkey::from("alice")) == 0.0);
    }

    #[test]
    fn round_trips_through_save_and_load() {
        let mut store = EmaStore::new(0.3, 1e-6).unwrap();
        let mut raw = RawMinerWeights::default();
        raw.0.insert(Hotkey::from("alice"), 1.0);
        store.update(&raw);

        let dir = std::env::temp_dir().join(format!("ema-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("weights.json");
        store.save_to(&path).unwrap();

        let loaded = EmaStore::load_from(&path, 0.3, 1e-6).unwrap();
        assert!(
            (loaded.current().get(&Hotkey::from("alice"))
                - store.current().get(&Hotkey::from("alice")))
            .abs()
                < 1e-12
        );
        let _ = fs::remove_dir_all(&dir);
    }
}
