//! The option merge engine.
//!
//! How an incoming option combines with the stored one is decided by a small
//! table mapping option names to a [`MergeStrategy`]. Options missing from the
//! table deep-merge: objects merge key by key, anything else is replaced.
//! Adding an option with special semantics means adding a row here, not
//! touching [`merge_into`].

use std::sync::OnceLock;

use hashbrown::HashMap;
use serde_json::{Map, Value};

use super::keys;

/// How an incoming option value combines with the stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// The incoming value replaces the stored one.
    Replace,
    /// Lists are unioned, keeping the stored order and dropping duplicates.
    /// If `overwrite_flag` is truthy in the same call the incoming list
    /// replaces the stored one.
    Union {
        /// Option that switches this field to replacement.
        overwrite_flag: &'static str,
    },
    /// Objects merge recursively, incoming keys winning.
    Deep,
    /// Another spelling of `canonical`. The value is merged under the
    /// canonical name unless the same call also sets the canonical name.
    Alias {
        /// The option this one stands for.
        canonical: &'static str,
    },
    /// Never taken from caller input.
    Reserved,
}

type StrategyTable = HashMap<&'static str, MergeStrategy, rustc_hash::FxBuildHasher>;

fn strategy_table() -> &'static StrategyTable {
    static TABLE: OnceLock<StrategyTable> = OnceLock::new();

    TABLE.get_or_init(|| {
        let mut table = StrategyTable::default();
        table.insert(
            keys::SCRUB_FIELDS,
            MergeStrategy::Union {
                overwrite_flag: keys::OVERWRITE_SCRUB_FIELDS,
            },
        );
        table.insert(keys::IGNORED_MESSAGES, MergeStrategy::Replace);
        table.insert(keys::PAYLOAD, MergeStrategy::Deep);
        table.insert(
            keys::ACCESS_TOKEN_ALIAS,
            MergeStrategy::Alias {
                canonical: keys::ACCESS_TOKEN,
            },
        );
        table.insert(keys::CONFIGURED_OPTIONS, MergeStrategy::Reserved);
        table
    })
}

/// The strategy used for `key`.
pub fn strategy_for(key: &str) -> MergeStrategy {
    strategy_table()
        .get(key)
        .copied()
        .unwrap_or(MergeStrategy::Deep)
}

/// Merges `incoming` onto `target` following the strategy table.
pub(crate) fn merge_into(target: &mut Map<String, Value>, incoming: &Map<String, Value>) {
    for (key, value) in incoming {
        match strategy_for(key) {
            MergeStrategy::Alias { canonical } => {
                if !incoming.contains_key(canonical) {
                    merge_key(target, canonical, strategy_for(canonical), value, incoming);
                }
            }
            strategy => merge_key(target, key, strategy, value, incoming),
        }
    }
}

fn merge_key(
    target: &mut Map<String, Value>,
    key: &str,
    strategy: MergeStrategy,
    value: &Value,
    incoming: &Map<String, Value>,
) {
    match strategy {
        MergeStrategy::Reserved => {}
        MergeStrategy::Replace | MergeStrategy::Alias { .. } => {
            target.insert(key.to_owned(), value.clone());
        }
        MergeStrategy::Deep => match target.get_mut(key) {
            Some(existing) => deep_merge(existing, value),
            None => {
                target.insert(key.to_owned(), value.clone());
            }
        },
        MergeStrategy::Union { overwrite_flag } => {
            let overwrite = incoming.get(overwrite_flag).is_some_and(is_truthy);
            if !overwrite
                && let (Some(Value::Array(existing)), Value::Array(added)) =
                    (target.get_mut(key), value)
            {
                for v in added {
                    if !existing.contains(v) {
                        existing.push(v.clone());
                    }
                }
                return;
            }
            target.insert(key.to_owned(), value.clone());
        }
    }
}

/// Recursively merges `incoming` into `target`. Objects merge key by key;
/// any other incoming value replaces the target.
pub(crate) fn deep_merge(target: &mut Value, incoming: &Value) {
    match (target, incoming) {
        (Value::Object(existing), Value::Object(added)) => {
            for (key, value) in added {
                match existing.get_mut(key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        existing.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, incoming) => *target = incoming.clone(),
    }
}

/// Loose truthiness used for option flags: `false`, `0`, `""` and `null` are
/// false; everything else is true.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
