/*
    timestamp.rs - Hybrid logical clock readings

    A reading is (walltime, counter, node_id), totally ordered
    lexicographically on those fields.

    Wire form: "<walltime>:<counter>:<node_id>" with walltime padded to 15
    digits and counter padded to 10, so that comparing two serialized
    readings byte-wise agrees with comparing the parsed values. Unpadded
    numeric fields are accepted on input; walltimes wider than 15 digits
    are not.
*/

use super::errors::{HlcError, HlcResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between the three fields of a serialized reading
pub const FIELD_SEPARATOR: char = ':';

const WALLTIME_WIDTH: usize = 15;
const COUNTER_WIDTH: usize = 10;

/// Largest walltime that fits the fixed-width wire form
pub const MAX_WALLTIME: u64 = 999_999_999_999_999;

/// One reading of a hybrid logical clock
///
/// Field order matters: the derived `Ord` compares walltime, then counter,
/// then node id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HlcTimestamp {
    /// Physical component, milliseconds since the UNIX epoch
    pub walltime: u64,

    /// Logical component, disambiguates readings within one millisecond
    pub counter: u32,

    /// Identity of the node that produced the reading
    pub node_id: String,
}

impl HlcTimestamp {
    /// Build a reading, validating the walltime range and the node id
    pub fn new(walltime: u64, counter: u32, node_id: impl Into<String>) -> HlcResult<Self> {
        let node_id = node_id.into();
        validate_walltime(walltime)?;
        validate_node_id(&node_id)?;
        Ok(HlcTimestamp { walltime, counter, node_id })
    }

    /// Parse the colon-joined wire form
    pub fn parse(raw: &str) -> HlcResult<Self> {
        let mut fields = raw.split(FIELD_SEPARATOR);
        let (walltime, counter, node_id) = match (fields.next(), fields.next(), fields.next()) {
            (Some(w), Some(c), Some(n)) => (w, c, n),
            _ => return Err(HlcError::malformed(raw, "expected walltime:counter:node_id")),
        };
        if fields.next().is_some() {
            return Err(HlcError::malformed(raw, "too many fields"));
        }

        let walltime = walltime
            .parse::<u64>()
            .map_err(|e| HlcError::malformed(raw, format!("walltime: {}", e)))?;
        validate_walltime(walltime).map_err(|e| HlcError::malformed(raw, e.to_string()))?;
        let counter = counter
            .parse::<u32>()
            .map_err(|e| HlcError::malformed(raw, format!("counter: {}", e)))?;
        if node_id.is_empty() {
            return Err(HlcError::malformed(raw, "empty node id"));
        }

        Ok(HlcTimestamp { walltime, counter, node_id: node_id.to_string() })
    }

    /// Serialize to the fixed-width wire form
    pub fn serialize(&self) -> String {
        self.to_string()
    }

    /// The reading that immediately follows `(walltime, counter)` for this node.
    ///
    /// A saturated counter rolls over into the next millisecond so the result
    /// is still strictly greater. `walltime` is at most `MAX_WALLTIME`, so
    /// this cannot overflow; only `(MAX_WALLTIME, u32::MAX)` has a successor
    /// outside the wire width.
    pub(crate) fn successor_of(walltime: u64, counter: u32, node_id: &str) -> Self {
        let (walltime, counter) = match counter.checked_add(1) {
            Some(next) => (walltime, next),
            None => (walltime + 1, 0),
        };
        HlcTimestamp { walltime, counter, node_id: node_id.to_string() }
    }
}

pub(crate) fn validate_walltime(walltime: u64) -> HlcResult<()> {
    if walltime > MAX_WALLTIME {
        return Err(HlcError::WalltimeOutOfRange(walltime));
    }
    Ok(())
}

pub(crate) fn validate_node_id(node_id: &str) -> HlcResult<()> {
    if node_id.is_empty() || node_id.contains(FIELD_SEPARATOR) {
        return Err(HlcError::InvalidNodeId(node_id.to_string()));
    }
    Ok(())
}

impl fmt::Display for HlcTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:0ww$}{sep}{:0cw$}{sep}{}",
            self.walltime,
            self.counter,
            self.node_id,
            ww = WALLTIME_WIDTH,
            cw = COUNTER_WIDTH,
            sep = FIELD_SEPARATOR,
        )
    }
}

impl FromStr for HlcTimestamp {
    type Err = HlcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HlcTimestamp::parse(s)
    }
}

impl TryFrom<String> for HlcTimestamp {
    type Error = HlcError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        HlcTimestamp::parse(&value)
    }
}

impl From<HlcTimestamp> for String {
    fn from(ts: HlcTimestamp) -> Self {
        ts.serialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_serialize_is_fixed_width() {
        let ts = HlcTimestamp::new(1_700_000_000_000, 3, "node-a").unwrap();
        assert_eq!(ts.serialize(), "001700000000000:0000000003:node-a");
    }

    #[test]
    fn test_parse_accepts_unpadded_fields() {
        let ts = HlcTimestamp::parse("1700000000000:3:node-a").unwrap();
        assert_eq!(ts.walltime, 1_700_000_000_000);
        assert_eq!(ts.counter, 3);
        assert_eq!(ts.node_id, "node-a");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(HlcTimestamp::parse("").is_err());
        assert!(HlcTimestamp::parse("12:3").is_err());
        assert!(HlcTimestamp::parse("12:3:").is_err());
        assert!(HlcTimestamp::parse("x:3:node").is_err());
        assert!(HlcTimestamp::parse("12:-1:node").is_err());
        assert!(HlcTimestamp::parse("12:3:node:extra").is_err());
    }

    #[test]
    fn test_walltime_is_bounded_by_wire_width() {
        assert!(HlcTimestamp::new(MAX_WALLTIME, u32::MAX, "n").is_ok());
        assert_eq!(
            HlcTimestamp::new(MAX_WALLTIME + 1, 0, "n"),
            Err(HlcError::WalltimeOutOfRange(MAX_WALLTIME + 1))
        );
        assert!(HlcTimestamp::parse("1000000000000000:0:n").is_err());
        assert!(HlcTimestamp::parse("18446744073709551615:4294967295:b").is_err());

        let widest = HlcTimestamp::parse("999999999999999:0:n").unwrap();
        let narrower = HlcTimestamp::new(999_999_999_999_998, 7, "n").unwrap();
        assert_eq!(widest.serialize().len(), narrower.serialize().len());
        assert!(widest.serialize() > narrower.serialize());
    }

    #[test]
    fn test_new_rejects_bad_node_ids() {
        assert_eq!(
            HlcTimestamp::new(1, 0, "a:b"),
            Err(HlcError::InvalidNodeId("a:b".to_string()))
        );
        assert!(HlcTimestamp::new(1, 0, "").is_err());
    }

    #[test]
    fn test_ordering_is_walltime_then_counter_then_node() {
        let a = HlcTimestamp::new(10, 5, "z").unwrap();
        let b = HlcTimestamp::new(11, 0, "a").unwrap();
        let c = HlcTimestamp::new(11, 1, "a").unwrap();
        let d = HlcTimestamp::new(11, 1, "b").unwrap();
        assert!(a < b);
        assert!(b < c);
        assert!(c < d);
    }

    #[test]
    fn test_counter_overflow_rolls_into_next_millisecond() {
        let next = HlcTimestamp::successor_of(7, u32::MAX, "n");
        assert_eq!((next.walltime, next.counter), (8, 0));
        assert!(next > HlcTimestamp::new(7, u32::MAX, "n").unwrap());
    }

    #[test]
    fn test_serde_uses_string_form() {
        let ts = HlcTimestamp::new(42, 7, "peer").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"000000000000042:0000000007:peer\"");

        let back: HlcTimestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);

        assert!(serde_json::from_str::<HlcTimestamp>("\"nope\"").is_err());
    }

    fn node_id_strategy() -> impl Strategy<Value = String> {
        "[a-z0-9-]{1,12}"
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            walltime in 0u64..=MAX_WALLTIME,
            counter in any::<u32>(),
            node_id in node_id_strategy(),
        ) {
            let ts = HlcTimestamp::new(walltime, counter, node_id).unwrap();
            prop_assert_eq!(HlcTimestamp::parse(&ts.serialize()).unwrap(), ts);
        }

        #[test]
        fn prop_string_order_matches_value_order(
            w1 in 0u64..=MAX_WALLTIME,
            c1 in any::<u32>(),
            n1 in node_id_strategy(),
            w2 in 0u64..=MAX_WALLTIME,
            c2 in any::<u32>(),
            n2 in node_id_strategy(),
        ) {
            let a = HlcTimestamp::new(w1, c1, n1).unwrap();
            let b = HlcTimestamp::new(w2, c2, n2).unwrap();
            prop_assert_eq!(a.serialize().cmp(&b.serialize()), a.cmp(&b));
        }
    }
}
