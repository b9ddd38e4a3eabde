//! The custody-fee unlock condition.
//!
//! Value locked under this condition is permanently retired: the condition
//! is never fulfillable, and every custody-fee payout hashes to the same
//! sink address. The payload is the chain time at which the batch of fees
//! it carries was computed.

use std::any::Any;

use lib_types::{
    CodecError, ConditionError, ConditionRegistry, ConditionType, Decoder, Encoder,
    FulfillContext, Timestamp, UnlockCondition, UnlockFulfillment, UnlockHash, UnlockType,
};

/// Condition-type tag of the custody-fee condition.
pub const CONDITION_TYPE_CUSTODY_FEE: ConditionType = 128;

/// Unlock-hash type byte of the custody-fee sink address.
pub const UNLOCK_TYPE_CUSTODY_FEE: UnlockType = 128;

/// The single, publicly identifiable address all custody-fee accrual flows
/// to.
pub fn custody_fee_unlock_hash() -> UnlockHash {
    UnlockHash::new(UNLOCK_TYPE_CUSTODY_FEE, [0u8; 32])
}

/// Registers the custody-fee condition type with the protocol-layer
/// registry. Called once, at plugin construction.
pub fn register_condition(registry: &mut ConditionRegistry) {
    registry.register(CONDITION_TYPE_CUSTODY_FEE, decode_custody_fee);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CustodyFeeCondition {
    pub computation_time: Timestamp,
}

impl CustodyFeeCondition {
    pub fn new(computation_time: Timestamp) -> Self {
        Self { computation_time }
    }
}

impl UnlockCondition for CustodyFeeCondition {
    fn condition_type(&self) -> ConditionType {
        CONDITION_TYPE_CUSTODY_FEE
    }

    fn unlock_hash(&self) -> UnlockHash {
        custody_fee_unlock_hash()
    }

    // always standard; a custody-fee output is valid in any transaction

    fn fulfillable(&self, _ctx: &FulfillContext) -> bool {
        false
    }

    fn fulfill(
        &self,
        _fulfillment: &UnlockFulfillment,
        _ctx: &FulfillContext,
    ) -> Result<(), ConditionError> {
        Err(ConditionError::UnexpectedFulfillment)
    }

    fn equal(&self, other: &dyn UnlockCondition) -> bool {
        match other.as_any().downcast_ref::<Self>() {
            Some(o) => self.computation_time == o.computation_time,
            None => false,
        }
    }

    fn marshal(&self, enc: &mut Encoder) {
        enc.put_u64(self.computation_time);
    }

    fn json_data(&self) -> serde_json::Value {
        serde_json::json!({ "computationtime": self.computation_time })
    }

    fn clone_box(&self) -> Box<dyn UnlockCondition> {
        Box::new(*self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn decode_custody_fee(
    payload: &[u8],
    _registry: &ConditionRegistry,
) -> Result<Box<dyn UnlockCondition>, CodecError> {
    let mut dec = Decoder::new(payload);
    let computation_time = dec.take_u64()?;
    dec.finish()?;
    Ok(Box::new(CustodyFeeCondition { computation_time }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::UnlockConditionProxy;

    #[test]
    fn never_fulfillable() {
        let condition = CustodyFeeCondition::new(42);
        let ctx = FulfillContext { block_height: u64::MAX, block_time: u64::MAX };
        assert!(!condition.fulfillable(&ctx));
        assert_eq!(
            condition.fulfill(&UnlockFulfillment::default(), &ctx),
            Err(ConditionError::UnexpectedFulfillment)
        );
    }

    #[test]
    fn always_standard() {
        assert!(CustodyFeeCondition::new(0).is_standard().is_ok());
        assert!(CustodyFeeCondition::new(u64::MAX).is_standard().is_ok());
    }

    #[test]
    fn hashes_to_the_fixed_sink() {
        let uh = CustodyFeeCondition::new(1).unlock_hash();
        assert_eq!(uh, CustodyFeeCondition::new(2).unlock_hash());
        assert_eq!(uh.unlock_type, UNLOCK_TYPE_CUSTODY_FEE);
        assert_eq!(uh.hash, [0u8; 32]);
        // canonical string form: type byte, zero hash, checksum
        let s = uh.to_string();
        assert!(s.starts_with("80"));
        assert!(s[2..66].bytes().all(|b| b == b'0'));
        assert_eq!(s.parse::<UnlockHash>().unwrap(), uh);
    }

    #[test]
    fn equality_is_by_computation_time() {
        let a = CustodyFeeCondition::new(7);
        assert!(a.equal(&CustodyFeeCondition::new(7)));
        assert!(!a.equal(&CustodyFeeCondition::new(8)));
        assert!(!a.equal(&lib_types::NilCondition));
    }

    #[test]
    fn wire_round_trip_through_registry() {
        let mut registry = ConditionRegistry::core();
        register_condition(&mut registry);

        let original = UnlockConditionProxy::new(CustodyFeeCondition::new(86400));
        let mut enc = Encoder::new();
        original.encode(&mut enc);
        let bytes = enc.finish();

        let mut dec = Decoder::new(&bytes);
        let decoded = registry.decode_proxy(&mut dec).unwrap();
        dec.finish().unwrap();
        assert_eq!(decoded, original);
        assert_eq!(decoded.condition_type(), CONDITION_TYPE_CUSTODY_FEE);
    }

    #[test]
    fn json_form() {
        let proxy = UnlockConditionProxy::new(CustodyFeeCondition::new(86400));
        let json = serde_json::to_value(&proxy).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": 128, "data": { "computationtime": 86400 } })
        );
    }
}
