//! The transaction model, reduced to what the custody-fee subsystem
//! observes: coin inputs consuming prior outputs, coin outputs creating new
//! value, miner fees, and opaque arbitrary data.

use crate::codec::{CodecError, Decoder, Encoder};
use crate::conditions::{ConditionRegistry, UnlockConditionProxy, UnlockFulfillment};
use crate::currency::Currency;
use crate::primitives::{CoinOutputId, TransactionId};

/// Domain separators for id derivation. These strings are protocol.
const SPECIFIER_TRANSACTION: &[u8] = b"goldchain/transaction";
const SPECIFIER_COIN_OUTPUT: &[u8] = b"goldchain/coin output";

/// Consumes a previously created coin output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoinInput {
    pub parent_id: CoinOutputId,
    pub fulfillment: UnlockFulfillment,
}

impl CoinInput {
    pub fn encode(&self, enc: &mut Encoder) {
        self.parent_id.encode(enc);
        self.fulfillment.encode(enc);
    }

    pub fn decode(dec: &mut Decoder<'_>) -> Result<Self, CodecError> {
        let parent_id = CoinOutputId::decode(dec)?;
        let fulfillment = UnlockFulfillment::decode(dec)?;
        Ok(Self { parent_id, fulfillment })
    }
}

/// A discrete unit of on-chain value, locked under a condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinOutput {
    pub value: Currency,
    pub condition: UnlockConditionProxy,
}

impl CoinOutput {
    pub fn new(value: Currency, condition: UnlockConditionProxy) -> Self {
        Self { value, condition }
    }

    pub fn encode(&self, enc: &mut Encoder) {
        self.value.encode(enc);
        self.condition.encode(enc);
    }

    pub fn decode(
        registry: &ConditionRegistry,
        dec: &mut Decoder<'_>,
    ) -> Result<Self, CodecError> {
        let value = Currency::decode(dec)?;
        let condition = registry.decode_proxy(dec)?;
        Ok(Self { value, condition })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transaction {
    pub version: u8,
    pub coin_inputs: Vec<CoinInput>,
    pub coin_outputs: Vec<CoinOutput>,
    pub miner_fees: Vec<Currency>,
    pub arbitrary_data: Vec<u8>,
}

impl Transaction {
    pub fn encode(&self, enc: &mut Encoder) {
        enc.put_u8(self.version);
        enc.put_u64(self.coin_inputs.len() as u64);
        for ci in &self.coin_inputs {
            ci.encode(enc);
        }
        enc.put_u64(self.coin_outputs.len() as u64);
        for co in &self.coin_outputs {
            co.encode(enc);
        }
        enc.put_u64(self.miner_fees.len() as u64);
        for fee in &self.miner_fees {
            fee.encode(enc);
        }
        enc.put_slice(&self.arbitrary_data);
    }

    pub fn decode(
        registry: &ConditionRegistry,
        dec: &mut Decoder<'_>,
    ) -> Result<Self, CodecError> {
        let version = dec.take_u8()?;
        let input_count = dec.take_u64()?;
        let mut coin_inputs = Vec::with_capacity(input_count.min(1024) as usize);
        for _ in 0..input_count {
            coin_inputs.push(CoinInput::decode(dec)?);
        }
        let output_count = dec.take_u64()?;
        let mut coin_outputs = Vec::with_capacity(output_count.min(1024) as usize);
        for _ in 0..output_count {
            coin_outputs.push(CoinOutput::decode(registry, dec)?);
        }
        let fee_count = dec.take_u64()?;
        let mut miner_fees = Vec::with_capacity(fee_count.min(1024) as usize);
        for _ in 0..fee_count {
            miner_fees.push(Currency::decode(dec)?);
        }
        let arbitrary_data = dec.take_slice()?.to_vec();
        Ok(Self { version, coin_inputs, coin_outputs, miner_fees, arbitrary_data })
    }

    /// Consensus hash of the canonical encoding.
    pub fn id(&self) -> TransactionId {
        let mut enc = Encoder::new();
        self.encode(&mut enc);
        let mut hasher = blake3::Hasher::new();
        hasher.update(SPECIFIER_TRANSACTION);
        hasher.update(&enc.finish());
        TransactionId::new(hasher.finalize().into())
    }

    /// Id of the coin output at `index`, derived from the transaction id.
    pub fn coin_output_id(&self, index: u64) -> CoinOutputId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(SPECIFIER_COIN_OUTPUT);
        hasher.update(self.id().as_bytes());
        hasher.update(&index.to_le_bytes());
        CoinOutputId::new(hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{UnlockHashCondition, CONDITION_TYPE_UNLOCK_HASH};
    use crate::primitives::{UnlockHash, UNLOCK_TYPE_PUBKEY};

    fn sample_tx() -> Transaction {
        Transaction {
            version: 1,
            coin_inputs: vec![CoinInput {
                parent_id: CoinOutputId::new([3u8; 32]),
                fulfillment: UnlockFulfillment { fulfillment_type: 1, data: vec![1, 2, 3] },
            }],
            coin_outputs: vec![CoinOutput::new(
                Currency::from_units(900),
                UnlockConditionProxy::new(UnlockHashCondition::new(UnlockHash::new(
                    UNLOCK_TYPE_PUBKEY,
                    [4u8; 32],
                ))),
            )],
            miner_fees: vec![Currency::from_units(100)],
            arbitrary_data: b"note".to_vec(),
        }
    }

    #[test]
    fn codec_round_trip() {
        let registry = ConditionRegistry::core();
        let tx = sample_tx();
        let mut enc = Encoder::new();
        tx.encode(&mut enc);
        let bytes = enc.finish();
        let mut dec = Decoder::new(&bytes);
        let decoded = Transaction::decode(&registry, &mut dec).unwrap();
        dec.finish().unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.coin_outputs[0].condition.condition_type(), CONDITION_TYPE_UNLOCK_HASH);
    }

    #[test]
    fn ids_are_deterministic_and_distinct_per_index() {
        let tx = sample_tx();
        assert_eq!(tx.id(), tx.id());
        assert_ne!(tx.coin_output_id(0), tx.coin_output_id(1));

        let mut other = sample_tx();
        other.arbitrary_data = b"other".to_vec();
        assert_ne!(tx.id(), other.id());
    }
}
