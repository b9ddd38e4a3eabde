//! The per-output ledger record and its read projections.

use serde::{Deserialize, Serialize};

use lib_types::{CodecError, Currency, Decoder, Encoder, Timestamp};

/// The single persisted entity of the custody-fee ledger, keyed by coin
/// output id.
///
/// `creation_time` and `creation_value` are immutable once written.
/// `fee_computation_time` is `0` until the output is spent, then holds the
/// spending block's timestamp; a revert restores it to `0`. Custody-fee
/// outputs themselves are flagged and never participate in later fee
/// accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinOutputRecord {
    pub creation_time: Timestamp,
    pub creation_value: Currency,
    pub fee_computation_time: Timestamp,
    pub is_custody_fee: bool,
}

impl CoinOutputRecord {
    pub fn new_unspent(creation_time: Timestamp, creation_value: Currency, is_custody_fee: bool) -> Self {
        Self { creation_time, creation_value, fee_computation_time: 0, is_custody_fee }
    }

    pub fn spent(&self) -> bool {
        !self.is_custody_fee && self.fee_computation_time > 0
    }

    /// Canonical value layout: creation time, creation value, fee
    /// computation time, custody-fee flag.
    pub fn encode(&self, enc: &mut Encoder) {
        enc.put_u64(self.creation_time);
        self.creation_value.encode(enc);
        enc.put_u64(self.fee_computation_time);
        enc.put_bool(self.is_custody_fee);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        self.encode(&mut enc);
        enc.finish()
    }

    pub fn decode(dec: &mut Decoder<'_>) -> Result<Self, CodecError> {
        let creation_time = dec.take_u64()?;
        let creation_value = Currency::decode(dec)?;
        let fee_computation_time = dec.take_u64()?;
        let is_custody_fee = dec.take_bool()?;
        Ok(Self { creation_time, creation_value, fee_computation_time, is_custody_fee })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut dec = Decoder::new(bytes);
        let record = Self::decode(&mut dec)?;
        dec.finish()?;
        Ok(record)
    }
}

/// The raw record as read callers see it, before any fee arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinOutputInfoPreComputation {
    #[serde(rename = "creationtime")]
    pub creation_time: Timestamp,
    #[serde(rename = "creationvalue")]
    pub creation_value: Currency,
    #[serde(rename = "iscustodyfee")]
    pub is_custody_fee: bool,
    pub spent: bool,
    #[serde(rename = "feecomputationtime")]
    pub fee_computation_time: Timestamp,
}

impl From<CoinOutputRecord> for CoinOutputInfoPreComputation {
    fn from(record: CoinOutputRecord) -> Self {
        let spent = record.spent();
        Self {
            creation_time: record.creation_time,
            creation_value: record.creation_value,
            is_custody_fee: record.is_custody_fee,
            spent,
            fee_computation_time: record.fee_computation_time,
        }
    }
}

/// A record with its custody fee computed at a concrete chain time.
///
/// For unspent outputs `fee_computation_time` is the chain time the caller
/// asked about; for spent outputs it is the time the fee was actually
/// computed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinOutputInfo {
    #[serde(rename = "creationtime")]
    pub creation_time: Timestamp,
    #[serde(rename = "creationvalue")]
    pub creation_value: Currency,
    #[serde(rename = "iscustodyfee")]
    pub is_custody_fee: bool,
    pub spent: bool,
    #[serde(rename = "feecomputationtime")]
    pub fee_computation_time: Timestamp,
    #[serde(rename = "custodyfee")]
    pub custody_fee: Currency,
    #[serde(rename = "spendablevalue")]
    pub spendable_value: Currency,
}
