//! The chain-wide aggregate the explorer maintains.

use serde::{Deserialize, Serialize};

use lib_types::{BlockHeight, CodecError, Currency, Decoder, Encoder, Timestamp};

/// Chain-wide monetary totals plus the tip position, recomputed after every
/// consensus change. All amounts are token-precision units.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChainFacts {
    pub height: BlockHeight,
    pub time: Timestamp,

    /// Liquid value currently spendable, custody fees already deducted.
    #[serde(rename = "spendabletokens")]
    pub spendable_tokens: Currency,
    /// Value still time-locked, custody fees already deducted.
    #[serde(rename = "spendablelockedtokens")]
    pub spendable_locked_tokens: Currency,
    /// Custody fees accrued by all unspent outputs, payable on spend.
    #[serde(rename = "totalcustodyfeedebt")]
    pub total_custody_fee_debt: Currency,

    /// Value transferred by spent outputs, at their spend-time valuation.
    #[serde(rename = "spenttokens")]
    pub spent_tokens: Currency,
    /// Custody fees actually paid out to the sink.
    #[serde(rename = "paidcustodyfees")]
    pub paid_custody_fees: Currency,
}

impl ChainFacts {
    pub fn encode(&self, enc: &mut Encoder) {
        enc.put_u64(self.height);
        enc.put_u64(self.time);
        self.spendable_tokens.encode(enc);
        self.spendable_locked_tokens.encode(enc);
        self.total_custody_fee_debt.encode(enc);
        self.spent_tokens.encode(enc);
        self.paid_custody_fees.encode(enc);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        self.encode(&mut enc);
        enc.finish()
    }

    pub fn decode(dec: &mut Decoder<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            height: dec.take_u64()?,
            time: dec.take_u64()?,
            spendable_tokens: Currency::decode(dec)?,
            spendable_locked_tokens: Currency::decode(dec)?,
            total_custody_fee_debt: Currency::decode(dec)?,
            spent_tokens: Currency::decode(dec)?,
            paid_custody_fees: Currency::decode(dec)?,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut dec = Decoder::new(bytes);
        let facts = Self::decode(&mut dec)?;
        dec.finish()?;
        Ok(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_round_trip() {
        let facts = ChainFacts {
            height: 10,
            time: 86_400,
            spendable_tokens: Currency::from_token_str("99997500").unwrap(),
            spendable_locked_tokens: Currency::from_tokens(12),
            total_custody_fee_debt: Currency::from_token_str("2500").unwrap(),
            spent_tokens: Currency::from_tokens(7),
            paid_custody_fees: Currency::from_units(55),
        };
        assert_eq!(ChainFacts::from_bytes(&facts.to_bytes()).unwrap(), facts);
    }

    #[test]
    fn json_field_names() {
        let json = serde_json::to_value(ChainFacts::default()).unwrap();
        for key in [
            "height",
            "time",
            "spendabletokens",
            "spendablelockedtokens",
            "totalcustodyfeedebt",
            "spenttokens",
            "paidcustodyfees",
        ] {
            assert!(json.get(key).is_some(), "missing field {key}");
        }
    }
}
