//! Unlock conditions and the explicit condition-type registry.
//!
//! Conditions are modeled as a capability trait behind a proxy, with an
//! explicit [`ConditionRegistry`] owned by whoever wires the process up at
//! startup. Extensions (such as the custody-fee condition) register their
//! condition type there; nothing registers itself through hidden globals.
//!
//! Fulfillment verification proper (signatures, key management) lives
//! outside this subsystem; the hooks here carry exactly enough structure to
//! decide standardness, fulfillability, and lock state.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::codec::{CodecError, Decoder, Encoder};
use crate::config::LOCK_TIME_MIN_TIMESTAMP;
use crate::primitives::{BlockHeight, Timestamp, UnlockHash, UNLOCK_TYPE_NIL, UNLOCK_TYPE_PUBKEY};

/// Condition-type tag, the first byte of every encoded condition.
pub type ConditionType = u8;

pub const CONDITION_TYPE_NIL: ConditionType = 0;
pub const CONDITION_TYPE_UNLOCK_HASH: ConditionType = 1;
pub const CONDITION_TYPE_TIME_LOCK: ConditionType = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConditionError {
    /// The condition cannot be fulfilled by the given (or any) fulfillment.
    #[error("unexpected unlock fulfillment")]
    UnexpectedFulfillment,

    #[error("unlock condition of type {0} is not standard")]
    NonStandard(ConditionType),

    #[error("condition is locked until lock value {0}")]
    Locked(u64),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Chain state a fulfillment is judged against.
#[derive(Debug, Clone, Copy)]
pub struct FulfillContext {
    pub block_height: BlockHeight,
    pub block_time: Timestamp,
}

/// Opaque fulfillment payload. Verification is the wallet/consensus
/// engine's concern; conditions only decide whether one is acceptable at
/// all.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnlockFulfillment {
    pub fulfillment_type: u8,
    pub data: Vec<u8>,
}

impl UnlockFulfillment {
    pub fn encode(&self, enc: &mut Encoder) {
        enc.put_u8(self.fulfillment_type);
        enc.put_slice(&self.data);
    }

    pub fn decode(dec: &mut Decoder<'_>) -> Result<Self, CodecError> {
        let fulfillment_type = dec.take_u8()?;
        let data = dec.take_slice()?.to_vec();
        Ok(Self { fulfillment_type, data })
    }
}

/// The unlock-condition capability set.
pub trait UnlockCondition: fmt::Debug + Send + Sync {
    fn condition_type(&self) -> ConditionType;

    fn unlock_hash(&self) -> UnlockHash;

    /// Syntactic validity. Standard conditions are the only ones accepted
    /// in new transactions.
    fn is_standard(&self) -> Result<(), ConditionError> {
        Ok(())
    }

    fn fulfillable(&self, ctx: &FulfillContext) -> bool;

    fn fulfill(
        &self,
        fulfillment: &UnlockFulfillment,
        ctx: &FulfillContext,
    ) -> Result<(), ConditionError>;

    fn equal(&self, other: &dyn UnlockCondition) -> bool;

    /// Appends the condition payload (without the leading type byte).
    fn marshal(&self, enc: &mut Encoder);

    /// JSON `data` object for the wire form; `Null` when the condition
    /// carries no payload.
    fn json_data(&self) -> serde_json::Value;

    fn clone_box(&self) -> Box<dyn UnlockCondition>;

    fn as_any(&self) -> &dyn Any;
}

/// Owning wrapper around a condition trait object.
pub struct UnlockConditionProxy {
    inner: Box<dyn UnlockCondition>,
}

impl UnlockConditionProxy {
    pub fn new(condition: impl UnlockCondition + 'static) -> Self {
        Self { inner: Box::new(condition) }
    }

    pub fn from_box(inner: Box<dyn UnlockCondition>) -> Self {
        Self { inner }
    }

    pub fn nil() -> Self {
        Self::new(NilCondition)
    }

    pub fn condition_type(&self) -> ConditionType {
        self.inner.condition_type()
    }

    pub fn unlock_hash(&self) -> UnlockHash {
        self.inner.unlock_hash()
    }

    pub fn is_standard(&self) -> Result<(), ConditionError> {
        self.inner.is_standard()
    }

    pub fn fulfillable(&self, ctx: &FulfillContext) -> bool {
        self.inner.fulfillable(ctx)
    }

    pub fn fulfill(
        &self,
        fulfillment: &UnlockFulfillment,
        ctx: &FulfillContext,
    ) -> Result<(), ConditionError> {
        self.inner.fulfill(fulfillment, ctx)
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref::<T>()
    }

    /// Type byte followed by the length-prefixed payload.
    pub fn encode(&self, enc: &mut Encoder) {
        enc.put_u8(self.inner.condition_type());
        let mut payload = Encoder::new();
        self.inner.marshal(&mut payload);
        enc.put_slice(&payload.finish());
    }
}

impl Clone for UnlockConditionProxy {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone_box() }
    }
}

impl PartialEq for UnlockConditionProxy {
    fn eq(&self, other: &Self) -> bool {
        self.inner.equal(other.inner.as_ref())
    }
}

impl Eq for UnlockConditionProxy {}

impl Default for UnlockConditionProxy {
    fn default() -> Self {
        Self::nil()
    }
}

impl fmt::Debug for UnlockConditionProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl Serialize for UnlockConditionProxy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let data = self.inner.json_data();
        let fields = if data.is_null() { 1 } else { 2 };
        let mut st = serializer.serialize_struct("UnlockCondition", fields)?;
        st.serialize_field("type", &self.inner.condition_type())?;
        if !data.is_null() {
            st.serialize_field("data", &data)?;
        }
        st.end()
    }
}

/// Decoder for one condition type. Receives the raw payload and the
/// registry itself so composite conditions can decode their inner
/// condition.
pub type ConditionDecoder =
    fn(&[u8], &ConditionRegistry) -> Result<Box<dyn UnlockCondition>, CodecError>;

/// Explicit mapping from condition-type byte to payload decoder.
///
/// Owned by the protocol layer; extensions add their types at startup.
pub struct ConditionRegistry {
    decoders: BTreeMap<ConditionType, ConditionDecoder>,
}

impl ConditionRegistry {
    /// Registry with the core condition types (nil, unlock-hash,
    /// time-lock) pre-registered.
    pub fn core() -> Self {
        let mut registry = Self { decoders: BTreeMap::new() };
        registry.register(CONDITION_TYPE_NIL, decode_nil);
        registry.register(CONDITION_TYPE_UNLOCK_HASH, decode_unlock_hash);
        registry.register(CONDITION_TYPE_TIME_LOCK, decode_time_lock);
        registry
    }

    /// Registers a decoder for a condition type. Re-registering a type is a
    /// wiring bug.
    pub fn register(&mut self, condition_type: ConditionType, decoder: ConditionDecoder) {
        let previous = self.decoders.insert(condition_type, decoder);
        assert!(
            previous.is_none(),
            "condition type {condition_type} registered twice"
        );
    }

    pub fn is_registered(&self, condition_type: ConditionType) -> bool {
        self.decoders.contains_key(&condition_type)
    }

    pub fn decode_condition(
        &self,
        condition_type: ConditionType,
        payload: &[u8],
    ) -> Result<Box<dyn UnlockCondition>, CodecError> {
        let decoder = self
            .decoders
            .get(&condition_type)
            .ok_or(CodecError::UnknownConditionType(condition_type))?;
        decoder(payload, self)
    }

    /// Reads a type byte plus length-prefixed payload, the inverse of
    /// [`UnlockConditionProxy::encode`].
    pub fn decode_proxy(
        &self,
        dec: &mut Decoder<'_>,
    ) -> Result<UnlockConditionProxy, CodecError> {
        let condition_type = dec.take_u8()?;
        let payload = dec.take_slice()?;
        Ok(UnlockConditionProxy::from_box(
            self.decode_condition(condition_type, payload)?,
        ))
    }
}

impl fmt::Debug for ConditionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionRegistry")
            .field("types", &self.decoders.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// NIL CONDITION
// ============================================================================

/// The empty condition: anyone can spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NilCondition;

impl UnlockCondition for NilCondition {
    fn condition_type(&self) -> ConditionType {
        CONDITION_TYPE_NIL
    }

    fn unlock_hash(&self) -> UnlockHash {
        UnlockHash::new(UNLOCK_TYPE_NIL, [0u8; 32])
    }

    fn fulfillable(&self, _ctx: &FulfillContext) -> bool {
        true
    }

    fn fulfill(
        &self,
        _fulfillment: &UnlockFulfillment,
        _ctx: &FulfillContext,
    ) -> Result<(), ConditionError> {
        Ok(())
    }

    fn equal(&self, other: &dyn UnlockCondition) -> bool {
        other.condition_type() == CONDITION_TYPE_NIL
    }

    fn marshal(&self, _enc: &mut Encoder) {}

    fn json_data(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    fn clone_box(&self) -> Box<dyn UnlockCondition> {
        Box::new(*self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn decode_nil(
    payload: &[u8],
    _registry: &ConditionRegistry,
) -> Result<Box<dyn UnlockCondition>, CodecError> {
    if !payload.is_empty() {
        return Err(CodecError::TrailingBytes);
    }
    Ok(Box::new(NilCondition))
}

// ============================================================================
// UNLOCK HASH CONDITION
// ============================================================================

/// Pays to a single address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnlockHashCondition {
    pub target: UnlockHash,
}

impl UnlockHashCondition {
    pub fn new(target: UnlockHash) -> Self {
        Self { target }
    }
}

impl UnlockCondition for UnlockHashCondition {
    fn condition_type(&self) -> ConditionType {
        CONDITION_TYPE_UNLOCK_HASH
    }

    fn unlock_hash(&self) -> UnlockHash {
        self.target
    }

    fn is_standard(&self) -> Result<(), ConditionError> {
        if self.target.unlock_type == UNLOCK_TYPE_PUBKEY {
            Ok(())
        } else {
            Err(ConditionError::NonStandard(CONDITION_TYPE_UNLOCK_HASH))
        }
    }

    fn fulfillable(&self, _ctx: &FulfillContext) -> bool {
        true
    }

    fn fulfill(
        &self,
        _fulfillment: &UnlockFulfillment,
        _ctx: &FulfillContext,
    ) -> Result<(), ConditionError> {
        // Signature verification happens in the outer consensus engine.
        Ok(())
    }

    fn equal(&self, other: &dyn UnlockCondition) -> bool {
        match other.as_any().downcast_ref::<Self>() {
            Some(o) => self.target == o.target,
            None => false,
        }
    }

    fn marshal(&self, enc: &mut Encoder) {
        self.target.encode(enc);
    }

    fn json_data(&self) -> serde_json::Value {
        serde_json::json!({ "unlockhash": self.target.to_string() })
    }

    fn clone_box(&self) -> Box<dyn UnlockCondition> {
        Box::new(*self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn decode_unlock_hash(
    payload: &[u8],
    _registry: &ConditionRegistry,
) -> Result<Box<dyn UnlockCondition>, CodecError> {
    let mut dec = Decoder::new(payload);
    let target = UnlockHash::decode(&mut dec)?;
    dec.finish()?;
    Ok(Box::new(UnlockHashCondition { target }))
}

// ============================================================================
// TIME LOCK CONDITION
// ============================================================================

/// Wraps an inner condition behind a lock value.
///
/// The lock value is dual-purpose: below [`LOCK_TIME_MIN_TIMESTAMP`] it is a
/// block height, otherwise a unix timestamp.
#[derive(Debug, Clone)]
pub struct TimeLockCondition {
    pub lock_time: u64,
    pub condition: UnlockConditionProxy,
}

impl TimeLockCondition {
    pub fn new(lock_time: u64, condition: UnlockConditionProxy) -> Self {
        Self { lock_time, condition }
    }

    /// Whether the lock is open at the given chain state.
    pub fn lock_reached(&self, ctx: &FulfillContext) -> bool {
        if self.lock_time < LOCK_TIME_MIN_TIMESTAMP {
            ctx.block_height >= self.lock_time
        } else {
            ctx.block_time >= self.lock_time
        }
    }
}

impl UnlockCondition for TimeLockCondition {
    fn condition_type(&self) -> ConditionType {
        CONDITION_TYPE_TIME_LOCK
    }

    fn unlock_hash(&self) -> UnlockHash {
        self.condition.unlock_hash()
    }

    fn is_standard(&self) -> Result<(), ConditionError> {
        if self.lock_time == 0 {
            return Err(ConditionError::NonStandard(CONDITION_TYPE_TIME_LOCK));
        }
        self.condition.is_standard()
    }

    fn fulfillable(&self, ctx: &FulfillContext) -> bool {
        self.lock_reached(ctx) && self.condition.fulfillable(ctx)
    }

    fn fulfill(
        &self,
        fulfillment: &UnlockFulfillment,
        ctx: &FulfillContext,
    ) -> Result<(), ConditionError> {
        if !self.lock_reached(ctx) {
            return Err(ConditionError::Locked(self.lock_time));
        }
        self.condition.fulfill(fulfillment, ctx)
    }

    fn equal(&self, other: &dyn UnlockCondition) -> bool {
        match other.as_any().downcast_ref::<Self>() {
            Some(o) => self.lock_time == o.lock_time && self.condition == o.condition,
            None => false,
        }
    }

    fn marshal(&self, enc: &mut Encoder) {
        enc.put_u64(self.lock_time);
        self.condition.encode(enc);
    }

    fn json_data(&self) -> serde_json::Value {
        serde_json::json!({
            "locktime": self.lock_time,
            "condition": self.condition,
        })
    }

    fn clone_box(&self) -> Box<dyn UnlockCondition> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn decode_time_lock(
    payload: &[u8],
    registry: &ConditionRegistry,
) -> Result<Box<dyn UnlockCondition>, CodecError> {
    let mut dec = Decoder::new(payload);
    let lock_time = dec.take_u64()?;
    let condition = registry.decode_proxy(&mut dec)?;
    dec.finish()?;
    Ok(Box::new(TimeLockCondition { lock_time, condition }))
}
