#![forbid(unsafe_code)]

use crate::batch::BatchId;
use crate::roster::ActorId;
use crate::{ContractViolation, MonotonicTimeNs, ReasonCodeId, Refusal, SchemaVersion, Validate};

pub const ATTRIBUTE_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// AEAD nonce length of the sealing scheme. A handle whose nonce is not
/// exactly this long is uninitialized.
pub const SEALED_NONCE_LEN: usize = 12;

fn validate_id(field: &'static str, value: &str, max_len: usize) -> Result<(), ContractViolation> {
    if value.trim().is_empty() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must not be empty",
        });
    }
    if value.len() > max_len {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "exceeds max length",
        });
    }
    Ok(())
}

/// The subject a sealed record is about.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(v: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(v.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for UserId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("user_id", &self.0, 128)
    }
}

/// Opaque sealed-attribute handle. The registry never inspects the
/// plaintext behind it; it only checks well-formedness and projects the
/// handle to canonical bytes for hashing and gateway submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedAttribute {
    pub schema_version: SchemaVersion,
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

impl SealedAttribute {
    pub fn from_parts(nonce: Vec<u8>, ciphertext: Vec<u8>) -> Self {
        Self {
            schema_version: ATTRIBUTE_CONTRACT_VERSION,
            nonce,
            ciphertext,
        }
    }

    /// An empty handle, never well-formed. Useful for exercising the
    /// uninitialized-handle refusal path.
    pub fn uninitialized() -> Self {
        Self::from_parts(Vec::new(), Vec::new())
    }

    pub fn is_initialized(&self) -> bool {
        self.nonce.len() == SEALED_NONCE_LEN && !self.ciphertext.is_empty()
    }

    /// Canonical byte projection: nonce followed by ciphertext. This is
    /// the only representation of a handle that enters commitments.
    pub fn commitment_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.nonce.len() + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }
}

impl Validate for SealedAttribute {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != ATTRIBUTE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "sealed_attribute.schema_version",
                reason: "must match ATTRIBUTE_CONTRACT_VERSION",
            });
        }
        if !self.is_initialized() {
            return Err(ContractViolation::InvalidValue {
                field: "sealed_attribute",
                reason: "handle is uninitialized",
            });
        }
        if self.ciphertext.len() > 4096 {
            return Err(ContractViolation::InvalidValue {
                field: "sealed_attribute.ciphertext",
                reason: "must be <= 4096 bytes",
            });
        }
        Ok(())
    }
}

/// One submitted record: both sealed handles for a user in a batch.
/// Written exactly once; the membership check forbids a second write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRecord {
    pub schema_version: SchemaVersion,
    pub batch_id: BatchId,
    pub user_id: UserId,
    pub sealed_age: SealedAttribute,
    pub sealed_jurisdiction: SealedAttribute,
    pub submitted_by: ActorId,
    pub submitted_at: MonotonicTimeNs,
}

impl AttributeRecord {
    pub fn v1(
        batch_id: BatchId,
        user_id: UserId,
        sealed_age: SealedAttribute,
        sealed_jurisdiction: SealedAttribute,
        submitted_by: ActorId,
        submitted_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: ATTRIBUTE_CONTRACT_VERSION,
            batch_id,
            user_id,
            sealed_age,
            sealed_jurisdiction,
            submitted_by,
            submitted_at,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for AttributeRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != ATTRIBUTE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "attribute_record.schema_version",
                reason: "must match ATTRIBUTE_CONTRACT_VERSION",
            });
        }
        self.batch_id.validate()?;
        self.user_id.validate()?;
        self.sealed_age.validate()?;
        self.sealed_jurisdiction.validate()?;
        self.submitted_by.validate()?;
        if self.submitted_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "attribute_record.submitted_at",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionLedgerEventInput {
    pub schema_version: SchemaVersion,
    pub created_at: MonotonicTimeNs,
    pub batch_id: BatchId,
    pub user_id: UserId,
    pub provider_id: ActorId,
    pub payload_hash: String,
    pub reason_code: ReasonCodeId,
}

impl SubmissionLedgerEventInput {
    pub fn v1(
        created_at: MonotonicTimeNs,
        batch_id: BatchId,
        user_id: UserId,
        provider_id: ActorId,
        payload_hash: String,
        reason_code: ReasonCodeId,
    ) -> Result<Self, ContractViolation> {
        let row = Self {
            schema_version: ATTRIBUTE_CONTRACT_VERSION,
            created_at,
            batch_id,
            user_id,
            provider_id,
            payload_hash,
            reason_code,
        };
        row.validate()?;
        Ok(row)
    }
}

impl Validate for SubmissionLedgerEventInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != ATTRIBUTE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "submission_ledger_event_input.schema_version",
                reason: "must match ATTRIBUTE_CONTRACT_VERSION",
            });
        }
        if self.created_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "submission_ledger_event_input.created_at",
                reason: "must be > 0",
            });
        }
        self.batch_id.validate()?;
        self.user_id.validate()?;
        self.provider_id.validate()?;
        validate_id(
            "submission_ledger_event_input.payload_hash",
            &self.payload_hash,
            128,
        )?;
        if self.reason_code.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "submission_ledger_event_input.reason_code",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionLedgerEvent {
    pub schema_version: SchemaVersion,
    pub submission_event_id: u64,
    pub created_at: MonotonicTimeNs,
    pub batch_id: BatchId,
    pub user_id: UserId,
    pub provider_id: ActorId,
    pub payload_hash: String,
    pub reason_code: ReasonCodeId,
}

impl SubmissionLedgerEvent {
    pub fn from_input_v1(
        submission_event_id: u64,
        input: SubmissionLedgerEventInput,
    ) -> Result<Self, ContractViolation> {
        input.validate()?;
        if submission_event_id == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "submission_ledger_event.submission_event_id",
                reason: "must be > 0",
            });
        }
        Ok(Self {
            schema_version: ATTRIBUTE_CONTRACT_VERSION,
            submission_event_id,
            created_at: input.created_at,
            batch_id: input.batch_id,
            user_id: input.user_id,
            provider_id: input.provider_id,
            payload_hash: input.payload_hash,
            reason_code: input.reason_code,
        })
    }
}

/// Submission into the current batch. The handles are carried unvalidated;
/// the runtime refuses uninitialized handles so the failure stays an
/// observable Integrity refusal rather than a contract error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub schema_version: SchemaVersion,
    pub now: MonotonicTimeNs,
    pub provider_id: ActorId,
    pub user_id: UserId,
    pub sealed_age: SealedAttribute,
    pub sealed_jurisdiction: SealedAttribute,
}

impl SubmitRequest {
    pub fn v1(
        now: MonotonicTimeNs,
        provider_id: ActorId,
        user_id: UserId,
        sealed_age: SealedAttribute,
        sealed_jurisdiction: SealedAttribute,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: ATTRIBUTE_CONTRACT_VERSION,
            now,
            provider_id,
            user_id,
            sealed_age,
            sealed_jurisdiction,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for SubmitRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != ATTRIBUTE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "submit_request.schema_version",
                reason: "must match ATTRIBUTE_CONTRACT_VERSION",
            });
        }
        if self.now.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "submit_request.now",
                reason: "must be > 0",
            });
        }
        self.provider_id.validate()?;
        self.user_id.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    pub schema_version: SchemaVersion,
    pub batch_id: BatchId,
    pub user_id: UserId,
    pub submission_event_id: u64,
}

impl SubmissionResult {
    pub fn v1(
        batch_id: BatchId,
        user_id: UserId,
        submission_event_id: u64,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: ATTRIBUTE_CONTRACT_VERSION,
            batch_id,
            user_id,
            submission_event_id,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for SubmissionResult {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != ATTRIBUTE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "submission_result.schema_version",
                reason: "must match ATTRIBUTE_CONTRACT_VERSION",
            });
        }
        self.batch_id.validate()?;
        self.user_id.validate()?;
        if self.submission_event_id == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "submission_result.submission_event_id",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOk {
    pub schema_version: SchemaVersion,
    pub reason_code: ReasonCodeId,
    pub result: SubmissionResult,
}

impl SubmissionOk {
    pub fn v1(
        reason_code: ReasonCodeId,
        result: SubmissionResult,
    ) -> Result<Self, ContractViolation> {
        let o = Self {
            schema_version: ATTRIBUTE_CONTRACT_VERSION,
            reason_code,
            result,
        };
        o.validate()?;
        Ok(o)
    }
}

impl Validate for SubmissionOk {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != ATTRIBUTE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "submission_ok.schema_version",
                reason: "must match ATTRIBUTE_CONTRACT_VERSION",
            });
        }
        if self.reason_code.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "submission_ok.reason_code",
                reason: "must be > 0",
            });
        }
        self.result.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionResponse {
    Ok(SubmissionOk),
    Refuse(Refusal),
}

impl Validate for SubmissionResponse {
    fn validate(&self) -> Result<(), ContractViolation> {
        match self {
            SubmissionResponse::Ok(o) => o.validate(),
            SubmissionResponse::Refuse(r) => r.validate(),
        }
    }
}
