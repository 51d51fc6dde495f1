#![forbid(unsafe_code)]

use crate::attribute::UserId;
use crate::batch::BatchId;
use crate::roster::ActorId;
use crate::{ContractViolation, MonotonicTimeNs, ReasonCodeId, Refusal, SchemaVersion, Validate};

pub const DISCLOSURE_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Gateway-issued correlation id. The only synchronization token across
/// the request/callback boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OracleRequestId(pub u128);

impl Validate for OracleRequestId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "oracle_request_id",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

/// Identity of this registry deployment, mixed into every state
/// commitment so commitments never collide across deployments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceIdentity(String);

impl ServiceIdentity {
    pub fn new(v: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(v.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for ServiceIdentity {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "service_identity",
                reason: "must not be empty",
            });
        }
        if self.0.len() > 128 {
            return Err(ContractViolation::InvalidValue {
                field: "service_identity",
                reason: "exceeds max length",
            });
        }
        Ok(())
    }
}

/// SHA-256 digest over the ordered handle projections and the service
/// identity, as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateCommitment(String);

impl StateCommitment {
    pub fn new(v: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(v.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for StateCommitment {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0.len() != 64 || !self.0.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ContractViolation::InvalidValue {
                field: "state_commitment",
                reason: "must be lowercase hex sha256 (64 chars)",
            });
        }
        if self.0.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(ContractViolation::InvalidValue {
                field: "state_commitment",
                reason: "must be lowercase hex sha256 (64 chars)",
            });
        }
        Ok(())
    }
}

/// Opaque proof material returned by the gateway alongside cleartexts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisclosureProof(Vec<u8>);

impl DisclosureProof {
    pub fn new(bytes: Vec<u8>) -> Result<Self, ContractViolation> {
        let p = Self(bytes);
        p.validate()?;
        Ok(p)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Validate for DisclosureProof {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "disclosure_proof",
                reason: "must not be empty",
            });
        }
        if self.0.len() > 128 {
            return Err(ContractViolation::InvalidValue {
                field: "disclosure_proof",
                reason: "must be <= 128 bytes",
            });
        }
        Ok(())
    }
}

/// Pending-disclosure context. The target (batch, user) is bound here at
/// request time; the callback resolves strictly from this binding and
/// never from the callback caller's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisclosureContextRecord {
    pub schema_version: SchemaVersion,
    pub request_id: OracleRequestId,
    pub batch_id: BatchId,
    pub user_id: UserId,
    pub requested_by: ActorId,
    pub commitment: StateCommitment,
    pub processed: bool,
    pub requested_at: MonotonicTimeNs,
}

impl DisclosureContextRecord {
    pub fn v1(
        request_id: OracleRequestId,
        batch_id: BatchId,
        user_id: UserId,
        requested_by: ActorId,
        commitment: StateCommitment,
        requested_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: DISCLOSURE_CONTRACT_VERSION,
            request_id,
            batch_id,
            user_id,
            requested_by,
            commitment,
            processed: false,
            requested_at,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for DisclosureContextRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != DISCLOSURE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "disclosure_context.schema_version",
                reason: "must match DISCLOSURE_CONTRACT_VERSION",
            });
        }
        self.request_id.validate()?;
        self.batch_id.validate()?;
        self.user_id.validate()?;
        self.requested_by.validate()?;
        self.commitment.validate()?;
        if self.requested_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "disclosure_context.requested_at",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisclosureAction {
    Requested,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisclosureLedgerEventInput {
    pub schema_version: SchemaVersion,
    pub created_at: MonotonicTimeNs,
    pub request_id: OracleRequestId,
    pub batch_id: BatchId,
    pub user_id: UserId,
    pub action: DisclosureAction,
    pub disclosed_value: Option<u64>,
    pub reason_code: ReasonCodeId,
}

impl DisclosureLedgerEventInput {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        created_at: MonotonicTimeNs,
        request_id: OracleRequestId,
        batch_id: BatchId,
        user_id: UserId,
        action: DisclosureAction,
        disclosed_value: Option<u64>,
        reason_code: ReasonCodeId,
    ) -> Result<Self, ContractViolation> {
        let row = Self {
            schema_version: DISCLOSURE_CONTRACT_VERSION,
            created_at,
            request_id,
            batch_id,
            user_id,
            action,
            disclosed_value,
            reason_code,
        };
        row.validate()?;
        Ok(row)
    }
}

impl Validate for DisclosureLedgerEventInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != DISCLOSURE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "disclosure_ledger_event_input.schema_version",
                reason: "must match DISCLOSURE_CONTRACT_VERSION",
            });
        }
        if self.created_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "disclosure_ledger_event_input.created_at",
                reason: "must be > 0",
            });
        }
        self.request_id.validate()?;
        self.batch_id.validate()?;
        self.user_id.validate()?;
        if self.reason_code.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "disclosure_ledger_event_input.reason_code",
                reason: "must be > 0",
            });
        }
        // A completion row carries the disclosed value; a request row never does.
        match self.action {
            DisclosureAction::Requested => {
                if self.disclosed_value.is_some() {
                    return Err(ContractViolation::InvalidValue {
                        field: "disclosure_ledger_event_input.disclosed_value",
                        reason: "must be absent for request rows",
                    });
                }
            }
            DisclosureAction::Completed => {
                if self.disclosed_value.is_none() {
                    return Err(ContractViolation::InvalidValue {
                        field: "disclosure_ledger_event_input.disclosed_value",
                        reason: "required for completion rows",
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisclosureLedgerEvent {
    pub schema_version: SchemaVersion,
    pub disclosure_event_id: u64,
    pub created_at: MonotonicTimeNs,
    pub request_id: OracleRequestId,
    pub batch_id: BatchId,
    pub user_id: UserId,
    pub action: DisclosureAction,
    pub disclosed_value: Option<u64>,
    pub reason_code: ReasonCodeId,
}

impl DisclosureLedgerEvent {
    pub fn from_input_v1(
        disclosure_event_id: u64,
        input: DisclosureLedgerEventInput,
    ) -> Result<Self, ContractViolation> {
        input.validate()?;
        if disclosure_event_id == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "disclosure_ledger_event.disclosure_event_id",
                reason: "must be > 0",
            });
        }
        Ok(Self {
            schema_version: DISCLOSURE_CONTRACT_VERSION,
            disclosure_event_id,
            created_at: input.created_at,
            request_id: input.request_id,
            batch_id: input.batch_id,
            user_id: input.user_id,
            action: input.action,
            disclosed_value: input.disclosed_value,
            reason_code: input.reason_code,
        })
    }
}

/// Provider-initiated half: ask the gateway to disclose the sealed age
/// of (batch, user).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisclosureRequest {
    pub schema_version: SchemaVersion,
    pub now: MonotonicTimeNs,
    pub provider_id: ActorId,
    pub batch_id: BatchId,
    pub user_id: UserId,
}

impl DisclosureRequest {
    pub fn v1(
        now: MonotonicTimeNs,
        provider_id: ActorId,
        batch_id: BatchId,
        user_id: UserId,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: DISCLOSURE_CONTRACT_VERSION,
            now,
            provider_id,
            batch_id,
            user_id,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for DisclosureRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != DISCLOSURE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "disclosure_request.schema_version",
                reason: "must match DISCLOSURE_CONTRACT_VERSION",
            });
        }
        if self.now.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "disclosure_request.now",
                reason: "must be > 0",
            });
        }
        self.provider_id.validate()?;
        // Out-of-range ids (including 0) are refused by the runtime so the
        // failure is observable; only the actor and user shapes are hard
        // contract requirements here.
        self.user_id.validate()
    }
}

/// Gateway-initiated half: the asynchronous response correlated by the
/// request id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleCallbackRequest {
    pub schema_version: SchemaVersion,
    pub now: MonotonicTimeNs,
    pub request_id: OracleRequestId,
    pub cleartexts: Vec<u64>,
    pub proof: DisclosureProof,
}

impl OracleCallbackRequest {
    pub fn v1(
        now: MonotonicTimeNs,
        request_id: OracleRequestId,
        cleartexts: Vec<u64>,
        proof: DisclosureProof,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: DISCLOSURE_CONTRACT_VERSION,
            now,
            request_id,
            cleartexts,
            proof,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for OracleCallbackRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != DISCLOSURE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "oracle_callback_request.schema_version",
                reason: "must match DISCLOSURE_CONTRACT_VERSION",
            });
        }
        if self.now.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "oracle_callback_request.now",
                reason: "must be > 0",
            });
        }
        self.request_id.validate()?;
        if self.cleartexts.len() > 16 {
            return Err(ContractViolation::InvalidValue {
                field: "oracle_callback_request.cleartexts",
                reason: "must be <= 16 words",
            });
        }
        self.proof.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisclosureRequestedResult {
    pub schema_version: SchemaVersion,
    pub request_id: OracleRequestId,
    pub batch_id: BatchId,
    pub commitment: StateCommitment,
    pub disclosure_event_id: u64,
}

impl DisclosureRequestedResult {
    pub fn v1(
        request_id: OracleRequestId,
        batch_id: BatchId,
        commitment: StateCommitment,
        disclosure_event_id: u64,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: DISCLOSURE_CONTRACT_VERSION,
            request_id,
            batch_id,
            commitment,
            disclosure_event_id,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for DisclosureRequestedResult {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != DISCLOSURE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "disclosure_requested_result.schema_version",
                reason: "must match DISCLOSURE_CONTRACT_VERSION",
            });
        }
        self.request_id.validate()?;
        self.batch_id.validate()?;
        self.commitment.validate()?;
        if self.disclosure_event_id == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "disclosure_requested_result.disclosure_event_id",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisclosureCompletedResult {
    pub schema_version: SchemaVersion,
    pub request_id: OracleRequestId,
    pub batch_id: BatchId,
    pub user_id: UserId,
    pub disclosed_value: u64,
    pub disclosure_event_id: u64,
}

impl DisclosureCompletedResult {
    pub fn v1(
        request_id: OracleRequestId,
        batch_id: BatchId,
        user_id: UserId,
        disclosed_value: u64,
        disclosure_event_id: u64,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: DISCLOSURE_CONTRACT_VERSION,
            request_id,
            batch_id,
            user_id,
            disclosed_value,
            disclosure_event_id,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for DisclosureCompletedResult {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != DISCLOSURE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "disclosure_completed_result.schema_version",
                reason: "must match DISCLOSURE_CONTRACT_VERSION",
            });
        }
        self.request_id.validate()?;
        self.batch_id.validate()?;
        self.user_id.validate()?;
        if self.disclosure_event_id == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "disclosure_completed_result.disclosure_event_id",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisclosureResponse {
    Requested(DisclosureRequestedResult),
    Refuse(Refusal),
}

impl Validate for DisclosureResponse {
    fn validate(&self) -> Result<(), ContractViolation> {
        match self {
            DisclosureResponse::Requested(r) => r.validate(),
            DisclosureResponse::Refuse(r) => r.validate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackResponse {
    Completed(DisclosureCompletedResult),
    Refuse(Refusal),
}

impl Validate for CallbackResponse {
    fn validate(&self) -> Result<(), ContractViolation> {
        match self {
            CallbackResponse::Completed(r) => r.validate(),
            CallbackResponse::Refuse(r) => r.validate(),
        }
    }
}
