#![forbid(unsafe_code)]

use sha2::{Digest, Sha256};
use themis_engines::gateway::DecryptionGateway;
use themis_kernel_contracts::attribute::{AttributeRecord, SealedAttribute};
use themis_kernel_contracts::disclosure::{
    CallbackResponse, DisclosureAction, DisclosureCompletedResult, DisclosureContextRecord,
    DisclosureLedgerEventInput, DisclosureRequest, DisclosureRequestedResult, DisclosureResponse,
    OracleCallbackRequest, ServiceIdentity, StateCommitment,
};
use themis_kernel_contracts::{ContractViolation, ReasonCodeId, RefuseKind, Refusal, Validate};
use themis_storage::{RegistryStore, StorageError};

use crate::cooldown::request_cooldown_active;

pub mod reason_codes {
    use themis_kernel_contracts::ReasonCodeId;

    // Disclosure reason-code namespace.
    pub const REQUESTED: ReasonCodeId = ReasonCodeId(0x4449_0001);
    pub const COMPLETED: ReasonCodeId = ReasonCodeId(0x4449_0002);

    pub const NOT_PROVIDER: ReasonCodeId = ReasonCodeId(0x4449_00F1);
    pub const PAUSED: ReasonCodeId = ReasonCodeId(0x4449_00F2);
    pub const COOLDOWN_ACTIVE: ReasonCodeId = ReasonCodeId(0x4449_00F3);
    pub const BATCH_OUT_OF_RANGE: ReasonCodeId = ReasonCodeId(0x4449_00F4);
    pub const NOT_A_MEMBER: ReasonCodeId = ReasonCodeId(0x4449_00F5);
    pub const GATEWAY_REJECTED: ReasonCodeId = ReasonCodeId(0x4449_00F6);
    pub const REPLAY_DETECTED: ReasonCodeId = ReasonCodeId(0x4449_00F7);
    pub const STATE_MISMATCH: ReasonCodeId = ReasonCodeId(0x4449_00F8);
    pub const INVALID_PROOF: ReasonCodeId = ReasonCodeId(0x4449_00F9);
    pub const MALFORMED_CLEARTEXTS: ReasonCodeId = ReasonCodeId(0x4449_00FA);
}

/// Where gateway callbacks land. Handed to the gateway on every request.
pub const DISCLOSURE_CALLBACK_REF: &str = "themis_registry/disclosure_callback/v1";

/// Number of cleartext words an age disclosure decodes: exactly one.
const AGE_DISCLOSURE_WORDS: usize = 1;

/// The ordered handle list a disclosure covers. Request and callback
/// both build it through this one function; that shared ordering is what
/// makes the commitment comparison meaningful.
pub fn ordered_disclosure_handles(record: &AttributeRecord) -> Vec<SealedAttribute> {
    vec![record.sealed_age.clone()]
}

/// SHA-256 over the length-framed handle projections and the service
/// identity, as lowercase hex.
pub fn state_commitment(
    handles: &[SealedAttribute],
    service_identity: &ServiceIdentity,
) -> Result<StateCommitment, ContractViolation> {
    let mut hasher = Sha256::new();
    for handle in handles {
        let bytes = handle.commitment_bytes();
        hasher.update((bytes.len() as u64).to_be_bytes());
        hasher.update(&bytes);
    }
    hasher.update(service_identity.as_str().as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    StateCommitment::new(hex)
}

/// Both halves of the asynchronous disclosure protocol. The request half
/// snapshots and commits; the callback half re-derives, verifies, and
/// finalizes exactly once per correlation id.
#[derive(Debug, Default, Clone)]
pub struct DisclosureRuntime;

impl DisclosureRuntime {
    /// Provider-initiated half: commit to the current sealed state of
    /// (batch, user) and hand the handle list to the gateway.
    /// Non-blocking; the result arrives later through `run_callback`.
    pub fn run_request(
        &self,
        store: &mut RegistryStore,
        gateway: &mut dyn DecryptionGateway,
        req: &DisclosureRequest,
    ) -> Result<DisclosureResponse, StorageError> {
        req.validate().map_err(StorageError::ContractViolation)?;

        if !store.is_provider(&req.provider_id) {
            return refuse_request(
                RefuseKind::Authorization,
                reason_codes::NOT_PROVIDER,
                "caller is not an accredited provider",
            );
        }
        if store.paused() {
            return refuse_request(
                RefuseKind::Lifecycle,
                reason_codes::PAUSED,
                "registry is paused",
            );
        }
        if request_cooldown_active(store, &req.provider_id, req.now) {
            return refuse_request(
                RefuseKind::RateLimit,
                reason_codes::COOLDOWN_ACTIVE,
                "request cooldown has not elapsed for this provider",
            );
        }
        if req.batch_id.0 == 0 || req.batch_id > store.current_batch_id() {
            return refuse_request(
                RefuseKind::Lifecycle,
                reason_codes::BATCH_OUT_OF_RANGE,
                "batch id is out of range",
            );
        }
        if !store.is_member(req.batch_id, &req.user_id) {
            return refuse_request(
                RefuseKind::Lifecycle,
                reason_codes::NOT_A_MEMBER,
                "user is not enrolled in the named batch",
            );
        }
        let record = store.record(req.batch_id, &req.user_id).ok_or_else(|| {
            StorageError::ForeignKeyViolation {
                table: "attribute_records",
                key: format!("{}:{}", req.batch_id.0, req.user_id.as_str()),
            }
        })?;

        let handles = ordered_disclosure_handles(record);
        let commitment = state_commitment(&handles, store.service_identity())
            .map_err(StorageError::ContractViolation)?;

        let request_id = match gateway.request_decryption(&handles, DISCLOSURE_CALLBACK_REF) {
            Ok(id) => id,
            Err(_) => {
                return refuse_request(
                    RefuseKind::Integrity,
                    reason_codes::GATEWAY_REJECTED,
                    "gateway rejected the decryption request",
                );
            }
        };

        let context = DisclosureContextRecord::v1(
            request_id,
            req.batch_id,
            req.user_id.clone(),
            req.provider_id.clone(),
            commitment.clone(),
            req.now,
        )
        .map_err(StorageError::ContractViolation)?;
        store.insert_context(context)?;
        store.touch_request_time(req.provider_id.clone(), req.now);

        let event_id = store.append_disclosure_event(DisclosureLedgerEventInput::v1(
            req.now,
            request_id,
            req.batch_id,
            req.user_id.clone(),
            DisclosureAction::Requested,
            None,
            reason_codes::REQUESTED,
        )?)?;

        let result = DisclosureRequestedResult::v1(request_id, req.batch_id, commitment, event_id)
            .map_err(StorageError::ContractViolation)?;
        Ok(DisclosureResponse::Requested(result))
    }

    /// Gateway-initiated half. Deliberately not gated by the pause flag:
    /// a response to an already-committed request is always admissible.
    /// A refused callback leaves the context unprocessed and retryable.
    pub fn run_callback(
        &self,
        store: &mut RegistryStore,
        gateway: &dyn DecryptionGateway,
        req: &OracleCallbackRequest,
    ) -> Result<CallbackResponse, StorageError> {
        req.validate().map_err(StorageError::ContractViolation)?;

        // 1. Replay guard: unknown and consumed ids refuse identically.
        let Some(context) = store.context(req.request_id) else {
            return refuse_callback(
                reason_codes::REPLAY_DETECTED,
                "unknown or already consumed correlation id",
            );
        };
        if context.processed {
            return refuse_callback(
                reason_codes::REPLAY_DETECTED,
                "unknown or already consumed correlation id",
            );
        }
        let batch_id = context.batch_id;
        let user_id = context.user_id.clone();
        let committed = context.commitment.clone();

        // 2. State re-derivation against the target bound at request time.
        let Some(record) = store.record(batch_id, &user_id) else {
            return refuse_callback(
                reason_codes::STATE_MISMATCH,
                "committed record is no longer present",
            );
        };
        let handles = ordered_disclosure_handles(record);
        let recomputed = state_commitment(&handles, store.service_identity())
            .map_err(StorageError::ContractViolation)?;
        if recomputed != committed {
            return refuse_callback(
                reason_codes::STATE_MISMATCH,
                "state commitment does not match the one recorded at request time",
            );
        }

        // 3. Proof verification.
        if !gateway.verify_response(req.request_id, &req.cleartexts, &req.proof) {
            return refuse_callback(
                reason_codes::INVALID_PROOF,
                "gateway proof does not verify",
            );
        }

        // 4. Decode: one unsigned integer, the disclosed age.
        if req.cleartexts.len() != AGE_DISCLOSURE_WORDS {
            return refuse_callback(
                reason_codes::MALFORMED_CLEARTEXTS,
                "age disclosure decodes exactly one cleartext word",
            );
        }
        let disclosed_value = req.cleartexts[0];

        // 5. Finalize: terminal single-use transition, then the
        // completion row.
        store.mark_context_processed(req.request_id)?;
        let event_id = store.append_disclosure_event(DisclosureLedgerEventInput::v1(
            req.now,
            req.request_id,
            batch_id,
            user_id.clone(),
            DisclosureAction::Completed,
            Some(disclosed_value),
            reason_codes::COMPLETED,
        )?)?;

        let result = DisclosureCompletedResult::v1(
            req.request_id,
            batch_id,
            user_id,
            disclosed_value,
            event_id,
        )
        .map_err(StorageError::ContractViolation)?;
        Ok(CallbackResponse::Completed(result))
    }
}

fn refuse_request(
    kind: RefuseKind,
    reason_code: ReasonCodeId,
    message: &str,
) -> Result<DisclosureResponse, StorageError> {
    Ok(DisclosureResponse::Refuse(
        Refusal::v1(kind, reason_code, message).map_err(StorageError::ContractViolation)?,
    ))
}

fn refuse_callback(
    reason_code: ReasonCodeId,
    message: &str,
) -> Result<CallbackResponse, StorageError> {
    Ok(CallbackResponse::Refuse(
        Refusal::v1(RefuseKind::Integrity, reason_code, message)
            .map_err(StorageError::ContractViolation)?,
    ))
}
