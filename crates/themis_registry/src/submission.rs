#![forbid(unsafe_code)]

use themis_kernel_contracts::attribute::{
    AttributeRecord, SubmissionLedgerEventInput, SubmissionOk, SubmissionResponse,
    SubmissionResult, SubmitRequest,
};
use themis_kernel_contracts::{ReasonCodeId, RefuseKind, Refusal, Validate};
use themis_storage::{RegistryStore, StorageError};

use crate::cooldown::submission_cooldown_active;

pub mod reason_codes {
    use themis_kernel_contracts::ReasonCodeId;

    // Submission reason-code namespace.
    pub const SUBMITTED: ReasonCodeId = ReasonCodeId(0x5355_0001);

    pub const NOT_PROVIDER: ReasonCodeId = ReasonCodeId(0x5355_00F1);
    pub const PAUSED: ReasonCodeId = ReasonCodeId(0x5355_00F2);
    pub const COOLDOWN_ACTIVE: ReasonCodeId = ReasonCodeId(0x5355_00F3);
    pub const BATCH_CLOSED: ReasonCodeId = ReasonCodeId(0x5355_00F4);
    pub const ALREADY_ENROLLED: ReasonCodeId = ReasonCodeId(0x5355_00F5);
    pub const HANDLE_NOT_INITIALIZED: ReasonCodeId = ReasonCodeId(0x5355_00F6);
}

/// The single write path for attribute records: provider-gated
/// submission of both sealed handles into the current batch. Every
/// precondition refuses before any table is touched, so a refused
/// submission leaves no partial record, membership, or timestamp state.
#[derive(Debug, Default, Clone)]
pub struct SubmissionRuntime;

impl SubmissionRuntime {
    pub fn run(
        &self,
        store: &mut RegistryStore,
        req: &SubmitRequest,
    ) -> Result<SubmissionResponse, StorageError> {
        req.validate().map_err(StorageError::ContractViolation)?;

        if !store.is_provider(&req.provider_id) {
            return refuse(
                RefuseKind::Authorization,
                reason_codes::NOT_PROVIDER,
                "caller is not an accredited provider",
            );
        }
        if store.paused() {
            return refuse(
                RefuseKind::Lifecycle,
                reason_codes::PAUSED,
                "registry is paused",
            );
        }
        if submission_cooldown_active(store, &req.user_id, req.now) {
            return refuse(
                RefuseKind::RateLimit,
                reason_codes::COOLDOWN_ACTIVE,
                "submission cooldown has not elapsed for this user",
            );
        }
        let batch_id = store.current_batch_id();
        if store.batch_is_closed(batch_id)? {
            return refuse(
                RefuseKind::Lifecycle,
                reason_codes::BATCH_CLOSED,
                "current batch is closed",
            );
        }
        if store.is_member(batch_id, &req.user_id) {
            return refuse(
                RefuseKind::Lifecycle,
                reason_codes::ALREADY_ENROLLED,
                "user is already enrolled in the current batch",
            );
        }
        if !req.sealed_age.is_initialized() || !req.sealed_jurisdiction.is_initialized() {
            return refuse(
                RefuseKind::Integrity,
                reason_codes::HANDLE_NOT_INITIALIZED,
                "sealed handle is not initialized",
            );
        }

        let record = AttributeRecord::v1(
            batch_id,
            req.user_id.clone(),
            req.sealed_age.clone(),
            req.sealed_jurisdiction.clone(),
            req.provider_id.clone(),
            req.now,
        )
        .map_err(StorageError::ContractViolation)?;

        let payload_hash = submission_payload_hash(&record);
        store.insert_record(record)?;
        store.touch_submission_time(req.user_id.clone(), req.now);

        let event_id = store.append_submission_event(SubmissionLedgerEventInput::v1(
            req.now,
            batch_id,
            req.user_id.clone(),
            req.provider_id.clone(),
            payload_hash,
            reason_codes::SUBMITTED,
        )?)?;

        let result = SubmissionResult::v1(batch_id, req.user_id.clone(), event_id)
            .map_err(StorageError::ContractViolation)?;
        Ok(SubmissionResponse::Ok(
            SubmissionOk::v1(reason_codes::SUBMITTED, result)
                .map_err(StorageError::ContractViolation)?,
        ))
    }
}

fn refuse(
    kind: RefuseKind,
    reason_code: ReasonCodeId,
    message: &str,
) -> Result<SubmissionResponse, StorageError> {
    Ok(SubmissionResponse::Refuse(
        Refusal::v1(kind, reason_code, message).map_err(StorageError::ContractViolation)?,
    ))
}

fn submission_payload_hash(record: &AttributeRecord) -> String {
    let hex = short_hash_hex(&[
        record.batch_id.0.to_be_bytes().as_slice(),
        record.user_id.as_str().as_bytes(),
        record.submitted_by.as_str().as_bytes(),
        &record.sealed_age.commitment_bytes(),
        &record.sealed_jurisdiction.commitment_bytes(),
    ]);
    format!("sealed_payload_{hex}")
}

fn short_hash_hex(parts: &[&[u8]]) -> String {
    // FNV-1a 64-bit; deterministic and bounded for ledger payload refs.
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut h = OFFSET;
    for part in parts {
        for &b in *part {
            h ^= b as u64;
            h = h.wrapping_mul(PRIME);
        }
        // Stable delimiter to avoid accidental concatenation ambiguity.
        h ^= b'|' as u64;
        h = h.wrapping_mul(PRIME);
    }
    format!("{h:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use themis_kernel_contracts::attribute::{SealedAttribute, UserId, SEALED_NONCE_LEN};
    use themis_kernel_contracts::batch::BatchId;
    use themis_kernel_contracts::disclosure::ServiceIdentity;
    use themis_kernel_contracts::roster::{ActorId, CooldownSeconds};
    use themis_kernel_contracts::MonotonicTimeNs;

    const SECOND: u64 = 1_000_000_000;

    fn store_with_provider() -> RegistryStore {
        let mut s = RegistryStore::new_in_memory(
            ActorId::new("owner_1").unwrap(),
            ServiceIdentity::new("themis_registry_test").unwrap(),
            CooldownSeconds(60),
        )
        .unwrap();
        s.add_provider(ActorId::new("provider_1").unwrap()).unwrap();
        s
    }

    fn actor(id: &str) -> ActorId {
        ActorId::new(id).unwrap()
    }

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn sealed(fill: u8) -> SealedAttribute {
        SealedAttribute::from_parts(vec![fill; SEALED_NONCE_LEN], vec![fill; 24])
    }

    fn submit_req(user_id: &str, now: u64) -> SubmitRequest {
        SubmitRequest::v1(
            MonotonicTimeNs(now),
            actor("provider_1"),
            user(user_id),
            sealed(1),
            sealed(2),
        )
        .unwrap()
    }

    fn refusal(resp: SubmissionResponse) -> Refusal {
        match resp {
            SubmissionResponse::Refuse(r) => r,
            SubmissionResponse::Ok(_) => panic!("expected refuse"),
        }
    }

    #[test]
    fn happy_path_stores_record_membership_timestamp_and_event() {
        let rt = SubmissionRuntime;
        let mut s = store_with_provider();
        let resp = rt.run(&mut s, &submit_req("user_a", 10)).unwrap();
        match resp {
            SubmissionResponse::Ok(ok) => {
                assert_eq!(ok.result.batch_id, BatchId(1));
                assert_eq!(ok.result.submission_event_id, 1);
            }
            SubmissionResponse::Refuse(r) => panic!("unexpected refuse: {:?}", r.reason_code),
        }
        assert!(s.has_record(BatchId(1), &user("user_a")));
        assert!(s.is_member(BatchId(1), &user("user_a")));
        assert_eq!(s.last_submission_at(&user("user_a")), Some(MonotonicTimeNs(10)));
        assert_eq!(s.submission_ledger_rows().len(), 1);
    }

    #[test]
    fn non_provider_is_refused() {
        let rt = SubmissionRuntime;
        let mut s = store_with_provider();
        let req = SubmitRequest::v1(
            MonotonicTimeNs(10),
            actor("mallory"),
            user("user_a"),
            sealed(1),
            sealed(2),
        )
        .unwrap();
        let r = refusal(rt.run(&mut s, &req).unwrap());
        assert_eq!(r.kind, RefuseKind::Authorization);
        assert_eq!(r.reason_code, reason_codes::NOT_PROVIDER);
    }

    #[test]
    fn paused_registry_refuses_submission() {
        let rt = SubmissionRuntime;
        let mut s = store_with_provider();
        s.set_paused(true);
        let r = refusal(rt.run(&mut s, &submit_req("user_a", 10)).unwrap());
        assert_eq!(r.kind, RefuseKind::Lifecycle);
        assert_eq!(r.reason_code, reason_codes::PAUSED);
    }

    #[test]
    fn submission_cooldown_gates_per_user() {
        let rt = SubmissionRuntime;
        let mut s = store_with_provider();
        let t = 100 * SECOND;
        rt.run(&mut s, &submit_req("user_a", t)).unwrap();

        // Same user again inside the window, into the next batch.
        s.open_next_batch();
        let r = refusal(rt.run(&mut s, &submit_req("user_a", t + 30 * SECOND)).unwrap());
        assert_eq!(r.kind, RefuseKind::RateLimit);
        assert_eq!(r.reason_code, reason_codes::COOLDOWN_ACTIVE);

        // Elapsed at t + 61s.
        match rt.run(&mut s, &submit_req("user_a", t + 61 * SECOND)).unwrap() {
            SubmissionResponse::Ok(ok) => assert_eq!(ok.result.batch_id, BatchId(2)),
            SubmissionResponse::Refuse(r) => panic!("unexpected refuse: {:?}", r.reason_code),
        }
    }

    #[test]
    fn closed_batch_refuses_regardless_of_cooldown() {
        let rt = SubmissionRuntime;
        let mut s = store_with_provider();
        s.close_current_batch().unwrap();
        let r = refusal(rt.run(&mut s, &submit_req("user_a", 10)).unwrap());
        assert_eq!(r.kind, RefuseKind::Lifecycle);
        assert_eq!(r.reason_code, reason_codes::BATCH_CLOSED);
    }

    #[test]
    fn second_submission_of_same_user_in_same_batch_is_refused() {
        let rt = SubmissionRuntime;
        let mut s = store_with_provider();
        let t = 100 * SECOND;
        rt.run(&mut s, &submit_req("user_a", t)).unwrap();

        let r = refusal(rt.run(&mut s, &submit_req("user_a", t + 120 * SECOND)).unwrap());
        assert_eq!(r.kind, RefuseKind::Lifecycle);
        assert_eq!(r.reason_code, reason_codes::ALREADY_ENROLLED);

        // The same user enrolls independently in a later open batch.
        s.open_next_batch();
        match rt
            .run(&mut s, &submit_req("user_a", t + 240 * SECOND))
            .unwrap()
        {
            SubmissionResponse::Ok(ok) => assert_eq!(ok.result.batch_id, BatchId(2)),
            SubmissionResponse::Refuse(r) => panic!("unexpected refuse: {:?}", r.reason_code),
        }
    }

    #[test]
    fn uninitialized_handle_refuses_with_no_partial_state() {
        let rt = SubmissionRuntime;
        let mut s = store_with_provider();
        let req = SubmitRequest::v1(
            MonotonicTimeNs(10),
            actor("provider_1"),
            user("user_a"),
            SealedAttribute::uninitialized(),
            sealed(2),
        )
        .unwrap();
        let r = refusal(rt.run(&mut s, &req).unwrap());
        assert_eq!(r.kind, RefuseKind::Integrity);
        assert_eq!(r.reason_code, reason_codes::HANDLE_NOT_INITIALIZED);

        assert!(!s.is_member(BatchId(1), &user("user_a")));
        assert!(!s.has_record(BatchId(1), &user("user_a")));
        assert_eq!(s.last_submission_at(&user("user_a")), None);
        assert!(s.submission_ledger_rows().is_empty());
    }
}
