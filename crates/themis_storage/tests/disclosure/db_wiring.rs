#![forbid(unsafe_code)]

use themis_kernel_contracts::attribute::UserId;
use themis_kernel_contracts::batch::BatchId;
use themis_kernel_contracts::disclosure::{
    DisclosureAction, DisclosureContextRecord, DisclosureLedgerEventInput, OracleRequestId,
    ServiceIdentity, StateCommitment,
};
use themis_kernel_contracts::roster::{ActorId, CooldownSeconds};
use themis_kernel_contracts::{MonotonicTimeNs, ReasonCodeId};
use themis_storage::{RegistryStore, StorageError};

fn store() -> RegistryStore {
    RegistryStore::new_in_memory(
        ActorId::new("owner_1").unwrap(),
        ServiceIdentity::new("themis_registry_test").unwrap(),
        CooldownSeconds(60),
    )
    .unwrap()
}

fn context(request_id: u128) -> DisclosureContextRecord {
    DisclosureContextRecord::v1(
        OracleRequestId(request_id),
        BatchId(1),
        UserId::new("user_a").unwrap(),
        ActorId::new("provider_1").unwrap(),
        StateCommitment::new("4d".repeat(32)).unwrap(),
        MonotonicTimeNs(40),
    )
    .unwrap()
}

#[test]
fn at_disclosure_db_01_context_created_at_most_once_per_id() {
    let mut s = store();
    s.insert_context(context(11)).unwrap();
    assert!(matches!(
        s.insert_context(context(11)),
        Err(StorageError::DuplicateKey {
            table: "disclosure_contexts",
            ..
        })
    ));
    // A different correlation id is independent.
    s.insert_context(context(12)).unwrap();
}

#[test]
fn at_disclosure_db_02_processed_is_terminal() {
    let mut s = store();
    s.insert_context(context(11)).unwrap();
    assert!(!s.context(OracleRequestId(11)).unwrap().processed);

    s.mark_context_processed(OracleRequestId(11)).unwrap();
    assert!(s.context(OracleRequestId(11)).unwrap().processed);
    assert!(matches!(
        s.mark_context_processed(OracleRequestId(11)),
        Err(StorageError::AppendOnlyViolation {
            table: "disclosure_contexts",
        })
    ));
    // The row is marked terminal, never deleted.
    assert!(s.context(OracleRequestId(11)).is_some());
}

#[test]
fn at_disclosure_db_03_unknown_context_cannot_be_processed() {
    let mut s = store();
    assert!(matches!(
        s.mark_context_processed(OracleRequestId(99)),
        Err(StorageError::ForeignKeyViolation {
            table: "disclosure_contexts",
            ..
        })
    ));
}

#[test]
fn at_disclosure_db_04_ledger_keeps_request_and_completion_rows() {
    let mut s = store();
    s.append_disclosure_event(
        DisclosureLedgerEventInput::v1(
            MonotonicTimeNs(41),
            OracleRequestId(11),
            BatchId(1),
            UserId::new("user_a").unwrap(),
            DisclosureAction::Requested,
            None,
            ReasonCodeId(0x4449_0001),
        )
        .unwrap(),
    )
    .unwrap();
    let completion_event = s
        .append_disclosure_event(
            DisclosureLedgerEventInput::v1(
                MonotonicTimeNs(55),
                OracleRequestId(11),
                BatchId(1),
                UserId::new("user_a").unwrap(),
                DisclosureAction::Completed,
                Some(25),
                ReasonCodeId(0x4449_0002),
            )
            .unwrap(),
        )
        .unwrap();
    assert_eq!(completion_event, 2);
    let rows = s.disclosure_ledger_rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].disclosed_value, None);
    assert_eq!(rows[1].disclosed_value, Some(25));
}
