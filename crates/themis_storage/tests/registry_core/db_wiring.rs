#![forbid(unsafe_code)]

use themis_kernel_contracts::attribute::{
    AttributeRecord, SealedAttribute, SubmissionLedgerEventInput, UserId, SEALED_NONCE_LEN,
};
use themis_kernel_contracts::batch::{BatchAction, BatchId, BatchLedgerEventInput};
use themis_kernel_contracts::disclosure::ServiceIdentity;
use themis_kernel_contracts::roster::{ActorId, CooldownSeconds, RosterAction, RosterLedgerEventInput};
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

fn actor(id: &str) -> ActorId {
    ActorId::new(id).unwrap()
}

fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

fn sealed(fill: u8) -> SealedAttribute {
    SealedAttribute::from_parts(vec![fill; SEALED_NONCE_LEN], vec![fill; 24])
}

fn record(batch_id: BatchId, user_id: &str) -> AttributeRecord {
    AttributeRecord::v1(
        batch_id,
        user(user_id),
        sealed(1),
        sealed(2),
        actor("provider_1"),
        MonotonicTimeNs(10),
    )
    .unwrap()
}

#[test]
fn at_registry_core_db_01_batch_ids_stay_dense_and_increasing() {
    let mut s = store();
    assert_eq!(s.current_batch_id(), BatchId(1));
    assert_eq!(s.open_next_batch(), BatchId(2));
    assert_eq!(s.open_next_batch(), BatchId(3));
    assert!(s.batch_exists(BatchId(1)));
    assert!(s.batch_exists(BatchId(2)));
    assert!(s.batch_exists(BatchId(3)));
    assert_eq!(s.batch_is_closed(BatchId(3)), Ok(false));
}

#[test]
fn at_registry_core_db_02_membership_is_at_most_once_per_batch() {
    let mut s = store();
    s.insert_record(record(BatchId(1), "user_a")).unwrap();
    assert!(matches!(
        s.insert_record(record(BatchId(1), "user_a")),
        Err(StorageError::DuplicateKey { .. })
    ));

    // The same user enrolls independently in a later batch.
    s.open_next_batch();
    s.insert_record(record(BatchId(2), "user_a")).unwrap();
    assert!(s.is_member(BatchId(1), &user("user_a")));
    assert!(s.is_member(BatchId(2), &user("user_a")));
}

#[test]
fn at_registry_core_db_03_record_write_targets_current_batch_only() {
    let mut s = store();
    s.open_next_batch();
    let out = s.insert_record(record(BatchId(1), "user_a"));
    assert!(matches!(
        out,
        Err(StorageError::ForeignKeyViolation { table: "batches", .. })
    ));
}

#[test]
fn at_registry_core_db_04_roster_ledger_assigns_dense_event_ids() {
    let mut s = store();
    let first = s
        .append_roster_event(
            RosterLedgerEventInput::v1(
                MonotonicTimeNs(10),
                actor("owner_1"),
                RosterAction::AddProvider,
                Some(actor("provider_1")),
                None,
                None,
                ReasonCodeId(0x524F_0001),
            )
            .unwrap(),
        )
        .unwrap();
    let second = s
        .append_roster_event(
            RosterLedgerEventInput::v1(
                MonotonicTimeNs(11),
                actor("owner_1"),
                RosterAction::SetCooldown,
                None,
                Some(CooldownSeconds(60)),
                Some(CooldownSeconds(120)),
                ReasonCodeId(0x524F_0005),
            )
            .unwrap(),
        )
        .unwrap();
    assert_eq!(first, 1);
    assert_eq!(second, 2);
    assert_eq!(s.roster_ledger_rows().len(), 2);
    assert_eq!(s.roster_ledger_rows()[1].cooldown_new, Some(CooldownSeconds(120)));
}

#[test]
fn at_registry_core_db_05_batch_and_submission_ledgers_append_only_grow() {
    let mut s = store();
    let opened = s.open_next_batch();
    s.append_batch_event(
        BatchLedgerEventInput::v1(
            MonotonicTimeNs(10),
            actor("owner_1"),
            BatchAction::Open,
            opened,
            ReasonCodeId(0x4241_0001),
        )
        .unwrap(),
    )
    .unwrap();
    s.insert_record(record(opened, "user_a")).unwrap();
    let submission_event = s
        .append_submission_event(
            SubmissionLedgerEventInput::v1(
                MonotonicTimeNs(11),
                opened,
                user("user_a"),
                actor("provider_1"),
                "submission_payload_0011".to_string(),
                ReasonCodeId(0x5355_0001),
            )
            .unwrap(),
        )
        .unwrap();
    assert_eq!(submission_event, 1);
    assert_eq!(s.batch_ledger_rows().len(), 1);
    assert_eq!(s.submission_ledger_rows().len(), 1);
    assert_eq!(s.submission_ledger_rows()[0].batch_id, opened);
}

#[test]
fn at_registry_core_db_06_timestamps_track_last_touch() {
    let mut s = store();
    assert_eq!(s.last_submission_at(&user("user_a")), None);
    s.touch_submission_time(user("user_a"), MonotonicTimeNs(50));
    s.touch_submission_time(user("user_a"), MonotonicTimeNs(90));
    assert_eq!(s.last_submission_at(&user("user_a")), Some(MonotonicTimeNs(90)));

    s.touch_request_time(actor("provider_1"), MonotonicTimeNs(70));
    assert_eq!(
        s.last_request_at(&actor("provider_1")),
        Some(MonotonicTimeNs(70))
    );
}
