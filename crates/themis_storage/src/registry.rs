#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use themis_kernel_contracts::attribute::{
    AttributeRecord, SubmissionLedgerEvent, SubmissionLedgerEventInput, UserId,
};
use themis_kernel_contracts::batch::{BatchId, BatchLedgerEvent, BatchLedgerEventInput};
use themis_kernel_contracts::disclosure::{
    DisclosureContextRecord, DisclosureLedgerEvent, DisclosureLedgerEventInput, OracleRequestId,
    ServiceIdentity,
};
use themis_kernel_contracts::roster::{
    ActorId, CooldownSeconds, RosterLedgerEvent, RosterLedgerEventInput,
};
use themis_kernel_contracts::{ContractViolation, MonotonicTimeNs, Validate};

#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    ForeignKeyViolation { table: &'static str, key: String },
    DuplicateKey { table: &'static str, key: String },
    AppendOnlyViolation { table: &'static str },
    ContractViolation(ContractViolation),
}

impl From<ContractViolation> for StorageError {
    fn from(v: ContractViolation) -> Self {
        StorageError::ContractViolation(v)
    }
}

#[derive(Debug, Clone, Default)]
struct BatchState {
    closed: bool,
    members: BTreeSet<UserId>,
}

/// The single mutation domain of the registry. Every table lives here;
/// all writes flow through `&mut self` methods, so each operation is
/// atomic under the caller's one mutual-exclusion domain.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    owner: ActorId,
    service_identity: ServiceIdentity,
    paused: bool,
    cooldown: CooldownSeconds,
    providers: BTreeSet<ActorId>,
    current_batch_id: BatchId,
    batches: BTreeMap<BatchId, BatchState>,
    records: BTreeMap<(BatchId, UserId), AttributeRecord>,
    contexts: BTreeMap<OracleRequestId, DisclosureContextRecord>,
    last_submission_at: BTreeMap<UserId, MonotonicTimeNs>,
    last_request_at: BTreeMap<ActorId, MonotonicTimeNs>,
    roster_ledger: Vec<RosterLedgerEvent>,
    batch_ledger: Vec<BatchLedgerEvent>,
    submission_ledger: Vec<SubmissionLedgerEvent>,
    disclosure_ledger: Vec<DisclosureLedgerEvent>,
}

impl RegistryStore {
    /// Constructs the store with batch 1 open, so batch ids are dense
    /// from 1 and `open_next_batch` always yields previous + 1.
    pub fn new_in_memory(
        owner: ActorId,
        service_identity: ServiceIdentity,
        cooldown: CooldownSeconds,
    ) -> Result<Self, StorageError> {
        owner.validate()?;
        service_identity.validate()?;
        cooldown.validate()?;
        let mut batches = BTreeMap::new();
        batches.insert(BatchId(1), BatchState::default());
        Ok(Self {
            owner,
            service_identity,
            paused: false,
            cooldown,
            providers: BTreeSet::new(),
            current_batch_id: BatchId(1),
            batches,
            records: BTreeMap::new(),
            contexts: BTreeMap::new(),
            last_submission_at: BTreeMap::new(),
            last_request_at: BTreeMap::new(),
            roster_ledger: Vec::new(),
            batch_ledger: Vec::new(),
            submission_ledger: Vec::new(),
            disclosure_ledger: Vec::new(),
        })
    }

    pub fn owner(&self) -> &ActorId {
        &self.owner
    }

    pub fn is_owner(&self, actor: &ActorId) -> bool {
        &self.owner == actor
    }

    pub fn service_identity(&self) -> &ServiceIdentity {
        &self.service_identity
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn cooldown(&self) -> CooldownSeconds {
        self.cooldown
    }

    /// Swaps the cooldown, returning the previous value. Zero never lands.
    pub fn set_cooldown(&mut self, cooldown: CooldownSeconds) -> Result<CooldownSeconds, StorageError> {
        cooldown.validate()?;
        let old = self.cooldown;
        self.cooldown = cooldown;
        Ok(old)
    }

    pub fn is_provider(&self, actor: &ActorId) -> bool {
        self.providers.contains(actor)
    }

    pub fn providers(&self) -> &BTreeSet<ActorId> {
        &self.providers
    }

    pub fn add_provider(&mut self, provider: ActorId) -> Result<bool, StorageError> {
        provider.validate()?;
        Ok(self.providers.insert(provider))
    }

    pub fn remove_provider(&mut self, provider: &ActorId) -> bool {
        self.providers.remove(provider)
    }

    pub fn current_batch_id(&self) -> BatchId {
        self.current_batch_id
    }

    pub fn batch_exists(&self, batch_id: BatchId) -> bool {
        self.batches.contains_key(&batch_id)
    }

    pub fn batch_is_closed(&self, batch_id: BatchId) -> Result<bool, StorageError> {
        self.batches
            .get(&batch_id)
            .map(|b| b.closed)
            .ok_or(StorageError::ForeignKeyViolation {
                table: "batches",
                key: batch_id.0.to_string(),
            })
    }

    pub fn open_next_batch(&mut self) -> BatchId {
        let next = BatchId(self.current_batch_id.0 + 1);
        self.batches.insert(next, BatchState::default());
        self.current_batch_id = next;
        next
    }

    /// Write-once close of the current batch.
    pub fn close_current_batch(&mut self) -> Result<BatchId, StorageError> {
        let id = self.current_batch_id;
        let batch = self
            .batches
            .get_mut(&id)
            .ok_or(StorageError::ForeignKeyViolation {
                table: "batches",
                key: id.0.to_string(),
            })?;
        if batch.closed {
            return Err(StorageError::AppendOnlyViolation { table: "batches" });
        }
        batch.closed = true;
        Ok(id)
    }

    pub fn is_member(&self, batch_id: BatchId, user_id: &UserId) -> bool {
        self.batches
            .get(&batch_id)
            .map(|b| b.members.contains(user_id))
            .unwrap_or(false)
    }

    pub fn batch_members(&self, batch_id: BatchId) -> Result<&BTreeSet<UserId>, StorageError> {
        self.batches
            .get(&batch_id)
            .map(|b| &b.members)
            .ok_or(StorageError::ForeignKeyViolation {
                table: "batches",
                key: batch_id.0.to_string(),
            })
    }

    /// The only write path for attribute records. Inserts the record and
    /// the membership row together; refuses a second write per
    /// (batch, user) and any write into a closed or non-current batch.
    pub fn insert_record(&mut self, record: AttributeRecord) -> Result<(), StorageError> {
        record.validate()?;
        if record.batch_id != self.current_batch_id {
            return Err(StorageError::ForeignKeyViolation {
                table: "batches",
                key: record.batch_id.0.to_string(),
            });
        }
        let batch = self
            .batches
            .get_mut(&record.batch_id)
            .ok_or(StorageError::ForeignKeyViolation {
                table: "batches",
                key: record.batch_id.0.to_string(),
            })?;
        if batch.closed {
            return Err(StorageError::AppendOnlyViolation { table: "batches" });
        }
        let key = (record.batch_id, record.user_id.clone());
        if batch.members.contains(&record.user_id) || self.records.contains_key(&key) {
            return Err(StorageError::DuplicateKey {
                table: "attribute_records",
                key: format!("{}:{}", record.batch_id.0, record.user_id.as_str()),
            });
        }
        batch.members.insert(record.user_id.clone());
        self.records.insert(key, record);
        Ok(())
    }

    pub fn record(&self, batch_id: BatchId, user_id: &UserId) -> Option<&AttributeRecord> {
        self.records.get(&(batch_id, user_id.clone()))
    }

    pub fn has_record(&self, batch_id: BatchId, user_id: &UserId) -> bool {
        self.record(batch_id, user_id).is_some()
    }

    pub fn last_submission_at(&self, user_id: &UserId) -> Option<MonotonicTimeNs> {
        self.last_submission_at.get(user_id).copied()
    }

    pub fn touch_submission_time(&mut self, user_id: UserId, now: MonotonicTimeNs) {
        self.last_submission_at.insert(user_id, now);
    }

    pub fn last_request_at(&self, provider_id: &ActorId) -> Option<MonotonicTimeNs> {
        self.last_request_at.get(provider_id).copied()
    }

    pub fn touch_request_time(&mut self, provider_id: ActorId, now: MonotonicTimeNs) {
        self.last_request_at.insert(provider_id, now);
    }

    /// A context is created at most once per correlation id.
    pub fn insert_context(&mut self, context: DisclosureContextRecord) -> Result<(), StorageError> {
        context.validate()?;
        if self.contexts.contains_key(&context.request_id) {
            return Err(StorageError::DuplicateKey {
                table: "disclosure_contexts",
                key: context.request_id.0.to_string(),
            });
        }
        self.contexts.insert(context.request_id, context);
        Ok(())
    }

    pub fn context(&self, request_id: OracleRequestId) -> Option<&DisclosureContextRecord> {
        self.contexts.get(&request_id)
    }

    /// Terminal transition of a context. A processed row never flips back.
    pub fn mark_context_processed(
        &mut self,
        request_id: OracleRequestId,
    ) -> Result<(), StorageError> {
        let context = self
            .contexts
            .get_mut(&request_id)
            .ok_or(StorageError::ForeignKeyViolation {
                table: "disclosure_contexts",
                key: request_id.0.to_string(),
            })?;
        if context.processed {
            return Err(StorageError::AppendOnlyViolation {
                table: "disclosure_contexts",
            });
        }
        context.processed = true;
        Ok(())
    }

    pub fn append_roster_event(
        &mut self,
        input: RosterLedgerEventInput,
    ) -> Result<u64, StorageError> {
        let id = self.roster_ledger.len() as u64 + 1;
        let row = RosterLedgerEvent::from_input_v1(id, input)?;
        self.roster_ledger.push(row);
        Ok(id)
    }

    pub fn roster_ledger_rows(&self) -> &[RosterLedgerEvent] {
        &self.roster_ledger
    }

    pub fn append_batch_event(
        &mut self,
        input: BatchLedgerEventInput,
    ) -> Result<u64, StorageError> {
        let id = self.batch_ledger.len() as u64 + 1;
        let row = BatchLedgerEvent::from_input_v1(id, input)?;
        self.batch_ledger.push(row);
        Ok(id)
    }

    pub fn batch_ledger_rows(&self) -> &[BatchLedgerEvent] {
        &self.batch_ledger
    }

    pub fn append_submission_event(
        &mut self,
        input: SubmissionLedgerEventInput,
    ) -> Result<u64, StorageError> {
        let id = self.submission_ledger.len() as u64 + 1;
        let row = SubmissionLedgerEvent::from_input_v1(id, input)?;
        self.submission_ledger.push(row);
        Ok(id)
    }

    pub fn submission_ledger_rows(&self) -> &[SubmissionLedgerEvent] {
        &self.submission_ledger
    }

    pub fn append_disclosure_event(
        &mut self,
        input: DisclosureLedgerEventInput,
    ) -> Result<u64, StorageError> {
        let id = self.disclosure_ledger.len() as u64 + 1;
        let row = DisclosureLedgerEvent::from_input_v1(id, input)?;
        self.disclosure_ledger.push(row);
        Ok(id)
    }

    pub fn disclosure_ledger_rows(&self) -> &[DisclosureLedgerEvent] {
        &self.disclosure_ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use themis_kernel_contracts::attribute::{SealedAttribute, SEALED_NONCE_LEN};
    use themis_kernel_contracts::disclosure::StateCommitment;

    fn store() -> RegistryStore {
        RegistryStore::new_in_memory(
            ActorId::new("owner_1").unwrap(),
            ServiceIdentity::new("themis_registry_test").unwrap(),
            CooldownSeconds(60),
        )
        .unwrap()
    }

    fn sealed() -> SealedAttribute {
        SealedAttribute::from_parts(vec![9u8; SEALED_NONCE_LEN], vec![3u8; 24])
    }

    fn record(batch_id: BatchId, user: &str) -> AttributeRecord {
        AttributeRecord::v1(
            batch_id,
            UserId::new(user).unwrap(),
            sealed(),
            sealed(),
            ActorId::new("provider_1").unwrap(),
            MonotonicTimeNs(10),
        )
        .unwrap()
    }

    #[test]
    fn store_starts_with_batch_one_open() {
        let s = store();
        assert_eq!(s.current_batch_id(), BatchId(1));
        assert_eq!(s.batch_is_closed(BatchId(1)), Ok(false));
        assert!(!s.batch_exists(BatchId(2)));
    }

    #[test]
    fn zero_cooldown_never_lands() {
        let mut s = store();
        assert!(s.set_cooldown(CooldownSeconds(0)).is_err());
        assert_eq!(s.cooldown(), CooldownSeconds(60));
    }

    #[test]
    fn record_insert_is_write_once_per_batch_user() {
        let mut s = store();
        s.insert_record(record(BatchId(1), "user_1")).unwrap();
        let out = s.insert_record(record(BatchId(1), "user_1"));
        assert!(matches!(
            out,
            Err(StorageError::DuplicateKey {
                table: "attribute_records",
                ..
            })
        ));
        assert!(s.is_member(BatchId(1), &UserId::new("user_1").unwrap()));
    }

    #[test]
    fn record_insert_rejects_closed_batch() {
        let mut s = store();
        s.close_current_batch().unwrap();
        let out = s.insert_record(record(BatchId(1), "user_1"));
        assert!(matches!(
            out,
            Err(StorageError::AppendOnlyViolation { table: "batches" })
        ));
    }

    #[test]
    fn close_is_write_once() {
        let mut s = store();
        s.close_current_batch().unwrap();
        assert!(matches!(
            s.close_current_batch(),
            Err(StorageError::AppendOnlyViolation { table: "batches" })
        ));
    }

    #[test]
    fn context_is_single_use() {
        let mut s = store();
        let ctx = DisclosureContextRecord::v1(
            OracleRequestId(7),
            BatchId(1),
            UserId::new("user_1").unwrap(),
            ActorId::new("provider_1").unwrap(),
            StateCommitment::new("ab".repeat(32)).unwrap(),
            MonotonicTimeNs(5),
        )
        .unwrap();
        s.insert_context(ctx.clone()).unwrap();
        assert!(matches!(
            s.insert_context(ctx),
            Err(StorageError::DuplicateKey {
                table: "disclosure_contexts",
                ..
            })
        ));
        s.mark_context_processed(OracleRequestId(7)).unwrap();
        assert!(matches!(
            s.mark_context_processed(OracleRequestId(7)),
            Err(StorageError::AppendOnlyViolation {
                table: "disclosure_contexts",
            })
        ));
    }
}
