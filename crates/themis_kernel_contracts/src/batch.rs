#![forbid(unsafe_code)]

use crate::roster::ActorId;
use crate::{ContractViolation, MonotonicTimeNs, ReasonCodeId, Refusal, SchemaVersion, Validate};

pub const BATCH_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Verification-batch identifier. Ids are dense and strictly increasing,
/// starting at 1; 0 is never a valid batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BatchId(pub u64);

impl Validate for BatchId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "batch_id",
                reason: "must be >= 1",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchAction {
    Open,
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchLedgerEventInput {
    pub schema_version: SchemaVersion,
    pub created_at: MonotonicTimeNs,
    pub actor_id: ActorId,
    pub action: BatchAction,
    pub batch_id: BatchId,
    pub reason_code: ReasonCodeId,
}

impl BatchLedgerEventInput {
    pub fn v1(
        created_at: MonotonicTimeNs,
        actor_id: ActorId,
        action: BatchAction,
        batch_id: BatchId,
        reason_code: ReasonCodeId,
    ) -> Result<Self, ContractViolation> {
        let row = Self {
            schema_version: BATCH_CONTRACT_VERSION,
            created_at,
            actor_id,
            action,
            batch_id,
            reason_code,
        };
        row.validate()?;
        Ok(row)
    }
}

impl Validate for BatchLedgerEventInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != BATCH_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "batch_ledger_event_input.schema_version",
                reason: "must match BATCH_CONTRACT_VERSION",
            });
        }
        if self.created_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "batch_ledger_event_input.created_at",
                reason: "must be > 0",
            });
        }
        self.actor_id.validate()?;
        self.batch_id.validate()?;
        if self.reason_code.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "batch_ledger_event_input.reason_code",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchLedgerEvent {
    pub schema_version: SchemaVersion,
    pub batch_event_id: u64,
    pub created_at: MonotonicTimeNs,
    pub actor_id: ActorId,
    pub action: BatchAction,
    pub batch_id: BatchId,
    pub reason_code: ReasonCodeId,
}

impl BatchLedgerEvent {
    pub fn from_input_v1(
        batch_event_id: u64,
        input: BatchLedgerEventInput,
    ) -> Result<Self, ContractViolation> {
        input.validate()?;
        if batch_event_id == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "batch_ledger_event.batch_event_id",
                reason: "must be > 0",
            });
        }
        Ok(Self {
            schema_version: BATCH_CONTRACT_VERSION,
            batch_event_id,
            created_at: input.created_at,
            actor_id: input.actor_id,
            action: input.action,
            batch_id: input.batch_id,
            reason_code: input.reason_code,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchCommand {
    OpenNewBatch,
    CloseCurrentBatch,
}

impl BatchCommand {
    pub fn action(&self) -> BatchAction {
        match self {
            BatchCommand::OpenNewBatch => BatchAction::Open,
            BatchCommand::CloseCurrentBatch => BatchAction::Close,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub schema_version: SchemaVersion,
    pub now: MonotonicTimeNs,
    pub actor_id: ActorId,
    pub command: BatchCommand,
}

impl BatchRequest {
    pub fn open_new_batch_v1(
        now: MonotonicTimeNs,
        actor_id: ActorId,
    ) -> Result<Self, ContractViolation> {
        Self::v1(now, actor_id, BatchCommand::OpenNewBatch)
    }

    pub fn close_current_batch_v1(
        now: MonotonicTimeNs,
        actor_id: ActorId,
    ) -> Result<Self, ContractViolation> {
        Self::v1(now, actor_id, BatchCommand::CloseCurrentBatch)
    }

    fn v1(
        now: MonotonicTimeNs,
        actor_id: ActorId,
        command: BatchCommand,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: BATCH_CONTRACT_VERSION,
            now,
            actor_id,
            command,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for BatchRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != BATCH_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "batch_request.schema_version",
                reason: "must match BATCH_CONTRACT_VERSION",
            });
        }
        if self.now.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "batch_request.now",
                reason: "must be > 0",
            });
        }
        self.actor_id.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchLifecycleResult {
    pub schema_version: SchemaVersion,
    pub batch_id: BatchId,
    pub action: BatchAction,
    pub closed: bool,
    pub batch_event_id: u64,
}

impl BatchLifecycleResult {
    pub fn v1(
        batch_id: BatchId,
        action: BatchAction,
        closed: bool,
        batch_event_id: u64,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: BATCH_CONTRACT_VERSION,
            batch_id,
            action,
            closed,
            batch_event_id,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for BatchLifecycleResult {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != BATCH_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "batch_lifecycle_result.schema_version",
                reason: "must match BATCH_CONTRACT_VERSION",
            });
        }
        self.batch_id.validate()?;
        if self.batch_event_id == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "batch_lifecycle_result.batch_event_id",
                reason: "must be > 0",
            });
        }
        // An open result reports an open batch; a close result a closed one.
        let consistent = match self.action {
            BatchAction::Open => !self.closed,
            BatchAction::Close => self.closed,
        };
        if !consistent {
            return Err(ContractViolation::InvalidValue {
                field: "batch_lifecycle_result.closed",
                reason: "must be consistent with action",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOk {
    pub schema_version: SchemaVersion,
    pub reason_code: ReasonCodeId,
    pub result: BatchLifecycleResult,
}

impl BatchOk {
    pub fn v1(
        reason_code: ReasonCodeId,
        result: BatchLifecycleResult,
    ) -> Result<Self, ContractViolation> {
        let o = Self {
            schema_version: BATCH_CONTRACT_VERSION,
            reason_code,
            result,
        };
        o.validate()?;
        Ok(o)
    }
}

impl Validate for BatchOk {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != BATCH_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "batch_ok.schema_version",
                reason: "must match BATCH_CONTRACT_VERSION",
            });
        }
        if self.reason_code.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "batch_ok.reason_code",
                reason: "must be > 0",
            });
        }
        self.result.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchResponse {
    Ok(BatchOk),
    Refuse(Refusal),
}

impl Validate for BatchResponse {
    fn validate(&self) -> Result<(), ContractViolation> {
        match self {
            BatchResponse::Ok(o) => o.validate(),
            BatchResponse::Refuse(r) => r.validate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_id_zero_is_invalid() {
        assert!(BatchId(0).validate().is_err());
        assert!(BatchId(1).validate().is_ok());
    }

    #[test]
    fn open_result_must_report_open_batch() {
        let out = BatchLifecycleResult::v1(BatchId(2), BatchAction::Open, true, 1);
        assert!(matches!(
            out,
            Err(ContractViolation::InvalidValue {
                field: "batch_lifecycle_result.closed",
                ..
            })
        ));
    }
}
