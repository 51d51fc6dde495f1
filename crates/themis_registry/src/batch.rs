#![forbid(unsafe_code)]

use themis_kernel_contracts::batch::{
    BatchAction, BatchCommand, BatchLedgerEventInput, BatchLifecycleResult, BatchOk, BatchRequest,
    BatchResponse,
};
use themis_kernel_contracts::{ReasonCodeId, RefuseKind, Refusal, Validate};
use themis_storage::{RegistryStore, StorageError};

pub mod reason_codes {
    use themis_kernel_contracts::ReasonCodeId;

    // Batch reason-code namespace.
    pub const BATCH_OPENED: ReasonCodeId = ReasonCodeId(0x4241_0001);
    pub const BATCH_CLOSED: ReasonCodeId = ReasonCodeId(0x4241_0002);

    pub const NOT_OWNER: ReasonCodeId = ReasonCodeId(0x4241_00F1);
    pub const BATCH_ALREADY_CLOSED: ReasonCodeId = ReasonCodeId(0x4241_00F2);
}

/// Owner-gated batch lifecycle: open the next verification batch, close
/// the current one. Close is write-once; a closed batch never reopens.
#[derive(Debug, Default, Clone)]
pub struct BatchRuntime;

impl BatchRuntime {
    pub fn run(
        &self,
        store: &mut RegistryStore,
        req: &BatchRequest,
    ) -> Result<BatchResponse, StorageError> {
        req.validate().map_err(StorageError::ContractViolation)?;

        if !store.is_owner(&req.actor_id) {
            return refuse(
                RefuseKind::Authorization,
                reason_codes::NOT_OWNER,
                "caller is not the owner",
            );
        }

        match req.command {
            BatchCommand::OpenNewBatch => {
                let opened = store.open_next_batch();
                let event_id = store.append_batch_event(BatchLedgerEventInput::v1(
                    req.now,
                    req.actor_id.clone(),
                    BatchAction::Open,
                    opened,
                    reason_codes::BATCH_OPENED,
                )?)?;
                ok(
                    reason_codes::BATCH_OPENED,
                    BatchLifecycleResult::v1(opened, BatchAction::Open, false, event_id)
                        .map_err(StorageError::ContractViolation)?,
                )
            }
            BatchCommand::CloseCurrentBatch => {
                let current = store.current_batch_id();
                if store.batch_is_closed(current)? {
                    return refuse(
                        RefuseKind::Lifecycle,
                        reason_codes::BATCH_ALREADY_CLOSED,
                        "current batch is already closed",
                    );
                }
                let closed = store.close_current_batch()?;
                let event_id = store.append_batch_event(BatchLedgerEventInput::v1(
                    req.now,
                    req.actor_id.clone(),
                    BatchAction::Close,
                    closed,
                    reason_codes::BATCH_CLOSED,
                )?)?;
                ok(
                    reason_codes::BATCH_CLOSED,
                    BatchLifecycleResult::v1(closed, BatchAction::Close, true, event_id)
                        .map_err(StorageError::ContractViolation)?,
                )
            }
        }
    }
}

fn ok(
    reason_code: ReasonCodeId,
    result: BatchLifecycleResult,
) -> Result<BatchResponse, StorageError> {
    Ok(BatchResponse::Ok(
        BatchOk::v1(reason_code, result).map_err(StorageError::ContractViolation)?,
    ))
}

fn refuse(
    kind: RefuseKind,
    reason_code: ReasonCodeId,
    message: &str,
) -> Result<BatchResponse, StorageError> {
    Ok(BatchResponse::Refuse(
        Refusal::v1(kind, reason_code, message).map_err(StorageError::ContractViolation)?,
    ))
}
