#![forbid(unsafe_code)]

use crate::{ContractViolation, MonotonicTimeNs, ReasonCodeId, Refusal, SchemaVersion, Validate};

pub const ROSTER_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

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

/// Identity of any caller: the owner, an accredited provider, or the
/// gateway service account.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(v: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(v.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for ActorId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("actor_id", &self.0, 128)
    }
}

/// Uniform cooldown applied to both submission and disclosure-request
/// rate checks. Zero is never a valid configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CooldownSeconds(pub u64);

impl CooldownSeconds {
    pub fn as_nanos(self) -> u64 {
        self.0.saturating_mul(1_000_000_000)
    }
}

impl Validate for CooldownSeconds {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "cooldown_seconds",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RosterAction {
    AddProvider,
    RemoveProvider,
    Pause,
    Unpause,
    SetCooldown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterLedgerEventInput {
    pub schema_version: SchemaVersion,
    pub created_at: MonotonicTimeNs,
    pub actor_id: ActorId,
    pub action: RosterAction,
    pub subject_provider: Option<ActorId>,
    pub cooldown_old: Option<CooldownSeconds>,
    pub cooldown_new: Option<CooldownSeconds>,
    pub reason_code: ReasonCodeId,
}

impl RosterLedgerEventInput {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        created_at: MonotonicTimeNs,
        actor_id: ActorId,
        action: RosterAction,
        subject_provider: Option<ActorId>,
        cooldown_old: Option<CooldownSeconds>,
        cooldown_new: Option<CooldownSeconds>,
        reason_code: ReasonCodeId,
    ) -> Result<Self, ContractViolation> {
        let row = Self {
            schema_version: ROSTER_CONTRACT_VERSION,
            created_at,
            actor_id,
            action,
            subject_provider,
            cooldown_old,
            cooldown_new,
            reason_code,
        };
        row.validate()?;
        Ok(row)
    }
}

impl Validate for RosterLedgerEventInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != ROSTER_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "roster_ledger_event_input.schema_version",
                reason: "must match ROSTER_CONTRACT_VERSION",
            });
        }
        if self.created_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "roster_ledger_event_input.created_at",
                reason: "must be > 0",
            });
        }
        self.actor_id.validate()?;
        if self.reason_code.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "roster_ledger_event_input.reason_code",
                reason: "must be > 0",
            });
        }
        match self.action {
            RosterAction::AddProvider | RosterAction::RemoveProvider => {
                if self.subject_provider.is_none() {
                    return Err(ContractViolation::InvalidValue {
                        field: "roster_ledger_event_input.subject_provider",
                        reason: "required for provider actions",
                    });
                }
                if self.cooldown_old.is_some() || self.cooldown_new.is_some() {
                    return Err(ContractViolation::InvalidValue {
                        field: "roster_ledger_event_input.cooldown_old",
                        reason: "must be absent for provider actions",
                    });
                }
            }
            RosterAction::Pause | RosterAction::Unpause => {
                if self.subject_provider.is_some()
                    || self.cooldown_old.is_some()
                    || self.cooldown_new.is_some()
                {
                    return Err(ContractViolation::InvalidValue {
                        field: "roster_ledger_event_input.subject_provider",
                        reason: "must be absent for pause actions",
                    });
                }
            }
            RosterAction::SetCooldown => {
                if self.subject_provider.is_some() {
                    return Err(ContractViolation::InvalidValue {
                        field: "roster_ledger_event_input.subject_provider",
                        reason: "must be absent for cooldown action",
                    });
                }
                let (Some(_old), Some(new)) = (self.cooldown_old, self.cooldown_new) else {
                    return Err(ContractViolation::InvalidValue {
                        field: "roster_ledger_event_input.cooldown_new",
                        reason: "old and new required for cooldown action",
                    });
                };
                new.validate()?;
            }
        }
        if let Some(p) = &self.subject_provider {
            p.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterLedgerEvent {
    pub schema_version: SchemaVersion,
    pub roster_event_id: u64,
    pub created_at: MonotonicTimeNs,
    pub actor_id: ActorId,
    pub action: RosterAction,
    pub subject_provider: Option<ActorId>,
    pub cooldown_old: Option<CooldownSeconds>,
    pub cooldown_new: Option<CooldownSeconds>,
    pub reason_code: ReasonCodeId,
}

impl RosterLedgerEvent {
    pub fn from_input_v1(
        roster_event_id: u64,
        input: RosterLedgerEventInput,
    ) -> Result<Self, ContractViolation> {
        input.validate()?;
        if roster_event_id == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "roster_ledger_event.roster_event_id",
                reason: "must be > 0",
            });
        }
        Ok(Self {
            schema_version: ROSTER_CONTRACT_VERSION,
            roster_event_id,
            created_at: input.created_at,
            actor_id: input.actor_id,
            action: input.action,
            subject_provider: input.subject_provider,
            cooldown_old: input.cooldown_old,
            cooldown_new: input.cooldown_new,
            reason_code: input.reason_code,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterCommand {
    AddProvider { provider: ActorId },
    RemoveProvider { provider: ActorId },
    Pause,
    Unpause,
    SetCooldown { cooldown: CooldownSeconds },
}

impl RosterCommand {
    pub fn action(&self) -> RosterAction {
        match self {
            RosterCommand::AddProvider { .. } => RosterAction::AddProvider,
            RosterCommand::RemoveProvider { .. } => RosterAction::RemoveProvider,
            RosterCommand::Pause => RosterAction::Pause,
            RosterCommand::Unpause => RosterAction::Unpause,
            RosterCommand::SetCooldown { .. } => RosterAction::SetCooldown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRequest {
    pub schema_version: SchemaVersion,
    pub now: MonotonicTimeNs,
    pub actor_id: ActorId,
    pub command: RosterCommand,
}

impl RosterRequest {
    pub fn add_provider_v1(
        now: MonotonicTimeNs,
        actor_id: ActorId,
        provider: ActorId,
    ) -> Result<Self, ContractViolation> {
        Self::v1(now, actor_id, RosterCommand::AddProvider { provider })
    }

    pub fn remove_provider_v1(
        now: MonotonicTimeNs,
        actor_id: ActorId,
        provider: ActorId,
    ) -> Result<Self, ContractViolation> {
        Self::v1(now, actor_id, RosterCommand::RemoveProvider { provider })
    }

    pub fn pause_v1(now: MonotonicTimeNs, actor_id: ActorId) -> Result<Self, ContractViolation> {
        Self::v1(now, actor_id, RosterCommand::Pause)
    }

    pub fn unpause_v1(now: MonotonicTimeNs, actor_id: ActorId) -> Result<Self, ContractViolation> {
        Self::v1(now, actor_id, RosterCommand::Unpause)
    }

    pub fn set_cooldown_v1(
        now: MonotonicTimeNs,
        actor_id: ActorId,
        cooldown: CooldownSeconds,
    ) -> Result<Self, ContractViolation> {
        Self::v1(now, actor_id, RosterCommand::SetCooldown { cooldown })
    }

    fn v1(
        now: MonotonicTimeNs,
        actor_id: ActorId,
        command: RosterCommand,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: ROSTER_CONTRACT_VERSION,
            now,
            actor_id,
            command,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for RosterRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != ROSTER_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "roster_request.schema_version",
                reason: "must match ROSTER_CONTRACT_VERSION",
            });
        }
        if self.now.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "roster_request.now",
                reason: "must be > 0",
            });
        }
        self.actor_id.validate()?;
        match &self.command {
            RosterCommand::AddProvider { provider } | RosterCommand::RemoveProvider { provider } => {
                provider.validate()
            }
            RosterCommand::Pause | RosterCommand::Unpause => Ok(()),
            // Zero cooldown is refused by the runtime, not rejected at the
            // contract layer, so the refusal stays observable to callers.
            RosterCommand::SetCooldown { .. } => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterActionResult {
    Membership {
        provider: ActorId,
        active: bool,
        changed: bool,
    },
    PauseState {
        paused: bool,
    },
    Cooldown {
        old: CooldownSeconds,
        new: CooldownSeconds,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterOk {
    pub schema_version: SchemaVersion,
    pub action: RosterAction,
    pub reason_code: ReasonCodeId,
    pub roster_event_id: u64,
    pub result: RosterActionResult,
}

impl RosterOk {
    pub fn v1(
        action: RosterAction,
        reason_code: ReasonCodeId,
        roster_event_id: u64,
        result: RosterActionResult,
    ) -> Result<Self, ContractViolation> {
        let o = Self {
            schema_version: ROSTER_CONTRACT_VERSION,
            action,
            reason_code,
            roster_event_id,
            result,
        };
        o.validate()?;
        Ok(o)
    }
}

impl Validate for RosterOk {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != ROSTER_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "roster_ok.schema_version",
                reason: "must match ROSTER_CONTRACT_VERSION",
            });
        }
        if self.reason_code.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "roster_ok.reason_code",
                reason: "must be > 0",
            });
        }
        if self.roster_event_id == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "roster_ok.roster_event_id",
                reason: "must be > 0",
            });
        }
        let matches_action = matches!(
            (&self.result, self.action),
            (
                RosterActionResult::Membership { .. },
                RosterAction::AddProvider | RosterAction::RemoveProvider
            ) | (
                RosterActionResult::PauseState { .. },
                RosterAction::Pause | RosterAction::Unpause
            ) | (RosterActionResult::Cooldown { .. }, RosterAction::SetCooldown)
        );
        if !matches_action {
            return Err(ContractViolation::InvalidValue {
                field: "roster_ok.result",
                reason: "must match action variant",
            });
        }
        if let RosterActionResult::Cooldown { new, .. } = &self.result {
            new.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterResponse {
    Ok(RosterOk),
    Refuse(Refusal),
}

impl Validate for RosterResponse {
    fn validate(&self) -> Result<(), ContractViolation> {
        match self {
            RosterResponse::Ok(o) => o.validate(),
            RosterResponse::Refuse(r) => r.validate(),
        }
    }
}
