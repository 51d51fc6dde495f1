#![forbid(unsafe_code)]

use themis_kernel_contracts::roster::{
    RosterAction, RosterActionResult, RosterCommand, RosterLedgerEventInput, RosterOk,
    RosterRequest, RosterResponse,
};
use themis_kernel_contracts::{ReasonCodeId, RefuseKind, Refusal, Validate};
use themis_storage::{RegistryStore, StorageError};

pub mod reason_codes {
    use themis_kernel_contracts::ReasonCodeId;

    // Roster reason-code namespace.
    pub const PROVIDER_ADDED: ReasonCodeId = ReasonCodeId(0x524F_0001);
    pub const PROVIDER_REMOVED: ReasonCodeId = ReasonCodeId(0x524F_0002);
    pub const PAUSED: ReasonCodeId = ReasonCodeId(0x524F_0003);
    pub const UNPAUSED: ReasonCodeId = ReasonCodeId(0x524F_0004);
    pub const COOLDOWN_CHANGED: ReasonCodeId = ReasonCodeId(0x524F_0005);

    pub const NOT_OWNER: ReasonCodeId = ReasonCodeId(0x524F_00F1);
    pub const ALREADY_PAUSED: ReasonCodeId = ReasonCodeId(0x524F_00F2);
    pub const NOT_PAUSED: ReasonCodeId = ReasonCodeId(0x524F_00F3);
    pub const INVALID_COOLDOWN: ReasonCodeId = ReasonCodeId(0x524F_00F4);
}

/// Owner-gated control surface: provider roster, pause flag, cooldown
/// configuration.
#[derive(Debug, Default, Clone)]
pub struct RosterRuntime;

impl RosterRuntime {
    pub fn run(
        &self,
        store: &mut RegistryStore,
        req: &RosterRequest,
    ) -> Result<RosterResponse, StorageError> {
        req.validate().map_err(StorageError::ContractViolation)?;

        if !store.is_owner(&req.actor_id) {
            return refuse(
                RefuseKind::Authorization,
                reason_codes::NOT_OWNER,
                "caller is not the owner",
            );
        }

        match &req.command {
            RosterCommand::AddProvider { provider } => {
                let changed = store.add_provider(provider.clone())?;
                let event_id = store.append_roster_event(RosterLedgerEventInput::v1(
                    req.now,
                    req.actor_id.clone(),
                    RosterAction::AddProvider,
                    Some(provider.clone()),
                    None,
                    None,
                    reason_codes::PROVIDER_ADDED,
                )?)?;
                ok(
                    RosterAction::AddProvider,
                    reason_codes::PROVIDER_ADDED,
                    event_id,
                    RosterActionResult::Membership {
                        provider: provider.clone(),
                        active: true,
                        changed,
                    },
                )
            }
            RosterCommand::RemoveProvider { provider } => {
                let changed = store.remove_provider(provider);
                let event_id = store.append_roster_event(RosterLedgerEventInput::v1(
                    req.now,
                    req.actor_id.clone(),
                    RosterAction::RemoveProvider,
                    Some(provider.clone()),
                    None,
                    None,
                    reason_codes::PROVIDER_REMOVED,
                )?)?;
                ok(
                    RosterAction::RemoveProvider,
                    reason_codes::PROVIDER_REMOVED,
                    event_id,
                    RosterActionResult::Membership {
                        provider: provider.clone(),
                        active: false,
                        changed,
                    },
                )
            }
            RosterCommand::Pause => {
                if store.paused() {
                    return refuse(
                        RefuseKind::Lifecycle,
                        reason_codes::ALREADY_PAUSED,
                        "registry is already paused",
                    );
                }
                store.set_paused(true);
                let event_id = store.append_roster_event(RosterLedgerEventInput::v1(
                    req.now,
                    req.actor_id.clone(),
                    RosterAction::Pause,
                    None,
                    None,
                    None,
                    reason_codes::PAUSED,
                )?)?;
                ok(
                    RosterAction::Pause,
                    reason_codes::PAUSED,
                    event_id,
                    RosterActionResult::PauseState { paused: true },
                )
            }
            RosterCommand::Unpause => {
                if !store.paused() {
                    return refuse(
                        RefuseKind::Lifecycle,
                        reason_codes::NOT_PAUSED,
                        "registry is not paused",
                    );
                }
                store.set_paused(false);
                let event_id = store.append_roster_event(RosterLedgerEventInput::v1(
                    req.now,
                    req.actor_id.clone(),
                    RosterAction::Unpause,
                    None,
                    None,
                    None,
                    reason_codes::UNPAUSED,
                )?)?;
                ok(
                    RosterAction::Unpause,
                    reason_codes::UNPAUSED,
                    event_id,
                    RosterActionResult::PauseState { paused: false },
                )
            }
            RosterCommand::SetCooldown { cooldown } => {
                if cooldown.0 == 0 {
                    return refuse(
                        RefuseKind::Config,
                        reason_codes::INVALID_COOLDOWN,
                        "cooldown must be > 0 seconds",
                    );
                }
                let old = store.set_cooldown(*cooldown)?;
                let event_id = store.append_roster_event(RosterLedgerEventInput::v1(
                    req.now,
                    req.actor_id.clone(),
                    RosterAction::SetCooldown,
                    None,
                    Some(old),
                    Some(*cooldown),
                    reason_codes::COOLDOWN_CHANGED,
                )?)?;
                ok(
                    RosterAction::SetCooldown,
                    reason_codes::COOLDOWN_CHANGED,
                    event_id,
                    RosterActionResult::Cooldown {
                        old,
                        new: *cooldown,
                    },
                )
            }
        }
    }
}

fn ok(
    action: RosterAction,
    reason_code: ReasonCodeId,
    event_id: u64,
    result: RosterActionResult,
) -> Result<RosterResponse, StorageError> {
    Ok(RosterResponse::Ok(
        RosterOk::v1(action, reason_code, event_id, result)
            .map_err(StorageError::ContractViolation)?,
    ))
}

fn refuse(
    kind: RefuseKind,
    reason_code: ReasonCodeId,
    message: &str,
) -> Result<RosterResponse, StorageError> {
    Ok(RosterResponse::Refuse(
        Refusal::v1(kind, reason_code, message).map_err(StorageError::ContractViolation)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use themis_kernel_contracts::disclosure::ServiceIdentity;
    use themis_kernel_contracts::roster::{ActorId, CooldownSeconds};
    use themis_kernel_contracts::MonotonicTimeNs;

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

    fn refusal(resp: RosterResponse) -> Refusal {
        match resp {
            RosterResponse::Refuse(r) => r,
            RosterResponse::Ok(_) => panic!("expected refuse"),
        }
    }

    fn result(resp: RosterResponse) -> RosterActionResult {
        match resp {
            RosterResponse::Ok(ok) => ok.result,
            RosterResponse::Refuse(r) => panic!("expected ok, got {:?}", r.reason_code),
        }
    }

    #[test]
    fn non_owner_is_refused_on_every_command() {
        let rt = RosterRuntime;
        let mut s = store();
        let req =
            RosterRequest::add_provider_v1(MonotonicTimeNs(1), actor("mallory"), actor("p1"))
                .unwrap();
        let r = refusal(rt.run(&mut s, &req).unwrap());
        assert_eq!(r.kind, RefuseKind::Authorization);
        assert_eq!(r.reason_code, reason_codes::NOT_OWNER);
        assert!(s.roster_ledger_rows().is_empty());
    }

    #[test]
    fn add_and_remove_provider_report_idempotent_changes() {
        let rt = RosterRuntime;
        let mut s = store();

        let add =
            RosterRequest::add_provider_v1(MonotonicTimeNs(1), actor("owner_1"), actor("p1"))
                .unwrap();
        match result(rt.run(&mut s, &add).unwrap()) {
            RosterActionResult::Membership { active, changed, .. } => {
                assert!(active);
                assert!(changed);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        // Second add is accepted but reports no change.
        match result(rt.run(&mut s, &add).unwrap()) {
            RosterActionResult::Membership { changed, .. } => assert!(!changed),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(s.is_provider(&actor("p1")));

        let remove =
            RosterRequest::remove_provider_v1(MonotonicTimeNs(2), actor("owner_1"), actor("p1"))
                .unwrap();
        match result(rt.run(&mut s, &remove).unwrap()) {
            RosterActionResult::Membership { active, changed, .. } => {
                assert!(!active);
                assert!(changed);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(!s.is_provider(&actor("p1")));
    }

    #[test]
    fn pause_twice_is_refused_and_unpause_requires_paused() {
        let rt = RosterRuntime;
        let mut s = store();

        let unpause = RosterRequest::unpause_v1(MonotonicTimeNs(1), actor("owner_1")).unwrap();
        let r = refusal(rt.run(&mut s, &unpause).unwrap());
        assert_eq!(r.kind, RefuseKind::Lifecycle);
        assert_eq!(r.reason_code, reason_codes::NOT_PAUSED);

        let pause = RosterRequest::pause_v1(MonotonicTimeNs(2), actor("owner_1")).unwrap();
        rt.run(&mut s, &pause).unwrap();
        assert!(s.paused());

        let r = refusal(rt.run(&mut s, &pause).unwrap());
        assert_eq!(r.reason_code, reason_codes::ALREADY_PAUSED);

        rt.run(&mut s, &unpause).unwrap();
        assert!(!s.paused());
    }

    #[test]
    fn zero_cooldown_is_refused_as_config_error() {
        let rt = RosterRuntime;
        let mut s = store();
        let req =
            RosterRequest::set_cooldown_v1(MonotonicTimeNs(1), actor("owner_1"), CooldownSeconds(0))
                .unwrap();
        let r = refusal(rt.run(&mut s, &req).unwrap());
        assert_eq!(r.kind, RefuseKind::Config);
        assert_eq!(r.reason_code, reason_codes::INVALID_COOLDOWN);
        assert_eq!(s.cooldown(), CooldownSeconds(60));
    }

    #[test]
    fn cooldown_change_reports_old_and_new_pair() {
        let rt = RosterRuntime;
        let mut s = store();
        let req = RosterRequest::set_cooldown_v1(
            MonotonicTimeNs(1),
            actor("owner_1"),
            CooldownSeconds(120),
        )
        .unwrap();
        match result(rt.run(&mut s, &req).unwrap()) {
            RosterActionResult::Cooldown { old, new } => {
                assert_eq!(old, CooldownSeconds(60));
                assert_eq!(new, CooldownSeconds(120));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        let row = &s.roster_ledger_rows()[0];
        assert_eq!(row.cooldown_old, Some(CooldownSeconds(60)));
        assert_eq!(row.cooldown_new, Some(CooldownSeconds(120)));
    }
}
