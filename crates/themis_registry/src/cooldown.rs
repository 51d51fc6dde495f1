#![forbid(unsafe_code)]

use themis_kernel_contracts::attribute::UserId;
use themis_kernel_contracts::roster::{ActorId, CooldownSeconds};
use themis_kernel_contracts::MonotonicTimeNs;
use themis_storage::RegistryStore;

/// A cooldown has elapsed at exactly `last + cooldown`; before that it
/// is still active. A key with no recorded time has no cooldown.
pub fn cooldown_elapsed(
    last: Option<MonotonicTimeNs>,
    now: MonotonicTimeNs,
    cooldown: CooldownSeconds,
) -> bool {
    match last {
        None => true,
        Some(last) => now.0 >= last.0.saturating_add(cooldown.as_nanos()),
    }
}

pub fn submission_cooldown_active(
    store: &RegistryStore,
    user_id: &UserId,
    now: MonotonicTimeNs,
) -> bool {
    !cooldown_elapsed(store.last_submission_at(user_id), now, store.cooldown())
}

pub fn request_cooldown_active(
    store: &RegistryStore,
    provider_id: &ActorId,
    now: MonotonicTimeNs,
) -> bool {
    !cooldown_elapsed(store.last_request_at(provider_id), now, store.cooldown())
}
