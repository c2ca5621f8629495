//! Power-state computation for routed AIDs

use shared_types::PowerState;

/// Power states in which a routed AID stays reachable.
///
/// Starts from every state except battery-off (NCI 2.0) or the three
/// legacy switch/battery bits (NCI 1.x) and clears what the service's
/// residency and policy flags forbid.
pub fn compute_aid_power_state(
    on_host: bool,
    requires_screen_on: bool,
    requires_unlock: bool,
    nci_version_2: bool,
) -> PowerState {
    let mut state = if nci_version_2 {
        PowerState::ALL & !PowerState::BATTERY_OFF
    } else {
        PowerState::NCI_V1_ALL
    };

    if on_host {
        state = state & !(PowerState::SWITCH_OFF | PowerState::BATTERY_OFF);
    } else if requires_unlock {
        state = state & !PowerState::SCREEN_ON_LOCKED;
    }

    if requires_screen_on {
        state = state
            & !(PowerState::SWITCH_OFF
                | PowerState::BATTERY_OFF
                | PowerState::SCREEN_OFF_UNLOCKED
                | PowerState::SCREEN_OFF_LOCKED);
    }
    if requires_unlock {
        state = state
            & !(PowerState::SWITCH_OFF | PowerState::BATTERY_OFF | PowerState::SCREEN_OFF_LOCKED);
    }

    state
}
