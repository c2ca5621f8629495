//! Host/off-host placement of a resolved AID pattern

use crate::domain::power::compute_aid_power_state;
use crate::domain::resolution::AidResolution;
use shared_types::{CardEmulationService, RouteAssignment, RouteTarget};

/// Where the controller should send `resolution`'s AID, or `None` when the
/// pattern has no eligible service.
pub fn route_assignment(resolution: &AidResolution, nci_version_2: bool) -> Option<RouteAssignment> {
    if let Some(service) = resolution.default_service() {
        return Some(RouteAssignment::new(
            target_of(service),
            compute_aid_power_state(
                service.on_host,
                service.requires_screen_on,
                service.requires_unlock,
                nci_version_2,
            ),
        ));
    }

    match resolution.services() {
        [] => None,
        [only] => Some(RouteAssignment::new(
            RouteTarget::Host,
            compute_aid_power_state(true, only.requires_screen_on, only.requires_unlock, nci_version_2),
        )),
        [first, rest @ ..] => {
            let same_secure_element = !first.on_host
                && rest.iter().all(|s| {
                    !s.on_host
                        && s.off_host_se == first.off_host_se
                        && s.requires_unlock == first.requires_unlock
                        && s.requires_screen_on == first.requires_screen_on
                });
            if same_secure_element {
                Some(RouteAssignment::new(
                    target_of(first),
                    compute_aid_power_state(
                        false,
                        first.requires_screen_on,
                        first.requires_unlock,
                        nci_version_2,
                    ),
                ))
            } else {
                // Host chooses; the chooser needs the screen on.
                Some(RouteAssignment::new(
                    RouteTarget::Host,
                    compute_aid_power_state(true, true, false, nci_version_2),
                ))
            }
        }
    }
}

fn target_of(service: &CardEmulationService) -> RouteTarget {
    if service.on_host {
        RouteTarget::Host
    } else {
        RouteTarget::OffHost {
            secure_element: service.off_host_se.clone().unwrap_or_default(),
        }
    }
}
