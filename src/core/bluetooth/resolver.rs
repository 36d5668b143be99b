//! Patches a single characteristic inside a selected session.
//!
//! The session is never mutated: a new session is returned whose untouched
//! service details are the same `Arc`s as before.

use std::sync::Arc;

use uuid::Uuid;

use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::types::{CharacteristicInfo, SelectedSession, ServiceDetail};

/// Replaces the characteristic `(service_uuid, characteristic_uuid)` with
/// `updater(existing)`. The first matching service and, inside it, the first
/// matching characteristic win.
pub fn apply_update<F>(
    session: &SelectedSession,
    service_uuid: Uuid,
    characteristic_uuid: Uuid,
    updater: F,
) -> Result<SelectedSession, BleError>
where
    F: FnOnce(CharacteristicInfo) -> CharacteristicInfo,
{
    let not_found = || BleError::NotFound {
        service: service_uuid,
        characteristic: characteristic_uuid,
    };

    let detail_index = session
        .details
        .iter()
        .position(|detail| detail.service.uuid == service_uuid)
        .ok_or_else(not_found)?;
    let detail = &session.details[detail_index];

    let char_index = detail
        .characteristics
        .iter()
        .position(|chr| chr.uuid == characteristic_uuid)
        .ok_or_else(not_found)?;

    let mut characteristics = detail.characteristics.clone();
    let existing = characteristics[char_index].clone();
    characteristics[char_index] = updater(existing);

    let mut details = session.details.clone();
    details[detail_index] = Arc::new(ServiceDetail {
        service: detail.service.clone(),
        characteristics,
    });

    Ok(SelectedSession {
        device: session.device.clone(),
        details,
    })
}
