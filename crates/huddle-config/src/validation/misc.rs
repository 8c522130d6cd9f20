//! Presence and room limit validation.

use super::helpers::validate_range;
use crate::schema::HuddleConfig;

/// Validate presence constraints.
pub(crate) fn validate_presence(errors: &mut Vec<String>, config: &HuddleConfig) {
    let presence = &config.presence;
    validate_range(
        errors,
        "presence.heartbeat_interval_secs",
        presence.heartbeat_interval_secs,
        0,
        3600,
    );
    validate_range(
        errors,
        "presence.stale_after_secs",
        presence.stale_after_secs,
        10,
        86400,
    );
    validate_range(
        errors,
        "presence.reap_interval_secs",
        presence.reap_interval_secs,
        5,
        3600,
    );

    // A live session must get at least two heartbeats in before it counts
    // as stale.
    let heartbeat = presence.heartbeat_interval_secs;
    if heartbeat > 0 && presence.stale_after_secs < heartbeat.saturating_mul(2) {
        errors.push(format!(
            "presence.stale_after_secs = {} must be at least twice presence.heartbeat_interval_secs = {heartbeat}",
            presence.stale_after_secs
        ));
    }
}

/// Validate room limits.
pub(crate) fn validate_rooms(errors: &mut Vec<String>, config: &HuddleConfig) {
    validate_range(
        errors,
        "rooms.max_rooms_per_owner",
        config.rooms.max_rooms_per_owner,
        1,
        100,
    );
    validate_range(
        errors,
        "rooms.max_message_length",
        config.rooms.max_message_length,
        1,
        10000,
    );
}
