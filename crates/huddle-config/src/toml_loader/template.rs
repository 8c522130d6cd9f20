//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> &'static str {
    r##"# Huddle Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[presence]
# Seconds between lastSeen refreshes while in a room. 0 turns heartbeats
# and stale-record reaping off.
# heartbeat_interval_secs = 0   # 0-3600
# Records not refreshed for this long are removed by the reaper.
# stale_after_secs = 120        # 10-86400, at least 2x the heartbeat
# reap_interval_secs = 60       # 5-3600

[rooms]
# max_rooms_per_owner = 3       # 1-100
# max_message_length = 1000     # 1-10000

[logging]
# level = "info"                # trace, debug, info, warn, error
# RUST_LOG overrides this when set.
"##
}
