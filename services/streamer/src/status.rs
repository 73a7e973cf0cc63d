//! Periodic status report

use tracing::info;

use crate::channel::LinkState;
use crate::server::ServerStatus;

/// Log one line per site and one per channel
pub fn log_status(status: &ServerStatus) {
    for site in &status.sites {
        info!(
            site = %site.name,
            enabled = site.enabled,
            effect = %site.current_effect,
            fps = site.fps,
            spare_ms = site.spare_ms,
            rendered = site.frames_rendered,
            dropped = site.frames_dropped,
            rejected = site.frames_rejected,
            bytes_per_second = site.bytes_per_second,
            "Site status"
        );

        for channel in &site.channels {
            info!(
                site = %site.name,
                host = %channel.host,
                channel = %channel.name,
                state = state_label(channel.state),
                queue = channel.queue_depth,
                connects = channel.connects,
                firmware = channel.firmware_version.as_deref().unwrap_or("-"),
                device_fps = channel.telemetry.fps_drawing,
                wifi = channel.telemetry.wifi_signal,
                watts = channel.telemetry.watts,
                "Channel status"
            );
        }
    }

    info!(
        total_bytes_per_second = status.total_bytes_per_second,
        min_bytes_per_second = status.min_bytes_per_second,
        connections = status.connections.len(),
        "Streamer status"
    );
}

fn state_label(state: LinkState) -> &'static str {
    match state {
        LinkState::Disconnected => "disconnected",
        LinkState::Connected => "connected",
        LinkState::QueueFull => "queue full",
        LinkState::Jammed => "jammed",
        LinkState::Stopped => "stopped",
    }
}

/// The status snapshot as a single JSON line
pub fn to_json_line(status: &ServerStatus) -> serde_json::Result<String> {
    serde_json::to_string(status)
}
