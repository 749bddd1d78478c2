use chrono::{DateTime, Local};
use shared::protocol::{BridgeStats, LogEntry};

/// Unix-seconds epoch to local time; `0` means "never" throughout the
/// bridge's stats.
pub fn format_epoch(ts: i64) -> String {
    if ts <= 0 {
        return "never".into();
    }
    match DateTime::from_timestamp(ts, 0) {
        Some(utc) => utc
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => format!("epoch {ts}"),
    }
}

pub fn print_stats(stats: &BridgeStats) {
    println!(
        "Bridge:        {}",
        if stats.running { "running" } else { "stopped" }
    );
    println!(
        "Serial:        {} ({} baud, {})",
        if stats.serial_port.is_empty() {
            "-"
        } else {
            &stats.serial_port
        },
        stats.baud_rate,
        if stats.serial_connected {
            "connected"
        } else {
            "disconnected"
        }
    );
    println!("VISCA port:    {}", stats.visca_port);
    println!(
        "Clients:       {} ({} total connections)",
        stats.client_count, stats.total_connections
    );
    println!(
        "Traffic:       {} ip→serial, {} serial→ip",
        stats.ip_to_serial, stats.serial_to_ip
    );
    println!("Started:       {}", format_epoch(stats.started_at));
    println!("Last activity: {}", format_epoch(stats.last_activity));

    if !stats.log.is_empty() {
        println!();
        println!("Event log:");
        // The bridge sends entries newest-first; print chronologically.
        for entry in stats.log.iter().rev() {
            print_log_entry(entry);
        }
    }
}

pub fn print_status_line(stats: &BridgeStats) {
    println!(
        "[{}] bridge={} serial={} clients={} i2r={} r2i={}",
        format_epoch(stats.last_activity),
        if stats.running { "up" } else { "down" },
        if stats.serial_connected { "up" } else { "down" },
        stats.client_count,
        stats.ip_to_serial,
        stats.serial_to_ip
    );
}

pub fn print_log_entry(entry: &LogEntry) {
    println!(
        "  {} [{}] {}",
        format_epoch(entry.timestamp),
        entry.level,
        entry.message
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_epoch_renders_never() {
        assert_eq!(format_epoch(0), "never");
        assert_eq!(format_epoch(-1), "never");
    }

    #[test]
    fn positive_epoch_renders_a_timestamp() {
        let rendered = format_epoch(1_700_000_000);
        assert_ne!(rendered, "never");
        assert!(rendered.contains(':'), "expected a time: {rendered}");
    }
}
