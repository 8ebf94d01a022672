//! Output formatting for reports, events and payloads.

use anyhow::Result;
use nearby_core::{DeviceView, IdentityPayload, ProximityEvent, ProximityReport};
use owo_colors::OwoColorize;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;

/// Formatting options for output.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
    /// Use compact JSON output (one object per line).
    pub compact: bool,
}

impl FormatOptions {
    pub fn new(no_color: bool) -> Self {
        Self {
            no_color,
            compact: false,
        }
    }

    /// Create with compact JSON option.
    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    /// Serialize value to JSON string, respecting compact option.
    pub fn as_json<T: Serialize>(&self, value: &T) -> Result<String> {
        let json = if self.compact {
            serde_json::to_string(value)?
        } else {
            serde_json::to_string_pretty(value)?
        };
        Ok(json + "\n")
    }
}

/// Render a score as a ten-cell bar.
///
/// Scores run from about -100 (weak) to -30 (strong).
pub fn format_score_bar(score: f32, no_color: bool) -> String {
    let strength = ((score + 100.0).clamp(0.0, 70.0) / 7.0).round() as usize;
    let filled = strength.min(10);
    let bar = format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled));

    if no_color {
        format!("{} {:>6.1}", bar, score)
    } else if filled >= 4 {
        format!("{} {:>6.1}", bar.green(), score)
    } else {
        format!("{} {:>6.1}", bar.yellow(), score)
    }
}

fn display_name(device: &DeviceView) -> &str {
    if device.user_name.is_empty() {
        "(unnamed)"
    } else {
        &device.user_name
    }
}

/// Format one report as text: a timestamped header then one line per device.
pub fn format_report_text(report: &ProximityReport, opts: &FormatOptions) -> String {
    let stamp = report
        .generated_at
        .format(&Rfc3339)
        .unwrap_or_else(|_| report.generated_at.to_string());

    let count = report.immediate.len();
    let summary = match count {
        0 => "nobody nearby".to_string(),
        1 => "1 person nearby".to_string(),
        n => format!("{} people nearby", n),
    };
    let mut output = if opts.no_color {
        format!("{}  {}\n", stamp, summary)
    } else if count == 0 {
        format!("{}  {}\n", stamp.dimmed(), summary.dimmed())
    } else {
        format!("{}  {}\n", stamp.dimmed(), summary.bold())
    };

    for device in &report.immediate {
        let name = display_name(device);
        let name = if opts.no_color {
            name.to_string()
        } else {
            name.cyan().to_string()
        };
        output.push_str(&format!(
            "  {:<24} user {:<8} {}\n",
            name,
            device.user_id,
            format_score_bar(device.score, opts.no_color)
        ));
    }
    output
}

/// Format one report as JSON.
pub fn format_report_json(report: &ProximityReport, opts: &FormatOptions) -> Result<String> {
    opts.as_json(report)
}

/// Format a coordinator event as a single text line.
///
/// Reports are rendered by [`format_report_text`] and return `None` here.
pub fn format_event_text(event: &ProximityEvent, opts: &FormatOptions) -> Option<String> {
    let line = match event {
        ProximityEvent::Discovered {
            identity,
            transport_id,
            rssi,
        } => format!("discovered {} ({}) at {:.0} dBm", transport_id, identity, rssi),
        ProximityEvent::ConnectRequested { transport_id } => {
            format!("connecting to {}", transport_id)
        }
        ProximityEvent::Identified {
            identity,
            user_id,
            user_name,
        } => format!("identified {} as user {} ({})", identity, user_id, user_name),
        ProximityEvent::IdentityRejected {
            transport_id,
            reason,
        } => format!("rejected identity from {}: {}", transport_id, reason),
        ProximityEvent::ConnectFailed {
            transport_id,
            reason,
        } => format!("connect to {} failed: {}", transport_id, reason),
        ProximityEvent::ScanRestarted { abandoned: 0 } => "scan restarted".to_string(),
        ProximityEvent::ScanRestarted { abandoned } => {
            format!("scan restarted, {} connect(s) abandoned", abandoned)
        }
        ProximityEvent::Report(_) => return None,
        _ => format!("{:?}", event),
    };

    let failed = matches!(
        event,
        ProximityEvent::IdentityRejected { .. } | ProximityEvent::ConnectFailed { .. }
    );
    Some(if opts.no_color {
        format!("[--] {}", line)
    } else if failed {
        format!("{} {}", "[!!]".yellow(), line)
    } else {
        format!("{} {}", "[--]".cyan(), line)
    })
}

/// Format a parsed identity payload.
pub fn format_payload_text(payload: &IdentityPayload, opts: &FormatOptions) -> String {
    let mut output = format!("User ID:   {}\n", payload.user_id);
    output.push_str(&format!("User name: {}\n", payload.user_name));
    if payload.user_id == 0 {
        output.push_str(&format_warning(
            "user id 0 does not identify a device",
            opts.no_color,
        ));
        output.push('\n');
    }
    output
}

/// Format a success message.
pub fn format_success(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[OK] {}", message)
    } else {
        format!("{} {}", "[OK]".green(), message)
    }
}

/// Format a warning message.
pub fn format_warning(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[!!] {}", message)
    } else {
        format!("{} {}", "[!!]".yellow(), message)
    }
}
