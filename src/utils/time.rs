//! Time parsing and formatting utilities

/// Parse a sexagesimal duration string (`HH:MM:SS.xx`) to seconds.
///
/// Matroska files frequently carry stream durations only as a `DURATION`
/// tag in this form, so the prober needs it as a fallback.
pub fn parse_sexagesimal(s: &str) -> Option<f64> {
    let mut parts = s.trim().splitn(3, ':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if hours < 0.0 || minutes < 0.0 || seconds < 0.0 {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Format a duration in seconds as `H:MM:SS` (or `M:SS` under an hour).
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}
