//! Metric key naming.

/// Map a host or address to a metric key safe for the agent output format.
///
/// Every `.` becomes `_`; nothing else is touched, so the mapping is
/// idempotent.
///
/// ```
/// use ping_rtt::naming::metric_key;
///
/// assert_eq!(metric_key("127.0.0.1"), "127_0_0_1");
/// assert_eq!(metric_key("8_8_8_8"), "8_8_8_8");
/// ```
pub fn metric_key(host: &str) -> String {
    host.replace('.', "_")
}
