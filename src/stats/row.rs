use serde::Serialize;

/// Label of the per-type lifetime row.
pub const TOTAL_LABEL: &str = "TOTAL";

/// One line of a statistics snapshot.
///
/// `time_interval` is the window length in seconds, or `None` for the
/// lifetime total row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatRow {
    pub time_interval: Option<u32>,
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub message: &'static str,
    pub count: u64,
}

impl StatRow {
    pub fn is_total(&self) -> bool {
        self.time_interval.is_none()
    }
}
