use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod alert;
pub mod announcement;
pub mod audio;
pub mod health;
pub mod sse;
pub mod station;
pub mod validation;

fn format_time(time: OffsetDateTime) -> String {
    time.format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

pub(crate) fn format_system_time(time: SystemTime) -> String {
    format_time(OffsetDateTime::from(time))
}
