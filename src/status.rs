use chrono::{
    DateTime,
    Local,
};
use std::fmt;

/// Day-first date followed by a 24h clock, e.g. `11/06/2025, 14:05:09`.
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y, %H:%M:%S";

/// State carried from one refresh cycle to the next.
///
/// Owned by the application loop and handed to whoever applies a cycle
/// outcome, so the time of the last successful fetch is never global.
#[derive(Debug, Clone, Default)]
pub struct DashboardContext {
    last_update: Option<DateTime<Local>>,
}

impl DashboardContext {
    pub fn last_update(&self) -> Option<DateTime<Local>> {
        self.last_update
    }

    pub fn record_success(&mut self, at: DateTime<Local>) -> StatusLine {
        self.last_update = Some(at);
        StatusLine::Updated(at)
    }

    pub fn record_failure(&self) -> StatusLine {
        StatusLine::Failed {
            last_success: self.last_update,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StatusLine {
    #[default]
    Loading,
    Updated(DateTime<Local>),
    Failed {
        last_success: Option<DateTime<Local>>,
    },
}

impl StatusLine {
    pub fn is_error(&self) -> bool {
        matches!(self, StatusLine::Failed { .. })
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLine::Loading => write!(f, "Loading..."),
            StatusLine::Updated(at) => {
                write!(f, "Last updated: {}", at.format(TIMESTAMP_FORMAT))
            }
            StatusLine::Failed {
                last_success: Some(at),
            } => write!(
                f,
                "Error updating data (last success: {})",
                at.format(TIMESTAMP_FORMAT)
            ),
            StatusLine::Failed { last_success: None } => {
                write!(f, "Error updating data (last success: never)")
            }
        }
    }
}
