//! Presentation mapping for timeline records.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::{LevelTag, LogRecord};

/// Visual category of a timeline record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    Navigate,
    Click,
    Type,
    Highlight,
    Snapshot,
    Planning,
    Init,
    User,
    Error,
    Complete,
    Shutdown,
    /// Fallback for every unrecognized tag.
    Default,
}

impl LogCategory {
    /// Map a level tag to its category.
    ///
    /// Total: unknown tags (including `MALFORMED`) fall back to `Default`.
    #[must_use]
    pub fn for_level(level: &LevelTag) -> Self {
        match level.as_str().to_ascii_uppercase().as_str() {
            "NAVIGATE" => Self::Navigate,
            "CLICK" => Self::Click,
            "TYPE" => Self::Type,
            "HIGHLIGHT" => Self::Highlight,
            "GET_SNAPSHOT" => Self::Snapshot,
            "PLANNING" => Self::Planning,
            "INIT" => Self::Init,
            "USER" => Self::User,
            "ERROR" => Self::Error,
            "COMPLETE" => Self::Complete,
            "SHUTDOWN" => Self::Shutdown,
            _ => Self::Default,
        }
    }

    /// Stylesheet class for web surfaces.
    #[must_use]
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Navigate => "log-navigate",
            Self::Click => "log-click",
            Self::Type => "log-type",
            Self::Highlight => "log-highlight",
            Self::Snapshot => "log-snapshot",
            Self::Planning => "log-planning",
            Self::Init => "log-init",
            Self::User => "log-user",
            Self::Error => "log-error",
            Self::Complete => "log-complete",
            Self::Shutdown => "log-shutdown",
            Self::Default => "log-default",
        }
    }
}

/// Format a receipt timestamp as local 24-hour `HH:MM:SS`.
///
/// Display only; ordering never looks at this string.
#[must_use]
pub fn format_timestamp(timestamp: DateTime<Local>) -> String {
    timestamp.format("%H:%M:%S").to_string()
}

impl LogRecord {
    /// Category used to style this record.
    #[must_use]
    pub fn category(&self) -> LogCategory {
        LogCategory::for_level(self.level())
    }

    /// Single-line rendering: `[HH:MM:SS] [LEVEL] message`.
    #[must_use]
    pub fn render_line(&self) -> String {
        format!(
            "[{}] [{}] {}",
            format_timestamp(self.timestamp()),
            self.level(),
            self.message()
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_known_tags_map_case_insensitively() {
        assert_eq!(
            LogCategory::for_level(&LevelTag::new("navigate")),
            LogCategory::Navigate
        );
        assert_eq!(
            LogCategory::for_level(&LevelTag::new("Get_Snapshot")),
            LogCategory::Snapshot
        );
        assert_eq!(
            LogCategory::for_level(&LevelTag::new("COMPLETE")),
            LogCategory::Complete
        );
    }

    #[test]
    fn test_unknown_tags_fall_back_to_default() {
        for tag in ["MALFORMED", "", "SCROLL", "✨"] {
            let category = LogCategory::for_level(&LevelTag::new(tag));
            assert_eq!(category, LogCategory::Default);
            assert_eq!(category.css_class(), "log-default");
        }
    }

    #[test]
    fn test_timestamp_is_24_hour() {
        let ts = Local.with_ymd_and_hms(2024, 3, 9, 17, 5, 3).unwrap();
        assert_eq!(format_timestamp(ts), "17:05:03");
    }

    #[test]
    fn test_render_line() {
        let ts = Local.with_ymd_and_hms(2024, 3, 9, 8, 0, 59).unwrap();
        let record = LogRecord::at(LevelTag::new("CLICK"), "#submit", ts);
        assert_eq!(record.render_line(), "[08:00:59] [CLICK] #submit");
        assert_eq!(record.category().css_class(), "log-click");
    }
}
