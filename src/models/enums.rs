use std::time::Duration;

use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Frequency {
    OnceDaily => "once_daily",
    TwiceDaily => "twice_daily",
    ThriceDaily => "thrice_daily",
    EveryFourHours => "every_four_hours",
    EverySixHours => "every_six_hours",
    Weekly => "weekly",
    Monthly => "monthly",
    AsNeeded => "as_needed",
});

/// How a frequency turns its `times` into slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleKind {
    /// One slot per configured time, repeating every day.
    Daily,
    /// One slot anchored at the earliest time, repeating at a fixed step.
    Interval(Duration),
    /// One slot on the start date's weekday.
    Weekly,
    /// One slot on the start date's day-of-month.
    Monthly,
    /// Never auto-scheduled.
    Unscheduled,
}

impl Frequency {
    pub const ALL: [Frequency; 8] = [
        Self::OnceDaily,
        Self::TwiceDaily,
        Self::ThriceDaily,
        Self::EveryFourHours,
        Self::EverySixHours,
        Self::Weekly,
        Self::Monthly,
        Self::AsNeeded,
    ];

    pub fn kind(&self) -> ScheduleKind {
        match self {
            Self::OnceDaily | Self::TwiceDaily | Self::ThriceDaily => ScheduleKind::Daily,
            Self::EveryFourHours => ScheduleKind::Interval(Duration::from_secs(4 * 3600)),
            Self::EverySixHours => ScheduleKind::Interval(Duration::from_secs(6 * 3600)),
            Self::Weekly => ScheduleKind::Weekly,
            Self::Monthly => ScheduleKind::Monthly,
            Self::AsNeeded => ScheduleKind::Unscheduled,
        }
    }

    /// Whether the engine ever arms alarms for this frequency.
    pub fn is_scheduled(&self) -> bool {
        !matches!(self.kind(), ScheduleKind::Unscheduled)
    }

    /// Number of times-of-day the entry form collects for daily kinds.
    pub fn doses_per_day(&self) -> Option<usize> {
        match self {
            Self::OnceDaily => Some(1),
            Self::TwiceDaily => Some(2),
            Self::ThriceDaily => Some(3),
            _ => None,
        }
    }
}
