//! Static domain reference used when building stage prompts.

use crate::input::WeatherConditions;
use crate::types::FatalFour;

/// Share of construction fatalities and the probability multiplier for a
/// Fatal Four category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FatalFourStat {
    pub category: FatalFour,
    pub label: &'static str,
    /// Percent of construction deaths (OSHA 2023).
    pub fatality_share: f64,
    pub multiplier: f64,
}

pub const FATAL_FOUR: [FatalFourStat; 4] = [
    FatalFourStat {
        category: FatalFour::Falls,
        label: "Falls from >6ft",
        fatality_share: 36.5,
        multiplier: 2.8,
    },
    FatalFourStat {
        category: FatalFour::StruckBy,
        label: "Struck by object",
        fatality_share: 10.1,
        multiplier: 1.6,
    },
    FatalFourStat {
        category: FatalFour::Electrocution,
        label: "Electrocution",
        fatality_share: 8.5,
        multiplier: 0.4,
    },
    FatalFourStat {
        category: FatalFour::CaughtBetween,
        label: "Caught between",
        fatality_share: 7.3,
        multiplier: 0.9,
    },
];

/// Time windows in which construction incidents cluster.
pub const HIGH_RISK_PERIODS: &str =
    "10:00-11:30 AM, 2:00-3:30 PM, last hour of shift, Friday afternoons";

/// Fields every checklist must document regardless of trade.
pub const UNIVERSAL_CRITICAL_FIELDS: &[&str] = &[
    "Emergency evacuation plan with a named assembly point",
    "Worker certifications by type (OSHA 10/30, equipment cards)",
    "Equipment specifications or last inspection date",
    "Specific PPE items required for the task",
    "At least three specific hazards identified",
];

/// Trade-specific critical fields, chosen by keyword in the work type.
pub fn trade_specific_fields(work_type: &str) -> &'static str {
    let work_type = work_type.to_lowercase();

    if work_type.contains("electric") {
        "Electrical trade critical fields:\n\
         - Lock-out/tag-out procedure naming each energy source\n\
         - Arc flash PPE category (0-4) and calorie rating\n\
         - Voltage test procedure with rated test equipment\n\
         - Qualified person designated for energized work\n\
         - Limited and restricted approach boundaries"
    } else if work_type.contains("roof") {
        "Roofing trade critical fields:\n\
         - Fall protection plan for the roof type and slope\n\
         - Wind, temperature and precipitation monitoring\n\
         - Material staging and load limits on the roof surface\n\
         - Emergency descent and rescue from roof level"
    } else if work_type.contains("scaffold") {
        "Scaffolding trade critical fields:\n\
         - Erection plan signed off by a competent person\n\
         - Load calculations for the intended use\n\
         - Daily inspection record\n\
         - Tie-in requirements to the structure"
    } else if work_type.contains("crane") {
        "Crane operation critical fields:\n\
         - Operator certification and medical clearance\n\
         - Lift plan with load chart and rigging details\n\
         - Ground bearing assessment and outrigger setup\n\
         - Signal person and operator communication protocol"
    } else if work_type.contains("glass") || work_type.contains("glazing") {
        "Glass installation critical fields:\n\
         - Wind speed monitoring with a stated suspension limit\n\
         - Certification of vacuum lifters and suction devices\n\
         - Fall protection suited to glazing at the edge\n\
         - Response plan for glass breakage and falls"
    } else {
        "General construction critical fields:\n\
         - Competent person designated for identified hazards\n\
         - Site-specific hazard assessment\n\
         - Emergency action plan for the work scope\n\
         - Task-specific training verified for each worker"
    }
}

/// Weather multipliers that apply to the current conditions.
///
/// Always returns at least one line; calm conditions yield the neutral
/// `Normal: ×1.0` multiplier.
pub fn weather_multipliers(weather: &WeatherConditions) -> Vec<&'static str> {
    let mut multipliers = Vec::new();

    if let Some(temp) = weather.temperature {
        if !(32.0..=95.0).contains(&temp) {
            multipliers.push("Extreme temp: ×1.4");
        }
    }

    if weather.wind_speed.is_some_and(|w| w > 25.0) {
        multipliers.push("High winds: ×1.8");
    }

    if weather.has_precipitation() {
        multipliers.push("Precipitation: ×1.6");
    }

    if multipliers.is_empty() {
        multipliers.push("Normal: ×1.0");
    }

    multipliers
}
