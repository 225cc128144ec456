//! Keyword patterns for hazard classification and emergency readiness scans.

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::FatalFour;

lazy_static! {
    // Checked in this order; "struck by a falling object" is struck-by, not a fall.
    pub static ref STRUCK_BY_PATTERN: Regex = Regex::new(
        r"(?i)\b(struck|falling (object|material|debris|tool)s?|dropped (object|load)s?|swing(ing)? load|suspended load|overhead load|flying debris|backing vehicle|run over)"
    ).unwrap();

    pub static ref ELECTROCUTION_PATTERN: Regex = Regex::new(
        r"(?i)\b(electrocut\w*|electric(al)? shock|arc flash|energi[sz]ed|live (wire|circuit|conductor)s?|power ?lines?|high voltage)"
    ).unwrap();

    pub static ref CAUGHT_BETWEEN_PATTERN: Regex = Regex::new(
        r"(?i)\b(caught|pinch(ed)? point|crush\w*|trench (collapse|cave-?in)|cave-?in|entangle\w*|rotating (part|equipment)s?)"
    ).unwrap();

    pub static ref FALLS_PATTERN: Regex = Regex::new(
        r"(?i)\b(falls?|falling|fell|ladders?|scaffold\w*|roof edge|leading edge|unprotected edge|floor openings?|swing stage|aerial lift|working at height)"
    ).unwrap();

    pub static ref RESCUE_PATTERN: Regex = Regex::new(r"(?i)rescue").unwrap();

    pub static ref FIRST_AID_PATTERN: Regex = Regex::new(r"(?i)first[\s_-]?aid").unwrap();

    pub static ref COMMUNICATION_PATTERN: Regex = Regex::new(r"(?i)radio|communication").unwrap();

    pub static ref EVACUATION_PATTERN: Regex =
        Regex::new(r"(?i)evacuation|emergency[\s_-]?exit").unwrap();
}

/// Classify a free-text hazard description into a Fatal Four bucket.
pub fn classify_hazard(text: &str) -> FatalFour {
    if STRUCK_BY_PATTERN.is_match(text) {
        FatalFour::StruckBy
    } else if ELECTROCUTION_PATTERN.is_match(text) {
        FatalFour::Electrocution
    } else if CAUGHT_BETWEEN_PATTERN.is_match(text) {
        FatalFour::CaughtBetween
    } else if FALLS_PATTERN.is_match(text) {
        FatalFour::Falls
    } else {
        FatalFour::Other
    }
}

/// Emergency provisions found in a checklist's text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmergencyProvisions {
    pub rescue: bool,
    pub first_aid: bool,
    pub communication: bool,
    pub evacuation: bool,
}

/// Scan text for rescue, first aid, communication and evacuation terms.
pub fn scan_emergency_provisions(text: &str) -> EmergencyProvisions {
    EmergencyProvisions {
        rescue: RESCUE_PATTERN.is_match(text),
        first_aid: FIRST_AID_PATTERN.is_match(text),
        communication: COMMUNICATION_PATTERN.is_match(text),
        evacuation: EVACUATION_PATTERN.is_match(text),
    }
}
