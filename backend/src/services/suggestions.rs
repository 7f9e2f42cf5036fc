//! Rule-based activity suggestions for students.

use serde::Serialize;
use utoipa::ToSchema;

use crate::models::redemption::Redemption;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    GettingStarted,
    KeepItUp,
    StayOnTrack,
    CatchUp,
    TalkToCounselor,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ActivitySuggestion {
    pub kind: SuggestionKind,
    pub message: String,
}

impl ActivitySuggestion {
    fn new(kind: SuggestionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Attendance figures a student's suggestions are derived from.
#[derive(Debug, Clone)]
pub struct AttendanceSnapshot<'a> {
    pub present_total: i64,
    pub sessions_held: i64,
    /// Most recent first.
    pub recent: &'a [Redemption],
}

impl AttendanceSnapshot<'_> {
    /// Share of held sessions attended, `None` before any session was held.
    pub fn rate(&self) -> Option<f64> {
        if self.sessions_held <= 0 {
            return None;
        }
        Some(self.present_total as f64 / self.sessions_held as f64)
    }
}

const STRONG_RATE: f64 = 0.95;
const WATCH_RATE: f64 = 0.80;
const RECENT_WINDOW: usize = 5;

pub fn suggest(snapshot: &AttendanceSnapshot<'_>) -> Vec<ActivitySuggestion> {
    let Some(rate) = snapshot.rate() else {
        return vec![ActivitySuggestion::new(
            SuggestionKind::GettingStarted,
            "Scan the code your teacher shows at the start of class to check in.",
        )];
    };

    let mut suggestions = Vec::new();
    if rate >= STRONG_RATE {
        suggestions.push(ActivitySuggestion::new(
            SuggestionKind::KeepItUp,
            "Great attendance so far. Keep it up!",
        ));
    } else if rate >= WATCH_RATE {
        suggestions.push(ActivitySuggestion::new(
            SuggestionKind::StayOnTrack,
            format!(
                "You have attended {:.0}% of sessions. A few more check-ins keeps you on track.",
                rate * 100.0
            ),
        ));
    } else {
        suggestions.push(ActivitySuggestion::new(
            SuggestionKind::TalkToCounselor,
            "Your attendance is below 80%. Consider booking time with a counselor.",
        ));
    }

    let recent_absences = snapshot
        .recent
        .iter()
        .take(RECENT_WINDOW)
        .filter(|r| !r.present)
        .count();
    if recent_absences > 0 {
        suggestions.push(ActivitySuggestion::new(
            SuggestionKind::CatchUp,
            format!(
                "You were marked absent {} time(s) recently. Ask your teacher about missed work.",
                recent_absences
            ),
        ));
    }
    suggestions
}
