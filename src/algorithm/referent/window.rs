//! Candidate referent windows
//!
//! Candidate control dates are arithmetic progressions over windows placed
//! before and/or after the case date, restricted to the case's calendar
//! month so that each stratum stays within one time stratum.

use chrono::{Duration, NaiveDate};
use smallvec::SmallVec;

use super::classifier::{ReferentClass, ReferentPosition};
use super::ReferentScheme;
use crate::utils::{month_end, month_start};

/// Candidate dates for one case; a month holds at most a dozen of them
pub type Candidates = SmallVec<[NaiveDate; 16]>;

/// Inclusive date window sampled with a fixed step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SteppedWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub step_days: i64,
}

impl SteppedWindow {
    /// Dates `start, start + step, ...` not exceeding `end`
    ///
    /// The end bound is inclusive but only reached when it falls on the
    /// progression.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let step = Duration::days(self.step_days.max(1));
        std::iter::successors(Some(self.start), move |d| d.checked_add_signed(step))
            .take_while(move |d| *d <= self.end)
    }
}

/// Forward window `[date + min_offset, date + days_in_month]`
#[must_use]
pub fn forward_window(position: &ReferentPosition, scheme: &ReferentScheme) -> SteppedWindow {
    SteppedWindow {
        start: position.date + Duration::days(scheme.min_offset_days),
        end: position.date + Duration::days(i64::from(position.days_in_month)),
        step_days: scheme.step_days,
    }
}

/// Backward window `[date - days_in_month, date - min_offset]`
#[must_use]
pub fn backward_window(position: &ReferentPosition, scheme: &ReferentScheme) -> SteppedWindow {
    SteppedWindow {
        start: position.date - Duration::days(i64::from(position.days_in_month)),
        end: position.date - Duration::days(scheme.min_offset_days),
        step_days: scheme.step_days,
    }
}

/// Windows that apply to a class, in chronological order
#[must_use]
pub fn windows_for(position: &ReferentPosition, scheme: &ReferentScheme) -> SmallVec<[SteppedWindow; 2]> {
    let mut windows = SmallVec::new();
    match position.class {
        ReferentClass::Start => windows.push(forward_window(position, scheme)),
        ReferentClass::End => windows.push(backward_window(position, scheme)),
        ReferentClass::Mid => {
            windows.push(backward_window(position, scheme));
            windows.push(forward_window(position, scheme));
        }
    }
    windows
}

/// All distinct candidate control dates for a case, ascending
///
/// Dates outside the case's calendar month are dropped.
#[must_use]
pub fn candidate_dates(position: &ReferentPosition, scheme: &ReferentScheme) -> Candidates {
    let first = month_start(position.date);
    let last = month_end(position.date);

    let mut candidates: Candidates = windows_for(position, scheme)
        .iter()
        .flat_map(SteppedWindow::dates)
        .filter(|d| *d >= first && *d <= last && *d != position.date)
        .collect();

    candidates.sort_unstable();
    candidates.dedup();
    candidates
}
