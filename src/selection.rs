//! Two-click day range selection and the editing session around it.

use chrono::{Datelike, Months, NaiveDate};
use tracing::{debug, info};

use crate::db::BlobStore;
use crate::error::{SchedulerError, SchedulerResult};
use crate::models::ScheduleWindow;
use crate::progress::ProgressFlag;
use crate::schedule::ScheduleStore;
use crate::status;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Empty,
    AnchorSet,
    RangeSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayMarker {
    Start,
    End,
    InRange,
    None,
}

/// In-progress selection. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionDraft {
    anchor: Option<NaiveDate>,
    endpoint: Option<NaiveDate>,
}

impl SelectionDraft {
    pub fn state(&self) -> SelectionState {
        match (self.anchor, self.endpoint) {
            (None, _) => SelectionState::Empty,
            (Some(_), None) => SelectionState::AnchorSet,
            (Some(_), Some(_)) => SelectionState::RangeSet,
        }
    }

    pub fn anchor(&self) -> Option<NaiveDate> {
        self.anchor
    }

    pub fn endpoint(&self) -> Option<NaiveDate> {
        self.endpoint
    }

    /// Applies a click on `day`. Days before `today` are not selectable and the
    /// click is ignored; returns whether the draft changed state.
    pub fn click(&mut self, day: NaiveDate, today: NaiveDate) -> bool {
        if day < today {
            return false;
        }
        match (self.anchor, self.endpoint) {
            (Some(anchor), None) if day < anchor => self.anchor = Some(day),
            (Some(_), None) => self.endpoint = Some(day),
            _ => {
                self.anchor = Some(day);
                self.endpoint = None;
            }
        }
        true
    }

    pub fn can_commit(&self) -> bool {
        self.anchor.is_some()
    }

    /// `(from, to)` with the endpoint defaulting to the anchor.
    pub fn range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let anchor = self.anchor?;
        let endpoint = self.endpoint.unwrap_or(anchor);
        Some((anchor.min(endpoint), anchor.max(endpoint)))
    }

    pub fn marker(&self, day: NaiveDate) -> DayMarker {
        if self.anchor == Some(day) {
            return DayMarker::Start;
        }
        if self.endpoint == Some(day) {
            return DayMarker::End;
        }
        match (self.anchor, self.endpoint) {
            (Some(from), Some(to)) if from < day && day < to => DayMarker::InRange,
            _ => DayMarker::None,
        }
    }

    pub fn build_window(&self, resource_id: &str, today: NaiveDate) -> SchedulerResult<ScheduleWindow> {
        let (from, to) = self.range().ok_or(SchedulerError::InvalidCommit)?;
        Ok(ScheduleWindow {
            resource_id: resource_id.to_string(),
            from,
            to,
            total_days: status::total_days(from, to),
            remaining_days: status::remaining_days(from, to, today),
        })
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub disabled: bool,
    pub is_today: bool,
    pub marker: DayMarker,
}

/// Editing session for one resource's exception window.
///
/// The draft always starts empty, even when the resource already has a stored
/// window; the stored window is only reachable through [`ScheduleEditor::remove`].
#[derive(Debug)]
pub struct ScheduleEditor {
    resource_id: String,
    today: NaiveDate,
    month: NaiveDate,
    draft: SelectionDraft,
    has_existing: bool,
    saving: ProgressFlag,
}

impl ScheduleEditor {
    pub fn open(resource_id: &str, existing: Option<&ScheduleWindow>, today: NaiveDate) -> Self {
        Self {
            resource_id: resource_id.to_string(),
            today,
            month: first_of_month(today),
            draft: SelectionDraft::default(),
            has_existing: existing.is_some(),
            saving: ProgressFlag::default(),
        }
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn draft(&self) -> &SelectionDraft {
        &self.draft
    }

    pub fn is_saving(&self) -> bool {
        self.saving.is_set()
    }

    /// Handle on the saving flag that stays readable while a confirm is pending.
    pub fn saving_flag(&self) -> ProgressFlag {
        self.saving.clone()
    }

    pub fn click(&mut self, day: NaiveDate) -> bool {
        let changed = self.draft.click(day, self.today);
        if !changed {
            debug!(resource_id = %self.resource_id, %day, "Ignoring click on past day");
        }
        changed
    }

    pub fn can_confirm(&self) -> bool {
        self.draft.can_commit() && !self.saving.is_set()
    }

    pub fn can_remove(&self) -> bool {
        self.has_existing
    }

    pub fn visible_month(&self) -> NaiveDate {
        self.month
    }

    pub fn can_go_back(&self) -> bool {
        self.month > first_of_month(self.today)
    }

    pub fn previous_month(&mut self) {
        if self.can_go_back() {
            if let Some(month) = self.month.checked_sub_months(Months::new(1)) {
                self.month = month;
            }
        }
    }

    pub fn next_month(&mut self) {
        if let Some(month) = self.month.checked_add_months(Months::new(1)) {
            self.month = month;
        }
    }

    /// Every day of the visible month with its selection marker.
    pub fn calendar(&self) -> Vec<CalendarDay> {
        self.month
            .iter_days()
            .take_while(|day| day.month() == self.month.month())
            .map(|date| CalendarDay {
                date,
                disabled: date < self.today,
                is_today: date == self.today,
                marker: self.draft.marker(date),
            })
            .collect()
    }

    /// Writes the drafted window to the store, replacing any previous one.
    ///
    /// If the returned future is dropped before it completes, the draft is kept
    /// and the saving flag is lowered.
    pub async fn confirm<B: BlobStore>(
        &mut self,
        store: &ScheduleStore<B>,
    ) -> SchedulerResult<ScheduleWindow> {
        let _saving = self.saving.begin().ok_or(SchedulerError::CommitInProgress)?;
        let window = self.draft.build_window(&self.resource_id, self.today)?;
        store.put(&self.resource_id, window.clone()).await?;

        info!(
            resource_id = %self.resource_id,
            from = %window.from,
            to = %window.to,
            total_days = window.total_days,
            "Exception window saved"
        );
        self.draft.clear();
        self.has_existing = true;
        Ok(window)
    }

    pub async fn remove<B: BlobStore>(
        &mut self,
        store: &ScheduleStore<B>,
    ) -> SchedulerResult<Option<ScheduleWindow>> {
        let removed = store.remove(&self.resource_id).await?;
        if removed.is_some() {
            info!(resource_id = %self.resource_id, "Exception window removed");
        }
        self.has_existing = false;
        Ok(removed)
    }

    /// Closes the session, discarding the draft.
    pub fn cancel(self) {
        debug!(resource_id = %self.resource_id, state = ?self.draft.state(), "Schedule edit cancelled");
    }
}

fn first_of_month(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}
