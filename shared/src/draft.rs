//! A single time-boxed candidate that must be confirmed before it is created.
//!
//! Only the absolute deadline is stored. Whatever schedules the wake-up reads
//! `timer()`; the generation changes whenever the draft is created or cleared,
//! so a wake-up scheduled for an earlier draft is recognised and ignored.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{AppError, ValidationError};
use crate::model::StudyItemType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("a draft is already pending")]
    AlreadyPending,
    #[error("draft title is empty")]
    EmptyTitle,
    #[error("no draft is pending")]
    NoDraft,
}

impl From<DraftError> for AppError {
    fn from(e: DraftError) -> Self {
        match e {
            DraftError::AlreadyPending => ValidationError::DraftPending.into(),
            DraftError::EmptyTitle => ValidationError::EmptyTitle.into(),
            DraftError::NoDraft => AppError::validation("There is no draft to confirm"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub title: String,
    pub description: Option<String>,
    pub item_type: StudyItemType,
    pub expires_at_ms: u64,
}

impl Draft {
    #[must_use]
    pub const fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }

    #[must_use]
    pub const fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.expires_at_ms.saturating_sub(now_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftTimer {
    pub generation: u64,
    pub fires_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftController {
    draft: Option<Draft>,
    generation: u64,
    ttl_ms: u64,
}

impl DraftController {
    #[must_use]
    pub const fn new(ttl_ms: u64) -> Self {
        Self {
            draft: None,
            generation: 0,
            ttl_ms,
        }
    }

    /// The pending draft as of `now_ms`. A draft past its deadline is never
    /// returned, even before the timer has fired.
    #[must_use]
    pub fn current(&self, now_ms: u64) -> Option<&Draft> {
        self.draft.as_ref().filter(|d| !d.is_expired(now_ms))
    }

    #[must_use]
    pub fn timer(&self) -> Option<DraftTimer> {
        self.draft.as_ref().map(|d| DraftTimer {
            generation: self.generation,
            fires_at_ms: d.expires_at_ms,
        })
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub fn add(
        &mut self,
        title: &str,
        description: Option<&str>,
        item_type: StudyItemType,
        now_ms: u64,
    ) -> Result<&Draft, DraftError> {
        self.expire(now_ms);
        if self.draft.is_some() {
            return Err(DraftError::AlreadyPending);
        }

        let title = title.trim();
        if title.is_empty() {
            return Err(DraftError::EmptyTitle);
        }
        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        self.generation += 1;
        Ok(self.draft.insert(Draft {
            title: title.to_string(),
            description,
            item_type,
            expires_at_ms: now_ms.saturating_add(self.ttl_ms),
        }))
    }

    /// Takes the draft for promotion. An expired draft is discarded instead.
    pub fn confirm(&mut self, now_ms: u64) -> Result<Draft, DraftError> {
        self.expire(now_ms);
        let draft = self.draft.take().ok_or(DraftError::NoDraft)?;
        self.generation += 1;
        Ok(draft)
    }

    pub fn cancel(&mut self) -> bool {
        self.clear()
    }

    /// Drops the draft if its deadline has passed. Returns whether it did.
    pub fn expire(&mut self, now_ms: u64) -> bool {
        match &self.draft {
            Some(draft) if draft.is_expired(now_ms) => self.clear(),
            _ => false,
        }
    }

    /// A scheduled wake-up arrived. Stale generations are ignored.
    pub fn on_timer_fired(&mut self, generation: u64, now_ms: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        self.expire(now_ms)
    }

    fn clear(&mut self) -> bool {
        if self.draft.take().is_some() {
            self.generation += 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DRAFT_TTL_MS;
    use proptest::prelude::*;

    fn controller() -> DraftController {
        DraftController::new(DRAFT_TTL_MS)
    }

    #[test]
    fn test_draft_lives_until_absolute_deadline() {
        let mut drafts = controller();
        drafts.add("Read ch.1", None, StudyItemType::Task, 0).unwrap();

        assert_eq!(drafts.current(59_000).unwrap().title, "Read ch.1");
        assert_eq!(drafts.current(59_000).unwrap().remaining_ms(59_000), 1_000);
        assert!(drafts.current(60_000).is_none());
        assert!(drafts.expire(60_000));
        assert!(drafts.timer().is_none());
    }

    #[test]
    fn test_second_add_is_rejected() {
        let mut drafts = controller();
        drafts.add("First", None, StudyItemType::Task, 0).unwrap();

        let err = drafts.add("Second", None, StudyItemType::Plan, 1_000).unwrap_err();
        assert_eq!(err, DraftError::AlreadyPending);
        assert_eq!(drafts.current(1_000).unwrap().title, "First");
        assert_eq!(
            AppError::from(err).message,
            "Please confirm or cancel the current draft first."
        );
    }

    #[test]
    fn test_add_after_expiry_is_allowed() {
        let mut drafts = controller();
        drafts.add("First", None, StudyItemType::Task, 0).unwrap();
        let draft = drafts.add("Second", None, StudyItemType::Task, 60_000).unwrap();
        assert_eq!(draft.expires_at_ms, 120_000);
    }

    #[test]
    fn test_empty_title_is_rejected() {
        let mut drafts = controller();
        assert_eq!(
            drafts.add("   ", None, StudyItemType::Task, 0),
            Err(DraftError::EmptyTitle)
        );
        assert!(drafts.timer().is_none());
    }

    #[test]
    fn test_confirm_takes_the_draft() {
        let mut drafts = controller();
        drafts
            .add("  Revise  ", Some("  "), StudyItemType::Plan, 10)
            .unwrap();

        let draft = drafts.confirm(20).unwrap();
        assert_eq!(draft.title, "Revise");
        assert_eq!(draft.description, None);
        assert_eq!(draft.item_type, StudyItemType::Plan);
        assert!(drafts.current(20).is_none());
        assert_eq!(drafts.confirm(20), Err(DraftError::NoDraft));
    }

    #[test]
    fn test_confirm_after_deadline_fails() {
        let mut drafts = controller();
        drafts.add("Late", None, StudyItemType::Task, 0).unwrap();
        assert_eq!(drafts.confirm(60_000), Err(DraftError::NoDraft));
    }

    #[test]
    fn test_stale_timer_is_ignored() {
        let mut drafts = controller();
        drafts.add("First", None, StudyItemType::Task, 0).unwrap();
        let stale = drafts.timer().unwrap();
        assert!(drafts.cancel());

        drafts.add("Second", None, StudyItemType::Task, 30_000).unwrap();
        assert!(!drafts.on_timer_fired(stale.generation, 60_000));
        assert!(drafts.current(60_000).is_some());

        let live = drafts.timer().unwrap();
        assert_eq!(live.fires_at_ms, 90_000);
        assert!(drafts.on_timer_fired(live.generation, 90_000));
    }

    #[test]
    fn test_reading_the_timer_does_not_extend_the_deadline() {
        let mut drafts = controller();
        drafts.add("Keep", None, StudyItemType::Task, 0).unwrap();
        for _ in 0..10 {
            assert_eq!(drafts.timer().unwrap().fires_at_ms, 60_000);
        }
    }

    proptest! {
        #[test]
        fn draft_present_exactly_before_deadline(
            created in 0u64..1_000_000_000,
            query_offset in 0u64..120_000,
        ) {
            let mut drafts = controller();
            drafts.add("Read", None, StudyItemType::Task, created).unwrap();
            let expires_at = created + DRAFT_TTL_MS;
            let query = created + query_offset;

            prop_assert_eq!(drafts.current(query).is_some(), query < expires_at);
        }

        #[test]
        fn second_add_never_replaces_pending_draft(
            first in "[a-z]{1,10}",
            second in "[a-z]{1,10}",
            offset in 0u64..60_000,
        ) {
            let mut drafts = controller();
            drafts.add(&first, None, StudyItemType::Task, 0).unwrap();
            prop_assert_eq!(
                drafts.add(&second, None, StudyItemType::Plan, offset),
                Err(DraftError::AlreadyPending)
            );
            prop_assert_eq!(&drafts.current(offset).unwrap().title, &first);
        }
    }
}
