//! Page-at-a-time reading scans.
//!
//! Exports of long trials must never hold the whole result in memory. A
//! [`ReadingPager`] issues one bounded query per pull and then moves the
//! leading bound of its range just past the last timestamp it handed out.
//! It does nothing on its own: no timers, no prefetch. Dropping it is the
//! only cancellation there is.

use anyhow::Result;
use rusqlite::Connection;

use crate::db::{
    helpers::to_i64,
    models::{ScalarReading, LEGACY_TRIAL_ID},
    repositories::readings::select_readings,
    Database,
};
use crate::models::{RangeOrder, TimeRange};

#[derive(Debug, Clone)]
pub struct ReadingPager {
    trial_id: String,
    tags: Vec<String>,
    initial_range: TimeRange,
    range: TimeRange,
    tier: i32,
    page_size: usize,
    /// Trial actually read from, fixed by the first page so the legacy
    /// fallback cannot kick in halfway through a scan.
    scope: Option<String>,
    finished: bool,
}

impl ReadingPager {
    pub fn new<S: AsRef<str>>(
        trial_id: &str,
        tags: &[S],
        range: TimeRange,
        tier: i32,
        page_size: usize,
    ) -> Self {
        Self {
            trial_id: trial_id.to_string(),
            tags: tags.iter().map(|tag| tag.as_ref().to_string()).collect(),
            initial_range: range,
            range,
            tier,
            page_size: page_size.max(1),
            scope: None,
            finished: false,
        }
    }

    pub fn restart(&mut self) {
        self.range = self.initial_range;
        self.scope = None;
        self.finished = false;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Trial the scan resolved to, once the first page has been read.
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn next_page(&mut self, conn: &Connection) -> Result<Option<Vec<ScalarReading>>> {
        if self.finished || self.range.is_empty() || self.tags.is_empty() {
            self.finished = true;
            return Ok(None);
        }

        let limit = to_i64(self.page_size)?;
        let page = match self.scope.as_deref() {
            Some(scope) => select_readings(conn, scope, &self.tags, &self.range, self.tier, limit),
            None => self.resolve_scope(conn, limit),
        };
        let page = match page {
            Ok(page) => page,
            Err(err) => {
                self.finished = true;
                return Err(err);
            }
        };

        let Some(last) = page.last() else {
            self.finished = true;
            return Ok(None);
        };

        self.range = match self.range.order() {
            RangeOrder::OldestFirst => self.range.starting_after(last.timestamp_ms),
            RangeOrder::NewestFirst => self.range.ending_before(last.timestamp_ms),
        };
        if page.len() < self.page_size || self.range.is_empty() {
            self.finished = true;
        }

        Ok(Some(page))
    }

    fn resolve_scope(&mut self, conn: &Connection, limit: i64) -> Result<Vec<ScalarReading>> {
        let page = select_readings(
            conn,
            &self.trial_id,
            &self.tags,
            &self.range,
            self.tier,
            limit,
        )?;
        if !page.is_empty() || self.trial_id == LEGACY_TRIAL_ID {
            self.scope = Some(self.trial_id.clone());
            return Ok(page);
        }

        self.scope = Some(LEGACY_TRIAL_ID.to_string());
        select_readings(conn, LEGACY_TRIAL_ID, &self.tags, &self.range, self.tier, limit)
    }
}

/// Blocking iterator over pages, for callers already on the store thread.
pub struct ReadingPages<'conn> {
    conn: &'conn Connection,
    pager: ReadingPager,
}

impl<'conn> ReadingPages<'conn> {
    pub fn new(conn: &'conn Connection, pager: ReadingPager) -> Self {
        Self { conn, pager }
    }

    pub fn restart(&mut self) {
        self.pager.restart();
    }
}

impl Iterator for ReadingPages<'_> {
    type Item = Result<Vec<ScalarReading>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pager.next_page(self.conn).transpose()
    }
}

/// Async counterpart of [`ReadingPages`]: each `next_page` runs exactly one
/// bounded query on the store thread.
pub struct ReadingStream {
    db: Database,
    initial: ReadingPager,
    pager: Option<ReadingPager>,
}

impl ReadingStream {
    pub fn new(db: Database, pager: ReadingPager) -> Self {
        Self {
            db,
            initial: pager.clone(),
            pager: Some(pager),
        }
    }

    pub async fn next_page(&mut self) -> Result<Option<Vec<ScalarReading>>> {
        // A failed page leaves the stream exhausted.
        let Some(mut pager) = self.pager.take() else {
            return Ok(None);
        };
        if pager.is_finished() {
            self.pager = Some(pager);
            return Ok(None);
        }

        let (pager, page) = self
            .db
            .execute(move |conn| {
                let page = pager.next_page(conn)?;
                Ok((pager, page))
            })
            .await?;
        self.pager = Some(pager);

        Ok(page)
    }

    pub fn restart(&mut self) {
        self.pager = Some(self.initial.clone());
    }
}
