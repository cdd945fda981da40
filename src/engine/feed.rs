use tracing::debug;

use super::status::{classify, Status};
use super::FeedError;
use crate::service::types::PreferenceItem;
use crate::service::OnboardingService;

/// Which fetch strategy the feed runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    /// One user's items across programs, paged; list sorted by program name.
    Aggregate,
    /// All items for one program across participants, fetched in one shot.
    Organizer,
}

/// Outcome of one `load_more` cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page of items was spliced into the list.
    Loaded(usize),
    /// End of data: either an empty page or a prior end-of-data mark.
    End,
    /// A load was already in flight; this trigger was coalesced.
    AlreadyLoading,
    /// The fetch completed after a newer reset; its result was discarded.
    Superseded,
}

/// Capture of the feed context a fetch was issued under. A completion
/// whose generation no longer matches the feed's is discarded.
#[derive(Debug, Clone, Copy)]
pub struct LoadTicket {
    generation: u64,
    page: u32,
}

impl LoadTicket {
    pub fn page(&self) -> u32 {
        self.page
    }
}

/// Decision from the pre-fetch phase.
#[derive(Debug)]
pub enum BeginLoad {
    Go(LoadTicket),
    End,
    Busy,
}

/// Page/list state for the preferences screen, with single-flight loads
/// and generation-based discard of superseded fetches.
pub struct PaginatedFeed {
    mode: FeedMode,
    program_id: String,
    keyword: Option<String>,
    items: Vec<PreferenceItem>,
    page_num: u32,
    reached_end: bool,
    loading: bool,
    in_flight: bool,
    generation: u64,
}

impl PaginatedFeed {
    pub fn new(mode: FeedMode, program_id: impl Into<String>) -> Self {
        Self {
            mode,
            program_id: program_id.into(),
            keyword: None,
            items: Vec::new(),
            page_num: 0,
            reached_end: false,
            loading: false,
            in_flight: false,
            generation: 0,
        }
    }

    pub fn mode(&self) -> FeedMode {
        self.mode
    }

    pub fn items(&self) -> &[PreferenceItem] {
        &self.items
    }

    /// Mutable access for the clone integrator, which splices reconciled
    /// clones into the front of the list.
    pub fn items_mut(&mut self) -> &mut Vec<PreferenceItem> {
        &mut self.items
    }

    pub fn page(&self) -> u32 {
        self.page_num
    }

    pub fn reached_end(&self) -> bool {
        self.reached_end
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }

    /// Retarget the feed, e.g. after re-resolved entry parameters. Resets
    /// nothing by itself; callers follow up with `reset_and_load`.
    pub fn retarget(&mut self, mode: FeedMode, program_id: impl Into<String>) {
        self.mode = mode;
        self.program_id = program_id.into();
    }

    /// Clear the list and page state. Bumps the generation so any fetch
    /// still in flight discards its result on completion.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.items.clear();
        self.page_num = 0;
        self.reached_end = false;
        self.loading = true;
        self.in_flight = false;
    }

    pub async fn reset_and_load(
        &mut self,
        service: &dyn OnboardingService,
    ) -> Result<LoadOutcome, FeedError> {
        self.reset();
        self.load_more(service).await
    }

    /// Record the search keyword and reload from the first page. The
    /// keyword is forwarded to the remote query; filtering is the
    /// service's responsibility.
    pub async fn execute_search(
        &mut self,
        keyword: &str,
        service: &dyn OnboardingService,
    ) -> Result<LoadOutcome, FeedError> {
        self.keyword = if keyword.is_empty() {
            None
        } else {
            Some(keyword.to_string())
        };
        self.reset_and_load(service).await
    }

    /// Pre-fetch phase: claim the single-flight slot and advance the page
    /// counter. Returns `End` once end-of-data is marked and `Busy` while
    /// another load is outstanding.
    pub fn begin_load(&mut self) -> BeginLoad {
        if self.reached_end {
            self.loading = false;
            return BeginLoad::End;
        }
        if self.in_flight {
            return BeginLoad::Busy;
        }
        self.in_flight = true;
        self.loading = true;
        self.page_num += 1;
        BeginLoad::Go(LoadTicket {
            generation: self.generation,
            page: self.page_num,
        })
    }

    /// Post-fetch phase: splice a fetch result into the list, or unwind
    /// the pre-fetch bookkeeping on error. A stale ticket (issued before
    /// the latest reset) is discarded without touching state.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: anyhow::Result<Vec<PreferenceItem>>,
    ) -> Result<LoadOutcome, FeedError> {
        if ticket.generation != self.generation {
            debug!(page = ticket.page, "discarding superseded fetch result");
            return Ok(LoadOutcome::Superseded);
        }
        self.in_flight = false;
        self.loading = false;

        let fetched = match result {
            Ok(fetched) => fetched,
            Err(e) => {
                // Keep loaded items and leave end-of-data unset so the
                // scroll trigger can retry the same page.
                self.page_num = self.page_num.saturating_sub(1);
                return Err(FeedError::Transient(e));
            }
        };

        if self.mode == FeedMode::Organizer {
            // One-shot strategy: the single call covers the whole program.
            self.reached_end = true;
        }
        if fetched.is_empty() {
            self.reached_end = true;
            return Ok(LoadOutcome::End);
        }

        let count = fetched.len();
        for mut item in fetched {
            item.status = classify(item.response.as_ref(), item.resource.as_full());
            self.items.push(item);
        }
        if self.mode == FeedMode::Aggregate {
            // Stable sort: ties keep their relative load order.
            self.items
                .sort_by(|a, b| a.program.display_name().cmp(b.program.display_name()));
        }
        Ok(LoadOutcome::Loaded(count))
    }

    /// Fetch the next page (or the one-shot program listing) and splice it
    /// into the list. Coalesces re-entrant triggers and discards results
    /// superseded by a newer reset.
    pub async fn load_more(
        &mut self,
        service: &dyn OnboardingService,
    ) -> Result<LoadOutcome, FeedError> {
        let ticket = match self.begin_load() {
            BeginLoad::Go(ticket) => ticket,
            BeginLoad::End => return Ok(LoadOutcome::End),
            BeginLoad::Busy => return Ok(LoadOutcome::AlreadyLoading),
        };
        let result = match self.mode {
            FeedMode::Organizer => service.list_program_activities(&self.program_id).await,
            FeedMode::Aggregate => {
                service
                    .list_user_preferences(ticket.page, &self.program_id, self.keyword.as_deref())
                    .await
            }
        };
        self.complete_load(ticket, result)
    }

    /// Reclassify every loaded item in place. Used after data edits that
    /// do not go through a reload.
    pub fn reclassify_all(&mut self) {
        for item in &mut self.items {
            item.status = classify(item.response.as_ref(), item.resource.as_full());
        }
    }

    pub fn status_of(&self, id: &str) -> Option<Status> {
        self.items.iter().find(|i| i.id == id).map(|i| i.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::types::{
        AnswerCode, PreferenceItem, ProgramRef, ProgramSummary, RequirementCode, ResourceRef,
        ResourceSpec, ResponseData,
    };
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn item(id: &str, program_name: &str) -> PreferenceItem {
        PreferenceItem {
            id: id.to_string(),
            display_name: format!("activity {id}"),
            program: ProgramRef::Full(ProgramSummary {
                id: format!("prog-{program_name}"),
                name: program_name.to_string(),
            }),
            resource: ResourceRef::Full(ResourceSpec {
                id: format!("res-{id}"),
                name: String::new(),
                requirements: vec![RequirementCode::PrimaryAssign],
            }),
            response: None,
            applicability: vec![false; 5],
            calendar: None,
            status: Status::New,
        }
    }

    fn answered_item(id: &str, program_name: &str) -> PreferenceItem {
        let mut it = item(id, program_name);
        it.response = Some(ResponseData {
            answers: vec![AnswerCode::new("5f8d0c2e1a")],
            fields: vec![],
        });
        it
    }

    /// Scripted service: pops one page per paged call, counts every call.
    struct ScriptedService {
        pages: Mutex<Vec<Vec<PreferenceItem>>>,
        paged_calls: AtomicUsize,
        one_shot_calls: AtomicUsize,
        fail_next: Mutex<bool>,
    }

    impl ScriptedService {
        fn new(pages: Vec<Vec<PreferenceItem>>) -> Self {
            Self {
                pages: Mutex::new(pages),
                paged_calls: AtomicUsize::new(0),
                one_shot_calls: AtomicUsize::new(0),
                fail_next: Mutex::new(false),
            }
        }

        fn next_page(&self) -> Vec<PreferenceItem> {
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                Vec::new()
            } else {
                pages.remove(0)
            }
        }
    }

    #[async_trait]
    impl OnboardingService for ScriptedService {
        async fn list_program_activities(&self, _program_id: &str) -> Result<Vec<PreferenceItem>> {
            self.one_shot_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.next_page())
        }

        async fn list_user_preferences(
            &self,
            _page: u32,
            _program_id: &str,
            _keyword: Option<&str>,
        ) -> Result<Vec<PreferenceItem>> {
            self.paged_calls.fetch_add(1, Ordering::SeqCst);
            if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
                return Err(anyhow!("service unavailable"));
            }
            Ok(self.next_page())
        }

        async fn clone_items(&self, _items: &[PreferenceItem]) -> Result<Vec<PreferenceItem>> {
            unimplemented!("not used by feed tests")
        }
    }

    #[tokio::test]
    async fn test_empty_page_marks_end_and_stops_fetching() {
        let service = ScriptedService::new(vec![vec![]]);
        let mut feed = PaginatedFeed::new(FeedMode::Aggregate, "p1");

        let outcome = feed.reset_and_load(&service).await.unwrap();
        assert_eq!(outcome, LoadOutcome::End);
        assert!(feed.reached_end());
        assert!(!feed.is_loading());

        for _ in 0..3 {
            assert_eq!(feed.load_more(&service).await.unwrap(), LoadOutcome::End);
        }
        assert_eq!(service.paged_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_first_fetch_uses_page_one() {
        let service = ScriptedService::new(vec![vec![item("a", "Alpha")]]);
        let mut feed = PaginatedFeed::new(FeedMode::Aggregate, "p1");
        feed.reset_and_load(&service).await.unwrap();
        assert_eq!(feed.page(), 1);
    }

    #[tokio::test]
    async fn test_organizer_mode_is_one_shot() {
        let service = ScriptedService::new(vec![vec![item("a", "Alpha"), item("b", "Alpha")]]);
        let mut feed = PaginatedFeed::new(FeedMode::Organizer, "p1");

        let outcome = feed.reset_and_load(&service).await.unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded(2));
        assert!(feed.reached_end());

        for _ in 0..4 {
            assert_eq!(feed.load_more(&service).await.unwrap(), LoadOutcome::End);
        }
        assert_eq!(service.one_shot_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_aggregate_mode_sorts_by_program_name_across_pages() {
        let service = ScriptedService::new(vec![
            vec![item("1", "Rowing"), item("2", "Archery")],
            vec![item("3", "Chess"), item("4", "Archery")],
        ]);
        let mut feed = PaginatedFeed::new(FeedMode::Aggregate, "p1");

        feed.reset_and_load(&service).await.unwrap();
        feed.load_more(&service).await.unwrap();

        let names: Vec<&str> = feed
            .items()
            .iter()
            .map(|i| i.program.display_name())
            .collect();
        assert_eq!(names, vec!["Archery", "Archery", "Chess", "Rowing"]);
        // Stable sort preserves load order within the tie.
        let ids: Vec<&str> = feed.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "4", "3", "1"]);
    }

    #[tokio::test]
    async fn test_items_are_status_tagged_on_load() {
        let service =
            ScriptedService::new(vec![vec![answered_item("a", "Alpha"), item("b", "Beta")]]);
        let mut feed = PaginatedFeed::new(FeedMode::Aggregate, "p1");
        feed.reset_and_load(&service).await.unwrap();

        assert_eq!(feed.status_of("a"), Some(Status::Completed));
        assert_eq!(feed.status_of("b"), Some(Status::New));
    }

    #[test]
    fn test_single_flight_guard_coalesces_reentrant_triggers() {
        let mut feed = PaginatedFeed::new(FeedMode::Aggregate, "p1");
        let ticket = match feed.begin_load() {
            BeginLoad::Go(t) => t,
            other => panic!("expected Go, got {other:?}"),
        };
        assert!(matches!(feed.begin_load(), BeginLoad::Busy));
        assert!(matches!(feed.begin_load(), BeginLoad::Busy));
        assert_eq!(feed.page(), ticket.page());
    }

    #[test]
    fn test_reset_supersedes_in_flight_fetch() {
        let mut feed = PaginatedFeed::new(FeedMode::Aggregate, "p1");
        let stale = match feed.begin_load() {
            BeginLoad::Go(t) => t,
            other => panic!("expected Go, got {other:?}"),
        };

        // Search-triggered reset lands while the fetch is outstanding.
        feed.reset();
        let outcome = feed
            .complete_load(stale, Ok(vec![item("old", "Stale")]))
            .unwrap();
        assert_eq!(outcome, LoadOutcome::Superseded);
        assert!(feed.items().is_empty());
        assert_eq!(feed.page(), 0);
    }

    #[tokio::test]
    async fn test_transient_error_keeps_items_and_reenables_retry() {
        let service = ScriptedService::new(vec![
            vec![item("1", "Alpha")],
            vec![item("2", "Beta")],
        ]);
        let mut feed = PaginatedFeed::new(FeedMode::Aggregate, "p1");
        feed.reset_and_load(&service).await.unwrap();

        *service.fail_next.lock().unwrap() = true;
        let err = feed.load_more(&service).await.unwrap_err();
        assert!(matches!(err, FeedError::Transient(_)));
        assert_eq!(feed.items().len(), 1);
        assert!(!feed.reached_end());
        assert!(!feed.is_loading());
        assert_eq!(feed.page(), 1);

        // Retry refetches the same page number.
        let outcome = feed.load_more(&service).await.unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded(1));
        assert_eq!(feed.page(), 2);
        assert_eq!(feed.items().len(), 2);
    }

    #[tokio::test]
    async fn test_execute_search_records_keyword_and_reloads() {
        let service = ScriptedService::new(vec![vec![item("1", "Alpha")], vec![item("2", "Beta")]]);
        let mut feed = PaginatedFeed::new(FeedMode::Aggregate, "p1");
        feed.reset_and_load(&service).await.unwrap();
        assert_eq!(feed.items().len(), 1);

        feed.execute_search("waiver", &service).await.unwrap();
        assert_eq!(feed.keyword(), Some("waiver"));
        assert_eq!(feed.page(), 1);
        assert_eq!(feed.items().len(), 1);
        assert_eq!(feed.items()[0].id, "2");

        feed.execute_search("", &service).await.unwrap();
        assert_eq!(feed.keyword(), None);
    }
}
