use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::bus::{RefreshSignalBus, SubscriptionId, REFRESH_USER_STATUS};
use crate::config::{DirectArgs, FeedParams, RouteParams};
use crate::engine::clone;
use crate::engine::feed::{FeedMode, LoadOutcome, PaginatedFeed};
use crate::engine::FeedError;
use crate::service::types::PreferenceItem;
use crate::service::OnboardingService;

/// How a sub-view is presented, which decides its return capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationStrategy {
    /// Scoped modal; returns a typed payload on dismissal.
    Overlay,
    /// Full navigation transition; no return channel, the far side must
    /// publish on the bus when data changed.
    Push,
}

/// Presentation state of the item sub-view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubviewPhase {
    #[default]
    Closed,
    Opening,
    Open(PresentationStrategy),
    Closing(PresentationStrategy),
}

/// Display context consulted when a sub-view opens.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutContext {
    pub narrow_layout: bool,
    pub overlay_requested: bool,
}

/// Composes the feed engine, clone integrator, and refresh bus in response
/// to lifecycle and user-interaction events.
pub struct FeedController {
    direct: DirectArgs,
    route: RouteParams,
    params: FeedParams,
    feed: PaginatedFeed,
    service: Arc<dyn OnboardingService>,
    bus: Arc<RefreshSignalBus>,
    subscription: Option<SubscriptionId>,
    refresh_tx: mpsc::UnboundedSender<()>,
    refresh_rx: mpsc::UnboundedReceiver<()>,
    refresh_needed: bool,
    opened_as_overlay: bool,
    subview: SubviewPhase,
}

impl FeedController {
    pub fn new(
        direct: DirectArgs,
        route: RouteParams,
        service: Arc<dyn OnboardingService>,
        bus: Arc<RefreshSignalBus>,
        opened_as_overlay: bool,
    ) -> Result<Self> {
        let params = FeedParams::resolve(&direct, &route)?;
        let feed = PaginatedFeed::new(Self::mode_for(&params), params.program_id.clone());
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        Ok(Self {
            direct,
            route,
            params,
            feed,
            service,
            bus,
            subscription: None,
            refresh_tx,
            refresh_rx,
            refresh_needed: false,
            opened_as_overlay,
            subview: SubviewPhase::Closed,
        })
    }

    fn mode_for(params: &FeedParams) -> FeedMode {
        if params.organizer {
            FeedMode::Organizer
        } else {
            FeedMode::Aggregate
        }
    }

    pub fn params(&self) -> &FeedParams {
        &self.params
    }

    pub fn feed(&self) -> &PaginatedFeed {
        &self.feed
    }

    pub fn items(&self) -> &[PreferenceItem] {
        self.feed.items()
    }

    pub fn subview_phase(&self) -> SubviewPhase {
        self.subview
    }

    pub fn refresh_needed(&self) -> bool {
        self.refresh_needed
    }

    /// Record that the underlying data changed, so the eventual self-close
    /// can propagate a refresh to whoever opened this feed.
    pub fn mark_refresh_needed(&mut self) {
        self.refresh_needed = true;
    }

    /// Subscribe to the refresh bus. Idempotent: the active lifetime holds
    /// exactly one subscription.
    pub fn activate(&mut self) {
        if self.subscription.is_some() {
            return;
        }
        let tx = self.refresh_tx.clone();
        self.subscription = Some(self.bus.subscribe(REFRESH_USER_STATUS, move |_| {
            let _ = tx.send(());
        }));
    }

    /// Drop the bus subscription at teardown so no handler outlives the
    /// active-display lifetime.
    pub fn deactivate(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.bus.unsubscribe(id);
        }
    }

    /// Re-read the entry parameters and reload from the first page.
    pub async fn setup(&mut self) -> Result<LoadOutcome> {
        self.params = FeedParams::resolve(&self.direct, &self.route)?;
        self.feed
            .retarget(Self::mode_for(&self.params), self.params.program_id.clone());
        let service = Arc::clone(&self.service);
        Ok(self.feed.reset_and_load(service.as_ref()).await?)
    }

    /// Scroll-to-end trigger.
    pub async fn load_more(&mut self) -> Result<LoadOutcome, FeedError> {
        let service = Arc::clone(&self.service);
        self.feed.load_more(service.as_ref()).await
    }

    pub async fn execute_search(&mut self, keyword: &str) -> Result<LoadOutcome, FeedError> {
        let service = Arc::clone(&self.service);
        self.feed.execute_search(keyword, service.as_ref()).await
    }

    /// Drain queued refresh signals, coalescing them into at most one
    /// setup pass. Returns the reload outcome when a signal was pending.
    pub async fn pump(&mut self) -> Result<Option<LoadOutcome>> {
        let mut signalled = false;
        while self.refresh_rx.try_recv().is_ok() {
            signalled = true;
        }
        if !signalled {
            return Ok(None);
        }
        debug!("refresh signal received; re-running setup");
        Ok(Some(self.setup().await?))
    }

    /// Clone picker selections into this feed's program and splice them
    /// into the front of the list.
    pub async fn integrate_picker_selection(
        &mut self,
        selected: Vec<PreferenceItem>,
    ) -> Result<usize, FeedError> {
        let service = Arc::clone(&self.service);
        clone::integrate(
            service.as_ref(),
            selected,
            &self.params.program_id,
            self.params.role,
            self.feed.items_mut(),
        )
        .await
    }

    /// Open the item sub-view, choosing overlay presentation for narrow
    /// layouts or when explicitly requested, and push otherwise.
    pub fn open_subview(&mut self, ctx: &LayoutContext) -> Option<PresentationStrategy> {
        if self.subview != SubviewPhase::Closed {
            warn!(phase = ?self.subview, "ignoring sub-view open outside Closed");
            return None;
        }
        self.subview = SubviewPhase::Opening;
        let strategy = if ctx.overlay_requested || ctx.narrow_layout {
            PresentationStrategy::Overlay
        } else {
            PresentationStrategy::Push
        };
        self.subview = SubviewPhase::Open(strategy);
        Some(strategy)
    }

    /// Close the sub-view. An overlay dismissal carries `refresh_needed`
    /// read synchronously; a push has no return channel and relies on the
    /// far side publishing to the bus before it closed.
    pub async fn close_subview(&mut self, overlay_refresh: Option<bool>) -> Result<()> {
        let strategy = match self.subview {
            SubviewPhase::Open(strategy) => strategy,
            phase => {
                warn!(?phase, "ignoring sub-view close outside Open");
                return Ok(());
            }
        };
        self.subview = SubviewPhase::Closing(strategy);
        self.subview = SubviewPhase::Closed;
        if strategy == PresentationStrategy::Overlay && overlay_refresh == Some(true) {
            self.setup().await?;
        }
        Ok(())
    }

    /// Self-close of the feed. When the feed was itself opened as an
    /// overlay, its `refresh_needed` flag is the dismissal payload; it is
    /// also published on the bus first, for openers that will never read
    /// the payload. A pushed feed just navigates back and returns nothing.
    pub fn close(&mut self) -> Option<bool> {
        if !self.opened_as_overlay {
            return None;
        }
        if self.refresh_needed {
            self.bus.publish(REFRESH_USER_STATUS, json!({}));
        }
        Some(self.refresh_needed)
    }
}
