//! Scripted fake automation layer and a recording observer.
//!
//! The fakes implement the driver seam with configurable behavior
//! (which selectors appear, which clicks fail, what the search returns)
//! and instrument every call so tests can assert on concurrency,
//! open/close balance, and call ordering.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use trolley::driver::{Driver, DriverError, DriverResult, Handle, PageDriver};
use trolley::observer::{FlowEvent, FlowObserver};
use trolley::site::{scripts, selectors, LANDING_URL, SIGN_IN_URL};

/// Shared behavior script and instrumentation for one test scenario.
#[derive(Default)]
pub struct FakeWorld {
    log: Mutex<Vec<String>>,

    /// Search query to the result card its product page would embed.
    pub products: Mutex<HashMap<String, Value>>,
    /// Waits on these selectors time out.
    pub missing_selectors: Mutex<HashSet<String>>,
    /// Clicks on these selectors fail.
    pub failing_clicks: Mutex<HashSet<String>>,
    /// `query_exists` reports these as present.
    pub existing_selectors: Mutex<HashSet<String>>,
    /// Cart groups left; the remove control exists while this is > 0.
    pub cart_groups: AtomicUsize,
    /// Navigating to the login page lands on the landing page.
    pub already_signed_in: AtomicBool,
    /// The delivery-slot script finds a slot.
    pub slot_available: AtomicBool,
    /// Launch attempt index that fails, if any.
    pub fail_launch_at: Mutex<Option<usize>>,

    pub launch_attempts: AtomicUsize,
    pub handle_launches: AtomicUsize,
    pub handle_closes: AtomicUsize,
    pub live_handles: AtomicUsize,
    pub max_live_handles: AtomicUsize,
    pub page_opens: AtomicUsize,
    pub page_closes: AtomicUsize,
    pub live_pages: AtomicUsize,
    pub max_live_pages: AtomicUsize,
}

impl FakeWorld {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_product(&self, query: &str, name: &str, price: &str, url: &str) {
        self.products.lock().insert(
            query.to_string(),
            serde_json::json!({ "name": name, "price": price, "url": url }),
        );
    }

    pub fn mark_missing(&self, selector: &str) {
        self.missing_selectors.lock().insert(selector.to_string());
    }

    pub fn mark_click_failing(&self, selector: &str) {
        self.failing_clicks.lock().insert(selector.to_string());
    }

    pub fn mark_existing(&self, selector: &str) {
        self.existing_selectors.lock().insert(selector.to_string());
    }

    fn record(&self, entry: String) {
        self.log.lock().push(entry);
    }

    pub fn log_entries(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    /// Index of the first log entry containing `needle`.
    pub fn first_position(&self, needle: &str) -> Option<usize> {
        self.log.lock().iter().position(|entry| entry.contains(needle))
    }

    /// Index of the last log entry containing `needle`.
    pub fn last_position(&self, needle: &str) -> Option<usize> {
        self.log.lock().iter().rposition(|entry| entry.contains(needle))
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|entry| entry.contains(needle))
            .count()
    }

    fn timeout_for(selector: &str) -> DriverError {
        DriverError::WaitTimeout {
            selector: selector.to_string(),
            waited_ms: 1,
        }
    }
}

pub struct FakeDriver {
    pub world: Arc<FakeWorld>,
}

impl FakeDriver {
    pub fn new(world: Arc<FakeWorld>) -> Self {
        Self { world }
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn launch(&self) -> DriverResult<Arc<dyn Handle>> {
        let attempt = self.world.launch_attempts.fetch_add(1, Ordering::SeqCst);
        if *self.world.fail_launch_at.lock() == Some(attempt) {
            return Err(DriverError::Launch("scripted launch failure".into()));
        }

        let id = self.world.handle_launches.fetch_add(1, Ordering::SeqCst);
        let live = self.world.live_handles.fetch_add(1, Ordering::SeqCst) + 1;
        self.world.max_live_handles.fetch_max(live, Ordering::SeqCst);
        self.world.record(format!("h{id}:launch"));
        Ok(Arc::new(FakeHandle {
            id,
            world: Arc::clone(&self.world),
            closed: AtomicBool::new(false),
        }))
    }
}

pub struct FakeHandle {
    id: usize,
    world: Arc<FakeWorld>,
    closed: AtomicBool,
}

#[async_trait]
impl Handle for FakeHandle {
    async fn new_page(&self) -> DriverResult<Box<dyn PageDriver>> {
        self.world.page_opens.fetch_add(1, Ordering::SeqCst);
        let live = self.world.live_pages.fetch_add(1, Ordering::SeqCst) + 1;
        self.world.max_live_pages.fetch_max(live, Ordering::SeqCst);
        self.world.record(format!("h{}:open_page", self.id));
        Ok(Box::new(FakePage {
            handle_id: self.id,
            world: Arc::clone(&self.world),
            state: Mutex::new(PageState::default()),
            closed: AtomicBool::new(false),
        }))
    }

    async fn close(&self) -> DriverResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.world.handle_closes.fetch_add(1, Ordering::SeqCst);
            self.world.live_handles.fetch_sub(1, Ordering::SeqCst);
            self.world.record(format!("h{}:close", self.id));
        }
        Ok(())
    }
}

#[derive(Default)]
struct PageState {
    url: String,
    last_search: Option<String>,
}

pub struct FakePage {
    handle_id: usize,
    world: Arc<FakeWorld>,
    state: Mutex<PageState>,
    closed: AtomicBool,
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&self, url: &str) -> DriverResult<()> {
        self.world.record(format!("h{}:goto:{url}", self.handle_id));
        let landed = if url == SIGN_IN_URL && self.world.already_signed_in.load(Ordering::SeqCst) {
            LANDING_URL.to_string()
        } else {
            url.to_string()
        };
        self.state.lock().url = landed;
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self.state.lock().url.clone())
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> DriverResult<()> {
        self.world.record(format!("h{}:wait:{selector}", self.handle_id));
        // Yield so concurrent tasks genuinely interleave.
        tokio::time::sleep(Duration::from_millis(1)).await;

        let times_out = if selector == selectors::PRODUCT_BOX {
            let query = self.state.lock().last_search.clone();
            !query
                .map(|q| self.world.products.lock().contains_key(&q))
                .unwrap_or(false)
        } else {
            self.world.missing_selectors.lock().contains(selector)
        };

        if times_out {
            // A wait on an absent element runs its full window; it must
            // settle later than a present element appearing, or races
            // between the two would resolve the wrong way.
            tokio::time::sleep(Duration::from_millis(20)).await;
            return Err(FakeWorld::timeout_for(selector));
        }
        Ok(())
    }

    async fn query_exists(&self, selector: &str) -> DriverResult<bool> {
        self.world
            .record(format!("h{}:exists:{selector}", self.handle_id));
        if selector == selectors::REMOVE_CART_GROUP
            && self.world.cart_groups.load(Ordering::SeqCst) > 0
        {
            return Ok(true);
        }
        Ok(self.world.existing_selectors.lock().contains(selector))
    }

    async fn click(&self, selector: &str) -> DriverResult<()> {
        self.world
            .record(format!("h{}:click:{selector}", self.handle_id));
        if self.world.failing_clicks.lock().contains(selector) {
            return Err(DriverError::Interaction {
                selector: selector.to_string(),
                reason: "scripted click failure".into(),
            });
        }
        if selector == selectors::REMOVE_CART_GROUP {
            let _ = self.world.cart_groups.fetch_update(
                Ordering::SeqCst,
                Ordering::SeqCst,
                |groups| groups.checked_sub(1),
            );
        }
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> DriverResult<()> {
        self.world
            .record(format!("h{}:type:{selector}", self.handle_id));
        if selector == selectors::SEARCH_INPUT {
            self.state.lock().last_search = Some(text.to_string());
        }
        Ok(())
    }

    async fn press_enter(&self, selector: &str) -> DriverResult<()> {
        self.world
            .record(format!("h{}:enter:{selector}", self.handle_id));
        Ok(())
    }

    async fn wait_for_navigation(&self) -> DriverResult<()> {
        self.world.record(format!("h{}:nav", self.handle_id));
        tokio::time::sleep(Duration::from_millis(1)).await;
        Ok(())
    }

    async fn reload(&self) -> DriverResult<()> {
        self.world.record(format!("h{}:reload", self.handle_id));
        Ok(())
    }

    async fn evaluate(&self, expression: &str) -> DriverResult<Value> {
        self.world.record(format!("h{}:evaluate", self.handle_id));
        if expression == scripts::EXTRACT_FIRST_PRODUCT {
            let query = self.state.lock().last_search.clone();
            let card = query
                .and_then(|q| self.world.products.lock().get(&q).cloned())
                .unwrap_or(Value::Null);
            return Ok(card);
        }
        if expression == scripts::PICK_DELIVERY_SLOT {
            return Ok(Value::Bool(self.world.slot_available.load(Ordering::SeqCst)));
        }
        Ok(Value::Null)
    }

    async fn close(&self) -> DriverResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.world.page_closes.fetch_add(1, Ordering::SeqCst);
            self.world.live_pages.fetch_sub(1, Ordering::SeqCst);
            self.world.record(format!("h{}:close_page", self.handle_id));
        }
        Ok(())
    }
}

/// Observer that records every event for later assertions.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<FlowEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<FlowEvent> {
        self.events.lock().clone()
    }

    pub fn contains(&self, event: &FlowEvent) -> bool {
        self.events.lock().iter().any(|seen| seen == event)
    }

    pub fn count_matching(&self, predicate: impl Fn(&FlowEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }
}

impl FlowObserver for RecordingObserver {
    fn on_event(&self, event: &FlowEvent) {
        self.events.lock().push(event.clone());
    }
}
