//! View models: fetched collections and records, published as `watch`
//! snapshots, with mutation results folded back into local state.
//!
//! Each fetch takes a [`FetchTicket`]. Starting a newer fetch supersedes
//! every older ticket, so a slow response for a stale dependency (e.g. a
//! previous identity) is dropped instead of overwriting newer data.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::debug;

use crate::errors::{ClientError, ClientResult};
use crate::models::{Listing, Session};

pub mod applications;
pub mod jobs;
pub mod match_check;
pub mod posts;
pub mod profile;

pub use applications::ApplicationsView;
pub use jobs::{extract_skill_terms, format_salary, JobBoard, RecruiterJobs};
pub use match_check::MatchCheckView;
pub use posts::PostsView;
pub use profile::ProfileEditor;

/// Owner key of the signed-in identity, or `Unauthenticated`.
pub(crate) fn owner_of(session: &Session) -> ClientResult<String> {
    session
        .identity_id()
        .map(|id| id.to_string())
        .ok_or(ClientError::Unauthenticated)
}

// ────────────────────────────────────────────────────────────────────────────
// Fetch tickets
// ────────────────────────────────────────────────────────────────────────────

/// Proof that a fetch was the latest one started on its model.
#[derive(Debug)]
pub struct FetchTicket {
    generation: u64,
    key: String,
}

impl FetchTicket {
    pub fn key(&self) -> &str {
        &self.key
    }
}

#[derive(Debug, Default)]
struct Generations(AtomicU64);

impl Generations {
    fn next(&self, key: &str) -> FetchTicket {
        let generation = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        FetchTicket {
            generation,
            key: key.to_string(),
        }
    }

    fn is_current(&self, ticket: &FetchTicket) -> bool {
        self.0.load(Ordering::SeqCst) == ticket.generation
    }
}

// ────────────────────────────────────────────────────────────────────────────
// List model
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ViewState<T> {
    pub items: Vec<T>,
    pub loading: bool,
    pub error: Option<String>,
    pub status: Option<String>,
    /// Controls with a request in flight (e.g. `"toggle:<id>"`).
    pub busy: BTreeSet<String>,
}

impl<T> Default for ViewState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
            status: None,
            busy: BTreeSet::new(),
        }
    }
}

impl<T: Listing> ViewState<T> {
    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn is_busy(&self, control: &str) -> bool {
        self.busy.contains(control)
    }
}

/// Case-insensitive substring match over each item's search fields.
/// A blank query keeps everything.
pub fn filter<T: Listing>(items: &[T], query: &str) -> Vec<T> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return items.to_vec();
    }
    items
        .iter()
        .filter(|item| {
            item.search_fields()
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

pub struct ListModel<T> {
    state: watch::Sender<ViewState<T>>,
    generations: Generations,
}

impl<T: Listing> Default for ListModel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Listing> ListModel<T> {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ViewState::default());
        Self {
            state,
            generations: Generations::default(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState<T>> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ViewState<T> {
        self.state.borrow().clone()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.state.borrow().get(id).cloned()
    }

    pub fn filtered(&self, query: &str) -> Vec<T> {
        filter(&self.state.borrow().items, query)
    }

    /// Marks the list loading and supersedes any fetch still in flight.
    pub fn begin_fetch(&self, key: &str) -> FetchTicket {
        let ticket = self.generations.next(key);
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });
        ticket
    }

    /// Applies a fetch result unless a newer fetch has started since.
    /// Returns whether the result was applied.
    pub fn finish_fetch(&self, ticket: FetchTicket, result: ClientResult<Vec<T>>) -> bool {
        if !self.generations.is_current(&ticket) {
            debug!("Dropping superseded fetch for {}", ticket.key);
            return false;
        }
        self.state.send_modify(|s| {
            s.loading = false;
            match result {
                Ok(items) => s.items = items,
                Err(e) => s.error = Some(e.user_message()),
            }
        });
        true
    }

    /// Adds a server-returned record at the end. A record whose id is
    /// already listed replaces that entry instead.
    pub fn append(&self, item: T) {
        self.state.send_modify(|s| {
            match s.items.iter().position(|i| i.id() == item.id()) {
                Some(idx) => s.items[idx] = item,
                None => s.items.push(item),
            }
        });
    }

    /// Like [`append`](Self::append) but at the front.
    pub fn prepend(&self, item: T) {
        self.state.send_modify(|s| {
            match s.items.iter().position(|i| i.id() == item.id()) {
                Some(idx) => s.items[idx] = item,
                None => s.items.insert(0, item),
            }
        });
    }

    pub fn replace(&self, item: T) {
        self.state.send_modify(|s| {
            if let Some(existing) = s.items.iter_mut().find(|i| i.id() == item.id()) {
                *existing = item;
            }
        });
    }

    pub fn remove(&self, id: &str) {
        self.state.send_modify(|s| s.items.retain(|i| i.id() != id));
    }

    pub fn fail(&self, error: &ClientError) {
        let message = error.user_message();
        self.state.send_modify(|s| {
            s.error = Some(message);
            s.status = None;
        });
    }

    pub fn notify(&self, status: impl Into<String>) {
        let status = status.into();
        self.state.send_modify(|s| {
            s.status = Some(status);
            s.error = None;
        });
    }

    /// Runs `work` with `control` marked busy for its duration.
    pub async fn with_busy<F, R>(&self, control: &str, work: F) -> R
    where
        F: Future<Output = R>,
    {
        self.state.send_modify(|s| {
            s.busy.insert(control.to_string());
        });
        let out = work.await;
        self.state.send_modify(|s| {
            s.busy.remove(control);
        });
        out
    }

    /// Records a failed mutation on the view and hands the result back.
    pub(crate) fn settle<R>(&self, result: ClientResult<R>) -> ClientResult<R> {
        if let Err(e) = &result {
            self.fail(e);
        }
        result
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Detail model
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct DetailState<T> {
    pub record: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
    pub status: Option<String>,
    pub busy: BTreeSet<String>,
}

impl<T> Default for DetailState<T> {
    fn default() -> Self {
        Self {
            record: None,
            loading: false,
            error: None,
            status: None,
            busy: BTreeSet::new(),
        }
    }
}

/// A single fetched record.
pub struct DetailModel<T> {
    state: watch::Sender<DetailState<T>>,
    generations: Generations,
}

impl<T: Clone + Send + Sync + 'static> Default for DetailModel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> DetailModel<T> {
    pub fn new() -> Self {
        let (state, _) = watch::channel(DetailState::default());
        Self {
            state,
            generations: Generations::default(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DetailState<T>> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> DetailState<T> {
        self.state.borrow().clone()
    }

    pub fn record(&self) -> Option<T> {
        self.state.borrow().record.clone()
    }

    pub fn begin_fetch(&self, key: &str) -> FetchTicket {
        let ticket = self.generations.next(key);
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });
        ticket
    }

    pub fn finish_fetch(&self, ticket: FetchTicket, result: ClientResult<T>) -> bool {
        self.finish_fetch_ref(ticket, &result)
    }

    /// Same as [`finish_fetch`](Self::finish_fetch) for a result the caller keeps.
    pub fn finish_fetch_ref(&self, ticket: FetchTicket, result: &ClientResult<T>) -> bool {
        if !self.generations.is_current(&ticket) {
            debug!("Dropping superseded fetch for {}", ticket.key);
            return false;
        }
        self.state.send_modify(|s| {
            s.loading = false;
            match result {
                Ok(record) => s.record = Some(record.clone()),
                Err(e) => {
                    s.record = None;
                    s.error = Some(e.user_message());
                }
            }
        });
        true
    }

    pub fn set(&self, record: T) {
        self.state.send_modify(|s| s.record = Some(record));
    }

    pub fn fail(&self, error: &ClientError) {
        let message = error.user_message();
        self.state.send_modify(|s| {
            s.error = Some(message);
            s.status = None;
        });
    }

    pub fn notify(&self, status: impl Into<String>) {
        let status = status.into();
        self.state.send_modify(|s| {
            s.status = Some(status);
            s.error = None;
        });
    }

    pub async fn with_busy<F, R>(&self, control: &str, work: F) -> R
    where
        F: Future<Output = R>,
    {
        self.state.send_modify(|s| {
            s.busy.insert(control.to_string());
        });
        let out = work.await;
        self.state.send_modify(|s| {
            s.busy.remove(control);
        });
        out
    }

    pub(crate) fn settle<R>(&self, result: ClientResult<R>) -> ClientResult<R> {
        if let Err(e) = &result {
            self.fail(e);
        }
        result
    }
}
