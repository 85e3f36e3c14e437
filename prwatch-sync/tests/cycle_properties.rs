use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use prwatch_core::store::{MemoryStore, StateStore};
use prwatch_core::types::{
    BookmarkId, GroupId, ItemKey, RemoteItem, RepoSlug, Settings, SyncState, Token, Username,
};
use prwatch_github::{FetchError, ItemSource};
use prwatch_sync::{
    CycleOutcome, CycleState, MemorySurface, Orchestrator, PlanOutcome, SkipReason, SurfaceOp,
    SyncError,
};
use tokio::sync::Notify;

const ME: &str = "octocat";
const TITLE: &str = "Pull Requests";

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

struct FakeSource {
    user: Result<Username, FetchError>,
    repos: HashMap<String, Result<Vec<RemoteItem>, FetchError>>,
    gate: Option<Arc<Notify>>,
    fetches: AtomicUsize,
}

impl FakeSource {
    fn new() -> Self {
        Self {
            user: Ok(Username::from(ME)),
            repos: HashMap::new(),
            gate: None,
            fetches: AtomicUsize::new(0),
        }
    }

    fn repo(mut self, slug: &str, result: Result<Vec<RemoteItem>, FetchError>) -> Self {
        self.repos.insert(slug.to_string(), result);
        self
    }
}

#[async_trait]
impl ItemSource for FakeSource {
    async fn current_user(&self, _token: &Token) -> Result<Username, FetchError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.user.clone()
    }

    async fn open_items(
        &self,
        _token: &Token,
        repository: &RepoSlug,
    ) -> Result<Vec<RemoteItem>, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.repos
            .get(&repository.to_string())
            .cloned()
            .unwrap_or(Err(FetchError::NotFound))
    }
}

fn pr(url: &str, author: &str, reviewers: &[&str]) -> RemoteItem {
    RemoteItem {
        key: ItemKey::from(url),
        title: format!("Title of {url}"),
        repository: "acme/api".parse().expect("slug"),
        number: 1,
        author: Some(Username::from(author)),
        requested_reviewers: reviewers.iter().map(|r| Username::from(*r)).collect(),
    }
}

fn mine(urls: &[&str]) -> Vec<RemoteItem> {
    urls.iter().map(|url| pr(url, ME, &[])).collect()
}

fn settings(repos: &[&str]) -> Settings {
    Settings {
        token: Some(Token::new("ghp_test")),
        repositories: repos.iter().map(|r| r.to_string()).collect(),
        ..Settings::default()
    }
}

struct Harness {
    orch: Arc<Orchestrator>,
    surface: Arc<MemorySurface>,
    store: Arc<MemoryStore>,
}

fn harness(source: FakeSource, store: MemoryStore, surface: MemorySurface) -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();
    let surface = Arc::new(surface);
    let store = Arc::new(store);
    let orch = Arc::new(Orchestrator::new(
        Arc::new(source),
        store.clone(),
        surface.clone(),
        surface.clone(),
    ));
    Harness {
        orch,
        surface,
        store,
    }
}

/// Folder with bookmarks for `urls` and a collapsed group with tabs for `urls`.
fn seeded(urls: &[&str]) -> (MemorySurface, GroupId) {
    let surface = MemorySurface::new();
    let group = surface.with_state(|s| {
        let folder = s
            .create_folder(&BookmarkId::bookmarks_bar(), TITLE, Some(0))
            .expect("folder");
        let mut tabs = Vec::new();
        for url in urls {
            s.create_bookmark(&folder.id, url, url).expect("bookmark");
            tabs.push(s.create_tab(url, false).id);
        }
        let group = s.create_group(&tabs).expect("group");
        s.update_group(group, TITLE, true).expect("label");
        group
    });
    (surface, group)
}

fn with_handle(settings: Settings, group: GroupId) -> MemoryStore {
    MemoryStore::new(settings).with_state(SyncState {
        group_id: Some(group),
        last_update: None,
    })
}

fn count(ops: &[SurfaceOp], pred: impl Fn(&SurfaceOp) -> bool) -> usize {
    ops.iter().filter(|op| pred(op)).count()
}

async fn completed(orch: &Orchestrator) -> prwatch_sync::CycleSummary {
    match orch.run_cycle().await.expect("cycle") {
        CycleOutcome::Completed(summary) => summary,
        other => panic!("expected a completed cycle, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Reconciliation results
// ---------------------------------------------------------------------------

#[tokio::test]
async fn replaces_c_with_a_and_keeps_b() {
    let (surface, group) = seeded(&["B", "C"]);
    let h = harness(
        FakeSource::new().repo("acme/api", Ok(mine(&["A", "B"]))),
        with_handle(settings(&["acme/api"]), group),
        surface,
    );

    let summary = completed(&h.orch).await;
    assert_eq!(summary.items, 2);
    assert_eq!(summary.bookmarks.created, 1);
    assert_eq!(summary.bookmarks.removed, 1);
    assert_eq!(summary.tabs.created, 1);
    assert_eq!(summary.tabs.removed, 1);

    assert_eq!(h.surface.bookmark_urls(TITLE), vec!["A", "B"]);
    assert_eq!(h.surface.group_urls(group), vec!["A", "B"]);

    let ops = h.surface.mutations();
    let batched_removals = count(&ops, |op| {
        matches!(op, SurfaceOp::RemoveTabs { ids } if ids.len() == 1)
    });
    let grouped = count(&ops, |op| {
        matches!(op, SurfaceOp::AddToGroup { group: g, tabs } if *g == group && tabs.len() == 1)
    });
    let containers = count(&ops, |op| {
        matches!(op, SurfaceOp::CreateFolder { .. } | SurfaceOp::CreateGroup { .. })
    });
    assert_eq!(batched_removals, 1);
    assert_eq!(grouped, 1);
    assert_eq!(containers, 0);
}

#[tokio::test]
async fn removals_run_before_creations_on_each_surface() {
    let (surface, group) = seeded(&["B", "C"]);
    let h = harness(
        FakeSource::new().repo("acme/api", Ok(mine(&["A", "B"]))),
        with_handle(settings(&["acme/api"]), group),
        surface,
    );
    completed(&h.orch).await;

    let ops = h.surface.mutations();
    let position = |pred: &dyn Fn(&SurfaceOp) -> bool| ops.iter().position(|op| pred(op));
    let bm_remove = position(&|op| matches!(op, SurfaceOp::RemoveBookmark { .. })).expect("remove");
    let bm_create = position(&|op| matches!(op, SurfaceOp::CreateBookmark { .. })).expect("create");
    let tab_remove = position(&|op| matches!(op, SurfaceOp::RemoveTabs { .. })).expect("close");
    let tab_create = position(&|op| matches!(op, SurfaceOp::CreateTab { .. })).expect("open");
    assert!(bm_remove < bm_create);
    assert!(bm_create < tab_remove, "bookmarks reconcile before tabs");
    assert!(tab_remove < tab_create);
}

#[tokio::test]
async fn second_cycle_without_changes_is_a_noop() {
    let h = harness(
        FakeSource::new().repo("acme/api", Ok(mine(&["A", "B", "C"]))),
        MemoryStore::new(settings(&["acme/api"])),
        MemorySurface::new(),
    );
    completed(&h.orch).await;
    h.surface.clear_ops();

    let summary = completed(&h.orch).await;
    assert!(h.surface.mutations().is_empty());
    assert_eq!(summary.bookmarks.created + summary.bookmarks.removed, 0);
    assert_eq!(summary.tabs.created + summary.tabs.removed, 0);
    assert!(!summary.bookmarks.bootstrapped && !summary.tabs.bootstrapped);
}

#[tokio::test]
async fn duplicate_entries_collapse_to_one() {
    let (surface, group) = seeded(&["A", "A"]);
    let h = harness(
        FakeSource::new().repo("acme/api", Ok(mine(&["A"]))),
        with_handle(settings(&["acme/api"]), group),
        surface,
    );
    completed(&h.orch).await;
    assert_eq!(h.surface.bookmark_urls(TITLE), vec!["A"]);
    assert_eq!(h.surface.group_urls(group), vec!["A"]);
}

#[tokio::test]
async fn empty_target_closes_members_without_new_group() {
    let (surface, group) = seeded(&["X"]);
    let h = harness(
        FakeSource::new().repo("acme/api", Ok(vec![])),
        with_handle(settings(&["acme/api"]), group),
        surface,
    );
    let summary = completed(&h.orch).await;
    assert_eq!(summary.tabs.removed, 1);
    assert!(!summary.tabs.bootstrapped);

    let ops = h.surface.mutations();
    let opened = count(&ops, |op| {
        matches!(op, SurfaceOp::CreateGroup { .. } | SurfaceOp::CreateTab { .. })
    });
    assert_eq!(opened, 0);
    assert!(h.surface.group_urls(group).is_empty());
    assert!(h.surface.bookmark_urls(TITLE).is_empty());
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bootstrap_creates_one_container_before_members() {
    let h = harness(
        FakeSource::new().repo("acme/api", Ok(mine(&["A", "B", "C"]))),
        MemoryStore::new(settings(&["acme/api"])),
        MemorySurface::new(),
    );
    let summary = completed(&h.orch).await;
    assert!(summary.bookmarks.bootstrapped && summary.tabs.bootstrapped);

    let ops = h.surface.mutations();
    assert_eq!(count(&ops, |op| matches!(op, SurfaceOp::CreateFolder { .. })), 1);
    assert_eq!(count(&ops, |op| matches!(op, SurfaceOp::CreateGroup { .. })), 1);
    assert!(matches!(ops[0], SurfaceOp::CreateFolder { .. }));
    let first_tab = ops
        .iter()
        .position(|op| matches!(op, SurfaceOp::CreateTab { .. }))
        .expect("tab");
    assert!(matches!(ops[first_tab + 1], SurfaceOp::CreateGroup { .. }));

    let handle = h.store.group_handle().expect("state").expect("handle persisted");
    let group = h.surface.snapshot().groups.into_iter().find(|g| g.id == handle).expect("group");
    assert_eq!(group.title, TITLE);
    assert!(group.collapsed);
    assert_eq!(h.surface.group_urls(handle), vec!["A", "B", "C"]);
    assert_eq!(h.surface.folders_titled(TITLE).len(), 1);
}

#[tokio::test]
async fn empty_target_without_group_creates_no_group() {
    let h = harness(
        FakeSource::new().repo("acme/api", Ok(vec![])),
        MemoryStore::new(settings(&["acme/api"])),
        MemorySurface::new(),
    );
    completed(&h.orch).await;

    let ops = h.surface.ops();
    let tab_ops = count(&ops, |op| {
        matches!(
            op,
            SurfaceOp::GetGroup { .. }
                | SurfaceOp::ListGroupTabs { .. }
                | SurfaceOp::CreateTab { .. }
                | SurfaceOp::RemoveTabs { .. }
                | SurfaceOp::CreateGroup { .. }
                | SurfaceOp::AddToGroup { .. }
                | SurfaceOp::UpdateGroup { .. }
        )
    });
    assert_eq!(tab_ops, 0);
    assert_eq!(h.store.group_handle().expect("state"), None);
}

#[tokio::test]
async fn unresolvable_handle_is_replaced_by_a_new_group() {
    let h = harness(
        FakeSource::new().repo("acme/api", Ok(mine(&["A"]))),
        with_handle(settings(&["acme/api"]), GroupId(9999)),
        MemorySurface::new(),
    );
    let summary = completed(&h.orch).await;
    assert!(summary.tabs.bootstrapped);

    let handle = h.store.group_handle().expect("state").expect("handle");
    assert_ne!(handle, GroupId(9999));
    assert_eq!(h.surface.group_urls(handle), vec!["A"]);
}

#[tokio::test]
async fn group_dissolved_by_user_is_rebuilt_next_cycle() {
    let h = harness(
        FakeSource::new().repo("acme/api", Ok(mine(&["A", "B"]))),
        MemoryStore::new(settings(&["acme/api"])),
        MemorySurface::new(),
    );
    completed(&h.orch).await;
    let first = h.store.group_handle().expect("state").expect("handle");
    h.surface.with_state(|s| s.ungroup(first));

    completed(&h.orch).await;
    let second = h.store.group_handle().expect("state").expect("handle");
    assert_ne!(first, second);
    assert_eq!(h.surface.group_urls(second), vec!["A", "B"]);
}

// ---------------------------------------------------------------------------
// Errors and filtering
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unauthorized_identity_aborts_before_any_surface_call() {
    let mut source = FakeSource::new().repo("acme/api", Ok(mine(&["A"])));
    source.user = Err(FetchError::Auth);
    let (surface, group) = seeded(&["X"]);
    let h = harness(source, with_handle(settings(&["acme/api"]), group), surface);

    let err = h.orch.run_cycle().await.unwrap_err();
    assert!(matches!(err, SyncError::Identity(FetchError::Auth)));
    assert!(h.surface.ops().is_empty());
    assert_eq!(h.surface.group_urls(group), vec!["X"]);
    assert!(h.store.state().expect("state").last_update.is_none());
}

#[tokio::test]
async fn missing_repository_does_not_block_others() {
    let h = harness(
        FakeSource::new()
            .repo("acme/gone", Err(FetchError::NotFound))
            .repo("acme/limited", Err(FetchError::Access))
            .repo("acme/flaky", Err(FetchError::Unknown { status: 502 }))
            .repo("acme/api", Ok(mine(&["A"]))),
        MemoryStore::new(settings(&["acme/gone", "acme/limited", "acme/flaky", "acme/api"])),
        MemorySurface::new(),
    );
    let summary = completed(&h.orch).await;
    assert_eq!(summary.repositories, 4);
    assert_eq!(h.surface.bookmark_urls(TITLE), vec!["A"]);
    assert!(h.store.state().expect("state").last_update.is_some());
}

#[tokio::test]
async fn rejected_credential_mid_cycle_leaves_surfaces_untouched() {
    let (surface, group) = seeded(&["X"]);
    let h = harness(
        FakeSource::new()
            .repo("acme/api", Ok(mine(&["A"])))
            .repo("acme/web", Err(FetchError::Auth)),
        with_handle(settings(&["acme/api", "acme/web"]), group),
        surface,
    );
    let err = h.orch.run_cycle().await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::RepositoryAuth { ref repository, .. } if repository == "acme/web"
    ));
    assert!(h.surface.ops().is_empty());
}

#[tokio::test]
async fn malformed_repository_entry_is_skipped() {
    let source = FakeSource::new().repo("acme/api", Ok(mine(&["A"])));
    let h = harness(
        source,
        MemoryStore::new(settings(&["not a slug", "acme/api"])),
        MemorySurface::new(),
    );
    completed(&h.orch).await;
    assert_eq!(h.surface.bookmark_urls(TITLE), vec!["A"]);
}

#[tokio::test]
async fn items_not_involving_the_user_are_excluded() {
    let h = harness(
        FakeSource::new().repo(
            "acme/api",
            Ok(vec![
                pr("mine", ME, &[]),
                pr("review", "hubot", &[ME]),
                pr("other", "hubot", &["someone"]),
                pr("case", "OctoCat", &[]),
            ]),
        ),
        MemoryStore::new(settings(&["acme/api"])),
        MemorySurface::new(),
    );
    let summary = completed(&h.orch).await;
    assert_eq!(summary.items, 2);
    assert_eq!(h.surface.bookmark_urls(TITLE), vec!["mine", "review"]);
}

#[tokio::test]
async fn items_from_every_repository_are_merged() {
    let h = harness(
        FakeSource::new()
            .repo("acme/api", Ok(mine(&["A"])))
            .repo("acme/web", Ok(mine(&["B"]))),
        MemoryStore::new(settings(&["acme/api", "acme/web"])),
        MemorySurface::new(),
    );
    completed(&h.orch).await;
    assert_eq!(h.surface.bookmark_urls(TITLE), vec!["A", "B"]);
}

#[tokio::test]
async fn no_repositories_skips_without_network() {
    let source = FakeSource::new();
    let h = harness(source, MemoryStore::new(settings(&[])), MemorySurface::new());
    let outcome = h.orch.run_cycle().await.expect("cycle");
    assert!(matches!(
        outcome,
        CycleOutcome::Skipped {
            reason: SkipReason::NoRepositories
        }
    ));
    assert!(h.surface.ops().is_empty());
}

// ---------------------------------------------------------------------------
// Cycle guard
// ---------------------------------------------------------------------------

#[tokio::test]
async fn trigger_while_running_is_a_noop() {
    let gate = Arc::new(Notify::new());
    let mut source = FakeSource::new().repo("acme/api", Ok(mine(&["A"])));
    source.gate = Some(gate.clone());
    let h = harness(source, MemoryStore::new(settings(&["acme/api"])), MemorySurface::new());

    let first = tokio::spawn({
        let orch = h.orch.clone();
        async move { orch.run_cycle().await }
    });
    while h.orch.state() != CycleState::Running {
        tokio::task::yield_now().await;
    }

    let second = h.orch.run_cycle().await.expect("second");
    assert!(matches!(
        second,
        CycleOutcome::Skipped {
            reason: SkipReason::Busy
        }
    ));
    assert!(h.surface.ops().is_empty());

    gate.notify_one();
    let first = first.await.expect("join").expect("first");
    assert!(matches!(first, CycleOutcome::Completed(_)));
    assert_eq!(h.orch.state(), CycleState::Idle);
    assert_eq!(count(&h.surface.mutations(), |op| matches!(op, SurfaceOp::CreateFolder { .. })), 1);
}

#[tokio::test]
async fn guard_is_released_after_a_failed_cycle() {
    let mut source = FakeSource::new().repo("acme/api", Ok(mine(&["A"])));
    source.user = Err(FetchError::Unknown { status: 500 });
    let h = harness(source, MemoryStore::new(settings(&["acme/api"])), MemorySurface::new());

    assert!(h.orch.run_cycle().await.is_err());
    assert_eq!(h.orch.state(), CycleState::Idle);
    assert!(h.orch.run_cycle().await.is_err(), "a new cycle starts, it is not skipped");
}

// ---------------------------------------------------------------------------
// Dry run and connection test
// ---------------------------------------------------------------------------

#[tokio::test]
async fn plan_cycle_reports_without_mutating() {
    let (surface, group) = seeded(&["B", "C"]);
    let h = harness(
        FakeSource::new().repo("acme/api", Ok(mine(&["A", "B"]))),
        with_handle(settings(&["acme/api"]), group),
        surface,
    );
    let PlanOutcome::Planned(plan) = h.orch.plan_cycle().await.expect("plan") else {
        panic!("expected a plan");
    };
    assert_eq!(plan.targets.len(), 2);
    assert_eq!(plan.bookmarks.diff.missing, vec![ItemKey::from("A")]);
    assert_eq!(plan.bookmarks.diff.stale.len(), 1);
    assert_eq!(plan.tabs.diff.stale.len(), 1);
    assert_eq!(plan.tabs.group.as_ref().map(|g| g.id), Some(group));
    assert!(h.surface.mutations().is_empty());
    assert!(h.store.state().expect("state").last_update.is_none());
}

#[tokio::test]
async fn connection_test_touches_no_repository() {
    let source = Arc::new(FakeSource::new().repo("acme/api", Ok(mine(&["A"]))));
    let user = prwatch_sync::test_connection(&*source, &Token::new("ghp_x"))
        .await
        .expect("identity");
    assert_eq!(user, Username::from(ME));
    assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
}
