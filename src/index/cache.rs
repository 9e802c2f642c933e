//! Time-boxed cache around the alias index and membership set.
//!
//! A refresh loads source data, builds a complete [`Snapshot`] off to the
//! side and only then swaps the published `Arc`. Readers holding an older
//! snapshot keep using it undisturbed; a failed or cancelled load leaves
//! the published snapshot as it was.

use crate::error::SourceError;
use crate::index::alias::{AliasEntry, AliasIndex};
use crate::index::membership::MembershipSet;
use crate::models::AliasRow;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Default validity window: 12 hours.
pub const DEFAULT_VALIDITY_WINDOW: Duration = Duration::from_secs(12 * 60 * 60);

/// Raw data handed back by a loader.
#[derive(Debug, Clone, Default)]
pub struct SourceData {
    pub alias_rows: Vec<AliasRow>,
    pub members: Vec<String>,
}

/// An immutable, published pair of indices.
#[derive(Debug)]
pub struct Snapshot {
    pub aliases: AliasIndex,
    pub membership: MembershipSet,
    pub built_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn build(data: SourceData, built_at: DateTime<Utc>) -> Self {
        Self {
            aliases: AliasIndex::build(data.alias_rows),
            membership: MembershipSet::load(data.members),
            built_at,
        }
    }

    /// Whether the snapshot is still inside `window` at `now`.
    ///
    /// A `built_at` in the future (clock moved backwards) counts as fresh.
    pub fn is_fresh_at(&self, now: DateTime<Utc>, window: Duration) -> bool {
        let elapsed = (now - self.built_at).to_std().unwrap_or_default();
        elapsed < window
    }
}

/// Result of [`CacheManager::ensure_fresh`].
#[derive(Debug)]
pub enum RefreshOutcome {
    /// The published snapshot is inside its window; nothing was loaded.
    Fresh,
    /// A new snapshot was built and published.
    Rebuilt {
        puppets: usize,
        masters: usize,
        members: usize,
    },
    /// Loading failed; the previous snapshot (if any) is still published.
    Degraded(SourceError),
}

impl RefreshOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, RefreshOutcome::Degraded(_))
    }
}

/// Owner and sole writer of the published [`Snapshot`].
pub struct CacheManager {
    window: Duration,
    published: RwLock<Option<Arc<Snapshot>>>,
    refresh_lock: Mutex<()>,
    not_ready_logged: AtomicBool,
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(DEFAULT_VALIDITY_WINDOW)
    }
}

impl CacheManager {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            published: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            not_ready_logged: AtomicBool::new(false),
        }
    }

    pub fn validity_window(&self) -> Duration {
        self.window
    }

    /// The currently published snapshot, if a load has ever succeeded.
    pub fn current_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.current_snapshot()
            .is_some_and(|snapshot| snapshot.is_fresh_at(now, self.window))
    }

    /// Reload through `load` unless the published snapshot is still fresh.
    pub async fn ensure_fresh<F, Fut>(&self, load: F) -> RefreshOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<SourceData, SourceError>>,
    {
        self.ensure_fresh_at(Utc::now(), load).await
    }

    /// [`ensure_fresh`](Self::ensure_fresh) against an explicit clock.
    pub async fn ensure_fresh_at<F, Fut>(&self, now: DateTime<Utc>, load: F) -> RefreshOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<SourceData, SourceError>>,
    {
        if self.is_fresh_at(now) {
            debug!("Alias cache is still valid, skipping load");
            return RefreshOutcome::Fresh;
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock.
        if self.is_fresh_at(now) {
            debug!("Alias cache refreshed concurrently, skipping load");
            return RefreshOutcome::Fresh;
        }

        info!("Loading alias and membership data");
        let data = match load().await {
            Ok(data) => data,
            Err(e) => {
                warn!(kind = e.kind(), "Alias data load failed, keeping previous snapshot: {}", e);
                return RefreshOutcome::Degraded(e);
            }
        };

        let staged = Snapshot::build(data, now);

        if let Some(previous) = self.current_snapshot() {
            if let Some(error) = emptied_by(&previous, &staged) {
                warn!("Refusing to publish snapshot: {}", error);
                return RefreshOutcome::Degraded(error);
            }
        }

        let puppets = staged.aliases.puppet_count();
        let masters = staged.aliases.master_count();
        let members = staged.membership.len();
        self.publish(staged);

        info!(
            "Loaded {} puppets, {} masters with puppets, {} current identities",
            puppets, masters, members
        );
        RefreshOutcome::Rebuilt {
            puppets,
            masters,
            members,
        }
    }

    fn publish(&self, snapshot: Snapshot) {
        let mut guard = self
            .published
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Some(Arc::new(snapshot));
    }

    /// Resolve through the published index; identity passthrough before the
    /// first successful load.
    pub fn resolve(&self, puppet_id: &str) -> AliasEntry {
        match self.current_snapshot() {
            Some(snapshot) => snapshot.aliases.resolve(puppet_id),
            None => {
                self.log_not_ready();
                AliasIndex::default().resolve(puppet_id)
            }
        }
    }

    /// Membership test; `false` until the first successful load.
    pub fn is_member(&self, label: &str) -> bool {
        match self.current_snapshot() {
            Some(snapshot) => snapshot.membership.contains(label),
            None => {
                self.log_not_ready();
                false
            }
        }
    }

    fn log_not_ready(&self) {
        if !self.not_ready_logged.swap(true, Ordering::Relaxed) {
            warn!("Alias cache is not initialized yet; lookups fall back to defaults");
        }
    }
}

/// A staged snapshot must not replace populated data with nothing.
fn emptied_by(previous: &Snapshot, staged: &Snapshot) -> Option<SourceError> {
    if staged.aliases.is_empty() && !previous.aliases.is_empty() {
        return Some(SourceError::Empty {
            source_name: "alias tables".to_string(),
        });
    }
    if staged.membership.is_empty() && !previous.membership.is_empty() {
        return Some(SourceError::Empty {
            source_name: "membership list".to_string(),
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::AtomicUsize;

    fn data() -> SourceData {
        SourceData {
            alias_rows: vec![
                AliasRow::from_raw("puppet_1", "testlandia", "9003").unwrap(),
                AliasRow::from_raw("puppet_2", "testlandia", "9003").unwrap(),
            ],
            members: vec!["testlandia".to_string(), "puppet_1".to_string()],
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn hours(h: i64) -> chrono::Duration {
        chrono::Duration::hours(h)
    }

    #[tokio::test]
    async fn test_single_load_within_window() {
        let cache = CacheManager::default();
        let counter = AtomicUsize::new(0);
        let loads = &counter;
        let load = move || async move {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok(data())
        };

        let first = cache.ensure_fresh_at(t0(), load).await;
        assert!(matches!(first, RefreshOutcome::Rebuilt { puppets: 2, masters: 1, members: 2 }));

        let second = cache.ensure_fresh_at(t0() + hours(11), load).await;
        assert!(matches!(second, RefreshOutcome::Fresh));
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        let third = cache.ensure_fresh_at(t0() + hours(12), load).await;
        assert!(matches!(third, RefreshOutcome::Rebuilt { .. }));
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_refresh_loads_once() {
        let cache = CacheManager::default();
        let counter = AtomicUsize::new(0);
        let loads = &counter;
        let load = move || async move {
            loads.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(data())
        };

        let (first, second) = tokio::join!(
            cache.ensure_fresh_at(t0(), load),
            cache.ensure_fresh_at(t0(), load)
        );

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(matches!(first, RefreshOutcome::Rebuilt { .. }));
        assert!(matches!(second, RefreshOutcome::Fresh));
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_snapshot() {
        let cache = CacheManager::new(Duration::from_secs(60));
        cache.ensure_fresh_at(t0(), || async { Ok(data()) }).await;

        let outcome = cache
            .ensure_fresh_at(t0() + hours(1), || async {
                Err(SourceError::Status {
                    location: "https://example.org".to_string(),
                    status: 500,
                })
            })
            .await;
        assert!(outcome.is_degraded());

        let snapshot = cache.current_snapshot().unwrap();
        assert_eq!(snapshot.built_at, t0());
        assert_eq!(snapshot.aliases.resolve("puppet_2").master_id, "testlandia");
        assert_eq!(snapshot.aliases.alias_count("testlandia"), 2);
        assert!(cache.is_member("Testlandia"));

        // still stale, so the next call tries again
        assert!(!cache.is_fresh_at(t0() + hours(1)));
    }

    #[tokio::test]
    async fn test_empty_load_does_not_replace_populated_snapshot() {
        let cache = CacheManager::new(Duration::from_secs(60));
        cache.ensure_fresh_at(t0(), || async { Ok(data()) }).await;

        let outcome = cache
            .ensure_fresh_at(t0() + hours(1), || async { Ok(SourceData::default()) })
            .await;
        assert!(matches!(outcome, RefreshOutcome::Degraded(SourceError::Empty { .. })));
        assert_eq!(cache.resolve("puppet_1").master_id, "testlandia");
    }

    #[tokio::test]
    async fn test_not_ready_defaults() {
        let cache = CacheManager::default();
        assert!(cache.current_snapshot().is_none());
        assert!(!cache.is_member("testlandia"));
        let entry = cache.resolve("puppet_1");
        assert_eq!(entry.master_id, "puppet_1");
        assert_eq!(entry.source_tag, None);

        let outcome = cache
            .ensure_fresh_at(t0(), || async {
                Err(SourceError::Transport {
                    location: "x".to_string(),
                    message: "down".to_string(),
                })
            })
            .await;
        assert!(outcome.is_degraded());
        assert!(cache.current_snapshot().is_none());
    }

    #[tokio::test]
    async fn test_readers_keep_old_snapshot_across_swap() {
        let cache = CacheManager::new(Duration::from_secs(60));
        cache.ensure_fresh_at(t0(), || async { Ok(data()) }).await;
        let held = cache.current_snapshot().unwrap();

        let replacement = SourceData {
            alias_rows: vec![AliasRow::from_raw("puppet_1", "elsewhere", "Rot").unwrap()],
            members: vec!["elsewhere".to_string()],
        };
        cache
            .ensure_fresh_at(t0() + hours(1), move || async move { Ok(replacement) })
            .await;

        assert_eq!(held.aliases.resolve("puppet_1").master_id, "testlandia");
        assert_eq!(cache.resolve("puppet_1").master_id, "elsewhere");
    }

    #[tokio::test]
    async fn test_cancelled_load_publishes_nothing() {
        let cache = CacheManager::default();
        let pending = cache.ensure_fresh_at(t0(), || async {
            futures::future::pending::<Result<SourceData, SourceError>>().await
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());
        assert!(cache.current_snapshot().is_none());

        let retry = cache.ensure_fresh_at(t0(), || async { Ok(data()) }).await;
        assert!(matches!(retry, RefreshOutcome::Rebuilt { .. }));
    }

    #[test]
    fn test_snapshot_future_build_time_is_fresh() {
        let snapshot = Snapshot::build(data(), t0() + hours(1));
        assert!(snapshot.is_fresh_at(t0(), DEFAULT_VALIDITY_WINDOW));
        assert!(!snapshot.is_fresh_at(t0() + hours(13), DEFAULT_VALIDITY_WINDOW));
    }
}
