//! RemapKeysUseCase: what the hook does with one keyboard event.
//!
//! For every event an interception backend observes:
//!
//! 1. Injected (our marker or the OS's own flag) → forward, nothing else.
//! 2. Key-down → ask the [`RemapEngine`] (which also publishes `KeyObserved`).
//! 3. `Suppress(mapped)` → emit `mapped` through the [`KeyInjector`] and
//!    consume the physical event.
//! 4. `PassThrough` → forward.
//!
//! Key-ups are consumed only for keys whose key-down was consumed, so an
//! application never sees a release without the matching press.
//!
//! Nothing in here may fail outward: the caller is an OS callback with nobody
//! to report to.  Injection errors are logged and degrade to forwarding the
//! original event, so the physical key behaves as unmapped for that press.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use keyweave_core::{is_injected, Decision, KeyEvent, KeyTransition, RemapEngine, VirtualKey};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// What the interception backend should do with the event it just reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAction {
    /// Hand the event to the next hook / the focused application unchanged.
    Forward,
    /// Consume the event; it produces no default effect.
    Suppress,
}

/// Error type for synthesizing key presses.
#[derive(Debug, Error)]
pub enum InjectionError {
    /// The OS accepted fewer events than were submitted.
    #[error("OS accepted {accepted} of {submitted} synthesized events (error code {code})")]
    Rejected {
        submitted: u32,
        accepted: u32,
        code: u32,
    },
}

/// Submits one stamped key-down + key-up pair for `key`.
///
/// Implementations build the pair with [`keyweave_core::press_pair`] so every
/// event carries the injection marker, and submit it in a single OS call.
/// Failures are not retried: a duplicated key press is worse than a dropped one.
pub trait KeyInjector: Send + Sync {
    fn emit(&self, key: VirtualKey) -> Result<(), InjectionError>;
}

/// Receives every keyboard event an interception backend observes.
///
/// Called synchronously on the hook thread; must return quickly.
pub trait KeyEventHandler: Send + Sync {
    fn handle(&self, event: &KeyEvent) -> HookAction;
}

/// Counters maintained by [`RemapKeysUseCase`].
#[derive(Debug, Default)]
struct HookStats {
    key_downs: AtomicU64,
    injected_skipped: AtomicU64,
    remapped: AtomicU64,
    injection_failures: AtomicU64,
}

/// Point-in-time copy of the hook counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookStatsSnapshot {
    /// Physical key-downs that reached the engine.
    pub key_downs: u64,
    /// Events skipped because they were injected.
    pub injected_skipped: u64,
    /// Key-downs replaced by an injected press.
    pub remapped: u64,
    /// Key-downs whose injection failed and were forwarded instead.
    pub injection_failures: u64,
}

/// The Remap Keys use case.
pub struct RemapKeysUseCase {
    engine: Arc<RemapEngine>,
    injector: Arc<dyn KeyInjector>,
    /// Keys whose physical key-down was consumed and whose key-up is pending.
    held: Mutex<HashSet<VirtualKey>>,
    stats: HookStats,
}

impl RemapKeysUseCase {
    pub fn new(engine: Arc<RemapEngine>, injector: Arc<dyn KeyInjector>) -> Self {
        Self {
            engine,
            injector,
            held: Mutex::new(HashSet::new()),
            stats: HookStats::default(),
        }
    }

    pub fn stats(&self) -> HookStatsSnapshot {
        HookStatsSnapshot {
            key_downs: self.stats.key_downs.load(Ordering::Relaxed),
            injected_skipped: self.stats.injected_skipped.load(Ordering::Relaxed),
            remapped: self.stats.remapped.load(Ordering::Relaxed),
            injection_failures: self.stats.injection_failures.load(Ordering::Relaxed),
        }
    }

    fn handle_key_down(&self, key: VirtualKey) -> HookAction {
        self.stats.key_downs.fetch_add(1, Ordering::Relaxed);

        let mapped = match self.engine.observe_key_down(key) {
            Decision::PassThrough => {
                trace!("{key} passes through");
                return self.forward_key_down(key);
            }
            Decision::Suppress(mapped) => mapped,
        };

        // The engine lock is already released here; emitting may re-enter
        // this handler with the injected pair.
        match self.injector.emit(mapped) {
            Ok(()) => {
                self.stats.remapped.fetch_add(1, Ordering::Relaxed);
                self.held_keys().insert(key);
                debug!("{key} -> {mapped}");
                HookAction::Suppress
            }
            Err(e) => {
                self.stats.injection_failures.fetch_add(1, Ordering::Relaxed);
                warn!("failed to emit {mapped} for {key}, forwarding original: {e}");
                self.forward_key_down(key)
            }
        }
    }

    /// The application now sees `key` as down, so its key-up must reach it too.
    fn forward_key_down(&self, key: VirtualKey) -> HookAction {
        self.held_keys().remove(&key);
        HookAction::Forward
    }

    fn handle_key_up(&self, key: VirtualKey) -> HookAction {
        if self.held_keys().remove(&key) {
            HookAction::Suppress
        } else {
            HookAction::Forward
        }
    }

    fn held_keys(&self) -> std::sync::MutexGuard<'_, HashSet<VirtualKey>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyEventHandler for RemapKeysUseCase {
    fn handle(&self, event: &KeyEvent) -> HookAction {
        // Must come before any lookup: remapping our own output loops forever.
        if is_injected(event) {
            self.stats.injected_skipped.fetch_add(1, Ordering::Relaxed);
            trace!("skipping injected {:?} {}", event.transition, event.key);
            return HookAction::Forward;
        }

        match event.transition {
            KeyTransition::Down => self.handle_key_down(event.key),
            KeyTransition::Up => self.handle_key_up(event.key),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use keyweave_core::{press_pair, stamp};
    use mockall::{mock, predicate::eq};

    mock! {
        Injector {}
        impl KeyInjector for Injector {
            fn emit(&self, key: VirtualKey) -> Result<(), InjectionError>;
        }
    }

    fn use_case(pairs: &[(VirtualKey, VirtualKey)], injector: MockInjector) -> RemapKeysUseCase {
        let engine = Arc::new(RemapEngine::new(pairs.iter().copied().collect()));
        RemapKeysUseCase::new(engine, Arc::new(injector))
    }

    #[test]
    fn test_mapped_key_down_emits_target_and_suppresses() {
        // Arrange
        let mut injector = MockInjector::new();
        injector
            .expect_emit()
            .with(eq(VirtualKey::B))
            .times(1)
            .returning(|_| Ok(()));
        let uc = use_case(&[(VirtualKey::A, VirtualKey::B)], injector);

        // Act
        let action = uc.handle(&KeyEvent::key_down(VirtualKey::A));

        // Assert
        assert_eq!(action, HookAction::Suppress);
        assert_eq!(uc.stats().remapped, 1);
    }

    #[test]
    fn test_unmapped_key_down_forwards_without_emitting() {
        let mut injector = MockInjector::new();
        injector.expect_emit().never();
        let uc = use_case(&[(VirtualKey::A, VirtualKey::B)], injector);

        let action = uc.handle(&KeyEvent::key_down(VirtualKey::SPACE));

        assert_eq!(action, HookAction::Forward);
        assert_eq!(uc.stats().key_downs, 1);
        assert_eq!(uc.stats().remapped, 0);
    }

    #[test]
    fn test_injected_events_are_forwarded_before_lookup() {
        // Arrange: A is mapped, but stamped A events must never reach the engine
        let mut injector = MockInjector::new();
        injector.expect_emit().never();
        let uc = use_case(&[(VirtualKey::A, VirtualKey::B)], injector);
        let observed = uc.engine.subscribe();

        // Act
        let actions: Vec<_> = press_pair(VirtualKey::A).iter().map(|e| uc.handle(e)).collect();

        // Assert
        assert_eq!(actions, vec![HookAction::Forward, HookAction::Forward]);
        assert!(observed.try_recv().is_err(), "injected events must not publish KeyObserved");
        assert_eq!(uc.stats().injected_skipped, 2);
        assert_eq!(uc.stats().key_downs, 0);
    }

    #[test]
    fn test_os_injected_flag_is_honoured() {
        let mut injector = MockInjector::new();
        injector.expect_emit().never();
        let uc = use_case(&[(VirtualKey::A, VirtualKey::B)], injector);

        let foreign = KeyEvent {
            os_injected: true,
            ..KeyEvent::key_down(VirtualKey::A)
        };

        assert_eq!(uc.handle(&foreign), HookAction::Forward);
    }

    #[test]
    fn test_injection_failure_degrades_to_forward() {
        // Arrange
        let mut injector = MockInjector::new();
        injector.expect_emit().times(1).returning(|_| {
            Err(InjectionError::Rejected {
                submitted: 2,
                accepted: 0,
                code: 5,
            })
        });
        let uc = use_case(&[(VirtualKey::A, VirtualKey::B)], injector);

        // Act
        let down = uc.handle(&KeyEvent::key_down(VirtualKey::A));
        let up = uc.handle(&KeyEvent::key_up(VirtualKey::A));

        // Assert: the physical key behaves as unmapped for this press
        assert_eq!(down, HookAction::Forward);
        assert_eq!(up, HookAction::Forward);
        assert_eq!(uc.stats().injection_failures, 1);
    }

    #[test]
    fn test_key_up_suppressed_only_after_suppressed_key_down() {
        let mut injector = MockInjector::new();
        injector.expect_emit().times(1).returning(|_| Ok(()));
        let uc = use_case(&[(VirtualKey::A, VirtualKey::B)], injector);

        // A key-up with no consumed key-down (e.g. held before start) passes.
        assert_eq!(uc.handle(&KeyEvent::key_up(VirtualKey::A)), HookAction::Forward);

        assert_eq!(uc.handle(&KeyEvent::key_down(VirtualKey::A)), HookAction::Suppress);
        assert_eq!(uc.handle(&KeyEvent::key_up(VirtualKey::A)), HookAction::Suppress);
        assert_eq!(uc.handle(&KeyEvent::key_up(VirtualKey::A)), HookAction::Forward);
    }

    #[test]
    fn test_key_up_still_suppressed_after_mapping_removed_mid_press() {
        let mut injector = MockInjector::new();
        injector.expect_emit().times(1).returning(|_| Ok(()));
        let uc = use_case(&[(VirtualKey::A, VirtualKey::B)], injector);

        uc.handle(&KeyEvent::key_down(VirtualKey::A));
        uc.engine.remove_mapping(VirtualKey::A);

        assert_eq!(uc.handle(&KeyEvent::key_up(VirtualKey::A)), HookAction::Suppress);
    }

    #[test]
    fn test_forwarded_repeat_after_mapping_removed_releases_key_up() {
        // Arrange
        let mut injector = MockInjector::new();
        injector.expect_emit().times(1).returning(|_| Ok(()));
        let uc = use_case(&[(VirtualKey::A, VirtualKey::B)], injector);

        // Act: auto-repeat arrives after the mapping is gone
        let first = uc.handle(&KeyEvent::key_down(VirtualKey::A));
        uc.engine.remove_mapping(VirtualKey::A);
        let repeat = uc.handle(&KeyEvent::key_down(VirtualKey::A));
        let up = uc.handle(&KeyEvent::key_up(VirtualKey::A));

        // Assert: the application saw A go down, so it must see A come up
        assert_eq!(first, HookAction::Suppress);
        assert_eq!(repeat, HookAction::Forward);
        assert_eq!(up, HookAction::Forward);
    }

    #[test]
    fn test_failed_repeat_injection_releases_key_up() {
        // Arrange: first emit succeeds, the auto-repeat emit fails
        let mut injector = MockInjector::new();
        let mut seq = mockall::Sequence::new();
        injector
            .expect_emit()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        injector
            .expect_emit()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Err(InjectionError::Rejected {
                    submitted: 2,
                    accepted: 0,
                    code: 5,
                })
            });
        let uc = use_case(&[(VirtualKey::A, VirtualKey::B)], injector);

        // Act
        let first = uc.handle(&KeyEvent::key_down(VirtualKey::A));
        let repeat = uc.handle(&KeyEvent::key_down(VirtualKey::A));
        let up = uc.handle(&KeyEvent::key_up(VirtualKey::A));

        // Assert
        assert_eq!(first, HookAction::Suppress);
        assert_eq!(repeat, HookAction::Forward);
        assert_eq!(up, HookAction::Forward);
        assert_eq!(uc.stats().injection_failures, 1);
    }

    #[test]
    fn test_suppressed_repeats_keep_single_suppressed_key_up() {
        let mut injector = MockInjector::new();
        injector.expect_emit().times(3).returning(|_| Ok(()));
        let uc = use_case(&[(VirtualKey::A, VirtualKey::B)], injector);

        for _ in 0..3 {
            assert_eq!(uc.handle(&KeyEvent::key_down(VirtualKey::A)), HookAction::Suppress);
        }

        assert_eq!(uc.handle(&KeyEvent::key_up(VirtualKey::A)), HookAction::Suppress);
        assert_eq!(uc.handle(&KeyEvent::key_up(VirtualKey::A)), HookAction::Forward);
    }

    #[test]
    fn test_key_observed_carries_resulting_key() {
        let mut injector = MockInjector::new();
        injector.expect_emit().returning(|_| Ok(()));
        let uc = use_case(&[(VirtualKey::A, VirtualKey::B)], injector);
        let observed = uc.engine.subscribe();

        uc.handle(&KeyEvent::key_down(VirtualKey::A));
        uc.handle(&KeyEvent::key_up(VirtualKey::A));
        uc.handle(&KeyEvent::key_down(VirtualKey::C));
        uc.handle(&stamp(KeyEvent::key_down(VirtualKey::B)));

        let keys: Vec<_> = observed.try_iter().collect();
        assert_eq!(keys, vec![VirtualKey::B, VirtualKey::C]);
    }
}
