//! End-to-end tests for the remap pipeline.
//!
//! Each test runs the real [`KeyRemapper`] on a real hook thread, with a mock
//! interception backend standing in for the OS hook and a recording injector
//! that feeds its output back through the hook, as Windows would.

use std::sync::mpsc::Receiver;
use std::sync::Arc;

use keyweave::application::remap_keys::HookAction;
use keyweave::infrastructure::hook::mock::{mock_hook, MockKeyboard};
use keyweave::infrastructure::hook::{HookCapabilities, HookError};
use keyweave::infrastructure::injector::mock::RecordingInjector;
use keyweave::infrastructure::storage::config::{load_config, JsonConfigStore};
use keyweave::KeyRemapper;
use keyweave_core::{KeyEvent, RemapTable, VirtualKey};

const SUPPRESSING: HookCapabilities = HookCapabilities { can_suppress: true };

struct Harness {
    remapper: KeyRemapper,
    keyboard: MockKeyboard,
    injector: Arc<RecordingInjector>,
    observed: Receiver<VirtualKey>,
}

fn start_with(table: RemapTable, capabilities: HookCapabilities) -> Harness {
    let injector = Arc::new(RecordingInjector::new());
    let mut remapper = KeyRemapper::new(table, injector.clone());
    injector.connect_loopback(&remapper.event_handler());
    let observed = remapper.subscribe();

    let (backend, keyboard) = mock_hook(capabilities);
    remapper.start(move || Ok(backend)).expect("start remapper");

    Harness {
        remapper,
        keyboard,
        injector,
        observed,
    }
}

fn table(pairs: &[(VirtualKey, VirtualKey)]) -> RemapTable {
    pairs.iter().copied().collect()
}

#[test]
fn test_mapped_press_emits_exactly_one_target_pair() {
    // Arrange
    let h = start_with(table(&[(VirtualKey::A, VirtualKey::B)]), SUPPRESSING);

    // Act
    let verdicts = h.keyboard.tap(VirtualKey::A).expect("pump alive");

    // Assert: physical A is consumed (down and up)
    assert_eq!(verdicts, (HookAction::Suppress, HookAction::Suppress));

    // one KeyObserved carrying the mapped key
    let observed: Vec<_> = h.observed.try_iter().collect();
    assert_eq!(observed, vec![VirtualKey::B]);

    // one B down/up pair was injected
    assert_eq!(h.injector.emitted_presses(), vec![VirtualKey::B]);
    assert_eq!(h.injector.emitted().len(), 2);

    // the injected pair went back through the hook and was forwarded untouched
    assert_eq!(
        h.injector.loopback_actions(),
        vec![HookAction::Forward, HookAction::Forward]
    );
    let stats = h.remapper.stats();
    assert_eq!(stats.key_downs, 1, "no re-entrant decisions for injected events");
    assert_eq!(stats.injected_skipped, 2);
    assert_eq!(stats.remapped, 1);
}

#[test]
fn test_empty_table_passes_keys_through() {
    let h = start_with(RemapTable::new(), SUPPRESSING);

    let verdicts = h.keyboard.tap(VirtualKey::SPACE).expect("pump alive");

    assert_eq!(verdicts, (HookAction::Forward, HookAction::Forward));
    assert_eq!(h.observed.try_iter().collect::<Vec<_>>(), vec![VirtualKey::SPACE]);
    assert!(h.injector.emitted().is_empty());
}

#[test]
fn test_removed_mapping_restores_original_key() {
    // Arrange
    let h = start_with(RemapTable::new(), SUPPRESSING);
    h.remapper.remap_key(VirtualKey::A, VirtualKey::B);
    h.remapper.remove_mapping(VirtualKey::A);

    // Act
    let (down, _) = h.keyboard.tap(VirtualKey::A).expect("pump alive");

    // Assert
    assert_eq!(down, HookAction::Forward);
    assert_eq!(h.observed.try_iter().collect::<Vec<_>>(), vec![VirtualKey::A]);
    assert!(h.injector.emitted().is_empty());
}

#[test]
fn test_live_remap_applies_to_next_key_down() {
    let h = start_with(RemapTable::new(), SUPPRESSING);

    h.keyboard.tap(VirtualKey::CAPS_LOCK).expect("pump alive");
    h.remapper.remap_key(VirtualKey::CAPS_LOCK, VirtualKey::ESCAPE);
    h.keyboard.tap(VirtualKey::CAPS_LOCK).expect("pump alive");

    assert_eq!(
        h.observed.try_iter().collect::<Vec<_>>(),
        vec![VirtualKey::CAPS_LOCK, VirtualKey::ESCAPE]
    );
    assert_eq!(h.injector.emitted_presses(), vec![VirtualKey::ESCAPE]);
}

#[test]
fn test_swapped_keys_do_not_loop() {
    // Arrange: A -> B and B -> A; a marker failure would bounce forever
    let h = start_with(
        table(&[(VirtualKey::A, VirtualKey::B), (VirtualKey::B, VirtualKey::A)]),
        SUPPRESSING,
    );

    // Act
    h.keyboard.tap(VirtualKey::A).expect("pump alive");
    h.keyboard.tap(VirtualKey::B).expect("pump alive");

    // Assert
    assert_eq!(
        h.injector.emitted_presses(),
        vec![VirtualKey::B, VirtualKey::A]
    );
    assert_eq!(
        h.observed.try_iter().collect::<Vec<_>>(),
        vec![VirtualKey::B, VirtualKey::A]
    );
    assert_eq!(h.remapper.stats().key_downs, 2);
}

#[test]
fn test_injection_failure_lets_original_key_through() {
    // Arrange
    let h = start_with(table(&[(VirtualKey::A, VirtualKey::B)]), SUPPRESSING);
    h.injector.set_should_fail(true);

    // Act
    let verdicts = h.keyboard.tap(VirtualKey::A).expect("pump alive");

    // Assert
    assert_eq!(verdicts, (HookAction::Forward, HookAction::Forward));
    assert_eq!(h.remapper.stats().injection_failures, 1);

    // and the next press works again once injection recovers
    h.injector.set_should_fail(false);
    let verdicts = h.keyboard.tap(VirtualKey::A).expect("pump alive");
    assert_eq!(verdicts, (HookAction::Suppress, HookAction::Suppress));
}

#[test]
fn test_observe_only_backend_emits_but_forwards_original() {
    let h = start_with(
        table(&[(VirtualKey::A, VirtualKey::B)]),
        HookCapabilities {
            can_suppress: false,
        },
    );

    let verdicts = h.keyboard.tap(VirtualKey::A).expect("pump alive");

    assert_eq!(h.remapper.capabilities(), Some(HookCapabilities { can_suppress: false }));
    assert_eq!(verdicts, (HookAction::Forward, HookAction::Forward));
    assert_eq!(h.injector.emitted_presses(), vec![VirtualKey::B]);
}

#[test]
fn test_stop_uninstalls_and_second_start_while_running_fails() {
    // Arrange
    let mut h = start_with(RemapTable::new(), SUPPRESSING);
    let (other, other_keyboard) = mock_hook(SUPPRESSING);

    // Act
    let second = h.remapper.start(move || Ok(other));
    h.remapper.stop().expect("stop");

    // Assert
    assert!(matches!(second, Err(HookError::AlreadyInstalled)));
    assert_eq!(other_keyboard.install_calls(), 0);
    assert!(!h.keyboard.is_installed());
    assert_eq!(h.keyboard.send(KeyEvent::key_down(VirtualKey::A)), None);
}

#[test]
fn test_dropping_remapper_releases_hook() {
    let h = start_with(RemapTable::new(), SUPPRESSING);
    let keyboard = h.keyboard.clone();
    assert!(keyboard.is_installed());

    drop(h);

    assert!(!keyboard.is_installed());
    assert_eq!(keyboard.uninstall_calls(), 1);
}

#[test]
fn test_runtime_edits_are_written_to_config_file() {
    // Arrange
    let dir = std::env::temp_dir().join(format!("keyweave_it_{}", uuid::Uuid::new_v4()));
    let path = dir.join("config.json");
    let remapper = KeyRemapper::new(RemapTable::new(), Arc::new(RecordingInjector::new()))
        .with_persister(Arc::new(JsonConfigStore::new(&path)));

    // Act
    remapper.remap_key(VirtualKey::CAPS_LOCK, VirtualKey::ESCAPE);
    remapper.remap_key(VirtualKey::A, VirtualKey::B);
    remapper.remove_mapping(VirtualKey::A);

    // Assert
    let saved = load_config(&path).expect("config written").to_table();
    assert_eq!(saved, remapper.table());
    assert_eq!(saved.get(VirtualKey::CAPS_LOCK), Some(VirtualKey::ESCAPE));
    assert!(!saved.contains(VirtualKey::A));

    std::fs::remove_dir_all(&dir).ok();
}
