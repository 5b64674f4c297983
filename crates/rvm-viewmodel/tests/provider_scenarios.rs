//! Provider scenarios: fresh starts, restores, configuration changes, and
//! backgrounding, run against a temporary directory.

use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use rvm_persistence::{decode, encode};
use rvm_viewmodel::{
    FileStore, Lifecycle, LifecycleEvent, MemoryStore, OwnerDescriptor, PauseReason,
    ProviderMode, StateCell, StateRecord, StateValue, StorageConfig, ViewModel, ViewModelError,
    ViewModelProvider, ViewModelRegistry, ViewModelState,
};
use tempfile::tempdir;

const OWNER: &str = "app::screens::Counter";

#[derive(Default)]
struct CounterViewModel {
    state: ViewModelState,
}

impl ViewModel for CounterViewModel {
    fn state(&self) -> &ViewModelState {
        &self.state
    }
}

impl CounterViewModel {
    fn x(&self) -> StateCell<i32> {
        self.state.get_or_create("x").unwrap()
    }
}

#[derive(Default)]
struct NotesViewModel {
    state: ViewModelState,
}

impl ViewModel for NotesViewModel {
    fn state(&self) -> &ViewModelState {
        &self.state
    }
}

struct Owner {
    lifecycle: Rc<Lifecycle>,
    provider: ViewModelProvider,
}

fn launch(registry: &ViewModelRegistry, saved_instance_state: bool) -> Owner {
    launch_with(registry, OwnerDescriptor::new(OWNER), saved_instance_state)
}

fn launch_with(
    registry: &ViewModelRegistry,
    owner: OwnerDescriptor,
    saved_instance_state: bool,
) -> Owner {
    let lifecycle = Rc::new(Lifecycle::new());
    let provider =
        ViewModelProvider::new(registry, owner, saved_instance_state, Some(lifecycle.clone()))
            .unwrap();
    lifecycle.dispatch(LifecycleEvent::Started).unwrap();
    lifecycle.dispatch(LifecycleEvent::Resumed).unwrap();
    Owner {
        lifecycle,
        provider,
    }
}

fn decode_file(path: &Path) -> StateRecord {
    decode(&std::fs::read(path).unwrap()).unwrap()
}

#[test]
fn background_pause_saves_deferred_writes() {
    let dir = tempdir().unwrap();
    let registry = ViewModelRegistry::new(dir.path());
    let owner = launch(&registry, false);
    assert_eq!(owner.provider.mode(), ProviderMode::Fresh);

    let vm = owner.provider.get::<CounterViewModel>().unwrap();
    vm.x().set(1).unwrap();

    let file = registry.state_file::<CounterViewModel>(OWNER);
    assert!(!file.exists());

    owner
        .lifecycle
        .dispatch(LifecycleEvent::Paused(PauseReason::Backgrounded))
        .unwrap();

    let mut expected = StateRecord::new();
    expected.insert("x", 1_i32);
    assert_eq!(decode_file(&file), expected);
}

#[test]
fn configuration_change_keeps_live_instance_without_saving() {
    let dir = tempdir().unwrap();
    let registry = ViewModelRegistry::new(dir.path());
    let first = launch(&registry, false);

    let vm = first.provider.get::<CounterViewModel>().unwrap();
    vm.x().set(1).unwrap();

    first
        .lifecycle
        .dispatch(LifecycleEvent::Paused(PauseReason::ConfigurationChange))
        .unwrap();
    first
        .lifecycle
        .dispatch(LifecycleEvent::Stopped(PauseReason::ConfigurationChange))
        .unwrap();
    first.lifecycle.dispatch(LifecycleEvent::Destroyed).unwrap();

    let file = registry.state_file::<CounterViewModel>(OWNER);
    assert!(!file.exists());

    let second = launch(&registry, true);
    assert_eq!(second.provider.mode(), ProviderMode::Restoring);
    let again = second.provider.get::<CounterViewModel>().unwrap();

    assert!(Rc::ptr_eq(&vm, &again));
    assert_eq!(again.x().get(), Some(1));
    assert!(!file.exists());
}

#[test]
fn fresh_provider_deletes_prior_state() {
    let dir = tempdir().unwrap();
    let registry = ViewModelRegistry::new(dir.path());

    let owner_dir = registry.owner_dir(OWNER);
    std::fs::create_dir_all(&owner_dir).unwrap();
    let mut saved = StateRecord::new();
    saved.insert("x", 5_i32);
    let counter_file = registry.state_file::<CounterViewModel>(OWNER);
    let notes_file = registry.state_file::<NotesViewModel>(OWNER);
    std::fs::write(&counter_file, encode(&saved).unwrap()).unwrap();
    std::fs::write(&notes_file, encode(&saved).unwrap()).unwrap();

    let owner = launch(&registry, false);
    assert!(!counter_file.exists());
    assert!(!notes_file.exists());

    let vm = owner.provider.get::<CounterViewModel>().unwrap();
    assert_eq!(vm.x().get(), None);
    assert!(vm.state().snapshot().unwrap().is_empty());
}

#[test]
fn fresh_provider_evicts_live_view_models() {
    let dir = tempdir().unwrap();
    let registry = ViewModelRegistry::new(dir.path());
    let first = launch(&registry, false);
    let old = first.provider.get::<CounterViewModel>().unwrap();
    let old_x = old.x();
    old_x.set(3).unwrap();

    let second = launch(&registry, false);
    let new = second.provider.get::<CounterViewModel>().unwrap();

    assert!(!Rc::ptr_eq(&old, &new));
    assert_eq!(new.x().get(), None);

    // The evicted cell keeps working in memory but never reaches disk.
    old_x.set(4).unwrap();
    assert_eq!(old_x.get(), Some(4));
    assert!(matches!(
        old.state().save_state(),
        Err(ViewModelError::Detached)
    ));
}

#[test]
fn restart_after_process_death_restores_from_disk() {
    let dir = tempdir().unwrap();
    let file;
    {
        let registry = ViewModelRegistry::new(dir.path());
        let owner = launch(&registry, false);
        let vm = owner.provider.get::<CounterViewModel>().unwrap();
        vm.x().set(42).unwrap();
        owner
            .lifecycle
            .dispatch(LifecycleEvent::Stopped(PauseReason::Backgrounded))
            .unwrap();
        file = registry.state_file::<CounterViewModel>(OWNER);
    }

    // A new registry stands in for a new process.
    let registry = ViewModelRegistry::new(dir.path());
    let owner = launch(&registry, true);
    let vm = owner.provider.get::<CounterViewModel>().unwrap();

    assert_eq!(vm.x().get(), Some(42));
    assert_eq!(vm.state().file_path(), Some(file));
}

#[test]
fn every_view_model_of_owner_is_saved_on_pause() {
    let dir = tempdir().unwrap();
    let registry = ViewModelRegistry::new(dir.path());
    let owner = launch(&registry, false);

    let counter = owner.provider.get::<CounterViewModel>().unwrap();
    let notes = owner.provider.get::<NotesViewModel>().unwrap();
    counter.x().set(2).unwrap();
    notes
        .state()
        .get_or_create::<String>("draft")
        .unwrap()
        .set("hello".to_string())
        .unwrap();
    assert_eq!(registry.view_model_count(OWNER), 2);

    owner
        .lifecycle
        .dispatch(LifecycleEvent::Paused(PauseReason::Backgrounded))
        .unwrap();

    let notes_file = registry.state_file::<NotesViewModel>(OWNER);
    assert_eq!(
        decode_file(&notes_file).get("draft"),
        Some(&StateValue::from("hello"))
    );
    assert!(registry.state_file::<CounterViewModel>(OWNER).exists());
}

#[test]
fn writes_while_backgrounded_go_straight_to_disk() {
    let dir = tempdir().unwrap();
    let registry = ViewModelRegistry::new(dir.path());
    let owner = launch(&registry, false);
    let vm = owner.provider.get::<CounterViewModel>().unwrap();

    owner
        .lifecycle
        .dispatch(LifecycleEvent::Paused(PauseReason::Backgrounded))
        .unwrap();
    vm.x().set(8).unwrap();

    let file = registry.state_file::<CounterViewModel>(OWNER);
    assert_eq!(decode_file(&file).get("x"), Some(&StateValue::Int(8)));

    owner.lifecycle.dispatch(LifecycleEvent::Resumed).unwrap();
    vm.x().set(9).unwrap();
    assert_eq!(decode_file(&file).get("x"), Some(&StateValue::Int(8)));
}

#[test]
fn launch_arguments_seed_every_view_model() {
    let dir = tempdir().unwrap();
    let registry = ViewModelRegistry::new(dir.path());
    let mut arguments = StateRecord::new();
    arguments.insert("x", 11_i32);

    let owner = launch_with(
        &registry,
        OwnerDescriptor::new(OWNER).with_launch_arguments(arguments),
        false,
    );
    let vm = owner.provider.get::<CounterViewModel>().unwrap();
    assert_eq!(vm.x().get(), Some(11));
}

#[test]
fn owners_are_isolated_by_type() {
    let dir = tempdir().unwrap();
    let registry = ViewModelRegistry::new(dir.path());
    let counter_screen = launch(&registry, false);
    let other_screen = launch_with(&registry, OwnerDescriptor::new("app::screens::Other"), false);

    let a = counter_screen.provider.get::<CounterViewModel>().unwrap();
    let b = other_screen.provider.get::<CounterViewModel>().unwrap();
    assert!(!Rc::ptr_eq(&a, &b));
    assert_eq!(registry.owner_count(), 2);

    // A fresh start of one owner type leaves the other alone.
    let _restarted = launch_with(&registry, OwnerDescriptor::new("app::screens::Other"), false);
    assert!(registry.contains::<CounterViewModel>(OWNER));
    assert!(!registry.contains::<CounterViewModel>("app::screens::Other"));
}

#[test]
fn background_save_failure_surfaces_through_dispatch() {
    let store = Arc::new(MemoryStore::new());
    let registry = ViewModelRegistry::with_parts("/data", StorageConfig::default(), store.clone());
    let owner = launch(&registry, false);
    let vm = owner.provider.get::<CounterViewModel>().unwrap();
    vm.x().set(1).unwrap();

    store.set_fail_writes(true);
    let err = owner
        .lifecycle
        .dispatch(LifecycleEvent::Paused(PauseReason::Backgrounded))
        .unwrap_err();
    assert!(matches!(err, ViewModelError::Save(_)));
}

#[test]
fn failed_fresh_start_keeps_previous_view_models() {
    let store = Arc::new(MemoryStore::new());
    let registry = ViewModelRegistry::with_parts("/data", StorageConfig::default(), store.clone());
    let owner = launch(&registry, false);
    let vm = owner.provider.get::<CounterViewModel>().unwrap();
    vm.x().set(5).unwrap();
    vm.state().save_state().unwrap();

    store.set_fail_writes(true);
    let err = ViewModelProvider::new(&registry, OwnerDescriptor::new(OWNER), false, None)
        .err()
        .unwrap();
    assert!(matches!(err, ViewModelError::ClearState { .. }));

    // Nothing was deleted, so nothing was evicted or detached.
    let file = registry.state_file::<CounterViewModel>(OWNER);
    assert!(store.contents(&file).is_some());
    assert!(registry.contains::<CounterViewModel>(OWNER));

    store.set_fail_writes(false);
    vm.x().set(6).unwrap();
    vm.state().save_state().unwrap();
    let saved = decode(&store.contents(&file).unwrap()).unwrap();
    assert_eq!(saved.get("x"), Some(&StateValue::Int(6)));
}

#[test]
fn file_store_layout_uses_prefixed_names() {
    let dir = tempdir().unwrap();
    let registry = ViewModelRegistry::with_parts(
        dir.path(),
        StorageConfig::default(),
        Arc::new(FileStore::new()),
    );
    let file = registry.state_file::<CounterViewModel>(OWNER);

    let owner_dir = file.parent().unwrap();
    assert_eq!(
        owner_dir.file_name().unwrap().to_str().unwrap(),
        ".provider-app.screens.Counter"
    );
    assert!(
        file.file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with(".state-provider_scenarios.")
    );
}
