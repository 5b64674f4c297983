//! Integration tests for view model state and cells against a real directory.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use rvm_persistence::{decode, encode};
use rvm_viewmodel::{
    Bytes, FileStore, MemoryStore, StateCell, StateRecord, StateValue, ViewModel, ViewModelError,
    ViewModelState,
};
use tempfile::tempdir;

#[derive(Default)]
struct FormViewModel {
    state: ViewModelState,
}

impl ViewModel for FormViewModel {
    fn state(&self) -> &ViewModelState {
        &self.state
    }
}

impl FormViewModel {
    fn name(&self) -> StateCell<String> {
        self.state
            .get_or_create_with("name", String::from("anonymous"))
            .unwrap()
    }

    fn age(&self) -> StateCell<i32> {
        self.state.get_or_create("age").unwrap()
    }
}

fn read_record(path: &Path) -> StateRecord {
    decode(&std::fs::read(path).unwrap()).unwrap()
}

fn form(store: Arc<FileStore>, file: PathBuf, restore: bool) -> FormViewModel {
    let vm = FormViewModel::default();
    vm.state().initialize(store, file, restore, None).unwrap();
    vm
}

#[test]
fn get_or_create_returns_same_cell_and_keeps_first_value() {
    let dir = tempdir().unwrap();
    let vm = form(Arc::new(FileStore::new()), dir.path().join("form"), false);

    let a = vm.state().get_or_create_with("k", 1_i64).unwrap();
    let b = vm.state().get_or_create_with("k", 2_i64).unwrap();

    assert!(a.ptr_eq(&b));
    assert_eq!(b.get(), Some(1));
    assert_eq!(vm.state().cached_keys(), vec!["k".to_string()]);
}

#[test]
fn set_while_save_required_writes_file() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("form");
    let vm = form(Arc::new(FileStore::new()), file.clone(), false);

    vm.name().set("ada".to_string()).unwrap();

    let record = read_record(&file);
    assert_eq!(record.get("name"), Some(&StateValue::from("ada")));
}

#[test]
fn set_while_save_deferred_leaves_file_unchanged() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("form");
    let vm = form(Arc::new(FileStore::new()), file.clone(), false);

    vm.name().set("ada".to_string()).unwrap();
    let before = std::fs::read(&file).unwrap();

    vm.state().set_save_required(false);
    vm.name().set("grace".to_string()).unwrap();
    vm.age().set(36).unwrap();

    assert_eq!(std::fs::read(&file).unwrap(), before);
    assert_eq!(vm.name().get().as_deref(), Some("grace"));

    vm.state().save_state().unwrap();
    let record = read_record(&file);
    assert_eq!(record.get("name"), Some(&StateValue::from("grace")));
    assert_eq!(record.get("age"), Some(&StateValue::Int(36)));
}

#[test]
fn restore_yields_saved_content_exactly() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("form");
    let mut saved = StateRecord::new();
    saved.insert("name", "lin");
    saved.insert("age", 41_i32);
    saved.insert("tags", StateValue::List(vec!["a".into(), "b".into()]));
    std::fs::write(&file, encode(&saved).unwrap()).unwrap();

    let vm = form(Arc::new(FileStore::new()), file, true);

    assert_eq!(vm.state().snapshot().unwrap(), saved);
    assert_eq!(vm.name().get().as_deref(), Some("lin"));
    assert_eq!(vm.age().get(), Some(41));
    let tags: StateCell<Vec<String>> = vm.state().get_or_create("tags").unwrap();
    assert_eq!(tags.get(), Some(vec!["a".to_string(), "b".to_string()]));
}

#[test]
fn binary_cell_survives_restore() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("form");
    let vm = form(Arc::new(FileStore::new()), file.clone(), false);
    let avatar: StateCell<Bytes> = vm.state().get_or_create("avatar").unwrap();
    avatar.set(Bytes::from(vec![0x89, 0x50, 0x4e, 0x47])).unwrap();

    assert_eq!(
        read_record(&file).get("avatar"),
        Some(&StateValue::Bytes(vec![0x89, 0x50, 0x4e, 0x47]))
    );

    let restored = form(Arc::new(FileStore::new()), file, true);
    let avatar: StateCell<Bytes> = restored.state().get_or_create("avatar").unwrap();
    assert_eq!(avatar.get(), Some(Bytes(vec![0x89, 0x50, 0x4e, 0x47])));
}

#[test]
fn restored_value_wins_over_initial_value() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("form");
    let mut saved = StateRecord::new();
    saved.insert("name", "restored");
    std::fs::write(&file, encode(&saved).unwrap()).unwrap();

    let vm = form(Arc::new(FileStore::new()), file, true);
    let name = vm
        .state()
        .get_or_create_with("name", String::from("new default"))
        .unwrap();

    assert_eq!(name.get().as_deref(), Some("restored"));
}

#[test]
fn restored_value_of_wrong_type_is_rejected() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("form");
    let mut saved = StateRecord::new();
    saved.insert("age", "forty");
    std::fs::write(&file, encode(&saved).unwrap()).unwrap();

    let vm = form(Arc::new(FileStore::new()), file, true);
    let err = vm.state().get_or_create::<i32>("age").unwrap_err();
    assert!(matches!(err, ViewModelError::TypeMismatch { key, .. } if key == "age"));
}

#[test]
fn corrupt_file_falls_back_to_defaults() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("form");
    std::fs::write(&file, b"not a state file").unwrap();

    let mut defaults = StateRecord::new();
    defaults.insert("age", 7_i32);

    let vm = FormViewModel::default();
    vm.state()
        .initialize(Arc::new(FileStore::new()), file, true, Some(&defaults))
        .unwrap();

    assert_eq!(vm.state().snapshot().unwrap(), defaults);
    assert_eq!(vm.age().get(), Some(7));
}

#[test]
fn unreadable_path_falls_back_to_defaults() {
    // The state path is a directory, so the read fails with an I/O error.
    let dir = tempdir().unwrap();
    let mut defaults = StateRecord::new();
    defaults.insert("age", 9_i32);

    let vm = FormViewModel::default();
    vm.state()
        .initialize(
            Arc::new(FileStore::new()),
            dir.path().to_path_buf(),
            true,
            Some(&defaults),
        )
        .unwrap();

    assert_eq!(vm.age().get(), Some(9));
}

#[test]
fn restored_record_overlays_defaults() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("form");
    let mut saved = StateRecord::new();
    saved.insert("name", "saved");
    std::fs::write(&file, encode(&saved).unwrap()).unwrap();

    let mut defaults = StateRecord::new();
    defaults.insert("name", "launch");
    defaults.insert("age", 3_i32);

    let vm = FormViewModel::default();
    vm.state()
        .initialize(Arc::new(FileStore::new()), file, true, Some(&defaults))
        .unwrap();

    assert_eq!(vm.name().get().as_deref(), Some("saved"));
    assert_eq!(vm.age().get(), Some(3));
}

#[test]
fn save_failure_propagates_and_skips_observers() {
    let store = Arc::new(MemoryStore::new());
    let vm = FormViewModel::default();
    vm.state()
        .initialize(store.clone(), PathBuf::from("/vm/form"), false, None)
        .unwrap();

    let name = vm.name();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let _sub = {
        let seen = Rc::clone(&seen);
        name.subscribe(move |v: &String| seen.borrow_mut().push(v.clone()))
    };

    store.set_fail_writes(true);
    let err = name.set("lost".to_string()).unwrap_err();

    assert!(matches!(err, ViewModelError::Save(_)));
    assert_eq!(name.get().as_deref(), Some("anonymous"));
    assert_eq!(name.version(), 0);
    assert!(seen.borrow().is_empty());
}

#[test]
fn observers_see_value_after_it_is_saved() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("form");
    let vm = form(Arc::new(FileStore::new()), file.clone(), false);

    let on_disk = Rc::new(RefCell::new(None));
    let _sub = {
        let on_disk = Rc::clone(&on_disk);
        let file = file.clone();
        vm.age().subscribe(move |_: &i32| {
            *on_disk.borrow_mut() = read_record(&file).get("age").cloned();
        })
    };

    vm.age().set(12).unwrap();
    assert_eq!(*on_disk.borrow(), Some(StateValue::Int(12)));
}

#[tokio::test]
async fn prepared_save_commits_on_blocking_pool() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("form");
    let vm = form(Arc::new(FileStore::new()), file.clone(), false);
    vm.state().set_save_required(false);
    vm.age().set(99).unwrap();

    let pending = vm.state().prepare_save().unwrap();
    vm.age().set(100).unwrap();
    pending.commit_async().await.unwrap();

    assert_eq!(read_record(&file).get("age"), Some(&StateValue::Int(99)));
}
