use chrono::{TimeZone, Utc};
use lexharvest_common::DocumentRecord;
use lexharvest_store::{Corpus, CorpusKey, CorpusRegistry, CorpusStore, SnapshotState, merge};
use std::fs;

fn rec(id: &str, title: &str) -> DocumentRecord {
    DocumentRecord::new(id, title, format!("https://lex.uz/docs/{id}"))
}

const LANGS: [&str; 4] = ["uz-Cyrl", "uz", "ru", "en"];

#[test]
fn save_then_load_preserves_order_and_unicode() {
    let dir = tempfile::tempdir().unwrap();
    let store = CorpusStore::new(dir.path());
    let key = CorpusKey::new("laws", "uz-Cyrl");
    let corpus = Corpus::new(vec![
        rec("2", "Ўзбекистон Республикасининг Қонуни"),
        rec("1", "О внесении изменений"),
    ]);

    let path = store.save(&key, &corpus).unwrap();
    assert_eq!(path, dir.path().join("laws_uz_Cyrl.json"));

    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.contains("Ўзбекистон"), "titles must be written unescaped");
    assert_eq!(store.load(&key), corpus);
}

#[test]
fn missing_snapshot_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = CorpusStore::new(dir.path().join("not-yet"));
    let key = CorpusKey::new("codes", "ru");
    assert!(!store.exists(&key));
    assert!(store.load(&key).is_empty());
}

#[test]
fn corrupt_snapshot_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = CorpusStore::new(dir.path());
    let key = CorpusKey::new("codes", "ru");
    fs::write(store.path_for(&key), "[{\"id\": \"1\", ").unwrap();
    assert!(store.load(&key).is_empty());
}

#[test]
fn snapshot_state_tells_missing_corrupt_and_intact_apart() {
    let dir = tempfile::tempdir().unwrap();
    let store = CorpusStore::new(dir.path());
    assert_eq!(store.data_dir(), dir.path());

    let missing = CorpusKey::new("laws", "en");
    assert_eq!(store.load_snapshot(&missing).1, SnapshotState::Missing);

    let corrupt = CorpusKey::new("laws", "ru");
    fs::write(store.path_for(&corrupt), "{not json").unwrap();
    assert_eq!(store.load_snapshot(&corrupt).1, SnapshotState::Corrupt);

    let empty = CorpusKey::new("laws", "uz");
    store.save(&empty, &Corpus::default()).unwrap();
    let (corpus, state) = store.load_snapshot(&empty);
    assert!(corpus.is_empty());
    assert!(state.is_intact());
}

#[test]
fn save_creates_data_dir_and_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let store = CorpusStore::new(&data);
    store
        .save(&CorpusKey::new("laws", "en"), &Corpus::new(vec![rec("1", "a")]))
        .unwrap();

    let names: Vec<String> = fs::read_dir(&data)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["laws_en.json"]);
}

#[test]
fn merged_batch_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let store = CorpusStore::new(dir.path());
    let key = CorpusKey::new("president", "uz");

    let first = merge(store.load(&key), vec![rec("10", "a"), rec("11", "b")]);
    store.save(&key, &first.corpus).unwrap();

    let second = merge(store.load(&key), vec![rec("12", "c"), rec("11", "b")]);
    assert_eq!(second.added, 1);
    store.save(&key, &second.corpus).unwrap();

    let ids: Vec<String> = store
        .load(&key)
        .into_records()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, ["12", "10", "11"]);
}

#[test]
fn registry_lists_snapshots_and_skips_other_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = CorpusStore::new(dir.path());
    store
        .save(&CorpusKey::new("laws", "uz-Cyrl"), &Corpus::new(vec![rec("1", "a"), rec("2", "b")]))
        .unwrap();
    store
        .save(&CorpusKey::new("codes", "ru"), &Corpus::new(vec![rec("3", "c")]))
        .unwrap();
    fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();
    fs::write(dir.path().join("metadata.json"), "{}").unwrap();

    let registry =
        CorpusRegistry::new(dir.path(), LANGS).ignoring(&dir.path().join("metadata.json"));
    let entries = registry.entries().unwrap();

    let keys: Vec<String> = entries.iter().map(|e| e.key.to_string()).collect();
    assert_eq!(keys, ["codes/ru", "laws/uz-Cyrl"]);
    assert_eq!(entries[0].count, 1);
    assert_eq!(entries[1].count, 2);
}

#[test]
fn registry_of_missing_dir_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let registry = CorpusRegistry::new(dir.path().join("absent"), LANGS);
    assert!(registry.entries().unwrap().is_empty());
}

#[test]
fn summary_file_groups_by_category_then_language() {
    let dir = tempfile::tempdir().unwrap();
    let store = CorpusStore::new(dir.path());
    store
        .save(&CorpusKey::new("laws", "ru"), &Corpus::new(vec![rec("1", "a")]))
        .unwrap();
    store
        .save(&CorpusKey::new("laws", "en"), &Corpus::new(vec![rec("2", "b"), rec("3", "c")]))
        .unwrap();

    let summary_path = dir.path().join("metadata.json");
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let summary = CorpusRegistry::new(dir.path(), LANGS)
        .ignoring(&summary_path)
        .write_summary(&summary_path, now)
        .unwrap();
    assert_eq!(summary.total_records(), 3);

    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&summary_path).unwrap()).unwrap();
    assert_eq!(value["last_updated"], "2024-03-01T12:00:00Z");
    assert_eq!(value["document_types"]["laws"]["en"]["count"], 2);
    assert_eq!(value["document_types"]["laws"]["ru"]["count"], 1);
    assert!(
        value["document_types"]["laws"]["ru"]["file"]
            .as_str()
            .unwrap()
            .ends_with("laws_ru.json")
    );

    // Rewriting must not count the summary itself as a corpus.
    let again = CorpusRegistry::new(dir.path(), LANGS)
        .ignoring(&summary_path)
        .summary(now)
        .unwrap();
    assert_eq!(again.document_types.len(), 1);
}
