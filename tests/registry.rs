use datapilot_client::domain::{Dataset, DatasetId};
use datapilot_client::registry::{DatasetRegistry, RefreshPolicy};

fn dataset(id: &str, name: &str, rows: u64, columns: u64) -> Dataset {
    Dataset {
        id: DatasetId::from(id),
        name: name.to_string(),
        row_count: rows,
        column_count: columns,
        preview: Vec::new(),
    }
}

#[test]
fn first_non_empty_list_selects_newest() {
    let mut registry = DatasetRegistry::default();
    registry.replace_all(vec![
        dataset("d1", "sales.csv", 120, 5),
        dataset("d2", "costs.csv", 40, 3),
    ]);
    assert_eq!(registry.current_selection(), Some(&DatasetId::from("d2")));
    assert_eq!(registry.len(), 2);
}

#[test]
fn empty_list_leaves_selection_unset() {
    let mut registry = DatasetRegistry::default();
    registry.replace_all(Vec::new());
    assert_eq!(registry.current_selection(), None);

    registry.replace_all(vec![dataset("d1", "sales.csv", 120, 5)]);
    assert_eq!(registry.current_selection(), Some(&DatasetId::from("d1")));
}

#[test]
fn existing_selection_survives_replacement() {
    let mut registry = DatasetRegistry::default();
    registry.replace_all(vec![dataset("d1", "sales.csv", 120, 5)]);
    registry.replace_all(vec![
        dataset("d1", "sales.csv", 120, 5),
        dataset("d2", "costs.csv", 40, 3),
    ]);
    assert_eq!(registry.current_selection(), Some(&DatasetId::from("d1")));
}

#[test]
fn dangling_selection_is_not_repaired() {
    let mut registry = DatasetRegistry::default();
    registry.select(DatasetId::from("gone"));
    registry.replace_all(vec![dataset("d2", "costs.csv", 40, 3)]);

    assert_eq!(registry.current_selection(), Some(&DatasetId::from("gone")));
    assert!(registry.selected_dataset().is_none());
}

#[test]
fn select_accepts_unknown_ids_and_is_idempotent() {
    let mut registry = DatasetRegistry::default();
    registry.select(DatasetId::from("d9"));
    registry.select(DatasetId::from("d9"));
    assert_eq!(registry.current_selection(), Some(&DatasetId::from("d9")));

    registry.replace_all(vec![dataset("d9", "late.csv", 1, 1)]);
    registry.replace_all(vec![dataset("d9", "late.csv", 1, 1)]);
    assert_eq!(registry.selected_dataset().map(|d| d.name.as_str()), Some("late.csv"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn totals_rows_of_current_list() {
    let mut registry = DatasetRegistry::default();
    registry.replace_all(vec![
        dataset("d1", "sales.csv", 120, 5),
        dataset("d2", "costs.csv", 40, 3),
    ]);
    assert_eq!(registry.total_rows(), 160);
}

#[test]
fn loading_tracks_outstanding_refreshes() {
    let mut registry = DatasetRegistry::default();
    assert!(!registry.is_loading());

    let first = registry.begin_refresh();
    let second = registry.begin_refresh();
    assert!(registry.is_loading());

    registry.abandon_refresh(first);
    assert!(registry.is_loading());
    assert!(registry.complete_refresh(second, vec![dataset("d1", "sales.csv", 1, 1)]));
    assert!(!registry.is_loading());
}

#[test]
fn last_write_wins_applies_late_stale_result() {
    let mut registry = DatasetRegistry::new(RefreshPolicy::LastWriteWins);
    let older = registry.begin_refresh();
    let newer = registry.begin_refresh();

    assert!(registry.complete_refresh(
        newer,
        vec![
            dataset("d1", "sales.csv", 1, 1),
            dataset("d2", "costs.csv", 1, 1),
        ],
    ));
    assert!(registry.complete_refresh(older, vec![dataset("d1", "sales.csv", 1, 1)]));

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.current_selection(), Some(&DatasetId::from("d2")));
}

#[test]
fn drop_stale_discards_older_completion() {
    let mut registry = DatasetRegistry::new(RefreshPolicy::DropStale);
    let older = registry.begin_refresh();
    let newer = registry.begin_refresh();
    assert!(older.sequence() < newer.sequence());

    assert!(registry.complete_refresh(
        newer,
        vec![
            dataset("d1", "sales.csv", 1, 1),
            dataset("d2", "costs.csv", 1, 1),
        ],
    ));
    assert!(!registry.complete_refresh(older, vec![dataset("d1", "sales.csv", 1, 1)]));

    assert_eq!(registry.len(), 2);
    assert!(!registry.is_loading());
}
