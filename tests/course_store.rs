//! CourseStore actions, queries and persistence.

use std::future::ready;

use ecosystia::models::{Course, CourseUpdate, NewCourse};
use ecosystia::persist::{Storage, StorageScope, Storages};
use ecosystia::store::{COURSE_STORE_KEY, CourseStore};

fn course(id: &str, title: &str, category: &str, status: &str) -> Course {
    Course {
        id: id.into(),
        title: title.into(),
        description: format!("{} for cooperative members", title),
        category: category.into(),
        status: status.into(),
        ..Default::default()
    }
}

fn catalogue() -> Vec<Course> {
    vec![
        course("1", "Bookkeeping basics", "finance", "published"),
        course("2", "Market gardening", "agriculture", "draft"),
        course("3", "Microcredit", "finance", "Published"),
    ]
}

async fn loaded_store(storages: &Storages) -> CourseStore {
    let mut store = CourseStore::new(storages);
    store
        .fetch_courses(ready(Ok::<_, String>(catalogue())))
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn test_fetch_courses_populates_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let storages = Storages::open(dir.path()).unwrap();

    let store = loaded_store(&storages).await;
    assert_eq!(store.courses().len(), 3);
    assert!(!store.loading());
    assert!(store.error().is_none());

    let raw = storages
        .get(StorageScope::Local)
        .get_item(COURSE_STORE_KEY)
        .unwrap()
        .unwrap();
    assert!(raw.contains("Market gardening"));

    let reopened = Storages::open(dir.path()).unwrap();
    let restored = CourseStore::new(&reopened);
    assert_eq!(restored.courses(), store.courses());
}

#[tokio::test]
async fn test_fetch_failure_records_error_and_keeps_list() {
    let storages = Storages::in_memory();
    let mut store = loaded_store(&storages).await;

    let err = store
        .fetch_courses(ready(Err::<Vec<Course>, _>("catalogue offline".to_string())))
        .await
        .unwrap_err();
    assert_eq!(err, "catalogue offline");
    assert_eq!(store.error(), Some("catalogue offline"));
    assert!(!store.loading());
    assert_eq!(store.courses().len(), 3);

    store.clear_error();
    assert!(store.error().is_none());
}

#[tokio::test]
async fn test_add_update_delete() {
    let storages = Storages::in_memory();
    let mut store = loaded_store(&storages).await;

    let first = store.add_course(NewCourse {
        title: "Solar maintenance".into(),
        category: "energy".into(),
        status: "draft".into(),
        ..Default::default()
    });
    let second = store.add_course(NewCourse {
        title: "Water pumps".into(),
        category: "energy".into(),
        status: "draft".into(),
        ..Default::default()
    });
    assert_ne!(first.id, second.id);
    assert_eq!(store.courses()[0].id, second.id);
    assert_eq!(store.courses().len(), 5);

    let updated = store
        .update_course(
            &first.id,
            &CourseUpdate {
                status: Some("published".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.title, "Solar maintenance");
    assert_eq!(store.get_course_by_id(&first.id).unwrap().status, "published");
    assert!(store.update_course("missing", &CourseUpdate::default()).is_none());

    assert!(store.delete_course(&first.id));
    assert!(!store.delete_course(&first.id));
    assert_eq!(store.courses().len(), 4);

    // Every action is already on disk
    let restored = CourseStore::new(&storages);
    assert_eq!(restored.courses().len(), 4);
    assert!(restored.get_course_by_id(&second.id).is_some());
}

#[tokio::test]
async fn test_queries_and_stats() {
    let storages = Storages::in_memory();
    let store = loaded_store(&storages).await;

    assert_eq!(store.search_courses(" ").len(), 3);
    assert_eq!(store.search_courses("GARDEN")[0].id, "2");
    assert_eq!(store.search_courses("finance").len(), 2);
    assert_eq!(store.search_courses("cooperative").len(), 3);
    assert!(store.search_courses("welding").is_empty());

    assert_eq!(store.filter_by_status("published").len(), 2);
    assert_eq!(store.filter_by_category("agriculture")[0].id, "2");
    assert!(store.filter_by_category("Finance").is_empty());

    let stats = store.stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.published, 2);
    assert_eq!(stats.draft, 1);
    assert_eq!(stats.by_category["finance"], 2);
    assert_eq!(stats.by_category["agriculture"], 1);
}

#[tokio::test]
async fn test_reset_clears_persisted_list() {
    let storages = Storages::in_memory();
    let mut store = loaded_store(&storages).await;

    store.reset();
    assert!(store.courses().is_empty());
    assert!(CourseStore::new(&storages).courses().is_empty());
}
