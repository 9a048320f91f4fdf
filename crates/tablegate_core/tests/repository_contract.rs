//! Repository behavior against a scripted in-test driver.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tablegate_core::{
    async_trait, ColumnInfo, DbError, DbResult, Readiness, Record, RecordId, RepoError, Store,
    StoreTransaction, TableRepository, TableSchema, Value,
};
use tokio::sync::Notify;

#[derive(Default)]
struct Calls {
    column_info: AtomicUsize,
    select_all: AtomicUsize,
    select_where: AtomicUsize,
    begin: AtomicUsize,
}

#[derive(Clone, Copy)]
enum InsertOutcome {
    Ids(&'static [RecordId]),
    Fail,
}

struct ScriptedStore {
    schema: Option<TableSchema>,
    rows: Vec<Record>,
    insert: InsertOutcome,
    fail_commit: bool,
    release: Option<Arc<Notify>>,
    calls: Arc<Calls>,
    tx_log: Arc<Mutex<Vec<&'static str>>>,
}

impl ScriptedStore {
    fn new(schema: Option<TableSchema>) -> Self {
        Self {
            schema,
            rows: Vec::new(),
            insert: InsertOutcome::Ids(&[7, 8]),
            fail_commit: false,
            release: None,
            calls: Arc::default(),
            tx_log: Arc::default(),
        }
    }

    fn tx_log(&self) -> Vec<&'static str> {
        self.tx_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl Store for ScriptedStore {
    async fn column_info(&self, _table: &str) -> DbResult<TableSchema> {
        self.calls.column_info.fetch_add(1, Ordering::SeqCst);
        if let Some(release) = self.release.as_ref() {
            release.notified().await;
        }
        self.schema
            .clone()
            .ok_or_else(|| DbError::Driver("connection refused".to_string()))
    }

    async fn select_all(&self, _table: &str) -> DbResult<Vec<Record>> {
        self.calls.select_all.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.clone())
    }

    async fn select_where(
        &self,
        _table: &str,
        column: &str,
        term: &Value,
    ) -> DbResult<Vec<Record>> {
        self.calls.select_where.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .rows
            .iter()
            .filter(|row| row.get(column) == Some(term))
            .cloned()
            .collect())
    }

    async fn begin(&self) -> DbResult<Box<dyn StoreTransaction>> {
        self.calls.begin.fetch_add(1, Ordering::SeqCst);
        self.tx_log.lock().unwrap().push("begin");
        Ok(Box::new(ScriptedTransaction {
            insert: self.insert,
            fail_commit: self.fail_commit,
            log: Arc::clone(&self.tx_log),
        }))
    }
}

struct ScriptedTransaction {
    insert: InsertOutcome,
    fail_commit: bool,
    log: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl StoreTransaction for ScriptedTransaction {
    async fn insert_returning_id(
        &mut self,
        _table: &str,
        _record: &Record,
    ) -> DbResult<Vec<RecordId>> {
        self.log.lock().unwrap().push("insert");
        match self.insert {
            InsertOutcome::Ids(ids) => Ok(ids.to_vec()),
            InsertOutcome::Fail => Err(DbError::Driver(
                "duplicate key value violates unique constraint".to_string(),
            )),
        }
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.log.lock().unwrap().push("commit");
        if self.fail_commit {
            return Err(DbError::Driver("could not serialize access".to_string()));
        }
        Ok(())
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.log.lock().unwrap().push("rollback");
        Ok(())
    }
}

fn people_schema() -> TableSchema {
    [
        (
            "id",
            ColumnInfo {
                nullable: false,
                has_default: true,
                max_length: None,
            },
        ),
        (
            "name",
            ColumnInfo {
                nullable: false,
                has_default: false,
                max_length: Some(5),
            },
        ),
        (
            "created_at",
            ColumnInfo {
                nullable: false,
                has_default: true,
                max_length: None,
            },
        ),
    ]
    .into_iter()
    .collect()
}

fn repo_over(store: ScriptedStore) -> (TableRepository, Arc<Calls>, Arc<ScriptedStore>) {
    let calls = Arc::clone(&store.calls);
    let store = Arc::new(store);
    let repo = TableRepository::with_store(store.clone(), "people");
    (repo, calls, store)
}

#[tokio::test]
async fn successful_insert_commits_and_returns_first_id() {
    let (repo, _, store) = repo_over(ScriptedStore::new(Some(people_schema())));

    let id = repo.insert(&Record::new().with("name", "ada")).await.unwrap();

    assert_eq!(id, 7);
    assert_eq!(store.tx_log(), vec!["begin", "insert", "commit"]);
}

#[tokio::test]
async fn failed_insert_rolls_back_before_returning_store_error() {
    let mut scripted = ScriptedStore::new(Some(people_schema()));
    scripted.insert = InsertOutcome::Fail;
    let (repo, _, store) = repo_over(scripted);

    let err = repo
        .insert(&Record::new().with("id", 1).with("name", "ada"))
        .await
        .unwrap_err();

    match err {
        RepoError::Store(cause) => assert!(cause.to_string().contains("duplicate key")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.tx_log(), vec!["begin", "insert", "rollback"]);
}

#[tokio::test]
async fn insert_without_returned_id_is_rolled_back() {
    let mut scripted = ScriptedStore::new(Some(people_schema()));
    scripted.insert = InsertOutcome::Ids(&[]);
    let (repo, _, store) = repo_over(scripted);

    let err = repo.insert(&Record::new().with("name", "ada")).await.unwrap_err();

    assert!(matches!(err, RepoError::Store(_)));
    assert_eq!(store.tx_log(), vec!["begin", "insert", "rollback"]);
}

#[tokio::test]
async fn failed_commit_is_rolled_back_before_returning_store_error() {
    let mut scripted = ScriptedStore::new(Some(people_schema()));
    scripted.fail_commit = true;
    let (repo, _, store) = repo_over(scripted);

    let err = repo.insert(&Record::new().with("name", "ada")).await.unwrap_err();

    match err {
        RepoError::Store(cause) => assert!(cause.to_string().contains("serialize")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.tx_log(), vec!["begin", "insert", "commit", "rollback"]);
}

#[tokio::test]
async fn invalid_record_never_opens_a_transaction() {
    let (repo, calls, store) = repo_over(ScriptedStore::new(Some(people_schema())));

    let err = repo
        .insert(&Record::new().with("name", "grace hopper"))
        .await
        .unwrap_err();

    assert_eq!(
        err.violations().unwrap(),
        ["Value for name exceeds max length of 5, length was: 12".to_string()]
    );
    assert_eq!(calls.begin.load(Ordering::SeqCst), 0);
    assert!(store.tx_log().is_empty());
}

#[tokio::test]
async fn empty_schema_fails_gate_without_further_round_trips() {
    let (repo, calls, _) = repo_over(ScriptedStore::new(Some(TableSchema::new())));

    for _ in 0..3 {
        let err = repo.fetch_all().await.unwrap_err();
        assert!(matches!(err, RepoError::Schema(_)));
        let err = repo.insert(&Record::new().with("name", "ada")).await.unwrap_err();
        assert!(matches!(err, RepoError::Schema(_)));
    }

    assert_eq!(calls.column_info.load(Ordering::SeqCst), 1);
    assert_eq!(calls.select_all.load(Ordering::SeqCst), 0);
    assert_eq!(calls.begin.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn introspection_error_is_sticky_store_error() {
    let (repo, calls, _) = repo_over(ScriptedStore::new(None));

    let first = repo.fetch_all().await.unwrap_err();
    let second = repo
        .fetch_by(Some("id"), Some(&Value::Integer(1)))
        .await
        .unwrap_err();

    assert!(matches!(first, RepoError::Store(_)));
    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(calls.column_info.load(Ordering::SeqCst), 1);
    assert_eq!(calls.select_where.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn concurrent_callers_share_one_introspection() {
    let release = Arc::new(Notify::new());
    let mut scripted = ScriptedStore::new(Some(people_schema()));
    scripted.release = Some(Arc::clone(&release));
    let (repo, calls, _) = repo_over(scripted);
    let repo = Arc::new(repo);

    assert!(repo.readiness().is_pending());

    let waiters = (0..4)
        .map(|_| {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move { repo.fetch_all().await })
        })
        .collect::<Vec<_>>();

    tokio::task::yield_now().await;
    assert!(repo.readiness().is_pending());
    release.notify_one();

    for waiter in waiters {
        assert!(waiter.await.unwrap().unwrap().is_empty());
    }
    assert_eq!(calls.column_info.load(Ordering::SeqCst), 1);
    assert!(matches!(repo.readiness(), Readiness::Ready(schema) if schema.len() == 3));
}

#[tokio::test]
async fn fetch_by_filters_and_revives_timestamps() {
    let mut scripted = ScriptedStore::new(Some(people_schema()));
    scripted.rows = vec![
        Record::new()
            .with("id", 1)
            .with("name", "ada")
            .with("created_at", 1_700_000_000_000_i64),
        Record::new()
            .with("id", 2)
            .with("name", "alan")
            .with("created_at", "2024-01-02 03:04:05"),
    ];
    let (repo, calls, _) = repo_over(scripted);

    let rows = repo
        .fetch_by(Some("name"), Some(&Value::from("alan")))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id"), Some(&Value::Integer(2)));
    assert!(rows[0].get("created_at").and_then(Value::as_timestamp).is_some());

    let all = repo.fetch_all().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(
        all[0]
            .get("created_at")
            .and_then(Value::as_timestamp)
            .map(|ts| ts.timestamp_millis()),
        Some(1_700_000_000_000)
    );

    assert_eq!(calls.select_where.load(Ordering::SeqCst), 1);
    assert_eq!(calls.select_all.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn corrupt_timestamp_is_reported_as_store_error() {
    let mut scripted = ScriptedStore::new(Some(people_schema()));
    scripted.rows = vec![Record::new().with("id", 1).with("updated_at", "not a date")];
    let (repo, _, _) = repo_over(scripted);

    let err = repo.fetch_all().await.unwrap_err();
    match err {
        RepoError::Store(cause) => assert!(matches!(*cause, DbError::InvalidData(_))),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn validate_reports_without_writing() {
    let (repo, calls, _) = repo_over(ScriptedStore::new(Some(people_schema())));

    let violations = repo.validate(&Record::new().with("id", 3)).await.unwrap();

    assert_eq!(violations, vec!["Missing values: name".to_string()]);
    assert_eq!(calls.begin.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn dropping_repository_releases_pending_introspection() {
    let release = Arc::new(Notify::new());
    let mut scripted = ScriptedStore::new(Some(people_schema()));
    scripted.release = Some(Arc::clone(&release));
    let (repo, calls, store) = repo_over(scripted);

    tokio::task::yield_now().await;
    assert_eq!(calls.column_info.load(Ordering::SeqCst), 1);
    assert!(Arc::strong_count(&store) > 1);

    drop(repo);
    for _ in 0..10 {
        if Arc::strong_count(&store) == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(Arc::strong_count(&store), 1);
}
