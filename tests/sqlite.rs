use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use krino::{
    Adapter, BaseCondition, Condition, Config, Engine, Error, NoSum, Row, SumFields,
    adapters::sqlite::SqliteAdapter, guard::Ident, plan::Statement,
};
use metrics::{
    Counter, Gauge, Histogram, HistogramFn, Key, KeyName, Metadata, Recorder, SharedString, Unit,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};

async fn seeded_adapter() -> SqliteAdapter {
    let adapter = SqliteAdapter::new_memory().await.unwrap();
    sqlx::query(
        r#"
        CREATE TABLE users (
            id INTEGER PRIMARY KEY,
            user_name TEXT NOT NULL,
            age INTEGER NOT NULL,
            score REAL NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(adapter.pool())
    .await
    .unwrap();

    sqlx::query(
        r#"
        INSERT INTO users (id, user_name, age, score, status, created_at) VALUES
            (1, 'alice', 17, 1.5, 'active', '2024-01-01'),
            (2, 'bob', 18, 2.5, 'active', '2024-01-02'),
            (3, 'carol', 25, 3.0, 'inactive', '2024-01-03'),
            (4, 'dave', 31, 4.0, 'active', '2024-01-04'),
            (5, 'erin', 42, 5.0, 'banned', '2024-01-05')
        "#,
    )
    .execute(adapter.pool())
    .await
    .unwrap();

    adapter
}

async fn setup(config: Config) -> Engine {
    Engine::new(Box::new(seeded_adapter().await), config)
}

fn search(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {}", other),
    }
}

fn names(list: &[Row], key: &str) -> Vec<String> {
    list.iter()
        .map(|row| row[key].as_str().unwrap().to_string())
        .collect()
}

/// Counts every call that reaches the database.
struct Recording {
    inner: SqliteAdapter,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Adapter for Recording {
    async fn count(&self, stmt: &Statement) -> Result<i64, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.count(stmt).await
    }

    async fn fetch_rows(&self, stmt: &Statement) -> Result<Vec<Row>, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_rows(stmt).await
    }

    async fn fetch_sums(&self, stmt: &Statement, fields: &[Ident]) -> Result<Row, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_sums(stmt, fields).await
    }
}

async fn recording() -> (Engine, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let adapter = Recording {
        inner: seeded_adapter().await,
        calls: calls.clone(),
    };
    (Engine::new(Box::new(adapter), Config::default()), calls)
}

#[tokio::test]
async fn test_map_filter_and_projection() {
    let engine = setup(Config::default()).await;

    let envelope = engine
        .query_with_map("users", &search(json!({"gtAge": 18, "orderKey": "id"})))
        .await
        .unwrap();

    assert_eq!(envelope.total, 3);
    assert_eq!(names(&envelope.list, "userName"), vec!["carol", "dave", "erin"]);
    let keys: Vec<_> = envelope.list[0].keys().cloned().collect();
    assert_eq!(
        keys,
        vec!["id", "userName", "age", "score", "status", "createdAt"]
    );
    assert!(envelope.sum.is_empty());
}

#[tokio::test]
async fn test_map_operators() {
    let engine = setup(Config::default()).await;

    let cases = [
        (json!({"neqStatus": "active", "orderKey": "id"}), vec!["carol", "erin"]),
        (json!({"gte_age": 25, "lteAge": 31, "orderKey": "id"}), vec!["carol", "dave"]),
        (json!({"inId": [1, 3, 5], "orderKey": "id"}), vec!["alice", "carol", "erin"]),
        (json!({"ninId": [1, 3, 5], "orderKey": "id"}), vec!["bob", "dave"]),
        (json!({"likeUserName": "%a%", "orderKey": "id"}), vec!["alice", "carol", "dave"]),
        (json!({"nlikeUserName": "%a%", "orderKey": "id"}), vec!["bob", "erin"]),
        (json!({"eqStatus": "banned"}), vec!["erin"]),
        (json!({"userName": "bob"}), vec!["bob"]),
        (json!({"ltAge": 18, "status": "active"}), vec!["alice"]),
    ];
    for (input, expected) in cases {
        let envelope = engine
            .query_with_map("users", &search(input.clone()))
            .await
            .unwrap();
        assert_eq!(envelope.total as usize, expected.len(), "{}", input);
        assert_eq!(names(&envelope.list, "userName"), expected, "{}", input);
    }
}

#[tokio::test]
async fn test_map_paging_and_order() {
    let engine = setup(Config::default()).await;

    let envelope = engine
        .query_with_map(
            "users",
            &search(json!({"orderKey": "desc_createdAt", "page": 2, "pagesize": 2})),
        )
        .await
        .unwrap();
    assert_eq!(envelope.total, 5);
    assert_eq!(names(&envelope.list, "userName"), vec!["carol", "bob"]);

    let envelope = engine
        .query_with_map(
            "users",
            &search(json!({"order_key": "asc_age", "page": 3.0, "page_size": "2"})),
        )
        .await
        .unwrap();
    assert_eq!(names(&envelope.list, "userName"), vec!["erin"]);
}

#[tokio::test]
async fn test_map_pagesize_is_capped() {
    let engine = setup(Config::default().max_pagesize(2)).await;

    let envelope = engine
        .query_with_map("users", &search(json!({"pagesize": 10000, "orderKey": "id"})))
        .await
        .unwrap();
    assert_eq!(envelope.total, 5);
    assert_eq!(names(&envelope.list, "userName"), vec!["alice", "bob"]);

    // Without a page size the cap applies too.
    let envelope = engine
        .query_with_map("users", &search(json!({})))
        .await
        .unwrap();
    assert_eq!(envelope.list.len(), 2);
}

#[tokio::test]
async fn test_map_sum_on_first_page_only() {
    let engine = setup(Config::default()).await;

    let envelope = engine
        .query_with_map(
            "users",
            &search(json!({"gtAge": 18, "page": 1, "pagesize": 1, "#sum": ["score", "age"]})),
        )
        .await
        .unwrap();
    assert_eq!(envelope.total, 3);
    assert_eq!(envelope.list.len(), 1);
    assert_eq!(envelope.sum["score"], json!(12.0));
    assert_eq!(envelope.sum["age"], json!(98));

    let envelope = engine
        .query_with_map(
            "users",
            &search(json!({"gtAge": 18, "page": 2, "pagesize": 1, "#sum": ["score"]})),
        )
        .await
        .unwrap();
    assert!(envelope.sum.is_empty());

    let envelope = engine
        .query_with_map("users", &search(json!({"gtAge": 18, "#sum": ["score"]})))
        .await
        .unwrap();
    assert!(envelope.sum.is_empty());

    let envelope = engine
        .query_with_map("users", &search(json!({"page": 1, "#sum": []})))
        .await
        .unwrap();
    assert_eq!(envelope.total, 5);
    assert!(envelope.sum.is_empty());
}

#[tokio::test]
async fn test_map_no_rows() {
    let (engine, calls) = recording().await;

    let envelope = engine
        .query_with_map(
            "users",
            &search(json!({"gtAge": 100, "page": 1, "#sum": ["score"]})),
        )
        .await
        .unwrap();
    assert_eq!(envelope.total, 0);
    assert!(envelope.list.is_empty());
    assert!(envelope.sum.is_empty());
    // Count only.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_map_empty_strings() {
    let engine = setup(Config::default()).await;
    let envelope = engine
        .query_with_map("users", &search(json!({"status": ""})))
        .await
        .unwrap();
    assert_eq!(envelope.total, 5);

    let engine = setup(Config::default().allow_empty_string(true)).await;
    let envelope = engine
        .query_with_map("users", &search(json!({"status": ""})))
        .await
        .unwrap();
    assert_eq!(envelope.total, 0);
}

#[tokio::test]
async fn test_map_rejects_injection_before_any_sql() {
    let (engine, calls) = recording().await;

    let result = engine
        .query_with_map(
            "users",
            &search(json!({"page": 1, "#sum": ["age; DROP TABLE x"]})),
        )
        .await;
    assert!(matches!(result, Err(Error::InjectionRejected(_))));

    let result = engine
        .query_with_map("users", &search(json!({"orderKey": "id desc, (select 1)"})))
        .await;
    assert!(matches!(result, Err(Error::InjectionRejected(_))));

    let result = engine
        .query_with_map("users", &search(json!({"age` = 1 OR `id": 1})))
        .await;
    assert!(matches!(result, Err(Error::InjectionRejected(_))));

    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // The table is still there.
    let envelope = engine
        .query_with_map("users", &search(json!({})))
        .await
        .unwrap();
    assert_eq!(envelope.total, 5);
}

#[tokio::test]
async fn test_map_invalid_arguments() {
    let engine = setup(Config::default()).await;

    for input in [
        json!({"page": "first"}),
        json!({"pagesize": [10]}),
        json!({"orderKey": 3}),
        json!({"#sum": "score"}),
        json!({"#sum": [1]}),
    ] {
        let result = engine.query_with_map("users", &search(input.clone())).await;
        assert!(
            matches!(result, Err(Error::InvalidArgument(_))),
            "{}: {:?}",
            input,
            result
        );
    }
}

#[tokio::test]
async fn test_driver_errors_propagate() {
    let engine = setup(Config::default()).await;

    let result = engine
        .query_with_map("missing_table", &search(json!({})))
        .await;
    assert!(matches!(result, Err(Error::QueryFailed(_))));

    let result = engine
        .query_with_map("users", &search(json!({"missingColumn": 1})))
        .await;
    assert!(matches!(result, Err(Error::QueryFailed(_))));
}

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    id: i64,
    user_name: String,
    age: i64,
    score: f64,
    status: String,
    created_at: String,
}

#[derive(Debug, Default, Deserialize, PartialEq, SumFields)]
struct UserSum {
    age: Option<i64>,
    score: Option<f64>,
}

#[derive(Condition, Default)]
struct Range {
    gte_age: Option<i64>,
    lte_age: Option<i64>,
}

#[derive(Condition, Default)]
struct UserSearch {
    base: BaseCondition,
    range: Range,
    status: Option<String>,
    in_id: Option<Vec<i64>>,
    #[krino(rename = "likeUserName")]
    name_pattern: Option<String>,
    #[krino(skip)]
    #[allow(dead_code)]
    note: String,
}

#[tokio::test]
async fn test_struct_query() {
    let engine = setup(Config::default()).await;

    let cond = UserSearch {
        base: BaseCondition {
            page: Some(1),
            pagesize: Some(2),
            order_key: Some("descAge".to_string()),
        },
        range: Range {
            gte_age: Some(18),
            lte_age: None,
        },
        status: Some("active".to_string()),
        note: "not a column".to_string(),
        ..Default::default()
    };

    let mut users: Vec<User> = Vec::new();
    let mut sum = UserSum::default();
    let mut total = 0i64;
    engine
        .table("users")
        .query_with_struct(Some(&cond), Some(&mut users), Some(&mut sum), Some(&mut total))
        .await
        .unwrap();

    assert_eq!(total, 2);
    assert_eq!(
        users.iter().map(|u| u.user_name.as_str()).collect::<Vec<_>>(),
        vec!["dave", "bob"]
    );
    assert_eq!(users[0].id, 4);
    assert_eq!(users[0].score, 4.0);
    assert_eq!(users[0].created_at, "2024-01-04");
    assert_eq!(
        sum,
        UserSum {
            age: Some(49),
            score: Some(6.5),
        }
    );
}

#[tokio::test]
async fn test_struct_query_renamed_and_list_fields() {
    let engine = setup(Config::default()).await;

    let cond = UserSearch {
        in_id: Some(vec![1, 2, 3]),
        name_pattern: Some("%o%".to_string()),
        ..Default::default()
    };
    let mut users: Vec<User> = Vec::new();
    engine
        .table("users")
        .query_with_struct(Some(&cond), Some(&mut users), None::<&mut NoSum>, None)
        .await
        .unwrap();
    assert_eq!(
        users.iter().map(|u| u.user_name.as_str()).collect::<Vec<_>>(),
        vec!["bob", "carol"]
    );
}

#[tokio::test]
async fn test_struct_query_no_rows_clears_list() {
    let (engine, calls) = recording().await;

    let cond = UserSearch {
        base: BaseCondition {
            page: Some(1),
            ..Default::default()
        },
        status: Some("nobody".to_string()),
        ..Default::default()
    };
    let mut users: Vec<User> = vec![User {
        id: 0,
        user_name: "stale".to_string(),
        age: 0,
        score: 0.0,
        status: String::new(),
        created_at: String::new(),
    }];
    let mut sum = UserSum::default();
    let mut total = -1i64;
    engine
        .table("users")
        .query_with_struct(Some(&cond), Some(&mut users), Some(&mut sum), Some(&mut total))
        .await
        .unwrap();

    assert_eq!(total, 0);
    assert!(users.is_empty());
    assert_eq!(sum, UserSum::default());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_struct_query_without_total_fetches_rows() {
    let (engine, calls) = recording().await;

    let mut users: Vec<User> = Vec::new();
    engine
        .table("users")
        .query_with_struct(
            None::<&UserSearch>,
            Some(&mut users),
            None::<&mut NoSum>,
            None,
        )
        .await
        .unwrap();
    assert_eq!(users.len(), 5);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_struct_query_sum_destination_errors() {
    #[derive(Debug, Default, Deserialize, SumFields)]
    #[allow(dead_code)]
    struct WrongSum {
        status: Vec<String>,
    }

    #[derive(Debug, Default, Deserialize, SumFields)]
    #[allow(dead_code)]
    struct UnsafeSum {
        #[krino(rename = "age1")]
        age: i64,
    }

    let engine = setup(Config::default()).await;
    let cond = BaseCondition {
        page: Some(1),
        ..Default::default()
    };

    let mut sum = WrongSum::default();
    let result = engine
        .table("users")
        .query_with_struct(Some(&cond), None::<&mut Vec<User>>, Some(&mut sum), None)
        .await;
    assert!(matches!(result, Err(Error::InvalidSumDestination(_))));

    let mut sum = UnsafeSum::default();
    let result = engine
        .table("users")
        .query_with_struct(Some(&cond), None::<&mut Vec<User>>, Some(&mut sum), None)
        .await;
    assert!(matches!(result, Err(Error::InjectionRejected(_))));
}

#[tokio::test]
async fn test_struct_query_from_json_condition() {
    let engine = setup(Config::default()).await;

    let cond = json!({"gtAge": 20, "orderKey": "desc_id", "nested": {"neqStatus": "banned"}});
    let mut users: Vec<User> = Vec::new();
    let mut total = 0;
    engine
        .table("users")
        .query_with_struct(Some(&cond), Some(&mut users), None::<&mut NoSum>, Some(&mut total))
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(
        users.iter().map(|u| u.id).collect::<Vec<_>>(),
        vec![4, 3]
    );
}

#[tokio::test]
async fn test_struct_sum_without_matches_keeps_destination() {
    #[derive(Debug, Deserialize, PartialEq, SumFields)]
    struct AgeSum {
        age: i64,
    }

    let (engine, calls) = recording().await;
    let cond = json!({"page": 1, "gtAge": 100});
    let mut users: Vec<User> = Vec::new();
    let mut sum = AgeSum { age: 7 };
    engine
        .table("users")
        .query_with_struct(Some(&cond), Some(&mut users), Some(&mut sum), None)
        .await
        .unwrap();

    assert!(users.is_empty());
    assert_eq!(sum, AgeSum { age: 7 });
    // Rows and sums, no count.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[derive(Default)]
struct Samples(Mutex<Vec<f64>>);

impl HistogramFn for Samples {
    fn record(&self, value: f64) {
        self.0.lock().unwrap().push(value);
    }
}

/// Captures `krino.query.duration_ms` samples for one table.
struct DurationRecorder {
    table: &'static str,
    samples: Arc<Samples>,
}

impl Recorder for DurationRecorder {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
        Counter::noop()
    }

    fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, key: &Key, _: &Metadata<'_>) -> Histogram {
        let matches = key.name() == "krino.query.duration_ms"
            && key
                .labels()
                .any(|l| l.key() == "table" && l.value() == self.table);
        if matches {
            Histogram::from_arc(self.samples.clone())
        } else {
            Histogram::noop()
        }
    }
}

#[tokio::test]
async fn test_failed_queries_are_timed() {
    let engine = setup(Config::default()).await;
    let recorder = DurationRecorder {
        table: "missing_table",
        samples: Arc::new(Samples::default()),
    };
    let _guard = metrics::set_default_local_recorder(&recorder);

    let result = engine
        .query_with_map("missing_table", &search(json!({})))
        .await;
    assert!(matches!(result, Err(Error::QueryFailed(_))));

    let mut total = 0;
    let result = engine
        .table("missing_table")
        .query_with_struct(
            None::<&Value>,
            None::<&mut Vec<User>>,
            None::<&mut NoSum>,
            Some(&mut total),
        )
        .await;
    assert!(matches!(result, Err(Error::QueryFailed(_))));

    let result = engine
        .query_with_map("missing_table", &search(json!({"orderKey": "a b"})))
        .await;
    assert!(matches!(result, Err(Error::InjectionRejected(_))));

    assert_eq!(recorder.samples.0.lock().unwrap().len(), 3);
}
