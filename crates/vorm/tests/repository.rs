use std::sync::{Arc, Mutex};

use vorm::{
    Aggregate, Executor, FlatRow, Opaque, OrmResult, Repository, Structure, StructuralMapper,
    TypeConverterRegistry, Value,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Opaque)]
struct OrderId(i64);

#[derive(Debug, Default, Clone, PartialEq, Structure)]
struct Money {
    amount: i64,
    currency: String,
}

#[derive(Debug, Default, Clone, PartialEq, Structure, Aggregate)]
#[orm(entity = "Orders", schema = "sales", dialect = "postgres", rename_all = "PascalCase")]
struct Order {
    #[orm(key, identity)]
    id: OrderId,
    customer: String,
    total: Money,
}

/// Records every statement and answers queries with canned rows.
#[derive(Default)]
struct RecordingExecutor {
    calls: Mutex<Vec<(String, FlatRow)>>,
    rows: Vec<FlatRow>,
}

impl RecordingExecutor {
    fn returning(rows: Vec<FlatRow>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            rows,
        }
    }

    fn calls(&self) -> Vec<(String, FlatRow)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Executor for RecordingExecutor {
    async fn query(&self, sql: &str, params: &FlatRow) -> OrmResult<Vec<FlatRow>> {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), params.clone()));
        Ok(self.rows.clone())
    }

    async fn execute(&self, sql: &str, params: &FlatRow) -> OrmResult<u64> {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), params.clone()));
        Ok(self.rows.len() as u64)
    }
}

fn mapper() -> Arc<StructuralMapper> {
    let mut converters = TypeConverterRegistry::new();
    converters
        .register::<OrderId, i64>(|id| id.0, OrderId)
        .unwrap();
    Arc::new(StructuralMapper::new(converters))
}

fn repository(executor: RecordingExecutor) -> Repository<Order, RecordingExecutor> {
    let mapper = mapper();
    let metadata = Arc::new(Order::metadata(&mapper).unwrap());
    Repository::new(mapper, metadata, executor).unwrap()
}

// PostgreSQL folds unquoted names, so rows come back lower-cased.
fn stored_row(id: i64) -> FlatRow {
    FlatRow::from_pairs([
        ("id", Value::I64(id)),
        ("customer", Value::String("acme".into())),
        ("total_amount", Value::I64(1250)),
        ("total_currency", Value::String("EUR".into())),
    ])
}

fn order(id: i64) -> Order {
    Order {
        id: OrderId(id),
        customer: "acme".into(),
        total: Money {
            amount: 1250,
            currency: "EUR".into(),
        },
    }
}

#[tokio::test]
async fn get_binds_the_key_and_maps_the_row() {
    let repo = repository(RecordingExecutor::returning(vec![stored_row(42)]));
    let found = repo.get(&OrderId(42)).await.unwrap();
    assert_eq!(found, Some(order(42)));

    let calls = repo.executor().calls();
    assert_eq!(calls.len(), 1);
    let (sql, params) = &calls[0];
    assert_eq!(
        sql,
        "SELECT sales.Orders.Id, sales.Orders.Customer, sales.Orders.Total_amount, \
         sales.Orders.Total_currency FROM sales.Orders WHERE sales.Orders.Id = @Id;"
    );
    assert_eq!(params, &FlatRow::from_pairs([("Id", Value::I64(42))]));
}

#[tokio::test]
async fn get_returns_none_without_rows() {
    let repo = repository(RecordingExecutor::default());
    assert_eq!(repo.get(&OrderId(1)).await.unwrap(), None);
}

#[tokio::test]
async fn get_all_maps_every_row() {
    let repo = repository(RecordingExecutor::returning(vec![
        stored_row(1),
        stored_row(2),
    ]));
    let all = repo.get_all().await.unwrap();
    assert_eq!(all, vec![order(1), order(2)]);
    assert!(repo.executor().calls()[0].1.is_empty());
}

#[tokio::test]
async fn insert_sends_flattened_instance_and_returns_stored_row() {
    let repo = repository(RecordingExecutor::returning(vec![stored_row(7)]));
    let stored = repo.insert(&order(0)).await.unwrap();
    assert_eq!(stored.id, OrderId(7));

    let (sql, params) = &repo.executor().calls()[0];
    assert!(sql.starts_with(
        "INSERT INTO sales.Orders (Customer, Total_amount, Total_currency) \
         VALUES (@Customer, @Total_amount, @Total_currency) RETURNING"
    ));
    assert_eq!(params.get("Total_currency"), Some(&Value::String("EUR".into())));
    assert_eq!(params.get("Id"), Some(&Value::I64(0)));
}

#[tokio::test]
async fn insert_without_returned_row_is_not_found() {
    let repo = repository(RecordingExecutor::default());
    let err = repo.insert(&order(0)).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn update_and_upsert_use_the_update_statement_for_known_ids() {
    let repo = repository(RecordingExecutor::returning(vec![stored_row(3)]));
    repo.update(&order(3)).await.unwrap();
    repo.upsert(&order(3)).await.unwrap();

    let calls = repo.executor().calls();
    assert!(calls[0].0.starts_with("UPDATE sales.Orders SET Customer = @Customer"));
    assert_eq!(calls[0].0, calls[1].0);
}

#[tokio::test]
async fn delete_returns_the_deleted_aggregate() {
    let repo = repository(RecordingExecutor::returning(vec![stored_row(9)]));
    let deleted = repo.delete(&OrderId(9)).await.unwrap();
    assert_eq!(deleted, Some(order(9)));
    assert!(repo.executor().calls()[0].0.starts_with("DELETE FROM sales.Orders WHERE"));
}

#[tokio::test]
async fn query_passes_sql_through() {
    let repo = repository(RecordingExecutor::returning(vec![stored_row(5)]));
    let params = FlatRow::from_pairs([("customer", Value::String("acme".into()))]);
    let orders = repo
        .query("SELECT * FROM sales.Orders WHERE Customer = @customer", &params)
        .await
        .unwrap();
    assert_eq!(orders, vec![order(5)]);
    assert_eq!(repo.executor().calls()[0].1, params);
}

#[tokio::test]
async fn repository_requires_a_dialect() {
    #[derive(Debug, Default, Structure, Aggregate)]
    #[orm(schema = "sales")]
    struct Undecided {
        #[orm(key)]
        id: i64,
    }

    let mapper = mapper();
    let metadata = Arc::new(Undecided::metadata(&mapper).unwrap());
    let err = Repository::<Undecided, _>::new(mapper, metadata, RecordingExecutor::default())
        .err()
        .unwrap();
    assert!(err.is_configuration());
}
