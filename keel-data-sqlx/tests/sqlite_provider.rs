use keel_data::query::{Dialect, IdentifierPolicy};
use keel_data::restrict;
use keel_data::{
    DataError, DataSettings, Entity, PageRequest, QueryRepository, Repository, RepositoryAssist,
    Sort, Value,
};
use keel_data_sqlx::SqlxRepository;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{FromRow, Row, Sqlite, SqlitePool};

#[derive(Debug, Clone, PartialEq)]
struct Employee {
    id: i64,
    last_name: String,
    hours: i64,
    manager: Option<String>,
}

impl Employee {
    fn new(id: i64, last_name: &str, hours: i64, manager: Option<&str>) -> Self {
        Self {
            id,
            last_name: last_name.to_string(),
            hours,
            manager: manager.map(str::to_string),
        }
    }
}

impl Entity for Employee {
    type Id = i64;

    fn table_name() -> &'static str {
        "employees"
    }

    fn id_column() -> &'static str {
        "id"
    }

    fn columns() -> &'static [&'static str] {
        &["id", "last_name", "hours", "manager"]
    }

    fn id(&self) -> &i64 {
        &self.id
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(self.id.into()),
            "last_name" => Some(self.last_name.as_str().into()),
            "hours" => Some(self.hours.into()),
            "manager" => Some(self.manager.clone().into()),
            _ => None,
        }
    }
}

impl<'r> FromRow<'r, SqliteRow> for Employee {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            last_name: row.try_get("last_name")?,
            hours: row.try_get("hours")?,
            manager: row.try_get("manager")?,
        })
    }
}

async fn memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

async fn setup() -> SqlxRepository<Employee, Sqlite> {
    let pool = memory_pool().await;
    sqlx::query(
        "CREATE TABLE employees (id INTEGER PRIMARY KEY, last_name TEXT NOT NULL, hours INTEGER NOT NULL, manager TEXT)",
    )
    .execute(&pool)
    .await
    .unwrap();

    let repo = SqlxRepository::<Employee, Sqlite>::new(pool);
    for e in [
        Employee::new(1, "Adams", 40, None),
        Employee::new(2, "Baker", 32, Some("Adams")),
        Employee::new(3, "Clark", 40, Some("Adams")),
        Employee::new(4, "Duke Ellis", 20, None),
        Employee::new(5, "Duke Nukem", 45, Some("Clark")),
        Employee::new(6, "Evans", 32, None),
        Employee::new(7, "Fischer", 38, Some("Clark")),
        Employee::new(8, "Garcia", 40, None),
        Employee::new(9, "Hughes", 25, None),
        Employee::new(10, "Ito", 45, Some("Adams")),
        Employee::new(11, "jones", 30, None),
        Employee::new(12, "Khan", 38, None),
    ] {
        repo.save(&e).await.unwrap();
    }
    repo
}

fn ids(employees: &[Employee]) -> Vec<i64> {
    employees.iter().map(|e| e.id).collect()
}

fn by_hours_then_id(size: u64) -> PageRequest {
    PageRequest::of_size(size)
        .unwrap()
        .sort_by([Sort::asc("hours"), Sort::asc("id")])
}

#[tokio::test]
async fn test_crud() {
    let repo = setup().await;
    assert_eq!(repo.count().await.unwrap(), 12);

    let mut ito = repo.find_by_id(&10).await.unwrap().unwrap();
    assert_eq!(ito.manager.as_deref(), Some("Adams"));

    ito.hours = 44;
    repo.save(&ito).await.unwrap();
    assert_eq!(repo.find_by_id(&10).await.unwrap().unwrap().hours, 44);
    assert_eq!(repo.count().await.unwrap(), 12);

    assert!(repo.delete(&10).await.unwrap());
    assert!(!repo.delete(&10).await.unwrap());
    assert!(repo.find_by_id(&10).await.unwrap().is_none());
    assert_eq!(repo.find_all().await.unwrap().len(), 11);
}

#[tokio::test]
async fn test_restriction_translation() {
    let repo = setup().await;

    let dukes = restrict::starts_with("last_name", "Duke ").unwrap();
    assert_eq!(repo.count_where(&dukes).await.unwrap(), 2);

    let example = restrict::all(vec![
        restrict::less_than("hours", 50).unwrap(),
        dukes.clone(),
    ])
    .unwrap();
    assert_eq!(repo.count_where(&example.negate()).await.unwrap(), 10);

    let folded = restrict::ignore_case(restrict::equal_to("last_name", "JONES").unwrap()).unwrap();
    assert_eq!(ids(&repo.find_where(&folded).await.unwrap()), vec![11]);

    let range = restrict::between("hours", 38, 40).unwrap();
    assert_eq!(repo.count_where(&range).await.unwrap(), 5);
    assert_eq!(repo.count_where(&range.negate()).await.unwrap(), 7);

    let by_adams = restrict::equal_to("manager", "Adams").unwrap();
    assert_eq!(repo.count_where(&by_adams).await.unwrap(), 3);
    assert_eq!(repo.count_where(&by_adams.negate()).await.unwrap(), 2);

    let listed = restrict::is_in("id", [1, 5, 9]).unwrap();
    assert_eq!(ids(&repo.find_where(&listed).await.unwrap()), vec![1, 5, 9]);
}

#[tokio::test]
async fn test_like_escapes_are_honoured() {
    let repo = setup().await;
    repo.save(&Employee::new(13, "100%_Fit", 10, None)).await.unwrap();
    repo.save(&Employee::new(14, "100X Fit", 10, None)).await.unwrap();

    let literal = restrict::starts_with("last_name", "100%_").unwrap();
    assert_eq!(ids(&repo.find_where(&literal).await.unwrap()), vec![13]);

    let pattern = restrict::like("last_name", "100%").unwrap();
    assert_eq!(repo.count_where(&pattern).await.unwrap(), 2);
}

#[tokio::test]
async fn test_offset_page() {
    let repo = setup().await;
    let request = PageRequest::of_size(5).unwrap().sort_by([Sort::desc("id")]);
    let page = repo.find_page(None, &request).await.unwrap();
    assert_eq!(ids(page.content()), vec![12, 11, 10, 9, 8]);
    assert_eq!(page.total_elements(), Some(12));

    let last = repo
        .find_all_paged(&request.page(3).unwrap())
        .await
        .unwrap();
    assert_eq!(ids(last.content()), vec![2, 1]);
    assert!(!last.has_next());
}

#[tokio::test]
async fn test_keyset_round_trip() {
    let repo = setup().await;
    let first = repo.find_cursored(None, &by_hours_then_id(5)).await.unwrap();
    assert_eq!(ids(first.content()), vec![4, 9, 11, 2, 6]);
    assert!(first.has_next());
    assert!(!first.has_previous());
    assert_eq!(
        first.get_keyset_cursor(4).unwrap().elements(),
        &[Value::Int(32), Value::Int(6)]
    );

    let second = repo
        .find_cursored(None, &first.next_page_request().unwrap())
        .await
        .unwrap();
    assert_eq!(ids(second.content()), vec![7, 12, 1, 3, 8]);

    let third = repo
        .find_cursored(None, &second.next_page_request().unwrap())
        .await
        .unwrap();
    assert_eq!(ids(third.content()), vec![5, 10]);
    assert!(!third.has_next());

    let back = repo
        .find_cursored(None, &third.previous_page_request().unwrap())
        .await
        .unwrap();
    assert_eq!(ids(back.content()), vec![7, 12, 1, 3, 8]);
    assert!(back.has_previous());

    let front = repo
        .find_cursored(None, &back.previous_page_request().unwrap())
        .await
        .unwrap();
    assert_eq!(ids(front.content()), vec![4, 9, 11, 2, 6]);
    assert!(!front.has_previous());
    assert_eq!(front.page_request().page_number(), 1);
}

#[tokio::test]
async fn test_keyset_is_stable_under_inserts() {
    let repo = setup().await;
    let restriction = restrict::greater_than_equal("hours", 30).unwrap();
    let request = PageRequest::of_size(3)
        .unwrap()
        .sort_by([Sort::desc("hours"), Sort::asc("id")]);

    let first = repo.find_cursored(Some(&restriction), &request).await.unwrap();
    assert_eq!(ids(first.content()), vec![5, 10, 1]);

    // A row that sorts before the cursor does not shift the next window.
    repo.save(&Employee::new(20, "Lee", 50, None)).await.unwrap();

    let second = repo
        .find_cursored(Some(&restriction), &first.next_page_request().unwrap())
        .await
        .unwrap();
    assert_eq!(ids(second.content()), vec![3, 8, 7]);
}

#[tokio::test]
async fn test_cursor_request_rejected_for_offset_pages() {
    let repo = setup().await;
    let request = by_hours_then_id(3)
        .after_keyset(vec![Value::Int(30), Value::Int(11)])
        .unwrap();
    assert!(matches!(
        repo.find_page(None, &request).await,
        Err(DataError::IllegalArgument(_))
    ));
}

#[tokio::test]
async fn test_keyset_disabled_is_unsupported() {
    let pool = memory_pool().await;
    let repo = SqlxRepository::<Employee, Sqlite>::with_settings(
        pool,
        DataSettings {
            keyset_pagination: false,
            ..DataSettings::default()
        },
    )
    .unwrap();
    assert!(matches!(
        repo.find_cursored(None, &by_hours_then_id(5)).await,
        Err(DataError::UnsupportedOperation(_))
    ));
}

#[tokio::test]
async fn test_pool_is_a_scoped_resource() {
    let repo = setup().await;
    assert_eq!(repo.provider_name(), "sqlx");
    assert!(repo.supports_keyword("Between"));

    let removed = repo
        .invoke_default("remove_part_timers", |scope| async move {
            let pool = scope
                .resource::<SqlitePool>()?
                .ok_or_else(|| DataError::illegal_state("no pool"))?;
            let result = sqlx::query("DELETE FROM employees WHERE hours < 30")
                .execute(&*pool)
                .await
                .map_err(DataError::database)?;
            Ok((result.rows_affected(), scope))
        })
        .await
        .unwrap();
    assert_eq!(removed.0, 2);
    assert!(matches!(
        removed.1.resource::<SqlitePool>(),
        Err(DataError::IllegalState(_))
    ));
    assert_eq!(repo.count().await.unwrap(), 10);
}

#[tokio::test]
async fn test_like_is_case_sensitive_unless_folded() {
    let repo = setup().await;
    let lower = restrict::like("last_name", "duke%").unwrap();
    assert_eq!(repo.count_where(&lower).await.unwrap(), 0);
    assert_eq!(repo.count_where(&lower.negate()).await.unwrap(), 12);

    let folded = restrict::ignore_case(lower).unwrap();
    assert_eq!(repo.count_where(&folded).await.unwrap(), 2);

    let suffix = restrict::ends_with("last_name", "ONES").unwrap();
    assert_eq!(repo.count_where(&suffix).await.unwrap(), 0);
}

#[tokio::test]
async fn test_keyset_with_case_insensitive_sort() {
    let repo = setup().await;
    repo.save(&Employee::new(13, "Émile", 10, None)).await.unwrap();
    repo.save(&Employee::new(14, "éa", 10, None)).await.unwrap();
    let request = PageRequest::of_size(5)
        .unwrap()
        .sort_by([Sort::asc_ignore_case("last_name"), Sort::asc("id")]);

    let first = repo.find_cursored(None, &request).await.unwrap();
    assert_eq!(ids(first.content()), vec![1, 2, 3, 4, 5]);

    let second = repo
        .find_cursored(None, &first.next_page_request().unwrap())
        .await
        .unwrap();
    assert_eq!(ids(second.content()), vec![6, 7, 8, 9, 10]);

    let third = repo
        .find_cursored(None, &second.next_page_request().unwrap())
        .await
        .unwrap();
    assert_eq!(ids(third.content()), vec![11, 12, 13, 14]);
    assert!(!third.has_next());

    let back = repo
        .find_cursored(None, &third.previous_page_request().unwrap())
        .await
        .unwrap();
    assert_eq!(ids(back.content()), vec![6, 7, 8, 9, 10]);
}

#[tokio::test]
async fn test_dialect_must_match_the_driver() {
    let pool = memory_pool().await;
    let generic = SqlxRepository::<Employee, Sqlite>::with_settings(
        pool.clone(),
        DataSettings::default(),
    )
    .unwrap();
    assert_eq!(generic.dialect(), Dialect::Sqlite);

    let result = SqlxRepository::<Employee, Sqlite>::with_settings(
        pool,
        DataSettings {
            dialect: Dialect::Postgres,
            ..DataSettings::default()
        },
    );
    assert!(matches!(result, Err(DataError::IllegalArgument(_))));
}

#[tokio::test]
async fn test_quoted_identifiers_apply_to_writes() {
    let pool = memory_pool().await;
    sqlx::query(
        "CREATE TABLE employees (id INTEGER PRIMARY KEY, last_name TEXT NOT NULL, hours INTEGER NOT NULL, manager TEXT)",
    )
    .execute(&pool)
    .await
    .unwrap();
    let repo = SqlxRepository::<Employee, Sqlite>::with_settings(
        pool,
        DataSettings {
            identifier_policy: IdentifierPolicy::Quote,
            ..DataSettings::default()
        },
    )
    .unwrap();

    repo.save(&Employee::new(1, "Adams", 40, None)).await.unwrap();
    repo.save(&Employee::new(1, "Adams", 42, Some("Baker")))
        .await
        .unwrap();
    let adams = repo.find_by_id(&1).await.unwrap().unwrap();
    assert_eq!(adams.hours, 42);
    assert_eq!(adams.manager.as_deref(), Some("Baker"));

    assert!(repo.delete(&1).await.unwrap());
    assert_eq!(repo.count().await.unwrap(), 0);
}
