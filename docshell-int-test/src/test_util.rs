use chrono::{DateTime, Utc};
use docshell::collection::{Collection, Document};
use docshell::doc;
use docshell::errors::ShellResult;
use docshell::store::memory::InMemoryDriver;
use docshell::{Database, ShellBuilder};

pub const TEST_DATABASE: &str = "test";
pub const ZIPS: &str = "zips";

/// Runs `test` against a fresh context built by `before`, then hands the
/// context to `after` whatever the outcome. Panics with the first error.
pub fn run_test<B, T, A>(before: B, test: T, after: A)
where
    B: FnOnce() -> ShellResult<TestContext>,
    T: FnOnce(&mut TestContext) -> ShellResult<()>,
    A: FnOnce(TestContext) -> ShellResult<()>,
{
    let mut ctx = match before() {
        Ok(ctx) => ctx,
        Err(e) => panic!("Before run failed: {:?}", e),
    };

    let result = test(&mut ctx);
    let after_result = after(ctx);

    if let Err(e) = result {
        panic!("Test failed: {:?}", e);
    }
    if let Err(e) = after_result {
        panic!("After run failed: {:?}", e);
    }
}

pub struct TestContext {
    driver: InMemoryDriver,
    db: Database,
}

impl TestContext {
    pub fn driver(&self) -> &InMemoryDriver {
        &self.driver
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut Database {
        &mut self.db
    }

    pub fn zips(&self) -> Collection {
        self.db.collection(ZIPS)
    }
}

/// A database named [TEST_DATABASE] with the [create_zip_docs] fixture
/// seeded into [ZIPS].
pub fn create_test_context() -> ShellResult<TestContext> {
    let driver = InMemoryDriver::new();
    driver.seed(TEST_DATABASE, ZIPS, create_zip_docs());

    let db = ShellBuilder::new(driver.clone())
        .uri("memory://localhost")
        .default_database(TEST_DATABASE)
        .open()?;
    Ok(TestContext { driver, db })
}

/// A connected database with nothing in it.
pub fn create_empty_context() -> ShellResult<TestContext> {
    let driver = InMemoryDriver::new();
    let db = ShellBuilder::new(driver.clone())
        .uri("memory://localhost")
        .default_database(TEST_DATABASE)
        .open()?;
    Ok(TestContext { driver, db })
}

pub fn cleanup(mut ctx: TestContext) -> ShellResult<()> {
    ctx.db_mut().disconnect();
    if let Some(e) = ctx.db().last_error() {
        log::warn!("Test left an error behind: {}", e);
    }
    Ok(())
}

pub fn parse_date(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap()
}

/// Ten zip code records; six in CA with distinct populations.
pub fn create_zip_docs() -> Vec<Document> {
    let surveyed = parse_date("2020-04-01T00:00:00Z");
    vec![
        doc! { "_id": "90001", "city": "LOS ANGELES", "state": "CA", "pop": 57110, "surveyed": surveyed },
        doc! { "_id": "94103", "city": "SAN FRANCISCO", "state": "CA", "pop": 23016, "surveyed": surveyed },
        doc! { "_id": "92101", "city": "SAN DIEGO", "state": "CA", "pop": 39131, "surveyed": surveyed },
        doc! { "_id": "95814", "city": "SACRAMENTO", "state": "CA", "pop": 8210, "surveyed": surveyed },
        doc! { "_id": "93101", "city": "SANTA BARBARA", "state": "CA", "pop": 30452, "surveyed": surveyed },
        doc! { "_id": "96150", "city": "SOUTH LAKE TAHOE", "state": "CA", "pop": 29677, "surveyed": surveyed },
        doc! { "_id": "10001", "city": "NEW YORK", "state": "NY", "pop": 18913, "surveyed": surveyed },
        doc! { "_id": "12207", "city": "ALBANY", "state": "NY", "pop": 3072, "surveyed": surveyed },
        doc! { "_id": "73301", "city": "AUSTIN", "state": "TX", "pop": 5, "surveyed": surveyed },
        doc! { "_id": "77001", "city": "HOUSTON", "state": "TX", "pop": 2, "surveyed": surveyed },
    ]
}

pub fn field<'a>(doc: &'a Document, key: &str) -> Option<&'a str> {
    doc.get(key).and_then(|v| v.as_str())
}

pub fn is_sorted<T: PartialOrd>(iterable: impl IntoIterator<Item = T>, ascending: bool) -> bool {
    let items: Vec<T> = iterable.into_iter().collect();
    items.windows(2).all(|pair| {
        if ascending {
            pair[0] <= pair[1]
        } else {
            pair[0] >= pair[1]
        }
    })
}
