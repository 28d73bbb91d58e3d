use crate::collection::{Document, FindQuery, QuerySpec};
use crate::common::{AllowedShapes, ErrorSlot, Value};
use crate::errors::{ErrorKind, ShellError, ShellResult};
use crate::json::{to_extended_json_pretty, to_pretty_string, to_relaxed_json};
use crate::store::{QueryExecutor, ResultStream};
use crate::verify::{verify_document, Param};
use serde::de::DeserializeOwned;
use std::fmt::{Debug, Formatter};

/// Lifecycle of a [Cursor]. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Configured but not yet read; sort, skip and limit are still allowed.
    Unopened,
    /// The query has been sent and results are being pulled.
    Open,
    Closed,
}

/// A lazily executed query over a collection.
///
/// Nothing is sent to the server until the first read (`has_next`, `next`,
/// `to_array`, `count`, ...). Until then a find cursor can be refined with
/// [Cursor::sort], [Cursor::skip] and [Cursor::limit]:
///
/// ```rust
/// use docshell::doc;
/// use docshell::store::memory::InMemoryDriver;
/// use docshell::ShellBuilder;
///
/// let driver = InMemoryDriver::new();
/// driver.seed("test", "zips", vec![
///     doc! { "city": "LA", "pop": 30 },
///     doc! { "city": "SF", "pop": 20 },
/// ]);
///
/// let db = ShellBuilder::new(driver)
///     .uri("memory://local")
///     .default_database("test")
///     .open()?;
/// let mut cursor = db
///     .collection("zips")
///     .find((), r#"{"_id": 0, "city": 1}"#)
///     .sort(r#"{"pop": 1}"#)
///     .limit(1);
///
/// assert_eq!(cursor.to_array(), vec![doc! { "city": "SF" }]);
/// assert!(cursor.is_closed());
/// # Ok::<(), docshell::errors::ShellError>(())
/// ```
///
/// Failures never panic. They are recorded on the cursor (and mirrored to
/// its collection and database, see [ErrorSlot]) and read back with
/// [Cursor::last_error]; the fluent methods keep returning the cursor.
pub struct Cursor {
    spec: Option<QuerySpec>,
    executor: Option<QueryExecutor>,
    stream: Option<Box<dyn ResultStream>>,
    buffer: Option<Document>,
    state: CursorState,
    find: bool,
    errors: ErrorSlot,
}

impl Cursor {
    pub(crate) fn new(spec: QuerySpec, executor: QueryExecutor, errors: ErrorSlot) -> Cursor {
        Cursor {
            find: spec.is_find(),
            spec: Some(spec),
            executor: Some(executor),
            stream: None,
            buffer: None,
            state: CursorState::Unopened,
            errors,
        }
    }

    /// A cursor that failed before it could be built. It is born closed
    /// with `error` recorded.
    pub(crate) fn poisoned(error: ShellError, find: bool, errors: ErrorSlot) -> Cursor {
        errors.record(error);
        Cursor {
            spec: None,
            executor: None,
            stream: None,
            buffer: None,
            state: CursorState::Closed,
            find,
            errors,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == CursorState::Closed
    }

    pub fn is_find_cursor(&self) -> bool {
        self.find
    }

    /// The query this cursor will run; `None` once closed.
    pub fn query(&self) -> Option<&QuerySpec> {
        self.spec.as_ref()
    }

    pub fn last_error(&self) -> Option<ShellError> {
        self.errors.get()
    }

    /// Sets the sort order of a find cursor. Accepts the same inputs as
    /// [crate::verify::verify] with ordered or unordered documents allowed.
    pub fn sort<P: Into<Param>>(mut self, spec: P) -> Cursor {
        self.try_sort(spec).ok();
        self
    }

    pub fn try_sort<P: Into<Param>>(&mut self, spec: P) -> ShellResult<()> {
        self.ensure_configurable("sort")?;
        let sort = match verify_document(spec, AllowedShapes::ANY_DOCUMENT) {
            Ok(sort) => sort,
            Err(err) => {
                self.errors.record(err.clone());
                return Err(err);
            }
        };
        self.configure(|query| query.sort = if sort.is_empty() { None } else { Some(sort) })
    }

    /// Skips the first `n` results of a find cursor.
    pub fn skip(mut self, n: u64) -> Cursor {
        self.try_skip(n).ok();
        self
    }

    pub fn try_skip(&mut self, n: u64) -> ShellResult<()> {
        self.ensure_configurable("skip")?;
        self.configure(|query| query.skip = Some(n))
    }

    /// Caps the number of results of a find cursor; 0 means no limit.
    pub fn limit(mut self, n: u64) -> Cursor {
        self.try_limit(n).ok();
        self
    }

    pub fn try_limit(&mut self, n: u64) -> ShellResult<()> {
        self.ensure_configurable("limit")?;
        self.configure(|query| query.limit = Some(n))
    }

    /// Returns whether another document is available, fetching and
    /// buffering it if needed. Reaching the end closes the cursor.
    pub fn has_next(&mut self) -> bool {
        if self.is_closed() {
            self.closed_error("has_next");
            return false;
        }
        if self.buffer.is_some() {
            return true;
        }

        match self.fetch() {
            Ok(Some(doc)) => {
                self.buffer = Some(doc);
                true
            }
            _ => false,
        }
    }

    /// Returns the next document, or an empty document with the error
    /// recorded when there is none.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Document {
        self.try_next().unwrap_or_default()
    }

    pub fn try_next(&mut self) -> ShellResult<Document> {
        if self.is_closed() {
            return Err(self.closed_error("next"));
        }

        match self.fetch()? {
            Some(doc) => Ok(doc),
            None => Err(self.fail(ErrorKind::NoNextDocument, "no next document")),
        }
    }

    /// Feeds every remaining document (a buffered one first) to `sink` and
    /// closes the cursor. On a fetch failure the documents already handed
    /// over stay with the caller and the error is returned.
    pub fn consume_all<F: FnMut(Document)>(&mut self, mut sink: F) -> ShellResult<()> {
        if self.is_closed() {
            return Err(self.closed_error("consume_all"));
        }

        while let Some(doc) = self.fetch()? {
            sink(doc);
        }
        Ok(())
    }

    /// Calls `f` on every remaining document.
    pub fn for_each<F: FnMut(Document)>(&mut self, f: F) -> ShellResult<()> {
        self.consume_all(f)
    }

    /// Collects the remaining documents. What was read before a failure is
    /// still returned; check [Cursor::last_error].
    pub fn to_array(&mut self) -> Vec<Document> {
        let mut docs = Vec::new();
        self.consume_all(|doc| docs.push(doc)).ok();
        docs
    }

    pub fn try_to_array(&mut self) -> ShellResult<Vec<Document>> {
        let mut docs = Vec::new();
        self.consume_all(|doc| docs.push(doc))?;
        Ok(docs)
    }

    /// Collects the remaining documents decoded into `T`.
    ///
    /// Each document goes through serde in relaxed form: numbers are plain
    /// JSON numbers and dates ISO-8601 strings under `$date`.
    pub fn to_array_as<T: DeserializeOwned>(&mut self) -> ShellResult<Vec<T>> {
        let docs = self.try_to_array()?;
        let decoded = docs
            .iter()
            .map(|doc| -> ShellResult<T> {
                let json = to_relaxed_json(doc)?;
                Ok(serde_json::from_value(json)?)
            })
            .collect::<ShellResult<Vec<T>>>();

        decoded.inspect_err(|err| {
            log::error!("Failed to decode cursor results: {}", err);
            self.errors.record(err.clone());
        })
    }

    /// Drains the cursor and returns the number of documents read.
    pub fn count(&mut self) -> usize {
        let mut count = 0;
        self.consume_all(|_| count += 1).ok();
        count
    }

    /// Drains the cursor into shell-style text, one block per document.
    pub fn pretty(&mut self) -> String {
        let mut out = String::new();
        self.consume_all(|doc| out.push_str(&to_pretty_string(&doc))).ok();
        out
    }

    /// Drains the cursor into an indented extended JSON array.
    pub fn to_json_string(&mut self) -> String {
        let docs = self.to_array();
        to_extended_json_pretty(&Value::Array(docs.into_iter().map(Value::Document).collect()))
    }

    /// Releases the result stream and discards the buffer and the query.
    /// Closing a closed cursor is an error.
    pub fn close(&mut self) -> ShellResult<()> {
        if self.is_closed() {
            return Err(self.closed_error("close"));
        }
        self.release().inspect_err(|err| self.errors.record(err.clone()))
    }

    /// Iterates over the remaining documents. Iteration ends when the
    /// cursor closes; a fetch failure is yielded once.
    pub fn iter(&mut self) -> CursorIter<'_> {
        CursorIter { cursor: self }
    }

    fn fail(&self, kind: ErrorKind, message: &str) -> ShellError {
        log::error!("{}", message);
        let error = ShellError::new(message, kind);
        self.errors.record(error.clone());
        error
    }

    fn closed_error(&self, operation: &str) -> ShellError {
        self.fail(
            ErrorKind::ClosedCursorError,
            &format!("{} called on closed cursor", operation),
        )
    }

    // Configuration is only possible before the first read, and only on a
    // find cursor. Either violation closes the cursor.
    fn ensure_configurable(&mut self, operation: &str) -> ShellResult<()> {
        let error = if self.state != CursorState::Unopened {
            self.fail(
                ErrorKind::InvalidStateError,
                &format!("{} called on a cursor that is already {:?}", operation, self.state),
            )
        } else if !self.find {
            self.fail(
                ErrorKind::NotSupportedForAggregation,
                &format!("{} called on aggregation cursor", operation),
            )
        } else {
            return Ok(());
        };

        if let Err(close_error) = self.release() {
            log::warn!("Failed to release cursor: {}", close_error);
        }
        Err(error)
    }

    fn configure(&mut self, apply: impl FnOnce(&mut FindQuery)) -> ShellResult<()> {
        match self.spec.as_mut().and_then(QuerySpec::as_find_mut) {
            Some(query) => {
                apply(query);
                Ok(())
            }
            None => Err(self.fail(ErrorKind::InternalError, "cursor has no find query")),
        }
    }

    fn open(&mut self) -> ShellResult<()> {
        if self.state == CursorState::Open {
            return Ok(());
        }

        let opened = match (&self.spec, &self.executor) {
            (Some(QuerySpec::Find(query)), Some(executor)) => executor.execute_find(query),
            (Some(QuerySpec::Aggregate(stages)), Some(executor)) => {
                executor.execute_aggregate(stages)
            }
            _ => Err(ShellError::new("cursor has no query to run", ErrorKind::InternalError)),
        };

        match opened {
            Ok(stream) => {
                log::debug!("Opened {} cursor", if self.find { "find" } else { "aggregate" });
                self.stream = Some(stream);
                self.state = CursorState::Open;
                Ok(())
            }
            Err(err) => {
                log::error!("Failed to open cursor: {}", err);
                if let Err(close_error) = self.release() {
                    log::warn!("Failed to release cursor: {}", close_error);
                }
                self.errors.record(err.clone());
                Err(err)
            }
        }
    }

    // Returns the buffered document or pulls one from the stream, opening
    // it first if needed. The end of results and any failure close the
    // cursor; failures are recorded.
    fn fetch(&mut self) -> ShellResult<Option<Document>> {
        if let Some(doc) = self.buffer.take() {
            return Ok(Some(doc));
        }
        self.open()?;

        let fetched = match self.stream.as_mut() {
            Some(stream) => stream.next_document(),
            None => Ok(None),
        };

        let result = match fetched {
            Ok(Some(doc)) => return Ok(Some(doc)),
            Ok(None) => self.release().map(|_| None),
            Err(err) => {
                log::error!("Failed to fetch next document: {}", err);
                if let Err(close_error) = self.release() {
                    log::warn!("Failed to release cursor: {}", close_error);
                }
                Err(err)
            }
        };
        result.inspect_err(|err| self.errors.record(err.clone()))
    }

    fn release(&mut self) -> ShellResult<()> {
        self.state = CursorState::Closed;
        self.buffer = None;
        self.spec = None;
        self.executor = None;

        if let Some(mut stream) = self.stream.take() {
            stream.close()?;
            log::debug!("Closed {} cursor", if self.find { "find" } else { "aggregate" });
        }
        Ok(())
    }
}

impl Debug for Cursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("state", &self.state)
            .field("query", &self.spec)
            .field("buffered", &self.buffer.is_some())
            .finish()
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(err) = stream.close() {
                log::warn!("Failed to close result stream on drop: {}", err);
            }
        }
    }
}

/// Iterator over the remaining documents of a [Cursor].
pub struct CursorIter<'a> {
    cursor: &'a mut Cursor,
}

impl Iterator for CursorIter<'_> {
    type Item = ShellResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.is_closed() {
            return None;
        }
        self.cursor.fetch().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::store::memory::{FaultPoint, InMemoryDriver};
    use crate::store::DriverProvider;
    use std::time::Duration;

    fn zips() -> Vec<Document> {
        vec![
            doc! { "_id": 1, "city": "LA", "state": "CA", "pop": 300 },
            doc! { "_id": 2, "city": "NYC", "state": "NY", "pop": 800 },
            doc! { "_id": 3, "city": "SF", "state": "CA", "pop": 100 },
            doc! { "_id": 4, "city": "SD", "state": "CA", "pop": 200 },
            doc! { "_id": 5, "city": "SJ", "state": "CA", "pop": 150 },
        ]
    }

    fn executor(driver: &InMemoryDriver) -> QueryExecutor {
        let client = driver.connect("memory://test", Duration::from_secs(1)).unwrap();
        client
            .select_database("test")
            .unwrap()
            .select_collection("zips")
            .unwrap()
    }

    fn seeded() -> InMemoryDriver {
        let driver = InMemoryDriver::new();
        driver.seed("test", "zips", zips());
        driver
    }

    fn find(driver: &InMemoryDriver, filter: Document) -> (Cursor, ErrorSlot) {
        let slot = ErrorSlot::new();
        let cursor = Cursor::new(
            QuerySpec::Find(FindQuery::new(filter)),
            executor(driver),
            slot.child(),
        );
        (cursor, slot)
    }

    fn aggregate(driver: &InMemoryDriver, stages: Vec<Document>) -> Cursor {
        Cursor::new(QuerySpec::Aggregate(stages), executor(driver), ErrorSlot::new())
    }

    fn ids(docs: &[Document]) -> Vec<i32> {
        docs.iter()
            .filter_map(|doc| doc.get("_id").and_then(Value::as_i32))
            .collect()
    }

    #[test]
    fn test_new_cursor_is_unopened() {
        let driver = seeded();
        let (cursor, _) = find(&driver, doc! {});
        assert_eq!(cursor.state(), CursorState::Unopened);
        assert!(cursor.is_find_cursor());
        assert!(cursor.query().is_some());
        assert!(cursor.last_error().is_none());
    }

    #[test]
    fn test_sort_skip_limit_before_read() {
        let driver = seeded();
        let (cursor, _) = find(&driver, doc! { "state": "CA" });
        let mut cursor = cursor.sort(r#"{"pop": -1}"#).skip(1).limit(2);

        let query = cursor.query().and_then(QuerySpec::as_find).unwrap();
        assert_eq!(query.skip_value(), Some(1));
        assert_eq!(query.limit_value(), Some(2));

        assert_eq!(ids(&cursor.to_array()), vec![4, 5]);
        assert!(cursor.is_closed());
        assert!(cursor.last_error().is_none());
    }

    #[test]
    fn test_configuration_after_read_is_invalid() {
        let driver = seeded();
        let (mut cursor, _) = find(&driver, doc! {});
        assert!(cursor.has_next());

        let err = cursor.try_limit(1).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidStateError);
        assert!(cursor.is_closed());
    }

    #[test]
    fn test_configuration_after_close_is_invalid() {
        let driver = seeded();
        let (mut cursor, _) = find(&driver, doc! {});
        cursor.close().unwrap();
        let cursor = cursor.skip(2);
        assert_eq!(cursor.last_error().unwrap().kind(), &ErrorKind::InvalidStateError);
    }

    #[test]
    fn test_configuring_aggregate_cursor_closes_it() {
        let driver = seeded();
        let cursor = aggregate(&driver, vec![]).skip(1);
        assert_eq!(
            cursor.last_error().unwrap().kind(),
            &ErrorKind::NotSupportedForAggregation
        );
        assert!(cursor.is_closed());
    }

    #[test]
    fn test_bad_sort_spec_leaves_cursor_unopened() {
        let driver = seeded();
        let (mut cursor, _) = find(&driver, doc! {});
        let err = cursor.try_sort("[1]").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::TypeMismatch { .. }));
        assert_eq!(cursor.state(), CursorState::Unopened);
        assert!(cursor.query().and_then(QuerySpec::as_find).unwrap().sort_value().is_none());
        assert_eq!(cursor.count(), 5);
    }

    #[test]
    fn test_has_next_buffers_one_document() {
        let driver = seeded();
        let (mut cursor, _) = find(&driver, doc! { "_id": 2 });
        assert!(cursor.has_next());
        assert!(cursor.has_next());
        assert_eq!(cursor.state(), CursorState::Open);
        assert_eq!(cursor.next().get("city"), Some(&Value::from("NYC")));

        assert!(!cursor.has_next());
        assert!(cursor.is_closed());
        assert!(cursor.last_error().is_none());
    }

    #[test]
    fn test_has_next_on_closed_cursor() {
        let driver = seeded();
        let (mut cursor, _) = find(&driver, doc! {});
        cursor.close().unwrap();
        assert!(!cursor.has_next());
        assert_eq!(cursor.last_error().unwrap().kind(), &ErrorKind::ClosedCursorError);
    }

    #[test]
    fn test_next_past_the_end() {
        let driver = seeded();
        let (mut cursor, _) = find(&driver, doc! { "state": "TX" });
        assert_eq!(cursor.next(), Document::new());
        assert_eq!(cursor.last_error().unwrap().kind(), &ErrorKind::NoNextDocument);
        assert!(cursor.is_closed());

        let err = cursor.try_next().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ClosedCursorError);
    }

    #[test]
    fn test_consume_all_starts_with_buffered_document() {
        let driver = seeded();
        let (mut cursor, _) = find(&driver, doc! {});
        assert!(cursor.has_next());
        assert_eq!(ids(&cursor.to_array()), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_close_twice() {
        let driver = seeded();
        let (mut cursor, _) = find(&driver, doc! {});
        assert!(cursor.close().is_ok());
        assert!(cursor.query().is_none());
        let err = cursor.close().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ClosedCursorError);
    }

    #[test]
    fn test_open_failure_closes_and_mirrors() {
        let driver = seeded();
        let (mut cursor, parent) = find(&driver, doc! {});
        driver.fail_next(FaultPoint::Find, "server unavailable");

        assert!(!cursor.has_next());
        assert!(cursor.is_closed());
        assert_eq!(cursor.last_error().unwrap().message(), "server unavailable");
        assert_eq!(parent.get().unwrap().message(), "server unavailable");
    }

    #[test]
    fn test_fetch_failure_keeps_collected_documents() {
        let driver = seeded();
        let (mut cursor, _) = find(&driver, doc! {});
        assert!(cursor.has_next());

        driver.fail_next(FaultPoint::Fetch, "connection reset");
        assert_eq!(ids(&cursor.to_array()), vec![1]);
        assert!(cursor.is_closed());
        assert_eq!(cursor.last_error().unwrap().kind(), &ErrorKind::ExecutorError);
    }

    #[test]
    fn test_stream_close_failure_is_recorded() {
        let driver = seeded();
        let (mut cursor, _) = find(&driver, doc! {});
        assert!(cursor.has_next());
        driver.fail_next(FaultPoint::CloseStream, "kill cursors failed");
        assert!(cursor.close().is_err());
        assert!(cursor.is_closed());
        assert_eq!(cursor.last_error().unwrap().message(), "kill cursors failed");
    }

    #[test]
    fn test_count_and_pretty_close_cursor() {
        let driver = seeded();
        let (mut cursor, _) = find(&driver, doc! { "state": "CA" });
        assert_eq!(cursor.count(), 4);
        assert!(cursor.is_closed());

        let (mut cursor, _) = find(&driver, doc! { "_id": 2 });
        assert_eq!(
            cursor.pretty(),
            "{ \n    _id : 2 \n    city : \"NYC\" \n    state : \"NY\" \n    pop : 800 \n} \n"
        );
        assert_eq!(cursor.count(), 0);
        assert_eq!(cursor.last_error().unwrap().kind(), &ErrorKind::ClosedCursorError);
    }

    #[test]
    fn test_to_json_string() {
        let driver = seeded();
        let (mut cursor, _) = find(&driver, doc! { "_id": 3 });
        let text = cursor.to_json_string();
        let parsed = crate::json::parse(&text).unwrap();
        assert_eq!(parsed.as_array().map(Vec::len), Some(1));
        assert!(text.contains("\"SF\""));
    }

    #[test]
    fn test_to_array_as() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Zip {
            city: String,
            pop: i64,
        }

        let driver = seeded();
        let (cursor, _) = find(&driver, doc! { "state": "NY" });
        let mut cursor = cursor.sort(r#"{"pop": 1}"#);
        let zips: Vec<Zip> = cursor.to_array_as().unwrap();
        assert_eq!(
            zips,
            vec![Zip {
                city: "NYC".to_string(),
                pop: 800
            }]
        );
    }

    #[test]
    fn test_to_array_as_records_decode_failure() {
        #[derive(serde::Deserialize, Debug)]
        #[allow(dead_code)]
        struct Wrong {
            missing: String,
        }

        let driver = seeded();
        let (mut cursor, _) = find(&driver, doc! {});
        let err = cursor.to_array_as::<Wrong>().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::EncodingError);
        assert_eq!(cursor.last_error().unwrap().kind(), &ErrorKind::EncodingError);
    }

    #[test]
    fn test_aggregate_cursor() {
        let driver = seeded();
        let mut cursor = aggregate(
            &driver,
            vec![doc! { "$match": { "state": "CA" } }, doc! { "$sort": { "pop": 1 } }],
        );
        assert!(!cursor.is_find_cursor());
        assert_eq!(ids(&cursor.to_array()), vec![3, 5, 4, 1]);
    }

    #[test]
    fn test_iter() {
        let driver = seeded();
        let (mut cursor, _) = find(&driver, doc! { "state": "CA" });
        let docs = cursor.iter().collect::<ShellResult<Vec<_>>>().unwrap();
        assert_eq!(docs.len(), 4);
        assert!(cursor.is_closed());
        assert!(cursor.iter().next().is_none());
    }

    #[test]
    fn test_iter_yields_failure_once() {
        let driver = seeded();
        let (mut cursor, _) = find(&driver, doc! {});
        driver.fail_next(FaultPoint::Find, "boom");
        let mut iter = cursor.iter();
        assert!(matches!(iter.next(), Some(Err(_))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_poisoned_cursor() {
        let parent = ErrorSlot::new();
        let error = ShellError::new("bad filter", ErrorKind::UnsupportedTopLevelType);
        let mut cursor = Cursor::poisoned(error, true, parent.child());
        assert!(cursor.is_closed());
        assert_eq!(parent.kind(), Some(ErrorKind::UnsupportedTopLevelType));
        assert_eq!(cursor.to_array(), Vec::<Document>::new());
        assert_eq!(cursor.last_error().unwrap().kind(), &ErrorKind::ClosedCursorError);
        assert_eq!(parent.kind(), Some(ErrorKind::UnsupportedTopLevelType));
    }
}
