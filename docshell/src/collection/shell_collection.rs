use crate::collection::{
    Cursor, DeleteResult, Document, FindQuery, InsertManyResult, InsertOneResult, QuerySpec,
};
use crate::common::{AllowedShapes, ErrorSlot};
use crate::errors::{ShellError, ShellResult};
use crate::store::QueryExecutor;
use crate::verify::{verify_document, verify_documents, Param};

#[derive(Clone)]
enum Binding {
    Bound(QueryExecutor),
    /// Handed out when no collection could be selected; every operation
    /// fails with the stored error.
    Unbound(ShellError),
}

/// A named collection of the current database.
///
/// Every operation first clears this collection's error slot, then
/// verifies its parameters and runs against the driver. Failures are
/// recorded here and mirrored to the database (see [ErrorSlot]); the plain
/// methods return an empty result while the `try_*` methods return the
/// error.
///
/// Parameters accept anything convertible into [Param]: extended JSON text,
/// a [Document], a map, or `()` for "absent".
#[derive(Clone)]
pub struct Collection {
    name: String,
    database_name: Option<String>,
    binding: Binding,
    errors: ErrorSlot,
}

impl Collection {
    pub(crate) fn bound(
        name: &str,
        database_name: &str,
        executor: QueryExecutor,
        errors: ErrorSlot,
    ) -> Collection {
        Collection {
            name: name.to_string(),
            database_name: Some(database_name.to_string()),
            binding: Binding::Bound(executor),
            errors,
        }
    }

    pub(crate) fn unbound(name: &str, error: ShellError, errors: ErrorSlot) -> Collection {
        Collection {
            name: name.to_string(),
            database_name: None,
            binding: Binding::Unbound(error),
            errors,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the owning database; `None` for an unbound collection.
    pub fn database_name(&self) -> Option<&str> {
        self.database_name.as_deref()
    }

    pub fn last_error(&self) -> Option<ShellError> {
        self.errors.get()
    }

    /// Starts a find cursor. `filter` and `projection` may be ordered or
    /// unordered documents; absent means "everything".
    pub fn find<F: Into<Param>, P: Into<Param>>(&self, filter: F, projection: P) -> Cursor {
        self.errors.clear();
        match self.prepare_find(filter, projection) {
            Ok((query, executor)) => {
                Cursor::new(QuerySpec::Find(query), executor, self.errors.child())
            }
            Err(err) => Cursor::poisoned(err, true, self.errors.child()),
        }
    }

    pub fn try_find<F: Into<Param>, P: Into<Param>>(
        &self,
        filter: F,
        projection: P,
    ) -> ShellResult<Cursor> {
        self.errors.clear();
        let (query, executor) = self.track(self.prepare_find(filter, projection))?;
        Ok(Cursor::new(QuerySpec::Find(query), executor, self.errors.child()))
    }

    /// Starts an aggregation cursor. The pipeline must be an array of
    /// ordered documents; a single document is taken as a one-stage
    /// pipeline.
    pub fn aggregate<P: Into<Param>>(&self, pipeline: P) -> Cursor {
        self.errors.clear();
        match self.prepare_aggregate(pipeline) {
            Ok((stages, executor)) => {
                Cursor::new(QuerySpec::Aggregate(stages), executor, self.errors.child())
            }
            Err(err) => Cursor::poisoned(err, false, self.errors.child()),
        }
    }

    pub fn try_aggregate<P: Into<Param>>(&self, pipeline: P) -> ShellResult<Cursor> {
        self.errors.clear();
        let (stages, executor) = self.track(self.prepare_aggregate(pipeline))?;
        Ok(Cursor::new(QuerySpec::Aggregate(stages), executor, self.errors.child()))
    }

    /// Returns the first matching document, or an empty document when
    /// nothing matches or the query fails.
    pub fn find_one<F: Into<Param>, P: Into<Param>>(&self, filter: F, projection: P) -> Document {
        self.try_find_one(filter, projection).unwrap_or_default()
    }

    pub fn try_find_one<F: Into<Param>, P: Into<Param>>(
        &self,
        filter: F,
        projection: P,
    ) -> ShellResult<Document> {
        self.errors.clear();
        let (query, executor) = self.track(self.prepare_find(filter, projection))?;
        let mut cursor = Cursor::new(
            QuerySpec::Find(query.limit(1)),
            executor,
            self.errors.clone(),
        );
        cursor.try_next()
    }

    pub fn insert_one<P: Into<Param>>(&self, doc: P) -> InsertOneResult {
        self.try_insert_one(doc).unwrap_or_default()
    }

    pub fn try_insert_one<P: Into<Param>>(&self, doc: P) -> ShellResult<InsertOneResult> {
        self.errors.clear();
        let result = self.executor().and_then(|executor| {
            let doc = verify_document(doc, AllowedShapes::ANY_DOCUMENT)?;
            let inserted_id = executor.insert_one(doc)?;
            Ok(InsertOneResult { inserted_id })
        });
        self.track(result)
    }

    /// Inserts a batch of documents; a single document is accepted as a
    /// batch of one. Either every document is stored or none is.
    pub fn insert_many<P: Into<Param>>(&self, docs: P) -> InsertManyResult {
        self.try_insert_many(docs).unwrap_or_default()
    }

    pub fn try_insert_many<P: Into<Param>>(&self, docs: P) -> ShellResult<InsertManyResult> {
        self.errors.clear();
        let result = self.executor().and_then(|executor| {
            let docs = verify_documents(docs, AllowedShapes::ARRAY_OF_ORDERED_DOCUMENT)?;
            let inserted_ids = executor.insert_many(docs)?;
            Ok(InsertManyResult { inserted_ids })
        });
        self.track(result)
    }

    pub fn delete_one<F: Into<Param>>(&self, filter: F) -> DeleteResult {
        self.try_delete_one(filter).unwrap_or_default()
    }

    pub fn try_delete_one<F: Into<Param>>(&self, filter: F) -> ShellResult<DeleteResult> {
        self.errors.clear();
        let result = self.executor().and_then(|executor| {
            let filter = verify_document(filter, AllowedShapes::ANY_DOCUMENT)?;
            let deleted_count = executor.delete_one(&filter)?;
            Ok(DeleteResult { deleted_count })
        });
        self.track(result)
    }

    pub fn delete_many<F: Into<Param>>(&self, filter: F) -> DeleteResult {
        self.try_delete_many(filter).unwrap_or_default()
    }

    pub fn try_delete_many<F: Into<Param>>(&self, filter: F) -> ShellResult<DeleteResult> {
        self.errors.clear();
        let result = self.executor().and_then(|executor| {
            let filter = verify_document(filter, AllowedShapes::ANY_DOCUMENT)?;
            let deleted_count = executor.delete_many(&filter)?;
            Ok(DeleteResult { deleted_count })
        });
        self.track(result)
    }

    fn executor(&self) -> ShellResult<&QueryExecutor> {
        match &self.binding {
            Binding::Bound(executor) => Ok(executor),
            Binding::Unbound(error) => {
                log::error!("Collection {} is not usable: {}", self.name, error);
                Err(error.clone())
            }
        }
    }

    fn prepare_find<F: Into<Param>, P: Into<Param>>(
        &self,
        filter: F,
        projection: P,
    ) -> ShellResult<(FindQuery, QueryExecutor)> {
        let executor = self.executor()?.clone();
        let filter = verify_document(filter, AllowedShapes::ANY_DOCUMENT)?;
        let projection = verify_document(projection, AllowedShapes::ANY_DOCUMENT)?;

        let query = FindQuery::new(filter);
        let query = if projection.is_empty() {
            query
        } else {
            query.projection(projection)
        };
        Ok((query, executor))
    }

    fn prepare_aggregate<P: Into<Param>>(
        &self,
        pipeline: P,
    ) -> ShellResult<(Vec<Document>, QueryExecutor)> {
        let executor = self.executor()?.clone();
        let stages = verify_documents(pipeline, AllowedShapes::ARRAY_OF_ORDERED_DOCUMENT)?;
        Ok((stages, executor))
    }

    fn track<T>(&self, result: ShellResult<T>) -> ShellResult<T> {
        result.inspect_err(|err| self.errors.record(err.clone()))
    }
}
