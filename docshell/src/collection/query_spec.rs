use crate::collection::Document;

/// A find-style query: filter plus optional projection, sort, skip and
/// limit, as handed to [crate::store::QueryExecutorProvider::execute_find].
///
/// # Examples
///
/// ```rust
/// use docshell::collection::FindQuery;
/// use docshell::doc;
///
/// let query = FindQuery::new(doc! { "state": "CA" })
///     .sort(doc! { "pop": (-1) })
///     .limit(3);
/// assert_eq!(query.limit_value(), Some(3));
/// assert!(query.skip_value().is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    pub(crate) filter: Document,
    pub(crate) projection: Option<Document>,
    pub(crate) sort: Option<Document>,
    pub(crate) skip: Option<u64>,
    pub(crate) limit: Option<u64>,
}

impl FindQuery {
    pub fn new(filter: Document) -> FindQuery {
        FindQuery {
            filter,
            ..FindQuery::default()
        }
    }

    pub fn projection(mut self, projection: Document) -> FindQuery {
        self.projection = Some(projection);
        self
    }

    pub fn sort(mut self, sort: Document) -> FindQuery {
        self.sort = Some(sort);
        self
    }

    pub fn skip(mut self, skip: u64) -> FindQuery {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: u64) -> FindQuery {
        self.limit = Some(limit);
        self
    }

    pub fn filter_value(&self) -> &Document {
        &self.filter
    }

    pub fn projection_value(&self) -> Option<&Document> {
        self.projection.as_ref()
    }

    pub fn sort_value(&self) -> Option<&Document> {
        self.sort.as_ref()
    }

    pub fn skip_value(&self) -> Option<u64> {
        self.skip
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }
}

/// What a cursor runs when it is first read.
#[derive(Debug, Clone, PartialEq)]
pub enum QuerySpec {
    Find(FindQuery),
    /// Ordered pipeline stages.
    Aggregate(Vec<Document>),
}

impl QuerySpec {
    pub fn is_find(&self) -> bool {
        matches!(self, QuerySpec::Find(_))
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, QuerySpec::Aggregate(_))
    }

    pub fn as_find(&self) -> Option<&FindQuery> {
        match self {
            QuerySpec::Find(query) => Some(query),
            QuerySpec::Aggregate(_) => None,
        }
    }

    pub(crate) fn as_find_mut(&mut self) -> Option<&mut FindQuery> {
        match self {
            QuerySpec::Find(query) => Some(query),
            QuerySpec::Aggregate(_) => None,
        }
    }

    pub fn stages(&self) -> Option<&[Document]> {
        match self {
            QuerySpec::Find(_) => None,
            QuerySpec::Aggregate(stages) => Some(stages),
        }
    }
}
