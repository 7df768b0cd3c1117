//! Random access over large query results, one page in memory at a time.

use std::cell::RefCell;
use std::marker::PhantomData;

use tracing::{error, trace};

use crate::condition::DbCondition;
use crate::connection::{DbConnect, DbConnectExt};
use crate::entity::Entity;
use crate::error::SqlConnectError;

/// Rows fetched per page unless [`ResultPages::with_page_size`] says otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 50;

struct Page<E> {
    index: usize,
    rows: Vec<E>,
}

/// Paged, read-only view over the entities one condition selects.
///
/// The total is counted once at construction and not revalidated. At most
/// one page of decoded rows is cached; touching another page replaces it.
///
/// ```rust,no_run
/// use sql_connect::prelude::*;
/// # #[derive(Debug, Clone, Default)]
/// # struct Person { id: u64, name: String }
/// # sql_connect::impl_entity!(Person, "person", [name]);
///
/// # fn demo(conn: &dyn DbConnect) -> Result<(), SqlConnectError> {
/// let people = conn.query::<Person>(Field::new("name").like("a%"))?;
/// for person in &people {
///     println!("{}", person.name);
/// }
/// let first = people.at(0)?;
/// # let _ = first;
/// # Ok(())
/// # }
/// ```
pub struct ResultPages<'c, E: Entity, C: DbConnect + ?Sized = dyn DbConnect + 'c> {
    conn: Option<&'c C>,
    cond: DbCondition,
    size: usize,
    page_size: usize,
    cache: RefCell<Option<Page<E>>>,
    _entity: PhantomData<E>,
}

impl<E: Entity, C: DbConnect + ?Sized> Default for ResultPages<'_, E, C> {
    fn default() -> Self {
        Self {
            conn: None,
            cond: DbCondition::default(),
            size: 0,
            page_size: DEFAULT_PAGE_SIZE,
            cache: RefCell::new(None),
            _entity: PhantomData,
        }
    }
}

impl<'c, E: Entity, C: DbConnect + ?Sized> ResultPages<'c, E, C> {
    /// Count the rows `cond` selects and prepare an empty page cache.
    ///
    /// # Errors
    ///
    /// The counting query's errors.
    pub fn new(conn: &'c C, cond: DbCondition) -> Result<Self, SqlConnectError> {
        let size = conn.count::<E>(&cond)?;
        Ok(Self {
            conn: Some(conn),
            cond,
            size,
            page_size: DEFAULT_PAGE_SIZE,
            cache: RefCell::new(None),
            _entity: PhantomData,
        })
    }

    /// Change the page size (minimum 1). Drops any cached page.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self.cache = RefCell::new(None);
        self
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.size.div_ceil(self.page_size)
    }

    /// Lenient access: an out-of-range index yields a default entity whose
    /// identity is 0.
    ///
    /// A failed page load also yields the default entity, but is logged at
    /// `error`; use [`at`](Self::at) to see the failure.
    #[must_use]
    pub fn get(&self, index: usize) -> E {
        match self.at(index) {
            Ok(item) => item,
            Err(SqlConnectError::OutOfRange(_)) => E::default(),
            Err(err) => {
                error!(table = E::TABLE, index, error = %err, "page load failed");
                E::default()
            }
        }
    }

    /// Strict access.
    ///
    /// # Errors
    ///
    /// `OutOfRange` when `index >= size()`, or the page query's errors.
    pub fn at(&self, index: usize) -> Result<E, SqlConnectError> {
        if index >= self.size {
            return Err(SqlConnectError::OutOfRange(format!(
                "index {index} (size {})",
                self.size
            )));
        }
        let page_index = index / self.page_size;
        let offset = index % self.page_size;

        let cached = self
            .cache
            .borrow()
            .as_ref()
            .is_some_and(|page| page.index == page_index);
        if !cached {
            let rows = self.load_page(page_index)?;
            *self.cache.borrow_mut() = Some(Page {
                index: page_index,
                rows,
            });
        }

        self.cache
            .borrow()
            .as_ref()
            .and_then(|page| page.rows.get(offset).cloned())
            .ok_or_else(|| {
                SqlConnectError::OutOfRange(format!(
                    "index {index} is past the rows now present"
                ))
            })
    }

    pub fn iter(&self) -> PageIter<'_, 'c, E, C> {
        PageIter {
            pages: self,
            next: 0,
            failure: None,
        }
    }

    fn page_sql(&self, page_index: usize) -> String {
        let mut base = format!("{}{}", E::select_sql(), self.cond.where_clause());
        if !self.cond.has_order() && !self.cond.has_limit() {
            base.push_str(&format!(" ORDER BY {}", E::ID_COLUMN));
        }
        let offset = page_index * self.page_size;
        if self.cond.has_limit() {
            format!(
                "SELECT * FROM ({base}) AS q LIMIT {} OFFSET {offset}",
                self.page_size
            )
        } else {
            format!("{base} LIMIT {} OFFSET {offset}", self.page_size)
        }
    }

    fn load_page(&self, page_index: usize) -> Result<Vec<E>, SqlConnectError> {
        let Some(conn) = self.conn else {
            return Ok(Vec::new());
        };
        let sql = self.page_sql(page_index);
        trace!(page = page_index, sql = %sql, "loading page");
        let mut rows = Vec::with_capacity(self.page_size);
        conn.batch_load_view(&mut rows, &sql)?;
        Ok(rows)
    }
}

/// Sequential traversal built on the page cache.
///
/// Stops early when a page fails to load; [`PageIter::failure`] then holds
/// the error.
pub struct PageIter<'p, 'c, E: Entity, C: DbConnect + ?Sized> {
    pages: &'p ResultPages<'c, E, C>,
    next: usize,
    failure: Option<SqlConnectError>,
}

impl<E: Entity, C: DbConnect + ?Sized> PageIter<'_, '_, E, C> {
    /// The page load error that ended the traversal early, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&SqlConnectError> {
        self.failure.as_ref()
    }
}

impl<E: Entity, C: DbConnect + ?Sized> Iterator for PageIter<'_, '_, E, C> {
    type Item = E;

    fn next(&mut self) -> Option<E> {
        if self.failure.is_some() || self.next >= self.pages.size() {
            return None;
        }
        match self.pages.at(self.next) {
            Ok(item) => {
                self.next += 1;
                Some(item)
            }
            Err(err) => {
                error!(
                    table = E::TABLE,
                    index = self.next,
                    error = %err,
                    "page load failed, stopping"
                );
                self.failure = Some(err);
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failure.is_some() {
            return (0, Some(0));
        }
        let left = self.pages.size().saturating_sub(self.next);
        (0, Some(left))
    }
}

impl<'p, 'c, E: Entity, C: DbConnect + ?Sized> IntoIterator for &'p ResultPages<'c, E, C> {
    type Item = E;
    type IntoIter = PageIter<'p, 'c, E, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
