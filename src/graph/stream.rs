use std::iter::FusedIterator;

use crate::{errors::Result, statement::StatementHandle};

type RowMapper<T> = fn(&StatementHandle<'_>) -> Result<T>;

/// Single-pass, forward-only rows of one statement.
///
/// The statement stays prepared until the rows are exhausted, a step or mapping
/// error is yielded, [`release`](LazyRows::release) is called, or the value is
/// dropped, whichever comes first. After that the iterator only returns `None`.
pub struct LazyRows<'conn, T> {
    stmt: Option<StatementHandle<'conn>>,
    map: RowMapper<T>,
}

impl<'conn, T> LazyRows<'conn, T> {
    pub(crate) fn new(stmt: StatementHandle<'conn>, map: RowMapper<T>) -> Self {
        Self {
            stmt: Some(stmt),
            map,
        }
    }

    /// Finalizes the statement now; remaining rows are discarded.
    pub fn release(&mut self) {
        self.stmt.take();
    }

    pub fn is_released(&self) -> bool {
        self.stmt.is_none()
    }
}

impl<T> Iterator for LazyRows<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let stmt = self.stmt.as_mut()?;
        let item = match stmt.step() {
            Ok(true) => (self.map)(stmt),
            Ok(false) => {
                self.release();
                return None;
            }
            Err(err) => Err(err),
        };
        if item.is_err() {
            self.release();
        }
        Some(item)
    }
}

impl<T> FusedIterator for LazyRows<'_, T> {}
