//! Owned wrapper around one prepared SQLite statement.
//!
//! The wrapper talks to the engine through `rusqlite::ffi` so a statement can be
//! stepped one row at a time and moved into a lazy result sequence without
//! borrowing from a separate `Rows` value. Every handle is finalized exactly once
//! when it is dropped, whatever path drops it.

use std::{
    ffi::{CStr, CString, c_char, c_int, c_void},
    marker::PhantomData,
    ptr::{self, NonNull},
    slice,
};

use rusqlite::{
    Connection, ffi,
    types::{Value, ValueRef},
};
use tracing::debug;

use crate::{
    errors::{GraphError, Result},
    metrics::StoreMetrics,
    trace::TraceSlot,
};

pub struct StatementHandle<'conn> {
    raw: NonNull<ffi::sqlite3_stmt>,
    db: *mut ffi::sqlite3,
    sql: String,
    next_index: c_int,
    started: bool,
    has_row: bool,
    metrics: Option<&'conn StoreMetrics>,
    trace: Option<&'conn TraceSlot>,
    _conn: PhantomData<&'conn Connection>,
}

impl<'conn> StatementHandle<'conn> {
    pub fn prepare(conn: &'conn Connection, sql: &str) -> Result<Self> {
        Self::prepare_observed(conn, sql, None, None)
    }

    /// Prepares `sql`, reporting lifecycle events to `metrics` and expanded SQL
    /// to whatever sink `trace` holds at the time of each step.
    pub fn prepare_observed(
        conn: &'conn Connection,
        sql: &str,
        metrics: Option<&'conn StoreMetrics>,
        trace: Option<&'conn TraceSlot>,
    ) -> Result<Self> {
        let c_sql =
            CString::new(sql).map_err(|e| GraphError::query_execution(e.to_string(), sql))?;
        // SAFETY: the pointer is only used while `conn` is borrowed for 'conn.
        let db = unsafe { conn.handle() };
        let mut raw: *mut ffi::sqlite3_stmt = ptr::null_mut();
        // SAFETY: `db` is an open connection and `c_sql` is NUL-terminated.
        let rc =
            unsafe { ffi::sqlite3_prepare_v2(db, c_sql.as_ptr(), -1, &mut raw, ptr::null_mut()) };
        if rc != ffi::SQLITE_OK {
            let message = connection_message(db);
            debug!(sql, %message, "prepare failed");
            return Err(GraphError::query_execution(message, sql));
        }
        let raw = NonNull::new(raw)
            .ok_or_else(|| GraphError::query_execution("statement contains no SQL", sql))?;
        if let Some(metrics) = metrics {
            metrics.record_prepare();
        }
        Ok(Self {
            raw,
            db,
            sql: sql.to_string(),
            next_index: 1,
            started: false,
            has_row: false,
            metrics,
            trace,
            _conn: PhantomData,
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Binds `value` at the next positional parameter, starting at 1.
    pub fn bind(&mut self, value: ValueRef<'_>) -> Result<()> {
        let stmt = self.raw.as_ptr();
        let index = self.next_index;
        // SAFETY: `stmt` is a live prepared statement; text and blob bytes are
        // copied by the engine (SQLITE_TRANSIENT) before the call returns.
        let rc = unsafe {
            match value {
                ValueRef::Null => ffi::sqlite3_bind_null(stmt, index),
                ValueRef::Integer(i) => ffi::sqlite3_bind_int64(stmt, index, i),
                ValueRef::Real(r) => ffi::sqlite3_bind_double(stmt, index, r),
                ValueRef::Text(text) => ffi::sqlite3_bind_text(
                    stmt,
                    index,
                    text.as_ptr().cast::<c_char>(),
                    byte_len(text.len())?,
                    ffi::SQLITE_TRANSIENT(),
                ),
                ValueRef::Blob(bytes) => ffi::sqlite3_bind_blob(
                    stmt,
                    index,
                    bytes.as_ptr().cast::<c_void>(),
                    byte_len(bytes.len())?,
                    ffi::SQLITE_TRANSIENT(),
                ),
            }
        };
        if rc != ffi::SQLITE_OK {
            return Err(GraphError::binding(status_message(rc)));
        }
        self.next_index += 1;
        Ok(())
    }

    pub fn bind_text(&mut self, text: &str) -> Result<()> {
        self.bind(ValueRef::Text(text.as_bytes()))
    }

    pub fn bind_null(&mut self) -> Result<()> {
        self.bind(ValueRef::Null)
    }

    pub fn bind_optional_text(&mut self, text: Option<&str>) -> Result<()> {
        match text {
            Some(text) => self.bind_text(text),
            None => self.bind_null(),
        }
    }

    /// Advances to the next row. Returns `false` once the statement is done.
    pub fn step(&mut self) -> Result<bool> {
        if !self.started {
            self.started = true;
            if let Some(metrics) = self.metrics {
                metrics.record_execute();
            }
            self.emit_trace(false);
        }
        // SAFETY: `raw` is a live prepared statement owned by this handle.
        let rc = unsafe { ffi::sqlite3_step(self.raw.as_ptr()) };
        match rc {
            ffi::SQLITE_ROW => {
                self.has_row = true;
                if let Some(metrics) = self.metrics {
                    metrics.record_row();
                }
                self.emit_trace(true);
                Ok(true)
            }
            ffi::SQLITE_DONE | ffi::SQLITE_OK => {
                self.has_row = false;
                Ok(false)
            }
            _ => {
                self.has_row = false;
                Err(GraphError::binding(connection_message(self.db)))
            }
        }
    }

    /// Steps until the statement is done and returns the number of rows it changed.
    pub fn execute(&mut self) -> Result<usize> {
        while self.step()? {}
        // SAFETY: `db` outlives this handle.
        let changes = unsafe { ffi::sqlite3_changes(self.db) };
        Ok(usize::try_from(changes).unwrap_or(0))
    }

    pub fn column_count(&self) -> usize {
        // SAFETY: `raw` is a live prepared statement.
        let count = unsafe { ffi::sqlite3_column_count(self.raw.as_ptr()) };
        usize::try_from(count).unwrap_or(0)
    }

    /// Value of column `index` in the current row, typed by its storage class.
    /// Returns `Value::Null` when there is no current row or the index is out of range.
    pub fn column(&self, index: usize) -> Value {
        if !self.has_row || index >= self.column_count() {
            return Value::Null;
        }
        let stmt = self.raw.as_ptr();
        let col = index as c_int;
        // SAFETY: a row is available and `col` is within the column count.
        unsafe {
            match ffi::sqlite3_column_type(stmt, col) {
                ffi::SQLITE_INTEGER => Value::Integer(ffi::sqlite3_column_int64(stmt, col)),
                ffi::SQLITE_FLOAT => Value::Real(ffi::sqlite3_column_double(stmt, col)),
                ffi::SQLITE_TEXT => {
                    let text = ffi::sqlite3_column_text(stmt, col);
                    let bytes = column_bytes(text.cast::<u8>(), ffi::sqlite3_column_bytes(stmt, col));
                    Value::Text(String::from_utf8_lossy(bytes).into_owned())
                }
                ffi::SQLITE_BLOB => {
                    let blob = ffi::sqlite3_column_blob(stmt, col);
                    let bytes = column_bytes(blob.cast::<u8>(), ffi::sqlite3_column_bytes(stmt, col));
                    Value::Blob(bytes.to_vec())
                }
                _ => Value::Null,
            }
        }
    }

    /// Column `index` as text; `None` for SQL NULL.
    pub fn column_text(&self, index: usize) -> Option<String> {
        match self.column(index) {
            Value::Null => None,
            Value::Text(text) => Some(text),
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(r) => Some(r.to_string()),
            Value::Blob(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        }
    }

    /// The statement text with current bindings substituted.
    pub fn expanded_sql(&self) -> Option<String> {
        // SAFETY: the returned buffer is owned by us and released with sqlite3_free.
        unsafe {
            let expanded = ffi::sqlite3_expanded_sql(self.raw.as_ptr());
            if expanded.is_null() {
                return None;
            }
            let text = CStr::from_ptr(expanded).to_string_lossy().into_owned();
            ffi::sqlite3_free(expanded.cast::<c_void>());
            Some(text)
        }
    }

    fn emit_trace(&self, row_event: bool) {
        let Some(sink) = self.trace.and_then(TraceSlot::current) else {
            return;
        };
        if row_event && !sink.include_rows() {
            return;
        }
        match self.expanded_sql() {
            Some(text) => sink.emit(&text),
            None => sink.emit(&self.sql),
        }
    }
}

impl Drop for StatementHandle<'_> {
    fn drop(&mut self) {
        // SAFETY: `raw` came from sqlite3_prepare_v2 and is finalized only here.
        let rc = unsafe { ffi::sqlite3_finalize(self.raw.as_ptr()) };
        if let Some(metrics) = self.metrics {
            metrics.record_finalize();
        }
        if rc != ffi::SQLITE_OK {
            debug!(sql = %self.sql, code = rc, "statement finalized with error status");
        }
    }
}

fn byte_len(len: usize) -> Result<c_int> {
    c_int::try_from(len).map_err(|_| GraphError::binding("value exceeds the engine's length limit"))
}

unsafe fn column_bytes<'a>(data: *const u8, len: c_int) -> &'a [u8] {
    match usize::try_from(len) {
        Ok(len) if !data.is_null() && len > 0 => unsafe { slice::from_raw_parts(data, len) },
        _ => &[],
    }
}

fn status_message(code: c_int) -> String {
    // SAFETY: sqlite3_errstr returns a static NUL-terminated string.
    unsafe { CStr::from_ptr(ffi::sqlite3_errstr(code)) }
        .to_string_lossy()
        .into_owned()
}

fn connection_message(db: *mut ffi::sqlite3) -> String {
    // SAFETY: `db` is an open connection; the message is copied before returning.
    unsafe { CStr::from_ptr(ffi::sqlite3_errmsg(db)) }
        .to_string_lossy()
        .into_owned()
}
