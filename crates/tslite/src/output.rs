//! Point output: formatting retrieved records into text lines.
//!
//! A sink receives `(key, value)` pairs from a database handle, prints them
//! as `<time> <data>\n` through the codec, applies the optional column
//! projection and the optional [`Filter`], and escapes `#` at line starts
//! when SPP mode is on (the surrounding single-point protocol forbids an
//! unescaped `#` in column 0).

use crate::codec::Key;
use crate::error::Result;
use crate::filter::Filter;
use crate::schema::Schema;
use std::io::Write;

/// Receiver for the points a query emits.
///
/// `proc_point` returns `false` to stop an ongoing range scan early.
pub trait PointOutput {
    /// Handles one retrieved record.
    fn proc_point(&mut self, key: &[u8], value: &[u8], schema: &Schema) -> Result<bool>;
}

/// Escapes text for the single-point protocol: every line that starts with
/// `#` is prefixed with a space.
pub fn spp_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 1);
    let mut at_line_start = true;
    for ch in text.chars() {
        if at_line_start && ch == '#' {
            out.push(' ');
        }
        out.push(ch);
        at_line_start = ch == '\n';
    }
    out
}

/// The standard output sink: writer, optional column projection, SPP flag
/// and optional filter with its per-query storage string.
pub struct DbOut<W: Write> {
    out: W,
    col: Option<usize>,
    spp: bool,
    filter: Option<Box<dyn Filter>>,
    storage: String,
}

impl<W: Write> DbOut<W> {
    /// A sink writing to `out` with no projection, no SPP and no filter.
    pub fn new(out: W) -> Self {
        DbOut {
            out,
            col: None,
            spp: false,
            filter: None,
            storage: String::new(),
        }
    }

    /// Restricts output to one value column.
    pub fn with_column(mut self, col: Option<usize>) -> Self {
        self.col = col;
        self
    }

    /// Enables SPP escaping.
    pub fn with_spp(mut self, spp: bool) -> Self {
        self.spp = spp;
        self
    }

    /// Installs a filter; its storage string persists for this sink's life.
    pub fn with_filter(mut self, filter: Box<dyn Filter>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// The filter storage accumulated so far.
    pub fn storage(&self) -> &str {
        &self.storage
    }

    /// Consumes the sink, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl DbOut<Vec<u8>> {
    /// A sink capturing output in memory, for HTTP-style string responses.
    pub fn buffered() -> Self {
        DbOut::new(Vec::new())
    }

    /// The captured output as a string.
    pub fn into_string(self) -> String {
        String::from_utf8_lossy(&self.out).into_owned()
    }
}

impl<W: Write> PointOutput for DbOut<W> {
    fn proc_point(&mut self, key: &[u8], value: &[u8], schema: &Schema) -> Result<bool> {
        let mut time = schema.ttype.print(key)?;
        let mut values = schema.dtype.print_vec(value, self.col)?;
        if let Some(filter) = self.filter.as_mut() {
            if !filter.run(&mut time, &mut values, &mut self.storage)? {
                return Ok(true);
            }
        }
        let line = format!("{} {}\n", time, values.join(" "));
        if self.spp {
            self.out.write_all(spp_escape(&line).as_bytes())?;
        } else {
            self.out.write_all(line.as_bytes())?;
        }
        Ok(true)
    }
}

/// A sink collecting raw `(key, value)` records, for callers that want the
/// packed forms rather than text.
#[derive(Debug, Default)]
pub struct RecordCollector {
    /// The records received so far, in emission order.
    pub records: Vec<(Key, Vec<u8>)>,
}

impl PointOutput for RecordCollector {
    fn proc_point(&mut self, key: &[u8], value: &[u8], _schema: &Schema) -> Result<bool> {
        self.records.push((Key::from_bytes(key), value.to_vec()));
        Ok(true)
    }
}
