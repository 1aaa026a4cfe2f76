//! CSV export of a table view and the matching re-parser.
//!
//! Dump layout: a header line, then `segment,key,value,occupancy` for every
//! row of [`SegmentTable::rows`], with empty segments written as
//! `segment,,,`. The histogram file carries filled and empty segment counts.

use crate::table::SegmentTable;
use core::fmt::{self, Display};
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const DUMP_HEADER: &str = "Сегмент,Ключ,Значение,Заполненность";
pub const HISTOGRAM_HEADER: &str = "Сегмент,Количество элементов";
pub const HISTOGRAM_FILLED: &str = "Заполненные";
pub const HISTOGRAM_EMPTY: &str = "Пустые";

/// Errors while writing or re-reading an export
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(io::Error),

    /// Dump record that does not have the expected shape
    Malformed { line: usize, reason: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "export I/O error: {e}"),
            Error::Malformed { line, reason } => write!(f, "malformed dump line {line}: {reason}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Malformed { .. } => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Export result
pub type Result<T> = std::result::Result<T, Error>;

/// One record of a parsed dump. Empty segments have no key, value or
/// occupancy.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DumpRow {
    pub index: usize,
    pub key: Option<String>,
    pub value: Option<String>,
    pub occupancy: Option<usize>,
}

/// Files written by [`export_to_path`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExportPaths {
    pub dump: PathBuf,
    pub histogram: PathBuf,
}

/// Filled and empty segment counts as written to the histogram file.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SegmentHistogram {
    pub filled: usize,
    pub empty: usize,
}

impl SegmentHistogram {
    pub fn of<T: SegmentTable>(table: &T) -> Self {
        let mut filled = 0;
        let mut last = None;
        for row in table.rows() {
            if row.entry.is_some() && last != Some(row.index) {
                filled += 1;
                last = Some(row.index);
            }
        }
        Self {
            filled,
            empty: table.size() - filled,
        }
    }
}

fn write_field<W: Write>(out: &mut W, field: &str) -> io::Result<()> {
    if field.contains(&[',', '"', '\n', '\r'][..]) {
        write!(out, "\"{}\"", field.replace('"', "\"\""))
    } else {
        out.write_all(field.as_bytes())
    }
}

pub fn write_dump<T, W>(table: &T, mut out: W) -> io::Result<()>
where
    T: SegmentTable,
    T::Value: Display,
    W: Write,
{
    writeln!(out, "{DUMP_HEADER}")?;
    for row in table.rows() {
        write!(out, "{},", row.index)?;
        match row.entry {
            Some((key, value)) => {
                write_field(&mut out, key)?;
                out.write_all(b",")?;
                write_field(&mut out, &value.to_string())?;
                writeln!(out, ",{}", row.occupancy)?;
            }
            None => writeln!(out, ",,")?,
        }
    }
    out.flush()
}

pub fn write_histogram<T: SegmentTable, W: Write>(table: &T, mut out: W) -> io::Result<()> {
    let hist = SegmentHistogram::of(table);
    writeln!(out, "{HISTOGRAM_HEADER}")?;
    writeln!(out, "{HISTOGRAM_FILLED},{}", hist.filled)?;
    writeln!(out, "{HISTOGRAM_EMPTY},{}", hist.empty)?;
    out.flush()
}

/// `dir/name.csv` becomes `dir/name_histogram.csv`; other names get the
/// suffix appended.
pub fn histogram_path(dump: &Path) -> PathBuf {
    let name = dump
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.strip_suffix(".csv").unwrap_or(&name);
    dump.with_file_name(format!("{stem}_histogram.csv"))
}

/// Write the dump to `path` and the histogram next to it.
pub fn export_to_path<T>(table: &T, path: impl AsRef<Path>) -> Result<ExportPaths>
where
    T: SegmentTable,
    T::Value: Display,
{
    let dump = path.as_ref().to_path_buf();
    let histogram = histogram_path(&dump);

    write_dump(table, BufWriter::new(File::create(&dump)?))?;
    write_histogram(table, BufWriter::new(File::create(&histogram)?))?;

    log::info!(
        "exported {} entries to {} and {}",
        table.len(),
        dump.display(),
        histogram.display()
    );
    Ok(ExportPaths { dump, histogram })
}

/// Splits CSV text into records, honoring quoted fields (which may contain
/// separators, doubled quotes and line breaks). Returns each record with the
/// line number it starts on.
fn records(text: &str) -> Result<Vec<(usize, Vec<String>)>> {
    let mut out = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut line = 1;
    let mut start = 1;
    let mut quoted = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if quoted {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => quoted = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => quoted = true,
            ',' => fields.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                fields.push(std::mem::take(&mut field));
                out.push((start, std::mem::take(&mut fields)));
                line += 1;
                start = line;
            }
            _ => field.push(c),
        }
    }
    if quoted {
        return Err(Error::Malformed {
            line: start,
            reason: "unterminated quoted field".into(),
        });
    }
    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        out.push((start, fields));
    }
    Ok(out)
}

fn optional(field: String) -> Option<String> {
    (!field.is_empty()).then_some(field)
}

/// Re-read a dump written by [`write_dump`]. Values come back as text.
pub fn parse_dump<R: Read>(mut input: R) -> Result<Vec<DumpRow>> {
    let mut text = String::new();
    input.read_to_string(&mut text)?;

    let mut rows = Vec::new();
    for (n, (line, fields)) in records(&text)?.into_iter().enumerate() {
        if n == 0 {
            if fields.join(",") != DUMP_HEADER {
                return Err(Error::Malformed {
                    line,
                    reason: "missing dump header".into(),
                });
            }
            continue;
        }
        let fields: [String; 4] = fields.try_into().map_err(|_| Error::Malformed {
            line,
            reason: "expected 4 fields".into(),
        })?;
        let [index, key, value, occupancy] = fields;
        let index = index.parse().map_err(|_| Error::Malformed {
            line,
            reason: format!("bad segment index {index:?}"),
        })?;
        let occupancy = match optional(occupancy) {
            None => None,
            Some(o) => Some(o.parse().map_err(|_| Error::Malformed {
                line,
                reason: format!("bad occupancy {o:?}"),
            })?),
        };
        rows.push(DumpRow {
            index,
            key: optional(key),
            value: optional(value),
            occupancy,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChainingTable, OpenAddressingTable};

    fn dump_string<T>(t: &T) -> String
    where
        T: SegmentTable,
        T::Value: Display,
    {
        let mut buf = Vec::new();
        write_dump(t, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn open_addressing_dump_layout() {
        let mut t = OpenAddressingTable::new(5);
        t.insert("002A00", "hello").unwrap();
        let s = dump_string(&t);
        let lines: Vec<&str> = s.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], DUMP_HEADER);
        assert_eq!(lines[1], "0,,,");
        assert_eq!(lines[3], "2,002A00,hello,1");
    }

    #[test]
    fn chaining_dump_reports_chain_length() {
        let mut t = ChainingTable::new(4);
        t.insert("1AAAC0", 1).unwrap();
        t.insert("1AABD0", 2).unwrap();
        let s = dump_string(&t);
        let lines: Vec<&str> = s.lines().skip(1).collect();
        assert_eq!(lines, vec!["0,,,", "1,1AAAC0,1,2", "1,1AABD0,2,2", "2,,,", "3,,,"]);
    }

    #[test]
    fn histogram_counts_segments_not_entries() {
        let mut t = ChainingTable::new(4);
        t.insert("1AAAC0", 1).unwrap();
        t.insert("1AABD0", 2).unwrap();
        let mut buf = Vec::new();
        write_histogram(&t, &mut buf).unwrap();
        let s = String::from_utf8(buf).unwrap();
        assert_eq!(
            s,
            format!("{HISTOGRAM_HEADER}\n{HISTOGRAM_FILLED},1\n{HISTOGRAM_EMPTY},3\n")
        );
    }

    #[test]
    fn values_with_separators_are_quoted() {
        let mut t = OpenAddressingTable::new(5);
        t.insert("002A00", "a,\"b\"\nc").unwrap();
        let s = dump_string(&t);
        assert!(s.contains("2,002A00,\"a,\"\"b\"\"\nc\",1\n"));

        let rows = parse_dump(s.as_bytes()).unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[2].value.as_deref(), Some("a,\"b\"\nc"));
        assert_eq!(rows[3].index, 3);
    }

    #[test]
    fn histogram_path_rewrites_extension() {
        assert_eq!(
            histogram_path(Path::new("out/table.csv")),
            PathBuf::from("out/table_histogram.csv")
        );
        assert_eq!(
            histogram_path(Path::new("dump")),
            PathBuf::from("dump_histogram.csv")
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            parse_dump("not,a,header\n".as_bytes()),
            Err(Error::Malformed { line: 1, .. })
        ));
        let bad = format!("{DUMP_HEADER}\n0,,\n");
        assert!(matches!(
            parse_dump(bad.as_bytes()),
            Err(Error::Malformed { line: 2, .. })
        ));
        let bad = format!("{DUMP_HEADER}\nx,,,\n");
        assert!(matches!(
            parse_dump(bad.as_bytes()),
            Err(Error::Malformed { line: 2, .. })
        ));
        let bad = format!("{DUMP_HEADER}\n0,\"open,,\n");
        assert!(matches!(
            parse_dump(bad.as_bytes()),
            Err(Error::Malformed { line: 2, .. })
        ));
    }
}
