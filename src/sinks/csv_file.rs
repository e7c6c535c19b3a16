use crate::error::StorageError;
use std::borrow::Cow;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const LINE_TERMINATOR: &str = "\r\n";

/// Delimited file opened for append on every write.
///
/// The header is emitted together with the first row whenever the file
/// is missing or empty, so it appears exactly once. One mutex per file
/// serializes writers inside the process; multiple processes sharing a
/// file need external coordination.
pub struct CsvFile {
    path: PathBuf,
    header: &'static [&'static str],
    lock: Mutex<()>,
}

impl CsvFile {
    pub fn open(
        path: impl Into<PathBuf>,
        header: &'static [&'static str],
    ) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StorageError::Prepare {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        Ok(Self {
            path,
            header,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append_row(&self, fields: &[&str]) -> Result<(), StorageError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| StorageError::Poisoned(self.path.clone()))?;

        let append_err = |source: std::io::Error| StorageError::Append {
            path: self.path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(append_err)?;
        let is_empty = file.metadata().map_err(append_err)?.len() == 0;

        let mut buffer = String::new();
        if is_empty {
            push_record(&mut buffer, self.header);
        }
        push_record(&mut buffer, fields);

        file.write_all(buffer.as_bytes()).map_err(append_err)?;
        file.flush().map_err(append_err)
    }
}

fn push_record(buffer: &mut String, fields: &[&str]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            buffer.push(',');
        }
        buffer.push_str(&escape_field(field));
    }
    buffer.push_str(LINE_TERMINATOR);
}

/// Minimal RFC 4180 quoting: only fields that need it are quoted.
fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Split RFC 4180 text into records. Quoted fields may hold commas,
/// doubled quotes and line breaks. Both `\n` and `\r\n` end a record and
/// blank lines are skipped.
pub fn parse_records(content: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut started = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                if started {
                    record.push(std::mem::take(&mut field));
                    records.push(std::mem::take(&mut record));
                    started = false;
                }
            }
            '"' if field.is_empty() => {
                in_quotes = true;
                started = true;
            }
            ',' => {
                record.push(std::mem::take(&mut field));
                started = true;
            }
            _ => {
                field.push(c);
                started = true;
            }
        }
    }

    if started {
        record.push(field);
        records.push(record);
    }
    records
}

/// Values of the column named `name`, one per data record, or `None` when
/// the header has no such column. Records too short to reach the column
/// yield an empty value.
pub fn column_values(content: &str, name: &str) -> Option<Vec<String>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut records = parse_records(content).into_iter();
    let header = records.next()?;
    let index = header.iter().position(|column| column.trim() == name)?;

    Some(
        records
            .map(|mut record| {
                if index < record.len() {
                    record.swap_remove(index)
                } else {
                    String::new()
                }
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &[&str] = &["a", "b"];

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field(""), "");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let file = CsvFile::open(dir.path().join("nested/log.csv"), HEADER).unwrap();
        file.append_row(&["1", "x"]).unwrap();
        file.append_row(&["2", "y,z"]).unwrap();

        let content = fs::read_to_string(file.path()).unwrap();
        assert_eq!(content, "a,b\r\n1,x\r\n2,\"y,z\"\r\n");
    }

    #[test]
    fn test_existing_file_keeps_its_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        fs::write(&path, "a,b\r\n0,old\r\n").unwrap();

        let file = CsvFile::open(&path, HEADER).unwrap();
        file.append_row(&["1", "new"]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "a,b\r\n0,old\r\n1,new\r\n");
    }

    #[test]
    fn test_concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let file = std::sync::Arc::new(CsvFile::open(dir.path().join("log.csv"), HEADER).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let file = file.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let id = format!("{t}-{i}");
                        file.append_row(&[id.as_str(), "payload"]).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let content = fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 1 + 8 * 25);
        assert_eq!(lines[0], "a,b");
        assert!(lines[1..].iter().all(|l| l.ends_with(",payload")));
    }

    #[test]
    fn test_parse_records_handles_quoting() {
        let content = "id,text\r\n1,plain\r\n2,\"a,b\"\r\n\r\n3,\"say \"\"hi\"\"\"\n4,\"two\nlines\"\n5,";
        let records = parse_records(content);
        assert_eq!(
            records,
            vec![
                vec!["id", "text"],
                vec!["1", "plain"],
                vec!["2", "a,b"],
                vec!["3", "say \"hi\""],
                vec!["4", "two\nlines"],
                vec!["5", ""],
            ]
        );
    }

    #[test]
    fn test_parse_reads_back_written_rows() {
        let dir = tempfile::tempdir().unwrap();
        let file = CsvFile::open(dir.path().join("log.csv"), HEADER).unwrap();
        file.append_row(&["1", "x, \"quoted\"\r\nnext"]).unwrap();

        let content = fs::read_to_string(file.path()).unwrap();
        assert_eq!(
            parse_records(&content),
            vec![vec!["a", "b"], vec!["1", "x, \"quoted\"\r\nnext"]]
        );
    }

    #[test]
    fn test_column_values() {
        let content = "\u{feff}id,text,label\n1,hello,0\n2,\"hi, you\",1\n3\n";
        assert_eq!(
            column_values(content, "text").unwrap(),
            vec!["hello", "hi, you", ""]
        );
        assert_eq!(column_values(content, "id").unwrap(), vec!["1", "2", "3"]);
        assert!(column_values(content, "comment").is_none());
        assert!(column_values("", "text").is_none());
    }
}
