use serde::ser::{Serialize, SerializeMap, Serializer};

/// One row of the product index, keyed by header name in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexRecord {
    fields: Vec<(String, String)>,
}

impl IndexRecord {
    /// Insert a column value. A repeated column keeps its first position and takes the
    /// latest value.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    /// Column value, or `""` when the column is missing.
    pub fn text(&self, column: &str) -> &str {
        self.get(column).unwrap_or("")
    }

    /// Column value only when it is non-empty.
    pub fn present(&self, column: &str) -> Option<&str> {
        self.get(column).filter(|v| !v.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(c, v)| (c.as_str(), v.as_str()))
    }

    pub fn columns(&self) -> Vec<&str> {
        self.iter().map(|(c, _)| c).collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for IndexRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = IndexRecord::default();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl Serialize for IndexRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Parse comma-separated text into index records.
///
/// The first row is the header. Quoted spans may contain commas, line feeds and doubled
/// quotes. Carriage returns outside quotes are ignored. Rows whose cells are all blank
/// are dropped; short rows are padded with `""` and long rows are cut to the header.
/// Never fails: malformed input degrades to whatever rows can be recovered.
pub fn parse(text: &str) -> Vec<IndexRecord> {
    let mut rows = split_rows(text).into_iter();

    let Some(header) = rows.next() else {
        return Vec::new();
    };
    let header: Vec<String> = header.iter().map(|h| h.trim().to_string()).collect();

    rows.filter(|cells| cells.iter().any(|c| !c.trim().is_empty()))
        .map(|cells| {
            header
                .iter()
                .enumerate()
                .map(|(idx, column)| {
                    let cell = cells.get(idx).map(String::as_str).unwrap_or("");
                    (column.clone(), cell.to_string())
                })
                .collect::<IndexRecord>()
        })
        .collect()
}

/// Character scan producing raw rows of cells.
fn split_rows(text: &str) -> Vec<Vec<String>> {
    let chars: Vec<char> = text.chars().collect();
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];

        // ── Quoted span: only a quote is special ──
        if in_quotes {
            if ch == '"' {
                if chars.get(i + 1) == Some(&'"') {
                    cell.push('"');
                    i += 2;
                    continue;
                }
                in_quotes = false;
                i += 1;
                continue;
            }
            cell.push(ch);
            i += 1;
            continue;
        }

        match ch {
            '"' => in_quotes = true,
            ',' => row.push(std::mem::take(&mut cell)),
            '\n' => {
                row.push(std::mem::take(&mut cell));
                rows.push(std::mem::take(&mut row));
            }
            '\r' => {}
            _ => cell.push(ch),
        }
        i += 1;
    }

    // Flush a final row that has no trailing line feed
    if !cell.is_empty() || !row.is_empty() {
        row.push(cell);
        rows.push(row);
    }

    rows
}

/// Serialize records back to comma-separated text with the given header order.
pub fn to_csv<'a, I>(header: &[&str], records: I) -> String
where
    I: IntoIterator<Item = &'a IndexRecord>,
{
    let mut out = String::new();
    out.push_str(
        &header
            .iter()
            .map(|h| quote_cell(h))
            .collect::<Vec<_>>()
            .join(","),
    );
    out.push('\n');
    for record in records {
        let line = header
            .iter()
            .map(|h| quote_cell(record.text(h)))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn quote_cell(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
