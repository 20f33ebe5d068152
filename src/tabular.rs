//! Minimal CSV reading and writing for name lists and subset reports.
//!
//! Supports comma separators, double-quoted fields with `""` escapes, and
//! quoted line breaks. That covers what the name lists and the report files
//! contain.

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CsvError {
    #[error("unterminated quoted field starting on line {line}")]
    UnterminatedQuote { line: usize },
    #[error("unexpected character after closing quote on line {line}")]
    TrailingAfterQuote { line: usize },
}

/// One CSV record and the line it starts on. A blank line yields a row with
/// no fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub line: usize,
    pub fields: Vec<String>,
}

impl Row {
    pub fn is_blank(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Parse CSV text into records. Blank lines are skipped.
pub fn parse_records(text: &str) -> Result<Vec<Vec<String>>, CsvError> {
    Ok(parse_rows(text)?
        .into_iter()
        .filter(|row| !row.is_blank())
        .map(|row| row.fields)
        .collect())
}

/// Parse CSV text into line-numbered rows, keeping blank lines as blank rows.
pub fn parse_rows(text: &str) -> Result<Vec<Row>, CsvError> {
    let mut rows = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut chars = text.chars().peekable();
    let mut line = 1usize;
    let mut record_line = 1usize;
    let mut in_quotes = false;
    let mut quote_line = 0usize;
    let mut after_quote = false;
    let mut field_started = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => {
                    in_quotes = false;
                    after_quote = true;
                }
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            ',' => {
                record.push(std::mem::take(&mut field));
                after_quote = false;
                field_started = true;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                if field_started || !field.is_empty() || after_quote {
                    record.push(std::mem::take(&mut field));
                }
                rows.push(Row {
                    line: record_line,
                    fields: std::mem::take(&mut record),
                });
                after_quote = false;
                field_started = false;
                line += 1;
                record_line = line;
            }
            '"' if field.is_empty() && !after_quote => {
                in_quotes = true;
                quote_line = line;
                field_started = true;
            }
            _ if after_quote => return Err(CsvError::TrailingAfterQuote { line }),
            _ => {
                field.push(c);
                field_started = true;
            }
        }
    }

    if in_quotes {
        return Err(CsvError::UnterminatedQuote { line: quote_line });
    }
    if field_started || !field.is_empty() || after_quote {
        record.push(field);
        rows.push(Row {
            line: record_line,
            fields: record,
        });
    }
    Ok(rows)
}

/// Quote a field when it contains a separator, quote or line break.
pub fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render one record as a CSV line, including the trailing newline.
pub fn format_record(fields: &[&str]) -> String {
    let mut line = fields
        .iter()
        .map(|f| escape_field(f))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_quoted_fields() {
        let text = "Smith\n\"O'Brien, Pat\",x\n\n\"Say \"\"hi\"\"\"\r\n";
        let records = parse_records(text).unwrap();
        assert_eq!(
            records,
            vec![
                vec!["Smith".to_string()],
                vec!["O'Brien, Pat".to_string(), "x".to_string()],
                vec!["Say \"hi\"".to_string()],
            ]
        );
    }

    #[test]
    fn keeps_empty_fields_between_separators() {
        let records = parse_records("a,,c\n,\n").unwrap();
        assert_eq!(records[0], vec!["a", "", "c"]);
        assert_eq!(records[1], vec!["", ""]);
    }

    #[test]
    fn rejects_unterminated_quote() {
        assert_eq!(
            parse_records("ok\n\"open").unwrap_err(),
            CsvError::UnterminatedQuote { line: 2 }
        );
    }

    #[test]
    fn rows_keep_blank_lines_with_their_line_numbers() {
        let rows = parse_rows("a\n\n\"b\nc\"\r\nd\n").unwrap();
        let shape: Vec<(usize, bool)> = rows.iter().map(|r| (r.line, r.is_blank())).collect();
        assert_eq!(shape, vec![(1, false), (2, true), (3, false), (5, false)]);
        assert_eq!(rows[2].fields, vec!["b\nc"]);
    }

    #[test]
    fn escaped_fields_parse_back() {
        let line = format_record(&["a,b", "say \"x\"", "plain"]);
        let records = parse_records(&line).unwrap();
        assert_eq!(records[0], vec!["a,b", "say \"x\"", "plain"]);
    }
}
