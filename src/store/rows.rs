//! Delimited-text rows for the record stores
//!
//! Fields are comma-separated; a field containing a comma, quote, CR or LF
//! is wrapped in double quotes with inner quotes doubled.

use std::borrow::Cow;

/// Column header written before any data row
pub const HEADER: [&str; 6] = [
    "Source",
    "Headline",
    "Date",
    "Author",
    "Link",
    "Body/abstract/extract",
];

/// Position of the link column
pub const LINK_COLUMN: usize = 4;

pub fn header_line() -> String {
    encode_row(&HEADER)
}

pub fn quote_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

pub fn encode_row(fields: &[&str]) -> String {
    let mut line = fields
        .iter()
        .map(|field| quote_field(field))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

/// Parses delimited text into rows of fields
///
/// Quoted fields may span lines. Blank lines are skipped. An unterminated
/// quote at end of input yields whatever was read so far.
pub fn parse_rows(input: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut row_started = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        match c {
            '"' => {
                in_quotes = true;
                row_started = true;
            }
            ',' => {
                row.push(std::mem::take(&mut field));
                row_started = true;
            }
            '\r' => {}
            '\n' => {
                if row_started || !field.is_empty() {
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                }
                row_started = false;
            }
            _ => {
                field.push(c);
                row_started = true;
            }
        }
    }

    if row_started || !field.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}

/// Returns the data rows of a store file's contents, header excluded
pub fn data_rows(input: &str) -> Vec<Vec<String>> {
    let mut rows = parse_rows(input);
    if rows.first().is_some_and(|first| is_header(first)) {
        rows.remove(0);
    }
    rows
}

fn is_header(fields: &[String]) -> bool {
    fields.len() == HEADER.len() && fields.iter().zip(HEADER).all(|(a, b)| a == b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_fields_are_not_quoted() {
        assert_eq!(encode_row(&["a", "b c", ""]), "a,b c,\n");
    }

    #[test]
    fn test_special_fields_are_quoted() {
        assert_eq!(
            encode_row(&["x,y", "say \"hi\"", "two\nlines"]),
            "\"x,y\",\"say \"\"hi\"\"\",\"two\nlines\"\n"
        );
    }

    #[test]
    fn test_parse_quoted_multiline() {
        let input = "h1,h2\n\"a,1\",\"multi\nline \"\"q\"\"\"\nb,\n";
        let rows = parse_rows(input);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], vec!["a,1", "multi\nline \"q\""]);
        assert_eq!(rows[2], vec!["b", ""]);
    }

    #[test]
    fn test_parse_crlf_and_blank_lines() {
        let rows = parse_rows("a,b\r\n\r\nc,d\r\n");
        assert_eq!(rows, vec![vec!["a", "b"], vec!["c", "d"]]);
    }

    #[test]
    fn test_data_rows_skip_header() {
        let text = format!("{}x,t,d,a,https://e.com/1,body\n", header_line());
        let rows = data_rows(&text);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][LINK_COLUMN], "https://e.com/1");
    }
}
