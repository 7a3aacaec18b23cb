//! Positional CSV parsing for bulk property uploads.
//!
//! Deliberately splits on raw commas instead of using a quote-aware reader:
//! the listings API validates the same raw CSV text with the same rule, and a
//! smarter client-side tokenizer would accept files the server then
//! misaligns. Blank lines are dropped before row numbers are assigned.

/// One data row, tagged with its line number in the uploaded file.
///
/// `row_number` counts the header as line 1, so the first data row is 2.
/// `data` keeps the header/value pairs in the order the columns appeared.
#[derive(Debug, Clone)]
pub struct ParsedRow {
    pub row_number: usize,
    pub data: Vec<(String, String)>,
}

impl ParsedRow {
    /// Value for a column, if that column was present in the header line.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.data
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }
}

/// Header list and data rows of an uploaded CSV file.
#[derive(Debug, Clone)]
pub struct ParsedCsv {
    pub headers: Vec<String>,
    pub rows: Vec<ParsedRow>,
}

/// Parse raw CSV text. Never fails: malformed input degrades to empty or
/// partial field values, which the validator reports per row.
///
/// Values are mapped onto headers positionally. A short row pads the missing
/// trailing columns with empty strings; values beyond the header count are
/// dropped.
pub fn parse_csv(text: &str) -> ParsedCsv {
    let mut lines = text
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty());

    let Some(header_line) = lines.next() else {
        return ParsedCsv {
            headers: Vec::new(),
            rows: Vec::new(),
        };
    };

    let headers: Vec<String> = header_line
        .split(',')
        .map(|h| h.trim().to_string())
        .collect();

    let rows = lines
        .enumerate()
        .map(|(idx, line)| {
            let values: Vec<&str> = line.split(',').map(str::trim).collect();
            let data = headers
                .iter()
                .enumerate()
                .map(|(i, header)| {
                    let value = values.get(i).copied().unwrap_or("");
                    (header.clone(), value.to_string())
                })
                .collect();
            ParsedRow {
                // +2: header is line 1, rows are numbered from 2
                row_number: idx + 2,
                data,
            }
        })
        .collect();

    ParsedCsv { headers, rows }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let parsed = parse_csv("Project Name,Bedrooms\nSunset Villas,2\nPalm Court,3\n");
        assert_eq!(parsed.headers, vec!["Project Name", "Bedrooms"]);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].get("Project Name"), Some("Sunset Villas"));
        assert_eq!(parsed.rows[1].get("Bedrooms"), Some("3"));
    }

    #[test]
    fn test_row_numbers_skip_blank_lines() {
        // Blank lines anywhere are filtered out before numbering
        let parsed = parse_csv("a,b\n\n1,2\n   \n3,4\n\n\n5,6\n");
        assert_eq!(parsed.rows.len(), 3);
        for (i, row) in parsed.rows.iter().enumerate() {
            assert_eq!(row.row_number, i + 2);
        }
    }

    #[test]
    fn test_short_rows_pad_with_empty_strings() {
        let parsed = parse_csv("a,b,c\n1\n");
        let row = &parsed.rows[0];
        assert_eq!(row.get("a"), Some("1"));
        assert_eq!(row.get("b"), Some(""));
        assert_eq!(row.get("c"), Some(""));
    }

    #[test]
    fn test_extra_values_are_dropped() {
        let parsed = parse_csv("a,b\n1,2,3,4\n");
        let row = &parsed.rows[0];
        assert_eq!(row.data.len(), 2);
        assert_eq!(row.get("b"), Some("2"));
    }

    #[test]
    fn test_values_and_headers_are_trimmed() {
        let parsed = parse_csv("  a , b \n 1 ,  2  \n");
        assert_eq!(parsed.headers, vec!["a", "b"]);
        assert_eq!(parsed.rows[0].get("a"), Some("1"));
        assert_eq!(parsed.rows[0].get("b"), Some("2"));
    }

    #[test]
    fn test_crlf_line_endings() {
        let parsed = parse_csv("a,b\r\n1,2\r\n");
        assert_eq!(parsed.headers, vec!["a", "b"]);
        assert_eq!(parsed.rows[0].get("b"), Some("2"));
    }

    #[test]
    fn test_empty_input() {
        let parsed = parse_csv("");
        assert!(parsed.headers.is_empty());
        assert!(parsed.rows.is_empty());

        let parsed = parse_csv("\n  \n\n");
        assert!(parsed.headers.is_empty());
        assert!(parsed.rows.is_empty());
    }

    #[test]
    fn test_header_only_input() {
        let parsed = parse_csv("a,b,c\n");
        assert_eq!(parsed.headers.len(), 3);
        assert!(parsed.rows.is_empty());
    }

    #[test]
    fn test_quoted_commas_are_not_special() {
        // Naive splitting: a quoted value containing a comma misaligns the
        // columns, matching what the listings API does with the same text.
        let parsed = parse_csv("a,b\n\"one, two\",3\n");
        assert_eq!(parsed.rows[0].get("a"), Some("\"one"));
        assert_eq!(parsed.rows[0].get("b"), Some("two\""));
    }
}
