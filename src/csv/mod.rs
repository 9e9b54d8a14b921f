// src/csv/mod.rs

/// Tokenize a comma-delimited export into rows of fields.
///
/// The exports this pipeline ingests come out of spreadsheet tools, so the
/// tokenizer is deliberately permissive:
/// - a double-quoted field keeps embedded commas and newlines as literal
///   content, and `""` inside quotes is one literal quote character;
/// - CRLF and LF both end a row outside quotes;
/// - rows whose every field is empty or whitespace are dropped, which is how
///   blank lines in the source disappear;
/// - a final row without a trailing line terminator is still emitted;
/// - an unterminated quote at end-of-input is not an error: the rest of the
///   text belongs to the open field.
///
/// Row and field order mirror the input exactly.
pub fn parse(text: &str) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;

    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(ch);
            }
            continue;
        }

        match ch {
            '"' => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                flush_row(&mut rows, &mut row, &mut field);
            }
            '\n' => flush_row(&mut rows, &mut row, &mut field),
            _ => field.push(ch),
        }
    }

    // Trailing row without a line terminator (or with an open quote).
    flush_row(&mut rows, &mut row, &mut field);

    rows
}

/// Close the current row. Rows that hold nothing but whitespace are dropped.
fn flush_row(rows: &mut Vec<Vec<String>>, row: &mut Vec<String>, field: &mut String) {
    row.push(std::mem::take(field));
    let finished = std::mem::take(row);
    if finished.iter().any(|f| !f.trim().is_empty()) {
        rows.push(finished);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_plain_rows_on_lf_and_crlf() {
        let rows = parse("a,b,c\nd,e,f\r\ng,h,i");
        assert_eq!(
            rows,
            vec![
                vec!["a", "b", "c"],
                vec!["d", "e", "f"],
                vec!["g", "h", "i"],
            ]
        );
    }

    #[test]
    fn quoted_field_keeps_comma_and_newline_literal() {
        let rows = parse("name,note\nRoma,\"piazza, via\ncentro\"");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["Roma", "piazza, via\ncentro"]);
    }

    #[test]
    fn doubled_quote_inside_quotes_is_one_literal_quote() {
        let rows = parse("\"b&b \"\"Il Nido\"\"\",x");
        assert_eq!(rows, vec![vec!["b&b \"Il Nido\"", "x"]]);
    }

    #[test]
    fn blank_and_whitespace_only_rows_are_dropped() {
        let rows = parse("a,b\n\n  , \t\nc,d\n");
        assert_eq!(rows, vec![vec!["a", "b"], vec!["c", "d"]]);
    }

    #[test]
    fn final_row_without_terminator_is_emitted() {
        let rows = parse("a,b\nc,d");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["c", "d"]);
    }

    #[test]
    fn unterminated_quote_swallows_the_rest_of_input() {
        let rows = parse("a,\"open field\nstill inside");
        assert_eq!(rows, vec![vec!["a", "open field\nstill inside"]]);
    }

    #[test]
    fn empty_input_yields_no_rows() {
        assert!(parse("").is_empty());
        assert!(parse("\n\r\n\n").is_empty());
    }
}
