use std::borrow::Cow;

mod scanner;

use scanner::{State, closes_dollar_tag, digits_at, dollar_tag, pair_at};

/// Target placeholder style for translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// PostgreSQL-style placeholders like `$1`.
    Postgres,
    /// SQLite-style placeholders like `?1` (also accepted by DuckDB).
    Sqlite,
}

/// Rewrite placeholders so one SQL text works on every backend.
///
/// Targeting `Postgres`, both numbered `?N` and bare `?` placeholders become
/// `$N`; bare ones are numbered left to right after the highest explicit
/// number seen so far. Targeting `Sqlite`, `$N` becomes `?N` and bare `?` is
/// kept.
///
/// Quoted strings, comments and dollar-quoted blocks are skipped by a small
/// state machine. Returns a borrowed `Cow` when nothing changed.
#[must_use]
pub fn translate_placeholders(sql: &str, target: PlaceholderStyle) -> Cow<'_, str> {
    let bytes = sql.as_bytes();
    let mut rewriter = Rewriter::new(sql);
    let mut state = State::Normal;
    let mut next_bare: u32 = 1;
    let mut idx = 0;

    // Every byte the state machine looks at is ASCII, so `idx` is always on a
    // char boundary when a span is cut.
    while idx < bytes.len() {
        let b = bytes[idx];
        state = match state {
            State::Normal if b == b'\'' => State::SingleQuoted,
            State::Normal if b == b'"' => State::DoubleQuoted,
            State::Normal if pair_at(bytes, idx, b"--") => State::LineComment,
            State::Normal if pair_at(bytes, idx, b"/*") => {
                idx += 1;
                State::BlockComment(1)
            }
            State::Normal if b == b'$' => {
                if let Some((tag, close)) = dollar_tag(bytes, idx) {
                    idx = close;
                    State::DollarQuoted(tag)
                } else {
                    if target == PlaceholderStyle::Sqlite
                        && let Some((end, digits)) = digits_at(bytes, idx + 1)
                    {
                        rewriter.replace(idx, end, '?', digits);
                        idx = end - 1;
                    }
                    State::Normal
                }
            }
            State::Normal if b == b'?' && target == PlaceholderStyle::Postgres => {
                match digits_at(bytes, idx + 1) {
                    Some((end, digits)) => {
                        if let Ok(n) = digits.parse::<u32>() {
                            next_bare = next_bare.max(n.saturating_add(1));
                        }
                        rewriter.replace(idx, end, '$', digits);
                        idx = end - 1;
                    }
                    None => {
                        rewriter.replace(idx, idx + 1, '$', &next_bare.to_string());
                        next_bare += 1;
                    }
                }
                State::Normal
            }
            // A doubled quote is an escaped quote; skip both halves.
            State::SingleQuoted if b == b'\'' => {
                if bytes.get(idx + 1) == Some(&b'\'') {
                    idx += 1;
                    State::SingleQuoted
                } else {
                    State::Normal
                }
            }
            State::DoubleQuoted if b == b'"' => {
                if bytes.get(idx + 1) == Some(&b'"') {
                    idx += 1;
                    State::DoubleQuoted
                } else {
                    State::Normal
                }
            }
            State::LineComment if b == b'\n' => State::Normal,
            State::BlockComment(depth) if pair_at(bytes, idx, b"/*") => {
                idx += 1;
                State::BlockComment(depth + 1)
            }
            State::BlockComment(depth) if pair_at(bytes, idx, b"*/") => {
                idx += 1;
                if depth == 1 {
                    State::Normal
                } else {
                    State::BlockComment(depth - 1)
                }
            }
            State::DollarQuoted(tag) if b == b'$' && closes_dollar_tag(bytes, idx, &tag) => {
                idx += tag.len() + 1;
                State::Normal
            }
            other => other,
        };
        idx += 1;
    }

    rewriter.finish()
}

/// Copies untouched spans of the source and splices in replacements.
/// Allocates only once the first replacement happens.
struct Rewriter<'a> {
    sql: &'a str,
    out: Option<String>,
    copied_to: usize,
}

impl<'a> Rewriter<'a> {
    fn new(sql: &'a str) -> Self {
        Self {
            sql,
            out: None,
            copied_to: 0,
        }
    }

    /// Replace `sql[start..end]` with `sigil` followed by `number`.
    fn replace(&mut self, start: usize, end: usize, sigil: char, number: &str) {
        let out = self
            .out
            .get_or_insert_with(|| String::with_capacity(self.sql.len() + 8));
        out.push_str(&self.sql[self.copied_to..start]);
        out.push(sigil);
        out.push_str(number);
        self.copied_to = end;
    }

    fn finish(self) -> Cow<'a, str> {
        match self.out {
            Some(mut out) => {
                out.push_str(&self.sql[self.copied_to..]);
                Cow::Owned(out)
            }
            None => Cow::Borrowed(self.sql),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_sqlite_to_postgres() {
        let sql = "select * from t where a = ?1 and b = ?2";
        let res = translate_placeholders(sql, PlaceholderStyle::Postgres);
        assert_eq!(res, "select * from t where a = $1 and b = $2");
    }

    #[test]
    fn numbers_bare_placeholders() {
        let sql = "insert into t (a, b, c) values (?, ?, ?)";
        let res = translate_placeholders(sql, PlaceholderStyle::Postgres);
        assert_eq!(res, "insert into t (a, b, c) values ($1, $2, $3)");
    }

    #[test]
    fn translates_postgres_to_sqlite() {
        let sql = "insert into t values($1, $2)";
        let res = translate_placeholders(sql, PlaceholderStyle::Sqlite);
        assert_eq!(res, "insert into t values(?1, ?2)");
    }

    #[test]
    fn skips_inside_literals_and_comments() {
        let sql = "select '?1', $1 -- $2\n/* ?3 */ from t where a = $1";
        let res = translate_placeholders(sql, PlaceholderStyle::Sqlite);
        assert_eq!(res, "select '?1', ?1 -- $2\n/* ?3 */ from t where a = ?1");

        let sql = "select 'it''s ?' , ? from t";
        let res = translate_placeholders(sql, PlaceholderStyle::Postgres);
        assert_eq!(res, "select 'it''s ?' , $1 from t");
    }

    #[test]
    fn skips_dollar_quoted_blocks() {
        let sql = "$foo$ select $1 from t $foo$ where a = $1";
        let res = translate_placeholders(sql, PlaceholderStyle::Sqlite);
        assert_eq!(res, "$foo$ select $1 from t $foo$ where a = ?1");
    }

    #[test]
    fn keeps_multibyte_text() {
        let sql = "select 'é' , ? from t where name = '中文'";
        let res = translate_placeholders(sql, PlaceholderStyle::Postgres);
        assert_eq!(res, "select 'é' , $1 from t where name = '中文'");
    }

    #[test]
    fn borrows_when_unchanged() {
        let sql = "select * from t where a = ?1";
        let res = translate_placeholders(sql, PlaceholderStyle::Sqlite);
        assert!(matches!(res, Cow::Borrowed(_)));
    }
}
