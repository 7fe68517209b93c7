use regex::Regex;

/// Sentinel the model returns when it believes no table can answer the
/// question. Triggers one relaxed-prompt retry upstream.
pub const INSUFFICIENT_DATA: &str = "INSUFFICIENT_DATA";

/// One generated query after the full cleaning chain:
/// raw → stripped-of-fencing → prefix-corrected → limit-injected → validated.
#[derive(Debug, Clone)]
pub struct GeneratedQuery {
    pub raw: String,
    pub sql: String,
    pub is_select: bool,
    pub references_known_table: bool,
}

impl GeneratedQuery {
    /// Injects the row limit and records the validity flags for an
    /// already-cleaned query. Limit injection is skipped for non-SELECT text
    /// since it will be rejected anyway.
    pub fn validate(raw: String, cleaned: String, limit: u32, working_formats: &[String]) -> Self {
        let is_select = is_select(&cleaned);
        let sql = if is_select {
            inject_row_limit(&cleaned, limit)
        } else {
            cleaned
        };
        let references_known_table = references_known_table(&sql, working_formats);

        Self {
            raw,
            sql,
            is_select,
            references_known_table,
        }
    }
}

/// Strips code fencing and known prefixes from raw LLM output and repairs
/// the two common truncated shapes (`TOP ...` and bare `<cols> FROM ...`).
///
/// Heuristic text surgery, deliberately not a SQL parser.
pub fn clean(raw: &str) -> String {
    let mut sql = raw.trim().to_string();

    if sql.starts_with("```") {
        let lines: Vec<&str> = sql.split('\n').collect();
        sql = if lines.len() > 2 {
            lines[1..lines.len() - 1].join("\n")
        } else {
            sql.replace("```", "")
        };
    }

    for prefix in ["```sql", "sql:", "Query:"] {
        let matches = sql
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
        if matches {
            sql = sql[prefix.len()..].trim().to_string();
        }
    }

    let sql = sql.trim().trim_end_matches('`').trim();

    let sql_upper = sql.to_uppercase();
    let head: String = sql_upper.chars().take(10).collect();

    if sql_upper.starts_with("TOP ") && !head.contains("SELECT") {
        return format!("SELECT {}", sql);
    }

    let fragment_re = Regex::new(r"(?i)^[A-Za-z_\[\]]+.*FROM\s+").unwrap();
    if !sql_upper.starts_with("SELECT") && fragment_re.is_match(sql) {
        return format!("SELECT {}", sql);
    }

    sql.to_string()
}

pub fn is_insufficient_data(sql: &str) -> bool {
    sql.trim().eq_ignore_ascii_case(INSUFFICIENT_DATA)
}

pub fn is_select(sql: &str) -> bool {
    sql.trim().to_uppercase().starts_with("SELECT")
}

/// Inserts `TOP {limit}` immediately after the first SELECT unless the query
/// already carries a TOP clause.
pub fn inject_row_limit(sql: &str, limit: u32) -> String {
    let top_re = Regex::new(r"(?i)\bTOP\b").unwrap();
    if top_re.is_match(sql) {
        return sql.to_string();
    }

    let select_re = Regex::new(r"(?i)SELECT").unwrap();
    match select_re.find(sql) {
        Some(m) => format!(
            "{} TOP {}{}",
            &sql[..m.end()],
            limit,
            &sql[m.end()..]
        ),
        None => sql.to_string(),
    }
}

/// Case-insensitive substring match against the known qualified table names
/// in their bracket-quoted working format.
pub fn references_known_table(sql: &str, working_formats: &[String]) -> bool {
    let query_lower = sql.to_lowercase();
    working_formats
        .iter()
        .any(|name| query_lower.contains(&name.to_lowercase()))
}
