/// The rule sentence swapped out for the relaxed retry after an
/// INSUFFICIENT_DATA response.
const UNCERTAIN_RULE: &str =
    "If uncertain, attempt a query based on the most relevant table and columns";
const RELAXED_RULE: &str =
    "Make a best-guess query using the most relevant table and columns, even if uncertain";

/// Deterministic generation prompt: numbered rules, the schema/sample dump,
/// the question and worked examples.
pub fn build_smart_prompt(
    question: &str,
    tables_info: &str,
    limit: u32,
    case_insensitive: bool,
) -> String {
    let case_instruction = if case_insensitive {
        "String comparisons are case-insensitive due to database collation. \
         For numeric or boolean columns, use direct comparisons."
    } else {
        "For string columns (varchar, nvarchar, char, nchar), use LOWER([Column]) = LOWER('value') for case-insensitive comparisons. \
         For numeric or boolean columns (int, bit, float), use direct comparisons (e.g., [Column] = 0 or [Column] = 1)."
    };

    format!(
        r#"
Generate a SQL query against the analytics warehouse to answer this question.

CRITICAL RULES for the warehouse:
1. ALWAYS start with "SELECT"
2. ALWAYS use [schema].[Table Name] format for tables (e.g., [main].[TableName])
3. Use exact column names as listed, with brackets for names with spaces (e.g., [Column Name])
4. Include TOP {limit} for performance
5. Return only the SQL query, no explanations
6. {uncertain_rule}, using sample values to guide conditions
7. Do NOT omit schema prefix (e.g., use [main].[Table Name], not [Table Name])
8. {case_instruction}
9. Support aggregation functions (e.g., COUNT, SUM, AVG) for questions asking for counts or summaries
10. Table and column names are case-insensitive; normalize to match schema
11. For listing queries, select identifier columns (e.g., [DeviceID], [Device Name]) and relevant attributes, avoiding non-device identifiers like [Employee ID]
12. For 'outdated' conditions, prioritize boolean/numeric columns (e.g., [Status] = 0) or date columns (e.g., [LastUpdateDate] < GETDATE() - 30) based on sample values

Available Tables:
{tables_info}

Question: {question}

Examples:
- SELECT TOP {limit} [DeviceID], [Device Name], [OS Type], [Endpoint_protection] FROM [main].[DeviceSecurityTable] WHERE [Endpoint_protection] = 0
- SELECT TOP {limit} [DeviceID], [Device Name], [Antivirus Version] FROM [main].[DeviceSecurityTable] WHERE [LastUpdateDate] < DATEADD(day, -30, GETDATE())
- SELECT TOP {limit} COUNT(*) AS ThreatCount, [Threat Type] FROM [main].[ThreatsDetectedTable] WHERE LOWER([Severity]) = LOWER('high') GROUP BY [Threat Type]
- SELECT TOP {limit} [t1].[Employee ID], [t2].[Department] FROM [main].[Employees] [t1] JOIN [main].[Departments] [t2] ON [t1].[Department ID] = [t2].[Department ID]

Return only the complete SQL query starting with SELECT:
"#,
        limit = limit,
        uncertain_rule = UNCERTAIN_RULE,
        case_instruction = case_instruction,
        tables_info = tables_info,
        question = question,
    )
}

/// Swaps the uncertainty rule for a best-guess instruction. Used for the
/// single retry after an INSUFFICIENT_DATA response.
pub fn relax_prompt(prompt: &str) -> String {
    prompt.replacen(UNCERTAIN_RULE, RELAXED_RULE, 1)
}
