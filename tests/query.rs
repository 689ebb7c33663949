//! End-to-end tests: SQL text through the compiler, planner, and executor
//! against the in-memory backend.

use searchsql::execution::{ExecuteEngine, ExecutionEnvironment, ResultSet, Rows};
use searchsql::parsing::{CachingParser, parse_sql};
use searchsql::types::{DataType, Document, Identifier, IndexDefinition, TypeDefinition, Value};
use searchsql::{MemoryBackend, SearchBackend};
use std::collections::HashMap;
use std::sync::Arc;

struct Fixture {
    backend: Arc<dyn SearchBackend>,
    environment: ExecutionEnvironment,
    engine: ExecuteEngine,
    parser: CachingParser,
}

fn fixture() -> Fixture {
    let backend = MemoryBackend::new();
    backend
        .create_index(&IndexDefinition::new("school", 1, 0).unwrap())
        .unwrap();

    let def = TypeDefinition::new("student").unwrap();
    def.define_field("stuno", DataType::Str).unwrap();
    def.define_field("stuname", DataType::Str).unwrap();
    def.define_field("class", DataType::Str).unwrap();
    def.define_field("score", DataType::Double).unwrap();
    def.define_date_field("enrolled", "%Y-%m-%d").unwrap();
    def.as_primary_field("stuno").unwrap();
    def.publish().unwrap();
    let def = Arc::new(def);

    let school = Identifier::new("school").unwrap();
    backend.create_type(&school, &def).unwrap();

    let students = [
        ("10010", "ada", "a", 96.0, "2023-09-01"),
        ("10011", "grace", "a", 88.0, "2023-09-01"),
        ("10012", "alan", "b", 95.0, "2024-09-01"),
        ("10013", "edsger", "b", 73.5, "2024-09-01"),
        ("10014", "barbara", "c", 91.0, "2024-09-01"),
    ];
    for (stuno, stuname, class, score, enrolled) in students {
        let mut doc = Document::new(def.clone()).unwrap();
        doc.set_value_by_name("stuno", Value::Str(stuno.into()))
            .unwrap();
        doc.set_value_by_name("stuname", Value::Str(stuname.into()))
            .unwrap();
        doc.set_value_by_name("class", Value::Str(class.into()))
            .unwrap();
        doc.set_value_by_name("score", Value::Double(score))
            .unwrap();
        doc.set_value_by_name("enrolled", Value::Str(enrolled.into()))
            .unwrap();
        backend.insert_document(&school, doc).unwrap();
    }

    let backend: Arc<dyn SearchBackend> = Arc::new(backend);
    let environment =
        ExecutionEnvironment::new(backend.clone(), "school", HashMap::new()).unwrap();
    Fixture {
        backend,
        environment,
        engine: ExecuteEngine::with_default_executors().unwrap(),
        parser: CachingParser::new(),
    }
}

impl Fixture {
    fn query(&self, sql: &str, arguments: &[Value]) -> Rows {
        let statement = self.parser.parse(sql).unwrap();
        self.engine
            .execute_statement::<Rows>(&self.backend, &self.environment, statement, arguments)
            .unwrap()
    }

    fn column(&self, sql: &str, arguments: &[Value], column: usize) -> Vec<Value> {
        self.query(sql, arguments)
            .into_rows()
            .into_iter()
            .map(|row| row[column].clone())
            .collect()
    }
}

#[test]
fn select_star_returns_all_fields_in_order() {
    let fx = fixture();
    let rows = fx.query("SELECT * FROM student", &[]);
    let meta = rows.metadata();
    assert_eq!(meta.column_count(), 5);
    assert_eq!(meta.column(0).unwrap().label(), "stuno");
    assert_eq!(meta.column(3).unwrap().data_type(), DataType::Double);
    assert_eq!(rows.row_count(), 5);
}

#[test]
fn where_filters_with_in_between_and_like() {
    let fx = fixture();
    let names = fx.column(
        "SELECT stuname FROM student WHERE stuno IN ('10010', '10011', '10012') ORDER BY stuno",
        &[],
        0,
    );
    assert_eq!(
        names,
        vec![
            Value::Str("ada".into()),
            Value::Str("grace".into()),
            Value::Str("alan".into()),
        ]
    );

    let passing = fx.column(
        "SELECT stuname FROM student WHERE score BETWEEN 90 AND 100 ORDER BY score DESC",
        &[],
        0,
    );
    assert_eq!(
        passing,
        vec![
            Value::Str("ada".into()),
            Value::Str("alan".into()),
            Value::Str("barbara".into()),
        ]
    );

    let a_names = fx.column(
        "SELECT stuname FROM student WHERE stuname LIKE 'a%' ORDER BY stuname",
        &[],
        0,
    );
    assert_eq!(
        a_names,
        vec![Value::Str("ada".into()), Value::Str("alan".into())]
    );
}

#[test]
fn parameters_bind_in_order() {
    let fx = fixture();
    let rows = fx.query(
        "SELECT stuno, stuname FROM student WHERE stuno = ?",
        &[Value::Str("10013".into())],
    );
    let rows = rows.into_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][1], Value::Str("edsger".into()));

    // Argument count must match the statement's parameter count.
    let statement = fx.parser.parse("SELECT * FROM student WHERE stuno = ?").unwrap();
    assert!(
        fx.engine
            .execute_statement::<Rows>(&fx.backend, &fx.environment, statement, &[])
            .is_err()
    );
}

#[test]
fn group_by_having_order_and_limit() {
    let fx = fixture();
    let rows = fx.query(
        "SELECT class, max(score) max_score FROM student \
         GROUP BY class HAVING max_score >= 95 ORDER BY max_score DESC LIMIT 0, 10",
        &[],
    );
    let meta = rows.metadata();
    assert_eq!(meta.column(1).unwrap().label(), "max_score");
    let rows = rows.into_rows();
    assert_eq!(
        rows,
        vec![
            vec![Value::Str("a".into()), Value::Double(96.0)],
            vec![Value::Str("b".into()), Value::Double(95.0)],
        ]
    );
}

#[test]
fn aggregates_without_group_by_collapse_to_one_row() {
    let fx = fixture();
    let rows = fx
        .query("SELECT count(*), min(score), avg(score) FROM student", &[])
        .into_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], Value::Long(5));
    assert_eq!(rows[0][1], Value::Double(73.5));
    let Value::Double(avg) = rows[0][2] else {
        panic!("expected double average");
    };
    assert!((avg - 88.7).abs() < 0.0001);
}

#[test]
fn count_counts_non_null_values_only() {
    let fx = fixture();
    // COUNT(field) equals COUNT(*) here because every field is populated.
    let rows = fx
        .query("SELECT count(*), count(stuname) FROM student", &[])
        .into_rows();
    assert_eq!(rows[0][0], Value::Long(5));
    assert_eq!(rows[0][1], Value::Long(5));
}

#[test]
fn scalar_functions_project_per_row() {
    let fx = fixture();
    let tagged = fx.column(
        "SELECT concat(class, '-', stuno) FROM student WHERE stuname = 'ada'",
        &[],
        0,
    );
    assert_eq!(tagged, vec![Value::Str("a-10010".into())]);

    let prefixes = fx.column(
        "SELECT substring(stuname, 1, 3) FROM student ORDER BY stuno LIMIT 2",
        &[],
        0,
    );
    assert_eq!(
        prefixes,
        vec![Value::Str("ada".into()), Value::Str("gra".into())]
    );
}

#[test]
fn limit_offset_pages_plain_selects() {
    let fx = fixture();
    let page = fx.column(
        "SELECT stuno FROM student ORDER BY stuno LIMIT 2, 2",
        &[],
        0,
    );
    assert_eq!(
        page,
        vec![Value::Str("10012".into()), Value::Str("10013".into())]
    );
}

#[test]
fn cursor_interface_walks_results() {
    let fx = fixture();
    let mut rows = fx.query(
        "SELECT stuno, score FROM student WHERE class = 'b' ORDER BY score DESC",
        &[],
    );
    let mut seen = Vec::new();
    while rows.next().unwrap() {
        seen.push((
            rows.value_by_name("stuno").unwrap(),
            rows.value(1).unwrap(),
        ));
    }
    rows.close();
    assert_eq!(
        seen,
        vec![
            (Value::Str("10012".into()), Value::Double(95.0)),
            (Value::Str("10013".into()), Value::Double(73.5)),
        ]
    );
}

#[test]
fn compiled_statements_are_cached_by_text() {
    let fx = fixture();
    let first = fx.parser.parse("SELECT * FROM student").unwrap();
    let second = fx.parser.parse("SELECT * FROM student").unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    // Both cached compiles execute normally.
    let rows = fx
        .engine
        .execute_statement::<Rows>(&fx.backend, &fx.environment, first, &[])
        .unwrap();
    assert_eq!(rows.row_count(), 5);
}

#[test]
fn unknown_fields_fail_at_planning() {
    let fx = fixture();
    let statement = fx.parser.parse("SELECT nothere FROM student").unwrap();
    let err = fx
        .engine
        .execute_statement::<Rows>(&fx.backend, &fx.environment, statement, &[])
        .unwrap_err();
    assert!(matches!(err, searchsql::Error::FieldNotExists(_)));
}

#[test]
fn unknown_types_fail_at_metadata_resolution() {
    let fx = fixture();
    let statement = fx.parser.parse("SELECT * FROM teacher").unwrap();
    let err = fx
        .engine
        .execute_statement::<Rows>(&fx.backend, &fx.environment, statement, &[])
        .unwrap_err();
    assert!(matches!(err, searchsql::Error::TypeNotExists(_)));
}

/// Every supported clause combination round-trips: rendering a parsed
/// statement and reparsing it yields a structurally equal statement.
#[test]
fn statements_round_trip_through_rendering() {
    let statements = [
        "SELECT * FROM student",
        "SELECT stuno, stuname FROM student",
        "SELECT stuno AS no, score FROM student AS s",
        "SELECT * FROM student WHERE score > 60",
        "SELECT * FROM student WHERE stuno IN ('10010', '10011', '10012')",
        "SELECT * FROM student WHERE score BETWEEN 60 AND 90",
        "SELECT * FROM student WHERE score NOT BETWEEN 60 AND 90",
        "SELECT * FROM student WHERE stuname LIKE 'a%' AND score >= 50",
        "SELECT * FROM student WHERE stuname IS NOT NULL OR score IS NULL",
        "SELECT * FROM student WHERE NOT (score < 60 OR score > 90)",
        "SELECT class FROM student GROUP BY class",
        "SELECT class, count(*) FROM student GROUP BY class",
        "SELECT class, max(score) AS max_score FROM student GROUP BY class \
         HAVING max_score >= 95",
        "SELECT * FROM student ORDER BY score DESC, stuno",
        "SELECT * FROM student LIMIT 10",
        "SELECT * FROM student LIMIT 5, 10",
        "SELECT stuno FROM student WHERE stuno = ? ORDER BY stuno LIMIT 1",
        "SELECT concat(class, stuno), substring(stuname, 1, 2) FROM student",
        "SELECT score + 1 * 2, -score, (score + 1) / 2 FROM student",
        "SELECT `select` FROM student",
        "SELECT id, count(id), max(score) max_score FROM student GROUP BY class \
         HAVING max_score >= 95 ORDER BY max_score DESC LIMIT 0, 10",
    ];
    for sql in statements {
        let parsed = parse_sql(sql).unwrap();
        let rendered = parsed.to_string();
        let reparsed = parse_sql(&rendered)
            .unwrap_or_else(|e| panic!("rendering of {:?} failed to reparse: {} ({})", sql, rendered, e));
        assert_eq!(parsed, reparsed, "round trip failed for {:?} -> {:?}", sql, rendered);
    }
}
