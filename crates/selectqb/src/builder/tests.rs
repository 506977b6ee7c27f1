use super::parse::{CLAUSES, decompose};
use super::*;
use crate::driver::{QueryOutput, RequestHandle};
use crate::error::QbError;
use crate::input::InputValue;
use crate::monitor::StatsMonitor;
use crate::order::{OrderBy, SortOrder};
use crate::record::{FromRecord, Record, SqlValue};
use serde_json::json;
use std::sync::Mutex;

// ── In-memory driver ──

type Respond = Arc<dyn Fn(&str) -> QbResult<QueryOutput> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
struct Executed {
    sql: String,
    params: Vec<(String, SqlType, InputValue)>,
}

#[derive(Clone, Default)]
struct MockDriver {
    log: Arc<Mutex<Vec<Executed>>>,
    respond: Option<Respond>,
}

impl MockDriver {
    fn responding<F>(f: F) -> Self
    where
        F: Fn(&str) -> QbResult<QueryOutput> + Send + Sync + 'static,
    {
        Self {
            log: Arc::default(),
            respond: Some(Arc::new(f)),
        }
    }

    fn executed(&self) -> Vec<Executed> {
        self.log.lock().unwrap().clone()
    }
}

struct MockHandle {
    driver: MockDriver,
    params: Vec<(String, SqlType, InputValue)>,
}

impl RequestHandle for MockHandle {
    fn bind(&mut self, name: &str, ty: SqlType, value: &InputValue) {
        self.params.push((name.to_string(), ty, value.clone()));
    }

    async fn run_query(&mut self, sql: &str) -> QbResult<QueryOutput> {
        self.driver.log.lock().unwrap().push(Executed {
            sql: sql.to_string(),
            params: self.params.clone(),
        });
        match &self.driver.respond {
            Some(respond) => respond(sql),
            None => Ok(QueryOutput::default()),
        }
    }
}

impl Driver for MockDriver {
    type Handle = MockHandle;

    async fn acquire(&self) -> QbResult<MockHandle> {
        Ok(MockHandle {
            driver: self.clone(),
            params: Vec::new(),
        })
    }
}

fn qb() -> QueryBuilder<MockDriver> {
    QueryBuilder::new(MockDriver::default())
}

fn int_rows(column: &str, values: &[i64]) -> Vec<Record> {
    values
        .iter()
        .map(|v| Record::new().with(column, SqlValue::Int(*v)))
        .collect()
}

// ── Rendering ──

#[test]
fn test_empty_builder_renders_terminator() {
    assert_eq!(qb().build_query().unwrap(), ";");
}

#[test]
fn test_select_all() {
    let mut q = qb();
    q.select("a").unwrap();
    assert_eq!(q.build_query().unwrap(), "SELECT ALL a AS \"a\";");
}

#[test]
fn test_select_distinct() {
    let mut q = qb();
    q.select("a").unwrap().all(false);
    assert_eq!(q.build_query().unwrap(), "SELECT DISTINCT a AS \"a\";");
    q.distinct(false);
    assert_eq!(q.build_query().unwrap(), "SELECT ALL a AS \"a\";");
}

#[test]
fn test_select_top() {
    let mut q = qb();
    q.select("a").unwrap().top(10);
    assert_eq!(q.build_query().unwrap(), "SELECT ALL TOP 10 a AS \"a\";");
}

#[test]
fn test_select_complex_aliases() {
    let mut q = qb();
    q.select(
        "CONCAT(\"strings ((\", MIN(1, 2), 'no end') AS duo, 1 + 1 AS Two, \
         'a, b' AS \"anything can go here\", c",
    )
    .unwrap();
    assert_eq!(
        q.build_query().unwrap(),
        "SELECT ALL CONCAT(\"strings ((\", MIN(1, 2), 'no end') AS \"duo\", 1 + 1 AS \"Two\", \
         'a, b' AS \"anything can go here\", c AS \"c\";"
    );
}

#[test]
fn test_alias_quotes_are_escaped() {
    let mut q = qb();
    q.select(SelectMap::from_iter([("say \"hi\"", "1")])).unwrap();
    assert_eq!(q.build_query().unwrap(), "SELECT ALL 1 AS \"say \\\"hi\\\"\";");
}

#[test]
fn test_select_list_processes_each_element() {
    let mut q = qb();
    q.select(vec!["a", "b AS c"]).unwrap();
    q.select([SelectInput::from("d"), SelectMap::from_iter([("e", "f + 1")]).into()])
        .unwrap();
    assert_eq!(
        q.build_query().unwrap(),
        "SELECT ALL a AS \"a\", b AS \"c\", d AS \"d\", f + 1 AS \"e\";"
    );
}

#[test]
fn test_select_alias_override_keeps_position() {
    let mut q = qb();
    q.select("a AS x, b").unwrap().select("c AS x").unwrap();
    assert_eq!(q.build_query().unwrap(), "SELECT ALL c AS \"x\", b AS \"b\";");
    assert_eq!(q.expression_for_alias("x"), "c");
    assert_eq!(q.expression_for_alias("nope"), "nope");
}

#[test]
fn test_select_invalid_alias_is_parse_error() {
    let mut q = qb();
    let err = q.select("a AS ,").unwrap_err();
    assert!(err.is_parse());
    assert!(q.select_map().is_empty());
}

#[test]
fn test_from() {
    let mut q = qb();
    q.select("a").unwrap().from("t");
    assert_eq!(q.build_query().unwrap(), "SELECT ALL a AS \"a\" FROM t;");
}

#[test]
fn test_where() {
    let mut q = qb();
    q.where_("a = b").where_("c = d");
    assert_eq!(q.build_query().unwrap(), " WHERE a = b AND c = d;");

    let mut q = qb();
    q.where_all(["a = b", "c = d"]);
    assert_eq!(q.build_query().unwrap(), " WHERE a = b AND c = d;");
}

#[test]
fn test_where_in_list() {
    let mut q = qb();
    q.where_in("a", [1, 2]);
    assert_eq!(
        q.build_query().unwrap(),
        " WHERE a IN (@__QB_INPUT_1__, @__QB_INPUT_2__);"
    );
    assert_eq!(q.inputs().len(), 2);
    let first = q.inputs().get("__QB_INPUT_1__").unwrap();
    assert_eq!(first.ty, SqlType::Int);
    assert_eq!(first.value, InputValue::Int(1));
    assert_eq!(q.inputs().get("__QB_INPUT_2__").unwrap().value, InputValue::Int(2));
}

#[test]
fn test_where_in_empty_list_matches_nothing() {
    let mut q = qb();
    q.where_in("a", Vec::<i64>::new()).where_("b = 1");
    assert_eq!(q.build_query().unwrap(), " WHERE 1 = 0 AND b = 1;");
    assert!(q.inputs().is_empty());
}

#[test]
fn test_where_in_scalar() {
    let mut q = qb();
    q.where_in("name", "bob").where_in("id", vec![7i64]);
    assert_eq!(
        q.build_query().unwrap(),
        " WHERE name = @__QB_INPUT_1__ AND id IN (@__QB_INPUT_2__);"
    );
    assert_eq!(q.inputs().get("__QB_INPUT_1__").unwrap().ty, SqlType::NVarChar);
}

#[test]
fn test_group_by_resolves_aliases() {
    let mut q = qb();
    q.select("COUNT(*) AS n, UPPER(name) AS name")
        .unwrap()
        .from("users")
        .group_by("name")
        .group_by_all(["region"]);
    assert_eq!(
        q.build_query().unwrap(),
        "SELECT ALL COUNT(*) AS \"n\", UPPER(name) AS \"name\" FROM users GROUP BY UPPER(name), region;"
    );
}

#[test]
fn test_having() {
    let mut q = qb();
    q.group_by("a").having("COUNT(*) > 1").having_all(["MAX(b) < 3"]);
    assert_eq!(
        q.build_query().unwrap(),
        " GROUP BY a HAVING COUNT(*) > 1 AND MAX(b) < 3;"
    );
}

#[test]
fn test_order_by_single_entry_per_expression() {
    let mut q = qb();
    q.order_by("a DESC").order_by("a ASC");
    assert_eq!(q.order_list().as_slice(), ["a ASC"]);

    let mut q = qb();
    q.order_by("a DESC").order_by("b").order_by("a");
    assert_eq!(q.build_query().unwrap(), " ORDER BY b, a;");
}

#[test]
fn test_order_by_specs_and_lists() {
    let mut q = qb();
    q.order_by(OrderBy::desc("a"))
        .order_by(vec![OrderByInput::from("b"), OrderBy::asc("c").into()]);
    assert_eq!(q.build_query().unwrap(), " ORDER BY a DESC, b, c ASC;");
    assert_eq!(
        OrderBy {
            by: "x".into(),
            order: SortOrder::Desc
        }
        .to_clause(),
        "x DESC"
    );
}

#[test]
fn test_order_by_json() {
    let mut q = qb();
    q.order_by_json(json!([{ "by": "a", "order": "DESC" }, "b"])).unwrap();
    assert_eq!(q.build_query().unwrap(), " ORDER BY a DESC, b;");

    let err = q.order_by_json(json!({ "by": "a", "order": "desc" })).unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn test_offset_requires_order_by() {
    let mut q = qb();
    q.offset(25);
    let err = q.build_query().unwrap_err();
    assert!(err.is_validation());
    assert!(err.to_string().contains("ORDER BY is mandatory"));

    q.order_by("a");
    assert_eq!(q.build_query().unwrap(), " ORDER BY a OFFSET 25 ROWS;");
}

#[test]
fn test_fetch_alone_requires_order_by() {
    let mut q = qb();
    q.fetch(25);
    assert!(q.build_query().unwrap_err().is_validation());
    q.order_by("a");
    assert_eq!(
        q.build_query().unwrap(),
        " ORDER BY a OFFSET 0 ROWS FETCH NEXT 25 ROWS ONLY;"
    );
}

#[test]
fn test_top_excludes_offset_fetch() {
    let mut q = qb();
    q.select("a").unwrap().top(10).offset(5).order_by("a");
    let err = q.build_query().unwrap_err();
    assert!(err.to_string().contains("TOP cannot be combined"));

    // Resolving the conflict before rendering is enough.
    q.top(0);
    assert_eq!(
        q.build_query().unwrap(),
        "SELECT ALL a AS \"a\" ORDER BY a OFFSET 5 ROWS;"
    );
}

#[test]
fn test_clause_order_and_idempotent_render() {
    let mut q = qb();
    q.order_by("n DESC")
        .having("COUNT(*) > 1")
        .group_by("a")
        .where_("b = 1")
        .from("t")
        .select("a, COUNT(*) AS n")
        .unwrap();
    let expected = "SELECT ALL a AS \"a\", COUNT(*) AS \"n\" FROM t WHERE b = 1 \
                    GROUP BY a HAVING COUNT(*) > 1 ORDER BY n DESC;";
    assert_eq!(q.build_query().unwrap(), expected);
    assert_eq!(q.build_query().unwrap(), expected);
}

// ── Inputs ──

#[test]
fn test_input_auto_names() {
    let mut q = qb();
    assert_eq!(q.input(true), "@__QB_INPUT_1__");
    assert_eq!(q.input("x"), "@__QB_INPUT_2__");
    let names: Vec<&str> = q.inputs().names().collect();
    assert_eq!(names, ["__QB_INPUT_1__", "__QB_INPUT_2__"]);
    assert_eq!(q.inputs().get("__QB_INPUT_1__").unwrap().ty, SqlType::Bit);
}

#[test]
fn test_input_named_overwrites() {
    let mut q = qb();
    q.input_named(1, "id").input_named("two", "id");
    assert_eq!(q.inputs().len(), 1);
    let input = q.inputs().get("id").unwrap();
    assert_eq!(input.ty, SqlType::NVarChar);
    assert_eq!(input.value, InputValue::String("two".into()));
}

#[test]
fn test_typed_inputs() {
    let now = chrono::Utc::now();
    let mut q = qb();
    q.input_bool(true, "b")
        .input_int(3, "i")
        .input_float(1.5, "f")
        .input_string("s", "s")
        .input_bytes(b"raw".to_vec(), "bytes")
        .input_date_time(now, "at")
        .input_typed(2, "wide", SqlType::Float);

    let types: Vec<SqlType> = q.inputs().iter().map(|(_, i)| i.ty).collect();
    assert_eq!(
        types,
        [
            SqlType::Bit,
            SqlType::Int,
            SqlType::Float,
            SqlType::NVarChar,
            SqlType::VarBinary,
            SqlType::DateTime,
            SqlType::Float,
        ]
    );
    assert_eq!(q.inputs().get("at").unwrap().value, InputValue::DateTime(now));
}

#[test]
fn test_input_json_rejects_unsupported_kinds() {
    let mut q = qb();
    assert_eq!(q.input_json(json!(5)).unwrap(), "@__QB_INPUT_1__");
    for bad in [json!(null), json!([1]), json!({ "a": 1 })] {
        let err = q.input_json(bad).unwrap_err();
        assert!(matches!(err, QbError::UnsupportedInput(_)));
    }
    assert_eq!(q.inputs().len(), 1);
}

// ── Decomposer ──

#[test]
fn test_clause_patterns_individually() {
    let select = CLAUSES[0].regex();
    let caps = select.captures("SELECT DISTINCT TOP 5 a, b AS c").unwrap();
    assert_eq!(&caps["all"], "DISTINCT");
    assert_eq!(&caps["top"], "5");
    assert_eq!(&caps["select"], "a, b AS c");

    let caps = select.captures("SELECT a").unwrap();
    assert!(caps.name("all").is_none());
    assert!(caps.name("top").is_none());

    for (clause, text, group, expected) in [
        (&CLAUSES[1], "FROM users u", "from", "users u"),
        (&CLAUSES[2], "WHERE a = 1 AND b = 2", "where", "a = 1 AND b = 2"),
        (&CLAUSES[3], "GROUP BY a, b", "group_by", "a, b"),
        (&CLAUSES[4], "HAVING COUNT(*) > 1", "having", "COUNT(*) > 1"),
        (&CLAUSES[5], "ORDER BY a DESC", "order_by", "a DESC"),
    ] {
        let caps = clause.regex().captures(text).unwrap();
        assert_eq!(&caps[group], expected, "clause {}", clause.name);
        assert!(clause.groups.contains(&group));
    }

    let offset = CLAUSES[6].regex();
    let caps = offset.captures("OFFSET 10 ROW FETCH FIRST 1 ROW ONLY").unwrap();
    assert_eq!(&caps["offset"], "10");
    assert_eq!(&caps["fetch"], "1");
    assert!(offset.captures("OFFSET 10 ROWS").unwrap().name("fetch").is_none());
    assert!(offset.captures("OFFSET x ROWS").is_none());
}

#[test]
fn test_decompose_full_statement() {
    let stmt = decompose(
        "SELECT DISTINCT TOP 3 a, b AS c\n  FROM t\n\tWHERE x = 1 GROUP BY a HAVING COUNT(*) > 1 \
         ORDER BY a DESC OFFSET 10 ROWS FETCH NEXT 5 ROWS ONLY ;",
    )
    .unwrap();
    assert_eq!(stmt.all.as_deref(), Some("DISTINCT"));
    assert_eq!(stmt.top, Some(3));
    assert_eq!(stmt.select.as_deref(), Some("a, b AS c"));
    assert_eq!(stmt.from.as_deref(), Some("t"));
    assert_eq!(stmt.where_.as_deref(), Some("x = 1"));
    assert_eq!(stmt.group_by.as_deref(), Some("a"));
    assert_eq!(stmt.having.as_deref(), Some("COUNT(*) > 1"));
    assert_eq!(stmt.order_by.as_deref(), Some("a DESC"));
    assert_eq!(stmt.offset, Some(10));
    assert_eq!(stmt.fetch, Some(5));
}

#[test]
fn test_decompose_empty_and_partial() {
    assert_eq!(decompose("").unwrap(), Default::default());
    let stmt = decompose(" WHERE a = b;").unwrap();
    assert_eq!(stmt.where_.as_deref(), Some("a = b"));
    assert!(stmt.select.is_none());
}

#[test]
fn test_decompose_splits_on_keywords_inside_literals() {
    let stmt = decompose("SELECT ALL 'x FROM y' AS \"s\" FROM t;").unwrap();
    assert_eq!(stmt.select.as_deref(), Some("'x"));
    assert_eq!(stmt.from.as_deref(), Some("y' AS \"s\" FROM t"));
}

#[test]
fn test_parse_error_keeps_original_input() {
    let mut q = qb();
    let err = q.parse("DELETE\nFROM users").unwrap_err();
    match err {
        QbError::Parse { message, input } => {
            assert!(message.contains("Invalid query"));
            assert_eq!(input, "DELETE\nFROM users");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_parse_applies_mutators() {
    let mut q = qb();
    q.parse(
        "SELECT DISTINCT TOP 10 a, 1 + 1 AS Two\nFROM t WHERE a > 1 GROUP BY a HAVING COUNT(*) > 0 ORDER BY a",
    )
    .unwrap();
    assert_eq!(
        q.build_query().unwrap(),
        "SELECT DISTINCT TOP 10 a AS \"a\", 1 + 1 AS \"Two\" FROM t WHERE a > 1 \
         GROUP BY a HAVING COUNT(*) > 0 ORDER BY a;"
    );
}

#[test]
fn test_parse_adds_to_existing_state() {
    let mut q = qb();
    q.where_("x = 1").order_by("a DESC");
    q.parse("SELECT b FROM t WHERE y = 2 ORDER BY a").unwrap();
    assert_eq!(
        q.build_query().unwrap(),
        "SELECT ALL b AS \"b\" FROM t WHERE x = 1 AND y = 2 ORDER BY a;"
    );
}

#[test]
fn test_recompose_decompose_round_trip() {
    let statements = [
        "SELECT ALL a AS \"a\";",
        "SELECT ALL TOP 10 a AS \"a\";",
        "SELECT DISTINCT a AS \"a\", MAX(b, 'x y') AS \"m\" FROM t WHERE a = b AND c = d;",
        "SELECT ALL COUNT(*) AS \"n\" FROM t GROUP BY g HAVING COUNT(*) > 1 ORDER BY n DESC;",
        " ORDER BY a OFFSET 0 ROWS FETCH NEXT 25 ROWS ONLY;",
        " ORDER BY a OFFSET 25 ROWS;",
        " WHERE a = b AND c = d;",
    ];
    for sql in statements {
        let mut q = qb();
        q.parse(sql).unwrap();
        assert_eq!(q.build_query().unwrap(), sql);
    }
}

#[test]
fn test_select_map_round_trip() {
    let original = crate::scan_aliases(
        "a, 1 + 1 AS Two, CONCAT(\"strings ((\", MIN(1, 2), 'no end') AS duo, 'x, y' AS \"pair list\"",
    )
    .unwrap();
    let mut q = qb();
    q.select(original.clone()).unwrap();

    let mut reparsed = qb();
    reparsed.parse(&q.build_query().unwrap()).unwrap();
    assert_eq!(reparsed.select_map(), &original);
}

#[test]
fn test_quoted_alias_survives_render_parse_cycles() {
    let mut q = qb();
    q.select(SelectMap::from_iter([("say \"hi\"", "a")])).unwrap();
    let rendered = q.build_query().unwrap();
    assert_eq!(rendered, r#"SELECT ALL a AS "say \"hi\"";"#);

    let mut reparsed = qb();
    reparsed.parse(&rendered).unwrap();
    assert_eq!(reparsed.build_query().unwrap(), rendered);

    let mut again = qb();
    again.parse(&reparsed.build_query().unwrap()).unwrap();
    assert_eq!(again.select_map(), reparsed.select_map());
}

#[test]
fn test_escaped_alias_map_round_trip() {
    let original = crate::scan_aliases(r#"a AS "say \"hi\"", b AS "x\"""#).unwrap();
    let mut q = qb();
    q.select(original.clone()).unwrap();
    assert_eq!(
        q.build_query().unwrap(),
        r#"SELECT ALL a AS "say \"hi\"", b AS "x\"";"#
    );

    let mut reparsed = qb();
    reparsed.parse(&q.build_query().unwrap()).unwrap();
    assert_eq!(reparsed.select_map(), &original);
}

// ── Child builders ──

fn filtered() -> QueryBuilder<MockDriver> {
    let mut q = qb();
    q.select("UPPER(name) AS name, region AS r")
        .unwrap()
        .from("users")
        .where_("age > @min")
        .input_named(18, "min")
        .group_by("r")
        .having("COUNT(*) > 0")
        .order_by("name")
        .offset(5)
        .fetch(10);
    q
}

#[test]
fn test_distinct_child() {
    let parent = filtered();
    let child = parent.distinct_child("name");
    assert_eq!(
        child.build_query().unwrap(),
        "SELECT DISTINCT UPPER(name) AS \"distinct\" FROM users WHERE age > @min \
         GROUP BY region, UPPER(name) HAVING COUNT(*) > 0 ORDER BY \"distinct\" \
         OFFSET 5 ROWS FETCH NEXT 10 ROWS ONLY;"
    );
    assert_eq!(child.inputs(), parent.inputs());
}

#[test]
fn test_distinct_child_does_not_repeat_grouped_expression() {
    let parent = filtered();
    let child = parent.distinct_child("r");
    assert!(child.build_query().unwrap().contains(" GROUP BY region HAVING "));
}

#[test]
fn test_row_count_child() {
    let mut parent = filtered();
    parent.distinct(true);
    let child = parent.row_count_child();
    assert_eq!(
        child.build_query().unwrap(),
        "SELECT DISTINCT COUNT(*) AS \"rows\" FROM users WHERE age > @min \
         GROUP BY region HAVING COUNT(*) > 0;"
    );
    assert_eq!(child.inputs(), parent.inputs());
}

// ── Execution ──

#[tokio::test]
async fn test_execute_binds_inputs_and_returns_primary() {
    let driver = MockDriver::responding(|_| Ok(QueryOutput::single(int_rows("a", &[1, 2]))));
    let mut q = QueryBuilder::new(driver.clone());
    q.select("a").unwrap().from("t");
    let reference = q.input(5);
    q.where_(format!("a < {reference}"));

    assert_eq!(q.elapsed(), Duration::ZERO);
    let rows = q.execute().await.unwrap();
    assert_eq!(rows, int_rows("a", &[1, 2]));

    let executed = driver.executed();
    assert_eq!(executed.len(), 1);
    assert_eq!(
        executed[0].sql,
        "SELECT ALL a AS \"a\" FROM t WHERE a < @__QB_INPUT_1__;"
    );
    assert_eq!(
        executed[0].params,
        [("__QB_INPUT_1__".to_string(), SqlType::Int, InputValue::Int(5))]
    );
    assert!(q.time_start.is_some() && q.time_end.is_some());
}

#[tokio::test]
async fn test_execute_failure_is_normalized() {
    let driver = MockDriver::responding(|_| Err(QbError::not_found("relation missing")));
    let mut q = QueryBuilder::new(driver);
    q.select("a").unwrap();

    let err = q.execute().await.unwrap_err();
    assert!(err.is_driver());
    assert!(err.to_string().contains("relation missing"));
    assert!(q.time_end.is_some());
    // State is kept for inspection.
    assert_eq!(q.build_query().unwrap(), "SELECT ALL a AS \"a\";");
}

#[tokio::test]
async fn test_execute_decode_failure_keeps_column() {
    let driver = MockDriver::responding(|_| Err(QbError::decode("a", "bad bytes")));
    let mut q = QueryBuilder::new(driver);
    q.select("a").unwrap();

    let err = q.execute().await.unwrap_err();
    assert!(!err.is_driver());
    match err {
        QbError::Decode { column, message } => {
            assert_eq!(column, "a");
            assert_eq!(message, "bad bytes");
        }
        other => panic!("expected decode error, got {other:?}"),
    }
    assert!(q.time_end.is_some());
}

#[tokio::test]
async fn test_execute_render_error_skips_driver() {
    let driver = MockDriver::default();
    let mut q = QueryBuilder::new(driver.clone());
    q.offset(1);
    assert!(q.execute().await.unwrap_err().is_validation());
    assert!(driver.executed().is_empty());
    assert_eq!(q.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn test_record_set_shaping() {
    let driver = MockDriver::responding(|_| {
        Ok(QueryOutput {
            primary: int_rows("a", &[1]),
            all: vec![int_rows("a", &[1]), int_rows("b", &[2, 3])],
        })
    });
    let mut q = QueryBuilder::new(driver);
    q.select("a").unwrap();

    q.record_set(RecordSet::Index(1));
    assert_eq!(q.execute().await.unwrap(), int_rows("b", &[2, 3]));

    q.record_set(RecordSet::Index(2));
    assert!(matches!(q.execute().await.unwrap_err(), QbError::NotFound(_)));

    q.record_set(RecordSet::transform(|mut rows| {
        rows.push(Record::new().with("a", SqlValue::Int(9)));
        rows
    }));
    assert_eq!(q.execute().await.unwrap(), int_rows("a", &[1, 9]));
}

#[tokio::test]
async fn test_execute_sql_decomposes_first() {
    let driver = MockDriver::default();
    let mut q = QueryBuilder::new(driver.clone());
    q.execute_sql("SELECT a\nFROM t\nORDER BY a OFFSET 0 ROWS FETCH FIRST 5 ROWS ONLY;")
        .await
        .unwrap();
    assert_eq!(
        driver.executed()[0].sql,
        "SELECT ALL a AS \"a\" FROM t ORDER BY a OFFSET 0 ROWS FETCH NEXT 5 ROWS ONLY;"
    );
}

#[derive(Debug, PartialEq)]
struct Pair {
    a: i64,
    b: String,
}

impl FromRecord for Pair {
    fn from_record(record: &Record) -> QbResult<Self> {
        Ok(Pair {
            a: record.try_get("a")?,
            b: record.try_get("b")?,
        })
    }
}

#[tokio::test]
async fn test_fetch_all_maps_records() {
    let driver = MockDriver::responding(|_| {
        Ok(QueryOutput::single(vec![
            Record::new()
                .with("a", SqlValue::Int(1))
                .with("b", SqlValue::Text("x".into())),
        ]))
    });
    let mut q = QueryBuilder::new(driver);
    q.select("a, b").unwrap();
    let pairs: Vec<Pair> = q.fetch_all().await.unwrap();
    assert_eq!(pairs, [Pair { a: 1, b: "x".into() }]);
}

#[tokio::test]
async fn test_distinct_values() {
    let driver = MockDriver::responding(|_| {
        Ok(QueryOutput::single(vec![
            Record::new().with("distinct", SqlValue::Text("EU".into())),
            Record::new().with("distinct", SqlValue::Text("US".into())),
        ]))
    });
    let parent = {
        let mut q = QueryBuilder::new(driver.clone());
        q.select("region AS r").unwrap().from("users").input_named(1, "x");
        q
    };

    let values = parent.distinct_values("r").await.unwrap();
    assert_eq!(values, [SqlValue::Text("EU".into()), SqlValue::Text("US".into())]);

    let executed = driver.executed();
    assert_eq!(
        executed[0].sql,
        "SELECT DISTINCT region AS \"distinct\" FROM users GROUP BY region ORDER BY \"distinct\";"
    );
    assert_eq!(executed[0].params.len(), 1);
    // The parent was not executed.
    assert_eq!(parent.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn test_distinct_values_many_keeps_order() {
    let driver = MockDriver::responding(|sql| {
        let value = if sql.contains("SELECT DISTINCT a ") { 1 } else { 2 };
        Ok(QueryOutput::single(int_rows("distinct", &[value])))
    });
    let mut parent = QueryBuilder::new(driver);
    parent.from("t");

    let values = parent.distinct_values_many(["a", "b"]).await.unwrap();
    assert_eq!(values, [vec![SqlValue::Int(1)], vec![SqlValue::Int(2)]]);
}

#[tokio::test]
async fn test_distinct_values_many_fails_fast() {
    let driver = MockDriver::responding(|sql| {
        if sql.contains("SELECT DISTINCT bad ") {
            Err(QbError::Driver("column \"bad\" does not exist".into()))
        } else {
            Ok(QueryOutput::default())
        }
    });
    let mut parent = QueryBuilder::new(driver);
    parent.from("t");

    let err = parent.distinct_values_many(vec!["a".to_string(), "bad".to_string()]).await;
    assert_eq!(
        err.unwrap_err().to_string(),
        "column \"bad\" does not exist"
    );
}

#[tokio::test]
async fn test_row_count() {
    let driver = MockDriver::responding(|_| Ok(QueryOutput::single(int_rows("rows", &[42]))));
    let mut parent = QueryBuilder::new(driver.clone());
    parent
        .select("a")
        .unwrap()
        .from("t")
        .where_("a > 1")
        .order_by("a")
        .offset(10);

    assert_eq!(parent.row_count().await.unwrap(), 42);
    assert_eq!(
        driver.executed()[0].sql,
        "SELECT ALL COUNT(*) AS \"rows\" FROM t WHERE a > 1;"
    );
}

#[tokio::test]
async fn test_row_count_without_rows_is_not_found() {
    let mut parent = qb();
    parent.from("t");
    assert!(matches!(
        parent.row_count().await.unwrap_err(),
        QbError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_monitors_observe_execution() {
    let stats = Arc::new(StatsMonitor::new());
    let driver = MockDriver::responding(|sql| {
        if sql.contains("boom") {
            Err(QbError::Driver("boom".into()))
        } else {
            Ok(QueryOutput::single(int_rows("a", &[1, 2, 3])))
        }
    });
    let mut q = QueryBuilder::new(driver);
    q.select("a")
        .unwrap()
        .with_monitor_arc(stats.clone())
        .with_slow_query_threshold(Duration::ZERO)
        .tag("monitored");

    q.execute().await.unwrap();
    q.where_("boom");
    q.execute().await.unwrap_err();

    let snapshot = stats.stats();
    assert_eq!(snapshot.total_queries, 2);
    assert_eq!(snapshot.failed_queries, 1);
    assert_eq!(snapshot.slow_queries, 2);

    // Child queries report through inherited monitors.
    let _ = q.row_count().await;
    assert_eq!(stats.stats().total_queries, 3);
}
