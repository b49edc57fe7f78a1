use sqlbridge::placeholder::scan_placeholders;
use sqlbridge::{
    build, build_explain, AggregateKind, ArithOp, Condition, Dialect, EngineError, ErrorKind,
    Expression, FilterNode, FilterOp, JoinColumn, JoinSpec, LockMode, NullsOrder, Operand,
    Operation, OrderSpec, QueryIR, RawQuery, ScalarFn, UnionSpec, Value,
};

fn cond(field: &str, op: FilterOp, operand: Operand) -> FilterNode {
    FilterNode::Condition(Condition {
        field: field.to_string(),
        op,
        operand,
    })
}

fn select(table: &str, columns: &[&str]) -> QueryIR {
    let mut ir = QueryIR::new(Operation::Select, table);
    ir.columns = columns.iter().map(ToString::to_string).collect();
    ir
}

#[test]
fn filter_compilation_postgres() {
    // SELECT with a nested boolean filter, ordering, and a limit.
    let mut ir = select("users", &["id", "name"]);
    ir.filter = Some(FilterNode::And(vec![
        cond("age", FilterOp::Gte, Operand::Value(Value::Int(18))),
        FilterNode::Or(vec![
            cond("status", FilterOp::Eq, Operand::Value(Value::Text("active".into()))),
            cond("role", FilterOp::Eq, Operand::Value(Value::Text("admin".into()))),
        ]),
    ]));
    ir.order_by = vec![OrderSpec {
        column: "created_at".into(),
        descending: true,
        nulls: None,
    }];
    ir.limit = Some(10);

    let (sql, params) = build(&ir, Dialect::Postgres).unwrap();
    assert_eq!(
        sql,
        "SELECT \"id\", \"name\" FROM \"users\" WHERE \"age\" >= $1 AND (\"status\" = $2 OR \"role\" = $3) ORDER BY \"created_at\" DESC LIMIT 10"
    );
    assert_eq!(
        params,
        vec![
            Value::Int(18),
            Value::Text("active".into()),
            Value::Text("admin".into())
        ]
    );
}

#[test]
fn atomic_increment_sqlite() {
    let mut ir = QueryIR::new(Operation::Update, "posts");
    ir.update_values = vec![(
        "views".to_string(),
        Expression::BinOp {
            op: ArithOp::Add,
            left: Box::new(Expression::Column("views".into())),
            right: Box::new(Expression::Literal(Value::Int(1))),
        },
    )];
    ir.filter = Some(cond("id", FilterOp::Eq, Operand::Value(Value::Int(42))));

    let (sql, params) = build(&ir, Dialect::Sqlite).unwrap();
    assert_eq!(sql, "UPDATE \"posts\" SET \"views\" = \"views\" + ? WHERE \"id\" = ?");
    assert_eq!(params, vec![Value::Int(1), Value::Int(42)]);
}

#[test]
fn bulk_insert_with_returning_postgres() {
    let mut ir = QueryIR::new(Operation::Insert, "users");
    ir.insert_rows = vec![
        vec![
            ("name".to_string(), Value::Text("A".into())),
            ("age".to_string(), Value::Int(1)),
        ],
        vec![
            ("name".to_string(), Value::Text("B".into())),
            ("age".to_string(), Value::Int(2)),
        ],
    ];
    ir.returning = vec!["id".into()];

    let (sql, params) = build(&ir, Dialect::Postgres).unwrap();
    assert_eq!(
        sql,
        "INSERT INTO \"users\" (\"name\",\"age\") VALUES ($1,$2),($3,$4) RETURNING \"id\""
    );
    assert_eq!(
        params,
        vec![
            Value::Text("A".into()),
            Value::Int(1),
            Value::Text("B".into()),
            Value::Int(2)
        ]
    );
}

#[test]
fn returning_is_dropped_on_mysql() {
    let mut ir = QueryIR::new(Operation::Insert, "users");
    ir.insert_rows = vec![vec![("name".to_string(), Value::Text("A".into()))]];
    ir.returning = vec!["id".into()];

    let (sql, _) = build(&ir, Dialect::MySql).unwrap();
    assert_eq!(sql, "INSERT INTO `users` (`name`) VALUES (?)");
}

#[test]
fn empty_in_compiles_to_constant_false() {
    let mut ir = select("users", &["id"]);
    ir.filter = Some(cond("status", FilterOp::In, Operand::List(vec![])));

    let (sql, params) = build(&ir, Dialect::Postgres).unwrap();
    assert_eq!(sql, "SELECT \"id\" FROM \"users\" WHERE 1 = 0");
    assert!(params.is_empty());
}

#[test]
fn icontains_mysql_lowers_both_sides() {
    let mut ir = select("users", &["id"]);
    ir.filter = Some(cond(
        "name",
        FilterOp::IContains,
        Operand::Value(Value::Text("oH".into())),
    ));

    let (sql, params) = build(&ir, Dialect::MySql).unwrap();
    assert_eq!(
        sql,
        "SELECT `id` FROM `users` WHERE LOWER(`name`) LIKE LOWER(?)"
    );
    assert_eq!(params, vec![Value::Text("%oH%".into())]);
}

#[test]
fn icontains_postgres_uses_ilike() {
    let mut ir = select("users", &["id"]);
    ir.filter = Some(cond(
        "name",
        FilterOp::IContains,
        Operand::Value(Value::Text("oH".into())),
    ));

    let (sql, params) = build(&ir, Dialect::Postgres).unwrap();
    assert_eq!(sql, "SELECT \"id\" FROM \"users\" WHERE \"name\" ILIKE $1");
    assert_eq!(params, vec![Value::Text("%oH%".into())]);
}

#[test]
fn startswith_and_iexact() {
    let mut ir = select("users", &["id"]);
    ir.filter = Some(cond(
        "name",
        FilterOp::StartsWith,
        Operand::Value(Value::Text("Jo".into())),
    ));
    let (sql, params) = build(&ir, Dialect::Sqlite).unwrap();
    assert_eq!(sql, "SELECT \"id\" FROM \"users\" WHERE \"name\" LIKE ?");
    assert_eq!(params, vec![Value::Text("Jo%".into())]);

    let mut ir = select("users", &["id"]);
    ir.filter = Some(cond(
        "email",
        FilterOp::IExact,
        Operand::Value(Value::Text("A@B.COM".into())),
    ));
    let (sql, _) = build(&ir, Dialect::Postgres).unwrap();
    assert_eq!(
        sql,
        "SELECT \"id\" FROM \"users\" WHERE LOWER(\"email\") = LOWER($1)"
    );
}

#[test]
fn between_requires_two_values() {
    let mut ir = select("numbers", &["value"]);
    ir.filter = Some(cond(
        "value",
        FilterOp::Between,
        Operand::List(vec![Value::Int(1), Value::Int(5)]),
    ));
    let (sql, _) = build(&ir, Dialect::Postgres).unwrap();
    assert_eq!(
        sql,
        "SELECT \"value\" FROM \"numbers\" WHERE \"value\" BETWEEN $1 AND $2"
    );

    let mut bad = select("numbers", &["value"]);
    bad.filter = Some(cond(
        "value",
        FilterOp::Between,
        Operand::List(vec![Value::Int(1)]),
    ));
    let err = build(&bad, Dialect::Postgres).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Build);
}

#[test]
fn isnull_both_polarities() {
    let mut ir = select("entries", &["id"]);
    ir.filter = Some(cond(
        "deleted_at",
        FilterOp::IsNull,
        Operand::Value(Value::Bool(true)),
    ));
    let (sql, _) = build(&ir, Dialect::Postgres).unwrap();
    assert_eq!(sql, "SELECT \"id\" FROM \"entries\" WHERE \"deleted_at\" IS NULL");

    let mut ir = select("entries", &["id"]);
    ir.filter = Some(cond(
        "deleted_at",
        FilterOp::IsNull,
        Operand::Value(Value::Bool(false)),
    ));
    let (sql, _) = build(&ir, Dialect::Postgres).unwrap();
    assert_eq!(
        sql,
        "SELECT \"id\" FROM \"entries\" WHERE \"deleted_at\" IS NOT NULL"
    );
}

#[test]
fn date_part_lookups_per_dialect() {
    let mut ir = select("events", &["id"]);
    ir.filter = Some(cond("at", FilterOp::Year, Operand::Value(Value::Int(2024))));

    let (sql, _) = build(&ir, Dialect::Postgres).unwrap();
    assert_eq!(
        sql,
        "SELECT \"id\" FROM \"events\" WHERE EXTRACT(YEAR FROM \"at\") = $1"
    );
    let (sql, _) = build(&ir, Dialect::Sqlite).unwrap();
    assert_eq!(
        sql,
        "SELECT \"id\" FROM \"events\" WHERE CAST(STRFTIME('%Y', \"at\") AS INTEGER) = ?"
    );
    let (sql, _) = build(&ir, Dialect::MySql).unwrap();
    assert_eq!(sql, "SELECT `id` FROM `events` WHERE YEAR(`at`) = ?");
}

#[test]
fn date_part_tuple_expands_to_conjunction() {
    // month with (month, day) parts compares both.
    let mut ir = select("events", &["id"]);
    ir.filter = Some(cond(
        "at",
        FilterOp::Month,
        Operand::List(vec![Value::Int(3), Value::Int(14)]),
    ));
    let (sql, params) = build(&ir, Dialect::MySql).unwrap();
    assert_eq!(
        sql,
        "SELECT `id` FROM `events` WHERE (MONTH(`at`) = ? AND DAY(`at`) = ?)"
    );
    assert_eq!(params, vec![Value::Int(3), Value::Int(14)]);

    // day has no finer parts to consume a second value.
    let mut bad = select("events", &["id"]);
    bad.filter = Some(cond(
        "at",
        FilterOp::Day,
        Operand::List(vec![Value::Int(1), Value::Int(2)]),
    ));
    assert!(build(&bad, Dialect::MySql).is_err());
}

#[test]
fn aggregates_and_annotations() {
    let mut ir = select("orders", &[]);
    ir.columns = vec!["customer_id".into()];
    ir.group_by = vec!["customer_id".into()];
    ir.annotations = vec![
        (
            "total".to_string(),
            Expression::Aggregate {
                kind: AggregateKind::Sum,
                column: Some("amount".into()),
                distinct: false,
            },
        ),
        (
            "n".to_string(),
            Expression::Aggregate {
                kind: AggregateKind::Count,
                column: None,
                distinct: false,
            },
        ),
    ];
    ir.having = Some(cond(
        "total",
        FilterOp::Gt,
        Operand::Value(Value::Int(100)),
    ));

    let (sql, params) = build(&ir, Dialect::Postgres).unwrap();
    assert_eq!(
        sql,
        "SELECT \"customer_id\", SUM(\"amount\") AS \"total\", COUNT(*) AS \"n\" FROM \"orders\" GROUP BY \"customer_id\" HAVING \"total\" > $1"
    );
    assert_eq!(params, vec![Value::Int(100)]);
}

#[test]
fn count_distinct() {
    let mut ir = select("orders", &[]);
    ir.annotations = vec![(
        "buyers".to_string(),
        Expression::Aggregate {
            kind: AggregateKind::Count,
            column: Some("customer_id".into()),
            distinct: true,
        },
    )];
    let (sql, _) = build(&ir, Dialect::Postgres).unwrap();
    assert_eq!(
        sql,
        "SELECT COUNT(DISTINCT \"customer_id\") AS \"buyers\" FROM \"orders\""
    );
}

#[test]
fn concat_and_coalesce() {
    let mut ir = select("users", &[]);
    ir.annotations = vec![(
        "label".to_string(),
        Expression::Func {
            kind: ScalarFn::Concat,
            args: vec![
                Expression::Column("first".into()),
                Expression::Literal(Value::Text(" ".into())),
                Expression::Column("last".into()),
            ],
        },
    )];
    let (sql, _) = build(&ir, Dialect::Sqlite).unwrap();
    assert_eq!(
        sql,
        "SELECT \"first\" || ? || \"last\" AS \"label\" FROM \"users\""
    );
    let (sql, _) = build(&ir, Dialect::MySql).unwrap();
    assert_eq!(sql, "SELECT CONCAT(`first`, ?, `last`) AS `label` FROM `users`");

    let mut ir = select("users", &[]);
    ir.annotations = vec![(
        "nick".to_string(),
        Expression::Func {
            kind: ScalarFn::Coalesce,
            args: vec![
                Expression::Column("nickname".into()),
                Expression::Column("first".into()),
            ],
        },
    )];
    let (sql, _) = build(&ir, Dialect::Postgres).unwrap();
    assert_eq!(
        sql,
        "SELECT COALESCE(\"nickname\", \"first\") AS \"nick\" FROM \"users\""
    );
}

#[test]
fn nested_binop_preserves_tree_shape() {
    let mut ir = QueryIR::new(Operation::Update, "items");
    ir.update_values = vec![(
        "price".to_string(),
        Expression::BinOp {
            op: ArithOp::Mul,
            left: Box::new(Expression::BinOp {
                op: ArithOp::Add,
                left: Box::new(Expression::Column("base".into())),
                right: Box::new(Expression::Column("markup".into())),
            }),
            right: Box::new(Expression::Literal(Value::Float(1.2))),
        },
    )];
    let (sql, _) = build(&ir, Dialect::Postgres).unwrap();
    assert_eq!(
        sql,
        "UPDATE \"items\" SET \"price\" = (\"base\" + \"markup\") * $1"
    );
}

#[test]
fn joins_project_prefixed_columns() {
    let mut ir = select("posts", &["title"]);
    ir.joins = vec![JoinSpec {
        table: "authors".into(),
        alias: "author".into(),
        parent_alias: None,
        source_column: "author_id".into(),
        target_column: "id".into(),
        result_prefix: "author".into(),
        columns: vec![
            JoinColumn {
                field: "id".into(),
                column: "id".into(),
            },
            JoinColumn {
                field: "name".into(),
                column: "name".into(),
            },
        ],
    }];

    let (sql, _) = build(&ir, Dialect::Postgres).unwrap();
    assert_eq!(
        sql,
        "SELECT \"title\", \"author\".\"id\" AS \"author__id\", \"author\".\"name\" AS \"author__name\" FROM \"posts\" LEFT JOIN \"authors\" AS \"author\" ON \"posts\".\"author_id\" = \"author\".\"id\""
    );
}

#[test]
fn unions_append_before_ordering() {
    let mut arm = select("archived_users", &["id"]);
    arm.filter = Some(cond("age", FilterOp::Gt, Operand::Value(Value::Int(30))));

    let mut ir = select("users", &["id"]);
    ir.filter = Some(cond("age", FilterOp::Gt, Operand::Value(Value::Int(20))));
    ir.unions = vec![UnionSpec {
        query: Box::new(arm),
        distinct: false,
    }];
    ir.order_by = vec![OrderSpec {
        column: "id".into(),
        descending: false,
        nulls: None,
    }];

    let (sql, params) = build(&ir, Dialect::Postgres).unwrap();
    assert_eq!(
        sql,
        "SELECT \"id\" FROM \"users\" WHERE \"age\" > $1 UNION ALL SELECT \"id\" FROM \"archived_users\" WHERE \"age\" > $2 ORDER BY \"id\""
    );
    assert_eq!(params, vec![Value::Int(20), Value::Int(30)]);
}

#[test]
fn locking_clauses_by_dialect() {
    let mut ir = select("jobs", &["id"]);
    ir.locking = LockMode::ForUpdate;

    let (sql, _) = build(&ir, Dialect::Postgres).unwrap();
    assert!(sql.ends_with(" FOR UPDATE"));
    let (sql, _) = build(&ir, Dialect::MySql).unwrap();
    assert!(sql.ends_with(" FOR UPDATE"));
    // SQLite locks at database level; the clause is a no-op.
    let (sql, _) = build(&ir, Dialect::Sqlite).unwrap();
    assert_eq!(sql, "SELECT \"id\" FROM \"jobs\"");

    ir.locking = LockMode::ForShare;
    let (sql, _) = build(&ir, Dialect::Postgres).unwrap();
    assert!(sql.ends_with(" FOR SHARE"));
}

#[test]
fn order_by_nulls_placement() {
    let mut ir = select("t", &["a"]);
    ir.order_by = vec![OrderSpec {
        column: "a".into(),
        descending: true,
        nulls: Some(NullsOrder::Last),
    }];
    let (sql, _) = build(&ir, Dialect::Postgres).unwrap();
    assert_eq!(sql, "SELECT \"a\" FROM \"t\" ORDER BY \"a\" DESC NULLS LAST");

    // MySQL emulates the placement with an IS NULL sort key.
    let (sql, _) = build(&ir, Dialect::MySql).unwrap();
    assert_eq!(
        sql,
        "SELECT `a` FROM `t` ORDER BY `a` IS NULL ASC, `a` DESC"
    );
}

#[test]
fn offset_without_limit_per_dialect() {
    let mut ir = select("t", &["a"]);
    ir.offset = Some(20);
    let (sql, _) = build(&ir, Dialect::Postgres).unwrap();
    assert_eq!(sql, "SELECT \"a\" FROM \"t\" OFFSET 20");
    let (sql, _) = build(&ir, Dialect::Sqlite).unwrap();
    assert_eq!(sql, "SELECT \"a\" FROM \"t\" LIMIT -1 OFFSET 20");
    let (sql, _) = build(&ir, Dialect::MySql).unwrap();
    assert_eq!(
        sql,
        "SELECT `a` FROM `t` LIMIT 18446744073709551615 OFFSET 20"
    );
}

#[test]
fn negative_limit_is_usage_error() {
    let mut ir = select("t", &["a"]);
    ir.limit = Some(-1);
    assert_eq!(
        build(&ir, Dialect::Postgres).unwrap_err().kind(),
        ErrorKind::Usage
    );

    let mut ir = select("t", &["a"]);
    ir.offset = Some(-3);
    assert_eq!(
        build(&ir, Dialect::Postgres).unwrap_err().kind(),
        ErrorKind::Usage
    );
}

#[test]
fn empty_bulk_insert_is_usage_error() {
    let ir = QueryIR::new(Operation::Insert, "users");
    assert_eq!(
        build(&ir, Dialect::Postgres).unwrap_err().kind(),
        ErrorKind::Usage
    );
}

#[test]
fn inconsistent_bulk_rows_rejected() {
    let mut ir = QueryIR::new(Operation::Insert, "users");
    ir.insert_rows = vec![
        vec![("name".to_string(), Value::Text("A".into()))],
        vec![("email".to_string(), Value::Text("b@c".into()))],
    ];
    assert_eq!(
        build(&ir, Dialect::Postgres).unwrap_err().kind(),
        ErrorKind::Build
    );
}

#[test]
fn raw_passthrough_and_style_rejection() {
    let mut ir = QueryIR::new(Operation::Raw, "");
    ir.raw = Some(RawQuery {
        sql: "SELECT * FROM users WHERE id = $1".into(),
        params: vec![Value::Int(1)],
    });
    let (sql, params) = build(&ir, Dialect::Postgres).unwrap();
    assert_eq!(sql, "SELECT * FROM users WHERE id = $1");
    assert_eq!(params, vec![Value::Int(1)]);

    // Mixed styles are rejected outright.
    let mut mixed = QueryIR::new(Operation::Raw, "");
    mixed.raw = Some(RawQuery {
        sql: "SELECT * FROM users WHERE id = $1 AND age > ?".into(),
        params: vec![Value::Int(1), Value::Int(2)],
    });
    assert_eq!(
        build(&mixed, Dialect::Postgres).unwrap_err().kind(),
        ErrorKind::Build
    );

    // Wrong style for the dialect is rejected too.
    let mut wrong = QueryIR::new(Operation::Raw, "");
    wrong.raw = Some(RawQuery {
        sql: "SELECT * FROM users WHERE id = ?".into(),
        params: vec![Value::Int(1)],
    });
    assert_eq!(
        build(&wrong, Dialect::Postgres).unwrap_err().kind(),
        ErrorKind::Build
    );

    // Arity mismatch between placeholders and supplied params.
    let mut short = QueryIR::new(Operation::Raw, "");
    short.raw = Some(RawQuery {
        sql: "SELECT * FROM users WHERE id = ? AND age > ?".into(),
        params: vec![Value::Int(1)],
    });
    assert_eq!(
        build(&short, Dialect::Sqlite).unwrap_err().kind(),
        ErrorKind::Build
    );
}

#[test]
fn explain_prefixes() {
    let ir = select("users", &["id"]);
    let (sql, _) = build_explain(&ir, Dialect::Postgres, false).unwrap();
    assert!(sql.starts_with("EXPLAIN SELECT"));
    let (sql, _) = build_explain(&ir, Dialect::Postgres, true).unwrap();
    assert!(sql.starts_with("EXPLAIN (ANALYZE) SELECT"));
    let (sql, _) = build_explain(&ir, Dialect::Sqlite, true).unwrap();
    assert!(sql.starts_with("EXPLAIN QUERY PLAN SELECT"));
    let (sql, _) = build_explain(&ir, Dialect::MySql, true).unwrap();
    assert!(sql.starts_with("EXPLAIN ANALYZE SELECT"));
}

#[test]
fn builder_is_deterministic() {
    let mut ir = select("users", &["id", "name"]);
    ir.filter = Some(FilterNode::And(vec![
        cond("age", FilterOp::Gte, Operand::Value(Value::Int(18))),
        FilterNode::Not(Box::new(cond(
            "banned",
            FilterOp::Eq,
            Operand::Value(Value::Bool(true)),
        ))),
    ]));
    ir.limit = Some(5);

    let first = build(&ir, Dialect::Postgres).unwrap();
    for _ in 0..10 {
        assert_eq!(build(&ir, Dialect::Postgres).unwrap(), first);
    }
}

#[test]
fn placeholder_arity_matches_params() {
    let mut ir = select("users", &["id"]);
    ir.filter = Some(FilterNode::And(vec![
        cond("a", FilterOp::Eq, Operand::Value(Value::Int(1))),
        cond(
            "b",
            FilterOp::In,
            Operand::List(vec![Value::Int(2), Value::Int(3), Value::Int(4)]),
        ),
        cond(
            "c",
            FilterOp::Between,
            Operand::List(vec![Value::Int(5), Value::Int(6)]),
        ),
        cond(
            "d",
            FilterOp::IContains,
            Operand::Value(Value::Text("x".into())),
        ),
    ]));

    for dialect in [Dialect::Postgres, Dialect::Sqlite, Dialect::MySql] {
        let (sql, params) = build(&ir, dialect).unwrap();
        let scan = scan_placeholders(&sql);
        assert!(!scan.is_mixed(), "{dialect:?}: {sql}");
        assert_eq!(scan.arity(), params.len(), "{dialect:?}: {sql}");
    }
}

#[test]
fn values_never_appear_in_sql_text() {
    let hostile = "'; DROP TABLE users; --";
    let mut ir = select("users", &["id"]);
    ir.filter = Some(FilterNode::Or(vec![
        cond(
            "name",
            FilterOp::Eq,
            Operand::Value(Value::Text(hostile.into())),
        ),
        cond(
            "bio",
            FilterOp::Contains,
            Operand::Value(Value::Text(hostile.into())),
        ),
    ]));

    for dialect in [Dialect::Postgres, Dialect::Sqlite, Dialect::MySql] {
        let (sql, params) = build(&ir, dialect).unwrap();
        assert!(!sql.contains(hostile), "{dialect:?}: {sql}");
        assert!(!sql.contains("DROP TABLE"), "{dialect:?}: {sql}");
        assert_eq!(params.len(), 2);
    }
}

#[test]
fn raw_fragment_is_spliced_verbatim() {
    let mut ir = select("users", &[]);
    ir.annotations = vec![(
        "age_days".to_string(),
        Expression::RawFragment("EXTRACT(EPOCH FROM now() - created_at) / 86400".into()),
    )];
    let (sql, params) = build(&ir, Dialect::Postgres).unwrap();
    assert_eq!(
        sql,
        "SELECT EXTRACT(EPOCH FROM now() - created_at) / 86400 AS \"age_days\" FROM \"users\""
    );
    assert!(params.is_empty());
}

#[test]
fn identifier_quoting_escapes_quotes() {
    let mut ir = select("public.users", &["weird\"col"]);
    ir.limit = Some(1);
    let (sql, _) = build(&ir, Dialect::Postgres).unwrap();
    assert_eq!(
        sql,
        "SELECT \"weird\"\"col\" FROM \"public\".\"users\" LIMIT 1"
    );
}

#[test]
fn distinct_select() {
    let mut ir = select("users", &["country"]);
    ir.distinct = true;
    let (sql, _) = build(&ir, Dialect::Postgres).unwrap();
    assert_eq!(sql, "SELECT DISTINCT \"country\" FROM \"users\"");
}

#[test]
fn eq_null_degrades_to_is_null() {
    let mut ir = select("users", &["id"]);
    ir.filter = Some(cond("email", FilterOp::Eq, Operand::Value(Value::Null)));
    let (sql, params) = build(&ir, Dialect::Postgres).unwrap();
    assert_eq!(sql, "SELECT \"id\" FROM \"users\" WHERE \"email\" IS NULL");
    assert!(params.is_empty());
}

#[test]
fn usage_error_from_invalid_ir_shapes() {
    let raw_without_payload = QueryIR::new(Operation::Raw, "");
    assert!(matches!(
        build(&raw_without_payload, Dialect::Postgres),
        Err(EngineError::Usage(_))
    ));

    let update_without_set = QueryIR::new(Operation::Update, "t");
    assert!(matches!(
        build(&update_without_set, Dialect::Postgres),
        Err(EngineError::Usage(_))
    ));
}
