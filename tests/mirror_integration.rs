use rusqlite::{params, Connection, Result};
use sqlite_mirror::{
    shape_pairs, DiskStore, IdentifierPolicy, Mirror, MirrorConfig, MirrorError, PatternQuery,
    Termination, Value,
};
use tempfile::NamedTempFile;

// Helper function to create a temporary disk database holding `pairs(a, b)`
fn create_temp_db(rows: i64) -> Result<NamedTempFile> {
    let temp_file = NamedTempFile::new().unwrap();
    let conn = Connection::open(temp_file.path())?;
    conn.execute_batch("CREATE TABLE pairs (a TEXT, b INTEGER);")?;
    let tx = conn.unchecked_transaction()?;
    {
        let mut insert = tx.prepare("INSERT INTO pairs (rowid, a, b) VALUES (?1, ?2, ?3)")?;
        for id in 1..=rows {
            insert.execute(params![id, format!("key{id}"), id * 10])?;
        }
    }
    tx.commit()?;
    Ok(temp_file)
}

fn disk_count(file: &NamedTempFile, table: &str) -> i64 {
    let conn = Connection::open(file.path()).unwrap();
    conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[tokio::test]
async fn test_replicates_small_table_in_one_window() {
    let disk = create_temp_db(1_000).unwrap();
    for termination in [
        Termination::MaxRowid,
        Termination::EmptyWindow,
        Termination::Ceiling,
    ] {
        let mirror = Mirror::new(MirrorConfig::new().with_termination(termination)).unwrap();
        mirror.create_memory_table("cache", "a, b").await.unwrap();
        let report = mirror.load_from_disk(disk.path(), "pairs", "cache").await.unwrap();

        assert_eq!(report.rows_copied, 1_000, "{termination:?}");
        assert_eq!(report.non_empty_windows, 1, "{termination:?}");
        assert_eq!(mirror.memory().row_count("cache").await.unwrap(), 1_000);
    }
}

#[tokio::test]
async fn test_window_counts_per_termination() {
    let disk = create_temp_db(25).unwrap();
    let base = MirrorConfig::new().with_stride(10).with_ceiling(100);

    let expectations = [
        (Termination::MaxRowid, 3),
        (Termination::EmptyWindow, 4),
        (Termination::Ceiling, 10),
    ];
    for (termination, windows) in expectations {
        let mirror = Mirror::new(base.clone().with_termination(termination)).unwrap();
        mirror.create_memory_table("cache", "a, b").await.unwrap();
        let report = mirror.load_from_disk(disk.path(), "pairs", "cache").await.unwrap();
        assert_eq!(report.windows_scanned, windows, "{termination:?}");
        assert_eq!(report.non_empty_windows, 3, "{termination:?}");
        assert_eq!(report.rows_copied, 25, "{termination:?}");
    }
}

#[tokio::test]
async fn test_rows_on_stride_boundaries_are_kept() {
    // Row-ids 10, 20 and 30 sit exactly on window edges.
    let disk = create_temp_db(30).unwrap();
    let mirror = Mirror::new(MirrorConfig::new().with_stride(10)).unwrap();
    mirror.create_memory_table("cache", "a, b").await.unwrap();
    mirror.load_from_disk(disk.path(), "pairs", "cache").await.unwrap();

    assert_eq!(
        mirror.memory().row_count("cache").await.unwrap() as i64,
        disk_count(&disk, "pairs")
    );
    for key in ["key10", "key20", "key30"] {
        let rows = mirror.select_from_memory("cache", "a", key).await.unwrap();
        assert_eq!(rows.len(), 1, "{key} missing");
    }
}

#[tokio::test]
async fn test_ceiling_bounds_replication() {
    let disk = create_temp_db(50).unwrap();
    let config = MirrorConfig::new().with_stride(10).with_ceiling(25);
    let mirror = Mirror::new(config).unwrap();
    mirror.create_memory_table("cache", "a, b").await.unwrap();
    let report = mirror.load_from_disk(disk.path(), "pairs", "cache").await.unwrap();
    // Row-ids 1..=24 lie below the ceiling.
    assert_eq!(report.rows_copied, 24);
}

#[tokio::test]
async fn test_empty_source_copies_nothing() {
    let disk = create_temp_db(0).unwrap();
    let mirror = Mirror::new(MirrorConfig::default()).unwrap();
    mirror.create_memory_table("cache", "a, b").await.unwrap();
    let report = mirror.load_from_disk(disk.path(), "pairs", "cache").await.unwrap();
    assert_eq!(report.windows_scanned, 0);
    assert_eq!(report.rows_copied, 0);
}

#[tokio::test]
async fn test_replication_can_run_twice() {
    let disk = create_temp_db(5).unwrap();
    let mirror = Mirror::new(MirrorConfig::default()).unwrap();
    mirror.create_memory_table("first", "a, b").await.unwrap();
    mirror.create_memory_table("second", "a, b").await.unwrap();
    mirror.load_from_disk(disk.path(), "pairs", "first").await.unwrap();
    mirror.load_from_disk(disk.path(), "pairs", "second").await.unwrap();
    assert_eq!(mirror.memory().row_count("second").await.unwrap(), 5);
}

#[tokio::test]
async fn test_arity_mismatch_is_rejected() {
    let disk = create_temp_db(5).unwrap();
    let mirror = Mirror::new(MirrorConfig::new().with_arity(3)).unwrap();
    mirror.create_memory_table("cache", "a, b, c").await.unwrap();
    let err = mirror
        .load_from_disk(disk.path(), "pairs", "cache")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MirrorError::Arity {
            expected: 3,
            actual: 2,
            ..
        }
    ));
    assert_eq!(mirror.memory().row_count("cache").await.unwrap(), 0);
}

#[tokio::test]
async fn test_missing_source_table_fails_and_detaches() {
    let disk = create_temp_db(5).unwrap();
    let mirror = Mirror::new(MirrorConfig::default()).unwrap();
    mirror.create_memory_table("cache", "a, b").await.unwrap();
    let err = mirror
        .load_from_disk(disk.path(), "nope", "cache")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "replication");

    // The alias was released, so a second attach succeeds.
    let report = mirror.load_from_disk(disk.path(), "pairs", "cache").await.unwrap();
    assert_eq!(report.rows_copied, 5);
}

#[tokio::test]
async fn test_memory_like_query_matches_prefix() {
    let disk = NamedTempFile::new().unwrap();
    {
        let conn = Connection::open(disk.path()).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE words (w TEXT, n INTEGER);
            INSERT INTO words VALUES ('foo', 1), ('food', 2), ('barfoo', 3), ('fo', 4);
            "#,
        )
        .unwrap();
    }
    let mirror = Mirror::new(MirrorConfig::default()).unwrap();
    mirror.create_memory_table("words", "w TEXT, n INTEGER").await.unwrap();
    mirror.load_from_disk(disk.path(), "words", "words").await.unwrap();

    let rows = mirror.select_from_memory("words", "w", "foo%").await.unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Value::from("foo"), Value::Integer(1)],
            vec![Value::from("food"), Value::Integer(2)],
        ]
    );
    // LIKE is case-insensitive for ASCII under the default collation.
    let upper = mirror.select_from_memory("words", "w", "FOO%").await.unwrap();
    assert_eq!(upper.len(), 2);
}

#[tokio::test]
async fn test_write_then_query_scenario() {
    let disk = NamedTempFile::new().unwrap();
    Connection::open(disk.path())
        .unwrap()
        .execute_batch("CREATE TABLE t (a, b);")
        .unwrap();

    let mirror = Mirror::new(MirrorConfig::default()).unwrap();
    let pairs = shape_pairs(vec![
        Value::Integer(1),
        Value::from("x"),
        Value::Integer(2),
        Value::from("y"),
    ]);
    let written = mirror.write_to_disk(disk.path(), "t", &pairs).await.unwrap();
    assert_eq!(written, 2);

    mirror.create_memory_table("t", "a, b").await.unwrap();
    mirror.load_from_disk(disk.path(), "t", "t").await.unwrap();
    let rows = mirror.select_from_memory("t", "a", "1").await.unwrap();
    assert_eq!(rows, vec![vec![Value::Integer(1), Value::from("x")]]);
}

#[tokio::test]
async fn test_bulk_write_adds_exactly_k_rows() {
    let disk = create_temp_db(3).unwrap();
    let store = DiskStore::new(disk.path(), IdentifierPolicy::Strict);
    let before = store.row_count("pairs").await.unwrap();

    let pairs: Vec<(Value, Value)> = (0..7)
        .map(|i| (Value::from(format!("new{i}")), Value::Integer(i)))
        .collect();
    assert_eq!(store.write_pairs("pairs", &pairs).await.unwrap(), 7);
    assert_eq!(store.row_count("pairs").await.unwrap(), before + 7);
    assert_eq!(store.write_pairs("pairs", &[]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_bulk_write_leaves_table_untouched() {
    let disk = NamedTempFile::new().unwrap();
    Connection::open(disk.path())
        .unwrap()
        .execute_batch("CREATE TABLE u (k TEXT PRIMARY KEY, v);")
        .unwrap();
    let store = DiskStore::new(disk.path(), IdentifierPolicy::Strict);
    let pairs = vec![
        (Value::from("a"), Value::Integer(1)),
        (Value::from("a"), Value::Integer(2)),
    ];
    let err = store.write_pairs("u", &pairs).await.unwrap_err();
    assert_eq!(err.kind(), "write");
    assert_eq!(disk_count(&disk, "u"), 0);
}

#[tokio::test]
async fn test_write_rows_checks_arity() {
    let disk = NamedTempFile::new().unwrap();
    Connection::open(disk.path())
        .unwrap()
        .execute_batch("CREATE TABLE triples (a, b, c);")
        .unwrap();
    let store = DiskStore::new(disk.path(), IdentifierPolicy::Strict).with_arity(3);
    let rows = vec![vec![Value::Integer(1), Value::Integer(2), Value::Null]];
    assert_eq!(store.write_rows("triples", &rows).await.unwrap(), 1);

    let short = vec![vec![Value::Integer(1)]];
    assert!(matches!(
        store.write_rows("triples", &short).await,
        Err(MirrorError::Arity { expected: 3, actual: 1, .. })
    ));
}

#[tokio::test]
async fn test_create_index_is_idempotent() {
    let disk = create_temp_db(3).unwrap();
    let mirror = Mirror::new(MirrorConfig::default()).unwrap();
    for _ in 0..2 {
        mirror
            .create_disk_index(disk.path(), "idx_pairs_a", "pairs", "a")
            .await
            .unwrap();
    }
    let conn = Connection::open(disk.path()).unwrap();
    let indexes: i64 = conn
        .query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'index' AND name = 'idx_pairs_a'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(indexes, 1);
}

#[tokio::test]
async fn test_disk_query_flattens_and_indexes() {
    let disk = create_temp_db(12).unwrap();
    let mirror = Mirror::new(MirrorConfig::default()).unwrap();
    let values = mirror
        .select_from_disk(disk.path(), "pairs", "a", "key1%")
        .await
        .unwrap();
    assert_eq!(
        values,
        vec![
            Value::from("key1"),
            Value::from("key10"),
            Value::from("key11"),
            Value::from("key12"),
        ]
    );

    let store = mirror.disk(disk.path());
    let by_b = store.select_like("pairs", "b", "12%").await.unwrap();
    assert_eq!(by_b, vec![Value::Integer(120)]);

    let conn = Connection::open(disk.path()).unwrap();
    let names: Vec<String> = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'index' ORDER BY name")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(names, vec!["idx_5_pairs_a", "idx_5_pairs_b"]);
}

#[tokio::test]
async fn test_strict_identifiers_reject_injection() {
    let disk = create_temp_db(1).unwrap();
    let mirror = Mirror::new(MirrorConfig::default()).unwrap();
    let err = mirror
        .select_from_disk(disk.path(), "pairs; DROP TABLE pairs", "a", "%")
        .await
        .unwrap_err();
    assert!(matches!(err, MirrorError::InvalidIdentifier(_)));
    assert!(mirror
        .create_memory_table("bad name", "a, b")
        .await
        .is_err());
    assert_eq!(disk_count(&disk, "pairs"), 1);
}

#[tokio::test]
async fn test_raw_identifiers_pass_through() {
    let disk = create_temp_db(2).unwrap();
    let config = MirrorConfig::new().with_identifiers(IdentifierPolicy::Raw);
    let mirror = Mirror::new(config).unwrap();
    mirror.create_memory_table("temp.cache", "a, b").await.unwrap();
    let report = mirror
        .load_from_disk(disk.path(), "pairs", "temp.cache")
        .await
        .unwrap();
    assert_eq!(report.rows_copied, 2);
}

#[tokio::test]
async fn test_concurrent_queries_share_one_handle() {
    let disk = create_temp_db(200).unwrap();
    let mirror = std::sync::Arc::new(Mirror::new(MirrorConfig::default()).unwrap());
    mirror.create_memory_table("cache", "a, b").await.unwrap();
    mirror.load_from_disk(disk.path(), "pairs", "cache").await.unwrap();

    let mut handles = Vec::new();
    for i in 1..=9 {
        let mirror = mirror.clone();
        handles.push(tokio::spawn(async move {
            mirror
                .select_from_memory("cache", "a", &format!("key{i}"))
                .await
                .map(|rows| rows.len())
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 1);
    }
}

#[tokio::test]
async fn test_missing_memory_table_leaves_disk_untouched() {
    let disk = create_temp_db(5).unwrap();
    for config in [
        MirrorConfig::default(),
        MirrorConfig::new()
            .with_stride(10)
            .with_ceiling(100)
            .with_termination(Termination::Ceiling),
    ] {
        let mirror = Mirror::new(config).unwrap();
        let err = mirror
            .load_from_disk(disk.path(), "pairs", "pairs")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "replication");
        assert_eq!(disk_count(&disk, "pairs"), 5);
    }
}

#[tokio::test]
async fn test_rejected_identifiers_do_not_create_files() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("typo.db");
    let mirror = Mirror::new(MirrorConfig::default()).unwrap();

    let err = mirror
        .select_from_disk(&missing, "bad table", "a", "%")
        .await
        .unwrap_err();
    assert!(matches!(err, MirrorError::InvalidIdentifier(_)));
    let err = mirror
        .create_disk_index(&missing, "idx", "pairs", "a;b")
        .await
        .unwrap_err();
    assert!(matches!(err, MirrorError::InvalidIdentifier(_)));
    assert!(!missing.exists());
}

#[tokio::test]
async fn test_disk_query_indexes_underscored_names_separately() {
    let disk = NamedTempFile::new().unwrap();
    Connection::open(disk.path())
        .unwrap()
        .execute_batch("CREATE TABLE a (b_c); CREATE TABLE a_b (c);")
        .unwrap();
    let mirror = Mirror::new(MirrorConfig::default()).unwrap();
    mirror.select_from_disk(disk.path(), "a", "b_c", "%").await.unwrap();
    mirror.select_from_disk(disk.path(), "a_b", "c", "%").await.unwrap();

    let conn = Connection::open(disk.path()).unwrap();
    let indexes: i64 = conn
        .query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'index'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(indexes, 2);
}
