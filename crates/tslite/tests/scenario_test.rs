//! End-to-end scenarios over the pool and handle API: create databases,
//! write points, and read them back through the text codec exactly as the
//! command-line front-end would.

use tempfile::TempDir;
use tslite::{DataType, DbOut, DbPool, DupPolicy, Error, OpenMode, PointOutput, Schema, TimeType};

fn strs(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

/// Runs a query against a read-only handle and captures the printed lines.
fn query(
    pool: &mut DbPool,
    name: &str,
    f: impl FnOnce(&tslite::Db, &mut dyn PointOutput) -> tslite::Result<()>,
) -> String {
    let db = pool.get(name, OpenMode::ReadOnly).unwrap();
    let mut out = DbOut::buffered();
    f(db, &mut out).unwrap();
    out.into_string()
}

#[test]
fn test_exact_readback() {
    let dir = TempDir::new().unwrap();
    let mut pool = DbPool::open(dir.path()).unwrap();
    pool.create("t2", Schema::new(DataType::Double, "")).unwrap();

    let db = pool.get("t2", OpenMode::ReadWrite).unwrap();
    db.put(
        "1234567890.123456789",
        &strs(&["0.1", "0.2", "0.3"]),
        DupPolicy::Replace,
    )
    .unwrap();

    let out = query(&mut pool, "t2", |db, sink| {
        db.get("1234567890.123456789", sink)
    });
    assert_eq!(out, "1234567890.123456789 0.1 0.2 0.3\n");
}

#[test]
fn test_interpolated_get() {
    let dir = TempDir::new().unwrap();
    let mut pool = DbPool::open(dir.path()).unwrap();
    pool.create("t2", Schema::new(DataType::Double, "")).unwrap();

    let db = pool.get("t2", OpenMode::ReadWrite).unwrap();
    db.put("1.0", &strs(&["10"]), DupPolicy::Replace).unwrap();
    db.put("3.0", &strs(&["30"]), DupPolicy::Replace).unwrap();

    let out = query(&mut pool, "t2", |db, sink| db.get("2.0", sink));
    assert_eq!(out, "2.000000000 20\n");
}

#[test]
fn test_nearest_neighbors() {
    let dir = TempDir::new().unwrap();
    let mut pool = DbPool::open(dir.path()).unwrap();
    pool.create("t2", Schema::new(DataType::Double, "")).unwrap();

    let db = pool.get("t2", OpenMode::ReadWrite).unwrap();
    db.put("1.0", &strs(&["10"]), DupPolicy::Replace).unwrap();
    db.put("3.0", &strs(&["30"]), DupPolicy::Replace).unwrap();

    let prev = query(&mut pool, "t2", |db, sink| db.get_prev("2.0", sink));
    assert_eq!(prev, "1.000000000 10\n");
    let next = query(&mut pool, "t2", |db, sink| db.get_next("2.0", sink));
    assert_eq!(next, "3.000000000 30\n");
}

#[test]
fn test_v1_limits() {
    let dir = TempDir::new().unwrap();
    let mut pool = DbPool::open(dir.path()).unwrap();
    let schema = Schema {
        ttype: TimeType::V1,
        dtype: DataType::Double,
        descr: String::new(),
    };
    pool.create("v1", schema).unwrap();

    let db = pool.get("v1", OpenMode::ReadWrite).unwrap();
    db.put("18446744073709551.615", &strs(&["0.1"]), DupPolicy::Replace)
        .unwrap();

    let out = query(&mut pool, "v1", |db, sink| {
        db.get("18446744073709551.615", sink)
    });
    assert_eq!(out, "18446744073709551.615000000 0.1\n");

    let db = pool.get("v1", OpenMode::ReadWrite).unwrap();
    let err = db
        .put("18446744073709551.616", &strs(&["0.1"]), DupPolicy::Replace)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Bad V1 timestamp: too large value: 18446744073709551.616"
    );
}

#[test]
fn test_suffix_keys_wrap() {
    let dir = TempDir::new().unwrap();
    let mut pool = DbPool::open(dir.path()).unwrap();
    pool.create("t2", Schema::new(DataType::Double, "")).unwrap();

    let db = pool.get("t2", OpenMode::ReadWrite).unwrap();
    db.put("0+", &strs(&["0.1"]), DupPolicy::Replace).unwrap();
    db.put("0-", &strs(&["0.2"]), DupPolicy::Replace).unwrap();

    let first = query(&mut pool, "t2", |db, sink| db.get_next("0", sink));
    assert_eq!(first, "0.000000001 0.1\n");
    let last = query(&mut pool, "t2", |db, sink| db.get_prev("inf", sink));
    assert_eq!(last, "4294967295.999999999 0.2\n");
}

#[test]
fn test_pool_reopen_and_remove() {
    let dir = TempDir::new().unwrap();
    let mut pool = DbPool::open(dir.path()).unwrap();
    pool.create("x", Schema::new(DataType::Double, "")).unwrap();
    pool.close_all();

    // opened read-only first, then a writer needs a fresh writable handle
    assert_eq!(
        pool.get("x", OpenMode::ReadOnly).unwrap().mode(),
        OpenMode::ReadOnly
    );
    let db = pool.get("x", OpenMode::ReadWrite).unwrap();
    assert_eq!(db.mode(), OpenMode::ReadWrite);
    db.put("1", &strs(&["1"]), DupPolicy::Replace).unwrap();

    // removal succeeds after eviction, and unknown names fail
    pool.remove("x").unwrap();
    assert!(matches!(pool.remove("x"), Err(Error::NotFound(_))));
    assert!(matches!(
        pool.get("x", OpenMode::ReadOnly),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn test_range_with_step_law() {
    let dir = TempDir::new().unwrap();
    let mut pool = DbPool::open(dir.path()).unwrap();
    pool.create("t2", Schema::new(DataType::Double, "")).unwrap();

    // irregular spacing exercises the seek-based decimation
    let times = [
        "0.1", "0.2", "0.95", "1.0", "1.05", "2.5", "2.6", "7.0", "7.1", "30.0",
    ];
    let db = pool.get("t2", OpenMode::ReadWrite).unwrap();
    for (i, t) in times.iter().enumerate() {
        db.put(t, &[i.to_string()], DupPolicy::Replace).unwrap();
    }

    let out = query(&mut pool, "t2", |db, sink| db.get_range("0", "inf", "1", sink));
    let emitted: Vec<f64> = out
        .lines()
        .map(|l| l.split_whitespace().next().unwrap().parse().unwrap())
        .collect();
    assert_eq!(emitted, vec![0.1, 2.5, 7.0, 30.0]);
    // emitted timestamps are >= 1 s apart and every skipped point falls
    // inside an emitted point's dead zone
    let all: Vec<f64> = times.iter().map(|t| t.parse().unwrap()).collect();
    for pair in emitted.windows(2) {
        assert!(pair[1] - pair[0] >= 1.0 - 1e-9);
        assert!(!all
            .iter()
            .any(|&t| t >= pair[0] + 1.0 - 1e-9 && t < pair[1] - 1e-9));
    }
    assert_eq!(emitted.first(), Some(&0.1));
    assert_eq!(emitted.last(), Some(&30.0));
}

#[test]
fn test_duplicate_policy_laws() {
    let dir = TempDir::new().unwrap();
    let mut pool = DbPool::open(dir.path()).unwrap();
    pool.create("t2", Schema::new(DataType::Double, "")).unwrap();
    let db = pool.get("t2", OpenMode::ReadWrite).unwrap();

    db.put("5", &strs(&["1"]), DupPolicy::Replace).unwrap();
    db.put("5", &strs(&["2"]), DupPolicy::Replace).unwrap();
    db.put("5", &strs(&["3"]), DupPolicy::Skip).unwrap();
    assert!(matches!(
        db.put("5", &strs(&["4"]), DupPolicy::Error),
        Err(Error::Conflict(_))
    ));
    db.put("5", &strs(&["5"]), DupPolicy::Sshift).unwrap();
    db.put("5", &strs(&["6"]), DupPolicy::Nsshift).unwrap();

    let out = query(&mut pool, "t2", |db, sink| db.get_range("0", "inf", "0", sink));
    assert_eq!(
        out,
        "5.000000000 2\n5.000000001 6\n6.000000000 5\n"
    );
}

#[test]
fn test_text_database() {
    let dir = TempDir::new().unwrap();
    let mut pool = DbPool::open(dir.path()).unwrap();
    pool.create("log", Schema::new(DataType::Text, "messages")).unwrap();

    let db = pool.get("log", OpenMode::ReadWrite).unwrap();
    db.put("1", &strs(&["hello", "world"]), DupPolicy::Replace)
        .unwrap();

    let out = query(&mut pool, "log", |db, sink| db.get_prev("inf", sink));
    assert_eq!(out, "1.000000000 hello world\n");
}

#[test]
fn test_descriptions_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let mut pool = DbPool::open(dir.path()).unwrap();
    pool.create("t", Schema::new(DataType::Uint16, "adc counts"))
        .unwrap();
    pool.close_all();

    let db = pool.get("t", OpenMode::ReadWrite).unwrap();
    assert_eq!(db.read_info().descr, "adc counts");
    let mut info = db.read_info().clone();
    info.descr = "adc counts, channel 2".to_string();
    db.write_info(info).unwrap();
    pool.close_all();

    let db = pool.get("t", OpenMode::ReadOnly).unwrap();
    assert_eq!(db.read_info().descr, "adc counts, channel 2");
    assert_eq!(db.read_info().dtype, DataType::Uint16);
}
