//! End-to-end scenarios driven through full command strings: the
//! concrete scenarios S1-S6, the round-trip laws, and the boundary
//! behaviors.

use std::fs::{self, File};
use std::io::Write;

use blockrel::config::Config;
use blockrel::error::EngineError;
use blockrel::instance::Context;
use blockrel::table::RowLocation;
use tempfile::TempDir;

struct Fixture {
    ctx: Context,
    _dir: TempDir,
}

fn fixture() -> Fixture {
    fixture_with(|_| {})
}

fn fixture_with(tweak: impl FnOnce(&mut Config)) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();
    let mut config = Config::new(&data_dir, data_dir.join("temp"));
    tweak(&mut config);
    let ctx = Context::new(config).unwrap();
    Fixture { ctx, _dir: dir }
}

impl Fixture {
    fn csv(&self, name: &str, contents: &str) {
        let path = self.ctx.config.data_dir.join(format!("{name}.csv"));
        let mut file = File::create(path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    fn run(&mut self, line: &str) {
        if let Err(err) = self.ctx.run_line(line) {
            panic!("command '{line}' failed: {err}");
        }
    }

    fn run_err(&mut self, line: &str) -> EngineError {
        match self.ctx.run_line(line) {
            Ok(_) => panic!("command '{line}' unexpectedly succeeded"),
            Err(err) => err,
        }
    }

    /// Full scan of a table as a vector of rows.
    fn rows(&mut self, name: &str) -> Vec<Vec<i32>> {
        let Context { catalog, pool, .. } = &mut self.ctx;
        let table = catalog.get(name).expect("table should exist");
        let mut cursor = table.cursor(pool).unwrap();
        let mut rows = Vec::new();
        while let Some(row) = cursor.next(table, pool).unwrap() {
            rows.push(row);
        }
        rows
    }

    fn sorted_rows(&mut self, name: &str) -> Vec<Vec<i32>> {
        let mut rows = self.rows(name);
        rows.sort();
        rows
    }

    fn columns(&self, name: &str) -> Vec<String> {
        self.ctx.catalog.get(name).unwrap().columns.clone()
    }

    /// Invariants that must hold after every successful command.
    fn check_invariants(&mut self, name: &str) {
        let Context { catalog, pool, .. } = &mut self.ctx;
        let table = catalog.get(name).unwrap();

        // I1: row count equals the sum of per-block counts.
        let total: usize = table.rows_per_block_count.iter().sum();
        assert_eq!(table.row_count, total as u64, "I1 violated for '{name}'");
        assert_eq!(table.rows_per_block_count.len(), table.block_count);

        // I2: on-disk pages agree with the metadata.
        for page_index in 0..table.block_count {
            let page = table.fetch_page(pool, page_index).unwrap();
            assert_eq!(
                page.row_count(),
                table.rows_per_block_count[page_index],
                "I2 violated for '{name}' page {page_index}"
            );
            for row_index in 0..page.row_count() {
                assert_eq!(page.row(row_index).unwrap().len(), table.column_count());
            }
        }

        // I3: the pool respects its capacity.
        assert!(pool.len() <= pool.capacity(), "I3 violated");

        // I4: every index entry points at a row holding the value.
        for (column, index) in &table.indices {
            let position = table.column_index(column).unwrap();
            for (value, locations) in index {
                for RowLocation { page, row } in locations {
                    let page = table.fetch_page(pool, *page).unwrap();
                    assert_eq!(page.row(*row).unwrap()[position], *value, "I4 violated");
                }
            }
        }

        // I5: column names are unique.
        let mut names = table.columns.clone();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), table.column_count(), "I5 violated for '{name}'");
    }
}

#[test]
fn s1_project_reorders_columns() {
    let mut fx = fixture();
    fx.csv("T", "A,B,C\n1,2,3\n4,5,6\n7,8,9\n");
    fx.run("LOAD T");
    fx.run("R <- PROJECT C, A FROM T");

    assert_eq!(fx.columns("R"), vec!["C", "A"]);
    assert_eq!(fx.rows("R"), vec![vec![3, 1], vec![6, 4], vec![9, 7]]);
    fx.check_invariants("R");
}

#[test]
fn s2_select_and_search_agree_on_duplicate_keys() {
    let mut fx = fixture();
    fx.csv("T", "A,B,C\n1,2,3\n4,5,6\n7,8,9\n1,20,30\n");
    fx.run("LOAD T");

    fx.run("X <- SELECT A == 1 FROM T");
    fx.run("Y <- SEARCH FROM T WHERE A == 1");

    let expected = vec![vec![1, 2, 3], vec![1, 20, 30]];
    assert_eq!(fx.sorted_rows("X"), expected);
    assert_eq!(fx.sorted_rows("Y"), expected);
}

#[test]
fn s3_hash_join() {
    let mut fx = fixture();
    fx.csv("E", "EID,DID\n1,10\n2,10\n3,20\n");
    fx.csv("D", "DID,NAME_TAG\n10,100\n20,200\n");
    fx.run("LOAD E");
    fx.run("LOAD D");
    fx.run("R <- JOIN E, D ON DID DID");

    assert_eq!(fx.columns("R"), vec!["EID", "DID", "DID", "NAME_TAG"]);
    assert_eq!(
        fx.sorted_rows("R"),
        vec![
            vec![1, 10, 10, 100],
            vec![2, 10, 10, 100],
            vec![3, 20, 20, 200],
        ]
    );
}

#[test]
fn s4_external_sort_with_multi_pass_merge() {
    // One row per page and a 3-slot pool: 9 pages form 3 runs and the
    // fan-in of 2 forces more than one merge pass.
    let mut fx = fixture_with(|config| {
        config.block_bytes = 4;
        config.pool_capacity = 3;
    });
    fx.csv("T", "N\n5\n3\n8\n1\n9\n2\n7\n4\n6\n");
    fx.run("LOAD T");
    assert_eq!(fx.ctx.catalog.get("T").unwrap().block_count, 9);

    fx.run("SORT T BY N IN ASC");

    let values: Vec<i32> = fx.rows("T").into_iter().map(|row| row[0]).collect();
    assert_eq!(values, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
    assert_eq!(fx.ctx.catalog.get("T").unwrap().row_count, 9);
    fx.check_invariants("T");

    // No temporary run pages survive the sort.
    let leftovers: Vec<_> = fs::read_dir(&fx.ctx.config.temp_dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.contains("_run"))
        .collect();
    assert!(leftovers.is_empty(), "leftover run pages: {leftovers:?}");
}

#[test]
fn s5_group_by_with_having() {
    let mut fx = fixture();
    fx.csv("EMP", "DID,SAL\n1,10\n1,30\n2,50\n2,60\n3,5\n");
    fx.run("LOAD EMP");
    fx.run("R <- GROUP BY DID FROM EMP HAVING AVG(SAL) > 20 RETURN MAX(SAL)");

    assert_eq!(fx.columns("R"), vec!["DID", "MAXSAL"]);
    assert_eq!(fx.rows("R"), vec![vec![2, 60]]);
}

#[test]
fn s6_insert_update_delete_with_index() {
    let mut fx = fixture();
    fx.csv("T", "A,B\n1,10\n2,20\n");
    fx.run("LOAD T");

    fx.run("INSERT INTO T ( A = 3, B = 30 )");
    assert_eq!(fx.sorted_rows("T"), vec![vec![1, 10], vec![2, 20], vec![3, 30]]);
    {
        let table = fx.ctx.catalog.get("T").unwrap();
        assert_eq!(table.row_count, 3);
        let locations = table.indices.get("A").unwrap().get(&3).unwrap();
        assert_eq!(locations, &vec![RowLocation { page: 0, row: 2 }]);
    }
    fx.check_invariants("T");

    fx.run("UPDATE T WHERE A == 2 SET B = 99");
    assert_eq!(fx.sorted_rows("T"), vec![vec![1, 10], vec![2, 99], vec![3, 30]]);
    assert!(fx.ctx.catalog.get("T").unwrap().indices.is_empty());

    fx.run("DELETE FROM T WHERE A == 1");
    assert_eq!(fx.sorted_rows("T"), vec![vec![2, 99], vec![3, 30]]);
    assert_eq!(fx.ctx.catalog.get("T").unwrap().row_count, 2);
    fx.check_invariants("T");
}

#[test]
fn export_clear_load_round_trip() {
    let mut fx = fixture();
    fx.csv("T", "A,B\n1,2\n3,4\n5,6\n");
    fx.run("LOAD T");
    fx.run("R <- SELECT A > 1 FROM T");
    let before = fx.sorted_rows("R");

    fx.run("EXPORT R");
    fx.run("CLEAR R");
    assert!(!fx.ctx.catalog.contains("R"));
    fx.run("LOAD R");

    assert_eq!(fx.sorted_rows("R"), before);
    fx.check_invariants("R");
}

#[test]
fn project_all_columns_preserves_rows() {
    let mut fx = fixture();
    fx.csv("T", "A,B\n1,2\n3,4\n1,2\n");
    fx.run("LOAD T");
    fx.run("R <- PROJECT A, B FROM T");
    assert_eq!(fx.sorted_rows("R"), fx.sorted_rows("T"));
}

#[test]
fn sort_asc_then_desc_preserves_multiset() {
    let mut fx = fixture_with(|config| {
        config.block_bytes = 8;
        config.pool_capacity = 3;
    });
    fx.csv("T", "A,B\n3,1\n1,2\n2,3\n2,0\n");
    fx.run("LOAD T");
    let original = fx.sorted_rows("T");

    fx.run("SORT T BY A IN ASC");
    fx.run("SORT T BY A IN DESC");
    assert_eq!(fx.sorted_rows("T"), original);

    let first: Vec<i32> = fx.rows("T").iter().map(|row| row[0]).collect();
    let mut descending = first.clone();
    descending.sort_by(|a, b| b.cmp(a));
    assert_eq!(first, descending);
}

#[test]
fn multi_key_sort_directions() {
    let mut fx = fixture();
    fx.csv("T", "A,B\n1,1\n2,5\n1,9\n2,2\n");
    fx.run("LOAD T");
    fx.run("SORT T BY A, B IN ASC, DESC");
    assert_eq!(
        fx.rows("T"),
        vec![vec![1, 9], vec![1, 1], vec![2, 5], vec![2, 2]]
    );
}

#[test]
fn order_by_leaves_source_untouched() {
    let mut fx = fixture_with(|config| {
        config.block_bytes = 8;
        config.pool_capacity = 3;
    });
    fx.csv("T", "A\n4\n2\n9\n1\n");
    fx.run("LOAD T");
    let original = fx.rows("T");

    fx.run("R <- ORDER BY A DESC ON T");
    let sorted: Vec<i32> = fx.rows("R").into_iter().map(|row| row[0]).collect();
    assert_eq!(sorted, vec![9, 4, 2, 1]);
    assert_eq!(fx.rows("T"), original);
}

#[test]
fn search_range_predicates_match_linear_scan() {
    let mut fx = fixture();
    fx.csv("T", "A,B\n1,1\n2,2\n3,3\n4,4\n5,5\n3,99\n");
    fx.run("LOAD T");

    for (op, tag) in [("<", "lt"), ("<=", "le"), (">", "gt"), (">=", "ge"), ("!=", "ne")] {
        fx.run(&format!("S{tag} <- SELECT A {op} 3 FROM T"));
        fx.run(&format!("X{tag} <- SEARCH FROM T WHERE A {op} 3"));
        assert_eq!(fx.sorted_rows(&format!("S{tag}")), fx.sorted_rows(&format!("X{tag}")), "op {op}");
    }
}

#[test]
fn search_on_unindexed_result_falls_back_to_scan() {
    let mut fx = fixture();
    fx.csv("T", "A\n1\n2\n3\n");
    fx.run("LOAD T");
    // Result relations get no implicit index.
    fx.run("R <- PROJECT A FROM T");
    assert!(fx.ctx.catalog.get("R").unwrap().indices.is_empty());
    fx.run("X <- SEARCH FROM R WHERE A >= 2");
    assert_eq!(fx.sorted_rows("X"), vec![vec![2], vec![3]]);
}

#[test]
fn select_column_against_column() {
    let mut fx = fixture();
    fx.csv("T", "A,B\n1,2\n5,3\n4,4\n");
    fx.run("LOAD T");
    fx.run("R <- SELECT A >= B FROM T");
    assert_eq!(fx.sorted_rows("R"), vec![vec![4, 4], vec![5, 3]]);
}

#[test]
fn cross_prefixes_column_names() {
    let mut fx = fixture();
    fx.csv("S1", "A\n1\n2\n");
    fx.csv("S2", "B\n7\n8\n");
    fx.run("LOAD S1");
    fx.run("LOAD S2");
    fx.run("R <- CROSS S1 S2");

    assert_eq!(fx.columns("R"), vec!["S1_A", "S2_B"]);
    assert_eq!(
        fx.sorted_rows("R"),
        vec![vec![1, 7], vec![1, 8], vec![2, 7], vec![2, 8]]
    );
}

#[test]
fn distinct_removes_duplicate_rows() {
    let mut fx = fixture();
    fx.csv("T", "A,B\n1,2\n1,2\n3,4\n3,5\n");
    fx.run("LOAD T");
    fx.run("R <- DISTINCT T");
    assert_eq!(fx.sorted_rows("R"), vec![vec![1, 2], vec![3, 4], vec![3, 5]]);
}

#[test]
fn load_of_header_only_csv_is_empty() {
    let mut fx = fixture();
    fx.csv("T", "A,B\n");
    fx.run("LOAD T");
    let table = fx.ctx.catalog.get("T").unwrap();
    assert_eq!(table.row_count, 0);
    assert_eq!(table.block_count, 0);
}

#[test]
fn insert_into_empty_table_creates_page_zero() {
    let mut fx = fixture();
    fx.csv("T", "A,B\n");
    fx.run("LOAD T");
    fx.run("INSERT INTO T ( A = 1 )");

    let table = fx.ctx.catalog.get("T").unwrap();
    assert_eq!(table.block_count, 1);
    assert_eq!(table.rows_per_block_count, vec![1]);
    // Unmentioned columns default to 0.
    assert_eq!(fx.rows("T"), vec![vec![1, 0]]);
    fx.check_invariants("T");
}

#[test]
fn delete_can_empty_a_page_and_cursors_skip_it() {
    let mut fx = fixture_with(|config| {
        config.block_bytes = 8; // one-column table: 2 rows per page
    });
    fx.csv("T", "A\n1\n1\n5\n");
    fx.run("LOAD T");
    assert_eq!(fx.ctx.catalog.get("T").unwrap().block_count, 2);

    fx.run("DELETE FROM T WHERE A == 1");
    let table = fx.ctx.catalog.get("T").unwrap();
    assert_eq!(table.rows_per_block_count[0], 0);
    assert_eq!(table.block_count, 2);
    assert_eq!(fx.rows("T"), vec![vec![5]]);
    fx.check_invariants("T");
}

#[test]
fn rename_flows_through_later_commands() {
    let mut fx = fixture();
    fx.csv("T", "A,B\n1,2\n");
    fx.run("LOAD T");
    fx.run("RENAME A TO X FROM T");
    fx.run("R <- PROJECT X FROM T");
    assert_eq!(fx.rows("R"), vec![vec![1]]);

    let err = fx.run_err("S <- PROJECT A FROM T");
    assert!(matches!(err, EngineError::Semantic(_)));
}

#[test]
fn source_runs_a_command_file() {
    let mut fx = fixture();
    fx.csv("T", "A,B\n1,2\n3,4\n");
    let script = fx.ctx.config.data_dir.join("setup.ra");
    let mut file = File::create(script).unwrap();
    writeln!(file, "LOAD T").unwrap();
    writeln!(file, "-- a comment line").unwrap();
    writeln!(file, "R <- SELECT A == 3 FROM T").unwrap();
    writeln!(file, "NOT A COMMAND").unwrap(); // reported, not fatal
    writeln!(file, "R2 <- PROJECT B FROM R").unwrap();
    drop(file);

    fx.run("SOURCE setup");
    assert_eq!(fx.rows("R2"), vec![vec![4]]);
}

#[test]
fn semantic_errors_do_not_mutate() {
    let mut fx = fixture();
    fx.csv("T", "A,B\n1,2\n");
    fx.run("LOAD T");

    assert!(matches!(fx.run_err("LOAD T"), EngineError::Semantic(_)));
    assert!(matches!(fx.run_err("R <- PROJECT Z FROM T"), EngineError::Semantic(_)));
    assert!(!fx.ctx.catalog.contains("R"));
    assert!(matches!(fx.run_err("R <- SELECT A == 1 FROM MISSING"), EngineError::Semantic(_)));
    assert!(matches!(fx.run_err("T <- DISTINCT T"), EngineError::Semantic(_)));
    assert!(matches!(fx.run_err("INSERT INTO T ( Z = 1 )"), EngineError::Semantic(_)));
    // The failed insert changed nothing.
    assert_eq!(fx.rows("T"), vec![vec![1, 2]]);
}

#[test]
fn pool_capacity_holds_through_heavy_commands() {
    let mut fx = fixture_with(|config| {
        config.block_bytes = 8;
        config.pool_capacity = 3;
    });
    fx.csv("T", "A,B\n5,1\n3,2\n8,3\n1,4\n9,5\n2,6\n7,7\n4,8\n6,9\n");
    fx.run("LOAD T");
    fx.run("R <- ORDER BY A ASC ON T");
    fx.run("SORT T BY B IN DESC");
    assert!(fx.ctx.pool.len() <= fx.ctx.pool.capacity());
    fx.check_invariants("T");
    fx.check_invariants("R");
}
