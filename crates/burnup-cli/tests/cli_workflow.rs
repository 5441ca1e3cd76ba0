use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const ELEMENT_OUTPUT: &str = "\
=   Nuclide concentrations in grams for case 'decay'   =
        0.00E+00min  1.00E+02min
  u-235    1.1E+01   1.0E+01
  pu-239   5.0E+00   5.0E+00
  xe-135m  1.0E-02   2.0E-02
";

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent directory should be created");
    }
    fs::write(path, content).expect("file should be written");
}

fn run_cli(working_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_burnup-rs"))
        .current_dir(working_dir)
        .args(args)
        .output()
        .expect("burnup-rs should run")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn batch_reports_partial_failure_with_exit_code_one() {
    let temp = TempDir::new().expect("tempdir should be created");
    write_file(&temp.path().join("element_001.out"), ELEMENT_OUTPUT);
    write_file(&temp.path().join("element_002.out"), "no tables here\n");

    let output = run_cli(
        temp.path(),
        &["batch", "--geometry-volume", "10", "--summary", "summary.json"],
    );

    assert_eq!(output.status.code(), Some(1), "stderr: {}", stderr_of(&output));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("Batch status: PARTIAL"));
    assert!(stdout.contains("Elements: 2 total (1 successful, 1 failed, 0 not started)"));
    assert!(stdout.contains("  - element_002: [INPUT.OUTPUT_NO_CASES]"));

    let combined = fs::read_to_string(temp.path().join("mcnp_materials_parallel.txt"))
        .expect("combined cards should exist");
    assert!(combined.contains("c Element: element_001"));
    assert!(!combined.contains("element_002"));

    let summary: Value = serde_json::from_str(
        &fs::read_to_string(temp.path().join("summary.json")).expect("summary should exist"),
    )
    .expect("summary should be json");
    assert_eq!(summary["processing_info"]["successful_elements"], 1);
    assert!(temp.path().join("element_cache.json").is_file());
}

#[test]
fn process_executor_matches_thread_executor_output() {
    let temp = TempDir::new().expect("tempdir should be created");
    write_file(&temp.path().join("outputs/element_001.out"), ELEMENT_OUTPUT);
    write_file(&temp.path().join("outputs/element_002.out"), ELEMENT_OUTPUT);

    let thread_run = run_cli(
        temp.path(),
        &[
            "batch",
            "--input-dir",
            "outputs",
            "--executor",
            "thread",
            "--output",
            "thread.txt",
        ],
    );
    assert_eq!(thread_run.status.code(), Some(0), "stderr: {}", stderr_of(&thread_run));

    let process_run = run_cli(
        temp.path(),
        &[
            "batch",
            "--input-dir",
            "outputs",
            "--executor",
            "process",
            "-j",
            "2",
            "--output",
            "process.txt",
        ],
    );
    assert_eq!(process_run.status.code(), Some(0), "stderr: {}", stderr_of(&process_run));
    assert!(stdout_of(&process_run).contains("Batch status: COMPLETE"));

    let strip_timestamp = |text: String| -> Vec<String> {
        text.lines()
            .filter(|line| !line.starts_with("c Processing time:"))
            .map(str::to_string)
            .collect()
    };
    let thread_cards = fs::read_to_string(temp.path().join("thread.txt")).expect("thread cards");
    let process_cards = fs::read_to_string(temp.path().join("process.txt")).expect("process cards");
    assert_eq!(strip_timestamp(thread_cards), strip_timestamp(process_cards));
}

#[test]
fn parse_writes_a_single_material_card() {
    let temp = TempDir::new().expect("tempdir should be created");
    write_file(&temp.path().join("element_007.out"), ELEMENT_OUTPUT);

    let output = run_cli(
        temp.path(),
        &[
            "parse",
            "element_007.out",
            "--material-id",
            "301",
            "--geometry-volume",
            "10",
        ],
    );

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr_of(&output));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("Material card: mcnp_material_card.txt"));
    assert!(stdout.contains("total mass 1.502000e+01 g, density 1.502000e+00 g/cm3"));
    assert!(stdout.contains("Surrogate mass: 0.000000e+00 g"));
    let card = fs::read_to_string(temp.path().join("mcnp_material_card.txt"))
        .expect("card should exist");
    let lines: Vec<&str> = card.lines().collect();
    assert_eq!(lines[0], "! MCNP Material Card from ORIGEN Output");
    assert_eq!(lines[1], "! Case: decay");
    assert_eq!(lines[2], "! Time column: 1.00E+02min");
    assert_eq!(lines[5], "M301 nlib=00c");
    assert!(card.contains("     54535 -"));

    let cache: Value = serde_json::from_str(
        &fs::read_to_string(temp.path().join("element_cache.json")).expect("cache should exist"),
    )
    .expect("cache should be json");
    assert_eq!(cache["U"], 92);
}

#[test]
fn stored_cycles_are_queryable() {
    let temp = TempDir::new().expect("tempdir should be created");
    write_file(&temp.path().join("element_001.out"), ELEMENT_OUTPUT);

    for cycle in ["1", "2"] {
        let output = run_cli(
            temp.path(),
            &["batch", "--database", "materials.db", "--cycle", cycle],
        );
        assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr_of(&output));
    }

    let status = run_cli(temp.path(), &["status"]);
    assert_eq!(status.code_or_panic(), 0);
    assert!(stdout_of(&status).contains("Cycle 2"));
    assert!(stdout_of(&status).contains("Materials: 1"));
    assert!(stdout_of(&status).contains("Total mass: 1.502000e+01 g"));

    let cycles = run_cli(temp.path(), &["cycles"]);
    assert_eq!(cycles.code_or_panic(), 0);
    let listed: Vec<String> = stdout_of(&cycles)
        .lines()
        .filter(|line| line.starts_with("Cycle "))
        .map(str::to_string)
        .collect();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0], "Cycle 1: 1 materials, total mass 1.502000e+01 g");

    let history = run_cli(temp.path(), &["history", "element_001"]);
    assert_eq!(history.code_or_panic(), 0);
    let history = stdout_of(&history);
    assert!(history.contains("cycle 1: M200 case 'decay'"));
    assert!(history.contains("cycle 2: M200 case 'decay'"));

    let missing = run_cli(temp.path(), &["status", "--cycle", "9"]);
    assert_eq!(missing.code_or_panic(), 2);
    assert!(stderr_of(&missing).contains("ERROR: [INPUT.CYCLE]"));
}

#[test]
fn setup_errors_map_to_category_exit_codes() {
    let temp = TempDir::new().expect("tempdir should be created");

    let no_files = run_cli(temp.path(), &["batch"]);
    assert_eq!(no_files.status.code(), Some(2));
    let stderr = stderr_of(&no_files);
    assert!(stderr.contains("ERROR: [INPUT.BATCH_NO_FILES]"));
    assert!(stderr.contains("FATAL EXIT CODE: 2"));

    let bad_executor = run_cli(temp.path(), &["batch", "--executor", "cluster"]);
    assert_eq!(bad_executor.status.code(), Some(2));
    assert!(stderr_of(&bad_executor).contains("ERROR: [INPUT.CLI_USAGE]"));

    write_file(&temp.path().join("endf8_isotopes.json"), "{ not json");
    write_file(&temp.path().join("element_001.out"), ELEMENT_OUTPUT);
    let bad_library = run_cli(temp.path(), &["batch"]);
    assert_eq!(bad_library.status.code(), Some(2));
    assert!(stderr_of(&bad_library).contains("ERROR: [INPUT.ISOTOPE_LIBRARY]"));
}

#[test]
fn queries_against_a_missing_database_fail_without_creating_it() {
    let temp = TempDir::new().expect("tempdir should be created");

    for command in [
        vec!["status", "--database", "typo.db"],
        vec!["cycles", "--database", "typo.db"],
        vec!["history", "element_001", "--database", "typo.db"],
    ] {
        let output = run_cli(temp.path(), &command);
        assert_eq!(output.code_or_panic(), 3, "command: {command:?}");
        let stderr = stderr_of(&output);
        assert!(stderr.contains("ERROR: [IO.DATABASE_MISSING]"));
        assert!(stderr.contains("FATAL EXIT CODE: 3"));
        assert!(!temp.path().join("typo.db").exists());
    }
}

trait ExitCode {
    fn code_or_panic(&self) -> i32;
}

impl ExitCode for Output {
    fn code_or_panic(&self) -> i32 {
        self.status
            .code()
            .unwrap_or_else(|| panic!("process should exit normally, stderr: {}", stderr_of(self)))
    }
}
