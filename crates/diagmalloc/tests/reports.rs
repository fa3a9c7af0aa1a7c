//! Exact-output tests for `print_statistics` and the leak report, using
//! the subprocess pattern: the child writes `EXPECT:`-prefixed lines to
//! stderr describing what it is about to print, then prints the real
//! report to stdout; the parent checks every expectation appears.

use diagmalloc::heap::Heap;

fn run_scenario(scenario_name: &str) -> (String, String) {
    let exe = std::env::current_exe().expect("cannot determine test binary path");

    let output = std::process::Command::new(&exe)
        .env("DIAGMALLOC_REPORT_SCENARIO", scenario_name)
        .arg("--exact")
        .arg("report_scenario_driver")
        .arg("--nocapture")
        .env("RUST_TEST_THREADS", "1")
        .output()
        .expect("failed to spawn subprocess");

    assert!(
        output.status.success(),
        "scenario '{}' child failed. stderr:\n{}",
        scenario_name,
        String::from_utf8_lossy(&output.stderr)
    );
    (
        String::from_utf8_lossy(&output.stdout).into_owned(),
        String::from_utf8_lossy(&output.stderr).into_owned(),
    )
}

/// Every `EXPECT:` line the child emitted must appear verbatim in its
/// stdout, in the same order.
fn assert_expectations_met(stdout: &str, stderr: &str) {
    let expectations: Vec<&str> = stderr
        .lines()
        .filter_map(|line| line.strip_prefix("EXPECT:"))
        .collect();
    assert!(!expectations.is_empty(), "child produced no expectations");

    let mut rest = stdout;
    for expected in expectations {
        match rest.find(expected) {
            Some(pos) => rest = &rest[pos + expected.len()..],
            None => panic!(
                "expected line '{}' not found (in order) in stdout:\n{}",
                expected, stdout
            ),
        }
    }
}

#[test]
fn report_scenario_driver() {
    let scenario = match std::env::var("DIAGMALLOC_REPORT_SCENARIO") {
        Ok(s) => s,
        Err(_) => return, // Not a subprocess invocation; skip.
    };

    match scenario.as_str() {
        "statistics" => scenario_statistics(),
        "leak_report" => scenario_leak_report(),
        "empty_leak_report" => scenario_empty_leak_report(),
        _ => panic!("unknown scenario: {}", scenario),
    }
}

/// Two allocations, one free, one counted failure, then the summary.
fn scenario_statistics() {
    let mut h = Heap::new().expect("arena mapping failed");
    let p = h.malloc(100);
    let q = h.malloc(50);
    assert!(!p.is_null() && !q.is_null());
    unsafe { h.free(p) };
    // calloc overflow counts one failure of `sz` bytes.
    assert!(h.calloc(usize::MAX, 2).is_null());

    eprintln!(
        "EXPECT:alloc count: active {:10}   total {:10}   fail {:10}",
        1, 2, 1
    );
    eprintln!(
        "EXPECT:alloc size:  active {:10}   total {:10}   fail {:10}",
        50, 150, 2
    );
    h.print_statistics();
}

/// Two live allocations leak; the report names each call site, newest
/// first.
fn scenario_leak_report() {
    let mut h = Heap::new().expect("arena mapping failed");
    let first_line = line!() + 1;
    let first = h.malloc(100);
    let second_line = line!() + 1;
    let second = h.calloc(4, 8);
    assert!(!first.is_null() && !second.is_null());

    // Freed allocations must not appear.
    let gone = h.malloc(640);
    assert!(!gone.is_null());
    unsafe { h.free(gone) };

    eprintln!(
        "EXPECT:LEAK CHECK: {}:{}: allocated object {:p} with size {}",
        file!(),
        second_line,
        second,
        32
    );
    eprintln!(
        "EXPECT:LEAK CHECK: {}:{}: allocated object {:p} with size {}",
        file!(),
        first_line,
        first,
        100
    );
    h.print_leak_report();
}

/// Nothing live, nothing reported.
fn scenario_empty_leak_report() {
    let mut h = Heap::new().expect("arena mapping failed");
    let p = h.malloc(100);
    assert!(!p.is_null());
    unsafe { h.free(p) };
    h.print_leak_report();
    println!("REPORT END");
}

#[test]
fn statistics_output_matches_the_fixed_format() {
    let (stdout, stderr) = run_scenario("statistics");
    assert_expectations_met(&stdout, &stderr);
}

#[test]
fn leak_report_names_call_sites_newest_first() {
    let (stdout, stderr) = run_scenario("leak_report");
    assert_expectations_met(&stdout, &stderr);
    // The freed allocation must not be reported.
    assert!(
        !stdout.contains("with size 640"),
        "freed allocation leaked into the report:\n{}",
        stdout
    );
}

#[test]
fn leak_report_is_silent_when_nothing_leaks() {
    let (stdout, _) = run_scenario("empty_leak_report");
    assert!(
        !stdout.contains("LEAK CHECK:"),
        "leak report should be empty, got:\n{}",
        stdout
    );
    assert!(stdout.contains("REPORT END"));
}
