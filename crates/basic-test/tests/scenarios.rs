//! Canonical end-to-end scenarios (spec §8): small programs whose output
//! pins down cross-crate behavior no single crate's unit tests can see on
//! their own — `FOR`/`NEXT` accumulation, array literals, string
//! concatenation, `ON ERROR` control transfer, recursive `PROC`, and
//! `RETURN`-parameter `FN` mutating a caller's variable.

use basic_exec::RunOutcome;
use basic_test::Scenario;

fn run_outcome_ok(outcome: RunOutcome) {
    match outcome {
        RunOutcome::Ended => {}
        RunOutcome::Error(e) => panic!("scenario ended in an uncaught error: {e:?}"),
        RunOutcome::Stopped => panic!("scenario hit STOP"),
        RunOutcome::Paused => panic!("scenario hit PAUSE"),
    }
}

#[test]
fn for_next_accumulates() {
    let mut s = Scenario::new();
    s.load(&[(10, "FOR I%=1 TO 5 : S%=S%+I% : NEXT : PRINT S%")]);
    run_outcome_ok(s.run());
    assert_eq!(s.output_text(), "15\n");
}

#[test]
fn array_literal_and_sum() {
    let mut s = Scenario::new();
    s.load(&[(10, "DIM A(3) : A()=1,2,3,4 : PRINT SUM(A())")]);
    run_outcome_ok(s.run());
    assert_eq!(s.output_text(), "10\n");
}

#[test]
fn string_concatenation() {
    let mut s = Scenario::new();
    s.load(&[(10, r#"A$="Hello, " : B$="World" : PRINT A$+B$+"!""#)]);
    run_outcome_ok(s.run());
    assert_eq!(s.output_text(), "Hello, World!\n");
}

#[test]
fn on_error_goto_catches_division_by_zero() {
    let mut s = Scenario::new();
    s.load(&[
        (10, "ON ERROR GOTO 30"),
        (20, "PRINT 1/0"),
        (30, "PRINT ERR"),
    ]);
    run_outcome_ok(s.run());
    assert_eq!(s.output_text(), "18\n");
}

#[test]
fn recursive_proc_terminates_on_guard() {
    let mut s = Scenario::new();
    s.load(&[
        (10, "PROC p(3)"),
        (20, "END"),
        (30, r#"DEF PROC p(n%) IF n%>0 THEN PROC p(n%-1) ELSE PRINT "go" ENDPROC"#),
    ]);
    run_outcome_ok(s.run());
    assert_eq!(s.output_text(), "go\n");
}

#[test]
fn fn_return_parameter_mutates_caller_variable() {
    let mut s = Scenario::new();
    s.load(&[
        (10, "DEF FN f(RETURN x%) = x%"),
        (20, "A%=5 : B%=FN f(A%) : PRINT A%;B%"),
    ]);
    run_outcome_ok(s.run());
    assert_eq!(s.output_text(), "55\n");
}
