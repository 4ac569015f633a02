use conker::{RuntimeError, Value};
use indoc::indoc;

use crate::utils::{run_one_expression, run_one_task, run_tasks};

mod utils;

#[test]
fn test_arithmetic() {
    assert_eq!(run_one_expression("12 + 3"), Ok(Value::Integer(15)));
    assert_eq!(run_one_expression("12 - 3"), Ok(Value::Integer(9)));
    assert_eq!(run_one_expression("12 * 3"), Ok(Value::Integer(36)));
    assert_eq!(run_one_expression("12 / 3"), Ok(Value::Integer(4)));

    // Integer division truncates toward zero
    assert_eq!(run_one_expression("7 / 2"), Ok(Value::Integer(3)));
    assert_eq!(run_one_expression("(0 - 7) / 2"), Ok(Value::Integer(-3)));
}

#[test]
fn test_unary_minus() {
    assert_eq!(run_one_expression("-5"), Ok(Value::Integer(-5)));
    assert_eq!(run_one_expression("3 + -2"), Ok(Value::Integer(1)));
}

#[test]
fn test_division_by_zero() {
    assert!(matches!(
        run_one_expression("1 / 0"),
        Err(RuntimeError::Arithmetic(_))
    ));
}

#[test]
fn test_comparisons() {
    assert_eq!(run_one_expression("(2 + 2) == 4"), Ok(Value::Boolean(true)));
    assert_eq!(
        run_one_expression("(2 + 2) == 5"),
        Ok(Value::Boolean(false))
    );

    assert_eq!(run_one_expression("2 + 2 == 4"), Ok(Value::Boolean(true)));

    assert_eq!(run_one_expression("4 > 3"), Ok(Value::Boolean(true)));
    assert_eq!(run_one_expression("4 > 5"), Ok(Value::Boolean(false)));

    assert_eq!(run_one_expression("4 < 3"), Ok(Value::Boolean(false)));
    assert_eq!(run_one_expression("4 < 5"), Ok(Value::Boolean(true)));

    assert_eq!(run_one_expression("4 <= 4"), Ok(Value::Boolean(true)));
    assert_eq!(run_one_expression("4 >= 5"), Ok(Value::Boolean(false)));
    assert_eq!(run_one_expression("4 != 5"), Ok(Value::Boolean(true)));
}

#[test]
fn test_equality_across_variants() {
    assert_eq!(run_one_expression("1 == true"), Ok(Value::Boolean(false)));
    assert_eq!(run_one_expression("null == null"), Ok(Value::Boolean(true)));
    assert_eq!(run_one_expression("null == 0"), Ok(Value::Boolean(false)));
    assert_eq!(run_one_expression("null != 0"), Ok(Value::Boolean(true)));
}

#[test]
fn test_precedence() {
    assert_eq!(run_one_expression("2 + 3 * 5"), Ok(Value::Integer(17)));
    assert_eq!(run_one_expression("3 * 5 + 2"), Ok(Value::Integer(17)));
    assert_eq!(run_one_expression("10 - 2 - 3"), Ok(Value::Integer(5)));
    assert_eq!(run_one_expression("20 / 2 / 5"), Ok(Value::Integer(2)));
}

#[test]
fn test_assign() {
    assert_eq!(
        run_one_task(indoc! {"
            task X
                x = 3
                x
        "}),
        Ok(Value::Integer(3))
    );

    // Rebinding replaces the old value
    assert_eq!(
        run_one_task(indoc! {"
            task X
                x = 3
                x = x + 1
                x
        "}),
        Ok(Value::Integer(4))
    );
}

#[test]
fn test_if_else() {
    assert_eq!(
        run_one_task(indoc! {"
            task X
                r = 0
                if 1 < 2
                    r = 10
                else
                    r = 20
                r
        "}),
        Ok(Value::Integer(10))
    );

    assert_eq!(
        run_one_task(indoc! {"
            task X
                r = 0
                if 1 > 2
                    r = 10
                else
                    r = 20
                r
        "}),
        Ok(Value::Integer(20))
    );
}

#[test]
fn test_truthiness() {
    // null and zero are falsy, nonzero integers are truthy
    assert_eq!(
        run_one_task(indoc! {"
            task X
                r = 1
                if null
                    r = 2
                if 0
                    r = 3
                if 7
                    r = r + 10
                r
        "}),
        Ok(Value::Integer(11))
    );
}

#[test]
fn test_while() {
    assert_eq!(
        run_one_task(indoc! {"
            task X
                total = 0
                i = 1
                while i <= 4
                    total = total + i
                    i = i + 1
                total
        "}),
        Ok(Value::Integer(10))
    );
}

#[test]
fn test_unbound_name() {
    assert_eq!(
        run_one_expression("mystery"),
        Err(RuntimeError::Name("mystery".to_string()))
    );
}

#[test]
fn test_index_outside_multi_task() {
    // $index only exists in multi-task instances
    assert_eq!(
        run_one_expression("$index"),
        Err(RuntimeError::Name("$index".to_string()))
    );
}

#[test]
fn test_assign_to_magic_name() {
    assert!(matches!(
        run_one_task(indoc! {"
            task X
                $index = 3
        "}),
        Err(RuntimeError::Name(_))
    ));
}

#[test]
fn test_type_errors() {
    assert!(matches!(
        run_one_expression("true + 1"),
        Err(RuntimeError::Type(_))
    ));
    assert!(matches!(
        run_one_expression("null < 1"),
        Err(RuntimeError::Type(_))
    ));
}

#[test]
fn test_error_terminates_program() {
    // A fault in one task tears down the other, which reports the
    // cooperative shutdown signal rather than an error of its own
    let results = run_tasks(indoc! {"
        task Bad
            1 / 0

        task Victim
            x <- Bad
    "});

    assert!(matches!(
        results["Bad"],
        Err(RuntimeError::Arithmetic(_))
    ));
    assert_eq!(results["Victim"], Err(RuntimeError::ExitRequested));
    assert_eq!(conker::exit_code(&results), 1);
}
