use conker::{
    node::{Item, ItemKind},
    parse_program,
    parser::{Parser, ParserError},
    tokenizer::Tokenizer,
    SourceError,
};
use indoc::indoc;

/// Run just the source pipeline, keeping both the items that parsed and
/// the errors that accumulated along the way.
fn parse_collecting_errors(input: &str) -> (Vec<Item>, Vec<ParserError>) {
    let chars: Vec<_> = input.chars().collect();
    let mut tokenizer = Tokenizer::new(&chars);
    tokenizer.tokenize();
    assert!(
        tokenizer.errors.is_empty(),
        "unexpected tokenizer errors: {:?}",
        tokenizer.errors
    );

    let mut parser = Parser::new(&tokenizer.tokens);
    parser.parse_top_level();
    (parser.items, parser.errors)
}

fn task_names(items: &[Item]) -> Vec<&str> {
    items
        .iter()
        .map(|item| {
            let ItemKind::TaskDefinition { name, .. } = &item.kind;
            name.as_str()
        })
        .collect()
}

#[test]
fn test_tokenizer_error_surfaces() {
    let result = parse_program("task A\n    1 @ 2\n");

    let Err(SourceError::Tokenize(errors)) = &result else {
        panic!("expected a tokenize error, got {result:?}");
    };
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message().contains('@'), "got {:?}", errors[0]);
}

#[test]
fn test_tokenizer_errors_accumulate() {
    let result = parse_program("task A\n    1 @ 2 ~ 3\n");

    let Err(SourceError::Tokenize(errors)) = &result else {
        panic!("expected tokenize errors, got {result:?}");
    };
    assert!(errors.len() > 1, "got {errors:?}");
}

#[test]
fn test_parse_error_surfaces() {
    let result = parse_program(indoc! {"
        task A 123
            1
    "});

    let Err(SourceError::Parse(errors)) = &result else {
        panic!("expected a parse error, got {result:?}");
    };
    assert!(!errors.is_empty());
}

#[test]
fn test_parser_recovers_past_malformed_task() {
    // The broken header must not take the following task down with it
    let (items, errors) = parse_collecting_errors(indoc! {"
        task Broken 123
            1

        task Fine
            2
    "});

    assert_eq!(errors.len(), 1, "got {errors:?}");
    assert_eq!(task_names(&items), vec!["Fine"]);
}

#[test]
fn test_parser_accumulates_across_malformed_tasks() {
    let (items, errors) = parse_collecting_errors(indoc! {"
        task One 11
            1

        task Two 22
            2

        task Three
            3
    "});

    assert!(errors.len() > 1, "got {errors:?}");
    assert_eq!(task_names(&items), vec!["Three"]);
}

#[test]
fn test_zero_multiplicity_rejected_but_rest_parses() {
    let (items, errors) = parse_collecting_errors(indoc! {"
        task None[0]
            1

        task Fine
            2
    "});

    assert!(!errors.is_empty());
    assert_eq!(task_names(&items), vec!["Fine"]);
}

#[test]
fn test_stray_top_level_tokens_reported_and_skipped() {
    let (items, errors) = parse_collecting_errors(indoc! {"
        1 + 2

        task Fine
            3
    "});

    assert!(!errors.is_empty());
    assert_eq!(task_names(&items), vec!["Fine"]);
}
