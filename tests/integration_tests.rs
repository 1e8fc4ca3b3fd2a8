// Comprehensive Integration Tests for the vlbasic parser
//
// Parser robustness suites run through one harness so that every case is
// checked for both its outcome and for panics.

use vlbasic::ast::Node;
use vlbasic::error::VlbError;
use vlbasic::lexer::tokenize;
use vlbasic::parser::parse;

/// Test result for a single test case
#[derive(Debug)]
pub enum TestResult {
    Pass,
    Fail(String),
    Crash(String),
}

/// Individual test case
#[derive(Debug, Clone)]
pub struct TestCase {
    pub name: String,
    pub input: String,
    pub should_succeed: bool,
    pub expected_error_contains: Option<String>,
}

/// Test suite containing multiple test cases
#[derive(Debug)]
pub struct TestSuite {
    pub name: String,
    pub tests: Vec<TestCase>,
}

impl TestSuite {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tests: Vec::new(),
        }
    }

    pub fn add_test(&mut self, test: TestCase) {
        self.tests.push(test);
    }

    /// Run all tests in this suite
    pub fn run(&self) -> TestSuiteResults {
        let mut results = TestSuiteResults::new(&self.name);
        
        println!("Running test suite: {}", self.name);
        println!("{}", "=".repeat(50));

        for test in &self.tests {
            let result = run_single_test(test);
            results.add_result(&test.name, result);
        }

        results.print_summary();
        results
    }
}

/// Results for a test suite run
#[derive(Debug)]
pub struct TestSuiteResults {
    pub suite_name: String,
    pub results: Vec<(String, TestResult)>,
    pub passed: usize,
    pub failed: usize,
    pub crashed: usize,
}

impl TestSuiteResults {
    pub fn new(suite_name: &str) -> Self {
        Self {
            suite_name: suite_name.to_string(),
            results: Vec::new(),
            passed: 0,
            failed: 0,
            crashed: 0,
        }
    }

    pub fn add_result(&mut self, test_name: &str, result: TestResult) {
        match &result {
            TestResult::Pass => {
                self.passed += 1;
                println!("  ✓ {}", test_name);
            }
            TestResult::Fail(msg) => {
                self.failed += 1;
                println!("  ✗ {}: {}", test_name, msg);
            }
            TestResult::Crash(msg) => {
                self.crashed += 1;
                println!("  💥 {}: CRASHED - {}", test_name, msg);
            }
        }
        self.results.push((test_name.to_string(), result));
    }

    pub fn print_summary(&self) {
        println!();
        println!("Test Suite: {} - Summary", self.suite_name);
        println!("{}", "-".repeat(30));
        println!("Passed:  {}", self.passed);
        println!("Failed:  {}", self.failed);
        println!("Crashed: {}", self.crashed);
        println!("Total:   {}", self.results.len());
        
        if self.crashed > 0 {
            println!("\n⚠️  WARNING: {} tests caused crashes! Parser robustness needs improvement.", self.crashed);
        }
        
        if self.failed > 0 {
            println!("\n❌ {} tests had unexpected results.", self.failed);
        }
        
        if self.crashed == 0 && self.failed == 0 {
            println!("\n✅ All tests passed! Parser is robust.");
        }
        println!();
    }

    pub fn is_all_passed(&self) -> bool {
        self.crashed == 0 && self.failed == 0
    }
}

/// Run a single test case
fn run_single_test(test: &TestCase) -> TestResult {
    // Catch any panics to detect crashes
    let result = std::panic::catch_unwind(|| {
        parse_input(&test.input)
    });

    match result {
        Ok(parse_result) => {
            match (parse_result, test.should_succeed) {
                (Ok(_), true) => TestResult::Pass,
                (Ok(_), false) => TestResult::Fail("Expected parsing to fail, but it succeeded".to_string()),
                (Err(error), false) => {
                    // Check if error contains expected text
                    if let Some(expected) = &test.expected_error_contains {
                        if error.message.contains(expected) {
                            TestResult::Pass
                        } else {
                            TestResult::Fail(format!(
                                "Error message '{}' doesn't contain expected text '{}'", 
                                error.message, expected
                            ))
                        }
                    } else {
                        TestResult::Pass // Any error is acceptable
                    }
                }
                (Err(error), true) => TestResult::Fail(format!("Expected parsing to succeed, but got error: {}", error.message)),
            }
        }
        Err(panic_info) => {
            let panic_msg = if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else {
                "Unknown panic".to_string()
            };
            TestResult::Crash(panic_msg)
        }
    }
}

/// Tokenize and parse input and return result
fn parse_input(input: &str) -> Result<Vec<Node>, VlbError> {
    let tokens = tokenize("<test>", input)?;
    parse("<test>", tokens)
}

/// Test case builder for convenience
impl TestCase {
    pub fn should_succeed(name: &str, input: &str) -> Self {
        Self {
            name: name.to_string(),
            input: input.to_string(),
            should_succeed: true,
            expected_error_contains: None,
        }
    }

    pub fn should_fail(name: &str, input: &str) -> Self {
        Self {
            name: name.to_string(),
            input: input.to_string(),
            should_succeed: false,
            expected_error_contains: None,
        }
    }

    pub fn should_fail_with_message(name: &str, input: &str, expected_msg: &str) -> Self {
        Self {
            name: name.to_string(),
            input: input.to_string(),
            should_succeed: false,
            expected_error_contains: Some(expected_msg.to_string()),
        }
    }
}


// ============================================================================
// Test Suite Creation Functions
// ============================================================================

fn create_malformed_expressions_tests() -> TestSuite {
    let mut suite = TestSuite::new("Malformed Expressions");

    // === PARENTHESES TESTS ===

    suite.add_test(TestCase::should_fail_with_message(
        "unmatched_opening_paren",
        "(1 + 2",
        "Expected ')' after expression, got end of file",
    ));

    suite.add_test(TestCase::should_fail_with_message(
        "unmatched_opening_paren_nested",
        "((1 + 2)",
        "Expected ')' after expression",
    ));

    suite.add_test(TestCase::should_fail_with_message(
        "unmatched_closing_paren",
        "1 + 2)",
        "Expected newline or ';', got ')'",
    ));

    suite.add_test(TestCase::should_fail_with_message(
        "empty_parentheses",
        "()",
        "Expected expression, got ')'",
    ));

    suite.add_test(TestCase::should_fail_with_message(
        "empty_parentheses_in_expression",
        "1 + ()",
        "Expected expression, got ')'",
    ));

    // === BRACKET TESTS ===

    suite.add_test(TestCase::should_fail_with_message(
        "unmatched_opening_bracket",
        "[1, 2",
        "Expected ',' or ']' in list, got end of file",
    ));

    suite.add_test(TestCase::should_fail_with_message(
        "empty_index",
        "items[]",
        "Expected index expression, got ']'",
    ));

    suite.add_test(TestCase::should_fail_with_message(
        "unterminated_range",
        "[0 -> 5",
        "Expected ']' after range",
    ));

    // === BRACE TESTS ===

    suite.add_test(TestCase::should_fail_with_message(
        "dictionary_missing_colon",
        "{ x = 1",
        "Expected ':' after dictionary key, got '='",
    ));

    suite.add_test(TestCase::should_fail_with_message(
        "unmatched_closing_brace",
        "x = 1 }",
        "Expected newline or ';', got '}'",
    ));

    suite
}

fn create_edge_case_tests() -> TestSuite {
    let mut suite = TestSuite::new("Edge Cases");

    suite.add_test(TestCase::should_succeed("empty_input", ""));
    suite.add_test(TestCase::should_succeed("only_whitespace", "   \n\t  "));
    suite.add_test(TestCase::should_succeed("only_comment", "# nothing here"));
    suite.add_test(TestCase::should_succeed("only_separators", ";;\n;"));

    suite.add_test(TestCase::should_fail_with_message(
        "unexpected_eof_after_operator",
        "1 +",
        "Expected expression after '+', got end of file",
    ));
    suite.add_test(TestCase::should_fail("unexpected_eof_in_expression", "1 + ("));

    let deep_parens = "(".repeat(100) + "1" + &")".repeat(100);
    suite.add_test(TestCase::should_succeed("deeply_nested_parens", &deep_parens));

    suite.add_test(TestCase::should_fail_with_message(
        "two_expressions_on_one_line",
        "1 2",
        "Expected newline or ';', got number '2'",
    ));
    suite.add_test(TestCase::should_succeed("semicolon_separated", "1; 2; 3"));

    suite
}

fn create_operator_tests() -> TestSuite {
    let mut suite = TestSuite::new("Operator Tests");

    suite.add_test(TestCase::should_fail("missing_right_operand", "1 *"));
    suite.add_test(TestCase::should_fail_with_message(
        "missing_both_operands",
        "+",
        "Expected expression after '+'",
    ));

    // Unary operators stack, so these are valid
    suite.add_test(TestCase::should_succeed("double_plus", "1 ++ 2"));
    suite.add_test(TestCase::should_succeed("double_minus", "1 -- 2"));
    suite.add_test(TestCase::should_succeed("mixed_operators", "1 +- 2"));

    suite.add_test(TestCase::should_succeed("comparison_equal", "1 == 2"));
    suite.add_test(TestCase::should_succeed("comparison_not_equal", "1 != 2"));
    suite.add_test(TestCase::should_succeed("comparison_less_equal", "1 <= 2"));
    suite.add_test(TestCase::should_succeed("comparison_greater_equal", "1 >= 2"));
    suite.add_test(TestCase::should_succeed("power_and_modulo", "2 ^ 3 % 5"));
    suite.add_test(TestCase::should_succeed("not_comparison", "NOT 1 == 2"));

    suite.add_test(TestCase::should_fail_with_message(
        "bare_bang",
        "1 ! 2",
        "Unexpected character: '!'",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "lowercase_keyword_is_identifier",
        "let x = 1",
        "Expected newline or ';', got identifier 'x'",
    ));

    suite
}

fn create_control_flow_tests() -> TestSuite {
    let mut suite = TestSuite::new("Control Flow Tests");

    suite.add_test(TestCase::should_succeed(
        "valid_if",
        "IF x THEN\nprint(1)\nELSEIF y THEN\nprint(2)\nELSE\nprint(3)\nEND",
    ));
    suite.add_test(TestCase::should_succeed("single_line_if", "IF x THEN; print(1); END"));
    suite.add_test(TestCase::should_fail_with_message(
        "if_missing_then",
        "IF x\nprint(1)\nEND",
        "Expected keyword THEN after IF condition, got newline",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "if_never_closed",
        "IF x THEN\nprint(1)",
        "got end of file",
    ));

    suite.add_test(TestCase::should_succeed("valid_while", "WHILE i < 10 THEN\ni += 1\nEND"));
    suite.add_test(TestCase::should_fail("while_missing_condition", "WHILE THEN\nEND"));
    suite.add_test(TestCase::should_fail_with_message(
        "while_never_closed",
        "WHILE TRUE THEN\nBREAK",
        "Expected keyword END, got end of file",
    ));

    suite.add_test(TestCase::should_succeed(
        "valid_for",
        "FOR item IN [1, 2, 3] THEN\nprint(item)\nCONTINUE\nEND",
    ));
    suite.add_test(TestCase::should_succeed("for_over_range", "FOR i IN [0 -> 10 -> 2] THEN\nEND"));
    suite.add_test(TestCase::should_fail_with_message(
        "for_missing_variable",
        "FOR 1 IN items THEN\nEND",
        "Expected loop variable after 'FOR', got number '1'",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "for_missing_in",
        "FOR i items THEN\nEND",
        "Expected keyword IN after loop variable",
    ));

    // Placement of RETURN and BREAK is checked when the program runs
    suite.add_test(TestCase::should_succeed("top_level_return", "RETURN"));
    suite.add_test(TestCase::should_succeed("top_level_break", "BREAK"));

    suite
}

fn create_literal_tests() -> TestSuite {
    let mut suite = TestSuite::new("Literal Tests");

    suite.add_test(TestCase::should_succeed("integer_literal", "42"));
    suite.add_test(TestCase::should_succeed("float_literal", "3.14"));
    suite.add_test(TestCase::should_succeed("double_quoted_string", "\"hello\""));
    suite.add_test(TestCase::should_succeed("single_quoted_string", "'hello'"));
    suite.add_test(TestCase::should_succeed("escaped_string", "'tab\\there\\n'"));
    suite.add_test(TestCase::should_succeed("boolean_constants", "TRUE; FALSE; NULL"));
    suite.add_test(TestCase::should_succeed("empty_list", "[]"));
    suite.add_test(TestCase::should_succeed("multiline_list", "[\n1,\n2\n]"));
    suite.add_test(TestCase::should_succeed("dictionary", "{'a': 1, 'b': [1, 2]}"));
    suite.add_test(TestCase::should_succeed("empty_dictionary", "{}"));
    suite.add_test(TestCase::should_succeed("method_on_integer", "5.sqrt()"));

    suite.add_test(TestCase::should_fail("multiple_dots", "3.14.159"));
    suite.add_test(TestCase::should_fail("trailing_dot", "42."));
    suite.add_test(TestCase::should_fail("leading_dot", ".42"));

    suite.add_test(TestCase::should_fail_with_message(
        "unterminated_string",
        "\"hello",
        "Unterminated string",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "unterminated_string_with_newline",
        "\"hello\nworld\"",
        "Unterminated string",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "integer_overflow",
        "99999999999999999999",
        "Invalid integer",
    ));

    suite
}

fn create_function_tests() -> TestSuite {
    let mut suite = TestSuite::new("Function Tests");

    suite.add_test(TestCase::should_succeed("simple_function_call", "foo()"));
    suite.add_test(TestCase::should_succeed("function_call_with_args", "foo(1, 2, 3)"));
    suite.add_test(TestCase::should_succeed("multiline_args", "foo(\n1,\n2\n)"));
    suite.add_test(TestCase::should_succeed("chained_calls", "make()(1)[0].length()"));

    suite.add_test(TestCase::should_fail_with_message(
        "missing_closing_paren",
        "foo(1, 2",
        "Expected ',' or ')' in argument list, got end of file",
    ));
    suite.add_test(TestCase::should_fail("missing_opening_paren", "foo 1, 2)"));
    suite.add_test(TestCase::should_fail_with_message(
        "trailing_comma",
        "foo(1, 2,)",
        "Expected expression, got ')'",
    ));

    suite.add_test(TestCase::should_succeed(
        "named_definition",
        "FUNCTION add(a, b)\nRETURN a + b\nEND",
    ));
    suite.add_test(TestCase::should_succeed(
        "anonymous_definition",
        "LET twice = FUNCTION(x)\nRETURN x * 2\nEND",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "duplicate_parameter",
        "FUNCTION f(a, a)\nEND",
        "Duplicate parameter 'a'",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "missing_parameter_list",
        "FUNCTION f\nEND",
        "Expected '(' after FUNCTION",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "function_never_closed",
        "FUNCTION f()\nRETURN 1",
        "Expected keyword END, got end of file",
    ));

    suite
}

fn create_assignment_tests() -> TestSuite {
    let mut suite = TestSuite::new("Assignment Tests");

    suite.add_test(TestCase::should_succeed("declaration", "LET x = 1"));
    suite.add_test(TestCase::should_succeed("constant_declaration", "CONST limit = 10"));
    suite.add_test(TestCase::should_succeed("simple_assignment", "x = 1"));
    suite.add_test(TestCase::should_succeed("compound_assignment", "x += 1; x -= 1; x *= 2; x /= 2"));
    suite.add_test(TestCase::should_succeed("index_assignment", "items[0] = 5"));
    suite.add_test(TestCase::should_succeed("nested_index_assignment", "grid[1][2] = 0"));

    suite.add_test(TestCase::should_fail_with_message(
        "missing_value",
        "x =",
        "Expected expression after '=', got end of file",
    ));
    suite.add_test(TestCase::should_fail("invalid_target", "1 = x"));
    suite.add_test(TestCase::should_fail_with_message(
        "declaration_missing_name",
        "LET = 5",
        "Expected identifier after 'LET', got '='",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "declaration_missing_equals",
        "LET x 5",
        "Expected '=' after variable name, got number '5'",
    ));

    suite
}

fn create_import_tests() -> TestSuite {
    let mut suite = TestSuite::new("Import Tests");

    suite.add_test(TestCase::should_succeed("plain_import", "IMPORT 'math'"));
    suite.add_test(TestCase::should_succeed("aliased_import", "IMPORT 'math' AS m"));
    suite.add_test(TestCase::should_succeed("wildcard_import", "IMPORT 'math' AS *"));
    suite.add_test(TestCase::should_succeed("computed_import", "IMPORT 'lib/' + name"));
    suite.add_test(TestCase::should_fail_with_message(
        "bad_alias",
        "IMPORT 'math' AS 5",
        "Expected identifier or '*' after 'AS', got number '5'",
    ));

    suite
}

fn create_positive_tests() -> TestSuite {
    let mut suite = TestSuite::new("Positive Tests");

    suite.add_test(TestCase::should_succeed("simple_arithmetic", "1 + 2 * 3"));
    suite.add_test(TestCase::should_succeed("parentheses", "(1 + 2) * 3"));
    suite.add_test(TestCase::should_succeed("string_concatenation", "\"hello\" + \" world\""));
    suite.add_test(TestCase::should_succeed("string_repetition", "'ab' * 3"));
    suite.add_test(TestCase::should_succeed(
        "program",
        "LET total = 0\nFOR n IN [1 -> 4] THEN\ntotal += n\nEND\nprint(total)",
    ));

    suite
}

// ============================================================================
// Main Test Function
// ============================================================================

#[test]
fn comprehensive_parser_tests() {
    println!("vlbasic Parser Robustness Test Suite");
    println!("====================================\n");

    let mut all_passed = true;

    let suites = vec![
        create_malformed_expressions_tests(),
        create_edge_case_tests(),
        create_operator_tests(),
        create_control_flow_tests(),
        create_literal_tests(),
        create_function_tests(),
        create_assignment_tests(),
        create_import_tests(),
        create_positive_tests(),
    ];

    for suite in suites {
        let results = suite.run();
        if !results.is_all_passed() {
            all_passed = false;
        }
    }

    assert!(all_passed, "Some parser tests failed. See output above for details.");
}

#[test]
fn parsing_is_deterministic() {
    let source = "LET f = FUNCTION(a)\nRETURN [a -> 10][0] ^ 2\nEND\nf(3)";
    let first = parse_input(source).unwrap();
    let second = parse_input(source).unwrap();
    assert_eq!(format!("{:?}", first), format!("{:?}", second));
}

#[test]
fn token_streams_without_eof_are_accepted() {
    assert!(parse("<empty>", Vec::new()).unwrap().is_empty());

    let mut tokens = tokenize("<cut>", "LET x = 1").unwrap();
    tokens.pop();
    let statements = parse("<cut>", tokens).unwrap();
    assert_eq!(statements.len(), 1);

    let mut tokens = tokenize("<cut>", "LET x =").unwrap();
    tokens.pop();
    let error = parse("<cut>", tokens).unwrap_err();
    assert!(error.message.ends_with("got end of file"), "{}", error.message);
}
