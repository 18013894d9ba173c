mod common;

#[cfg(test)]
mod session_tests {
    use pretty_assertions::assert_eq;

    use rlox as lox;

    use lox::session::{EXIT_RUNTIME_ERROR, EXIT_STATIC_ERROR};
    use lox::value::Value;

    use crate::common::{run, Harness};

    #[test]
    fn test_clean_run_has_no_exit_code() {
        let harness = run("print \"ok\";");

        assert_eq!(harness.stdout(), "ok\n");
        assert_eq!(harness.lox.exit_code(), None);
    }

    #[test]
    fn test_syntax_error_suppresses_execution() {
        let harness = run("print 1;\nvar a = ;\nprint 2;");

        assert_eq!(harness.stdout(), "");
        assert_eq!(harness.stderr(), "[line 2] Error at ';': Expected expression.\n");
        assert!(harness.lox.had_error());
        assert_eq!(harness.lox.exit_code(), Some(EXIT_STATIC_ERROR));
    }

    #[test]
    fn test_two_syntax_errors_reported_in_one_pass() {
        let harness = run("print (1;\nprint 2 +;\nprint 3;");

        assert_eq!(
            harness.stderr(),
            "[line 1] Error at ';': Expected ')' after expression.\n\
             [line 2] Error at ';': Expected expression.\n"
        );
        assert_eq!(harness.stdout(), "");
    }

    #[test]
    fn test_missing_semicolon_before_brace_is_one_error() {
        let harness = run("{ print 1 }\nprint 2;");

        assert_eq!(harness.stderr(), "[line 1] Error at '}': Expected ';' after value.\n");
        assert_eq!(harness.stdout(), "");
        assert_eq!(harness.lox.exit_code(), Some(EXIT_STATIC_ERROR));
    }

    #[test]
    fn test_lexical_error_is_static() {
        let harness = run("print 1; @");

        assert_eq!(harness.stdout(), "");
        assert_eq!(harness.stderr(), "[line 1] Error: Unexpected character: @\n");
        assert_eq!(harness.lox.exit_code(), Some(EXIT_STATIC_ERROR));
    }

    #[test]
    fn test_resolution_error_suppresses_execution() {
        let harness = run("print 1;\nreturn 2;");

        assert_eq!(harness.stdout(), "");
        assert_eq!(
            harness.stderr(),
            "[line 2] Error at 'return': Can't return from top-level code.\n"
        );
        assert_eq!(harness.lox.exit_code(), Some(EXIT_STATIC_ERROR));
    }

    #[test]
    fn test_runtime_error_exit_code() {
        let harness = run("print nil + 1;");

        assert!(harness.lox.had_runtime_error());
        assert_eq!(harness.lox.exit_code(), Some(EXIT_RUNTIME_ERROR));
    }

    #[test]
    fn test_independent_sessions_share_nothing() {
        let mut first = Harness::new();
        first.run("var shared = 1;");

        let second = run("print shared;");

        assert_eq!(second.stderr(), "Undefined variable 'shared'.\n[line 1]\n");
        assert!(!first.lox.had_runtime_error());
    }

    #[test]
    fn test_same_program_is_idempotent_across_sessions() {
        let source = r#"
            fun adder(n) { fun add(x) { return x + n; } return add; }
            var add2 = adder(2);
            for (var i = 0; i < 3; i = i + 1) print add2(i);
        "#;

        let first = run(source);
        let second = run(source);

        assert_eq!(first.stdout(), "2\n3\n4\n");
        assert_eq!(first.stdout(), second.stdout());
        assert_eq!(first.stderr(), second.stderr());
    }

    #[test]
    fn test_repl_state_persists_between_runs() {
        let mut harness = Harness::new();

        harness
            .run("var a = 1;")
            .run("fun f() { return a + 1; }")
            .run("fun mk() { var x = 5; fun g() { return x; } return g; }")
            .run("var g = mk();")
            .run("print f();")
            .run("print g();");

        assert_eq!(harness.stdout(), "2\n5\n");
        assert_eq!(harness.lox.exit_code(), None);
    }

    #[test]
    fn test_later_runs_do_not_reuse_resolved_slots() {
        // `p` resolves one frame out; a global read on a later line must not
        // pick up that distance.
        let mut harness = Harness::new();

        harness
            .run("var a = \"global\"; fun f(p) { { return p; } }")
            .run("print a;")
            .run("print f(\"param\");");

        assert_eq!(harness.stdout(), "global\nparam\n");
    }

    #[test]
    fn test_reset_error_between_lines() {
        let mut harness = Harness::new();

        harness.run("print ;");
        assert!(harness.lox.had_error());

        harness.lox.reset_error();
        harness.run("print 1;");

        assert_eq!(harness.stdout(), "1\n");
        assert_eq!(harness.lox.exit_code(), None);
    }

    #[test]
    fn test_runtime_error_does_not_lose_globals() {
        let mut harness = Harness::new();

        harness.run("var a = 1;\nprint a;\nprint -nil;").run("print a + 1;");

        assert_eq!(harness.stdout(), "1\n2\n");
        assert_eq!(harness.stderr(), "Operand must be a number.\n[line 3]\n");
    }

    #[test]
    fn test_evaluate_expression() {
        let mut harness = Harness::new();

        let value = harness.lox.evaluate_expression("1 + 2 * 3").expect("sinks work");
        assert_eq!(value, Some(Value::Number(7.0)));

        let value = harness
            .lox
            .evaluate_expression("\"a\" + \"b\"")
            .expect("sinks work");
        assert_eq!(value.map(|v| v.to_string()), Some("ab".to_string()));
    }

    #[test]
    fn test_evaluate_expression_errors() {
        let mut harness = Harness::new();

        let value = harness.lox.evaluate_expression("(1 +").expect("sinks work");
        assert_eq!(value, None);
        assert_eq!(harness.stderr(), "[line 1] Error at end: Expected expression.\n");
        assert_eq!(harness.lox.exit_code(), Some(EXIT_STATIC_ERROR));

        let mut harness = Harness::new();

        let value = harness.lox.evaluate_expression("-\"x\"").expect("sinks work");
        assert_eq!(value, None);
        assert_eq!(harness.stderr(), "Operand must be a number.\n[line 1]\n");
        assert_eq!(harness.lox.exit_code(), Some(EXIT_RUNTIME_ERROR));
    }

    #[test]
    fn test_evaluate_sees_earlier_definitions() {
        let mut harness = Harness::new();

        harness.run("var base = 40; fun plus(n) { return base + n; }");
        let value = harness.lox.evaluate_expression("plus(2)").expect("sinks work");

        assert_eq!(value, Some(Value::Number(42.0)));
    }
}
