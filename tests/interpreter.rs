mod common;

#[cfg(test)]
mod interpreter_tests {
    use pretty_assertions::assert_eq;

    use rlox as lox;

    use lox::interpreter::Interpreter;
    use lox::parser::Parser;
    use lox::resolver::Resolver;
    use lox::scanner::scan_tokens;

    use crate::common::{output_of, run, SharedBuf};

    /// Run a program expected to fail at runtime; returns (stdout, stderr).
    fn runtime_failure(source: &str) -> (String, String) {
        let harness = run(source);

        assert!(harness.lox.had_runtime_error(), "expected a runtime error");
        assert!(!harness.lox.had_error());
        assert_eq!(harness.lox.exit_code(), Some(70));

        (harness.stdout(), harness.stderr())
    }

    // ── expressions ──────────────────────────────────────────────────────

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(
            output_of("print 1 + 2 * 3; print (1 + 2) * 3; print 10 - 4 / 2; print -2 * -3;"),
            "7\n9\n8\n6\n"
        );
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(
            output_of("print 3; print 2.5; print 1 / 3 * 3; print 0.1 + 0.2;"),
            "3\n2.5\n1\n0.30000000000000004\n"
        );
    }

    #[test]
    fn test_division_by_zero_follows_ieee() {
        assert_eq!(output_of("print 1 / 0; print -1 / 0;"), "inf\n-inf\n");
    }

    #[test]
    fn test_truthiness() {
        assert_eq!(
            output_of("print !nil; print !false; print !0; print !\"\"; print !!\"x\";"),
            "true\ntrue\nfalse\nfalse\ntrue\n"
        );
        assert_eq!(
            output_of("if (0) print \"zero is truthy\"; if (nil) print \"unreachable\";"),
            "zero is truthy\n"
        );
    }

    #[test]
    fn test_logical_operators_return_operands() {
        // `crash` is never evaluated.
        assert_eq!(
            output_of("print nil or \"yes\"; print 1 and 2; print false and crash; print 1 or crash;"),
            "yes\n2\nfalse\n1\n"
        );
    }

    #[test]
    fn test_equality() {
        assert_eq!(
            output_of(
                "print nil == nil; print nil == false; print 1 == 1.0; print \"a\" == \"a\"; \
                 print 1 == \"1\"; print 2 != 3;"
            ),
            "true\nfalse\ntrue\ntrue\nfalse\ntrue\n"
        );
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(output_of("var a = \"con\"; print a + \"cat\";"), "concat\n");
    }

    // ── variables and scope ──────────────────────────────────────────────

    #[test]
    fn test_shadowing() {
        assert_eq!(
            output_of("var a = 1; { var a = 2; print a; { var a = 3; print a; } } print a;"),
            "2\n3\n1\n"
        );
    }

    #[test]
    fn test_assignment_reaches_enclosing_scope() {
        assert_eq!(
            output_of("var a = 1; { a = 2; { a = a + 1; } } print a;"),
            "3\n"
        );
    }

    #[test]
    fn test_uninitialized_variable_is_nil() {
        assert_eq!(output_of("var a; print a;"), "nil\n");
    }

    #[test]
    fn test_undefined_variable() {
        let (stdout, stderr) = runtime_failure("print 1;\nprint missing;\nprint 2;");

        assert_eq!(stdout, "1\n");
        assert_eq!(stderr, "Undefined variable 'missing'.\n[line 2]\n");
    }

    #[test]
    fn test_assignment_to_undeclared_variable() {
        let (_, stderr) = runtime_failure("b = 1;");

        assert_eq!(stderr, "Undefined variable 'b'.\n[line 1]\n");
    }

    #[test]
    fn test_static_scoping_of_closures() {
        let source = r#"
            var a = "global";
            {
                fun showA() { print a; }
                showA();
                var a = "block";
                showA();
            }
        "#;

        assert_eq!(output_of(source), "global\nglobal\n");
    }

    // ── control flow ─────────────────────────────────────────────────────

    #[test]
    fn test_while_and_for() {
        assert_eq!(
            output_of("var i = 0; while (i < 3) { print i; i = i + 1; }"),
            "0\n1\n2\n"
        );
        assert_eq!(
            output_of("for (var i = 0; i < 3; i = i + 1) print i * 10;"),
            "0\n10\n20\n"
        );
    }

    #[test]
    fn test_if_else_binds_to_nearest_if() {
        assert_eq!(
            output_of("if (true) if (false) print 1; else print 2;"),
            "2\n"
        );
    }

    #[test]
    fn test_return_unwinds_nested_loops_and_blocks() {
        let source = r#"
            fun find() {
                var i = 0;
                while (true) {
                    for (;;) {
                        { if (i == 3) return i; }
                        i = i + 1;
                    }
                }
            }
            print find();
        "#;

        assert_eq!(output_of(source), "3\n");
    }

    // ── functions and closures ───────────────────────────────────────────

    #[test]
    fn test_function_without_return_yields_nil() {
        assert_eq!(output_of("fun f() {} print f();"), "nil\n");
    }

    #[test]
    fn test_recursion() {
        let source = "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(15);";

        assert_eq!(output_of(source), "610\n");
    }

    #[test]
    fn test_counter_closure_keeps_state() {
        let source = r#"
            fun makeCounter() {
                var i = 0;
                fun count() { i = i + 1; print i; }
                return count;
            }
            var c = makeCounter();
            c();
            c();
            var d = makeCounter();
            d();
        "#;

        assert_eq!(output_of(source), "1\n2\n1\n");
    }

    #[test]
    fn test_closures_capture_fresh_binding_per_iteration() {
        let source = r#"
            var first;
            var second;
            for (var i = 1; i <= 2; i = i + 1) {
                var j = i;
                fun f() { print j; }
                if (j == 1) first = f; else second = f;
            }
            first();
            second();
        "#;

        assert_eq!(output_of(source), "1\n2\n");
    }

    #[test]
    fn test_closures_see_binding_mutated_in_place() {
        // The loop variable lives in one frame for the whole loop.
        let source = r#"
            var early;
            for (var i = 1; i <= 2; i = i + 1) {
                fun g() { print i; }
                if (i == 1) early = g;
            }
            early();

            var x = "before";
            fun show() { print x; }
            x = "after";
            show();
        "#;

        assert_eq!(output_of(source), "3\nafter\n");
    }

    #[test]
    fn test_arity_mismatch() {
        let (_, stderr) = runtime_failure("fun f() {}\nf(1);");

        assert_eq!(stderr, "Expected 0 arguments, but got 1.\n[line 2]\n");
    }

    #[test]
    fn test_calling_a_non_callable() {
        let (_, stderr) = runtime_failure("\"str\"();");

        assert_eq!(stderr, "Can only call functions and classes.\n[line 1]\n");
    }

    #[test]
    fn test_callable_display() {
        assert_eq!(
            output_of("fun f() {} print f; class K {} print K; print K(); print clock;"),
            "<fun f>\nK\nK instance\n<native fn>\n"
        );
    }

    #[test]
    fn test_clock_returns_seconds() {
        assert_eq!(output_of("var t = clock(); print t > 0; print t == t;"), "true\ntrue\n");
    }

    #[test]
    fn test_deep_recursion_completes() {
        let source = r#"
            fun count(n) {
                if (n == 0) return 0;
                return 1 + count(n - 1);
            }
            print count(300);
            print count(2000);
        "#;

        assert_eq!(output_of(source), "300\n2000\n");
    }

    #[test]
    fn test_runaway_recursion_overflows() {
        let harness = run("fun r() { r(); }\nr();");

        assert!(harness.lox.had_runtime_error());
        assert_eq!(harness.stderr(), "Stack overflow.\n[line 1]\n");
    }

    #[test]
    fn test_deeply_nested_program_runs() {
        let depth = 3_000;
        let grouping = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        let negations = format!("{}true", "!".repeat(depth));
        let blocks = format!("{}print 3;{}", "{".repeat(depth), "}".repeat(depth));

        let source = format!("print {};\nprint {};\n{}", grouping, negations, blocks);

        assert_eq!(output_of(&source), "1\ntrue\n3\n");
    }

    // ── classes ──────────────────────────────────────────────────────────

    #[test]
    fn test_fields_and_methods() {
        let source = r#"
            class P { name() { return "method"; } }
            var p = P();
            var m = p.name;
            print m();
            p.name = "field";
            print p.name;
            p.extra = 1;
            print p.extra + 1;
        "#;

        assert_eq!(output_of(source), "method\nfield\n2\n");
    }

    #[test]
    fn test_initializer_contract() {
        let source = r#"
            class C { init(x) { this.x = x; } }
            var c = C(5);
            print c.x;
            print c.init(7) == c;
            print c.x;
        "#;

        assert_eq!(output_of(source), "5\ntrue\n7\n");
    }

    #[test]
    fn test_bare_return_in_initializer() {
        let source = "class D { init() { this.v = 1; return; this.v = 2; } } print D().v;";

        assert_eq!(output_of(source), "1\n");
    }

    #[test]
    fn test_class_arity_follows_init() {
        let (_, stderr) = runtime_failure("class C { init(a, b) {} }\nC(1);");

        assert_eq!(stderr, "Expected 2 arguments, but got 1.\n[line 2]\n");
    }

    #[test]
    fn test_this_captured_by_closure() {
        let source = r#"
            class Box {
                init(v) { this.v = v; }
                getter() {
                    fun g() { return this.v; }
                    return g;
                }
            }
            var g = Box(9).getter();
            print g();
        "#;

        assert_eq!(output_of(source), "9\n");
    }

    #[test]
    fn test_super_call() {
        let source = r#"
            class A { method() { print "A"; } }
            class B < A { method() { super.method(); print "B"; } }
            B().method();
        "#;

        assert_eq!(output_of(source), "A\nB\n");
    }

    #[test]
    fn test_super_result_feeds_override() {
        let source = r#"
            class A { greet() { return "A"; } }
            class B < A { greet() { return super.greet() + "B"; } }
            print B().greet();
        "#;

        assert_eq!(output_of(source), "AB\n");
    }

    #[test]
    fn test_super_binds_current_this() {
        let source = r#"
            class A {
                hello() { return "A:" + this.name(); }
                name() { return "a"; }
            }
            class B < A {
                hello() { return super.hello(); }
                name() { return "b"; }
            }
            class C < B { name() { return "c"; } }
            print B().hello();
            print C().hello();
        "#;

        assert_eq!(output_of(source), "A:b\nA:c\n");
    }

    #[test]
    fn test_inherited_initializer_and_methods() {
        let source = r#"
            class A { init(n) { this.n = n; } twice() { return this.n * 2; } }
            class B < A {}
            var b = B(4);
            print b.n;
            print b.twice();
        "#;

        assert_eq!(output_of(source), "4\n8\n");
    }

    #[test]
    fn test_method_refers_to_own_class() {
        let source = r#"
            class Node {
                init(depth) { this.depth = depth; }
                child() { return Node(this.depth + 1); }
            }
            print Node(0).child().child().depth;
        "#;

        assert_eq!(output_of(source), "2\n");
    }

    #[test]
    fn test_superclass_must_be_a_class() {
        let (_, stderr) = runtime_failure("var NotClass = 1;\nclass C < NotClass {}");

        assert_eq!(stderr, "Superclass must be a class.\n[line 2]\n");
    }

    #[test]
    fn test_property_errors() {
        let (_, stderr) = runtime_failure("var n = 1; print n.x;");
        assert_eq!(stderr, "Only instances have properties.\n[line 1]\n");

        let (_, stderr) = runtime_failure("var n = 1; n.x = 2;");
        assert_eq!(stderr, "Only instances have fields.\n[line 1]\n");

        let (_, stderr) = runtime_failure("class E {} print E().missing;");
        assert_eq!(stderr, "Undefined property 'missing'.\n[line 1]\n");
    }

    #[test]
    fn test_super_method_missing() {
        let (_, stderr) = runtime_failure(
            "class A {}\nclass B < A { m() { return super.nope(); } }\nB().m();",
        );

        assert_eq!(stderr, "Undefined property 'nope'.\n[line 2]\n");
    }

    // ── runtime errors ───────────────────────────────────────────────────

    #[test]
    fn test_runtime_error_keeps_earlier_output() {
        let (stdout, stderr) = runtime_failure("print 1;\nprint -\"x\";\nprint 2;");

        assert_eq!(stdout, "1\n");
        assert_eq!(stderr, "Operand must be a number.\n[line 2]\n");
    }

    #[test]
    fn test_operand_type_errors() {
        let (_, stderr) = runtime_failure("print 1 + \"a\";");
        assert_eq!(stderr, "Operands must be two numbers or two strings.\n[line 1]\n");

        let (_, stderr) = runtime_failure("print \"a\" < 1;");
        assert_eq!(stderr, "Operands must be numbers.\n[line 1]\n");
    }

    #[test]
    fn test_error_inside_call_restores_frame() {
        // After the failure the session can still run top-level code.
        let mut harness = run("var a = \"outer\";\nfun f() { var a = \"inner\"; return nil + 1; }\nf();");
        assert!(harness.lox.had_runtime_error());

        harness.out.clear();
        harness.run("print a;");

        assert_eq!(harness.stdout(), "outer\n");
    }

    // ── library-level pipeline ───────────────────────────────────────────

    #[test]
    fn test_fresh_interpreters_give_identical_output() {
        let source = r#"
            class Greeter { init(who) { this.who = who; } greet() { print "hi " + this.who; } }
            fun twice(f) { f(); f(); }
            twice(Greeter("lox").greet);
        "#;

        let (tokens, lex_errors) = scan_tokens(source);
        assert!(lex_errors.is_empty());

        let mut parser = Parser::new(&tokens);
        let statements = parser.parse();
        assert!(!parser.had_error());

        let outputs: Vec<String> = (0..2)
            .map(|_| {
                let mut resolver = Resolver::new();
                resolver.resolve(&statements);
                assert!(!resolver.had_error());

                let out = SharedBuf::default();
                let mut interpreter = Interpreter::with_output(Box::new(out.clone()));
                interpreter.add_locals(resolver.into_locals());
                interpreter.interpret(&statements).expect("program runs");

                out.contents()
            })
            .collect();

        assert_eq!(outputs[0], "hi lox\nhi lox\n");
        assert_eq!(outputs[0], outputs[1]);
    }
}
