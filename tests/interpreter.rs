mod common;

use pretty_assertions::assert_eq;

use rox::resolver::resolve;

use common::{interpreter, parse_ok, run, run_on};

fn output(source: &str) -> Vec<String> {
    let (lines, result) = run(source);
    if let Err(e) = result {
        panic!("unexpected runtime error: {}", e);
    }
    lines
}

fn runtime_error(source: &str) -> (Vec<String>, String) {
    let (lines, result) = run(source);
    match result {
        Ok(()) => panic!("expected a runtime error, got output {:?}", lines),
        Err(e) => {
            assert!(e.is_runtime());
            (lines, e.to_string())
        }
    }
}

#[test]
fn arithmetic_and_concatenation() {
    assert_eq!(
        output("print 1 + 2 * 3; print (1 + 2) * 3; print 7 / 2; print \"foo\" + \"bar\";"),
        ["7", "9", "3.5", "foobar"]
    );
}

#[test]
fn logical_operators_return_the_deciding_operand() {
    assert_eq!(
        output("print nil or \"x\"; print 0 and 1; print 1 and 2;"),
        ["x", "0", "2"]
    );
}

#[test]
fn clock_returns_seconds() {
    assert_eq!(output("print clock() > 0;"), ["true"]);
}

#[test]
fn block_shadowing() {
    assert_eq!(
        output("var a = 1; { var a = 2; print a; } print a;"),
        ["2", "1"]
    );
}

#[test]
fn closure_resolves_statically_not_dynamically() {
    let source = r#"
        var a = "global";
        {
            fun show() { print a; }
            show();
            var a = "block";
            show();
        }
    "#;

    assert_eq!(output(source), ["global", "global"]);
}

#[test]
fn separate_counters_keep_separate_state() {
    let source = r#"
        fun makeCounter() {
            var i = 0;
            fun count() { i = i + 1; return i; }
            return count;
        }
        var c1 = makeCounter();
        var c2 = makeCounter();
        print c1();
        print c1();
        print c2();
    "#;

    assert_eq!(output(source), ["1", "2", "1"]);
}

#[test]
fn division_by_zero_prints_nothing() {
    let (lines, message) = runtime_error("print 1/0;");
    assert!(lines.is_empty());
    assert_eq!(message, "Division by zero.\n[line 1]");
}

#[test]
fn output_before_a_runtime_error_stays() {
    let (lines, message) = runtime_error("print 1;\nprint -\"x\";\nprint 2;");
    assert_eq!(lines, ["1"]);
    assert_eq!(message, "Operand must be a number.\n[line 2]");
}

#[test]
fn inherited_method() {
    assert_eq!(
        output(r#"class A { greet(){ return "hi"; } } class B < A {} print B().greet();"#),
        ["hi"]
    );
}

#[test]
fn base_calls_reach_the_base_method() {
    let source = r#"
        class A {
            method() { return "A method"; }
        }
        class B < A {
            method() { return "B method"; }
            test() { return base.method(); }
        }
        class C < B {}
        print C().test();
    "#;

    assert_eq!(output(source), ["A method"]);
}

#[test]
fn initializer_sets_fields_and_returns_this() {
    let source = r#"
        class Point {
            init(x, y) { this.x = x; this.y = y; }
            sum() { return this.x + this.y; }
        }
        var p = Point(1, 2);
        print p.sum();
        print p.init(3, 4) == p;
        print p.x;
        print p;
        print Point;
    "#;

    assert_eq!(output(source), ["3", "true", "3", "Point instance", "Point"]);
}

#[test]
fn inherited_initializer_runs() {
    let source = r#"
        class A { init(v) { this.v = v; } }
        class B < A {}
        print B(7).v;
    "#;

    assert_eq!(output(source), ["7"]);
}

#[test]
fn bound_methods_remember_their_instance() {
    let source = r#"
        class Person {
            init(name) { this.name = name; }
            say() { print this.name; }
        }
        var jane = Person("Jane");
        var bill = Person("Bill");
        bill.say = jane.say;
        bill.say();
    "#;

    assert_eq!(output(source), ["Jane"]);
}

#[test]
fn for_loop_closures_see_their_own_iteration() {
    let source = r#"
        class Slots {}
        var slots = Slots();
        for (var i = 0; i < 3; i = i + 1) {
            fun show() { print i; }
            if (i == 0) slots.a = show;
            if (i == 1) slots.b = show;
            if (i == 2) slots.c = show;
        }
        slots.a();
        slots.b();
        slots.c();
    "#;

    assert_eq!(output(source), ["0", "1", "2"]);
}

#[test]
fn continue_still_runs_the_increment() {
    let source = r#"
        var seen = 0;
        for (var i = 0; i < 5; i = i + 1) {
            if (i == 2) continue;
            seen = seen + 1;
        }
        print seen;
    "#;

    assert_eq!(output(source), ["4"]);
}

#[test]
fn break_leaves_only_the_innermost_loop() {
    let source = r#"
        var i = 0;
        while (i < 2) {
            while (true) { break; }
            print i;
            i = i + 1;
        }
    "#;

    assert_eq!(output(source), ["0", "1"]);
}

#[test]
fn return_from_inside_a_loop() {
    let source = r#"
        fun first() {
            for (var i = 10; i < 20; i = i + 1) {
                if (i > 12) return i;
            }
            return nil;
        }
        print first();
    "#;

    assert_eq!(output(source), ["13"]);
}

#[test]
fn truthiness_includes_zero_and_empty_string() {
    let source = r#"
        if (0) print "zero"; else print "no zero";
        if ("") print "empty"; else print "no empty";
        if ("0") print "string zero";
        print !nil;
    "#;

    assert_eq!(
        output(source),
        ["no zero", "no empty", "string zero", "true"]
    );
}

#[test]
fn equality_semantics() {
    let source = r#"
        print nil == nil;
        print nil == false;
        print 1 == 1;
        print "a" == "a";
        fun f() {}
        print f == f;
        class A {}
        print A() == A();
    "#;

    assert_eq!(
        output(source),
        ["true", "false", "true", "true", "true", "false"]
    );
}

#[test]
fn stringify_values() {
    let source = r#"
        print 3;
        print 2.5;
        print -0.5;
        print "raw";
        print true;
        print nil;
        fun f() {}
        print f;
        print clock;
    "#;

    assert_eq!(
        output(source),
        ["3", "2.5", "-0.5", "raw", "true", "nil", "<fn f>", "<native fn>"]
    );
}

#[test]
fn call_errors() {
    assert_eq!(
        runtime_error("\"nope\"();").1,
        "Can only call functions and classes.\n[line 1]"
    );
    assert_eq!(
        runtime_error("fun f(a, b) {}\nf(1);").1,
        "Expected 2 arguments but got 1.\n[line 2]"
    );
    assert_eq!(
        runtime_error("class A { init(x) {} } A();").1,
        "Expected 1 arguments but got 0.\n[line 1]"
    );
}

#[test]
fn property_errors() {
    assert_eq!(
        runtime_error("var x = 1; print x.y;").1,
        "Only instances have properties.\n[line 1]"
    );
    assert_eq!(
        runtime_error("var x = 1; x.y = 2;").1,
        "Only instances have fields.\n[line 1]"
    );
    assert_eq!(
        runtime_error("class A {} print A().missing;").1,
        "Undefined property 'missing'.\n[line 1]"
    );
}

#[test]
fn base_class_must_be_a_class() {
    assert_eq!(
        runtime_error("var NotAClass = 1; class B < NotAClass {}").1,
        "Base class must be a class.\n[line 1]"
    );
}

#[test]
fn undefined_variable() {
    assert_eq!(
        runtime_error("print nope;").1,
        "Undefined variable 'nope'.\n[line 1]"
    );
    assert_eq!(
        runtime_error("nope = 1;").1,
        "Undefined variable 'nope'.\n[line 1]"
    );
}

#[test]
fn operand_type_errors() {
    assert_eq!(
        runtime_error("print 1 < \"2\";").1,
        "Operands must be numbers.\n[line 1]"
    );
    assert_eq!(
        runtime_error("print \"a\" + 1;").1,
        "Operands must be two numbers or two strings.\n[line 1]"
    );
}

#[test]
fn units_share_globals_across_runs() {
    let (mut interp, out) = interpreter();

    run_on(&mut interp, "var count = 0; fun bump() { count = count + 1; }").unwrap();
    run_on(&mut interp, "bump(); bump();").unwrap();
    assert!(run_on(&mut interp, "print count / 0;").is_err());
    run_on(&mut interp, "{ var local = count; print local; }").unwrap();

    assert_eq!(out.lines(), ["2"]);
}

#[test]
fn interpreting_the_same_program_twice_prints_the_same() {
    let stmts = parse_ok(
        "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(10);",
    );

    let (locals, errors) = resolve(&stmts);
    assert!(errors.is_empty());

    let (mut first, first_out) = interpreter();
    first.resolve(locals.clone());
    first.interpret(&stmts).unwrap();

    let (mut second, second_out) = interpreter();
    second.resolve(locals);
    second.interpret(&stmts).unwrap();

    assert_eq!(first_out.lines(), ["55"]);
    assert_eq!(first_out.lines(), second_out.lines());
}
