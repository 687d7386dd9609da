mod common;

#[cfg(test)]
mod interpreter_tests {
    use std::io::{self, Write};

    use super::common::{output, run_capture, run_error};
    use rox::error::ErrorKind;

    /// Accepts writes but fails every flush.
    struct FailingFlush;

    impl Write for FailingFlush {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"))
        }
    }

    #[test]
    fn test_arithmetic_and_division_by_zero() {
        assert_eq!(output("system.print(1 + 2 * 3);"), "7\n");
        assert_eq!(output("system.print(6 / 0);"), "0\n");
        assert_eq!(output("system.print(7 % 0);"), "0\n");
        assert_eq!(output("system.print(7 / 2, \" \", 7 % 3);"), "3.5 1\n");
        assert_eq!(output("system.print(-(2 - 5));"), "3\n");
    }

    #[test]
    fn test_truthiness() {
        let printed = output(
            "if (0) system.print(\"zero\");
             if (\"\") system.print(\"empty\");
             if (nil) system.print(\"nil\"); else system.print(\"no nil\");
             if (!false) system.print(\"not false\");",
        );

        assert_eq!(printed, "zero\nempty\nno nil\nnot false\n");
    }

    #[test]
    fn test_logical_operators() {
        let printed = output(
            "system.print(nil or \"x\");
             system.print(\"a\" or \"b\");
             system.print(nil and 1);
             system.print(1 and 2);",
        );

        assert_eq!(printed, "true\na\nnil\ntrue\n");
    }

    #[test]
    fn test_concatenation_and_equality() {
        let printed = output(
            "system.print(\"a\" + \"b\");
             system.print([1, 2] + [3]);
             system.print(1 == 1, \" \", \"1\" == 1, \" \", nil == nil, \" \", [1] == [1]);",
        );

        assert_eq!(printed, "ab\n[1, 2, 3]\ntrue false true true\n");
    }

    #[test]
    fn test_typeof() {
        let printed = output(
            "class A {}
             fun f() {}
             system.print(typeof nil, \" \", typeof true, \" \", typeof 1, \" \", typeof \"s\");
             system.print(typeof [], \" \", typeof f, \" \", typeof A, \" \", typeof A());
             system.print(typeof system, \" \", system);",
        );

        assert_eq!(
            printed,
            "Nil Boolean Number String\nArray Function Class Instance\nSystem System\n"
        );
    }

    #[test]
    fn test_block_scoping_restores_outer_binding() {
        let printed = output(
            "var a = \"outer\";
             {
               var a = \"inner\";
               system.print(a);
             }
             system.print(a);",
        );

        assert_eq!(printed, "inner\nouter\n");
    }

    #[test]
    fn test_closures_share_captured_state() {
        let printed = output(
            "fun makeCounter() {
               var count = 0;
               fun inc() { count += 1; return count; }
               fun get() { return count; }
               return [inc, get];
             }
             var pair = makeCounter();
             var inc = pair.get(0);
             inc();
             inc();
             system.print(pair.get(1)());",
        );

        assert_eq!(printed, "2\n");
    }

    #[test]
    fn test_recursion_and_loops() {
        let printed = output(
            "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }
             var total = 0;
             for (var i = 0; i < 5; i += 1) { var step = i; total += step; }
             var n = 0;
             while (n < 3) n = n + 1;
             system.print(fib(15), \" \", total, \" \", n);",
        );

        assert_eq!(printed, "610 10 3\n");
    }

    #[test]
    fn test_return_unwinds_nested_blocks() {
        let printed = output(
            "fun find() {
               var i = 0;
               while (true) {
                 { if (i == 3) return i; }
                 i += 1;
               }
             }
             system.print(find());
             var after = \"scope ok\";
             system.print(after);",
        );

        assert_eq!(printed, "3\nscope ok\n");
    }

    #[test]
    fn test_anonymous_functions_and_printing() {
        let printed = output(
            "var twice = fun (f, x) { return f(f(x)); };
             system.print(twice(fun (n) { return n * 3; }, 2));
             fun named() {}
             system.print(named, \" \", fun () {}, \" \", system.print);",
        );

        assert_eq!(printed, "18\n<function named> <fn> <native function>\n");
    }

    #[test]
    fn test_type_errors_are_runtime_errors() {
        let err = run_error("var x = 1 - \"a\";");
        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert_eq!(
            err.to_string(),
            "[line 1, column 11] Runtime error: Operands must be numbers."
        );

        assert_eq!(
            run_error("-\"a\";").message(),
            Some("Operand must be a number.")
        );
        assert_eq!(
            run_error("1 + \"a\";").message(),
            Some("Operands must be two numbers, strings or arrays.")
        );
        assert_eq!(
            run_error("\"not callable\"();").message(),
            Some("Can only call functions and classes.")
        );
        assert_eq!(
            run_error("system.print(missing);").message(),
            Some("Undefined variable 'missing'.")
        );
        assert_eq!(
            run_error("fun f(a) {} f(1, 2);").message(),
            Some("Expected 1 arguments but got 2.")
        );
    }

    #[test]
    fn test_output_before_runtime_error_is_kept() {
        let (result, printed) = run_capture("system.print(\"first\"); nil();");

        assert!(result.is_err());
        assert_eq!(printed, "first\n");
    }

    #[test]
    fn test_static_errors_prevent_execution() {
        let (result, printed) = run_capture("system.print(\"never\"); { var a = a; }");

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Compile);
        assert_eq!(printed, "");
    }

    #[test]
    fn test_null_safe_access() {
        let printed = output(
            "var a = nil;
             system.print(a?.b);
             class P {} var p = P(); p.b = 5;
             system.print(p?.b);",
        );

        assert_eq!(printed, "nil\n5\n");

        assert_eq!(
            run_error("var a = nil; a.b;").message(),
            Some("Undefined property 'b'.")
        );
    }

    #[test]
    fn test_deep_recursion_hits_call_depth_guard() {
        let handle = std::thread::Builder::new()
            .stack_size(256 * 1024 * 1024)
            .spawn(|| {
                let err = run_error("fun down(n) { return down(n + 1); } down(0);");
                (err.kind(), err.message().map(str::to_string))
            })
            .unwrap();

        let (kind, message) = handle.join().unwrap();
        assert_eq!(kind, ErrorKind::Runtime);
        assert_eq!(message.as_deref(), Some("Stack overflow."));
    }

    #[test]
    fn test_runs_are_independent() {
        assert_eq!(output("var shared = 1; system.print(shared);"), "1\n");
        assert_eq!(
            run_error("system.print(shared);").message(),
            Some("Undefined variable 'shared'.")
        );
    }

    #[test]
    fn test_self_referencing_arrays_print_and_compare() {
        let printed = output(
            "var a = []; var b = [a]; a.push(b);
             system.print(a);
             var c = []; c.push(c);
             var d = []; d.push(d);
             system.print(c == d, \" \", c == c, \" \", c == [1]);",
        );

        assert_eq!(printed, "[[[...]]]\ntrue true false\n");
    }

    #[test]
    fn test_runtime_error_wins_over_flush_failure() {
        let err = rox::run("nil();", Box::new(FailingFlush)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert_eq!(err.message(), Some("Can only call functions and classes."));

        let err = rox::run("system.print(1);", Box::new(FailingFlush)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
