mod common;

#[cfg(test)]
mod builtin_tests {
    use super::common::{output, run_error};
    use rox::builtins::VERSION;
    use rox::error::ErrorKind;

    #[test]
    fn test_system_object() {
        assert_eq!(output("system.print();"), "\n");
        assert_eq!(output("system.print(\"a\", 1, nil, true);"), "a1niltrue\n");
        assert_eq!(output("system.print(system.version());"), format!("{}\n", VERSION));
        assert_eq!(output("system.print(typeof system.time());"), "Number\n");
        assert_eq!(
            output("system.print(system.time(true) > 1000000000000);"),
            "true\n"
        );

        let logged = output("system.log(\"hello\");");
        assert!(logged.ends_with(": hello\n"), "log line: {:?}", logged);
        assert_eq!(logged.len(), "YYYY-MM-DD HH:MM:SS.mmm: hello\n".len());
    }

    #[test]
    fn test_native_arity_mismatch_names_both_counts() {
        let err = run_error("system.version(1);");

        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert_eq!(err.message(), Some("Expected 0 arguments but got 1."));

        assert_eq!(
            run_error("system.time(1, 2);").message(),
            Some("Expected 0 or 1 arguments but got 2.")
        );
    }

    #[test]
    fn test_number_methods() {
        assert_eq!(
            output("system.print((-2.5).abs(), \" \", 2.1.ceil(), \" \", 2.9.floor(), \" \", 2.5.round(), \" \", (-2.5).round());"),
            "2.5 3 2 3 -3\n"
        );
        assert_eq!(output("system.print(12.toString() + \"!\");"), "12!\n");
        assert_eq!(output("system.print(nil.toString(), true.toString());"), "niltrue\n");
    }

    #[test]
    fn test_string_methods() {
        let printed = output(
            "var s = \"  Hello World  \".trim();
             system.print(s.length(), \" \", s.get(0), \" \", s.get(-1), \" \", s.get(99));
             system.print(s.reverse());
             system.print(s.replace(\"o\", \"0\"));
             system.print(s.explode());
             system.print(\"a,b,,c\".explode(\",\").count());",
        );

        assert_eq!(
            printed,
            "11 H d nil\ndlroW olleH\nHell0 W0rld\n[Hello, World]\n4\n"
        );
    }

    #[test]
    fn test_regex_methods() {
        let printed = output(
            "system.print(\"id-42 id-7\".match(\"id-([0-9]+)\"));
             system.print(\"id-42 id-7\".matchAll(\"[0-9]+\"));
             system.print(\"none\".match(\"[0-9]\").count());",
        );

        assert_eq!(printed, "[id-42, 42]\n[42, 7]\n0\n");

        assert_eq!(run_error("\"x\".match(\"(\");").kind(), ErrorKind::Runtime);
    }

    #[test]
    fn test_array_methods() {
        let printed = output(
            "var a = [3, 1, 2];
             system.print(a.count(), \" \", a.first(), \" \", a.last(), \" \", a.get(-2));
             system.print(a.max(), \" \", a.min(), \" \", [].max());
             system.print(a.map(fun (v) { return v * 10; }));
             system.print(a.filter(fun (v, i) { return i != 1; }));
             system.print([0, 1, nil, \"x\", false].filter());
             system.print(a.reverse(), \" \", a);
             system.print(a.implode(\"-\"), \" \", a.implode());
             system.print([1, 2, 3, 4, 5].slice(1, 2), \" \", [1, 2, 3, 4, 5].slice(-2), \" \", [1, 2, 3, 4, 5].slice(1, -1));",
        );

        assert_eq!(
            printed,
            "3 3 2 1\n3 1 nil\n[30, 10, 20]\n[3, 2]\n[0, 1, x]\n[2, 1, 3] [3, 1, 2]\n3-1-2 312\n[2, 3] [4, 5] [2, 3, 4]\n"
        );
    }

    #[test]
    fn test_array_mutation() {
        let printed = output(
            "var a = [];
             system.print(a.push(1), \" \", a.push(2), \" \", a.unshift(0));
             system.print(a);
             system.print(a.pop(), \" \", a.shift(), \" \", a);
             var seen = [];
             [\"x\", \"y\"].each(fun (v, i) { seen.push(i.toString() + v); });
             system.print(seen, \" \", [].pop(), \" \", [].shift());",
        );

        assert_eq!(
            printed,
            "1 2 3\n[0, 1, 2]\n2 0 [1]\n[0x, 1y] nil nil\n"
        );
    }

    #[test]
    fn test_builtin_errors() {
        assert_eq!(
            run_error("1.nope();").message(),
            Some("Undefined property 'nope'.")
        );
        assert_eq!(
            run_error("[1, \"a\"].max();").message(),
            Some("Array elements must be numbers.")
        );
        assert_eq!(
            run_error("[1].map(2);").message(),
            Some("Expected a function argument.")
        );
        assert_eq!(
            run_error("[1].get(\"x\");").message(),
            Some("Index must be a number.")
        );
    }

    #[test]
    fn test_explode_with_empty_separator_splits_on_spaces() {
        assert_eq!(output("system.print(\"a b\".explode(\"\"));"), "[a, b]\n");
    }

    #[test]
    fn test_slice_with_huge_bounds_clamps() {
        let printed = output(
            "system.print([1, 2].slice(1, 99999999999999999999999));
             system.print([1, 2, 3].slice(-99999999999999999999999, -99999999999999999999999));",
        );

        assert_eq!(printed, "[2]\n[]\n");
    }
}
