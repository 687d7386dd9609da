#[cfg(test)]
mod resolver_tests {
    use rox::error::{ErrorKind, LoxError};
    use rox::parser::Parser;
    use rox::resolver::Resolver;
    use rox::scanner::scan;

    fn resolve(source: &str) -> Result<(), LoxError> {
        let tokens = scan(source).expect("source should scan");
        let statements = Parser::new(&tokens).parse().expect("source should parse");
        Resolver::new().resolve_all(&statements)
    }

    fn rejected(source: &str) -> LoxError {
        let err = resolve(source).expect_err("resolver should reject");
        assert_eq!(err.kind(), ErrorKind::Compile);
        err
    }

    #[test]
    fn test_valid_programs_pass() {
        resolve(
            "var a = 1;
             fun f(x) { var y = x; { var y = 2; } return y; }
             class A { init() { this.v = 1; } get() { return this.v; } }
             class B < A { get() { return super.get(); } }
             for (var i = 0; i < 2; i = i + 1) { var t = i; }",
        )
        .expect("program should resolve");
    }

    #[test]
    fn test_duplicate_in_one_scope() {
        let err = rejected("{ var a = 1; var a = 2; }");
        assert_eq!(
            err.message(),
            Some("Already a variable with this name in this scope.")
        );
        assert_eq!((err.line(), err.column()), (Some(1), Some(18)));

        rejected("fun f(a, a) {}");
        rejected("var g; var g;");
    }

    #[test]
    fn test_self_reference_in_initializer() {
        let err = rejected("{ var a = a; }");
        assert_eq!(
            err.message(),
            Some("Can't read local variable in its own initializer.")
        );
    }

    #[test]
    fn test_return_rules() {
        assert_eq!(
            rejected("return 1;").message(),
            Some("Can't return from top-level code.")
        );
        assert_eq!(
            rejected("class A { init() { return 1; } }").message(),
            Some("Can't return a value from an initializer.")
        );
        assert!(resolve("class A { init() { return; } }").is_ok());
    }

    #[test]
    fn test_this_and_super_rules() {
        assert_eq!(
            rejected("this;").message(),
            Some("Can't use 'this' outside of a class.")
        );
        assert_eq!(
            rejected("fun f() { return this; }").message(),
            Some("Can't use 'this' outside of a class.")
        );
        assert_eq!(
            rejected("super.x;").message(),
            Some("Can't use 'super' outside of a class.")
        );
        assert_eq!(
            rejected("class A { f() { super.f(); } }").message(),
            Some("Can't use 'super' in a class with no superclass.")
        );
    }

    #[test]
    fn test_class_cannot_inherit_itself() {
        let err = rejected("class A < A {}");
        assert_eq!(err.message(), Some("A class can't inherit from itself."));
        assert_eq!(err.column(), Some(11));
    }
}
