use mcdecoder_test::test::{normalize, Parser, Test};

#[test]
fn parse_flags() {
    let src = " +a\t+b  -abc-foo -foo  +bar+foo";
    let mut flags = mcdecoder_test::test::parse_flags(src);
    assert_eq!(flags.next(), Some(("a", true)));
    assert_eq!(flags.next(), Some(("b", true)));
    assert_eq!(flags.next(), Some(("abc-foo", false)));
    assert_eq!(flags.next(), Some(("foo", false)));
    assert_eq!(flags.next(), Some(("bar+foo", true)));
    assert_eq!(flags.next(), None);
}

#[test]
fn parse() -> Result<(), String> {
    let src = r#"# comment
        1000: e2 82 10 05     add_1 cond=0xe S=0x0 # +little
              ea000010        b_1 cond=0xe imm24=0x10
        2000: b5 00  push_2 M=0x1 | push_3
              fd10            unknown
    "#;

    let mut parser = Parser::new("input", src);
    let mut test = Test::default();

    assert!(parser.parse(&mut test)?);
    assert_eq!(test.line, 2);
    assert_eq!(test.address, 0x1000);
    assert_eq!(test.bytes, &[0xe2, 0x82, 0x10, 0x05]);
    assert_eq!(test.expect, "add_1 cond=0xe S=0x0");
    assert_eq!(test.comment, "+little");

    assert!(parser.parse(&mut test)?);
    assert_eq!(test.line, 3);
    assert_eq!(test.address, 0x1004);
    assert_eq!(test.bytes, &[0xea, 0x00, 0x00, 0x10]);
    assert_eq!(test.expect, "b_1 cond=0xe imm24=0x10");
    assert_eq!(test.comment, "");

    assert!(parser.parse(&mut test)?);
    assert_eq!(test.address, 0x2000);
    assert_eq!(test.bytes, &[0xb5, 0x00]);
    assert_eq!(normalize(test.expect), "push_2 M=0x1 | push_3");

    assert!(parser.parse(&mut test)?);
    assert_eq!(test.address, 0x2002);
    assert_eq!(test.bytes, &[0xfd, 0x10]);
    assert_eq!(test.expect, "unknown");

    assert!(!parser.parse(&mut test)?);
    Ok(())
}

#[test]
fn parse_errors() {
    let mut test = Test::default();
    let mut parser = Parser::new("input", "e28  add_1");
    assert!(parser.parse(&mut test).is_err());

    let mut parser = Parser::new("input", "1000:   unknown");
    let err = parser.parse(&mut test).unwrap_err();
    assert!(err.contains("input:1"), "{err}");
}

#[test]
fn parse_all() -> Result<(), String> {
    let data = Parser::parse_all("e9 2d  push_1\n  4800  push_1\n")?;
    assert_eq!(data, [0xe9, 0x2d, 0x48, 0x00]);
    Ok(())
}
