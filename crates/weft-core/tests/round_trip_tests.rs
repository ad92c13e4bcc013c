//! Rendering an unmodified tree gives back the source byte for byte

use weft_core::error::CstError;
use weft_core::parser::{parse_module, parse_module_bytes};
use weft_core::round_trip::RoundTripValidator;

const CORPUS: &[&str] = &[
    "",
    "\n",
    "pass",
    "x = 1\n",
    "x=1",
    "a = b = c\n",
    "# header comment\n\nx = 1\n",
    "# header\n\n# attached to x\nx = 1\n# footer\n",
    "x = 1  # trailing\n",
    "x = 1\r\ny = 2\r\n",
    "x = 1\ry = 2\r",
    "a; b ;c;\n",
    "f(a, b=1 , c)\n",
    "f(\n    a,  # first\n    b,\n)\n",
    "value = (  1\n  +\n  2  )\n",
    "obj.attr.method( 'x' , \"y\" )\n",
    "n = 0x1F + 1.5e3 - 2 ** 3 // 4 % 5 @ m\n",
    "def f():\n    pass\n",
    "def f(a, b = 2, ):\n    return a\n",
    "def outer():\n    def inner():\n        return 1\n    # comment in outer\n    return inner\n",
    "def f():\n\tif x:\n\t\treturn 1\n\telif y:\n\t\treturn 2\n\telse:\n\t\treturn\n",
    "if a:\n  x\n\n  # same level\n\n# dedented\ny\n",
    "if a:\n    if b:\n        c\n# back at top\nd\n",
    "x = 1 \\\n    + 2\n",
    "\x0cx = 1\n",
    "def f():\n\x0c    pass\n\x0cg()\n",
    "\n\n\n# only trailing trivia\n\n",
    "def f():\n    return\n\n\n",
    "s = r'raw' + b\"bytes\" + '''tri\nple'''\n",
    "last = 1",
];

#[test]
fn test_corpus_round_trips() {
    for source in CORPUS {
        let module = parse_module(source).unwrap_or_else(|e| panic!("{source:?}: {e}"));
        assert_eq!(module.code(), *source, "round trip of {source:?}");
    }
}

#[test]
fn test_validator_over_corpus() {
    let validator = RoundTripValidator::new();
    for source in CORPUS {
        let report = validator.validate(source).unwrap();
        assert!(report.is_lossless(), "{source:?}: {:?}", report.issues());
    }
}

#[test]
fn test_sources_that_cannot_round_trip_are_rejected() {
    for source in ["x \\\n", "x = 1 \\", "f(a,\n", "if x:\n    y\n  z\n"] {
        let err = parse_module(source).expect_err(source);
        assert!(
            matches!(err, CstError::ParserSyntaxError { .. }),
            "{source:?}: {err}"
        );
    }

    let err = parse_module("x \\\n").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Syntax error at line 1, column 2: unexpected end of input after line continuation"
    );
}

#[test]
fn test_bytes_round_trip() {
    let with_bom = b"\xef\xbb\xbfx = 1\n";
    let module = parse_module_bytes(with_bom).unwrap();
    let inner = module.as_module().unwrap();
    assert_eq!(inner.encoding, "utf-8-sig");
    assert_eq!(inner.bytes(), with_bom.to_vec());

    let with_cookie = b"# -*- coding: utf-8 -*-\nname = 'caf\xc3\xa9'\n";
    let module = parse_module_bytes(with_cookie).unwrap();
    assert_eq!(module.as_module().unwrap().bytes(), with_cookie.to_vec());
}

#[test]
fn test_code_for_node() {
    let module = parse_module("x = 1\ndef f(a):\n    return a\n").unwrap();
    let inner = module.as_module().unwrap();
    let function = &module.children()[1];
    assert_eq!(
        inner.code_for_node(function),
        "def f(a):\n    return a\n"
    );
}
