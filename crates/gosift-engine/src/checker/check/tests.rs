use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;

use super::{check_package, CheckConfig, CheckOutcome};
use crate::build::Platform;
use crate::checker::importer::{FakeCImporter, MemberKind, MemoryImporter, Package};
use crate::diagnostic::Diagnostic;
use crate::parser::{parse_file, FileSet, ParseOptions};

fn importer() -> FakeCImporter<MemoryImporter> {
    FakeCImporter::new(
        MemoryImporter::new()
            .with_package(Package::new("os", "os").with_member("Exit", MemberKind::Func))
            .with_package(
                Package::new("strings", "strings").with_member("Repeat", MemberKind::Func),
            ),
    )
}

/// Check one file, stopping after `limit` diagnostics.
fn check_limited(source: &str, limit: usize) -> (Vec<Diagnostic>, CheckOutcome) {
    let fset = FileSet::new();
    let file = fset.add_file("a.go", Arc::from(source));
    let ast = parse_file(&file, ParseOptions::default(), None).expect("source should parse");
    let files = vec![ast];
    let platform = Platform::new("linux", "amd64");
    let importer = importer();
    let mut found = Vec::new();
    let outcome = {
        let mut sink = |d: Diagnostic| {
            found.push(d);
            if found.len() >= limit {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };
        let config = CheckConfig {
            dir: Path::new("."),
            platform: &platform,
            importer: &importer,
        };
        check_package(&files, &fset, config, &mut sink)
    };
    (found, outcome)
}

/// Check one file and return `line: message` for each diagnostic.
fn errors(source: &str) -> Vec<String> {
    let (found, _) = check_limited(source, usize::MAX);
    found
        .iter()
        .map(|d| {
            let line = d.position.as_ref().map_or(0, |p| p.line);
            format!("{line}: {}", d.message)
        })
        .collect()
}

#[test]
fn test_clean_package() {
    let src = r#"package p

import "strings"

type T struct{ a, b int }

func (t *T) Sum() int { return t.a + t.b }

func total(xs []int) (n int) {
	for _, x := range xs {
		n += x
	}
	return
}

func use() string {
	t := &T{1, 2}
	m := map[string]int{"a": 1}
	if v, ok := m["a"]; ok {
		return strings.Repeat("x", v+t.Sum())
	}
	return ""
}
"#;
    assert_eq!(errors(src), Vec::<String>::new());
}

#[test]
fn test_undefined_and_unused() {
    let src = "package p

func f() {
	x := 1
	y = 2
}
";
    assert_eq!(errors(src), vec!["5: undefined: y", "4: declared and not used: x"]);
}

#[test]
fn test_mismatched_comparison() {
    let src = "package p

func f(a int, b string) bool {
	return a == b
}
";
    assert_eq!(
        errors(src),
        vec!["4: invalid operation: a == b (mismatched types int and string)"]
    );
}

#[test]
fn test_constant_overflow() {
    let src = "package p

var _ = int8(100) * 2
";
    let errs = errors(src);
    assert_eq!(errs.len(), 1, "{errs:?}");
    assert!(errs[0].starts_with("3: int8(100) * 2"), "{errs:?}");
    assert!(errs[0].ends_with("overflows int8"), "{errs:?}");
}

#[test]
fn test_division_by_zero() {
    let src = "package p

var _ = 1 / 0
";
    assert_eq!(errors(src), vec!["3: invalid operation: division by zero"]);
}

#[test]
fn test_missing_return() {
    let src = "package p

func f(x int) int {
	if x > 0 {
		return 1
	}
}

func g(x int) int {
	for {
	}
}

func h() int {
	panic(\"no\")
}
";
    assert_eq!(errors(src), vec!["7: missing return"]);
}

#[test]
fn test_branch_statements() {
    let src = "package p

func f(x int) {
	break
	for {
		continue
	}
	switch x {
	case 1:
		fallthrough
	case 2:
		fallthrough
	}
}
";
    assert_eq!(
        errors(src),
        vec![
            "4: break is not in a loop, switch, or select",
            "12: cannot fallthrough final case in switch",
        ]
    );
}

#[test]
fn test_labels() {
    let src = "package p

func f() {
L:
	for {
	}
	goto M
}
";
    assert_eq!(
        errors(src),
        vec!["7: label M not declared", "4: label L declared and not used"]
    );
}

#[test]
fn test_invalid_break_label() {
    let src = "package p

func f() {
L:
	if true {
		break L
	}
}
";
    assert_eq!(
        errors(src),
        vec!["6: invalid break label L", "4: label L declared and not used"]
    );
}

#[test]
fn test_unused_imports() {
    let src = r#"package p

import (
	"os"
	str "strings"
)
"#;
    assert_eq!(
        errors(src),
        vec![
            "4: \"os\" imported and not used",
            "5: \"strings\" imported as str and not used",
        ]
    );
}

#[test]
fn test_imported_member_errors() {
    let src = r#"package p

import "strings"

var _ = strings.repeat
var _ = strings.Missing
"#;
    assert_eq!(
        errors(src),
        vec![
            "5: name repeat not exported by package strings",
            "6: undefined: strings.Missing",
        ]
    );
}

#[test]
fn test_call_arity() {
    let src = "package p

func g(a, b int) {}

func f() {
	g(1)
	g(1, 2, 3)
}
";
    assert_eq!(
        errors(src),
        vec![
            "6: not enough arguments in call to g",
            "7: too many arguments in call to g",
        ]
    );
}

#[test]
fn test_unused_expression() {
    let src = "package p

func f(x int) {
	x + 1
	len(\"abc\")
}
";
    let errs = errors(src);
    assert_eq!(errs.len(), 2, "{errs:?}");
    assert!(
        errs[0].starts_with("4: x + 1 (value of type int)") && errs[0].ends_with("is not used")
    );
    assert!(errs[1].starts_with("5: len(\"abc\")") && errs[1].ends_with("is not used"));
}

#[test]
fn test_type_switch_unused_binding() {
    let src = "package p

func f(x interface{}) {
	switch y := x.(type) {
	case int:
	}
}
";
    assert_eq!(errors(src), vec!["4: y declared and not used"]);
}

#[test]
fn test_duplicate_switch_case() {
    let src = "package p

func f(x int) {
	switch x {
	case 1, 1:
	}
}
";
    let errs = errors(src);
    assert_eq!(errs.len(), 1, "{errs:?}");
    assert!(errs[0].starts_with("5: duplicate case 1"), "{errs:?}");
}

#[test]
fn test_assignment_type_error() {
    let src = "package p

var s string = 1
";
    let errs = errors(src);
    assert_eq!(errs.len(), 1, "{errs:?}");
    assert!(errs[0].contains("as string value in variable declaration"), "{errs:?}");
}

#[test]
fn test_cgo_is_permissive() {
    let src = r#"package p

import "C"

func f() int {
	n := C.count(C.int(3))
	return int(n) + C.LIMIT
}
"#;
    assert_eq!(errors(src), Vec::<String>::new());
}

#[test]
fn test_sink_stops_the_check() {
    let src = "package p

func f() {
	a := 1
	b := 2
	c := 3
}
";
    let (found, outcome) = check_limited(src, 1);
    assert_eq!(found.len(), 1);
    assert!(outcome.bailout_triggered);
    assert_eq!(outcome.reported, 1);
}

#[test]
fn test_composite_literal_errors() {
    let src = "package p

type T struct{ a int }

var _ = T{b: 1}
var _ = []int{0: 1, 0: 2}
";
    assert_eq!(
        errors(src),
        vec![
            "5: unknown field b in struct literal of type T",
            "6: duplicate index 0 in array or slice literal",
        ]
    );
}

#[test]
fn test_follow_on_errors_are_dropped() {
    let src = "package p

func f() {
	x := undefinedThing
	_ = x + 1
}
";
    assert_eq!(errors(src), vec!["4: undefined: undefinedThing"]);
}

#[test]
fn test_generic_types_check_clean() {
    let src = "package p

type List[T any] struct {
	items []T
}

func (l *List[T]) Push(v T) { l.items = append(l.items, v) }

func (l *List[T]) Len() int { return len(l.items) }

func NewList[T any]() *List[T] { return &List[T]{} }

type Pair[K comparable, V any] struct {
	Key K
	Val V
}

type Node[T any] struct {
	v    T
	next *Node[T]
}

func use() int {
	l := NewList[int]()
	l.Push(1)
	var m List[string]
	m.Push(\"a\")
	p := Pair[string, int]{Key: \"a\", Val: 1}
	n := &Node[int]{v: 1}
	n.next = &Node[int]{v: 2}
	return l.Len() + m.Len() + p.Val + n.next.v
}
";
    assert_eq!(errors(src), Vec::<String>::new());
}

#[test]
fn test_type_argument_errors() {
    let src = "package p

type List[T any] struct{ items []T }

type Plain int

var _ List[int, string]
var _ List
var _ Plain[int]
var _ List[int]
";
    assert_eq!(
        errors(src),
        vec![
            "7: too many type arguments for type List: have 2, want 1",
            "8: cannot use generic type List without instantiation",
            "9: Plain is not a generic type",
        ]
    );
}
