mod common;

use std::path::Path;

use builder::encode_module;
use common::*;
use tokens::encode_stream;

fn config_in(dir: &Path) -> BuildConfig {
    BuildConfig {
        base_dir: dir.to_path_buf(),
        library_dir: dir.join("lib"),
        ..BuildConfig::default()
    }
}

/// `Utils.Helper.Twice(int)` compiled as a library module.
fn helper_module() -> Module {
    let output = StreamBuilder::new(HeaderKind::Library)
        .token(Token::Namespace("Utils".to_string()))
        .token(Token::NewLine)
        .class("Helper", ClassKind::Static)
        .begin()
        .function("Twice", "int", FuncKind::Static)
        .var("n", "int")
        .begin()
        .token(Token::Return)
        .token(lit("n"))
        .op(OperatorKind::Mul)
        .int(2)
        .semi()
        .end()
        .end()
        .build();
    assert_clean(&output);
    output.module
}

fn write_library(dir: &Path, name: &str, stream: &TokenStream) {
    let lib = dir.join("lib");
    std::fs::create_dir_all(&lib).expect("create lib dir");
    let bytes = encode_stream(stream).expect("encode library");
    std::fs::write(lib.join(format!("{name}.tokens")), bytes).expect("write library");
}

#[test]
fn included_module_types_are_callable() {
    let dir = scratch_dir("include");
    let bytes = encode_module(&helper_module()).expect("encode module");
    std::fs::write(dir.join("helper.tbm"), bytes).expect("write module");

    let output = script()
        .token(Token::Include("helper.tbm".to_string()))
        .token(Token::NewLine)
        .using("Utils")
        .path("Helper.Twice")
        .open()
        .int(4)
        .close()
        .semi()
        .build_with(config_in(&dir));

    assert_clean(&output);
    assert_eq!(
        opcodes(script_main(&output)),
        vec![OpCode::LdcI4, OpCode::Call, OpCode::Pop, OpCode::Ret]
    );
    let helper = output.module.symbols.lookup("Utils.Helper").expect("Helper");
    assert_eq!(
        output.module.symbols.get(helper).origin,
        builder::symbols::Origin::Included
    );
    assert!(output.module.type_named("Utils.Helper").is_none());
}

#[test]
fn include_failures_are_classified() {
    let dir = scratch_dir("include-failures");
    std::fs::write(dir.join("broken.tbm"), b"not a module").expect("write");
    let long = format!("{}.tbm", "a".repeat(300));

    let output = script()
        .token(Token::Include(String::new()))
        .token(Token::Include("bad name.tbm".to_string()))
        .token(Token::Include(long))
        .token(Token::Include("helper".to_string()))
        .token(Token::Include("missing.tbm".to_string()))
        .token(Token::Include("broken.tbm".to_string()))
        .build_with(config_in(&dir));

    assert_eq!(
        kinds(&output),
        vec![
            DiagnosticKind::Include(IncludeFailure::BadName),
            DiagnosticKind::Include(IncludeFailure::BadName),
            DiagnosticKind::Include(IncludeFailure::PathTooLong),
            DiagnosticKind::Include(IncludeFailure::NotFound),
            DiagnosticKind::Include(IncludeFailure::NotFound),
            DiagnosticKind::Include(IncludeFailure::BadFormat),
        ]
    );
}

#[test]
fn including_the_same_module_twice_fails_to_load() {
    let dir = scratch_dir("include-twice");
    let bytes = encode_module(&helper_module()).expect("encode module");
    std::fs::write(dir.join("helper.tbm"), bytes).expect("write module");

    let output = script()
        .token(Token::Include("helper.tbm".to_string()))
        .token(Token::Include("helper.tbm".to_string()))
        .build_with(config_in(&dir));

    assert_eq!(
        kinds(&output),
        vec![DiagnosticKind::Include(IncludeFailure::LoadFailure)]
    );
}

#[test]
fn library_tokens_are_spliced_once() {
    let dir = scratch_dir("library");
    let library = StreamBuilder::new(HeaderKind::TokensLibrary)
        .directive("const")
        .token(lit("answer"))
        .int(42)
        .token(Token::NewLine)
        .finish();
    write_library(&dir, "answers", &library);

    let output = script()
        .token(Token::ImportLibrary("<answers>".to_string()))
        .token(Token::ImportLibrary("<answers>".to_string()))
        .token(Token::NewLine)
        .token(lit("answer"))
        .semi()
        .build_with(config_in(&dir));

    assert_clean(&output);
    let body = script_main(&output);
    assert_eq!(body.code[0].operand, Operand::I4(42));
    assert_eq!(
        opcodes(body),
        vec![OpCode::LdcI4, OpCode::Pop, OpCode::Ret]
    );
}

#[test]
fn library_next_to_the_source_is_found_by_path() {
    let dir = scratch_dir("library-local");
    let library = StreamBuilder::new(HeaderKind::TokensLibrary)
        .using("System")
        .finish();
    let bytes = encode_stream(&library).expect("encode library");
    std::fs::write(dir.join("prelude.tokens"), bytes).expect("write library");

    let output = script()
        .token(Token::ImportLibrary("prelude".to_string()))
        .token(Token::NewLine)
        .path("Math.Abs")
        .open()
        .int(1)
        .close()
        .semi()
        .build_with(config_in(&dir));

    assert_clean(&output);
}

#[test]
fn library_failures_are_tokens_library_errors() {
    let dir = scratch_dir("library-failures");
    let wrong_header = StreamBuilder::new(HeaderKind::Script).finish();
    write_library(&dir, "script", &wrong_header);
    std::fs::create_dir_all(dir.join("lib")).expect("create lib dir");
    std::fs::write(dir.join("lib").join("garbage.tokens"), b"xx").expect("write");

    let output = script()
        .token(Token::ImportLibrary("<script>".to_string()))
        .token(Token::ImportLibrary("<garbage>".to_string()))
        .token(Token::ImportLibrary("<absent>".to_string()))
        .build_with(config_in(&dir));

    assert_eq!(kinds(&output), vec![DiagnosticKind::TokensLibrary; 3]);
}
