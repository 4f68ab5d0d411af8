mod common;

use builder::SymbolTable;
use builder::symbols::{Origin, TypeDef};
use common::*;

#[test]
fn balanced_class_program_has_no_need_end() {
    let output = StreamBuilder::new(HeaderKind::Console)
        .using("System")
        .class("App", ClassKind::Static)
        .begin()
        .directive("entrypoint")
        .token(Token::NewLine)
        .function("Main", "", FuncKind::Static)
        .begin()
        .path("Console.WriteLine")
        .open()
        .string("hello")
        .close()
        .semi()
        .end()
        .end()
        .build();

    assert_clean(&output);
    let module = &output.module;
    assert_eq!(module.types.len(), 1);
    let entry = module.entry_point.expect("entry point");
    assert_eq!(module.symbols.type_name(entry.owner), "App");
    let body = module.method_body("App", "Main").expect("Main body");
    assert_eq!(opcodes(body), vec![OpCode::Ldstr, OpCode::Call]);
}

#[test]
fn each_unclosed_counter_reports_once() {
    let output = script()
        .token(Token::Block(true))
        .token(Token::Block(true))
        .open()
        .token(Token::Sequence(true))
        .build();

    assert_eq!(kinds(&output), vec![DiagnosticKind::NeedEnd; 3]);
    assert_eq!(
        messages(&output),
        vec![
            "Need end of 2 blocks",
            "Need end of 1 statements",
            "Need end of 1 arrays"
        ]
    );
}

#[test]
fn first_registered_namespace_wins() {
    let mut symbols = SymbolTable::with_host_library();
    let first = symbols
        .define(TypeDef::new("Shape", "Geometry", ClassKind::Default, Origin::Declared))
        .expect("first");
    let second = symbols
        .define(TypeDef::new("Shape", "Drawing", ClassKind::Default, Origin::Declared))
        .expect("second");

    let usings = vec!["Geometry".to_string(), "Drawing".to_string()];
    assert_eq!(symbols.resolve_type("Shape", &usings), Some(first));
    let reversed = vec!["Drawing".to_string(), "Geometry".to_string()];
    assert_eq!(symbols.resolve_type("Shape", &reversed), Some(second));
}

#[test]
fn discarded_call_result_is_popped_once() {
    let output = script()
        .using("System")
        .path("Math.Abs")
        .open()
        .int(-5)
        .close()
        .semi()
        .build();

    assert_clean(&output);
    let body = script_main(&output);
    assert_eq!(
        opcodes(body),
        vec![OpCode::LdcI4, OpCode::Call, OpCode::Pop, OpCode::Ret]
    );
    assert_eq!(body.code[0].operand, Operand::I4(-5));
    let Operand::Method(abs) = body.code[1].operand else {
        panic!("expected a method operand, got {:?}", body.code[1].operand);
    };
    let symbols = &output.module.symbols;
    assert_eq!(symbols.method(abs).name, "Abs");
    assert_eq!(symbols.type_name(abs.owner), "System.Math");
}

#[test]
fn unknown_local_type_then_reference() {
    let output = script().var("x", "Nope").semi().token(lit("x")).semi().build();

    assert_eq!(
        kinds(&output),
        vec![DiagnosticKind::TypeNotFound, DiagnosticKind::VarNotFound]
    );
    assert!(script_main(&output).locals.is_empty());
}

#[test]
fn try_region_hides_a_single_token_diagnostic() {
    let output = script()
        .directive("try")
        .token(Token::NewLine)
        .op(OperatorKind::Mul)
        .semi()
        .directive("endtry")
        .token(Token::NewLine)
        .build();
    assert_clean(&output);

    let output = script().op(OperatorKind::Mul).semi().build();
    assert_eq!(kinds(&output), vec![DiagnosticKind::InvalidOperator]);
    assert_eq!(output.diagnostics[0].line, 1);
}

#[test]
fn implements_outside_class_header() {
    let output = script()
        .directive("implements")
        .path("System.IDisposable")
        .token(Token::NewLine)
        .build();

    assert_eq!(kinds(&output), vec![DiagnosticKind::InvalidHeader]);
    let program = output.module.type_named("Program").expect("Program");
    assert!(output.module.type_def(program).interfaces.is_empty());
}

#[test]
fn implements_under_class_header_records_interfaces() {
    let output = StreamBuilder::new(HeaderKind::Class)
        .directive("implements")
        .path("System.IDisposable")
        .token(Token::NewLine)
        .function("Dispose", "", FuncKind::Default)
        .begin()
        .end()
        .build();

    assert_clean(&output);
    let program = output.module.type_named("Program").expect("Program");
    let def = output.module.type_def(program);
    assert_eq!(def.interfaces.len(), 1);
    assert_eq!(
        output.module.symbols.type_name(def.interfaces[0]),
        "System.IDisposable"
    );
}

#[test]
fn local_initializer_and_compound_assignment() {
    let output = script()
        .var("x", "int")
        .op(OperatorKind::Assign)
        .int(2)
        .op(OperatorKind::Mul)
        .int(3)
        .semi()
        .token(lit("x"))
        .op(OperatorKind::AddAssign)
        .int(1)
        .semi()
        .build();

    assert_clean(&output);
    let body = script_main(&output);
    assert_eq!(
        opcodes(body),
        vec![
            OpCode::LdcI4,
            OpCode::LdcI4,
            OpCode::Mul,
            OpCode::Stloc,
            OpCode::Ldloc,
            OpCode::LdcI4,
            OpCode::Add,
            OpCode::Stloc,
            OpCode::Ret,
        ]
    );
    assert_eq!(body.locals.len(), 1);
}

#[test]
fn final_local_accepts_one_store() {
    let output = script()
        .final_var("limit", "int")
        .op(OperatorKind::Assign)
        .int(1)
        .semi()
        .token(lit("limit"))
        .op(OperatorKind::Assign)
        .int(2)
        .semi()
        .build();

    assert_eq!(kinds(&output), vec![DiagnosticKind::InvalidOperator]);
    assert_eq!(output.diagnostics[0].line, 2);
}

#[test]
fn operator_after_call_reuses_its_result() {
    let output = script()
        .using("System")
        .path("Math.Abs")
        .open()
        .int(-5)
        .close()
        .op(OperatorKind::Add)
        .int(1)
        .semi()
        .build();

    assert_clean(&output);
    assert_eq!(
        opcodes(script_main(&output)),
        vec![
            OpCode::LdcI4,
            OpCode::Call,
            OpCode::LdcI4,
            OpCode::Add,
            OpCode::Pop,
            OpCode::Ret,
        ]
    );
}

#[test]
fn string_concatenation_calls_concat() {
    let output = script()
        .var("s", "string")
        .op(OperatorKind::Assign)
        .string("a")
        .op(OperatorKind::Add)
        .string("b")
        .semi()
        .build();

    assert_clean(&output);
    let body = script_main(&output);
    let Operand::Method(concat) = body.code[2].operand else {
        panic!("expected Concat call, got {}", body.code[2]);
    };
    assert_eq!(output.module.symbols.method(concat).name, "Concat");
    assert_eq!(body.code[3].opcode, OpCode::Stloc);
}

#[test]
fn invalid_operator_on_object_is_recovered() {
    let output = script()
        .var("o", "object")
        .semi()
        .token(lit("o"))
        .op(OperatorKind::Sub)
        .int(1)
        .semi()
        .token(lit("o"))
        .semi()
        .build();

    assert_eq!(kinds(&output), vec![DiagnosticKind::InvalidOperator]);
}

#[test]
fn negative_operand_after_binary_operator() {
    let output = script()
        .var("x", "int")
        .op(OperatorKind::Assign)
        .int(4)
        .op(OperatorKind::Mul)
        .op(OperatorKind::Sub)
        .int(2)
        .semi()
        .build();

    assert_clean(&output);
    assert_eq!(
        opcodes(script_main(&output)),
        vec![
            OpCode::LdcI4,
            OpCode::LdcI4,
            OpCode::Neg,
            OpCode::Mul,
            OpCode::Stloc,
            OpCode::Ret,
        ]
    );
}

#[test]
fn sequence_literal_builds_an_array() {
    let output = script()
        .token(Token::Sequence(true))
        .int(1)
        .comma()
        .int(2)
        .token(Token::Sequence(false))
        .semi()
        .build();

    assert_clean(&output);
    let body = script_main(&output);
    assert_eq!(
        opcodes(body),
        vec![
            OpCode::LdcI4,
            OpCode::Newarr,
            OpCode::Dup,
            OpCode::LdcI4,
            OpCode::LdcI4,
            OpCode::Stelem,
            OpCode::Dup,
            OpCode::LdcI4,
            OpCode::LdcI4,
            OpCode::Stelem,
            OpCode::Pop,
            OpCode::Ret,
        ]
    );
    assert_eq!(body.code[0].operand, Operand::I4(2));
    let int = output.module.symbols.well_known().int32;
    assert_eq!(body.code[1].operand, Operand::Type(int));
}

#[test]
fn breakpoint_needs_end_of_expression() {
    let output = script()
        .token(Token::Breakpoint)
        .token(Token::NewLine)
        .semi()
        .build();
    assert_clean(&output);
    assert_eq!(
        opcodes(script_main(&output)),
        vec![OpCode::Break, OpCode::Ret]
    );

    let output = script().token(Token::Breakpoint).int(1).semi().build();
    assert_eq!(kinds(&output), vec![DiagnosticKind::NeedEnd]);
}

#[test]
fn goto_resolves_labels() {
    let output = script()
        .token(Token::Goto("done".to_string()))
        .semi()
        .token(Token::Label("done".to_string()))
        .token(Token::NewLine)
        .build();

    assert_clean(&output);
    let body = script_main(&output);
    assert_eq!(body.code[0].opcode, OpCode::Br);
    assert_eq!(body.code[0].operand, Operand::Target(1));

    let output = script()
        .token(Token::Goto("nowhere".to_string()))
        .semi()
        .build();
    assert_eq!(kinds(&output), vec![DiagnosticKind::InvalidToken]);
}

#[test]
fn constants_load_their_value() {
    let output = script()
        .directive("const")
        .token(lit("answer"))
        .int(42)
        .token(Token::NewLine)
        .var("x", "int")
        .op(OperatorKind::Assign)
        .token(lit("answer"))
        .semi()
        .build();

    assert_clean(&output);
    let body = script_main(&output);
    assert_eq!(body.code[0].operand, Operand::I4(42));
    assert_eq!(body.code[1].opcode, OpCode::Stloc);
}

#[test]
fn script_functions_are_called_by_name() {
    let output = script()
        .function("Twice", "int", FuncKind::Default)
        .var("n", "int")
        .begin()
        .token(Token::Return)
        .token(lit("n"))
        .op(OperatorKind::Mul)
        .int(2)
        .semi()
        .end()
        .token(lit("Twice"))
        .open()
        .int(4)
        .close()
        .semi()
        .build();

    assert_clean(&output);
    let twice = output
        .module
        .method_body("Program", "Twice")
        .expect("Twice body");
    assert_eq!(
        opcodes(twice),
        vec![OpCode::Ldarg, OpCode::LdcI4, OpCode::Mul, OpCode::Ret]
    );
    assert_eq!(
        opcodes(script_main(&output)),
        vec![OpCode::LdcI4, OpCode::Call, OpCode::Pop, OpCode::Ret]
    );
}

#[test]
fn unknown_directive_is_reported() {
    let output = script().directive("pragma").token(Token::NewLine).build();
    assert_eq!(kinds(&output), vec![DiagnosticKind::DirectiveNotFound]);
}

#[test]
fn persisting_depends_on_header() {
    assert!(StreamBuilder::new(HeaderKind::Library).build().persist);
    assert!(!StreamBuilder::new(HeaderKind::BuildScript).build().persist);
    assert!(!StreamBuilder::new(HeaderKind::TokensLibrary).build().persist);
}

#[test]
fn instance_receiver_precedes_arguments() {
    let output = script()
        .var("s", "string")
        .op(OperatorKind::Assign)
        .string("a")
        .semi()
        .path("s.Contains")
        .open()
        .string("b")
        .close()
        .semi()
        .build();

    assert_clean(&output);
    assert_eq!(
        opcodes(script_main(&output)),
        vec![
            OpCode::Ldstr,
            OpCode::Stloc,
            OpCode::Ldloc,
            OpCode::Ldstr,
            OpCode::Call,
            OpCode::Pop,
            OpCode::Ret,
        ]
    );
}

#[test]
fn static_method_through_an_instance_leaves_no_code() {
    let output = script()
        .var("s", "string")
        .semi()
        .path("s.Concat")
        .open()
        .string("a")
        .comma()
        .string("b")
        .close()
        .semi()
        .path("s.Missing")
        .open()
        .close()
        .semi()
        .build();

    assert_eq!(
        kinds(&output),
        vec![DiagnosticKind::VarNotFound, DiagnosticKind::VarNotFound]
    );
    assert_eq!(opcodes(script_main(&output)), vec![OpCode::Ret]);
}

#[test]
fn mismatched_close_keeps_counters_in_step() {
    let output = script()
        .open()
        .token(Token::Sequence(true))
        .close()
        .token(Token::Sequence(false))
        .close()
        .semi()
        .build();
    assert_eq!(kinds(&output), vec![DiagnosticKind::InvalidToken]);
    assert_eq!(messages(&output), vec!["statement closed inside an array"]);

    let output = script()
        .token(Token::Sequence(true))
        .open()
        .token(Token::Sequence(false))
        .close()
        .token(Token::Sequence(false))
        .semi()
        .build();
    assert_eq!(kinds(&output), vec![DiagnosticKind::InvalidToken]);
    assert_eq!(messages(&output), vec!["array closed inside a statement"]);
}
