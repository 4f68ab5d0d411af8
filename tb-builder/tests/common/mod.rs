#![allow(dead_code, unused_imports)]

use std::path::PathBuf;

pub use builder::{
    BuildConfig, Diagnostic, DiagnosticKind, GenerationOutput, IncludeFailure, Instruction,
    MethodBody, Module, OpCode, Operand, build,
};
pub use tokens::{
    ClassKind, FuncKind, HeaderKind, Literal, OperatorKind, SeparatorKind, Token, TokenStream,
    Visibility,
};

/// Appends tokens in source order.
pub struct StreamBuilder {
    stream: TokenStream,
}

impl StreamBuilder {
    pub fn new(header: HeaderKind) -> Self {
        Self {
            stream: TokenStream::new(header),
        }
    }

    pub fn token(mut self, token: Token) -> Self {
        self.stream.push(token);
        self
    }

    pub fn tokens(mut self, tokens: impl IntoIterator<Item = Token>) -> Self {
        for token in tokens {
            self.stream.push(token);
        }
        self
    }

    pub fn using(self, namespace: &str) -> Self {
        self.token(Token::UsingNamespace(namespace.to_string()))
            .token(Token::NewLine)
    }

    /// `A.B.C` as literals joined by member separators.
    pub fn path(mut self, path: &str) -> Self {
        for (index, segment) in path.split('.').enumerate() {
            if index > 0 {
                self.stream.push(Token::Separator(SeparatorKind::Member));
            }
            self.stream.push(lit(segment));
        }
        self
    }

    pub fn directive(self, name: &str) -> Self {
        self.token(Token::Directive).token(lit(name))
    }

    pub fn var(self, name: &str, type_name: &str) -> Self {
        self.token(Token::Var {
            name: name.to_string(),
            type_name: type_name.to_string(),
            is_final: false,
        })
    }

    pub fn final_var(self, name: &str, type_name: &str) -> Self {
        self.token(Token::Var {
            name: name.to_string(),
            type_name: type_name.to_string(),
            is_final: true,
        })
    }

    pub fn class(self, name: &str, kind: ClassKind) -> Self {
        self.token(Token::Class {
            name: name.to_string(),
            kind,
            visibility: Visibility::Public,
        })
    }

    pub fn function(self, name: &str, return_type: &str, kind: FuncKind) -> Self {
        self.token(Token::Function {
            name: name.to_string(),
            return_type: return_type.to_string(),
            kind,
            visibility: Visibility::Public,
        })
    }

    pub fn op(self, op: OperatorKind) -> Self {
        self.token(Token::Operator(op))
    }

    pub fn int(self, value: i32) -> Self {
        self.token(Token::Value(Literal::Int(value)))
    }

    pub fn string(self, value: &str) -> Self {
        self.token(Token::Value(Literal::String(value.to_string())))
    }

    pub fn open(self) -> Self {
        self.token(Token::Statement(true))
    }

    pub fn close(self) -> Self {
        self.token(Token::Statement(false))
    }

    pub fn comma(self) -> Self {
        self.token(Token::Separator(SeparatorKind::Statement))
    }

    pub fn begin(self) -> Self {
        self.token(Token::Block(true)).token(Token::NewLine)
    }

    pub fn end(self) -> Self {
        self.token(Token::Block(false)).token(Token::NewLine)
    }

    /// `;` followed by a line break.
    pub fn semi(self) -> Self {
        self.token(Token::ExpressionEnd).token(Token::NewLine)
    }

    pub fn finish(self) -> TokenStream {
        self.stream
    }

    pub fn build(self) -> GenerationOutput {
        build(self.stream, BuildConfig::default(), false)
    }

    pub fn build_with(self, config: BuildConfig) -> GenerationOutput {
        build(self.stream, config, false)
    }
}

pub fn lit(name: &str) -> Token {
    Token::Literal(name.to_string())
}

pub fn script() -> StreamBuilder {
    StreamBuilder::new(HeaderKind::Script)
}

pub fn kinds(output: &GenerationOutput) -> Vec<DiagnosticKind> {
    output.diagnostics.iter().map(|diagnostic| diagnostic.kind).collect()
}

pub fn messages(output: &GenerationOutput) -> Vec<String> {
    output
        .diagnostics
        .iter()
        .map(|diagnostic| diagnostic.message.clone())
        .collect()
}

pub fn assert_clean(output: &GenerationOutput) {
    assert!(
        output.diagnostics.is_empty(),
        "unexpected diagnostics: {:?}",
        output.diagnostics
    );
}

/// Body of `Program.Main`, the method a script's statements land in.
pub fn script_main(output: &GenerationOutput) -> &MethodBody {
    output
        .module
        .method_body("Program", "Main")
        .expect("script Main body")
}

pub fn opcodes(body: &MethodBody) -> Vec<OpCode> {
    body.code.iter().map(|instruction| instruction.opcode).collect()
}

/// Fresh scratch directory for file-based tests.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tb-builder-{}-{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}
