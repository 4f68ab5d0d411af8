//! Token model shared by the lexer output, token libraries, and the builder.
//!
//! Every token carries its own payload, so a consumer can never read a value
//! that was not produced for the token it is looking at.

use std::collections::VecDeque;
use std::fmt;

pub mod wire;

pub use wire::{Cursor, WireError, decode_stream, encode_stream};

/// Build-wide classification stored in the token file header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HeaderKind {
    Library = 0,
    #[default]
    Console = 1,
    Gui = 2,
    Class = 3,
    Script = 4,
    TokensLibrary = 5,
    BuildScript = 6,
}

impl HeaderKind {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Library),
            1 => Some(Self::Console),
            2 => Some(Self::Gui),
            3 => Some(Self::Class),
            4 => Some(Self::Script),
            5 => Some(Self::TokensLibrary),
            6 => Some(Self::BuildScript),
            _ => None,
        }
    }

    /// Headers where the whole file describes one implicit class.
    pub fn is_class_like(self) -> bool {
        matches!(self, Self::Class)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Library => "library",
            Self::Console => "console",
            Self::Gui => "gui",
            Self::Class => "class",
            Self::Script => "script",
            Self::TokensLibrary => "tokens-library",
            Self::BuildScript => "build-script",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "library" => Some(Self::Library),
            "console" => Some(Self::Console),
            "gui" => Some(Self::Gui),
            "class" => Some(Self::Class),
            "script" => Some(Self::Script),
            "tokens-library" => Some(Self::TokensLibrary),
            "build-script" => Some(Self::BuildScript),
            _ => None,
        }
    }
}

impl fmt::Display for HeaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ClassKind {
    #[default]
    Default = 0,
    Static = 1,
    Interface = 2,
    Struct = 3,
    Abstract = 4,
    Sealed = 5,
    Enum = 6,
}

impl ClassKind {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Default),
            1 => Some(Self::Static),
            2 => Some(Self::Interface),
            3 => Some(Self::Struct),
            4 => Some(Self::Abstract),
            5 => Some(Self::Sealed),
            6 => Some(Self::Enum),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Visibility {
    #[default]
    Public = 0,
    Private = 1,
    Protected = 2,
    Internal = 3,
}

impl Visibility {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Public),
            1 => Some(Self::Private),
            2 => Some(Self::Protected),
            3 => Some(Self::Internal),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FuncKind {
    #[default]
    Default = 0,
    Static = 1,
    Virtual = 2,
    Abstract = 3,
    Override = 4,
    Constructor = 5,
}

impl FuncKind {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Default),
            1 => Some(Self::Static),
            2 => Some(Self::Virtual),
            3 => Some(Self::Abstract),
            4 => Some(Self::Override),
            5 => Some(Self::Constructor),
            _ => None,
        }
    }

    pub fn is_virtual(self) -> bool {
        matches!(self, Self::Virtual | Self::Abstract | Self::Override)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperatorKind {
    Add = 0,
    Sub = 1,
    Mul = 2,
    Div = 3,
    Mod = 4,
    Eq = 5,
    NotEq = 6,
    Not = 7,
    And = 8,
    Or = 9,
    Xor = 10,
    Gt = 11,
    Lt = 12,
    GtEq = 13,
    LtEq = 14,
    Assign = 15,
    AddAssign = 16,
    SubAssign = 17,
    MulAssign = 18,
    DivAssign = 19,
    ModAssign = 20,
    ConvertTo = 21,
    Inc = 22,
    Dec = 23,
    In = 24,
    Range = 25,
    Pow = 26,
}

impl OperatorKind {
    const ALL: [OperatorKind; 27] = [
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Div,
        Self::Mod,
        Self::Eq,
        Self::NotEq,
        Self::Not,
        Self::And,
        Self::Or,
        Self::Xor,
        Self::Gt,
        Self::Lt,
        Self::GtEq,
        Self::LtEq,
        Self::Assign,
        Self::AddAssign,
        Self::SubAssign,
        Self::MulAssign,
        Self::DivAssign,
        Self::ModAssign,
        Self::ConvertTo,
        Self::Inc,
        Self::Dec,
        Self::In,
        Self::Range,
        Self::Pow,
    ];

    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.get(byte as usize).copied()
    }

    /// The arithmetic operator a compound assignment applies before storing.
    pub fn compound_base(self) -> Option<Self> {
        match self {
            Self::AddAssign => Some(Self::Add),
            Self::SubAssign => Some(Self::Sub),
            Self::MulAssign => Some(Self::Mul),
            Self::DivAssign => Some(Self::Div),
            Self::ModAssign => Some(Self::Mod),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Not => "!",
            Self::And => "&&",
            Self::Or => "||",
            Self::Xor => "^",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::GtEq => ">=",
            Self::LtEq => "<=",
            Self::Assign => "=",
            Self::AddAssign => "+=",
            Self::SubAssign => "-=",
            Self::MulAssign => "*=",
            Self::DivAssign => "/=",
            Self::ModAssign => "%=",
            Self::ConvertTo => "as",
            Self::Inc => "++",
            Self::Dec => "--",
            Self::In => "in",
            Self::Range => "..",
            Self::Pow => "**",
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.symbol())
    }
}

/// Literal carried by a value token. The tag order matches the lexer's
/// value-kind byte.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Null,
    Int(i32),
    String(String),
    SByte(i8),
    Bool(bool),
    Char(char),
    Float(f32),
    Short(i16),
    Long(i64),
    Double(f64),
}

impl Literal {
    pub fn tag(&self) -> u8 {
        match self {
            Literal::Null => 0,
            Literal::Int(_) => 1,
            Literal::String(_) => 2,
            Literal::SByte(_) => 3,
            Literal::Bool(_) => 4,
            Literal::Char(_) => 5,
            Literal::Float(_) => 6,
            Literal::Short(_) => 7,
            Literal::Long(_) => 8,
            Literal::Double(_) => 9,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SeparatorKind {
    /// `.` inside a dotted name.
    Member,
    /// `,` between arguments, elements, or statements.
    Statement,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    NewLine,
    Class {
        name: String,
        kind: ClassKind,
        visibility: Visibility,
    },
    Function {
        name: String,
        return_type: String,
        kind: FuncKind,
        visibility: Visibility,
    },
    Var {
        name: String,
        type_name: String,
        is_final: bool,
    },
    Block(bool),
    Statement(bool),
    Sequence(bool),
    Literal(String),
    Separator(SeparatorKind),
    ExpressionEnd,
    Operator(OperatorKind),
    Value(Literal),
    Directive,
    Namespace(String),
    UsingNamespace(String),
    ImportLibrary(String),
    Include(String),
    Extends,
    Implements,
    Return,
    Breakpoint,
    New,
    Label(String),
    Goto(String),
    Actual(bool),
    Async(bool),
    ParameterType(bool),
    Loop,
    LoopOperator,
    Nullable,
    Switch,
    Case,
    Annotation,
    Throw,
    Try,
    Catch,
    Finally,
    If,
    Else,
    Typeof,
    Instanceof,
    With,
    Yield,
    Lambda,
    Ref,
}

impl Token {
    pub fn name(&self) -> &'static str {
        match self {
            Token::NewLine => "NEWLN",
            Token::Class { .. } => "CLASS",
            Token::Function { .. } => "FUNCTION",
            Token::Var { .. } => "VAR",
            Token::Block(_) => "BLOCK",
            Token::Statement(_) => "STATEMENT",
            Token::Sequence(_) => "SEQUENCE",
            Token::Literal(_) => "LITERAL",
            Token::Separator(_) => "SEPARATOR",
            Token::ExpressionEnd => "EXPRESSION_END",
            Token::Operator(_) => "OPERATOR",
            Token::Value(_) => "VALUE",
            Token::Directive => "DIRECTIVE",
            Token::Namespace(_) => "NAMESPACE",
            Token::UsingNamespace(_) => "USING_NAMESPACE",
            Token::ImportLibrary(_) => "IMPORT_LIBRARY",
            Token::Include(_) => "INCLUDE",
            Token::Extends => "EXTENDS",
            Token::Implements => "IMPLEMENTS",
            Token::Return => "RETURN",
            Token::Breakpoint => "BREAKPOINT",
            Token::New => "NEW",
            Token::Label(_) => "LABEL",
            Token::Goto(_) => "GOTO",
            Token::Actual(_) => "ACTUAL",
            Token::Async(_) => "ASYNC",
            Token::ParameterType(_) => "PARAMETER_TYPE",
            Token::Loop => "LOOP",
            Token::LoopOperator => "LOOP_OPERATOR",
            Token::Nullable => "NULLABLE",
            Token::Switch => "SWITCH",
            Token::Case => "CASE",
            Token::Annotation => "ANNOTATION",
            Token::Throw => "THROW",
            Token::Try => "TRY",
            Token::Catch => "CATCH",
            Token::Finally => "FINALLY",
            Token::If => "IF",
            Token::Else => "ELSE",
            Token::Typeof => "TYPEOF",
            Token::Instanceof => "INSTANCEOF",
            Token::With => "WITH",
            Token::Yield => "YIELD",
            Token::Lambda => "LAMBDA",
            Token::Ref => "REF",
        }
    }

    /// Tokens that terminate an expression: `;` or the opening of a block.
    pub fn is_end(&self) -> bool {
        matches!(self, Token::ExpressionEnd | Token::Block(true))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Front-poppable token queue with the header of the file it came from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TokenStream {
    header: HeaderKind,
    platform: u8,
    tokens: VecDeque<Token>,
}

impl TokenStream {
    pub fn new(header: HeaderKind) -> Self {
        Self {
            header,
            platform: 0,
            tokens: VecDeque::new(),
        }
    }

    pub fn with_platform(header: HeaderKind, platform: u8) -> Self {
        Self {
            header,
            platform,
            tokens: VecDeque::new(),
        }
    }

    pub fn header(&self) -> HeaderKind {
        self.header
    }

    pub fn platform(&self) -> u8 {
        self.platform
    }

    pub fn push(&mut self, token: Token) {
        self.tokens.push_back(token);
    }

    pub fn pop(&mut self) -> Option<Token> {
        self.tokens.pop_front()
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.front()
    }

    /// Puts a single token back in front of the stream.
    pub fn push_front(&mut self, token: Token) {
        self.tokens.push_front(token);
    }

    /// Inserts the remainder of `other` at the current read position.
    pub fn splice(&mut self, other: TokenStream) {
        let mut tokens = other.tokens;
        tokens.append(&mut self.tokens);
        self.tokens = tokens;
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter()
    }
}

impl Extend<Token> for TokenStream {
    fn extend<I: IntoIterator<Item = Token>>(&mut self, iter: I) {
        self.tokens.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pushback_returns_token_to_front() {
        let mut stream = TokenStream::new(HeaderKind::Script);
        stream.push(Token::Literal("a".to_string()));
        stream.push(Token::ExpressionEnd);

        let first = stream.pop().expect("first token");
        stream.push_front(first.clone());
        assert_eq!(stream.peek(), Some(&first));
        assert_eq!(stream.len(), 2);
    }

    #[test]
    fn splice_inserts_before_remaining_tokens() {
        let mut stream = TokenStream::new(HeaderKind::Script);
        stream.push(Token::Literal("before".to_string()));
        stream.push(Token::Literal("after".to_string()));
        assert_eq!(stream.pop(), Some(Token::Literal("before".to_string())));

        let mut library = TokenStream::new(HeaderKind::TokensLibrary);
        library.push(Token::UsingNamespace("System".to_string()));
        library.push(Token::ExpressionEnd);
        stream.splice(library);

        let rest: Vec<Token> = std::iter::from_fn(|| stream.pop()).collect();
        assert_eq!(
            rest,
            vec![
                Token::UsingNamespace("System".to_string()),
                Token::ExpressionEnd,
                Token::Literal("after".to_string()),
            ]
        );
        assert_eq!(stream.header(), HeaderKind::Script);
    }

    #[test]
    fn operator_bytes_follow_declaration_order() {
        assert_eq!(OperatorKind::from_byte(0), Some(OperatorKind::Add));
        assert_eq!(OperatorKind::from_byte(26), Some(OperatorKind::Pow));
        assert_eq!(OperatorKind::from_byte(27), None);
        for op in OperatorKind::ALL {
            assert_eq!(OperatorKind::from_byte(op as u8), Some(op));
        }
    }

    #[test]
    fn block_open_ends_expression_but_block_close_does_not() {
        assert!(Token::ExpressionEnd.is_end());
        assert!(Token::Block(true).is_end());
        assert!(!Token::Block(false).is_end());
        assert!(!Token::Separator(SeparatorKind::Statement).is_end());
    }
}
