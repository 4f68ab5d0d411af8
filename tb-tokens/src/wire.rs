use crate::{
    ClassKind, FuncKind, HeaderKind, Literal, OperatorKind, SeparatorKind, Token, TokenStream,
    Visibility,
};

const MAGIC: [u8; 4] = *b"TKNS";
const VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    UnexpectedEof,
    InvalidMagic([u8; 4]),
    UnsupportedVersion(u16),
    UnsupportedFlags(u16),
    InvalidTag(&'static str, u8),
    InvalidBool(u8),
    InvalidChar(u32),
    InvalidUtf8,
    LengthTooLarge(&'static str, usize),
    TrailingBytes,
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireError::UnexpectedEof => write!(f, "unexpected end of input"),
            WireError::InvalidMagic(found) => write!(f, "invalid magic: {found:?}"),
            WireError::UnsupportedVersion(version) => {
                write!(f, "unsupported version: {version}")
            }
            WireError::UnsupportedFlags(flags) => write!(f, "unsupported flags: {flags}"),
            WireError::InvalidTag(field, tag) => write!(f, "invalid {field} tag: {tag}"),
            WireError::InvalidBool(value) => write!(f, "invalid bool value: {value}"),
            WireError::InvalidChar(value) => write!(f, "invalid char scalar: {value:#x}"),
            WireError::InvalidUtf8 => write!(f, "invalid utf-8 string"),
            WireError::LengthTooLarge(field, len) => {
                write!(f, "{field} length too large: {len}")
            }
            WireError::TrailingBytes => write!(f, "trailing bytes after payload"),
        }
    }
}

impl std::error::Error for WireError {}

pub fn encode_stream(stream: &TokenStream) -> Result<Vec<u8>, WireError> {
    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.push(stream.header() as u8);
    out.push(stream.platform());
    write_u32_len("tokens", stream.len(), &mut out)?;
    for token in stream.iter() {
        write_token(token, &mut out)?;
    }
    Ok(out)
}

pub fn decode_stream(bytes: &[u8]) -> Result<TokenStream, WireError> {
    let mut cursor = Cursor::new(bytes);

    let magic = cursor.read_exact_array::<4>()?;
    if magic != MAGIC {
        return Err(WireError::InvalidMagic(magic));
    }
    let version = cursor.read_u16()?;
    if version != VERSION {
        return Err(WireError::UnsupportedVersion(version));
    }
    let header_byte = cursor.read_u8()?;
    let header =
        HeaderKind::from_byte(header_byte).ok_or(WireError::InvalidTag("header", header_byte))?;
    let platform = cursor.read_u8()?;

    let count = cursor.read_u32()? as usize;
    let mut stream = TokenStream::with_platform(header, platform);
    for _ in 0..count {
        stream.push(read_token(&mut cursor)?);
    }

    if !cursor.is_eof() {
        return Err(WireError::TrailingBytes);
    }
    Ok(stream)
}

fn write_token(token: &Token, out: &mut Vec<u8>) -> Result<(), WireError> {
    match token {
        Token::NewLine => out.push(0),
        Token::Class {
            name,
            kind,
            visibility,
        } => {
            out.push(1);
            write_string("class name", name, out)?;
            out.push(*kind as u8);
            out.push(*visibility as u8);
        }
        Token::Function {
            name,
            return_type,
            kind,
            visibility,
        } => {
            out.push(2);
            write_string("function name", name, out)?;
            write_string("return type", return_type, out)?;
            out.push(*kind as u8);
            out.push(*visibility as u8);
        }
        Token::Var {
            name,
            type_name,
            is_final,
        } => {
            out.push(3);
            write_string("var name", name, out)?;
            write_string("var type", type_name, out)?;
            out.push(u8::from(*is_final));
        }
        Token::Block(open) => {
            out.push(4);
            out.push(u8::from(*open));
        }
        Token::Statement(open) => {
            out.push(5);
            out.push(u8::from(*open));
        }
        Token::Sequence(open) => {
            out.push(6);
            out.push(u8::from(*open));
        }
        Token::Literal(text) => {
            out.push(7);
            write_string("literal", text, out)?;
        }
        Token::Separator(kind) => {
            out.push(8);
            out.push(u8::from(*kind == SeparatorKind::Member));
        }
        Token::ExpressionEnd => out.push(9),
        Token::Operator(op) => {
            out.push(10);
            out.push(*op as u8);
        }
        Token::Value(literal) => {
            out.push(11);
            write_literal(literal, out)?;
        }
        Token::Directive => out.push(12),
        Token::Namespace(name) => {
            out.push(13);
            write_string("namespace", name, out)?;
        }
        Token::UsingNamespace(name) => {
            out.push(14);
            write_string("using namespace", name, out)?;
        }
        Token::ImportLibrary(path) => {
            out.push(15);
            write_string("library path", path, out)?;
        }
        Token::Include(path) => {
            out.push(16);
            write_string("include path", path, out)?;
        }
        Token::Extends => out.push(17),
        Token::Implements => out.push(18),
        Token::Return => out.push(19),
        Token::Breakpoint => out.push(20),
        Token::New => out.push(21),
        Token::Label(name) => {
            out.push(22);
            write_string("label", name, out)?;
        }
        Token::Goto(name) => {
            out.push(23);
            write_string("goto label", name, out)?;
        }
        Token::Actual(flag) => {
            out.push(24);
            out.push(u8::from(*flag));
        }
        Token::Async(flag) => {
            out.push(25);
            out.push(u8::from(*flag));
        }
        Token::ParameterType(flag) => {
            out.push(26);
            out.push(u8::from(*flag));
        }
        Token::Loop => out.push(27),
        Token::LoopOperator => out.push(28),
        Token::Nullable => out.push(29),
        Token::Switch => out.push(30),
        Token::Case => out.push(31),
        Token::Annotation => out.push(32),
        Token::Throw => out.push(33),
        Token::Try => out.push(34),
        Token::Catch => out.push(35),
        Token::Finally => out.push(36),
        Token::If => out.push(37),
        Token::Else => out.push(38),
        Token::Typeof => out.push(39),
        Token::Instanceof => out.push(40),
        Token::With => out.push(41),
        Token::Yield => out.push(42),
        Token::Lambda => out.push(43),
        Token::Ref => out.push(44),
    }
    Ok(())
}

fn read_token(cursor: &mut Cursor<'_>) -> Result<Token, WireError> {
    let tag = cursor.read_u8()?;
    let token = match tag {
        0 => Token::NewLine,
        1 => Token::Class {
            name: cursor.read_string()?,
            kind: read_enum(cursor, "class kind", ClassKind::from_byte)?,
            visibility: read_enum(cursor, "visibility", Visibility::from_byte)?,
        },
        2 => Token::Function {
            name: cursor.read_string()?,
            return_type: cursor.read_string()?,
            kind: read_enum(cursor, "function kind", FuncKind::from_byte)?,
            visibility: read_enum(cursor, "visibility", Visibility::from_byte)?,
        },
        3 => Token::Var {
            name: cursor.read_string()?,
            type_name: cursor.read_string()?,
            is_final: cursor.read_bool()?,
        },
        4 => Token::Block(cursor.read_bool()?),
        5 => Token::Statement(cursor.read_bool()?),
        6 => Token::Sequence(cursor.read_bool()?),
        7 => Token::Literal(cursor.read_string()?),
        8 => {
            if cursor.read_bool()? {
                Token::Separator(SeparatorKind::Member)
            } else {
                Token::Separator(SeparatorKind::Statement)
            }
        }
        9 => Token::ExpressionEnd,
        10 => Token::Operator(read_enum(cursor, "operator", OperatorKind::from_byte)?),
        11 => Token::Value(read_literal(cursor)?),
        12 => Token::Directive,
        13 => Token::Namespace(cursor.read_string()?),
        14 => Token::UsingNamespace(cursor.read_string()?),
        15 => Token::ImportLibrary(cursor.read_string()?),
        16 => Token::Include(cursor.read_string()?),
        17 => Token::Extends,
        18 => Token::Implements,
        19 => Token::Return,
        20 => Token::Breakpoint,
        21 => Token::New,
        22 => Token::Label(cursor.read_string()?),
        23 => Token::Goto(cursor.read_string()?),
        24 => Token::Actual(cursor.read_bool()?),
        25 => Token::Async(cursor.read_bool()?),
        26 => Token::ParameterType(cursor.read_bool()?),
        27 => Token::Loop,
        28 => Token::LoopOperator,
        29 => Token::Nullable,
        30 => Token::Switch,
        31 => Token::Case,
        32 => Token::Annotation,
        33 => Token::Throw,
        34 => Token::Try,
        35 => Token::Catch,
        36 => Token::Finally,
        37 => Token::If,
        38 => Token::Else,
        39 => Token::Typeof,
        40 => Token::Instanceof,
        41 => Token::With,
        42 => Token::Yield,
        43 => Token::Lambda,
        44 => Token::Ref,
        other => return Err(WireError::InvalidTag("token", other)),
    };
    Ok(token)
}

fn write_literal(literal: &Literal, out: &mut Vec<u8>) -> Result<(), WireError> {
    out.push(literal.tag());
    match literal {
        Literal::Null => {}
        Literal::Int(value) => out.extend_from_slice(&value.to_le_bytes()),
        Literal::String(value) => write_string("string value", value, out)?,
        Literal::SByte(value) => out.extend_from_slice(&value.to_le_bytes()),
        Literal::Bool(value) => out.push(u8::from(*value)),
        Literal::Char(value) => out.extend_from_slice(&u32::from(*value).to_le_bytes()),
        Literal::Float(value) => out.extend_from_slice(&value.to_le_bytes()),
        Literal::Short(value) => out.extend_from_slice(&value.to_le_bytes()),
        Literal::Long(value) => out.extend_from_slice(&value.to_le_bytes()),
        Literal::Double(value) => out.extend_from_slice(&value.to_le_bytes()),
    }
    Ok(())
}

/// Reads a literal written by [`write_literal`]; also used by the module codec.
pub fn read_literal(cursor: &mut Cursor<'_>) -> Result<Literal, WireError> {
    let tag = cursor.read_u8()?;
    let literal = match tag {
        0 => Literal::Null,
        1 => Literal::Int(i32::from_le_bytes(cursor.read_exact_array::<4>()?)),
        2 => Literal::String(cursor.read_string()?),
        3 => Literal::SByte(i8::from_le_bytes(cursor.read_exact_array::<1>()?)),
        4 => Literal::Bool(cursor.read_bool()?),
        5 => {
            let raw = cursor.read_u32()?;
            Literal::Char(char::from_u32(raw).ok_or(WireError::InvalidChar(raw))?)
        }
        6 => Literal::Float(f32::from_le_bytes(cursor.read_exact_array::<4>()?)),
        7 => Literal::Short(i16::from_le_bytes(cursor.read_exact_array::<2>()?)),
        8 => Literal::Long(i64::from_le_bytes(cursor.read_exact_array::<8>()?)),
        9 => Literal::Double(f64::from_le_bytes(cursor.read_exact_array::<8>()?)),
        other => return Err(WireError::InvalidTag("value", other)),
    };
    Ok(literal)
}

pub fn encode_literal(literal: &Literal, out: &mut Vec<u8>) -> Result<(), WireError> {
    write_literal(literal, out)
}

fn read_enum<T>(
    cursor: &mut Cursor<'_>,
    field: &'static str,
    from_byte: fn(u8) -> Option<T>,
) -> Result<T, WireError> {
    let byte = cursor.read_u8()?;
    from_byte(byte).ok_or(WireError::InvalidTag(field, byte))
}

pub fn write_string(field: &'static str, value: &str, out: &mut Vec<u8>) -> Result<(), WireError> {
    write_u32_len(field, value.len(), out)?;
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

pub fn write_u32_len(field: &'static str, len: usize, out: &mut Vec<u8>) -> Result<(), WireError> {
    let len_u32 = u32::try_from(len).map_err(|_| WireError::LengthTooLarge(field, len))?;
    out.extend_from_slice(&len_u32.to_le_bytes());
    Ok(())
}

pub struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        let value = self
            .bytes
            .get(self.offset)
            .ok_or(WireError::UnexpectedEof)?;
        self.offset += 1;
        Ok(*value)
    }

    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(WireError::InvalidBool(other)),
        }
    }

    pub fn read_u16(&mut self) -> Result<u16, WireError> {
        let bytes = self.read_exact_array::<2>()?;
        Ok(u16::from_le_bytes(bytes))
    }

    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        let bytes = self.read_exact_array::<4>()?;
        Ok(u32::from_le_bytes(bytes))
    }

    pub fn read_string(&mut self) -> Result<String, WireError> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_exact(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::InvalidUtf8)
    }

    pub fn read_exact_array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let bytes = self.read_exact(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_exact(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        let end = self
            .offset
            .checked_add(len)
            .ok_or(WireError::UnexpectedEof)?;
        if end > self.bytes.len() {
            return Err(WireError::UnexpectedEof);
        }
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    pub fn is_eof(&self) -> bool {
        self.offset == self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_stream() -> TokenStream {
        let mut stream = TokenStream::with_platform(HeaderKind::TokensLibrary, 2);
        stream.extend([
            Token::Class {
                name: "Point".to_string(),
                kind: ClassKind::Struct,
                visibility: Visibility::Internal,
            },
            Token::Var {
                name: "x".to_string(),
                type_name: "int".to_string(),
                is_final: true,
            },
            Token::Separator(SeparatorKind::Member),
            Token::Operator(OperatorKind::GtEq),
            Token::Value(Literal::Char('λ')),
            Token::Value(Literal::Double(-0.5)),
            Token::Goto("again".to_string()),
            Token::Ref,
        ]);
        stream
    }

    #[test]
    fn decode_restores_header_platform_and_tokens() {
        let stream = sample_stream();
        let bytes = encode_stream(&stream).expect("encode should succeed");
        let decoded = decode_stream(&bytes).expect("decode should succeed");
        assert_eq!(decoded, stream);
        assert_eq!(decoded.header(), HeaderKind::TokensLibrary);
        assert_eq!(decoded.platform(), 2);
    }

    #[test]
    fn decode_rejects_bad_magic() {
        let mut bytes = encode_stream(&sample_stream()).expect("encode should succeed");
        bytes[0] = b'X';
        assert!(matches!(
            decode_stream(&bytes),
            Err(WireError::InvalidMagic(_))
        ));
    }

    #[test]
    fn decode_rejects_truncated_payload() {
        let bytes = encode_stream(&sample_stream()).expect("encode should succeed");
        let truncated = &bytes[..bytes.len() - 1];
        assert_eq!(decode_stream(truncated), Err(WireError::UnexpectedEof));
    }

    #[test]
    fn decode_rejects_unknown_token_tag() {
        let mut stream = TokenStream::new(HeaderKind::Script);
        stream.push(Token::ExpressionEnd);
        let mut bytes = encode_stream(&stream).expect("encode should succeed");
        let last = bytes.len() - 1;
        bytes[last] = 200;
        assert_eq!(
            decode_stream(&bytes),
            Err(WireError::InvalidTag("token", 200))
        );
    }
}
