//! Module file codec. Type references are written as full names so a module
//! can be registered into any symbol table.

use std::collections::HashSet;

use tokens::wire::{write_string, write_u32_len};
use tokens::{ClassKind, Cursor, HeaderKind, Visibility, WireError};

use crate::config::OutputKind;
use crate::diagnostics::{BuildError, DiagnosticKind, IncludeFailure};
use crate::emit::{Instruction, OpCode, Operand};
use crate::metadata::{MethodBody, MethodSlot};
use crate::session::Module;
use crate::symbols::{
    CtorDef, FieldDef, MethodAttrs, MethodDef, Origin, SymbolTable, TypeDef, TypeId,
};

const MAGIC: [u8; 4] = *b"TBMD";
const VERSION: u16 = 1;

const FIELD_STATIC: u8 = 1 << 0;
const FIELD_FINAL: u8 = 1 << 1;
const METHOD_STATIC: u8 = 1 << 0;
const METHOD_VIRTUAL: u8 = 1 << 1;
const METHOD_ENTRY_POINT: u8 = 1 << 2;
const METHOD_SCRIPT: u8 = 1 << 3;

/// Member `index` of the type named `owner`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberImage {
    pub owner: String,
    pub index: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldImage {
    pub name: String,
    pub ty: String,
    pub is_static: bool,
    pub is_final: bool,
    pub visibility: Visibility,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodImage {
    pub name: String,
    pub params: Vec<String>,
    pub ret: String,
    pub is_static: bool,
    pub is_virtual: bool,
    pub visibility: Visibility,
    pub attrs: MethodAttrs,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CtorImage {
    pub params: Vec<String>,
    pub visibility: Visibility,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotImage {
    Method(u32),
    Constructor(u32),
}

#[derive(Clone, Debug, PartialEq)]
pub enum OperandImage {
    None,
    I4(i32),
    I8(i64),
    R4(f32),
    R8(f64),
    String(String),
    Local(u16),
    Arg(u16),
    Field(MemberImage),
    Method(MemberImage),
    Ctor(MemberImage),
    Type(String),
    Target(u32),
}

#[derive(Clone, Debug, PartialEq)]
pub struct InstructionImage {
    pub opcode: OpCode,
    pub operand: OperandImage,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BodyImage {
    pub slot: SlotImage,
    pub locals: Vec<String>,
    pub code: Vec<InstructionImage>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeImage {
    pub name: String,
    pub namespace: String,
    pub kind: ClassKind,
    pub visibility: Visibility,
    pub base: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldImage>,
    pub methods: Vec<MethodImage>,
    pub constructors: Vec<CtorImage>,
    pub bodies: Vec<BodyImage>,
}

impl TypeImage {
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

/// Decoded module file.
#[derive(Clone, Debug, PartialEq)]
pub struct ModuleImage {
    pub name: String,
    pub version: String,
    pub header: HeaderKind,
    pub output: OutputKind,
    pub entry_point: Option<MemberImage>,
    pub types: Vec<TypeImage>,
}

pub fn encode_module(module: &Module) -> Result<Vec<u8>, WireError> {
    let symbols = &module.symbols;
    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.push(module.header as u8);
    out.push(output_byte(module.output));
    write_string("module name", &module.name, &mut out)?;
    write_string("module version", &module.version, &mut out)?;
    match module.entry_point {
        Some(entry) => {
            out.push(1);
            write_member(symbols, entry.owner, entry.index, &mut out)?;
        }
        None => out.push(0),
    }

    write_u32_len("types", module.types.len(), &mut out)?;
    for ty in &module.types {
        let def = symbols.get(ty.id);
        write_string("type name", &def.name, &mut out)?;
        write_string("namespace", &def.namespace, &mut out)?;
        out.push(def.kind as u8);
        out.push(def.visibility as u8);
        match def.base {
            Some(base) => {
                out.push(1);
                write_type(symbols, base, &mut out)?;
            }
            None => out.push(0),
        }
        write_u32_len("interfaces", def.interfaces.len(), &mut out)?;
        for &iface in &def.interfaces {
            write_type(symbols, iface, &mut out)?;
        }

        write_u32_len("fields", def.fields.len(), &mut out)?;
        for field in &def.fields {
            write_string("field name", &field.name, &mut out)?;
            write_type(symbols, field.ty, &mut out)?;
            let mut flags = 0;
            if field.is_static {
                flags |= FIELD_STATIC;
            }
            if field.is_final {
                flags |= FIELD_FINAL;
            }
            out.push(flags);
            out.push(field.visibility as u8);
        }

        write_u32_len("methods", def.methods.len(), &mut out)?;
        for method in &def.methods {
            write_string("method name", &method.name, &mut out)?;
            write_types(symbols, &method.params, &mut out)?;
            write_type(symbols, method.ret, &mut out)?;
            out.push(method_flags(method));
            out.push(method.visibility as u8);
        }

        write_u32_len("constructors", def.constructors.len(), &mut out)?;
        for ctor in &def.constructors {
            write_types(symbols, &ctor.params, &mut out)?;
            out.push(ctor.visibility as u8);
        }

        write_u32_len("bodies", ty.methods.len(), &mut out)?;
        for body in &ty.methods {
            let bytes = encode_body(symbols, body)?;
            write_u32_len("body", bytes.len(), &mut out)?;
            out.extend_from_slice(&bytes);
        }
    }
    Ok(out)
}

pub fn decode_module(bytes: &[u8]) -> Result<ModuleImage, WireError> {
    let mut cursor = Cursor::new(bytes);
    let magic = cursor.read_exact_array::<4>()?;
    if magic != MAGIC {
        return Err(WireError::InvalidMagic(magic));
    }
    let version = cursor.read_u16()?;
    if version != VERSION {
        return Err(WireError::UnsupportedVersion(version));
    }
    let flags = cursor.read_u16()?;
    if flags != 0 {
        return Err(WireError::UnsupportedFlags(flags));
    }
    let header_byte = cursor.read_u8()?;
    let header =
        HeaderKind::from_byte(header_byte).ok_or(WireError::InvalidTag("header", header_byte))?;
    let output = read_output(&mut cursor)?;
    let name = cursor.read_string()?;
    let version = cursor.read_string()?;
    let entry_point = if cursor.read_bool()? {
        Some(read_member(&mut cursor)?)
    } else {
        None
    };

    let type_count = cursor.read_u32()? as usize;
    let mut types = Vec::new();
    for _ in 0..type_count {
        types.push(read_type_image(&mut cursor)?);
    }
    if !cursor.is_eof() {
        return Err(WireError::TrailingBytes);
    }
    Ok(ModuleImage {
        name,
        version,
        header,
        output,
        entry_point,
        types,
    })
}

impl ModuleImage {
    /// Defines every type of the module as `Included`. Names are defined
    /// first so members may refer to types declared later in the file.
    /// Nothing is defined unless every referenced type is known.
    pub fn register(&self, symbols: &mut SymbolTable) -> Result<Vec<TypeId>, BuildError> {
        self.check_references(symbols)?;
        let mut ids = Vec::with_capacity(self.types.len());
        for image in &self.types {
            let mut def = TypeDef::new(&image.name, &image.namespace, image.kind, Origin::Included);
            def.visibility = image.visibility;
            let id = symbols.define(def).map_err(|err| {
                BuildError::new(DiagnosticKind::Include(IncludeFailure::LoadFailure), err.message)
            })?;
            ids.push(id);
        }

        for (image, &id) in self.types.iter().zip(&ids) {
            let owner = image.full_name();
            let resolve = |name: &str| {
                symbols.lookup(name).ok_or_else(|| {
                    BuildError::new(
                        DiagnosticKind::Include(IncludeFailure::BadFormat),
                        format!("type {name} referenced by {owner} is unknown"),
                    )
                })
            };
            let resolve_all = |names: &[String]| -> Result<Vec<TypeId>, BuildError> {
                names.iter().map(|name| resolve(name)).collect()
            };

            let base = image.base.as_deref().map(&resolve).transpose()?;
            let interfaces = resolve_all(&image.interfaces)?;
            let mut fields = Vec::new();
            for field in &image.fields {
                fields.push(FieldDef {
                    name: field.name.clone(),
                    ty: resolve(&field.ty)?,
                    is_static: field.is_static,
                    is_final: field.is_final,
                    visibility: field.visibility,
                });
            }
            let mut methods = Vec::new();
            for method in &image.methods {
                methods.push(MethodDef {
                    name: method.name.clone(),
                    params: resolve_all(&method.params)?,
                    ret: resolve(&method.ret)?,
                    is_static: method.is_static,
                    is_virtual: method.is_virtual,
                    visibility: method.visibility,
                    attrs: method.attrs,
                });
            }
            let mut constructors = Vec::new();
            for ctor in &image.constructors {
                constructors.push(CtorDef {
                    params: resolve_all(&ctor.params)?,
                    visibility: ctor.visibility,
                });
            }

            let def = symbols.get_mut(id);
            def.base = base;
            def.interfaces = interfaces;
            def.fields = fields;
            def.methods = methods;
            def.constructors = constructors;
        }
        Ok(ids)
    }

    /// Fails on a type name that is already defined or a referenced type
    /// that neither the table nor this module declares.
    fn check_references(&self, symbols: &SymbolTable) -> Result<(), BuildError> {
        let mut own = HashSet::new();
        for image in &self.types {
            let name = image.full_name();
            if symbols.lookup(&name).is_some() || !own.insert(name.clone()) {
                return Err(BuildError::new(
                    DiagnosticKind::Include(IncludeFailure::LoadFailure),
                    format!("type {name} is already defined"),
                ));
            }
        }

        for image in &self.types {
            let referenced = image
                .base
                .iter()
                .chain(&image.interfaces)
                .chain(image.fields.iter().map(|field| &field.ty))
                .chain(
                    image
                        .methods
                        .iter()
                        .flat_map(|method| method.params.iter().chain([&method.ret])),
                )
                .chain(image.constructors.iter().flat_map(|ctor| &ctor.params));
            for name in referenced {
                if symbols.lookup(name).is_none() && !own.contains(name) {
                    return Err(BuildError::new(
                        DiagnosticKind::Include(IncludeFailure::BadFormat),
                        format!("type {name} referenced by {} is unknown", image.full_name()),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn output_byte(output: OutputKind) -> u8 {
    match output {
        OutputKind::Dll => 0,
        OutputKind::ConsoleApplication => 1,
        OutputKind::WindowApplication => 2,
    }
}

fn read_output(cursor: &mut Cursor<'_>) -> Result<OutputKind, WireError> {
    match cursor.read_u8()? {
        0 => Ok(OutputKind::Dll),
        1 => Ok(OutputKind::ConsoleApplication),
        2 => Ok(OutputKind::WindowApplication),
        other => Err(WireError::InvalidTag("output", other)),
    }
}

fn method_flags(method: &MethodDef) -> u8 {
    let mut flags = 0;
    if method.is_static {
        flags |= METHOD_STATIC;
    }
    if method.is_virtual {
        flags |= METHOD_VIRTUAL;
    }
    if method.attrs.entry_point {
        flags |= METHOD_ENTRY_POINT;
    }
    if method.attrs.script {
        flags |= METHOD_SCRIPT;
    }
    flags
}

fn write_type(symbols: &SymbolTable, ty: TypeId, out: &mut Vec<u8>) -> Result<(), WireError> {
    write_string("type reference", &symbols.type_name(ty), out)
}

fn write_types(symbols: &SymbolTable, types: &[TypeId], out: &mut Vec<u8>) -> Result<(), WireError> {
    write_u32_len("type list", types.len(), out)?;
    for &ty in types {
        write_type(symbols, ty, out)?;
    }
    Ok(())
}

fn write_member(
    symbols: &SymbolTable,
    owner: TypeId,
    index: usize,
    out: &mut Vec<u8>,
) -> Result<(), WireError> {
    write_type(symbols, owner, out)?;
    write_u32_len("member index", index, out)
}

fn encode_body(symbols: &SymbolTable, body: &MethodBody) -> Result<Vec<u8>, WireError> {
    let mut out = Vec::new();
    match body.slot {
        MethodSlot::Method(method) => {
            out.push(0);
            write_u32_len("method index", method.index, &mut out)?;
        }
        MethodSlot::Constructor(ctor) => {
            out.push(1);
            write_u32_len("constructor index", ctor.index, &mut out)?;
        }
    }
    write_types(symbols, &body.locals, &mut out)?;
    write_u32_len("instructions", body.code.len(), &mut out)?;
    for instruction in &body.code {
        write_instruction(symbols, instruction, &mut out)?;
    }
    Ok(out)
}

fn write_instruction(
    symbols: &SymbolTable,
    instruction: &Instruction,
    out: &mut Vec<u8>,
) -> Result<(), WireError> {
    out.push(instruction.opcode as u8);
    match &instruction.operand {
        Operand::None => out.push(0),
        Operand::I4(value) => {
            out.push(1);
            out.extend_from_slice(&value.to_le_bytes());
        }
        Operand::I8(value) => {
            out.push(2);
            out.extend_from_slice(&value.to_le_bytes());
        }
        Operand::R4(value) => {
            out.push(3);
            out.extend_from_slice(&value.to_le_bytes());
        }
        Operand::R8(value) => {
            out.push(4);
            out.extend_from_slice(&value.to_le_bytes());
        }
        Operand::String(value) => {
            out.push(5);
            write_string("string operand", value, out)?;
        }
        Operand::Local(index) => {
            out.push(6);
            out.extend_from_slice(&index.to_le_bytes());
        }
        Operand::Arg(index) => {
            out.push(7);
            out.extend_from_slice(&index.to_le_bytes());
        }
        Operand::Field(field) => {
            out.push(8);
            write_member(symbols, field.owner, field.index, out)?;
        }
        Operand::Method(method) => {
            out.push(9);
            write_member(symbols, method.owner, method.index, out)?;
        }
        Operand::Ctor(ctor) => {
            out.push(10);
            write_member(symbols, ctor.owner, ctor.index, out)?;
        }
        Operand::Type(ty) => {
            out.push(11);
            write_type(symbols, *ty, out)?;
        }
        Operand::Target(target) => {
            out.push(12);
            out.extend_from_slice(&target.to_le_bytes());
        }
    }
    Ok(())
}

fn read_visibility(cursor: &mut Cursor<'_>) -> Result<Visibility, WireError> {
    let byte = cursor.read_u8()?;
    Visibility::from_byte(byte).ok_or(WireError::InvalidTag("visibility", byte))
}

fn read_member(cursor: &mut Cursor<'_>) -> Result<MemberImage, WireError> {
    Ok(MemberImage {
        owner: cursor.read_string()?,
        index: cursor.read_u32()?,
    })
}

fn read_names(cursor: &mut Cursor<'_>) -> Result<Vec<String>, WireError> {
    let count = cursor.read_u32()? as usize;
    let mut names = Vec::new();
    for _ in 0..count {
        names.push(cursor.read_string()?);
    }
    Ok(names)
}

fn read_flags(cursor: &mut Cursor<'_>, known: u8) -> Result<u8, WireError> {
    let flags = cursor.read_u8()?;
    if flags & !known != 0 {
        return Err(WireError::UnsupportedFlags(u16::from(flags)));
    }
    Ok(flags)
}

fn read_type_image(cursor: &mut Cursor<'_>) -> Result<TypeImage, WireError> {
    let name = cursor.read_string()?;
    let namespace = cursor.read_string()?;
    let kind_byte = cursor.read_u8()?;
    let kind = ClassKind::from_byte(kind_byte).ok_or(WireError::InvalidTag("class kind", kind_byte))?;
    let visibility = read_visibility(cursor)?;
    let base = if cursor.read_bool()? {
        Some(cursor.read_string()?)
    } else {
        None
    };
    let interfaces = read_names(cursor)?;

    let mut fields = Vec::new();
    for _ in 0..cursor.read_u32()? {
        let name = cursor.read_string()?;
        let ty = cursor.read_string()?;
        let flags = read_flags(cursor, FIELD_STATIC | FIELD_FINAL)?;
        fields.push(FieldImage {
            name,
            ty,
            is_static: flags & FIELD_STATIC != 0,
            is_final: flags & FIELD_FINAL != 0,
            visibility: read_visibility(cursor)?,
        });
    }

    let mut methods = Vec::new();
    for _ in 0..cursor.read_u32()? {
        let name = cursor.read_string()?;
        let params = read_names(cursor)?;
        let ret = cursor.read_string()?;
        let flags = read_flags(
            cursor,
            METHOD_STATIC | METHOD_VIRTUAL | METHOD_ENTRY_POINT | METHOD_SCRIPT,
        )?;
        methods.push(MethodImage {
            name,
            params,
            ret,
            is_static: flags & METHOD_STATIC != 0,
            is_virtual: flags & METHOD_VIRTUAL != 0,
            visibility: read_visibility(cursor)?,
            attrs: MethodAttrs {
                entry_point: flags & METHOD_ENTRY_POINT != 0,
                script: flags & METHOD_SCRIPT != 0,
            },
        });
    }

    let mut constructors = Vec::new();
    for _ in 0..cursor.read_u32()? {
        constructors.push(CtorImage {
            params: read_names(cursor)?,
            visibility: read_visibility(cursor)?,
        });
    }

    let mut bodies = Vec::new();
    for _ in 0..cursor.read_u32()? {
        let len = cursor.read_u32()? as usize;
        let mut body = Cursor::new(cursor.read_exact(len)?);
        bodies.push(read_body(&mut body)?);
        if !body.is_eof() {
            return Err(WireError::TrailingBytes);
        }
    }

    Ok(TypeImage {
        name,
        namespace,
        kind,
        visibility,
        base,
        interfaces,
        fields,
        methods,
        constructors,
        bodies,
    })
}

fn read_body(cursor: &mut Cursor<'_>) -> Result<BodyImage, WireError> {
    let slot = match cursor.read_u8()? {
        0 => SlotImage::Method(cursor.read_u32()?),
        1 => SlotImage::Constructor(cursor.read_u32()?),
        other => return Err(WireError::InvalidTag("method slot", other)),
    };
    let locals = read_names(cursor)?;
    let count = cursor.read_u32()? as usize;
    let mut code = Vec::new();
    for _ in 0..count {
        let opcode_byte = cursor.read_u8()?;
        let opcode =
            OpCode::from_byte(opcode_byte).ok_or(WireError::InvalidTag("opcode", opcode_byte))?;
        code.push(InstructionImage {
            opcode,
            operand: read_operand(cursor)?,
        });
    }
    Ok(BodyImage { slot, locals, code })
}

fn read_operand(cursor: &mut Cursor<'_>) -> Result<OperandImage, WireError> {
    let operand = match cursor.read_u8()? {
        0 => OperandImage::None,
        1 => OperandImage::I4(i32::from_le_bytes(cursor.read_exact_array::<4>()?)),
        2 => OperandImage::I8(i64::from_le_bytes(cursor.read_exact_array::<8>()?)),
        3 => OperandImage::R4(f32::from_le_bytes(cursor.read_exact_array::<4>()?)),
        4 => OperandImage::R8(f64::from_le_bytes(cursor.read_exact_array::<8>()?)),
        5 => OperandImage::String(cursor.read_string()?),
        6 => OperandImage::Local(cursor.read_u16()?),
        7 => OperandImage::Arg(cursor.read_u16()?),
        8 => OperandImage::Field(read_member(cursor)?),
        9 => OperandImage::Method(read_member(cursor)?),
        10 => OperandImage::Ctor(read_member(cursor)?),
        11 => OperandImage::Type(cursor.read_string()?),
        12 => OperandImage::Target(cursor.read_u32()?),
        other => return Err(WireError::InvalidTag("operand", other)),
    };
    Ok(operand)
}
