//! CIL-shaped instruction set and the emitter that picks opcodes by operand type.

use std::fmt;

use tokens::{Literal, OperatorKind};

use crate::diagnostics::{BuildError, DiagnosticKind};
use crate::metadata::{LocalVar, MethodBuilder, VarSlot};
use crate::symbols::{CtorRef, FieldRef, MethodRef, SymbolTable, TypeCategory, TypeId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    Nop = 0,
    Break = 1,
    Ldnull = 2,
    LdcI4 = 3,
    LdcI4S = 4,
    LdcI4Zero = 5,
    LdcI4One = 6,
    LdcI8 = 7,
    LdcR4 = 8,
    LdcR8 = 9,
    Ldstr = 10,
    Ldloc = 11,
    Stloc = 12,
    Ldarg = 13,
    Starg = 14,
    Ldfld = 15,
    Stfld = 16,
    Ldsfld = 17,
    Stsfld = 18,
    Call = 19,
    Callvirt = 20,
    Newobj = 21,
    Newarr = 22,
    Stelem = 23,
    Pop = 24,
    Dup = 25,
    Ret = 26,
    Br = 27,
    Add = 28,
    Sub = 29,
    Mul = 30,
    Div = 31,
    Rem = 32,
    And = 33,
    Or = 34,
    Xor = 35,
    Neg = 36,
    Ceq = 37,
    Cgt = 38,
    Clt = 39,
}

impl OpCode {
    const ALL: [OpCode; 40] = [
        OpCode::Nop,
        OpCode::Break,
        OpCode::Ldnull,
        OpCode::LdcI4,
        OpCode::LdcI4S,
        OpCode::LdcI4Zero,
        OpCode::LdcI4One,
        OpCode::LdcI8,
        OpCode::LdcR4,
        OpCode::LdcR8,
        OpCode::Ldstr,
        OpCode::Ldloc,
        OpCode::Stloc,
        OpCode::Ldarg,
        OpCode::Starg,
        OpCode::Ldfld,
        OpCode::Stfld,
        OpCode::Ldsfld,
        OpCode::Stsfld,
        OpCode::Call,
        OpCode::Callvirt,
        OpCode::Newobj,
        OpCode::Newarr,
        OpCode::Stelem,
        OpCode::Pop,
        OpCode::Dup,
        OpCode::Ret,
        OpCode::Br,
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::Rem,
        OpCode::And,
        OpCode::Or,
        OpCode::Xor,
        OpCode::Neg,
        OpCode::Ceq,
        OpCode::Cgt,
        OpCode::Clt,
    ];

    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.get(byte as usize).copied()
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Nop => "nop",
            OpCode::Break => "break",
            OpCode::Ldnull => "ldnull",
            OpCode::LdcI4 => "ldc.i4",
            OpCode::LdcI4S => "ldc.i4.s",
            OpCode::LdcI4Zero => "ldc.i4.0",
            OpCode::LdcI4One => "ldc.i4.1",
            OpCode::LdcI8 => "ldc.i8",
            OpCode::LdcR4 => "ldc.r4",
            OpCode::LdcR8 => "ldc.r8",
            OpCode::Ldstr => "ldstr",
            OpCode::Ldloc => "ldloc",
            OpCode::Stloc => "stloc",
            OpCode::Ldarg => "ldarg",
            OpCode::Starg => "starg",
            OpCode::Ldfld => "ldfld",
            OpCode::Stfld => "stfld",
            OpCode::Ldsfld => "ldsfld",
            OpCode::Stsfld => "stsfld",
            OpCode::Call => "call",
            OpCode::Callvirt => "callvirt",
            OpCode::Newobj => "newobj",
            OpCode::Newarr => "newarr",
            OpCode::Stelem => "stelem",
            OpCode::Pop => "pop",
            OpCode::Dup => "dup",
            OpCode::Ret => "ret",
            OpCode::Br => "br",
            OpCode::Add => "add",
            OpCode::Sub => "sub",
            OpCode::Mul => "mul",
            OpCode::Div => "div",
            OpCode::Rem => "rem",
            OpCode::And => "and",
            OpCode::Or => "or",
            OpCode::Xor => "xor",
            OpCode::Neg => "neg",
            OpCode::Ceq => "ceq",
            OpCode::Cgt => "cgt",
            OpCode::Clt => "clt",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    None,
    I4(i32),
    I8(i64),
    R4(f32),
    R8(f64),
    String(String),
    Local(u16),
    Arg(u16),
    Field(FieldRef),
    Method(MethodRef),
    Ctor(CtorRef),
    Type(TypeId),
    Target(u32),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub opcode: OpCode,
    pub operand: Operand,
}

impl Instruction {
    pub fn new(opcode: OpCode) -> Self {
        Self {
            opcode,
            operand: Operand::None,
        }
    }

    pub fn with(opcode: OpCode, operand: Operand) -> Self {
        Self { opcode, operand }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.opcode.mnemonic())?;
        match &self.operand {
            Operand::None => Ok(()),
            Operand::I4(value) => write!(f, " {value}"),
            Operand::I8(value) => write!(f, " {value}"),
            Operand::R4(value) => write!(f, " {value}"),
            Operand::R8(value) => write!(f, " {value}"),
            Operand::String(value) => write!(f, " {value:?}"),
            Operand::Local(index) => write!(f, " V_{index}"),
            Operand::Arg(index) => write!(f, " A_{index}"),
            Operand::Field(field) => write!(f, " field#{}.{}", field.owner.0, field.index),
            Operand::Method(method) => write!(f, " method#{}.{}", method.owner.0, method.index),
            Operand::Ctor(ctor) => write!(f, " ctor#{}.{}", ctor.owner.0, ctor.index),
            Operand::Type(ty) => write!(f, " type#{}", ty.0),
            Operand::Target(target) => write!(f, " IL_{target:04}"),
        }
    }
}

/// How an operator is lowered once both operands are on the stack.
#[derive(Clone, Debug, PartialEq)]
pub enum Lowering {
    Native(&'static [OpCode]),
    Call(MethodRef),
    Nothing,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OperatorPlan {
    pub op: OperatorKind,
    pub lowering: Lowering,
    /// Type left on the stack, when known.
    pub result: Option<TypeId>,
}

fn native_sequence(op: OperatorKind) -> Option<&'static [OpCode]> {
    let sequence: &'static [OpCode] = match op {
        OperatorKind::Add => &[OpCode::Add],
        OperatorKind::Sub => &[OpCode::Sub],
        OperatorKind::Mul => &[OpCode::Mul],
        OperatorKind::Div => &[OpCode::Div],
        OperatorKind::Mod => &[OpCode::Rem],
        OperatorKind::Eq => &[OpCode::Ceq],
        OperatorKind::NotEq => &[OpCode::Ceq, OpCode::LdcI4Zero, OpCode::Ceq],
        OperatorKind::Gt => &[OpCode::Cgt],
        OperatorKind::Lt => &[OpCode::Clt],
        OperatorKind::GtEq => &[OpCode::Clt, OpCode::LdcI4Zero, OpCode::Ceq],
        OperatorKind::LtEq => &[OpCode::Cgt, OpCode::LdcI4Zero, OpCode::Ceq],
        OperatorKind::And => &[OpCode::And],
        OperatorKind::Or => &[OpCode::Or],
        OperatorKind::Xor => &[OpCode::Xor],
        _ => return None,
    };
    Some(sequence)
}

fn operator_method(op: OperatorKind) -> Option<&'static str> {
    let name = match op {
        OperatorKind::Add => "op_Addition",
        OperatorKind::Sub => "op_Subtraction",
        OperatorKind::Mul => "op_Multiply",
        OperatorKind::Div => "op_Division",
        OperatorKind::Eq => "op_Equality",
        OperatorKind::NotEq => "op_Inequality",
        OperatorKind::Gt => "op_GreaterThan",
        OperatorKind::Lt => "op_LessThan",
        OperatorKind::GtEq => "op_GreaterThanOrEqual",
        OperatorKind::LtEq => "op_LessThanOrEqual",
        _ => return None,
    };
    Some(name)
}

fn is_comparison(op: OperatorKind) -> bool {
    matches!(
        op,
        OperatorKind::Eq
            | OperatorKind::NotEq
            | OperatorKind::Gt
            | OperatorKind::Lt
            | OperatorKind::GtEq
            | OperatorKind::LtEq
    )
}

fn invalid_operator(message: String) -> BuildError {
    BuildError::new(DiagnosticKind::InvalidOperator, message)
}

/// Picks the lowering of `op` from the type of its left operand. An unknown
/// left type falls back to the native opcode.
pub fn plan_operator(
    symbols: &SymbolTable,
    lhs: Option<TypeId>,
    op: OperatorKind,
) -> Result<OperatorPlan, BuildError> {
    let known = symbols.well_known();
    let comparison_result = |result: Option<TypeId>| {
        if is_comparison(op) {
            Some(known.boolean)
        } else {
            result
        }
    };

    match op {
        OperatorKind::In | OperatorKind::Range => {
            return Ok(OperatorPlan {
                op,
                lowering: Lowering::Nothing,
                result: lhs,
            });
        }
        OperatorKind::Pow => {
            let pow = symbols
                .find_method(known.math, "Pow", &[Some(known.double), Some(known.double)])
                .ok_or_else(|| invalid_operator("Math.Pow is not available".to_string()))?;
            return Ok(OperatorPlan {
                op,
                lowering: Lowering::Call(pow),
                result: Some(known.double),
            });
        }
        _ => {}
    }

    let Some(native) = native_sequence(op) else {
        return Err(invalid_operator(format!(
            "operator {op} cannot be used between two values"
        )));
    };
    let Some(lhs) = lhs else {
        return Ok(OperatorPlan {
            op,
            lowering: Lowering::Native(native),
            result: comparison_result(None),
        });
    };

    let category = symbols.category(lhs);
    let native_plan = || OperatorPlan {
        op,
        lowering: Lowering::Native(native),
        result: comparison_result(Some(lhs)),
    };
    match op {
        OperatorKind::Mod if category.is_number() => return Ok(native_plan()),
        OperatorKind::Mod => {
            return Err(invalid_operator(format!(
                "operator MOD cannot be used with non-number type {}",
                symbols.type_name(lhs)
            )));
        }
        OperatorKind::And | OperatorKind::Or if category == TypeCategory::Bool => {
            return Ok(native_plan());
        }
        OperatorKind::And | OperatorKind::Or => {
            return Err(invalid_operator(format!(
                "operator {op} cannot be used with non-boolean type {}",
                symbols.type_name(lhs)
            )));
        }
        OperatorKind::Xor => return Ok(native_plan()),
        OperatorKind::Eq | OperatorKind::NotEq if category == TypeCategory::Bool => {
            return Ok(native_plan());
        }
        OperatorKind::Add if category == TypeCategory::String => {
            let concat = symbols
                .find_method(lhs, "Concat", &[Some(lhs), Some(lhs)])
                .ok_or_else(|| invalid_operator("String.Concat is not available".to_string()))?;
            return Ok(OperatorPlan {
                op,
                lowering: Lowering::Call(concat),
                result: Some(lhs),
            });
        }
        _ if category.is_number() => return Ok(native_plan()),
        _ => {}
    }

    let name = operator_method(op)
        .ok_or_else(|| invalid_operator(format!("operator {op} has no method form")))?;
    let method = symbols.find_operator(lhs, name).ok_or_else(|| {
        invalid_operator(format!(
            "type {} has no operator method {name}",
            symbols.type_name(lhs)
        ))
    })?;
    Ok(OperatorPlan {
        op,
        lowering: Lowering::Call(method),
        result: Some(symbols.method(method).ret),
    })
}

/// Start and end instruction positions of one sequence element, with its type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SequenceElement {
    pub start: usize,
    pub end: usize,
    pub ty: Option<TypeId>,
}

/// Writes into the open method, resolving operands against the symbol table.
pub struct Emitter<'a> {
    symbols: &'a SymbolTable,
    method: &'a mut MethodBuilder,
}

impl<'a> Emitter<'a> {
    pub fn new(symbols: &'a SymbolTable, method: &'a mut MethodBuilder) -> Self {
        Self { symbols, method }
    }

    pub fn symbols(&self) -> &SymbolTable {
        self.symbols
    }

    pub fn method(&mut self) -> &mut MethodBuilder {
        self.method
    }

    pub fn emit(&mut self, opcode: OpCode) {
        self.method.emit(opcode, Operand::None);
    }

    pub fn load_constant(&mut self, literal: &Literal) -> TypeId {
        let (opcode, operand) = match literal {
            Literal::Null => (OpCode::Ldnull, Operand::None),
            Literal::Int(value) => (OpCode::LdcI4, Operand::I4(*value)),
            Literal::String(value) => (OpCode::Ldstr, Operand::String(value.clone())),
            Literal::SByte(value) => (OpCode::LdcI4S, Operand::I4(i32::from(*value))),
            Literal::Bool(true) => (OpCode::LdcI4One, Operand::None),
            Literal::Bool(false) => (OpCode::LdcI4Zero, Operand::None),
            Literal::Char(value) => (OpCode::LdcI4, Operand::I4(u32::from(*value) as i32)),
            Literal::Float(value) => (OpCode::LdcR4, Operand::R4(*value)),
            Literal::Short(value) => (OpCode::LdcI4, Operand::I4(i32::from(*value))),
            Literal::Long(value) => (OpCode::LdcI8, Operand::I8(*value)),
            Literal::Double(value) => (OpCode::LdcR8, Operand::R8(*value)),
        };
        self.method.emit(opcode, operand);
        self.symbols.literal_type(literal)
    }

    /// Emits the call and, when `discard` is set, pops a non-void result.
    /// Returns the type left on the stack.
    pub fn call(&mut self, method: MethodRef, discard: bool) -> Option<TypeId> {
        let def = self.symbols.method(method);
        let opcode = if def.is_virtual {
            OpCode::Callvirt
        } else {
            OpCode::Call
        };
        self.method.emit(opcode, Operand::Method(method));
        if self.symbols.is_void(def.ret) {
            return None;
        }
        if discard {
            self.emit(OpCode::Pop);
            return None;
        }
        Some(def.ret)
    }

    pub fn load_field(&mut self, field: Option<FieldRef>) -> Result<TypeId, BuildError> {
        let field = field.ok_or_else(|| {
            BuildError::new(DiagnosticKind::VarNotFound, "incorrect field given for load")
        })?;
        let def = self.symbols.field(field);
        let opcode = if def.is_static {
            OpCode::Ldsfld
        } else {
            OpCode::Ldfld
        };
        self.method.emit(opcode, Operand::Field(field));
        Ok(def.ty)
    }

    pub fn store_field(&mut self, field: Option<FieldRef>) -> Result<(), BuildError> {
        let field = field.ok_or_else(|| {
            BuildError::new(DiagnosticKind::VarNotFound, "incorrect field given for assign")
        })?;
        let opcode = if self.symbols.field(field).is_static {
            OpCode::Stsfld
        } else {
            OpCode::Stfld
        };
        self.method.emit(opcode, Operand::Field(field));
        Ok(())
    }

    pub fn load_local(&mut self, local: Option<LocalVar>) -> Result<TypeId, BuildError> {
        let local = local.ok_or_else(|| {
            BuildError::new(DiagnosticKind::VarNotFound, "incorrect local given for load")
        })?;
        match local.slot {
            VarSlot::Local(index) | VarSlot::Final(index) => {
                self.method.emit(OpCode::Ldloc, Operand::Local(index))
            }
            VarSlot::Param(index) => self.method.emit(OpCode::Ldarg, Operand::Arg(index)),
        }
        Ok(local.ty)
    }

    pub fn store_local(&mut self, local: Option<LocalVar>) -> Result<(), BuildError> {
        let local = local.ok_or_else(|| {
            BuildError::new(DiagnosticKind::VarNotFound, "incorrect local given for assign")
        })?;
        self.method.mark_assigned(local.slot)?;
        match local.slot {
            VarSlot::Local(index) | VarSlot::Final(index) => {
                self.method.emit(OpCode::Stloc, Operand::Local(index))
            }
            VarSlot::Param(index) => self.method.emit(OpCode::Starg, Operand::Arg(index)),
        }
        Ok(())
    }

    /// Pushes the receiver of the method being built.
    pub fn load_this(&mut self) {
        self.method.emit(OpCode::Ldarg, Operand::Arg(0));
    }

    pub fn new_object(&mut self, ctor: Option<CtorRef>) -> Result<TypeId, BuildError> {
        let ctor = ctor.ok_or_else(|| {
            BuildError::new(
                DiagnosticKind::TypeNotFound,
                "constructor not found for operator 'new'",
            )
        })?;
        self.method.emit(OpCode::Newobj, Operand::Ctor(ctor));
        Ok(ctor.owner)
    }

    pub fn binary_operator(
        &mut self,
        lhs: Option<TypeId>,
        op: OperatorKind,
    ) -> Result<Option<TypeId>, BuildError> {
        let plan = plan_operator(self.symbols, lhs, op)?;
        self.apply(&plan);
        Ok(plan.result)
    }

    pub fn apply(&mut self, plan: &OperatorPlan) {
        match &plan.lowering {
            Lowering::Native(sequence) => {
                for &opcode in *sequence {
                    self.emit(opcode);
                }
            }
            Lowering::Call(method) => {
                self.method.emit(OpCode::Call, Operand::Method(*method));
            }
            Lowering::Nothing => {}
        }
    }

    /// Logical negation of the boolean on top of the stack.
    pub fn not(&mut self) -> TypeId {
        self.emit(OpCode::LdcI4Zero);
        self.emit(OpCode::Ceq);
        self.symbols.well_known().boolean
    }

    /// `INC`/`DEC` on the value on top of the stack.
    pub fn step(&mut self, op: OperatorKind) {
        self.emit(OpCode::LdcI4One);
        if op == OperatorKind::Dec {
            self.emit(OpCode::Sub);
        } else {
            self.emit(OpCode::Add);
        }
    }

    /// Rewrites the element code emitted since `start` into an array
    /// construction. Returns the array type.
    pub fn lower_sequence(&mut self, start: usize, elements: &[SequenceElement]) -> TypeId {
        let known = self.symbols.well_known();
        let element_type = match elements.first().and_then(|first| first.ty) {
            Some(first) if elements.iter().all(|element| element.ty == Some(first)) => first,
            _ => known.object,
        };

        let tail = self.method.take_tail(start);
        self.method
            .emit(OpCode::LdcI4, Operand::I4(elements.len() as i32));
        self.method
            .emit(OpCode::Newarr, Operand::Type(element_type));
        for (index, element) in elements.iter().enumerate() {
            let from = element.start.saturating_sub(start).min(tail.len());
            let to = element.end.saturating_sub(start).min(tail.len()).max(from);
            self.emit(OpCode::Dup);
            self.method.emit(OpCode::LdcI4, Operand::I4(index as i32));
            self.method.extend(tail[from..to].iter().cloned());
            self.method
                .emit(OpCode::Stelem, Operand::Type(element_type));
        }
        known.array
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MethodSlot;

    fn builder() -> MethodBuilder {
        MethodBuilder::new(
            MethodSlot::Method(MethodRef {
                owner: TypeId(0),
                index: 0,
            }),
            true,
        )
    }

    fn opcodes(method: &MethodBuilder) -> Vec<OpCode> {
        method.code().iter().map(|ins| ins.opcode).collect()
    }

    #[test]
    fn constants_pick_opcode_by_category() {
        let symbols = SymbolTable::with_host_library();
        let mut method = builder();
        let mut emitter = Emitter::new(&symbols, &mut method);
        emitter.load_constant(&Literal::Bool(true));
        emitter.load_constant(&Literal::SByte(-3));
        emitter.load_constant(&Literal::Long(9));
        let ty = emitter.load_constant(&Literal::String("hi".to_string()));
        assert_eq!(ty, symbols.well_known().string);
        assert_eq!(
            opcodes(&method),
            vec![OpCode::LdcI4One, OpCode::LdcI4S, OpCode::LdcI8, OpCode::Ldstr]
        );
    }

    #[test]
    fn binary_operator_emits_once_planned() {
        let symbols = SymbolTable::with_host_library();
        let known = *symbols.well_known();
        let mut method = builder();
        let mut emitter = Emitter::new(&symbols, &mut method);
        let result = emitter
            .binary_operator(Some(known.int32), OperatorKind::Mul)
            .expect("int multiply");
        assert_eq!(result, Some(known.int32));
        let err = emitter
            .binary_operator(Some(known.object), OperatorKind::Sub)
            .expect_err("object subtraction");
        assert_eq!(err.kind, DiagnosticKind::InvalidOperator);
        assert_eq!(opcodes(&method), vec![OpCode::Mul]);
    }

    #[test]
    fn inverted_comparisons_for_greater_or_equal() {
        let symbols = SymbolTable::with_host_library();
        let int = symbols.well_known().int32;
        let plan = plan_operator(&symbols, Some(int), OperatorKind::GtEq).expect("plan");
        assert_eq!(
            plan.lowering,
            Lowering::Native(&[OpCode::Clt, OpCode::LdcI4Zero, OpCode::Ceq])
        );
        assert_eq!(plan.result, Some(symbols.well_known().boolean));
    }

    #[test]
    fn string_addition_calls_concat() {
        let symbols = SymbolTable::with_host_library();
        let string = symbols.well_known().string;
        let plan = plan_operator(&symbols, Some(string), OperatorKind::Add).expect("plan");
        let Lowering::Call(method) = &plan.lowering else {
            panic!("expected a call, got {:?}", plan.lowering);
        };
        assert_eq!(symbols.method(*method).name, "Concat");
    }

    #[test]
    fn decimal_uses_operator_methods() {
        let symbols = SymbolTable::with_host_library();
        let decimal = symbols.resolve_type("decimal", &[]).expect("decimal");
        let plan = plan_operator(&symbols, Some(decimal), OperatorKind::LtEq).expect("plan");
        let Lowering::Call(method) = &plan.lowering else {
            panic!("expected a call, got {:?}", plan.lowering);
        };
        assert_eq!(symbols.method(*method).name, "op_LessThanOrEqual");
    }

    #[test]
    fn missing_operator_method_is_a_diagnostic() {
        let symbols = SymbolTable::with_host_library();
        let known = *symbols.well_known();
        let err = plan_operator(&symbols, Some(known.object), OperatorKind::Sub)
            .expect_err("object has no op_Subtraction");
        assert_eq!(err.kind, DiagnosticKind::InvalidOperator);

        let err = plan_operator(&symbols, Some(known.string), OperatorKind::Mod)
            .expect_err("mod on string");
        assert_eq!(err.kind, DiagnosticKind::InvalidOperator);

        let err = plan_operator(&symbols, Some(known.int32), OperatorKind::And)
            .expect_err("and on int");
        assert_eq!(err.kind, DiagnosticKind::InvalidOperator);
    }

    #[test]
    fn unknown_left_type_stays_native() {
        let symbols = SymbolTable::with_host_library();
        let plan = plan_operator(&symbols, None, OperatorKind::Mul).expect("plan");
        assert_eq!(plan.lowering, Lowering::Native(&[OpCode::Mul]));
        let range = plan_operator(&symbols, None, OperatorKind::Range).expect("plan");
        assert_eq!(range.lowering, Lowering::Nothing);
    }

    #[test]
    fn discarded_call_pops_non_void_result() {
        let symbols = SymbolTable::with_host_library();
        let known = *symbols.well_known();
        let abs = symbols
            .find_method(known.math, "Abs", &[Some(known.int32)])
            .expect("Abs(int)");
        let mut method = builder();
        let mut emitter = Emitter::new(&symbols, &mut method);
        assert_eq!(emitter.call(abs, true), None);
        assert_eq!(opcodes(&method), vec![OpCode::Call, OpCode::Pop]);
    }

    #[test]
    fn sequence_elements_are_wrapped_in_array_stores() {
        let symbols = SymbolTable::with_host_library();
        let int = symbols.well_known().int32;
        let mut method = builder();
        let mut emitter = Emitter::new(&symbols, &mut method);
        emitter.load_constant(&Literal::Int(7));
        emitter.load_constant(&Literal::Int(8));
        let elements = [
            SequenceElement {
                start: 0,
                end: 1,
                ty: Some(int),
            },
            SequenceElement {
                start: 1,
                end: 2,
                ty: Some(int),
            },
        ];
        let array = emitter.lower_sequence(0, &elements);
        assert_eq!(array, symbols.well_known().array);
        assert_eq!(
            opcodes(&method),
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
            ]
        );
        assert_eq!(method.code()[1].operand, Operand::Type(int));
    }
}
