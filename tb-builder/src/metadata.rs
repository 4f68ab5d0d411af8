//! Owners of the type and method currently under construction.

use std::collections::HashMap;

use crate::diagnostics::{BuildError, DiagnosticKind};
use crate::emit::{Instruction, OpCode, Operand};
use crate::symbols::{CtorRef, MethodRef, SymbolTable, TypeId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodSlot {
    Method(MethodRef),
    Constructor(CtorRef),
}

/// Where a named variable lives. Locals and finals share the local index space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarSlot {
    Local(u16),
    Final(u16),
    Param(u16),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocalVar {
    pub slot: VarSlot,
    pub ty: TypeId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeId,
}

#[derive(Clone, Debug, PartialEq)]
struct Local {
    name: String,
    ty: TypeId,
    assigned: bool,
}

struct Fixup {
    at: usize,
    label: String,
}

/// A finished method: its slot, local types in index order, and the code.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodBody {
    pub slot: MethodSlot,
    pub params: Vec<Param>,
    pub locals: Vec<TypeId>,
    pub code: Vec<Instruction>,
}

pub struct MethodBuilder {
    slot: MethodSlot,
    is_static: bool,
    params: Vec<Param>,
    params_open: bool,
    locals: Vec<Local>,
    mutable: HashMap<String, u16>,
    finals: HashMap<String, u16>,
    code: Vec<Instruction>,
    labels: HashMap<String, u32>,
    fixups: Vec<Fixup>,
}

impl MethodBuilder {
    pub fn new(slot: MethodSlot, is_static: bool) -> Self {
        Self {
            slot,
            is_static,
            params: Vec::new(),
            params_open: true,
            locals: Vec::new(),
            mutable: HashMap::new(),
            finals: HashMap::new(),
            code: Vec::new(),
            labels: HashMap::new(),
            fixups: Vec::new(),
        }
    }

    pub fn slot(&self) -> MethodSlot {
        self.slot
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// True while `var` tokens still declare parameters.
    pub fn params_open(&self) -> bool {
        self.params_open
    }

    pub fn close_params(&mut self) {
        self.params_open = false;
    }

    /// True until the first parameter, local, or instruction exists.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.locals.is_empty() && self.code.is_empty()
    }

    pub fn declare_param(&mut self, name: &str, ty: TypeId) -> Result<VarSlot, BuildError> {
        if self.params.iter().any(|param| param.name == name) {
            return Err(BuildError::new(
                DiagnosticKind::InvalidToken,
                format!("parameter {name} is already declared"),
            ));
        }
        // Argument 0 is the receiver of instance methods.
        let offset = u16::from(!self.is_static);
        let index = self.params.len() as u16 + offset;
        self.params.push(Param {
            name: name.to_string(),
            ty,
        });
        Ok(VarSlot::Param(index))
    }

    /// Resolves `type_name` and records a local. Nothing is recorded when the
    /// type cannot be found.
    pub fn declare_local(
        &mut self,
        symbols: &SymbolTable,
        name: &str,
        type_name: &str,
        namespaces: &[String],
        is_final: bool,
    ) -> Result<LocalVar, BuildError> {
        let ty = symbols.resolve_type(type_name, namespaces).ok_or_else(|| {
            BuildError::new(
                DiagnosticKind::TypeNotFound,
                format!("type {type_name} of local {name} not found"),
            )
        })?;
        if self.mutable.contains_key(name) || self.finals.contains_key(name) {
            return Err(BuildError::new(
                DiagnosticKind::InvalidToken,
                format!("local {name} is already declared"),
            ));
        }
        let index = self.locals.len() as u16;
        self.locals.push(Local {
            name: name.to_string(),
            ty,
            assigned: false,
        });
        let slot = if is_final {
            self.finals.insert(name.to_string(), index);
            VarSlot::Final(index)
        } else {
            self.mutable.insert(name.to_string(), index);
            VarSlot::Local(index)
        };
        Ok(LocalVar { slot, ty })
    }

    /// Finals, then mutable locals, then parameters.
    pub fn get_local(&self, name: &str) -> Option<LocalVar> {
        if let Some(&index) = self.finals.get(name) {
            return Some(LocalVar {
                slot: VarSlot::Final(index),
                ty: self.locals[index as usize].ty,
            });
        }
        if let Some(&index) = self.mutable.get(name) {
            return Some(LocalVar {
                slot: VarSlot::Local(index),
                ty: self.locals[index as usize].ty,
            });
        }
        let offset = u16::from(!self.is_static);
        self.params
            .iter()
            .position(|param| param.name == name)
            .map(|position| LocalVar {
                slot: VarSlot::Param(position as u16 + offset),
                ty: self.params[position].ty,
            })
    }

    /// Records a store. A final accepts exactly one.
    pub fn mark_assigned(&mut self, slot: VarSlot) -> Result<(), BuildError> {
        let VarSlot::Final(index) = slot else {
            return Ok(());
        };
        let local = &mut self.locals[index as usize];
        if local.assigned {
            return Err(BuildError::new(
                DiagnosticKind::InvalidOperator,
                format!("final {} cannot be assigned twice", local.name),
            ));
        }
        local.assigned = true;
        Ok(())
    }

    pub fn emit(&mut self, opcode: OpCode, operand: Operand) {
        self.code.push(Instruction { opcode, operand });
    }

    pub fn position(&self) -> usize {
        self.code.len()
    }

    pub fn code(&self) -> &[Instruction] {
        &self.code
    }

    pub fn last_opcode(&self) -> Option<OpCode> {
        self.code.last().map(|instruction| instruction.opcode)
    }

    pub fn remove_last(&mut self) -> Option<Instruction> {
        self.code.pop()
    }

    /// Removes everything from `start` on so the caller can re-emit it wrapped.
    pub fn take_tail(&mut self, start: usize) -> Vec<Instruction> {
        self.code.split_off(start.min(self.code.len()))
    }

    pub fn extend(&mut self, instructions: impl IntoIterator<Item = Instruction>) {
        self.code.extend(instructions);
    }

    pub fn label(&mut self, name: &str) -> Result<(), BuildError> {
        if self.labels.contains_key(name) {
            return Err(BuildError::new(
                DiagnosticKind::InvalidToken,
                format!("label {name} is already defined"),
            ));
        }
        self.labels.insert(name.to_string(), self.code.len() as u32);
        Ok(())
    }

    pub fn branch(&mut self, label: &str) {
        self.fixups.push(Fixup {
            at: self.code.len(),
            label: label.to_string(),
        });
        self.emit(OpCode::Br, Operand::Target(0));
    }

    /// Resolves branch targets. Unknown labels are reported and left at 0.
    pub fn finish(mut self) -> (MethodBody, Vec<BuildError>) {
        let mut errors = Vec::new();
        for fixup in self.fixups.drain(..) {
            match self.labels.get(&fixup.label) {
                Some(&target) => self.code[fixup.at].operand = Operand::Target(target),
                None => errors.push(BuildError::new(
                    DiagnosticKind::InvalidToken,
                    format!("label {} is never defined", fixup.label),
                )),
            }
        }
        let body = MethodBody {
            slot: self.slot,
            params: self.params,
            locals: self.locals.into_iter().map(|local| local.ty).collect(),
            code: self.code,
        };
        (body, errors)
    }
}

/// A declared type while its body is being read.
pub struct TypeBuilder {
    id: TypeId,
    open: bool,
    initializing: bool,
    members: usize,
    base_name: Option<String>,
    interface_names: Vec<String>,
    methods: Vec<MethodBody>,
    method_stack: Vec<MethodBuilder>,
}

impl TypeBuilder {
    pub fn new(id: TypeId) -> Self {
        Self {
            id,
            open: true,
            initializing: false,
            members: 0,
            base_name: None,
            interface_names: Vec::new(),
            methods: Vec::new(),
            method_stack: Vec::new(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_initializing(&self) -> bool {
        self.initializing
    }

    pub fn set_initializing(&mut self, initializing: bool) {
        self.initializing = initializing;
    }

    /// True while no field, method, or constructor was added.
    pub fn is_empty(&self) -> bool {
        self.members == 0
    }

    pub fn add_member(&mut self) {
        self.members += 1;
    }

    pub fn base_name(&self) -> Option<&str> {
        self.base_name.as_deref()
    }

    pub fn interface_names(&self) -> &[String] {
        &self.interface_names
    }

    /// Records the base type name. Ignored once the type is closed.
    pub fn extends(&mut self, name: &str) -> bool {
        if !self.open {
            return false;
        }
        self.base_name = Some(name.to_string());
        true
    }

    pub fn implements(&mut self, name: &str) -> bool {
        if !self.open {
            return false;
        }
        self.interface_names.push(name.to_string());
        true
    }

    pub fn open_method(&mut self, method: MethodBuilder) {
        self.method_stack.push(method);
    }

    pub fn current_method(&self) -> Option<&MethodBuilder> {
        self.method_stack.last()
    }

    pub fn current_method_mut(&mut self) -> Option<&mut MethodBuilder> {
        self.method_stack.last_mut()
    }

    pub fn open_methods(&self) -> usize {
        self.method_stack.len()
    }

    pub fn close_method(&mut self) -> Vec<BuildError> {
        let Some(method) = self.method_stack.pop() else {
            return Vec::new();
        };
        let (body, errors) = method.finish();
        self.methods.push(body);
        errors
    }

    pub fn methods(&self) -> &[MethodBody] {
        &self.methods
    }

    pub fn into_methods(self) -> Vec<MethodBody> {
        self.methods
    }

    /// Closes remaining methods, resolves the recorded base and interface
    /// names, and seals the type. A closed type is left untouched.
    pub fn end(&mut self, symbols: &mut SymbolTable, namespaces: &[String]) -> Vec<BuildError> {
        if !self.open {
            return Vec::new();
        }
        let mut errors = Vec::new();
        while !self.method_stack.is_empty() {
            errors.extend(self.close_method());
        }

        if let Some(base_name) = self.base_name.clone() {
            match symbols.resolve_type(&base_name, namespaces) {
                Some(base) if symbols.get(base).is_interface() => errors.push(BuildError::new(
                    DiagnosticKind::TypeNotFound,
                    format!("{base_name} is an interface and cannot be a base type"),
                )),
                Some(base) => symbols.get_mut(self.id).base = Some(base),
                None => errors.push(BuildError::new(
                    DiagnosticKind::TypeNotFound,
                    format!("base type {base_name} not found"),
                )),
            }
        }
        for name in &self.interface_names {
            match symbols.resolve_type(name, namespaces) {
                Some(iface) if symbols.get(iface).is_interface() => {
                    let def = symbols.get_mut(self.id);
                    if !def.interfaces.contains(&iface) {
                        def.interfaces.push(iface);
                    }
                }
                Some(_) => errors.push(BuildError::new(
                    DiagnosticKind::TypeNotFound,
                    format!("{name} is not an interface"),
                )),
                None => errors.push(BuildError::new(
                    DiagnosticKind::TypeNotFound,
                    format!("interface {name} not found"),
                )),
            }
        }
        self.initializing = false;
        self.open = false;
        errors
    }
}
