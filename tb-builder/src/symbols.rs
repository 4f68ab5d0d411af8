//! Explicit symbol table: the host library, included modules, and the types
//! declared by the current build. Lookups never mutate the table.

use std::collections::HashMap;

use tokens::{ClassKind, Literal, Visibility};

use crate::diagnostics::{BuildError, DiagnosticKind};

mod host;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Coarse classification the emitter switches on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    Void,
    Object,
    Bool,
    Char,
    SByte,
    Int16,
    Int32,
    Int64,
    Single,
    Double,
    String,
    Reference,
    Value,
    Interface,
}

impl TypeCategory {
    pub fn is_number(self) -> bool {
        matches!(
            self,
            TypeCategory::Char
                | TypeCategory::SByte
                | TypeCategory::Int16
                | TypeCategory::Int32
                | TypeCategory::Int64
                | TypeCategory::Single
                | TypeCategory::Double
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Origin {
    Host,
    Declared,
    Included,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeId,
    pub is_static: bool,
    pub is_final: bool,
    pub visibility: Visibility,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MethodAttrs {
    pub entry_point: bool,
    pub script: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodDef {
    pub name: String,
    pub params: Vec<TypeId>,
    pub ret: TypeId,
    pub is_static: bool,
    pub is_virtual: bool,
    pub visibility: Visibility,
    pub attrs: MethodAttrs,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CtorDef {
    pub params: Vec<TypeId>,
    pub visibility: Visibility,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeDef {
    pub name: String,
    pub namespace: String,
    pub kind: ClassKind,
    pub visibility: Visibility,
    pub category: TypeCategory,
    pub origin: Origin,
    pub base: Option<TypeId>,
    pub interfaces: Vec<TypeId>,
    pub fields: Vec<FieldDef>,
    pub methods: Vec<MethodDef>,
    pub constructors: Vec<CtorDef>,
}

impl TypeDef {
    pub fn new(name: &str, namespace: &str, kind: ClassKind, origin: Origin) -> Self {
        let category = match kind {
            ClassKind::Interface => TypeCategory::Interface,
            ClassKind::Struct | ClassKind::Enum => TypeCategory::Value,
            _ => TypeCategory::Reference,
        };
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            kind,
            visibility: Visibility::Public,
            category,
            origin,
            base: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
        }
    }

    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    pub fn is_interface(&self) -> bool {
        self.kind == ClassKind::Interface
    }

    pub fn is_static(&self) -> bool {
        self.kind == ClassKind::Static
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub owner: TypeId,
    pub index: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub owner: TypeId,
    pub index: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CtorRef {
    pub owner: TypeId,
    pub index: usize,
}

/// Host types the builder refers to directly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WellKnown {
    pub object: TypeId,
    pub void: TypeId,
    pub boolean: TypeId,
    pub char: TypeId,
    pub sbyte: TypeId,
    pub int16: TypeId,
    pub int32: TypeId,
    pub int64: TypeId,
    pub single: TypeId,
    pub double: TypeId,
    pub string: TypeId,
    pub array: TypeId,
    pub math: TypeId,
}

#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    types: Vec<TypeDef>,
    by_name: HashMap<String, TypeId>,
    well_known: WellKnown,
}

impl SymbolTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_host_library() -> Self {
        let mut table = Self::default();
        table.well_known = host::install(&mut table);
        table
    }

    pub fn well_known(&self) -> &WellKnown {
        &self.well_known
    }

    /// Registers a type under its full name. Fails when the name is taken.
    pub fn define(&mut self, def: TypeDef) -> Result<TypeId, BuildError> {
        let full_name = def.full_name();
        if self.by_name.contains_key(&full_name) {
            return Err(BuildError::new(
                DiagnosticKind::InvalidToken,
                format!("type {full_name} is already defined"),
            ));
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(def);
        self.by_name.insert(full_name, id);
        Ok(id)
    }

    /// Extra global name for an existing type, such as `int` for `System.Int32`.
    pub fn alias(&mut self, name: &str, id: TypeId) {
        self.by_name.insert(name.to_string(), id);
    }

    pub fn lookup(&self, full_name: &str) -> Option<TypeId> {
        self.by_name.get(full_name).copied()
    }

    /// Bare name first, then each namespace in registration order.
    pub fn resolve_type(&self, name: &str, namespaces: &[String]) -> Option<TypeId> {
        if let Some(id) = self.lookup(name) {
            return Some(id);
        }
        namespaces
            .iter()
            .find_map(|namespace| self.lookup(&format!("{namespace}.{name}")))
    }

    pub fn get(&self, id: TypeId) -> &TypeDef {
        &self.types[id.index()]
    }

    pub fn get_mut(&mut self, id: TypeId) -> &mut TypeDef {
        &mut self.types[id.index()]
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &TypeDef)> {
        self.types
            .iter()
            .enumerate()
            .map(|(index, def)| (TypeId(index as u32), def))
    }

    pub fn type_name(&self, id: TypeId) -> String {
        self.get(id).full_name()
    }

    pub fn category(&self, id: TypeId) -> TypeCategory {
        self.get(id).category
    }

    pub fn is_void(&self, id: TypeId) -> bool {
        self.category(id) == TypeCategory::Void
    }

    pub fn field(&self, field: FieldRef) -> &FieldDef {
        &self.get(field.owner).fields[field.index]
    }

    pub fn method(&self, method: MethodRef) -> &MethodDef {
        &self.get(method.owner).methods[method.index]
    }

    pub fn method_mut(&mut self, method: MethodRef) -> &mut MethodDef {
        &mut self.get_mut(method.owner).methods[method.index]
    }

    pub fn ctor(&self, ctor: CtorRef) -> &CtorDef {
        &self.get(ctor.owner).constructors[ctor.index]
    }

    pub fn ctor_mut(&mut self, ctor: CtorRef) -> &mut CtorDef {
        &mut self.get_mut(ctor.owner).constructors[ctor.index]
    }

    pub fn add_field(&mut self, owner: TypeId, field: FieldDef) -> FieldRef {
        let fields = &mut self.get_mut(owner).fields;
        fields.push(field);
        FieldRef {
            owner,
            index: fields.len() - 1,
        }
    }

    pub fn add_method(&mut self, owner: TypeId, method: MethodDef) -> MethodRef {
        let methods = &mut self.get_mut(owner).methods;
        methods.push(method);
        MethodRef {
            owner,
            index: methods.len() - 1,
        }
    }

    pub fn add_ctor(&mut self, owner: TypeId, ctor: CtorDef) -> CtorRef {
        let constructors = &mut self.get_mut(owner).constructors;
        constructors.push(ctor);
        CtorRef {
            owner,
            index: constructors.len() - 1,
        }
    }

    /// Splits `Owner.Path.member` on the last separator and looks the member
    /// up on the owner type.
    pub fn resolve_field(&self, dotted: &str, namespaces: &[String]) -> Option<FieldRef> {
        let (owner, member) = dotted.rsplit_once('.')?;
        let owner = self.resolve_type(owner, namespaces)?;
        self.field_on(owner, member)
    }

    pub fn field_on(&self, owner: TypeId, name: &str) -> Option<FieldRef> {
        self.ancestry(owner).into_iter().find_map(|id| {
            self.get(id)
                .fields
                .iter()
                .position(|field| field.name == name)
                .map(|index| FieldRef { owner: id, index })
        })
    }

    pub fn has_method_named(&self, owner: TypeId, name: &str) -> bool {
        self.ancestry(owner)
            .into_iter()
            .any(|id| self.get(id).methods.iter().any(|method| method.name == name))
    }

    /// Exact signature match first, then the first assignable one. `None`
    /// argument types come from operands that failed to resolve and match
    /// any parameter.
    pub fn find_method(
        &self,
        owner: TypeId,
        name: &str,
        args: &[Option<TypeId>],
    ) -> Option<MethodRef> {
        let mut candidates = Vec::new();
        for id in self.ancestry(owner) {
            for (index, method) in self.get(id).methods.iter().enumerate() {
                if method.name == name && method.params.len() == args.len() {
                    candidates.push((MethodRef { owner: id, index }, method));
                }
            }
        }
        candidates
            .iter()
            .find(|(_, method)| self.params_exact(&method.params, args))
            .or_else(|| {
                candidates
                    .iter()
                    .find(|(_, method)| self.params_accept(&method.params, args))
            })
            .map(|(method_ref, _)| *method_ref)
    }

    /// Static two-argument operator method such as `op_Addition` whose first
    /// parameter accepts `lhs`.
    pub fn find_operator(&self, lhs: TypeId, name: &str) -> Option<MethodRef> {
        self.ancestry(lhs).into_iter().find_map(|id| {
            self.get(id)
                .methods
                .iter()
                .position(|method| {
                    method.name == name
                        && method.is_static
                        && method.params.len() == 2
                        && self.is_assignable(lhs, method.params[0])
                })
                .map(|index| MethodRef { owner: id, index })
        })
    }

    pub fn find_constructor(&self, owner: TypeId, args: &[Option<TypeId>]) -> Option<CtorRef> {
        let constructors = &self.get(owner).constructors;
        let position = constructors
            .iter()
            .position(|ctor| ctor.params.len() == args.len() && self.params_exact(&ctor.params, args))
            .or_else(|| {
                constructors.iter().position(|ctor| {
                    ctor.params.len() == args.len() && self.params_accept(&ctor.params, args)
                })
            })?;
        Some(CtorRef {
            owner,
            index: position,
        })
    }

    pub fn is_assignable(&self, from: TypeId, to: TypeId) -> bool {
        if from == to || to == self.well_known.object {
            return true;
        }
        self.ancestry(from).contains(&to)
    }

    pub fn literal_type(&self, literal: &Literal) -> TypeId {
        let known = &self.well_known;
        match literal {
            Literal::Null => known.object,
            Literal::Int(_) => known.int32,
            Literal::String(_) => known.string,
            Literal::SByte(_) => known.sbyte,
            Literal::Bool(_) => known.boolean,
            Literal::Char(_) => known.char,
            Literal::Float(_) => known.single,
            Literal::Short(_) => known.int16,
            Literal::Long(_) => known.int64,
            Literal::Double(_) => known.double,
        }
    }

    /// The type itself, its base chain, then every interface reachable from them.
    fn ancestry(&self, id: TypeId) -> Vec<TypeId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(ty) = current {
            if chain.contains(&ty) {
                break;
            }
            chain.push(ty);
            current = self.get(ty).base;
        }
        let mut index = 0;
        while index < chain.len() {
            for &iface in &self.get(chain[index]).interfaces {
                if !chain.contains(&iface) {
                    chain.push(iface);
                }
            }
            index += 1;
        }
        chain
    }

    fn params_exact(&self, params: &[TypeId], args: &[Option<TypeId>]) -> bool {
        params
            .iter()
            .zip(args)
            .all(|(param, arg)| arg.is_some_and(|arg| arg == *param))
    }

    fn params_accept(&self, params: &[TypeId], args: &[Option<TypeId>]) -> bool {
        params
            .iter()
            .zip(args)
            .all(|(param, arg)| arg.is_none_or(|arg| self.is_assignable(arg, *param)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn namespaces(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn aliases_resolve_without_namespaces() {
        let table = SymbolTable::with_host_library();
        let int = table.resolve_type("int", &[]).expect("int alias");
        assert_eq!(int, table.well_known().int32);
        assert_eq!(table.type_name(int), "System.Int32");
    }

    #[test]
    fn namespaced_lookup_needs_using() {
        let table = SymbolTable::with_host_library();
        assert_eq!(table.resolve_type("Math", &[]), None);
        assert_eq!(
            table.resolve_type("Math", &namespaces(&["System"])),
            Some(table.well_known().math)
        );
        assert!(
            table
                .resolve_type("StringBuilder", &namespaces(&["System.Text"]))
                .is_some()
        );
    }

    #[test]
    fn exact_overload_wins_over_object_parameter() {
        let table = SymbolTable::with_host_library();
        let known = *table.well_known();
        let console = table
            .resolve_type("System.Console", &[])
            .expect("console type");
        let method = table
            .find_method(console, "WriteLine", &[Some(known.int32)])
            .expect("WriteLine(int)");
        assert_eq!(table.method(method).params, vec![known.int32]);

        let fallback = table
            .find_method(console, "WriteLine", &[Some(known.boolean)])
            .expect("WriteLine(object)");
        assert_eq!(table.method(fallback).params, vec![known.object]);
    }

    #[test]
    fn inherited_methods_are_found_through_base() {
        let mut table = SymbolTable::with_host_library();
        let object = table.well_known().object;
        let mut def = TypeDef::new("Shape", "Demo", ClassKind::Default, Origin::Declared);
        def.base = Some(object);
        let shape = table.define(def).expect("define shape");
        let method = table
            .find_method(shape, "ToString", &[])
            .expect("inherited ToString");
        assert_eq!(method.owner, object);
        assert!(table.method(method).is_virtual);
    }

    #[test]
    fn duplicate_definition_is_rejected() {
        let mut table = SymbolTable::empty();
        table
            .define(TypeDef::new("A", "", ClassKind::Default, Origin::Declared))
            .expect("first definition");
        let err = table
            .define(TypeDef::new("A", "", ClassKind::Default, Origin::Declared))
            .expect_err("duplicate");
        assert_eq!(err.kind, DiagnosticKind::InvalidToken);
    }

    #[test]
    fn field_resolution_splits_on_last_separator() {
        let table = SymbolTable::with_host_library();
        let field = table
            .resolve_field("System.Math.PI", &[])
            .expect("Math.PI");
        assert_eq!(table.field(field).name, "PI");
        assert!(table.field(field).is_static);
        assert_eq!(table.resolve_field("PI", &[]), None);
    }
}
