//! One compilation run: the output module under construction, the type and
//! method stacks, constants, and the entry point.

use std::collections::HashMap;

use tokens::{ClassKind, FuncKind, HeaderKind, Literal, Visibility};
use tracing::{debug, info, warn};

use crate::config::{self, BuildConfig, OutputKind};
use crate::diagnostics::{BuildError, DiagnosticKind};
use crate::emit::{Emitter, OpCode};
use crate::metadata::{LocalVar, MethodBody, MethodBuilder, MethodSlot, TypeBuilder, VarSlot};
use crate::symbols::{
    CtorDef, FieldDef, FieldRef, MethodAttrs, MethodDef, MethodRef, Origin, SymbolTable, TypeDef,
    TypeId,
};

/// A declared type with its finished method bodies.
#[derive(Clone, Debug, PartialEq)]
pub struct ModuleType {
    pub id: TypeId,
    pub methods: Vec<MethodBody>,
}

/// Result of a build: metadata for every declared type plus method bodies.
#[derive(Clone, Debug)]
pub struct Module {
    pub name: String,
    pub version: String,
    pub header: HeaderKind,
    pub output: OutputKind,
    pub symbols: SymbolTable,
    pub types: Vec<ModuleType>,
    pub entry_point: Option<MethodRef>,
}

impl Module {
    pub fn type_named(&self, full_name: &str) -> Option<&ModuleType> {
        let id = self.symbols.lookup(full_name)?;
        self.types.iter().find(|ty| ty.id == id)
    }

    pub fn type_def(&self, ty: &ModuleType) -> &TypeDef {
        self.symbols.get(ty.id)
    }

    /// Body of the first method called `method` on the named type.
    pub fn method_body(&self, type_name: &str, method: &str) -> Option<&MethodBody> {
        let ty = self.type_named(type_name)?;
        ty.methods.iter().find(|body| match body.slot {
            MethodSlot::Method(method_ref) => self.symbols.method(method_ref).name == method,
            MethodSlot::Constructor(_) => method == ".ctor",
        })
    }
}

pub struct BuildSession {
    config: BuildConfig,
    symbols: SymbolTable,
    module_name: String,
    types: Vec<TypeBuilder>,
    type_stack: Vec<usize>,
    default_type: Option<usize>,
    default_method: Option<MethodRef>,
    constants: HashMap<String, Literal>,
    script_functions: Vec<MethodRef>,
    entry_point: Option<MethodRef>,
}

impl BuildSession {
    /// Picks the output kind from the header, names the module, and opens the
    /// implicit default type for class and script headers.
    pub fn create_output(mut config: BuildConfig, auto_name: bool) -> Self {
        match config.header {
            HeaderKind::Library => config.output = OutputKind::Dll,
            HeaderKind::Console => config.output = OutputKind::ConsoleApplication,
            HeaderKind::Gui => config.output = OutputKind::WindowApplication,
            _ => {}
        }
        let module_name = if auto_name {
            config.app_name.clone()
        } else {
            config.module_stem()
        };
        if !config::is_valid_dotted_name(&module_name) {
            warn!(module = %module_name, "module name is not a valid identifier");
        }

        let mut session = Self {
            config,
            symbols: SymbolTable::with_host_library(),
            module_name,
            types: Vec::new(),
            type_stack: Vec::new(),
            default_type: None,
            default_method: None,
            constants: HashMap::new(),
            script_functions: Vec::new(),
            entry_point: None,
        };

        let header = session.config.header;
        if matches!(header, HeaderKind::Class | HeaderKind::Script) {
            session.open_default_type(header == HeaderKind::Script);
        }
        debug!(
            module = %session.module_name,
            header = %header,
            output = session.config.output.name(),
            "created build session"
        );
        session
    }

    fn open_default_type(&mut self, script: bool) {
        let mut def = TypeDef::new(
            &self.config.main_class_name,
            "",
            ClassKind::Static,
            Origin::Declared,
        );
        def.visibility = Visibility::Private;
        def.base = Some(self.symbols.well_known().object);
        let id = match self.symbols.define(def) {
            Ok(id) => id,
            Err(err) => {
                warn!(%err, "default type could not be declared");
                return;
            }
        };
        self.types.push(TypeBuilder::new(id));
        let index = self.types.len() - 1;
        self.default_type = Some(index);

        if script {
            let void = self.symbols.well_known().void;
            let main = self.symbols.add_method(
                id,
                MethodDef {
                    name: "Main".to_string(),
                    params: Vec::new(),
                    ret: void,
                    is_static: true,
                    is_virtual: false,
                    visibility: Visibility::Private,
                    attrs: MethodAttrs {
                        entry_point: true,
                        script: true,
                    },
                },
            );
            let mut method = MethodBuilder::new(MethodSlot::Method(main), true);
            method.close_params();
            let ty = &mut self.types[index];
            ty.add_member();
            ty.open_method(method);
            self.default_method = Some(main);
            self.entry_point = Some(main);
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn header(&self) -> HeaderKind {
        self.config.header
    }

    pub fn set_output(&mut self, output: OutputKind) {
        self.config.output = output;
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    pub fn entry_point(&self) -> Option<MethodRef> {
        self.entry_point
    }

    pub fn declare_type(
        &mut self,
        name: &str,
        namespace: &str,
        kind: ClassKind,
        visibility: Visibility,
    ) -> Result<TypeId, BuildError> {
        let mut def = TypeDef::new(name, namespace, kind, Origin::Declared);
        def.visibility = visibility;
        if kind != ClassKind::Interface {
            def.base = Some(self.symbols.well_known().object);
        }
        let id = self.symbols.define(def)?;
        self.types.push(TypeBuilder::new(id));
        self.type_stack.push(self.types.len() - 1);
        debug!(type_name = %self.symbols.type_name(id), "declared type");
        Ok(id)
    }

    /// The innermost declared type still open, or the default type.
    fn current_index(&self) -> Option<usize> {
        self.type_stack
            .last()
            .copied()
            .or(self.default_type)
            .filter(|&index| self.types[index].is_open())
    }

    pub fn current_type(&self) -> Option<&TypeBuilder> {
        self.current_index().map(|index| &self.types[index])
    }

    pub fn current_type_mut(&mut self) -> Option<&mut TypeBuilder> {
        let index = self.current_index()?;
        Some(&mut self.types[index])
    }

    pub fn default_type_mut(&mut self) -> Option<&mut TypeBuilder> {
        let index = self.default_type?;
        Some(&mut self.types[index])
    }

    pub fn is_default_current(&self) -> bool {
        self.current_index().is_some() && self.current_index() == self.default_type
    }

    pub fn current_method(&self) -> Option<&MethodBuilder> {
        self.current_type()?.current_method()
    }

    pub fn current_method_mut(&mut self) -> Option<&mut MethodBuilder> {
        self.current_type_mut()?.current_method_mut()
    }

    /// Emitter over the method currently being built, if any.
    pub fn emitter(&mut self) -> Option<Emitter<'_>> {
        let index = self.current_index()?;
        let method = self.types[index].current_method_mut()?;
        Some(Emitter::new(&self.symbols, method))
    }

    pub fn open_method(
        &mut self,
        name: &str,
        ret: TypeId,
        kind: FuncKind,
        visibility: Visibility,
        attrs: MethodAttrs,
    ) -> Result<MethodSlot, BuildError> {
        let index = self.current_index().ok_or_else(|| {
            BuildError::new(
                DiagnosticKind::InvalidToken,
                format!("function {name} declared outside of a type"),
            )
        })?;
        let owner = self.types[index].id();
        let is_static = kind == FuncKind::Static || self.symbols.get(owner).is_static();

        let slot = if kind == FuncKind::Constructor {
            MethodSlot::Constructor(self.symbols.add_ctor(
                owner,
                CtorDef {
                    params: Vec::new(),
                    visibility,
                },
            ))
        } else {
            let method = self.symbols.add_method(
                owner,
                MethodDef {
                    name: name.to_string(),
                    params: Vec::new(),
                    ret,
                    is_static,
                    is_virtual: kind.is_virtual(),
                    visibility,
                    attrs,
                },
            );
            if attrs.entry_point {
                self.entry_point = Some(method);
            }
            MethodSlot::Method(method)
        };

        let ty = &mut self.types[index];
        ty.add_member();
        ty.open_method(MethodBuilder::new(slot, is_static && kind != FuncKind::Constructor));
        debug!(function = name, "opened method");
        Ok(slot)
    }

    /// Declares a parameter on the open method and extends its signature.
    pub fn declare_param(&mut self, name: &str, ty: TypeId) -> Result<VarSlot, BuildError> {
        let method = self.current_method_mut().ok_or_else(|| {
            BuildError::new(
                DiagnosticKind::InvalidToken,
                format!("parameter {name} declared outside of a function"),
            )
        })?;
        let slot = method.declare_param(name, ty)?;
        match method.slot() {
            MethodSlot::Method(method_ref) => self.symbols.method_mut(method_ref).params.push(ty),
            MethodSlot::Constructor(ctor_ref) => self.symbols.ctor_mut(ctor_ref).params.push(ty),
        }
        Ok(slot)
    }

    pub fn declare_local(
        &mut self,
        name: &str,
        type_name: &str,
        namespaces: &[String],
        is_final: bool,
    ) -> Result<LocalVar, BuildError> {
        let index = self.current_index().ok_or_else(|| {
            BuildError::new(
                DiagnosticKind::InvalidToken,
                format!("local {name} declared outside of a function"),
            )
        })?;
        let method = self.types[index].current_method_mut().ok_or_else(|| {
            BuildError::new(
                DiagnosticKind::InvalidToken,
                format!("local {name} declared outside of a function"),
            )
        })?;
        method.declare_local(&self.symbols, name, type_name, namespaces, is_final)
    }

    /// Fields of static types, including the default type, are static.
    pub fn declare_field(
        &mut self,
        name: &str,
        ty: TypeId,
        is_final: bool,
    ) -> Result<FieldRef, BuildError> {
        let index = self.current_index().ok_or_else(|| {
            BuildError::new(
                DiagnosticKind::InvalidToken,
                format!("field {name} declared outside of a type"),
            )
        })?;
        let owner = self.types[index].id();
        if self.symbols.get(owner).fields.iter().any(|field| field.name == name) {
            return Err(BuildError::new(
                DiagnosticKind::InvalidToken,
                format!("field {name} is already declared"),
            ));
        }
        let is_static = self.symbols.get(owner).is_static();
        let field = self.symbols.add_field(
            owner,
            FieldDef {
                name: name.to_string(),
                ty,
                is_static,
                is_final,
                visibility: Visibility::Public,
            },
        );
        self.types[index].add_member();
        Ok(field)
    }

    pub fn close_method(&mut self) -> Vec<BuildError> {
        match self.current_type_mut() {
            Some(ty) => ty.close_method(),
            None => Vec::new(),
        }
    }

    /// Ends the innermost declared type. The default type is only closed by `finish`.
    pub fn close_type(&mut self, namespaces: &[String]) -> Vec<BuildError> {
        let Some(index) = self.type_stack.pop() else {
            return Vec::new();
        };
        debug!(type_name = %self.symbols.type_name(self.types[index].id()), "closed type");
        self.types[index].end(&mut self.symbols, namespaces)
    }

    pub fn set_constant(&mut self, name: &str, value: Literal) {
        self.constants.insert(name.to_string(), value);
    }

    pub fn constant(&self, name: &str) -> Option<&Literal> {
        self.constants.get(name)
    }

    pub fn add_script_function(&mut self, method: MethodRef) {
        self.script_functions.push(method);
    }

    pub fn find_script_function(&self, name: &str) -> Option<MethodRef> {
        self.script_functions
            .iter()
            .copied()
            .find(|&method| self.symbols.method(method).name == name)
    }

    /// Closes everything still open and hands the module over. An unused
    /// default type is dropped and the entry point is searched for instead.
    pub fn finish(mut self, namespaces: &[String]) -> (Module, Vec<BuildError>) {
        let mut errors = Vec::new();
        let mut dropped = None;

        if let Some(index) = self.default_type {
            if self.types[index].is_empty() {
                dropped = Some(index);
            } else {
                let ty = &mut self.types[index];
                if self.default_method.is_some() {
                    while ty.open_methods() > 1 {
                        errors.extend(ty.close_method());
                    }
                    if let Some(main) = ty.current_method_mut() {
                        main.emit(OpCode::Ret, crate::emit::Operand::None);
                    }
                }
                errors.extend(ty.end(&mut self.symbols, namespaces));
            }
        }
        while let Some(index) = self.type_stack.pop() {
            errors.extend(self.types[index].end(&mut self.symbols, namespaces));
        }
        for ty in &mut self.types {
            errors.extend(ty.end(&mut self.symbols, namespaces));
        }

        if self.entry_point.is_none() {
            self.entry_point = self.scan_entry_point(dropped);
            if self.entry_point.is_none() {
                info!(module = %self.module_name, "no entry point found");
            }
        }

        let types = self
            .types
            .into_iter()
            .enumerate()
            .filter(|(index, _)| Some(*index) != dropped)
            .map(|(_, ty)| ModuleType {
                id: ty.id(),
                methods: ty.into_methods(),
            })
            .collect();

        let module = Module {
            name: self.module_name,
            version: self.config.version,
            header: self.config.header,
            output: self.config.output,
            symbols: self.symbols,
            types,
            entry_point: self.entry_point,
        };
        (module, errors)
    }

    fn scan_entry_point(&self, dropped: Option<usize>) -> Option<MethodRef> {
        self.types
            .iter()
            .enumerate()
            .filter(|(index, _)| Some(*index) != dropped)
            .find_map(|(_, ty)| {
                self.symbols
                    .get(ty.id())
                    .methods
                    .iter()
                    .position(|method| method.attrs.entry_point)
                    .map(|index| MethodRef {
                        owner: ty.id(),
                        index,
                    })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(header: HeaderKind) -> BuildConfig {
        BuildConfig {
            header,
            ..BuildConfig::default()
        }
    }

    #[test]
    fn header_selects_output_kind() {
        let session = BuildSession::create_output(config(HeaderKind::Library), false);
        assert_eq!(session.config().output, OutputKind::Dll);

        let mut script = config(HeaderKind::Script);
        script.output = OutputKind::WindowApplication;
        let session = BuildSession::create_output(script, false);
        assert_eq!(session.config().output, OutputKind::WindowApplication);
    }

    #[test]
    fn auto_name_uses_application_name() {
        let mut cfg = config(HeaderKind::Console);
        cfg.app_name = "Calc".to_string();
        cfg.file_name = "calc_main.tbm".to_string();
        assert_eq!(
            BuildSession::create_output(cfg.clone(), true).module_name(),
            "Calc"
        );
        assert_eq!(
            BuildSession::create_output(cfg, false).module_name(),
            "calc_main"
        );
    }

    #[test]
    fn script_header_opens_main_as_entry_point() {
        let session = BuildSession::create_output(config(HeaderKind::Script), false);
        let main = session.entry_point().expect("entry point");
        let def = session.symbols().method(main);
        assert_eq!(def.name, "Main");
        assert!(def.attrs.script && def.is_static);
        assert!(session.current_method().is_some());
        assert!(session.is_default_current());
    }

    #[test]
    fn unused_default_type_is_dropped() {
        let session = BuildSession::create_output(config(HeaderKind::Class), false);
        let (module, errors) = session.finish(&[]);
        assert!(errors.is_empty());
        assert!(module.types.is_empty());
        assert!(module.entry_point.is_none());
    }

    #[test]
    fn script_main_gets_trailing_return() {
        let session = BuildSession::create_output(config(HeaderKind::Script), false);
        let (module, errors) = session.finish(&[]);
        assert!(errors.is_empty());
        let body = module.method_body("Program", "Main").expect("Main body");
        assert_eq!(body.code.last().map(|ins| ins.opcode), Some(OpCode::Ret));
    }

    #[test]
    fn entry_point_is_scanned_when_default_type_is_dropped() {
        let mut session = BuildSession::create_output(config(HeaderKind::Class), false);
        session
            .declare_type("App", "Demo", ClassKind::Static, Visibility::Public)
            .expect("declare");
        let void = session.symbols().well_known().void;
        session
            .open_method(
                "Start",
                void,
                FuncKind::Static,
                Visibility::Public,
                MethodAttrs {
                    entry_point: true,
                    script: false,
                },
            )
            .expect("open");
        session.entry_point = None;
        let (module, _) = session.finish(&[]);
        let entry = module.entry_point.expect("scanned entry point");
        assert_eq!(module.symbols.method(entry).name, "Start");
        assert_eq!(module.types.len(), 1);
    }

    #[test]
    fn parameters_extend_the_signature() {
        let mut session = BuildSession::create_output(config(HeaderKind::Class), false);
        let int = session.symbols().well_known().int32;
        let slot = session
            .open_method(
                "Twice",
                int,
                FuncKind::Static,
                Visibility::Public,
                MethodAttrs::default(),
            )
            .expect("open");
        session.declare_param("n", int).expect("param");
        let MethodSlot::Method(method) = slot else {
            panic!("expected a method slot");
        };
        assert_eq!(session.symbols().method(method).params, vec![int]);
    }
}
