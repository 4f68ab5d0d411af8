//! Dotted-name parts of an expression: variable and field references and
//! call targets. Resolution reads the session; loading goes through an
//! [`Emitter`].

use tokens::Literal;

use crate::diagnostics::{BuildError, DiagnosticKind};
use crate::emit::Emitter;
use crate::metadata::LocalVar;
use crate::session::BuildSession;
use crate::symbols::{FieldRef, MethodRef, SymbolTable, TypeId};

/// Object a member access is applied to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Receiver {
    Local(LocalVar),
    Field(FieldRef),
    This,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Reference {
    Local(LocalVar),
    Field {
        receiver: Option<Receiver>,
        field: FieldRef,
    },
    Constant(Literal),
    Missing(String),
}

impl Reference {
    pub fn is_missing(&self) -> bool {
        matches!(self, Reference::Missing(_))
    }
}

/// Resolves `segments` read as a value: locals and parameters first, then
/// constants, fields of the current type, and finally `Type.field` paths.
pub fn resolve_reference(
    session: &BuildSession,
    segments: &[String],
    namespaces: &[String],
) -> Reference {
    let symbols = session.symbols();
    let name = segments.join(".");
    let method = session.current_method();

    if let [single] = segments {
        if let Some(local) = method.and_then(|method| method.get_local(single)) {
            return Reference::Local(local);
        }
        if let Some(value) = session.constant(single) {
            return Reference::Constant(value.clone());
        }
        let owner = session.current_type().map(|ty| ty.id());
        if let Some(field) = owner.and_then(|owner| symbols.field_on(owner, single)) {
            if symbols.field(field).is_static {
                return Reference::Field {
                    receiver: None,
                    field,
                };
            }
            if method.is_some_and(|method| !method.is_static()) {
                return Reference::Field {
                    receiver: Some(Receiver::This),
                    field,
                };
            }
        }
        return Reference::Missing(name);
    }

    if let [owner, member] = segments
        && let Some(local) = method.and_then(|method| method.get_local(owner))
    {
        return match symbols.field_on(local.ty, member) {
            Some(field) => Reference::Field {
                receiver: Some(Receiver::Local(local)),
                field,
            },
            None => Reference::Missing(name),
        };
    }
    match symbols.resolve_field(&name, namespaces) {
        Some(field) => Reference::Field {
            receiver: None,
            field,
        },
        None => Reference::Missing(name),
    }
}

pub fn load_receiver(emitter: &mut Emitter<'_>, receiver: Receiver) -> Result<TypeId, BuildError> {
    match receiver {
        Receiver::Local(local) => emitter.load_local(Some(local)),
        Receiver::Field(field) => emitter.load_field(Some(field)),
        Receiver::This => {
            emitter.load_this();
            Ok(emitter.symbols().well_known().object)
        }
    }
}

/// Emits the load of `reference` and returns the type it left on the stack.
pub fn load_reference(
    emitter: &mut Emitter<'_>,
    reference: &Reference,
) -> Result<TypeId, BuildError> {
    match reference {
        Reference::Local(local) => emitter.load_local(Some(*local)),
        Reference::Field { receiver, field } => {
            if let Some(receiver) = receiver {
                load_receiver(emitter, *receiver)?;
            }
            emitter.load_field(Some(*field))
        }
        Reference::Constant(value) => Ok(emitter.load_constant(value)),
        Reference::Missing(name) => Err(missing_variable(name)),
    }
}

pub fn missing_variable(name: &str) -> BuildError {
    BuildError::new(
        DiagnosticKind::VarNotFound,
        format!("variable or field with name {name} not found"),
    )
}

/// Where a call is dispatched once its arguments are known.
#[derive(Clone, Debug, PartialEq)]
pub enum CallTarget {
    /// Static method on a type.
    Static(TypeId),
    /// Instance method; the receiver is pushed before the arguments.
    Instance { receiver: Receiver, ty: TypeId },
    /// Free function of a script, or a method of the enclosing type.
    Local,
    /// The owner could not be resolved.
    Unresolved(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CallSite {
    pub name: String,
    pub target: CallTarget,
}

impl CallSite {
    pub fn receiver(&self) -> Option<Receiver> {
        match self.target {
            CallTarget::Instance { receiver, .. } => Some(receiver),
            _ => None,
        }
    }
}

/// Splits `Owner.Path.method` and resolves the owner part.
pub fn resolve_call_site(
    session: &BuildSession,
    segments: &[String],
    namespaces: &[String],
) -> CallSite {
    let symbols = session.symbols();
    let Some((name, owner)) = segments.split_last() else {
        return CallSite {
            name: String::new(),
            target: CallTarget::Unresolved(String::new()),
        };
    };
    let name = name.clone();

    if owner.is_empty() {
        let target = local_call_target(session, &name);
        return CallSite { name, target };
    }

    let owner_name = owner.join(".");
    if let [single] = owner
        && let Some(local) = session
            .current_method()
            .and_then(|method| method.get_local(single))
    {
        return CallSite {
            name,
            target: CallTarget::Instance {
                receiver: Receiver::Local(local),
                ty: local.ty,
            },
        };
    }
    if let Some(ty) = symbols.resolve_type(&owner_name, namespaces) {
        return CallSite {
            name,
            target: CallTarget::Static(ty),
        };
    }
    if let Some(field) = symbols.resolve_field(&owner_name, namespaces) {
        return CallSite {
            name,
            target: CallTarget::Instance {
                receiver: Receiver::Field(field),
                ty: symbols.field(field).ty,
            },
        };
    }
    CallSite {
        name,
        target: CallTarget::Unresolved(owner_name),
    }
}

fn local_call_target(session: &BuildSession, name: &str) -> CallTarget {
    if session.find_script_function(name).is_some() {
        return CallTarget::Local;
    }
    let Some(owner) = session.current_type().map(|ty| ty.id()) else {
        return CallTarget::Unresolved(name.to_string());
    };
    let symbols = session.symbols();
    if !symbols.has_method_named(owner, name) {
        return CallTarget::Unresolved(name.to_string());
    }
    let in_instance_method = session
        .current_method()
        .is_some_and(|method| !method.is_static());
    let has_instance_overload = symbols
        .get(owner)
        .methods
        .iter()
        .any(|method| method.name == name && !method.is_static);
    if in_instance_method && has_instance_overload {
        CallTarget::Instance {
            receiver: Receiver::This,
            ty: owner,
        }
    } else {
        CallTarget::Static(owner)
    }
}

/// Picks the overload for `args`. Script functions are matched by name.
pub fn resolve_callee(
    session: &BuildSession,
    site: &CallSite,
    args: &[Option<TypeId>],
) -> Result<MethodRef, BuildError> {
    let symbols: &SymbolTable = session.symbols();
    let found = match &site.target {
        CallTarget::Static(ty) => symbols.find_method(*ty, &site.name, args),
        CallTarget::Instance { receiver, ty } => {
            let found = symbols.find_method(*ty, &site.name, args);
            if let Some(method) = found
                && symbols.method(method).is_static
                && *receiver != Receiver::This
            {
                return Err(BuildError::new(
                    DiagnosticKind::VarNotFound,
                    format!(
                        "static method {} cannot be called on an instance of {}",
                        site.name,
                        symbols.type_name(*ty)
                    ),
                ));
            }
            found
        }
        CallTarget::Local => session.find_script_function(&site.name),
        CallTarget::Unresolved(owner) => {
            return Err(BuildError::new(
                DiagnosticKind::TypeNotFound,
                format!("type or variable {owner} for call {} not found", site.name),
            ));
        }
    };
    found.ok_or_else(|| {
        BuildError::new(
            DiagnosticKind::VarNotFound,
            format!(
                "method {} with {} argument(s) not found",
                site.name,
                args.len()
            ),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use tokens::HeaderKind;

    fn script_session() -> BuildSession {
        BuildSession::create_output(
            BuildConfig {
                header: HeaderKind::Script,
                ..BuildConfig::default()
            },
            false,
        )
    }

    fn segments(path: &str) -> Vec<String> {
        path.split('.').map(str::to_string).collect()
    }

    #[test]
    fn locals_shadow_constants() {
        let mut session = script_session();
        session.set_constant("n", Literal::Int(3));
        assert_eq!(
            resolve_reference(&session, &segments("n"), &[]),
            Reference::Constant(Literal::Int(3))
        );
        session
            .declare_local("n", "int", &[], false)
            .expect("local");
        assert!(matches!(
            resolve_reference(&session, &segments("n"), &[]),
            Reference::Local(_)
        ));
    }

    #[test]
    fn static_field_path_needs_namespace() {
        let session = script_session();
        let usings = vec!["System".to_string()];
        assert!(resolve_reference(&session, &segments("Math.PI"), &[]).is_missing());
        assert!(matches!(
            resolve_reference(&session, &segments("Math.PI"), &usings),
            Reference::Field { receiver: None, .. }
        ));
    }

    #[test]
    fn call_on_local_is_an_instance_call() {
        let mut session = script_session();
        session
            .declare_local("s", "string", &[], false)
            .expect("local");
        let site = resolve_call_site(&session, &segments("s.ToUpper"), &[]);
        assert_eq!(site.name, "ToUpper");
        assert!(matches!(
            site.receiver(),
            Some(Receiver::Local(local)) if local.ty == session.symbols().well_known().string
        ));
        let method = resolve_callee(&session, &site, &[]).expect("ToUpper");
        assert_eq!(session.symbols().method(method).name, "ToUpper");
    }

    #[test]
    fn unknown_owner_is_a_missing_type() {
        let session = script_session();
        let site = resolve_call_site(&session, &segments("Nowhere.Run"), &[]);
        assert_eq!(site.target, CallTarget::Unresolved("Nowhere".to_string()));
        let err = resolve_callee(&session, &site, &[]).expect_err("unresolved");
        assert_eq!(err.kind, DiagnosticKind::TypeNotFound);
    }

    #[test]
    fn missing_overload_is_a_missing_variable() {
        let session = script_session();
        let usings = vec!["System".to_string()];
        let site = resolve_call_site(&session, &segments("Math.Nope"), &usings);
        let err = resolve_callee(&session, &site, &[None]).expect_err("no overload");
        assert_eq!(err.kind, DiagnosticKind::VarNotFound);
    }
}
