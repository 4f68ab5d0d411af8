//! Single-pass dispatch loop. Each step pops one token, runs the pending
//! checks in priority order, then dispatches on the token kind.

use std::collections::{HashMap, HashSet};

use tokens::{HeaderKind, SeparatorKind, Token, TokenStream};
use tracing::{debug, info, trace};

use crate::config::{self, BuildConfig};
use crate::diagnostics::{BuildError, Diagnostic, DiagnosticKind, Diagnostics};
use crate::emit::OpCode;
use crate::metadata::LocalVar;
use crate::session::{BuildSession, Module};
use crate::symbols::{FieldRef, MethodAttrs, TypeId};
use crate::templates::{self, TemplateContext};

mod directives;
mod expr;

use expr::{Frame, FrameKind};

/// Everything a build produces.
#[derive(Debug)]
pub struct GenerationOutput {
    pub module: Module,
    pub diagnostics: Vec<Diagnostic>,
    /// False for headers whose module is never written.
    pub persist: bool,
}

impl GenerationOutput {
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics
            .iter()
            .filter(|diagnostic| diagnostic.kind == kind)
            .count()
    }
}

/// Open blocks, statements, and sequences.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NestingCounters {
    pub blocks: u32,
    pub statements: u32,
    pub sequences: u32,
}

impl NestingCounters {
    pub fn is_balanced(&self) -> bool {
        *self == Self::default()
    }

    fn unclosed(&self) -> Vec<String> {
        [
            (self.blocks, "blocks"),
            (self.statements, "statements"),
            (self.sequences, "arrays"),
        ]
        .into_iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, what)| format!("Need end of {count} {what}"))
        .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AssignTarget {
    Local(LocalVar),
    Field(FieldRef),
}

/// What happens to the value of the expression being read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Consume {
    #[default]
    Normal,
    Assign(Option<AssignTarget>),
    Return,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EndReason {
    Breakpoint,
    Extends,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BlockOwner {
    Type,
    Method,
    Plain,
}

type Directive = fn(&mut Generator);

pub struct Generator {
    session: BuildSession,
    stream: TokenStream,
    line: u32,
    namespace: String,
    usings: Vec<String>,
    literals: Vec<String>,
    expect_literal: bool,
    directives: HashMap<&'static str, Directive>,
    counters: NestingCounters,
    blocks: Vec<BlockOwner>,
    pending_extends: bool,
    implements: Option<String>,
    consume: Consume,
    need_end: Option<EndReason>,
    in_directive: bool,
    try_region: bool,
    base: Frame,
    frames: Vec<Frame>,
    pending_new: bool,
    method_attrs: MethodAttrs,
    last_declared: Option<AssignTarget>,
    retractable: Option<TypeId>,
    imported_libraries: HashSet<String>,
    diagnostics: Diagnostics,
}

impl Generator {
    /// The header of `stream` overrides the configured one.
    pub fn new(stream: TokenStream, mut config: BuildConfig, auto_name: bool) -> Self {
        config.header = stream.header();
        Self {
            session: BuildSession::create_output(config, auto_name),
            stream,
            line: 1,
            namespace: String::new(),
            usings: Vec::new(),
            literals: Vec::new(),
            expect_literal: false,
            directives: directives::table(),
            counters: NestingCounters::default(),
            blocks: Vec::new(),
            pending_extends: false,
            implements: None,
            consume: Consume::Normal,
            need_end: None,
            in_directive: false,
            try_region: false,
            base: Frame::new(FrameKind::Base),
            frames: Vec::new(),
            pending_new: false,
            method_attrs: MethodAttrs::default(),
            last_declared: None,
            retractable: None,
            imported_libraries: HashSet::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn counters(&self) -> NestingCounters {
        self.counters
    }

    pub fn session(&self) -> &BuildSession {
        &self.session
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Consumes the whole stream and finishes the module.
    pub fn generate(mut self) -> GenerationOutput {
        while let Some(token) = self.stream.pop() {
            self.process(token);
        }
        self.check_termination();

        let header = self.session.header();
        let line = self.line;
        let Generator {
            session,
            usings,
            mut diagnostics,
            ..
        } = self;
        let (module, errors) = session.finish(&usings);
        diagnostics.extend(errors.into_iter().map(|err| err.at(line)));

        info!(
            module = %module.name,
            types = module.types.len(),
            diagnostics = diagnostics.len(),
            "generation finished"
        );
        GenerationOutput {
            module,
            diagnostics: diagnostics.into_vec(),
            persist: config::persists(header),
        }
    }

    /// Runs one step. Inside a try region its diagnostics are dropped.
    fn process(&mut self, token: Token) {
        if self.try_region {
            let mark = self.diagnostics.len();
            self.step(token);
            self.diagnostics.truncate(mark);
        } else {
            self.step(token);
        }
    }

    fn step(&mut self, token: Token) {
        let retract = self.retractable.take();

        if let Some(reason) = self.need_end.take() {
            if token == Token::NewLine {
                self.need_end = Some(reason);
            } else if !token.is_end()
                && !(reason == EndReason::Extends && token == Token::Implements)
            {
                let message = match reason {
                    EndReason::Breakpoint => "End of expression with breakpoint not found",
                    EndReason::Extends => "End of expression after extends clause not found",
                };
                self.raise(DiagnosticKind::NeedEnd, message);
            }
        }

        if self.pending_extends {
            self.pending_extends = false;
            if let Token::Literal(name) = &token {
                self.extend_current(name);
                self.need_end = Some(EndReason::Extends);
                return;
            }
            self.raise(
                DiagnosticKind::InvalidToken,
                format!("expected base type name after extends, found {token}"),
            );
        }

        if self.implements.is_some() && !self.read_implements(&token) {
            return;
        }

        if self.consume != Consume::Normal && token.is_end() {
            self.finish_consume();
        }

        self.dispatch(token, retract);
    }

    /// Feeds one token to the implements loop. Returns true when the token
    /// should still reach the main switch.
    fn read_implements(&mut self, token: &Token) -> bool {
        let Some(current) = self.implements.as_mut() else {
            return true;
        };
        match token {
            Token::Literal(name) if current.ends_with('.') || current.is_empty() => {
                current.push_str(name);
                false
            }
            Token::Literal(name) => {
                let done = std::mem::replace(current, name.clone());
                self.implement_current(&done);
                false
            }
            Token::Separator(SeparatorKind::Member) => {
                if current.is_empty() {
                    self.raise(
                        DiagnosticKind::InvalidToken,
                        "Expression separator cannot be used without a literal before it",
                    );
                } else {
                    current.push('.');
                }
                false
            }
            Token::Separator(SeparatorKind::Statement) => {
                let done = std::mem::take(current);
                self.implement_current(&done);
                false
            }
            Token::NewLine => true,
            end if end.is_end() => {
                let done = self.implements.take().unwrap_or_default();
                self.implement_current(&done);
                true
            }
            other => {
                self.raise(
                    DiagnosticKind::InvalidToken,
                    format!("expected interface name, found {other}"),
                );
                false
            }
        }
    }

    fn extend_current(&mut self, name: &str) {
        let extended = self
            .session
            .current_type_mut()
            .is_some_and(|ty| ty.extends(name));
        if !extended {
            self.raise(
                DiagnosticKind::InvalidToken,
                format!("no open type to extend with {name}"),
            );
        }
    }

    fn implement_current(&mut self, name: &str) {
        let name = name.trim_end_matches('.');
        if name.is_empty() {
            return;
        }
        let implemented = self
            .session
            .current_type_mut()
            .is_some_and(|ty| ty.implements(name));
        if !implemented {
            self.raise(
                DiagnosticKind::InvalidToken,
                format!("no open type to implement {name}"),
            );
        }
    }

    fn dispatch(&mut self, token: Token, retract: Option<TypeId>) {
        match token {
            Token::NewLine => {
                self.line += 1;
                self.in_directive = false;
            }
            Token::Class {
                name,
                kind,
                visibility,
            } => {
                let namespace = self.namespace.clone();
                match self.session.declare_type(&name, &namespace, kind, visibility) {
                    Ok(_) => {
                        if let Some(ty) = self.session.current_type_mut() {
                            ty.set_initializing(true);
                        }
                    }
                    Err(err) => self.report(err),
                }
            }
            Token::Function {
                name,
                return_type,
                kind,
                visibility,
            } => self.open_function(&name, &return_type, kind, visibility),
            Token::Var {
                name,
                type_name,
                is_final,
            } => self.declare_var(&name, &type_name, is_final),
            Token::Block(true) => self.open_block(),
            Token::Block(false) => self.close_block(),
            Token::Statement(true) => self.open_statement(),
            Token::Statement(false) => self.close_statement(),
            Token::Sequence(true) => self.open_sequence(),
            Token::Sequence(false) => self.close_sequence(),
            Token::Literal(name) => self.literal(name),
            Token::Separator(SeparatorKind::Member) => {
                if self.literals.is_empty() {
                    self.raise(
                        DiagnosticKind::InvalidToken,
                        "Expression separator cannot be used without a literal before it",
                    );
                } else {
                    self.expect_literal = true;
                }
            }
            Token::Separator(SeparatorKind::Statement) => self.separate(),
            Token::ExpressionEnd => self.expression_end(),
            Token::Operator(op) => self.operator(op, retract),
            Token::Value(value) => self.value(&value),
            Token::Directive => self.in_directive = true,
            Token::Namespace(_)
            | Token::UsingNamespace(_)
            | Token::Include(_)
            | Token::ImportLibrary(_) => self.declaration(&token),
            Token::Breakpoint => {
                self.with_emitter(|emitter| emitter.emit(OpCode::Break));
                self.need_end = Some(EndReason::Breakpoint);
            }
            Token::Extends => {
                self.check_closed();
                self.pending_extends = true;
            }
            Token::Implements => {
                self.check_closed();
                self.implements = Some(String::new());
            }
            Token::New => self.pending_new = true,
            Token::Label(name) => {
                if let Some(Err(err)) = self.with_emitter(|emitter| emitter.method().label(&name)) {
                    self.report(err);
                }
            }
            Token::Goto(name) => {
                self.with_emitter(|emitter| emitter.method().branch(&name));
            }
            Token::Return => self.consume = Consume::Return,
            other => trace!(token = %other, "accepted without lowering"),
        }
    }

    fn declaration(&mut self, token: &Token) {
        let mut ctx = TemplateContext {
            session: &mut self.session,
            stream: &mut self.stream,
            namespace: &mut self.namespace,
            usings: &mut self.usings,
            imported_libraries: &mut self.imported_libraries,
        };
        if let Some(Err(err)) = templates::run_declaration(token, &mut ctx) {
            self.report(err);
        }
    }

    fn open_function(
        &mut self,
        name: &str,
        return_type: &str,
        kind: tokens::FuncKind,
        visibility: tokens::Visibility,
    ) {
        let symbols = self.session.symbols();
        let void = symbols.well_known().void;
        let ret = if return_type.is_empty() {
            void
        } else {
            match symbols.resolve_type(return_type, &self.usings) {
                Some(ret) => ret,
                None => {
                    self.raise(
                        DiagnosticKind::TypeNotFound,
                        format!("return type {return_type} of function {name} not found"),
                    );
                    void
                }
            }
        };

        let mut attrs = std::mem::take(&mut self.method_attrs);
        let script_function =
            self.session.header() == HeaderKind::Script && self.session.is_default_current();
        attrs.script |= script_function;
        match self.session.open_method(name, ret, kind, visibility, attrs) {
            Ok(crate::metadata::MethodSlot::Method(method)) if script_function => {
                self.session.add_script_function(method);
            }
            Ok(_) => {}
            Err(err) => self.report(err),
        }
    }

    fn declare_var(&mut self, name: &str, type_name: &str, is_final: bool) {
        self.flush_reference();
        let params_open = self.session.current_method().map(|method| method.params_open());
        match params_open {
            Some(true) => {
                let Some(ty) = self.resolve_var_type(name, type_name) else {
                    return;
                };
                if let Err(err) = self.session.declare_param(name, ty) {
                    self.report(err);
                }
            }
            Some(false) => {
                match self
                    .session
                    .declare_local(name, type_name, &self.usings, is_final)
                {
                    Ok(local) => self.last_declared = Some(AssignTarget::Local(local)),
                    Err(err) => self.report(err),
                }
            }
            None if self.session.current_type().is_some() => {
                let Some(ty) = self.resolve_var_type(name, type_name) else {
                    return;
                };
                match self.session.declare_field(name, ty, is_final) {
                    Ok(field) => self.last_declared = Some(AssignTarget::Field(field)),
                    Err(err) => self.report(err),
                }
            }
            None => self.raise(
                DiagnosticKind::InvalidToken,
                format!("variable {name} declared outside of a type"),
            ),
        }
    }

    fn resolve_var_type(&mut self, name: &str, type_name: &str) -> Option<TypeId> {
        let ty = self.session.symbols().resolve_type(type_name, &self.usings);
        if ty.is_none() {
            self.raise(
                DiagnosticKind::TypeNotFound,
                format!("type {type_name} of {name} not found"),
            );
        }
        ty
    }

    fn open_block(&mut self) {
        self.end_expression();
        self.counters.blocks += 1;
        let owner = match self.session.current_type_mut() {
            Some(ty) if ty.is_initializing() => {
                ty.set_initializing(false);
                BlockOwner::Type
            }
            Some(ty) => match ty.current_method_mut() {
                Some(method) if method.params_open() => {
                    method.close_params();
                    BlockOwner::Method
                }
                _ => BlockOwner::Plain,
            },
            None => BlockOwner::Plain,
        };
        self.blocks.push(owner);
    }

    fn close_block(&mut self) {
        self.end_expression();
        if self.counters.blocks == 0 {
            self.raise(
                DiagnosticKind::InvalidToken,
                "block closed without being opened",
            );
            return;
        }
        self.counters.blocks -= 1;
        let errors = match self.blocks.pop() {
            Some(BlockOwner::Type) => self.session.close_type(&self.usings),
            Some(BlockOwner::Method) => self.session.close_method(),
            Some(BlockOwner::Plain) | None => Vec::new(),
        };
        for err in errors {
            self.report(err);
        }
    }

    fn literal(&mut self, name: String) {
        if self.in_directive {
            self.in_directive = false;
            match self.directives.get(name.as_str()).copied() {
                Some(directive) => {
                    debug!(directive = %name, "running directive");
                    directive(self);
                }
                None => self.raise(
                    DiagnosticKind::DirectiveNotFound,
                    format!("Directive by name {name} not found"),
                ),
            }
            return;
        }
        if !self.literals.is_empty() && !self.expect_literal {
            self.flush_reference();
        }
        self.literals.push(name);
        self.expect_literal = false;
    }

    /// `;`: also closes an initializing type or a body-less method.
    fn expression_end(&mut self) {
        self.end_expression();
        let Some(ty) = self.session.current_type() else {
            return;
        };
        if ty.is_initializing() {
            let errors = self.session.close_type(&self.usings);
            for err in errors {
                self.report(err);
            }
        } else if ty.current_method().is_some_and(|method| method.params_open()) {
            let errors = self.session.close_method();
            for err in errors {
                self.report(err);
            }
        }
    }

    /// Every nesting counter must be zero before an extends or implements
    /// clause.
    fn check_closed(&mut self) {
        for message in self.counters.unclosed() {
            self.raise(DiagnosticKind::NeedEnd, message);
        }
    }

    fn check_termination(&mut self) {
        for message in self.counters.unclosed() {
            self.raise(DiagnosticKind::NeedEnd, message);
        }
        let mut waiting = Vec::new();
        if self.pending_extends {
            waiting.push("extends clause is missing its base type".to_string());
        }
        if self.implements.is_some() {
            waiting.push("implements list is not terminated".to_string());
        }
        match self.consume {
            Consume::Normal => {}
            Consume::Assign(_) => waiting.push("assignment is not terminated".to_string()),
            Consume::Return => waiting.push("return is not terminated".to_string()),
        }
        if self.need_end.is_some() {
            waiting.push("End of expression with breakpoint not found".to_string());
        }
        if self.pending_new {
            waiting.push("new expression has no constructor call".to_string());
        }
        if let Some(ty) = self.session.current_type()
            && ty.is_initializing()
        {
            let name = self.session.symbols().type_name(ty.id());
            waiting.push(format!("declaration of {name} is not terminated"));
        }
        for message in waiting {
            self.raise(DiagnosticKind::NeedEnd, message);
        }
    }

    fn report(&mut self, err: BuildError) {
        self.diagnostics.push(err.at(self.line));
    }

    fn raise(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.report(BuildError::new(kind, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unclosed_counters_produce_one_message_each() {
        let counters = NestingCounters {
            blocks: 2,
            statements: 0,
            sequences: 1,
        };
        assert_eq!(
            counters.unclosed(),
            vec!["Need end of 2 blocks", "Need end of 1 arrays"]
        );
        assert!(!counters.is_balanced());
        assert!(NestingCounters::default().is_balanced());
    }

    #[test]
    fn line_counter_starts_at_one() {
        let mut stream = TokenStream::new(HeaderKind::Script);
        stream.push(Token::NewLine);
        stream.push(Token::Block(false));
        let output = Generator::new(stream, BuildConfig::default(), false).generate();
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].line, 2);
        assert_eq!(output.diagnostics[0].kind, DiagnosticKind::InvalidToken);
    }
}
