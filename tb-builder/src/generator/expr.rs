//! Expression state: a stack of frames for groupings, argument lists, and
//! sequences on top of the base frame of the current expression.

use tokens::{Literal, OperatorKind};

use super::{AssignTarget, Consume, Generator};
use crate::diagnostics::{BuildError, DiagnosticKind};
use crate::emit::{Emitter, OpCode, OperatorPlan, SequenceElement, plan_operator};
use crate::symbols::TypeId;
use crate::templates::part::{self, CallSite, Reference};

#[derive(Clone, Debug, PartialEq)]
pub(super) enum FrameKind {
    Base,
    Group,
    /// `start` is where the argument code begins; the receiver is inserted
    /// there once the callee is known.
    Call {
        site: CallSite,
        start: Option<usize>,
    },
    Construct {
        ty: Option<TypeId>,
        name: String,
        start: Option<usize>,
    },
    /// `start` is `None` outside a method body, where sequences are only counted.
    Sequence {
        start: Option<usize>,
        element_start: usize,
        elements: Vec<SequenceElement>,
    },
}

#[derive(Clone, Debug)]
pub(super) struct Frame {
    pub(super) kind: FrameKind,
    /// Values this frame has left on the stack.
    pub(super) depth: u32,
    /// An operand was attempted but could not be loaded.
    pub(super) failed: bool,
    pub(super) operand: Option<TypeId>,
    pub(super) pending_op: Option<OperatorPlan>,
    pub(super) pending_not: bool,
    pub(super) pending_neg: bool,
    pub(super) args: Vec<Option<TypeId>>,
}

impl Frame {
    pub(super) fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            depth: 0,
            failed: false,
            operand: None,
            pending_op: None,
            pending_not: false,
            pending_neg: false,
            args: Vec::new(),
        }
    }

    pub(super) fn has_value(&self) -> bool {
        self.depth > 0 || self.failed
    }

    fn is_idle(&self) -> bool {
        !self.has_value() && self.pending_op.is_none() && !self.pending_not && !self.pending_neg
    }

    fn reset_operand(&mut self) {
        self.depth = 0;
        self.failed = false;
        self.operand = None;
        self.pending_op = None;
        self.pending_not = false;
        self.pending_neg = false;
    }

    /// Argument types including the one still being read.
    fn finish_args(&mut self) -> Vec<Option<TypeId>> {
        if self.has_value() {
            self.args.push(self.operand);
        }
        self.reset_operand();
        std::mem::take(&mut self.args)
    }
}

impl Generator {
    fn frame(&self) -> &Frame {
        self.frames.last().unwrap_or(&self.base)
    }

    fn frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().unwrap_or(&mut self.base)
    }

    fn counting_only(&self) -> bool {
        self.frames.iter().any(|frame| {
            matches!(
                frame.kind,
                FrameKind::Sequence { start: None, .. }
            )
        })
    }

    /// Runs `f` against the open method. Code outside a method body is an
    /// invalid-token diagnostic.
    pub(super) fn with_emitter<R>(&mut self, f: impl FnOnce(&mut Emitter<'_>) -> R) -> Option<R> {
        if self.session.current_method().is_none() {
            self.raise(
                DiagnosticKind::InvalidToken,
                "code is only allowed inside a method body",
            );
            return None;
        }
        let mut emitter = self.session.emitter()?;
        Some(f(&mut emitter))
    }

    /// A value of type `ty` just landed on the stack: applies pending unary
    /// and binary operators of the current frame.
    fn push_operand(&mut self, ty: Option<TypeId>) {
        let frame = self.frame_mut();
        let neg = std::mem::take(&mut frame.pending_neg);
        let not = std::mem::take(&mut frame.pending_not);
        let plan = frame.pending_op.take();

        let mut result = ty;
        if neg || not || plan.is_some() {
            let applied = self.with_emitter(|emitter| {
                let mut result = ty;
                if neg {
                    emitter.emit(OpCode::Neg);
                }
                if not {
                    result = Some(emitter.not());
                }
                if let Some(plan) = &plan {
                    emitter.apply(plan);
                    result = plan.result;
                }
                result
            });
            result = applied.flatten();
        }

        let frame = self.frame_mut();
        if plan.is_none() || frame.depth == 0 {
            frame.depth += 1;
        }
        frame.operand = result;
    }

    fn fail_operand(&mut self) {
        let frame = self.frame_mut();
        frame.reset_operand();
        frame.failed = true;
    }

    /// Loads the accumulated dotted name as a value.
    pub(super) fn flush_reference(&mut self) {
        if self.literals.is_empty() {
            return;
        }
        let segments = std::mem::take(&mut self.literals);
        self.expect_literal = false;
        if self.counting_only() {
            return;
        }
        let reference = part::resolve_reference(&self.session, &segments, &self.usings);
        match self.with_emitter(|emitter| part::load_reference(emitter, &reference)) {
            Some(Ok(ty)) => self.push_operand(Some(ty)),
            Some(Err(err)) => {
                self.report(err);
                self.fail_operand();
            }
            None => self.fail_operand(),
        }
    }

    pub(super) fn value(&mut self, value: &Literal) {
        self.flush_reference();
        if self.counting_only() {
            return;
        }
        if let Some(ty) = self.with_emitter(|emitter| emitter.load_constant(value)) {
            self.push_operand(Some(ty));
        }
    }

    pub(super) fn operator(&mut self, op: OperatorKind, retract: Option<TypeId>) {
        if let Some(ty) = retract {
            self.retract_discard(ty);
        }
        match op {
            OperatorKind::Assign => {
                let target = self.take_assign_target();
                self.consume = Consume::Assign(target);
            }
            OperatorKind::Inc | OperatorKind::Dec => self.step_value(op),
            OperatorKind::Not => {
                self.flush_reference();
                let frame = self.frame_mut();
                frame.pending_not = !frame.pending_not;
            }
            OperatorKind::Sub
                if self.literals.is_empty()
                    && (!self.frame().has_value() || self.frame().pending_op.is_some()) =>
            {
                let frame = self.frame_mut();
                frame.pending_neg = !frame.pending_neg;
            }
            _ => match op.compound_base() {
                Some(base_op) => self.compound_assign(base_op),
                None => self.binary(op),
            },
        }
    }

    fn binary(&mut self, op: OperatorKind) {
        self.flush_reference();
        let frame = self.frame();
        if !frame.has_value() {
            self.raise(
                DiagnosticKind::InvalidOperator,
                format!("operator {op} needs a left operand"),
            );
            return;
        }
        if let Some(previous) = &frame.pending_op {
            let message = format!("operator {op} follows operator {} without an operand", previous.op);
            self.raise(DiagnosticKind::InvalidOperator, message);
            return;
        }
        let lhs = frame.operand;
        match plan_operator(self.session.symbols(), lhs, op) {
            Ok(plan) => self.frame_mut().pending_op = Some(plan),
            Err(err) => self.report(err),
        }
    }

    /// An operator right after a discarded call result turns the result back
    /// into the left operand.
    fn retract_discard(&mut self, ty: TypeId) {
        if !self.frames.is_empty() {
            return;
        }
        let Some(method) = self.session.current_method_mut() else {
            return;
        };
        if method.last_opcode() == Some(OpCode::Pop) {
            method.remove_last();
            self.base.depth += 1;
            self.base.operand = Some(ty);
        }
    }

    /// Resolves the store target of an assignment. Instance-field receivers
    /// are loaded here, ahead of the value.
    fn take_assign_target(&mut self) -> Option<AssignTarget> {
        if self.literals.is_empty() {
            let target = self.last_declared.take();
            if target.is_none() {
                self.raise(DiagnosticKind::InvalidOperator, "assignment has no target");
            }
            return target;
        }
        let segments = std::mem::take(&mut self.literals);
        self.expect_literal = false;
        match part::resolve_reference(&self.session, &segments, &self.usings) {
            Reference::Local(local) => Some(AssignTarget::Local(local)),
            Reference::Field { receiver, field } => {
                if let Some(receiver) = receiver
                    && let Some(Err(err)) =
                        self.with_emitter(|emitter| part::load_receiver(emitter, receiver))
                {
                    self.report(err);
                }
                Some(AssignTarget::Field(field))
            }
            Reference::Constant(_) => {
                self.raise(
                    DiagnosticKind::InvalidOperator,
                    format!("constant {} cannot be assigned", segments.join(".")),
                );
                None
            }
            Reference::Missing(name) => {
                self.report(part::missing_variable(&name));
                None
            }
        }
    }

    /// `x op= value`: loads the target, plans `op`, and stores on the end token.
    fn compound_assign(&mut self, op: OperatorKind) {
        let target = self.take_assign_target();
        if let Some(target) = target {
            let loaded = self.with_emitter(|emitter| match target {
                AssignTarget::Local(local) => emitter.load_local(Some(local)),
                AssignTarget::Field(field) => {
                    if !emitter.symbols().field(field).is_static {
                        emitter.emit(OpCode::Dup);
                    }
                    emitter.load_field(Some(field))
                }
            });
            match loaded {
                Some(Ok(ty)) => {
                    self.base.depth += 1;
                    self.base.operand = Some(ty);
                    match plan_operator(self.session.symbols(), Some(ty), op) {
                        Ok(plan) => self.base.pending_op = Some(plan),
                        Err(err) => self.report(err),
                    }
                }
                Some(Err(err)) => self.report(err),
                None => {}
            }
        }
        self.consume = Consume::Assign(target);
    }

    /// `++`/`--`: stores back into a named variable, otherwise adjusts the
    /// value on the stack.
    fn step_value(&mut self, op: OperatorKind) {
        if self.literals.is_empty() {
            if self.frame().has_value() {
                self.with_emitter(|emitter| emitter.step(op));
            } else {
                self.raise(
                    DiagnosticKind::InvalidOperator,
                    format!("operator {op} needs an operand"),
                );
            }
            return;
        }

        let segments = std::mem::take(&mut self.literals);
        self.expect_literal = false;
        let result = match part::resolve_reference(&self.session, &segments, &self.usings) {
            Reference::Local(local) => self.with_emitter(|emitter| {
                emitter.load_local(Some(local))?;
                emitter.step(op);
                emitter.store_local(Some(local))
            }),
            Reference::Field { receiver, field } => self.with_emitter(|emitter| {
                if let Some(receiver) = receiver {
                    part::load_receiver(emitter, receiver)?;
                    emitter.emit(OpCode::Dup);
                }
                emitter.load_field(Some(field))?;
                emitter.step(op);
                emitter.store_field(Some(field))
            }),
            Reference::Constant(_) => {
                self.raise(
                    DiagnosticKind::InvalidOperator,
                    format!("constant {} cannot be changed", segments.join(".")),
                );
                None
            }
            Reference::Missing(name) => Some(Err(part::missing_variable(&name))),
        };
        if let Some(Err(err)) = result {
            self.report(err);
        }
    }

    /// Stores or returns the base value once its end token arrives.
    pub(super) fn finish_consume(&mut self) {
        self.flush_reference();
        match std::mem::take(&mut self.consume) {
            Consume::Normal => {}
            Consume::Assign(target) => self.store(target),
            Consume::Return => {
                self.with_emitter(|emitter| emitter.emit(OpCode::Ret));
                self.base.reset_operand();
            }
        }
    }

    fn store(&mut self, target: Option<AssignTarget>) {
        if self.base.pending_op.is_some() {
            return;
        }
        if !self.base.has_value() {
            if target.is_some() {
                self.raise(DiagnosticKind::InvalidOperator, "assignment has no value");
            }
            return;
        }
        if self.base.depth == 0 {
            return;
        }
        let stored = match target {
            None => return,
            Some(AssignTarget::Local(local)) => {
                self.with_emitter(|emitter| emitter.store_local(Some(local)))
            }
            Some(AssignTarget::Field(field)) => {
                self.with_emitter(|emitter| emitter.store_field(Some(field)))
            }
        };
        match stored {
            Some(Ok(())) => self.base.depth -= 1,
            Some(Err(err)) => self.report(err),
            None => {}
        }
    }

    /// Flushes the dangling reference and pops whatever the expression left.
    pub(super) fn end_expression(&mut self) {
        self.flush_reference();
        let base = std::mem::replace(&mut self.base, Frame::new(FrameKind::Base));
        if let Some(plan) = &base.pending_op {
            self.raise(
                DiagnosticKind::InvalidOperator,
                format!("operator {} is missing its right operand", plan.op),
            );
        }
        if base.depth > 0 {
            self.with_emitter(|emitter| {
                for _ in 0..base.depth {
                    emitter.emit(OpCode::Pop);
                }
            });
        }
        if std::mem::take(&mut self.pending_new) {
            self.raise(
                DiagnosticKind::InvalidToken,
                "new must be followed by a constructor call",
            );
        }
        self.last_declared = None;
    }

    pub(super) fn open_statement(&mut self) {
        self.counters.statements += 1;
        if self.literals.is_empty() || self.expect_literal {
            if std::mem::take(&mut self.pending_new) {
                self.raise(DiagnosticKind::InvalidToken, "new requires a type name");
            }
            self.frames.push(Frame::new(FrameKind::Group));
            return;
        }

        let segments = std::mem::take(&mut self.literals);
        let start = self.session.current_method().map(|method| method.position());
        if std::mem::take(&mut self.pending_new) {
            let name = segments.join(".");
            let ty = self.session.symbols().resolve_type(&name, &self.usings);
            self.frames
                .push(Frame::new(FrameKind::Construct { ty, name, start }));
            return;
        }

        let site = part::resolve_call_site(&self.session, &segments, &self.usings);
        self.frames.push(Frame::new(FrameKind::Call { site, start }));
    }

    pub(super) fn close_statement(&mut self) {
        if self.counters.statements == 0 {
            self.raise(
                DiagnosticKind::InvalidToken,
                "statement closed without being opened",
            );
            return;
        }
        if matches!(
            self.frames.last().map(|frame| &frame.kind),
            Some(FrameKind::Sequence { .. })
        ) {
            self.raise(
                DiagnosticKind::InvalidToken,
                "statement closed inside an array",
            );
            return;
        }
        self.counters.statements -= 1;
        self.flush_reference();
        let Some(mut frame) = self.frames.pop() else {
            return;
        };

        match std::mem::replace(&mut frame.kind, FrameKind::Group) {
            FrameKind::Base | FrameKind::Group | FrameKind::Sequence { .. } => {
                if let Some(plan) = &frame.pending_op {
                    self.raise(
                        DiagnosticKind::InvalidOperator,
                        format!("operator {} is missing its right operand", plan.op),
                    );
                }
                if frame.depth > 0 {
                    self.push_operand(frame.operand);
                } else if frame.failed {
                    self.fail_operand();
                }
            }
            FrameKind::Call { site, start } => {
                let args = frame.finish_args();
                self.emit_call(&site, start, &args);
            }
            FrameKind::Construct { ty, name, start } => {
                let args = frame.finish_args();
                self.emit_construct(ty, &name, start, &args);
            }
        }
    }

    /// Drops the argument code of a call that could not be emitted.
    fn abandon_call(&mut self, start: Option<usize>) {
        if let Some(start) = start
            && let Some(method) = self.session.current_method_mut()
        {
            method.take_tail(start);
        }
        self.fail_operand();
    }

    fn emit_call(&mut self, site: &CallSite, start: Option<usize>, args: &[Option<TypeId>]) {
        let method = match part::resolve_callee(&self.session, site, args) {
            Ok(method) => method,
            Err(err) => {
                self.report(err);
                self.abandon_call(start);
                return;
            }
        };
        let discard =
            self.frames.is_empty() && self.consume == Consume::Normal && self.base.is_idle();
        let symbols = self.session.symbols();
        let def = symbols.method(method);
        let ret = def.ret;
        let returns_value = !symbols.is_void(ret);
        let receiver = site.receiver().filter(|_| !def.is_static);

        let emitted = self.with_emitter(|emitter| -> Result<Option<TypeId>, BuildError> {
            if let Some(receiver) = receiver {
                let args = emitter.method().take_tail(start.unwrap_or_default());
                part::load_receiver(emitter, receiver)?;
                emitter.method().extend(args);
            }
            Ok(emitter.call(method, discard))
        });
        match emitted {
            Some(Ok(Some(ty))) => self.push_operand(Some(ty)),
            Some(Ok(None)) if discard && returns_value => self.retractable = Some(ret),
            Some(Err(err)) => {
                self.report(err);
                self.abandon_call(start);
            }
            _ => {}
        }
    }

    fn emit_construct(
        &mut self,
        ty: Option<TypeId>,
        name: &str,
        start: Option<usize>,
        args: &[Option<TypeId>],
    ) {
        let Some(ty) = ty else {
            self.raise(
                DiagnosticKind::TypeNotFound,
                format!("type {name} not found"),
            );
            self.abandon_call(start);
            return;
        };
        let ctor = self.session.symbols().find_constructor(ty, args);
        match self.with_emitter(|emitter| emitter.new_object(ctor)) {
            Some(Ok(ty)) => self.push_operand(Some(ty)),
            Some(Err(err)) => {
                self.report(err);
                self.abandon_call(start);
            }
            None => {}
        }
    }

    /// `,`: ends an argument or element, otherwise drops the accumulated name.
    pub(super) fn separate(&mut self) {
        match self.frames.last().map(|frame| &frame.kind) {
            Some(FrameKind::Call { .. } | FrameKind::Construct { .. }) => {
                self.flush_reference();
                let frame = self.frame_mut();
                if frame.has_value() {
                    let operand = frame.operand;
                    frame.args.push(operand);
                }
                frame.reset_operand();
            }
            Some(FrameKind::Sequence { .. }) => {
                self.flush_reference();
                self.finish_element();
            }
            _ => {
                self.literals.clear();
                self.expect_literal = false;
            }
        }
    }

    fn finish_element(&mut self) {
        let position = self
            .session
            .current_method()
            .map(|method| method.position())
            .unwrap_or_default();
        let Some(frame) = self.frames.last_mut() else {
            return;
        };
        let has_value = frame.has_value();
        let ty = frame.operand;
        if let FrameKind::Sequence {
            element_start,
            elements,
            start: Some(_),
        } = &mut frame.kind
        {
            if has_value {
                elements.push(SequenceElement {
                    start: *element_start,
                    end: position,
                    ty,
                });
            }
            *element_start = position;
        }
        frame.reset_operand();
    }

    pub(super) fn open_sequence(&mut self) {
        self.counters.sequences += 1;
        self.flush_reference();
        let start = if self.counting_only() {
            None
        } else {
            self.session.current_method().map(|method| method.position())
        };
        self.frames.push(Frame::new(FrameKind::Sequence {
            start,
            element_start: start.unwrap_or_default(),
            elements: Vec::new(),
        }));
    }

    pub(super) fn close_sequence(&mut self) {
        if self.counters.sequences == 0 {
            self.raise(
                DiagnosticKind::InvalidToken,
                "array closed without being opened",
            );
            return;
        }
        if !matches!(
            self.frames.last().map(|frame| &frame.kind),
            Some(FrameKind::Sequence { .. })
        ) {
            self.raise(
                DiagnosticKind::InvalidToken,
                "array closed inside a statement",
            );
            return;
        }
        self.counters.sequences -= 1;
        self.flush_reference();
        self.finish_element();
        let Some(frame) = self.frames.pop() else {
            return;
        };
        if let FrameKind::Sequence {
            start: Some(start),
            elements,
            ..
        } = frame.kind
            && let Some(ty) =
                self.with_emitter(|emitter| emitter.lower_sequence(start, &elements))
        {
            self.push_operand(Some(ty));
        }
    }
}
