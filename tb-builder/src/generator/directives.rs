//! Compile-time directives. Each one runs as soon as its name is read and
//! pulls its own arguments off the stream.

use std::collections::HashMap;

use tokens::{HeaderKind, SeparatorKind, Token};
use tracing::debug;

use super::{Directive, Generator};
use crate::config::OutputKind;
use crate::diagnostics::DiagnosticKind;

pub(super) fn table() -> HashMap<&'static str, Directive> {
    let entries: [(&'static str, Directive); 7] = [
        ("extends", extends),
        ("implements", implements),
        ("outtype", outtype),
        ("try", open_try),
        ("endtry", close_try),
        ("entrypoint", entrypoint),
        ("const", constant),
    ];
    entries.into_iter().collect()
}

impl Generator {
    fn next_literal(&mut self) -> Option<String> {
        match self.stream.peek() {
            Some(Token::Literal(_)) => match self.stream.pop() {
                Some(Token::Literal(name)) => Some(name),
                _ => None,
            },
            _ => None,
        }
    }

    /// Reads `A.B, C` up to the first token that is neither a literal nor a
    /// separator.
    fn dotted_list(&mut self) -> Vec<String> {
        let mut names = Vec::new();
        let mut current = String::new();
        loop {
            match self.stream.peek() {
                Some(Token::Literal(_)) => {
                    if let Some(Token::Literal(name)) = self.stream.pop() {
                        current.push_str(&name);
                    }
                }
                Some(Token::Separator(SeparatorKind::Member)) => {
                    self.stream.pop();
                    current.push('.');
                }
                Some(Token::Separator(SeparatorKind::Statement)) => {
                    self.stream.pop();
                    names.push(std::mem::take(&mut current));
                }
                _ => break,
            }
        }
        names.push(current);
        names.retain(|name| !name.is_empty());
        names
    }
}

fn extends(generator: &mut Generator) {
    let Some(name) = generator.next_literal() else {
        generator.raise(DiagnosticKind::InvalidToken, "extends needs a base type name");
        return;
    };
    if generator.session.header() != HeaderKind::Class {
        generator.raise(
            DiagnosticKind::InvalidHeader,
            format!("extends {name} is only allowed in a class"),
        );
        return;
    }
    let extended = generator
        .session
        .default_type_mut()
        .is_some_and(|ty| ty.extends(&name));
    if !extended {
        generator.raise(
            DiagnosticKind::InvalidToken,
            format!("the class is already closed, cannot extend {name}"),
        );
    }
}

fn implements(generator: &mut Generator) {
    let names = generator.dotted_list();
    if generator.session.header() != HeaderKind::Class {
        generator.raise(
            DiagnosticKind::InvalidHeader,
            "implements is only allowed in a class",
        );
        return;
    }
    for name in names {
        let implemented = generator
            .session
            .default_type_mut()
            .is_some_and(|ty| ty.implements(&name));
        if !implemented {
            generator.raise(
                DiagnosticKind::InvalidToken,
                format!("the class is already closed, cannot implement {name}"),
            );
        }
    }
}

fn outtype(generator: &mut Generator) {
    let name = generator.next_literal().unwrap_or_default();
    match OutputKind::from_name(&name) {
        Some(output) => {
            debug!(output = output.name(), "output type changed");
            generator.session.set_output(output);
        }
        None => generator.raise(
            DiagnosticKind::InvalidOutType,
            format!("unknown output type {name:?}"),
        ),
    }
}

fn open_try(generator: &mut Generator) {
    generator.try_region = true;
}

fn close_try(generator: &mut Generator) {
    generator.try_region = false;
}

fn entrypoint(generator: &mut Generator) {
    generator.method_attrs.entry_point = true;
}

fn constant(generator: &mut Generator) {
    let Some(name) = generator.next_literal() else {
        generator.raise(DiagnosticKind::InvalidToken, "const needs a name");
        return;
    };
    match generator.stream.peek() {
        Some(Token::Value(_)) => {
            if let Some(Token::Value(value)) = generator.stream.pop() {
                generator.session.set_constant(&name, value);
            }
        }
        _ => generator.raise(
            DiagnosticKind::InvalidToken,
            format!("const {name} needs a value"),
        ),
    }
}
