//! Declaration templates: each one recognizes a single token shape and then
//! applies it to the build state.

use std::collections::HashSet;

use tokens::{Token, TokenStream};

use crate::diagnostics::BuildError;
use crate::session::BuildSession;

mod include;
mod library;
mod namespace;
pub mod part;
mod using;

pub use include::IncludeTemplate;
pub use library::LibraryTemplate;
pub use namespace::NamespaceTemplate;
pub use using::UseTemplate;

/// The slice of generator state a template may touch.
pub struct TemplateContext<'a> {
    pub session: &'a mut BuildSession,
    pub stream: &'a mut TokenStream,
    pub namespace: &'a mut String,
    pub usings: &'a mut Vec<String>,
    pub imported_libraries: &'a mut HashSet<String>,
}

pub trait Template {
    /// Returns true when `token` starts this template, capturing its payload.
    fn parse(&mut self, token: &Token) -> bool;

    /// Applies the captured construct.
    fn run(&mut self, ctx: &mut TemplateContext<'_>) -> Result<(), BuildError>;
}

/// Runs the first declaration template that recognizes `token`. Returns
/// `None` when no template applies.
pub fn run_declaration(
    token: &Token,
    ctx: &mut TemplateContext<'_>,
) -> Option<Result<(), BuildError>> {
    let mut templates: [Box<dyn Template>; 4] = [
        Box::new(NamespaceTemplate::default()),
        Box::new(UseTemplate::default()),
        Box::new(IncludeTemplate::default()),
        Box::new(LibraryTemplate::default()),
    ];
    templates
        .iter_mut()
        .find_map(|template| template.parse(token).then(|| template.run(ctx)))
}
