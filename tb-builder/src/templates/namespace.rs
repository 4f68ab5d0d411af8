use tokens::Token;
use tracing::debug;

use super::{Template, TemplateContext};
use crate::config::is_valid_dotted_name;
use crate::diagnostics::{BuildError, DiagnosticKind};

#[derive(Debug, Default)]
pub struct NamespaceTemplate {
    name: String,
}

impl Template for NamespaceTemplate {
    fn parse(&mut self, token: &Token) -> bool {
        let Token::Namespace(name) = token else {
            return false;
        };
        self.name = name.clone();
        true
    }

    /// An empty name returns to the global namespace.
    fn run(&mut self, ctx: &mut TemplateContext<'_>) -> Result<(), BuildError> {
        if !self.name.is_empty() && !is_valid_dotted_name(&self.name) {
            return Err(BuildError::new(
                DiagnosticKind::InvalidToken,
                format!("namespace name {} is not valid", self.name),
            ));
        }
        debug!(namespace = %self.name, "entered namespace");
        *ctx.namespace = std::mem::take(&mut self.name);
        Ok(())
    }
}
