use tokens::Token;

use super::{Template, TemplateContext};
use crate::diagnostics::BuildError;

#[derive(Debug, Default)]
pub struct UseTemplate {
    namespace: String,
}

impl Template for UseTemplate {
    fn parse(&mut self, token: &Token) -> bool {
        let Token::UsingNamespace(namespace) = token else {
            return false;
        };
        self.namespace = namespace.clone();
        true
    }

    /// Namespaces keep registration order; repeats are ignored.
    fn run(&mut self, ctx: &mut TemplateContext<'_>) -> Result<(), BuildError> {
        if !ctx.usings.contains(&self.namespace) {
            ctx.usings.push(std::mem::take(&mut self.namespace));
        }
        Ok(())
    }
}
