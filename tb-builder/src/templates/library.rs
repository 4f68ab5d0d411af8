use std::path::PathBuf;

use tokens::{HeaderKind, Token, decode_stream};
use tracing::{debug, info};

use super::{Template, TemplateContext};
use crate::diagnostics::{BuildError, DiagnosticKind};

fn library_error(message: String) -> BuildError {
    BuildError::new(DiagnosticKind::TokensLibrary, message)
}

/// Splices the tokens of a tokens-library file into the running stream.
#[derive(Debug, Default)]
pub struct LibraryTemplate {
    path: String,
}

impl LibraryTemplate {
    /// `<name>` is looked up in the library directory, anything else next to
    /// the source.
    fn file_path(&self, ctx: &TemplateContext<'_>) -> PathBuf {
        let config = ctx.session.config();
        match self
            .path
            .strip_prefix('<')
            .and_then(|rest| rest.strip_suffix('>'))
        {
            Some(name) => config.library_dir.join(format!("{name}.tokens")),
            None => config.base_dir.join(format!("{}.tokens", self.path)),
        }
    }
}

impl Template for LibraryTemplate {
    fn parse(&mut self, token: &Token) -> bool {
        let Token::ImportLibrary(path) = token else {
            return false;
        };
        self.path = path.clone();
        true
    }

    fn run(&mut self, ctx: &mut TemplateContext<'_>) -> Result<(), BuildError> {
        if ctx.imported_libraries.contains(&self.path) {
            debug!(library = %self.path, "library already imported");
            return Ok(());
        }
        let file = self.file_path(ctx);
        let bytes = std::fs::read(&file).map_err(|err| {
            library_error(format!(
                "tokens library by path {} not found: {err}",
                file.display()
            ))
        })?;
        let library = decode_stream(&bytes).map_err(|err| {
            library_error(format!(
                "{} is not a valid token file: {err}",
                file.display()
            ))
        })?;
        if library.header() != HeaderKind::TokensLibrary {
            return Err(library_error(format!(
                "{} has header {}, expected {}",
                file.display(),
                library.header(),
                HeaderKind::TokensLibrary
            )));
        }

        info!(library = %self.path, tokens = library.len(), "imported tokens library");
        ctx.stream.splice(library);
        ctx.imported_libraries.insert(std::mem::take(&mut self.path));
        Ok(())
    }
}
