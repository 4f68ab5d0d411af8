use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokens::Token;
use tracing::info;

use super::{Template, TemplateContext};
use crate::config::{MAX_PATH_LEN, is_valid_dotted_name};
use crate::diagnostics::{BuildError, DiagnosticKind, IncludeFailure};
use crate::wire::decode_module;

fn include_error(failure: IncludeFailure, message: String) -> BuildError {
    BuildError::new(DiagnosticKind::Include(failure), message)
}

/// Loads a compiled module and registers its public types.
#[derive(Debug, Default)]
pub struct IncludeTemplate {
    path: String,
}

impl IncludeTemplate {
    fn resolve_path(&self, base_dir: &Path) -> PathBuf {
        let path = Path::new(&self.path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }
}

impl Template for IncludeTemplate {
    fn parse(&mut self, token: &Token) -> bool {
        let Token::Include(path) = token else {
            return false;
        };
        self.path = path.clone();
        true
    }

    fn run(&mut self, ctx: &mut TemplateContext<'_>) -> Result<(), BuildError> {
        let stem = Path::new(&self.path)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();
        if self.path.is_empty() || !is_valid_dotted_name(stem) {
            return Err(include_error(
                IncludeFailure::BadName,
                format!("name of module '{}' is empty or not valid", self.path),
            ));
        }
        if self.path.len() > MAX_PATH_LEN {
            return Err(include_error(
                IncludeFailure::PathTooLong,
                format!("path of module {stem} is longer than {MAX_PATH_LEN} characters"),
            ));
        }

        let full_path = self.resolve_path(&ctx.session.config().base_dir);
        if full_path.extension().is_none() {
            return Err(include_error(
                IncludeFailure::NotFound,
                format!("module '{}' has no file extension", self.path),
            ));
        }
        let bytes = std::fs::read(&full_path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => include_error(
                IncludeFailure::NotFound,
                format!("module '{}' not found", full_path.display()),
            ),
            _ => include_error(
                IncludeFailure::LoadFailure,
                format!("failed to load module '{}': {err}", full_path.display()),
            ),
        })?;
        let image = decode_module(&bytes).map_err(|err| {
            include_error(
                IncludeFailure::BadFormat,
                format!("'{}' is not a valid module: {err}", full_path.display()),
            )
        })?;

        let registered = image.register(ctx.session.symbols_mut())?;
        info!(
            module = %image.name,
            types = registered.len(),
            "included module"
        );
        Ok(())
    }
}
