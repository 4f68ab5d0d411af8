pub mod config;
pub mod diagnostics;
pub mod emit;
pub mod generator;
pub mod logging;
pub mod metadata;
pub mod session;
pub mod symbols;
pub mod templates;
pub mod wire;

pub use config::{BuildConfig, ConfigError, OutputKind, PERSIST_RULE, PersistRule};
pub use diagnostics::{BuildError, Diagnostic, DiagnosticKind, Diagnostics, IncludeFailure};
pub use emit::{Instruction, OpCode, Operand};
pub use generator::{GenerationOutput, Generator, NestingCounters};
pub use metadata::{MethodBody, MethodSlot, VarSlot};
pub use session::{BuildSession, Module, ModuleType};
pub use symbols::{FieldRef, MethodRef, SymbolTable, TypeCategory, TypeId};
pub use wire::{ModuleImage, decode_module, encode_module};

use tokens::TokenStream;

pub fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    logging::init()
}

/// Compiles `stream` into a module. The stream header decides the kind of
/// module; diagnostics never stop the build.
pub fn build(stream: TokenStream, config: BuildConfig, auto_name: bool) -> GenerationOutput {
    Generator::new(stream, config, auto_name).generate()
}
