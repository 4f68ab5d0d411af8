use owo_colors::OwoColorize;
use std::sync::OnceLock;
use supports_color::Stream;
use tracing_subscriber::EnvFilter;

use crate::diagnostics::DiagnosticKind;

static ANSI_ENABLED: OnceLock<bool> = OnceLock::new();

pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let ansi = detect_ansi();
    let _ = ANSI_ENABLED.set(ansi);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(ansi)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err| std::io::Error::other(err.to_string()))?;
    Ok(())
}

pub fn kind_label(kind: DiagnosticKind) -> String {
    let text = kind.label();
    if !ansi_enabled() {
        return text.to_string();
    }

    match kind {
        DiagnosticKind::NeedEnd => format!("{}", text.bright_yellow().bold()),
        DiagnosticKind::InvalidToken
        | DiagnosticKind::InvalidHeader
        | DiagnosticKind::InvalidOperator
        | DiagnosticKind::InvalidOutType => format!("{}", text.bright_red().bold()),
        DiagnosticKind::VarNotFound
        | DiagnosticKind::TypeNotFound
        | DiagnosticKind::DirectiveNotFound => format!("{}", text.bright_magenta().bold()),
        DiagnosticKind::Include(_) | DiagnosticKind::TokensLibrary => {
            format!("{}", text.bright_cyan().bold())
        }
    }
}

pub fn category_build() -> String {
    if ansi_enabled() {
        format!("{}", "BUILD".bright_green().bold())
    } else {
        "BUILD".to_string()
    }
}

fn ansi_enabled() -> bool {
    *ANSI_ENABLED.get_or_init(detect_ansi)
}

fn detect_ansi() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }

    if std::env::var_os("FORCE_COLOR").is_some() {
        let _ = enable_ansi_support();
        return true;
    }

    let windows_vt = enable_ansi_support().is_ok();
    windows_vt || supports_color::on_cached(Stream::Stderr).is_some()
}

#[cfg(windows)]
fn enable_ansi_support() -> windows::core::Result<()> {
    use windows::Win32::Foundation::HANDLE;
    use windows::Win32::System::Console::{
        ENABLE_VIRTUAL_TERMINAL_PROCESSING, GetConsoleMode, GetStdHandle, STD_ERROR_HANDLE,
        SetConsoleMode,
    };

    unsafe {
        let handle = GetStdHandle(STD_ERROR_HANDLE)?;
        if handle == HANDLE::default() {
            return Ok(());
        }

        let mut mode = std::mem::zeroed();
        GetConsoleMode(handle, &mut mode)?;
        SetConsoleMode(handle, mode | ENABLE_VIRTUAL_TERMINAL_PROCESSING)?;
        Ok(())
    }
}

#[cfg(not(windows))]
fn enable_ansi_support() -> Result<(), ()> {
    Err(())
}
