mod common;

use std::process::Command;

use builder::decode_module;
use common::*;
use tokens::encode_stream;

fn tb_build() -> Command {
    Command::new(env!("CARGO_BIN_EXE_tb-build"))
}

#[test]
fn module_is_written_even_with_diagnostics() {
    let dir = scratch_dir("cli-diagnostics");
    let stream = script().token(Token::Block(false)).finish();
    let input = dir.join("stray.tkns");
    std::fs::write(&input, encode_stream(&stream).expect("encode stream")).expect("write input");
    let out = dir.join("out.tbm");

    let status = tb_build()
        .arg(&input)
        .arg("-o")
        .arg(&out)
        .env("NO_COLOR", "1")
        .status()
        .expect("run tb-build");

    assert_eq!(status.code(), Some(1));
    let bytes = std::fs::read(&out).expect("module written");
    let image = decode_module(&bytes).expect("decode module");
    assert_eq!(image.header, HeaderKind::Script);
}

#[test]
fn clean_build_exits_zero() {
    let dir = scratch_dir("cli-clean");
    let stream = script().using("System").finish();
    let input = dir.join("clean.tkns");
    std::fs::write(&input, encode_stream(&stream).expect("encode stream")).expect("write input");
    let out = dir.join("clean.tbm");

    let status = tb_build()
        .arg(&input)
        .arg("-o")
        .arg(&out)
        .status()
        .expect("run tb-build");

    assert!(status.success());
    assert!(out.exists());
}
