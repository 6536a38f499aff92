use quanx_derive::quanx_error;
use std::borrow::Cow;

#[quanx_error]
pub enum DemoError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Lookup error{}: {key}", format_context(.context))]
    Lookup { key: String, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn read() -> Result<String, DemoError> {
    Ok(std::fs::read_to_string("/nonexistent").context("reading demo file")?)
}

fn main() {
    let _ = read();
    let _: DemoError = "boom".into();
}
