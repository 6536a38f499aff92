use quanx_derive::quanx_error;
use std::borrow::Cow;

#[quanx_error]
pub enum ProbeError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Probe of `{service}` failed{}: {source}", format_context(.context))]
    Probe { service: String, source: std::fmt::Error, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn not_found() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::NotFound, "gone")
}

#[test]
fn source_converts_with_question_mark() {
    fn run() -> Result<(), ProbeError> {
        Err(not_found())?;
        Ok(())
    }

    let err = run().unwrap_err();
    assert!(matches!(err, ProbeError::Io { context: None, .. }));
    assert_eq!(err.to_string(), "IO error: gone");
}

#[test]
fn context_is_attached_to_foreign_results() {
    let res: Result<(), std::io::Error> = Err(not_found());
    let err = res.context("opening server.toml").unwrap_err();
    assert_eq!(err.to_string(), "IO error (opening server.toml): gone");
}

#[test]
fn context_replaces_previous_context() {
    let res: Result<(), ProbeError> =
        Err(ProbeError::Internal { message: "boom".into(), context: Some("first".into()) });
    let err = res.context("second").unwrap_err();
    assert_eq!(err.to_string(), "Internal error (second): boom");
}

#[test]
fn variants_with_extra_fields_are_built_explicitly() {
    let err = ProbeError::Probe {
        service: "svc-a".to_owned(),
        source: std::fmt::Error,
        context: None,
    };
    assert!(err.to_string().starts_with("Probe of `svc-a` failed"));
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn internal_accepts_strings() {
    let from_static: ProbeError = "static message".into();
    let from_owned: ProbeError = String::from("owned message").into();
    assert_eq!(from_static.to_string(), "Internal error: static message");
    assert_eq!(from_owned.to_string(), "Internal error: owned message");
}

#[test]
fn ui() {
    let t = trybuild::TestCases::new();
    t.pass("tests/ui/quanx_error_pass.rs");
}
