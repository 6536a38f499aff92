use std::borrow::Cow;

/// Failures talking to a Nacos server.
#[quanx_derive::quanx_error]
pub enum NacosError {
    /// Transport failure: connect, timeout, malformed body.
    #[error("Nacos transport error{}: {source}", format_context(.context))]
    Http { source: reqwest::Error, context: Option<Cow<'static, str>> },

    /// The server answered with a non-success HTTP status.
    #[error("Nacos returned HTTP {status}{}: {body}", format_context(.context))]
    Status { status: u16, body: String, context: Option<Cow<'static, str>> },

    /// The server answered 200 but the result code reports a failure.
    #[error("Nacos API error {code}{}: {message}", format_context(.context))]
    Api { code: i64, message: String, context: Option<Cow<'static, str>> },

    /// Login was rejected or returned no token.
    #[error("Nacos authentication failed{}: {message}", format_context(.context))]
    Auth { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("No healthy Nacos instance of `{service}`{}", format_context(.context))]
    NoHealthyInstance { service: String, context: Option<Cow<'static, str>> },

    #[error("Invalid Nacos configuration{}: {message}", format_context(.context))]
    InvalidConfig { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
