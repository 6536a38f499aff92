use std::borrow::Cow;

/// Boxed backend failure carried inside [`RegistryError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures of registry operations.
///
/// Backend calls are always reported with the operation and the target
/// service; nothing is dropped on the floor.
#[quanx_derive::quanx_error]
pub enum RegistryError {
    #[error("Register instance of `{service}` failed{}: {source}", format_context(.context))]
    Register { service: String, source: BoxError, context: Option<Cow<'static, str>> },

    #[error("Deregister instance of `{service}` failed{}: {source}", format_context(.context))]
    Deregister { service: String, source: BoxError, context: Option<Cow<'static, str>> },

    #[error("Select instances of `{service}` failed{}: {source}", format_context(.context))]
    Select { service: String, source: BoxError, context: Option<Cow<'static, str>> },

    #[error("No healthy instance of `{service}`{}", format_context(.context))]
    NoHealthyInstance { service: String, context: Option<Cow<'static, str>> },

    #[error("Closing `{backend}` registry failed{}: {source}", format_context(.context))]
    Close { backend: &'static str, source: BoxError, context: Option<Cow<'static, str>> },

    #[error("Registry already initialized{}", format_context(.context))]
    AlreadyInitialized { context: Option<Cow<'static, str>> },

    #[error("Registry not initialized{}", format_context(.context))]
    NotInitialized { context: Option<Cow<'static, str>> },
}

impl RegistryError {
    /// Name of the service the failed call targeted, if any.
    #[must_use]
    pub fn service(&self) -> Option<&str> {
        match self {
            Self::Register { service, .. }
            | Self::Deregister { service, .. }
            | Self::Select { service, .. }
            | Self::NoHealthyInstance { service, .. } => Some(service),
            Self::Close { .. } | Self::AlreadyInitialized { .. } | Self::NotInitialized { .. } => None,
        }
    }
}
