use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Scope error: {0}")]
    Scope(#[from] ScopeError),
    #[error("Property store error: {0}")]
    Store(#[from] StoreError),
    #[error("Container error: {0}")]
    Container(#[from] ContainerError),
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("I/O error while {0}: {1}")]
    IO(String, #[source] std::io::Error),
}

/// Errors raised while walking the scope hierarchy.
#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("Scope '{0}' is not known to the hierarchy")]
    UnknownScope(String),
    #[error("Broken scope chain at {scope}: {reason}")]
    BrokenChain { scope: String, reason: String },
    #[error("Scope '{0}' does not carry a property store")]
    NoPropertyStore(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to commit properties for {scope}: {reason}")]
    CommitFailed { scope: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid module document: {0}")]
    InvalidDocument(String),
    #[error("Module '{module}' has a {collection} binding at position {index} without a name or value")]
    MalformedBinding {
        module: String,
        collection: &'static str,
        index: usize,
    },
    #[error("Failed to read file '{0}': {1}")]
    FileRead(String, #[source] std::io::Error),
    #[error("Failed to parse TOML from file '{0}': {1}")]
    TomlParse(String, #[source] toml::de::Error),
    #[error("Invalid value '{value}' for setting '{field}'")]
    InvalidValue { field: String, value: String },
}

/// 容器构建与解析错误
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Module type '{0}' is not present in the module catalog")]
    UnknownModuleType(String),
    #[error("Module '{module}' requires binding '{name}' which is not configured")]
    MissingBinding { module: String, name: String },
    #[error("Module '{module}': cannot convert '{value}' for binding '{name}' to {target}")]
    BindingConversion {
        module: String,
        name: String,
        value: String,
        target: &'static str,
    },
    #[error("Module '{module}' failed to load: {reason}")]
    ModuleLoad { module: String, reason: String },
    #[error("Service '{0}' is not registered")]
    ServiceNotRegistered(&'static str),
    #[error("Type cast failed: expected {expected}, got {actual}")]
    TypeCastFailed { expected: String, actual: String },
    #[error("Failed to create service '{service}': {reason}")]
    CreationFailed {
        service: &'static str,
        reason: String,
    },
    #[error("Container {0} has been disposed")]
    Disposed(u64),
    #[error("Lifetime scope '{0}' has been closed")]
    ScopeClosed(String),
    #[error("{} component(s) failed to release: {}", .0.len(), .0.join("; "))]
    DisposalFailed(Vec<String>),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error("Failed to build container for {scope}: {source}")]
    Build {
        scope: String,
        #[source]
        source: ContainerError,
    },
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IO("I/O operation failed".to_string(), err)
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
