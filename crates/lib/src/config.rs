//! Runtime configuration.

use std::{borrow::Cow, fmt, fs, path::PathBuf};

use crate::Error;

/// Source of the guest module bytecode.
#[derive(Clone)]
pub enum GuestSource {
    /// WASM bytecode (binary or text format) held in memory.
    Bytes(Vec<u8>),
    /// Path to a file with WASM bytecode; the file is read when the runtime is created.
    File(PathBuf),
}

impl fmt::Debug for GuestSource {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => formatter
                .debug_struct("Bytes")
                .field("len", &bytes.len())
                .finish(),
            Self::File(path) => formatter.debug_tuple("File").field(path).finish(),
        }
    }
}

impl From<Vec<u8>> for GuestSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for GuestSource {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<PathBuf> for GuestSource {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl GuestSource {
    pub(crate) fn load(&self) -> Result<Cow<'_, [u8]>, Error> {
        match self {
            Self::Bytes(bytes) => Ok(Cow::Borrowed(bytes)),
            Self::File(path) => fs::read(path).map(Cow::Owned).map_err(|source| Error::Load {
                path: path.clone(),
                source,
            }),
        }
    }
}

/// Configuration of a [`Runtime`](crate::Runtime).
///
/// # Examples
///
/// ```
/// use schnorr_host::RuntimeConfig;
///
/// let module = b"(module)".to_vec();
/// let mut config = RuntimeConfig::new(module);
/// config
///     .set_log_sink("env", "log")
///     .set_memory_limit(16_usize << 20);
/// ```
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    source: GuestSource,
    log_sink: (String, String),
    trap_unknown_imports: bool,
    memory_limit: Option<usize>,
}

impl RuntimeConfig {
    /// Default module of the log sink import.
    pub const DEFAULT_LOG_MODULE: &'static str = "env";
    /// Default name of the log sink import.
    pub const DEFAULT_LOG_NAME: &'static str = "host_log_string";

    /// Creates a configuration with default settings for the specified guest module.
    pub fn new(source: impl Into<GuestSource>) -> Self {
        Self {
            source: source.into(),
            log_sink: (
                Self::DEFAULT_LOG_MODULE.to_owned(),
                Self::DEFAULT_LOG_NAME.to_owned(),
            ),
            trap_unknown_imports: true,
            memory_limit: None,
        }
    }

    /// Returns the guest module source.
    pub fn source(&self) -> &GuestSource {
        &self.source
    }

    /// Sets the import under which the log sink is provided to the guest. The sink has
    /// the `(i32, i32) -> ()` signature, taking a pointer to and a length of a UTF-8 message.
    ///
    /// By default, the sink is provided as `env::host_log_string`.
    pub fn set_log_sink(&mut self, module: impl Into<String>, name: impl Into<String>) -> &mut Self {
        self.log_sink = (module.into(), name.into());
        self
    }

    pub(crate) fn log_sink(&self) -> (&str, &str) {
        (&self.log_sink.0, &self.log_sink.1)
    }

    /// Sets whether guest imports other than the host capabilities are linked as functions
    /// that trap when called. Guests compiled for WASI usually import functions they never call,
    /// so this is enabled by default. If disabled, such guests fail to instantiate.
    pub fn set_trap_unknown_imports(&mut self, trap: bool) -> &mut Self {
        self.trap_unknown_imports = trap;
        self
    }

    pub(crate) fn trap_unknown_imports(&self) -> bool {
        self.trap_unknown_imports
    }

    /// Limits the size of linear memory for each session, in bytes. Guest attempts to grow
    /// memory beyond the limit fail.
    ///
    /// By default, memory is not limited beyond the limits declared by the module itself.
    pub fn set_memory_limit(&mut self, limit: impl Into<Option<usize>>) -> &mut Self {
        self.memory_limit = limit.into();
        self
    }

    pub(crate) fn memory_limit(&self) -> Option<usize> {
        self.memory_limit
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn default_config() {
        let config = RuntimeConfig::new(b"(module)".as_slice());
        assert_eq!(config.log_sink(), ("env", "host_log_string"));
        assert!(config.trap_unknown_imports());
        assert_eq!(config.memory_limit(), None);
        assert_matches!(config.source(), GuestSource::Bytes(bytes) if bytes == b"(module)");
    }

    #[test]
    fn loading_missing_file() {
        let source = GuestSource::from(PathBuf::from("/definitely/missing/module.wasm"));
        let err = source.load().unwrap_err();
        assert_matches!(err, Error::Load { path, .. } if path.ends_with("module.wasm"));
    }

    #[test]
    fn debug_output_omits_bytecode() {
        let source = GuestSource::Bytes(vec![0; 1_024]);
        assert_eq!(format!("{source:?}"), "Bytes { len: 1024 }");
    }
}
