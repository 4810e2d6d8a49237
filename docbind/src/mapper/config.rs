use crate::mapper::Connection;

/// Settings shared by every model of a [Connection].
///
/// - `strict`: undeclared top-level fields are dropped on write (default `true`)
/// - `debug`: every model operation is logged at `info` instead of `debug` (default `false`)
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    strict: bool,
    debug: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            strict: true,
            debug: false,
        }
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub(crate) fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    pub(crate) fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }
}

/// Builder for a [Connection].
///
/// ```rust
/// use docbind::mapper::Connection;
///
/// let connection = Connection::builder().strict(false).debug(true).build();
/// assert!(!connection.config().is_strict());
/// ```
#[derive(Debug, Default)]
pub struct ConnectionBuilder {
    config: ConnectionConfig,
}

impl ConnectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.config.set_strict(strict);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.config.set_debug(debug);
        self
    }

    pub fn build(self) -> Connection {
        log::debug!("Opening connection with {:?}", self.config);
        Connection::with_config(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ConnectionConfig::default();
        assert!(config.is_strict());
        assert!(!config.is_debug());
    }

    #[test]
    fn builder_sets_flags() {
        let connection = ConnectionBuilder::new().strict(false).debug(true).build();
        assert!(!connection.config().is_strict());
        assert!(connection.config().is_debug());
    }
}
