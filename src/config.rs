use std::{env, fmt, rc::Rc};

use tracing::warn;

use crate::host::{MathProvider, StdMath};

pub const DEFAULT_MAX_CALL_DEPTH: usize = 512;
pub const MAX_CALL_DEPTH_VAR: &str = "SPRIG_MAX_CALL_DEPTH";

/// Settings fixed when a root environment is created.
#[derive(Clone)]
pub struct InterpreterConfig {
    /// Nested calls allowed before evaluation fails with a resource error.
    pub max_call_depth: usize,
    /// Fallback for calls to names with no registered function.
    pub math_provider: Rc<dyn MathProvider>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            math_provider: Rc::new(StdMath),
        }
    }
}

impl InterpreterConfig {
    /// Defaults overridden by `SPRIG_MAX_CALL_DEPTH` when it holds a
    /// positive integer.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = env::var(MAX_CALL_DEPTH_VAR) {
            match parse_depth(&raw) {
                Some(depth) => config.max_call_depth = depth,
                None => warn!(value = %raw, "ignoring invalid {MAX_CALL_DEPTH_VAR}"),
            }
        }
        config
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_math_provider(mut self, provider: impl MathProvider + 'static) -> Self {
        self.math_provider = Rc::new(provider);
        self
    }
}

fn parse_depth(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok().filter(|depth| *depth > 0)
}

impl fmt::Debug for InterpreterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterpreterConfig")
            .field("max_call_depth", &self.max_call_depth)
            .field("math_provider", &self.math_provider)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_must_be_positive_integer() {
        assert_eq!(parse_depth(" 64 "), Some(64));
        assert_eq!(parse_depth("0"), None);
        assert_eq!(parse_depth("-3"), None);
        assert_eq!(parse_depth("deep"), None);
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = InterpreterConfig::default().with_max_call_depth(8);
        assert_eq!(config.max_call_depth, 8);
    }
}
