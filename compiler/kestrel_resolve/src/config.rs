//! Resolver configuration.

use kestrel_types::{IntWidth, RealWidth};

/// Session-wide knobs, fixed when the `Context` is created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Resolve independent functions on the rayon pool.
    pub parallel: bool,
    /// Type of unsuffixed integer literals.
    pub default_int_width: IntWidth,
    /// Type of unsuffixed real literals.
    pub default_real_width: RealWidth,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            parallel: false,
            default_int_width: IntWidth::W64,
            default_real_width: RealWidth::W64,
        }
    }
}

impl ResolverConfig {
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    #[must_use]
    pub fn with_int_width(mut self, width: IntWidth) -> Self {
        self.default_int_width = width;
        self
    }

    #[must_use]
    pub fn with_real_width(mut self, width: RealWidth) -> Self {
        self.default_real_width = width;
        self
    }
}
