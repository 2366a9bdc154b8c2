pub mod error;
pub mod random;

pub use error::Error;
pub use random::{GeneratorSettings, RandomGenerator};

use linktrack_core::ShortCode;

/// Trait for generating candidate short codes.
///
/// Implementations are pure generators that don't interact with storage.
/// Candidates may collide with codes already issued; the shortener checks
/// and retries.
pub trait Generator: Send + Sync + 'static {
    type Output: Into<ShortCode>;

    /// Produces the next candidate code.
    fn generate(&self) -> Self::Output;

    /// Number of distinct codes this generator can produce, if known.
    fn space_size(&self) -> Option<u128> {
        None
    }
}
