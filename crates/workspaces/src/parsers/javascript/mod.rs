//! JavaScript lockfile parsers.

#[cfg(feature = "parser-npm")]
pub mod npm;
#[cfg(feature = "parser-pnpm")]
pub mod pnpm;
#[cfg(feature = "parser-yarn-classic")]
pub mod yarn_classic;

#[cfg(feature = "parser-npm")]
pub use npm::NpmLockfileParser;
#[cfg(feature = "parser-pnpm")]
pub use pnpm::PnpmLockfileParser;
#[cfg(feature = "parser-yarn-classic")]
pub use yarn_classic::YarnClassicLockfileParser;
