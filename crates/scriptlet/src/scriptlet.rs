//! Scriptlet trait for ordered lifecycle units
//!
//! A Scriptlet owns one slice of an installation and knows how to create,
//! refresh and remove it.

use crate::types::Phase;
use anyhow::Result;
use std::fmt;

/// Core trait for lifecycle units
///
/// Every method must be idempotent and must depend only on the context it is
/// given plus the live state it inspects at call time. That is what lets a
/// respawn converge to the result of a fresh spawn, and lets destroy clean up
/// after a spawn that stopped halfway.
///
/// # Example
///
/// ```ignore
/// use scriptlet::Scriptlet;
///
/// #[derive(Debug)]
/// struct LogDirectory;
///
/// impl Scriptlet<std::path::Path> for LogDirectory {
///     fn name(&self) -> &'static str {
///         "log_directory"
///     }
///
///     fn spawn(&self, root: &std::path::Path) -> anyhow::Result<()> {
///         std::fs::create_dir_all(root.join("logs"))?;
///         Ok(())
///     }
///
///     fn respawn(&self, root: &std::path::Path) -> anyhow::Result<()> {
///         self.spawn(root)
///     }
///
///     fn destroy(&self, root: &std::path::Path) -> anyhow::Result<()> {
///         match std::fs::remove_dir_all(root.join("logs")) {
///             Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
///             _ => Ok(()),
///         }
///     }
/// }
/// ```
pub trait Scriptlet<C: ?Sized>: fmt::Debug {
    /// Name the scriptlet is registered and configured under
    fn name(&self) -> &'static str;

    /// Create this unit's resources
    fn spawn(&self, ctx: &C) -> Result<()>;

    /// Refresh this unit's resources in place
    fn respawn(&self, ctx: &C) -> Result<()>;

    /// Remove this unit's resources
    fn destroy(&self, ctx: &C) -> Result<()>;

    /// Dispatch to the method for `phase`
    fn run(&self, phase: Phase, ctx: &C) -> Result<()> {
        match phase {
            Phase::Spawn => self.spawn(ctx),
            Phase::Respawn => self.respawn(ctx),
            Phase::Destroy => self.destroy(ctx),
        }
    }
}

/// A boxed scriptlet for type-erased storage
pub type BoxedScriptlet<C> = Box<dyn Scriptlet<C>>;
