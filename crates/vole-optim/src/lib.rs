//! # vole-optim
//!
//! Optimizers for vole parameters. An optimizer holds a set of
//! [`SharedParameter`]s; after a graph's backward pass has exported
//! gradients into them, [`Optimizer::step`] applies one update and
//! [`Optimizer::reset_gradients`] clears the slate for the next batch.
//!
//! The optimizers never see a graph: they interact with the engine purely
//! through `Parameter`'s value/gradient operations.

pub mod adam;
pub mod sgd;

pub use adam::Adam;
pub use sgd::SGD;

use vole_core::backend::Backend;
use vole_core::error::Result;
use vole_core::parameter::SharedParameter;

/// A parameter-update strategy.
pub trait Optimizer<B: Backend> {
    /// The parameters this optimizer manages.
    fn parameters(&self) -> &[SharedParameter<B>];

    /// Apply one update step using the currently accumulated gradients.
    fn step(&mut self) -> Result<()>;

    /// Zero every managed parameter's gradient.
    fn reset_gradients(&mut self) -> Result<()> {
        for param in self.parameters() {
            param.write().unwrap().reset_gradient()?;
        }
        Ok(())
    }
}
