pub mod control;
pub mod error;
pub mod events;
pub mod host;
pub mod layer;
pub mod memory;
pub mod options;
pub mod reconciler;
pub mod selection;
pub mod surface;

pub use control::*;
pub use error::*;
pub use events::*;
pub use host::*;
pub use layer::*;
pub use options::*;
pub use reconciler::*;
pub use selection::{Revalidation, SelectionTracker, VisibilityAssignment, derive_initial_selection};
pub use surface::*;
