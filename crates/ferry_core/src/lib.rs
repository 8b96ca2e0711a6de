pub mod error;
pub mod identity;
pub mod resources;
pub mod traits;

pub mod prelude {
    pub use super::error::*;
    pub use super::identity::*;
    pub use super::resources::*;
    pub use super::traits::*;
}
