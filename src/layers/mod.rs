pub mod conv;
pub mod dense;
pub mod initialization;
pub mod pooling;
pub mod traits;

pub use conv::{Conv2DLayer, ConvGradients};
pub use dense::{DenseGradients, DenseLayer};
pub use initialization::WeightInit;
pub use pooling::{AvgPool2DLayer, MaxPool2DLayer};
pub use traits::Parameterized;
