pub mod bar;
pub mod series;
pub mod signals;

pub use bar::*;
pub use series::*;
pub use signals::*;
