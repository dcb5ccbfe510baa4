pub mod category;
pub mod collaborators;
pub mod errors;
pub mod event;
pub mod greens;
pub mod processed;
pub mod result;
pub mod source;
pub mod waveform;

pub use category::*;
pub use collaborators::*;
pub use errors::*;
pub use event::*;
pub use greens::*;
pub use processed::*;
pub use result::*;
pub use source::*;
pub use waveform::*;
