pub mod processor;

pub use self::processor::{ConnectionProcessor, ProcessorFactory};
