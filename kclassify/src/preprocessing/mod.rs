pub mod image;

pub use self::image::{ChannelOrder, ImagePreprocessor, ResizeFilter};
