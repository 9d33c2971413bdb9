pub mod video;

pub use video::{Channel, IsNew, VideoRecord};
