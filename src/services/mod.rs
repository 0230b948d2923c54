pub mod preload;

pub use preload::{
    BatchOptions, CacheStats, HttpImageLoader, ImageCache, ImageLoader, PreloadConfig,
    PreloadOptions, PreloadOutcome,
};
