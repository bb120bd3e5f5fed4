//! Модуль для работы с медиа
//!
//! Decoding backend output, building silence and stitching segments.

pub mod audio;

pub use audio::{concat_with_pause, AudioSegment, SampleData};
