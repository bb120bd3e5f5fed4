// Data models exchanged with clients

pub mod tts;

pub use tts::{NarrationRequest, TtsForm};
