//! Multi-chunk synthesis: fragments in, one stitched segment out.

use log::{error, info};

use super::{SpeechBackend, SynthesisOptions};
use crate::error::{NarrateError, Result};
use crate::media::{concat_with_pause, AudioSegment};
use crate::text::TextFragment;

/// Synthesize `fragments` in order through `backend` and join them with
/// `pause_ms` of silence.
///
/// Fragments are rendered one at a time; fragment *i + 1* is not sent before
/// fragment *i* comes back. The first failure aborts the whole batch and the
/// segments produced so far are dropped.
pub async fn synthesize_all<B>(
    fragments: &[TextFragment],
    backend: &B,
    options: &SynthesisOptions,
    pause_ms: u64,
) -> Result<AudioSegment>
where
    B: SpeechBackend + ?Sized,
{
    if fragments.is_empty() {
        return Err(NarrateError::validation("Nothing to synthesize: no text fragments."));
    }

    let total = fragments.len();
    let engine = backend.engine();
    let mut segments = Vec::with_capacity(total);

    for (i, fragment) in fragments.iter().enumerate() {
        let index = i + 1;
        info!("[{}] synthesizing fragment {}/{} ({} chars)", engine, index, total, fragment.char_len());

        let segment = backend
            .synthesize(fragment.as_str(), options)
            .await
            .map_err(|e| {
                error!("[{}] fragment {}/{} failed: {}", engine, index, total, e);
                NarrateError::Synthesis {
                    index,
                    reason: e.to_string(),
                }
            })?;

        segments.push(segment);
    }

    let output = concat_with_pause(segments, pause_ms)?;
    info!(
        "[{}] stitched {} fragment(s) into {:.2}s of audio",
        engine,
        total,
        output.duration().as_secs_f64()
    );

    Ok(output)
}
