//! WAV export of decoded clips.

use std::path::Path;

use tracing::info;

use super::pcm::DecodedAudio;

/// Write `audio` as a 16-bit integer WAV file.
///
/// Samples are scaled back by 32768 so a decode → export pass reproduces the
/// provider's PCM bit for bit.
pub fn write_wav(path: &Path, audio: &DecodedAudio) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: audio.channel_count(),
        sample_rate: audio.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in audio.interleaved() {
        let s = (sample * 32768.0).clamp(-32768.0, 32767.0) as i16;
        writer.write_sample(s)?;
    }
    writer.finalize()?;

    info!(
        "Saved {:.1}s of audio to {}",
        audio.duration().as_secs_f64(),
        path.display()
    );
    Ok(())
}
