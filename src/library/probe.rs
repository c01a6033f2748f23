// Recording duration extraction from container headers

use std::path::Path;

use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::get_probe;

/// Reads the duration of a recording.
///
/// Errors are not fatal to callers: the library records a duration of 0
/// for any file whose duration cannot be read.
pub trait DurationProbe: Send + Sync {
    fn duration_ms(&self, path: &Path) -> anyhow::Result<u64>;
}

/// Probe backed by symphonia's MP4 and ADTS demuxers.
#[derive(Debug, Default, Clone, Copy)]
pub struct MediaProbe;

impl DurationProbe for MediaProbe {
    fn duration_ms(&self, path: &Path) -> anyhow::Result<u64> {
        read_media_duration_ms(path)
    }
}

/// Read the duration of the default track from the container headers.
pub fn read_media_duration_ms(path: &Path) -> anyhow::Result<u64> {
    let file = std::fs::File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Err(anyhow::anyhow!("File is empty"));
    }

    let mss = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| anyhow::anyhow!("Probe failed: {}", e))?;

    let track = probed
        .format
        .default_track()
        .ok_or_else(|| anyhow::anyhow!("No audio track found"))?;
    let params = &track.codec_params;

    let n_frames = params
        .n_frames
        .ok_or_else(|| anyhow::anyhow!("No frame count in container"))?;

    if let Some(time_base) = params.time_base {
        let time = time_base.calc_time(n_frames);
        return Ok(time.seconds * 1000 + (time.frac * 1000.0) as u64);
    }

    match params.sample_rate {
        Some(rate) if rate > 0 => Ok(n_frames * 1000 / rate as u64),
        _ => Err(anyhow::anyhow!("No time base or sample rate")),
    }
}
