//! WAV file export

use std::path::Path;

use log::info;

use crate::platform::Platform;
use crate::queue::WriteSource;
use crate::{CrapSynthError, Result};

/// Samples rendered per chunk while streaming to disk
const SAMPLES_PER_CHUNK: usize = 4096;

fn wav_spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Write 16-bit mono samples to a WAV file
///
/// # Arguments
///
/// * `path` - Destination file
/// * `samples` - Master output samples
/// * `sample_rate` - Sample rate stored in the header
pub fn write_wav_file(path: impl AsRef<Path>, samples: &[i16], sample_rate: u32) -> Result<()> {
    let mut writer = hound::WavWriter::create(path.as_ref(), wav_spec(sample_rate))
        .map_err(|e| CrapSynthError::AudioFileError(format!("failed to create WAV file: {e}")))?;

    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| CrapSynthError::AudioFileError(format!("failed to write sample: {e}")))?;
    }

    writer
        .finalize()
        .map_err(|e| CrapSynthError::AudioFileError(format!("failed to finalize WAV file: {e}")))?;

    Ok(())
}

/// Render `total_samples` of master output from `platform` straight to a WAV file
///
/// Rendering happens in chunks so memory use stays flat for long exports.
pub fn export_to_wav<S: WriteSource>(
    platform: &mut Platform<S>,
    total_samples: usize,
    path: impl AsRef<Path>,
) -> Result<()> {
    let sample_rate = platform.config().sample_rate;
    let mut writer = hound::WavWriter::create(path.as_ref(), wav_spec(sample_rate))
        .map_err(|e| CrapSynthError::AudioFileError(format!("failed to create WAV file: {e}")))?;

    let mut written = 0;
    while written < total_samples {
        let chunk = (total_samples - written).min(SAMPLES_PER_CHUNK);
        let buffers = platform.clock_and_mix(chunk);
        for &sample in &buffers.master {
            writer.write_sample(sample).map_err(|e| {
                CrapSynthError::AudioFileError(format!("failed to write sample: {e}"))
            })?;
        }
        written += chunk;
    }

    writer
        .finalize()
        .map_err(|e| CrapSynthError::AudioFileError(format!("failed to finalize WAV file: {e}")))?;

    info!(
        "wrote {} samples ({:.2}s) to {}",
        total_samples,
        total_samples as f64 / sample_rate as f64,
        path.as_ref().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChipConfig;

    #[test]
    fn test_write_wav_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("out.wav");
        write_wav_file(&path, &[0, 100, -100, i16::MAX], 250_000).expect("write");

        let reader = hound::WavReader::open(&path).expect("readable");
        assert_eq!(reader.spec().sample_rate, 250_000);
        assert_eq!(reader.spec().channels, 1);
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<std::result::Result<_, _>>()
            .expect("samples");
        assert_eq!(samples, vec![0, 100, -100, i16::MAX]);
    }

    #[test]
    fn test_export_platform_in_chunks() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("render.wav");
        let mut platform = Platform::new(ChipConfig::default()).expect("valid config");
        export_to_wav(&mut platform, SAMPLES_PER_CHUNK + 17, &path).expect("export");

        let reader = hound::WavReader::open(&path).expect("readable");
        assert_eq!(reader.len() as usize, SAMPLES_PER_CHUNK + 17);
        assert_eq!(platform.samples_rendered(), (SAMPLES_PER_CHUNK + 17) as u64);
    }
}
