//! Canonical 44-byte RIFF/WAVE (PCM16, mono) encoding and on-disk writes.

use crate::error::CaptureError;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

pub const WAV_HEADER_LEN: usize = 44;

pub fn wav_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Encode mono i16 samples as a PCM WAV byte image. Deterministic: the same
/// input always yields the same bytes.
pub fn encode(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, CaptureError> {
    let mut bytes = Vec::with_capacity(WAV_HEADER_LEN + samples.len() * 2);
    {
        let mut writer = WavWriter::new(Cursor::new(&mut bytes), wav_spec(sample_rate))?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(bytes)
}

/// Encode and write `samples` to `path`.
///
/// The bytes land in `<path>.part` first, are synced, then renamed into place,
/// so anything watching the directory only ever sees complete files.
pub fn write_wav_file(path: &Path, samples: &[i16], sample_rate: u32) -> Result<(), CaptureError> {
    let bytes = encode(samples, sample_rate)?;
    let partial = partial_path(path);
    let write_err = |source| CaptureError::Write {
        path: path.to_path_buf(),
        source,
    };

    let result = File::create(&partial)
        .and_then(|mut file| {
            file.write_all(&bytes)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&partial, path));
    if let Err(err) = result {
        let _ = fs::remove_file(&partial);
        return Err(write_err(err));
    }
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}
