//! SPA audio format pod construction

use std::io::Cursor;

use pipewire as pw;
use pw::spa::param::audio::{AudioFormat, AudioInfoRaw};
use pw::spa::param::ParamType;
use pw::spa::pod::serialize::PodSerializer;
use pw::spa::pod::{Object, Pod, Value};
use pw::spa::utils::SpaTypes;
use tracing::debug;

use crate::error::PlatformError;
use crate::format::RawAudioFormat;

/// Serialize an F32LE `EnumFormat` pod for `format` into `buffer`
///
/// The returned pod borrows `buffer`. Fails with `BufferTooSmall` when the pod
/// does not fit; 1024 bytes is always enough for a raw audio format.
pub fn build_audio_format_pod<'b>(
    buffer: &'b mut [u8],
    format: &RawAudioFormat,
) -> Result<&'b Pod, PlatformError> {
    format.validate()?;

    let mut audio_info = AudioInfoRaw::new();
    audio_info.set_format(AudioFormat::F32LE);
    audio_info.set_rate(format.sample_rate);
    audio_info.set_channels(format.channels);

    let capacity = buffer.len();
    let (_, size) = PodSerializer::serialize(
        Cursor::new(&mut buffer[..]),
        &Value::Object(Object {
            type_: SpaTypes::ObjectParamFormat.as_raw(),
            id: ParamType::EnumFormat.as_raw(),
            properties: audio_info.into(),
        }),
    )
    .map_err(|_| PlatformError::BufferTooSmall { capacity })?;

    let len = size as usize;
    debug!(
        "Built {}-byte format pod ({} Hz, {} channels)",
        len, format.sample_rate, format.channels
    );

    let bytes: &'b [u8] = buffer;
    Pod::from_bytes(&bytes[..len])
        .ok_or_else(|| PlatformError::Internal("serialized format pod is malformed".into()))
}
