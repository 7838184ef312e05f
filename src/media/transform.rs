use tracing::info;

use crate::config::EncodingConfig;
use crate::error::Result;
use super::models::{
    AacAudio, AacProfile, ArmResource, Codec, Format, H264Complexity, H264Layer, H264Video,
    Mp4Format, OnErrorType, Preset, Priority, StandardEncoderPreset, Transform, TransformOutput,
    TransformProperties,
};
use super::MediaServicesTrait;

/// Output file naming template understood by the standard encoder
pub const FILENAME_PATTERN: &str = "Video-{Basename}-{Label}-{Bitrate}{Extension}";

/// Single-output transform: AAC stereo plus one 720p H.264 layer in MP4
pub fn encoding_transform(config: &EncodingConfig) -> Transform {
    let audio = Codec::AacAudio(AacAudio {
        channels: 2,
        sampling_rate: 48_000,
        bitrate: 128_000,
        profile: AacProfile::AacLc,
    });

    let video = Codec::H264Video(H264Video {
        complexity: H264Complexity::Speed,
        layers: vec![H264Layer {
            bitrate: config.video_bitrate,
            width: "1280".to_string(),
            height: "720".to_string(),
            label: "720p".to_string(),
            frame_rate: "30".to_string(),
        }],
    });

    Transform {
        properties: TransformProperties {
            description: Some(config.description.clone()),
            outputs: vec![TransformOutput {
                on_error: OnErrorType::StopProcessingJob,
                relative_priority: Priority::Normal,
                preset: Preset::StandardEncoder(StandardEncoderPreset {
                    codecs: vec![audio, video],
                    formats: vec![Format::Mp4(Mp4Format {
                        filename_pattern: FILENAME_PATTERN.to_string(),
                    })],
                }),
            }],
        },
    }
}

/// Create or update the encoding transform under `name`
pub async fn ensure_transform(
    media: &dyn MediaServicesTrait,
    name: &str,
    config: &EncodingConfig,
) -> Result<ArmResource> {
    info!("Creating or updating transform {}", name);
    let transform = encoding_transform(config);
    let resource = media.create_or_update_transform(name, &transform).await?;
    info!("Transform {} is ready", name);
    Ok(resource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MockMediaServicesTrait;

    #[test]
    fn test_transform_wire_format() {
        let body = serde_json::to_value(encoding_transform(&EncodingConfig::default())).unwrap();
        let output = &body["properties"]["outputs"][0];

        assert_eq!(output["onError"], "StopProcessingJob");
        assert_eq!(output["relativePriority"], "Normal");
        assert_eq!(output["preset"]["@odata.type"], "#Microsoft.Media.StandardEncoderPreset");

        let audio = &output["preset"]["codecs"][0];
        assert_eq!(audio["@odata.type"], "#Microsoft.Media.AacAudio");
        assert_eq!(audio["channels"], 2);
        assert_eq!(audio["samplingRate"], 48000);
        assert_eq!(audio["bitrate"], 128000);
        assert_eq!(audio["profile"], "AacLc");

        let video = &output["preset"]["codecs"][1];
        assert_eq!(video["@odata.type"], "#Microsoft.Media.H264Video");
        assert_eq!(video["complexity"], "Speed");
        assert_eq!(video["layers"][0]["bitrate"], 3_600_000);
        assert_eq!(video["layers"][0]["width"], "1280");
        assert_eq!(video["layers"][0]["height"], "720");
        assert_eq!(video["layers"][0]["label"], "720p");
        assert_eq!(video["layers"][0]["frameRate"], "30");

        let format = &output["preset"]["formats"][0];
        assert_eq!(format["@odata.type"], "#Microsoft.Media.Mp4Format");
        assert_eq!(format["filenamePattern"], FILENAME_PATTERN);
    }

    #[test]
    fn test_transform_uses_configured_bitrate() {
        let config = EncodingConfig {
            video_bitrate: 2_000_000,
            ..EncodingConfig::default()
        };
        let body = serde_json::to_value(encoding_transform(&config)).unwrap();
        assert_eq!(
            body["properties"]["outputs"][0]["preset"]["codecs"][1]["layers"][0]["bitrate"],
            2_000_000
        );
    }

    #[tokio::test]
    async fn test_ensure_transform_is_create_or_update() {
        let mut media = MockMediaServicesTrait::new();
        media
            .expect_create_or_update_transform()
            .withf(|name, _| name == "t1")
            .times(2)
            .returning(|name, _| {
                Ok(ArmResource {
                    name: name.to_string(),
                    id: format!("/transforms/{}", name),
                })
            });

        let config = EncodingConfig::default();
        let first = ensure_transform(&media, "t1", &config).await.unwrap();
        let second = ensure_transform(&media, "t1", &config).await.unwrap();
        assert_eq!(first, second);
    }
}
