//! Normalized track metadata returned to clients.

use crate::tags::RawTags;
use serde::Serialize;

/// Shown in place of any tag the file did not carry.
pub const UNKNOWN: &str = "Unknown";

/// Track metadata with every field populated and absolute URLs.
///
/// Serialized with the field names the web client expects
/// (`name`, `Image`, `mp3`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackMetadata {
    pub artist: String,
    #[serde(rename = "name")]
    pub title: String,
    pub length: String,
    #[serde(rename = "Image")]
    pub image_url: String,
    pub album: String,
    pub genre: String,
    #[serde(rename = "mp3")]
    pub audio_url: String,
}

impl TrackMetadata {
    /// Applies the `"Unknown"` fallback to every absent tag.
    ///
    /// `artist_fallback` is tried before `"Unknown"` when the artist tag is
    /// missing; merges pass the requester's display name here.
    pub fn from_tags(
        tags: RawTags,
        artist_fallback: Option<&str>,
        image_url: String,
        audio_url: String,
    ) -> Self {
        let artist = tags
            .artist
            .or_else(|| artist_fallback.map(str::to_string))
            .unwrap_or_else(|| UNKNOWN.to_string());

        Self {
            artist,
            title: or_unknown(tags.title),
            length: or_unknown(tags.length),
            image_url,
            album: or_unknown(tags.album),
            genre: or_unknown(tags.genre),
            audio_url,
        }
    }
}

fn or_unknown(value: Option<String>) -> String {
    value.unwrap_or_else(|| UNKNOWN.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls() -> (String, String) {
        (
            "http://host/images/a.png".to_string(),
            "http://host/mp3/b.mp3".to_string(),
        )
    }

    #[test]
    fn every_absent_field_becomes_unknown() {
        let (image, audio) = urls();
        let track = TrackMetadata::from_tags(RawTags::default(), None, image, audio);

        assert_eq!(track.artist, UNKNOWN);
        assert_eq!(track.title, UNKNOWN);
        assert_eq!(track.length, UNKNOWN);
        assert_eq!(track.album, UNKNOWN);
        assert_eq!(track.genre, UNKNOWN);
    }

    #[test]
    fn fallback_applies_only_to_absent_fields() {
        // Every subset of the five fields.
        for mask in 0u8..32 {
            let pick = |bit: u8, value: &str| (mask & (1 << bit) != 0).then(|| value.to_string());
            let tags = RawTags {
                artist: pick(0, "Jane"),
                title: pick(1, "Song"),
                length: pick(2, "180"),
                album: pick(3, "Alb"),
                genre: pick(4, "Rock"),
            };
            let (image, audio) = urls();
            let track = TrackMetadata::from_tags(tags.clone(), None, image, audio);

            let expect = |v: &Option<String>| v.clone().unwrap_or_else(|| UNKNOWN.to_string());
            assert_eq!(track.artist, expect(&tags.artist), "mask {mask:05b}");
            assert_eq!(track.title, expect(&tags.title), "mask {mask:05b}");
            assert_eq!(track.length, expect(&tags.length), "mask {mask:05b}");
            assert_eq!(track.album, expect(&tags.album), "mask {mask:05b}");
            assert_eq!(track.genre, expect(&tags.genre), "mask {mask:05b}");
        }
    }

    #[test]
    fn artist_fallback_is_used_before_unknown() {
        let (image, audio) = urls();
        let track = TrackMetadata::from_tags(RawTags::default(), Some("dj_kate"), image, audio);
        assert_eq!(track.artist, "dj_kate");
        assert_eq!(track.title, UNKNOWN);
    }

    #[test]
    fn tagged_artist_wins_over_fallback() {
        let (image, audio) = urls();
        let tags = RawTags {
            artist: Some("Jane".to_string()),
            ..Default::default()
        };
        let track = TrackMetadata::from_tags(tags, Some("dj_kate"), image, audio);
        assert_eq!(track.artist, "Jane");
    }

    #[test]
    fn serializes_with_client_field_names() {
        let (image, audio) = urls();
        let track = TrackMetadata::from_tags(RawTags::default(), None, image, audio);
        let json = serde_json::to_value(&track).unwrap();

        assert_eq!(json["name"], UNKNOWN);
        assert_eq!(json["Image"], "http://host/images/a.png");
        assert_eq!(json["mp3"], "http://host/mp3/b.mp3");
        assert!(json.get("title").is_none());
        assert!(json.get("image_url").is_none());
    }
}
