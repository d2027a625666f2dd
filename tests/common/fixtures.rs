//! Synthesized audio fixtures
//!
//! The bytes after the tag block are a few fake MPEG frame headers. Nothing
//! in the server decodes audio, so this is enough for tag extraction and
//! storage.

use super::constants::*;
use id3::frame::{Picture, PictureType};
use id3::{Tag, TagLike, Version};

const FAKE_FRAME: &[u8] = &[0xff, 0xfb, 0x90, 0x64, 0x00, 0x00, 0x00, 0x00];

fn with_audio(mut bytes: Vec<u8>) -> Vec<u8> {
    for _ in 0..32 {
        bytes.extend_from_slice(FAKE_FRAME);
    }
    bytes
}

pub fn encode_tag(tag: &Tag) -> Vec<u8> {
    let mut bytes = Vec::new();
    tag.write_to(&mut bytes, Version::Id3v24)
        .expect("Failed to write fixture tag");
    with_audio(bytes)
}

/// MP3 with every field and a cover picture
pub fn tagged_mp3() -> Vec<u8> {
    let mut tag = Tag::new();
    tag.set_artist(FIXTURE_ARTIST);
    tag.set_title(FIXTURE_TITLE);
    tag.set_album(FIXTURE_ALBUM);
    tag.set_genre(FIXTURE_GENRE);
    tag.set_text("TLEN", FIXTURE_LENGTH);
    tag.add_frame(Picture {
        mime_type: "image/png".to_string(),
        picture_type: PictureType::CoverFront,
        description: String::new(),
        data: FIXTURE_ARTWORK.to_vec(),
    });
    encode_tag(&tag)
}

/// MP3 with only a title
pub fn title_only_mp3(title: &str) -> Vec<u8> {
    let mut tag = Tag::new();
    tag.set_title(title);
    encode_tag(&tag)
}

/// MP3 without any tag block
pub fn untagged_mp3() -> Vec<u8> {
    with_audio(Vec::new())
}

/// Tag header declaring an unsupported ID3 version
pub fn malformed_tag_mp3() -> Vec<u8> {
    let mut bytes = b"ID3\x07\x00\x00\x00\x00\x01\x00".to_vec();
    bytes.extend_from_slice(&[0x42; 256]);
    bytes
}
