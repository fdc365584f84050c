//! lofty-backed TagStore
//!
//! MP3 and WAV files carry ID3v2 and are edited frame by frame (see
//! [`super::id3v2_store`]). Every other container goes through lofty's
//! generic [`Tag`]: the primary tag of the file (or the first tag present) is
//! exposed item by item. Items keep their native key (`TITLE`,
//! `TRACKNUMBER`, APE `Title`) when that key names the same canonical field
//! as the item; otherwise (MP4 atoms, RIFF INFO ids) they are reported under
//! a generic lowercase name (`title`, `tracknumber`, ...).
//!
//! Writes resolve the raw key back to a lofty [`ItemKey`] for the tag's type
//! and are persisted with [`TagExt::save_to_path`].

use super::id3v2_store::Id3v2Store;
use super::{TagStore, TagStoreProvider};
use lofty::config::{ParseOptions, WriteOptions};
use lofty::error::{ErrorKind as LoftyErrorKind, LoftyError};
use lofty::file::{AudioFile, FileType, TaggedFileExt};
use lofty::iff::wav::WavFile;
use lofty::mpeg::MpegFile;
use lofty::prelude::TagExt;
use lofty::probe::Probe;
use lofty::tag::{ItemKey, ItemValue, Tag, TagItem, TagType};
use mtag_common::{AliasTable, Error, Frame, Result};
use std::io;
use std::path::{Path, PathBuf};

/// Extensions lofty can open for tag editing
const SUPPORTED_EXTENSIONS: [&str; 7] = ["mp3", "flac", "m4a", "mp4", "ogg", "opus", "wav"];

/// Generic names for the items every container maps
///
/// The first entry for an item is the name reported on read. Canonical field
/// names are listed too so writes of `track`, `date`, ... reach the right item.
static GENERIC_KEYS: [(&str, ItemKey); 19] = [
    ("title", ItemKey::TrackTitle),
    ("artist", ItemKey::TrackArtist),
    ("album", ItemKey::AlbumTitle),
    ("albumartist", ItemKey::AlbumArtist),
    ("genre", ItemKey::Genre),
    ("comment", ItemKey::Comment),
    ("composer", ItemKey::Composer),
    ("performer", ItemKey::Performer),
    ("date", ItemKey::RecordingDate),
    ("year", ItemKey::Year),
    ("originaldate", ItemKey::OriginalReleaseDate),
    ("tracknumber", ItemKey::TrackNumber),
    ("tracktotal", ItemKey::TrackTotal),
    ("discnumber", ItemKey::DiscNumber),
    ("disctotal", ItemKey::DiscTotal),
    ("track", ItemKey::TrackNumber),
    ("totaltracks", ItemKey::TrackTotal),
    ("disc", ItemKey::DiscNumber),
    ("totaldiscs", ItemKey::DiscTotal),
];

/// Freeform MP4 atom prefix for custom fields
const MP4_FREEFORM: &str = "----:com.apple.iTunes:";

/// Provider for the formats lofty handles
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyProvider;

impl LoftyProvider {
    pub fn new() -> Self {
        Self
    }
}

impl TagStoreProvider for LoftyProvider {
    fn open(&self, path: &Path) -> Result<Box<dyn TagStore>> {
        let detected = Probe::open(path)
            .map_err(|e| lofty_error(path, e))?
            .guess_file_type()
            .map_err(|e| Error::from_io(path.display(), e))?;

        // Tags only, audio properties are never needed
        let options = ParseOptions::new().read_properties(false);
        match detected.file_type() {
            Some(FileType::Mpeg) => {
                let file = MpegFile::read_from(&mut detected.into_inner(), options)
                    .map_err(|e| lofty_error(path, e))?;
                Ok(Box::new(Id3v2Store::new(path, file.id3v2().cloned())))
            }
            Some(FileType::Wav) => {
                let file = WavFile::read_from(&mut detected.into_inner(), options)
                    .map_err(|e| lofty_error(path, e))?;
                Ok(Box::new(Id3v2Store::new(path, file.id3v2().cloned())))
            }
            _ => {
                let tagged_file = detected
                    .options(options)
                    .read()
                    .map_err(|e| lofty_error(path, e))?;

                let tag = tagged_file
                    .primary_tag()
                    .or_else(|| tagged_file.first_tag())
                    .cloned()
                    .unwrap_or_else(|| Tag::new(tagged_file.primary_tag_type()));

                tracing::debug!(
                    file = %path.display(),
                    tag_type = ?tag.tag_type(),
                    items = tag.len(),
                    "Opened tag"
                );

                Ok(Box::new(LoftyStore {
                    path: path.to_path_buf(),
                    tag,
                }))
            }
        }
    }

    fn supports(&self, ext: &str) -> bool {
        SUPPORTED_EXTENSIONS.contains(&ext)
    }
}

/// One file's tag, held in memory until saved
struct LoftyStore {
    path: PathBuf,
    tag: Tag,
}

impl LoftyStore {
    fn tag_type(&self) -> TagType {
        self.tag.tag_type()
    }

    /// Name a tag item is reported under
    fn frame_key(&self, key: &ItemKey) -> Option<String> {
        let generic = GENERIC_KEYS
            .iter()
            .find(|(_, k)| k == key)
            .map(|(name, _)| *name);
        let native = match key {
            ItemKey::Unknown(native) => Some(native.as_str()),
            other => other.map_key(self.tag_type(), true),
        };

        match (native, generic) {
            (Some(native), Some(generic)) if same_field(native, generic) => {
                Some(native.to_string())
            }
            (_, Some(generic)) => Some(generic.to_string()),
            (Some(native), None) => Some(
                native
                    .strip_prefix(MP4_FREEFORM)
                    .unwrap_or(native)
                    .to_string(),
            ),
            (None, None) => None,
        }
    }

    /// Item key a raw frame key writes to
    fn item_key(&self, raw_key: &str) -> ItemKey {
        let lowered = raw_key.to_lowercase();
        if let Some((_, key)) = GENERIC_KEYS.iter().find(|(name, _)| *name == lowered) {
            return key.clone();
        }
        match ItemKey::from_key(self.tag_type(), raw_key) {
            // MP4 stores arbitrary fields as freeform atoms
            ItemKey::Unknown(_)
                if self.tag_type() == TagType::Mp4Ilst
                    && raw_key.len() != 4
                    && !raw_key.starts_with("----") =>
            {
                ItemKey::Unknown(format!("{}{}", MP4_FREEFORM, raw_key))
            }
            key => key,
        }
    }

    /// True when the tag's format can store `key`
    ///
    /// Unknown keys: any name for Vorbis comments and APE, freeform atoms or
    /// four-character codes for MP4, `I...` ids for RIFF INFO.
    fn accepts(&self, key: &ItemKey) -> bool {
        match key {
            ItemKey::Unknown(native) => match self.tag_type() {
                TagType::VorbisComments | TagType::Ape => true,
                TagType::Mp4Ilst => native.starts_with("----:") || native.chars().count() == 4,
                TagType::RiffInfo => native.len() == 4 && native.starts_with('I'),
                _ => false,
            },
            known => known.map_key(self.tag_type(), false).is_some(),
        }
    }
}

/// True when `native` is an alias of the canonical field `generic` folds onto
fn same_field(native: &str, generic: &str) -> bool {
    let aliases = AliasTable::standard();
    match (aliases.resolve(native), aliases.resolve(generic)) {
        (Some(a), Some(b)) => a.name == b.name,
        _ => false,
    }
}

impl TagStore for LoftyStore {
    fn read_native(&mut self) -> Result<Vec<Frame>> {
        let mut frames: Vec<Frame> = Vec::new();

        for item in self.tag.items() {
            let text = match item.value() {
                ItemValue::Text(s) | ItemValue::Locator(s) => s,
                ItemValue::Binary(_) => continue,
            };
            let Some(key) = self.frame_key(item.key()) else {
                continue;
            };
            // NUL separated multi-values
            let values = text.split('\0').map(str::to_string);

            // Items sharing a key form one frame
            match frames.iter_mut().find(|f| f.raw_key == key) {
                Some(frame) => frame.values.extend(values),
                None => frames.push(Frame::new(key, values.collect())),
            }
        }

        Ok(frames)
    }

    fn write_native(&mut self, raw_key: &str, values: Option<&[String]>) -> Result<()> {
        let key = self.item_key(raw_key);
        self.tag.remove_key(&key);

        let Some(values) = values else {
            return Ok(());
        };
        if !self.accepts(&key) {
            return Err(Error::Write(format!(
                "{:?} tags cannot store '{}'",
                self.tag_type(),
                raw_key
            )));
        }
        for value in values {
            self.tag
                .push_unchecked(TagItem::new(key.clone(), ItemValue::Text(value.clone())));
        }
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        self.tag
            .save_to_path(&self.path, WriteOptions::default())
            .map_err(|e| match lofty_error(&self.path, e) {
                Error::Format(msg) => Error::Write(msg),
                other => other,
            })
    }
}

/// Map a lofty error, keeping I/O causes (permission, disk full) intact
pub(super) fn lofty_error(path: &Path, err: LoftyError) -> Error {
    match err.kind() {
        LoftyErrorKind::Io(io_err) => {
            let io_err = match io_err.raw_os_error() {
                Some(code) => io::Error::from_raw_os_error(code),
                None => io::Error::new(io_err.kind(), io_err.to_string()),
            };
            Error::from_io(path.display(), io_err)
        }
        _ => Error::Format(format!("{}: {}", path.display(), err)),
    }
}
