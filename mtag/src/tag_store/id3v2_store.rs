//! ID3v2 TagStore for MP3 and WAV files
//!
//! Works on lofty's [`Id3v2Tag`] frame by frame:
//! - text frames are reported under their frame id (`TIT2`, `TPE1`, `TRCK`)
//! - `TXXX` frames under their description
//! - comments (`COMM` with an empty description) under `COMM`
//!
//! A field keeps all of its values in one frame, NUL separated as ID3v2.4
//! defines. `TRCK`/`TPOS` hold a number and an optional total (`3/12`); the
//! two halves can be written separately through the generic names.

use super::lofty_store::lofty_error;
use super::TagStore;
use lofty::config::WriteOptions;
use lofty::id3::v2::{
    CommentFrame, ExtendedTextFrame, Frame as Id3Frame, FrameFlags, FrameValue, Id3v2Tag,
    TextInformationFrame,
};
use lofty::prelude::TagExt;
use lofty::TextEncoding;
use mtag_common::{Error, Frame, Result};
use std::path::{Path, PathBuf};

/// ID3v2.4 multi-value separator
const SEPARATOR: char = '\0';
const SEPARATOR_STR: &str = "\0";

const USER_TEXT: &str = "TXXX";
const USER_TEXT_PREFIX: &str = "TXXX:";
const COMMENT: &str = "COMM";
const TRACK: &str = "TRCK";
const DISC: &str = "TPOS";

/// Generic names and the frame each one writes to
static NAMED_FRAMES: [(&str, &str); 10] = [
    ("title", "TIT2"),
    ("artist", "TPE1"),
    ("album", "TALB"),
    ("albumartist", "TPE2"),
    ("genre", "TCON"),
    ("composer", "TCOM"),
    ("performer", "TPE3"),
    ("date", "TDRC"),
    ("year", "TDRC"),
    ("originaldate", "TDOR"),
];

/// Where a raw key is stored
#[derive(Debug, Clone, PartialEq)]
enum Target {
    /// Text information frame by id
    Text(String),
    /// `TRCK` or `TPOS`, whole or one half
    Pair(&'static str, PairPart),
    /// `TXXX` frame by description
    UserText(String),
    Comment,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PairPart {
    Whole,
    Number,
    Total,
}

/// `n/total` content of a `TRCK`/`TPOS` frame
#[derive(Debug, Clone, Default, PartialEq)]
struct NumberPair {
    number: Option<String>,
    total: Option<String>,
}

impl NumberPair {
    fn parse(text: &str) -> Self {
        let (number, total) = match text.split_once('/') {
            Some((number, total)) => (number, Some(total)),
            None => (text, None),
        };
        Self {
            number: Some(number.trim().to_string()),
            total: total
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
        }
    }

    /// Frame text, `None` when there is no number to store
    fn render(&self) -> Option<String> {
        let number = self.number.as_ref()?;
        Some(match &self.total {
            Some(total) => format!("{}/{}", number, total),
            None => number.clone(),
        })
    }
}

/// One file's ID3v2 tag, held in memory until saved
pub(super) struct Id3v2Store {
    path: PathBuf,
    tag: Id3v2Tag,
    /// Number pairs touched since open, by frame id
    pairs: Vec<(&'static str, NumberPair)>,
}

impl Id3v2Store {
    pub(super) fn new(path: &Path, tag: Option<Id3v2Tag>) -> Self {
        let tag = tag.unwrap_or_default();
        tracing::debug!(
            file = %path.display(),
            frames = tag.len(),
            "Opened ID3v2 tag"
        );
        Self {
            path: path.to_path_buf(),
            tag,
            pairs: Vec::new(),
        }
    }

    /// Frame a raw key writes to
    fn target(&self, raw_key: &str) -> Target {
        if let Some(description) = strip_user_text_prefix(raw_key) {
            return Target::UserText(description.to_string());
        }
        if let Some(target) = named_target(raw_key) {
            return target;
        }
        if self.has_user_text(raw_key) {
            return Target::UserText(raw_key.to_string());
        }
        match raw_key {
            TRACK => Target::Pair(TRACK, PairPart::Whole),
            DISC => Target::Pair(DISC, PairPart::Whole),
            COMMENT => Target::Comment,
            id if is_text_frame_id(id) => Target::Text(id.to_string()),
            _ => Target::UserText(raw_key.to_string()),
        }
    }

    fn frames(&self) -> impl Iterator<Item = &Id3Frame<'static>> {
        (&self.tag).into_iter()
    }

    fn has_user_text(&self, description: &str) -> bool {
        self.frames().any(|frame| {
            matches!(
                frame.content(),
                FrameValue::UserText(ExtendedTextFrame { description: d, .. }) if d == description
            )
        })
    }

    fn text(&self, id: &str) -> Option<&str> {
        self.frames()
            .find(|frame| frame.id_str() == id)
            .and_then(|frame| match frame.content() {
                FrameValue::Text(TextInformationFrame { value, .. }) => Some(value.as_str()),
                _ => None,
            })
    }

    fn set_text(&mut self, id: &str, value: Option<String>) -> Result<()> {
        self.tag.retain(|frame| frame.id_str() != id);
        let Some(value) = value else {
            return Ok(());
        };
        let frame = Id3Frame::new(
            id.to_string(),
            FrameValue::Text(TextInformationFrame {
                encoding: TextEncoding::UTF8,
                value,
            }),
            FrameFlags::default(),
        )
        .map_err(|e| Error::Write(format!("Cannot create frame {}: {}", id, e)))?;
        self.tag.insert(frame);
        Ok(())
    }

    fn set_user_text(&mut self, description: &str, value: Option<String>) {
        self.tag.retain(|frame| match frame.content() {
            FrameValue::UserText(ExtendedTextFrame { description: d, .. }) => {
                !d.eq_ignore_ascii_case(description)
            }
            _ => true,
        });
        if let Some(value) = value {
            self.tag.insert_user_text(description.to_string(), value);
        }
    }

    fn set_comment(&mut self, value: Option<String>) -> Result<()> {
        self.tag.retain(|frame| !is_plain_comment(frame));
        let Some(content) = value else {
            return Ok(());
        };
        let frame = Id3Frame::new(
            COMMENT,
            FrameValue::Comment(CommentFrame {
                encoding: TextEncoding::UTF8,
                language: *b"eng",
                description: String::new(),
                content,
            }),
            FrameFlags::default(),
        )
        .map_err(|e| Error::Write(format!("Cannot create frame {}: {}", COMMENT, e)))?;
        self.tag.insert(frame);
        Ok(())
    }

    /// Update one half (or all) of a number pair and rewrite its frame
    fn set_pair(&mut self, id: &'static str, part: PairPart, value: Option<String>) -> Result<()> {
        let pos = match self.pairs.iter().position(|(pair_id, _)| *pair_id == id) {
            Some(pos) => pos,
            None => {
                let current = self.text(id).map(NumberPair::parse).unwrap_or_default();
                self.pairs.push((id, current));
                self.pairs.len() - 1
            }
        };

        let pair = &mut self.pairs[pos].1;
        match part {
            PairPart::Whole => *pair = value.as_deref().map(NumberPair::parse).unwrap_or_default(),
            PairPart::Number => pair.number = value,
            PairPart::Total => pair.total = value.filter(|t| !t.trim().is_empty()),
        }
        let rendered = pair.render();
        self.set_text(id, rendered)
    }
}

impl TagStore for Id3v2Store {
    fn read_native(&mut self) -> Result<Vec<Frame>> {
        let mut frames: Vec<Frame> = Vec::new();

        for frame in &self.tag {
            let (key, content) = match frame.content() {
                FrameValue::Text(TextInformationFrame { value, .. }) => (frame.id_str(), value),
                FrameValue::UserText(ExtendedTextFrame {
                    description,
                    content,
                    ..
                }) => (description.as_str(), content),
                FrameValue::Comment(CommentFrame {
                    description,
                    content,
                    ..
                }) if description.is_empty() => (COMMENT, content),
                _ => continue,
            };
            let values = content.split(SEPARATOR).map(str::to_string);

            match frames.iter_mut().find(|f| f.raw_key == key) {
                Some(existing) => existing.values.extend(values),
                None => frames.push(Frame::new(key, values.collect())),
            }
        }

        Ok(frames)
    }

    fn write_native(&mut self, raw_key: &str, values: Option<&[String]>) -> Result<()> {
        let joined = values.map(|v| v.join(SEPARATOR_STR));
        match self.target(raw_key) {
            Target::Text(id) => self.set_text(&id, joined),
            Target::Pair(id, part) => {
                // A pair half holds one value
                let value = match part {
                    PairPart::Whole => joined,
                    _ => values.and_then(|v| v.first().cloned()),
                };
                self.set_pair(id, part, value)
            }
            Target::UserText(description) => {
                self.set_user_text(&description, joined);
                Ok(())
            }
            Target::Comment => self.set_comment(joined),
        }
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

/// Target of an exact lowercase generic name (`title`, `track`, ...)
fn named_target(raw_key: &str) -> Option<Target> {
    let target = match raw_key {
        "comment" => Target::Comment,
        "track" | "tracknumber" => Target::Pair(TRACK, PairPart::Number),
        "totaltracks" | "tracktotal" => Target::Pair(TRACK, PairPart::Total),
        "disc" | "discnumber" => Target::Pair(DISC, PairPart::Number),
        "totaldiscs" | "disctotal" => Target::Pair(DISC, PairPart::Total),
        name => {
            let (_, id) = NAMED_FRAMES.iter().find(|(n, _)| *n == name)?;
            Target::Text(id.to_string())
        }
    };
    Some(target)
}

/// Description of a `TXXX:<description>` key
fn strip_user_text_prefix(raw_key: &str) -> Option<&str> {
    let head = raw_key.get(..USER_TEXT_PREFIX.len())?;
    if head.eq_ignore_ascii_case(USER_TEXT_PREFIX) {
        raw_key.get(USER_TEXT_PREFIX.len()..)
    } else {
        None
    }
}

/// Four uppercase letters or digits starting with `T`, other than `TXXX`
fn is_text_frame_id(key: &str) -> bool {
    key.len() == 4
        && key.starts_with('T')
        && key != USER_TEXT
        && key
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

fn is_plain_comment(frame: &Id3Frame<'_>) -> bool {
    matches!(
        frame.content(),
        FrameValue::Comment(CommentFrame { description, .. }) if description.is_empty()
    )
}
