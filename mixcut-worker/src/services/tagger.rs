//! Metadata tagger
//!
//! Each tag is written by its own `AtomicParsley <file> --<tag> <value>
//! --overWrite` call, modifying the file in place.

use std::path::Path;

use async_trait::async_trait;
use mixcut_common::Result;

use super::tool::run_tool;

/// One metadata change applied to an output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag<'a> {
    Artwork(&'a Path),
    Genre(&'a str),
    Year(&'a str),
}

impl Tag<'_> {
    fn flag(&self) -> &'static str {
        match self {
            Tag::Artwork(_) => "--artwork",
            Tag::Genre(_) => "--genre",
            Tag::Year(_) => "--year",
        }
    }

    fn value(&self) -> String {
        match self {
            Tag::Artwork(path) => path.to_string_lossy().into_owned(),
            Tag::Genre(value) | Tag::Year(value) => value.to_string(),
        }
    }
}

/// Writes metadata into audio files
#[async_trait]
pub trait MetadataTagger: Send + Sync {
    async fn apply(&self, file: &Path, tag: Tag<'_>) -> Result<()>;
}

/// Subprocess runner for `AtomicParsley`
#[derive(Debug, Clone)]
pub struct AtomicParsleyTagger {
    binary: String,
}

impl AtomicParsleyTagger {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn arguments(file: &Path, tag: &Tag<'_>) -> Vec<String> {
        vec![
            file.to_string_lossy().into_owned(),
            tag.flag().to_string(),
            tag.value(),
            "--overWrite".to_string(),
        ]
    }
}

#[async_trait]
impl MetadataTagger for AtomicParsleyTagger {
    async fn apply(&self, file: &Path, tag: Tag<'_>) -> Result<()> {
        tracing::debug!(file = %file.display(), flag = tag.flag(), "Tagging file");
        run_tool(&self.binary, Self::arguments(file, &tag), file.parent()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_arguments() {
        let file = Path::new("/w/01 Intro.m4a");

        assert_eq!(
            AtomicParsleyTagger::arguments(file, &Tag::Genre("Deep House")),
            vec!["/w/01 Intro.m4a", "--genre", "Deep House", "--overWrite"]
        );
        assert_eq!(
            AtomicParsleyTagger::arguments(file, &Tag::Year("2024")),
            vec!["/w/01 Intro.m4a", "--year", "2024", "--overWrite"]
        );
        assert_eq!(
            AtomicParsleyTagger::arguments(file, &Tag::Artwork(Path::new("/w/artwork.png"))),
            vec!["/w/01 Intro.m4a", "--artwork", "/w/artwork.png", "--overWrite"]
        );
    }
}
