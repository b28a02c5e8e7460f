//! Map format variants.
//!
//! A space's on-disk flavor is one of a closed set: the engine
//! (allocation, capacity accounting, rewrite-through-temporary) is
//! variant-agnostic and asks the format only for entry serialization and
//! file naming. `Text` is the line-per-URL flavor; `Xml` serializes one
//! `<url>` element per line and names its files `.xml`.

use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// A reference to one partition, as listed in the summary index.
#[derive(Debug, Clone)]
pub struct PartRef {
    /// Partition sequence number.
    pub number: u32,
    /// Partition `updated_at` timestamp, read fresh from the index store.
    pub updated_at: String,
}

/// The closed set of entry-format variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapFormat {
    /// One URL per line.
    Text,
    /// One `<url>` element per line.
    Xml,
}

impl MapFormat {
    /// The label stored in the global index's `format_type` column.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Xml => "xml",
        }
    }

    /// Serializes one entry, terminator included.
    #[must_use]
    pub fn entry_line(&self, url: &str) -> String {
        match self {
            Self::Text => format!("{url}\n"),
            Self::Xml => format!("<url><loc>{url}</loc></url>\n"),
        }
    }

    /// Serialized byte length of one entry. Fixed at insert time: the
    /// same URL always serializes to the same bytes, so aggregate sizes
    /// can be adjusted by exact deltas on rename and delete.
    #[must_use]
    pub fn entry_len(&self, url: &str) -> u64 {
        self.entry_line(url).len() as u64
    }

    /// File name of partition `number`.
    #[must_use]
    pub fn part_file_name(&self, number: u32) -> String {
        format!("sitemap-{number}.{}", self.as_str())
    }

    /// File name of the summary index.
    #[must_use]
    pub fn index_file_name(&self) -> String {
        format!("sitemap.{}", self.as_str())
    }

    /// Builds the summary index document: one reference per partition,
    /// pointing at `<root_url>/<partition-file-name>`.
    #[must_use]
    pub fn index_document(&self, root_url: &str, parts: &[PartRef]) -> String {
        let mut doc = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <sitemapindex xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
        );
        for part in parts {
            doc.push_str("    <sitemap>\n");
            doc.push_str(&format!(
                "        <loc>{root_url}/{}</loc>\n",
                self.part_file_name(part.number)
            ));
            doc.push_str(&format!("        <lastmod>{}</lastmod>\n", part.updated_at));
            doc.push_str("    </sitemap>\n");
        }
        doc.push_str("</sitemapindex>\n");
        doc
    }
}

impl fmt::Display for MapFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MapFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "txt" => Ok(Self::Text),
            "xml" => Ok(Self::Xml),
            other => Err(Error::UnknownFormat {
                value: other.to_owned(),
            }),
        }
    }
}
