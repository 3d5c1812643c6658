//! Parse and digest capabilities consumed by the pipeline
//!
//! Every format extractor delegates its byte-level grammar to one of these
//! traits. [`Primitives::default`] wires the built-in implementations; tests
//! swap individual fields for fakes that return fixed values.

use std::fmt;
use std::sync::Arc;

use crate::common::{MagicSniffer, Sha256Digester};
use crate::extractors::audio::{AudioProperties, LoftyProbe};
use crate::extractors::docx::ZipArchiveReader;
use crate::extractors::eml::{ParsedMessage, Rfc822Parser};
use crate::extractors::image::{EmbeddedMetadataReader, TagMap};
use crate::extractors::pdf::{LopdfReader, PdfDocumentInfo};
use crate::extractors::video::{ContainerAnalyzer, MediaTrack};

/// Content digest: bytes to 64 lowercase hex characters
pub trait Digester: Send + Sync {
    fn digest(&self, bytes: &[u8]) -> Result<String, String>;
}

/// Signature sniffer: byte prefix to (extension, MIME)
pub trait Sniffer: Send + Sync {
    fn sniff(&self, prefix: &[u8]) -> Option<(String, String)>;
}

/// Embedded image metadata (EXIF / TIFF / XMP).
///
/// `Ok(None)` means the container was readable but carried no metadata.
pub trait ExifReader: Send + Sync {
    fn read_tags(&self, bytes: &[u8]) -> Result<Option<TagMap>, String>;
}

/// PDF document information dictionary and document-level flags
pub trait PdfReader: Send + Sync {
    fn read_info(&self, bytes: &[u8]) -> Result<PdfDocumentInfo, String>;
}

/// Named entry lookup inside an archive; `Ok(None)` when the entry is absent
pub trait ArchiveReader: Send + Sync {
    fn read_entry(&self, bytes: &[u8], name: &str) -> Result<Option<String>, String>;
}

/// RFC 822 message parsing
pub trait MailParser: Send + Sync {
    fn parse(&self, text: &str) -> Result<ParsedMessage, String>;
}

/// Media container analysis into typed tracks
pub trait MediaAnalyzer: Send + Sync {
    fn analyze(&self, bytes: &[u8]) -> Result<Vec<MediaTrack>, String>;
}

/// Audio stream properties and common tags
pub trait AudioProbe: Send + Sync {
    fn probe(&self, bytes: &[u8]) -> Result<AudioProperties, String>;
}

/// The full set of collaborators handed to one analysis run
#[derive(Clone)]
pub struct Primitives {
    pub digester: Arc<dyn Digester>,
    pub sniffer: Arc<dyn Sniffer>,
    pub exif: Arc<dyn ExifReader>,
    pub pdf: Arc<dyn PdfReader>,
    pub archive: Arc<dyn ArchiveReader>,
    pub mail: Arc<dyn MailParser>,
    pub media: Arc<dyn MediaAnalyzer>,
    pub audio: Arc<dyn AudioProbe>,
}

impl Default for Primitives {
    fn default() -> Self {
        Self {
            digester: Arc::new(Sha256Digester),
            sniffer: Arc::new(MagicSniffer),
            exif: Arc::new(EmbeddedMetadataReader),
            pdf: Arc::new(LopdfReader),
            archive: Arc::new(ZipArchiveReader),
            mail: Arc::new(Rfc822Parser),
            media: Arc::new(ContainerAnalyzer),
            audio: Arc::new(LoftyProbe),
        }
    }
}

impl Primitives {
    pub fn with_digester(mut self, digester: impl Digester + 'static) -> Self {
        self.digester = Arc::new(digester);
        self
    }

    pub fn with_sniffer(mut self, sniffer: impl Sniffer + 'static) -> Self {
        self.sniffer = Arc::new(sniffer);
        self
    }

    pub fn with_exif(mut self, reader: impl ExifReader + 'static) -> Self {
        self.exif = Arc::new(reader);
        self
    }

    pub fn with_pdf(mut self, reader: impl PdfReader + 'static) -> Self {
        self.pdf = Arc::new(reader);
        self
    }

    pub fn with_archive(mut self, reader: impl ArchiveReader + 'static) -> Self {
        self.archive = Arc::new(reader);
        self
    }

    pub fn with_mail(mut self, parser: impl MailParser + 'static) -> Self {
        self.mail = Arc::new(parser);
        self
    }

    pub fn with_media(mut self, analyzer: impl MediaAnalyzer + 'static) -> Self {
        self.media = Arc::new(analyzer);
        self
    }

    pub fn with_audio(mut self, probe: impl AudioProbe + 'static) -> Self {
        self.audio = Arc::new(probe);
        self
    }
}

impl fmt::Debug for Primitives {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Primitives").finish_non_exhaustive()
    }
}
