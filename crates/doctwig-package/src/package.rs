//! Template packages
//!
//! A [`TemplatePackage`] is an ODT or DOCX container whose XML parts carry
//! template code. Each part is handled by its own
//! [`TemplateDocument`](doctwig_core::TemplateDocument); parts share
//! nothing, so they are processed in parallel.

use std::io::{Read, Seek, Write};
use std::path::Path;

use doctwig_core::{RepairConfig, TemplateDocument, VarSet};
use rayon::prelude::*;
use serde::Serialize;

use crate::archive::{PackageArchive, MIMETYPE};
use crate::error::{PackageError, Result};

const ODT_MEDIA_PREFIX: &str = "application/vnd.oasis.opendocument.";
const DOCX_MAIN_PART: &str = "word/document.xml";

/// Container format of a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    /// OpenDocument text (`.odt`, `.ott`)
    Odt,
    /// WordprocessingML (`.docx`, `.dotx`)
    Docx,
}

impl PackageKind {
    /// Detect the format from the archive contents
    pub fn detect(archive: &PackageArchive) -> Result<Self> {
        if let Some(mimetype) = archive.get(MIMETYPE) {
            let mimetype = String::from_utf8_lossy(mimetype);
            if mimetype.trim().starts_with(ODT_MEDIA_PREFIX) {
                return Ok(Self::Odt);
            }
            return Err(PackageError::Unsupported(format!(
                "media type '{}'",
                mimetype.trim()
            )));
        }
        if archive.contains(DOCX_MAIN_PART) {
            return Ok(Self::Docx);
        }
        Err(PackageError::Unsupported(
            "neither an OpenDocument nor a WordprocessingML package".to_string(),
        ))
    }

    /// Whether the entry at `path` is an XML part that may carry template code
    pub fn is_template_part(self, path: &str) -> bool {
        match self {
            Self::Odt => path == "content.xml" || path == "styles.xml",
            Self::Docx => {
                path == DOCX_MAIN_PART
                    || path
                        .strip_prefix("word/")
                        .filter(|rest| !rest.contains('/') && rest.ends_with(".xml"))
                        .is_some_and(|rest| {
                            rest.starts_with("header") || rest.starts_with("footer")
                        })
            }
        }
    }

    /// Repair preset matching the format's markup
    pub fn repair_config(self) -> RepairConfig {
        match self {
            Self::Odt => RepairConfig::odt(),
            Self::Docx => RepairConfig::docx(),
        }
    }
}

/// What the repair did to one part
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartSummary {
    /// Entry name inside the package
    pub name: String,
    /// Number of structural edits
    pub edits: usize,
    /// Number of code tokens moved
    pub moved: usize,
    /// Relations for which no safe placement was found
    pub left_in_place: usize,
    /// Code tokens without a partner
    pub unresolved: usize,
}

/// A document package with template parts
#[derive(Debug, Clone)]
pub struct TemplatePackage {
    archive: PackageArchive,
    kind: PackageKind,
}

impl TemplatePackage {
    /// Open a package file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_archive(PackageArchive::open(path)?)
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        Self::from_archive(PackageArchive::from_reader(reader)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_archive(PackageArchive::from_bytes(bytes)?)
    }

    pub fn from_archive(archive: PackageArchive) -> Result<Self> {
        let kind = PackageKind::detect(&archive)?;
        let package = Self { archive, kind };
        if package.template_parts().is_empty() {
            return Err(PackageError::MissingFile(match kind {
                PackageKind::Odt => "content.xml".to_string(),
                PackageKind::Docx => DOCX_MAIN_PART.to_string(),
            }));
        }
        Ok(package)
    }

    pub fn kind(&self) -> PackageKind {
        self.kind
    }

    pub fn archive(&self) -> &PackageArchive {
        &self.archive
    }

    pub fn archive_mut(&mut self) -> &mut PackageArchive {
        &mut self.archive
    }

    /// Template parts in archive order
    pub fn template_parts(&self) -> Vec<&str> {
        self.archive
            .file_list()
            .filter(|path| self.kind.is_template_part(path))
            .collect()
    }

    /// Parse one template part
    pub fn document(&self, part: &str) -> Result<TemplateDocument> {
        let bytes = self
            .archive
            .get(part)
            .ok_or_else(|| PackageError::MissingFile(part.to_string()))?;
        Ok(TemplateDocument::from_bytes(bytes)?)
    }

    /// Union of the variables read by all template parts
    pub fn vars(&self, prefix: Option<&str>) -> Result<VarSet> {
        let per_part = self
            .template_parts()
            .par_iter()
            .map(|part| {
                let vars = self.document(part)?.vars(prefix);
                tracing::debug!(part, count = vars.len(), "variables extracted");
                Ok(vars)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut vars = VarSet::new();
        for part_vars in per_part {
            vars.extend(part_vars);
        }
        Ok(vars)
    }

    /// Repair every template part with the format's preset
    pub fn prepare_default(&mut self) -> Result<Vec<PartSummary>> {
        let config = self.kind.repair_config();
        self.prepare(&config)
    }

    /// Repair every template part and store the results in the archive
    pub fn prepare(&mut self, config: &RepairConfig) -> Result<Vec<PartSummary>> {
        let repaired = self
            .template_parts()
            .par_iter()
            .map(|part| {
                let mut document = self.document(part)?;
                let report = document.repair(config);
                let summary = PartSummary {
                    name: part.to_string(),
                    edits: report.len(),
                    moved: report.moved(),
                    left_in_place: report.left_in_place().count(),
                    unresolved: document.codes().unresolved().len(),
                };
                tracing::debug!(
                    part,
                    edits = summary.edits,
                    left_in_place = summary.left_in_place,
                    "part repaired"
                );
                Ok((document.to_bytes()?, summary))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut summaries = Vec::with_capacity(repaired.len());
        for (bytes, summary) in repaired {
            self.archive.set(summary.name.clone(), bytes);
            summaries.push(summary);
        }
        Ok(summaries)
    }

    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<()> {
        self.archive.write_to(writer)
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.archive.write_to_file(path)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.archive.to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_docx, create_odt};

    #[test]
    fn test_detect_odt() {
        let package = TemplatePackage::from_bytes(&create_odt("<office:text/>", None)).unwrap();
        assert_eq!(package.kind(), PackageKind::Odt);
        assert_eq!(package.template_parts(), vec!["content.xml"]);
    }

    #[test]
    fn test_detect_docx_with_header_and_footer() {
        let bytes = create_docx(
            "<w:body/>",
            &[("word/header1.xml", "<w:hdr/>"), ("word/footer2.xml", "<w:ftr/>")],
        );
        let package = TemplatePackage::from_bytes(&bytes).unwrap();
        assert_eq!(package.kind(), PackageKind::Docx);
        assert_eq!(
            package.template_parts(),
            vec!["word/document.xml", "word/header1.xml", "word/footer2.xml"]
        );
    }

    #[test]
    fn test_template_part_names() {
        assert!(PackageKind::Docx.is_template_part("word/header.xml"));
        assert!(!PackageKind::Docx.is_template_part("word/styles.xml"));
        assert!(!PackageKind::Docx.is_template_part("word/_rels/header1.xml.rels"));
        assert!(PackageKind::Odt.is_template_part("styles.xml"));
        assert!(!PackageKind::Odt.is_template_part("meta.xml"));
    }

    #[test]
    fn test_unsupported_media_type() {
        let mut archive = PackageArchive::default();
        archive.set(MIMETYPE, b"application/epub+zip".to_vec());
        let err = TemplatePackage::from_archive(archive).unwrap_err();
        assert!(matches!(err, PackageError::Unsupported(_)));
    }

    #[test]
    fn test_missing_content() {
        let mut archive = PackageArchive::default();
        archive.set(MIMETYPE, b"application/vnd.oasis.opendocument.text".to_vec());
        let err = TemplatePackage::from_archive(archive).unwrap_err();
        assert!(matches!(err, PackageError::MissingFile(name) if name == "content.xml"));
    }

    #[test]
    fn test_vars_union_across_parts() {
        let bytes = create_odt(
            "<office:text><text:p>{{ Name }}</text:p></office:text>",
            Some("<office:styles><text:p>{{ company }} {{ name }}</text:p></office:styles>"),
        );
        let package = TemplatePackage::from_bytes(&bytes).unwrap();
        let vars = package.vars(None).unwrap().into_vec();
        assert_eq!(vars, vec!["company", "Name"]);
    }

    #[test]
    fn test_prepare_replaces_parts() {
        let content = concat!(
            "<office:text>",
            "<text:p><text:span>{% if x %}</text:span></text:p>",
            "<text:p>shown</text:p>",
            "<text:p><text:span>{% endif %}</text:span></text:p>",
            "</office:text>"
        );
        let mut package = TemplatePackage::from_bytes(&create_odt(content, None)).unwrap();
        let summaries = package.prepare_default().unwrap();

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].name, "content.xml");
        assert_eq!(summaries[0].left_in_place, 0);
        assert_eq!(
            String::from_utf8_lossy(package.archive().get("content.xml").unwrap()),
            "<office:text>{% if x %}<text:p>shown</text:p>{% endif %}</office:text>"
        );
    }
}
