//! Shared fixtures: small word-processing documents and reference tables.

#![allow(dead_code)]

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const TABLE: &str = r#"PN-B-03264,PN-B-03264:2002,"{'PN-B-03264:1984', 'PN-B-03264:1999'}"
PN-EN 1990,PN-EN 1990:2004,"['PN-EN 1990:2002']"
PN-EN 206-1,PN-EN 206-1:2003,set()
"#;

/// Paragraphs of a document body mentioning every status.
pub const BODY_TEXT: &[&str] = &[
    "Obliczenia wg PN-B-03264:1999 oraz PN-EN 1990:2004.",
    "Beton zgodnie z PN-EN 206-1:2003 i PN-B-03264:1984.",
    "Stal wg PN-EN 1992-1-1:2008 oraz PN-76/B-03001.",
];

pub fn document_xml(paragraphs: &[&str]) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document><w:body>"#);
    for paragraph in paragraphs {
        xml.push_str("<w:p><w:r><w:t>");
        xml.push_str(paragraph);
        xml.push_str("</w:t></w:r></w:p>");
    }
    xml.push_str("</w:body></w:document>");
    xml
}

pub fn write_docx(path: &Path, paragraphs: &[&str]) {
    let file = File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("[Content_Types].xml", deflated).unwrap();
    zip.write_all(b"<Types/>").unwrap();
    zip.start_file("word/document.xml", deflated).unwrap();
    zip.write_all(document_xml(paragraphs).as_bytes()).unwrap();
    zip.start_file("word/styles.xml", deflated).unwrap();
    zip.write_all(b"<w:styles/>").unwrap();
    zip.start_file(
        "word/media/image1.png",
        SimpleFileOptions::default().compression_method(CompressionMethod::Stored),
    )
    .unwrap();
    zip.write_all(&[0x89, b'P', b'N', b'G', 0, 1, 2, 3]).unwrap();
    zip.finish().unwrap();
}

pub fn write_table(dir: &Path) -> PathBuf {
    let path = dir.join("baza.csv");
    fs::write(&path, TABLE).unwrap();
    path
}

pub fn read_member(path: &Path, name: &str) -> Vec<u8> {
    let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut member = archive.by_name(name).unwrap();
    let mut content = Vec::new();
    member.read_to_end(&mut content).unwrap();
    content
}

pub fn member_names(path: &Path) -> Vec<String> {
    let archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
    archive.file_names().map(str::to_string).collect()
}
