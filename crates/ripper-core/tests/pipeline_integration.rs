//! End-to-end rip of a scripted image: list, extract, classify, report, persist

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use lopdf::{dictionary, Document, Object};
use ripper_core::error::{RipperError, TskResult};
use ripper_core::forensics::{calculate_hash, HashAlgorithm};
use ripper_core::{
    Allocation, ExtractionStatus, FileKind, RipConfig, RipDatabase, RipEngine, RipStage,
    ToolRunner,
};
use tempfile::TempDir;

const FLS_OVERT: &str = "r/r 4-128-1:\tPictures/beach.jpg\n\
r/r 5-128-1:\tDocuments/plan.pdf\n\
r/r 6-128-1:\tnotes.txt\n\
r/r 7-128-1:\tBackup/beach.jpg\n";

const FLS_DELETED: &str = "r/r * 9-128-1:\tPictures/old.jpg\n\
r/r * 0:\tlost.pdf\n\
r/r * 10(realloc):\tgone.pdf\n\
r/r * 11-128-1:\tTemp/junk.bin\n";

/// Answers TSK invocations from canned listings and file contents
struct ScriptedRunner {
    contents: HashMap<String, Vec<u8>>,
    overt_listing: String,
    fail_fls: bool,
}

impl ToolRunner for ScriptedRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> TskResult<Vec<u8>> {
        let tool = program.file_name().unwrap().to_string_lossy().into_owned();
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        if args == ["-V"] {
            return Ok(b"The Sleuth Kit ver 4.12.1\n".to_vec());
        }

        match tool.as_str() {
            "fsstat" if args.iter().any(|a| a == "-t") => Ok(b"ntfs\n".to_vec()),
            "fsstat" => Ok(b"FILE SYSTEM INFORMATION\n\
--------------------------------------------\n\
File System Type: NTFS\n\
Volume Serial Number: 4A2E-1C5B\n"
                .to_vec()),
            "fls" if self.fail_fls => Err(RipperError::tool_failed(
                "fls",
                "exit status: 1",
                b"Cannot determine file system type",
            )),
            "fls" if args.iter().any(|a| a == "-u") => Ok(self.overt_listing.as_bytes().to_vec()),
            "fls" => Ok(FLS_DELETED.as_bytes().to_vec()),
            "icat" => {
                let location = args.last().unwrap();
                self.contents.get(location).cloned().ok_or_else(|| {
                    RipperError::tool_failed("icat", "exit status: 1", b"Error reading inode")
                })
            }
            other => panic!("unexpected tool {}", other),
        }
    }
}

fn jpeg_with_make(make: &[u8; 3]) -> Vec<u8> {
    let mut tiff = b"II\x2a\x00".to_vec();
    tiff.extend_from_slice(&8u32.to_le_bytes());
    tiff.extend_from_slice(&1u16.to_le_bytes());
    tiff.extend_from_slice(&0x010Fu16.to_le_bytes());
    tiff.extend_from_slice(&2u16.to_le_bytes());
    tiff.extend_from_slice(&4u32.to_le_bytes());
    tiff.extend_from_slice(make);
    tiff.push(0);
    tiff.extend_from_slice(&0u32.to_le_bytes());

    let mut app1 = b"Exif\0\0".to_vec();
    app1.extend_from_slice(&tiff);

    let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
    jpeg.extend_from_slice(&((app1.len() + 2) as u16).to_be_bytes());
    jpeg.extend_from_slice(&app1);
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    jpeg
}

fn plain_jpeg() -> Vec<u8> {
    vec![
        0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x07, b'J', b'F', b'I', b'F', 0x00, 0xFF, 0xD9,
    ]
}

/// 2x1 24-bit bitmap with a BITMAPINFOHEADER
fn small_bmp() -> Vec<u8> {
    let mut bmp = b"BM".to_vec();
    bmp.extend_from_slice(&62u32.to_le_bytes());
    bmp.extend_from_slice(&[0; 4]);
    bmp.extend_from_slice(&54u32.to_le_bytes());
    bmp.extend_from_slice(&40u32.to_le_bytes());
    bmp.extend_from_slice(&2i32.to_le_bytes());
    bmp.extend_from_slice(&1i32.to_le_bytes());
    bmp.extend_from_slice(&1u16.to_le_bytes());
    bmp.extend_from_slice(&24u16.to_le_bytes());
    bmp.extend_from_slice(&[0; 24]);
    bmp.extend_from_slice(&[0xFF; 8]);
    bmp
}

fn pdf_with_author(author: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Author" => Object::string_literal(author),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

fn scripted_runner() -> ScriptedRunner {
    let mut contents = HashMap::new();
    contents.insert("4-128-1".to_string(), jpeg_with_make(b"Foo"));
    contents.insert("5-128-1".to_string(), pdf_with_author("Alice"));
    contents.insert("6-128-1".to_string(), b"meeting at noon\n".to_vec());
    contents.insert("7-128-1".to_string(), plain_jpeg());
    contents.insert("9-128-1".to_string(), jpeg_with_make(b"Bar"));
    contents.insert("11-128-1".to_string(), vec![0u8; 64]);

    ScriptedRunner {
        contents,
        overt_listing: FLS_OVERT.to_string(),
        fail_fls: false,
    }
}

fn test_config(temp: &TempDir) -> RipConfig {
    let image = temp.path().join("disk.dd");
    std::fs::write(&image, b"not really a disk").unwrap();

    RipConfig {
        output_dir: temp.path().join("output"),
        ..RipConfig::for_image(image)
    }
}

#[test]
fn test_full_rip_extracts_and_classifies() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);
    let out = config.output_dir.clone();

    let engine = RipEngine::new(config, scripted_runner());
    let rip = engine.run().unwrap();

    assert_eq!(rip.filesystem.fs_type, "ntfs");
    assert_eq!(rip.tsk_version, "The Sleuth Kit ver 4.12.1");
    assert_eq!(rip.overt.len(), 4);
    assert_eq!(rip.deleted.len(), 3);
    assert_eq!(rip.skipped_entries, 1);

    // Listing order is preserved
    let overt_paths: Vec<_> = rip.overt.iter().map(|f| f.original_path.as_str()).collect();
    assert_eq!(
        overt_paths,
        vec![
            "Pictures/beach.jpg",
            "Documents/plan.pdf",
            "notes.txt",
            "Backup/beach.jpg"
        ]
    );

    let beach = &rip.overt[0];
    assert_eq!(beach.file_type, FileKind::Image);
    assert_eq!(beach.signature.as_deref(), Some("JPEG Image"));
    assert_eq!(beach.metadata.get("Image Make").map(String::as_str), Some("Foo"));
    assert_eq!(
        beach.md5,
        calculate_hash(&jpeg_with_make(b"Foo"), HashAlgorithm::MD5)
    );
    assert_eq!(beach.final_destination, Some(out.join("overt/beach.jpg")));

    let plan = &rip.overt[1];
    assert_eq!(plan.file_type, FileKind::Pdf);
    assert_eq!(plan.metadata.get("/Author").map(String::as_str), Some("Alice"));

    let notes = &rip.overt[2];
    assert_eq!(notes.file_type, FileKind::Other);
    assert_eq!(notes.final_destination, None);
    assert_eq!(notes.size, 16);
    assert!(!out.join("overt/notes.txt").exists());

    // Same base name in another directory does not overwrite
    let backup = &rip.overt[3];
    assert_eq!(
        backup.final_destination,
        Some(out.join("overt/beach_7-128-1.jpg"))
    );
    assert!(backup.metadata.is_empty());
    assert_eq!(
        std::fs::read(out.join("overt/beach.jpg")).unwrap(),
        jpeg_with_make(b"Foo")
    );

    let old = &rip.deleted[0];
    assert_eq!(old.allocation, Allocation::Deleted);
    assert_eq!(old.metadata.get("Image Make").map(String::as_str), Some("Bar"));
    assert!(out.join("deleted/old.jpg").exists());

    let gone = &rip.deleted[1];
    assert_eq!(gone.location, "10");
    assert!(matches!(gone.status, ExtractionStatus::Failed(_)));
    assert!(!out.join("deleted/gone.pdf").exists());

    assert!(!out.join("deleted/junk.bin").exists());

    let useful: u64 = rip.overt[0].size + rip.overt[1].size + rip.overt[3].size + old.size;
    assert_eq!(rip.total_useful_size(), useful);
    assert_eq!(rip.total_recovered_size(), useful + 16 + 64);
}

#[test]
fn test_rip_writes_report_and_database() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);
    let report_path = config.report_path();
    let db_path = config.db_path();

    let rip = RipEngine::new(config, scripted_runner()).run().unwrap();

    let report = std::fs::read_to_string(&report_path).unwrap();
    assert!(report.contains("Filesystem type: ntfs"));
    assert!(report.contains("Volume Serial Number: 4A2E-1C5B"));
    assert!(report.contains("Overt files: 4 (images: 2, pdfs: 1, other: 1)"));
    assert!(report.contains("Deleted files: 3 (images: 1, pdfs: 0, other: 2)"));
    assert!(report.contains("original_path: Pictures/old.jpg"));

    let db = RipDatabase::open(&db_path).unwrap();
    let images = db.list_images().unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].rip_id, rip.id);
    assert_eq!(images[0].total_useful_size, rip.total_useful_size());
    assert_eq!(images[0].overt_files, 4);
    assert_eq!(images[0].deleted_files, 3);

    let files = db.load_files(images[0].id).unwrap();
    assert_eq!(files.len(), 7);
    assert_eq!(files[0].md5, rip.overt[0].md5);
    assert_eq!(files[4].original_path, "Pictures/old.jpg");
}

#[test]
fn test_keep_other_and_sequential_mode() {
    let temp = TempDir::new().unwrap();
    let config = RipConfig {
        keep_other: true,
        parallel_processing: false,
        ..test_config(&temp)
    };
    let out = config.output_dir.clone();

    let rip = RipEngine::new(config, scripted_runner()).run().unwrap();

    assert_eq!(rip.overt[2].final_destination, Some(out.join("overt/notes.txt")));
    assert_eq!(
        std::fs::read(out.join("overt/notes.txt")).unwrap(),
        b"meeting at noon\n"
    );
    assert!(out.join("deleted/junk.bin").exists());
}

#[test]
fn test_progress_reaches_every_stage() {
    let temp = TempDir::new().unwrap();
    let mut engine = RipEngine::new(test_config(&temp), scripted_runner());

    let seen: Arc<Mutex<Vec<(RipStage, usize, usize)>>> = Arc::default();
    let sink = Arc::clone(&seen);
    engine.set_progress_callback(move |p| {
        sink.lock().unwrap().push((p.stage, p.completed, p.total));
    });
    engine.run().unwrap();

    let seen = seen.lock().unwrap();
    let stages: Vec<RipStage> = seen.iter().map(|(s, _, _)| *s).collect();
    assert_eq!(stages.first(), Some(&RipStage::Initialization));
    assert_eq!(stages.last(), Some(&RipStage::Complete));
    for stage in [
        RipStage::FileSystemAnalysis,
        RipStage::Listing,
        RipStage::ExtractingOvert,
        RipStage::ExtractingDeleted,
        RipStage::Reporting,
        RipStage::Persisting,
    ] {
        assert!(stages.contains(&stage), "missing {:?}", stage);
    }

    // Four readable overt entries, all reported done
    let overt_done = seen
        .iter()
        .filter(|(s, _, _)| *s == RipStage::ExtractingOvert)
        .map(|(_, done, _)| *done)
        .max();
    assert_eq!(overt_done, Some(4));
}

#[test]
fn test_listing_failure_aborts_the_rip() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);
    let db_path = config.db_path();

    let runner = ScriptedRunner {
        fail_fls: true,
        ..scripted_runner()
    };
    let err = RipEngine::new(config, runner).run().unwrap_err();

    assert!(format!("{:#}", err).contains("Cannot determine file system type"));
    assert!(!db_path.exists());
}

#[test]
fn test_missing_image_is_rejected() {
    let temp = TempDir::new().unwrap();
    let config = RipConfig {
        output_dir: temp.path().join("output"),
        ..RipConfig::for_image(PathBuf::from("/nonexistent/disk.dd"))
    };

    let err = RipEngine::new(config, scripted_runner()).run().unwrap_err();
    assert!(err.to_string().contains("Image not found"));
}

#[test]
fn test_lookalike_text_and_failed_entries_are_not_useful() {
    const BMW: &[u8] = b"BMW service invoice\nTotal: 450 EUR\n";
    const NOTES: &[u8] = b"Notes: files start with %PDF-1.4 header\n";

    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);
    let out = config.output_dir.clone();
    let report_path = config.report_path();

    let mut runner = scripted_runner();
    runner.overt_listing = "r/r 4-128-1:\tPictures/beach.jpg\n\
r/r 20-128-1:\tcar.bmp\n\
r/r 21-128-1:\tnotes.pdf\n\
r/r 22-128-1:\tmissing.jpg\n\
r/r 23-128-1:\tpaint.bmp\n"
        .to_string();
    runner.contents.insert("20-128-1".to_string(), BMW.to_vec());
    runner.contents.insert("21-128-1".to_string(), NOTES.to_vec());
    runner.contents.insert("23-128-1".to_string(), small_bmp());

    let rip = RipEngine::new(config, runner).run().unwrap();

    let kinds: Vec<FileKind> = rip.overt.iter().map(|f| f.file_type).collect();
    assert_eq!(
        kinds,
        vec![
            FileKind::Image,
            FileKind::Other,
            FileKind::Other,
            FileKind::Other,
            FileKind::Image
        ]
    );
    assert!(!out.join("overt/car.bmp").exists());
    assert!(!out.join("overt/notes.pdf").exists());
    assert!(out.join("overt/paint.bmp").exists());

    // A failed entry with an image name is other, with nothing on disk
    let missing = &rip.overt[3];
    assert!(matches!(missing.status, ExtractionStatus::Failed(_)));
    assert_eq!(missing.size, 0);
    assert_eq!(missing.final_destination, None);
    assert!(!out.join("overt/missing.jpg").exists());

    let overt_useful = rip.overt[0].size + small_bmp().len() as u64;
    let deleted_useful = rip.deleted[0].size;
    assert_eq!(rip.total_useful_size(), overt_useful + deleted_useful);
    assert_eq!(
        rip.total_recovered_size(),
        overt_useful + deleted_useful + (BMW.len() + NOTES.len()) as u64 + 64
    );

    let report = std::fs::read_to_string(&report_path).unwrap();
    assert!(report.contains("Overt files: 5 (images: 2, pdfs: 0, other: 3)"));
}
