// vidstitch-core/tests/discovery_tests.rs

use std::fs::{self, File};
use std::path::PathBuf;

use tempfile::tempdir;
use vidstitch_core::discovery::find_video_files;
use vidstitch_core::error::CoreError;

#[test]
fn test_find_video_files() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let input_dir = dir.path();

    // Create some files
    File::create(input_dir.join("b_clip.mp4"))?;
    File::create(input_dir.join("a_clip.MOV"))?; // Test case insensitivity
    File::create(input_dir.join("c_clip.webm"))?;
    File::create(input_dir.join("slides.pptx"))?;
    File::create(input_dir.join("notes.txt"))?;
    fs::create_dir(input_dir.join("subdir"))?;
    File::create(input_dir.join("subdir").join("nested.mp4"))?; // Should not be found

    let files = find_video_files(input_dir)?;

    assert_eq!(files.len(), 3);
    // Lexicographic order, independent of creation order
    assert_eq!(files[0].file_name().unwrap(), "a_clip.MOV");
    assert_eq!(files[1].file_name().unwrap(), "b_clip.mp4");
    assert_eq!(files[2].file_name().unwrap(), "c_clip.webm");

    dir.close()?;
    Ok(())
}

#[test]
fn test_find_video_files_empty() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let input_dir = dir.path();

    File::create(input_dir.join("document.txt"))?;
    fs::create_dir(input_dir.join("subdir"))?;

    let result = find_video_files(input_dir);
    assert!(result.is_err());
    match result.err().unwrap() {
        CoreError::NoFilesFound => {} // Expected error
        e => panic!("Unexpected error type: {e:?}"),
    }

    dir.close()?;
    Ok(())
}

#[test]
fn test_find_video_files_nonexistent_dir() {
    let non_existent = PathBuf::from("surely_this_does_not_exist_42_integration");
    let result = find_video_files(&non_existent);
    assert!(result.is_err());
    match result.err().unwrap() {
        CoreError::Io(_) => {} // Expected error type
        e => panic!("Unexpected error type: {e:?}"),
    }
}
