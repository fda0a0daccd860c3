use tokio::io::AsyncReadExt;

use super::*;

#[test]
fn file_scheme_strips_prefix() {
    assert_eq!(uri_to_path("file:///tmp/a.jpg").unwrap(), PathBuf::from("/tmp/a.jpg"));
}

#[test]
fn bare_path_passes_through() {
    assert_eq!(uri_to_path("photos/a.jpg").unwrap(), PathBuf::from("photos/a.jpg"));
}

#[test]
fn other_schemes_are_rejected() {
    assert!(matches!(uri_to_path("content://media/1"), Err(MediaError::UnsupportedUri(_))));
    assert!(matches!(uri_to_path(""), Err(MediaError::UnsupportedUri(_))));
    assert!(matches!(uri_to_path("file://"), Err(MediaError::UnsupportedUri(_))));
}

#[test]
fn content_type_by_extension() {
    assert_eq!(content_type("file:///a/B.JPG"), "image/jpeg");
    assert_eq!(content_type("x.png"), "image/png");
    assert_eq!(content_type("clip.mp4"), "video/mp4");
    assert_eq!(content_type("clip.MOV"), "video/quicktime");
    assert_eq!(content_type("noext"), "application/octet-stream");
}

#[tokio::test]
async fn fs_source_reads_bytes_and_streams() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("note.bin");
    std::fs::write(&path, b"travel").unwrap();
    let uri = format!("file://{}", path.display());

    let source = FsMediaSource;
    assert_eq!(source.read_bytes(&uri).await.unwrap(), b"travel");

    let mut reader = source.open_stream(&uri).await.unwrap();
    let mut streamed = Vec::new();
    reader.read_to_end(&mut streamed).await.unwrap();
    assert_eq!(streamed, b"travel");

    assert!(source.thumbnail(&uri).await.is_none());
}

#[tokio::test]
async fn fs_source_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let uri = dir.path().join("missing.jpg").display().to_string();
    let err = FsMediaSource.read_bytes(&uri).await.unwrap_err();
    assert!(matches!(err, MediaError::Io { .. }));
}
