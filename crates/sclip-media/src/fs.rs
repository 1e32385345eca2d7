//! Filesystem helpers for final artifact placement.

use std::path::Path;
use tokio::fs;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Move a file into place, surviving cross-device destinations.
///
/// Tries a rename first; on EXDEV falls back to copying into a temp file
/// next to the destination and renaming it there, so the final placement is
/// atomic on the destination filesystem.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            debug!(
                "cross-device move, copying: {} -> {}",
                src.display(),
                dst.display()
            );
            let staging = dst.with_extension("part");
            fs::copy(src, &staging).await?;
            if let Err(e) = fs::rename(&staging, dst).await {
                let _ = fs::remove_file(&staging).await;
                return Err(MediaError::Io(e));
            }
            // Source removal is best effort; the artifact is already placed
            let _ = fs::remove_file(src).await;
            Ok(())
        }
        Err(e) => Err(MediaError::Io(e)),
    }
}

/// EXDEV: rename across filesystems.
fn is_cross_device(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

/// Whether a directory accepts new files right now.
pub async fn dir_is_writable(dir: impl AsRef<Path>) -> bool {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return false;
    }
    let probe = dir.join(format!(".sclip-writable-{}", std::process::id()));
    match fs::write(&probe, b"").await {
        Ok(()) => {
            let _ = fs::remove_file(&probe).await;
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_file_within_filesystem() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.mp4");
        let dst = dir.path().join("out").join("dst.mp4");
        fs::write(&src, b"payload").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_move_file_overwrites() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.mp4");
        let dst = dir.path().join("dst.mp4");
        fs::write(&src, b"new").await.unwrap();
        fs::write(&dst, b"old").await.unwrap();

        move_file(&src, &dst).await.unwrap();
        assert_eq!(fs::read(&dst).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_dir_is_writable() {
        let dir = TempDir::new().unwrap();
        assert!(dir_is_writable(dir.path()).await);
        assert!(!dir_is_writable(dir.path().join("missing")).await);
    }

    #[test]
    fn test_is_cross_device() {
        assert!(is_cross_device(&std::io::Error::from_raw_os_error(18)));
        assert!(!is_cross_device(&std::io::Error::from_raw_os_error(2)));
    }
}
