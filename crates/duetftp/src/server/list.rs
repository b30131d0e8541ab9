//! # List
//!
//! Directory-listing producer for the LIST command. The listing text comes
//! from the host `ls -l`, matching what interactive users expect from an FTP
//! listing; the wire contract is simply a text blob.

use std::path::Path;

use tokio::process::Command;

/// Run `ls -l` on `path` and return its stdout.
pub(crate) async fn list_directory(path: &Path) -> std::io::Result<String> {
    let output = Command::new("ls").arg("-l").arg(path).output().await?;
    if !output.status.success() {
        return Err(std::io::Error::other(format!(
            "ls -l {} exited with {}",
            path.display(),
            output.status
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod test {

    use super::*;

    #[tokio::test]
    async fn should_list_directory_contents() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "hi").unwrap();

        let listing = list_directory(dir.path()).await.unwrap();
        assert!(listing.contains("hello.txt"));
    }

    #[tokio::test]
    async fn should_fail_on_missing_directory() {
        assert!(list_directory(Path::new("/nonexistent-dir-for-ls")).await.is_err());
    }
}
