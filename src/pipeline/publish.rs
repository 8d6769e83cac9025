//! Object-storage upload via the `aws` CLI.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{Publish, Result};

/// Publishes images to an S3 bucket with public-read visibility.
///
/// Uploads go through `aws s3 cp --acl public-read`; the bucket and key
/// together form the public object address. Re-uploading an existing key
/// overwrites it in place, which keeps publishing idempotent.
#[derive(Debug, Clone)]
pub struct S3Publisher {
    command: PathBuf,
    bucket: String,
}

impl S3Publisher {
    pub fn new(command: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        S3Publisher {
            command: command.into(),
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl Publish for S3Publisher {
    async fn publish(&self, file: &Path, key: &str) -> Result<()> {
        let target = format!("s3://{}/{}", self.bucket, key);

        let mut cmd = Command::new(&self.command);
        cmd.arg("s3")
            .arg("cp")
            .arg(file)
            .arg(&target)
            .arg("--acl")
            .arg("public-read")
            .arg("--content-type")
            .arg("image/png")
            .kill_on_drop(true);

        debug!(key = %key, target = %target, "Uploading");
        super::run_tool("publish", &mut cmd).await?;
        Ok(())
    }
}
