//! Thumbnail generation via ImageMagick.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use super::{Result, Transform};

/// Resize-and-crop to a square thumbnail with `convert`.
///
/// Uses the fill-then-crop idiom: `-resize <D>x<D>^` scales the smaller
/// dimension up to `D`, `-extent <D>x<D>` crops the overflow.
#[derive(Debug, Clone)]
pub struct MagickTransformer {
    command: PathBuf,
    dimension: u32,
}

impl MagickTransformer {
    pub fn new(command: impl Into<PathBuf>, dimension: u32) -> Self {
        MagickTransformer {
            command: command.into(),
            dimension,
        }
    }
}

#[async_trait]
impl Transform for MagickTransformer {
    async fn transform(&self, input: &Path, output: &Path) -> Result<()> {
        let resize = format!("{}x{}^", self.dimension, self.dimension);
        let extent = format!("{}x{}", self.dimension, self.dimension);

        let mut cmd = Command::new(&self.command);
        cmd.arg("-resize")
            .arg(&resize)
            .arg("-extent")
            .arg(&extent)
            .arg(input)
            .arg(output)
            .kill_on_drop(true);

        super::run_tool("transform", &mut cmd).await?;
        Ok(())
    }
}
