//! Runtime configuration.
//!
//! Every knob is a command-line flag with an environment-variable fallback,
//! so the daemon runs unattended under an init system with nothing but env
//! configuration.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Command-line arguments for the exercise-screens daemon.
#[derive(Debug, Clone, Parser)]
#[command(name = "exercise-screens", version, about = "Exercise screenshot service")]
pub struct Config {
    /// Upstream repository URL; hook payloads for any other repository are
    /// rejected.
    #[arg(
        long,
        env = "EXERCISE_SCREENS_REPO_URL",
        default_value = "https://github.com/Khan/khan-exercises"
    )]
    pub repo_url: String,

    /// Clone URL for the mirror; defaults to `<repo-url>.git`.
    #[arg(long, env = "EXERCISE_SCREENS_REPO_GIT_URL")]
    pub repo_git_url: Option<String>,

    /// Upstream default branch the mirror tracks.
    #[arg(long, env = "EXERCISE_SCREENS_DEFAULT_BRANCH", default_value = "master")]
    pub default_branch: String,

    /// Listen address.
    #[arg(long, env = "EXERCISE_SCREENS_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Listen port; also used to build the render tool's loopback URLs.
    #[arg(long, env = "EXERCISE_SCREENS_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Work directory holding the mirror checkout, the output images, and
    /// the checkpoint.
    #[arg(long, env = "EXERCISE_SCREENS_WORK_DIR", default_value = "./work")]
    pub work_dir: PathBuf,

    /// Client addresses allowed to deliver hooks (comma-separated). An
    /// empty list disables the check; configure a webhook secret instead.
    #[arg(
        long = "hook-allow",
        env = "EXERCISE_SCREENS_HOOK_ALLOW",
        value_delimiter = ',',
        default_values_t = default_hook_allowlist()
    )]
    pub hook_allowlist: Vec<IpAddr>,

    /// Shared secret for hook payload signatures; unset disables
    /// verification.
    #[arg(long, env = "EXERCISE_SCREENS_WEBHOOK_SECRET")]
    pub webhook_secret: Option<String>,

    /// Headless render command.
    #[arg(long, env = "EXERCISE_SCREENS_RENDER_COMMAND", default_value = "phantomjs")]
    pub render_command: PathBuf,

    /// Rasterize script handed to the render command.
    #[arg(
        long,
        env = "EXERCISE_SCREENS_RASTERIZE_SCRIPT",
        default_value = "rasterize.js"
    )]
    pub rasterize_script: PathBuf,

    /// Per-render timeout in milliseconds.
    #[arg(long, env = "EXERCISE_SCREENS_RENDER_TIMEOUT_MS", default_value_t = 20_000)]
    pub render_timeout_ms: u64,

    /// Image transform command.
    #[arg(long, env = "EXERCISE_SCREENS_CONVERT_COMMAND", default_value = "convert")]
    pub convert_command: PathBuf,

    /// Edge length of the square thumbnail.
    #[arg(long, env = "EXERCISE_SCREENS_THUMBNAIL_DIMENSION", default_value_t = 256)]
    pub thumbnail_dimension: u32,

    /// Object-storage CLI command.
    #[arg(long, env = "EXERCISE_SCREENS_AWS_COMMAND", default_value = "aws")]
    pub aws_command: PathBuf,

    /// Bucket receiving published screenshots.
    #[arg(
        long,
        env = "EXERCISE_SCREENS_S3_BUCKET",
        default_value = "ka-exercise-screenshots"
    )]
    pub s3_bucket: String,

    /// Maximum artifacts processed concurrently within one plan.
    #[arg(long, env = "EXERCISE_SCREENS_PIPELINE_CONCURRENCY", default_value_t = 4)]
    pub pipeline_concurrency: usize,
}

/// Hook-source addresses published by GitHub for webhook deliveries.
fn default_hook_allowlist() -> Vec<IpAddr> {
    vec![
        "207.97.227.253".parse().expect("static address"),
        "50.57.128.197".parse().expect("static address"),
        "108.171.174.178".parse().expect("static address"),
    ]
}

impl Config {
    /// Clone URL for the mirror.
    pub fn git_url(&self) -> String {
        self.repo_git_url
            .clone()
            .unwrap_or_else(|| format!("{}.git", self.repo_url))
    }

    /// Directory of the mirror checkout.
    pub fn mirror_dir(&self) -> PathBuf {
        self.work_dir.join("repo")
    }

    /// Directory for rendered and resized images.
    pub fn output_dir(&self) -> PathBuf {
        self.work_dir.join("output")
    }

    /// Address the HTTP server binds.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Base URL of the exercise-file route, as seen by the render tool
    /// running on this host.
    pub fn exercise_file_base_url(&self) -> String {
        format!("http://127.0.0.1:{}/exercise-screens/exercise-file", self.port)
    }

    /// Per-render timeout.
    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    /// Webhook secret as bytes, when configured.
    pub fn webhook_secret_bytes(&self) -> Option<Vec<u8>> {
        self.webhook_secret.as_ref().map(|s| s.clone().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("exercise-screens").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn defaults_match_service_conventions() {
        let config = parse(&[]);
        assert_eq!(config.port, 5000);
        assert_eq!(config.render_timeout(), Duration::from_secs(20));
        assert_eq!(config.thumbnail_dimension, 256);
        assert_eq!(config.git_url(), "https://github.com/Khan/khan-exercises.git");
        assert_eq!(config.hook_allowlist.len(), 3);
    }

    #[test]
    fn derived_paths_hang_off_work_dir() {
        let config = parse(&["--work-dir", "/var/lib/es"]);
        assert_eq!(config.mirror_dir(), PathBuf::from("/var/lib/es/repo"));
        assert_eq!(config.output_dir(), PathBuf::from("/var/lib/es/output"));
    }

    #[test]
    fn explicit_git_url_wins() {
        let config = parse(&["--repo-git-url", "git@example.com:me/repo.git"]);
        assert_eq!(config.git_url(), "git@example.com:me/repo.git");
    }

    #[test]
    fn allowlist_parses_comma_separated() {
        let config = parse(&["--hook-allow", "10.0.0.1,10.0.0.2"]);
        assert_eq!(
            config.hook_allowlist,
            vec!["10.0.0.1".parse::<IpAddr>().unwrap(), "10.0.0.2".parse().unwrap()]
        );
    }

    #[test]
    fn base_url_uses_loopback_and_port() {
        let config = parse(&["--port", "8080"]);
        assert_eq!(
            config.exercise_file_base_url(),
            "http://127.0.0.1:8080/exercise-screens/exercise-file"
        );
    }
}
