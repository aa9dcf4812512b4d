use std::path::PathBuf;

use clap::Parser;

/// Records a live HLS audio feed on a daily schedule and encodes the
/// captured segments into one output file per window.
#[derive(Debug, Parser)]
#[command(name = "aircheck", version, about)]
pub struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "aircheck.toml")]
    pub config: PathBuf,

    /// Override the playlist URL from the configuration file.
    #[arg(long)]
    pub playlist_url: Option<String>,

    /// Override the base directory segments and output files are written to.
    #[arg(long)]
    pub base_dir: Option<PathBuf>,

    /// Record a single window and exit, even when the configuration
    /// enables continuous mode.
    #[arg(long)]
    pub once: bool,

    /// Proxy URL (http://, https:// or socks5://).
    #[arg(long)]
    pub proxy: Option<String>,

    /// Username for proxy authentication.
    #[arg(long, requires = "proxy")]
    pub proxy_username: Option<String>,

    /// Password for proxy authentication.
    #[arg(long, requires = "proxy_username")]
    pub proxy_password: Option<String>,

    /// Enable debug logging.
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors.
    #[arg(short, long)]
    pub quiet: bool,
}
