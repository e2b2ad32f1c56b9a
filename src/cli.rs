use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "loadra")]
#[command(author, version, about = "Telegram bot for downloading video and audio via yt-dlp", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot (long polling)
    Run,

    /// Probe a URL and print its metadata without downloading
    Info {
        /// The media URL to probe
        url: String,
    },

    /// Download a URL to the output directory without Telegram
    Download {
        /// The media URL to fetch
        url: String,

        /// Fetch audio instead of video
        #[arg(long)]
        audio: bool,

        /// Quality tier: best, 1080, 720, 480, 360 for video;
        /// best, 320, 192, 128 for audio
        #[arg(short, long, default_value = "best")]
        quality: String,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
