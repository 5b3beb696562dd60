use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tubefetch")]
#[command(author, version, about = "Drive server-side YouTube downloads from the terminal", long_about = None)]
pub struct Args {
    /// Job server base URL
    #[arg(
        short,
        long,
        global = true,
        env = "TUBEFETCH_SERVER",
        default_value = "http://127.0.0.1:5000"
    )]
    pub server: String,

    /// Milliseconds between status checks
    #[arg(long, global = true, env = "TUBEFETCH_POLL_INTERVAL_MS", default_value = "2000")]
    pub poll_interval_ms: u64,

    /// Timeout for each API request, in seconds
    #[arg(short, long, global = true, env = "TUBEFETCH_TIMEOUT", default_value = "30")]
    pub timeout: u64,

    /// Give up after this many failed status checks in a row (default: keep trying)
    #[arg(long, global = true, env = "TUBEFETCH_MAX_POLL_FAILURES")]
    pub max_poll_failures: Option<u32>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show title, author and available variants of a video
    Info {
        /// YouTube link
        url: String,
    },

    /// Start a server-side download and follow it to the end
    Download {
        /// YouTube link
        url: String,

        /// Variant to request (defaults to the first one offered)
        #[arg(short, long)]
        quality: Option<String>,

        /// Output directory for the finished file
        #[arg(short, long, default_value = "./downloads")]
        output: String,

        /// Only run the server job, leave the file on the server
        #[arg(long)]
        no_fetch: bool,

        /// Number of attempts when pulling the finished file
        #[arg(short, long, default_value = "3")]
        retries: u32,

        /// Start the file transfer over instead of resuming a partial one
        #[arg(long)]
        no_resume: bool,
    },

    /// Check a job by id
    Status {
        /// Job id printed by `download`
        job_id: String,

        /// Keep polling until the job completes or fails
        #[arg(short, long)]
        watch: bool,
    },

    /// Ask the server to delete files older than a day
    Cleanup,
}
