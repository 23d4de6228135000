use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "cbload")]
#[command(version)]
#[command(about = "A comic book archive loader with streaming HTTP support", long_about = None)]
#[command(after_help = "Examples:\n  \
  cbload issue-01.cbz -l          list the pages of a local book\n  \
  cbload issue-01.cbz -d pages    write every page into ./pages\n  \
  cbload -l https://example.com/issue-01.cbz   list pages of a remote book")]
pub struct Cli {
    /// Comic book archive path or HTTP URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// List pages (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely with sizes and kinds
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Write pages into outdir
    #[arg(short = 'd', value_name = "DIR")]
    pub out_dir: Option<String>,

    /// Quiet mode (no progress output)
    #[arg(short = 'q')]
    pub quiet: bool,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }

    /// Book name derived from the final path segment, extension stripped
    pub fn book_name(&self) -> String {
        let tail = self
            .file
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.file);
        match tail.rsplit_once('.') {
            Some((stem, _ext)) if !stem.is_empty() => stem.to_string(),
            _ => tail.to_string(),
        }
    }
}
