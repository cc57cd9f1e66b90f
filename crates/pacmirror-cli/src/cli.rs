use clap::{ArgAction, Parser, ValueHint};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    help_template = "{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}"
)]
pub struct Args {
    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress outputs
    #[arg(short, long)]
    pub quiet: bool,

    /// Output as json
    #[arg(short, long)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long)]
    pub no_color: bool,

    /// Provide custom config file
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub config: Option<String>,

    /// Set proxy
    #[arg(required = false, long, short = 'P')]
    pub proxy: Option<String>,

    /// Set user agent
    #[arg(required = false, long, short = 'A')]
    pub user_agent: Option<String>,

    /// Don't fetch anything; verify the files already present
    #[arg(short, long)]
    pub local: bool,

    /// Only mirror the named repositories
    #[arg(short, long = "repo", value_name = "NAME")]
    pub repos: Vec<String>,

    /// Directory for repository files
    #[arg(default_value = ".", value_hint = ValueHint::DirPath)]
    pub destdir: String,
}
