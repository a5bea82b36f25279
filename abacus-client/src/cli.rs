use std::{ffi::OsString, path::PathBuf};

use abacus::{SessionError, SessionParams};
use clap::{CommandFactory, Parser, error::ErrorKind as ClapErrorKind};

#[derive(Parser, Debug)]
#[command(about, long_about = None, arg_required_else_help = true)]
/// Log in to a vector computation server and stream a batch of vectors to it.
pub(crate) struct Args {
    /// File with the vector batch
    #[arg(short, long)]
    pub input: String,

    /// File the results are written to, one per line
    #[arg(short, long)]
    pub result: String,

    /// File with login and password, separated by whitespace
    #[arg(short, long)]
    pub data: String,

    /// Server port
    #[arg(short = 't', long, allow_negative_numbers = true)]
    pub port: i32,

    /// Server address
    #[arg(short, long)]
    pub address: String,
}

impl From<Args> for SessionParams {
    fn from(args: Args) -> Self {
        Self {
            input: PathBuf::from(args.input),
            result: PathBuf::from(args.result),
            data: PathBuf::from(args.data),
            port: args.port,
            address: args.address,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ParseOutcome {
    Run(SessionParams),
    /// Help was asked for (or nothing was passed at all). Carries the text to print.
    Help(String),
}

pub fn help_text() -> String {
    Args::command().render_help().to_string()
}

/// `args` includes the program name, like `std::env::args_os()`.
pub fn parse_args<I, T>(args: I) -> Result<ParseOutcome, SessionError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Args::try_parse_from(args) {
        Ok(args) => Ok(ParseOutcome::Run(args.into())),
        Err(e) => match e.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                Ok(ParseOutcome::Help(help_text()))
            }
            _ => Err(SessionError::Config(e.to_string().trim_end().to_string())),
        },
    }
}
