use anyhow::Context;
use argh::FromArgs;
use smallsh::lexer::DEFAULT_MAX_WORDS;
use smallsh::{Interpreter, ShellOptions};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// A small interactive shell. Reads commands from the terminal, or from a
/// script file when one is given.
struct Args {
    #[argh(positional)]
    /// file to read commands from instead of standard input.
    script: Option<PathBuf>,

    #[argh(option, default = "DEFAULT_MAX_WORDS")]
    /// maximum number of words accepted on one line.
    max_words: usize,

    #[argh(switch)]
    /// create `>` targets when the command starts instead of while parsing.
    defer_truncation: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SMALLSH_LOG").unwrap_or_else(|_| EnvFilter::new("off"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args: Args = argh::from_env();

    let options = ShellOptions {
        interactive: args.script.is_none(),
        max_words: args.max_words,
        eager_truncation: !args.defer_truncation,
    };
    tracing::debug!(?options, "starting");
    let mut sh = Interpreter::with_options(options);

    let code = match &args.script {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("{}", path.display()))?;
            sh.run_script(BufReader::new(file))?
        }
        None => sh.repl()?,
    };
    std::process::exit(code)
}
