mod commands;
mod terminal;

use commands::{CommandLine, discover};
use terminal::{logging, print, spinner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();
    let cfg = commands.config();

    logging::init_logging(cfg.quiet);
    print::banner(cfg.quiet);

    let result = match commands.target() {
        Ok(target) => discover::discover(target, commands.sweep_config(), &cfg).await,
        Err(e) => Err(e.into()),
    };

    spinner::get_spinner().finish_and_clear();
    if result.is_ok() && cfg.quiet == 0 {
        print::end_of_program();
    }
    result
}
