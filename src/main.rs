mod cli;
mod logging;
mod machine;
mod stub;

use clap::Parser;

fn main() {
    let cli = cli::Cli::parse();
    if let Err(e) = stub::run_stub(cli) {
        eprintln!("simstub: {:#}", e);
        std::process::exit(1);
    }
}
