use anyhow::{Context, Result};
use pcc::cli::{parse_or_exit, ServerOpts};
use pcc::protocol::exit_code;
use pcc::server::Server;

fn run(opts: &ServerOpts) -> Result<()> {
    let logger = pcc::logger::from_path(opts.log_file.as_ref())?;
    let server = Server::bind(opts.to_config())?.with_logger(logger);

    server
        .shutdown_signal()
        .install()
        .context("Error setting Ctrl-C handler")?;

    let totals = server.serve()?;

    let stdout = std::io::stdout();
    totals
        .write_report(stdout.lock())
        .context("write final report")?;
    Ok(())
}

fn main() {
    let opts: ServerOpts = parse_or_exit();

    if let Err(e) = run(&opts) {
        eprintln!("Error: {:#}", e);
        std::process::exit(exit_code::FAILURE);
    }
    std::process::exit(exit_code::SUCCESS);
}
