//! pcc_client - send a file, print its printable character count

use anyhow::Result;
use pcc::cli::{parse_or_exit, ClientOpts};
use pcc::protocol::exit_code;

fn run(opts: &ClientOpts) -> Result<u32> {
    pcc::client::count_file(opts.server_addr(), &opts.file_path)
}

fn main() {
    let opts: ClientOpts = parse_or_exit();

    match run(&opts) {
        Ok(count) => {
            println!("# of printable characters: {}", count);
            std::process::exit(exit_code::SUCCESS);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(exit_code::FAILURE);
        }
    }
}
