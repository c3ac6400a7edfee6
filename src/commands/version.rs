// Prints the version compiled into the binary.

use anyhow::Result;

pub fn run() -> Result<i32> {
    println!("setup-rexon {}", env!("CARGO_PKG_VERSION"));
    Ok(0)
}
