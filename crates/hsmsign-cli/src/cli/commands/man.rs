//! `hsmsign man` – roff man page on stdout.

use anyhow::Result;

pub fn run_man(cmd: clap::Command) -> Result<()> {
    clap_mangen::Man::new(cmd).render(&mut std::io::stdout())?;
    Ok(())
}
