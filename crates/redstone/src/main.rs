mod action;
mod cli;
mod config;
mod java;
mod lifecycle;
mod logging;
mod menu;
mod platform;
mod provision;
mod store;
mod tunnel;
mod world;

use anyhow::Result;
use cli::Commands;
use menu::{Shell, terminal::TerminalGuard};
use platform::{Platform, RedstoneHome};

#[cfg(all(
    not(target_os = "windows"),
    not(target_os = "openbsd"),
    not(target_os = "aix"),
    not(target_os = "android"),
    any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "powerpc64")
))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

fn main() -> Result<()> {
    let cli = cli::parse();

    if cli.version || cli.command == Some(Commands::Version) {
        println!("{}", cli::version_line());
        return Ok(());
    }

    let platform = Platform::detect();
    let home = RedstoneHome::resolve(cli.home);
    logging::init(&home.logs_dir(), cli.verbose)?;

    tracing::info!("{} on {}", cli::version_line(), platform);

    if cli.command == Some(Commands::Tutorial) {
        menu::print_playit_tutorial(platform);
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let _terminal = TerminalGuard::enter();
        let mut shell = Shell::new(home, platform)?;

        shell.run().await
    })?;

    tracing::info!("Session finished");
    Ok(())
}
