mod app;
mod cli;
mod config;
mod config_patch;
mod error;
mod graphics;
mod launch;
mod paths;
mod profile;
mod store;
mod ui;

fn main() -> anyhow::Result<()> {
    cli::run()
}
